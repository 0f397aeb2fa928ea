#![deny(missing_docs)]

//! Core library for PDF digest: an asynchronous PDF extraction and summarization pipeline.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Redis connection setup.
pub mod connection;
/// Extraction strategies and summarization.
pub mod extraction;
/// Job identifiers, statuses and records.
pub mod jobs;
/// Structured logging and tracing setup.
pub mod logging;
/// Worker activity counters.
pub mod metrics;
/// Remote generative model clients.
pub mod providers;
/// Work queue abstraction and adapters.
pub mod queue;
/// Job submission and polling.
pub mod service;
/// Job status and document storage.
pub mod store;
/// Worker loop.
pub mod worker;
