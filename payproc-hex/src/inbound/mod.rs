//! HTTP Inbound Adapter
//!
//! Axum-based HTTP server that drives the ingestion service.

mod handlers;
mod rate_limit;
mod server;

pub use server::HttpServer;
