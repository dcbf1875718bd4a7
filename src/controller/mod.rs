//! # Controller
//!
//! Core controller modules for the Secret Generator Controller.
//!
//! - `backoff`: Fibonacci backoff for failing Secrets
//! - `generator`: per-type value generators
//! - `reconciler`: reconciliation pass over a single Secret
//! - `server`: HTTP server for metrics and health checks

pub mod backoff;
pub mod generator;
pub mod reconciler;
pub mod server;
