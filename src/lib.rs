//! Secret Generator Controller Library
//!
//! Core functionality of the Secret Generator Controller: annotation parsing,
//! per-type generators, the reconciliation pass and the controller runtime.
//!
//! ## Quick Start
//!
//! ```rust
//! use secret_generator_controller::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod observability;
pub mod prelude;
pub mod runtime;
