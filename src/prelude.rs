//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ```rust
//! use secret_generator_controller::prelude::*;
//! ```
//!
//! This brings into scope:
//! - Generator types (SecretType, Generator, GeneratorError, etc.)
//! - Reconciler types (Reconciler, ReconcilerError, SecretStore, etc.)
//! - Config types (ControllerConfig, GeneratorConfig, ServerConfig)

pub use crate::controller::generator::{
    generator_for, EntropySource, Encoding, GenerationDirective, GenerationReport, Generator,
    GeneratorError, OsEntropy, RegenerationSet, SecretType,
};

pub use crate::controller::reconciler::{
    reconcile, reconcile_secret, InMemorySecretStore, KubeSecretStore, ReconcileOutcome,
    Reconciler, ReconcilerError, SecretStore, StoreError,
};

pub use crate::config::{ControllerConfig, GeneratorConfig, ServerConfig, SharedControllerConfig};
