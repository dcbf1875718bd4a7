//! # Reconciler
//!
//! Drives a Secret from its annotations to its generated data.
//!
//! - `reconcile`: the reconciliation pass and the `kube_runtime` entry point
//! - `store`: fetch/update seam over the API server
//! - `types`: reconciler context, errors, outcomes and backoff state

pub mod reconcile;
pub mod store;
pub mod types;

pub use reconcile::{is_candidate, reconcile, reconcile_secret};
pub use store::{InMemorySecretStore, KubeSecretStore, SecretStore, StoreError};
pub use types::{BackoffState, ReconcileOutcome, Reconciler, ReconcilerError};
