//! # Types
//!
//! Core types for the reconciler.

use crate::config::SharedControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::generator::{EntropySource, GeneratorError, OsEntropy};
use crate::controller::reconciler::store::{SecretStore, StoreError};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("failed to fetch secret {key}: {source}")]
    Fetch {
        key: String,
        #[source]
        source: StoreError,
    },
    #[error("failed to update secret {key}: {source}")]
    Persist {
        key: String,
        #[source]
        source: StoreError,
    },
    #[error("failed to generate data for secret {key}: {source}")]
    Generation {
        key: String,
        #[source]
        source: GeneratorError,
    },
    #[error("generator task for secret {key} did not complete: {source}")]
    Task {
        key: String,
        #[source]
        source: tokio::task::JoinError,
    },
}

impl ReconcilerError {
    /// Fixed requeue delay requested by the failure, if any.
    ///
    /// `None` leaves the delay to the per-resource backoff in the error policy.
    #[must_use]
    pub fn requeue_after(&self) -> Option<Duration> {
        match self {
            ReconcilerError::Generation { source, .. } => source.retry_after(),
            ReconcilerError::Fetch { .. }
            | ReconcilerError::Persist { .. }
            | ReconcilerError::Task { .. } => None,
        }
    }
}

/// Result of a successful reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The Secret no longer exists
    NotFound,
    /// The Secret carries neither a valid type nor an autogenerate annotation
    Unmanaged,
    /// Nothing to generate; no update was sent
    Unchanged,
    /// Generated values were written back
    Updated,
}

impl ReconcileOutcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::NotFound => "not-found",
            ReconcileOutcome::Unmanaged => "unmanaged",
            ReconcileOutcome::Unchanged => "unchanged",
            ReconcileOutcome::Updated => "updated",
        }
    }
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_secs, max_secs),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
    }
}

/// Shared reconciliation context
#[derive(Clone)]
pub struct Reconciler {
    pub store: Arc<dyn SecretStore>,
    pub config: SharedControllerConfig,
    pub entropy: Arc<dyn EntropySource>,
    // Backoff state per resource (namespace/name), advanced by the error policy
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("store", &self.store)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Reconciler drawing random bytes from the OS CSPRNG
    #[must_use]
    pub fn new(store: Arc<dyn SecretStore>, config: SharedControllerConfig) -> Self {
        Self::with_entropy(store, config, Arc::new(OsEntropy))
    }

    #[must_use]
    pub fn with_entropy(
        store: Arc<dyn SecretStore>,
        config: SharedControllerConfig,
        entropy: Arc<dyn EntropySource>,
    ) -> Self {
        Self {
            store,
            config,
            entropy,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Advance the backoff for `resource_key`, returning the delay and error count
    pub fn next_backoff(&self, resource_key: &str) -> Option<(Duration, u32)> {
        let mut states = self.backoff_states.lock().ok()?;
        let state = states.entry(resource_key.to_string()).or_insert_with(|| {
            BackoffState::new(self.config.backoff_min_secs, self.config.backoff_max_secs)
        });
        state.increment_error();
        Some((state.backoff.next_backoff(), state.error_count))
    }

    /// Drop the backoff for `resource_key` after a successful pass.
    /// Deleted Secrets end with a successful `NotFound` pass, so entries do not
    /// outlive their Secret.
    pub fn clear_backoff(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states.remove(resource_key);
        }
    }

    /// Number of Secrets currently backing off
    #[must_use]
    pub fn backoff_count(&self) -> usize {
        self.backoff_states.lock().map_or(0, |states| states.len())
    }
}
