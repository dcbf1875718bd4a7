//! # Error Policy
//!
//! Error handling and backoff logic for the controller watch loop.
//! This module handles reconciliation errors and watch stream errors.

use crate::constants::DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS;
use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::observability;
use k8s_openapi::api::core::v1::Secret;
use kube_runtime::controller::Action;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Why a failed reconciliation was requeued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequeueReason {
    /// Generation failed for a transient reason; retried after a fixed delay
    GenerationRetry,
    /// Per-resource Fibonacci backoff
    ErrorBackoff,
}

impl RequeueReason {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RequeueReason::GenerationRetry => "generation-retry",
            RequeueReason::ErrorBackoff => "error-backoff",
        }
    }
}

/// Work out when a failed Secret is retried.
///
/// A fixed delay requested by the error wins; otherwise the per-resource
/// Fibonacci backoff advances.
pub fn requeue_delay(
    resource_key: &str,
    error: &ReconcilerError,
    ctx: &Reconciler,
) -> (Duration, RequeueReason) {
    if let Some(delay) = error.requeue_after() {
        return (delay, RequeueReason::GenerationRetry);
    }

    match ctx.next_backoff(resource_key) {
        Some((delay, error_count)) => {
            info!(
                error_count,
                backoff_secs = delay.as_secs(),
                "retrying with Fibonacci backoff"
            );
            (delay, RequeueReason::ErrorBackoff)
        }
        None => {
            warn!("Failed to lock backoff_states, using default backoff");
            (
                Duration::from_secs(DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS),
                RequeueReason::ErrorBackoff,
            )
        }
    }
}

/// Handle reconciliation errors for the controller
pub fn handle_reconciliation_error(
    obj: Arc<Secret>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = obj.metadata.name.as_deref().unwrap_or("unknown");
    let namespace = obj.metadata.namespace.as_deref().unwrap_or("default");

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.name = name,
        resource.namespace = namespace,
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}/{}: {:?}", namespace, name, error);
    observability::increment_reconciliation_errors();

    let resource_key = format!("{namespace}/{name}");
    let (delay, reason) = requeue_delay(&resource_key, error, &ctx);

    let next_trigger_time = chrono::Utc::now()
        + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
    info!(
        "Next retry scheduled: {} (in {}s, trigger source: {})",
        next_trigger_time.to_rfc3339(),
        delay.as_secs(),
        reason.as_str()
    );

    observability::increment_requeues_total(reason.as_str());
    Action::requeue(delay)
}

/// Handle watch stream errors with classification and backoff
///
/// Returns `None` to filter out the error (allow restart) or `Some(())` to continue.
pub async fn handle_watch_stream_error(
    error_string: &str,
    backoff: &Arc<AtomicU64>,
    max_backoff_ms: u64,
    watch_restart_delay: Duration,
) -> Option<()> {
    let error_span = tracing::span!(
        tracing::Level::WARN,
        "controller.watch.error",
        error = %error_string
    );
    let _error_guard = error_span.enter();

    match classify_watch_error(error_string) {
        WatchErrorKind::Unauthorized => {
            error!(
                "Watch authentication failed (401 Unauthorized) - RBAC may have been revoked or token expired"
            );
            error!("Verify the controller's ClusterRole still grants get/list/watch/update on secrets");
            warn!(
                "Waiting {}s before retrying watch (RBAC may need time to propagate)...",
                watch_restart_delay.as_secs()
            );
            tokio::time::sleep(watch_restart_delay).await;
            None
        }
        WatchErrorKind::Expired => {
            warn!("Watch resource version expired (410), watch will restart");
            None
        }
        WatchErrorKind::Throttled => {
            let current_backoff = backoff.load(Ordering::Relaxed);
            warn!(
                "API server storage reinitializing (429), backing off for {}ms before restart...",
                current_backoff
            );
            tokio::time::sleep(Duration::from_millis(current_backoff)).await;
            backoff.store(
                current_backoff.saturating_mul(2).min(max_backoff_ms),
                Ordering::Relaxed,
            );
            None
        }
        WatchErrorKind::NotFound => {
            // A Secret deleted between event and fetch
            warn!("Secret not found (404) - it was probably deleted: {}", error_string);
            Some(())
        }
        WatchErrorKind::Other => {
            error!("Controller stream error: {}", error_string);
            tokio::time::sleep(watch_restart_delay).await;
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchErrorKind {
    Unauthorized,
    Expired,
    Throttled,
    NotFound,
    Other,
}

fn classify_watch_error(error_string: &str) -> WatchErrorKind {
    // 404 first: plain-text 404 bodies surface as "WatchFailed" serde errors
    let is_not_found = error_string.contains("ObjectNotFound")
        || error_string.contains("404")
        || error_string.contains("not found");
    let is_401 =
        (error_string.contains("401") || error_string.contains("Unauthorized")) && !is_not_found;
    let is_410 = error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Expired")
        || error_string.contains("Gone");
    let is_429 = error_string.contains("429")
        || error_string.contains("storage is (re)initializing")
        || error_string.contains("TooManyRequests");

    if is_401 {
        WatchErrorKind::Unauthorized
    } else if is_410 {
        WatchErrorKind::Expired
    } else if is_429 {
        WatchErrorKind::Throttled
    } else if is_not_found {
        WatchErrorKind::NotFound
    } else {
        WatchErrorKind::Other
    }
}
