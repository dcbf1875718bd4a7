//! # Watch Loop
//!
//! Controller watch loop that monitors Secrets and triggers reconciliation when
//! changes are detected.

use crate::config::SharedControllerConfig;
use crate::controller::reconciler::{is_candidate, reconcile, Reconciler, ReconcilerError};
use crate::controller::server::ServerState;
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::api::Api;
use kube_runtime::{controller::Action, watcher, Controller};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Run the controller watch loop
///
/// Watches Secrets and reconciles those carrying generator annotations.
/// The watch restarts when its stream ends or fails, until a shutdown signal
/// marks the server as not ready.
pub async fn run_watch_loop(
    secrets: Api<Secret>,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
    controller_config: SharedControllerConfig,
) -> Result<(), anyhow::Error> {
    info!("Starting controller watch loop...");

    let backoff_duration_ms = Arc::new(AtomicU64::new(controller_config.watch_backoff_start_ms));

    // SIGTERM/SIGINT flips readiness so health checks fail while in-flight passes finish
    let shutdown_server_state = Arc::clone(&server_state);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");
        shutdown_server_state.set_ready(false);
        info!("Marked server as not ready, waiting for in-flight reconciliations to complete...");
    });

    loop {
        if !server_state.is_ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let backoff = Arc::clone(&backoff_duration_ms);
        let config = Arc::clone(&controller_config);
        let watch_span = tracing::span!(
            tracing::Level::INFO,
            "controller.watch",
            operation = "watch_loop"
        );

        let controller_future =
            Controller::new(secrets.clone(), watcher::Config::default().any_semantic())
                .shutdown_on_signal()
                .run(
                    reconcile_candidate,
                    handle_reconciliation_error,
                    Arc::clone(&reconciler),
                )
                .filter_map(move |event| {
                    let backoff = Arc::clone(&backoff);
                    let config = Arc::clone(&config);
                    async move {
                        match &event {
                            Ok(_) => {
                                backoff.store(config.watch_backoff_start_ms, Ordering::Relaxed);
                                debug!("watch.event.success");
                                Some(event)
                            }
                            Err(e) => {
                                let error_string = format!("{e:?}");
                                handle_watch_stream_error(
                                    &error_string,
                                    &backoff,
                                    config.watch_backoff_max_ms,
                                    config.watch_restart_delay_duration(),
                                )
                                .await
                                .map(|()| event)
                            }
                        }
                    }
                })
                .for_each(|_| futures::future::ready(()));

        {
            let _watch_guard = watch_span.enter();
            info!(
                namespace = controller_config
                    .watch_namespace
                    .as_deref()
                    .unwrap_or("<all>"),
                "watching secrets"
            );
        }
        controller_future.await;

        if !server_state.is_ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let delay = controller_config.watch_restart_delay_after_end_duration();
        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            delay.as_secs()
        );
        tokio::time::sleep(delay).await;
    }

    info!("Controller stopped gracefully");
    Ok(())
}

/// Reconcile Secrets with generator annotations; wait for the next change on all others
async fn reconcile_candidate(
    obj: Arc<Secret>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    if !is_candidate(&obj) {
        return Ok(Action::await_change());
    }

    debug!(
        resource.name = obj.metadata.name.as_deref().unwrap_or("unknown"),
        resource.namespace = obj.metadata.namespace.as_deref().unwrap_or("default"),
        "watch.event.received"
    );
    reconcile(obj, ctx).await
}
