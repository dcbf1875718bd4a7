//! # Initialization
//!
//! Controller initialization logic including rustls setup, tracing, metrics,
//! server startup, and Kubernetes client setup.

use crate::config::{ControllerConfig, ServerConfig, SharedControllerConfig};
use crate::controller::reconciler::{KubeSecretStore, Reconciler};
use crate::controller::server::{start_server, ServerState};
use crate::observability;
use anyhow::Result;
use k8s_openapi::api::core::v1::Secret;
use kube::{api::Api, Client};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialization result containing all necessary components for the controller
pub struct InitializationResult {
    /// API for Secrets in the watched scope
    pub secrets: Api<Secret>,
    /// Reconciler context
    pub reconciler: Arc<Reconciler>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
    /// Shared controller configuration
    pub controller_config: SharedControllerConfig,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.is_ready())
            .field("watch_namespace", &self.controller_config.watch_namespace)
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - Reconciler setup
pub async fn initialize(
    controller_config: ControllerConfig,
    server_config: ServerConfig,
) -> Result<InitializationResult> {
    // Must run before any TLS connection is opened
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls crypto provider already installed");
    }

    init_tracing(&controller_config);

    info!("Starting Secret Generator Controller");
    info!(
        "Build info: datetime={}, git_hash={}",
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );
    info!(
        regenerate_insecure = controller_config.generator.regenerate_insecure,
        secret_length = controller_config.generator.secret_length,
        secret_encoding = %controller_config.generator.secret_encoding,
        ssh_key_length = controller_config.generator.ssh_key_length,
        "generator policy"
    );

    observability::register_metrics()?;

    let server_state = Arc::new(ServerState::default());

    let server_state_clone = Arc::clone(&server_state);
    let server_port = server_config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });

    wait_for_server_ready(&server_state, &server_handle, &server_config).await?;

    let client = Client::try_default().await?;

    let secrets: Api<Secret> = match controller_config.watch_namespace.as_deref() {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    };

    let controller_config = Arc::new(controller_config);
    let store = Arc::new(KubeSecretStore::new(client.clone()));
    let reconciler = Arc::new(Reconciler::new(store, Arc::clone(&controller_config)));

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        secrets,
        reconciler,
        server_state,
        controller_config,
    })
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over the configured level. `LOG_FORMAT=text` switches from
/// JSON lines to the human-readable formatter.
fn init_tracing(config: &ControllerConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "secret_generator_controller={}",
            config.log_level.to_lowercase()
        ))
    });

    let result = if config.log_format.eq_ignore_ascii_case("text") {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    };

    if let Err(e) = result {
        warn!("Tracing subscriber init returned error (may already be initialized): {}", e);
    }
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    server_config: &ServerConfig,
) -> Result<()> {
    let startup_timeout = server_config.startup_timeout();
    let poll_interval = server_config.poll_interval();
    let start_time = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.is_ready() {
            info!("HTTP server is ready and accepting connections");
            break;
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }

    Ok(())
}
