//! # Lead-Relay Service
//!
//! Binary entry point for the Lead-Relay HTTP service.
//!
//! This executable:
//! - Loads configuration from environment and files
//! - Initializes logging
//! - Creates the task-board client and reconciler
//! - Starts the HTTP server from lead-relay-api

use std::sync::Arc;
use std::time::Duration;

use lead_relay_api::{start_server, Reconciler, SdkTaskStore, ServiceConfig, ServiceError};
use taskboard_sdk::{ClientConfig, TaskBoardClient};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "lead_relay_service=info,lead_relay_api=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Lead-Relay Service");

    // -------------------------------------------------------------------------
    // Load configuration
    //
    // Sources (applied in order, later sources override earlier ones):
    //  1. /etc/lead-relay/service.yaml     system-wide defaults
    //  2. ./config/service.yaml            deployment-local override
    //  3. Path given by LR_CONFIG_FILE env operator-specified file
    //  4. Environment variables prefixed LR__ (double-underscore separator)
    //     e.g. LR__SERVER__PORT=9090 sets server.port = 9090
    //
    // All configuration fields carry serde defaults, so absent files produce
    // a valid config; validation then rejects deployments that never set the
    // task-board identifiers. A malformed file or an environment variable
    // that cannot be coerced to the right type is a hard error because it
    // indicates deliberate-but-broken operator configuration.
    // -------------------------------------------------------------------------
    let mut config_builder = config::Config::builder()
        .add_source(
            config::File::with_name("/etc/lead-relay/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name("config/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    // Optional explicit path supplied by the operator.
    if let Ok(explicit_path) = std::env::var("LR_CONFIG_FILE") {
        if !explicit_path.is_empty() {
            config_builder = config_builder.add_source(
                config::File::with_name(&explicit_path)
                    .required(true)
                    .format(config::FileFormat::Yaml),
            );
            info!(path = %explicit_path, "Loading configuration from explicit path");
        }
    }

    let config = match config_builder
        .add_source(config::Environment::with_prefix("LR").separator("__"))
        .build()
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "Failed to build configuration; aborting");
            std::process::exit(3);
        }
    };

    let service_config: ServiceConfig = match config.try_deserialize() {
        Ok(sc) => sc,
        Err(e) => {
            error!(
                error = %e,
                "Could not deserialize service configuration; aborting. \
                 Fix the configuration and restart."
            );
            std::process::exit(3);
        }
    };

    if let Err(e) = service_config.validate() {
        error!(error = %e, "Service configuration is invalid; aborting");
        std::process::exit(3);
    }

    // -------------------------------------------------------------------------
    // Wire the task-board client and reconciler
    // -------------------------------------------------------------------------
    let client_config = ClientConfig::builder()
        .api_url(&service_config.taskboard.api_url)
        .user_agent(format!("lead-relay/{}", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(service_config.server.timeout_seconds))
        .build();

    let client = match TaskBoardClient::new(client_config) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Failed to construct task-board client; aborting");
            std::process::exit(3);
        }
    };

    let store = Arc::new(SdkTaskStore::new(client, &service_config.taskboard));
    let reconciler = Arc::new(Reconciler::new(store, service_config.taskboard.clone()));

    info!(
        host = %service_config.server.host,
        port = service_config.server.port,
        list_id = %service_config.taskboard.list_id,
        "Starting HTTP server"
    );

    // Start the server
    if let Err(e) = start_server(service_config, reconciler).await {
        error!("Failed to start server: {}", e);

        let exit_code = match e {
            ServiceError::BindFailed { .. } => 1,
            ServiceError::ServerFailed { .. } => 2,
            ServiceError::Configuration(_) => 3,
        };

        std::process::exit(exit_code);
    }

    Ok(())
}
