//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own.
//!
//! ## Intended use
//! This binary is useful for development and debugging when you only want the REST server (with
//! OpenAPI/Swagger UI). The workspace's main `medcheck-run` binary runs both gRPC and REST
//! concurrently.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{router, AppState};
use medcheck_core::CoreConfig;

/// Main entry point for the MedCheck REST API server
///
/// # Environment Variables
/// - `MEDCHECK_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `MEDCHECK_REFERENCE_TABLE`: Reference table override (default: bundled table)
/// - `MEDCHECK_ROLE_MATCHING`: `lenient` or `strict` (default: `lenient`)
/// - `MEDCHECK_MISSING_REFERENCE`: `zero` or `unclassified` (default: `zero`)
/// - `MEDCHECK_CRM`: Physician CRM used to filter guides during reconciliation
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the reference table or configuration values are invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("medcheck_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("MEDCHECK_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let cfg = Arc::new(CoreConfig::from_env()?);

    tracing::info!("-- Starting MedCheck REST API on {}", addr);

    let app = router(AppState::new(cfg));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
