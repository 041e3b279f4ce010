use std::net::SocketAddr;
use std::sync::Arc;
use tonic::transport::Server;
use tonic_reflection::server::Builder;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_grpc::{AuthInterceptor, MedCheckService};
use api_rest::{AppState, router};
use api_shared::FILE_DESCRIPTOR_SET;
use api_shared::pb::med_check_server::MedCheckServer;
use medcheck_core::CoreConfig;

/// Main entry point for the MedCheck application
///
/// Starts both gRPC and REST servers concurrently:
/// - gRPC server on port 50051 (configurable via MEDCHECK_ADDR)
/// - REST server on port 3000 (configurable via MEDCHECK_REST_ADDR)
///
/// The reference table is loaded once here and shared by both servers.
/// The gRPC server requires authentication via x-api-key header.
///
/// # Environment Variables
/// - `MEDCHECK_ADDR`: gRPC server address (default: "0.0.0.0:50051")
/// - `MEDCHECK_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `MEDCHECK_REFERENCE_TABLE`: Reference table JSON overriding the bundled table
/// - `MEDCHECK_ROLE_MATCHING`: `lenient` or `strict`
/// - `MEDCHECK_MISSING_REFERENCE`: `zero` or `unclassified`
/// - `MEDCHECK_CRM`: Physician CRM used to filter guides during reconciliation
/// - `MEDCHECK_ENABLE_REFLECTION`: Enable gRPC reflection when `true`
/// - `API_KEY`: API key for gRPC authentication
///
/// # Returns
/// * `Ok(())` - If servers start and run successfully
/// * `Err(anyhow::Error)` - If configuration, server startup or runtime fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("medcheck_run=info".parse()?)
                .add_directive("medcheck_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let grpc_addr: SocketAddr = std::env::var("MEDCHECK_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:50051".into())
        .parse()?;
    let rest_addr = std::env::var("MEDCHECK_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let cfg = Arc::new(CoreConfig::from_env()?);
    let interceptor = AuthInterceptor::new(std::env::var("API_KEY").ok());
    let enable_reflection = std::env::var("MEDCHECK_ENABLE_REFLECTION")
        .map(|v| v == "true")
        .unwrap_or(false);

    tracing::info!(
        reference_table = %cfg.reference_table().source(),
        procedures = cfg.reference_table().len(),
        "configuration resolved"
    );
    tracing::info!("++ Starting MedCheck gRPC on {}", grpc_addr);
    tracing::info!("++ Starting MedCheck REST on {}", rest_addr);

    // Start REST server
    let rest_app = router(AppState::new(cfg.clone()));
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    let rest_server = tokio::spawn(async move { axum::serve(listener, rest_app).await });

    // Start gRPC server
    let mut grpc_builder = Server::builder().add_service(MedCheckServer::with_interceptor(
        MedCheckService::new(cfg),
        interceptor,
    ));
    if enable_reflection {
        let reflection_service = Builder::configure()
            .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
            .build_v1()?;
        grpc_builder = grpc_builder.add_service(reflection_service);
        tracing::info!("gRPC server reflection enabled");
    }
    let grpc_server = grpc_builder.serve(grpc_addr);

    // Run both
    let (rest_result, grpc_result) = tokio::join!(rest_server, grpc_server);
    rest_result??;
    grpc_result?;

    Ok(())
}
