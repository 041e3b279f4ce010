//! Standalone gRPC server binary.
//!
//! The workspace's main `medcheck-run` binary runs both gRPC and REST concurrently; this one is
//! useful when only the gRPC API is needed.

use std::net::SocketAddr;
use std::sync::Arc;
use tonic::transport::Server;
use tonic_reflection::server::Builder;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_grpc::{pb::med_check_server::MedCheckServer, AuthInterceptor, MedCheckService};
use api_shared::FILE_DESCRIPTOR_SET;
use medcheck_core::CoreConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_grpc=info".parse()?)
                .add_directive("medcheck_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr: SocketAddr = std::env::var("MEDCHECK_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:50051".into())
        .parse()?;

    let cfg = Arc::new(CoreConfig::from_env()?);
    let interceptor = AuthInterceptor::new(std::env::var("API_KEY").ok());

    tracing::info!("-- Starting MedCheck gRPC on {}", addr);

    let mut server_builder = Server::builder().add_service(MedCheckServer::with_interceptor(
        MedCheckService::new(cfg),
        interceptor,
    ));

    if std::env::var("MEDCHECK_ENABLE_REFLECTION").unwrap_or_else(|_| "false".to_string()) == "true"
    {
        let reflection_service = Builder::configure()
            .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
            .build_v1()?;
        server_builder = server_builder.add_service(reflection_service);
        tracing::info!("gRPC server reflection enabled");
    } else {
        tracing::info!("gRPC server reflection disabled");
    }

    server_builder.serve(addr).await?;

    Ok(())
}
