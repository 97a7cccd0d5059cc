#![doc = include_str!("../README.md")]

mod server;

use anyhow::Context;
use clap::Parser;
use futures::Stream;
use incident_tonic_core::proto::{
    FILE_DESCRIPTOR_SET, greeter::greeter_server::GreeterServer,
    incident::incident_service_server::IncidentServiceServer,
};
use server::config::{CliArgs, Listen, ServerConfig};
use server::service::{greeter::GreeterHandler, incident::IncidentHandler};
use server::store::Store;
use server::telemetry::init_telemetry;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::signal;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::server::Connected;
use tonic::{codec::CompressionEncoding, transport::Server};
use tonic_health::server::HealthReporter;
use tonic_reflection::server::Builder;
use tonic_web::GrpcWebLayer;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry()?;
    let shutdown = CancellationToken::new();

    let res = match &config.listen {
        Listen::Tcp(addr) => {
            let tcp = TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;
            let incoming = TcpListenerStream::new(tcp);
            log_startup_info(&config);
            run_server_with_incoming(incoming, &config, shutdown_signal(), shutdown).await
        }
        Listen::Uds(_path) => {
            #[cfg(unix)]
            {
                use tokio::net::UnixListener;
                use tokio_stream::wrappers::UnixListenerStream;
                let uds = UnixListener::bind(_path)
                    .with_context(|| format!("failed to bind {}", _path.display()))?;
                let incoming = UnixListenerStream::new(uds);
                log_startup_info(&config);
                let res =
                    run_server_with_incoming(incoming, &config, shutdown_signal(), shutdown).await;
                // Best effort; a panic can still leave the socket file behind.
                let _ = std::fs::remove_file(_path);
                res
            }
            #[cfg(not(unix))]
            {
                anyhow::bail!("Unix domain sockets are not supported on this platform");
            }
        }
    };

    providers.shutdown();
    res
}

/// Serves both services on `incoming` until `signal` resolves.
///
/// On shutdown the health service flips both services to `NOT_SERVING` and
/// `shutdown` is cancelled so handlers refuse new calls while tonic drains open
/// connections.
async fn run_server_with_incoming<I, IO, IE, F>(
    incoming: I,
    config: &ServerConfig,
    signal: F,
    shutdown: CancellationToken,
) -> anyhow::Result<()>
where
    I: Stream<Item = Result<IO, IE>>,
    IO: AsyncRead + AsyncWrite + Connected + Unpin + Send + 'static,
    IE: Into<tower::BoxError>,
    F: Future<Output = ()>,
{
    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<IncidentServiceServer<IncidentHandler>>()
        .await;
    health_reporter
        .set_serving::<GreeterServer<GreeterHandler>>()
        .await;

    let incidents = IncidentHandler::new(Store::new(), shutdown.clone());
    let greeter = GreeterHandler::new(Store::new(), shutdown.clone());

    let reflection = if config.reflection {
        Some(
            Builder::configure()
                .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
                .build_v1()?,
        )
    } else {
        None
    };

    Server::builder()
        .accept_http1(true)
        .http2_adaptive_window(Some(true))
        .layer(
            ServiceBuilder::new()
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(GrpcWebLayer::new()),
        )
        .add_service(health_service)
        .add_optional_service(reflection)
        .add_service(build_incident_service(incidents))
        .add_service(build_greeter_service(greeter))
        .serve_with_incoming_shutdown(incoming, async move {
            signal.await;
            begin_shutdown(&health_reporter, &shutdown).await;
        })
        .await?;

    log::info!("Service shut down successfully");
    Ok(())
}

/// Emitted through `log`, which the `tracing-log` bridge forwards to the
/// console subscriber whether or not OpenTelemetry is compiled in.
fn log_startup_info(config: &ServerConfig) {
    log::info!("{}", startup_message(config));
    log::debug!("Full config: {config:#?}");
}

fn startup_message(config: &ServerConfig) -> String {
    let reflection = if config.reflection { "on" } else { "off" };
    format!("Server running at {} (reflection {reflection})", config.listen)
}

fn build_incident_service(handler: IncidentHandler) -> IncidentServiceServer<IncidentHandler> {
    IncidentServiceServer::new(handler)
        .send_compressed(CompressionEncoding::Zstd)
        .send_compressed(CompressionEncoding::Gzip)
        .send_compressed(CompressionEncoding::Deflate)
        .accept_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Gzip)
        .accept_compressed(CompressionEncoding::Deflate)
}

fn build_greeter_service(handler: GreeterHandler) -> GreeterServer<GreeterHandler> {
    GreeterServer::new(handler)
        .send_compressed(CompressionEncoding::Zstd)
        .send_compressed(CompressionEncoding::Gzip)
        .send_compressed(CompressionEncoding::Deflate)
        .accept_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Gzip)
        .accept_compressed(CompressionEncoding::Deflate)
}

async fn begin_shutdown(health_reporter: &HealthReporter, shutdown: &CancellationToken) {
    log::info!("Shutdown signal received, terminating gracefully...");

    // 1. Publish the status
    health_reporter
        .set_not_serving::<IncidentServiceServer<IncidentHandler>>()
        .await;
    health_reporter
        .set_not_serving::<GreeterServer<GreeterHandler>>()
        .await;

    // 2. Refuse new calls; tonic drains the connections already open
    shutdown.cancel();
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => log::info!("Received Ctrl+C signal"),
        () = terminate => log::info!("Received SIGTERM signal"),
    }
}
