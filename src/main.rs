// jemalloc as the global allocator
#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use anyhow::Context;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use statsd_interceptor::adapter::Framework;
use statsd_interceptor::config::{self, Config};
use statsd_interceptor::http::{self, plain::PlainRouter, state::AppState};
use statsd_interceptor::interceptor::{InterceptorOptions, StatsdInterceptor};
use statsd_interceptor::metrics::Telemetry;
use statsd_interceptor::sink::{LogSink, SharedSink, StatsdClient};
use statsd_interceptor::StatsdLayer;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower::Layer;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Arc::new(Config::from_env()?);

    // Initialize logging
    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %config.http.addr,
        framework = %config.http.framework,
        "Starting StatsD interceptor demo"
    );

    // Initialize components
    let telemetry = Arc::new(Telemetry::new());
    let sink: SharedSink = if config.statsd.mock {
        info!("STATSD_MOCK set; metrics are logged instead of sent");
        Arc::new(LogSink)
    } else {
        Arc::new(
            StatsdClient::new(&config.statsd)
                .context("Failed to create StatsD client")?
                .with_telemetry(telemetry.clone()),
        )
    };

    // Without an explicit HTTP_ADAPTER, report the server actually running
    let mut options = InterceptorOptions::from_config(&config.interceptor)
        .sink(sink)
        .telemetry(telemetry.clone());
    if options.http_adapter_host.is_none() {
        options = options.framework(config.http.framework);
    }
    let interceptor = Arc::new(StatsdInterceptor::new(options)?);

    let listener = bind_listener(&config)?;

    info!(
        addr = %config.http.addr,
        tcp_nodelay = config.http.tcp_nodelay,
        tcp_keepalive = ?config.http.tcp_keepalive_secs,
        "HTTP server listening"
    );

    match config.http.framework {
        Framework::Axum => {
            let state = Arc::new(AppState::new(config.clone(), interceptor, telemetry));
            let app = http::create_router(state);

            let http_server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
            if let Err(e) = http_server.await {
                error!(error = %e, "HTTP server error");
            }
        }
        Framework::Hyper => {
            let router = PlainRouter::demo(telemetry).context("Failed to build routes")?;
            let service = StatsdLayer::new(interceptor).layer(router);
            serve_plain(listener, service).await;
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Create the listening socket with the configured TCP options
fn bind_listener(config: &Config) -> anyhow::Result<TcpListener> {
    use socket2::{Domain, Protocol, Socket, Type};
    use std::net::SocketAddr as StdSocketAddr;

    let addr: StdSocketAddr = config.http.addr;
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))
        .context("Failed to create socket")?;

    // Enable SO_REUSEADDR for faster restarts
    socket
        .set_reuse_address(true)
        .context("Failed to set SO_REUSEADDR")?;

    // Enable TCP_NODELAY for lower latency (disable Nagle's algorithm)
    if config.http.tcp_nodelay {
        socket
            .set_tcp_nodelay(true)
            .context("Failed to set TCP_NODELAY")?;
    }

    // Enable TCP keepalive if configured
    if let Some(keepalive_secs) = config.http.tcp_keepalive_secs {
        let keepalive =
            socket2::TcpKeepalive::new().with_time(std::time::Duration::from_secs(keepalive_secs));
        socket
            .set_tcp_keepalive(&keepalive)
            .context("Failed to set TCP keepalive")?;
    }

    socket
        .set_nonblocking(true)
        .context("Failed to set non-blocking")?;
    socket.bind(&addr.into()).context("Failed to bind")?;
    socket.listen(1024).context("Failed to listen")?;

    TcpListener::from_std(socket.into()).context("Failed to convert to tokio listener")
}

/// Accept loop for the router-less hyper server
async fn serve_plain<S>(listener: TcpListener, service: S)
where
    S: tower::Service<
            ::http::Request<hyper::body::Incoming>,
            Response = ::http::Response<String>,
            Error = std::convert::Infallible,
        > + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                    continue;
                }
            },
            _ = &mut shutdown => break,
        };

        let io = TokioIo::new(stream);
        let service = TowerToHyperService::new(service.clone());
        tokio::spawn(async move {
            if let Err(e) = auto::Builder::new(TokioExecutor::new())
                .serve_connection(io, service)
                .await
            {
                debug!(peer = %peer, error = %e, "Connection closed with error");
            }
        });
    }
}

/// Initialize logging based on configuration
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        config::LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        config::LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
