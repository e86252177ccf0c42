use std::{
    io,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
};

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderValue, Response, StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use tokio::{net::TcpListener, signal, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::prometheus::PromMetrics;

/// Binds the health/metrics listener, then serves it until `cancel` trips.
pub async fn start(
    metrics: Arc<PromMetrics>,
    port: u16,
    cancel: CancellationToken,
) -> io::Result<JoinHandle<()>> {
    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "metrics server listening");
    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router(metrics))
            .with_graceful_shutdown(cancel.cancelled_owned())
            .await
        {
            error!(error = %e, "metrics server failed");
        }
    }))
}

fn router(metrics: Arc<PromMetrics>) -> Router {
    Router::new()
        .route("/up", get(up))
        .route("/metrics", get(handler))
        .with_state(metrics)
}

async fn handler(State(metrics): State<Arc<PromMetrics>>) -> Response<Body> {
    match metrics.render() {
        Ok(buffer) => (
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )],
            buffer,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn up() -> Response<Body> {
    ().into_response()
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
