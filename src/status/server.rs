//! HTTP endpoint exposing the status page and metrics.

use crate::metrics::MetricsCollector;
use crate::upstream::Upstream;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{self, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info};

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const OPENMETRICS: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

struct StatusState {
    upstreams: Vec<Arc<Upstream>>,
    metrics: Arc<MetricsCollector>,
}

/// Serve `/status`, `/metrics` and `/healthz` until shutdown.
pub async fn run_status_server(
    address: SocketAddr,
    upstreams: Vec<Arc<Upstream>>,
    metrics: Arc<MetricsCollector>,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(address).await?;
    info!(address = %address, "status server listening");

    let state = Arc::new(StatusState { upstreams, metrics });

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let stream = match accepted {
                    Ok((stream, _)) => stream,
                    Err(error) => {
                        error!(error = %error, "status server accept failed");
                        continue;
                    }
                };

                let io = TokioIo::new(stream);
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let service =
                        service_fn(move |req| handle(req, Arc::clone(&state)));
                    if let Err(error) = http1::Builder::new().serve_connection(io, service).await {
                        error!(error = %error, "status connection error");
                    }
                });
            }
            _ = shutdown.recv() => {
                info!("status server shutting down");
                break;
            }
        }
    }

    Ok(())
}

async fn handle<B>(
    request: Request<B>,
    state: Arc<StatusState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let response = match (request.method(), request.uri().path()) {
        (&Method::GET, "/status") => text(StatusCode::OK, TEXT_PLAIN, render_status(&state)),
        (&Method::GET, "/metrics") => match render_metrics(&state) {
            Ok(body) => text(StatusCode::OK, OPENMETRICS, body),
            Err(error) => {
                error!(error = %error, "metrics encoding failed");
                text(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    TEXT_PLAIN,
                    "metrics encoding failed\n".to_string(),
                )
            }
        },
        (&Method::GET, "/healthz") => text(StatusCode::OK, TEXT_PLAIN, "ok\n".to_string()),
        (&Method::GET, "/") => text(
            StatusCode::OK,
            TEXT_PLAIN,
            "stickylb\n\n/status\n/metrics\n/healthz\n".to_string(),
        ),
        _ => text(
            StatusCode::NOT_FOUND,
            TEXT_PLAIN,
            "not found\n".to_string(),
        ),
    };

    Ok(response)
}

fn render_status(state: &StatusState) -> String {
    let mut out = String::new();
    for upstream in &state.upstreams {
        out.push_str(&upstream.snapshot().to_string());
        out.push('\n');
    }
    out
}

fn render_metrics(state: &StatusState) -> Result<String, std::fmt::Error> {
    for upstream in &state.upstreams {
        state.metrics.sync_gauges(&upstream.snapshot());
    }
    state.metrics.encode()
}

fn text(status: StatusCode, content_type: &'static str, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
