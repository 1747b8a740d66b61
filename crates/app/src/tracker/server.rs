//! Actix Web preview server exposing the latest map projection.
//!
//! The server runs on a dedicated thread with its own Actix system so the poll
//! loop never shares a runtime with HTTP clients. It serves the latest view as
//! JSON, an SSE stream of the same, and the Prometheus scrape endpoint.

use std::{net::TcpListener, time::Duration};

use actix_web::{
    App, HttpResponse, HttpServer,
    http::header,
    web::{self, Bytes},
};
use anyhow::{Context, Result};
use async_stream::stream;
use serde_json::to_string;
use tokio::sync::oneshot;
use tracing::{error, info};

use crate::tracker::{
    data::{SharedProjection, latest},
    telemetry,
};

const STREAM_INTERVAL: Duration = Duration::from_millis(250);

/// Shared state backing HTTP handlers.
pub(crate) struct ServerState {
    pub(crate) latest: SharedProjection,
}

#[derive(Default)]
/// Handle for the preview server thread.
pub(crate) struct PreviewServer {
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl PreviewServer {
    /// Signal the server to stop and block until the thread exits.
    pub(crate) fn stop(self) {
        if let Some(tx) = self.shutdown {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle {
            let _ = handle.join();
        }
    }
}

/// Spawn the preview server thread on an already bound listener.
pub(crate) fn spawn_preview_server(
    listener: TcpListener,
    shared: SharedProjection,
) -> Result<PreviewServer> {
    let address = listener.local_addr().context("reading preview listener address")?;
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let handle = telemetry::spawn_thread("tracker-preview-server", move || {
        if let Err(err) = actix_web::rt::System::new().block_on(async move {
            let server = HttpServer::new(move || {
                App::new()
                    .app_data(web::Data::new(ServerState {
                        latest: shared.clone(),
                    }))
                    .configure(routes)
            })
            .workers(1)
            .listen(listener)?
            .run();

            let srv_handle = server.handle();
            actix_web::rt::spawn(async move {
                let _ = shutdown_rx.await;
                srv_handle.stop(true).await;
            });

            server.await
        }) {
            error!("HTTP server error: {err}");
        }
    })
    .context("Failed to spawn preview server thread")?;
    info!("preview server listening on http://{address}");
    Ok(PreviewServer {
        shutdown: Some(shutdown_tx),
        handle: Some(handle),
    })
}

pub(crate) fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/routes", web::get().to(routes_handler))
        .route("/stream_routes", web::get().to(stream_routes_handler))
        .route("/metrics", web::get().to(metrics_handler));
}

/// Return the most recent projection as JSON.
async fn routes_handler(state: web::Data<ServerState>) -> HttpResponse {
    match latest(&state.latest) {
        Some(packet) => HttpResponse::Ok()
            .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
            .json(packet.response()),
        None => HttpResponse::NoContent().finish(),
    }
}

/// Stream projections as Server-Sent Events.
async fn stream_routes_handler(state: web::Data<ServerState>) -> HttpResponse {
    let state = state.clone();
    let stream = stream! {
        yield Ok::<Bytes, actix_web::Error>(Bytes::from_static(b"retry: 500\n\n"));
        let mut interval = actix_web::rt::time::interval(STREAM_INTERVAL);
        loop {
            interval.tick().await;
            if let Some(packet) = latest(&state.latest) {
                match to_string(&packet.response()) {
                    Ok(json) => {
                        let mut sse_chunk = String::with_capacity(json.len() + 32);
                        sse_chunk.push_str("id: ");
                        sse_chunk.push_str(&packet.cycle.to_string());
                        sse_chunk.push('\n');
                        sse_chunk.push_str("data: ");
                        sse_chunk.push_str(&json);
                        sse_chunk.push_str("\n\n");
                        yield Ok::<Bytes, actix_web::Error>(Bytes::from(sse_chunk));
                    }
                    Err(err) => {
                        let error_chunk = format!("event: error\ndata: {err}\n\n");
                        yield Ok::<Bytes, actix_web::Error>(Bytes::from(error_chunk));
                    }
                }
            } else {
                yield Ok::<Bytes, actix_web::Error>(Bytes::from_static(b": keep-alive\n\n"));
            }
        }
    };

    HttpResponse::Ok()
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_HEADERS, "*"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_METHODS, "GET"))
        .insert_header((header::ACCESS_CONTROL_EXPOSE_HEADERS, "Content-Type"))
        .append_header(("Cache-Control", "no-cache"))
        .append_header(("Content-Type", "text/event-stream"))
        .append_header(("Connection", "keep-alive"))
        .streaming(stream)
}

/// Prometheus text exposition.
async fn metrics_handler() -> HttpResponse {
    match telemetry::prometheus_handle() {
        Some(handle) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(handle.render()),
        None => HttpResponse::ServiceUnavailable().body("metrics recorder not installed"),
    }
}
