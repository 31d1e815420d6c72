//! Preview server for the serial pipeline: latest annotated frame, an MJPEG
//! stream, and the current detection summary.
//!
//! Runs on a dedicated thread so the blocking reassembly loop never has to
//! care about the Actix runtime.

use std::time::Duration;

use actix_web::{
    App, HttpResponse, HttpServer,
    http::header,
    web::{self, Bytes},
};
use anyhow::{Context, Result};
use async_stream::stream;
use serde::Serialize;
use serde_json::json;
use tokio::sync::oneshot;
use tracing::error;

use crate::{
    data::{FrameSummary, SharedFrame},
    telemetry,
};

/// Detection snapshot served by the preview, with the summary fields inline.
#[derive(Serialize)]
struct PreviewStats {
    timestamp_ms: i64,
    #[serde(flatten)]
    summary: FrameSummary,
}

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

/// Spawn the preview server thread and return a handle that can stop it.
pub(crate) fn spawn_preview_server(shared: SharedFrame, port: u16) -> Result<PreviewServer> {
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let handle = telemetry::spawn_thread("serial-preview-server", move || {
        if let Err(err) = actix_web::rt::System::new().block_on(async move {
            let server = HttpServer::new(move || {
                App::new()
                    .app_data(web::Data::new(shared.clone()))
                    .configure(configure)
            })
            .bind(("127.0.0.1", port))?
            .run();

            let srv_handle = server.handle();
            actix_web::rt::spawn(async move {
                let _ = shutdown_rx.await;
                srv_handle.stop(true).await;
            });

            server.await
        }) {
            error!("preview server error: {err}");
        }
    })
    .context("failed to spawn preview server thread")?;

    Ok(PreviewServer {
        shutdown: Some(shutdown_tx),
        handle: Some(handle),
    })
}

/// Route table, shared with the handler tests.
fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/frame.jpg", web::get().to(frame_handler))
        .route("/stream.mjpg", web::get().to(stream_handler))
        .route("/stats", web::get().to(stats_handler));
}

/// Serve the latest annotated JPEG.
async fn frame_handler(shared: web::Data<SharedFrame>) -> HttpResponse {
    let packet = shared.lock().ok().and_then(|guard| guard.clone());
    match packet {
        Some(packet) => HttpResponse::Ok()
            .content_type("image/jpeg")
            .body(packet.jpeg),
        None => HttpResponse::NotFound().json(json!({"error": "no frame reassembled yet"})),
    }
}

/// Stream the live preview over a multipart response.
async fn stream_handler(shared: web::Data<SharedFrame>) -> HttpResponse {
    let shared = shared.clone();
    let stream = stream! {
        let mut interval = actix_web::rt::time::interval(Duration::from_millis(33));
        loop {
            interval.tick().await;
            let packet = shared.lock().ok().and_then(|guard| guard.clone());
            if let Some(packet) = packet {
                let mut payload = Vec::with_capacity(packet.jpeg.len() + 64);
                payload.extend_from_slice(b"--frame\r\n");
                payload.extend_from_slice(
                    format!("X-Sequence: {}\r\n", packet.summary.frame_number).as_bytes(),
                );
                payload.extend_from_slice(b"Content-Type: image/jpeg\r\n\r\n");
                payload.extend_from_slice(&packet.jpeg);
                payload.extend_from_slice(b"\r\n");
                yield Ok::<Bytes, actix_web::Error>(Bytes::from(payload));
            }
        }
    };

    HttpResponse::Ok()
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .append_header(("Cache-Control", "no-cache"))
        .append_header(("Content-Type", "multipart/x-mixed-replace; boundary=frame"))
        .streaming(stream)
}

/// Serve the current detection summary, default if nothing has arrived yet.
async fn stats_handler(shared: web::Data<SharedFrame>) -> HttpResponse {
    let stats = shared
        .lock()
        .ok()
        .and_then(|guard| {
            guard.as_ref().map(|packet| PreviewStats {
                timestamp_ms: packet.timestamp_ms,
                summary: packet.summary.clone(),
            })
        })
        .unwrap_or(PreviewStats {
            timestamp_ms: 0,
            summary: FrameSummary::default(),
        });
    HttpResponse::Ok().json(stats)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use actix_web::{
        http::{StatusCode, header},
        test,
    };
    use serde_json::Value;

    use super::*;
    use crate::data::{FramePacket, FrameSummary};

    fn packet(frame_number: u64) -> FramePacket {
        FramePacket {
            jpeg: vec![0xff, 0xd8, 0x00, 0xff, 0xd9],
            summary: FrameSummary {
                total_detections: 1,
                frame_number,
                avg_confidence: 0.9,
                detections: Vec::new(),
            },
            timestamp_ms: 0,
        }
    }

    #[actix_web::test]
    async fn frame_is_404_until_one_arrives() {
        let shared: SharedFrame = Arc::new(Mutex::new(None));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(shared.clone()))
                .configure(configure),
        )
        .await;

        let resp =
            test::call_service(&app, test::TestRequest::get().uri("/frame.jpg").to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        *shared.lock().unwrap() = Some(packet(1));
        let resp =
            test::call_service(&app, test::TestRequest::get().uri("/frame.jpg").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "image/jpeg"
        );
    }

    #[actix_web::test]
    async fn stats_default_until_a_frame_arrives() {
        let shared: SharedFrame = Arc::new(Mutex::new(None));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(shared.clone()))
                .configure(configure),
        )
        .await;

        let stats: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/stats").to_request(),
        )
        .await;
        assert_eq!(stats["frame_number"], 0);

        *shared.lock().unwrap() = Some(packet(12));
        let stats: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/stats").to_request(),
        )
        .await;
        assert_eq!(stats["frame_number"], 12);
    }
}
