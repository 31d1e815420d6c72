//! Actix Web gateway exposing the upload, stats, and frame endpoints backed
//! by an explicit shared-state handle injected into every handler.
//!
//! Error signalling is by status code: 400 for undecodable uploads, 404 for
//! a camera that has never uploaded, 500 for anything else. Bodies stay JSON
//! so callers get a message either way.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use actix_web::{
    App, HttpResponse, HttpServer,
    web::{self, Bytes},
};
use anyhow::{Context, Result};
use detect_core::{Detector, DetectorOptions};
use frame_ingest::IngestError;
use serde_json::json;
use tracing::{error, info};

use crate::{data::FramePacket, gateway::GatewayConfig, processing::process_frame, telemetry};

/// Per-camera slot: the latest packet plus the running frame counter.
#[derive(Default)]
struct CameraSlot {
    latest: Option<FramePacket>,
    frame_count: u64,
}

/// Shared state handed to every request handler.
pub(crate) struct GatewayState {
    cameras: Mutex<HashMap<String, CameraSlot>>,
    detector: Arc<dyn Detector>,
    jpeg_quality: u8,
}

impl GatewayState {
    pub(crate) fn new(detector: Arc<dyn Detector>, jpeg_quality: u8) -> Self {
        Self {
            cameras: Mutex::new(HashMap::new()),
            detector,
            jpeg_quality,
        }
    }
}

pub(crate) fn run(config: GatewayConfig) -> Result<()> {
    let detector = detect_core::load_detector(
        &config.model_path,
        DetectorOptions {
            confidence_threshold: config.confidence,
            input_size: (config.input_size, config.input_size),
            use_cpu: config.use_cpu,
        },
    )?;
    let _ = telemetry::init_metrics_recorder();

    let state = web::Data::new(GatewayState::new(detector, config.jpeg_quality));
    info!("gateway listening on {}:{}", config.bind, config.port);
    if config.verbose {
        info!("upload frames with: curl --data-binary @frame.jpg http://<host>/upload/<camera-id>");
    }

    actix_web::rt::System::new()
        .block_on(async move {
            HttpServer::new(move || {
                App::new()
                    .app_data(state.clone())
                    .app_data(web::PayloadConfig::new(frame_ingest::MAX_FRAME_BYTES))
                    .configure(configure)
            })
            .bind((config.bind.as_str(), config.port))?
            .run()
            .await
        })
        .context("gateway server failed")?;

    Ok(())
}

/// Route table, shared with the handler tests.
pub(crate) fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/upload/{camera_id}", web::post().to(upload_handler))
        .route("/stats/{camera_id}", web::get().to(stats_handler))
        .route("/frame/{camera_id}", web::get().to(frame_handler))
        .route("/metrics", web::get().to(metrics_handler));
}

/// Ingest one raw frame: decode, detect, annotate, publish.
async fn upload_handler(
    path: web::Path<String>,
    body: Bytes,
    state: web::Data<GatewayState>,
) -> HttpResponse {
    let camera_id = path.into_inner();

    // Frame numbers are assigned at commit time, under the lock, so
    // concurrent uploads to the same camera cannot collide.
    match process_frame(state.detector.as_ref(), &body, 0, state.jpeg_quality, false) {
        Ok(mut packet) => {
            let faces = packet.summary.total_detections;
            let frame_number = {
                let mut cameras = match state.cameras.lock() {
                    Ok(guard) => guard,
                    Err(_) => {
                        return HttpResponse::InternalServerError()
                            .json(json!({"error": "gateway state poisoned"}));
                    }
                };
                let slot = cameras.entry(camera_id.clone()).or_default();
                slot.frame_count += 1;
                packet.summary.frame_number = slot.frame_count;
                let frame_number = slot.frame_count;
                slot.latest = Some(packet);
                frame_number
            };
            info!("camera {camera_id}: frame #{frame_number}, {faces} detection(s)");
            HttpResponse::Ok().json(json!({"status": "ok", "faces": faces}))
        }
        Err(IngestError::Decode(err)) => {
            metrics::counter!("camgate_decode_failures_total", "source" => "http").increment(1);
            HttpResponse::BadRequest().json(json!({"error": format!("invalid image: {err}")}))
        }
        Err(err) => {
            error!("upload processing failed for camera {camera_id}: {err:?}");
            HttpResponse::InternalServerError().json(json!({"error": err.to_string()}))
        }
    }
}

/// Serve the most recent detection summary, or the default if the camera has
/// never uploaded.
async fn stats_handler(path: web::Path<String>, state: web::Data<GatewayState>) -> HttpResponse {
    let camera_id = path.into_inner();
    let cameras = match state.cameras.lock() {
        Ok(guard) => guard,
        Err(_) => {
            return HttpResponse::InternalServerError()
                .json(json!({"error": "gateway state poisoned"}));
        }
    };
    let summary = cameras
        .get(&camera_id)
        .and_then(|slot| slot.latest.as_ref())
        .map(|packet| packet.summary.clone())
        .unwrap_or_default();
    HttpResponse::Ok().json(summary)
}

/// Serve the latest annotated JPEG for a camera.
async fn frame_handler(path: web::Path<String>, state: web::Data<GatewayState>) -> HttpResponse {
    let camera_id = path.into_inner();
    let jpeg = match state.cameras.lock() {
        Ok(guard) => guard
            .get(&camera_id)
            .and_then(|slot| slot.latest.as_ref())
            .map(|packet| packet.jpeg.clone()),
        Err(_) => {
            return HttpResponse::InternalServerError()
                .json(json!({"error": "gateway state poisoned"}));
        }
    };
    match jpeg {
        Some(jpeg) => HttpResponse::Ok().content_type("image/jpeg").body(jpeg),
        None => HttpResponse::NotFound()
            .json(json!({"error": format!("no frame ingested for camera {camera_id}")})),
    }
}

async fn metrics_handler() -> HttpResponse {
    match telemetry::prometheus_handle() {
        Some(handle) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(handle.render()),
        None => HttpResponse::ServiceUnavailable().body("metrics recorder not installed"),
    }
}

#[cfg(test)]
mod tests {
    use actix_http::Request;
    use actix_web::{
        body::MessageBody,
        dev::{Service, ServiceResponse},
        http::{StatusCode, header},
        test,
    };
    use serde_json::Value;

    use super::*;
    use crate::testutil::{FailingDetector, StubDetector, sample_frame_bytes};

    async fn spawn_app(
        detector: Arc<dyn Detector>,
    ) -> impl Service<Request, Response = ServiceResponse<impl MessageBody>, Error = actix_web::Error>
    {
        let state = web::Data::new(GatewayState::new(detector, 85));
        test::init_service(App::new().app_data(state).configure(configure)).await
    }

    #[actix_web::test]
    async fn upload_reports_detection_count() {
        let app = spawn_app(Arc::new(StubDetector::with_scores(&[0.9]))).await;

        let req = test::TestRequest::post()
            .uri("/upload/camera1")
            .set_payload(sample_frame_bytes())
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["faces"], 1);
    }

    #[actix_web::test]
    async fn invalid_payload_is_rejected_and_state_unchanged() {
        let app = spawn_app(Arc::new(StubDetector::with_scores(&[0.9]))).await;

        let req = test::TestRequest::post()
            .uri("/upload/camera1")
            .set_payload(&b"not an image"[..])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert!(body.get("error").is_some());

        // prior (empty) state is still served as the default summary
        let req = test::TestRequest::get().uri("/stats/camera1").to_request();
        let stats: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(stats["frame_number"], 0);
        assert_eq!(stats["total_detections"], 0);
    }

    #[actix_web::test]
    async fn stats_reflect_only_the_most_recent_frame() {
        let app = spawn_app(Arc::new(StubDetector::with_scores(&[0.6, 0.8]))).await;

        for _ in 0..2 {
            let req = test::TestRequest::post()
                .uri("/upload/camera1")
                .set_payload(sample_frame_bytes())
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK);
        }

        let req = test::TestRequest::get().uri("/stats/camera1").to_request();
        let stats: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(stats["frame_number"], 2);
        assert_eq!(stats["total_detections"], 2);
        assert_eq!(stats["detections"].as_array().unwrap().len(), 2);
        let avg = stats["avg_confidence"].as_f64().unwrap();
        assert!((avg - 0.7).abs() < 1e-5);
    }

    #[actix_web::test]
    async fn zero_detection_frame_yields_zeroed_averages() {
        let app = spawn_app(Arc::new(StubDetector::empty())).await;

        let req = test::TestRequest::post()
            .uri("/upload/camera1")
            .set_payload(sample_frame_bytes())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri("/stats/camera1").to_request();
        let stats: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(stats["avg_confidence"], 0.0);
        assert!(stats["detections"].as_array().unwrap().is_empty());
        assert_eq!(stats["frame_number"], 1);
    }

    #[actix_web::test]
    async fn frame_before_any_upload_is_a_404_with_json_error() {
        let app = spawn_app(Arc::new(StubDetector::empty())).await;

        let req = test::TestRequest::get().uri("/frame/camera1").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert!(body.get("error").is_some());
    }

    #[actix_web::test]
    async fn frame_after_upload_is_served_as_jpeg() {
        let app = spawn_app(Arc::new(StubDetector::empty())).await;

        let req = test::TestRequest::post()
            .uri("/upload/camera1")
            .set_payload(sample_frame_bytes())
            .to_request();
        test::call_service(&app, req).await;

        let req = test::TestRequest::get().uri("/frame/camera1").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "image/jpeg"
        );
        let body = test::read_body(resp).await;
        assert_eq!(&body[..2], &[0xff, 0xd8]);
    }

    #[actix_web::test]
    async fn cameras_are_isolated() {
        let app = spawn_app(Arc::new(StubDetector::with_scores(&[0.9]))).await;

        let req = test::TestRequest::post()
            .uri("/upload/camera1")
            .set_payload(sample_frame_bytes())
            .to_request();
        test::call_service(&app, req).await;

        let req = test::TestRequest::get().uri("/stats/camera2").to_request();
        let stats: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(stats["frame_number"], 0);

        let req = test::TestRequest::get().uri("/frame/camera2").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn detector_failure_is_a_500_not_a_crash() {
        let app = spawn_app(Arc::new(FailingDetector)).await;

        let req = test::TestRequest::post()
            .uri("/upload/camera1")
            .set_payload(sample_frame_bytes())
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert!(body.get("error").is_some());
    }
}
