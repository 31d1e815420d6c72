//! Shared ingest core: decode a payload, run the detector, annotate, and
//! re-encode for serving. Both the HTTP upload path and the serial loop feed
//! through here.

use std::time::Instant;

use anyhow::anyhow;
use chrono::Utc;
use detect_core::Detector;
use frame_ingest::{IngestError, decode_frame};
use image::codecs::jpeg::JpegEncoder;
use tracing::debug;

use crate::{
    annotation,
    data::{DetectionRecord, FramePacket, FrameSummary},
};

/// Turn one raw payload into an annotated, encoded [`FramePacket`].
///
/// Fails with [`IngestError::Decode`] for unparseable bytes; model or encode
/// failures surface as [`IngestError::Other`]. Callers own the shared-state
/// update, so a failure here never clobbers the previously published frame.
pub fn process_frame(
    detector: &dyn Detector,
    payload: &[u8],
    frame_number: u64,
    jpeg_quality: u8,
    with_frame_counter: bool,
) -> Result<FramePacket, IngestError> {
    let image = decode_frame(payload)?;

    let detect_start = Instant::now();
    let detections = detector.detect(&image).map_err(IngestError::Other)?;
    metrics::histogram!("camgate_detection_seconds").record(detect_start.elapsed().as_secs_f64());

    let mut rgb = image.to_rgb8();
    annotation::annotate_detections(&mut rgb, &detections);
    annotation::draw_count_overlay(&mut rgb, detections.len());
    if with_frame_counter {
        annotation::draw_frame_counter(&mut rgb, frame_number);
    }

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, jpeg_quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(|err| IngestError::Other(anyhow!("JPEG encode failed: {err}")))?;

    let records: Vec<DetectionRecord> = detections
        .iter()
        .enumerate()
        .map(|(index, det)| DetectionRecord {
            id: index as u32 + 1,
            confidence: det.score,
        })
        .collect();
    let avg_confidence = if records.is_empty() {
        0.0
    } else {
        records.iter().map(|r| r.confidence).sum::<f32>() / records.len() as f32
    };

    metrics::counter!("camgate_frames_processed_total").increment(1);
    debug!(
        "frame #{frame_number}: {} detection(s), avg confidence {avg_confidence:.2}",
        records.len()
    );

    Ok(FramePacket {
        jpeg,
        summary: FrameSummary {
            total_detections: records.len() as u32,
            frame_number,
            avg_confidence,
            detections: records,
        },
        timestamp_ms: Utc::now().timestamp_millis(),
    })
}
