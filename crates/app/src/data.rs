use std::sync::{Arc, Mutex};

use serde::Serialize;

/// Annotated frame plus the summary derived from it. Replaced wholesale on
/// every successfully processed frame; no history is retained.
#[derive(Clone, Debug)]
pub struct FramePacket {
    pub jpeg: Vec<u8>,
    pub summary: FrameSummary,
    pub timestamp_ms: i64,
}

/// One detection as reported to API consumers. Ids are assigned 1.. in
/// detection order and reset every frame.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct DetectionRecord {
    pub id: u32,
    pub confidence: f32,
}

/// Per-frame detection summary. `Default` doubles as the "no frame processed
/// yet" value served by the stats endpoints.
#[derive(Clone, Debug, Default, Serialize)]
pub struct FrameSummary {
    pub total_detections: u32,
    pub frame_number: u64,
    pub avg_confidence: f32,
    pub detections: Vec<DetectionRecord>,
}

/// Latest frame shared between the serial loop and its preview server.
pub type SharedFrame = Arc<Mutex<Option<FramePacket>>>;
