//! Test doubles shared across the processing and endpoint tests.

use anyhow::Result;
use detect_core::{Detection, Detector};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

/// Detector stub returning a canned set of detections.
pub struct StubDetector {
    detections: Vec<Detection>,
}

impl StubDetector {
    pub fn empty() -> Self {
        Self {
            detections: Vec::new(),
        }
    }

    pub fn with_scores(scores: &[f32]) -> Self {
        let detections = scores
            .iter()
            .enumerate()
            .map(|(i, &score)| Detection {
                bbox_xyxy: [4.0 * i as f32, 4.0, 4.0 * i as f32 + 8.0, 16.0],
                score,
                class_id: 0,
            })
            .collect();
        Self { detections }
    }
}

impl Detector for StubDetector {
    fn detect(&self, _image: &DynamicImage) -> Result<Vec<Detection>> {
        Ok(self.detections.clone())
    }
}

/// Detector stub whose inference always fails.
pub struct FailingDetector;

impl Detector for FailingDetector {
    fn detect(&self, _image: &DynamicImage) -> Result<Vec<Detection>> {
        anyhow::bail!("model exploded")
    }
}

/// Smallest payload the decode path accepts: an in-memory JPEG.
pub fn sample_frame_bytes() -> Vec<u8> {
    let image = RgbImage::from_pixel(32, 32, Rgb([40, 90, 20]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Jpeg)
        .expect("encoding a test frame cannot fail");
    bytes
}
