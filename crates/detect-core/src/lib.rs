//! Object detection behind a narrow trait so the model runtime can be
//! swapped or stubbed.
//!
//! The real implementation wraps a TorchScript module through `tch` and is
//! gated behind the `with-tch` feature, keeping default builds free of the
//! libtorch toolchain. Everything else in the workspace talks to
//! `dyn Detector` and never sees a tensor.

use std::{path::Path, sync::Arc};

use anyhow::Result;
use image::DynamicImage;

#[cfg(feature = "with-tch")]
mod torch;
#[cfg(feature = "with-tch")]
pub use torch::TorchDetector;

#[cfg(feature = "with-tch")]
pub use tch;

/// Single detection in source-image pixel coordinates.
#[derive(Debug, Clone, Default)]
pub struct Detection {
    /// Left, top, right, bottom.
    pub bbox_xyxy: [f32; 4],
    pub score: f32,
    pub class_id: i64,
}

/// Opaque image-to-detections capability.
pub trait Detector: Send + Sync {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>>;
}

/// Runtime knobs shared by detector implementations.
#[derive(Clone, Debug)]
pub struct DetectorOptions {
    pub confidence_threshold: f32,
    pub input_size: (u32, u32),
    pub use_cpu: bool,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            input_size: (640, 640),
            use_cpu: false,
        }
    }
}

/// Load the model-backed detector.
#[cfg(feature = "with-tch")]
pub fn load_detector(model_path: &Path, options: DetectorOptions) -> Result<Arc<dyn Detector>> {
    Ok(Arc::new(TorchDetector::new(model_path, options)?))
}

/// Load the model-backed detector.
///
/// Without the `with-tch` feature there is nothing to load; callers get a
/// clear error instead of a link failure.
#[cfg(not(feature = "with-tch"))]
pub fn load_detector(model_path: &Path, _options: DetectorOptions) -> Result<Arc<dyn Detector>> {
    anyhow::bail!(
        "detector support not compiled in (model {}); rebuild with --features with-tch",
        model_path.display()
    )
}
