use std::path::Path;

use anyhow::Result;
use image::{DynamicImage, imageops::FilterType};
use tch::{CModule, Device, Kind, Tensor};

use crate::{Detection, Detector, DetectorOptions};

/// Hard cap on detections kept per frame, mirroring typical NMS limits.
const MAX_DETECTIONS: usize = 512;

/// TorchScript-backed detector wrapper.
pub struct TorchDetector {
    module: CModule,
    device: Device,
    options: DetectorOptions,
}

impl TorchDetector {
    /// Load a TorchScript module and prepare it for execution.
    pub fn new<P: AsRef<Path>>(model_path: P, options: DetectorOptions) -> Result<Self> {
        let device = if options.use_cpu {
            Device::Cpu
        } else {
            Device::cuda_if_available()
        };
        let module = CModule::load_on_device(model_path, device)?;
        Ok(Self {
            module,
            device,
            options,
        })
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Resize to the model input and normalise RGB into a `[1, 3, H, W]`
    /// float tensor in `[0, 1]`.
    fn image_to_tensor(&self, image: &DynamicImage) -> Result<Tensor> {
        let (in_w, in_h) = self.options.input_size;
        let resized = image
            .resize_exact(in_w, in_h, FilterType::Triangle)
            .to_rgb8();
        let tensor = Tensor::from_slice(resized.as_raw())
            .to_device(self.device)
            .to_kind(Kind::Float)
            .view([1, in_h as i64, in_w as i64, 3])
            .permute([0, 3, 1, 2])
            / 255.0;
        Ok(tensor)
    }
}

impl Detector for TorchDetector {
    /// Execute the module and map `cx,cy,w,h,conf(,class)` rows back into
    /// source-image pixel boxes, filtered by the confidence threshold.
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>> {
        let input = self.image_to_tensor(image)?;
        let output = self.module.forward_ts(&[input])?;

        let shape = output.size();
        if shape.len() != 3 {
            anyhow::bail!("unexpected detector output shape: {shape:?}");
        }
        if shape[0] != 1 {
            anyhow::bail!("detector expected batch=1 but returned {}", shape[0]);
        }
        if shape[1] < 5 {
            anyhow::bail!(
                "detector output requires at least 5 channels (x,y,w,h,conf), got {}",
                shape[1]
            );
        }

        let preds = output
            .to_device(Device::Cpu)
            .squeeze_dim(0)
            .permute([1, 0])
            .contiguous();
        let rows: Vec<Vec<f32>> = Vec::<Vec<f32>>::try_from(&preds)?;

        let (in_w, in_h) = self.options.input_size;
        let scale_x = image.width() as f32 / in_w as f32;
        let scale_y = image.height() as f32 / in_h as f32;
        let max_x = image.width().saturating_sub(1) as f32;
        let max_y = image.height().saturating_sub(1) as f32;

        let mut detections = Vec::new();
        for row in rows {
            if row.len() < 5 {
                continue;
            }
            let score = row[4];
            if score < self.options.confidence_threshold {
                continue;
            }
            let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
            let bbox_xyxy = [
                ((cx - w / 2.0) * scale_x).clamp(0.0, max_x),
                ((cy - h / 2.0) * scale_y).clamp(0.0, max_y),
                ((cx + w / 2.0) * scale_x).clamp(0.0, max_x),
                ((cy + h / 2.0) * scale_y).clamp(0.0, max_y),
            ];
            let class_id = if row.len() > 5 { row[5] as i64 } else { 0 };
            detections.push(Detection {
                bbox_xyxy,
                score,
                class_id,
            });
            if detections.len() >= MAX_DETECTIONS {
                break;
            }
        }

        Ok(detections)
    }
}
