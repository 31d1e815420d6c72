use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result, anyhow, bail};

const SERIAL_USAGE: &str = "Usage: camgate serial --device <path> --model <path> [--baud <rate>] \
[--timeout-ms <n>] [--confidence <0-1>] [--jpeg-quality <1-100>] [--input-size <px>] \
[--preview-port <n>] [--save-dir <dir>] [--cpu] [--verbose]\n\n\
Positional form is also supported: camgate serial <device> <model-path> [...flags...]\n\
Keys while running: s = save the current annotated frame, q or Esc = quit.";

#[derive(Clone, Debug)]
pub struct SerialConfig {
    pub device: String,
    pub baud_rate: u32,
    pub timeout: Duration,
    pub model_path: PathBuf,
    pub confidence: f32,
    pub jpeg_quality: u8,
    pub input_size: u32,
    pub preview_port: u16,
    pub save_dir: PathBuf,
    pub use_cpu: bool,
    pub verbose: bool,
}

impl SerialConfig {
    pub fn from_args(args: &[String]) -> Result<Self> {
        let mut device: Option<String> = None;
        let mut baud_rate: Option<u32> = None;
        let mut timeout_ms: Option<u64> = None;
        let mut model_path: Option<PathBuf> = None;
        let mut confidence: Option<f32> = None;
        let mut jpeg_quality: Option<u8> = None;
        let mut input_size: Option<u32> = None;
        let mut preview_port: Option<u16> = None;
        let mut save_dir: Option<PathBuf> = None;
        let mut use_cpu = false;
        let mut verbose = false;
        let mut positional: Vec<String> = Vec::new();

        let mut idx = 2;
        while idx < args.len() {
            match args[idx].as_str() {
                "--device" => {
                    idx += 1;
                    device = Some(
                        args.get(idx)
                            .ok_or_else(|| anyhow!("--device requires a value"))?
                            .clone(),
                    );
                    idx += 1;
                }
                "--baud" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--baud requires a value"))?
                        .parse::<u32>()
                        .with_context(|| "--baud must be a positive integer".to_string())?;
                    if value == 0 {
                        bail!("--baud must be a positive integer");
                    }
                    baud_rate = Some(value);
                    idx += 1;
                }
                "--timeout-ms" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--timeout-ms requires a value"))?
                        .parse::<u64>()
                        .with_context(|| "--timeout-ms must be an integer".to_string())?;
                    timeout_ms = Some(value);
                    idx += 1;
                }
                "--model" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--model requires a value"))?
                        .clone();
                    model_path = Some(PathBuf::from(value));
                    idx += 1;
                }
                "--confidence" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--confidence requires a value"))?
                        .parse::<f32>()
                        .with_context(|| "--confidence must be a number".to_string())?;
                    if !(0.0..=1.0).contains(&value) {
                        bail!("--confidence must be between 0 and 1");
                    }
                    confidence = Some(value);
                    idx += 1;
                }
                "--jpeg-quality" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--jpeg-quality requires a value"))?
                        .parse::<u8>()
                        .with_context(|| {
                            "--jpeg-quality must be an integer between 1 and 100".to_string()
                        })?;
                    if !(1..=100).contains(&value) {
                        bail!("--jpeg-quality must be an integer between 1 and 100");
                    }
                    jpeg_quality = Some(value);
                    idx += 1;
                }
                "--input-size" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--input-size requires a value"))?
                        .parse::<u32>()
                        .with_context(|| "--input-size must be a positive integer".to_string())?;
                    if value == 0 {
                        bail!("--input-size must be a positive integer");
                    }
                    input_size = Some(value);
                    idx += 1;
                }
                "--preview-port" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--preview-port requires a value"))?
                        .parse::<u16>()
                        .with_context(|| "--preview-port must be a port number".to_string())?;
                    preview_port = Some(value);
                    idx += 1;
                }
                "--save-dir" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--save-dir requires a value"))?
                        .clone();
                    save_dir = Some(PathBuf::from(value));
                    idx += 1;
                }
                "--cpu" => {
                    use_cpu = true;
                    idx += 1;
                }
                "--verbose" => {
                    verbose = true;
                    idx += 1;
                }
                arg if arg.starts_with('-') => {
                    bail!("Unrecognised flag: {arg}\n\n{SERIAL_USAGE}");
                }
                other => {
                    positional.push(other.to_string());
                    idx += 1;
                }
            }
        }

        let mut positional = positional.into_iter();
        if device.is_none() {
            device = positional.next();
        }
        if model_path.is_none() {
            if let Some(path) = positional.next() {
                model_path = Some(PathBuf::from(path));
            }
        }

        let device = device.ok_or_else(|| {
            anyhow!("Missing serial device. Provide --device <path>.\n\n{SERIAL_USAGE}")
        })?;
        let model_path = model_path
            .ok_or_else(|| anyhow!("Missing model path. Provide --model <path>.\n\n{SERIAL_USAGE}"))?;

        Ok(Self {
            device,
            baud_rate: baud_rate.unwrap_or(115_200),
            timeout: Duration::from_millis(timeout_ms.unwrap_or(5_000)),
            model_path,
            confidence: confidence.unwrap_or(0.5),
            jpeg_quality: jpeg_quality.unwrap_or(85),
            input_size: input_size.unwrap_or(640),
            preview_port: preview_port.unwrap_or(8080),
            save_dir: save_dir.unwrap_or_else(|| PathBuf::from(".")),
            use_cpu,
            verbose,
        })
    }
}
