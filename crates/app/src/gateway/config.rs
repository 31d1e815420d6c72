use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};

const SERVE_USAGE: &str = "Usage: camgate serve --model <path> [--bind <addr>] [--port <n>] \
[--confidence <0-1>] [--jpeg-quality <1-100>] [--input-size <px>] [--cpu] [--verbose]\n\n\
Positional form is also supported: camgate serve <model-path> [...flags...]";

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub bind: String,
    pub port: u16,
    pub model_path: PathBuf,
    pub confidence: f32,
    pub jpeg_quality: u8,
    pub input_size: u32,
    pub use_cpu: bool,
    pub verbose: bool,
}

impl GatewayConfig {
    pub fn from_args(args: &[String]) -> Result<Self> {
        let mut bind: Option<String> = None;
        let mut port: Option<u16> = None;
        let mut model_path: Option<PathBuf> = None;
        let mut confidence: Option<f32> = None;
        let mut jpeg_quality: Option<u8> = None;
        let mut input_size: Option<u32> = None;
        let mut use_cpu = false;
        let mut verbose = false;
        let mut positional: Vec<String> = Vec::new();

        let mut idx = 2;
        while idx < args.len() {
            match args[idx].as_str() {
                "--bind" => {
                    idx += 1;
                    bind = Some(
                        args.get(idx)
                            .ok_or_else(|| anyhow!("--bind requires a value"))?
                            .clone(),
                    );
                    idx += 1;
                }
                "--port" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--port requires a value"))?
                        .parse::<u16>()
                        .with_context(|| "--port must be a port number".to_string())?;
                    port = Some(value);
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
                "--cpu" => {
                    use_cpu = true;
                    idx += 1;
                }
                "--verbose" => {
                    verbose = true;
                    idx += 1;
                }
                arg if arg.starts_with('-') => {
                    bail!("Unrecognised flag: {arg}\n\n{SERVE_USAGE}");
                }
                other => {
                    positional.push(other.to_string());
                    idx += 1;
                }
            }
        }

        let mut positional = positional.into_iter();
        if model_path.is_none() {
            if let Some(path) = positional.next() {
                model_path = Some(PathBuf::from(path));
            }
        }

        let model_path = model_path
            .ok_or_else(|| anyhow!("Missing model path. Provide --model <path>.\n\n{SERVE_USAGE}"))?;

        Ok(Self {
            bind: bind.unwrap_or_else(|| "0.0.0.0".to_string()),
            port: port.unwrap_or(8000),
            model_path,
            confidence: confidence.unwrap_or(0.5),
            jpeg_quality: jpeg_quality.unwrap_or(85),
            input_size: input_size.unwrap_or(640),
            use_cpu,
            verbose,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(rest: &[&str]) -> Vec<String> {
        let mut all = vec!["camgate".to_string(), "serve".to_string()];
        all.extend(rest.iter().map(|s| s.to_string()));
        all
    }

    #[test]
    fn defaults_fill_in_around_the_model_path() {
        let config = GatewayConfig::from_args(&args(&["--model", "yolo.pt"])).unwrap();
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert_eq!(config.confidence, 0.5);
        assert_eq!(config.jpeg_quality, 85);
        assert_eq!(config.input_size, 640);
        assert!(!config.use_cpu);
    }

    #[test]
    fn positional_model_path_is_accepted() {
        let config = GatewayConfig::from_args(&args(&["yolo.pt", "--port", "9000"])).unwrap();
        assert_eq!(config.model_path.to_str(), Some("yolo.pt"));
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn missing_model_path_is_rejected() {
        assert!(GatewayConfig::from_args(&args(&[])).is_err());
    }

    #[test]
    fn out_of_range_confidence_is_rejected() {
        assert!(GatewayConfig::from_args(&args(&["yolo.pt", "--confidence", "1.5"])).is_err());
    }
}
