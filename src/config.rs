use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::{BackendKind, DetectParams, ModelSize};

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_IMAGES_DIR: &str = "images";
const DEFAULT_ANNOTATED_DIR: &str = "output_images";
const DEFAULT_LABELS_DIR: &str = "images_labels";
const DEFAULT_RESULTS_PATH: &str = "vehicle_results.json";
const DEFAULT_MASK_PATH: &str = "mask.png";
const DEFAULT_MODELS_DIR: &str = "models";
const DEFAULT_CONFIDENCE: f32 = 0.2;
const DEFAULT_IOU: f32 = 0.8;
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_ANNOTATIONS_BASE_URL: &str =
    "https://app.heartex.com/storage-data/uploaded/?filepath=";

#[derive(Debug, Deserialize, Default)]
struct CensusConfigFile {
    source: Option<SourceConfigFile>,
    paths: Option<PathsConfigFile>,
    model: Option<ModelConfigFile>,
    annotations: Option<AnnotationsConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct PathsConfigFile {
    images_dir: Option<PathBuf>,
    annotated_dir: Option<PathBuf>,
    labels_dir: Option<PathBuf>,
    results_path: Option<PathBuf>,
    mask_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    backend: Option<String>,
    size: Option<String>,
    weights_path: Option<PathBuf>,
    confidence: Option<f32>,
    iou: Option<f32>,
    input_size: Option<u32>,
    font_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct AnnotationsConfigFile {
    base_url: Option<String>,
    token: Option<String>,
}

/// Fully resolved configuration, built once at process entry.
#[derive(Debug, Clone)]
pub struct CensusConfig {
    pub source: SourceSettings,
    pub paths: PathSettings,
    pub model: ModelSettings,
    pub annotations: AnnotationSettings,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    /// Camera snapshot endpoint. Empty when not configured.
    pub url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct PathSettings {
    pub images_dir: PathBuf,
    pub annotated_dir: PathBuf,
    pub labels_dir: PathBuf,
    pub results_path: PathBuf,
    pub mask_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub backend: BackendKind,
    pub size: ModelSize,
    pub weights_path: Option<PathBuf>,
    pub confidence: f32,
    pub iou: f32,
    pub input_size: u32,
    pub font_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AnnotationSettings {
    pub base_url: String,
    pub token: Option<String>,
}

impl ModelSettings {
    /// Weights file to load: the explicit path when set, otherwise the
    /// default file for the configured model size.
    pub fn resolved_weights_path(&self) -> PathBuf {
        self.weights_path.clone().unwrap_or_else(|| {
            Path::new(DEFAULT_MODELS_DIR).join(self.size.default_weights_file())
        })
    }

    pub fn detect_params(&self) -> DetectParams {
        DetectParams {
            confidence: self.confidence,
            iou: self.iou,
            ..DetectParams::default()
        }
    }
}

impl CensusConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("CENSUS_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: CensusConfigFile) -> Result<Self> {
        let source = file.source.unwrap_or_default();
        let paths = file.paths.unwrap_or_default();
        let model = file.model.unwrap_or_default();
        let annotations = file.annotations.unwrap_or_default();

        let backend = match model.backend.as_deref() {
            Some(name) => BackendKind::from_name(name)?,
            None => BackendKind::default(),
        };
        let size = match model.size.as_deref() {
            Some(name) => ModelSize::from_name(name)?,
            None => ModelSize::default(),
        };

        Ok(Self {
            source: SourceSettings {
                url: source.url.unwrap_or_default(),
                timeout: Duration::from_secs(source.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            },
            paths: PathSettings {
                images_dir: paths
                    .images_dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_IMAGES_DIR)),
                annotated_dir: paths
                    .annotated_dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_ANNOTATED_DIR)),
                labels_dir: paths
                    .labels_dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_LABELS_DIR)),
                results_path: paths
                    .results_path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_RESULTS_PATH)),
                mask_path: paths
                    .mask_path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_MASK_PATH)),
            },
            model: ModelSettings {
                backend,
                size,
                weights_path: model.weights_path,
                confidence: model.confidence.unwrap_or(DEFAULT_CONFIDENCE),
                iou: model.iou.unwrap_or(DEFAULT_IOU),
                input_size: model.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
                font_path: model.font_path,
            },
            annotations: AnnotationSettings {
                base_url: annotations
                    .base_url
                    .unwrap_or_else(|| DEFAULT_ANNOTATIONS_BASE_URL.to_string()),
                token: annotations.token,
            },
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(url) = non_empty_env("IMAGE_URL") {
            self.source.url = url;
        }
        if let Some(token) = non_empty_env("TOKEN") {
            self.annotations.token = Some(token);
        }
        if let Some(path) = non_empty_env("CENSUS_RESULTS_PATH") {
            self.paths.results_path = PathBuf::from(path);
        }
        if let Some(path) = non_empty_env("CENSUS_MASK_PATH") {
            self.paths.mask_path = PathBuf::from(path);
        }
        if let Some(path) = non_empty_env("CENSUS_MODEL_WEIGHTS") {
            self.model.weights_path = Some(PathBuf::from(path));
        }
        if let Some(backend) = non_empty_env("CENSUS_BACKEND") {
            self.model.backend = BackendKind::from_name(&backend)?;
        }
        if let Some(timeout) = non_empty_env("CENSUS_TIMEOUT_SECS") {
            let seconds: u64 = timeout.parse().map_err(|_| {
                anyhow!("CENSUS_TIMEOUT_SECS must be an integer number of seconds")
            })?;
            self.source.timeout = Duration::from_secs(seconds);
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        self.source.url = self.source.url.trim().to_string();
        if !self.source.url.is_empty() {
            url::Url::parse(&self.source.url)
                .map_err(|e| anyhow!("invalid image url '{}': {}", self.source.url, e))?;
        }
        url::Url::parse(&self.annotations.base_url).map_err(|e| {
            anyhow!(
                "invalid annotations base url '{}': {}",
                self.annotations.base_url,
                e
            )
        })?;
        if self.source.timeout.is_zero() {
            return Err(anyhow!("source timeout must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&self.model.confidence) {
            return Err(anyhow!("model confidence must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.model.iou) {
            return Err(anyhow!("model iou must be within [0, 1]"));
        }
        if self.model.input_size == 0 {
            return Err(anyhow!("model input size must be greater than zero"));
        }
        Ok(())
    }

    /// Fails unless a snapshot URL is configured; only the acquisition loop needs one.
    pub fn require_source_url(&self) -> Result<&str> {
        if self.source.url.is_empty() {
            return Err(anyhow!("IMAGE_URL must be set (env or source.url in config)"));
        }
        Ok(&self.source.url)
    }
}

fn read_config_file(path: &Path) -> Result<CensusConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment_layout() -> Result<()> {
        let mut cfg = CensusConfig::from_file(CensusConfigFile::default())?;
        cfg.validate()?;
        assert_eq!(cfg.source.timeout, Duration::from_secs(10));
        assert_eq!(cfg.paths.results_path, PathBuf::from("vehicle_results.json"));
        assert_eq!(cfg.paths.images_dir, PathBuf::from("images"));
        assert_eq!(cfg.model.confidence, 0.2);
        assert_eq!(cfg.model.iou, 0.8);
        assert_eq!(
            cfg.model.resolved_weights_path(),
            Path::new("models").join("yolov9m.onnx")
        );
        assert!(cfg.require_source_url().is_err());
        Ok(())
    }

    #[test]
    fn rejects_out_of_range_thresholds() -> Result<()> {
        let mut cfg = CensusConfig::from_file(CensusConfigFile::default())?;
        cfg.model.confidence = 1.5;
        assert!(cfg.validate().is_err());
        Ok(())
    }

    #[test]
    fn rejects_unknown_model_size() {
        let file: CensusConfigFile =
            serde_json::from_str(r#"{"model": {"size": "huge"}}"#).unwrap();
        assert!(CensusConfig::from_file(file).is_err());
    }
}
