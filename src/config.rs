use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration, built once at startup and passed down to every stage.
///
/// Values are directory names and hyperparameters; the resolved per-stage configs
/// (`DataIngestionConfig`, ...) join them onto `artifacts_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root directory for everything the training pipeline produces
    pub artifacts_dir: PathBuf,
    pub ingestion: IngestionSettings,
    pub validation: ValidationSettings,
    pub trainer: TrainerSettings,
    pub detection: DetectionSettings,
    pub stream: StreamSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionSettings {
    pub dir_name: String,
    pub feature_store_dir_name: String,
    pub archive_name: String,
    pub download_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    pub dir_name: String,
    pub status_file_name: String,
    pub required_files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerSettings {
    pub dir_name: String,
    /// Scratch directory the external trainer runs in
    pub workspace_dir: PathBuf,
    pub command: String,
    pub pretrained_weights: String,
    pub image_size: u32,
    pub batch_size: u32,
    pub epochs: u32,
    pub dataset_descriptor: String,
    /// Format passed to the trainer's export mode, `None` skips the export
    pub export_format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    /// Exported segmentation model (ONNX or .rten); relative paths resolve against
    /// the trainer artifacts directory
    pub model_path: Option<PathBuf>,
    pub class_names: Vec<String>,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub input_size: u32,
    pub max_detections: usize,
    pub mask_threshold: f32,
    pub label_font: Option<PathBuf>,
    pub track_iou_threshold: f32,
    pub track_max_age: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    pub webcam_index: i32,
    pub webcam_width: u32,
    pub webcam_height: u32,
    pub webcam_fps: u32,
    pub network_frame_delay_ms: u64,
    pub network_max_consecutive_failures: Option<u32>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from("artifacts"),
            ingestion: IngestionSettings::default(),
            validation: ValidationSettings::default(),
            trainer: TrainerSettings::default(),
            detection: DetectionSettings::default(),
            stream: StreamSettings::default(),
        }
    }
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            dir_name: "data_ingestion".to_string(),
            feature_store_dir_name: "feature_store".to_string(),
            archive_name: "data.zip".to_string(),
            download_url: String::new(),
        }
    }
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            dir_name: "data_validation".to_string(),
            status_file_name: "status.txt".to_string(),
            required_files: [
                "train",
                "valid",
                "test",
                "data.yaml",
                "README.dataset.txt",
                "README.roboflow.txt",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl Default for TrainerSettings {
    fn default() -> Self {
        Self {
            dir_name: "model_trainer".to_string(),
            workspace_dir: PathBuf::from("yolo_seg_train"),
            command: "yolo".to_string(),
            pretrained_weights: "yolo12n-seg.pt".to_string(),
            image_size: 640,
            batch_size: 16,
            epochs: 50,
            dataset_descriptor: "data.yaml".to_string(),
            export_format: Some("onnx".to_string()),
        }
    }
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            model_path: None,
            class_names: vec!["fire".to_string(), "smoke".to_string()],
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            input_size: 640,
            max_detections: 100,
            mask_threshold: 0.5,
            label_font: None,
            track_iou_threshold: 0.3,
            track_max_age: 30,
        }
    }
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            webcam_index: 0,
            webcam_width: 1280,
            webcam_height: 720,
            webcam_fps: 30,
            network_frame_delay_ms: 50,
            network_max_consecutive_failures: None,
        }
    }
}

/// Resolved configuration of the ingestion stage
#[derive(Debug, Clone)]
pub struct DataIngestionConfig {
    pub ingestion_dir: PathBuf,
    pub feature_store_dir: PathBuf,
    pub archive_name: String,
    pub download_url: String,
}

/// Resolved configuration of the validation stage
#[derive(Debug, Clone)]
pub struct DataValidationConfig {
    pub validation_dir: PathBuf,
    pub status_file: PathBuf,
    pub required_files: Vec<String>,
}

/// Resolved configuration of the training stage
#[derive(Debug, Clone)]
pub struct ModelTrainerConfig {
    pub trainer_dir: PathBuf,
    pub workspace_dir: PathBuf,
    pub command: String,
    pub pretrained_weights: String,
    pub image_size: u32,
    pub batch_size: u32,
    pub epochs: u32,
    pub dataset_descriptor: String,
    pub export_format: Option<String>,
}

impl ModelTrainerConfig {
    /// Run name handed to the trainer: the weights file name without extension
    pub fn run_name(&self) -> &str {
        Path::new(&self.pretrained_weights)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(self.pretrained_weights.as_str())
    }
}

/// Resolved configuration of the detector
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    pub model_path: PathBuf,
    pub class_names: Vec<String>,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub input_size: u32,
    pub max_detections: usize,
    pub mask_threshold: f32,
    pub label_font: Option<PathBuf>,
    pub track_iou_threshold: f32,
    pub track_max_age: u32,
}

impl DetectionConfig {
    pub fn class_name(&self, class_id: usize) -> String {
        self.class_names
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class{}", class_id))
    }
}

/// Resolved configuration of the camera sources
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub webcam_index: i32,
    pub webcam_width: u32,
    pub webcam_height: u32,
    pub webcam_fps: u32,
    pub network_frame_delay: Duration,
    pub network_max_consecutive_failures: Option<u32>,
}

impl AppConfig {
    /// Load a JSON config file; missing fields keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        Ok(config)
    }

    pub fn with_artifacts_dir(mut self, dir: PathBuf) -> Self {
        self.artifacts_dir = dir;
        self
    }

    pub fn with_download_url(mut self, url: impl Into<String>) -> Self {
        self.ingestion.download_url = url.into();
        self
    }

    pub fn data_ingestion(&self) -> DataIngestionConfig {
        let ingestion_dir = self.artifacts_dir.join(&self.ingestion.dir_name);
        DataIngestionConfig {
            feature_store_dir: ingestion_dir.join(&self.ingestion.feature_store_dir_name),
            ingestion_dir,
            archive_name: self.ingestion.archive_name.clone(),
            download_url: self.ingestion.download_url.clone(),
        }
    }

    pub fn data_validation(&self) -> DataValidationConfig {
        let validation_dir = self.artifacts_dir.join(&self.validation.dir_name);
        DataValidationConfig {
            status_file: validation_dir.join(&self.validation.status_file_name),
            validation_dir,
            required_files: self.validation.required_files.clone(),
        }
    }

    pub fn model_trainer(&self) -> ModelTrainerConfig {
        let t = &self.trainer;
        ModelTrainerConfig {
            trainer_dir: self.artifacts_dir.join(&t.dir_name),
            workspace_dir: t.workspace_dir.clone(),
            command: t.command.clone(),
            pretrained_weights: t.pretrained_weights.clone(),
            image_size: t.image_size,
            batch_size: t.batch_size,
            epochs: t.epochs,
            dataset_descriptor: t.dataset_descriptor.clone(),
            export_format: t.export_format.clone(),
        }
    }

    pub fn stream(&self) -> StreamConfig {
        let s = &self.stream;
        StreamConfig {
            webcam_index: s.webcam_index,
            webcam_width: s.webcam_width,
            webcam_height: s.webcam_height,
            webcam_fps: s.webcam_fps,
            network_frame_delay: Duration::from_millis(s.network_frame_delay_ms),
            network_max_consecutive_failures: s.network_max_consecutive_failures,
        }
    }

    pub fn detection(&self) -> DetectionConfig {
        let d = &self.detection;
        let trainer_dir = self.artifacts_dir.join(&self.trainer.dir_name);
        let model_path = match &d.model_path {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => trainer_dir.join(p),
            None => {
                let ext = self.trainer.export_format.as_deref().unwrap_or("onnx");
                trainer_dir.join(format!("best.{}", ext))
            }
        };
        DetectionConfig {
            model_path,
            class_names: d.class_names.clone(),
            confidence_threshold: d.confidence_threshold,
            iou_threshold: d.iou_threshold,
            input_size: d.input_size,
            max_detections: d.max_detections,
            mask_threshold: d.mask_threshold,
            label_font: d.label_font.clone(),
            track_iou_threshold: d.track_iou_threshold,
            track_max_age: d.track_max_age,
        }
    }
}
