use image::GrayImage;
use std::path::PathBuf;

/// Output of the ingestion stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionResult {
    pub archive_path: PathBuf,
    pub extracted_dir: PathBuf,
}

/// Output of the validation stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationResult {
    pub passed: bool,
}

/// Output of the training stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingResult {
    pub trained_weights_path: PathBuf,
    /// Model exported for inference, when an export format is configured
    pub exported_model_path: Option<PathBuf>,
}

/// Axis-aligned box in frame pixel coordinates (corners, not size)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self {
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
        }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            return 0.0;
        }
        inter / union
    }

    /// Clamp to `[0, width] x [0, height]`
    pub fn clamp(&self, width: u32, height: u32) -> Self {
        let w = width as f32;
        let h = height as f32;
        Self {
            x1: self.x1.clamp(0.0, w),
            y1: self.y1.clamp(0.0, h),
            x2: self.x2.clamp(0.0, w),
            y2: self.y2.clamp(0.0, h),
        }
    }
}

/// One segmented object in a frame
#[derive(Debug, Clone)]
pub struct Detection {
    pub class_id: usize,
    pub label: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
    /// Binary mask (0 or 255) the size of the frame
    pub mask: Option<GrayImage>,
    /// Identity across frames, only set in tracking mode
    pub track_id: Option<u64>,
}

impl Detection {
    pub fn caption(&self) -> String {
        match self.track_id {
            Some(id) => format!("#{} {} {:.2}", id, self.label, self.confidence),
            None => format!("{} {:.2}", self.label, self.confidence),
        }
    }
}
