pub mod archive;
pub mod config;
pub mod detection;
pub mod download;
pub mod models;
pub mod pipeline;
pub mod process;
pub mod stages;
pub mod stream;

pub use config::AppConfig;
pub use detection::{Annotator, Detector, IouTracker, YoloSegDetector};
pub use models::{BoundingBox, Detection, IngestionResult, TrainingResult, ValidationResult};
pub use pipeline::TrainPipeline;
pub use stream::{
    CancelFlag, FailurePolicy, FrameSink, FrameSource, SessionState, StopReason, StreamSession,
    StreamSummary,
};

#[cfg(feature = "gui")]
pub mod gui;
