mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from firesmoke for tests
pub use firesmoke::config::AppConfig;
pub use firesmoke::detection::{Annotator, Detector};
pub use firesmoke::models::{BoundingBox, Detection, IngestionResult, TrainingResult};
pub use firesmoke::pipeline::TrainPipeline;
pub use firesmoke::process::{CommandOutcome, CommandRunner, ExternalCommand};
pub use firesmoke::stream::{
    AnnotatedFrame, CancelFlag, FailurePolicy, FrameLimit, FrameSink, FrameSource, SessionState,
    StopReason, StreamSession,
};
