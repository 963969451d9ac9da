//! Read → detect → annotate → present loop for camera sources.
//!
//! A session moves Idle → Running → Stopping → Stopped. Cancellation is polled
//! once at the top of every iteration, and the capture handle is owned by a
//! guard that releases it exactly once whichever way the loop is left.

pub mod network;
pub mod sink;
#[cfg(feature = "webcam")]
pub mod webcam;

use image::RgbImage;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::config::{AppConfig, DetectionConfig, StreamConfig};
use crate::detection::{Annotator, Detector, IouTracker, YoloSegDetector};
use crate::models::Detection;

pub use network::NetworkCamera;
pub use sink::{FrameDirSink, FrameLimit};
#[cfg(feature = "webcam")]
pub use webcam::LocalCamera;

/// A capture device or stream handing out frames
pub trait FrameSource {
    /// Next frame; `Ok(None)` once the source is exhausted
    fn read_frame(&mut self) -> anyhow::Result<Option<RgbImage>>;

    /// Give the underlying device back
    fn release(&mut self);

    fn describe(&self) -> String;
}

/// Receives every annotated frame
pub trait FrameSink {
    fn present(&mut self, frame: &AnnotatedFrame) -> anyhow::Result<()>;
}

pub struct AnnotatedFrame {
    pub index: u64,
    pub image: RgbImage,
    pub detections: Vec<Detection>,
    pub fps: f32,
}

/// Shared stop signal, raised by the UI or Ctrl-C
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Instantaneous frames-per-second from consecutive timestamps
#[derive(Debug, Default)]
pub struct FpsMeter {
    previous: Option<Instant>,
}

impl FpsMeter {
    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    /// 0 for the first frame, then `1 / (now - previous)`
    pub fn tick_at(&mut self, now: Instant) -> f32 {
        let fps = match self.previous {
            Some(prev) => {
                let secs = now.saturating_duration_since(prev).as_secs_f32();
                if secs > 0.0 { 1.0 / secs } else { 0.0 }
            }
            None => 0.0,
        };
        self.previous = Some(now);
        fps
    }
}

/// What to do when a read or a detection fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnFailure {
    /// End the session
    Stop,
    /// Warn and move on to the next frame
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailurePolicy {
    pub on_read: OnFailure,
    pub on_detect: OnFailure,
    /// Sleep between iterations
    pub frame_delay: Duration,
    /// Give up after this many failures in a row, even when skipping
    pub max_consecutive_failures: Option<u32>,
}

impl FailurePolicy {
    /// Local camera: a failed read ends the session, a failed detection is an error
    pub fn local_camera() -> Self {
        Self {
            on_read: OnFailure::Stop,
            on_detect: OnFailure::Stop,
            frame_delay: Duration::ZERO,
            max_consecutive_failures: None,
        }
    }

    /// Network camera: both kinds of failure are skipped
    pub fn network_camera(frame_delay: Duration, max_consecutive_failures: Option<u32>) -> Self {
        Self {
            on_read: OnFailure::Skip,
            on_detect: OnFailure::Skip,
            frame_delay,
            max_consecutive_failures,
        }
    }

    pub fn network_camera_from(config: &StreamConfig) -> Self {
        Self::network_camera(config.network_frame_delay, config.network_max_consecutive_failures)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    SourceExhausted,
    ReadFailed,
    FailureLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    pub frames_shown: u64,
    pub frames_skipped: u64,
    pub reason: StopReason,
}

/// Owns the source for the duration of a session and releases it on drop
struct CaptureGuard<'a, S: FrameSource + ?Sized> {
    source: &'a mut S,
}

impl<'a, S: FrameSource + ?Sized> CaptureGuard<'a, S> {
    fn acquire(source: &'a mut S) -> Self {
        Self { source }
    }

    fn read(&mut self) -> anyhow::Result<Option<RgbImage>> {
        self.source.read_frame()
    }
}

impl<S: FrameSource + ?Sized> Drop for CaptureGuard<'_, S> {
    fn drop(&mut self) {
        self.source.release();
    }
}

enum Step {
    Continue,
    Stop(StopReason),
}

/// One streaming run over a source
pub struct StreamSession {
    policy: FailurePolicy,
    cancel: CancelFlag,
    state: SessionState,
    tracker: IouTracker,
    fps: FpsMeter,
    frames_shown: u64,
    frames_skipped: u64,
    consecutive_failures: u32,
}

impl StreamSession {
    pub fn new(policy: FailurePolicy, cancel: CancelFlag, tracker: IouTracker) -> Self {
        Self {
            policy,
            cancel,
            state: SessionState::Idle,
            tracker,
            fps: FpsMeter::default(),
            frames_shown: 0,
            frames_skipped: 0,
            consecutive_failures: 0,
        }
    }

    /// Session with a tracker tuned by the detection settings
    pub fn tracking(policy: FailurePolicy, cancel: CancelFlag, detection: &DetectionConfig) -> Self {
        let tracker = IouTracker::new(detection.track_iou_threshold, detection.track_max_age);
        Self::new(policy, cancel, tracker)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn failed(&mut self, action: OnFailure, reason: StopReason) -> Step {
        match action {
            OnFailure::Stop => Step::Stop(reason),
            OnFailure::Skip => {
                self.frames_skipped += 1;
                self.consecutive_failures += 1;
                match self.policy.max_consecutive_failures {
                    Some(limit) if self.consecutive_failures >= limit => {
                        Step::Stop(StopReason::FailureLimit)
                    }
                    _ => Step::Continue,
                }
            }
        }
    }

    fn iterate<S, D, K>(
        &mut self,
        capture: &mut CaptureGuard<'_, S>,
        detector: &mut D,
        annotator: &Annotator,
        sink: &mut K,
    ) -> anyhow::Result<Step>
    where
        S: FrameSource + ?Sized,
        D: Detector + ?Sized,
        K: FrameSink + ?Sized,
    {
        let frame = match capture.read() {
            Ok(Some(frame)) => frame,
            Ok(None) => return Ok(Step::Stop(StopReason::SourceExhausted)),
            Err(e) => {
                match self.policy.on_read {
                    OnFailure::Stop => error!("Failed to read from {}: {:#}", capture.source.describe(), e),
                    OnFailure::Skip => warn!("Failed to read frame, skipping: {:#}", e),
                }
                return Ok(self.failed(self.policy.on_read, StopReason::ReadFailed));
            }
        };

        let mut detections = match detector.detect(&frame) {
            Ok(d) => d,
            Err(e) => match self.policy.on_detect {
                OnFailure::Stop => return Err(e.context("detection failed")),
                OnFailure::Skip => {
                    warn!("Error during detection, skipping this frame: {:#}", e);
                    return Ok(self.failed(OnFailure::Skip, StopReason::FailureLimit));
                }
            },
        };
        self.consecutive_failures = 0;
        self.tracker.update(&mut detections);

        let annotated = AnnotatedFrame {
            index: self.frames_shown,
            image: annotator.annotate(&frame, &detections),
            detections,
            fps: self.fps.tick(),
        };
        sink.present(&annotated)?;
        self.frames_shown += 1;
        Ok(Step::Continue)
    }

    /// Run until cancelled, exhausted or failed; the source is released on every exit path
    pub fn run<S, D, K>(
        &mut self,
        source: &mut S,
        detector: &mut D,
        annotator: &Annotator,
        sink: &mut K,
    ) -> anyhow::Result<StreamSummary>
    where
        S: FrameSource + ?Sized,
        D: Detector + ?Sized,
        K: FrameSink + ?Sized,
    {
        if self.state != SessionState::Idle {
            anyhow::bail!("stream session already used (state {:?})", self.state);
        }
        let mut capture = CaptureGuard::acquire(source);
        info!("Streaming from {}", capture.source.describe());
        self.state = SessionState::Running;

        let outcome = loop {
            if self.cancel.is_cancelled() {
                break Ok(StopReason::Cancelled);
            }
            match self.iterate(&mut capture, detector, annotator, sink) {
                Ok(Step::Continue) => {}
                Ok(Step::Stop(reason)) => break Ok(reason),
                Err(e) => break Err(e),
            }
            if !self.policy.frame_delay.is_zero() {
                std::thread::sleep(self.policy.frame_delay);
            }
        };

        self.state = SessionState::Stopping;
        drop(capture);
        self.state = SessionState::Stopped;

        let reason = outcome?;
        info!(
            "Stream stopped ({:?}): {} frames shown, {} skipped",
            reason, self.frames_shown, self.frames_skipped
        );
        Ok(StreamSummary {
            frames_shown: self.frames_shown,
            frames_skipped: self.frames_skipped,
            reason,
        })
    }
}

/// Load the trained detector and stream `source` through it until the session ends
pub fn run_camera<S, K>(
    source: &mut S,
    policy: FailurePolicy,
    config: &AppConfig,
    cancel: CancelFlag,
    sink: &mut K,
) -> anyhow::Result<StreamSummary>
where
    S: FrameSource + ?Sized,
    K: FrameSink + ?Sized,
{
    let detection = config.detection();
    let loaded = Annotator::from_font_option(detection.label_font.as_deref())
        .and_then(|annotator| Ok((annotator, YoloSegDetector::load(detection.clone())?)));
    // The source was opened by the caller; hand it back if we never start
    let (annotator, mut detector) = match loaded {
        Ok(parts) => parts,
        Err(e) => {
            source.release();
            return Err(e);
        }
    };
    StreamSession::tracking(policy, cancel, &detection).run(source, &mut detector, &annotator, sink)
}
