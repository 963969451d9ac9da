//! Live camera panel shared by the webcam and IP webcam screens.
//!
//! The capture loop runs on its own thread; frames come back to the UI through
//! a small bounded channel turned into a `Task` stream. Frames the UI has not
//! picked up yet are dropped rather than queued.

use std::sync::Arc;

use iced::{
    Element, Length, Task,
    futures::stream,
    widget::{column, image::Handle, image as picture, text},
};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info};

use crate::config::AppConfig;
use crate::gui::widgets::{error_text, frame_handle};
use crate::stream::{
    AnnotatedFrame, CancelFlag, FailurePolicy, NetworkCamera, StreamSummary, run_camera,
};

/// Frames waiting for the UI
const FRAME_QUEUE: usize = 2;

#[derive(Debug, Clone)]
pub enum Camera {
    Local(i32),
    Network(String),
}

#[derive(Debug, Clone)]
pub enum LiveEvent {
    Frame { handle: Handle, fps: f32, index: u64 },
    Finished(Result<String, String>),
}

#[derive(Default)]
pub struct LiveView {
    cancel: Option<CancelFlag>,
    frame: Option<Handle>,
    fps: f32,
    frames: u64,
    status: Option<Result<String, String>>,
}

impl LiveView {
    pub fn is_running(&self) -> bool {
        self.cancel.is_some()
    }

    pub fn start(&mut self, camera: Camera, config: Arc<AppConfig>) -> Task<LiveEvent> {
        if self.is_running() {
            return Task::none();
        }
        let cancel = CancelFlag::new();
        self.cancel = Some(cancel.clone());
        self.frame = None;
        self.fps = 0.0;
        self.frames = 0;
        self.status = None;

        let (tx, rx) = mpsc::channel(FRAME_QUEUE);
        std::thread::spawn(move || {
            let outcome = capture_loop(camera, &config, cancel, &tx);
            let finished = match outcome {
                Ok(summary) => Ok(format!(
                    "Stopped after {} frames ({} skipped)",
                    summary.frames_shown, summary.frames_skipped
                )),
                Err(e) => {
                    error!("Camera session failed: {:#}", e);
                    Err(format!("{:#}", e))
                }
            };
            let _ = tx.blocking_send(LiveEvent::Finished(finished));
        });

        let events = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });
        Task::run(events, |event| event)
    }

    /// Raise the cancel flag; the capture thread notices it before its next read
    pub fn stop(&mut self) {
        if let Some(cancel) = &self.cancel {
            info!("Stopping camera session");
            cancel.cancel();
        }
    }

    pub fn handle(&mut self, event: LiveEvent) {
        match event {
            LiveEvent::Frame { handle, fps, index } => {
                self.frame = Some(handle);
                self.fps = fps;
                self.frames = index + 1;
            }
            LiveEvent::Finished(result) => {
                self.cancel = None;
                self.status = Some(result);
            }
        }
    }

    pub fn view<'a, Message: 'a>(&'a self) -> Element<'a, Message> {
        let mut content = column![text(format!("FPS: {:.2}    Frames: {}", self.fps, self.frames))].spacing(10);
        if let Some(frame) = &self.frame {
            content = content.push(picture(frame.clone()).width(Length::Fill));
        } else if self.is_running() {
            content = content.push(text("Waiting for the first frame..."));
        }
        match &self.status {
            Some(Ok(message)) => content = content.push(text(message)),
            Some(Err(message)) => content = content.push(error_text(message)),
            None => {}
        }
        content.into()
    }
}

impl Drop for LiveView {
    fn drop(&mut self) {
        self.stop();
    }
}

fn capture_loop(
    camera: Camera,
    config: &AppConfig,
    cancel: CancelFlag,
    tx: &mpsc::Sender<LiveEvent>,
) -> anyhow::Result<StreamSummary> {
    let mut sink = |frame: &AnnotatedFrame| -> anyhow::Result<()> {
        let event = LiveEvent::Frame {
            handle: frame_handle(&frame.image),
            fps: frame.fps,
            index: frame.index,
        };
        offer_frame(tx, event)
    };
    let stream_config = config.stream();

    match camera {
        Camera::Network(url) => {
            let mut camera = NetworkCamera::open(&url)?;
            let policy = FailurePolicy::network_camera_from(&stream_config);
            run_camera(&mut camera, policy, config, cancel, &mut sink)
        }
        #[cfg(feature = "webcam")]
        Camera::Local(index) => {
            let mut camera = crate::stream::LocalCamera::open_index(index, &stream_config)?;
            run_camera(&mut camera, FailurePolicy::local_camera(), config, cancel, &mut sink)
        }
        #[cfg(not(feature = "webcam"))]
        Camera::Local(index) => {
            anyhow::bail!(
                "cannot open webcam {}: built without the `webcam` feature",
                index
            )
        }
    }
}

/// Hand a frame to the UI without blocking; a full queue drops it
fn offer_frame(tx: &mpsc::Sender<LiveEvent>, event: LiveEvent) -> anyhow::Result<()> {
    match tx.try_send(event) {
        Ok(()) => Ok(()),
        Err(TrySendError::Full(_)) => {
            debug!("Display is behind, dropping a frame");
            Ok(())
        }
        Err(TrySendError::Closed(_)) => anyhow::bail!("display closed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn event(index: u64) -> LiveEvent {
        LiveEvent::Frame {
            handle: frame_handle(&RgbImage::from_pixel(2, 2, Rgb([0, 0, 0]))),
            fps: 0.0,
            index,
        }
    }

    #[test]
    fn frames_are_dropped_when_the_display_lags() -> anyhow::Result<()> {
        let (tx, mut rx) = mpsc::channel(FRAME_QUEUE);
        for index in 0..10 {
            offer_frame(&tx, event(index))?;
        }

        let mut queued = Vec::new();
        while let Ok(LiveEvent::Frame { index, .. }) = rx.try_recv() {
            queued.push(index);
        }
        assert_eq!(queued, vec![0, 1]);
        Ok(())
    }

    #[test]
    fn closed_display_ends_the_session() {
        let (tx, rx) = mpsc::channel(FRAME_QUEUE);
        drop(rx);
        assert!(offer_frame(&tx, event(0)).is_err());
    }
}
