//! Capture devices and network streams through OpenCV.

use anyhow::Context;
use image::RgbImage;
use opencv::core::Mat;
use opencv::prelude::*;
use opencv::{imgproc, videoio};
use tracing::{info, warn};

use super::FrameSource;
use crate::config::StreamConfig;

pub struct LocalCamera {
    index: i32,
    capture: videoio::VideoCapture,
    released: bool,
}

impl LocalCamera {
    pub fn open(config: &StreamConfig) -> anyhow::Result<Self> {
        Self::open_index(config.webcam_index, config)
    }

    pub fn open_index(index: i32, config: &StreamConfig) -> anyhow::Result<Self> {
        let mut capture = videoio::VideoCapture::new(index, videoio::CAP_ANY)
            .with_context(|| format!("Failed to open webcam {}", index))?;
        if !capture.is_opened()? {
            anyhow::bail!("webcam {} could not be opened", index);
        }
        capture.set(videoio::CAP_PROP_FRAME_WIDTH, config.webcam_width as f64)?;
        capture.set(videoio::CAP_PROP_FRAME_HEIGHT, config.webcam_height as f64)?;
        capture.set(videoio::CAP_PROP_FPS, config.webcam_fps as f64)?;
        info!(
            "Opened webcam {} at {}x{} {}fps",
            index, config.webcam_width, config.webcam_height, config.webcam_fps
        );
        Ok(Self {
            index,
            capture,
            released: false,
        })
    }
}

impl FrameSource for LocalCamera {
    fn read_frame(&mut self) -> anyhow::Result<Option<RgbImage>> {
        if self.released {
            anyhow::bail!("webcam {} already released", self.index);
        }
        match grab_rgb(&mut self.capture)? {
            Some(frame) => Ok(Some(frame)),
            None => anyhow::bail!("failed to grab a frame from webcam {}", self.index),
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match self.capture.release() {
            Ok(()) => info!("Released webcam {}", self.index),
            Err(e) => warn!("Failed to release webcam {}: {}", self.index, e),
        }
    }

    fn describe(&self) -> String {
        format!("webcam {}", self.index)
    }
}

/// Open a network stream (RTSP, HTTP MJPEG, ...) with the FFmpeg backend
pub fn open_stream(url: &str) -> anyhow::Result<videoio::VideoCapture> {
    let capture = videoio::VideoCapture::from_file(url, videoio::CAP_FFMPEG)
        .with_context(|| format!("Failed to open stream {}", url))?;
    if !capture.is_opened()? {
        anyhow::bail!("stream {} could not be opened", url);
    }
    Ok(capture)
}

/// Next frame converted to RGB, `None` when the device hands out nothing
pub fn grab_rgb(capture: &mut videoio::VideoCapture) -> anyhow::Result<Option<RgbImage>> {
    let mut bgr = Mat::default();
    if !capture.read(&mut bgr)? || bgr.empty() {
        return Ok(None);
    }
    let mut rgb = Mat::default();
    imgproc::cvt_color_def(&bgr, &mut rgb, imgproc::COLOR_BGR2RGB)?;

    let (width, height) = (rgb.cols() as u32, rgb.rows() as u32);
    let bytes = rgb.data_bytes()?.to_vec();
    let frame = RgbImage::from_raw(width, height, bytes)
        .ok_or_else(|| anyhow::anyhow!("captured frame has an unexpected layout"))?;
    Ok(Some(frame))
}
