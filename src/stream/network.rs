//! IP camera sources.
//!
//! With the `webcam` feature the URL goes to OpenCV's FFmpeg backend, which
//! handles RTSP, HTTP MJPEG and whatever else FFmpeg can open. Without it only
//! JPEG snapshot endpoints are supported, polled over HTTP.

use image::RgbImage;
use tracing::info;

use super::FrameSource;

#[cfg(not(feature = "webcam"))]
use anyhow::Context;
#[cfg(not(feature = "webcam"))]
use image::ImageFormat;
#[cfg(not(feature = "webcam"))]
use reqwest::Url;
#[cfg(not(feature = "webcam"))]
use reqwest::blocking::{Client, Response};
#[cfg(not(feature = "webcam"))]
use std::time::Duration;

#[cfg(not(feature = "webcam"))]
const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(10);

enum Backend {
    #[cfg(feature = "webcam")]
    Capture(opencv::videoio::VideoCapture),
    /// Every read issues a GET returning a single JPEG
    #[cfg(not(feature = "webcam"))]
    Snapshot { client: Client, url: Url },
}

pub struct NetworkCamera {
    url: String,
    backend: Backend,
    released: bool,
}

impl NetworkCamera {
    pub fn open(url: &str) -> anyhow::Result<Self> {
        let url = url.trim();
        if url.is_empty() {
            anyhow::bail!("please enter an IP webcam URL");
        }
        let backend = Self::connect(url)?;
        info!("Opened IP webcam {}", url);
        Ok(Self {
            url: url.to_string(),
            backend,
            released: false,
        })
    }

    #[cfg(feature = "webcam")]
    fn connect(url: &str) -> anyhow::Result<Backend> {
        super::webcam::open_stream(url).map(Backend::Capture)
    }

    #[cfg(not(feature = "webcam"))]
    fn connect(url: &str) -> anyhow::Result<Backend> {
        let parsed = Url::parse(url).with_context(|| format!("invalid IP webcam URL {}", url))?;
        if !matches!(parsed.scheme(), "http" | "https") || !is_snapshot_path(&parsed) {
            anyhow::bail!(
                "{} is a video stream; streams need the `webcam` feature (OpenCV/FFmpeg), \
                 otherwise point at a .jpg snapshot endpoint",
                url
            );
        }
        let client = Client::builder()
            .connect_timeout(SNAPSHOT_TIMEOUT)
            .timeout(SNAPSHOT_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Backend::Snapshot { client, url: parsed })
    }
}

impl FrameSource for NetworkCamera {
    fn read_frame(&mut self) -> anyhow::Result<Option<RgbImage>> {
        if self.released {
            anyhow::bail!("IP webcam {} already released", self.url);
        }
        let frame = match &mut self.backend {
            #[cfg(feature = "webcam")]
            Backend::Capture(capture) => super::webcam::grab_rgb(capture)?
                .ok_or_else(|| anyhow::anyhow!("no frame from {}", self.url))?,
            #[cfg(not(feature = "webcam"))]
            Backend::Snapshot { client, url } => {
                let bytes = client
                    .get(url.clone())
                    .send()
                    .and_then(Response::error_for_status)
                    .and_then(Response::bytes)
                    .with_context(|| format!("Failed to fetch snapshot from {}", url))?;
                image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg)
                    .context("Failed to decode camera frame")?
                    .to_rgb8()
            }
        };
        Ok(Some(frame))
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match &mut self.backend {
            #[cfg(feature = "webcam")]
            Backend::Capture(capture) => {
                use opencv::prelude::*;
                if let Err(e) = capture.release() {
                    tracing::warn!("Failed to release IP webcam {}: {}", self.url, e);
                    return;
                }
            }
            #[cfg(not(feature = "webcam"))]
            Backend::Snapshot { .. } => {}
        }
        info!("Released IP webcam {}", self.url);
    }

    fn describe(&self) -> String {
        format!("IP webcam {}", self.url)
    }
}

/// `.jpg`/`.jpeg` endpoints serve a single image per request
#[cfg(not(feature = "webcam"))]
pub fn is_snapshot_path(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    path.ends_with(".jpg") || path.ends_with(".jpeg")
}
