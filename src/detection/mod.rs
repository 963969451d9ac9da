pub mod annotate;
pub mod postprocess;
pub mod tracker;
pub mod yolo;

use anyhow::Context;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader, RgbImage};
use std::io::Cursor;
use tracing::info;

use crate::models::Detection;

pub use annotate::{Annotator, side_by_side};
pub use tracker::IouTracker;
pub use yolo::YoloSegDetector;

/// Single-shot object segmentation on one frame
pub trait Detector {
    fn detect(&mut self, frame: &RgbImage) -> anyhow::Result<Vec<Detection>>;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn detect(&mut self, frame: &RgbImage) -> anyhow::Result<Vec<Detection>> {
        (**self).detect(frame)
    }
}

/// Decode an uploaded JPEG or PNG, honouring its EXIF orientation
pub fn load_upload(bytes: &[u8]) -> anyhow::Result<RgbImage> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .context("Failed to read uploaded image")?;
    match reader.format() {
        Some(ImageFormat::Jpeg) | Some(ImageFormat::Png) => {}
        Some(other) => anyhow::bail!("unsupported image format {:?}; upload a JPEG or PNG", other),
        None => anyhow::bail!("unrecognised image data; upload a JPEG or PNG"),
    }

    let mut decoder = reader.into_decoder().context("Failed to decode uploaded image")?;
    let orientation = decoder.orientation().context("Failed to read image orientation")?;
    let mut image = DynamicImage::from_decoder(decoder).context("Failed to decode uploaded image")?;
    image.apply_orientation(orientation);
    Ok(image.to_rgb8())
}

/// Result of the static image mode
pub struct StaticDetection {
    pub input: RgbImage,
    pub annotated: RgbImage,
    pub detections: Vec<Detection>,
}

impl StaticDetection {
    /// Input and annotated output composed into one image
    pub fn side_by_side(&self) -> RgbImage {
        side_by_side(&self.input, &self.annotated)
    }
}

pub fn detect_image(
    detector: &mut dyn Detector,
    annotator: &Annotator,
    input: RgbImage,
) -> anyhow::Result<StaticDetection> {
    let detections = detector.detect(&input).context("detection failed")?;
    info!("Detected {} objects", detections.len());
    let annotated = annotator.annotate(&input, &detections);
    Ok(StaticDetection {
        input,
        annotated,
        detections,
    })
}
