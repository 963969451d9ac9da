use ab_glyph::{FontVec, PxScale};
use anyhow::Context;
use image::{Rgb, RgbImage, imageops};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::path::Path;

use crate::models::Detection;

/// Class colours, cycled by class id
const PALETTE: [[u8; 3]; 8] = [
    [230, 57, 70],
    [255, 159, 28],
    [42, 157, 143],
    [69, 123, 157],
    [244, 162, 97],
    [131, 56, 236],
    [58, 134, 255],
    [255, 0, 110],
];

const LABEL_TEXT: Rgb<u8> = Rgb([0, 0, 0]);

pub fn class_color(class_id: usize) -> Rgb<u8> {
    Rgb(PALETTE[class_id % PALETTE.len()])
}

/// Draws masks, boxes and centred labels onto frames
pub struct Annotator {
    font: Option<FontVec>,
    scale: PxScale,
    mask_alpha: f32,
}

impl Default for Annotator {
    fn default() -> Self {
        Self {
            font: None,
            scale: PxScale::from(18.0),
            mask_alpha: 0.45,
        }
    }
}

impl Annotator {
    /// Annotator that also writes label text with the given TTF/OTF font
    pub fn with_font_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).with_context(|| format!("Failed to read font {:?}", path))?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|e| anyhow::anyhow!("Invalid font {:?}: {}", path, e))?;
        Ok(Self {
            font: Some(font),
            ..Self::default()
        })
    }

    pub fn from_font_option(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => Self::with_font_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn annotate(&self, frame: &RgbImage, detections: &[Detection]) -> RgbImage {
        let mut out = frame.clone();
        for det in detections {
            if let Some(mask) = &det.mask {
                self.blend_mask(&mut out, mask, class_color(det.class_id));
            }
        }
        for det in detections {
            self.draw_box(&mut out, det);
            self.draw_label(&mut out, det);
        }
        out
    }

    fn blend_mask(&self, out: &mut RgbImage, mask: &image::GrayImage, color: Rgb<u8>) {
        if mask.dimensions() != out.dimensions() {
            return;
        }
        let a = self.mask_alpha;
        for (px, m) in out.pixels_mut().zip(mask.pixels()) {
            if m[0] == 0 {
                continue;
            }
            for c in 0..3 {
                px[c] = (px[c] as f32 * (1.0 - a) + color[c] as f32 * a).round() as u8;
            }
        }
    }

    fn draw_box(&self, out: &mut RgbImage, det: &Detection) {
        let b = det.bbox.clamp(out.width(), out.height());
        let w = b.width().round() as u32;
        let h = b.height().round() as u32;
        if w == 0 || h == 0 {
            return;
        }
        let rect = Rect::at(b.x1.round() as i32, b.y1.round() as i32).of_size(w, h);
        draw_hollow_rect_mut(out, rect, class_color(det.class_id));
    }

    fn draw_label(&self, out: &mut RgbImage, det: &Detection) {
        let caption = det.caption();
        let (text_w, text_h) = match &self.font {
            Some(font) => text_size(self.scale, font, &caption),
            // No font: a plain colour tag sized like a short label
            None => (caption.len() as u32 * 7, 12),
        };
        let pad = 3;
        let plate_w = text_w + 2 * pad;
        let plate_h = text_h + 2 * pad;

        let (cx, cy) = det.bbox.center();
        let x = (cx - plate_w as f32 / 2.0).round() as i32;
        let y = (cy - plate_h as f32 / 2.0).round() as i32;
        draw_filled_rect_mut(out, Rect::at(x, y).of_size(plate_w, plate_h), class_color(det.class_id));

        if let Some(font) = &self.font {
            draw_text_mut(out, LABEL_TEXT, x + pad as i32, y + pad as i32, self.scale, font, &caption);
        }
    }
}

/// Input and output next to each other, output on the right
pub fn side_by_side(left: &RgbImage, right: &RgbImage) -> RgbImage {
    let width = left.width() + right.width();
    let height = left.height().max(right.height());
    let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    imageops::replace(&mut canvas, left, 0, 0);
    imageops::replace(&mut canvas, right, left.width().into(), 0);
    canvas
}
