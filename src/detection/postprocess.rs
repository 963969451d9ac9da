//! Pre- and post-processing around a YOLO segmentation network.
//!
//! Pure functions over flat `f32` buffers so they can be tested without a model.

use image::{GrayImage, Luma, Rgb, RgbImage, imageops};

use crate::models::BoundingBox;

const PAD_VALUE: u8 = 114;

/// How a frame was fitted into the square network input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub input_size: u32,
}

impl Letterbox {
    /// Map a box from network input space back onto the source frame
    pub fn to_frame(&self, b: &BoundingBox, width: u32, height: u32) -> BoundingBox {
        BoundingBox {
            x1: (b.x1 - self.pad_x) / self.scale,
            y1: (b.y1 - self.pad_y) / self.scale,
            x2: (b.x2 - self.pad_x) / self.scale,
            y2: (b.y2 - self.pad_y) / self.scale,
        }
        .clamp(width, height)
    }
}

/// Resize keeping aspect ratio and pad to `size x size`
pub fn letterbox(image: &RgbImage, size: u32) -> (RgbImage, Letterbox) {
    let (w, h) = image.dimensions();
    let scale = (size as f32 / w as f32).min(size as f32 / h as f32);
    let new_w = ((w as f32 * scale).round() as u32).clamp(1, size);
    let new_h = ((h as f32 * scale).round() as u32).clamp(1, size);
    let resized = imageops::resize(image, new_w, new_h, imageops::FilterType::Triangle);

    let pad_x = (size - new_w) / 2;
    let pad_y = (size - new_h) / 2;
    let mut canvas = RgbImage::from_pixel(size, size, Rgb([PAD_VALUE; 3]));
    imageops::overlay(&mut canvas, &resized, pad_x.into(), pad_y.into());

    (
        canvas,
        Letterbox {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
            input_size: size,
        },
    )
}

/// Planar RGB scaled to [0, 1], laid out as CHW
pub fn to_chw(image: &RgbImage) -> Vec<f32> {
    let (w, h) = image.dimensions();
    let plane = (w * h) as usize;
    let mut data = vec![0f32; plane * 3];
    for (x, y, px) in image.enumerate_pixels() {
        let i = (y * w + x) as usize;
        for c in 0..3 {
            data[c * plane + i] = px[c] as f32 / 255.0;
        }
    }
    data
}

/// A box that survived the confidence threshold, still in input space
#[derive(Debug, Clone)]
pub struct Candidate {
    pub bbox: BoundingBox,
    pub class_id: usize,
    pub confidence: f32,
    pub coeffs: Vec<f32>,
}

/// Shape of the raw prediction tensor
#[derive(Debug, Clone, Copy)]
pub struct PredictionShape {
    /// 4 box values + class scores + mask coefficients
    pub rows: usize,
    pub anchors: usize,
    /// `[anchors, rows]` instead of the usual `[rows, anchors]`
    pub transposed: bool,
}

impl PredictionShape {
    fn at(&self, data: &[f32], row: usize, anchor: usize) -> f32 {
        if self.transposed {
            data[anchor * self.rows + row]
        } else {
            data[row * self.anchors + anchor]
        }
    }
}

/// Turn raw predictions into thresholded candidates
pub fn decode_predictions(
    data: &[f32],
    shape: PredictionShape,
    mask_dim: usize,
    confidence_threshold: f32,
) -> anyhow::Result<Vec<Candidate>> {
    if shape.rows <= 4 + mask_dim {
        anyhow::bail!(
            "prediction tensor has {} rows, too few for {} mask coefficients",
            shape.rows,
            mask_dim
        );
    }
    if data.len() < shape.rows * shape.anchors {
        anyhow::bail!("prediction tensor is shorter than its shape");
    }
    let num_classes = shape.rows - 4 - mask_dim;

    let mut candidates = Vec::new();
    for a in 0..shape.anchors {
        let (class_id, confidence) = (0..num_classes)
            .map(|c| (c, shape.at(data, 4 + c, a)))
            .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });
        if confidence < confidence_threshold {
            continue;
        }

        let bbox = BoundingBox::from_center(
            shape.at(data, 0, a),
            shape.at(data, 1, a),
            shape.at(data, 2, a),
            shape.at(data, 3, a),
        );
        let coeffs = (0..mask_dim)
            .map(|k| shape.at(data, 4 + num_classes + k, a))
            .collect();
        candidates.push(Candidate {
            bbox,
            class_id,
            confidence,
            coeffs,
        });
    }
    Ok(candidates)
}

/// Class-wise greedy non-maximum suppression, highest confidence first
pub fn non_max_suppression(
    mut candidates: Vec<Candidate>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if kept.len() >= max_detections {
            break;
        }
        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id && k.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

/// Prototype masks `[mask_dim, height, width]`
pub struct Prototypes<'a> {
    pub data: &'a [f32],
    pub mask_dim: usize,
    pub height: usize,
    pub width: usize,
}

impl Prototypes<'_> {
    fn logit(&self, coeffs: &[f32], x: usize, y: usize) -> f32 {
        let plane = self.height * self.width;
        let offset = y * self.width + x;
        coeffs
            .iter()
            .enumerate()
            .map(|(k, c)| c * self.data[k * plane + offset])
            .sum()
    }

    /// Bilinear sample of the mask logit at fractional prototype coordinates
    fn sample(&self, coeffs: &[f32], px: f32, py: f32) -> f32 {
        let px = px.clamp(0.0, (self.width - 1) as f32);
        let py = py.clamp(0.0, (self.height - 1) as f32);
        let x0 = px.floor() as usize;
        let y0 = py.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let fx = px - x0 as f32;
        let fy = py - y0 as f32;

        let top = self.logit(coeffs, x0, y0) * (1.0 - fx) + self.logit(coeffs, x1, y0) * fx;
        let bottom = self.logit(coeffs, x0, y1) * (1.0 - fx) + self.logit(coeffs, x1, y1) * fx;
        top * (1.0 - fy) + bottom * fy
    }
}

fn sigmoid(v: f32) -> f32 {
    1.0 / (1.0 + (-v).exp())
}

/// Frame-sized binary mask for one detection.
///
/// Pixels outside `frame_box` stay 0; inside, each frame pixel is mapped through
/// the letterbox into prototype space and thresholded after the sigmoid.
pub fn decode_mask(
    coeffs: &[f32],
    protos: &Prototypes<'_>,
    letterbox: &Letterbox,
    frame_box: &BoundingBox,
    frame_size: (u32, u32),
    threshold: f32,
) -> GrayImage {
    let (fw, fh) = frame_size;
    let mut mask = GrayImage::new(fw, fh);
    if protos.width == 0 || protos.height == 0 {
        return mask;
    }
    let sx = protos.width as f32 / letterbox.input_size as f32;
    let sy = protos.height as f32 / letterbox.input_size as f32;

    let x_start = frame_box.x1.floor().max(0.0) as u32;
    let y_start = frame_box.y1.floor().max(0.0) as u32;
    let x_end = (frame_box.x2.ceil() as u32).min(fw);
    let y_end = (frame_box.y2.ceil() as u32).min(fh);

    for y in y_start..y_end {
        let iy = (y as f32 + 0.5) * letterbox.scale + letterbox.pad_y;
        for x in x_start..x_end {
            let ix = (x as f32 + 0.5) * letterbox.scale + letterbox.pad_x;
            let logit = protos.sample(coeffs, ix * sx - 0.5, iy * sy - 0.5);
            if sigmoid(logit) > threshold {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
    }
    mask
}
