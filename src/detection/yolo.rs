use anyhow::Context;
use image::RgbImage;
use rten::Model;
use rten_tensor::NdTensor;
use rten_tensor::prelude::*;
use tracing::{debug, info};

use super::Detector;
use super::postprocess::{
    PredictionShape, Prototypes, decode_mask, decode_predictions, letterbox, non_max_suppression,
    to_chw,
};
use crate::config::DetectionConfig;
use crate::models::Detection;

/// YOLO segmentation network exported to ONNX (or converted to `.rten`), run on the CPU
pub struct YoloSegDetector {
    model: Model,
    config: DetectionConfig,
}

impl YoloSegDetector {
    pub fn load(config: DetectionConfig) -> anyhow::Result<Self> {
        if config.input_size == 0 {
            anyhow::bail!("detection.input_size must be positive");
        }
        if !config.model_path.is_file() {
            anyhow::bail!(
                "model file {:?} not found; train a model or set detection.model_path",
                config.model_path
            );
        }
        let model = Model::load_file(&config.model_path)
            .with_context(|| format!("Failed to load model {:?}", config.model_path))?;
        if model.output_ids().len() < 2 {
            anyhow::bail!(
                "{:?} is not a segmentation model (expected prediction and prototype outputs)",
                config.model_path
            );
        }
        info!("Loaded segmentation model {:?}", config.model_path);
        Ok(Self { model, config })
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }
}

impl Detector for YoloSegDetector {
    fn detect(&mut self, frame: &RgbImage) -> anyhow::Result<Vec<Detection>> {
        let size = self.config.input_size;
        let (boxed, lb) = letterbox(frame, size);
        let input = NdTensor::from_data([1, 3, size as usize, size as usize], to_chw(&boxed));

        let input_id = *self
            .model
            .input_ids()
            .first()
            .ok_or_else(|| anyhow::anyhow!("model has no inputs"))?;
        let output_ids = self.model.output_ids().to_vec();

        let mut outputs = self
            .model
            .run(vec![(input_id, input.view().into())], &output_ids[..2], None)
            .map_err(|e| anyhow::anyhow!("model inference failed: {}", e))?;
        let protos: NdTensor<f32, 4> = outputs
            .remove(1)
            .try_into()
            .map_err(|e| anyhow::anyhow!("unexpected prototype output: {:?}", e))?;
        let preds: NdTensor<f32, 3> = outputs
            .remove(0)
            .try_into()
            .map_err(|e| anyhow::anyhow!("unexpected prediction output: {:?}", e))?;

        let [_, mask_dim, proto_h, proto_w] = protos.shape();
        let [_, d1, d2] = preds.shape();
        // Usually [rows, anchors] with far more anchors than rows
        let shape = if d1 <= d2 {
            PredictionShape { rows: d1, anchors: d2, transposed: false }
        } else {
            PredictionShape { rows: d2, anchors: d1, transposed: true }
        };

        let pred_data = preds.to_vec();
        let candidates =
            decode_predictions(&pred_data, shape, mask_dim, self.config.confidence_threshold)?;
        let kept = non_max_suppression(
            candidates,
            self.config.iou_threshold,
            self.config.max_detections,
        );
        debug!("{} detections after NMS", kept.len());

        let proto_data = protos.to_vec();
        let prototypes = Prototypes {
            data: &proto_data,
            mask_dim,
            height: proto_h,
            width: proto_w,
        };
        let (fw, fh) = frame.dimensions();

        let detections = kept
            .into_iter()
            .map(|c| {
                let bbox = lb.to_frame(&c.bbox, fw, fh);
                let mask = decode_mask(
                    &c.coeffs,
                    &prototypes,
                    &lb,
                    &bbox,
                    (fw, fh),
                    self.config.mask_threshold,
                );
                Detection {
                    class_id: c.class_id,
                    label: self.config.class_name(c.class_id),
                    confidence: c.confidence,
                    bbox,
                    mask: Some(mask),
                    track_id: None,
                }
            })
            .collect();
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn zero_input_size_is_rejected_before_loading() {
        let mut config = AppConfig::default().detection();
        config.input_size = 0;
        let err = YoloSegDetector::load(config).err().map(|e| e.to_string());
        assert_eq!(err.as_deref(), Some("detection.input_size must be positive"));
    }

    #[test]
    fn missing_model_file_is_reported() {
        let mut config = AppConfig::default().detection();
        config.model_path = "/nonexistent/best.onnx".into();
        assert!(YoloSegDetector::load(config).is_err());
    }
}
