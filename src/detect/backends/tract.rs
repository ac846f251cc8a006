#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use image::RgbImage;
use tract_onnx::prelude::*;

use crate::detect::backend::{DetectionCapability, DetectorBackend};
use crate::detect::result::{BoundingBox, Detection, ObjectClass};
use crate::frame::Frame;

const CXYWH_OFFSET: usize = 4;

/// Tract-based backend for YOLOv8 ONNX detection models.
///
/// Frames are resized to the model input, the `[1, 4 + nc, N]` output is
/// decoded into boxes, filtered by confidence and reduced with class-wise NMS.
/// Inference runs on the CPU.
pub struct TractBackend {
    name: &'static str,
    capabilities: Vec<DetectionCapability>,
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    width: u32,
    height: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
    // Decoded detections for the last frame; both capabilities are queried per frame.
    last: Option<(u64, Vec<Detection>)>,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(
        name: &'static str,
        model_path: P,
        capabilities: Vec<DetectionCapability>,
        input_size: u32,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, input_size as usize, input_size as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            name,
            capabilities,
            model,
            width: input_size,
            height: input_size,
            confidence_threshold: 0.3,
            iou_threshold: 0.5,
            last: None,
        })
    }

    /// Override the default confidence threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        let image = RgbImage::from_raw(frame.width, frame.height, frame.pixels().to_vec())
            .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", frame.width, frame.height))?;
        let resized = image::imageops::resize(&image, self.width, self.height, FilterType::Triangle);

        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.height as usize, self.width as usize),
            |(_, channel, y, x)| resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        );
        Ok(input.into_tensor())
    }

    fn decode(&self, outputs: TVec<TValue>, frame: &Frame) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let preds = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("YOLO output must be rank 3")?;
        let shape = preds.shape();
        if shape[1] <= CXYWH_OFFSET {
            return Err(anyhow!("unexpected YOLO output shape {:?}", shape));
        }
        let num_classes = shape[1] - CXYWH_OFFSET;
        let sx = frame.width as f32 / self.width as f32;
        let sy = frame.height as f32 / self.height as f32;

        let mut candidates: Vec<(Detection, f32)> = Vec::new();
        for anchor in 0..shape[2] {
            let mut best = (0usize, f32::NEG_INFINITY);
            for class in 0..num_classes {
                let score = preds[[0, CXYWH_OFFSET + class, anchor]];
                if score > best.1 {
                    best = (class, score);
                }
            }
            if best.1 < self.confidence_threshold {
                continue;
            }
            let Ok(class) = ObjectClass::from_class_id(best.0 as u32) else {
                continue;
            };
            let cx = preds[[0, 0, anchor]] * sx;
            let cy = preds[[0, 1, anchor]] * sy;
            let w = preds[[0, 2, anchor]] * sx;
            let h = preds[[0, 3, anchor]] * sy;
            let bbox = BoundingBox::new(
                (cx - w / 2.0).clamp(0.0, frame.width as f32),
                (cy - h / 2.0).clamp(0.0, frame.height as f32),
                (cx + w / 2.0).clamp(0.0, frame.width as f32),
                (cy + h / 2.0).clamp(0.0, frame.height as f32),
            );
            candidates.push((Detection::new(class, bbox).with_confidence(best.1), best.1));
        }

        Ok(non_max_suppression(candidates, self.iou_threshold))
    }
}

/// Detections for `index`, running `infer` only when the cache holds another frame.
fn cached_for_frame<F>(
    cache: &mut Option<(u64, Vec<Detection>)>,
    index: u64,
    infer: F,
) -> Result<Vec<Detection>>
where
    F: FnOnce() -> Result<Vec<Detection>>,
{
    if let Some((cached_index, detections)) = cache.as_ref() {
        if *cached_index == index {
            return Ok(detections.clone());
        }
    }
    let detections = infer()?;
    *cache = Some((index, detections.clone()));
    Ok(detections)
}

/// Class-wise greedy NMS, highest confidence first.
fn non_max_suppression(mut candidates: Vec<(Detection, f32)>, iou_threshold: f32) -> Vec<Detection> {
    candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
    let mut kept: Vec<Detection> = Vec::new();
    for (candidate, _) in candidates {
        let suppressed = kept.iter().any(|k| {
            k.class == candidate.class && k.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    fn supports(&self, capability: DetectionCapability) -> bool {
        self.capabilities.contains(&capability)
    }

    fn detect(&mut self, frame: &Frame, capability: DetectionCapability) -> Result<Vec<Detection>> {
        let mut last = self.last.take();
        let detections = cached_for_frame(&mut last, frame.index, || {
            let input = self.build_input(frame)?;
            let outputs = self
                .model
                .run(tvec!(input.into()))
                .context("ONNX inference failed")?;
            self.decode(outputs, frame)
        });
        self.last = last;
        let detections = detections?;
        Ok(match capability {
            DetectionCapability::Ball => detections
                .into_iter()
                .filter(|d| d.class == ObjectClass::Ball)
                .collect(),
            _ => detections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nms_keeps_best_box_per_class() {
        let a = Detection::new(ObjectClass::Player, BoundingBox::new(0.0, 0.0, 10.0, 10.0));
        let b = Detection::new(ObjectClass::Player, BoundingBox::new(1.0, 1.0, 11.0, 11.0));
        let c = Detection::new(ObjectClass::Goalkeeper, BoundingBox::new(1.0, 1.0, 11.0, 11.0));
        let kept = non_max_suppression(vec![(a, 0.5), (b.clone(), 0.9), (c, 0.4)], 0.5);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0], b);
    }

    #[test]
    fn inference_runs_once_per_frame() {
        let mut cache = None;
        let mut runs = 0;
        let ball = Detection::new(ObjectClass::Ball, BoundingBox::new(0.0, 0.0, 4.0, 4.0));

        for _ in 0..2 {
            let out = cached_for_frame(&mut cache, 30, || {
                runs += 1;
                Ok(vec![ball.clone()])
            })
            .unwrap();
            assert_eq!(out, vec![ball.clone()]);
        }
        assert_eq!(runs, 1);

        cached_for_frame(&mut cache, 60, || {
            runs += 1;
            Ok(Vec::new())
        })
        .unwrap();
        assert_eq!(runs, 2);
    }

    #[test]
    fn failed_inference_is_not_cached() {
        let mut cache = None;
        assert!(cached_for_frame(&mut cache, 0, || Err(anyhow!("boom"))).is_err());
        assert!(cache.is_none());
    }
}
