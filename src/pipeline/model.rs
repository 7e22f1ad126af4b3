use super::detection::anchors::{Anchor, AnchorOptions, gen_anchors};
use super::detection::{Detection, Detector};
use super::landmarks::{LandmarkPrediction, Landmarker};
use crate::imgproc::{self, OutputRange};
use crate::shapes::point::Point;
use crate::shapes::region::{IouMode, Region};
use anyhow::{Result, anyhow};
use image::RgbImage;
use ndarray::Array4;
use ort::execution_providers;
use ort::session::SessionOutputs;
use ort::session::builder::GraphOptimizationLevel;
pub use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;
use tracing::{Level, debug, span, trace};

pub fn initialize_model(path: &Path, threads: usize) -> Result<Session> {
    ort::init()
        .with_execution_providers([execution_providers::XNNPACKExecutionProvider::default().build()])
        .commit()?;

    let model = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(threads.max(1))?
        .commit_from_file(path)?;

    debug!("Loaded model {path:?}");
    Ok(model)
}

fn sigmoid_stable(x: f32) -> f32 {
    if x >= 0. {
        1. / (1. + (-x).exp())
    } else {
        x.exp() / (1. + x.exp())
    }
}

fn extract(outputs: &SessionOutputs, name: &str) -> Result<Vec<f32>> {
    let value = outputs
        .get(name)
        .ok_or_else(|| anyhow!("model has no output named {name}"))?;

    Ok(value.try_extract_tensor::<f32>()?.iter().copied().collect())
}

#[derive(Debug, Clone)]
pub struct DetectorOptions {
    pub anchors: AnchorOptions,
    /// Keypoints regressed per box after the 4 box values
    pub keypoints: usize,
    pub score_threshold: f32,
    /// Boxes overlapping a stronger one by more than this are dropped
    pub overlap_threshold: f64,
    pub input_name: String,
    pub boxes_output: String,
    pub scores_output: String,
    pub range: OutputRange,
}

impl DetectorOptions {
    pub fn palm() -> Self {
        Self {
            anchors: AnchorOptions::palm_192(),
            keypoints: 7,
            score_threshold: 0.5,
            overlap_threshold: 0.3,
            input_name: "input".to_string(),
            boxes_output: "regressors".to_string(),
            scores_output: "classificators".to_string(),
            range: OutputRange::NegOneToOne,
        }
    }

    pub fn face() -> Self {
        Self {
            anchors: AnchorOptions::blaze_128(),
            keypoints: 6,
            score_threshold: 0.75,
            ..Self::palm()
        }
    }
}

/// SSD style detector (BlazeFace, BlazePalm): box and keypoint offsets are
/// regressed per anchor.
pub struct OnnxDetector {
    model: Session,
    anchors: Vec<Anchor>,
    options: DetectorOptions,
}

impl OnnxDetector {
    pub fn new(path: &Path, threads: usize, options: DetectorOptions) -> Result<Self> {
        Ok(Self {
            model: initialize_model(path, threads)?,
            anchors: gen_anchors(&options.anchors),
            options,
        })
    }
}

impl Detector for OnnxDetector {
    async fn detect(&mut self, img: &RgbImage) -> Result<Vec<Detection>> {
        let span = span!(Level::DEBUG, "onnx_detector");
        let _guard = span.enter();

        let (w, h) = (self.options.anchors.input_width, self.options.anchors.input_height);
        let input = imgproc::to_tensor(&imgproc::resize(img, w, h), self.options.range);

        let outputs = self.model.run(
            ort::inputs![self.options.input_name.as_str() => Tensor::from_array(input)?]?,
        )?;
        let boxes = extract(&outputs, &self.options.boxes_output)?;
        let scores = extract(&outputs, &self.options.scores_output)?;

        decode_detections(&boxes, &scores, &self.anchors, &self.options, img.dimensions())
    }
}

pub fn decode_detections(
    boxes: &[f32],
    scores: &[f32],
    anchors: &[Anchor],
    options: &DetectorOptions,
    (img_w, img_h): (u32, u32),
) -> Result<Vec<Detection>> {
    let stride = 4 + 2 * options.keypoints;
    if boxes.len() != anchors.len() * stride || scores.len() != anchors.len() {
        return Err(anyhow!(
            "expected {} boxes of {stride} values, got {} values and {} scores",
            anchors.len(),
            boxes.len(),
            scores.len()
        ));
    }

    let in_w = options.anchors.input_width as f32;
    let in_h = options.anchors.input_height as f32;
    let mut candidates = Vec::new();

    for (i, anchor) in anchors.iter().enumerate() {
        let score = sigmoid_stable(scores[i].clamp(-100., 100.));
        if score < options.score_threshold {
            continue;
        }

        // offsets are in input pixels, anchors in [0, 1]
        let raw = &boxes[i * stride..(i + 1) * stride];
        let offset = |dx: f32, dy: f32| {
            Point::new(
                (dx / in_w * anchor.w + anchor.x) as f64,
                (dy / in_h * anchor.h + anchor.y) as f64,
            )
        };

        let center = offset(raw[0], raw[1]);
        let w = (raw[2] / in_w * anchor.w) as f64;
        let h = (raw[3] / in_h * anchor.h) as f64;
        let keypoints = (0..options.keypoints)
            .map(|k| offset(raw[4 + 2 * k], raw[5 + 2 * k]))
            .collect();

        let bounds = Region::from_center(center, w, h)
            .with_keypoints(keypoints)
            .scale([img_w as f64, img_h as f64]);
        candidates.push(Detection { bounds, score });
    }

    let detections = suppress(candidates, options.overlap_threshold);
    trace!("Detected {} subjects", detections.len());

    Ok(detections)
}

fn suppress(mut candidates: Vec<Detection>, threshold: f64) -> Vec<Detection> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<Detection> = Vec::new();
    for candidate in candidates {
        let overlaps = kept
            .iter()
            .any(|k| k.bounds.iou(&candidate.bounds, IouMode::Clamped) > threshold);
        if !overlaps {
            kept.push(candidate);
        }
    }

    kept
}

#[derive(Debug, Clone)]
pub struct LandmarkerOptions {
    pub width: u32,
    pub height: u32,
    pub input_name: String,
    /// Flat `x, y, z` triples in input pixels
    pub keypoints_output: String,
    pub presence_output: String,
    /// Whether presence still needs a sigmoid
    pub presence_is_logit: bool,
    pub handedness_output: Option<String>,
    pub world_output: Option<String>,
}

impl LandmarkerOptions {
    pub fn hand() -> Self {
        Self {
            width: 224,
            height: 224,
            input_name: "input_1".to_string(),
            keypoints_output: "Identity".to_string(),
            presence_output: "Identity_1".to_string(),
            presence_is_logit: false,
            handedness_output: Some("Identity_2".to_string()),
            world_output: Some("Identity_3".to_string()),
        }
    }

    pub fn face() -> Self {
        Self {
            width: 192,
            height: 192,
            input_name: "input_1".to_string(),
            keypoints_output: "conv2d_21".to_string(),
            presence_output: "conv2d_31".to_string(),
            presence_is_logit: true,
            handedness_output: None,
            world_output: None,
        }
    }
}

pub struct OnnxLandmarker {
    model: Session,
    options: LandmarkerOptions,
}

impl OnnxLandmarker {
    pub fn new(path: &Path, threads: usize, options: LandmarkerOptions) -> Result<Self> {
        Ok(Self {
            model: initialize_model(path, threads)?,
            options,
        })
    }
}

impl Landmarker for OnnxLandmarker {
    fn input_size(&self) -> (u32, u32) {
        (self.options.width, self.options.height)
    }

    async fn predict(&mut self, input: Array4<f32>) -> Result<LandmarkPrediction> {
        let span = span!(Level::DEBUG, "onnx_landmarker");
        let _guard = span.enter();

        let options = &self.options;
        let outputs = self
            .model
            .run(ort::inputs![options.input_name.as_str() => Tensor::from_array(input)?]?)?;

        let keypoints = triples(&extract(&outputs, &options.keypoints_output)?)?;

        let presence = *extract(&outputs, &options.presence_output)?
            .first()
            .ok_or_else(|| anyhow!("empty presence output"))?;
        let presence = if options.presence_is_logit {
            sigmoid_stable(presence)
        } else {
            presence
        };

        let handedness = match &options.handedness_output {
            Some(name) => extract(&outputs, name)?.first().copied(),
            None => None,
        };
        let world = match &options.world_output {
            Some(name) => Some(triples(&extract(&outputs, name)?)?),
            None => None,
        };

        Ok(LandmarkPrediction {
            presence,
            keypoints,
            handedness,
            world,
        })
    }
}

fn triples(flat: &[f32]) -> Result<Vec<[f32; 3]>> {
    if flat.len() % 3 != 0 {
        return Err(anyhow!("{} values do not form xyz triples", flat.len()));
    }

    Ok(flat.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(keypoints: usize) -> DetectorOptions {
        DetectorOptions {
            keypoints,
            ..DetectorOptions::face()
        }
    }

    fn anchor(x: f32, y: f32) -> Anchor {
        Anchor { x, y, w: 1., h: 1. }
    }

    #[test]
    fn test_sigmoid() {
        assert_eq!(sigmoid_stable(0.), 0.5);
        assert!(sigmoid_stable(100.) > 0.999);
        assert!(sigmoid_stable(-100.) < 0.001);
    }

    #[test]
    fn test_decode_detection() {
        let anchors = [anchor(0.5, 0.5), anchor(0.25, 0.25)];
        // box offset by 8 input px to the right, 32x64 px, one keypoint
        let boxes = [
            8., 0., 32., 64., -16., 16., //
            0., 0., 10., 10., 0., 0.,
        ];
        let scores = [5., -5.];

        let detections =
            decode_detections(&boxes, &scores, &anchors, &options(1), (256, 512)).unwrap();
        assert_eq!(detections.len(), 1);

        // 128 px input on a 256x512 image: x doubles, y quadruples
        let d = &detections[0];
        let center = d.bounds.center();
        assert!((center.x - 144.).abs() < 1e-3);
        assert!((center.y - 256.).abs() < 1e-3);
        assert!((d.bounds.width() - 64.).abs() < 1e-3);
        assert!((d.bounds.height() - 256.).abs() < 1e-3);
        assert!((d.bounds.keypoints[0].x - 96.).abs() < 1e-3);
        assert!((d.bounds.keypoints[0].y - 320.).abs() < 1e-3);
        assert!(d.score > 0.99);
    }

    #[test]
    fn test_decode_rejects_bad_shape() {
        let anchors = [anchor(0.5, 0.5)];
        assert!(decode_detections(&[0.; 5], &[0.], &anchors, &options(1), (10, 10)).is_err());
    }

    #[test]
    fn test_suppress_keeps_strongest() {
        let anchors = [anchor(0.5, 0.5), anchor(0.5, 0.5), anchor(0.1, 0.1)];
        let boxes = [
            0., 0., 20., 20., //
            1., 1., 20., 20., //
            0., 0., 20., 20.,
        ];
        let scores = [2., 4., 3.];

        let detections =
            decode_detections(&boxes, &scores, &anchors, &options(0), (128, 128)).unwrap();
        assert_eq!(detections.len(), 2);
        assert!(detections[0].score > detections[1].score);
        assert!((detections[0].bounds.center().x - 65.).abs() < 1e-3);
        assert!((detections[1].bounds.center().x - 12.8).abs() < 1e-3);
    }

    #[test]
    fn test_triples() {
        assert_eq!(
            triples(&[1., 2., 3., 4., 5., 6.]).unwrap(),
            vec![[1., 2., 3.], [4., 5., 6.]]
        );
        assert!(triples(&[1., 2.]).is_err());
    }
}
