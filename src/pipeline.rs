use crate::config::TrackerConfig;
use crate::error::Result;
use crate::imgproc;
use crate::shapes::point::{Landmark, Point};
use crate::shapes::region::{Region, bounding_box_of};
use image::RgbImage;
use std::collections::BTreeMap;
use tracing::{Level, debug, span, trace};

pub mod detection;
pub mod landmarks;
pub mod model;
pub mod rotation;
pub mod tracking;

pub use detection::{Detection, Detector};
pub use landmarks::{LandmarkPrediction, Landmarker};
pub use rotation::RotationContext;
pub use tracking::{TrackingPhase, TrackingState};

use detection::{derive_region, strongest};
use landmarks::{extract_feature, project_keypoints};
use tracking::stabilize;

/// A subject tracked through one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Subject {
    /// Landmarks in image pixels
    pub landmarks: Vec<Landmark>,
    pub presence: f32,
    pub handedness: Option<f32>,
    /// Metric 3D landmarks, as the model reported them
    pub world: Option<Vec<[f32; 3]>>,
    /// Region the next frame is cropped from
    pub bounds: Region,
    /// Window this frame was cropped from, in the aligned frame
    pub crop: Region,
    /// Rotation applied to align the subject
    pub angle: f64,
    pub annotations: BTreeMap<String, Vec<Landmark>>,
}

pub struct Pipeline<D: Detector, L: Landmarker> {
    detector: D,
    landmarker: L,
    config: TrackerConfig,
    state: TrackingState,
}

impl<D: Detector, L: Landmarker> Pipeline<D, L> {
    pub fn new(detector: D, landmarker: L, config: TrackerConfig) -> Result<Pipeline<D, L>> {
        config.validate()?;

        Ok(Pipeline {
            detector,
            landmarker,
            config,
            state: TrackingState::new(),
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn state(&self) -> &TrackingState {
        &self.state
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn landmarker(&self) -> &L {
        &self.landmarker
    }

    /// Forgets every tracked subject; the next frame runs the detector.
    pub fn reset(&mut self) {
        self.state.clear();
    }

    /// Runs one frame. Frames must be passed in order; an empty result means
    /// no subject was found.
    pub async fn process(&mut self, img: &RgbImage) -> Result<Vec<Subject>> {
        let span = span!(Level::DEBUG, "pipeline");
        let _guard = span.enter();

        imgproc::ensure_frame(img)?;

        let phase = self
            .state
            .phase(self.config.max_subjects, self.config.max_continuous_checks);
        debug!("Phase {phase:?}");

        let fresh = match phase {
            TrackingPhase::NeedsDetector => {
                let detections = self.detector.detect(img).await?;
                if detections.is_empty() {
                    debug!("No subject detected");
                    self.state.clear();
                    return Ok(Vec::new());
                }

                let regions = strongest(detections, self.config.max_subjects)
                    .into_iter()
                    .map(|d| d.bounds)
                    .collect();
                self.state.replace(regions);
                true
            }
            TrackingPhase::Tracking => {
                self.state.skip_detector();
                false
            }
        };

        let regions = self.state.regions().to_vec();
        let mut subjects = Vec::with_capacity(regions.len());
        let mut next_regions = Vec::with_capacity(regions.len());

        for (slot, region) in regions.iter().enumerate() {
            let tracked = match self.track_region(img, region, fresh).await {
                Ok(tracked) => tracked,
                Err(e) => {
                    // a region that failed once fails every frame
                    self.state.clear();
                    return Err(e);
                }
            };

            match tracked {
                Some(subject) => {
                    next_regions.push(subject.bounds.clone());
                    subjects.push(subject);
                }
                None => debug!("Lost subject in slot {slot}"),
            }
        }

        if subjects.is_empty() {
            self.state.clear();
        } else {
            self.state.update(next_regions);
        }

        Ok(subjects)
    }

    async fn track_region(&mut self, img: &RgbImage, region: &Region, fresh: bool) -> Result<Option<Subject>> {
        let span = span!(Level::DEBUG, "track_region", fresh);
        let _guard = span.enter();

        let Self {
            landmarker, config, ..
        } = self;
        let derivation = if fresh { &config.fresh } else { &config.tracked };

        let ctx = RotationContext::for_region(region, derivation.rotation_keypoints)?;
        let aligned = imgproc::rotate(img, ctx.center, -ctx.angle);

        let crop = if fresh {
            derive_region(region, &ctx.align, derivation)?
        } else {
            region.clone()
        };

        let (input_w, input_h) = landmarker.input_size();
        let cropped = imgproc::crop_and_resize(
            &aligned,
            &crop.to_normalized(aligned.width(), aligned.height()),
            input_w,
            input_h,
        )?;
        let prediction = landmarker
            .predict(imgproc::to_tensor(&cropped, config.input_range))
            .await?;

        if prediction.presence < config.presence_threshold {
            debug!("Presence {:.3} below threshold", prediction.presence);
            return Ok(None);
        }

        let landmarks = project_keypoints(&prediction.keypoints, &crop, (input_w, input_h), &ctx);
        let points: Vec<Point> = landmarks.iter().map(Landmark::point).collect();

        let retained = match &config.retained_keypoints {
            Some(idxs) => extract_feature(&landmarks, idxs)?
                .iter()
                .map(Landmark::point)
                .collect(),
            None => points.clone(),
        };

        let candidate = bounding_box_of(&points)?
            .shift(config.tracked.shift)
            .squarify()
            .enlarge(config.tracked.enlarge)
            .with_keypoints(retained);
        if candidate.is_degenerate() {
            debug!("Landmarks collapsed to {:?}", candidate.size());
            return Ok(None);
        }

        let bounds = if fresh {
            candidate
        } else {
            stabilize(region, candidate, config.iou_threshold, config.iou_mode)
        };
        trace!("Next region {:?} -> {:?}", bounds.start, bounds.end);

        let annotations = config
            .annotations
            .iter()
            .map(|(name, idxs)| Ok((name.clone(), extract_feature(&landmarks, idxs)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;

        Ok(Some(Subject {
            landmarks,
            presence: prediction.presence,
            handedness: prediction.handedness,
            world: prediction.world,
            bounds,
            crop,
            angle: ctx.angle,
            annotations,
        }))
    }
}
