use super::rotation::RotationContext;
use crate::error::{Error, Result};
use crate::shapes::affine::Affine;
use crate::shapes::point::{Landmark, Point};
use crate::shapes::region::Region;
use ndarray::Array4;

/// Raw landmark model output. Keypoints are `[x, y, z]` in model input
/// pixels.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LandmarkPrediction {
    pub presence: f32,
    pub keypoints: Vec<[f32; 3]>,
    pub handedness: Option<f32>,
    pub world: Option<Vec<[f32; 3]>>,
}

#[allow(async_fn_in_trait)]
pub trait Landmarker {
    /// Width and height the model expects
    fn input_size(&self) -> (u32, u32);

    async fn predict(&mut self, input: Array4<f32>) -> anyhow::Result<LandmarkPrediction>;
}

/// Maps keypoints predicted on a crop of the aligned frame back to the
/// original image. `crop` is in aligned coordinates, `input` is the model
/// input size the crop was resized to.
pub fn project_keypoints(
    raw: &[[f32; 3]],
    crop: &Region,
    (input_w, input_h): (u32, u32),
    rotation: &RotationContext,
) -> Vec<Landmark> {
    let x_scale = crop.width() / input_w as f64;
    let y_scale = crop.height() / input_h as f64;
    let half = Point::new(input_w as f64 / 2., input_h as f64 / 2.);

    let unrotate = Affine::rotation(rotation.angle, Point::default());
    let origin = rotation.restore.apply(crop.center());

    raw.iter()
        .map(|&[x, y, z]| {
            let centered = Point::new(x as f64, y as f64) - half;
            let scaled = Point::new(centered.x * x_scale, centered.y * y_scale);
            let p = unrotate.apply(scaled) + origin;

            Landmark { x: p.x, y: p.y, z: z as f64 }
        })
        .collect()
}

pub fn extract_feature(landmarks: &[Landmark], kpt_idxs: &[usize]) -> Result<Vec<Landmark>> {
    kpt_idxs
        .iter()
        .map(|&index| {
            landmarks.get(index).copied().ok_or(Error::MissingKeypoint {
                index,
                len: landmarks.len(),
            })
        })
        .collect()
}
