use crate::config::RegionDerivation;
use crate::error::Result;
use crate::shapes::affine::Affine;
use crate::shapes::point::Point;
use crate::shapes::region::{Region, bounding_box_of};
use image::RgbImage;

pub mod anchors;

/// One subject found by a whole-frame detector. The detector's sparse
/// keypoints (palm points, eyes and nose, ...) ride on `bounds`.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bounds: Region,
    pub score: f32,
}

#[allow(async_fn_in_trait)]
pub trait Detector {
    /// Image-space detections; an empty list means nothing was found.
    async fn detect(&mut self, img: &RgbImage) -> anyhow::Result<Vec<Detection>>;
}

/// Crop window for a region seen in the aligned frame: keypoints are moved
/// into that frame with `align`, boxed, shifted, squared and enlarged.
/// Regions without keypoints are boxed by their own corners.
pub fn derive_region(region: &Region, align: &Affine, derivation: &RegionDerivation) -> Result<Region> {
    let bounds = if region.keypoints.is_empty() {
        let corners = [region.start, region.end].map(|p| align.apply(p));
        bounding_box_of(&corners)?
    } else {
        let aligned: Vec<Point> = region.keypoints.iter().map(|p| align.apply(*p)).collect();
        bounding_box_of(&aligned)?
    };

    Ok(bounds
        .shift(derivation.shift)
        .squarify()
        .enlarge(derivation.enlarge)
        .with_keypoints(region.keypoints.clone()))
}

/// Highest scoring detections first, at most `max` of them.
pub fn strongest(mut detections: Vec<Detection>, max: usize) -> Vec<Detection> {
    detections.sort_by(|a, b| b.score.total_cmp(&a.score));
    detections.truncate(max);
    detections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::rotation::RotationContext;
    use std::f64::consts::{FRAC_PI_2, SQRT_2};

    fn detection(score: f32) -> Detection {
        Detection {
            bounds: Region::new(Point::new(0., 0.), Point::new(1., 1.)),
            score,
        }
    }

    #[test]
    fn test_diagonal_detection() {
        let region = Region::new(Point::new(10., 10.), Point::new(50., 50.))
            .with_keypoints(vec![Point::new(20., 20.), Point::new(40., 40.)]);
        let derivation = RegionDerivation {
            shift: [0., -0.1],
            enlarge: 1.5,
            rotation_keypoints: (0, 1),
        };

        let ctx = RotationContext::for_region(&region, (0, 1)).unwrap();
        let expected_angle = FRAC_PI_2 - (-20f64).atan2(20.);
        assert!((ctx.angle - expected_angle).abs() < 1e-9);

        let crop = derive_region(&region, &ctx.align, &derivation).unwrap();

        // the keypoints stand 20√2 apart on a vertical line through x = 30
        let span = 20. * SQRT_2;
        let center = crop.center();
        assert!((center.x - 30.).abs() < 1e-9);
        assert!((center.y - (30. - 0.1 * span)).abs() < 1e-9);
        assert!((crop.width() - 1.5 * span).abs() < 1e-9);
        assert!((crop.height() - 1.5 * span).abs() < 1e-9);
        assert_eq!(crop.keypoints, region.keypoints);
    }

    #[test]
    fn test_upright_detection_is_not_rotated() {
        let region = Region::new(Point::new(0., 0.), Point::new(10., 10.))
            .with_keypoints(vec![Point::new(5., 8.), Point::new(5., 2.), Point::new(2., 5.)]);
        let derivation = RegionDerivation {
            shift: [0., 0.],
            enlarge: 2.,
            rotation_keypoints: (0, 1),
        };

        let ctx = RotationContext::for_region(&region, (0, 1)).unwrap();
        assert!(ctx.angle.abs() < 1e-12);

        let crop = derive_region(&region, &ctx.align, &derivation).unwrap();
        // keypoint bounds are 3x6 around (3.5, 5)
        assert!((crop.center().x - 3.5).abs() < 1e-9);
        assert!((crop.center().y - 5.).abs() < 1e-9);
        assert!((crop.width() - 12.).abs() < 1e-9);
    }

    #[test]
    fn test_region_without_keypoints() {
        let region = Region::new(Point::new(10., 20.), Point::new(30., 30.));
        let derivation = RegionDerivation {
            shift: [0., 0.],
            enlarge: 1.5,
            rotation_keypoints: (0, 1),
        };

        let crop = derive_region(&region, &Affine::identity(), &derivation).unwrap();
        assert_eq!(crop.center(), region.center());
        assert!((crop.width() - 30.).abs() < 1e-9);
        assert!((crop.height() - 30.).abs() < 1e-9);
    }

    #[test]
    fn test_strongest() {
        let picked = strongest(vec![detection(0.2), detection(0.9), detection(0.5)], 2);
        let scores: Vec<f32> = picked.iter().map(|d| d.score).collect();
        assert_eq!(scores, vec![0.9, 0.5]);
    }
}
