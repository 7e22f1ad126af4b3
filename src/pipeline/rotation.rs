use crate::error::Result;
use crate::shapes::affine::Affine;
use crate::shapes::point::{Point, rotation_angle};
use crate::shapes::region::Region;

/// Per-frame alignment of one region: the frame is rotated by `-angle`
/// about `center` so the region's key axis points up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationContext {
    pub angle: f64,
    pub center: Point,
    /// Image space -> aligned space
    pub align: Affine,
    /// Aligned space -> image space
    pub restore: Affine,
}

impl RotationContext {
    pub fn new(angle: f64, center: Point) -> RotationContext {
        let align = Affine::rotation(-angle, center);

        RotationContext {
            angle,
            center,
            align,
            restore: align.invert(),
        }
    }

    /// Regions without keypoints are left unrotated.
    pub fn for_region(region: &Region, (from, to): (usize, usize)) -> Result<RotationContext> {
        let angle = if region.keypoints.is_empty() {
            0.
        } else {
            rotation_angle(region.keypoint(from)?, region.keypoint(to)?)
        };

        Ok(RotationContext::new(angle, region.center()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_align_then_restore() {
        let ctx = RotationContext::new(1.2, Point::new(40., 80.));
        let p = Point::new(3., -9.);
        let back = ctx.restore.apply(ctx.align.apply(p));
        assert!((back.x - p.x).abs() < 1e-6);
        assert!((back.y - p.y).abs() < 1e-6);
    }

    #[test]
    fn test_for_region() {
        let region = Region::new(Point::new(0., 0.), Point::new(20., 20.))
            .with_keypoints(vec![Point::new(10., 10.), Point::new(20., 10.)]);
        let ctx = RotationContext::for_region(&region, (0, 1)).unwrap();
        assert!((ctx.angle - FRAC_PI_2).abs() < 1e-9);
        assert_eq!(ctx.center, Point::new(10., 10.));

        // aligned keypoints stack vertically
        let a = ctx.align.apply(region.keypoints[0]);
        let b = ctx.align.apply(region.keypoints[1]);
        assert!((a.x - b.x).abs() < 1e-9);
        assert!(b.y < a.y);
    }

    #[test]
    fn test_for_region_without_keypoints() {
        let region = Region::new(Point::new(0., 0.), Point::new(4., 4.));
        let ctx = RotationContext::for_region(&region, (0, 1)).unwrap();
        assert_eq!(ctx.angle, 0.);
        assert!(ctx.align.approx_eq(&Affine::identity(), 1e-12));
    }

    #[test]
    fn test_for_region_missing_keypoint() {
        let region = Region::new(Point::new(0., 0.), Point::new(4., 4.))
            .with_keypoints(vec![Point::new(1., 1.)]);
        assert!(matches!(
            RotationContext::for_region(&region, (0, 5)),
            Err(Error::MissingKeypoint { index: 5, len: 1 })
        ));
    }
}
