use super::point::{NormalizedPoint, Point};
use crate::error::{Error, Result};

/// Axis-aligned crop window in image pixels, plus the ordered keypoints it
/// was derived from. Keypoint order is meaningful (index 0 is the wrist for
/// hands, for example) and may be empty.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Region {
    pub start: Point,
    pub end: Point,
    pub keypoints: Vec<Point>,
}

/// Crop box in the `[y0, x0, y1, x1]` order the crop op takes, each value
/// divided by image height (y) or width (x).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedBox {
    pub y0: f64,
    pub x0: f64,
    pub y1: f64,
    pub x1: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IouMode {
    /// Intersection spans clamped at zero, disjoint boxes score 0
    #[default]
    Clamped,
    /// Raw product of the spans, which turns positive again for boxes
    /// disjoint on both axes
    Reference,
}

impl Region {
    pub fn new(start: Point, end: Point) -> Region {
        Region {
            start,
            end,
            keypoints: Vec::new(),
        }
    }

    pub fn from_center(center: Point, w: f64, h: f64) -> Region {
        Region::new(
            Point::new(center.x - w / 2., center.y - h / 2.),
            Point::new(center.x + w / 2., center.y + h / 2.),
        )
    }

    pub fn with_keypoints(mut self, keypoints: Vec<Point>) -> Region {
        self.keypoints = keypoints;
        self
    }

    pub fn width(&self) -> f64 {
        self.end.x - self.start.x
    }

    pub fn height(&self) -> f64 {
        self.end.y - self.start.y
    }

    pub fn size(&self) -> (f64, f64) {
        (self.width(), self.height())
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> Point {
        Point {
            x: (self.start.x + self.end.x) / 2.,
            y: (self.start.y + self.end.y) / 2.,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.width() > 0. && self.height() > 0.)
    }

    pub fn ensure_croppable(&self) -> Result<()> {
        if self.is_degenerate() {
            return Err(Error::DegenerateRegion {
                width: self.width(),
                height: self.height(),
            });
        }
        Ok(())
    }

    pub fn keypoint(&self, index: usize) -> Result<Point> {
        self.keypoints
            .get(index)
            .copied()
            .ok_or(Error::MissingKeypoint {
                index,
                len: self.keypoints.len(),
            })
    }

    /// Maps corners and keypoints between coordinate frames, e.g. from a
    /// resized inference input back to the source image.
    pub fn scale(&self, [sx, sy]: [f64; 2]) -> Region {
        let scale = |p: &Point| Point::new(p.x * sx, p.y * sy);

        Region {
            start: scale(&self.start),
            end: scale(&self.end),
            keypoints: self.keypoints.iter().map(scale).collect(),
        }
    }

    pub fn enlarge(&self, factor: f64) -> Region {
        let center = self.center();
        let (w, h) = self.size();

        Region::from_center(center, w * factor, h * factor).with_keypoints(self.keypoints.clone())
    }

    pub fn squarify(&self) -> Region {
        let side = self.width().max(self.height());

        Region::from_center(self.center(), side, side).with_keypoints(self.keypoints.clone())
    }

    /// Translates by `offset` expressed as a fraction of the region's size.
    pub fn shift(&self, [fx, fy]: [f64; 2]) -> Region {
        let delta = Point::new(self.width() * fx, self.height() * fy);

        Region {
            start: self.start + delta,
            end: self.end + delta,
            keypoints: self.keypoints.clone(),
        }
    }

    pub fn to_normalized(&self, width: u32, height: u32) -> NormalizedBox {
        let start = self.start.normalize(width, height);
        let end = self.end.normalize(width, height);

        NormalizedBox {
            y0: start.v,
            x0: start.u,
            y1: end.v,
            x1: end.u,
        }
    }

    pub fn iou(&self, other: &Region, mode: IouMode) -> f64 {
        let mut x_span = self.end.x.min(other.end.x) - self.start.x.max(other.start.x);
        let mut y_span = self.end.y.min(other.end.y) - self.start.y.max(other.start.y);

        if mode == IouMode::Clamped {
            x_span = x_span.max(0.);
            y_span = y_span.max(0.);
        }

        let intersection = x_span * y_span;
        let union = self.area() + other.area() - intersection;

        if union > 0. { intersection / union } else { 0. }
    }
}

impl NormalizedBox {
    pub fn to_pixels(&self, width: u32, height: u32) -> Region {
        let start = NormalizedPoint {
            u: self.x0,
            v: self.y0,
        };
        let end = NormalizedPoint {
            u: self.x1,
            v: self.y1,
        };

        Region::new(start.to_pixel(width, height), end.to_pixel(width, height))
    }
}

pub fn bounding_box_of(points: &[Point]) -> Result<Region> {
    let first = points.first().ok_or(Error::EmptyPointSet)?;

    let (start, end) = points
        .iter()
        .fold((*first, *first), |(min, max), p| {
            (
                Point::new(min.x.min(p.x), min.y.min(p.y)),
                Point::new(max.x.max(p.x), max.y.max(p.y)),
            )
        });

    Ok(Region::new(start, end))
}
