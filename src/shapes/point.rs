use std::f64::consts::{FRAC_PI_2, PI, TAU};
use std::ops::{Add, Mul, Sub};

/// Position in image pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Position relative to image dimensions, both axes in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NormalizedPoint {
    pub u: f64,
    pub v: f64,
}

/// Image-space keypoint with the model's depth value carried along.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Point {
        Point { x, y }
    }

    pub fn rotate(&self, origin: Point, theta: f64) -> Point {
        let x = self.x - origin.x;
        let y = self.y - origin.y;
        let (sin, cos) = theta.sin_cos();

        Point {
            x: x * cos - y * sin + origin.x,
            y: x * sin + y * cos + origin.y,
        }
    }

    pub fn normalize(&self, width: u32, height: u32) -> NormalizedPoint {
        NormalizedPoint {
            u: self.x / width as f64,
            v: self.y / height as f64,
        }
    }
}

impl NormalizedPoint {
    pub fn to_pixel(&self, width: u32, height: u32) -> Point {
        Point {
            x: self.u * width as f64,
            y: self.v * height as f64,
        }
    }
}

impl Landmark {
    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

impl From<Landmark> for Point {
    fn from(l: Landmark) -> Point {
        l.point()
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, o: Point) -> Point {
        Point::new(self.x + o.x, self.y + o.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, o: Point) -> Point {
        Point::new(self.x - o.x, self.y - o.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;

    fn mul(self, f: f64) -> Point {
        Point::new(self.x * f, self.y * f)
    }
}

/// Wraps an angle into (-π, π].
pub fn normalize_radians(angle: f64) -> f64 {
    let mut wrapped = angle - TAU * ((angle + PI) / TAU).floor();
    // floor() lands exact odd multiples of π on -π
    if wrapped <= -PI {
        wrapped += TAU;
    } else if wrapped > PI {
        wrapped -= TAU;
    }
    wrapped
}

/// Angle which, applied as a rotation of -angle, points the vector a -> b
/// straight up in image space.
pub fn rotation_angle(a: Point, b: Point) -> f64 {
    normalize_radians(FRAC_PI_2 - (-(b.y - a.y)).atan2(b.x - a.x))
}
