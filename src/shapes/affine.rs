use super::point::Point;
use std::ops::Mul;

/// Homogeneous 2D transform, rows of a 3x3 matrix with the last row
/// fixed at [0, 0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub m: [[f64; 3]; 2],
}

impl Affine {
    pub fn identity() -> Affine {
        Affine {
            m: [[1., 0., 0.], [0., 1., 0.]],
        }
    }

    pub fn translation(dx: f64, dy: f64) -> Affine {
        Affine {
            m: [[1., 0., dx], [0., 1., dy]],
        }
    }

    /// Rotation by `theta` about `center`, matching `Point::rotate`.
    pub fn rotation(theta: f64, center: Point) -> Affine {
        let (sin, cos) = theta.sin_cos();
        let rotate = Affine {
            m: [[cos, -sin, 0.], [sin, cos, 0.]],
        };

        Affine::translation(center.x, center.y) * rotate * Affine::translation(-center.x, -center.y)
    }

    /// Inverse for rotation + translation matrices: the rotation block is
    /// orthogonal, so R⁻¹ = Rᵀ and t' = -Rᵀt.
    pub fn invert(&self) -> Affine {
        let [[a, b, tx], [c, d, ty]] = self.m;

        Affine {
            m: [
                [a, c, -(a * tx + c * ty)],
                [b, d, -(b * tx + d * ty)],
            ],
        }
    }

    pub fn apply(&self, p: Point) -> Point {
        let [[a, b, tx], [c, d, ty]] = self.m;
        Point {
            x: a * p.x + b * p.y + tx,
            y: c * p.x + d * p.y + ty,
        }
    }

    pub fn approx_eq(&self, o: &Affine, eps: f64) -> bool {
        self.m
            .iter()
            .flatten()
            .zip(o.m.iter().flatten())
            .all(|(a, b)| (a - b).abs() < eps)
    }
}

impl Mul for Affine {
    type Output = Affine;

    // self applied after rhs
    fn mul(self, rhs: Affine) -> Affine {
        let l = self.m;
        let r = rhs.m;
        let mut m = [[0.; 3]; 2];
        for row in 0..2 {
            for col in 0..3 {
                m[row][col] = l[row][0] * r[0][col] + l[row][1] * r[1][col];
            }
            m[row][2] += l[row][2];
        }

        Affine { m }
    }
}
