use std::ops::{Add, AddAssign, Mul, Sub};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn len(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn from_angle(angle: f32) -> Self {
        Self::new(angle.cos(), angle.sin())
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}
impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}
impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}
impl Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// Axis-aligned rectangle centered at the scene origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneBounds {
    pub half_width: f32,
    pub half_height: f32,
}

impl SceneBounds {
    pub fn from_viewport(width: u32, height: u32) -> Self {
        Self {
            half_width: width as f32 * 0.5,
            half_height: height as f32 * 0.5,
        }
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x.abs() <= self.half_width && p.y.abs() <= self.half_height
    }
}

/// Row-major 2x3 affine transform. `apply` maps local coordinates to the
/// parent space: `x' = a*x + c*y + tx`, `y' = b*x + d*y + ty`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine2 {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Default for Affine2 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine2 {
    pub const IDENTITY: Affine2 = Affine2 {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    /// `self * rhs`: rhs is applied first.
    pub fn then(self, rhs: Affine2) -> Affine2 {
        Affine2 {
            a: self.a * rhs.a + self.c * rhs.b,
            b: self.b * rhs.a + self.d * rhs.b,
            c: self.a * rhs.c + self.c * rhs.d,
            d: self.b * rhs.c + self.d * rhs.d,
            tx: self.a * rhs.tx + self.c * rhs.ty + self.tx,
            ty: self.b * rhs.tx + self.d * rhs.ty + self.ty,
        }
    }

    pub fn translate(self, x: f32, y: f32) -> Affine2 {
        self.then(Affine2 {
            tx: x,
            ty: y,
            ..Affine2::IDENTITY
        })
    }

    pub fn rotate(self, angle: f32) -> Affine2 {
        let (s, c) = angle.sin_cos();
        self.then(Affine2 {
            a: c,
            b: s,
            c: -s,
            d: c,
            tx: 0.0,
            ty: 0.0,
        })
    }

    pub fn scale(self, sx: f32, sy: f32) -> Affine2 {
        self.then(Affine2 {
            a: sx,
            d: sy,
            ..Affine2::IDENTITY
        })
    }

    pub fn apply(&self, p: Vec2) -> Vec2 {
        Vec2::new(
            self.a * p.x + self.c * p.y + self.tx,
            self.b * p.x + self.d * p.y + self.ty,
        )
    }

    /// None when the transform collapses an axis (e.g. mid-flip scale of 0).
    pub fn inverse(&self) -> Option<Affine2> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() <= 1e-9 {
            return None;
        }
        let inv = 1.0 / det;
        let a = self.d * inv;
        let b = -self.b * inv;
        let c = -self.c * inv;
        let d = self.a * inv;
        Some(Affine2 {
            a,
            b,
            c,
            d,
            tx: -(a * self.tx + c * self.ty),
            ty: -(b * self.tx + d * self.ty),
        })
    }
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

// Tiny hash noise for water shimmer.
pub fn hash2(mut x: i32, mut y: i32, seed: u32) -> u32 {
    x ^= (seed as i32).wrapping_mul(374761393);
    y ^= (seed as i32).wrapping_mul(668265263);
    let mut n = (x as u32).wrapping_mul(2654435761) ^ (y as u32).wrapping_mul(2246822519);
    n ^= n >> 13;
    n = n.wrapping_mul(3266489917);
    n ^= n >> 16;
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn close(a: Vec2, b: Vec2) -> bool {
        (a - b).len() < 1e-4
    }

    #[test]
    fn composed_transform_applies_innermost_first() {
        let xf = Affine2::IDENTITY.translate(10.0, 5.0).rotate(FRAC_PI_2).scale(2.0, 1.0);
        // scale -> (2, 0), rotate 90deg -> (0, 2), translate -> (10, 7)
        assert!(close(xf.apply(Vec2::new(1.0, 0.0)), Vec2::new(10.0, 7.0)));
    }

    #[test]
    fn inverse_round_trips_and_rejects_collapsed_axes() {
        let xf = Affine2::IDENTITY.translate(-3.0, 4.0).rotate(0.7).scale(1.5, -0.5);
        let inv = xf.inverse().expect("invertible");
        let p = Vec2::new(2.5, -1.25);
        assert!(close(inv.apply(xf.apply(p)), p));

        assert!(Affine2::IDENTITY.scale(0.0, 1.0).inverse().is_none());
    }

    #[test]
    fn bounds_are_half_the_viewport() {
        let b = SceneBounds::from_viewport(800, 600);
        assert_eq!(b.half_width, 400.0);
        assert_eq!(b.half_height, 300.0);
        assert!(b.contains(Vec2::new(-400.0, 300.0)));
        assert!(!b.contains(Vec2::new(0.0, 300.5)));
    }
}
