//! Input position types.

use glam::Vec3;

/// Types usable as input positions for mesh construction.
///
/// Implemented for `glam::Vec3` and plain arrays/tuples so callers can pass
/// their own point representations without converting first.
pub trait Vec3Like {
    fn x(&self) -> f32;
    fn y(&self) -> f32;
    fn z(&self) -> f32;
}

impl Vec3Like for Vec3 {
    #[inline]
    fn x(&self) -> f32 {
        self.x
    }

    #[inline]
    fn y(&self) -> f32 {
        self.y
    }

    #[inline]
    fn z(&self) -> f32 {
        self.z
    }
}

impl Vec3Like for [f32; 3] {
    #[inline]
    fn x(&self) -> f32 {
        self[0]
    }

    #[inline]
    fn y(&self) -> f32 {
        self[1]
    }

    #[inline]
    fn z(&self) -> f32 {
        self[2]
    }
}

impl Vec3Like for (f32, f32, f32) {
    #[inline]
    fn x(&self) -> f32 {
        self.0
    }

    #[inline]
    fn y(&self) -> f32 {
        self.1
    }

    #[inline]
    fn z(&self) -> f32 {
        self.2
    }
}
