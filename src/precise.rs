//! Double-precision geometric kernels.
//!
//! The public mesh and its queries work in f32; circumsphere predicates
//! drive removal decisions during incremental construction and are far more
//! sensitive to rounding, so they run in f64 throughout.

use glam::{DVec3, Vec3};

/// Sphere with double-precision center and radius.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreciseSphere {
    pub center: DVec3,
    pub radius: f64,
}

impl PreciseSphere {
    /// Signed distance from a position to the sphere surface.
    ///
    /// Negative inside, positive outside.
    #[inline]
    pub fn distance(&self, position: Vec3) -> f64 {
        let dist_squared = (position.as_dvec3() - self.center).length_squared();
        dist_squared.sqrt() - self.radius
    }
}

/// 3x3 determinant of three column vectors.
#[inline]
pub(crate) fn det3(a: DVec3, b: DVec3, c: DVec3) -> f64 {
    a.dot(b.cross(c))
}

/// Rounding-error bound for `det3` on the given operands.
///
/// `|det(a,b,c)| <= sum_i |a_i| * (|b_j||c_k| + |b_k||c_j|)`, scaled by a
/// safety multiplier for the f64 expansion. Determinants below this bound
/// are indistinguishable from zero.
#[inline]
fn det3_err_bound(a: DVec3, b: DVec3, c: DVec3) -> f64 {
    let aa = a.abs();
    let ab = b.abs();
    let ac = c.abs();

    let m = aa.x * (ab.y * ac.z + ab.z * ac.y)
        + aa.y * (ab.x * ac.z + ab.z * ac.x)
        + aa.z * (ab.x * ac.y + ab.y * ac.x);

    let k = 64.0;
    k * f64::EPSILON * m
}

/// Circumsphere of four points.
///
/// Solves the 3x3 system `2*(pi - p0) . c = |pi|^2 - |p0|^2` by Cramer's
/// rule. A degenerate (coplanar) tetrahedron yields an infinite radius: its
/// circumsphere is effectively a half-space, so the next insertion swallows
/// and retriangulates it instead of walking into garbage coordinates.
pub(crate) fn circumsphere(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3) -> PreciseSphere {
    let q0 = p0.as_dvec3();
    let q1 = p1.as_dvec3();
    let q2 = p2.as_dvec3();
    let q3 = p3.as_dvec3();

    let r1 = (q1 - q0) * 2.0;
    let r2 = (q2 - q0) * 2.0;
    let r3 = (q3 - q0) * 2.0;
    let rhs = DVec3::new(
        q1.length_squared() - q0.length_squared(),
        q2.length_squared() - q0.length_squared(),
        q3.length_squared() - q0.length_squared(),
    );

    // Columns of the row-built system; det(M) == det(M^T).
    let cx = DVec3::new(r1.x, r2.x, r3.x);
    let cy = DVec3::new(r1.y, r2.y, r3.y);
    let cz = DVec3::new(r1.z, r2.z, r3.z);

    let det = det3(cx, cy, cz);
    if det.abs() <= det3_err_bound(cx, cy, cz) {
        return PreciseSphere {
            center: q0,
            radius: f64::INFINITY,
        };
    }

    let center = DVec3::new(
        det3(rhs, cy, cz),
        det3(cx, rhs, cz),
        det3(cx, cy, rhs),
    ) / det;

    PreciseSphere {
        center,
        radius: (q0 - center).length(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circumsphere_unit_corner() {
        let sphere = circumsphere(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
        );

        let expected = DVec3::splat(0.5);
        assert!((sphere.center - expected).length() < 1e-12);
        assert!((sphere.radius - 0.75f64.sqrt()).abs() < 1e-12);

        // All four corners lie on the sphere.
        for p in [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
        ] {
            assert!(sphere.distance(p).abs() < 1e-6);
        }
    }

    #[test]
    fn test_circumsphere_degenerate() {
        // Four coplanar points have no finite circumsphere.
        let sphere = circumsphere(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
        );
        assert!(sphere.radius.is_infinite());
    }
}
