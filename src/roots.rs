//! Most-positive-root solvers for the extrapolation polynomials.
//!
//! Outer cells reduce a query to a cubic or quadratic in the offset
//! parameter `t`; the relevant intersection is always the farthest one
//! along the outward normals, so both solvers return the largest real root.

use glam::Vec3;

use crate::delaunay::constants::EPS;

/// Real roots of the monic cubic `t^3 + a*t^2 + b*t + c = 0`.
///
/// Trigonometric form of Cardano. Returns the number of real roots written
/// to `result`; a near-zero imaginary pair counts as a repeated real root.
fn cubic_roots(result: &mut [f64; 3], a: f64, b: f64, c: f64, eps: f64) -> usize {
    let a2 = a * a;
    let q = (a2 - 3.0 * b) / 9.0;
    let r = (a * (2.0 * a2 - 9.0 * b) + 27.0 * c) / 54.0;
    let r2 = r * r;
    let q3 = q * q * q;

    if r2 <= q3 + eps {
        let t = (r / q3.sqrt()).clamp(-1.0, 1.0).acos();
        let shift = a / 3.0;
        let scale = -2.0 * q.sqrt();
        result[0] = scale * (t / 3.0).cos() - shift;
        result[1] = scale * ((t + 2.0 * std::f64::consts::PI) / 3.0).cos() - shift;
        result[2] = scale * ((t - 2.0 * std::f64::consts::PI) / 3.0).cos() - shift;
        3
    } else {
        let mut big_a = -(r.abs() + (r2 - q3).sqrt()).cbrt();
        if r < 0.0 {
            big_a = -big_a;
        }
        let big_b = if big_a == 0.0 { 0.0 } else { q / big_a };

        let shift = a / 3.0;
        result[0] = (big_a + big_b) - shift;
        result[1] = -0.5 * (big_a + big_b) - shift;
        // Imaginary magnitude of the complex pair; if it vanishes the pair
        // collapses onto the real axis as a repeated root.
        result[2] = 0.5 * 3.0f64.sqrt() * (big_a - big_b);
        if result[2].abs() < eps {
            result[2] = result[1];
            2
        } else {
            1
        }
    }
}

/// Largest real root of `t^3 + a*t^2 + b*t + c = 0` with `(a, b, c)` packed
/// into a vector.
pub(crate) fn solve_cubic(coeffs: Vec3) -> f32 {
    let mut roots = [0.0f64; 3];
    let count = cubic_roots(
        &mut roots,
        coeffs.x as f64,
        coeffs.y as f64,
        coeffs.z as f64,
        EPS,
    );
    roots[..count]
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max) as f32
}

/// Largest real root of `a*t^2 + b*t + c = 0`, falling back to the linear
/// solution when `a` vanishes.
pub(crate) fn solve_quadratic(coeffs: Vec3) -> f32 {
    let a = coeffs.x;
    let b = coeffs.y;
    let c = coeffs.z;
    if a.abs() < EPS as f32 {
        return -c / b;
    }

    let d = (b * b - 4.0 * a * c).max(0.0);

    // The +sqrt branch is the larger root for positive `a`, the -sqrt
    // branch for negative `a`.
    if a > 0.0 {
        (-b + d.sqrt()) / (2.0 * a)
    } else {
        (-b - d.sqrt()) / (2.0 * a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cubic_three_roots() {
        // (t - 1)(t - 2)(t - 3) = t^3 - 6t^2 + 11t - 6
        let root = solve_cubic(Vec3::new(-6.0, 11.0, -6.0));
        assert!((root - 3.0).abs() < 1e-4, "root = {root}");
    }

    #[test]
    fn test_cubic_single_root() {
        // t^3 - 1 has one real root.
        let root = solve_cubic(Vec3::new(0.0, 0.0, -1.0));
        assert!((root - 1.0).abs() < 1e-4, "root = {root}");
    }

    #[test]
    fn test_cubic_repeated_root() {
        // (t - 1)^2 (t + 2) = t^3 - 3t + 2; largest root is 1.
        let root = solve_cubic(Vec3::new(0.0, -3.0, 2.0));
        assert!((root - 1.0).abs() < 1e-3, "root = {root}");
    }

    #[test]
    fn test_quadratic_largest_root() {
        // (t - 2)(t + 3) = t^2 + t - 6
        let root = solve_quadratic(Vec3::new(1.0, 1.0, -6.0));
        assert!((root - 2.0).abs() < 1e-5, "root = {root}");

        // Negated coefficients describe the same equation.
        let root = solve_quadratic(Vec3::new(-1.0, -1.0, 6.0));
        assert!((root - 2.0).abs() < 1e-5, "root = {root}");
    }

    #[test]
    fn test_quadratic_linear_fallback() {
        let root = solve_quadratic(Vec3::new(0.0, 2.0, -4.0));
        assert!((root - 2.0).abs() < 1e-5, "root = {root}");
    }
}
