//! Tetrahedral mesh storage and interpolation queries.

use std::ops::{Add, Mul};

use glam::{Affine3A, Mat3, Vec3, Vec4};
use rustc_hash::FxHashSet;

use crate::precise::{circumsphere, PreciseSphere};
use crate::roots::{solve_cubic, solve_quadratic};
use crate::surface::TriangleFace;

/// Sentinel index meaning "no vertex" or "no neighbor".
pub const NO_INDEX: u32 = u32::MAX;

/// Tetrahedron with adjacency and a precomputed barycentric matrix.
///
/// Inner tetrahedra hold four real vertex indices. Outer tetrahedra hold a
/// hull triangle in slots 0..3 and one of the infinity sentinels in slot 3,
/// selecting the polynomial degree used for extrapolation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tetrahedron {
    /// Vertex indices.
    pub vertices: [u32; 4],
    /// Neighbor `k` shares the face opposite vertex `k`; `NO_INDEX` if open.
    pub neighbors: [u32; 4],
    /// Maps a query position to barycentric coordinates (inner) or to
    /// polynomial coefficients (outer).
    pub matrix: Affine3A,
}

impl Tetrahedron {
    /// Slot 3 sentinel of outer tetrahedra solved with the cubic.
    pub const INFINITY3: u32 = u32::MAX;
    /// Slot 3 sentinel of outer tetrahedra solved with the quadratic.
    pub const INFINITY2: u32 = u32::MAX - 1;

    pub(crate) fn new(vertices: [u32; 4]) -> Self {
        Self {
            vertices,
            neighbors: [NO_INDEX; 4],
            matrix: Affine3A::IDENTITY,
        }
    }

    /// Vertex indices of the face opposite vertex `face_index`, preserving
    /// their relative order.
    pub fn face_indices(&self, face_index: usize) -> [u32; 3] {
        let mut indices = [0u32; 3];
        let mut j = 0;
        for i in 0..4 {
            if i != face_index {
                indices[j] = self.vertices[i];
                j += 1;
            }
        }
        indices
    }

    /// Boundary triangle for the face opposite vertex `face_index`.
    /// Adjacency on the returned triangle is left unset.
    pub fn face(&self, face_index: usize, tet: u32, tet_face: u32) -> TriangleFace {
        TriangleFace {
            indices: self.face_indices(face_index),
            unused: self.vertices[face_index],
            tet,
            tet_face,
            ..Default::default()
        }
    }

    /// Face slot whose neighbor is the given tetrahedron, or 4 if absent.
    pub fn neighbor_slot(&self, tet: u32) -> usize {
        self.neighbors.iter().position(|&n| n == tet).unwrap_or(4)
    }

    /// Whether the tetrahedron lists the given neighbor.
    #[inline]
    pub fn has_neighbor(&self, tet: u32) -> bool {
        self.neighbor_slot(tet) < 4
    }

    /// Precompute the inverse edge matrix that converts a query position to
    /// barycentric coordinates.
    pub(crate) fn update_inner_matrix(&mut self, vertices: &[Vec3]) {
        let p0 = vertices[self.vertices[0] as usize];
        let p1 = vertices[self.vertices[1] as usize];
        let p2 = vertices[self.vertices[2] as usize];
        let p3 = vertices[self.vertices[3] as usize];
        let edges = Mat3::from_cols(p1 - p0, p2 - p0, p3 - p0);
        self.matrix = Affine3A::from_mat3_translation(edges.inverse(), Vec3::ZERO);
    }
}

/// Tetrahedral interpolation mesh over a point set.
///
/// The first `num_inner` tetrahedra tile the convex hull of the accepted
/// vertices; the remaining tetrahedra extend each hull face outward so that
/// queries anywhere in space resolve to finite weights.
#[derive(Debug, Clone, Default)]
pub struct TetrahedralMesh {
    /// Vertices, in input order.
    pub vertices: Vec<Vec3>,
    /// Inner tetrahedra followed by outer tetrahedra.
    pub tetrahedra: Vec<Tetrahedron>,
    /// Per-vertex outward unit normal; zero for vertices not on the hull.
    pub hull_normals: Vec<Vec3>,
    /// Input vertices that could not be inserted (duplicates, degenerate
    /// configurations) or lost their cells during clean-up. Queries near
    /// them resolve against the surrounding mesh.
    pub ignored_vertices: Vec<u32>,
    /// Tetrahedra below this index are inner.
    pub num_inner: usize,
}

impl TetrahedralMesh {
    /// Circumsphere of an inner tetrahedron, in double precision.
    pub fn circumsphere(&self, tet_index: usize) -> PreciseSphere {
        debug_assert!(tet_index < self.num_inner);
        let tet = &self.tetrahedra[tet_index];
        circumsphere(
            self.vertices[tet.vertices[0] as usize],
            self.vertices[tet.vertices[1] as usize],
            self.vertices[tet.vertices[2] as usize],
            self.vertices[tet.vertices[3] as usize],
        )
    }

    /// Barycentric coordinates within an inner tetrahedron. Components are
    /// non-negative iff the position is inside.
    pub fn inner_barycentric(&self, tet_index: usize, position: Vec3) -> Vec4 {
        let tet = &self.tetrahedra[tet_index];
        let base = self.vertices[tet.vertices[0] as usize];
        let coords = tet.matrix.transform_point3(position - base);
        Vec4::new(
            1.0 - coords.x - coords.y - coords.z,
            coords.x,
            coords.y,
            coords.z,
        )
    }

    /// Extrapolation weights within an outer tetrahedron.
    ///
    /// Positions on the inner side of the base triangle return the sentinel
    /// `(0, 0, 0, -1)` so that the walk steps back into the mesh.
    pub fn outer_barycentric(&self, tet_index: usize, position: Vec3) -> Vec4 {
        let tet = &self.tetrahedra[tet_index];
        let p1 = self.vertices[tet.vertices[0] as usize];
        let p2 = self.vertices[tet.vertices[1] as usize];
        let p3 = self.vertices[tet.vertices[2] as usize];
        let normal = (p2 - p1).cross(p3 - p1);

        if normal.dot(position - p1) < 0.0 {
            return Vec4::new(0.0, 0.0, 0.0, -1.0);
        }

        let poly = tet.matrix.transform_point3(position);
        let t = if tet.vertices[3] == Tetrahedron::INFINITY3 {
            solve_cubic(poly)
        } else {
            solve_quadratic(poly)
        };

        let t1 = p1 + t * self.hull_normals[tet.vertices[0] as usize];
        let t2 = p2 + t * self.hull_normals[tet.vertices[1] as usize];
        let t3 = p3 + t * self.hull_normals[tet.vertices[2] as usize];
        let coords = triangle_barycentric(position, t1, t2, t3);
        Vec4::new(coords.x, coords.y, coords.z, 0.0)
    }

    /// Barycentric coordinates for any tetrahedron.
    pub fn barycentric(&self, tet_index: usize, position: Vec3) -> Vec4 {
        if tet_index < self.num_inner {
            self.inner_barycentric(tet_index, position)
        } else {
            self.outer_barycentric(tet_index, position)
        }
    }

    /// Find the tetrahedron containing the position and return its
    /// interpolation weights.
    ///
    /// `hint` is the starting tetrahedron and is updated to the located
    /// one, so spatially coherent query sequences walk only a few steps.
    /// Each caller thread should own its hint. An empty mesh yields zero
    /// weights.
    pub fn interpolation_factors(&self, position: Vec3, hint: &mut u32) -> Vec4 {
        self.locate(position, hint).0
    }

    /// Walk implementation; also reports the number of steps taken.
    pub(crate) fn locate(&self, position: Vec3, hint: &mut u32) -> (Vec4, usize) {
        if self.tetrahedra.is_empty() {
            return (Vec4::ZERO, 0);
        }

        let max_steps = self.tetrahedra.len();
        if *hint as usize >= max_steps {
            *hint = 0;
        }

        for step in 0..max_steps {
            let weights = self.barycentric(*hint as usize, position);
            if weights.min_element() >= 0.0 {
                return (weights, step);
            }

            // Step through the face opposite the most negative component;
            // the lowest slot wins ties.
            let mut worst = 0;
            for k in 1..4 {
                if weights[k] < weights[worst] {
                    worst = k;
                }
            }

            let next = self.tetrahedra[*hint as usize].neighbors[worst];
            if next == NO_INDEX {
                // The walk left the mesh.
                return (weights, step);
            }
            *hint = next;
        }

        (self.barycentric(*hint as usize, position), max_steps)
    }

    /// Interpolate per-vertex data at a position.
    ///
    /// `values` is indexed by vertex id. The sentinel slot of an outer
    /// tetrahedron carries no data and is skipped.
    pub fn sample<T>(&self, values: &[T], position: Vec3, hint: &mut u32) -> T
    where
        T: Copy + Default + Add<Output = T> + Mul<f32, Output = T>,
    {
        let weights = self.interpolation_factors(position, hint);
        let mut result = T::default();
        if (*hint as usize) < self.tetrahedra.len() {
            let tet = &self.tetrahedra[*hint as usize];
            for k in 0..3 {
                result = result + values[tet.vertices[k] as usize] * weights[k];
            }
            if (*hint as usize) < self.num_inner {
                result = result + values[tet.vertices[3] as usize] * weights.w;
            }
        }
        result
    }

    /// Unique vertex-index pairs over all tetrahedron edges, sorted. Outer
    /// tetrahedra contribute only their base triangle. Intended for debug
    /// rendering.
    pub fn collect_edges(&self) -> Vec<(u32, u32)> {
        let mut seen: FxHashSet<(u32, u32)> = FxHashSet::default();
        for tet in &self.tetrahedra {
            for i in 0..4 {
                for j in (i + 1)..4 {
                    let (a, b) = (tet.vertices[i], tet.vertices[j]);
                    if a >= Tetrahedron::INFINITY2 || b >= Tetrahedron::INFINITY2 {
                        continue;
                    }
                    seen.insert((a.min(b), a.max(b)));
                }
            }
        }
        let mut edges: Vec<_> = seen.into_iter().collect();
        edges.sort_unstable();
        edges
    }
}

/// Barycentric coordinates of a position against a triangle, via the
/// dot-product formulation. The triangle must be non-degenerate.
fn triangle_barycentric(position: Vec3, p1: Vec3, p2: Vec3, p3: Vec3) -> Vec3 {
    let v12 = p2 - p1;
    let v13 = p3 - p1;
    let v0 = position - p1;
    let d00 = v12.dot(v12);
    let d01 = v12.dot(v13);
    let d11 = v13.dot(v13);
    let d20 = v0.dot(v12);
    let d21 = v0.dot(v13);
    let denom = d00 * d11 - d01 * d01;
    let v = (d11 * d20 - d01 * d21) / denom;
    let w = (d00 * d21 - d01 * d20) / denom;
    Vec3::new(1.0 - v - w, v, w)
}
