//! Tetrahedral interpolation meshes over point sets in 3-space.
//!
//! Given arbitrary sites, [`build`] produces a Delaunay tetrahedralization
//! of their convex hull, closed by virtual cells that extend coverage
//! outward to infinity. The mesh answers point queries with barycentric
//! weights over nearby sites, the core operation behind per-vertex signal
//! interpolation such as light-probe sampling.
//!
//! # Example
//!
//! ```
//! use glam::Vec3;
//!
//! let sites = vec![
//!     Vec3::new(0.0, 0.0, 0.0),
//!     Vec3::new(1.0, 0.0, 0.0),
//!     Vec3::new(0.0, 1.0, 0.0),
//!     Vec3::new(0.0, 0.0, 1.0),
//! ];
//! let output = r3_delaunay::build(&sites).expect("sites are finite");
//!
//! let mut hint = 0u32;
//! let weights = output
//!     .mesh
//!     .interpolation_factors(Vec3::splat(0.25), &mut hint);
//! let sum = weights.x + weights.y + weights.z + weights.w;
//! assert!((sum - 1.0).abs() < 1e-4);
//! ```
//!
//! Construction is single-threaded; the finished mesh is read-only and may
//! be queried from many threads at once, provided each thread owns its
//! walk hint.

mod archive;
mod delaunay;
mod error;
mod mesh;
mod precise;
mod roots;
mod surface;
mod types;

pub use archive::{read_mesh, write_mesh};
pub use error::MeshError;
pub use mesh::{TetrahedralMesh, Tetrahedron, NO_INDEX};
pub use precise::PreciseSphere;
pub use surface::{Surface, TriangleFace};
pub use types::Vec3Like;

use glam::Vec3;

/// Result of mesh construction: the mesh plus build diagnostics.
#[derive(Debug, Clone)]
pub struct MeshOutput {
    /// The finished mesh.
    pub mesh: TetrahedralMesh,
    /// What, if anything, was lost while building it.
    pub diagnostics: MeshDiagnostics,
}

/// Diagnostic information from construction.
///
/// A degraded build still yields a queryable mesh; these fields describe
/// the sites and boundary edges that had to be given up.
#[derive(Debug, Clone, Default)]
pub struct MeshDiagnostics {
    /// Sites whose removal cavity failed the closed-surface or visibility
    /// checks and were rolled back into the ignored set.
    pub failed_holes: Vec<u32>,
    /// Boundary edges left unpaired by a failed closed-surface check, kept
    /// for debug visualization.
    pub open_surface_edges: Vec<(u32, u32)>,
}

impl MeshDiagnostics {
    /// Returns true if no issues were detected.
    pub fn is_clean(&self) -> bool {
        self.failed_holes.is_empty() && self.open_surface_edges.is_empty()
    }
}

/// Build an interpolation mesh from the given sites.
///
/// Duplicate and degenerate sites are recorded in the mesh's ignored set
/// rather than failing the build. Inputs with fewer than four usable sites
/// produce a mesh without tetrahedra, on which every query returns zero
/// weights. Errors are reserved for invalid input coordinates.
pub fn build<P: Vec3Like>(points: &[P]) -> Result<MeshOutput, MeshError> {
    let mut positions = Vec::with_capacity(points.len());
    for (index, point) in points.iter().enumerate() {
        let position = Vec3::new(point.x(), point.y(), point.z());
        if !position.is_finite() {
            return Err(MeshError::NonFinitePosition(index));
        }
        positions.push(position);
    }

    let (mesh, diagnostics) = delaunay::tetrahedralize(&positions);
    Ok(MeshOutput { mesh, diagnostics })
}
