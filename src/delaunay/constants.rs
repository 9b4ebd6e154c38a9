//! Shared tolerances for construction and queries.

/// Tight epsilon for geometric equality and polynomial discriminants.
pub(crate) const EPS: f64 = 1e-6;

/// Loose epsilon for circumsphere containment, in distance units.
///
/// This decides how aggressively an insertion swallows neighboring
/// tetrahedra: a position exactly on a circumsphere counts as inside, so
/// cospherical sites (grids are full of them) retriangulate cleanly. Too
/// tight a value leaves non-closed cavities that force sites into the
/// ignored set.
pub(crate) const LARGE_EPS: f64 = 1e-4;

/// Sites closer than this to an existing vertex are treated as coincident
/// and ignored.
pub(crate) const COINCIDENT_DISTANCE: f32 = 1e-5;

/// Number of bounding-box corner vertices prepended while building. They
/// and every tetrahedron touching them are stripped before the mesh is
/// exposed.
pub(crate) const NUM_SUPER_VERTICES: usize = 8;
