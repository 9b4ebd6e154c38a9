use thiserror::Error;

/// Errors from mesh construction.
///
/// Construction never hard-fails on geometry: degenerate, duplicate or
/// otherwise uninsertable sites land in the ignored set and the mesh is
/// built from the rest. Errors are reserved for invalid inputs.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MeshError {
    /// An input position contains a NaN or infinite coordinate.
    #[error("input position {0} has a non-finite coordinate")]
    NonFinitePosition(usize),
}
