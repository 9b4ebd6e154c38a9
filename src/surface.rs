//! Closed triangulated surfaces with adjacency.
//!
//! Used for two transient boundaries during construction: the cavity left
//! by a batch of removed tetrahedra, and the convex hull of the finished
//! inner mesh. Vertices are shared with the owning mesh and not stored here.

use glam::Vec3;

use crate::mesh::NO_INDEX;

/// Triangle on a mesh boundary, with adjacency and a back-reference to the
/// tetrahedron it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriangleFace {
    /// Vertex indices.
    pub indices: [u32; 3],
    /// Fourth vertex of the originating tetrahedron.
    pub unused: u32,
    /// Neighbor face `k` shares the edge opposite vertex `k`.
    pub neighbors: [u32; 3],
    /// Tetrahedron this face borders, `NO_INDEX` if open space.
    pub tet: u32,
    /// Face slot of that tetrahedron, 0 to 3.
    pub tet_face: u32,
}

impl Default for TriangleFace {
    fn default() -> Self {
        Self {
            indices: [0; 3],
            unused: NO_INDEX,
            neighbors: [NO_INDEX; 3],
            tet: NO_INDEX,
            tet_face: 0,
        }
    }
}

impl TriangleFace {
    /// Edge `k` runs from vertex `k` to vertex `k + 1`. Returned sorted.
    #[inline]
    pub fn edge(&self, edge_index: usize) -> (u32, u32) {
        let begin = self.indices[edge_index];
        let end = self.indices[(edge_index + 1) % 3];
        if begin > end {
            (end, begin)
        } else {
            (begin, end)
        }
    }

    /// Whether the face lists the given neighbor.
    #[inline]
    pub fn has_neighbor(&self, face_index: u32) -> bool {
        self.neighbors.contains(&face_index)
    }

    /// Reorder vertices so `(p2 - p1) x (p3 - p1)` points away from the
    /// unused vertex. Neighbor slots swap along with their opposite
    /// vertices.
    pub fn normalize(&mut self, vertices: &[Vec3]) {
        let p0 = vertices[self.unused as usize];
        let p1 = vertices[self.indices[0] as usize];
        let p2 = vertices[self.indices[1] as usize];
        let p3 = vertices[self.indices[2] as usize];
        let outside = p1 - p0;
        let normal = (p2 - p1).cross(p3 - p1);
        if outside.dot(normal) < 0.0 {
            self.indices.swap(0, 1);
            self.neighbors.swap(0, 1);
        }
    }

    /// Longest-to-shortest side ratio, clamped. Higher scores mean worse
    /// triangles; used to break ties when choosing boundary faces.
    pub fn aspect_score(&self, vertices: &[Vec3]) -> f32 {
        const SCORE_CLAMP: f32 = 1e8;

        let p1 = vertices[self.indices[0] as usize];
        let p2 = vertices[self.indices[1] as usize];
        let p3 = vertices[self.indices[2] as usize];

        let side1 = (p1 - p2).length();
        let side2 = (p2 - p3).length();
        let side3 = (p3 - p1).length();

        let shortest = side1.min(side2).min(side3);
        let longest = side1.max(side2).max(side3);
        (longest / shortest).min(SCORE_CLAMP)
    }
}

/// Scratch edge record used while pairing faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct SurfaceEdge {
    /// Sorted vertex indices.
    indices: [u32; 2],
    /// Face that owns this edge.
    face: u32,
    /// Edge slot in that face, 0 to 2.
    slot: u32,
}

impl SurfaceEdge {
    fn new(edge: (u32, u32), face: u32, slot: u32) -> Self {
        Self {
            indices: [edge.0, edge.1],
            face,
            slot,
        }
    }
}

/// The neighbor slot across edge `slot` is the one opposite the remaining
/// vertex.
#[inline]
fn opposite_slot(slot: u32) -> usize {
    ((slot + 2) % 3) as usize
}

/// A set of boundary triangles forming (ideally) a closed surface.
#[derive(Debug, Clone, Default)]
pub struct Surface {
    /// Faces.
    pub faces: Vec<TriangleFace>,
    /// Scratch buffer reused by adjacency computation.
    edges: Vec<SurfaceEdge>,
}

impl Surface {
    pub fn clear(&mut self) {
        self.faces.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.faces.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn push(&mut self, face: TriangleFace) {
        self.faces.push(face);
    }

    /// Pair up shared edges and fill in face neighbors.
    ///
    /// Succeeds only if the surface is closed: every edge shared by exactly
    /// two distinct faces. On failure neighbors are left unset and
    /// [`Surface::unpaired_edges`] reports the offenders.
    pub fn calculate_adjacency(&mut self) -> bool {
        self.edges.clear();
        for (index, face) in self.faces.iter().enumerate() {
            for slot in 0..3 {
                self.edges
                    .push(SurfaceEdge::new(face.edge(slot), index as u32, slot as u32));
            }
        }
        self.edges.sort_unstable();

        if !edges_paired(&self.edges) {
            return false;
        }

        for pair in self.edges.chunks_exact(2) {
            let (e0, e1) = (pair[0], pair[1]);
            self.faces[e0.face as usize].neighbors[opposite_slot(e0.slot)] = e1.face;
            self.faces[e1.face as usize].neighbors[opposite_slot(e1.slot)] = e0.face;
        }
        true
    }

    /// Read-only closedness check.
    pub fn is_closed(&self) -> bool {
        let mut edges = Vec::with_capacity(self.faces.len() * 3);
        for (index, face) in self.faces.iter().enumerate() {
            for slot in 0..3 {
                edges.push(SurfaceEdge::new(face.edge(slot), index as u32, slot as u32));
            }
        }
        edges.sort_unstable();
        edges_paired(&edges)
    }

    /// Edges that failed to pair in the last adjacency pass, for
    /// diagnostics.
    pub fn unpaired_edges(&self) -> Vec<(u32, u32)> {
        let mut result = Vec::new();
        let mut run = 0;
        while run < self.edges.len() {
            let mut end = run + 1;
            while end < self.edges.len() && self.edges[end].indices == self.edges[run].indices {
                end += 1;
            }
            if end - run != 2 || self.edges[run].face == self.edges[run + 1].face {
                let [a, b] = self.edges[run].indices;
                result.push((a, b));
            }
            run = end;
        }
        result
    }
}

/// Sorted edges pair up exactly: runs of equal vertex pairs have length two
/// and span two distinct faces.
fn edges_paired(edges: &[SurfaceEdge]) -> bool {
    if edges.len() % 2 != 0 {
        return false;
    }
    for pair in edges.chunks_exact(2) {
        if pair[0].indices != pair[1].indices || pair[0].face == pair[1].face {
            return false;
        }
    }
    // Pairs of a longer run would still align chunk-wise; adjacent chunks
    // sharing an edge reveal them.
    for k in (2..edges.len()).step_by(2) {
        if edges[k].indices == edges[k - 1].indices {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tetrahedron_vertices() -> Vec<Vec3> {
        vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
        ]
    }

    fn tetrahedron_surface() -> Surface {
        // The four faces of a single tetrahedron, each recording the
        // remaining vertex as unused.
        let mut surface = Surface::default();
        for unused in 0..4u32 {
            let mut indices = [0u32; 3];
            let mut j = 0;
            for v in 0..4u32 {
                if v != unused {
                    indices[j] = v;
                    j += 1;
                }
            }
            surface.push(TriangleFace {
                indices,
                unused,
                ..Default::default()
            });
        }
        surface
    }

    #[test]
    fn test_closed_tetrahedron_adjacency() {
        let mut surface = tetrahedron_surface();
        assert!(surface.is_closed());
        assert!(surface.calculate_adjacency());

        for (index, face) in surface.faces.iter().enumerate() {
            for slot in 0..3 {
                let neighbor = face.neighbors[slot];
                assert_ne!(neighbor, NO_INDEX);
                assert_ne!(neighbor as usize, index);
                // Adjacency is mutual.
                assert!(surface.faces[neighbor as usize].has_neighbor(index as u32));
                // The neighbor shares the edge opposite this slot.
                let edge = face.edge((slot + 1) % 3);
                let other = &surface.faces[neighbor as usize];
                let shared = (0..3).any(|k| other.edge(k) == edge);
                assert!(shared);
            }
        }
    }

    #[test]
    fn test_open_surface_rejected() {
        let mut surface = tetrahedron_surface();
        surface.faces.pop();
        assert!(!surface.is_closed());
        assert!(!surface.calculate_adjacency());
        assert!(!surface.unpaired_edges().is_empty());
    }

    #[test]
    fn test_normalize_flips_inverted_winding() {
        let vertices = tetrahedron_vertices();
        // Face (1, 2, 3) viewed from vertex 0; this winding points toward
        // the unused vertex and must flip.
        let mut face = TriangleFace {
            indices: [1, 3, 2],
            unused: 0,
            ..Default::default()
        };
        face.normalize(&vertices);
        assert_eq!(face.indices, [3, 1, 2]);

        let p1 = vertices[face.indices[0] as usize];
        let p2 = vertices[face.indices[1] as usize];
        let p3 = vertices[face.indices[2] as usize];
        let normal = (p2 - p1).cross(p3 - p1);
        assert!(normal.dot(p1 - vertices[0]) > 0.0);
    }

    #[test]
    fn test_aspect_score() {
        let vertices = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 2.0, 0.0),
        ];
        let face = TriangleFace {
            indices: [0, 1, 2],
            ..Default::default()
        };
        let score = face.aspect_score(&vertices);
        // Longest side is the hypotenuse sqrt(5), shortest is 1.
        assert!((score - 5.0f32.sqrt()).abs() < 1e-5);
    }
}
