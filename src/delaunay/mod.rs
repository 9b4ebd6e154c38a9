//! Incremental Bowyer-Watson Delaunay construction.
//!
//! Sites are inserted one at a time into a tetrahedralized bounding box:
//! every tetrahedron whose circumsphere contains the new site is removed,
//! and the resulting star-shaped cavity is refilled with tetrahedra fanning
//! out from the site. Clean-up passes then strip the bounding box, enforce
//! a manifold boundary and compact storage, and the outer extrapolation
//! shell is appended over the convex hull.

pub(crate) mod constants;
mod outer;

use glam::Vec3;
use rustc_hash::FxHashMap;

use crate::mesh::{TetrahedralMesh, Tetrahedron, NO_INDEX};
use crate::precise::{circumsphere, PreciseSphere};
use crate::surface::Surface;
use crate::MeshDiagnostics;

use constants::{COINCIDENT_DISTANCE, LARGE_EPS, NUM_SUPER_VERTICES};

/// Build the full mesh for a validated set of positions.
pub(crate) fn tetrahedralize(positions: &[Vec3]) -> (TetrahedralMesh, MeshDiagnostics) {
    let start = std::time::Instant::now();
    let mut builder = MeshBuilder::default();
    builder.run(positions);
    log::debug!(
        "tetrahedralized {} sites into {} cells in {:.3?}",
        positions.len(),
        builder.mesh.tetrahedra.len(),
        start.elapsed()
    );
    (builder.mesh, builder.diagnostics)
}

/// Working state for incremental construction. Scratch buffers live here so
/// repeated insertions reuse their allocations.
#[derive(Default)]
struct MeshBuilder {
    mesh: TetrahedralMesh,
    /// Circumsphere of each tetrahedron, kept current during insertion.
    circumspheres: Vec<PreciseSphere>,
    /// Removal flags; slots are compacted away once at the end.
    removed: Vec<bool>,
    /// Boundary of the cavity opened by the current insertion.
    hole_surface: Surface,
    /// Tetrahedra removed by the current insertion, reused as storage for
    /// the refill.
    removed_this: Vec<u32>,
    diagnostics: MeshDiagnostics,
}

impl MeshBuilder {
    fn run(&mut self, positions: &[Vec3]) {
        if positions.is_empty() {
            return;
        }

        let (min, max) = bounds(positions);
        self.initialize_super_mesh(min, max);
        self.mesh.vertices.extend_from_slice(positions);

        for input_index in 0..positions.len() {
            let vertex = (NUM_SUPER_VERTICES + input_index) as u32;
            if !self.insert_vertex(vertex) {
                log::debug!("site {input_index} could not be inserted; ignoring");
                self.mesh.ignored_vertices.push(input_index as u32);
            }
        }
        debug_assert!(self.is_adjacency_valid());

        self.disconnect_super_tetrahedra();
        self.ensure_connectivity();
        self.filter_surface();
        self.compact();
        self.drop_super_vertices();
        self.collect_orphans();
        debug_assert!(self.is_adjacency_valid());

        outer::build_outer_shell(&mut self.mesh, &mut self.diagnostics);
    }

    /// Tetrahedralize an inflated bounding box into six cells around its
    /// main diagonal. All sites insert strictly inside it.
    fn initialize_super_mesh(&mut self, min: Vec3, max: Vec3) {
        let padding = 0.5 * (max - min).max_element().max(1.0) + 1.0;
        let lo = min - Vec3::splat(padding);
        let hi = max + Vec3::splat(padding);

        for i in 0..NUM_SUPER_VERTICES {
            self.mesh.vertices.push(Vec3::new(
                if i & 1 != 0 { hi.x } else { lo.x },
                if i & 2 != 0 { hi.y } else { lo.y },
                if i & 4 != 0 { hi.z } else { lo.z },
            ));
        }

        const BOX_TETRAHEDRA: [[u32; 4]; 6] = [
            [0, 1, 3, 7],
            [0, 1, 5, 7],
            [0, 2, 3, 7],
            [0, 2, 6, 7],
            [0, 4, 5, 7],
            [0, 4, 6, 7],
        ];
        for vertices in BOX_TETRAHEDRA {
            let mut tet = Tetrahedron::new(vertices);
            tet.update_inner_matrix(&self.mesh.vertices);
            self.mesh.tetrahedra.push(tet);
        }
        link_neighbors(&mut self.mesh.tetrahedra);

        for index in 0..self.mesh.tetrahedra.len() {
            let sphere = self.tetrahedron_circumsphere(index);
            self.circumspheres.push(sphere);
            self.removed.push(false);
        }
    }

    fn tetrahedron_circumsphere(&self, index: usize) -> PreciseSphere {
        let tet = &self.mesh.tetrahedra[index];
        circumsphere(
            self.mesh.vertices[tet.vertices[0] as usize],
            self.mesh.vertices[tet.vertices[1] as usize],
            self.mesh.vertices[tet.vertices[2] as usize],
            self.mesh.vertices[tet.vertices[3] as usize],
        )
    }

    /// Insert one site. On failure the mesh is left exactly as before.
    fn insert_vertex(&mut self, vertex: u32) -> bool {
        let position = self.mesh.vertices[vertex as usize];

        let Some(seed) = self.find_containing(position) else {
            return false;
        };

        // A site coincident with an existing vertex would orphan the
        // earlier copy; reject the later one instead.
        for k in 0..4 {
            let v = self.mesh.tetrahedra[seed as usize].vertices[k];
            let existing = self.mesh.vertices[v as usize];
            if existing.distance_squared(position) < COINCIDENT_DISTANCE * COINCIDENT_DISTANCE {
                return false;
            }
        }

        self.collect_intersected(seed, position);

        if !self.extract_hole_surface(position) {
            for i in 0..self.removed_this.len() {
                let index = self.removed_this[i] as usize;
                self.removed[index] = false;
            }
            self.diagnostics
                .failed_holes
                .push(vertex - NUM_SUPER_VERTICES as u32);
            return false;
        }

        self.disconnect_removed();
        self.fill_star(vertex);
        true
    }

    /// Walk toward the position along signed barycentric coordinates,
    /// starting from the first live tetrahedron.
    fn find_containing(&self, position: Vec3) -> Option<u32> {
        let start = self.removed.iter().position(|&r| !r)?;
        let mut index = start as u32;
        for _ in 0..self.mesh.tetrahedra.len() {
            let weights = self.mesh.inner_barycentric(index as usize, position);
            if weights.min_element() >= 0.0 {
                return Some(index);
            }
            let mut worst = 0;
            for k in 1..4 {
                if weights[k] < weights[worst] {
                    worst = k;
                }
            }
            let next = self.mesh.tetrahedra[index as usize].neighbors[worst];
            if next == NO_INDEX {
                return None;
            }
            index = next;
        }
        None
    }

    /// Breadth-first collection of every tetrahedron whose circumsphere
    /// contains the position, spreading out from the containing one. A
    /// position exactly on a circumsphere counts as inside.
    fn collect_intersected(&mut self, seed: u32, position: Vec3) {
        self.removed_this.clear();
        self.removed_this.push(seed);
        self.removed[seed as usize] = true;

        let mut cursor = 0;
        while cursor < self.removed_this.len() {
            let index = self.removed_this[cursor] as usize;
            cursor += 1;
            for k in 0..4 {
                let neighbor = self.mesh.tetrahedra[index].neighbors[k];
                if neighbor == NO_INDEX || self.removed[neighbor as usize] {
                    continue;
                }
                if self.circumspheres[neighbor as usize].distance(position) < LARGE_EPS {
                    self.removed[neighbor as usize] = true;
                    self.removed_this.push(neighbor);
                }
            }
        }
    }

    /// Collect the boundary of the removed region and validate that it is a
    /// closed surface, star-shaped around the new site.
    ///
    /// A boundary face coplanar with the site (common on grid inputs) would
    /// refill into a flat cell; the cavity grows past such faces until every
    /// face is strictly visible. Growing is capped by the mesh size and
    /// fails when it would leave the bounding box.
    fn extract_hole_surface(&mut self, position: Vec3) -> bool {
        for _ in 0..self.mesh.tetrahedra.len() {
            self.hole_surface.clear();
            for i in 0..self.removed_this.len() {
                let index = self.removed_this[i];
                for face in 0..4 {
                    let neighbor = self.mesh.tetrahedra[index as usize].neighbors[face];
                    if neighbor != NO_INDEX && self.removed[neighbor as usize] {
                        continue;
                    }
                    let mut triangle = self.mesh.tetrahedra[index as usize].face(face, NO_INDEX, 0);
                    if neighbor != NO_INDEX {
                        let slot = self.mesh.tetrahedra[neighbor as usize].neighbor_slot(index);
                        debug_assert!(slot < 4);
                        triangle.tet = neighbor;
                        triangle.tet_face = slot as u32;
                    }
                    triangle.normalize(&self.mesh.vertices);
                    self.hole_surface.push(triangle);
                }
            }

            if !self.hole_surface.calculate_adjacency() {
                let unpaired = self.hole_surface.unpaired_edges();
                log::warn!("cavity surface is not closed ({} bad edges)", unpaired.len());
                self.diagnostics.open_surface_edges.extend(unpaired);
                return false;
            }

            let mut blocked: Option<u32> = None;
            for face in &self.hole_surface.faces {
                let p1 = self.mesh.vertices[face.indices[0] as usize];
                let p2 = self.mesh.vertices[face.indices[1] as usize];
                let p3 = self.mesh.vertices[face.indices[2] as usize];
                let normal = (p2 - p1).cross(p3 - p1);
                if normal.dot(position - p1) >= 0.0 {
                    blocked = Some(face.tet);
                    break;
                }
            }

            match blocked {
                None => return true,
                // The cavity cannot grow past the bounding box.
                Some(NO_INDEX) => return false,
                Some(tet) => {
                    self.removed[tet as usize] = true;
                    self.removed_this.push(tet);
                }
            }
        }
        false
    }

    /// Sever links between the removed region and the surviving mesh.
    fn disconnect_removed(&mut self) {
        for i in 0..self.removed_this.len() {
            let index = self.removed_this[i] as usize;
            for k in 0..4 {
                let neighbor = self.mesh.tetrahedra[index].neighbors[k];
                if neighbor != NO_INDEX && !self.removed[neighbor as usize] {
                    let slot = self.mesh.tetrahedra[neighbor as usize].neighbor_slot(index as u32);
                    if slot < 4 {
                        self.mesh.tetrahedra[neighbor as usize].neighbors[slot] = NO_INDEX;
                    }
                }
                self.mesh.tetrahedra[index].neighbors[k] = NO_INDEX;
            }
        }
    }

    /// Refill the cavity with one tetrahedron per boundary face, all
    /// sharing the new vertex in slot 3. Slots of removed tetrahedra are
    /// reused before the array grows.
    fn fill_star(&mut self, vertex: u32) {
        while self.removed_this.len() < self.hole_surface.len() {
            let index = self.mesh.tetrahedra.len() as u32;
            self.mesh.tetrahedra.push(Tetrahedron::new([0; 4]));
            self.circumspheres.push(PreciseSphere::default());
            self.removed.push(true);
            self.removed_this.push(index);
        }
        let slots: Vec<u32> = self.removed_this[..self.hole_surface.len()].to_vec();

        for (face_index, &slot) in slots.iter().enumerate() {
            let face = self.hole_surface.faces[face_index];
            let mut tet = Tetrahedron::new([
                face.indices[0],
                face.indices[1],
                face.indices[2],
                vertex,
            ]);
            for k in 0..3 {
                tet.neighbors[k] = slots[face.neighbors[k] as usize];
            }
            tet.neighbors[3] = face.tet;
            if face.tet != NO_INDEX {
                self.mesh.tetrahedra[face.tet as usize].neighbors[face.tet_face as usize] = slot;
            }
            tet.update_inner_matrix(&self.mesh.vertices);
            self.mesh.tetrahedra[slot as usize] = tet;
            self.removed[slot as usize] = false;
        }

        for &slot in &slots {
            self.circumspheres[slot as usize] = self.tetrahedron_circumsphere(slot as usize);
        }
    }

    /// Mark every tetrahedron touching a box corner as removed and sever it
    /// from the surviving mesh.
    fn disconnect_super_tetrahedra(&mut self) {
        for index in 0..self.mesh.tetrahedra.len() {
            if self.removed[index] {
                continue;
            }
            let touches_super = self.mesh.tetrahedra[index]
                .vertices
                .iter()
                .any(|&v| (v as usize) < NUM_SUPER_VERTICES);
            if touches_super {
                self.remove_and_sever(index);
            }
        }
    }

    fn remove_and_sever(&mut self, index: usize) {
        self.removed[index] = true;
        for k in 0..4 {
            let neighbor = self.mesh.tetrahedra[index].neighbors[k];
            if neighbor != NO_INDEX && !self.removed[neighbor as usize] {
                let slot = self.mesh.tetrahedra[neighbor as usize].neighbor_slot(index as u32);
                if slot < 4 {
                    self.mesh.tetrahedra[neighbor as usize].neighbors[slot] = NO_INDEX;
                }
            }
            self.mesh.tetrahedra[index].neighbors[k] = NO_INDEX;
        }
    }

    /// Keep only the component reachable from the lowest-indexed surviving
    /// tetrahedron; stray islands would trap the query walk.
    fn ensure_connectivity(&mut self) {
        let Some(seed) = self.removed.iter().position(|&r| !r) else {
            return;
        };
        let mut reached = vec![false; self.mesh.tetrahedra.len()];
        let mut queue = vec![seed as u32];
        reached[seed] = true;
        while let Some(index) = queue.pop() {
            for k in 0..4 {
                let neighbor = self.mesh.tetrahedra[index as usize].neighbors[k];
                if neighbor == NO_INDEX {
                    continue;
                }
                let n = neighbor as usize;
                if !reached[n] && !self.removed[n] {
                    reached[n] = true;
                    queue.push(neighbor);
                }
            }
        }

        let mut dropped = 0usize;
        for index in 0..self.mesh.tetrahedra.len() {
            if !self.removed[index] && !reached[index] {
                self.remove_and_sever(index);
                dropped += 1;
            }
        }
        if dropped > 0 {
            log::debug!("dropped {dropped} disconnected tetrahedra");
        }
    }

    /// Remove tetrahedra whose boundary faces pinch together along a shared
    /// edge. More than two boundary faces on one edge make the boundary
    /// non-manifold, which hull extraction cannot close.
    fn filter_surface(&mut self) {
        let limit = 2 * self.mesh.tetrahedra.len();
        for _ in 0..limit {
            let mut edge_faces: FxHashMap<(u32, u32), Vec<u32>> = FxHashMap::default();
            for index in 0..self.mesh.tetrahedra.len() {
                if self.removed[index] {
                    continue;
                }
                let tet = &self.mesh.tetrahedra[index];
                for face in 0..4 {
                    if tet.neighbors[face] != NO_INDEX {
                        continue;
                    }
                    let indices = tet.face_indices(face);
                    for e in 0..3 {
                        let a = indices[e];
                        let b = indices[(e + 1) % 3];
                        edge_faces
                            .entry((a.min(b), a.max(b)))
                            .or_default()
                            .push(index as u32);
                    }
                }
            }

            let mut offenders: Vec<u32> = Vec::new();
            for owners in edge_faces.values() {
                if owners.len() > 2 {
                    offenders.extend_from_slice(owners);
                }
            }
            if offenders.is_empty() {
                break;
            }
            offenders.sort_unstable();
            offenders.dedup();
            log::debug!("removing {} tetrahedra pinching the boundary", offenders.len());
            for &index in &offenders {
                if !self.removed[index as usize] {
                    self.remove_and_sever(index as usize);
                }
            }
        }
    }

    /// Drop removed slots and remap all neighbor indices.
    fn compact(&mut self) {
        let count = self.mesh.tetrahedra.len();
        let mut remap = vec![NO_INDEX; count];
        let mut next = 0u32;
        for index in 0..count {
            if !self.removed[index] {
                remap[index] = next;
                next += 1;
            }
        }

        for index in 0..count {
            let target = remap[index];
            if target == NO_INDEX {
                continue;
            }
            let mut tet = self.mesh.tetrahedra[index];
            for neighbor in &mut tet.neighbors {
                if *neighbor != NO_INDEX {
                    *neighbor = remap[*neighbor as usize];
                    debug_assert_ne!(*neighbor, NO_INDEX);
                }
            }
            self.mesh.tetrahedra[target as usize] = tet;
        }
        self.mesh.tetrahedra.truncate(next as usize);
        self.circumspheres.clear();
        self.removed.clear();
        self.removed.resize(next as usize, false);
    }

    /// Strip the box corners; real vertices shift down to start at zero.
    /// Positions are untouched, so precomputed matrices stay valid.
    fn drop_super_vertices(&mut self) {
        self.mesh.vertices.drain(..NUM_SUPER_VERTICES);
        for tet in &mut self.mesh.tetrahedra {
            for v in &mut tet.vertices {
                debug_assert!(*v as usize >= NUM_SUPER_VERTICES);
                *v -= NUM_SUPER_VERTICES as u32;
            }
        }
    }

    /// Vertices referenced by no surviving tetrahedron cannot be
    /// interpolated exactly; record them so callers fall back to defaults.
    fn collect_orphans(&mut self) {
        let mut referenced = vec![false; self.mesh.vertices.len()];
        for tet in &self.mesh.tetrahedra {
            for &v in &tet.vertices {
                referenced[v as usize] = true;
            }
        }
        for (index, &used) in referenced.iter().enumerate() {
            if !used {
                self.mesh.ignored_vertices.push(index as u32);
            }
        }
        self.mesh.ignored_vertices.sort_unstable();
        self.mesh.ignored_vertices.dedup();
    }

    /// Every neighbor link is reciprocal and both sides agree on the
    /// shared face's vertex set.
    fn is_adjacency_valid(&self) -> bool {
        for index in 0..self.mesh.tetrahedra.len() {
            if self.removed[index] {
                continue;
            }
            let tet = &self.mesh.tetrahedra[index];
            for face in 0..4 {
                let neighbor = tet.neighbors[face];
                if neighbor == NO_INDEX {
                    continue;
                }
                let other = &self.mesh.tetrahedra[neighbor as usize];
                let back = other.neighbor_slot(index as u32);
                if back >= 4 {
                    return false;
                }
                let mut mine = tet.face_indices(face);
                let mut theirs = other.face_indices(back);
                mine.sort_unstable();
                theirs.sort_unstable();
                if mine != theirs {
                    return false;
                }
            }
        }
        true
    }
}

fn bounds(positions: &[Vec3]) -> (Vec3, Vec3) {
    let mut min = positions[0];
    let mut max = positions[0];
    for &p in &positions[1..] {
        min = min.min(p);
        max = max.max(p);
    }
    (min, max)
}

/// Recompute neighbor links on a batch of tetrahedra by matching shared
/// faces. Only used for the handful of box cells; incremental insertion
/// maintains adjacency directly.
fn link_neighbors(tetrahedra: &mut [Tetrahedron]) {
    let mut by_face: FxHashMap<[u32; 3], (u32, usize)> = FxHashMap::default();
    for index in 0..tetrahedra.len() {
        for face in 0..4 {
            let mut key = tetrahedra[index].face_indices(face);
            key.sort_unstable();
            match by_face.remove(&key) {
                Some((other, other_face)) => {
                    tetrahedra[index].neighbors[face] = other;
                    tetrahedra[other as usize].neighbors[other_face] = index as u32;
                }
                None => {
                    by_face.insert(key, (index as u32, face));
                }
            }
        }
    }
}
