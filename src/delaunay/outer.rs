//! Outer-shell construction.
//!
//! Each open face of the finished inner mesh becomes a pseudo-tetrahedron
//! reaching to infinity: its base triangle is the hull face, and its
//! "fourth vertex" is a sentinel selecting the polynomial that locates the
//! offset triangle `p_k + t * n_k` containing a query position. The
//! polynomial coefficients are affine in the query position and are baked
//! into a per-cell matrix.

use glam::{Affine3A, Mat3, Vec3};

use crate::mesh::{TetrahedralMesh, Tetrahedron, NO_INDEX};
use crate::precise::det3;
use crate::surface::Surface;
use crate::MeshDiagnostics;

use super::constants::EPS;

pub(crate) fn build_outer_shell(mesh: &mut TetrahedralMesh, diagnostics: &mut MeshDiagnostics) {
    mesh.num_inner = mesh.tetrahedra.len();
    mesh.hull_normals = vec![Vec3::ZERO; mesh.vertices.len()];
    if mesh.tetrahedra.is_empty() {
        return;
    }

    let mut hull = Surface::default();
    build_hull_surface(mesh, &mut hull);
    if !hull.calculate_adjacency() {
        let unpaired = hull.unpaired_edges();
        log::warn!(
            "hull surface is not closed ({} bad edges); extrapolation cells skipped",
            unpaired.len()
        );
        diagnostics.open_surface_edges.extend(unpaired);
        return;
    }

    calculate_hull_normals(mesh, &hull);
    build_outer_tetrahedra(mesh, &hull);
    calculate_outer_matrices(mesh);
}

/// Every open face of an inner tetrahedron is a hull face. Normalization
/// orients the triangles outward, since the unused vertex lies inside.
fn build_hull_surface(mesh: &TetrahedralMesh, hull: &mut Surface) {
    for (index, tet) in mesh.tetrahedra.iter().enumerate() {
        for face in 0..4 {
            if tet.neighbors[face] != NO_INDEX {
                continue;
            }
            let mut triangle = tet.face(face, index as u32, face as u32);
            triangle.normalize(&mesh.vertices);
            hull.push(triangle);
        }
    }
}

/// Per-vertex outward normals: the area-weighted average of the hull faces
/// sharing the vertex. The unnormalized face cross product already carries
/// the area weighting.
fn calculate_hull_normals(mesh: &mut TetrahedralMesh, hull: &Surface) {
    for face in &hull.faces {
        let p1 = mesh.vertices[face.indices[0] as usize];
        let p2 = mesh.vertices[face.indices[1] as usize];
        let p3 = mesh.vertices[face.indices[2] as usize];
        let normal = (p2 - p1).cross(p3 - p1);
        for k in 0..3 {
            mesh.hull_normals[face.indices[k] as usize] += normal;
        }
    }
    for normal in &mut mesh.hull_normals {
        *normal = normal.normalize_or_zero();
    }
}

fn build_outer_tetrahedra(mesh: &mut TetrahedralMesh, hull: &Surface) {
    let base = mesh.num_inner as u32;
    for (i, face) in hull.faces.iter().enumerate() {
        let n1 = mesh.hull_normals[face.indices[0] as usize].as_dvec3();
        let n2 = mesh.hull_normals[face.indices[1] as usize].as_dvec3();
        let n3 = mesh.hull_normals[face.indices[2] as usize].as_dvec3();

        // A vanishing triple product means the normal fan is flat and the
        // cubic's leading coefficient vanishes with it; those cells solve
        // the quadratic instead.
        let sentinel = if det3(n1, n2, n3).abs() < EPS {
            Tetrahedron::INFINITY2
        } else {
            Tetrahedron::INFINITY3
        };

        let mut tet = Tetrahedron::new([
            face.indices[0],
            face.indices[1],
            face.indices[2],
            sentinel,
        ]);
        for k in 0..3 {
            tet.neighbors[k] = base + face.neighbors[k];
        }
        tet.neighbors[3] = face.tet;
        mesh.tetrahedra[face.tet as usize].neighbors[face.tet_face as usize] = base + i as u32;
        mesh.tetrahedra.push(tet);
    }
}

/// Bake the polynomial coefficient rows for every outer cell.
///
/// The query condition is that the position is coplanar with the offset
/// triangle, `det[(P - p1) - t*n1, (p2 - p1) + t*(n2 - n1),
/// (p3 - p1) + t*(n3 - n1)] = 0`. Expanding by powers of `t` gives
/// coefficients affine in `P`; the rows below are those affine forms,
/// highest degree first, divided by the leading coefficient when the cell
/// is cubic.
fn calculate_outer_matrices(mesh: &mut TetrahedralMesh) {
    for index in mesh.num_inner..mesh.tetrahedra.len() {
        let tet = mesh.tetrahedra[index];
        let p1 = mesh.vertices[tet.vertices[0] as usize].as_dvec3();
        let p2 = mesh.vertices[tet.vertices[1] as usize].as_dvec3();
        let p3 = mesh.vertices[tet.vertices[2] as usize].as_dvec3();
        let n1 = mesh.hull_normals[tet.vertices[0] as usize].as_dvec3();
        let n2 = mesh.hull_normals[tet.vertices[1] as usize].as_dvec3();
        let n3 = mesh.hull_normals[tet.vertices[2] as usize].as_dvec3();

        let a1 = -n1;
        let b0 = p2 - p1;
        let b1 = n2 - n1;
        let c0 = p3 - p1;
        let c1 = n3 - n1;

        let g2 = b1.cross(c1);
        let k2 = a1.dot(b0.cross(c1)) + a1.dot(b1.cross(c0));
        let g1 = b0.cross(c1) + b1.cross(c0);
        let k1 = a1.dot(b0.cross(c0));
        let g0 = b0.cross(c0);

        let mut rows = [
            (g2, k2 - g2.dot(p1)),
            (g1, k1 - g1.dot(p1)),
            (g0, -g0.dot(p1)),
        ];
        if tet.vertices[3] == Tetrahedron::INFINITY3 {
            let d3 = a1.dot(b1.cross(c1));
            for (g, k) in &mut rows {
                *g /= d3;
                *k /= d3;
            }
        }

        let matrix3 = Mat3::from_cols(
            rows[0].0.as_vec3(),
            rows[1].0.as_vec3(),
            rows[2].0.as_vec3(),
        )
        .transpose();
        let translation = Vec3::new(rows[0].1 as f32, rows[1].1 as f32, rows[2].1 as f32);
        mesh.tetrahedra[index].matrix = Affine3A::from_mat3_translation(matrix3, translation);
    }
}
