//! Public API integration tests for r3-delaunay.

use glam::{Vec3, Vec4};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use r3_delaunay::{build, MeshError, TetrahedralMesh, NO_INDEX};

/// Random sites in the box [-1, 1]^3.
fn random_box_points(n: usize, seed: u64) -> Vec<Vec3> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            Vec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            )
        })
        .collect()
}

fn unit_tetrahedron() -> Vec<Vec3> {
    vec![
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
        Vec3::new(0.0, 0.0, 1.0),
    ]
}

fn unit_cube() -> Vec<Vec3> {
    (0..8)
        .map(|i| {
            Vec3::new(
                (i & 1) as f32,
                ((i >> 1) & 1) as f32,
                ((i >> 2) & 1) as f32,
            )
        })
        .collect()
}

fn weight_sum(weights: Vec4) -> f32 {
    weights.x + weights.y + weights.z + weights.w
}

/// Neighbor links must be mutual, and both sides must agree on the shared
/// face's vertices (checked for inner cells, where all four slots are real).
fn assert_adjacency(mesh: &TetrahedralMesh) {
    for (index, tet) in mesh.tetrahedra.iter().enumerate() {
        for slot in 0..4 {
            let neighbor = tet.neighbors[slot];
            if neighbor == NO_INDEX {
                continue;
            }
            let other = &mesh.tetrahedra[neighbor as usize];
            let back = other.neighbor_slot(index as u32);
            assert!(back < 4, "link {index} -> {neighbor} is one-way");

            if index < mesh.num_inner && (neighbor as usize) < mesh.num_inner {
                let mut mine = tet.face_indices(slot);
                let mut theirs = other.face_indices(back);
                mine.sort_unstable();
                theirs.sort_unstable();
                assert_eq!(mine, theirs, "face mismatch between {index} and {neighbor}");
            }
        }
    }
}

#[test]
fn test_single_tetrahedron() {
    let sites = unit_tetrahedron();
    let output = build(&sites).expect("build should succeed");
    let mesh = &output.mesh;

    assert!(output.diagnostics.is_clean());
    assert!(mesh.ignored_vertices.is_empty());
    assert_eq!(mesh.num_inner, 1);
    assert_eq!(mesh.tetrahedra.len(), 5);
    assert_adjacency(mesh);

    // Every site is on the hull and carries a normal.
    for normal in &mesh.hull_normals {
        assert!((normal.length() - 1.0).abs() < 1e-5);
    }

    // Unit weight at each site, on that site.
    for (index, &site) in mesh.vertices.iter().enumerate() {
        let mut hint = 0u32;
        let weights = mesh.interpolation_factors(site, &mut hint);
        assert!((weight_sum(weights) - 1.0).abs() < 1e-4);
        assert!(weights.min_element() >= -1e-4, "weights = {weights:?}");

        let located = &mesh.tetrahedra[hint as usize];
        let best = (0..4)
            .filter(|&k| (hint as usize) < mesh.num_inner || k < 3)
            .max_by(|&a, &b| weights[a].total_cmp(&weights[b]))
            .unwrap();
        assert!((weights[best] - 1.0).abs() < 1e-4);
        assert_eq!(located.vertices[best], index as u32);
    }

    // The centroid weights every site equally.
    let mut hint = 0u32;
    let weights = mesh.interpolation_factors(Vec3::splat(0.25), &mut hint);
    for k in 0..4 {
        assert!((weights[k] - 0.25).abs() < 1e-5, "weights = {weights:?}");
    }
}

#[test]
fn test_unit_cube() {
    let output = build(&unit_cube()).expect("build should succeed");
    let mesh = &output.mesh;

    assert!(mesh.ignored_vertices.is_empty());
    assert!(
        (5..=6).contains(&mesh.num_inner),
        "num_inner = {}",
        mesh.num_inner
    );
    // Twelve hull triangles, each with an extrapolation cell.
    assert_eq!(mesh.tetrahedra.len(), mesh.num_inner + 12);
    assert_adjacency(mesh);

    let mut hint = 0u32;
    let weights = mesh.interpolation_factors(Vec3::splat(0.5), &mut hint);
    assert!((weight_sum(weights) - 1.0).abs() < 1e-4);
    assert!(weights.min_element() >= -1e-4);
    for k in 0..4 {
        assert!(weights[k] <= 0.5 + 1e-3, "weights = {weights:?}");
    }

    // Interpolating the x coordinate reproduces it at the center.
    let xs: Vec<f32> = mesh.vertices.iter().map(|v| v.x).collect();
    let mut hint = 0u32;
    let x = mesh.sample(&xs, Vec3::splat(0.5), &mut hint);
    assert!((x - 0.5).abs() < 1e-3, "x = {x}");
}

#[test]
fn test_duplicate_site_ignored() {
    let mut sites = unit_tetrahedron();
    sites.push(sites[0]);

    let output = build(&sites).expect("build should succeed");
    let mesh = &output.mesh;

    // The later duplicate loses; the mesh matches the four-site build.
    assert_eq!(mesh.ignored_vertices, vec![4]);
    assert_eq!(mesh.num_inner, 1);
    assert_eq!(mesh.tetrahedra.len(), 5);
    assert_eq!(mesh.vertices.len(), 5);

    let mut hint = 0u32;
    let weights = mesh.interpolation_factors(Vec3::splat(0.25), &mut hint);
    assert!((weight_sum(weights) - 1.0).abs() < 1e-4);
}

#[test]
fn test_collinear_sites_rejected() {
    // Four sites on a line plus one off it: every four-subset contains
    // three collinear sites, so no cell with positive volume exists.
    let sites = vec![
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(2.0, 0.0, 0.0),
        Vec3::new(3.0, 0.0, 0.0),
        Vec3::new(1.5, 2.0, 0.5),
    ];
    let output = build(&sites).expect("build should succeed");
    let mesh = &output.mesh;

    assert_eq!(mesh.num_inner, 0);
    assert!(mesh.tetrahedra.is_empty());
    assert_eq!(mesh.ignored_vertices, vec![0, 1, 2, 3, 4]);

    let mut hint = 0u32;
    let weights = mesh.interpolation_factors(Vec3::splat(0.5), &mut hint);
    assert_eq!(weights, Vec4::ZERO);
}

#[test]
fn test_degenerate_sites_recover_with_volume() {
    // Two sites interior to an edge of an otherwise healthy simplex; the
    // mesh still builds and covers the hull.
    let mut sites = unit_tetrahedron();
    sites.push(Vec3::new(0.25, 0.0, 0.0));
    sites.push(Vec3::new(0.75, 0.0, 0.0));

    let output = build(&sites).expect("build should succeed");
    let mesh = &output.mesh;

    assert!(mesh.num_inner >= 1);
    assert_adjacency(mesh);

    let mut hint = 0u32;
    let weights = mesh.interpolation_factors(Vec3::new(0.2, 0.2, 0.2), &mut hint);
    assert!((weight_sum(weights) - 1.0).abs() < 1e-3);
    assert!(weights.min_element() >= -1e-3);
}

#[test]
fn test_coplanar_sites_rejected() {
    let sites = vec![
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
        Vec3::new(1.0, 1.0, 0.0),
    ];
    let output = build(&sites).expect("build should succeed");
    assert!(output.mesh.tetrahedra.is_empty());
    assert_eq!(output.mesh.ignored_vertices, vec![0, 1, 2, 3]);
}

#[test]
fn test_outer_extrapolation() {
    let output = build(&unit_cube()).expect("build should succeed");
    let mesh = &output.mesh;

    let mut hint = 0u32;
    let weights = mesh.interpolation_factors(Vec3::new(2.0, 0.5, 0.5), &mut hint);

    // The walk must settle in an extrapolation cell over the x = 1 face.
    assert!(
        (hint as usize) >= mesh.num_inner,
        "query settled in inner cell {hint}"
    );
    let tet = &mesh.tetrahedra[hint as usize];
    for k in 0..3 {
        let site = mesh.vertices[tet.vertices[k] as usize];
        assert!((site.x - 1.0).abs() < 1e-5, "base site {site:?}");
    }

    assert_eq!(weights.w, 0.0);
    assert!((weights.x + weights.y + weights.z - 1.0).abs() < 1e-3);
    assert!(weights.min_element() >= -1e-3, "weights = {weights:?}");
}

#[test]
fn test_query_on_shared_face() {
    let output = build(&unit_cube()).expect("build should succeed");
    let mesh = &output.mesh;

    // Find an interior face and query its midpoint; either side may answer,
    // with the opposite weight collapsing to zero.
    let (tet_index, slot) = mesh
        .tetrahedra
        .iter()
        .take(mesh.num_inner)
        .enumerate()
        .find_map(|(i, tet)| {
            (0..4)
                .find(|&k| {
                    tet.neighbors[k] != NO_INDEX && (tet.neighbors[k] as usize) < mesh.num_inner
                })
                .map(|k| (i, k))
        })
        .expect("cube mesh has interior faces");

    let face = mesh.tetrahedra[tet_index].face_indices(slot);
    let midpoint = face
        .iter()
        .map(|&v| mesh.vertices[v as usize])
        .fold(Vec3::ZERO, |acc, p| acc + p)
        / 3.0;

    let mut hint = 0u32;
    let weights = mesh.interpolation_factors(midpoint, &mut hint);
    assert!((weight_sum(weights) - 1.0).abs() < 1e-4);
    assert!(weights.min_element() >= -1e-4);
    assert!(weights.min_element() <= 1e-3, "weights = {weights:?}");
}

#[test]
fn test_query_at_hull_vertex() {
    let output = build(&unit_cube()).expect("build should succeed");
    let mesh = &output.mesh;

    let mut hint = 0u32;
    let weights = mesh.interpolation_factors(Vec3::new(1.0, 1.0, 1.0), &mut hint);
    assert!((weight_sum(weights) - 1.0).abs() < 1e-4);
    assert!(weights.min_element() >= -1e-4);
    assert!(weights.max_element() >= 1.0 - 1e-4, "weights = {weights:?}");
}

#[test]
fn test_hint_idempotence() {
    let output = build(&unit_cube()).expect("build should succeed");
    let mesh = &output.mesh;

    let mut hint = 0u32;
    let position = Vec3::new(0.3, 0.6, 0.2);
    let first = mesh.interpolation_factors(position, &mut hint);
    let settled = hint;
    let second = mesh.interpolation_factors(position, &mut hint);
    assert_eq!(first, second);
    assert_eq!(settled, hint);
}

#[test]
fn test_random_cloud_properties() {
    let sites = random_box_points(48, 12345);
    let output = build(&sites).expect("build should succeed");
    let mesh = &output.mesh;

    assert!(mesh.num_inner > 0);
    assert_adjacency(mesh);

    // Every accepted site takes part in at least one cell.
    let mut referenced = vec![false; mesh.vertices.len()];
    for tet in &mesh.tetrahedra {
        for &v in &tet.vertices {
            if (v as usize) < referenced.len() {
                referenced[v as usize] = true;
            }
        }
    }
    for index in 0..mesh.vertices.len() {
        let ignored = mesh.ignored_vertices.contains(&(index as u32));
        assert!(
            referenced[index] || ignored,
            "site {index} is neither used nor ignored"
        );
    }

    // No accepted site sits inside another cell's circumsphere.
    for tet_index in 0..mesh.num_inner {
        let sphere = mesh.circumsphere(tet_index);
        let tet = &mesh.tetrahedra[tet_index];
        for index in 0..mesh.vertices.len() {
            if tet.vertices.contains(&(index as u32))
                || mesh.ignored_vertices.contains(&(index as u32))
            {
                continue;
            }
            let distance = sphere.distance(mesh.vertices[index]);
            assert!(
                distance >= -1e-3,
                "site {index} is {distance} inside circumsphere of cell {tet_index}"
            );
        }
    }

    // Interior queries partition unity and reproduce positions.
    let mut hint = 0u32;
    for tet_index in 0..mesh.num_inner {
        let tet = &mesh.tetrahedra[tet_index];
        let centroid = tet
            .vertices
            .iter()
            .map(|&v| mesh.vertices[v as usize])
            .fold(Vec3::ZERO, |acc, p| acc + p)
            / 4.0;

        let weights = mesh.interpolation_factors(centroid, &mut hint);
        assert!((weight_sum(weights) - 1.0).abs() < 1e-3);
        assert!(weights.min_element() >= -1e-4, "weights = {weights:?}");

        let reproduced = mesh.sample(&mesh.vertices, centroid, &mut hint);
        assert!(
            (reproduced - centroid).length() < 5e-3,
            "sampled {reproduced:?} for {centroid:?}"
        );
    }
}

#[test]
fn test_empty_and_tiny_inputs() {
    let output = build::<Vec3>(&[]).expect("empty input is valid");
    assert!(output.mesh.vertices.is_empty());
    assert!(output.mesh.tetrahedra.is_empty());
    let mut hint = 0u32;
    assert_eq!(
        output.mesh.interpolation_factors(Vec3::ZERO, &mut hint),
        Vec4::ZERO
    );

    let output = build(&[Vec3::splat(0.5)]).expect("single site is valid");
    assert_eq!(output.mesh.vertices.len(), 1);
    assert!(output.mesh.tetrahedra.is_empty());
    assert_eq!(output.mesh.ignored_vertices, vec![0]);

    let output = build(&[Vec3::ZERO, Vec3::ONE]).expect("two sites are valid");
    assert!(output.mesh.tetrahedra.is_empty());
    assert_eq!(output.mesh.ignored_vertices, vec![0, 1]);
}

#[test]
fn test_non_finite_input_rejected() {
    let sites = vec![Vec3::ZERO, Vec3::new(f32::NAN, 0.0, 0.0)];
    assert!(matches!(
        build(&sites),
        Err(MeshError::NonFinitePosition(1))
    ));
}

#[test]
fn test_array_input() {
    let sites: Vec<[f32; 3]> = vec![
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
    ];
    let output = build(&sites).expect("build should succeed");
    assert_eq!(output.mesh.num_inner, 1);
}

#[test]
fn test_collect_edges_cube() {
    let output = build(&unit_cube()).expect("build should succeed");
    let edges = output.mesh.collect_edges();

    // 12 box edges, 6 face diagonals, plus any interior diagonal.
    assert!(edges.len() >= 18, "{} edges", edges.len());
    assert!(edges.windows(2).all(|w| w[0] < w[1]));
    for &(a, b) in &edges {
        assert!(a < b);
        assert!((b as usize) < output.mesh.vertices.len());
    }
}
