//! Binary persisted layout.
//!
//! Little-endian throughout; every sequence is prefixed with a `u32`
//! length. Sentinel indices are stored as-is, so the layout round-trips
//! exactly. Deserialization validates index ranges and reports malformed
//! input as `InvalidData`.

use std::io::{self, Read, Write};

use glam::{Affine3A, Vec3};

use crate::mesh::{TetrahedralMesh, Tetrahedron, NO_INDEX};

fn invalid(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

fn write_u32<W: Write>(writer: &mut W, value: u32) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

fn write_f32<W: Write>(writer: &mut W, value: f32) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

fn write_vec3<W: Write>(writer: &mut W, value: Vec3) -> io::Result<()> {
    write_f32(writer, value.x)?;
    write_f32(writer, value.y)?;
    write_f32(writer, value.z)
}

fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_f32<R: Read>(reader: &mut R) -> io::Result<f32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

fn read_vec3<R: Read>(reader: &mut R) -> io::Result<Vec3> {
    Ok(Vec3::new(
        read_f32(reader)?,
        read_f32(reader)?,
        read_f32(reader)?,
    ))
}

/// Serialize a mesh.
pub fn write_mesh<W: Write>(writer: &mut W, mesh: &TetrahedralMesh) -> io::Result<()> {
    write_u32(writer, mesh.vertices.len() as u32)?;
    for &vertex in &mesh.vertices {
        write_vec3(writer, vertex)?;
    }

    write_u32(writer, mesh.tetrahedra.len() as u32)?;
    for tet in &mesh.tetrahedra {
        for &v in &tet.vertices {
            write_u32(writer, v)?;
        }
        for &n in &tet.neighbors {
            write_u32(writer, n)?;
        }
        for value in tet.matrix.to_cols_array() {
            write_f32(writer, value)?;
        }
    }

    write_u32(writer, mesh.hull_normals.len() as u32)?;
    for &normal in &mesh.hull_normals {
        write_vec3(writer, normal)?;
    }

    write_u32(writer, mesh.num_inner as u32)?;

    write_u32(writer, mesh.ignored_vertices.len() as u32)?;
    for &index in &mesh.ignored_vertices {
        write_u32(writer, index)?;
    }
    Ok(())
}

/// Deserialize a mesh written by [`write_mesh`].
pub fn read_mesh<R: Read>(reader: &mut R) -> io::Result<TetrahedralMesh> {
    let vertex_count = read_u32(reader)? as usize;
    let mut vertices = Vec::with_capacity(vertex_count);
    for _ in 0..vertex_count {
        vertices.push(read_vec3(reader)?);
    }

    let tet_count = read_u32(reader)? as usize;
    let mut tetrahedra = Vec::with_capacity(tet_count);
    for _ in 0..tet_count {
        let mut tet = Tetrahedron::new([0; 4]);
        for (slot, v) in tet.vertices.iter_mut().enumerate() {
            *v = read_u32(reader)?;
            let is_sentinel = *v >= Tetrahedron::INFINITY2;
            if (*v as usize) >= vertex_count && !(slot == 3 && is_sentinel) {
                return Err(invalid("tetrahedron vertex index out of range"));
            }
        }
        for n in tet.neighbors.iter_mut() {
            *n = read_u32(reader)?;
            if *n != NO_INDEX && (*n as usize) >= tet_count {
                return Err(invalid("tetrahedron neighbor index out of range"));
            }
        }
        let mut matrix = [0.0f32; 12];
        for value in matrix.iter_mut() {
            *value = read_f32(reader)?;
        }
        tet.matrix = Affine3A::from_cols_array(&matrix);
        tetrahedra.push(tet);
    }

    let normal_count = read_u32(reader)? as usize;
    if normal_count != vertex_count {
        return Err(invalid("hull normal count does not match vertex count"));
    }
    let mut hull_normals = Vec::with_capacity(normal_count);
    for _ in 0..normal_count {
        hull_normals.push(read_vec3(reader)?);
    }

    let num_inner = read_u32(reader)? as usize;
    if num_inner > tet_count {
        return Err(invalid("inner tetrahedron count exceeds total"));
    }

    let ignored_count = read_u32(reader)? as usize;
    let mut ignored_vertices = Vec::with_capacity(ignored_count);
    for _ in 0..ignored_count {
        let index = read_u32(reader)?;
        if (index as usize) >= vertex_count {
            return Err(invalid("ignored vertex index out of range"));
        }
        ignored_vertices.push(index);
    }

    Ok(TetrahedralMesh {
        vertices,
        tetrahedra,
        hull_normals,
        ignored_vertices,
        num_inner,
    })
}
