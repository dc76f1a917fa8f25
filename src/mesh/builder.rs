//! Mesh construction utilities.
//!
//! File formats and test fixtures describe meshes as positions plus
//! face-vertex lists. The multires hierarchy also needs an explicit edge
//! list, which is derived here from the face sides.

use std::collections::HashMap;

use nalgebra::Vector3;

use super::{validate_topology, Edge, Face, Mesh, Vertex};
use crate::error::{MultiresError, Result};

/// Build a mesh from vertex positions and triangle/quad polygons.
///
/// Edges are generated from face sides in first-use order.
///
/// # Example
/// ```
/// use multires::mesh::build_from_polygons;
/// use nalgebra::Vector3;
///
/// let positions = vec![
///     Vector3::new(0.0, 0.0, 0.0),
///     Vector3::new(1.0, 0.0, 0.0),
///     Vector3::new(0.5, 1.0, 0.0),
/// ];
/// let mesh = build_from_polygons(&positions, &[vec![0, 1, 2]]).unwrap();
/// assert_eq!(mesh.num_faces(), 1);
/// assert_eq!(mesh.num_edges(), 3);
/// ```
pub fn build_from_polygons(positions: &[Vector3<f32>], polygons: &[Vec<usize>]) -> Result<Mesh> {
    if positions.is_empty() {
        return Err(MultiresError::EmptyMesh);
    }

    let mut faces = Vec::with_capacity(polygons.len());
    for (fi, poly) in polygons.iter().enumerate() {
        for &vi in poly {
            if vi >= positions.len() {
                return Err(MultiresError::InvalidVertexIndex { face: fi, vertex: vi });
            }
        }
        let face = match poly.as_slice() {
            &[a, b, c] => Face::tri(a as u32, b as u32, c as u32),
            &[a, b, c, d] => Face::quad(a as u32, b as u32, c as u32, d as u32),
            other => {
                return Err(MultiresError::InvalidFace {
                    face: fi,
                    sides: other.len(),
                })
            }
        };
        faces.push(face);
    }

    let edges = make_edges(&faces);
    validate_topology(positions.len(), &edges, &faces)?;

    let verts = positions.iter().map(|&co| Vertex::new(co)).collect();
    Ok(Mesh::from_parts(verts, edges, faces))
}

/// Derive the unique undirected edges of `faces`.
pub fn make_edges(faces: &[Face]) -> Vec<Edge> {
    let mut seen: HashMap<(u32, u32), usize> = HashMap::new();
    let mut edges = Vec::new();

    for f in faces {
        let verts = f.verts();
        for j in 0..verts.len() {
            let a = verts[j];
            let b = verts[(j + 1) % verts.len()];
            let key = (a.min(b), a.max(b));
            seen.entry(key).or_insert_with(|| {
                edges.push(Edge::new(a, b));
                edges.len() - 1
            });
        }
    }

    edges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_positions() -> Vec<Vector3<f32>> {
        (0..3)
            .flat_map(|y| (0..3).map(move |x| Vector3::new(x as f32, y as f32, 0.0)))
            .collect()
    }

    #[test]
    fn test_shared_edges_are_unique() {
        let polys = vec![
            vec![0, 1, 4, 3],
            vec![1, 2, 5, 4],
            vec![3, 4, 7, 6],
            vec![4, 5, 8, 7],
        ];
        let mesh = build_from_polygons(&grid_positions(), &polys).unwrap();
        assert_eq!(mesh.num_faces(), 4);
        assert_eq!(mesh.num_edges(), 12);
    }

    #[test]
    fn test_rejects_pentagon() {
        let result = build_from_polygons(&grid_positions(), &[vec![0, 1, 2, 5, 4]]);
        assert!(matches!(result, Err(MultiresError::InvalidFace { face: 0, sides: 5 })));
    }

    #[test]
    fn test_rejects_out_of_range() {
        let result = build_from_polygons(&grid_positions(), &[vec![0, 1, 42]]);
        assert!(matches!(
            result,
            Err(MultiresError::InvalidVertexIndex { face: 0, vertex: 42 })
        ));
    }

    #[test]
    fn test_empty_positions() {
        assert!(matches!(build_from_polygons(&[], &[]), Err(MultiresError::EmptyMesh)));
    }
}
