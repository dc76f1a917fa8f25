//! Base mesh and edit-mesh collaborators.
//!
//! The multires engine synchronizes its level hierarchy against a flat
//! vertex/edge/face mesh ([`Mesh`]) or, while an editing session is active,
//! against an [`EditMesh`]. Both are read through the [`GeometrySource`]
//! trait so the engine never cares which one is live.
//!
//! Faces are triangles or quads. Per-element attributes that are not part of
//! the geometry itself (deformation weights, UVs, vertex colors, displacement
//! grids) live in [`CustomData`] layers.
//!
//! ```
//! use multires::mesh::{build_from_polygons, Mesh};
//! use nalgebra::Vector3;
//!
//! let positions = vec![
//!     Vector3::new(0.0, 0.0, 0.0),
//!     Vector3::new(1.0, 0.0, 0.0),
//!     Vector3::new(1.0, 1.0, 0.0),
//!     Vector3::new(0.0, 1.0, 0.0),
//! ];
//! let mesh: Mesh = build_from_polygons(&positions, &[vec![0, 1, 2, 3]]).unwrap();
//! assert_eq!(mesh.num_edges(), 4);
//! ```

mod builder;
mod custom_data;
mod edit;
mod source;

pub use builder::{build_from_polygons, make_edges};
pub use custom_data::{CustomData, DeformVert, DeformWeight, Layer, LayerData, LayerType, MCol, TexFace};
pub use edit::{EditEdge, EditFace, EditMesh, EditVert};
pub use source::{EditSource, GeometrySource, Notifier, NullNotifier, Session};

use nalgebra::Vector3;

use crate::error::{MultiresError, Result};

/// Vertex flag: selected.
pub const SELECT: u8 = 1;
/// Element flag shared by vertices, edges and faces: hidden.
pub const ME_HIDE: u8 = 16;

/// Edge flag: drawn in the wireframe.
pub const ME_EDGEDRAW: u16 = 2;
/// Edge flag: UV seam.
pub const ME_SEAM: u16 = 4;
/// Edge flag: internal edge of an n-gon fan.
pub const ME_FGON: u16 = 8;
/// Edge flag: rendered as wire.
pub const ME_EDGERENDER: u16 = 32;
/// Edge flag: used by no face.
pub const ME_LOOSEEDGE: u16 = 128;
/// Edge flag: sharp edge for auto-smooth.
pub const ME_SHARP: u16 = 512;

/// Face flag: smooth shaded.
pub const ME_SMOOTH: u8 = 1;
/// Face flag: selected.
pub const ME_FACE_SEL: u8 = 2;

/// A mesh vertex: position, cached normal and flags.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vertex {
    /// Position.
    pub co: Vector3<f32>,
    /// Vertex normal, refreshed by [`Mesh::calc_normals`].
    pub no: Vector3<f32>,
    /// [`SELECT`] / [`ME_HIDE`] bits.
    pub flag: u8,
}

impl Vertex {
    /// Creates an unflagged vertex at `co`.
    pub fn new(co: Vector3<f32>) -> Self {
        Self {
            co,
            no: Vector3::zeros(),
            flag: 0,
        }
    }
}

/// A mesh edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Edge {
    /// Endpoint vertex indices.
    pub v: [u32; 2],
    /// Subdivision crease, 0..=255.
    pub crease: u8,
    /// `ME_*` edge flags.
    pub flag: u16,
}

impl Edge {
    /// Creates an edge drawn and rendered by default.
    pub fn new(v0: u32, v1: u32) -> Self {
        Self {
            v: [v0, v1],
            crease: 0,
            flag: ME_EDGEDRAW | ME_EDGERENDER,
        }
    }

    /// True if the edge connects `a` and `b` in either direction.
    pub fn connects(&self, a: u32, b: u32) -> bool {
        (self.v[0] == a && self.v[1] == b) || (self.v[0] == b && self.v[1] == a)
    }
}

/// A triangle or quad face.
///
/// For triangles the fourth slot of `v` is unused and kept at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Face {
    /// Corner vertex indices.
    pub v: [u32; 4],
    /// True if the fourth corner is used.
    pub quad: bool,
    /// [`ME_SMOOTH`] / [`ME_FACE_SEL`] / [`ME_HIDE`] bits.
    pub flag: u8,
    /// Material slot.
    pub mat_nr: u16,
}

impl Face {
    /// Creates a triangle.
    pub fn tri(a: u32, b: u32, c: u32) -> Self {
        Self {
            v: [a, b, c, 0],
            quad: false,
            ..Default::default()
        }
    }

    /// Creates a quad.
    pub fn quad(a: u32, b: u32, c: u32, d: u32) -> Self {
        Self {
            v: [a, b, c, d],
            quad: true,
            ..Default::default()
        }
    }

    /// Number of corners (3 or 4).
    #[inline]
    pub fn sides(&self) -> usize {
        if self.quad {
            4
        } else {
            3
        }
    }

    /// The used corner indices.
    #[inline]
    pub fn verts(&self) -> &[u32] {
        &self.v[..self.sides()]
    }

    /// Corner index of vertex `v`, if the face uses it.
    pub fn corner_of(&self, v: u32) -> Option<usize> {
        self.verts().iter().position(|&c| c == v)
    }
}

/// Normal of a triangle or quad given its corner positions.
///
/// Quads use the cross product of the diagonals. Degenerate faces yield a zero vector.
pub fn face_normal(a: &Vector3<f32>, b: &Vector3<f32>, c: &Vector3<f32>, d: Option<&Vector3<f32>>) -> Vector3<f32> {
    let n = match d {
        Some(d) => (a - c).cross(&(b - d)),
        None => (a - b).cross(&(b - c)),
    };
    n.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::zeros)
}

/// Center of a triangle or quad.
pub fn face_center(a: &Vector3<f32>, b: &Vector3<f32>, c: &Vector3<f32>, d: Option<&Vector3<f32>>) -> Vector3<f32> {
    match d {
        Some(d) => (a + b + c + d) * 0.25,
        None => (a + b + c) / 3.0,
    }
}

/// Builds the per-vertex list of incident faces.
pub fn create_vert_face_map(faces: &[Face], totvert: usize) -> Vec<Vec<u32>> {
    let mut map = vec![Vec::new(); totvert];
    for (i, f) in faces.iter().enumerate() {
        for &v in f.verts() {
            map[v as usize].push(i as u32);
        }
    }
    map
}

/// The base mesh: flat vertex, edge and face arrays plus attribute layers.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mesh {
    /// Vertices.
    pub verts: Vec<Vertex>,
    /// Edges.
    pub edges: Vec<Edge>,
    /// Faces.
    pub faces: Vec<Face>,
    /// Per-vertex attribute layers.
    pub vdata: CustomData,
    /// Per-face attribute layers.
    pub fdata: CustomData,
}

impl Mesh {
    /// Creates an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mesh from raw buffers and computes normals.
    pub fn from_parts(verts: Vec<Vertex>, edges: Vec<Edge>, faces: Vec<Face>) -> Self {
        let mut mesh = Self {
            verts,
            edges,
            faces,
            ..Default::default()
        };
        mesh.calc_normals();
        mesh
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.verts.len()
    }

    /// Number of edges.
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Number of faces.
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Vertex positions.
    pub fn positions(&self) -> Vec<Vector3<f32>> {
        self.verts.iter().map(|v| v.co).collect()
    }

    /// Normal of face `f` from current positions.
    pub fn face_normal(&self, f: usize) -> Vector3<f32> {
        let face = &self.faces[f];
        let co = |j: usize| &self.verts[face.v[j] as usize].co;
        face_normal(co(0), co(1), co(2), face.quad.then(|| co(3)))
    }

    /// Replaces the geometry buffers wholesale and recomputes normals.
    ///
    /// Attribute layers are left untouched; the caller resizes them.
    pub fn replace_geometry(&mut self, verts: Vec<Vertex>, edges: Vec<Edge>, faces: Vec<Face>) {
        self.verts = verts;
        self.edges = edges;
        self.faces = faces;
        self.calc_normals();
    }

    /// Recomputes vertex normals as the normalized sum of incident face normals.
    ///
    /// Vertices used by no face point away from the origin.
    pub fn calc_normals(&mut self) {
        let normals = self.vertex_normals();
        for (vert, n) in self.verts.iter_mut().zip(normals) {
            vert.no = n;
        }
    }

    /// Vertex normals from current positions, without storing them.
    pub fn vertex_normals(&self) -> Vec<Vector3<f32>> {
        let mut acc = vec![Vector3::<f32>::zeros(); self.verts.len()];
        for f in 0..self.faces.len() {
            let n = self.face_normal(f);
            for &v in self.faces[f].verts() {
                acc[v as usize] += n;
            }
        }
        acc.into_iter()
            .zip(&self.verts)
            .map(|(n, vert)| {
                n.try_normalize(f32::EPSILON)
                    .or_else(|| vert.co.try_normalize(f32::EPSILON))
                    .unwrap_or_else(Vector3::zeros)
            })
            .collect()
    }

    /// Checks that every element references existing vertices and that faces are
    /// non-degenerate triangles or quads.
    pub fn validate(&self) -> Result<()> {
        validate_topology(self.verts.len(), &self.edges, &self.faces)
    }
}

pub(crate) fn validate_topology(totvert: usize, edges: &[Edge], faces: &[Face]) -> Result<()> {
    if totvert == 0 {
        return Err(MultiresError::EmptyMesh);
    }
    for (i, e) in edges.iter().enumerate() {
        for &v in &e.v {
            if v as usize >= totvert {
                return Err(MultiresError::InvalidVertexIndex {
                    face: i,
                    vertex: v as usize,
                });
            }
        }
    }
    for (i, f) in faces.iter().enumerate() {
        let verts = f.verts();
        for &v in verts {
            if v as usize >= totvert {
                return Err(MultiresError::InvalidVertexIndex {
                    face: i,
                    vertex: v as usize,
                });
            }
        }
        for (j, &a) in verts.iter().enumerate() {
            if verts[j + 1..].contains(&a) {
                return Err(MultiresError::DegenerateFace { face: i });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_quad() -> Mesh {
        let positions = [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
        ];
        build_from_polygons(&positions, &[vec![0, 1, 2, 3]]).unwrap()
    }

    #[test]
    fn test_quad_normal_points_up() {
        let mesh = unit_quad();
        let n = mesh.face_normal(0);
        assert!((n - Vector3::new(0.0, 0.0, 1.0)).norm() < 1e-6);
        for v in &mesh.verts {
            assert!((v.no - n).norm() < 1e-6);
        }
    }

    #[test]
    fn test_triangle_normal_matches_winding() {
        let a = Vector3::new(0.0, 0.0, 0.0);
        let b = Vector3::new(1.0, 0.0, 0.0);
        let c = Vector3::new(0.0, 1.0, 0.0);
        let n = face_normal(&a, &b, &c, None);
        assert!((n - Vector3::new(0.0, 0.0, 1.0)).norm() < 1e-6);
    }

    #[test]
    fn test_vert_face_map() {
        let faces = vec![Face::quad(0, 1, 2, 3), Face::tri(1, 4, 2)];
        let map = create_vert_face_map(&faces, 5);
        assert_eq!(map[0], vec![0]);
        assert_eq!(map[1], vec![0, 1]);
        assert_eq!(map[4], vec![1]);
    }

    #[test]
    fn test_validate_rejects_bad_index() {
        let mut mesh = unit_quad();
        mesh.faces[0].v[2] = 9;
        assert!(matches!(
            mesh.validate(),
            Err(MultiresError::InvalidVertexIndex { face: 0, vertex: 9 })
        ));
    }

    #[test]
    fn test_validate_rejects_degenerate() {
        let mut mesh = unit_quad();
        mesh.faces[0].v[3] = 0;
        assert!(matches!(mesh.validate(), Err(MultiresError::DegenerateFace { face: 0 })));
    }
}
