//! One resolution step of the hierarchy.

use nalgebra::Vector3;

use super::color::Color;
use super::connectivity::Connectivity;
use crate::error::Result;
use crate::mesh::{validate_topology, Face, GeometrySource};

/// A level vertex: position plus the base-mesh vertex flags.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LevelVertex {
    /// Position.
    pub co: Vector3<f32>,
    /// `SELECT` / `ME_HIDE` bits.
    pub flag: u8,
}

/// A level face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LevelFace {
    /// Corner vertex indices; the fourth is unused for triangles.
    pub v: [u32; 4],
    /// True if the fourth corner is used.
    pub quad: bool,
    /// Face flags.
    pub flag: u8,
    /// Material slot.
    pub mat_nr: u16,
    /// Index of this face's center vertex in the next level.
    pub mid: u32,
}

impl LevelFace {
    /// Number of corners.
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
}

impl From<Face> for LevelFace {
    fn from(f: Face) -> Self {
        Self {
            v: f.v,
            quad: f.quad,
            flag: f.flag,
            mat_nr: f.mat_nr,
            mid: 0,
        }
    }
}

/// A level edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LevelEdge {
    /// Endpoint vertex indices.
    pub v: [u32; 2],
    /// Index of this edge's midpoint vertex in the next level.
    pub mid: u32,
}

/// The four corner colors of a face.
pub type ColFace = [Color; 4];

/// Vertex, edge and face buffers of one subdivision depth.
///
/// The connectivity maps are transient: [`Level::build_connectivity`] fills
/// them right before an algorithm needs them and [`Level::free_connectivity`]
/// drops them. Cloning a level never copies them.
#[derive(Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Level {
    /// Vertices.
    pub verts: Vec<LevelVertex>,
    /// Faces.
    pub faces: Vec<LevelFace>,
    /// Edges.
    pub edges: Vec<LevelEdge>,
    /// Corner colors aligned with `faces`, present once colors are loaded.
    pub colfaces: Option<Vec<ColFace>>,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub(super) connectivity: Option<Connectivity>,
}

impl Clone for Level {
    fn clone(&self) -> Self {
        Self {
            verts: self.verts.clone(),
            faces: self.faces.clone(),
            edges: self.edges.clone(),
            colfaces: self.colfaces.clone(),
            connectivity: None,
        }
    }
}

impl PartialEq for Level {
    fn eq(&self, other: &Self) -> bool {
        self.verts == other.verts
            && self.faces == other.faces
            && self.edges == other.edges
            && self.colfaces == other.colfaces
    }
}

impl Level {
    /// Copies the vertex, edge and face streams of `source` into a new level.
    pub fn from_source<S: GeometrySource + ?Sized>(source: &S) -> Result<Self> {
        let verts: Vec<_> = (0..source.num_vertices()).map(|i| source.vertex(i)).collect();
        let edges: Vec<_> = (0..source.num_edges()).map(|i| source.edge(i)).collect();
        let faces: Vec<_> = (0..source.num_faces()).map(|i| source.face(i)).collect();
        validate_topology(verts.len(), &edges, &faces)?;

        Ok(Self {
            verts: verts
                .iter()
                .map(|v| LevelVertex { co: v.co, flag: v.flag })
                .collect(),
            faces: faces.into_iter().map(LevelFace::from).collect(),
            edges: edges
                .iter()
                .map(|e| LevelEdge { v: e.v, mid: 0 })
                .collect(),
            colfaces: None,
            connectivity: None,
        })
    }

    /// Number of vertices.
    pub fn totvert(&self) -> usize {
        self.verts.len()
    }

    /// Number of edges.
    pub fn totedge(&self) -> usize {
        self.edges.len()
    }

    /// Number of faces.
    pub fn totface(&self) -> usize {
        self.faces.len()
    }

    /// Vertex positions.
    pub fn positions(&self) -> Vec<Vector3<f32>> {
        self.verts.iter().map(|v| v.co).collect()
    }

    /// Builds the transient adjacency maps, replacing any previous ones.
    ///
    /// `prev_totedge` is the edge count of the next-coarser level, if any; it
    /// bounds which edges get a boundary test.
    pub fn build_connectivity(&mut self, prev_totedge: Option<usize>) {
        self.connectivity = Some(Connectivity::build(self, prev_totedge));
    }

    /// Drops the transient adjacency maps. Freeing twice is a no-op.
    pub fn free_connectivity(&mut self) {
        self.connectivity = None;
    }

    /// The adjacency maps, if built.
    pub fn connectivity(&self) -> Option<&Connectivity> {
        self.connectivity.as_ref()
    }

    /// Runs `f` with freshly built adjacency maps that are dropped on return.
    pub(crate) fn with_connectivity<R>(
        &self,
        prev_totedge: Option<usize>,
        f: impl FnOnce(&Connectivity) -> R,
    ) -> R {
        match &self.connectivity {
            Some(conn) => f(conn),
            None => f(&Connectivity::build(self, prev_totedge)),
        }
    }
}
