//! Catmull-Clark stencils.
//!
//! Each stencil reads one coordinate axis out of a [`MultiApplyData`] bundle
//! and returns the smoothed scalar; [`multi_apply`] runs it over x, y and z.
//! The same stencils smooth positions when a level is added and smooth
//! position deltas when edits are pushed to finer levels.

use nalgebra::Vector3;

use super::connectivity::Connectivity;
use super::level::{Level, LevelEdge, LevelFace};
use super::SubdivisionKind;

/// Inputs of the face, edge and vertex stencils.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MultiApplyData {
    /// Face corners; the fourth is ignored unless `quad`.
    pub corners: [Vector3<f32>; 4],
    /// True if the face has four corners.
    pub quad: bool,

    /// True if the edge (or vertex) lies on the mesh border.
    pub boundary: bool,
    /// Sum of the centers of faces sharing the edge.
    pub edge_face_neighbor_midpoints_accum: Vector3<f32>,
    /// Number of faces sharing the edge.
    pub edge_face_neighbor_midpoints_total: usize,
    /// Edge endpoints.
    pub endpoints: [Vector3<f32>; 2],

    /// The vertex's own value.
    pub original: Vector3<f32>,
    /// Number of edges incident to the vertex.
    pub edge_count: usize,
    /// Average center of the vertex's faces.
    pub vert_face_neighbor_midpoints_average: Vector3<f32>,
    /// Average midpoint of the vertex's edges.
    pub vert_edge_neighbor_midpoints_average: Vector3<f32>,
    /// Average far endpoint of the vertex's boundary edges.
    pub boundary_edges_average: Vector3<f32>,
}

/// A per-axis stencil.
pub type Stencil = fn(&MultiApplyData, usize) -> f32;

/// Mean of the face corners.
pub fn smooth_face(data: &MultiApplyData, i: usize) -> f32 {
    let total = data.corners[0][i] + data.corners[1][i] + data.corners[2][i];
    if data.quad {
        (total + data.corners[3][i]) / 4.0
    } else {
        total / 3.0
    }
}

/// Mean of the endpoints, plus the adjacent face centers for interior edges.
pub fn smooth_edge(data: &MultiApplyData, i: usize) -> f32 {
    let mut accum = data.endpoints[0][i] + data.endpoints[1][i];
    let mut count = 2;

    if !data.boundary {
        accum += data.edge_face_neighbor_midpoints_accum[i];
        count += data.edge_face_neighbor_midpoints_total;
    }

    accum / count as f32
}

/// Boundary rule `3/4 v + 1/4 avg(neighbors)`, or the interior mask
/// `(F + 2R + (n - 3) v) / n`.
pub fn smooth_vert(data: &MultiApplyData, i: usize) -> f32 {
    if data.boundary {
        data.original[i] * 0.75 + data.boundary_edges_average[i] * 0.25
    } else {
        let n = data.edge_count as f32;
        (data.vert_face_neighbor_midpoints_average[i]
            + 2.0 * data.vert_edge_neighbor_midpoints_average[i]
            + data.original[i] * (n - 3.0))
            / n
    }
}

/// Evaluates `stencil` once per axis.
pub fn multi_apply(data: &MultiApplyData, stencil: Stencil) -> Vector3<f32> {
    Vector3::new(stencil(data, 0), stencil(data, 1), stencil(data, 2))
}

impl MultiApplyData {
    /// Face stencil inputs for `face`, reading corners through `value`.
    pub fn face(face: &LevelFace, value: impl Fn(u32) -> Vector3<f32>) -> Self {
        let mut corners = [Vector3::zeros(); 4];
        for (c, &v) in corners.iter_mut().zip(face.verts()) {
            *c = value(v);
        }
        Self {
            corners,
            quad: face.quad,
            ..Default::default()
        }
    }

    /// Accumulates the centers (read through `mid`) of faces sharing `e`.
    pub fn edge_face_neighbor_midpoints_accum(
        &mut self,
        level: &Level,
        conn: &Connectivity,
        mid: impl Fn(u32) -> Vector3<f32>,
        e: &LevelEdge,
    ) {
        let mut accum = Vector3::zeros();
        let mut count = 0;
        for f in conn.shared_faces(e.v[0], e.v[1]) {
            accum += mid(level.faces[f as usize].mid);
            count += 1;
        }
        self.edge_face_neighbor_midpoints_accum = accum;
        self.edge_face_neighbor_midpoints_total = count;
    }

    /// Averages the centers (read through `mid`) of the faces around `v`.
    pub fn vert_face_neighbor_midpoints_average(
        &mut self,
        level: &Level,
        conn: &Connectivity,
        mid: impl Fn(u32) -> Vector3<f32>,
        v: u32,
    ) {
        let faces = &conn.vert_face_map[v as usize];
        let sum: Vector3<f32> = faces
            .iter()
            .map(|&f| mid(level.faces[f as usize].mid))
            .sum();
        self.vert_face_neighbor_midpoints_average = sum / faces.len() as f32;
    }

    /// Averages the midpoints of the edges around `v`.
    pub fn vert_edge_neighbor_midpoints_average(
        &mut self,
        level: &Level,
        conn: &Connectivity,
        value: impl Fn(u32) -> Vector3<f32>,
        v: u32,
    ) {
        let edges = &conn.vert_edge_map[v as usize];
        let sum: Vector3<f32> = edges
            .iter()
            .map(|&e| {
                let e = &level.edges[e as usize];
                (value(e.v[0]) + value(e.v[1])) / 2.0
            })
            .sum();
        self.vert_edge_neighbor_midpoints_average = sum / edges.len() as f32;
    }

    /// Averages the far endpoints of the boundary edges around `v`.
    pub fn boundary_edges_average(
        &mut self,
        level: &Level,
        conn: &Connectivity,
        value: impl Fn(u32) -> Vector3<f32>,
        v: u32,
    ) {
        let mut sum = Vector3::zeros();
        let mut count = 0;
        for &ei in &conn.vert_edge_map[v as usize] {
            if conn.edge_boundary[ei as usize] {
                let e = &level.edges[ei as usize];
                let end = if e.v[0] == v { e.v[1] } else { e.v[0] };
                sum += value(end);
                count += 1;
            }
        }
        self.boundary_edges_average = sum / count as f32;
    }
}

/// Computes the next level's values from `old` (indexed by `prev`'s vertices)
/// into `out` (indexed by the next level's vertices).
///
/// Face centers are written first, then edge points (which read those
/// centers), then the existing vertices. [`SubdivisionKind::Simple`] keeps
/// edge midpoints and leaves existing vertices unchanged. Vertices with no
/// edges keep their value.
pub(crate) fn smooth_level(
    prev: &Level,
    conn: &Connectivity,
    old: &[Vector3<f32>],
    out: &mut [Vector3<f32>],
    kind: SubdivisionKind,
) {
    let at = |v: u32| old[v as usize];

    for f in &prev.faces {
        let data = MultiApplyData::face(f, at);
        out[f.mid as usize] = multi_apply(&data, smooth_face);
    }

    if kind == SubdivisionKind::Simple {
        for e in &prev.edges {
            out[e.mid as usize] = (at(e.v[0]) + at(e.v[1])) / 2.0;
        }
        out[..prev.totvert()].copy_from_slice(&old[..prev.totvert()]);
        return;
    }

    for (i, e) in prev.edges.iter().enumerate() {
        let mut data = MultiApplyData {
            boundary: conn.edge_boundary[i],
            endpoints: [at(e.v[0]), at(e.v[1])],
            ..Default::default()
        };
        data.edge_face_neighbor_midpoints_accum(prev, conn, |m| out[m as usize], e);
        out[e.mid as usize] = multi_apply(&data, smooth_edge);
    }

    for v in 0..prev.totvert() as u32 {
        let edge_count = conn.vert_edge_map[v as usize].len();
        if edge_count == 0 {
            out[v as usize] = at(v);
            continue;
        }

        let mut data = MultiApplyData {
            boundary: conn.is_boundary_vert(v),
            original: at(v),
            edge_count,
            ..Default::default()
        };
        if data.boundary {
            data.boundary_edges_average(prev, conn, at, v);
        } else {
            data.vert_face_neighbor_midpoints_average(prev, conn, |m| out[m as usize], v);
            data.vert_edge_neighbor_midpoints_average(prev, conn, at, v);
        }
        out[v as usize] = multi_apply(&data, smooth_vert);
    }
}
