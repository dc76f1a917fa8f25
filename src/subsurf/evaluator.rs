//! Built-in Catmull-Clark evaluator.

use tracing::trace;

use super::layout::{CellCollector, CellIndex, GridLayout};
use super::SubsurfEvaluator;
use crate::error::{MultiresError, Result};
use crate::mesh::{create_vert_face_map, Edge, Face, Mesh, Vertex};
use crate::multires::{subdivide, Level, SubdivisionKind, MAX_LEVELS};

/// Subdivides through the multires level builder and reorders the result
/// into grid layout order.
///
/// Loose vertices and edges have no place in any face grid and are rejected
/// with [`MultiresError::TopologyMismatch`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CatmullClarkEvaluator {
    kind: SubdivisionKind,
}

impl CatmullClarkEvaluator {
    /// An evaluator using smooth Catmull-Clark rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the subdivision rules.
    pub fn with_kind(mut self, kind: SubdivisionKind) -> Self {
        self.kind = kind;
        self
    }
}

impl SubsurfEvaluator for CatmullClarkEvaluator {
    fn subdivide(&self, mesh: &Mesh, levels: usize) -> Result<Mesh> {
        if levels == 0 {
            return Ok(Mesh::from_parts(mesh.verts.clone(), mesh.edges.clone(), mesh.faces.clone()));
        }
        let lvl = levels + 1;
        if lvl > MAX_LEVELS {
            return Err(MultiresError::MaxLevelsReached { max: MAX_LEVELS });
        }

        let mut level = Level::from_source(mesh)?;
        let mut prev_totedge = None;
        for _ in 1..lvl {
            let next = subdivide(&mut level, prev_totedge, self.kind)?;
            prev_totedge = Some(level.totedge());
            level = next;
        }

        let top: Vec<[u32; 4]> = level.faces.iter().map(|f| f.v).collect();
        let index = CellIndex::build(&mesh.faces, &top, lvl)?;

        let vert_faces = create_vert_face_map(&mesh.faces, mesh.num_vertices());
        let layout = GridLayout::new(&mesh.faces, &mesh.edges, &vert_faces, lvl);
        let mut cells = CellCollector::new(lvl, lvl);
        let total = layout.walk(&mut cells);
        if total != level.totvert() {
            return Err(MultiresError::mismatch("subdivided vertices", level.totvert(), total));
        }

        let mut to_out = vec![None; level.totvert()];
        let mut verts = Vec::with_capacity(total);
        for (out, visit) in cells.first_visits(total).into_iter().enumerate() {
            let Some(v) = visit.and_then(|c| index.get(c.face, c.x, c.y)) else {
                return Err(MultiresError::mismatch("subdivided vertices", total, out));
            };
            let src = &level.verts[v as usize];
            to_out[v as usize] = Some(out as u32);
            verts.push(Vertex {
                co: src.co,
                flag: src.flag,
                ..Default::default()
            });
        }

        let remap: Vec<u32> = to_out.iter().flatten().copied().collect();
        if remap.len() != level.totvert() {
            return Err(MultiresError::mismatch("subdivided vertices", level.totvert(), remap.len()));
        }

        let edges = level
            .edges
            .iter()
            .map(|e| Edge::new(remap[e.v[0] as usize], remap[e.v[1] as usize]))
            .collect();
        let faces = level
            .faces
            .iter()
            .map(|f| {
                let [a, b, c, d] = f.v.map(|v| remap[v as usize]);
                Face {
                    flag: f.flag,
                    mat_nr: f.mat_nr,
                    ..Face::quad(a, b, c, d)
                }
            })
            .collect();

        trace!(levels, verts = total, "evaluated subdivision");
        Ok(Mesh::from_parts(verts, edges, faces))
    }
}
