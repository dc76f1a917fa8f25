//! Hierarchy lifecycle: create, add a level, copy.

use nalgebra::Vector3;
use std::collections::HashSet;
use tracing::debug;

use super::color::split_corners;
use super::connectivity::Connectivity;
use super::level::{Level, LevelEdge, LevelFace, LevelVertex};
use super::stencil::smooth_level;
use super::{SubdivisionKind, MAX_LEVELS};
use crate::error::{MultiresError, Result};
use crate::mesh::{CustomData, DeformVert, GeometrySource, Mesh, Session, TexFace};

/// A multiresolution mesh: the ordered levels plus display state and the
/// base-level attribute stores.
///
/// Cloning deep-copies every level and store; transient connectivity is not
/// carried over.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MultiresHierarchy {
    pub(crate) levels: Vec<Level>,
    /// Displayed level, 1-based.
    pub(crate) current: usize,
    pub(crate) edge_lvl: usize,
    pub(crate) pin_lvl: usize,
    pub(crate) render_lvl: usize,
    pub(crate) use_col: bool,
    /// Deformation weights of the base level.
    pub(crate) vdata: CustomData,
    /// UVs of the base level.
    pub(crate) fdata: CustomData,
    pub(crate) edge_flags: Vec<u16>,
    pub(crate) edge_creases: Vec<u8>,
}

impl MultiresHierarchy {
    /// Creates a one-level hierarchy by copying `source`.
    ///
    /// Pass the edit mesh when an editing session is open (see
    /// [`Session::source`]). Vertex colors are loaded if `source` has them.
    pub fn create<S: GeometrySource + ?Sized>(source: &S) -> Result<Self> {
        let level = Level::from_source(source)?;
        check_face_edges(&level)?;

        let mut vdata = CustomData::new();
        if let Some(dverts) = source.vdata().layer::<DeformVert>() {
            if dverts.len() == level.totvert() {
                vdata.add_layer(dverts.to_vec());
            }
        }
        let mut fdata = CustomData::new();
        if let Some(tfaces) = source.fdata().layer::<TexFace>() {
            if tfaces.len() == level.totface() {
                fdata.add_layer(tfaces.to_vec());
            }
        }

        let (edge_flags, edge_creases) = (0..source.num_edges())
            .map(|i| {
                let e = source.edge(i);
                (e.flag, e.crease)
            })
            .unzip();

        debug!(
            verts = level.totvert(),
            edges = level.totedge(),
            faces = level.totface(),
            "created multires hierarchy"
        );

        let mut mr = Self {
            levels: vec![level],
            current: 1,
            edge_lvl: 1,
            pin_lvl: 1,
            render_lvl: 1,
            use_col: false,
            vdata,
            fdata,
            edge_flags,
            edge_creases,
        };
        mr.load_cols(source);
        Ok(mr)
    }

    /// Number of levels.
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// The displayed level (1-based).
    pub fn current(&self) -> usize {
        self.current
    }

    /// Level `n` (1-based).
    pub fn level(&self, n: usize) -> Option<&Level> {
        n.checked_sub(1).and_then(|i| self.levels.get(i))
    }

    /// All levels, coarsest first.
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    /// The displayed level.
    pub fn current_level(&self) -> &Level {
        &self.levels[self.current - 1]
    }

    /// True if corner colors are tracked.
    pub fn uses_vertex_color(&self) -> bool {
        self.use_col
    }

    /// Level at which wireframe edges are drawn.
    pub fn edge_level(&self) -> usize {
        self.edge_lvl
    }

    /// Pinned level.
    pub fn pin_level(&self) -> usize {
        self.pin_lvl
    }

    /// Level used for rendering.
    pub fn render_level(&self) -> usize {
        self.render_lvl
    }

    /// Sets the wireframe level. Call [`MultiresHierarchy::edge_level_update`]
    /// afterwards to refresh the mesh.
    pub fn set_edge_level(&mut self, lvl: usize) -> Result<()> {
        self.edge_lvl = self.checked_level(lvl)?;
        Ok(())
    }

    /// Sets the pinned level.
    pub fn set_pin_level(&mut self, lvl: usize) -> Result<()> {
        self.pin_lvl = self.checked_level(lvl)?;
        Ok(())
    }

    /// Sets the render level.
    pub fn set_render_level(&mut self, lvl: usize) -> Result<()> {
        self.render_lvl = self.checked_level(lvl)?;
        Ok(())
    }

    fn checked_level(&self, lvl: usize) -> Result<usize> {
        if (1..=self.levels.len()).contains(&lvl) {
            Ok(lvl)
        } else {
            Err(MultiresError::InvalidLevel {
                level: lvl,
                count: self.levels.len(),
            })
        }
    }

    /// Deformation weights of the base level, if tracked.
    pub fn base_deform_verts(&self) -> Option<&[DeformVert]> {
        self.vdata.layer::<DeformVert>()
    }

    /// UVs of the base level, if tracked.
    pub fn base_tex_faces(&self) -> Option<&[TexFace]> {
        self.fdata.layer::<TexFace>()
    }

    /// Edge flags of the base level.
    pub fn base_edge_flags(&self) -> &[u16] {
        &self.edge_flags
    }

    /// Appends a finer level subdivided from the current top level.
    ///
    /// Pending edits are propagated first. The new level becomes the
    /// displayed one and is projected into `mesh`; the render level follows
    /// along if it was at the previous top.
    ///
    /// Returns [`MultiresError::MaxLevelsReached`] and leaves everything
    /// untouched once [`MAX_LEVELS`] levels exist.
    pub fn add_level(&mut self, mesh: &mut Mesh, session: &Session<'_>, kind: SubdivisionKind) -> Result<()> {
        if self.levels.len() >= MAX_LEVELS {
            return Err(MultiresError::MaxLevelsReached { max: MAX_LEVELS });
        }
        let session = session.with_render(false);

        self.check_colors(&session.source(mesh));
        self.update_levels(mesh, &session)?;

        let top = self.levels.len() - 1;
        let prev_totedge = top.checked_sub(1).map(|l| self.levels[l].totedge());
        let next = subdivide(&mut self.levels[top], prev_totedge, kind)?;

        debug!(
            level = self.levels.len() + 1,
            verts = next.totvert(),
            edges = next.totedge(),
            faces = next.totface(),
            ?kind,
            "added multires level"
        );

        self.levels.push(next);
        self.current = self.levels.len();
        if self.render_lvl == self.levels.len() - 1 {
            self.render_lvl = self.levels.len();
        }

        self.level_to_mesh(mesh, &session);
        Ok(())
    }
}

/// Checks that every face side has an edge, so midpoints can be found.
fn check_face_edges(level: &Level) -> Result<()> {
    let keys: HashSet<(u32, u32)> = level
        .edges
        .iter()
        .map(|e| (e.v[0].min(e.v[1]), e.v[0].max(e.v[1])))
        .collect();
    for (i, f) in level.faces.iter().enumerate() {
        let verts = f.verts();
        for j in 0..verts.len() {
            let (a, b) = (verts[j], verts[(j + 1) % verts.len()]);
            if !keys.contains(&(a.min(b), a.max(b))) {
                return Err(MultiresError::MissingEdge { face: i, v0: a, v1: b });
            }
        }
    }
    Ok(())
}

/// Builds the level after `prev`.
///
/// Creates one quad per face corner and two edges per old edge plus one per
/// face side, then assigns `prev`'s edge and face midpoint indices. Positions
/// are smoothed according to `kind`; flags of new vertices are the union of
/// the vertices they were made from. Corner colors are split if `prev` has
/// them.
///
/// A face side without an edge fails with [`MultiresError::MissingEdge`]
/// before `prev` is touched.
pub(crate) fn subdivide(prev: &mut Level, prev_totedge: Option<usize>, kind: SubdivisionKind) -> Result<Level> {
    let (totvert, totedge) = (prev.totvert(), prev.totedge());
    let built;
    let conn = match prev.connectivity.as_ref() {
        Some(conn) => conn,
        None => {
            built = Connectivity::build(prev, prev_totedge);
            &built
        }
    };

    let child_count: usize = prev.faces.iter().map(LevelFace::sides).sum();
    let mut faces = Vec::with_capacity(child_count);
    for (i, f) in prev.faces.iter().enumerate() {
        let verts = f.verts();
        let n = verts.len();
        for j in 0..n {
            let vj = verts[j];
            let before = verts[if j == 0 { n - 1 } else { j - 1 }];
            let after = verts[if j == n - 1 { 0 } else { j + 1 }];
            let mid_of = |other: u32| {
                conn.find_edge(&prev.edges, vj, other)
                    .map(|e| (totvert as u32) + e)
                    .ok_or(MultiresError::MissingEdge {
                        face: i,
                        v0: vj,
                        v1: other,
                    })
            };
            faces.push(LevelFace {
                v: [mid_of(before)?, vj, mid_of(after)?, (totvert + totedge + i) as u32],
                quad: true,
                flag: f.flag,
                mat_nr: f.mat_nr,
                mid: 0,
            });
        }
    }

    for (i, e) in prev.edges.iter_mut().enumerate() {
        e.mid = (totvert + i) as u32;
    }
    for (i, f) in prev.faces.iter_mut().enumerate() {
        f.mid = (totvert + totedge + i) as u32;
    }
    let prev = &*prev;

    let mut edges = Vec::with_capacity(totedge * 2 + child_count);
    for e in &prev.edges {
        edges.push(LevelEdge { v: [e.v[0], e.mid], mid: 0 });
        edges.push(LevelEdge { v: [e.mid, e.v[1]], mid: 0 });
    }
    for child in &faces {
        edges.push(LevelEdge {
            v: [child.v[2], child.v[3]],
            mid: 0,
        });
    }

    let next_totvert = totvert + totedge + prev.totface();
    let old = prev.positions();
    let mut co = vec![Vector3::zeros(); next_totvert];
    smooth_level(prev, conn, &old, &mut co, kind);

    let mut flags = vec![0u8; next_totvert];
    for (i, v) in prev.verts.iter().enumerate() {
        flags[i] = v.flag;
    }
    spread_flags(prev, &mut flags);

    let verts = co
        .into_iter()
        .zip(flags)
        .map(|(co, flag)| LevelVertex { co, flag })
        .collect();

    let colfaces = prev.colfaces.as_ref().map(|cols| {
        prev.faces
            .iter()
            .zip(cols)
            .flat_map(|(f, c)| split_corners(c, f.sides()))
            .collect()
    });

    Ok(Level {
        verts,
        faces,
        edges,
        colfaces,
        ..Default::default()
    })
}

/// ORs the flags of each face's corners into its center and each edge's
/// endpoints into its midpoint. `flags` is indexed by the next level's vertices.
pub(crate) fn spread_flags(prev: &Level, flags: &mut [u8]) {
    for f in &prev.faces {
        for &v in f.verts() {
            flags[f.mid as usize] |= flags[v as usize];
        }
    }
    for e in &prev.edges {
        flags[e.mid as usize] |= flags[e.v[0] as usize] | flags[e.v[1] as usize];
    }
}
