//! Derived meshes with displacement applied.

use std::fmt;
use std::rc::Rc;

use nalgebra::Vector3;
use tracing::{debug, trace, warn};

use super::driver::CaptureDisplacements;
use super::layout::{GridLayout, GridTraversal};
use super::{DerivedMesh, OnStale, SubsurfEvaluator};
use crate::displace::{DisplaceContext, DisplacementGrid, FaceFrame, GridCursor, MultiresDisplacer};
use crate::error::{MultiresError, Result};
use crate::mesh::{create_vert_face_map, Edge, Face, Mesh, Vertex};

/// Release without firing the stale hook.
pub const UPDATE_BLOCK: u8 = 1;
/// Fire the stale hook on release even if nothing was modified.
pub const UPDATE_ALWAYS: u8 = 2;

/// A base mesh subdivided to a displacement level, with the stored offsets
/// added.
///
/// Besides the evaluated geometry it keeps the pristine subdivided positions
/// (`subco`), the positions as first displaced, and a copy of the base
/// topology, so edits can later be captured back into grid space.
pub struct MultiresDerived {
    mesh: Mesh,
    subco: Vec<Vector3<f32>>,
    rest: Vec<Vector3<f32>>,
    orco: Vec<Vector3<f32>>,
    faces: Vec<Face>,
    edges: Vec<Edge>,
    normals: Vec<Vector3<f32>>,
    vert_faces: Vec<Vec<u32>>,
    lvl: usize,
    totlvl: usize,
    flags: u8,
    modified: bool,
    evaluator: Rc<dyn SubsurfEvaluator>,
    hook: Box<dyn OnStale>,
}

impl fmt::Debug for MultiresDerived {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiresDerived")
            .field("lvl", &self.lvl)
            .field("totlvl", &self.totlvl)
            .field("verts", &self.mesh.num_vertices())
            .field("flags", &self.flags)
            .field("modified", &self.modified)
            .finish_non_exhaustive()
    }
}

impl MultiresDerived {
    /// Subdivides `mesh` to level `lvl` and applies its displacement grids,
    /// which are sized for `totlvl`.
    ///
    /// Grids are applied from level 2 up. A displacement layer whose length
    /// differs from the face count is ignored with a warning.
    pub fn build(mesh: &Mesh, lvl: usize, totlvl: usize, evaluator: Rc<dyn SubsurfEvaluator>) -> Result<Self> {
        if lvl == 0 || lvl > totlvl {
            return Err(MultiresError::InvalidLevel { level: lvl, count: totlvl });
        }
        let derived = evaluator.subdivide(mesh, lvl - 1)?;
        let subco = derived.positions();

        let mut dm = Self {
            mesh: derived,
            rest: Vec::new(),
            orco: mesh.positions(),
            faces: mesh.faces.clone(),
            edges: mesh.edges.clone(),
            normals: mesh.vertex_normals(),
            vert_faces: create_vert_face_map(&mesh.faces, mesh.num_vertices()),
            subco,
            lvl,
            totlvl,
            flags: 0,
            modified: false,
            evaluator,
            hook: Box::new(CaptureDisplacements),
        };

        match mesh.fdata.layer::<DisplacementGrid>() {
            Some(grids) if grids.len() == mesh.num_faces() => dm.apply(grids),
            Some(grids) => warn!(
                grids = grids.len(),
                faces = mesh.num_faces(),
                "displacement layer does not match face count, not applied"
            ),
            None => trace!("no displacement layer"),
        }
        dm.rest = dm.mesh.positions();

        debug!(lvl, totlvl, verts = dm.mesh.num_vertices(), "built multires derived mesh");
        Ok(dm)
    }

    fn apply(&mut self, grids: &[DisplacementGrid]) {
        if self.lvl < 2 {
            return;
        }
        let mut positions = self.subco.clone();
        let mut visitor = ApplyVisitor {
            frames: self.frames(false),
            grids,
            positions: &mut positions,
            subco: &self.subco,
            cursor: GridCursor::new(self.lvl, self.totlvl),
            face: 0,
        };
        self.layout().walk(&mut visitor);

        for (v, co) in self.mesh.verts.iter_mut().zip(positions) {
            v.co = co;
        }
        self.mesh.calc_normals();
    }

    /// Tangent frames of every base face.
    pub(crate) fn frames(&self, invert: bool) -> Vec<FaceFrame> {
        let ctx = self.context();
        (0..self.faces.len()).map(|f| FaceFrame::new(&ctx, f, invert)).collect()
    }

    /// The base mesh as seen by displacers.
    pub fn context(&self) -> DisplaceContext<'_> {
        DisplaceContext {
            orco: &self.orco,
            faces: &self.faces,
            normals: &self.normals,
            lvl: self.lvl,
            totlvl: self.totlvl,
        }
    }

    /// The vertex order of this mesh over the base topology.
    pub fn layout(&self) -> GridLayout<'_> {
        GridLayout::new(&self.faces, &self.edges, &self.vert_faces, self.lvl)
    }

    /// Displayed level.
    pub fn lvl(&self) -> usize {
        self.lvl
    }

    /// Level the grids are sized for.
    pub fn totlvl(&self) -> usize {
        self.totlvl
    }

    /// Base faces.
    pub fn base_faces(&self) -> &[Face] {
        &self.faces
    }

    /// Subdivided positions before displacement.
    pub fn subco(&self) -> &[Vector3<f32>] {
        &self.subco
    }

    /// Positions right after displacement, before any edit.
    pub fn rest_positions(&self) -> &[Vector3<f32>] {
        &self.rest
    }

    /// The evaluator this mesh was built with.
    pub fn evaluator(&self) -> &Rc<dyn SubsurfEvaluator> {
        &self.evaluator
    }

    /// Mutable vertices. Marks the mesh modified.
    pub fn verts_mut(&mut self) -> &mut [Vertex] {
        self.modified = true;
        &mut self.mesh.verts
    }

    /// Replaces every vertex position. Marks the mesh modified.
    pub fn set_positions(&mut self, positions: &[Vector3<f32>]) -> Result<()> {
        if positions.len() != self.mesh.num_vertices() {
            return Err(MultiresError::mismatch("derived vertices", self.mesh.num_vertices(), positions.len()));
        }
        for (v, &co) in self.verts_mut().iter_mut().zip(positions) {
            v.co = co;
        }
        Ok(())
    }

    /// True once vertices were handed out for editing.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// `UPDATE_*` flags.
    pub fn flags(&self) -> u8 {
        self.flags
    }

    /// Sets the `UPDATE_*` flags.
    pub fn set_flags(&mut self, flags: u8) {
        self.flags = flags;
    }

    /// Replaces the hook fired on release.
    pub fn set_on_stale(&mut self, hook: Box<dyn OnStale>) {
        self.hook = hook;
    }

    /// Releases the mesh, firing the stale hook if it was modified (or
    /// [`UPDATE_ALWAYS`] is set) and [`UPDATE_BLOCK`] is not.
    ///
    /// Dropping a derived mesh never fires the hook.
    pub fn release(self, mesh: &mut Mesh) -> Result<()> {
        let wanted = self.modified || self.flags & UPDATE_ALWAYS != 0;
        if wanted && self.flags & UPDATE_BLOCK == 0 {
            debug!(lvl = self.lvl, totlvl = self.totlvl, "derived mesh is stale");
            self.hook.on_stale(&self, mesh)?;
        }
        Ok(())
    }
}

impl DerivedMesh for MultiresDerived {
    fn as_mesh(&self) -> &Mesh {
        &self.mesh
    }
}

struct ApplyVisitor<'a> {
    frames: Vec<FaceFrame>,
    grids: &'a [DisplacementGrid],
    positions: &'a mut [Vector3<f32>],
    subco: &'a [Vector3<f32>],
    cursor: GridCursor,
    face: usize,
}

impl GridTraversal for ApplyVisitor<'_> {
    fn select_face(&mut self, face: usize) {
        self.face = face;
    }

    fn cursor_mut(&mut self) -> &mut GridCursor {
        &mut self.cursor
    }

    fn visit(&mut self, vert: usize, sharing: usize) {
        let mut d = MultiresDisplacer::apply(self.frames[self.face], self.grids.get(self.face), self.cursor);
        d.weight(1.0 / sharing.max(1) as f32);
        d.displace(&mut self.positions[vert], &self.subco[vert]);
    }
}

/// Writes the offsets of `positions` from `subco` into the grids.
pub(crate) struct CaptureVisitor<'a> {
    frames: Vec<FaceFrame>,
    grids: &'a mut [DisplacementGrid],
    positions: &'a [Vector3<f32>],
    subco: &'a [Vector3<f32>],
    cursor: GridCursor,
    face: usize,
}

impl<'a> CaptureVisitor<'a> {
    pub(crate) fn new(
        dm: &'a MultiresDerived,
        grids: &'a mut [DisplacementGrid],
        positions: &'a [Vector3<f32>],
    ) -> Self {
        Self {
            frames: dm.frames(true),
            grids,
            positions,
            subco: dm.subco(),
            cursor: GridCursor::new(dm.lvl, dm.totlvl),
            face: 0,
        }
    }
}

impl GridTraversal for CaptureVisitor<'_> {
    fn select_face(&mut self, face: usize) {
        self.face = face;
    }

    fn cursor_mut(&mut self) -> &mut GridCursor {
        &mut self.cursor
    }

    fn visit(&mut self, vert: usize, _sharing: usize) {
        let mut co = self.positions[vert];
        let mut d = MultiresDisplacer::capture(self.frames[self.face], self.grids.get_mut(self.face), self.cursor);
        d.displace(&mut co, &self.subco[vert]);
    }
}
