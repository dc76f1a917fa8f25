//! Capturing edits into displacement grids and raising grid resolution.

use std::rc::Rc;

use nalgebra::Vector3;
use tracing::{debug, trace};

use super::derived::{CaptureVisitor, MultiresDerived, UPDATE_BLOCK};
use super::layout::{subface_placements, CellCollector, CellIndex, GridLayout, Placement};
use super::{DerivedMesh, OnStale, SubsurfEvaluator};
use crate::displace::DisplacementGrid;
use crate::error::{MultiresError, Result};
use crate::mesh::{create_vert_face_map, Mesh};
use crate::multires::MAX_LEVELS;

/// Subdivides `dm` `extra` more times.
pub fn subdivision_preview<D: DerivedMesh + ?Sized>(
    dm: &D,
    extra: usize,
    evaluator: &Rc<dyn SubsurfEvaluator>,
) -> Result<Mesh> {
    evaluator.subdivide(dm.as_mesh(), extra)
}

/// How [`rebuild_displacement_grids`] combines preview positions with the
/// current displaced surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildMode {
    /// Preview positions replace the surface.
    Replace,
    /// Preview positions are offsets added to the surface.
    Accumulate,
}

/// Re-derives full-resolution grids from `preview`, a subdivision of `dm`.
///
/// `dm` is the base mesh subdivided to level `lvl`, so `preview` sits at
/// level `totlvl`. Each preview vertex is located in its base face's grid and
/// moved onto the matching vertex of a fresh level-`totlvl` derived mesh,
/// which is then captured.
pub fn rebuild_displacement_grids(
    mesh: &mut Mesh,
    dm: &Mesh,
    preview: &Mesh,
    lvl: usize,
    totlvl: usize,
    evaluator: &Rc<dyn SubsurfEvaluator>,
    mode: RebuildMode,
) -> Result<()> {
    if lvl == 0 || lvl >= totlvl {
        return Err(MultiresError::invalid_param("lvl", lvl, "must be below the grid level"));
    }
    let extra = totlvl - lvl;
    let scale = 1usize << extra;

    let dm_vert_faces = create_vert_face_map(&dm.faces, dm.num_vertices());
    let layout = GridLayout::new(&dm.faces, &dm.edges, &dm_vert_faces, extra + 1);
    let mut cells = CellCollector::new(extra + 1, extra + 1);
    let total = layout.walk(&mut cells);
    if total != preview.num_vertices() {
        return Err(MultiresError::mismatch("preview vertices", total, preview.num_vertices()));
    }

    let placements: Vec<(usize, Placement)> = mesh
        .faces
        .iter()
        .enumerate()
        .flat_map(|(f, face)| subface_placements(face.sides(), lvl).into_iter().map(move |p| (f, p)))
        .collect();
    if placements.len() != dm.num_faces() {
        return Err(MultiresError::mismatch("derived faces", placements.len(), dm.num_faces()));
    }

    let mut mrdm = MultiresDerived::build(mesh, totlvl, totlvl, evaluator.clone())?;
    if mrdm.num_vertices() != preview.num_vertices() {
        return Err(MultiresError::mismatch("preview vertices", mrdm.num_vertices(), preview.num_vertices()));
    }
    let top: Vec<[u32; 4]> = mrdm.as_mesh().faces.iter().map(|f| f.v).collect();
    let index = CellIndex::build(&mesh.faces, &top, totlvl)?;

    let mut positions = mrdm.positions();
    for (src, visit) in cells.first_visits(total).into_iter().enumerate() {
        let target = visit.and_then(|c| {
            let (face, p) = placements[c.face];
            let axis = |k: usize| -> Option<usize> {
                let at = |i: usize| (if k == 0 { p[i].0 } else { p[i].1 }) as isize;
                let v = at(0) * scale as isize + c.x as isize * (at(1) - at(0)) + c.y as isize * (at(3) - at(0));
                usize::try_from(v).ok()
            };
            index.get(face, axis(0)?, axis(1)?)
        });
        let Some(target) = target else {
            return Err(MultiresError::mismatch("preview vertices", total, src));
        };
        let co = preview.verts[src].co;
        match mode {
            RebuildMode::Replace => positions[target as usize] = co,
            RebuildMode::Accumulate => positions[target as usize] += co,
        }
    }

    debug!(lvl, totlvl, verts = total, ?mode, "rebuilding displacement grids");
    mrdm.set_positions(&positions)?;
    mrdm.release(mesh)
}

/// The default stale hook: stores a derived mesh's edits in the base mesh's
/// displacement grids.
///
/// At the top level the offsets are captured directly. Below it, the edit is
/// taken as a delta from the displaced surface, smoothed up to the top level
/// and added there, so finer detail survives.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureDisplacements;

impl OnStale for CaptureDisplacements {
    fn on_stale(&self, dm: &MultiresDerived, mesh: &mut Mesh) -> Result<()> {
        let (lvl, totlvl) = (dm.lvl(), dm.totlvl());
        if lvl < 2 {
            return Ok(());
        }
        let faces = dm.base_faces().len();
        let Some(grids) = mesh.fdata.layer_mut::<DisplacementGrid>() else {
            trace!("no displacement layer to capture into");
            return Ok(());
        };
        if grids.len() != faces {
            return Err(MultiresError::mismatch("displacement grids", faces, grids.len()));
        }

        if lvl >= totlvl {
            for (f, g) in grids.iter().enumerate() {
                if g.is_empty() {
                    trace!(face = f, "face has no displacement grid, skipping");
                }
            }
            let positions = dm.positions();
            let mut visitor = CaptureVisitor::new(dm, grids, &positions);
            dm.layout().walk(&mut visitor);
            debug!(lvl, "captured displacement");
            return Ok(());
        }

        let mut delta = dm.as_mesh().clone();
        for (v, rest) in delta.verts.iter_mut().zip(dm.rest_positions()) {
            v.co -= rest;
        }
        let preview = subdivision_preview(&delta, totlvl - lvl, dm.evaluator())?;
        rebuild_displacement_grids(
            mesh,
            dm.as_mesh(),
            &preview,
            lvl,
            totlvl,
            dm.evaluator(),
            RebuildMode::Accumulate,
        )
    }
}

/// Displacement level settings of a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MultiresModifier {
    /// Displayed level.
    pub lvl: usize,
    /// Level the grids are sized for.
    pub totlvl: usize,
    /// Level used for rendering.
    pub render_lvl: usize,
}

impl Default for MultiresModifier {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiresModifier {
    /// Settings for an undisplaced mesh.
    pub fn new() -> Self {
        Self {
            lvl: 1,
            totlvl: 1,
            render_lvl: 1,
        }
    }

    /// Sets the render level, clamped to the available levels.
    pub fn with_render_level(mut self, lvl: usize) -> Self {
        self.render_lvl = lvl.clamp(1, self.totlvl);
        self
    }

    /// Adds one displacement level.
    ///
    /// Grids are reallocated at the new resolution. Existing displacement is
    /// carried over by subdividing the fully displaced surface once more and
    /// capturing it at the new level.
    pub fn subdivide(&mut self, mesh: &mut Mesh, evaluator: &Rc<dyn SubsurfEvaluator>) -> Result<()> {
        if self.totlvl >= MAX_LEVELS {
            return Err(MultiresError::MaxLevelsReached { max: MAX_LEVELS });
        }
        let prev = self.totlvl;
        let faces = mesh.num_faces();

        let has_layer = mesh
            .fdata
            .layer::<DisplacementGrid>()
            .is_some_and(|grids| grids.len() == faces);
        if !has_layer {
            mesh.fdata.add_layer(vec![DisplacementGrid::empty(); faces]);
        }
        let displaced = mesh
            .fdata
            .get::<DisplacementGrid>(0)
            .is_some_and(|g| !g.is_empty());

        let staged = if prev > 1 && displaced {
            let mrdm = MultiresDerived::build(mesh, prev, prev, evaluator.clone())?;
            let preview = subdivision_preview(&mrdm, 1, evaluator)?;
            Some((mrdm, preview))
        } else {
            None
        };

        self.totlvl = prev + 1;
        self.lvl = self.totlvl;
        self.render_lvl = self.totlvl;
        if let Some(grids) = mesh.fdata.layer_mut::<DisplacementGrid>() {
            grids.iter_mut().for_each(|g| *g = DisplacementGrid::new(self.totlvl));
        }

        if let Some((mut mrdm, preview)) = staged {
            rebuild_displacement_grids(
                mesh,
                mrdm.as_mesh(),
                &preview,
                prev,
                self.totlvl,
                evaluator,
                RebuildMode::Replace,
            )?;
            mrdm.set_flags(UPDATE_BLOCK);
            mrdm.release(mesh)?;
        }

        debug!(totlvl = self.totlvl, faces, "added displacement level");
        Ok(())
    }

    /// Selects the displayed level.
    pub fn set_level(&mut self, lvl: usize) -> Result<()> {
        self.lvl = self.checked(lvl)?;
        Ok(())
    }

    /// Selects the render level.
    pub fn set_render_level(&mut self, lvl: usize) -> Result<()> {
        self.render_lvl = self.checked(lvl)?;
        Ok(())
    }

    fn checked(&self, lvl: usize) -> Result<usize> {
        if lvl == 0 || lvl > self.totlvl {
            return Err(MultiresError::InvalidLevel {
                level: lvl,
                count: self.totlvl,
            });
        }
        Ok(lvl)
    }

    /// Builds the derived mesh at the displayed (or render) level.
    pub fn create_derived(
        &self,
        mesh: &Mesh,
        evaluator: &Rc<dyn SubsurfEvaluator>,
        render: bool,
    ) -> Result<MultiresDerived> {
        let lvl = if render { self.render_lvl } else { self.lvl };
        MultiresDerived::build(mesh, lvl, self.totlvl, evaluator.clone())
    }

    /// Captures `positions`, a vertex stream of the displayed-level derived
    /// mesh, as the new displaced shape.
    pub fn reshape(
        &self,
        mesh: &mut Mesh,
        evaluator: &Rc<dyn SubsurfEvaluator>,
        positions: &[Vector3<f32>],
    ) -> Result<()> {
        let mut dm = self.create_derived(mesh, evaluator, false)?;
        dm.set_positions(positions)?;
        dm.release(mesh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::build_from_polygons;
    use crate::subsurf::CatmullClarkEvaluator;

    fn quad() -> Mesh {
        let positions = [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(2.0, 0.0, 0.0),
            Vector3::new(2.0, 2.0, 0.0),
            Vector3::new(0.0, 2.0, 0.0),
        ];
        build_from_polygons(&positions, &[vec![0, 1, 2, 3]]).unwrap()
    }

    fn evaluator() -> Rc<dyn SubsurfEvaluator> {
        Rc::new(CatmullClarkEvaluator::new())
    }

    fn grids(mesh: &Mesh) -> &[DisplacementGrid] {
        mesh.fdata.layer::<DisplacementGrid>().unwrap()
    }

    #[test]
    fn test_subdivide_allocates_grids() {
        let mut mesh = quad();
        let ev = evaluator();
        let mut mmd = MultiresModifier::new();

        mmd.subdivide(&mut mesh, &ev).unwrap();
        assert_eq!((mmd.lvl, mmd.totlvl, mmd.render_lvl), (2, 2, 2));
        assert_eq!(grids(&mesh)[0].len(), 9);

        mmd.subdivide(&mut mesh, &ev).unwrap();
        assert_eq!(mmd.totlvl, 3);
        assert_eq!(grids(&mesh)[0].len(), 25);
        // Nothing was sculpted: the re-derived grid stays flat.
        assert!(grids(&mesh)[0].disps.iter().all(|d| d.norm() < 1e-4));
    }

    #[test]
    fn test_subdivide_stops_at_max_levels() {
        let mut mesh = quad();
        let mut mmd = MultiresModifier {
            lvl: MAX_LEVELS,
            totlvl: MAX_LEVELS,
            render_lvl: MAX_LEVELS,
        };
        assert!(matches!(
            mmd.subdivide(&mut mesh, &evaluator()),
            Err(MultiresError::MaxLevelsReached { .. })
        ));
        assert_eq!(mmd.totlvl, MAX_LEVELS);
        assert!(!mesh.fdata.has_layer(crate::mesh::LayerType::Disps));
    }

    #[test]
    fn test_level_range() {
        let mut mmd = MultiresModifier::new();
        assert!(mmd.set_level(2).is_err());
        mmd.totlvl = 3;
        mmd.set_level(2).unwrap();
        mmd.set_render_level(3).unwrap();
        assert!(matches!(
            mmd.set_level(0),
            Err(MultiresError::InvalidLevel { level: 0, count: 3 })
        ));
        assert_eq!(MultiresModifier::new().with_render_level(5).render_lvl, 1);
    }

    #[test]
    fn test_reshape_rejects_wrong_length() {
        let mut mesh = quad();
        let ev = evaluator();
        let mut mmd = MultiresModifier::new();
        mmd.subdivide(&mut mesh, &ev).unwrap();
        assert!(matches!(
            mmd.reshape(&mut mesh, &ev, &[Vector3::zeros(); 3]),
            Err(MultiresError::TopologyMismatch { .. })
        ));
    }

    #[test]
    fn test_reshape_stores_offsets() {
        let mut mesh = quad();
        let ev = evaluator();
        let mut mmd = MultiresModifier::new();
        mmd.subdivide(&mut mesh, &ev).unwrap();

        let lift = Vector3::new(0.0, 0.0, 0.5);
        let dm = mmd.create_derived(&mesh, &ev, false).unwrap();
        let lifted: Vec<_> = dm.positions().iter().map(|co| co + lift).collect();
        mmd.reshape(&mut mesh, &ev, &lifted).unwrap();

        assert!(grids(&mesh)[0].disps.iter().all(|d| (d.z - 0.5).abs() < 1e-5));
        let dm = mmd.create_derived(&mesh, &ev, false).unwrap();
        for (co, want) in dm.positions().iter().zip(&lifted) {
            assert!((co - want).norm() < 1e-5);
        }
    }

    #[test]
    fn test_coarse_edit_reaches_top_level() {
        let mut mesh = quad();
        let ev = evaluator();
        let mut mmd = MultiresModifier::new();
        mmd.subdivide(&mut mesh, &ev).unwrap();
        mmd.subdivide(&mut mesh, &ev).unwrap();
        mmd.set_level(2).unwrap();

        let lift = Vector3::new(0.0, 0.0, 1.0);
        let mut dm = mmd.create_derived(&mesh, &ev, false).unwrap();
        for v in dm.verts_mut() {
            v.co += lift;
        }
        dm.release(&mut mesh).unwrap();

        assert!(grids(&mesh)[0].disps.iter().all(|d| (d.z - 1.0).abs() < 1e-4));

        mmd.set_level(3).unwrap();
        let top = mmd.create_derived(&mesh, &ev, false).unwrap();
        for (co, sub) in top.positions().iter().zip(top.subco()) {
            assert!((co - sub - lift).norm() < 1e-4);
        }
    }

    #[test]
    fn test_release_at_base_level_is_ignored() {
        let mut mesh = quad();
        let ev = evaluator();
        let mut mmd = MultiresModifier::new();
        mmd.subdivide(&mut mesh, &ev).unwrap();
        mmd.set_level(1).unwrap();

        let mut dm = mmd.create_derived(&mesh, &ev, false).unwrap();
        dm.verts_mut()[0].co.z = 3.0;
        dm.release(&mut mesh).unwrap();
        assert!(grids(&mesh)[0].disps.iter().all(|d| d.norm() == 0.0));
    }
}
