//! Pushing edits made at the displayed level into every other level.

use nalgebra::Vector3;
use tracing::{debug, trace, warn};

use super::color::{source_colors, split_corners};
use super::hierarchy::{spread_flags, MultiresHierarchy};
use super::level::ColFace;
use super::stencil::smooth_level;
use super::SubdivisionKind;
use crate::error::{MultiresError, Result};
use crate::mesh::{DeformVert, GeometrySource, LayerType, Mesh, Session, TexFace};

/// Per-face "changed" markers for flags and materials of one level.
#[derive(Debug, Clone, Default)]
struct Damage {
    flag: Vec<bool>,
    mat: Vec<bool>,
}

impl Damage {
    fn new(totface: usize) -> Self {
        Self {
            flag: vec![false; totface],
            mat: vec![false; totface],
        }
    }
}

impl MultiresHierarchy {
    /// Propagates edits from the live mesh (or the edit mesh, unless
    /// rendering) into every level.
    ///
    /// Runs the base-store refresh, then vertices, faces and colors. Returns
    /// [`MultiresError::TopologyMismatch`] without touching anything if the
    /// source's element counts differ from the displayed level.
    pub fn update_levels(&mut self, mesh: &Mesh, session: &Session<'_>) -> Result<()> {
        let source = session.update_source(mesh);
        self.check_source_counts(&source)?;

        self.update_first_level(&source);
        self.update_vertices(&source);
        self.update_faces(&source);
        self.update_colors(&source);

        trace!(current = self.current, levels = self.levels.len(), "propagated edits");
        Ok(())
    }

    fn check_source_counts<S: GeometrySource + ?Sized>(&self, source: &S) -> Result<()> {
        let level = self.current_level();
        let counts = [
            ("vertices", level.totvert(), source.num_vertices()),
            ("edges", level.totedge(), source.num_edges()),
            ("faces", level.totface(), source.num_faces()),
        ];
        for (what, expected, found) in counts {
            if expected != found {
                warn!(what, expected, found, level = self.current, "source does not match displayed level");
                return Err(MultiresError::mismatch(what, expected, found));
            }
        }
        Ok(())
    }

    /// Refreshes the base-level attribute stores when editing at level 1.
    pub fn update_first_level<S: GeometrySource + ?Sized>(&mut self, source: &S) {
        if self.current != 1 {
            return;
        }

        match source.vdata().layer::<DeformVert>() {
            Some(dverts) if dverts.len() == source.num_vertices() => self.vdata.add_layer(dverts.to_vec()),
            _ => {
                self.vdata.remove_layer(LayerType::DeformVert);
            }
        }
        match source.fdata().layer::<TexFace>() {
            Some(tfaces) if tfaces.len() == source.num_faces() => self.fdata.add_layer(tfaces.to_vec()),
            _ => {
                self.fdata.remove_layer(LayerType::TexFace);
            }
        }

        self.edge_flags.clear();
        self.edge_creases.clear();
        for i in 0..source.num_edges() {
            let e = source.edge(i);
            self.edge_flags.push(e.flag);
            self.edge_creases.push(e.crease);
        }
    }

    /// Applies vertex edits at the displayed level to all levels.
    ///
    /// The displayed level takes the live positions and flags. Coarser levels
    /// receive the raw delta on the vertices they share with it. Finer levels
    /// receive the delta smoothed by the Catmull-Clark stencils, level by
    /// level; their flags are rebuilt from the coarser level.
    pub fn update_vertices<S: GeometrySource + ?Sized>(&mut self, source: &S) {
        let cur = self.current - 1;
        let Some(top) = self.levels.last() else {
            return;
        };
        let top_totvert = top.totvert();

        let mut pr_deltas = vec![Vector3::<f32>::zeros(); top_totvert];
        let mut cr_deltas = vec![Vector3::<f32>::zeros(); top_totvert];

        let level = &mut self.levels[cur];
        let mut live_flags = Vec::with_capacity(level.totvert());
        for (i, v) in level.verts.iter_mut().enumerate() {
            let live = source.vertex(i);
            cr_deltas[i] = live.co - v.co;
            v.co = live.co;
            v.flag = live.flag;
            live_flags.push(live.flag);
        }

        for level in &mut self.levels[..cur] {
            for (i, v) in level.verts.iter_mut().enumerate() {
                v.co += cr_deltas[i];
                v.flag = live_flags[i];
            }
        }

        for l in cur + 1..self.levels.len() {
            std::mem::swap(&mut pr_deltas, &mut cr_deltas);

            let (lower, upper) = self.levels.split_at_mut(l);
            let prev = &lower[l - 1];
            let prev_totedge = l.checked_sub(2).map(|p| lower[p].totedge());
            let next = &mut upper[0];

            prev.with_connectivity(prev_totedge, |conn| {
                smooth_level(prev, conn, &pr_deltas, &mut cr_deltas, SubdivisionKind::CatmullClark);
            });

            let mut flags = vec![0u8; next.totvert()];
            for (f, v) in flags.iter_mut().zip(&prev.verts) {
                *f = v.flag;
            }
            spread_flags(prev, &mut flags);

            for ((v, d), flag) in next.verts.iter_mut().zip(&cr_deltas).zip(flags) {
                v.co += d;
                v.flag = flag;
            }
        }
    }

    /// Applies face flag and material edits at the displayed level to all
    /// levels.
    ///
    /// A changed face pushes its values to every child below it; a changed
    /// child pushes its values to its parent, the last changed child winning.
    pub fn update_faces<S: GeometrySource + ?Sized>(&mut self, source: &S) {
        let cur = self.current - 1;

        let level = &mut self.levels[cur];
        let mut damage = Damage::new(level.totface());
        for (i, f) in level.faces.iter_mut().enumerate() {
            let live = source.face(i);
            damage.flag[i] = f.flag != live.flag;
            damage.mat[i] = f.mat_nr != live.mat_nr;
            f.flag = live.flag;
            f.mat_nr = live.mat_nr;
        }
        let changed = damage.flag.iter().chain(&damage.mat).filter(|&&d| d).count();
        let original = damage.clone();

        // Coarser levels: parent takes the child's values.
        let mut pr = damage;
        for l in (0..cur).rev() {
            let (lower, upper) = self.levels.split_at_mut(l + 1);
            let (level, child) = (&mut lower[l], &upper[0]);
            let mut cr = Damage::new(level.totface());
            let mut curf = 0;
            for (i, f) in level.faces.iter_mut().enumerate() {
                for _ in 0..f.sides() {
                    if pr.flag[curf] {
                        f.flag = child.faces[curf].flag;
                        cr.flag[i] = true;
                    }
                    if pr.mat[curf] {
                        f.mat_nr = child.faces[curf].mat_nr;
                        cr.mat[i] = true;
                    }
                    curf += 1;
                }
            }
            pr = cr;
        }

        // Finer levels: children take the parent's values.
        let mut pr = original;
        for l in cur + 1..self.levels.len() {
            let (lower, upper) = self.levels.split_at_mut(l);
            let (prev, level) = (&lower[l - 1], &mut upper[0]);
            let mut cr = Damage::new(level.totface());
            let mut curf = 0;
            for (i, pf) in prev.faces.iter().enumerate() {
                for _ in 0..pf.sides() {
                    if pr.flag[i] {
                        level.faces[curf].flag = pf.flag;
                        cr.flag[curf] = true;
                    }
                    if pr.mat[i] {
                        level.faces[curf].mat_nr = pf.mat_nr;
                        cr.mat[curf] = true;
                    }
                    curf += 1;
                }
            }
            pr = cr;
        }

        if changed > 0 {
            debug!(changed, level = self.current, "propagated face edits");
        }
    }

    /// Applies corner color edits at the displayed level to all levels.
    ///
    /// Does nothing unless colors are tracked and `source` has a color layer.
    pub fn update_colors<S: GeometrySource + ?Sized>(&mut self, source: &S) {
        if !self.use_col || !source.fdata().has_layer(LayerType::Col) {
            return;
        }
        let cur = self.current - 1;

        let Some(cols) = self.levels[cur].colfaces.as_mut() else {
            return;
        };
        let mut deltas: Vec<ColFace> = Vec::with_capacity(cols.len());
        for (i, stored) in cols.iter_mut().enumerate() {
            let live = source_colors(source, i).unwrap_or(*stored);
            deltas.push([0, 1, 2, 3].map(|j| live[j] - stored[j]));
            *stored = live;
        }

        for l in cur + 1..self.levels.len() {
            let (lower, upper) = self.levels.split_at_mut(l);
            let (prev, level) = (&lower[l - 1], &mut upper[0]);
            let next: Vec<ColFace> = prev
                .faces
                .iter()
                .zip(&deltas)
                .flat_map(|(f, d)| split_corners(d, f.sides()))
                .collect();
            if let Some(cols) = level.colfaces.as_mut() {
                for (c, d) in cols.iter_mut().zip(&next) {
                    for (cj, &dj) in c.iter_mut().zip(d) {
                        *cj += dj;
                    }
                }
            }
            deltas = next;
        }

        self.collapse_cols();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{build_from_polygons, EditMesh, MCol, ME_FACE_SEL, SELECT};
    use crate::multires::SubdivisionKind;

    fn cube() -> Mesh {
        let positions = vec![
            Vector3::new(-1.0, -1.0, -1.0),
            Vector3::new(1.0, -1.0, -1.0),
            Vector3::new(1.0, 1.0, -1.0),
            Vector3::new(-1.0, 1.0, -1.0),
            Vector3::new(-1.0, -1.0, 1.0),
            Vector3::new(1.0, -1.0, 1.0),
            Vector3::new(1.0, 1.0, 1.0),
            Vector3::new(-1.0, 1.0, 1.0),
        ];
        let polys = vec![
            vec![0, 3, 2, 1],
            vec![4, 5, 6, 7],
            vec![0, 1, 5, 4],
            vec![2, 3, 7, 6],
            vec![0, 4, 7, 3],
            vec![1, 2, 6, 5],
        ];
        build_from_polygons(&positions, &polys).unwrap()
    }

    fn cube_hierarchy(levels: usize) -> (MultiresHierarchy, Mesh) {
        let mut mesh = cube();
        let mut mr = MultiresHierarchy::create(&mesh).unwrap();
        for _ in 1..levels {
            mr.add_level(&mut mesh, &Session::default(), SubdivisionKind::CatmullClark)
                .unwrap();
        }
        (mr, mesh)
    }

    #[test]
    fn test_update_levels_is_idempotent() {
        let (mut mr, mesh) = cube_hierarchy(3);
        let session = Session::default();
        mr.update_levels(&mesh, &session).unwrap();
        let once = mr.clone();
        mr.update_levels(&mesh, &session).unwrap();
        assert_eq!(mr, once);
    }

    #[test]
    fn test_projection_round_trip() {
        let (mut mr, mesh) = cube_hierarchy(3);
        let before = mr.level(3).unwrap().clone();
        mr.update_vertices(&mesh);
        assert_eq!(mr.level(3).unwrap(), &before);
    }

    #[test]
    fn test_mid_level_round_trip_keeps_every_level() {
        let (mut mr, mut mesh) = cube_hierarchy(3);
        let session = Session::default();
        mr.set_level(&mut mesh, &session, 2).unwrap();
        let snapshot = mr.levels().to_vec();

        mr.update_levels(&mesh, &session).unwrap();
        assert_eq!(mr.levels(), &snapshot[..]);

        mr.set_level(&mut mesh, &session, 3).unwrap();
        assert_eq!(mr.levels(), &snapshot[..]);

        mr.set_level(&mut mesh, &session, 2).unwrap();
        assert_eq!(mr.levels(), &snapshot[..]);
        assert_eq!(mesh.num_vertices(), 26);
    }

    #[test]
    fn test_color_navigation_truncates_once() {
        let positions = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
        ];
        let mut mesh = build_from_polygons(&positions, &[vec![0, 1, 2, 3]]).unwrap();
        let black = MCol::new(255, 0, 0, 0);
        mesh.fdata.add_layer(vec![[black, MCol::new(255, 255, 0, 0), black, black]]);
        let session = Session::default();
        let mut mr = MultiresHierarchy::create(&mesh).unwrap();
        mr.add_level(&mut mesh, &session, SubdivisionKind::CatmullClark).unwrap();

        let stored = |mr: &MultiresHierarchy, l: usize| mr.level(l).unwrap().colfaces.clone().unwrap();
        // Midpoints next to the red corner fall between two 8-bit values.
        assert!(stored(&mr, 2).iter().flatten().any(|c| c.r == 127.5));
        let shown = mesh.fdata.layer::<[MCol; 4]>().unwrap().to_vec();
        assert!(shown.iter().flatten().any(|c| c.r == 127));

        mr.set_level(&mut mesh, &session, 1).unwrap();
        assert_eq!(mesh.fdata.layer::<[MCol; 4]>().unwrap()[0][1].r, 255);
        mr.set_level(&mut mesh, &session, 2).unwrap();

        // The first trip stores the truncated colors that were displayed.
        assert_eq!(mesh.fdata.layer::<[MCol; 4]>().unwrap(), &shown[..]);
        assert!(stored(&mr, 2).iter().flatten().all(|c| c.r.fract() == 0.0));
        assert_eq!(stored(&mr, 1)[0][1].r, 255.0);

        let settled = mr.clone();
        mr.set_level(&mut mesh, &session, 1).unwrap();
        mr.set_level(&mut mesh, &session, 2).unwrap();
        assert_eq!(mr, settled);
        assert_eq!(mesh.fdata.layer::<[MCol; 4]>().unwrap(), &shown[..]);
    }

    #[test]
    fn test_top_edit_reaches_base() {
        let (mut mr, mut mesh) = cube_hierarchy(2);
        let offset = Vector3::new(0.0, 0.0, 0.5);
        let l1_before = mr.level(1).unwrap().verts[0].co;
        mesh.verts[0].co += offset;

        mr.update_levels(&mesh, &Session::default()).unwrap();

        assert_eq!(mr.level(2).unwrap().verts[0].co, mesh.verts[0].co);
        let l1_after = mr.level(1).unwrap().verts[0].co;
        assert!((l1_after - l1_before - offset).norm() < 1e-6);
        // A vertex that only exists on the top level stays put on level 1.
        assert_eq!(mr.level(1).unwrap().totvert(), 8);
    }

    #[test]
    fn test_base_edit_is_smoothed_into_finer_level() {
        let (mut mr, mut mesh) = cube_hierarchy(2);
        let session = Session::default();
        mr.set_level(&mut mesh, &session, 1).unwrap();

        let l2_before = mr.level(2).unwrap().clone();
        let offset = Vector3::new(0.0, 0.0, -1.2);
        mesh.verts[0].co += offset;
        mr.update_levels(&mesh, &session).unwrap();

        assert_eq!(mr.level(1).unwrap().verts[0].co, mesh.verts[0].co);

        // Valence-3 interior corner: (d/4 + 2 * d/2) / 3 = 5d/12.
        let l2 = mr.level(2).unwrap();
        let moved = l2.verts[0].co - l2_before.verts[0].co;
        assert!((moved - offset * (5.0 / 12.0)).norm() < 1e-5);

        // The opposite corner shares no face with vertex 0.
        assert!((l2.verts[6].co - l2_before.verts[6].co).norm() < 1e-6);
    }

    #[test]
    fn test_vertex_flags_spread_to_finer_levels() {
        let (mut mr, mut mesh) = cube_hierarchy(2);
        let session = Session::default();
        mr.set_level(&mut mesh, &session, 1).unwrap();
        mesh.verts[0].flag |= SELECT;
        mr.update_levels(&mesh, &session).unwrap();

        let l1 = mr.level(1).unwrap();
        let l2 = mr.level(2).unwrap();
        assert_eq!(l2.verts[0].flag & SELECT, SELECT);
        for f in &l1.faces {
            let selected = f.verts().contains(&0);
            assert_eq!(l2.verts[f.mid as usize].flag & SELECT != 0, selected);
        }
    }

    #[test]
    fn test_face_flag_propagates_down_and_up() {
        let (mut mr, mut mesh) = cube_hierarchy(3);
        let session = Session::default();

        // Select a top-level face; its ancestors follow.
        mesh.faces[0].flag |= ME_FACE_SEL;
        mr.update_levels(&mesh, &session).unwrap();
        assert_eq!(mr.level(2).unwrap().faces[0].flag & ME_FACE_SEL, ME_FACE_SEL);
        assert_eq!(mr.level(1).unwrap().faces[0].flag & ME_FACE_SEL, ME_FACE_SEL);

        // Change a base material; all descendants follow.
        mr.set_level(&mut mesh, &session, 1).unwrap();
        mesh.faces[1].mat_nr = 3;
        mr.update_levels(&mesh, &session).unwrap();
        let l2 = mr.level(2).unwrap();
        assert!(l2.faces[4..8].iter().all(|f| f.mat_nr == 3));
        assert!(l2.faces[..4].iter().all(|f| f.mat_nr == 0));
        let l3 = mr.level(3).unwrap();
        assert!(l3.faces[16..32].iter().all(|f| f.mat_nr == 3));
        assert!(l3.faces[..16].iter().all(|f| f.mat_nr == 0));
    }

    #[test]
    fn test_color_edit_collapses_to_base() {
        let mut mesh = cube();
        let white = [MCol::new(255, 255, 255, 255); 4];
        mesh.fdata.add_layer(vec![white; 6]);
        let session = Session::default();
        let mut mr = MultiresHierarchy::create(&mesh).unwrap();
        mr.add_level(&mut mesh, &session, SubdivisionKind::CatmullClark).unwrap();

        // Child 0 of base face 0 owns base corner 0 in its second slot.
        let cols = mesh.fdata.layer_mut::<[MCol; 4]>().unwrap();
        cols[0][1] = MCol::new(255, 0, 0, 0);
        mr.update_levels(&mesh, &session).unwrap();

        let base = mr.level(1).unwrap().colfaces.as_ref().unwrap();
        assert_eq!(base[0][0].r, 0.0);
        assert_eq!(base[0][1].r, 255.0);
    }

    #[test]
    fn test_topology_mismatch_is_rejected() {
        let (mut mr, mut mesh) = cube_hierarchy(2);
        let before = mr.clone();
        mesh.verts.pop();
        let err = mr.update_levels(&mesh, &Session::default());
        assert!(matches!(
            err,
            Err(MultiresError::TopologyMismatch { what: "vertices", expected: 26, found: 25 })
        ));
        assert_eq!(mr, before);
    }

    #[test]
    fn test_edit_mesh_is_the_update_source() {
        let (mut mr, mesh) = cube_hierarchy(2);
        let mut em = EditMesh::from_mesh(&mesh);
        em.verts[5].co.x += 1.0;

        let session = Session::default().with_edit_mesh(&em);
        mr.update_levels(&mesh, &session).unwrap();
        assert_eq!(mr.level(2).unwrap().verts[5].co, em.verts[5].co);

        // Rendering reads the stored mesh instead.
        let render = session.with_render(true);
        mr.update_levels(&mesh, &render).unwrap();
        assert_eq!(mr.level(2).unwrap().verts[5].co, mesh.verts[5].co);
    }
}
