//! Writing a level back into the editable mesh.

use nalgebra::Vector3;
use tracing::debug;

use super::color::{split_corners, to_mcol};
use super::hierarchy::MultiresHierarchy;
use crate::error::Result;
use crate::mesh::{
    DeformVert, Edge, Face, LayerType, MCol, Mesh, Session, TexFace, Vertex, ME_EDGEDRAW, ME_EDGERENDER, ME_HIDE,
};

impl MultiresHierarchy {
    /// Replaces `mesh`'s geometry with the displayed level.
    ///
    /// Edge flags and creases come from the base level, each sub-edge taking
    /// the values of the base edge it was split from. Deformation weights
    /// follow each vertex's base ancestor, UVs are split down from the base
    /// faces and colors come from the level itself. Normals are recomputed and
    /// the session's notifier is called once.
    ///
    /// Does nothing while an editing session owns the geometry.
    pub fn level_to_mesh(&self, mesh: &mut Mesh, session: &Session<'_>) {
        if session.editing() {
            return;
        }
        let level = self.current_level();

        let verts = level
            .verts
            .iter()
            .map(|v| Vertex {
                co: v.co,
                no: Vector3::zeros(),
                flag: v.flag,
            })
            .collect();
        let mut edges: Vec<Edge> = level
            .edges
            .iter()
            .map(|e| Edge {
                v: e.v,
                crease: 0,
                flag: 0,
            })
            .collect();
        let faces = level
            .faces
            .iter()
            .map(|f| Face {
                v: f.v,
                quad: f.quad,
                flag: f.flag & !ME_HIDE,
                mat_nr: f.mat_nr,
            })
            .collect();

        let shift = self.current - 1;
        let last = (self.levels[0].totedge() << shift).min(edges.len());
        for (i, e) in edges.iter_mut().enumerate().take(last) {
            let ndx = i >> shift;
            if let (Some(&flag), Some(&crease)) = (self.edge_flags.get(ndx), self.edge_creases.get(ndx)) {
                e.flag = flag;
                e.crease = crease;
            }
        }

        match self.vdata.layer::<DeformVert>() {
            Some(base) => {
                let dverts = self
                    .vertex_ancestors()
                    .into_iter()
                    .map(|a| base[a as usize].clone())
                    .collect();
                mesh.vdata.add_layer::<DeformVert>(dverts);
            }
            None => {
                mesh.vdata.remove_layer(LayerType::DeformVert);
            }
        }

        match self.fdata.layer::<TexFace>() {
            Some(base) => mesh.fdata.add_layer(self.split_tex_faces(base)),
            None => {
                mesh.fdata.remove_layer(LayerType::TexFace);
            }
        }

        match level.colfaces.as_ref().filter(|_| self.use_col) {
            Some(cols) => mesh.fdata.add_layer(cols.iter().map(to_mcol).collect::<Vec<[MCol; 4]>>()),
            None => {
                mesh.fdata.remove_layer(LayerType::Col);
            }
        }

        mesh.replace_geometry(verts, edges, faces);
        self.apply_edge_levels(mesh);

        debug!(
            level = self.current,
            verts = mesh.num_vertices(),
            faces = mesh.num_faces(),
            "projected level to mesh"
        );
        session.notifier.geometry_changed();
    }

    /// Propagates pending edits, then displays level `lvl` clamped into
    /// `1..=level_count()`.
    pub fn set_level(&mut self, mesh: &mut Mesh, session: &Session<'_>, lvl: usize) -> Result<()> {
        self.check_colors(&session.source(mesh));
        self.update_levels(mesh, session)?;

        self.current = lvl.clamp(1, self.levels.len());
        debug!(level = self.current, "switched multires level");

        self.level_to_mesh(mesh, session);
        Ok(())
    }

    /// Shows only the edges that exist at the edge level: finer edges lose
    /// their draw and render flags.
    ///
    /// Does nothing while an editing session owns the geometry, like
    /// [`MultiresHierarchy::level_to_mesh`].
    pub fn edge_level_update(&self, mesh: &mut Mesh, session: &Session<'_>) {
        if session.editing() {
            return;
        }
        self.apply_edge_levels(mesh);
        session.notifier.geometry_changed();
    }

    fn apply_edge_levels(&self, mesh: &mut Mesh) {
        let Some(edge_level) = self.level(self.edge_lvl) else {
            return;
        };
        let threshold = edge_level.totedge() << self.current.saturating_sub(self.edge_lvl);
        let show_all = self.edge_lvl >= self.current;
        let totedge = self.current_level().totedge();

        for (i, e) in mesh.edges.iter_mut().enumerate().take(totedge) {
            if show_all || i < threshold {
                e.flag |= ME_EDGEDRAW | ME_EDGERENDER;
            } else {
                e.flag &= !(ME_EDGEDRAW | ME_EDGERENDER);
            }
        }
    }

    /// Base-level ancestor of every vertex of the displayed level.
    ///
    /// Edge midpoints inherit from the edge's first endpoint, face centers
    /// from the face's first corner.
    pub(crate) fn vertex_ancestors(&self) -> Vec<u32> {
        let mut anc: Vec<u32> = (0..self.levels[0].totvert() as u32).collect();
        for level in &self.levels[..self.current - 1] {
            anc.resize(level.totvert() + level.totedge() + level.totface(), 0);
            for e in &level.edges {
                anc[e.mid as usize] = anc[e.v[0] as usize];
            }
            for f in &level.faces {
                anc[f.mid as usize] = anc[f.v[0] as usize];
            }
        }
        anc
    }

    fn split_tex_faces(&self, base: &[TexFace]) -> Vec<TexFace> {
        let mut uvs: Vec<[[f32; 2]; 4]> = base.iter().map(|t| t.uv).collect();
        for level in &self.levels[..self.current - 1] {
            uvs = level
                .faces
                .iter()
                .zip(&uvs)
                .flat_map(|(f, uv)| split_corners(uv, f.sides()))
                .collect();
        }
        uvs.into_iter().map(|uv| TexFace { uv }).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{build_from_polygons, DeformWeight, EditMesh, Notifier, ME_SEAM};
    use crate::multires::SubdivisionKind;
    use std::cell::Cell;

    #[derive(Default)]
    struct CountingNotifier {
        calls: Cell<usize>,
    }

    impl Notifier for CountingNotifier {
        fn geometry_changed(&self) {
            self.calls.set(self.calls.get() + 1);
        }
    }

    fn plane() -> Mesh {
        // Two quads side by side.
        let positions = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(2.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
            Vector3::new(2.0, 1.0, 0.0),
        ];
        build_from_polygons(&positions, &[vec![0, 1, 4, 3], vec![1, 2, 5, 4]]).unwrap()
    }

    #[test]
    fn test_navigation_is_loss_free() {
        let mut mesh = plane();
        let session = Session::default();
        let mut mr = MultiresHierarchy::create(&mesh).unwrap();
        mr.add_level(&mut mesh, &session, SubdivisionKind::CatmullClark).unwrap();
        mr.add_level(&mut mesh, &session, SubdivisionKind::CatmullClark).unwrap();
        let captured = mesh.clone();

        mr.set_level(&mut mesh, &session, 1).unwrap();
        assert_eq!(mesh.num_vertices(), 6);
        mr.set_level(&mut mesh, &session, 3).unwrap();
        assert_eq!(mesh, captured);
    }

    #[test]
    fn test_set_level_clamps() {
        let mut mesh = plane();
        let session = Session::default();
        let mut mr = MultiresHierarchy::create(&mesh).unwrap();
        mr.add_level(&mut mesh, &session, SubdivisionKind::CatmullClark).unwrap();

        mr.set_level(&mut mesh, &session, 0).unwrap();
        assert_eq!(mr.current(), 1);
        mr.set_level(&mut mesh, &session, 99).unwrap();
        assert_eq!(mr.current(), 2);
    }

    #[test]
    fn test_edge_flags_follow_base_edges() {
        let mut mesh = plane();
        mesh.edges[0].flag |= ME_SEAM;
        mesh.edges[0].crease = 200;
        let session = Session::default();
        let mut mr = MultiresHierarchy::create(&mesh).unwrap();
        mr.add_level(&mut mesh, &session, SubdivisionKind::CatmullClark).unwrap();

        assert_eq!(mesh.edges[0].flag & ME_SEAM, ME_SEAM);
        assert_eq!(mesh.edges[1].crease, 200);
        assert_eq!(mesh.edges[2].flag & ME_SEAM, 0);
        // Interior edges of split faces have no base edge.
        let interior = mr.level(1).unwrap().totedge() * 2;
        assert_eq!(mesh.edges[interior].crease, 0);
    }

    #[test]
    fn test_edge_level_hides_finer_edges() {
        let mut mesh = plane();
        let session = Session::default();
        let mut mr = MultiresHierarchy::create(&mesh).unwrap();
        mr.add_level(&mut mesh, &session, SubdivisionKind::CatmullClark).unwrap();
        mr.add_level(&mut mesh, &session, SubdivisionKind::CatmullClark).unwrap();

        mr.set_edge_level(1).unwrap();
        mr.edge_level_update(&mut mesh, &session);

        // Level 1 has 7 edges, each split into 4 at level 3.
        let threshold = 7 * 4;
        for (i, e) in mesh.edges.iter().enumerate() {
            let shown = e.flag & (ME_EDGEDRAW | ME_EDGERENDER) == ME_EDGEDRAW | ME_EDGERENDER;
            assert_eq!(shown, i < threshold, "edge {i}");
        }
    }

    #[test]
    fn test_projection_skipped_while_editing() {
        let mut mesh = plane();
        let mr = MultiresHierarchy::create(&mesh).unwrap();
        let before = mesh.clone();
        mesh.verts[0].co.z = 5.0;
        let edited = mesh.clone();

        let em = EditMesh::from_mesh(&before);
        let notifier = CountingNotifier::default();
        let session = Session::new(&notifier).with_edit_mesh(&em);
        mr.level_to_mesh(&mut mesh, &session);
        assert_eq!(mesh, edited);
        assert_eq!(notifier.calls.get(), 0);

        // Rendering projects even with an edit mesh open.
        mr.level_to_mesh(&mut mesh, &session.with_render(true));
        assert_eq!(mesh.verts[0].co, before.verts[0].co);
        assert_eq!(notifier.calls.get(), 1);
    }

    #[test]
    fn test_edge_level_update_follows_editing_rule() {
        let mut mesh = plane();
        let mut mr = MultiresHierarchy::create(&mesh).unwrap();
        mr.add_level(&mut mesh, &Session::default(), SubdivisionKind::CatmullClark).unwrap();
        mr.set_edge_level(1).unwrap();
        for e in &mut mesh.edges {
            e.flag |= ME_EDGEDRAW | ME_EDGERENDER;
        }
        let before = mesh.clone();

        let em = EditMesh::from_mesh(&before);
        let notifier = CountingNotifier::default();
        let session = Session::new(&notifier).with_edit_mesh(&em);
        mr.edge_level_update(&mut mesh, &session);
        assert_eq!(mesh, before);
        assert_eq!(notifier.calls.get(), 0);

        mr.edge_level_update(&mut mesh, &session.with_render(true));
        assert_ne!(mesh, before);
        assert_eq!(notifier.calls.get(), 1);
    }

    #[test]
    fn test_notifies_once_per_projection() {
        let mut mesh = plane();
        let notifier = CountingNotifier::default();
        let session = Session::new(&notifier);
        let mut mr = MultiresHierarchy::create(&mesh).unwrap();
        mr.add_level(&mut mesh, &session, SubdivisionKind::CatmullClark).unwrap();
        assert_eq!(notifier.calls.get(), 1);
        mr.set_level(&mut mesh, &session, 1).unwrap();
        assert_eq!(notifier.calls.get(), 2);
    }

    #[test]
    fn test_deform_weights_follow_ancestors() {
        let mut mesh = plane();
        let dverts = (0..6)
            .map(|i| DeformVert {
                weights: vec![DeformWeight {
                    def_nr: i,
                    weight: 1.0,
                }],
            })
            .collect();
        mesh.vdata.add_layer::<DeformVert>(dverts);
        let session = Session::default();
        let mut mr = MultiresHierarchy::create(&mesh).unwrap();
        mr.add_level(&mut mesh, &session, SubdivisionKind::CatmullClark).unwrap();

        let out = mesh.vdata.layer::<DeformVert>().unwrap();
        assert_eq!(out.len(), mesh.num_vertices());
        let l1 = mr.level(1).unwrap();
        for e in &l1.edges {
            assert_eq!(out[e.mid as usize].weights[0].def_nr, e.v[0]);
        }
        for f in &l1.faces {
            assert_eq!(out[f.mid as usize].weights[0].def_nr, f.v[0]);
        }
    }

    #[test]
    fn test_uvs_are_split() {
        let mut mesh = plane();
        let tf = TexFace {
            uv: [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
        };
        mesh.fdata.add_layer(vec![tf, tf]);
        let session = Session::default();
        let mut mr = MultiresHierarchy::create(&mesh).unwrap();
        mr.add_level(&mut mesh, &session, SubdivisionKind::CatmullClark).unwrap();

        let out = mesh.fdata.layer::<TexFace>().unwrap();
        assert_eq!(out.len(), 8);
        assert_eq!(out[0].uv, [[0.0, 0.5], [0.0, 0.0], [0.5, 0.0], [0.5, 0.5]]);
    }
}
