//! The in-editor mesh.
//!
//! An [`EditMesh`] carries the same geometry as a [`Mesh`] but with editor
//! state expressed as booleans. The conversions below map that state onto the
//! base-mesh flag bits the multires hierarchy stores.

use nalgebra::Vector3;

use super::custom_data::CustomData;
use super::{
    Edge, Face, Mesh, Vertex, ME_EDGEDRAW, ME_EDGERENDER, ME_FACE_SEL, ME_FGON, ME_HIDE, ME_LOOSEEDGE,
    ME_SEAM, ME_SHARP, SELECT,
};

/// An edit-mode vertex.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EditVert {
    /// Position.
    pub co: Vector3<f32>,
    /// Selection state.
    pub select: bool,
    /// Hidden state.
    pub hidden: bool,
}

impl EditVert {
    /// Converts to a base-mesh vertex (normal left zero).
    pub fn to_vertex(&self) -> Vertex {
        let mut flag = 0;
        if self.select {
            flag |= SELECT;
        }
        if self.hidden {
            flag |= ME_HIDE;
        }
        Vertex {
            co: self.co,
            no: Vector3::zeros(),
            flag,
        }
    }
}

/// An edit-mode edge.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EditEdge {
    /// Endpoint vertex indices.
    pub v: [u32; 2],
    /// Selection state.
    pub select: bool,
    /// Hidden state.
    pub hidden: bool,
    /// Internal edge of an n-gon fan.
    pub fgon: bool,
    /// Sharp edge.
    pub sharp: bool,
    /// UV seam.
    pub seam: bool,
    /// Crease weight in 0..=1.
    pub crease: f32,
    /// Number of faces using this edge.
    pub face_users: u8,
}

impl EditEdge {
    /// Base-mesh edge flags and 8-bit crease for this edge.
    pub fn medge_flag(&self) -> (u16, u8) {
        let mut flag = ME_EDGERENDER;
        if self.select {
            flag |= SELECT as u16;
        }
        if self.face_users < 2 {
            flag |= ME_EDGEDRAW;
        }
        if self.face_users == 0 {
            flag |= ME_LOOSEEDGE;
        }
        if self.sharp {
            flag |= ME_SHARP;
        }
        if self.seam {
            flag |= ME_SEAM;
        }
        if self.fgon {
            flag |= ME_FGON;
        }
        if self.hidden {
            flag |= ME_HIDE as u16;
        }
        (flag, (255.0 * self.crease.clamp(0.0, 1.0)) as u8)
    }

    /// Converts to a base-mesh edge.
    pub fn to_edge(&self) -> Edge {
        let (flag, crease) = self.medge_flag();
        Edge { v: self.v, crease, flag }
    }
}

/// An edit-mode face.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EditFace {
    /// Corner vertex indices.
    pub v: [u32; 4],
    /// True if the fourth corner is used.
    pub quad: bool,
    /// Selection state.
    pub select: bool,
    /// Hidden state.
    pub hidden: bool,
    /// Remaining face flags (smooth shading).
    pub flag: u8,
    /// Material slot.
    pub mat_nr: u16,
}

impl EditFace {
    /// Converts to a base-mesh face, folding selection and visibility into `flag`.
    pub fn to_face(&self) -> Face {
        let mut flag = self.flag;
        if self.select {
            flag |= ME_FACE_SEL;
        } else {
            flag &= !ME_FACE_SEL;
        }
        if self.hidden {
            flag |= ME_HIDE;
        }
        Face {
            v: self.v,
            quad: self.quad,
            flag,
            mat_nr: self.mat_nr,
        }
    }
}

/// The live editing copy of a mesh.
#[derive(Debug, Clone, Default)]
pub struct EditMesh {
    /// Vertices.
    pub verts: Vec<EditVert>,
    /// Edges.
    pub edges: Vec<EditEdge>,
    /// Faces.
    pub faces: Vec<EditFace>,
    /// Per-vertex attribute layers.
    pub vdata: CustomData,
    /// Per-face attribute layers.
    pub fdata: CustomData,
}

impl EditMesh {
    /// Enters editing on `mesh`, copying its geometry and layers.
    pub fn from_mesh(mesh: &Mesh) -> Self {
        let verts = mesh
            .verts
            .iter()
            .map(|v| EditVert {
                co: v.co,
                select: v.flag & SELECT != 0,
                hidden: v.flag & ME_HIDE != 0,
            })
            .collect();

        let mut users = vec![0u8; mesh.edges.len()];
        for f in &mesh.faces {
            let verts = f.verts();
            for j in 0..verts.len() {
                let (a, b) = (verts[j], verts[(j + 1) % verts.len()]);
                if let Some(e) = mesh.edges.iter().position(|e| e.connects(a, b)) {
                    users[e] = users[e].saturating_add(1);
                }
            }
        }

        let edges = mesh
            .edges
            .iter()
            .zip(users)
            .map(|(e, face_users)| EditEdge {
                v: e.v,
                select: e.flag & SELECT as u16 != 0,
                hidden: e.flag & ME_HIDE as u16 != 0,
                fgon: e.flag & ME_FGON != 0,
                sharp: e.flag & ME_SHARP != 0,
                seam: e.flag & ME_SEAM != 0,
                crease: e.crease as f32 / 255.0,
                face_users,
            })
            .collect();

        let faces = mesh
            .faces
            .iter()
            .map(|f| EditFace {
                v: f.v,
                quad: f.quad,
                select: f.flag & ME_FACE_SEL != 0,
                hidden: f.flag & ME_HIDE != 0,
                flag: f.flag & !(ME_FACE_SEL | ME_HIDE),
                mat_nr: f.mat_nr,
            })
            .collect();

        Self {
            verts,
            edges,
            faces,
            vdata: mesh.vdata.clone(),
            fdata: mesh.fdata.clone(),
        }
    }
}
