//! Subdivided (derived) meshes and the displacement driver.
//!
//! The multires hierarchy stores every level explicitly. Displacement-based
//! multires works differently: only the base mesh and one
//! [`DisplacementGrid`](crate::displace::DisplacementGrid) per base face are
//! stored, and finer geometry is derived on demand by subdividing the base
//! with a [`SubsurfEvaluator`] and adding the stored offsets.
//!
//! - [`MultiresDerived`] is such a derived mesh. Editing its vertices and
//!   releasing it captures the edit back into the grids through its
//!   [`OnStale`] hook.
//! - [`MultiresModifier`] holds the displayed, total and render levels and
//!   raises the grid resolution with [`MultiresModifier::subdivide`].
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use multires::prelude::*;
//! use nalgebra::Vector3;
//!
//! let positions = vec![
//!     Vector3::new(0.0, 0.0, 0.0),
//!     Vector3::new(1.0, 0.0, 0.0),
//!     Vector3::new(1.0, 1.0, 0.0),
//!     Vector3::new(0.0, 1.0, 0.0),
//! ];
//! let mut mesh = build_from_polygons(&positions, &[vec![0, 1, 2, 3]]).unwrap();
//! let evaluator: Rc<dyn SubsurfEvaluator> = Rc::new(CatmullClarkEvaluator::new());
//!
//! let mut mmd = MultiresModifier::new();
//! mmd.subdivide(&mut mesh, &evaluator).unwrap();
//!
//! let mut dm = mmd.create_derived(&mesh, &evaluator, false).unwrap();
//! assert_eq!(dm.num_vertices(), 9);
//! dm.verts_mut()[0].co.z += 0.5;
//! dm.release(&mut mesh).unwrap();
//! ```

mod derived;
mod driver;
mod evaluator;
mod layout;

pub use derived::{MultiresDerived, UPDATE_ALWAYS, UPDATE_BLOCK};
pub use driver::{
    rebuild_displacement_grids, subdivision_preview, CaptureDisplacements, MultiresModifier, RebuildMode,
};
pub use evaluator::CatmullClarkEvaluator;
pub use layout::{subface_placements, CellCollector, CellIndex, CellVisit, GridLayout, GridTraversal, Placement};

use nalgebra::Vector3;

use crate::error::Result;
use crate::mesh::Mesh;

/// Produces subdivided meshes.
///
/// Output vertices must follow the order of
/// [`GridLayout::walk`] over the input topology; displacement capture and
/// grid rebuilding rely on it. Output faces are the level-`levels + 1` faces
/// in hierarchy order, grouped per input face.
pub trait SubsurfEvaluator {
    /// Subdivides `mesh` `levels` times. Zero levels copies the geometry.
    fn subdivide(&self, mesh: &Mesh, levels: usize) -> Result<Mesh>;
}

/// Read access to an evaluated mesh.
pub trait DerivedMesh {
    /// The evaluated geometry.
    fn as_mesh(&self) -> &Mesh;

    /// Number of vertices.
    fn num_vertices(&self) -> usize {
        self.as_mesh().num_vertices()
    }

    /// Number of edges.
    fn num_edges(&self) -> usize {
        self.as_mesh().num_edges()
    }

    /// Number of faces.
    fn num_faces(&self) -> usize {
        self.as_mesh().num_faces()
    }

    /// Vertex positions.
    fn positions(&self) -> Vec<Vector3<f32>> {
        self.as_mesh().positions()
    }
}

impl DerivedMesh for Mesh {
    fn as_mesh(&self) -> &Mesh {
        self
    }
}

/// Called when a modified derived mesh is released.
pub trait OnStale {
    /// Reacts to the edits made to `dm`, usually by writing them into `mesh`.
    fn on_stale(&self, dm: &MultiresDerived, mesh: &mut Mesh) -> Result<()>;
}
