//! # Multires
//!
//! Multiresolution meshes: a base mesh plus successively finer subdivision
//! levels that can be edited at any resolution.
//!
//! Two representations are provided:
//!
//! - [`multires::MultiresHierarchy`] stores every level explicitly. Edits made
//!   at the displayed level are smoothed down to finer levels with
//!   Catmull-Clark stencils and shared with coarser levels.
//! - [`subsurf::MultiresModifier`] stores only the base mesh and one
//!   tangent-space [`displace::DisplacementGrid`] per base face. Finer
//!   geometry is derived on demand by subdividing the base and adding the
//!   stored offsets.
//!
//! ## Features
//!
//! - **Level hierarchy**: add, select and propagate levels with vertex
//!   colors, UVs, deformation weights and edge flags carried along
//! - **Displacement grids**: capture and apply per-face offsets in a local
//!   frame so detail follows the smoothed surface
//! - **File formats**: PLY
//!
//! ## Quick Start
//!
//! ```
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
//! let session = Session::default();
//!
//! let mut mr = MultiresHierarchy::create(&session.source(&mesh)).unwrap();
//! mr.add_level(&mut mesh, &session, SubdivisionKind::CatmullClark).unwrap();
//! mr.add_level(&mut mesh, &session, SubdivisionKind::CatmullClark).unwrap();
//! assert_eq!(mesh.num_faces(), 16);
//!
//! // Lift the center and push the edit to every level.
//! mr.set_level(&mut mesh, &session, 1).unwrap();
//! mesh.verts[0].co.z = 1.0;
//! mr.update_levels(&mesh, &session).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod displace;
pub mod error;
pub mod io;
pub mod mesh;
pub mod multires;
pub mod subsurf;

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and functions:
///
/// ```
/// use multires::prelude::*;
/// ```
pub mod prelude {
    pub use crate::displace::DisplacementGrid;
    pub use crate::error::{MultiresError, Result};
    pub use crate::mesh::{build_from_polygons, Edge, Face, Mesh, Session, Vertex};
    pub use crate::multires::{MultiresHierarchy, SubdivisionKind, MAX_LEVELS};
    pub use crate::subsurf::{
        CatmullClarkEvaluator, DerivedMesh, MultiresDerived, MultiresModifier, SubsurfEvaluator,
    };
}

// Re-export nalgebra types for convenience
pub use nalgebra;

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use nalgebra::Vector3;
    use std::rc::Rc;

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
        let faces = vec![
            vec![0, 3, 2, 1],
            vec![4, 5, 6, 7],
            vec![0, 1, 5, 4],
            vec![1, 2, 6, 5],
            vec![2, 3, 7, 6],
            vec![3, 0, 4, 7],
        ];
        build_from_polygons(&positions, &faces).unwrap()
    }

    #[test]
    fn test_cube_hierarchy_counts() {
        let mut mesh = cube();
        let session = Session::default();
        let mut mr = MultiresHierarchy::create(&session.source(&mesh)).unwrap();

        mr.add_level(&mut mesh, &session, SubdivisionKind::CatmullClark).unwrap();
        assert_eq!(mesh.num_vertices(), 26);
        assert_eq!(mesh.num_edges(), 48);
        assert_eq!(mesh.num_faces(), 24);

        mr.add_level(&mut mesh, &session, SubdivisionKind::CatmullClark).unwrap();
        assert_eq!(mesh.num_vertices(), 98);
        assert_eq!(mesh.num_faces(), 96);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_both_representations_agree_without_offsets() {
        let base = cube();
        let session = Session::default();

        let mut mesh = base.clone();
        let mut mr = MultiresHierarchy::create(&session.source(&mesh)).unwrap();
        mr.add_level(&mut mesh, &session, SubdivisionKind::CatmullClark).unwrap();

        let evaluator: Rc<dyn SubsurfEvaluator> = Rc::new(CatmullClarkEvaluator::new());
        let mut grids_mesh = base;
        let mut mmd = MultiresModifier::new();
        mmd.subdivide(&mut grids_mesh, &evaluator).unwrap();
        let dm = mmd.create_derived(&grids_mesh, &evaluator, false).unwrap();

        assert_eq!(dm.num_vertices(), mesh.num_vertices());
        assert_eq!(dm.num_faces(), mesh.num_faces());

        // Same surface, vertex order may differ.
        for v in &dm.as_mesh().verts {
            let nearest = mesh
                .verts
                .iter()
                .map(|w| (w.co - v.co).norm())
                .fold(f32::MAX, f32::min);
            assert!(nearest < 1e-5);
        }
    }
}
