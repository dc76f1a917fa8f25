//! Multiresolution level hierarchy.
//!
//! A [`MultiresHierarchy`] stores a base mesh together with every finer level
//! obtained by repeated subdivision. Level `n + 1` keeps the vertex indices of
//! level `n`, then appends one vertex per level-`n` edge (its midpoint) and
//! one per level-`n` face (its center):
//!
//! ```text
//! totvert(n + 1) = totvert(n) + totedge(n) + totface(n)
//! ```
//!
//! Edits made at the displayed level are pushed to finer levels through
//! Catmull-Clark stencils and to coarser levels by sharing vertex indices,
//! see [`MultiresHierarchy::update_levels`].
//!
//! # Example
//!
//! ```
//! use multires::prelude::*;
//! use nalgebra::Vector3;
//!
//! let positions = vec![
//!     Vector3::new(0.0, 0.0, 0.0),
//!     Vector3::new(2.0, 0.0, 0.0),
//!     Vector3::new(2.0, 2.0, 0.0),
//!     Vector3::new(0.0, 2.0, 0.0),
//! ];
//! let mut mesh = build_from_polygons(&positions, &[vec![0, 1, 2, 3]]).unwrap();
//! let session = Session::default();
//!
//! let mut mr = MultiresHierarchy::create(&session.source(&mesh)).unwrap();
//! mr.add_level(&mut mesh, &session, SubdivisionKind::CatmullClark).unwrap();
//!
//! assert_eq!(mr.level_count(), 2);
//! assert_eq!(mesh.num_vertices(), 9);
//! assert_eq!(mesh.num_faces(), 4);
//! ```

mod color;
mod connectivity;
mod hierarchy;
mod level;
mod projection;
mod propagate;
pub mod stencil;

pub use color::{col_avg, col_avg2, split_corners, to_mcol, Color, CornerValue};
pub use connectivity::Connectivity;
pub use hierarchy::MultiresHierarchy;
pub use level::{ColFace, Level, LevelEdge, LevelFace, LevelVertex};

pub(crate) use hierarchy::subdivide;

/// Maximum number of levels in a hierarchy or displacement grid.
///
/// A grid at this depth has `4097 x 4097` samples per face.
pub const MAX_LEVELS: usize = 13;

/// Number of grid samples along one side of a face at level `lvl` (1-based):
/// `2^(lvl - 1) + 1`.
///
/// # Panics
///
/// Panics if `lvl` is zero.
#[inline]
pub const fn side_tot(lvl: usize) -> usize {
    (1 << (lvl - 1)) + 1
}

/// How a new level positions its vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SubdivisionKind {
    /// Catmull-Clark smoothing of new and existing vertices.
    #[default]
    CatmullClark,
    /// Plain midpoint/center insertion; existing vertices stay put.
    Simple,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_tot_matches_grid_sizes() {
        let sides: Vec<usize> = (1..=MAX_LEVELS).map(side_tot).collect();
        assert_eq!(
            sides,
            vec![2, 3, 5, 9, 17, 33, 65, 129, 257, 513, 1025, 2049, 4097]
        );
    }
}
