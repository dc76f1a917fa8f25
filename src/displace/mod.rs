//! Tangent-space displacement grids.
//!
//! Every base face carries a [`DisplacementGrid`] sized for the finest level
//! of detail. Sample `(x, y)` stores the offset of one subdivided vertex from
//! its smooth position, expressed in a frame built from the face center, its
//! first corner and the interpolated vertex normal. Storing offsets in that
//! frame keeps sculpted detail attached when the coarse cage moves.
//!
//! A [`MultiresDisplacer`] moves samples between a grid and subdivided
//! positions. It is driven by a [`GridCursor`] that visits grid cells in the
//! same order the subdivision layout visits vertices: face centers, rings,
//! quadrant interiors, then shared edges and corners.

mod cursor;
mod displacer;
mod frame;
mod grid;

pub use cursor::{AnchorKind, GridCursor};
pub use displacer::{DisplaceContext, FaceFrame, MultiresDisplacer};
pub use frame::{calc_face_ts_mat, calc_ts_mat, face_anchor, interpolate_normal, invert_or_identity};
pub use grid::DisplacementGrid;
