//! Reading and writing displacement grids against subdivided geometry.

use nalgebra::{Matrix3, Vector3};

use super::cursor::{AnchorKind, GridCursor};
use super::frame::{calc_face_ts_mat, calc_ts_mat, face_anchor, interpolate_normal, invert_or_identity};
use super::grid::DisplacementGrid;
use crate::mesh::Face;

/// The base mesh a derived mesh was subdivided from, as seen by displacers.
#[derive(Debug, Clone, Copy)]
pub struct DisplaceContext<'a> {
    /// Base vertex positions.
    pub orco: &'a [Vector3<f32>],
    /// Base faces.
    pub faces: &'a [Face],
    /// Base vertex normals.
    pub normals: &'a [Vector3<f32>],
    /// Displayed displacement level.
    pub lvl: usize,
    /// Finest displacement level; grids are sized for it.
    pub totlvl: usize,
}

/// Per-face data a displacer needs, computed once per face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceFrame {
    /// The base face.
    pub face: Face,
    /// Tangent frame of the face, inverted when capturing.
    pub mat: Matrix3<f32>,
    center: Vector3<f32>,
    target: Vector3<f32>,
    norms: [Vector3<f32>; 4],
}

impl FaceFrame {
    /// Builds the frame of base face `face_index`.
    pub fn new(ctx: &DisplaceContext<'_>, face_index: usize, invert: bool) -> Self {
        let face = ctx.faces[face_index];
        let mut mat = calc_face_ts_mat(ctx.orco, &face);
        if invert {
            mat = invert_or_identity(&mat);
        }
        let (center, target) = face_anchor(ctx.orco, &face);
        let norm = |j: usize| ctx.normals[face.v[j] as usize];
        let norms = [norm(0), norm(1), norm(2), if face.quad { norm(3) } else { norm(0) }];
        Self {
            face,
            mat,
            center,
            target,
            norms,
        }
    }
}

enum GridAccess<'a> {
    Read(&'a DisplacementGrid),
    Write(&'a mut DisplacementGrid),
}

impl GridAccess<'_> {
    fn grid(&self) -> &DisplacementGrid {
        match self {
            GridAccess::Read(g) => g,
            GridAccess::Write(g) => g,
        }
    }
}

/// Moves one grid walk's worth of samples between a face's displacement grid
/// and subdivided vertex positions.
///
/// Applying adds the stored tangent-space offset to a position. Capturing
/// (`invert`) stores the offset of a position from its pristine subdivided
/// location. The frame used per sample is rebuilt from the corner normals
/// interpolated at the sample, so curved faces keep their offsets oriented
/// to the surface.
pub struct MultiresDisplacer<'a> {
    frame: FaceFrame,
    grid: Option<GridAccess<'a>>,
    cursor: GridCursor,
    invert: bool,
    weight: f32,
}

impl<'a> MultiresDisplacer<'a> {
    /// Prepares a displacer for base face `face_index` over `grid`.
    ///
    /// The cursor starts at the face center.
    pub fn init(
        ctx: &DisplaceContext<'_>,
        grid: Option<&'a mut DisplacementGrid>,
        face_index: usize,
        invert: bool,
    ) -> Self {
        Self {
            frame: FaceFrame::new(ctx, face_index, invert),
            grid: grid.map(GridAccess::Write),
            cursor: GridCursor::new(ctx.lvl, ctx.totlvl),
            invert,
            weight: 1.0,
        }
    }

    /// A displacer writing into `grid`, continuing from `cursor`.
    pub fn capture(frame: FaceFrame, grid: Option<&'a mut DisplacementGrid>, cursor: GridCursor) -> Self {
        Self {
            frame,
            grid: grid.map(GridAccess::Write),
            cursor,
            invert: true,
            weight: 1.0,
        }
    }

    /// A displacer reading from `grid`, continuing from `cursor`.
    pub fn apply(frame: FaceFrame, grid: Option<&'a DisplacementGrid>, cursor: GridCursor) -> Self {
        Self {
            frame,
            grid: grid.map(GridAccess::Read),
            cursor,
            invert: false,
            weight: 1.0,
        }
    }

    /// Sets the blend weight used for shared edge and corner samples.
    pub fn weight(&mut self, w: f32) {
        self.weight = w;
    }

    /// See [`GridCursor::anchor`].
    pub fn anchor(&mut self, kind: AnchorKind, side: usize) {
        self.cursor.anchor(kind, side);
    }

    /// See [`GridCursor::anchor_edge`].
    pub fn anchor_edge(&mut self, v1: u32, v2: u32, x: usize) {
        self.cursor.anchor_edge(&self.frame.face, v1, v2, x);
    }

    /// See [`GridCursor::anchor_vert`].
    pub fn anchor_vert(&mut self, v: u32) {
        self.cursor.anchor_vert(&self.frame.face, v);
    }

    /// See [`GridCursor::jump`].
    pub fn jump(&mut self) {
        self.cursor.jump();
    }

    /// The walk position.
    pub fn cursor(&self) -> &GridCursor {
        &self.cursor
    }

    /// The face frame.
    pub fn frame(&self) -> &FaceFrame {
        &self.frame
    }

    /// Applies the current sample to `co`, or captures `co - subco` into the
    /// grid, then steps a ring or interior walk forward.
    ///
    /// Does nothing if the face has no grid or the grid is empty.
    pub fn displace(&mut self, co: &mut Vector3<f32>, subco: &Vector3<f32>) {
        let Some(access) = self.grid.as_mut() else {
            return;
        };
        let grid = access.grid();
        if grid.is_empty() {
            return;
        }
        let sidetot = self.cursor.sidetot();
        let (Some((x, y)), Some(idx)) = (self.cursor.cell(), self.cursor.index()) else {
            return;
        };
        if idx >= grid.len() {
            return;
        }

        let disp = if self.invert { *co - subco } else { grid.disps[idx] };

        let norm = interpolate_normal(&self.frame.norms, x, y, sidetot);
        let mut mat = calc_ts_mat(&self.frame.center, &self.frame.target, &norm);
        if self.invert {
            mat = invert_or_identity(&mat);
        }
        let disp = mat * disp;

        match access {
            GridAccess::Write(grid) if self.invert => grid.disps[idx] = disp,
            _ if self.invert => {}
            _ => {
                let w = if self.cursor.kind().is_shared() { self.weight } else { 1.0 };
                *co += disp * w;
            }
        }

        self.cursor.advance();
    }
}
