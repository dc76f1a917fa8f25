//! Walking a displacement grid in subdivided-vertex order.

use crate::mesh::Face;
use crate::multires::side_tot;

/// Where a walk over a face's grid is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnchorKind {
    /// The face center.
    #[default]
    Center,
    /// The line from the center to a side midpoint.
    Ring,
    /// The interior of one corner quadrant.
    Interior,
    /// An edge of the base face, shared with its neighbors.
    Edge,
    /// A corner of the base face, shared with its neighbors.
    Corner,
}

impl AnchorKind {
    /// True for samples shared between faces, which are blended by weight.
    pub fn is_shared(self) -> bool {
        matches!(self, AnchorKind::Edge | AnchorKind::Corner)
    }
}

/// Grid position of a walk at displayed level `lvl` over a grid sized for
/// `totlvl`.
///
/// Sides are numbered 0 (toward `y = 0`), 1 (toward `x = e`), 2 (toward
/// `y = e`) and 3 (toward `x = 0`), where `e = sidetot - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridCursor {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
    ax: i32,
    ay: i32,
    side: usize,
    kind: AnchorKind,
    spacing: i32,
    sidetot: i32,
}

impl GridCursor {
    /// A cursor at the grid center.
    pub fn new(lvl: usize, totlvl: usize) -> Self {
        let sidetot = side_tot(totlvl) as i32;
        let mut cursor = Self {
            x: 0,
            y: 0,
            ax: 0,
            ay: 0,
            side: 0,
            kind: AnchorKind::Center,
            spacing: 1 << totlvl.saturating_sub(lvl),
            sidetot,
        };
        cursor.anchor(AnchorKind::Center, 0);
        cursor
    }

    /// Grid step between two vertices of the displayed level.
    pub fn spacing(&self) -> usize {
        self.spacing as usize
    }

    /// Cells along one side of the grid.
    pub fn sidetot(&self) -> usize {
        self.sidetot as usize
    }

    /// Current anchor kind.
    pub fn kind(&self) -> AnchorKind {
        self.kind
    }

    /// Moves to the first sample of a center, ring or interior walk on `side`
    /// and remembers it as the anchor.
    pub fn anchor(&mut self, kind: AnchorKind, side: usize) {
        let s = self.spacing;
        self.side = side;
        self.kind = kind;
        self.x = self.sidetot / 2;
        self.y = self.sidetot / 2;

        match kind {
            AnchorKind::Ring => match side {
                0 => self.y -= s,
                1 => self.x += s,
                2 => self.y += s,
                _ => self.x -= s,
            },
            AnchorKind::Interior => {
                let (dx, dy) = match side {
                    0 => (-s, -s),
                    1 => (s, -s),
                    2 => (s, s),
                    _ => (-s, s),
                };
                self.x += dx;
                self.y += dy;
            }
            _ => {}
        }

        self.ax = self.x;
        self.ay = self.y;
    }

    /// Moves to sample `x` (counted in displayed-level steps) along the edge
    /// from `v1` to `v2` of `face`.
    ///
    /// The closing edge of a triangle bends around the unused fourth
    /// quadrant: it runs along `y = e` from the third corner to the side
    /// midpoint, then along `x = 0` down to the first corner.
    pub fn anchor_edge(&mut self, face: &Face, v1: u32, v2: u32, x: usize) {
        let mov = self.spacing * x as i32;
        let e = self.sidetot - 1;
        let c = e / 2;
        self.kind = AnchorKind::Edge;

        let corner = face.corner_of(v1);
        let toward = |j: usize| face.v[j] == v2;
        (self.x, self.y) = match corner {
            Some(0) if !face.quad && !toward(1) => {
                if mov < c {
                    (0, mov)
                } else {
                    (mov, e)
                }
            }
            Some(2) if !face.quad && !toward(1) => {
                if mov <= c {
                    (e - mov, e)
                } else {
                    (0, e - mov)
                }
            }
            Some(0) if toward(1) => (mov, 0),
            Some(0) => (0, mov),
            Some(1) if toward(0) => (e - mov, 0),
            Some(1) => (e, mov),
            Some(2) if toward(1) => (e, e - mov),
            Some(2) => (e - mov, e),
            Some(3) if toward(2) => (mov, e),
            Some(3) => (0, e - mov),
            _ => (self.x, self.y),
        };
    }

    /// Moves to the cell of corner `v` of `face`.
    pub fn anchor_vert(&mut self, face: &Face, v: u32) {
        let e = self.sidetot - 1;
        self.kind = AnchorKind::Corner;
        (self.x, self.y) = match face.corner_of(v) {
            Some(1) => (e, 0),
            Some(2) => (e, e),
            Some(3) => (0, e),
            _ => (0, 0),
        };
    }

    /// Starts the next row of an interior walk: one step across the walk
    /// direction, back to the anchor along it.
    pub fn jump(&mut self) {
        let s = self.spacing;
        match self.side {
            0 => {
                self.x -= s;
                self.y = self.ay;
            }
            1 => {
                self.x = self.ax;
                self.y -= s;
            }
            2 => {
                self.x += s;
                self.y = self.ay;
            }
            _ => {
                self.x = self.ax;
                self.y += s;
            }
        }
    }

    /// Steps to the next sample of a ring or interior walk. Other anchors
    /// stay put.
    pub fn advance(&mut self) {
        if !matches!(self.kind, AnchorKind::Ring | AnchorKind::Interior) {
            return;
        }
        let s = self.spacing;
        match self.side {
            0 => self.y -= s,
            1 => self.x += s,
            2 => self.y += s,
            _ => self.x -= s,
        }
    }

    /// Current cell, or `None` if the walk left the grid.
    pub fn cell(&self) -> Option<(usize, usize)> {
        let range = 0..self.sidetot;
        (range.contains(&self.x) && range.contains(&self.y)).then(|| (self.x as usize, self.y as usize))
    }

    /// Row-major index of the current cell.
    pub fn index(&self) -> Option<usize> {
        self.cell().map(|(x, y)| y * self.sidetot as usize + x)
    }
}
