//! Per-face displacement storage.

use nalgebra::Vector3;

use crate::multires::side_tot;

/// A square grid of tangent-space offsets attached to one base face.
///
/// The grid is sized for the finest displacement level: `side` is
/// `2^(totlvl - 1) + 1` and cell `(x, y)` lives at `y * side + x`. An empty
/// grid (no cells) is valid and leaves geometry untouched.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DisplacementGrid {
    side: usize,
    /// Offsets in row-major order.
    pub disps: Vec<Vector3<f32>>,
}

impl DisplacementGrid {
    /// A zeroed grid for a hierarchy with `totlvl` displacement levels.
    pub fn new(totlvl: usize) -> Self {
        let side = side_tot(totlvl);
        Self {
            side,
            disps: vec![Vector3::zeros(); side * side],
        }
    }

    /// A grid with no cells.
    pub fn empty() -> Self {
        Self::default()
    }

    /// True if no cells are allocated.
    pub fn is_empty(&self) -> bool {
        self.disps.is_empty()
    }

    /// Number of cells along one side.
    pub fn side(&self) -> usize {
        self.side
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.disps.len()
    }

    /// Offset at `(x, y)`.
    pub fn get(&self, x: usize, y: usize) -> Option<Vector3<f32>> {
        if x >= self.side {
            return None;
        }
        self.disps.get(y * self.side + x).copied()
    }

    /// Sets the offset at `(x, y)`. Out-of-range cells are ignored.
    pub fn set(&mut self, x: usize, y: usize, d: Vector3<f32>) {
        if x < self.side {
            if let Some(cell) = self.disps.get_mut(y * self.side + x) {
                *cell = d;
            }
        }
    }
}
