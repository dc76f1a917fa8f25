//! Per-corner face values: vertex colors and UVs.
//!
//! When a face is split, child `j` takes the average of corner `j` with its
//! previous neighbor, corner `j` itself, the average with its next neighbor,
//! and the average of all corners, in that order. Collapsing a level copies
//! each child's second corner back into its parent.

use std::ops::{Add, AddAssign, Sub};

use crate::mesh::{GeometrySource, MCol};

use super::hierarchy::MultiresHierarchy;
use super::level::ColFace;

/// A floating-point ARGB color, kept unclamped between levels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Color {
    /// Alpha.
    pub a: f32,
    /// Red.
    pub r: f32,
    /// Green.
    pub g: f32,
    /// Blue.
    pub b: f32,
}

impl From<MCol> for Color {
    fn from(c: MCol) -> Self {
        Self {
            a: c.a as f32,
            r: c.r as f32,
            g: c.g as f32,
            b: c.b as f32,
        }
    }
}

impl Add for Color {
    type Output = Color;
    fn add(self, o: Color) -> Color {
        Color {
            a: self.a + o.a,
            r: self.r + o.r,
            g: self.g + o.g,
            b: self.b + o.b,
        }
    }
}

impl AddAssign for Color {
    fn add_assign(&mut self, o: Color) {
        *self = *self + o;
    }
}

impl Sub for Color {
    type Output = Color;
    fn sub(self, o: Color) -> Color {
        Color {
            a: self.a - o.a,
            r: self.r - o.r,
            g: self.g - o.g,
            b: self.b - o.b,
        }
    }
}

/// Arithmetic mean of one to four colors.
pub fn col_avg(cols: &[Color]) -> Color {
    let n = cols.len() as f32;
    let sum = cols.iter().fold(Color::default(), |acc, &c| acc + c);
    Color {
        a: sum.a / n,
        r: sum.r / n,
        g: sum.g / n,
        b: sum.b / n,
    }
}

/// Mean of exactly two colors.
pub fn col_avg2(c1: Color, c2: Color) -> Color {
    col_avg(&[c1, c2])
}

fn clamp_component(c: f32) -> u8 {
    c.clamp(0.0, 255.0) as u8
}

/// Converts stored corner colors to 8-bit colors, clamping to 0..=255.
pub fn to_mcol(f: &ColFace) -> [MCol; 4] {
    f.map(|c| MCol {
        a: clamp_component(c.a),
        r: clamp_component(c.r),
        g: clamp_component(c.g),
        b: clamp_component(c.b),
    })
}

/// A value stored per face corner that can be averaged.
pub trait CornerValue: Copy {
    /// Mean of `values` (non-empty).
    fn average(values: &[Self]) -> Self;
}

impl CornerValue for Color {
    fn average(values: &[Self]) -> Self {
        col_avg(values)
    }
}

impl CornerValue for [f32; 2] {
    fn average(values: &[Self]) -> Self {
        let n = values.len() as f32;
        let (u, v) = values
            .iter()
            .fold((0.0, 0.0), |(u, v), p| (u + p[0], v + p[1]));
        [u / n, v / n]
    }
}

/// Corner values of the `sides` children a face splits into.
pub fn split_corners<T: CornerValue>(corners: &[T; 4], sides: usize) -> impl Iterator<Item = [T; 4]> + '_ {
    let center = T::average(&corners[..sides]);
    (0..sides).map(move |j| {
        let prev = corners[if j == 0 { sides - 1 } else { j - 1 }];
        let next = corners[if j == sides - 1 { 0 } else { j + 1 }];
        [
            T::average(&[corners[j], prev]),
            corners[j],
            T::average(&[corners[j], next]),
            center,
        ]
    })
}

/// Reads the corner colors of face `i` from `source`, if it has a color layer.
pub(crate) fn source_colors<S: GeometrySource + ?Sized>(source: &S, i: usize) -> Option<ColFace> {
    source
        .fdata()
        .get::<[MCol; 4]>(i)
        .map(|cols| cols.map(Color::from))
}

impl MultiresHierarchy {
    /// Loads corner colors from `source` into the displayed level and
    /// regenerates every other level from it.
    ///
    /// Does nothing if `source` has no color layer.
    pub fn load_cols<S: GeometrySource + ?Sized>(&mut self, source: &S) {
        self.use_col = source.fdata().has_layer(crate::mesh::LayerType::Col);
        if !self.use_col {
            return;
        }

        for level in &mut self.levels {
            if level.colfaces.is_none() {
                level.colfaces = Some(vec![ColFace::default(); level.totface()]);
            }
        }

        let cur = self.current - 1;
        if let Some(cols) = self.levels[cur].colfaces.as_mut() {
            for (i, f) in cols.iter_mut().enumerate() {
                if let Some(c) = source_colors(source, i) {
                    *f = c;
                }
            }
        }

        for l in cur + 1..self.levels.len() {
            let (lower, upper) = self.levels.split_at_mut(l);
            let prev = &lower[l - 1];
            let (Some(prev_cols), Some(cols)) = (prev.colfaces.as_ref(), upper[0].colfaces.as_mut()) else {
                continue;
            };
            let mut curf = 0;
            for (f, pc) in prev.faces.iter().zip(prev_cols) {
                for child in split_corners(pc, f.sides()) {
                    cols[curf] = child;
                    curf += 1;
                }
            }
        }

        self.collapse_cols();
    }

    /// Re-derives every level below the top from its children's corners.
    pub(crate) fn collapse_cols(&mut self) {
        for l in (0..self.levels.len().saturating_sub(1)).rev() {
            let (lower, upper) = self.levels.split_at_mut(l + 1);
            let level = &mut lower[l];
            let Some(next_cols) = upper[0].colfaces.as_ref() else {
                continue;
            };
            let Some(cols) = level.colfaces.as_mut() else {
                continue;
            };
            let mut curf = 0;
            for (f, col) in level.faces.iter().zip(cols.iter_mut()) {
                for c in col.iter_mut().take(f.sides()) {
                    *c = next_cols[curf][1];
                    curf += 1;
                }
            }
        }
    }

    /// Detects a color layer added to or removed from `source` since the
    /// last operation.
    pub fn check_colors<S: GeometrySource + ?Sized>(&mut self, source: &S) {
        let has = source.fdata().has_layer(crate::mesh::LayerType::Col);
        if self.use_col && !has {
            self.use_col = false;
        } else if !self.use_col && has {
            self.load_cols(source);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(v: f32) -> Color {
        Color { a: v, r: v, g: v, b: v }
    }

    #[test]
    fn test_col_avg() {
        assert_eq!(col_avg(&[c(0.0), c(4.0), c(8.0)]), c(4.0));
        assert_eq!(col_avg2(c(1.0), c(2.0)), c(1.5));
    }

    #[test]
    fn test_to_mcol_clamps() {
        let f = [c(-20.0), c(300.0), c(127.5), c(0.0)];
        let out = to_mcol(&f);
        assert_eq!(out[0], MCol::new(0, 0, 0, 0));
        assert_eq!(out[1], MCol::new(255, 255, 255, 255));
        assert_eq!(out[2].r, 127);
    }

    #[test]
    fn test_split_quad_corners() {
        let parent = [c(0.0), c(4.0), c(8.0), c(4.0)];
        let children: Vec<_> = split_corners(&parent, 4).collect();
        assert_eq!(children.len(), 4);
        assert_eq!(children[0], [c(2.0), c(0.0), c(2.0), c(4.0)]);
        assert_eq!(children[2], [c(6.0), c(8.0), c(6.0), c(4.0)]);
    }

    #[test]
    fn test_split_triangle_uvs() {
        let parent = [[0.0, 0.0], [3.0, 0.0], [0.0, 3.0], [9.0, 9.0]];
        let children: Vec<_> = split_corners(&parent, 3).collect();
        assert_eq!(children.len(), 3);
        assert_eq!(children[1], [[1.5, 0.0], [3.0, 0.0], [1.5, 1.5], [1.0, 1.0]]);
    }
}
