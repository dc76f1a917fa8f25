//! Vertex order of subdivided meshes and its mapping onto displacement grids.
//!
//! A mesh subdivided to level `lvl` lists its vertices face by face (center,
//! rings, quadrant interiors), then edge by edge (the points strictly inside
//! each base edge), then the base vertices. [`GridLayout::walk`] produces that
//! order and, for every vertex, the grid cell it occupies in each base face
//! that touches it.

use crate::displace::{AnchorKind, GridCursor};
use crate::error::{MultiresError, Result};
use crate::mesh::{Edge, Face};

/// Receives the visits of a [`GridLayout::walk`].
pub trait GridTraversal {
    /// Called before any visit that belongs to base face `face`.
    fn select_face(&mut self, face: usize);

    /// The cursor the walk positions before each visit.
    fn cursor_mut(&mut self) -> &mut GridCursor;

    /// Visits output vertex `vert` at the current cursor cell. `sharing` is
    /// the number of faces that see this vertex (1 inside a face).
    fn visit(&mut self, vert: usize, sharing: usize);
}

/// Base topology to walk at a given subdivision level.
#[derive(Debug, Clone, Copy)]
pub struct GridLayout<'a> {
    faces: &'a [Face],
    edges: &'a [Edge],
    vert_faces: &'a [Vec<u32>],
    lvl: usize,
}

impl<'a> GridLayout<'a> {
    /// Layout of `faces`/`edges` subdivided to level `lvl` (1 is the base).
    ///
    /// `vert_faces` is the map built by
    /// [`create_vert_face_map`](crate::mesh::create_vert_face_map).
    pub fn new(faces: &'a [Face], edges: &'a [Edge], vert_faces: &'a [Vec<u32>], lvl: usize) -> Self {
        Self {
            faces,
            edges,
            vert_faces,
            lvl,
        }
    }

    /// Number of vertices in the subdivided mesh.
    pub fn num_vertices(&self) -> usize {
        if self.lvl < 2 {
            return self.vert_faces.len();
        }
        let g = 1usize << (self.lvl - 2);
        let per_face: usize = self
            .faces
            .iter()
            .map(|f| 1 + f.sides() * (g - 1) + f.sides() * (g - 1) * (g - 1))
            .sum();
        per_face + self.edges.len() * ((1 << (self.lvl - 1)) - 1) + self.vert_faces.len()
    }

    /// Walks every output vertex in order and returns how many there were.
    ///
    /// The walk moves the traversal's cursor; ring and interior walks step it
    /// forward after each visit.
    pub fn walk<T: GridTraversal>(&self, t: &mut T) -> usize {
        let mut out = 0;

        if self.lvl >= 2 {
            let g = 1usize << (self.lvl - 2);
            for (i, f) in self.faces.iter().enumerate() {
                t.select_face(i);
                t.cursor_mut().anchor(AnchorKind::Center, 0);
                t.visit(out, 1);
                out += 1;

                for s in 0..f.sides() {
                    t.cursor_mut().anchor(AnchorKind::Ring, s);
                    for _ in 1..g {
                        t.visit(out, 1);
                        t.cursor_mut().advance();
                        out += 1;
                    }
                }

                for s in 0..f.sides() {
                    t.cursor_mut().anchor(AnchorKind::Interior, s);
                    for _ in 1..g {
                        for _ in 1..g {
                            t.visit(out, 1);
                            t.cursor_mut().advance();
                            out += 1;
                        }
                        t.cursor_mut().jump();
                    }
                }
            }
        }

        let edge_size = 1usize << self.lvl.saturating_sub(1);
        for e in self.edges {
            let [v1, v2] = e.v;
            let shared = self.shared_faces(v1, v2);
            for x in 1..edge_size {
                for &f in &shared {
                    t.select_face(f);
                    t.cursor_mut().anchor_edge(&self.faces[f], v1, v2, x);
                    t.visit(out, shared.len());
                }
                out += 1;
            }
        }

        for (v, faces) in self.vert_faces.iter().enumerate() {
            for &f in faces {
                let f = f as usize;
                t.select_face(f);
                t.cursor_mut().anchor_vert(&self.faces[f], v as u32);
                t.visit(out, faces.len());
            }
            out += 1;
        }

        out
    }

    fn shared_faces(&self, v1: u32, v2: u32) -> Vec<usize> {
        let (Some(a), Some(b)) = (self.vert_faces.get(v1 as usize), self.vert_faces.get(v2 as usize)) else {
            return Vec::new();
        };
        a.iter()
            .flat_map(|n1| b.iter().filter(move |n2| *n2 == n1).map(|&f| f as usize))
            .collect()
    }
}

/// One visit recorded by a [`CellCollector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellVisit {
    /// Output vertex.
    pub vert: usize,
    /// Base face.
    pub face: usize,
    /// Grid column.
    pub x: usize,
    /// Grid row.
    pub y: usize,
}

/// Records where each output vertex lands in the grids of its faces.
#[derive(Debug, Clone)]
pub struct CellCollector {
    cursor: GridCursor,
    face: usize,
    /// Visits in walk order.
    pub visits: Vec<CellVisit>,
}

impl CellCollector {
    /// A collector for a walk at `lvl` over grids sized for `totlvl`.
    pub fn new(lvl: usize, totlvl: usize) -> Self {
        Self {
            cursor: GridCursor::new(lvl, totlvl),
            face: 0,
            visits: Vec::new(),
        }
    }

    /// The first recorded visit of every output vertex.
    pub fn first_visits(&self, num_vertices: usize) -> Vec<Option<CellVisit>> {
        let mut first = vec![None; num_vertices];
        for v in &self.visits {
            match first.get_mut(v.vert) {
                Some(slot) if slot.is_none() => *slot = Some(*v),
                _ => {}
            }
        }
        first
    }
}

impl GridTraversal for CellCollector {
    fn select_face(&mut self, face: usize) {
        self.face = face;
    }

    fn cursor_mut(&mut self) -> &mut GridCursor {
        &mut self.cursor
    }

    fn visit(&mut self, vert: usize, _sharing: usize) {
        if let Some((x, y)) = self.cursor.cell() {
            self.visits.push(CellVisit {
                vert,
                face: self.face,
                x,
                y,
            });
        }
    }
}

/// Grid corners of one subdivided face, in corner order.
pub type Placement = [(usize, usize); 4];

/// Grid placement of every level-`lvl` face that descends from a base face
/// with `sides` corners, in hierarchy order.
///
/// Coordinates run over `0..=2^(lvl - 1)`. Level-1 placement is the whole
/// grid; for triangles its fourth corner is unused.
pub fn subface_placements(sides: usize, lvl: usize) -> Vec<Placement> {
    let e = 1usize << lvl.saturating_sub(1);
    if lvl < 2 {
        return vec![[(0, 0), (e, 0), (e, e), (0, e)]];
    }
    let c = e / 2;
    let quadrants: [Placement; 4] = [
        [(0, c), (0, 0), (c, 0), (c, c)],
        [(c, 0), (e, 0), (e, c), (c, c)],
        [(e, c), (e, e), (c, e), (c, c)],
        [(c, e), (0, e), (0, c), (c, c)],
    ];
    let mut faces: Vec<Placement> = quadrants[..sides.min(4)].to_vec();

    let mid = |a: (usize, usize), b: (usize, usize)| ((a.0 + b.0) / 2, (a.1 + b.1) / 2);
    for _ in 2..lvl {
        faces = faces
            .iter()
            .flat_map(|p| {
                let center = mid(p[0], p[2]);
                (0..4).map(move |j| {
                    let before = p[(j + 3) % 4];
                    let after = p[(j + 1) % 4];
                    [mid(p[j], before), p[j], mid(p[j], after), center]
                })
            })
            .collect();
    }
    faces
}

/// Vertex at each grid cell of each base face, for a mesh subdivided to one
/// level.
#[derive(Debug, Clone)]
pub struct CellIndex {
    side: usize,
    cells: Vec<Vec<Option<u32>>>,
}

impl CellIndex {
    /// Indexes the corners of `top` (the level-`lvl` faces, grouped per base
    /// face in hierarchy order) by grid cell.
    pub fn build(base: &[Face], top: &[[u32; 4]], lvl: usize) -> Result<Self> {
        let side = (1usize << lvl.saturating_sub(1)) + 1;
        let mut cells = Vec::with_capacity(base.len());
        let mut next = 0;

        for f in base {
            let corners = if lvl < 2 { f.sides() } else { 4 };
            let mut grid = vec![None; side * side];
            for p in subface_placements(f.sides(), lvl) {
                let Some(face) = top.get(next) else {
                    return Err(MultiresError::mismatch("subdivided faces", next + 1, top.len()));
                };
                for (&(x, y), &v) in p.iter().zip(face).take(corners) {
                    grid[y * side + x] = Some(v);
                }
                next += 1;
            }
            cells.push(grid);
        }

        if next != top.len() {
            return Err(MultiresError::mismatch("subdivided faces", next, top.len()));
        }
        Ok(Self { side, cells })
    }

    /// Cells along one side.
    pub fn side(&self) -> usize {
        self.side
    }

    /// Vertex at cell `(x, y)` of base face `face`.
    pub fn get(&self, face: usize, x: usize, y: usize) -> Option<u32> {
        if x >= self.side {
            return None;
        }
        self.cells.get(face)?.get(y * self.side + x).copied().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{create_vert_face_map, make_edges};

    fn collect(faces: &[Face], totvert: usize, lvl: usize) -> (usize, CellCollector) {
        let edges = make_edges(faces);
        let map = create_vert_face_map(faces, totvert);
        let layout = GridLayout::new(faces, &edges, &map, lvl);
        let mut c = CellCollector::new(lvl, lvl);
        let n = layout.walk(&mut c);
        assert_eq!(n, layout.num_vertices());
        (n, c)
    }

    #[test]
    fn test_quad_walk_covers_grid() {
        let faces = [Face::quad(0, 1, 2, 3)];
        let (n, c) = collect(&faces, 4, 3);
        assert_eq!(n, 25);
        let mut cells: Vec<_> = c.visits.iter().map(|v| (v.x, v.y)).collect();
        cells.sort();
        cells.dedup();
        assert_eq!(cells.len(), 25);
        assert_eq!(c.visits[0], CellVisit { vert: 0, face: 0, x: 2, y: 2 });
        // Base vertices come last, at the grid corners.
        assert_eq!((c.visits[24].x, c.visits[24].y), (0, 4));
    }

    #[test]
    fn test_shared_edge_visits_both_faces() {
        let faces = [Face::quad(0, 1, 4, 3), Face::quad(1, 2, 5, 4)];
        let (n, c) = collect(&faces, 6, 2);
        // 2 centers, 7 edge points, 6 corners.
        assert_eq!(n, 15);
        let shared: Vec<_> = c.visits.iter().filter(|v| v.vert == 2 + 1).collect();
        // Edge (1, 4) is the second edge of the first face.
        assert_eq!(shared.len(), 2);
        assert_eq!((shared[0].face, shared[0].x, shared[0].y), (0, 2, 1));
        assert_eq!((shared[1].face, shared[1].x, shared[1].y), (1, 0, 1));
    }

    #[test]
    fn test_base_level_walk_is_identity() {
        let faces = [Face::tri(0, 1, 2)];
        let (n, c) = collect(&faces, 3, 1);
        assert_eq!(n, 3);
        let verts: Vec<_> = c.visits.iter().map(|v| (v.vert, v.x, v.y)).collect();
        assert_eq!(verts, vec![(0, 0, 0), (1, 1, 0), (2, 1, 1)]);
    }

    #[test]
    fn test_placements_tile_the_grid() {
        let p = subface_placements(4, 3);
        assert_eq!(p.len(), 16);
        assert_eq!(p[0], [(1, 2), (0, 2), (0, 1), (1, 1)]);
        // Every face is a unit cell.
        for q in &p {
            let xs = q.iter().map(|c| c.0);
            let ys = q.iter().map(|c| c.1);
            assert_eq!(xs.clone().max().unwrap() - xs.min().unwrap(), 1);
            assert_eq!(ys.clone().max().unwrap() - ys.min().unwrap(), 1);
        }
        assert_eq!(subface_placements(3, 2).len(), 3);
    }

    #[test]
    fn test_cell_index_rejects_short_face_list() {
        let base = [Face::quad(0, 1, 2, 3)];
        let top = [[0, 1, 2, 3]; 3];
        assert!(matches!(
            CellIndex::build(&base, &top, 2),
            Err(MultiresError::TopologyMismatch { .. })
        ));
    }
}
