//! Vertex adjacency and boundary classification for one level.

use super::level::{Level, LevelEdge};

/// Transient adjacency of a [`Level`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Connectivity {
    /// Incident edge indices per vertex.
    pub vert_edge_map: Vec<Vec<u32>>,
    /// Incident face indices per vertex.
    pub vert_face_map: Vec<Vec<u32>>,
    /// Per edge: true if at most one face uses it.
    pub edge_boundary: Vec<bool>,
}

impl Connectivity {
    /// Builds the maps for `level`.
    ///
    /// Only the first `prev_totedge * 2` edges (all edges for a base level)
    /// are tested; they are the halves of the coarser level's edges. The
    /// remaining edges lie inside a coarser face and are never boundary.
    pub fn build(level: &Level, prev_totedge: Option<usize>) -> Self {
        let totvert = level.totvert();

        let mut vert_edge_map = vec![Vec::new(); totvert];
        for (i, e) in level.edges.iter().enumerate() {
            for &v in &e.v {
                vert_edge_map[v as usize].push(i as u32);
            }
        }

        let mut vert_face_map = vec![Vec::new(); totvert];
        for (i, f) in level.faces.iter().enumerate() {
            for &v in f.verts() {
                vert_face_map[v as usize].push(i as u32);
            }
        }

        let emax = prev_totedge
            .map_or(level.totedge(), |t| t * 2)
            .min(level.totedge());
        let mut edge_boundary = vec![false; level.totedge()];
        for (i, e) in level.edges.iter().enumerate().take(emax) {
            let shared = vert_face_map[e.v[0] as usize]
                .iter()
                .filter(|f| vert_face_map[e.v[1] as usize].contains(f))
                .count();
            edge_boundary[i] = shared <= 1;
        }

        Self {
            vert_edge_map,
            vert_face_map,
            edge_boundary,
        }
    }

    /// True if any edge incident to `v` is a boundary edge.
    pub fn is_boundary_vert(&self, v: u32) -> bool {
        self.vert_edge_map[v as usize]
            .iter()
            .any(|&e| self.edge_boundary[e as usize])
    }

    /// Faces using both `a` and `b`.
    pub fn shared_faces(&self, a: u32, b: u32) -> impl Iterator<Item = u32> + '_ {
        let other = &self.vert_face_map[b as usize];
        self.vert_face_map[a as usize]
            .iter()
            .copied()
            .filter(move |f| other.contains(f))
    }

    /// Index of the edge joining `v1` and `v2`.
    pub fn find_edge(&self, edges: &[LevelEdge], v1: u32, v2: u32) -> Option<u32> {
        self.vert_edge_map[v1 as usize].iter().copied().find(|&e| {
            let e = &edges[e as usize];
            e.v[0] == v2 || e.v[1] == v2
        })
    }

    /// Midpoint vertex of the edge joining `v1` and `v2`.
    pub fn find_mid_edge(&self, edges: &[LevelEdge], v1: u32, v2: u32) -> Option<u32> {
        self.find_edge(edges, v1, v2).map(|e| edges[e as usize].mid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::build_from_polygons;
    use crate::multires::level::Level;
    use nalgebra::Vector3;

    fn level_of(positions: &[Vector3<f32>], polys: &[Vec<usize>]) -> Level {
        let mesh = build_from_polygons(positions, polys).unwrap();
        Level::from_source(&mesh).unwrap()
    }

    fn cube() -> Level {
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
        let polys = vec![
            vec![0, 3, 2, 1],
            vec![4, 5, 6, 7],
            vec![0, 1, 5, 4],
            vec![2, 3, 7, 6],
            vec![0, 4, 7, 3],
            vec![1, 2, 6, 5],
        ];
        level_of(&positions, &polys)
    }

    #[test]
    fn test_cube_has_no_boundary() {
        let mut level = cube();
        level.build_connectivity(None);
        let conn = level.connectivity().unwrap();
        assert_eq!(conn.edge_boundary.len(), 12);
        assert!(conn.edge_boundary.iter().all(|&b| !b));
        for v in 0..8 {
            assert_eq!(conn.vert_edge_map[v].len(), 3);
            assert_eq!(conn.vert_face_map[v].len(), 3);
            assert!(!conn.is_boundary_vert(v as u32));
        }
    }

    #[test]
    fn test_isolated_triangle_is_all_boundary() {
        let positions = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
        ];
        let mut level = level_of(&positions, &[vec![0, 1, 2]]);
        level.build_connectivity(None);
        let conn = level.connectivity().unwrap();
        assert_eq!(conn.edge_boundary, vec![true, true, true]);
        assert!((0..3).all(|v| conn.is_boundary_vert(v)));
    }

    #[test]
    fn test_free_is_idempotent() {
        let mut level = cube();
        level.free_connectivity();
        assert!(level.connectivity().is_none());
        level.build_connectivity(None);
        level.free_connectivity();
        level.free_connectivity();
        assert!(level.connectivity().is_none());
    }

    #[test]
    fn test_clone_drops_connectivity() {
        let mut level = cube();
        level.build_connectivity(None);
        let copy = level.clone();
        assert!(copy.connectivity().is_none());
        assert_eq!(copy, level);
    }

    #[test]
    fn test_shared_faces() {
        let level = cube();
        let conn = Connectivity::build(&level, None);
        let mut shared: Vec<u32> = conn.shared_faces(0, 1).collect();
        shared.sort_unstable();
        assert_eq!(shared, vec![0, 2]);
        assert_eq!(conn.shared_faces(0, 6).count(), 0);
    }
}
