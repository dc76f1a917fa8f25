//! Tangent frames of base faces.

use nalgebra::{Matrix3, Vector3};

use crate::mesh::{face_center, face_normal, Face};

/// Frame with columns `[tangent, normal x tangent, normal]`, where the
/// tangent points from `center` toward `target`.
pub fn calc_ts_mat(center: &Vector3<f32>, target: &Vector3<f32>, normal: &Vector3<f32>) -> Matrix3<f32> {
    let tan = (target - center)
        .try_normalize(f32::EPSILON)
        .unwrap_or_else(Vector3::zeros);
    let cross = normal.cross(&tan);
    Matrix3::from_columns(&[tan, cross, *normal])
}

/// Frame of face `f` over the positions `co`: centered on the face center,
/// spun toward the first corner, with the face normal as third axis.
pub fn calc_face_ts_mat(co: &[Vector3<f32>], f: &Face) -> Matrix3<f32> {
    let (center, target) = face_anchor(co, f);
    let corner = |j: usize| &co[f.v[j] as usize];
    let normal = face_normal(corner(0), corner(1), corner(2), f.quad.then(|| corner(3)));
    calc_ts_mat(&center, &target, &normal)
}

/// Center and first corner of face `f`.
pub fn face_anchor(co: &[Vector3<f32>], f: &Face) -> (Vector3<f32>, Vector3<f32>) {
    let corner = |j: usize| &co[f.v[j] as usize];
    let center = face_center(corner(0), corner(1), corner(2), f.quad.then(|| corner(3)));
    (center, *corner(0))
}

/// Inverse of `m`, or the identity when `m` is singular.
pub fn invert_or_identity(m: &Matrix3<f32>) -> Matrix3<f32> {
    m.try_inverse().unwrap_or_else(Matrix3::identity)
}

/// Bilinear blend of the four corner normals at grid cell `(x, y)`.
///
/// Corners `0..4` sit at `(0, 0)`, `(e, 0)`, `(e, e)` and `(0, e)` with
/// `e = sidetot - 1`, so cells on a corner get that corner's normal exactly.
pub fn interpolate_normal(norms: &[Vector3<f32>; 4], x: usize, y: usize, sidetot: usize) -> Vector3<f32> {
    // Divide by the last grid index, not `sidetot`, so corners get the exact corner normals.
    let e = sidetot.saturating_sub(1).max(1) as f32;
    let l1 = y as f32 / e;
    let l2 = x as f32 / e;
    let n1 = norms[0].lerp(&norms[3], l1);
    let n2 = norms[1].lerp(&norms[2], l1);
    n1.lerp(&n2, l2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_quad() -> (Vec<Vector3<f32>>, Face) {
        let co = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(2.0, 0.0, 0.0),
            Vector3::new(2.0, 2.0, 0.0),
            Vector3::new(0.0, 2.0, 0.0),
        ];
        (co, Face::quad(0, 1, 2, 3))
    }

    #[test]
    fn test_face_frame_axes() {
        let (co, f) = unit_quad();
        let m = calc_face_ts_mat(&co, &f);
        let s = std::f32::consts::FRAC_1_SQRT_2;
        assert!((m.column(0) - Vector3::new(-s, -s, 0.0)).norm() < 1e-6);
        assert!((m.column(2) - Vector3::new(0.0, 0.0, 1.0)).norm() < 1e-6);
        // Orthonormal on a planar face.
        assert!((m.transpose() * m - Matrix3::identity()).norm() < 1e-5);
    }

    #[test]
    fn test_singular_frame_falls_back_to_identity() {
        let zero = Vector3::zeros();
        let m = calc_ts_mat(&zero, &zero, &zero);
        assert_eq!(invert_or_identity(&m), Matrix3::identity());
    }

    #[test]
    fn test_interpolated_normal_hits_corners() {
        let norms = [
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(1.0, 1.0, 1.0),
        ];
        assert_eq!(interpolate_normal(&norms, 0, 0, 5), norms[0]);
        assert_eq!(interpolate_normal(&norms, 4, 0, 5), norms[1]);
        assert_eq!(interpolate_normal(&norms, 4, 4, 5), norms[2]);
        assert_eq!(interpolate_normal(&norms, 0, 4, 5), norms[3]);
        let mid = interpolate_normal(&norms, 2, 2, 5);
        assert!((mid - Vector3::new(0.5, 0.5, 0.5)).norm() < 1e-6);
    }
}
