// matrix.rs - 4x4 affine transforms for rotated and translated inline models

use crate::q_shared::{
    angle_vectors, dot_product, vector_normalize, vector_scale, Plane, Vec3,
};

/// Row-major affine matrix; `m[row][col]`, points transform as column vectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat4 {
    pub m: [[f32; 4]; 4],
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mat4 {
    pub const IDENTITY: Mat4 = Mat4 {
        m: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// The model-to-world transform of an entity: uniform `scale`, then
    /// rotation by `angles` (pitch, yaw, roll in degrees), then translation
    /// to `origin`.
    pub fn from_entity(origin: &Vec3, angles: &Vec3, scale: f32) -> Self {
        let (forward, right, up) = angle_vectors(angles);
        let left = vector_scale(&right, -1.0);

        let mut m = Self::IDENTITY.m;
        for row in 0..3 {
            m[row][0] = forward[row] * scale;
            m[row][1] = left[row] * scale;
            m[row][2] = up[row] * scale;
            m[row][3] = origin[row];
        }
        Mat4 { m }
    }

    /// Inverse of a rotation, uniform scale and translation. Not valid for
    /// shears or non-uniform scales.
    pub fn inverse_simple(&self) -> Self {
        let m = &self.m;
        let scale_sq = m[0][0] * m[0][0] + m[1][0] * m[1][0] + m[2][0] * m[2][0];
        let inv_sq = if scale_sq != 0.0 { 1.0 / scale_sq } else { 0.0 };

        let mut out = Self::IDENTITY.m;
        for row in 0..3 {
            for col in 0..3 {
                out[row][col] = m[col][row] * inv_sq;
            }
        }
        for row in 0..3 {
            out[row][3] = -(out[row][0] * m[0][3] + out[row][1] * m[1][3] + out[row][2] * m[2][3]);
        }
        Mat4 { m: out }
    }

    pub fn transform_point(&self, p: &Vec3) -> Vec3 {
        let m = &self.m;
        [
            m[0][0] * p[0] + m[0][1] * p[1] + m[0][2] * p[2] + m[0][3],
            m[1][0] * p[0] + m[1][1] * p[1] + m[1][2] * p[2] + m[1][3],
            m[2][0] * p[0] + m[2][1] * p[1] + m[2][2] * p[2] + m[2][3],
        ]
    }

    /// Rotates a direction, ignoring translation. The result is not
    /// renormalized.
    pub fn transform_vector(&self, v: &Vec3) -> Vec3 {
        let m = &self.m;
        [
            m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
            m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
            m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
        ]
    }

    /// Rotates a unit normal and renormalizes it.
    pub fn transform_normal(&self, n: &Vec3) -> Vec3 {
        let mut out = self.transform_vector(n);
        vector_normalize(&mut out);
        out
    }

    /// Carries a plane through the transform by moving its normal and one
    /// point on it.
    pub fn transform_plane(&self, plane: &Plane) -> Plane {
        let normal = self.transform_normal(&plane.normal);
        let point = self.transform_point(&vector_scale(&plane.normal, plane.dist));
        Plane::new(normal, dot_product(&normal, &point))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: &Vec3, b: &Vec3) -> bool {
        (0..3).all(|i| (a[i] - b[i]).abs() < 1e-3)
    }

    #[test]
    fn test_identity_entity() {
        let m = Mat4::from_entity(&[0.0; 3], &[0.0; 3], 1.0);
        assert!(close(&m.transform_point(&[1.0, 2.0, 3.0]), &[1.0, 2.0, 3.0]));
    }

    #[test]
    fn test_yaw_rotation() {
        let m = Mat4::from_entity(&[10.0, 0.0, 0.0], &[0.0, 90.0, 0.0], 1.0);
        // model +x faces world +y after a quarter turn
        assert!(close(&m.transform_point(&[1.0, 0.0, 0.0]), &[10.0, 1.0, 0.0]));
    }

    #[test]
    fn test_inverse_round_trip() {
        let m = Mat4::from_entity(&[12.0, -40.0, 7.0], &[15.0, 130.0, -20.0], 2.0);
        let inv = m.inverse_simple();
        let p = [3.0, 9.0, -27.0];
        assert!(close(&inv.transform_point(&m.transform_point(&p)), &p));
    }

    #[test]
    fn test_transform_plane() {
        let m = Mat4::from_entity(&[0.0, 0.0, 32.0], &[0.0; 3], 1.0);
        let p = m.transform_plane(&Plane::new([0.0, 0.0, 1.0], 8.0));
        assert!(close(&p.normal, &[0.0, 0.0, 1.0]));
        assert!((p.dist - 40.0).abs() < 1e-4);
    }
}
