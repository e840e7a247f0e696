// cm_plane.rs - deduplicated plane table

use quetoo_common::q_shared::{Plane, Vec3};
use quetoo_common::qfiles::MAX_BSP_PLANES;

use crate::cm_error::{CmError, Result};
use crate::cm_local::{NORMAL_EPSILON, PLANE_DIST_EPSILON};

const PLANE_HASHES: usize = 1024;

/// Planes stored in pairs: `planes[i ^ 1]` is always the exact negation of
/// `planes[i]`. Lookups are bucketed by distance.
#[derive(Debug, Clone)]
pub struct PlaneTable {
    planes: Vec<Plane>,
    hash: Vec<Vec<usize>>,
}

impl Default for PlaneTable {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn hash_for_dist(dist: f32) -> usize {
    (dist.abs() as usize) & (PLANE_HASHES - 1)
}

/// Snaps near-axial normals to the axis and near-integer distances to the
/// integer.
pub fn snap_plane(normal: &mut Vec3, dist: &mut f32) {
    for i in 0..3 {
        if (normal[i] - 1.0).abs() < NORMAL_EPSILON {
            *normal = [0.0; 3];
            normal[i] = 1.0;
            break;
        }
        if (normal[i] + 1.0).abs() < NORMAL_EPSILON {
            *normal = [0.0; 3];
            normal[i] = -1.0;
            break;
        }
    }

    let rounded = dist.round();
    if (*dist - rounded).abs() < PLANE_DIST_EPSILON {
        *dist = rounded;
    }
}

fn plane_equal(p: &Plane, normal: &Vec3, dist: f32) -> bool {
    (p.normal[0] - normal[0]).abs() < NORMAL_EPSILON
        && (p.normal[1] - normal[1]).abs() < NORMAL_EPSILON
        && (p.normal[2] - normal[2]).abs() < NORMAL_EPSILON
        && (p.dist - dist).abs() < PLANE_DIST_EPSILON
}

/// True for normals of exactly -1 along one axis.
fn is_negative_axial(normal: &Vec3) -> bool {
    normal.iter().any(|&n| n == -1.0)
}

impl PlaneTable {
    pub fn new() -> Self {
        Self {
            planes: Vec::new(),
            hash: vec![Vec::new(); PLANE_HASHES],
        }
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    pub fn len(&self) -> usize {
        self.planes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    pub fn into_planes(self) -> Vec<Plane> {
        self.planes
    }

    fn add_to_hash(&mut self, num: usize) {
        let h = hash_for_dist(self.planes[num].dist);
        self.hash[h].push(num);
    }

    /// Returns the index of the plane, appending it and its negation when no
    /// match exists.
    pub fn find_or_create(&mut self, normal: Vec3, dist: f32) -> Result<usize> {
        let mut normal = normal;
        let mut dist = dist;
        snap_plane(&mut normal, &mut dist);

        let h = hash_for_dist(dist);
        for bucket in [h.wrapping_sub(1) & (PLANE_HASHES - 1), h, (h + 1) & (PLANE_HASHES - 1)] {
            for &num in &self.hash[bucket] {
                if plane_equal(&self.planes[num], &normal, dist) {
                    return Ok(num);
                }
            }
        }

        self.create_pair(normal, dist)
    }

    fn create_pair(&mut self, normal: Vec3, dist: f32) -> Result<usize> {
        if self.planes.len() + 2 > MAX_BSP_PLANES {
            return Err(CmError::LimitExceeded {
                what: "planes",
                count: self.planes.len() + 2,
                max: MAX_BSP_PLANES,
            });
        }

        let plane = Plane::new(normal, dist);
        let num = self.planes.len();

        // axial planes always have the positive facing member first
        let requested = if is_negative_axial(&normal) {
            self.planes.push(plane.negate());
            self.planes.push(plane);
            num + 1
        } else {
            self.planes.push(plane);
            self.planes.push(plane.negate());
            num
        };

        self.add_to_hash(num);
        self.add_to_hash(num + 1);
        Ok(requested)
    }
}
