// cm_polylib.rs - convex polygon windings for brush sides

use quetoo_common::q_shared::{
    add_point_to_bounds, clear_bounds, cross_product, dot_product, vector_add, vector_length,
    vector_ma, vector_normalize, vector_scale, vector_subtract, Vec3, MAX_WORLD_DIST,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PointSide {
    Front,
    Back,
    On,
}

/// A convex polygon lying on a plane, wound clockwise when viewed from the
/// front of that plane.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Winding {
    pub points: Vec<Vec3>,
}

impl Winding {
    /// A huge square on the plane, large enough to cover the world.
    pub fn base_for_plane(normal: &Vec3, dist: f32) -> Winding {
        // find the major axis
        let mut max = -1.0f32;
        let mut axis = 0;
        for (i, n) in normal.iter().enumerate() {
            if n.abs() > max {
                max = n.abs();
                axis = i;
            }
        }

        let mut up = [0.0f32; 3];
        if axis == 2 {
            up[0] = 1.0;
        } else {
            up[2] = 1.0;
        }

        let v = dot_product(&up, normal);
        up = vector_ma(&up, -v, normal);
        vector_normalize(&mut up);

        let org = vector_scale(normal, dist);
        let right = vector_scale(&cross_product(&up, normal), MAX_WORLD_DIST);
        let up = vector_scale(&up, MAX_WORLD_DIST);

        let points = vec![
            vector_add(&vector_subtract(&org, &right), &up),
            vector_add(&vector_add(&org, &right), &up),
            vector_subtract(&vector_add(&org, &right), &up),
            vector_subtract(&vector_subtract(&org, &right), &up),
        ];

        Winding { points }
    }

    /// Clips the winding to the front of the plane, returning `None` when
    /// nothing remains. Points within `epsilon` of the plane are kept.
    pub fn chop(&self, normal: &Vec3, dist: f32, epsilon: f32) -> Option<Winding> {
        let n = self.points.len();
        let mut dists = Vec::with_capacity(n);
        let mut sides = Vec::with_capacity(n);
        let mut front = 0;
        let mut back = 0;

        for p in &self.points {
            let d = dot_product(p, normal) - dist;
            let side = if d > epsilon {
                front += 1;
                PointSide::Front
            } else if d < -epsilon {
                back += 1;
                PointSide::Back
            } else {
                PointSide::On
            };
            dists.push(d);
            sides.push(side);
        }

        if front == 0 {
            return None;
        }
        if back == 0 {
            return Some(self.clone());
        }

        let mut points = Vec::with_capacity(n + 4);
        for i in 0..n {
            let p1 = self.points[i];

            if sides[i] == PointSide::On {
                points.push(p1);
                continue;
            }
            if sides[i] == PointSide::Front {
                points.push(p1);
            }

            let j = (i + 1) % n;
            if sides[j] == PointSide::On || sides[j] == sides[i] {
                continue;
            }

            // generate a split point
            let p2 = self.points[j];
            let dot = dists[i] / (dists[i] - dists[j]);
            let mut mid = [0.0f32; 3];
            for k in 0..3 {
                // avoid round off error when possible
                mid[k] = if normal[k] == 1.0 {
                    dist
                } else if normal[k] == -1.0 {
                    -dist
                } else {
                    p1[k] + dot * (p2[k] - p1[k])
                };
            }
            points.push(mid);
        }

        if points.len() < 3 {
            return None;
        }
        Some(Winding { points })
    }

    pub fn bounds(&self) -> (Vec3, Vec3) {
        let (mut mins, mut maxs) = clear_bounds();
        for p in &self.points {
            add_point_to_bounds(p, &mut mins, &mut maxs);
        }
        (mins, maxs)
    }

    pub fn area(&self) -> f32 {
        let mut total = 0.0;
        for i in 2..self.points.len() {
            let d1 = vector_subtract(&self.points[i - 1], &self.points[0]);
            let d2 = vector_subtract(&self.points[i], &self.points[0]);
            total += 0.5 * vector_length(&cross_product(&d1, &d2));
        }
        total
    }

    pub fn center(&self) -> Vec3 {
        if self.points.is_empty() {
            return [0.0; 3];
        }
        let mut sum = [0.0f32; 3];
        for p in &self.points {
            sum = vector_add(&sum, p);
        }
        vector_scale(&sum, 1.0 / self.points.len() as f32)
    }
}
