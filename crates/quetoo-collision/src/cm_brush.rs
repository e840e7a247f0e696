// cm_brush.rs - brush side windings, bounds and bevel planes

use quetoo_common::q_shared::{
    add_point_to_bounds, clear_bounds, cross_product, dot_product, vector_length,
    vector_normalize, vector_subtract, Plane, Vec3,
};

use crate::cm_error::Result;
use crate::cm_local::{CmBrushSide, ON_EPSILON};
use crate::cm_plane::PlaneTable;
use crate::cm_polylib::Winding;

/// Sides whose clipped winding is smaller than this are bevels.
const MIN_SIDE_AREA: f32 = 0.1;

/// Clips the base winding of every side by all of the brush's other
/// non-bevel sides. Sides that clip away get `None`.
pub fn brush_side_windings(planes: &[Plane], sides: &[CmBrushSide]) -> Vec<Option<Winding>> {
    sides
        .iter()
        .enumerate()
        .map(|(i, side)| {
            let plane = &planes[side.plane];
            let mut w = Winding::base_for_plane(&plane.normal, plane.dist);

            for (j, other) in sides.iter().enumerate() {
                if i == j || other.bevel || other.plane == side.plane {
                    continue;
                }
                // keep the part behind the other side
                let p = planes[other.plane].negate();
                w = w.chop(&p.normal, p.dist, 0.0)?;
            }

            if w.area() < MIN_SIDE_AREA {
                return None;
            }
            Some(w)
        })
        .collect()
}

/// Computes windings in place and flags the sides that have none as bevels.
pub fn finish_brush_sides(planes: &[Plane], sides: &mut [CmBrushSide]) {
    let windings = brush_side_windings(planes, sides);
    for (side, w) in sides.iter_mut().zip(windings) {
        side.bevel = w.is_none();
        side.winding = w;
    }
}

/// Bounds of the brush from its side windings, falling back to its axial
/// sides. Returns `None` for a brush with no volume.
pub fn brush_bounds(planes: &[Plane], sides: &[CmBrushSide]) -> Option<(Vec3, Vec3)> {
    let (mut mins, mut maxs) = clear_bounds();

    for w in sides.iter().filter_map(|s| s.winding.as_ref()) {
        for p in &w.points {
            add_point_to_bounds(p, &mut mins, &mut maxs);
        }
    }

    if mins[0] > maxs[0] {
        for side in sides {
            let p = &planes[side.plane];
            for axis in 0..3 {
                if p.normal[axis] == 1.0 {
                    maxs[axis] = p.dist;
                } else if p.normal[axis] == -1.0 {
                    mins[axis] = -p.dist;
                }
            }
        }
    }

    if (0..3).all(|i| mins[i] < maxs[i]) {
        Some((mins, maxs))
    } else {
        None
    }
}

fn bevel_side(plane: usize) -> CmBrushSide {
    CmBrushSide {
        plane,
        surface: None,
        bevel: true,
        winding: None,
    }
}

/// Adds the axial planes a brush is missing, in canonical order, followed by
/// bevels for its non-axial edges. Box traces against brushes without these
/// planes can slide into sharp corners.
pub fn add_brush_bevels(
    table: &mut PlaneTable,
    sides: &mut Vec<CmBrushSide>,
    mins: &Vec3,
    maxs: &Vec3,
) -> Result<()> {
    // add the axial planes
    let mut order = 0;
    for axis in 0..3 {
        for dir in [-1.0f32, 1.0] {
            let found = sides
                .iter()
                .position(|s| table.planes()[s.plane].normal[axis] == dir);

            let i = match found {
                Some(i) => i,
                None => {
                    let mut normal = [0.0f32; 3];
                    normal[axis] = dir;
                    let dist = if dir == 1.0 { maxs[axis] } else { -mins[axis] };
                    let plane = table.find_or_create(normal, dist)?;
                    sides.push(bevel_side(plane));
                    sides.len() - 1
                }
            };

            // put it in canonical order
            if i != order && order < sides.len() {
                sides.swap(i, order);
            }
            order += 1;
        }
    }

    // add the edge bevels
    if sides.len() == 6 {
        return Ok(());
    }

    let points: Vec<Vec3> = sides
        .iter()
        .filter_map(|s| s.winding.as_ref())
        .flat_map(|w| w.points.iter().copied())
        .collect();

    let edges: Vec<(Vec3, Vec3)> = sides
        .iter()
        .filter_map(|s| s.winding.as_ref())
        .flat_map(|w| {
            let n = w.points.len();
            (0..n).map(move |k| (w.points[k], w.points[(k + 1) % n]))
        })
        .collect();

    for (p1, p2) in edges {
        let mut vec = vector_subtract(&p2, &p1);
        if vector_normalize(&mut vec) < 0.5 {
            continue;
        }
        snap_vector(&mut vec);
        if vec.iter().any(|v| *v == 1.0 || *v == -1.0) {
            // axial edges are covered by the axial planes
            continue;
        }

        for axis in 0..3 {
            for dir in [-1.0f32, 1.0] {
                let mut vec2 = [0.0f32; 3];
                vec2[axis] = dir;
                let mut normal = cross_product(&vec, &vec2);
                if vector_normalize(&mut normal) < 0.5 {
                    continue;
                }
                let dist = dot_product(&p1, &normal);

                // the plane must have every point of the brush behind it
                if points
                    .iter()
                    .any(|p| dot_product(p, &normal) - dist > ON_EPSILON)
                {
                    continue;
                }

                let plane = table.find_or_create(normal, dist)?;
                if sides.iter().any(|s| s.plane == plane) {
                    continue;
                }
                sides.push(bevel_side(plane));
            }
        }
    }

    Ok(())
}

fn snap_vector(v: &mut Vec3) {
    for i in 0..3 {
        if (v[i] - 1.0).abs() < 1e-5 {
            *v = [0.0; 3];
            v[i] = 1.0;
            return;
        }
        if (v[i] + 1.0).abs() < 1e-5 {
            *v = [0.0; 3];
            v[i] = -1.0;
            return;
        }
    }
    for c in v.iter_mut() {
        if c.abs() < 1e-5 {
            *c = 0.0;
        }
    }
    if vector_length(v) == 0.0 {
        v[0] = 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quetoo_common::q_shared::MAX_WORLD_DIST;

    fn sides_for(table: &mut PlaneTable, planes: &[(Vec3, f32)]) -> Vec<CmBrushSide> {
        planes
            .iter()
            .map(|(n, d)| CmBrushSide {
                plane: table.find_or_create(*n, *d).unwrap(),
                ..Default::default()
            })
            .collect()
    }

    fn cube(table: &mut PlaneTable) -> Vec<CmBrushSide> {
        sides_for(
            table,
            &[
                ([1.0, 0.0, 0.0], 64.0),
                ([-1.0, 0.0, 0.0], 0.0),
                ([0.0, 1.0, 0.0], 64.0),
                ([0.0, -1.0, 0.0], 0.0),
                ([0.0, 0.0, 1.0], 64.0),
                ([0.0, 0.0, -1.0], 0.0),
            ],
        )
    }

    #[test]
    fn test_cube_windings_and_bounds() {
        let mut table = PlaneTable::new();
        let mut sides = cube(&mut table);
        finish_brush_sides(table.planes(), &mut sides);
        assert!(sides.iter().all(|s| !s.bevel));
        for s in &sides {
            assert!((s.winding.as_ref().unwrap().area() - 4096.0).abs() < 1.0);
        }
        let (mins, maxs) = brush_bounds(table.planes(), &sides).unwrap();
        assert_eq!(mins, [0.0; 3]);
        assert_eq!(maxs, [64.0; 3]);
    }

    #[test]
    fn test_redundant_side_is_bevel() {
        let mut table = PlaneTable::new();
        let mut sides = cube(&mut table);
        // touches the cube only along the edge at x = 64, z = 64
        let s = std::f32::consts::FRAC_1_SQRT_2;
        sides.extend(sides_for(&mut table, &[([s, 0.0, s], 128.0 * s)]));
        finish_brush_sides(table.planes(), &mut sides);
        assert!(sides[6].bevel);
        assert!(sides[..6].iter().all(|s| !s.bevel));
    }

    #[test]
    fn test_cube_needs_no_bevels() {
        let mut table = PlaneTable::new();
        let mut sides = cube(&mut table);
        finish_brush_sides(table.planes(), &mut sides);
        add_brush_bevels(&mut table, &mut sides, &[0.0; 3], &[64.0; 3]).unwrap();
        assert_eq!(sides.len(), 6);
        // canonical order: -x, +x, -y, +y, -z, +z
        let planes = table.planes();
        assert_eq!(planes[sides[0].plane].normal[0], -1.0);
        assert_eq!(planes[sides[1].plane].normal[0], 1.0);
        assert_eq!(planes[sides[4].plane].normal[2], -1.0);
        assert_eq!(planes[sides[5].plane].normal[2], 1.0);
    }

    #[test]
    fn test_wedge_gets_bevels() {
        // a ramp: the floor, two ends, the back wall and a 45 degree slope
        let s = std::f32::consts::FRAC_1_SQRT_2;
        let mut table = PlaneTable::new();
        let mut sides = sides_for(
            &mut table,
            &[
                ([0.0, 0.0, -1.0], 0.0),
                ([0.0, -1.0, 0.0], 0.0),
                ([0.0, 1.0, 0.0], 64.0),
                ([-1.0, 0.0, 0.0], 0.0),
                ([s, 0.0, s], 64.0 * s),
            ],
        );
        finish_brush_sides(table.planes(), &mut sides);
        assert!(sides.iter().all(|s| !s.bevel));

        let (mins, maxs) = brush_bounds(table.planes(), &sides).unwrap();
        assert!((maxs[0] - 64.0).abs() < 0.01);
        assert!((maxs[2] - 64.0).abs() < 0.01);

        add_brush_bevels(&mut table, &mut sides, &mins, &maxs).unwrap();

        // +x and +z were missing
        let planes = table.planes();
        let bevels: Vec<&CmBrushSide> = sides.iter().filter(|s| s.bevel).collect();
        assert!(bevels.len() >= 2);
        assert!(bevels.iter().any(|s| planes[s.plane].normal == [1.0, 0.0, 0.0]));
        assert!(bevels.iter().any(|s| planes[s.plane].normal == [0.0, 0.0, 1.0]));

        // every bevel leaves the whole brush behind it
        for b in &bevels {
            let p = &planes[b.plane];
            for corner in [[0.0, 0.0, 0.0], [64.0, 64.0, 0.0], [0.0, 64.0, 64.0]] {
                assert!(dot_product(&corner, &p.normal) - p.dist <= ON_EPSILON);
            }
        }
    }

    #[test]
    fn test_degenerate_brush_has_no_bounds() {
        // x <= 0 and x >= 10 enclose nothing
        let mut table = PlaneTable::new();
        let mut sides = sides_for(
            &mut table,
            &[([1.0, 0.0, 0.0], 0.0), ([-1.0, 0.0, 0.0], -10.0)],
        );
        finish_brush_sides(table.planes(), &mut sides);
        assert!(sides.iter().all(|s| s.winding.is_none()));
        assert!(brush_bounds(table.planes(), &sides).is_none());
    }

    #[test]
    fn test_open_slab_spans_the_world() {
        // -10 <= x <= 0, unbounded in y and z
        let mut table = PlaneTable::new();
        let mut sides = sides_for(
            &mut table,
            &[([1.0, 0.0, 0.0], 0.0), ([-1.0, 0.0, 0.0], 10.0)],
        );
        finish_brush_sides(table.planes(), &mut sides);
        assert!(sides.iter().all(|s| s.winding.is_some()));

        let (mins, maxs) = brush_bounds(table.planes(), &sides).unwrap();
        assert!((mins[0] + 10.0).abs() < 0.01);
        assert!(maxs[0].abs() < 0.01);
        for axis in 1..3 {
            assert!((mins[axis] + MAX_WORLD_DIST).abs() < 1.0);
            assert!((maxs[axis] - MAX_WORLD_DIST).abs() < 1.0);
        }
    }
}
