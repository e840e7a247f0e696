// cm_trace.rs - swept box traces through the BSP tree

use std::cell::RefCell;

use quetoo_common::matrix::Mat4;
use quetoo_common::q_shared::{
    bounds_intersect, dot_product, vector_compare, vector_lerp, Contents, Solid, Vec3,
    VEC3_ORIGIN,
};
use tracing::trace;

use crate::cm_local::{
    BspView, ChildRef, CmBrush, Stat, Trace, BRUSH_CACHE_SIZE, TRACE_EPSILON,
};
use crate::cm_test::BoxHull;

thread_local! {
    /// Leaf list reused by position tests on this thread.
    static POSITION_LEAFS: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Per-trace state. Lives on the stack of `box_trace`, so the tree itself
/// is never written to and may be traced from many threads at once.
struct TraceData {
    start: Vec3,
    end: Vec3,
    mins: Vec3,
    maxs: Vec3,
    /// bounds of the whole sweep, for rejecting brushes
    box_mins: Vec3,
    box_maxs: Vec3,
    extents: Vec3,
    /// box corners indexed by plane sign bits
    offsets: [Vec3; 8],
    contents: Contents,
    is_point: bool,
    /// brushes already clipped against, hashed by their low bits
    brush_cache: [usize; BRUSH_CACHE_SIZE],
    /// the brush side that produced the current impact
    side: Option<usize>,
    brush_tests: u64,
    trace: Trace,
}

impl TraceData {
    /// True when `brush_num` was the last brush tested in its cache slot;
    /// either way it becomes the slot's occupant.
    #[inline]
    fn brush_already_tested(&mut self, brush_num: usize) -> bool {
        let slot = &mut self.brush_cache[brush_num & (BRUSH_CACHE_SIZE - 1)];
        let skip = *slot == brush_num;
        *slot = brush_num;
        skip
    }
}

// ============================================================
// Bounds helpers
// ============================================================

/// Bounds of an entity for broad phase tests, padded by one unit on every
/// side. Rotated inline models get a cube large enough for any rotation.
pub fn entity_bounds(
    solid: Solid,
    origin: &Vec3,
    angles: &Vec3,
    mins: &Vec3,
    maxs: &Vec3,
) -> (Vec3, Vec3) {
    let mut bounds_mins = [0.0f32; 3];
    let mut bounds_maxs = [0.0f32; 3];

    if solid == Solid::Bsp && !vector_compare(angles, &VEC3_ORIGIN) {
        let mut max = 0.0f32;
        for i in 0..3 {
            max = max.max(mins[i].abs()).max(maxs[i].abs());
        }
        for i in 0..3 {
            bounds_mins[i] = origin[i] - max;
            bounds_maxs[i] = origin[i] + max;
        }
    } else {
        for i in 0..3 {
            bounds_mins[i] = origin[i] + mins[i];
            bounds_maxs[i] = origin[i] + maxs[i];
        }
    }

    for i in 0..3 {
        bounds_mins[i] -= 1.0;
        bounds_maxs[i] += 1.0;
    }

    (bounds_mins, bounds_maxs)
}

/// Bounds of a box swept from `start` to `end`, padded by one unit.
pub fn trace_bounds(start: &Vec3, end: &Vec3, mins: &Vec3, maxs: &Vec3) -> (Vec3, Vec3) {
    let mut bounds_mins = [0.0f32; 3];
    let mut bounds_maxs = [0.0f32; 3];

    for i in 0..3 {
        if end[i] > start[i] {
            bounds_mins[i] = start[i] + mins[i] - 1.0;
            bounds_maxs[i] = end[i] + maxs[i] + 1.0;
        } else {
            bounds_mins[i] = end[i] + mins[i] - 1.0;
            bounds_maxs[i] = start[i] + maxs[i] + 1.0;
        }
    }

    (bounds_mins, bounds_maxs)
}

// ============================================================
// Tracing
// ============================================================

impl<'a> BspView<'a> {
    /// Clips the sweep against one convex brush, keeping the earliest entry.
    fn trace_to_brush(&self, data: &mut TraceData, brush: &CmBrush) {
        if brush.num_sides == 0 {
            return;
        }

        data.brush_tests += 1;

        let mut enter_fraction = -1.0f32;
        let mut leave_fraction = 1.0f32;
        let mut clip_side = None;

        let mut start_outside = false;
        let mut end_outside = false;

        for (i, side) in self.sides_of(brush).iter().enumerate() {
            let plane = &self.planes[side.plane];

            let dist = if data.is_point {
                plane.dist
            } else {
                plane.dist - dot_product(&data.offsets[plane.sign_bits as usize], &plane.normal)
            };

            let d1 = dot_product(&data.start, &plane.normal) - dist;
            let d2 = dot_product(&data.end, &plane.normal) - dist;

            if d1 > 0.0 {
                start_outside = true;
            }
            if d2 > 0.0 {
                end_outside = true;
            }

            // if completely in front of face, no intersection with the entire brush
            if d1 > 0.0 && (d2 >= TRACE_EPSILON || d2 >= d1) {
                return;
            }

            // if completely behind plane, no intersection
            if d1 <= 0.0 && d2 <= 0.0 {
                continue;
            }

            // crosses face
            if d1 > d2 {
                // enter
                let f = (d1 - TRACE_EPSILON) / (d1 - d2);
                if f > enter_fraction {
                    enter_fraction = f;
                    clip_side = Some(brush.first_side + i);
                }
            } else {
                // leave
                let f = (d1 + TRACE_EPSILON) / (d1 - d2);
                if f < leave_fraction {
                    leave_fraction = f;
                }
            }
        }

        // original point was inside brush
        if !start_outside {
            data.trace.start_solid = true;
            if !end_outside {
                data.trace.all_solid = true;
                data.trace.fraction = 0.0;
                data.trace.contents = brush.contents;
            }
            return;
        }

        if enter_fraction < leave_fraction
            && enter_fraction > -1.0
            && enter_fraction < data.trace.fraction
        {
            if let Some(side) = clip_side {
                data.trace.fraction = enter_fraction.max(0.0);
                data.trace.plane = self.planes[self.brush_sides[side].plane];
                data.trace.contents = brush.contents;
                data.side = Some(side);
            }
        }
    }

    /// True when the stationary box at `data.start` is inside the brush.
    fn test_box_in_brush(&self, data: &mut TraceData, brush: &CmBrush) {
        if brush.num_sides == 0 {
            return;
        }

        data.brush_tests += 1;

        for side in self.sides_of(brush) {
            let plane = &self.planes[side.plane];
            let dist = plane.dist - dot_product(&data.offsets[plane.sign_bits as usize], &plane.normal);
            let d1 = dot_product(&data.start, &plane.normal) - dist;

            // if completely in front of face, no intersection
            if d1 > 0.0 {
                return;
            }
        }

        // inside this brush
        data.trace.start_solid = true;
        data.trace.all_solid = true;
        data.trace.fraction = 0.0;
        data.trace.contents = brush.contents;
    }

    fn trace_to_leaf(&self, data: &mut TraceData, leaf_num: usize) {
        let leaf = &self.leafs[leaf_num];
        if !leaf.contents.intersects(data.contents) {
            return;
        }

        for &brush_num in self.leaf_brushes_of(leaf) {
            if data.brush_already_tested(brush_num) {
                continue;
            }

            let brush = &self.brushes[brush_num];
            if !brush.contents.intersects(data.contents) {
                continue;
            }
            if !bounds_intersect(&brush.mins, &brush.maxs, &data.box_mins, &data.box_maxs) {
                continue;
            }

            self.trace_to_brush(data, brush);
            if data.trace.all_solid {
                return;
            }
        }
    }

    fn test_in_leaf(&self, data: &mut TraceData, leaf_num: usize) {
        let leaf = &self.leafs[leaf_num];
        if !leaf.contents.intersects(data.contents) {
            return;
        }

        for &brush_num in self.leaf_brushes_of(leaf) {
            if data.brush_already_tested(brush_num) {
                continue;
            }

            let brush = &self.brushes[brush_num];
            if !brush.contents.intersects(data.contents) {
                continue;
            }
            if !bounds_intersect(&brush.mins, &brush.maxs, &data.box_mins, &data.box_maxs) {
                continue;
            }

            self.test_box_in_brush(data, brush);
            if data.trace.all_solid {
                return;
            }
        }
    }

    /// Sweeps `p1`..`p2`, the `p1f`..`p2f` portion of the whole trace,
    /// through the subtree at `num`. The near side of a split is recursed;
    /// the far side continues in the loop.
    fn trace_to_node(
        &self,
        data: &mut TraceData,
        mut num: ChildRef,
        mut p1f: f32,
        p2f: f32,
        p1: &Vec3,
        p2: &Vec3,
    ) {
        let mut p1 = *p1;
        let p2 = *p2;

        loop {
            // already hit something nearer
            if data.trace.fraction <= p1f {
                return;
            }

            let n = match num {
                ChildRef::Leaf(leaf) => {
                    self.trace_to_leaf(data, leaf);
                    return;
                }
                ChildRef::Node(n) => n,
            };

            let node = &self.nodes[n];
            let plane = &self.planes[node.plane];

            let (d1, d2, offset) = if plane.plane_type.is_axial() {
                let t = plane.plane_type.axis();
                (p1[t] - plane.dist, p2[t] - plane.dist, data.extents[t])
            } else {
                let offset = if data.is_point {
                    0.0
                } else {
                    ((data.extents[0] * plane.normal[0]).abs()
                        + (data.extents[1] * plane.normal[1]).abs()
                        + (data.extents[2] * plane.normal[2]).abs())
                        * 3.0
                };
                (
                    dot_product(&plane.normal, &p1) - plane.dist,
                    dot_product(&plane.normal, &p2) - plane.dist,
                    offset,
                )
            };

            // see which sides we need to consider
            if d1 >= offset + TRACE_EPSILON && d2 >= offset + TRACE_EPSILON {
                num = node.children[0];
                continue;
            }
            if d1 < -offset - TRACE_EPSILON && d2 < -offset - TRACE_EPSILON {
                num = node.children[1];
                continue;
            }

            // put the crosspoint TRACE_EPSILON units on the near side
            let (side, frac1, frac2) = if d1 < d2 {
                let idist = 1.0 / (d1 - d2);
                (
                    1,
                    (d1 - offset + TRACE_EPSILON) * idist,
                    (d1 + offset + TRACE_EPSILON) * idist,
                )
            } else if d1 > d2 {
                let idist = 1.0 / (d1 - d2);
                (
                    0,
                    (d1 + offset + TRACE_EPSILON) * idist,
                    (d1 - offset - TRACE_EPSILON) * idist,
                )
            } else {
                (0, 1.0, 0.0)
            };

            // move up to the node
            let frac1 = frac1.clamp(0.0, 1.0);
            let midf1 = p1f + (p2f - p1f) * frac1;
            let mid1 = vector_lerp(&p1, &p2, frac1);

            self.trace_to_node(data, node.children[side], p1f, midf1, &p1, &mid1);

            // go past the node
            let frac2 = frac2.clamp(0.0, 1.0);
            p1f += (p2f - p1f) * frac2;
            p1 = vector_lerp(&p1, &p2, frac2);
            num = node.children[side ^ 1];
        }
    }

    /// Sweeps the box `mins`..`maxs` from `start` to `end` through the tree at
    /// `head_node`, stopping at the first brush whose contents intersect
    /// `contents`.
    pub fn box_trace(
        &self,
        start: &Vec3,
        end: &Vec3,
        mins: &Vec3,
        maxs: &Vec3,
        head_node: ChildRef,
        contents: Contents,
    ) -> Trace {
        let mut data = TraceData {
            start: *start,
            end: *end,
            mins: *mins,
            maxs: *maxs,
            box_mins: [0.0; 3],
            box_maxs: [0.0; 3],
            extents: [0.0; 3],
            offsets: [[0.0; 3]; 8],
            contents,
            is_point: false,
            brush_cache: [usize::MAX; BRUSH_CACHE_SIZE],
            side: None,
            brush_tests: 0,
            trace: Trace::default(),
        };

        // check for an unloaded map
        if self.nodes.is_empty() {
            data.trace.end = *end;
            return data.trace;
        }

        self.count(Stat::Traces, 1);

        // recenter the box about the origin, carrying the offset on the sweep
        for i in 0..3 {
            let center = (data.mins[i] + data.maxs[i]) * 0.5;
            data.start[i] += center;
            data.end[i] += center;
            data.mins[i] -= center;
            data.maxs[i] -= center;
        }

        // check for point special case
        if vector_compare(&data.mins, &VEC3_ORIGIN) && vector_compare(&data.maxs, &VEC3_ORIGIN) {
            data.is_point = true;
        } else {
            for i in 0..3 {
                data.extents[i] = (-data.mins[i]).max(data.maxs[i]);
            }
            for (i, offset) in data.offsets.iter_mut().enumerate() {
                *offset = [
                    if i & 1 != 0 { data.maxs[0] } else { data.mins[0] },
                    if i & 2 != 0 { data.maxs[1] } else { data.mins[1] },
                    if i & 4 != 0 { data.maxs[2] } else { data.mins[2] },
                ];
            }
        }

        let (box_mins, box_maxs) = trace_bounds(&data.start, &data.end, &data.mins, &data.maxs);
        data.box_mins = box_mins;
        data.box_maxs = box_maxs;

        // check for position test special case
        if vector_compare(start, end) {
            let mut leafs = POSITION_LEAFS.with(RefCell::take);
            self.box_leafnums_into(
                &data.box_mins,
                &data.box_maxs,
                head_node,
                self.config.leaf_list_capacity,
                &mut leafs,
            );

            for &leaf in &leafs {
                self.test_in_leaf(&mut data, leaf);
                if data.trace.all_solid {
                    break;
                }
            }
            POSITION_LEAFS.with(|cell| cell.replace(leafs));

            data.trace.end = *start;
            return self.finish(data);
        }

        // general sweeping through world
        let (p1, p2) = (data.start, data.end);
        self.trace_to_node(&mut data, head_node, 0.0, 1.0, &p1, &p2);

        data.trace.end = if data.trace.fraction == 0.0 {
            *start
        } else if data.trace.fraction == 1.0 {
            *end
        } else {
            vector_lerp(start, end, data.trace.fraction)
        };

        self.finish(data)
    }

    fn finish(&self, data: TraceData) -> Trace {
        self.count(Stat::BrushTests, data.brush_tests);
        if self.stats.is_some() {
            trace!(
                brushes = data.brush_tests,
                fraction = data.trace.fraction,
                "box trace"
            );
        }

        let mut trace = data.trace;
        trace.surface = data
            .side
            .and_then(|side| self.brush_sides[side].surface)
            .and_then(|surface| self.surfaces.get(surface))
            .cloned();
        trace
    }

    /// Traces against a model placed by `matrix`. The sweep runs in model
    /// space; the impact plane is carried back out and `end` is interpolated
    /// in world space.
    #[allow(clippy::too_many_arguments)]
    pub fn transformed_box_trace(
        &self,
        start: &Vec3,
        end: &Vec3,
        mins: &Vec3,
        maxs: &Vec3,
        head_node: ChildRef,
        contents: Contents,
        matrix: &Mat4,
        inverse_matrix: &Mat4,
    ) -> Trace {
        let start0 = inverse_matrix.transform_point(start);
        let end0 = inverse_matrix.transform_point(end);

        let mut trace = self.box_trace(&start0, &end0, mins, maxs, head_node, contents);

        if trace.fraction < 1.0 && !trace.all_solid {
            trace.plane = matrix.transform_plane(&trace.plane);
        }

        trace.end = vector_lerp(start, end, trace.fraction);
        trace
    }
}

impl BoxHull {
    pub fn box_trace(
        &self,
        start: &Vec3,
        end: &Vec3,
        mins: &Vec3,
        maxs: &Vec3,
        contents: Contents,
    ) -> Trace {
        self.view()
            .box_trace(start, end, mins, maxs, self.head_node(), contents)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn transformed_box_trace(
        &self,
        start: &Vec3,
        end: &Vec3,
        mins: &Vec3,
        maxs: &Vec3,
        contents: Contents,
        matrix: &Mat4,
        inverse_matrix: &Mat4,
    ) -> Trace {
        self.view().transformed_box_trace(
            start,
            end,
            mins,
            maxs,
            self.head_node(),
            contents,
            matrix,
            inverse_matrix,
        )
    }
}
