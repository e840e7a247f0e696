// cm_local.rs - runtime structures shared by the collision modules

use std::sync::atomic::{AtomicU64, Ordering};

use quetoo_common::q_shared::{Contents, Plane, SurfaceFlags, Vec3};

use crate::cm_config::CmConfig;
use crate::cm_polylib::Winding;

// ============================================================
// Constants
// ============================================================

/// Slop added around trace planes so that traces stop short of surfaces.
pub const TRACE_EPSILON: f32 = 1.0 / 32.0;

/// Snapping tolerances for plane normals and distances.
pub const NORMAL_EPSILON: f32 = 0.00001;
pub const PLANE_DIST_EPSILON: f32 = 0.01;

/// Tolerance for classifying winding points against a plane.
pub const ON_EPSILON: f32 = 0.1;

/// Slots in the per-trace "already tested" brush cache.
pub const BRUSH_CACHE_SIZE: usize = 32;

// ============================================================
// Tree structures
// ============================================================

/// A node child: either another node or a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildRef {
    Node(usize),
    Leaf(usize),
}

impl ChildRef {
    /// Decodes the on-disk convention, where negative values are `-1 - leaf`.
    #[inline]
    pub fn from_disk(num: i32) -> Self {
        if num < 0 {
            ChildRef::Leaf((-1 - num) as usize)
        } else {
            ChildRef::Node(num as usize)
        }
    }

    #[inline]
    pub fn to_disk(self) -> i32 {
        match self {
            ChildRef::Node(n) => n as i32,
            ChildRef::Leaf(l) => -1 - l as i32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmNode {
    pub plane: usize,
    pub children: [ChildRef; 2],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CmLeaf {
    pub contents: Contents,
    pub cluster: i32,
    pub area: i32,
    pub first_leaf_brush: usize,
    pub num_leaf_brushes: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CmBrush {
    pub first_side: usize,
    pub num_sides: usize,
    pub contents: Contents,
    pub mins: Vec3,
    pub maxs: Vec3,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CmBrushSide {
    pub plane: usize,
    /// `None` is the null surface.
    pub surface: Option<usize>,
    pub bevel: bool,
    pub winding: Option<Winding>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Surface {
    pub name: String,
    pub flags: SurfaceFlags,
    pub value: i32,
}

/// An inline model. Model 0 is the world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CmModel {
    pub mins: Vec3,
    pub maxs: Vec3,
    pub origin: Vec3,
    pub head_node: ChildRef,
}

// ============================================================
// Trace
// ============================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    /// 1.0 = didn't hit anything
    pub fraction: f32,
    /// the start point was inside a brush
    pub start_solid: bool,
    /// the whole sweep was inside a brush, `plane` is not valid
    pub all_solid: bool,
    /// final position
    pub end: Vec3,
    /// surface normal at impact
    pub plane: Plane,
    /// contents of the brush that was hit
    pub contents: Contents,
    /// surface that was hit, `None` for the null surface
    pub surface: Option<Surface>,
}

impl Default for Trace {
    fn default() -> Self {
        Self {
            fraction: 1.0,
            start_solid: false,
            all_solid: false,
            end: [0.0; 3],
            plane: Plane::default(),
            contents: Contents::empty(),
            surface: None,
        }
    }
}

/// Leafs touched by a box, and the first node whose plane the box straddles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeafList {
    pub leafs: Vec<usize>,
    pub top_node: Option<usize>,
}

// ============================================================
// Statistics
// ============================================================

/// Query counters, only maintained when `cm_trace_stats` is set.
#[derive(Debug, Default)]
pub struct CmStats {
    pub traces: AtomicU64,
    pub brush_tests: AtomicU64,
    pub point_contents: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
pub enum Stat {
    Traces,
    BrushTests,
    PointContents,
}

impl CmStats {
    fn counter(&self, stat: Stat) -> &AtomicU64 {
        match stat {
            Stat::Traces => &self.traces,
            Stat::BrushTests => &self.brush_tests,
            Stat::PointContents => &self.point_contents,
        }
    }

    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.traces.load(Ordering::Relaxed),
            self.brush_tests.load(Ordering::Relaxed),
            self.point_contents.load(Ordering::Relaxed),
        )
    }
}

// ============================================================
// BspView
// ============================================================

/// A borrowed view of a BSP tree and its brushes. Loaded models and box
/// hulls both expose one, so every query is written once against this type.
#[derive(Clone, Copy)]
pub struct BspView<'a> {
    pub planes: &'a [Plane],
    pub nodes: &'a [CmNode],
    pub leafs: &'a [CmLeaf],
    pub leaf_brushes: &'a [usize],
    pub brushes: &'a [CmBrush],
    pub brush_sides: &'a [CmBrushSide],
    pub surfaces: &'a [Surface],
    pub config: CmConfig,
    pub stats: Option<&'a CmStats>,
}

impl<'a> BspView<'a> {
    #[inline]
    pub fn leaf_brushes_of(&self, leaf: &CmLeaf) -> &'a [usize] {
        &self.leaf_brushes[leaf.first_leaf_brush..leaf.first_leaf_brush + leaf.num_leaf_brushes]
    }

    #[inline]
    pub fn sides_of(&self, brush: &CmBrush) -> &'a [CmBrushSide] {
        &self.brush_sides[brush.first_side..brush.first_side + brush.num_sides]
    }

    #[inline]
    pub(crate) fn count(&self, stat: Stat, n: u64) {
        if let Some(stats) = self.stats {
            stats.counter(stat).fetch_add(n, Ordering::Relaxed);
        }
    }
}
