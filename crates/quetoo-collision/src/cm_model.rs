// cm_model.rs - the loaded collision model and the current map slot

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;
use quetoo_common::matrix::Mat4;
use quetoo_common::md4::com_block_checksum;
use quetoo_common::q_shared::{clear_bounds, Contents, Plane, SurfaceFlags, Vec3};
use quetoo_common::qfiles::{
    BspFile, BspFileError, MAX_BSP_BRUSHES, MAX_BSP_BRUSH_SIDES, MAX_BSP_LEAF_BRUSHES, MAX_BSP_NODES,
    MAX_BSP_PLANES,
};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::cm_brush::{brush_bounds, finish_brush_sides};
use crate::cm_config::CmConfig;
use crate::cm_entity::{parse_entities, CmEntity};
use crate::cm_error::{CmError, Result};
use crate::cm_local::{
    BspView, ChildRef, CmBrush, CmBrushSide, CmLeaf, CmModel, CmNode, CmStats, LeafList, Surface,
    Trace,
};
use crate::cm_test::BoxHull;

/// An immutable, shareable collision model built from a BSP file.
#[derive(Debug)]
pub struct CollisionModel {
    planes: Vec<Plane>,
    nodes: Vec<CmNode>,
    leafs: Vec<CmLeaf>,
    leaf_brushes: Vec<usize>,
    brushes: Vec<CmBrush>,
    brush_sides: Vec<CmBrushSide>,
    surfaces: Vec<Surface>,
    models: Vec<CmModel>,
    entity_string: String,
    num_clusters: usize,
    config: CmConfig,
    stats: CmStats,
}

// ============================================================
// Validation helpers
// ============================================================

fn check_index(what: &'static str, index: i64, len: usize) -> Result<usize> {
    if index < 0 || index as usize >= len {
        return Err(CmError::BadIndex { what, index, len });
    }
    Ok(index as usize)
}

/// Validates `first..first + num` against a table of `len` entries.
fn check_range(what: &'static str, first: i64, num: i64, len: usize) -> Result<(usize, usize)> {
    if first < 0 || num < 0 || (first + num) as usize > len {
        return Err(CmError::BadIndex {
            what,
            index: first + num.max(0),
            len,
        });
    }
    Ok((first as usize, num as usize))
}

fn check_child(what: &'static str, num: i32, num_nodes: usize, num_leafs: usize) -> Result<ChildRef> {
    let child = ChildRef::from_disk(num);
    match child {
        ChildRef::Node(n) => check_index(what, n as i64, num_nodes)?,
        ChildRef::Leaf(l) => check_index(what, l as i64, num_leafs)?,
    };
    Ok(child)
}

/// Counts planes whose partner at `i ^ 1` isn't their exact negation.
fn plane_pair_violations(planes: &[Plane]) -> usize {
    planes
        .chunks_exact(2)
        .filter(|pair| {
            let (a, b) = (&pair[0], &pair[1]);
            b.dist != -a.dist || (0..3).any(|k| b.normal[k] != -a.normal[k])
        })
        .count()
}

impl CollisionModel {
    pub fn load(bsp: &BspFile, config: &CmConfig) -> Result<Self> {
        let required = [
            ("models", bsp.models.is_empty()),
            ("leafs", bsp.leafs.is_empty()),
            ("planes", bsp.planes.is_empty()),
        ];
        if let Some((lump, _)) = required.into_iter().find(|(_, empty)| *empty) {
            return Err(BspFileError::Empty { lump }.into());
        }

        // the box hull must still fit when it's appended after the map
        let room = [
            ("nodes", bsp.nodes.len() + 6, MAX_BSP_NODES),
            ("brushes", bsp.brushes.len() + 1, MAX_BSP_BRUSHES),
            ("leaf brushes", bsp.leaf_brushes.len() + 1, MAX_BSP_LEAF_BRUSHES),
            ("brush sides", bsp.brush_sides.len() + 6, MAX_BSP_BRUSH_SIDES),
            ("planes", bsp.planes.len() + 12, MAX_BSP_PLANES),
        ];
        for (what, count, max) in room {
            if count > max {
                return Err(CmError::LimitExceeded { what, count, max });
            }
        }

        let planes: Vec<Plane> = bsp
            .planes
            .iter()
            .map(|p| Plane::new(p.normal, p.dist))
            .collect();

        let violations = plane_pair_violations(&planes);
        if violations > 0 || planes.len() % 2 != 0 {
            warn!("{} of {} planes are not paired with their negation", violations, planes.len());
        }

        let surfaces: Vec<Surface> = bsp
            .texinfo
            .iter()
            .map(|t| Surface {
                name: t.texture.clone(),
                flags: SurfaceFlags::from_bits_retain(t.flags),
                value: t.value,
            })
            .collect();

        let mut brush_sides = bsp
            .brush_sides
            .iter()
            .map(|s| {
                let plane = check_index("brush side plane", s.plane_num as i64, planes.len())?;
                let surface = if s.texinfo < 0 {
                    None
                } else {
                    Some(check_index("brush side texinfo", s.texinfo as i64, surfaces.len())?)
                };
                Ok(CmBrushSide {
                    plane,
                    surface,
                    bevel: false,
                    winding: None,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut brushes = bsp
            .brushes
            .iter()
            .map(|b| {
                let (first_side, num_sides) = check_range(
                    "brush sides",
                    b.first_side as i64,
                    b.num_sides as i64,
                    brush_sides.len(),
                )?;
                Ok(CmBrush {
                    first_side,
                    num_sides,
                    contents: Contents::from_bits_retain(b.contents),
                    mins: [0.0; 3],
                    maxs: [0.0; 3],
                })
            })
            .collect::<Result<Vec<_>>>()?;

        // windings, bevel flags and bounds are independent per brush
        let finished: Vec<(Vec<CmBrushSide>, Option<(Vec3, Vec3)>)> = brushes
            .par_iter()
            .map(|b| {
                let mut sides = brush_sides[b.first_side..b.first_side + b.num_sides].to_vec();
                finish_brush_sides(&planes, &mut sides);
                let bounds = brush_bounds(&planes, &sides);
                (sides, bounds)
            })
            .collect();

        let mut degenerate = 0;
        for (brush, (sides, bounds)) in brushes.iter_mut().zip(finished) {
            (brush.mins, brush.maxs) = bounds.unwrap_or_else(|| {
                degenerate += 1;
                // inverted bounds never intersect a trace
                clear_bounds()
            });
            for (dst, src) in brush_sides[brush.first_side..].iter_mut().zip(sides) {
                *dst = src;
            }
        }
        if degenerate > 0 {
            warn!("{} brushes have no volume", degenerate);
        }

        let leaf_brushes = bsp
            .leaf_brushes
            .iter()
            .map(|&b| check_index("leaf brush", b as i64, brushes.len()))
            .collect::<Result<Vec<_>>>()?;

        let leafs = bsp
            .leafs
            .iter()
            .map(|l| {
                let (first_leaf_brush, num_leaf_brushes) = check_range(
                    "leaf brushes",
                    l.first_leaf_brush as i64,
                    l.num_leaf_brushes as i64,
                    leaf_brushes.len(),
                )?;
                Ok(CmLeaf {
                    contents: Contents::from_bits_retain(l.contents),
                    cluster: l.cluster as i32,
                    area: l.area as i32,
                    first_leaf_brush,
                    num_leaf_brushes,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let nodes = bsp
            .nodes
            .iter()
            .map(|n| {
                Ok(CmNode {
                    plane: check_index("node plane", n.plane_num as i64, planes.len())?,
                    children: [
                        check_child("node child", n.children[0], bsp.nodes.len(), leafs.len())?,
                        check_child("node child", n.children[1], bsp.nodes.len(), leafs.len())?,
                    ],
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let models = bsp
            .models
            .iter()
            .map(|m| {
                // spread the bounds by a unit
                let mut model = CmModel {
                    mins: m.mins,
                    maxs: m.maxs,
                    origin: m.origin,
                    head_node: check_child("model head node", m.head_node, nodes.len(), leafs.len())?,
                };
                for i in 0..3 {
                    model.mins[i] -= 1.0;
                    model.maxs[i] += 1.0;
                }
                Ok(model)
            })
            .collect::<Result<Vec<_>>>()?;

        let num_clusters = leafs
            .iter()
            .map(|l| l.cluster + 1)
            .max()
            .unwrap_or(0)
            .max(0) as usize;

        info!(
            "collision model: {} planes, {} nodes, {} leafs, {} brushes, {} brush sides, {} models",
            planes.len(),
            nodes.len(),
            leafs.len(),
            brushes.len(),
            brush_sides.len(),
            models.len()
        );

        Ok(Self {
            planes,
            nodes,
            leafs,
            leaf_brushes,
            brushes,
            brush_sides,
            surfaces,
            models,
            entity_string: bsp.entity_string.clone(),
            num_clusters,
            config: *config,
            stats: CmStats::default(),
        })
    }

    pub fn view(&self) -> BspView<'_> {
        BspView {
            planes: &self.planes,
            nodes: &self.nodes,
            leafs: &self.leafs,
            leaf_brushes: &self.leaf_brushes,
            brushes: &self.brushes,
            brush_sides: &self.brush_sides,
            surfaces: &self.surfaces,
            config: self.config,
            stats: self.config.trace_stats.then_some(&self.stats),
        }
    }

    // ============================================================
    // Accessors
    // ============================================================

    pub fn num_models(&self) -> usize {
        self.models.len()
    }

    pub fn world_model(&self) -> &CmModel {
        &self.models[0]
    }

    /// Looks up an inline model by its `*N` name.
    pub fn model(&self, name: &str) -> Result<&CmModel> {
        let num: usize = name
            .strip_prefix('*')
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| CmError::BadModelName(name.to_string()))?;

        if num < 1 || num >= self.models.len() {
            return Err(CmError::BadModelName(name.to_string()));
        }
        Ok(&self.models[num])
    }

    pub fn models(&self) -> &[CmModel] {
        &self.models
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    pub fn nodes(&self) -> &[CmNode] {
        &self.nodes
    }

    pub fn leafs(&self) -> &[CmLeaf] {
        &self.leafs
    }

    pub fn brushes(&self) -> &[CmBrush] {
        &self.brushes
    }

    pub fn brush_sides(&self) -> &[CmBrushSide] {
        &self.brush_sides
    }

    pub fn surfaces(&self) -> &[Surface] {
        &self.surfaces
    }

    pub fn num_clusters(&self) -> usize {
        self.num_clusters
    }

    pub fn leaf_contents(&self, leaf_num: usize) -> Contents {
        self.leafs.get(leaf_num).map_or(Contents::empty(), |l| l.contents)
    }

    pub fn leaf_cluster(&self, leaf_num: usize) -> i32 {
        self.leafs.get(leaf_num).map_or(-1, |l| l.cluster)
    }

    pub fn leaf_area(&self, leaf_num: usize) -> i32 {
        self.leafs.get(leaf_num).map_or(0, |l| l.area)
    }

    pub fn entity_string(&self) -> &str {
        &self.entity_string
    }

    pub fn entities(&self) -> Result<Vec<CmEntity>> {
        parse_entities(&self.entity_string)
    }

    pub fn config(&self) -> &CmConfig {
        &self.config
    }

    pub fn stats(&self) -> &CmStats {
        &self.stats
    }

    // ============================================================
    // Queries
    // ============================================================

    pub fn point_leafnum(&self, p: &Vec3, head_node: ChildRef) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }
        self.view().point_leafnum(p, head_node)
    }

    pub fn point_contents(&self, p: &Vec3, head_node: ChildRef) -> Contents {
        self.view().point_contents(p, head_node)
    }

    pub fn transformed_point_contents(
        &self,
        p: &Vec3,
        head_node: ChildRef,
        inverse_matrix: &Mat4,
    ) -> Contents {
        self.view()
            .transformed_point_contents(p, head_node, inverse_matrix)
    }

    pub fn box_leafnums(
        &self,
        mins: &Vec3,
        maxs: &Vec3,
        head_node: ChildRef,
        max_len: usize,
    ) -> LeafList {
        self.view().box_leafnums(mins, maxs, head_node, max_len)
    }

    pub fn box_leafnums_into(
        &self,
        mins: &Vec3,
        maxs: &Vec3,
        head_node: ChildRef,
        max_len: usize,
        list: &mut Vec<usize>,
    ) -> Option<usize> {
        self.view()
            .box_leafnums_into(mins, maxs, head_node, max_len, list)
    }

    pub fn box_trace(
        &self,
        start: &Vec3,
        end: &Vec3,
        mins: &Vec3,
        maxs: &Vec3,
        head_node: ChildRef,
        contents: Contents,
    ) -> Trace {
        self.view()
            .box_trace(start, end, mins, maxs, head_node, contents)
    }

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
        self.view().transformed_box_trace(
            start,
            end,
            mins,
            maxs,
            head_node,
            contents,
            matrix,
            inverse_matrix,
        )
    }
}

// ============================================================
// Current map
// ============================================================

struct LoadedMap {
    path: PathBuf,
    checksum: u32,
    model: Arc<CollisionModel>,
}

static CM_MAP: LazyLock<RwLock<Option<LoadedMap>>> = LazyLock::new(|| RwLock::new(None));

/// Loads the map at `path` into the current map slot, or unloads the current
/// map when `path` is `None`. Returns the model and the file's checksum.
pub fn cm_load_bsp_model(path: Option<&Path>) -> Result<Option<(Arc<CollisionModel>, u32)>> {
    cm_load_bsp_model_with(path, &CmConfig::default())
}

pub fn cm_load_bsp_model_with(
    path: Option<&Path>,
    config: &CmConfig,
) -> Result<Option<(Arc<CollisionModel>, u32)>> {
    let Some(path) = path else {
        *CM_MAP.write() = None;
        debug!("collision model unloaded");
        return Ok(None);
    };

    let data = std::fs::read(path).map_err(|source| CmError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let checksum = com_block_checksum(&data);

    // same map already loaded with the same settings
    if let Some(loaded) = CM_MAP.read().as_ref() {
        if loaded.path == path && loaded.checksum == checksum && loaded.model.config() == config {
            debug!("{} already loaded", path.display());
            return Ok(Some((Arc::clone(&loaded.model), checksum)));
        }
    }

    let bsp = BspFile::parse_with_threshold(&data, config.parallel_lumps)?;
    let model = Arc::new(CollisionModel::load(&bsp, config)?);

    info!("loaded {} ({} bytes, checksum {:08x})", path.display(), data.len(), checksum);

    *CM_MAP.write() = Some(LoadedMap {
        path: path.to_path_buf(),
        checksum,
        model: Arc::clone(&model),
    });

    Ok(Some((model, checksum)))
}

/// The current map, if any.
pub fn cm_model() -> Option<Arc<CollisionModel>> {
    CM_MAP.read().as_ref().map(|m| Arc::clone(&m.model))
}

/// Runs `f` against the current map. Returns `None` when nothing is loaded.
pub fn with_collision_model<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&CollisionModel) -> R,
{
    let guard = CM_MAP.read();
    guard.as_ref().map(|m| f(&m.model))
}

pub fn cm_num_models() -> usize {
    with_collision_model(|cm| cm.num_models()).unwrap_or(0)
}

pub fn cm_inline_model(name: &str) -> Option<CmModel> {
    with_collision_model(|cm| cm.model(name).ok().copied()).flatten()
}

pub fn cm_entity_string() -> String {
    with_collision_model(|cm| cm.entity_string().to_string()).unwrap_or_default()
}

pub fn cm_num_clusters() -> usize {
    with_collision_model(|cm| cm.num_clusters()).unwrap_or(0)
}

pub fn cm_leaf_contents(leaf_num: usize) -> Contents {
    with_collision_model(|cm| cm.leaf_contents(leaf_num)).unwrap_or_default()
}

pub fn cm_leaf_cluster(leaf_num: usize) -> i32 {
    with_collision_model(|cm| cm.leaf_cluster(leaf_num)).unwrap_or(-1)
}

pub fn cm_leaf_area(leaf_num: usize) -> i32 {
    with_collision_model(|cm| cm.leaf_area(leaf_num)).unwrap_or(0)
}

/// The world leaf containing `p`.
pub fn cm_point_leafnum(p: &Vec3) -> usize {
    with_collision_model(|cm| cm.point_leafnum(p, cm.world_model().head_node)).unwrap_or(0)
}

pub fn cm_point_contents(p: &Vec3, head_node: ChildRef) -> Contents {
    with_collision_model(|cm| cm.point_contents(p, head_node)).unwrap_or_default()
}

pub fn cm_transformed_point_contents(p: &Vec3, head_node: ChildRef, inverse_matrix: &Mat4) -> Contents {
    with_collision_model(|cm| cm.transformed_point_contents(p, head_node, inverse_matrix))
        .unwrap_or_default()
}

pub fn cm_box_leafnums(mins: &Vec3, maxs: &Vec3, head_node: ChildRef, max_len: usize) -> LeafList {
    with_collision_model(|cm| cm.box_leafnums(mins, maxs, head_node, max_len)).unwrap_or_default()
}

pub fn cm_box_trace(
    start: &Vec3,
    end: &Vec3,
    mins: &Vec3,
    maxs: &Vec3,
    head_node: ChildRef,
    contents: Contents,
) -> Trace {
    with_collision_model(|cm| cm.box_trace(start, end, mins, maxs, head_node, contents))
        .unwrap_or_else(|| Trace {
            end: *end,
            ..Default::default()
        })
}

#[allow(clippy::too_many_arguments)]
pub fn cm_transformed_box_trace(
    start: &Vec3,
    end: &Vec3,
    mins: &Vec3,
    maxs: &Vec3,
    head_node: ChildRef,
    contents: Contents,
    matrix: &Mat4,
    inverse_matrix: &Mat4,
) -> Trace {
    with_collision_model(|cm| {
        cm.transformed_box_trace(start, end, mins, maxs, head_node, contents, matrix, inverse_matrix)
    })
    .unwrap_or_else(|| Trace {
        end: *end,
        ..Default::default()
    })
}

/// A box hull for clipping against an entity's bounds.
pub fn cm_set_box_hull(mins: &Vec3, maxs: &Vec3, contents: Contents) -> BoxHull {
    BoxHull::new(mins, maxs, contents)
}
