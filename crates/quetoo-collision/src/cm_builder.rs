// cm_builder.rs - assembles collision-ready BSP files from convex brushes

use quetoo_common::q_shared::{
    add_point_to_bounds, clear_bounds, dot_product, Contents, Plane, SurfaceFlags, Vec3,
    MAX_WORLD_COORD, MIN_WORLD_COORD,
};
use quetoo_common::qfiles::{
    BspFile, DBrush, DBrushSide, DLeaf, DModel, DNode, DPlane, DTexInfo, MAX_BSP_BRUSHES,
    MAX_BSP_BRUSH_SIDES, MAX_BSP_LEAFS, MAX_BSP_LEAF_BRUSHES, MAX_BSP_MODELS, MAX_BSP_NODES,
    MAX_BSP_TEXINFO,
};
use tracing::debug;

use crate::cm_brush::{add_brush_bevels, brush_bounds, finish_brush_sides};
use crate::cm_error::{CmError, Result};
use crate::cm_local::{ChildRef, CmBrushSide, ON_EPSILON};
use crate::cm_plane::PlaneTable;

/// Entity string written when none is set.
const DEFAULT_ENTITY_STRING: &str = "{\n\"classname\" \"worldspawn\"\n}\n";

#[derive(Debug, Clone)]
struct BuildBrush {
    sides: Vec<CmBrushSide>,
    contents: Contents,
    mins: Vec3,
    maxs: Vec3,
}

/// A brush as seen from one region of the tree: the side planes that
/// haven't been split on yet along the path to that region.
#[derive(Debug, Clone)]
struct BuildItem {
    brush: usize,
    sides: Vec<usize>,
}

/// Builds BSP files for tests and tools. Brushes are never split; each model's
/// tree is grown by splitting on brush side planes until every leaf is either
/// empty or inside all of the brushes it references.
#[derive(Debug, Clone)]
pub struct BspBuilder {
    planes: PlaneTable,
    texinfo: Vec<DTexInfo>,
    brushes: Vec<BuildBrush>,
    /// brushes of each model, model 0 is the world
    models: Vec<Vec<usize>>,
    entity_string: Option<String>,
}

impl Default for BspBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BspBuilder {
    pub fn new() -> Self {
        Self {
            planes: PlaneTable::new(),
            texinfo: Vec::new(),
            brushes: Vec::new(),
            models: vec![Vec::new()],
            entity_string: None,
        }
    }

    /// Registers a surface and returns its texinfo index.
    pub fn add_surface(&mut self, name: &str, flags: SurfaceFlags, value: i32) -> Result<usize> {
        if self.texinfo.len() >= MAX_BSP_TEXINFO {
            return Err(CmError::LimitExceeded {
                what: "texinfo",
                count: self.texinfo.len() + 1,
                max: MAX_BSP_TEXINFO,
            });
        }

        self.texinfo.push(DTexInfo {
            vecs: [[0.0; 4]; 2],
            flags: flags.bits(),
            value,
            texture: name.to_string(),
            next_texinfo: -1,
        });
        Ok(self.texinfo.len() - 1)
    }

    /// Adds a convex brush to the current model. Each side is `(normal, dist)`
    /// with the brush behind it. Returns the brush number.
    pub fn add_brush(
        &mut self,
        sides: &[(Vec3, f32)],
        contents: Contents,
        surface: Option<usize>,
    ) -> Result<usize> {
        let brush_num = self.brushes.len();
        if brush_num >= MAX_BSP_BRUSHES {
            return Err(CmError::LimitExceeded {
                what: "brushes",
                count: brush_num + 1,
                max: MAX_BSP_BRUSHES,
            });
        }

        if let Some(s) = surface {
            if s >= self.texinfo.len() {
                return Err(CmError::BadIndex {
                    what: "texinfo",
                    index: s as i64,
                    len: self.texinfo.len(),
                });
            }
        }

        let mut brush_sides = Vec::with_capacity(sides.len());
        for (normal, dist) in sides {
            let plane = self.planes.find_or_create(*normal, *dist)?;
            if brush_sides.iter().any(|s: &CmBrushSide| s.plane == plane) {
                continue;
            }
            brush_sides.push(CmBrushSide {
                plane,
                surface,
                bevel: false,
                winding: None,
            });
        }

        finish_brush_sides(self.planes.planes(), &mut brush_sides);
        let (mins, maxs) = brush_bounds(self.planes.planes(), &brush_sides)
            .ok_or(CmError::DegenerateBrush(brush_num))?;

        // redundant sides carry no surface
        for side in brush_sides.iter_mut().filter(|s| s.bevel) {
            side.surface = None;
        }

        add_brush_bevels(&mut self.planes, &mut brush_sides, &mins, &maxs)?;

        self.brushes.push(BuildBrush {
            sides: brush_sides,
            contents,
            mins,
            maxs,
        });
        if let Some(model) = self.models.last_mut() {
            model.push(brush_num);
        }

        Ok(brush_num)
    }

    /// Adds an axis aligned box brush with the null surface.
    pub fn add_box(&mut self, mins: &Vec3, maxs: &Vec3, contents: Contents) -> Result<usize> {
        self.add_brush(
            &[
                ([-1.0, 0.0, 0.0], -mins[0]),
                ([1.0, 0.0, 0.0], maxs[0]),
                ([0.0, -1.0, 0.0], -mins[1]),
                ([0.0, 1.0, 0.0], maxs[1]),
                ([0.0, 0.0, -1.0], -mins[2]),
                ([0.0, 0.0, 1.0], maxs[2]),
            ],
            contents,
            None,
        )
    }

    /// Starts a new inline model; brushes added from here on belong to it.
    /// Returns the model number.
    pub fn next_model(&mut self) -> Result<usize> {
        if self.models.len() >= MAX_BSP_MODELS {
            return Err(CmError::LimitExceeded {
                what: "models",
                count: self.models.len() + 1,
                max: MAX_BSP_MODELS,
            });
        }
        self.models.push(Vec::new());
        Ok(self.models.len() - 1)
    }

    pub fn set_entity_string(&mut self, entities: &str) {
        self.entity_string = Some(entities.to_string());
    }

    pub fn build(&self) -> Result<BspFile> {
        let planes = self.planes.planes();

        let mut tree = TreeWriter {
            planes,
            brushes: &self.brushes,
            nodes: Vec::new(),
            // leaf 0 is the solid leaf
            leafs: vec![DLeaf {
                contents: Contents::SOLID.bits(),
                cluster: -1,
                ..Default::default()
            }],
            leaf_brushes: Vec::new(),
            num_clusters: 0,
        };

        let mut models = Vec::with_capacity(self.models.len());
        for (model_num, brushes) in self.models.iter().enumerate() {
            let (mut mins, mut maxs) = clear_bounds();
            for &b in brushes {
                add_point_to_bounds(&self.brushes[b].mins, &mut mins, &mut maxs);
                add_point_to_bounds(&self.brushes[b].maxs, &mut mins, &mut maxs);
            }
            if brushes.is_empty() {
                mins = [0.0; 3];
                maxs = [0.0; 3];
            }

            let items = brushes
                .iter()
                .map(|&brush| BuildItem {
                    brush,
                    sides: self.brushes[brush]
                        .sides
                        .iter()
                        .filter(|s| !s.bevel)
                        .map(|s| s.plane)
                        .collect(),
                })
                .collect();

            let first_node = tree.nodes.len();
            let head = tree.build_r(items, mins, maxs)?;
            debug!(
                "model {}: {} brushes, {} nodes",
                model_num,
                brushes.len(),
                tree.nodes.len() - first_node
            );

            models.push(DModel {
                mins,
                maxs,
                origin: [0.0; 3],
                head_node: head.to_disk(),
                first_face: 0,
                num_faces: 0,
            });
        }

        let mut brushes = Vec::with_capacity(self.brushes.len());
        let mut brush_sides = Vec::new();
        for b in &self.brushes {
            brushes.push(DBrush {
                first_side: brush_sides.len() as i32,
                num_sides: b.sides.len() as i32,
                contents: b.contents.bits(),
            });
            for side in &b.sides {
                brush_sides.push(DBrushSide {
                    plane_num: side.plane as u16,
                    texinfo: side.surface.map_or(-1, |s| s as i16),
                });
            }
        }
        if brush_sides.len() > MAX_BSP_BRUSH_SIDES {
            return Err(CmError::LimitExceeded {
                what: "brush sides",
                count: brush_sides.len(),
                max: MAX_BSP_BRUSH_SIDES,
            });
        }

        Ok(BspFile {
            entity_string: self
                .entity_string
                .clone()
                .unwrap_or_else(|| DEFAULT_ENTITY_STRING.to_string()),
            planes: planes
                .iter()
                .map(|p| DPlane {
                    normal: p.normal,
                    dist: p.dist,
                    plane_type: p.plane_type as i32,
                })
                .collect(),
            nodes: tree.nodes,
            texinfo: self.texinfo.clone(),
            leafs: tree.leafs,
            leaf_brushes: tree.leaf_brushes,
            models,
            brushes,
            brush_sides,
        })
    }
}

// ============================================================
// Tree construction
// ============================================================

struct TreeWriter<'a> {
    planes: &'a [Plane],
    brushes: &'a [BuildBrush],
    nodes: Vec<DNode>,
    leafs: Vec<DLeaf>,
    leaf_brushes: Vec<u16>,
    num_clusters: i32,
}

fn short_bounds(mins: &Vec3, maxs: &Vec3) -> ([i16; 3], [i16; 3]) {
    let clamp = |v: f32| v.clamp(MIN_WORLD_COORD, MAX_WORLD_COORD) as i16;
    (
        [clamp(mins[0].floor()), clamp(mins[1].floor()), clamp(mins[2].floor())],
        [clamp(maxs[0].ceil()), clamp(maxs[1].ceil()), clamp(maxs[2].ceil())],
    )
}

/// True when the brush overlaps the region with some volume.
fn brush_in_region(brush: &BuildBrush, mins: &Vec3, maxs: &Vec3) -> bool {
    (0..3).all(|i| brush.maxs[i] > mins[i] && brush.mins[i] < maxs[i])
}

enum Placement {
    Front,
    Back,
    Both,
}

impl<'a> TreeWriter<'a> {
    /// Picks the next split plane from the brushes that still have sides to
    /// resolve, axial planes first.
    fn select_split(&self, items: &[BuildItem]) -> Option<usize> {
        let mut first = None;
        for item in items {
            for &s in &item.sides {
                if self.planes[s & !1].plane_type.is_axial() {
                    return Some(s);
                }
                first.get_or_insert(s);
            }
        }
        first
    }

    fn classify(&self, brush: &BuildBrush, plane: &Plane) -> Placement {
        let mut front = false;
        let mut back = false;

        for w in brush.sides.iter().filter_map(|s| s.winding.as_ref()) {
            for p in &w.points {
                let d = dot_product(p, &plane.normal) - plane.dist;
                if d > ON_EPSILON {
                    front = true;
                } else if d < -ON_EPSILON {
                    back = true;
                }
            }
        }

        match (front, back) {
            (true, false) => Placement::Front,
            (false, true) => Placement::Back,
            _ => Placement::Both,
        }
    }

    fn build_r(&mut self, items: Vec<BuildItem>, mins: Vec3, maxs: Vec3) -> Result<ChildRef> {
        let Some(split) = self.select_split(&items) else {
            return self.emit_leaf(&items, &mins, &maxs);
        };

        let node_plane = split & !1;
        let plane = self.planes[node_plane];

        let mut front = Vec::new();
        let mut back = Vec::new();

        for mut item in items {
            if let Some(i) = item.sides.iter().position(|&s| s == node_plane) {
                item.sides.swap_remove(i);
                back.push(item);
            } else if let Some(i) = item.sides.iter().position(|&s| s == node_plane ^ 1) {
                item.sides.swap_remove(i);
                front.push(item);
            } else if item.sides.is_empty() {
                front.push(item.clone());
                back.push(item);
            } else {
                match self.classify(&self.brushes[item.brush], &plane) {
                    Placement::Front => front.push(item),
                    Placement::Back => back.push(item),
                    Placement::Both => {
                        front.push(item.clone());
                        back.push(item);
                    }
                }
            }
        }

        let (mut front_mins, front_maxs) = (mins, maxs);
        let (back_mins, mut back_maxs) = (mins, maxs);
        if plane.plane_type.is_axial() {
            let axis = plane.plane_type.axis();
            front_mins[axis] = front_mins[axis].max(plane.dist);
            back_maxs[axis] = back_maxs[axis].min(plane.dist);
        }

        front.retain(|it| brush_in_region(&self.brushes[it.brush], &front_mins, &front_maxs));
        back.retain(|it| brush_in_region(&self.brushes[it.brush], &back_mins, &back_maxs));

        let node_num = self.nodes.len();
        if node_num >= MAX_BSP_NODES {
            return Err(CmError::LimitExceeded {
                what: "nodes",
                count: node_num + 1,
                max: MAX_BSP_NODES,
            });
        }

        let (short_mins, short_maxs) = short_bounds(&mins, &maxs);
        self.nodes.push(DNode {
            plane_num: node_plane as i32,
            children: [0, 0],
            mins: short_mins,
            maxs: short_maxs,
            first_face: 0,
            num_faces: 0,
        });

        let front_child = self.build_r(front, front_mins, front_maxs)?;
        let back_child = self.build_r(back, back_mins, back_maxs)?;
        self.nodes[node_num].children = [front_child.to_disk(), back_child.to_disk()];

        Ok(ChildRef::Node(node_num))
    }

    fn emit_leaf(&mut self, items: &[BuildItem], mins: &Vec3, maxs: &Vec3) -> Result<ChildRef> {
        let leaf_num = self.leafs.len();
        if leaf_num >= MAX_BSP_LEAFS {
            return Err(CmError::LimitExceeded {
                what: "leafs",
                count: leaf_num + 1,
                max: MAX_BSP_LEAFS,
            });
        }
        if self.leaf_brushes.len() + items.len() > MAX_BSP_LEAF_BRUSHES {
            return Err(CmError::LimitExceeded {
                what: "leaf brushes",
                count: self.leaf_brushes.len() + items.len(),
                max: MAX_BSP_LEAF_BRUSHES,
            });
        }

        let contents = items
            .iter()
            .fold(Contents::empty(), |c, it| c | self.brushes[it.brush].contents);

        let (cluster, area) = if contents.contains(Contents::SOLID) {
            (-1, 0)
        } else {
            let cluster = i16::try_from(self.num_clusters).map_err(|_| CmError::LimitExceeded {
                what: "clusters",
                count: self.num_clusters as usize + 1,
                max: i16::MAX as usize + 1,
            })?;
            self.num_clusters += 1;
            (cluster, 1)
        };

        let (short_mins, short_maxs) = short_bounds(mins, maxs);
        self.leafs.push(DLeaf {
            contents: contents.bits(),
            cluster,
            area,
            mins: short_mins,
            maxs: short_maxs,
            first_leaf_face: 0,
            num_leaf_faces: 0,
            first_leaf_brush: self.leaf_brushes.len() as u16,
            num_leaf_brushes: items.len() as u16,
        });
        self.leaf_brushes.extend(items.iter().map(|it| it.brush as u16));

        Ok(ChildRef::Leaf(leaf_num))
    }
}
