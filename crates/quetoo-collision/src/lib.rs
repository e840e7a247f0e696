#![allow(clippy::needless_range_loop, clippy::float_cmp, clippy::too_many_arguments,
         clippy::manual_range_contains, clippy::comparison_chain)]

pub mod cm_local;
pub mod cm_error;
pub mod cm_config;
pub mod cm_polylib;
pub mod cm_plane;
pub mod cm_brush;
pub mod cm_trace;
pub mod cm_entity;
pub mod cm_model;
pub mod cm_builder;

pub use cm_builder::BspBuilder;
pub use cm_config::CmConfig;
pub use cm_entity::{parse_entities, CmEntity};
pub use cm_error::{CmError, Result};
pub use cm_local::{
    BspView, ChildRef, CmBrush, CmBrushSide, CmLeaf, CmModel, CmNode, CmStats, LeafList, Surface,
    Trace,
};
pub use cm_model::{
    cm_box_leafnums, cm_box_trace, cm_entity_string, cm_inline_model, cm_leaf_area,
    cm_leaf_cluster, cm_leaf_contents, cm_load_bsp_model, cm_load_bsp_model_with, cm_model,
    cm_num_clusters, cm_num_models, cm_point_contents, cm_point_leafnum, cm_set_box_hull,
    cm_transformed_box_trace, cm_transformed_point_contents, with_collision_model,
    CollisionModel,
};
pub use cm_test::BoxHull;
pub use cm_trace::{entity_bounds, trace_bounds};
