// cm_config.rs - collision model tunables backed by console variables

use quetoo_common::cvar::CvarContext;
use quetoo_common::qfiles::{DEFAULT_PARALLEL_LUMP_THRESHOLD, MAX_BSP_LEAFS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmConfig {
    /// Capacity of the leaf list used by position tests.
    pub leaf_list_capacity: usize,
    /// Lumps with at least this many records are decoded on the rayon pool.
    pub parallel_lumps: usize,
    /// Maintain and log query counters.
    pub trace_stats: bool,
}

impl Default for CmConfig {
    fn default() -> Self {
        Self {
            leaf_list_capacity: MAX_BSP_LEAFS,
            parallel_lumps: DEFAULT_PARALLEL_LUMP_THRESHOLD,
            trace_stats: false,
        }
    }
}

impl CmConfig {
    /// Registers the collision cvars with their defaults and reads them back.
    pub fn from_cvars(cvars: &mut CvarContext) -> Self {
        let defaults = Self::default();

        cvars.get("cm_leaf_list", &defaults.leaf_list_capacity.to_string());
        cvars.get("cm_parallel_lumps", &defaults.parallel_lumps.to_string());
        cvars.get("cm_trace_stats", "0");

        let leaf_list = cvars.variable_value("cm_leaf_list");
        let parallel = cvars.variable_value("cm_parallel_lumps");

        Self {
            leaf_list_capacity: if leaf_list >= 1.0 {
                (leaf_list as usize).min(MAX_BSP_LEAFS)
            } else {
                defaults.leaf_list_capacity
            },
            parallel_lumps: if parallel >= 0.0 {
                parallel as usize
            } else {
                defaults.parallel_lumps
            },
            trace_stats: cvars.variable_value("cm_trace_stats") != 0.0,
        }
    }
}
