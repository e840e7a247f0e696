#![allow(clippy::needless_range_loop, clippy::float_cmp, clippy::too_many_arguments,
         clippy::manual_range_contains, clippy::comparison_chain)]

pub mod q_shared;
pub mod matrix;
pub mod qfiles;
pub mod md4;
pub mod cvar;
