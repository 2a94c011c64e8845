//! Map entity simulation: obstacles, movements, ground reactions and the
//! blocks, streams, switches and teletransporters built on top of them.

pub mod audio;
pub mod config;
pub mod entity;
pub mod ground_grid;
pub mod lua_bridge;
pub mod map;
pub mod map_file;
pub mod movement;
pub mod replay;
pub mod script;

#[cfg(test)]
pub(crate) mod testing;
