//! I/O helpers for agent commands.

pub mod cache;
pub mod config;
pub mod env;
pub mod model;
pub mod pipeline;
pub mod process;
pub mod tools;
pub mod trace;
