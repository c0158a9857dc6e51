mod graph;
mod usage;

pub use graph::{StateGraph, TERMINAL_STATE};
pub use usage::{ActionUsage, ActionUsageMap, SyncRole};
