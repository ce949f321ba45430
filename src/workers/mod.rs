//! Worker Pool & Subagent Spawner (spec.md §4.9).

pub mod pool;
pub mod spawner;

pub use pool::WorkerPool;
pub use spawner::SubagentSpawner;
