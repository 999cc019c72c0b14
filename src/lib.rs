// tasklist - Persisted task list editor core

pub mod config;
pub mod slots;
pub mod store;
pub mod task;

// Re-export main types for convenience
pub use config::{Backend, Config};
pub use slots::{FileSlots, MemorySlots, Slots, SqliteSlots, now_ms};
pub use store::{DEFAULT_KEY, TaskListStore};
pub use task::{EditSession, Task};
