//! drivetest-store — Progress persistence for drivetest.
//!
//! One JSON document per partition, guarded by an OS file lock and replaced
//! atomically on every commit.

pub mod file;

pub use drivetest_core::progress::{MemoryProgressStore, ProgressStore};
pub use file::FileProgressStore;
