//! Merge-execution pipeline
//!
//! Split into pure planning decisions (`plan`) and the effectful run
//! (`execute`), so the step/failure-policy table stays directly testable.

pub mod execute;
pub mod plan;

pub use execute::{execute_auto_merge, PipelineDeps};
