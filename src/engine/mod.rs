//! Execution engine for rgsync
//!
//! The engine orchestrates:
//! 1. Planning - Read each group and reconcile it against the manifest
//! 2. Diffing - Show observed vs desired state and the statements to run
//! 3. Executing - Apply changes group by group with progress reporting

pub mod differ;
pub mod executor;
pub mod planner;

pub use executor::{ExecuteOptions, ExecuteSummary, execute};
pub use planner::ExecutionPlan;
