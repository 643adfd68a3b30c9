//! Prizm Workflow
//!
//! This crate contains the serializable workflow definition types for Prizm.
//! A [`WorkflowDef`] describes a named, ordered pipeline of steps; it is
//! immutable for the duration of a run.
//!
//! Definitions can be loaded from:
//! - JSON/YAML documents (via the surrounding service's definition store)
//! - Database storage (as JSON blobs)
//!
//! The runner takes these definition types and drives them through the run
//! state machine; nothing in this crate executes anything.

mod enums;
mod step;
mod workflow;

pub use enums::{ErrorStrategy, RetryOn, WorkspaceMode};
pub use step::{RetryConfig, StepAction, StepDef};
pub use workflow::{ArgDef, OutputDef, WorkflowConfig, WorkflowDef};
