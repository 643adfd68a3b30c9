//! Step execution boundary for Prizm.
//!
//! This crate defines the [`StepExecutor`] trait - the injected capability
//! that performs the actual unit of work a step represents. In the Prizm
//! backend this is an agent invocation; the orchestration core never
//! inspects how it is implemented.
//!
//! The contract:
//! - the executor receives a resolved [`ExecutorInput`] and a cancellation
//!   token; it must observe the token and return promptly with a
//!   `cancelled` status when it fires (the runner cooperates, it does not
//!   force-kill);
//! - outcome is encoded in [`ExecutorResult::status`]; an `Err` from the
//!   trait represents the executor itself blowing up, which the runner
//!   treats as a failure with extra diagnostic detail.

mod error;
mod executor;
mod result;

pub use error::ExecutorError;
pub use executor::{ExecutorInput, StepExecutor};
pub use result::{ExecutorResult, ExecutorStatus};
