//! Reference resolution for Prizm workflows.
//!
//! Steps reference earlier results and run arguments through a narrow,
//! explicit grammar embedded in ordinary text:
//!
//! ```text
//! $ident(.prop)*        value from step `ident`'s result view
//! $args.key             run argument
//! $prev(.prop)*         last completed step's result view
//! ```
//!
//! The grammar is deliberately a text-substitution pass, not an expression
//! language: there is no arithmetic, no function calls, no nesting. An
//! unresolvable reference resolves to the empty string - interpolation never
//! fails and never panics.
//!
//! # Step views
//!
//! Each step result is exposed to the resolver as a JSON object view:
//!
//! ```json
//! { "output": "...", "data": { ... }, "approved": true, "status": "completed" }
//! ```
//!
//! `$analyze.data.sentiment` walks into the step's structured data;
//! `$collect.output` reads its textual output; a bare `$collect` is
//! shorthand for `$collect.output`.

mod condition;
mod context;
mod resolver;

pub use condition::eval_condition;
pub use context::RefContext;
pub use resolver::{interpolate, last_completed_step, resolve_reference};
