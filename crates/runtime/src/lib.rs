//! Execution runtime for the Quill dynamic language.
//!
//! Builds on `quill_core`'s value system with the parts that only make
//! sense once a program is actually running: package symbol tables and
//! method resolution ([`stash`]), and the call stack / dynamic scope /
//! special variables / `die`-`eval` machinery ([`runtime`]).

pub mod runtime;
pub mod special_vars;
pub mod stash;

pub use runtime::{LocalFrame, Pragmas, Runtime, StackFrame};
pub use special_vars::SpecialVars;
pub use stash::{find_method, isa_check, split_qualified, Stash};

// Re-export the value layer so downstream crates need only depend on
// `quill_runtime` for the common case of driving a full program.
pub use quill_core as core;
