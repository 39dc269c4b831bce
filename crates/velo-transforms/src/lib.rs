//! Rewriting passes over the IR.
//!
//! Each pass takes exclusive access to one function, runs to completion and
//! preserves the SSA and CFG invariants through the mutation protocol of
//! `velo-ir`. Analyses are recomputed internally where needed; passes emit
//! one `tracing` event per run with their rewrite counts.

pub mod constant_folding;
pub mod dce;
pub mod pass;
pub mod peepholes;

// Re-export commonly used types
pub use constant_folding::ConstantFolding;
pub use dce::Dce;
pub use pass::Pass;
pub use peepholes::Peephole;
