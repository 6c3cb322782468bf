//! Optimizers for MCL
//!
//! Two independent stages:
//!
//! - [`global`]: AST-to-AST constant folding and propagation, run before code
//!   generation
//! - [`peephole`]: a one-instruction-lookahead scan over P-code, run after it

pub mod global;
pub mod peephole;

pub use global::GlobalOptimizer;
pub use peephole::PeepholeResult;
