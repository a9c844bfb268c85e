//! GEMM solution selection and dispatch.
//!
//! A call flows through four stages:
//!
//! 1. [`problem`]: raw [`GemmExArgs`] are validated into a [`GemmProblem`].
//! 2. [`catalog`]: the static solution table is filtered for the problem.
//! 3. [`resolver`]: the requested index (0 for the default) is checked.
//! 4. [`dispatch`]: operands are bound per batch and the kernel is enqueued.
//!
//! The public entry points live in [`api`] and are re-exported here.

pub mod api;
pub mod catalog;
pub mod dispatch;
pub(crate) mod kernel;
pub mod precision;
pub mod problem;
pub mod query;
pub mod resolver;

pub use api::{
    gemm_batched_ex, gemm_batched_ex_get_solutions, gemm_ex, gemm_ex_get_solutions,
    gemm_ex_get_solutions_by_type, gemm_strided_batched_ex, gemm_strided_batched_ex_get_solutions,
};
pub use catalog::{catalog, initialize, MacroTile, SolutionCatalog, SolutionEntry};
pub use precision::Precision;
pub use problem::{BatchLayout, GemmExArgs, GemmProblem, MatrixAddr, MatrixArg};
pub use resolver::{resolve, ResolveMode, ResolvedSolution};
