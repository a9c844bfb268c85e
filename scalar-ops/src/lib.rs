//! Scalar BLAS reference routines as plain `extern "C"` functions.
//!
//! These are the golden results the `gblas` tests compare against. Every
//! function is a plain loop nest over column-major storage with no tiling,
//! splitting or parallelism.
//!
//! This crate is compiled with `opt-level = 1` (configured in the workspace
//! root Cargo.toml) so the loops stay as written.

pub mod blas;

pub use blas::*;
