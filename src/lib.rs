//! gblas: GPU-style BLAS core with GEMM solution enumeration.
//!
//! This crate provides:
//! - **GEMM with explicit solutions**: every call names a catalog index or
//!   `0` for the built-in heuristic; indices can be listed per problem with a
//!   two-phase query and checked without executing
//! - **Stream dispatch**: kernels are enqueued on a [`DeviceStream`] and
//!   complete asynchronously; [`Handle::synchronize`] waits for them
//! - **Status boundary**: public entry points return a [`Status`] and never
//!   let a fault escape
//! - **Level-1 routines**: `scal_ex` and `rotm` in single, strided and
//!   pointer-array batch forms
//! - **Tuning**: benchmark every enumerated solution and persist the winner
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use gblas::gemm::{self, GemmExArgs, MatrixArg};
//! use gblas::types::{Datatype, GemmFlags, Operation};
//! use gblas::{Handle, Status};
//!
//! let handle = Handle::host();
//! let (m, n, k) = (128, 96, 64);
//! let a = handle.upload(&vec![1.0f32; m * k]).unwrap();
//! let b = handle.upload(&vec![2.0f32; n * k]).unwrap();
//! let c = handle.alloc::<f32>(m * n).unwrap();
//!
//! let args = GemmExArgs::new(Operation::None, Operation::Transpose, m as i32, n as i32, k as i32)
//!     .a(MatrixArg::new(a.ptr(), Datatype::F32R, m as i32))
//!     .b(MatrixArg::new(b.ptr(), Datatype::F32R, n as i32))
//!     .c_in_place(MatrixArg::new(c.ptr(), Datatype::F32R, m as i32));
//!
//! // Phase 1: count. Phase 2: fill.
//! let mut size = 0;
//! assert_eq!(gemm::gemm_ex_get_solutions(Some(&handle), &args, None, Some(&mut size)), Status::Success);
//! let mut list = vec![0; size as usize];
//! gemm::gemm_ex_get_solutions(Some(&handle), &args, Some(&mut list), Some(&mut size));
//!
//! // Validate, then run the first listed solution.
//! let chosen = args.clone().solution_index(list[0]);
//! let check = chosen.clone().flags(GemmFlags::CHECK_SOLUTION_INDEX);
//! assert_eq!(gemm::gemm_ex(Some(&handle), &check), Status::Success);
//! assert_eq!(gemm::gemm_ex(Some(&handle), &chosen), Status::Success);
//! handle.synchronize().unwrap();
//! ```

pub mod blas1;
pub mod check_numerics;
pub mod config;
pub mod device;
pub mod element;
pub mod gemm;
pub mod handle;
pub mod logging;
pub mod status;
pub mod tuning;
pub mod types;

pub use config::HandleConfig;
pub use device::{DeviceBuffer, DeviceError, DevicePtr, DeviceStream, HostStream, InlineStream, KernelLaunch};
pub use gemm::{
    gemm_batched_ex, gemm_batched_ex_get_solutions, gemm_ex, gemm_ex_get_solutions,
    gemm_ex_get_solutions_by_type, gemm_strided_batched_ex, gemm_strided_batched_ex_get_solutions, initialize,
};
pub use handle::Handle;
pub use status::{BlasError, BlasResult, Status};
pub use types::{
    AtomicsMode, CheckNumericsMode, Datatype, GemmAlgo, GemmFlags, LayerMode, Operation, PointerMode, Scalar,
    ScalarArg,
};
