//! Public GEMM entry points.
//!
//! Every function here returns a [`Status`] and never panics: the body runs
//! under [`guard`], which converts errors and faults into status codes.

use crate::gemm::catalog::catalog;
use crate::gemm::dispatch;
use crate::gemm::precision::Precision;
use crate::gemm::problem::{BatchLayout, GemmExArgs, GemmProblem};
use crate::gemm::query::write_solutions;
use crate::gemm::resolver::{resolve, ResolveMode};
use crate::handle::Handle;
use crate::logging::{log_call, CallRecord};
use crate::status::{guard, BlasError, BlasResult, Status};
use crate::types::{Datatype, GemmFlags, ScalarArg};

/// `D = alpha * op(A) * op(B) + beta * C` for one problem.
pub fn gemm_ex(handle: Option<&Handle>, args: &GemmExArgs) -> Status {
    guard("gemm_ex", || gemm_ex_template(handle, args, BatchLayout::Single))
}

/// Batched GEMM with operands at `base + i * stride`.
pub fn gemm_strided_batched_ex(handle: Option<&Handle>, args: &GemmExArgs) -> Status {
    guard("gemm_strided_batched_ex", || {
        gemm_ex_template(handle, args, BatchLayout::Strided)
    })
}

/// Batched GEMM with one pointer per batch member and operand.
pub fn gemm_batched_ex(handle: Option<&Handle>, args: &GemmExArgs) -> Status {
    guard("gemm_batched_ex", || {
        gemm_ex_template(handle, args, BatchLayout::PointerArray)
    })
}

/// Solutions able to run `args` as a `gemm_ex` call.
pub fn gemm_ex_get_solutions(
    handle: Option<&Handle>,
    args: &GemmExArgs,
    list: Option<&mut [i32]>,
    size: Option<&mut i32>,
) -> Status {
    guard("gemm_ex_get_solutions", || {
        get_solutions_template(handle, args, BatchLayout::Single, list, size)
    })
}

pub fn gemm_strided_batched_ex_get_solutions(
    handle: Option<&Handle>,
    args: &GemmExArgs,
    list: Option<&mut [i32]>,
    size: Option<&mut i32>,
) -> Status {
    guard("gemm_strided_batched_ex_get_solutions", || {
        get_solutions_template(handle, args, BatchLayout::Strided, list, size)
    })
}

pub fn gemm_batched_ex_get_solutions(
    handle: Option<&Handle>,
    args: &GemmExArgs,
    list: Option<&mut [i32]>,
    size: Option<&mut i32>,
) -> Status {
    guard("gemm_batched_ex_get_solutions", || {
        get_solutions_template(handle, args, BatchLayout::PointerArray, list, size)
    })
}

/// Every solution for a type combination, regardless of shape.
pub fn gemm_ex_get_solutions_by_type(
    handle: Option<&Handle>,
    input_type: Datatype,
    output_type: Datatype,
    compute_type: Datatype,
    flags: GemmFlags,
    list: Option<&mut [i32]>,
    size: Option<&mut i32>,
) -> Status {
    guard("gemm_ex_get_solutions_by_type", || {
        let handle = handle.ok_or(BlasError::InvalidHandle)?;
        log_call(
            handle,
            &CallRecord::new("gemm_ex_get_solutions_by_type")
                .arg("a_type", input_type)
                .arg("c_type", output_type)
                .arg("compute_type", compute_type)
                .arg("flags", flags),
        );
        let precision = Precision::from_io(input_type, output_type, compute_type).ok_or_else(|| {
            BlasError::NotImplemented(format!(
                "gemm with input={input_type} output={output_type} compute={compute_type}"
            ))
        })?;
        let solutions = catalog().enumerate_by_precision(precision, flags.contains(GemmFlags::PACK_INT8X4));
        write_solutions(&solutions, list, size)
    })
}

fn gemm_ex_template(handle: Option<&Handle>, args: &GemmExArgs, layout: BatchLayout) -> BlasResult<()> {
    let handle = handle.ok_or(BlasError::InvalidHandle)?;
    log_call(handle, &call_record(layout.routine(), args, layout));

    let problem = GemmProblem::new(args, layout)?;
    let mode = ResolveMode::from_flags(args.flags);
    let solution = resolve(&problem, args.solution_index, mode)?;
    if mode == ResolveMode::ValidateOnly {
        return Ok(());
    }
    dispatch::execute(handle, &problem, &solution, args)
}

fn get_solutions_template(
    handle: Option<&Handle>,
    args: &GemmExArgs,
    layout: BatchLayout,
    list: Option<&mut [i32]>,
    size: Option<&mut i32>,
) -> BlasResult<()> {
    let handle = handle.ok_or(BlasError::InvalidHandle)?;
    let routine = match layout {
        BatchLayout::Single => "gemm_ex_get_solutions",
        BatchLayout::Strided => "gemm_strided_batched_ex_get_solutions",
        BatchLayout::PointerArray => "gemm_batched_ex_get_solutions",
    };
    log_call(handle, &call_record(routine, args, layout));

    let problem = GemmProblem::new(args, layout)?;
    let solutions = catalog().enumerate(&problem);
    write_solutions(&solutions, list, size)
}

fn scalar_text(arg: &ScalarArg) -> String {
    match arg {
        ScalarArg::Host(s) => s.to_string(),
        ScalarArg::Device(p) => format!("device:{p}"),
    }
}

fn call_record(routine: &'static str, args: &GemmExArgs, layout: BatchLayout) -> CallRecord {
    let strided = layout == BatchLayout::Strided;
    let mut rec = CallRecord::new(routine)
        .arg("transposeA", args.trans_a)
        .arg("transposeB", args.trans_b)
        .arg("m", args.m)
        .arg("n", args.n)
        .arg("k", args.k)
        .arg("alpha", scalar_text(&args.alpha))
        .ptr("a", args.a.describe())
        .arg("a_type", args.a.datatype)
        .arg("lda", args.a.ld);
    if strided {
        rec = rec.arg("stride_a", args.a.stride);
    }
    rec = rec.ptr("b", args.b.describe()).arg("b_type", args.b.datatype).arg("ldb", args.b.ld);
    if strided {
        rec = rec.arg("stride_b", args.b.stride);
    }
    rec = rec
        .arg("beta", scalar_text(&args.beta))
        .ptr("c", args.c.describe())
        .arg("c_type", args.c.datatype)
        .arg("ldc", args.c.ld);
    if strided {
        rec = rec.arg("stride_c", args.c.stride);
    }
    rec = rec.ptr("d", args.d.describe()).arg("d_type", args.d.datatype).arg("ldd", args.d.ld);
    if strided {
        rec = rec.arg("stride_d", args.d.stride);
    }
    if layout != BatchLayout::Single {
        rec = rec.arg("batch_count", args.batch_count);
    }
    rec.arg("compute_type", args.compute_type)
        .arg("algo", args.algo as i32)
        .arg("solution_index", args.solution_index)
        .arg("flags", args.flags)
}
