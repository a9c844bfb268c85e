//! Bind a resolved solution to device operands and enqueue it.

use half::{bf16, f16};

use crate::check_numerics::{check_operand, Extent};
use crate::device::{DevicePtr, KernelLaunch};
use crate::element::{ComputeScalar, Convert, DeviceElement};
use crate::gemm::kernel::{self, BatchOperands, GemmJob, ScalarSource};
use crate::gemm::precision::Precision;
use crate::gemm::problem::{BatchLayout, GemmExArgs, GemmProblem, MatrixAddr, MatrixArg};
use crate::gemm::resolver::ResolvedSolution;
use crate::handle::Handle;
use crate::status::{BlasError, BlasResult};
use crate::types::{Complex32, Complex64, PointerMode, ScalarArg};

/// Execute `solution` for `problem` on the handle's stream.
///
/// Returns once the kernel is enqueued. In device-memory-size-query mode
/// only the workspace requirement is reported. The query is answered after
/// `problem` has been validated and `solution` resolved, so a malformed
/// call fails the same way whether or not the handle is querying.
pub fn execute(
    handle: &Handle,
    problem: &GemmProblem,
    solution: &ResolvedSolution,
    args: &GemmExArgs,
) -> BlasResult<()> {
    if handle.is_device_memory_size_query() {
        let bytes = if problem.is_degenerate() { 0 } else { solution.workspace_bytes(problem) };
        handle.report_device_memory_size(bytes);
        return Ok(());
    }
    if problem.is_degenerate() {
        log::debug!("{}: degenerate problem {problem}, nothing to do", problem.layout.routine());
        return Ok(());
    }

    match problem.precision {
        Precision::F64 => execute_typed::<f64, f64, f64>(handle, problem, solution, args),
        Precision::F32 => execute_typed::<f32, f32, f32>(handle, problem, solution, args),
        Precision::F16 => execute_typed::<f16, f16, f16>(handle, problem, solution, args),
        Precision::F16ComputeF32 => execute_typed::<f16, f16, f32>(handle, problem, solution, args),
        Precision::F16OutF32 => execute_typed::<f16, f32, f32>(handle, problem, solution, args),
        Precision::Bf16 => execute_typed::<bf16, bf16, f32>(handle, problem, solution, args),
        Precision::Bf16OutF32 => execute_typed::<bf16, f32, f32>(handle, problem, solution, args),
        Precision::I8I32 => execute_typed::<i8, i32, i32>(handle, problem, solution, args),
        Precision::C32 => execute_typed::<Complex32, Complex32, Complex32>(handle, problem, solution, args),
        Precision::C64 => execute_typed::<Complex64, Complex64, Complex64>(handle, problem, solution, args),
    }
}

fn execute_typed<Ti, To, Tc>(
    handle: &Handle,
    p: &GemmProblem,
    solution: &ResolvedSolution,
    args: &GemmExArgs,
) -> BlasResult<()>
where
    Ti: DeviceElement + Convert<Tc>,
    To: DeviceElement + Convert<Tc>,
    Tc: ComputeScalar + Convert<To>,
{
    let routine = p.layout.routine();
    let alpha = scalar_source::<Tc>(handle, &args.alpha, "alpha")?;
    let beta = scalar_source::<Tc>(handle, &args.beta, "beta")?;

    let host_alpha_zero = matches!(alpha, ScalarSource::Host(v) if v.is_zero());
    let host_beta_zero = matches!(beta, ScalarSource::Host(v) if v.is_zero());
    let host_beta_one = matches!(beta, ScalarSource::Host(v) if v == Tc::one());
    if host_alpha_zero && host_beta_one {
        return Ok(());
    }

    let a = bind::<Ti>(p, &args.a, "A", p.stride_a, p.a_extent(), !host_alpha_zero)?;
    let b = bind::<Ti>(p, &args.b, "B", p.stride_b, p.b_extent(), !host_alpha_zero)?;
    let c = bind::<To>(p, &args.c, "C", p.stride_c, p.c_extent(), !host_beta_zero)?;
    let d = bind::<To>(p, &args.d, "D", p.stride_d, p.d_extent(), true)?;

    let (a_rows, a_cols) = p.a_dims();
    let (b_rows, b_cols) = p.b_dims();
    if !host_alpha_zero {
        check_operand::<Ti>(handle, routine, "A", true, &a, Extent::Matrix { rows: a_rows, cols: a_cols, ld: p.lda })?;
        check_operand::<Ti>(handle, routine, "B", true, &b, Extent::Matrix { rows: b_rows, cols: b_cols, ld: p.ldb })?;
    }
    if !host_beta_zero {
        check_operand::<To>(handle, routine, "C", true, &c, Extent::Matrix { rows: p.m, cols: p.n, ld: p.ldc })?;
    }

    let workspace = match solution.workspace_bytes(p) {
        0 => None,
        bytes => Some(handle.device_malloc(bytes)?),
    };

    let batches: Vec<BatchOperands> = (0..p.batch_count)
        .map(|i| BatchOperands {
            a: a[i].clone(),
            b: b[i].clone(),
            c: c[i].clone(),
            d: d[i].clone(),
        })
        .collect();
    let parallel = batches.iter().all(|bo| {
        tiles_independent(
            bo,
            p.a_extent().saturating_mul(std::mem::size_of::<Ti>()),
            p.b_extent().saturating_mul(std::mem::size_of::<Ti>()),
            p.c_extent().saturating_mul(std::mem::size_of::<To>()),
            p.d_extent().saturating_mul(std::mem::size_of::<To>()),
            p.ldc == p.ldd,
            !host_alpha_zero,
            !host_beta_zero,
        )
    });

    log::debug!("{routine}: launching {solution} for {p} (parallel tiles: {parallel})");
    let job = GemmJob {
        problem: *p,
        batches,
        alpha,
        beta,
        tile: solution.tile(),
        split_k: solution.global_split_u(),
        workspace,
        parallel,
    };
    handle
        .stream()
        .launch(KernelLaunch::new(solution.kernel_name(), move || kernel::run::<Ti, To, Tc>(job)))?;

    check_operand::<To>(handle, routine, "D", false, &d, Extent::Matrix { rows: p.m, cols: p.n, ld: p.ldd })?;
    Ok(())
}

/// Resolve alpha or beta against the handle's pointer mode.
pub(crate) fn scalar_source<Tc: ComputeScalar>(handle: &Handle, arg: &ScalarArg, name: &str) -> BlasResult<ScalarSource<Tc>> {
    match (handle.pointer_mode(), arg) {
        (PointerMode::Host, ScalarArg::Host(s)) => Tc::from_scalar(s).map(ScalarSource::Host).ok_or_else(|| {
            BlasError::InvalidValue(format!("{name} is {} but the compute type is {}", s.datatype(), Tc::DATATYPE))
        }),
        (PointerMode::Device, ScalarArg::Device(ptr)) => {
            if ptr.available_bytes() < std::mem::size_of::<Tc>() {
                return Err(BlasError::InvalidPointer(format!("{name} device pointer {ptr}")));
            }
            Ok(ScalarSource::Device(ptr.clone()))
        }
        (mode, _) => Err(BlasError::InvalidValue(format!(
            "{name} does not match pointer mode {mode:?}"
        ))),
    }
}

/// Per-batch pointers of one operand, bounds-checked when `required`.
fn bind<T: DeviceElement>(
    p: &GemmProblem,
    arg: &MatrixArg,
    name: &str,
    stride: usize,
    extent: usize,
    required: bool,
) -> BlasResult<Vec<DevicePtr>> {
    let ptrs: Vec<DevicePtr> = match (&arg.addr, p.layout) {
        (MatrixAddr::Base(base), BatchLayout::Single) => vec![base.clone()],
        (MatrixAddr::Base(base), BatchLayout::Strided) => (0..p.batch_count)
            .map(|i| {
                i.checked_mul(stride)
                    .map(|offset| base.add::<T>(offset))
                    .ok_or_else(|| BlasError::InvalidSize(format!("{name} batch {i} offset overflows")))
            })
            .collect::<BlasResult<_>>()?,
        (MatrixAddr::PerBatch(list), BatchLayout::PointerArray) => {
            if list.len() < p.batch_count {
                return Err(BlasError::InvalidPointer(format!(
                    "{name} has {} pointers for batch_count {}",
                    list.len(),
                    p.batch_count
                )));
            }
            list[..p.batch_count].to_vec()
        }
        (MatrixAddr::PerBatch(_), _) => {
            return Err(BlasError::InvalidPointer(format!(
                "{name} is a pointer array but {} takes a base pointer",
                p.layout.routine()
            )))
        }
        (MatrixAddr::Base(_), BatchLayout::PointerArray) => {
            return Err(BlasError::InvalidPointer(format!("{name} must be a pointer array for gemm_batched_ex")))
        }
    };

    if required {
        let bytes = extent
            .checked_mul(std::mem::size_of::<T>())
            .ok_or_else(|| BlasError::InvalidSize(format!("{name} extent of {extent} elements overflows")))?;
        for (i, ptr) in ptrs.iter().enumerate() {
            if ptr.is_null() {
                return Err(BlasError::InvalidPointer(format!("{name} (batch {i}) is null")));
            }
            if ptr.available_bytes() < bytes {
                return Err(BlasError::InvalidPointer(format!(
                    "{name} (batch {i}) at {ptr} holds {} bytes, needs {bytes}",
                    ptr.available_bytes()
                )));
            }
        }
    }
    Ok(ptrs)
}

fn overlaps(a: &DevicePtr, a_bytes: usize, b: &DevicePtr, b_bytes: usize) -> bool {
    if a.is_null() || b.is_null() || a_bytes == 0 || b_bytes == 0 {
        return false;
    }
    let (a0, a1) = a.byte_range(a_bytes);
    let (b0, b1) = b.byte_range(b_bytes);
    a0 < b1 && b0 < a1
}

/// Whether output tiles can be computed concurrently without one tile's
/// writes feeding another tile's reads.
#[allow(clippy::too_many_arguments)]
fn tiles_independent(
    bo: &BatchOperands,
    a_bytes: usize,
    b_bytes: usize,
    c_bytes: usize,
    d_bytes: usize,
    same_ld: bool,
    reads_ab: bool,
    reads_c: bool,
) -> bool {
    if reads_ab && (overlaps(&bo.d, d_bytes, &bo.a, a_bytes) || overlaps(&bo.d, d_bytes, &bo.b, b_bytes)) {
        return false;
    }
    if reads_c && overlaps(&bo.d, d_bytes, &bo.c, c_bytes) {
        // In-place update touches each element from one tile only.
        return bo.c == bo.d && same_ld;
    }
    true
}
