//! `x = alpha * x` with independently typed alpha, x and execution.

use half::{bf16, f16};

use crate::blas1::{bind_vector, vector_extent, VectorAddr};
use crate::check_numerics::{check_operand, Extent};
use crate::device::{DevicePtr, KernelLaunch};
use crate::element::{ComputeScalar, Convert, DeviceElement};
use crate::gemm::dispatch::scalar_source;
use crate::gemm::kernel::ScalarSource;
use crate::gemm::problem::BatchLayout;
use crate::handle::Handle;
use crate::logging::{log_call, CallRecord};
use crate::status::{guard, BlasError, BlasResult, Status};
use crate::types::{Complex32, Complex64, Datatype, ScalarArg};

/// Arguments of the `scal_*_ex` family.
#[derive(Debug, Clone)]
pub struct ScalExArgs {
    pub n: i32,
    pub alpha: ScalarArg,
    pub alpha_type: Datatype,
    pub x: VectorAddr,
    pub x_type: Datatype,
    pub incx: i32,
    pub stride_x: i64,
    pub batch_count: i32,
    pub execution_type: Datatype,
}

impl ScalExArgs {
    /// Alpha, x and execution all of `datatype`, one vector.
    pub fn new(n: i32, alpha: impl Into<ScalarArg>, x: impl Into<VectorAddr>, datatype: Datatype, incx: i32) -> Self {
        let alpha = alpha.into();
        let alpha_type = alpha.host().map_or(datatype, |s| s.datatype());
        Self {
            n,
            alpha,
            alpha_type,
            x: x.into(),
            x_type: datatype,
            incx,
            stride_x: 0,
            batch_count: 1,
            execution_type: datatype,
        }
    }

    pub fn alpha_type(mut self, datatype: Datatype) -> Self {
        self.alpha_type = datatype;
        self
    }

    pub fn execution_type(mut self, datatype: Datatype) -> Self {
        self.execution_type = datatype;
        self
    }

    pub fn stride_x(mut self, stride: i64) -> Self {
        self.stride_x = stride;
        self
    }

    pub fn batch_count(mut self, batch_count: i32) -> Self {
        self.batch_count = batch_count;
        self
    }
}

pub fn scal_ex(handle: Option<&Handle>, args: &ScalExArgs) -> Status {
    guard("scal_ex", || scal_ex_template(handle, args, BatchLayout::Single))
}

pub fn scal_batched_ex(handle: Option<&Handle>, args: &ScalExArgs) -> Status {
    guard("scal_batched_ex", || scal_ex_template(handle, args, BatchLayout::PointerArray))
}

pub fn scal_strided_batched_ex(handle: Option<&Handle>, args: &ScalExArgs) -> Status {
    guard("scal_strided_batched_ex", || scal_ex_template(handle, args, BatchLayout::Strided))
}

fn routine(layout: BatchLayout) -> &'static str {
    match layout {
        BatchLayout::Single => "scal_ex",
        BatchLayout::Strided => "scal_strided_batched_ex",
        BatchLayout::PointerArray => "scal_batched_ex",
    }
}

fn call_record(args: &ScalExArgs, layout: BatchLayout) -> CallRecord {
    let mut rec = CallRecord::new(routine(layout)).arg("n", args.n);
    if let Some(alpha) = args.alpha.host() {
        rec = rec.arg("alpha", alpha);
    }
    rec = rec
        .arg("a_type", args.alpha_type)
        .ptr("x", args.x.describe())
        .arg("b_type", args.x_type)
        .arg("incx", args.incx);
    if layout == BatchLayout::Strided {
        rec = rec.arg("stride_x", args.stride_x);
    }
    if layout != BatchLayout::Single {
        rec = rec.arg("batch_count", args.batch_count);
    }
    rec.arg("compute_type", args.execution_type)
}

fn scal_ex_template(handle: Option<&Handle>, args: &ScalExArgs, layout: BatchLayout) -> BlasResult<()> {
    let handle = handle.ok_or(BlasError::InvalidHandle)?;
    log_call(handle, &call_record(args, layout));
    if handle.is_device_memory_size_query() {
        handle.report_device_memory_size(0);
        return Ok(());
    }

    let batch_count = match layout {
        BatchLayout::Single => 1,
        _ => args.batch_count,
    };
    if args.n <= 0 || args.incx <= 0 || batch_count <= 0 {
        return Ok(());
    }

    use Datatype::*;
    match (args.alpha_type, args.x_type, args.execution_type) {
        (F16R, F16R, F16R) => scal_typed::<f16, f16, f16>(handle, args, layout, batch_count),
        (F16R, F16R, F32R) => scal_typed::<f16, f16, f32>(handle, args, layout, batch_count),
        (F32R, F16R, F32R) => scal_typed::<f32, f16, f32>(handle, args, layout, batch_count),
        (F32R, F32R, F32R) => scal_typed::<f32, f32, f32>(handle, args, layout, batch_count),
        (F64R, F64R, F64R) => scal_typed::<f64, f64, f64>(handle, args, layout, batch_count),
        (F32C, F32C, F32C) => scal_typed::<Complex32, Complex32, Complex32>(handle, args, layout, batch_count),
        (F64C, F64C, F64C) => scal_typed::<Complex64, Complex64, Complex64>(handle, args, layout, batch_count),
        (F32R, Bf16R, F32R) => scal_typed::<f32, bf16, f32>(handle, args, layout, batch_count),
        (Bf16R, Bf16R, F32R) => scal_typed::<bf16, bf16, f32>(handle, args, layout, batch_count),
        (a, x, ex) => Err(BlasError::NotImplemented(format!(
            "scal_ex with alpha={a} x={x} execution={ex}"
        ))),
    }
}

struct ScalJob<Ta> {
    n: usize,
    incx: usize,
    alpha: ScalarSource<Ta>,
    xs: Vec<DevicePtr>,
}

fn scal_typed<Ta, Tx, Tex>(handle: &Handle, args: &ScalExArgs, layout: BatchLayout, batch_count: i32) -> BlasResult<()>
where
    Ta: ComputeScalar + Convert<Tex>,
    Tx: DeviceElement + Convert<Tex>,
    Tex: ComputeScalar + Convert<Tx>,
{
    let routine = routine(layout);
    let n = args.n as usize;
    let incx = args.incx as usize;
    let alpha = scalar_source::<Ta>(handle, &args.alpha, "alpha")?;
    let xs = bind_vector::<Tx>(
        &args.x,
        layout,
        "x",
        vector_extent(n, args.incx)?,
        args.stride_x,
        batch_count as usize,
    )?;

    let extent = Extent::Vector { n, inc: incx };
    check_operand::<Tx>(handle, routine, "x", true, &xs, extent)?;

    let job = ScalJob { n, incx, alpha, xs: xs.clone() };
    handle
        .stream()
        .launch(KernelLaunch::new(routine, move || run::<Ta, Tx, Tex>(job)))?;

    check_operand::<Tx>(handle, routine, "x", false, &xs, extent)
}

fn run<Ta, Tx, Tex>(job: ScalJob<Ta>)
where
    Ta: ComputeScalar + Convert<Tex>,
    Tx: DeviceElement + Convert<Tex>,
    Tex: ComputeScalar + Convert<Tx>,
{
    let alpha: Tex = job.alpha.value().convert();
    for x in &job.xs {
        let base = x.as_mut_ptr::<Tx>();
        for i in 0..job.n {
            // Safety: bind_vector checked the extent of every batch pointer.
            unsafe {
                let p = base.add(i * job.incx);
                let v: Tex = std::ptr::read_unaligned(p).convert();
                std::ptr::write_unaligned(p, alpha.mul(v).convert());
            }
        }
    }
}
