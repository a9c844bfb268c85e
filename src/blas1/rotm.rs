//! Modified Givens rotation.
//!
//! `param = [flag, h11, h21, h12, h22]` describes the 2x2 matrix `H`
//! applied to each pair `(x_i, y_i)`:
//!
//! | flag | H                              |
//! |------|--------------------------------|
//! | -2   | identity (nothing to do)       |
//! | -1   | `[[h11, h12], [h21, h22]]`     |
//! |  0   | `[[1, h12], [h21, 1]]`         |
//! |  1   | `[[h11, 1], [-1, h22]]`        |

use crate::blas1::{bind_vector, element_offset, vector_extent, VectorAddr};
use crate::check_numerics::{check_operand, Extent};
use crate::device::{DevicePtr, KernelLaunch};
use crate::element::ComputeScalar;
use crate::gemm::problem::BatchLayout;
use crate::handle::Handle;
use crate::logging::{log_call, CallRecord};
use crate::status::{guard, BlasError, BlasResult, Status};
use crate::types::PointerMode;

/// Real types `rotm` is defined for.
pub trait RotmFloat: ComputeScalar + PartialOrd {
    fn neg(self) -> Self;
    fn from_flag(flag: i8) -> Self;
}

impl RotmFloat for f32 {
    fn neg(self) -> Self {
        -self
    }
    fn from_flag(flag: i8) -> Self {
        f32::from(flag)
    }
}

impl RotmFloat for f64 {
    fn neg(self) -> Self {
        -self
    }
    fn from_flag(flag: i8) -> Self {
        f64::from(flag)
    }
}

/// The rotation parameters.
#[derive(Debug, Clone)]
pub enum RotmParam<T> {
    /// One parameter vector shared by every batch member. Host pointer mode.
    Host([T; 5]),
    /// Five-element device vectors, per batch member. Device pointer mode.
    Device(VectorAddr),
}

#[derive(Debug, Clone)]
pub struct RotmArgs<T> {
    pub n: i32,
    pub x: VectorAddr,
    pub incx: i32,
    pub stride_x: i64,
    pub y: VectorAddr,
    pub incy: i32,
    pub stride_y: i64,
    pub param: RotmParam<T>,
    pub stride_param: i64,
    pub batch_count: i32,
}

impl<T: RotmFloat> RotmArgs<T> {
    pub fn new(
        n: i32,
        x: impl Into<VectorAddr>,
        incx: i32,
        y: impl Into<VectorAddr>,
        incy: i32,
        param: RotmParam<T>,
    ) -> Self {
        Self {
            n,
            x: x.into(),
            incx,
            stride_x: 0,
            y: y.into(),
            incy,
            stride_y: 0,
            param,
            stride_param: 0,
            batch_count: 1,
        }
    }

    pub fn strides(mut self, stride_x: i64, stride_y: i64, stride_param: i64) -> Self {
        self.stride_x = stride_x;
        self.stride_y = stride_y;
        self.stride_param = stride_param;
        self
    }

    pub fn batch_count(mut self, batch_count: i32) -> Self {
        self.batch_count = batch_count;
        self
    }
}

pub fn rotm<T: RotmFloat>(handle: Option<&Handle>, args: &RotmArgs<T>) -> Status {
    guard("rotm", || rotm_template(handle, args, BatchLayout::Single))
}

pub fn rotm_batched<T: RotmFloat>(handle: Option<&Handle>, args: &RotmArgs<T>) -> Status {
    guard("rotm_batched", || rotm_template(handle, args, BatchLayout::PointerArray))
}

pub fn rotm_strided_batched<T: RotmFloat>(handle: Option<&Handle>, args: &RotmArgs<T>) -> Status {
    guard("rotm_strided_batched", || rotm_template(handle, args, BatchLayout::Strided))
}

fn routine(layout: BatchLayout) -> &'static str {
    match layout {
        BatchLayout::Single => "rotm",
        BatchLayout::Strided => "rotm_strided_batched",
        BatchLayout::PointerArray => "rotm_batched",
    }
}

fn call_record<T: RotmFloat>(args: &RotmArgs<T>, layout: BatchLayout) -> CallRecord {
    let strided = layout == BatchLayout::Strided;
    let mut rec = CallRecord::new(routine(layout))
        .arg("r", T::DATATYPE)
        .arg("n", args.n)
        .ptr("x", args.x.describe())
        .arg("incx", args.incx);
    if strided {
        rec = rec.arg("stride_x", args.stride_x);
    }
    rec = rec.ptr("y", args.y.describe()).arg("incy", args.incy);
    if strided {
        rec = rec.arg("stride_y", args.stride_y);
    }
    rec = match &args.param {
        RotmParam::Host(p) => rec.ptr("param", format!("{p:?}")),
        RotmParam::Device(addr) => rec.ptr("param", addr.describe()),
    };
    if strided {
        rec = rec.arg("stride_param", args.stride_param);
    }
    if layout != BatchLayout::Single {
        rec = rec.arg("batch_count", args.batch_count);
    }
    rec
}

fn rotm_template<T: RotmFloat>(handle: Option<&Handle>, args: &RotmArgs<T>, layout: BatchLayout) -> BlasResult<()> {
    let handle = handle.ok_or(BlasError::InvalidHandle)?;
    log_call(handle, &call_record(args, layout));
    if handle.is_device_memory_size_query() {
        handle.report_device_memory_size(0);
        return Ok(());
    }
    let routine = routine(layout);

    let batch_count = match layout {
        BatchLayout::Single => 1,
        _ => args.batch_count,
    };
    if args.n <= 0 || batch_count <= 0 {
        return Ok(());
    }
    let n = args.n as usize;
    let batches = batch_count as usize;

    let params = match (&args.param, handle.pointer_mode()) {
        (RotmParam::Host(p), PointerMode::Host) => {
            if p[0] == T::from_flag(-2) {
                return Ok(());
            }
            ParamSource::Host(*p)
        }
        (RotmParam::Device(addr), PointerMode::Device) => {
            ParamSource::Device(bind_vector::<T>(addr, layout, "param", 5, args.stride_param, batches)?)
        }
        (_, mode) => {
            return Err(BlasError::InvalidValue(format!("param does not match pointer mode {mode:?}")))
        }
    };

    let xs = bind_vector::<T>(&args.x, layout, "x", vector_extent(n, args.incx)?, args.stride_x, batches)?;
    let ys = bind_vector::<T>(&args.y, layout, "y", vector_extent(n, args.incy)?, args.stride_y, batches)?;

    let x_extent = Extent::Vector { n, inc: args.incx.unsigned_abs() as usize };
    let y_extent = Extent::Vector { n, inc: args.incy.unsigned_abs() as usize };
    check_operand::<T>(handle, routine, "x", true, &xs, x_extent)?;
    check_operand::<T>(handle, routine, "y", true, &ys, y_extent)?;

    let job = RotmJob {
        n,
        incx: args.incx,
        incy: args.incy,
        xs: xs.clone(),
        ys: ys.clone(),
        params,
    };
    handle.stream().launch(KernelLaunch::new(routine, move || run(job)))?;

    check_operand::<T>(handle, routine, "x", false, &xs, x_extent)?;
    check_operand::<T>(handle, routine, "y", false, &ys, y_extent)
}

enum ParamSource<T> {
    Host([T; 5]),
    Device(Vec<DevicePtr>),
}

struct RotmJob<T> {
    n: usize,
    incx: i32,
    incy: i32,
    xs: Vec<DevicePtr>,
    ys: Vec<DevicePtr>,
    params: ParamSource<T>,
}

fn run<T: RotmFloat>(job: RotmJob<T>) {
    for (b, (x, y)) in job.xs.iter().zip(&job.ys).enumerate() {
        let param = match &job.params {
            ParamSource::Host(p) => *p,
            ParamSource::Device(ptrs) => {
                let mut p = [T::zero(); 5];
                for (k, slot) in p.iter_mut().enumerate() {
                    *slot = ptrs[b].add::<T>(k).read::<T>().unwrap_or_else(T::zero);
                }
                p
            }
        };
        let flag = param[0];
        if flag == T::from_flag(-2) {
            continue;
        }
        let (h11, h21, h12, h22) = if flag < T::zero() {
            (param[1], param[2], param[3], param[4])
        } else if flag == T::zero() {
            (T::one(), param[2], param[3], T::one())
        } else {
            (param[1], T::one().neg(), T::one(), param[4])
        };

        let xp = x.as_mut_ptr::<T>();
        let yp = y.as_mut_ptr::<T>();
        for i in 0..job.n {
            // Safety: both extents were checked by bind_vector.
            unsafe {
                let px = xp.add(element_offset(i, job.n, job.incx));
                let py = yp.add(element_offset(i, job.n, job.incy));
                let w = std::ptr::read_unaligned(px);
                let z = std::ptr::read_unaligned(py);
                std::ptr::write_unaligned(px, h11.mul(w).add(h12.mul(z)));
                std::ptr::write_unaligned(py, h21.mul(w).add(h22.mul(z)));
            }
        }
    }
}
