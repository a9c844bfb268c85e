//! Level-1 routines: vector scaling and modified Givens rotation.
//!
//! Both follow the same call shape as GEMM: a public `Status`-returning
//! entry point per batch layout, layer logging, argument checks, optional
//! numerics scanning, and a single kernel launch on the handle's stream.

pub mod rotm;
pub mod scal_ex;

pub use rotm::{rotm, rotm_batched, rotm_strided_batched, RotmArgs, RotmFloat, RotmParam};
pub use scal_ex::{scal_batched_ex, scal_ex, scal_strided_batched_ex, ScalExArgs};

use crate::device::DevicePtr;
use crate::element::DeviceElement;
use crate::gemm::problem::BatchLayout;
use crate::status::{BlasError, BlasResult};

/// Where a vector operand lives.
#[derive(Debug, Clone)]
pub enum VectorAddr {
    /// One base pointer; batch `i` starts `i * stride` elements later.
    Base(DevicePtr),
    /// One pointer per batch member.
    PerBatch(Vec<DevicePtr>),
}

impl VectorAddr {
    pub fn describe(&self) -> String {
        match self {
            VectorAddr::Base(p) => p.to_string(),
            VectorAddr::PerBatch(list) => format!("[{} pointers]", list.len()),
        }
    }

    fn is_null(&self) -> bool {
        match self {
            VectorAddr::Base(p) => p.is_null(),
            VectorAddr::PerBatch(list) => list.is_empty(),
        }
    }
}

impl From<DevicePtr> for VectorAddr {
    fn from(p: DevicePtr) -> Self {
        VectorAddr::Base(p)
    }
}

impl From<Vec<DevicePtr>> for VectorAddr {
    fn from(list: Vec<DevicePtr>) -> Self {
        VectorAddr::PerBatch(list)
    }
}

/// Elements touched by `n` values spaced `|inc|` apart.
pub(crate) fn vector_extent(n: usize, inc: i32) -> BlasResult<usize> {
    if n == 0 {
        return Ok(0);
    }
    (n - 1)
        .checked_mul(inc.unsigned_abs() as usize)
        .and_then(|span| span.checked_add(1))
        .ok_or_else(|| BlasError::InvalidSize(format!("n = {n} with inc = {inc} overflows")))
}

/// Offset of logical element `i`; negative increments start at the far end.
#[inline(always)]
pub(crate) fn element_offset(i: usize, n: usize, inc: i32) -> usize {
    let step = inc.unsigned_abs() as usize;
    if inc < 0 {
        (n - 1 - i) * step
    } else {
        i * step
    }
}

/// Per-batch pointers of a vector operand, null- and bounds-checked.
pub(crate) fn bind_vector<T: DeviceElement>(
    addr: &VectorAddr,
    layout: BatchLayout,
    name: &str,
    extent: usize,
    stride: i64,
    batch_count: usize,
) -> BlasResult<Vec<DevicePtr>> {
    if addr.is_null() {
        return Err(BlasError::InvalidPointer(format!("{name} is null")));
    }
    let ptrs: Vec<DevicePtr> = match (addr, layout) {
        (VectorAddr::Base(base), BatchLayout::Single) => vec![base.clone()],
        (VectorAddr::Base(base), BatchLayout::Strided) => {
            let stride = usize::try_from(stride)
                .map_err(|_| BlasError::InvalidSize(format!("stride_{name} = {stride} is negative")))?;
            (0..batch_count)
                .map(|i| {
                    i.checked_mul(stride)
                        .map(|offset| base.add::<T>(offset))
                        .ok_or_else(|| BlasError::InvalidSize(format!("{name} batch {i} offset overflows")))
                })
                .collect::<BlasResult<_>>()?
        }
        (VectorAddr::PerBatch(list), BatchLayout::PointerArray) => {
            if list.len() < batch_count {
                return Err(BlasError::InvalidPointer(format!(
                    "{name} has {} pointers for batch_count {batch_count}",
                    list.len()
                )));
            }
            list[..batch_count].to_vec()
        }
        (VectorAddr::PerBatch(_), _) => {
            return Err(BlasError::InvalidPointer(format!("{name} is a pointer array for a non-batched call")))
        }
        (VectorAddr::Base(_), BatchLayout::PointerArray) => {
            return Err(BlasError::InvalidPointer(format!("{name} must be a pointer array")))
        }
    };

    let bytes = extent
        .checked_mul(std::mem::size_of::<T>())
        .filter(|&bytes| bytes <= isize::MAX as usize)
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
    Ok(ptrs)
}
