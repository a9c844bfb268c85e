//! NaN/Inf scanning of operands, driven by the handle's check-numerics mode.

use crate::device::DevicePtr;
use crate::element::DeviceElement;
use crate::handle::Handle;
use crate::status::{BlasError, BlasResult};
use crate::types::CheckNumericsMode;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NumericsReport {
    pub has_nan: bool,
    pub has_inf: bool,
    pub has_zero: bool,
}

impl NumericsReport {
    pub fn is_clean(&self) -> bool {
        !self.has_nan && !self.has_inf
    }

    fn merge(&mut self, other: NumericsReport) {
        self.has_nan |= other.has_nan;
        self.has_inf |= other.has_inf;
        self.has_zero |= other.has_zero;
    }

    fn observe<T: DeviceElement>(&mut self, v: T) {
        self.has_nan |= v.is_nan();
        self.has_inf |= v.is_inf();
        self.has_zero |= v.is_zero();
    }
}

/// Scan a column-major `rows x cols` matrix with leading dimension `ld`.
pub fn scan_matrix<T: DeviceElement>(
    ptr: &DevicePtr,
    rows: usize,
    cols: usize,
    ld: usize,
) -> BlasResult<NumericsReport> {
    let mut report = NumericsReport::default();
    if rows == 0 || cols == 0 {
        return Ok(report);
    }
    let extent = ld * (cols - 1) + rows;
    ensure_extent::<T>(ptr, extent)?;
    for j in 0..cols {
        for i in 0..rows {
            if let Some(v) = ptr.add::<T>(i + j * ld).read::<T>() {
                report.observe(v);
            }
        }
    }
    Ok(report)
}

/// Scan `n` elements spaced `inc` apart.
pub fn scan_vector<T: DeviceElement>(ptr: &DevicePtr, n: usize, inc: usize) -> BlasResult<NumericsReport> {
    let mut report = NumericsReport::default();
    if n == 0 {
        return Ok(report);
    }
    ensure_extent::<T>(ptr, (n - 1) * inc + 1)?;
    for i in 0..n {
        if let Some(v) = ptr.add::<T>(i * inc).read::<T>() {
            report.observe(v);
        }
    }
    Ok(report)
}

fn ensure_extent<T: DeviceElement>(ptr: &DevicePtr, elements: usize) -> BlasResult<()> {
    if ptr.available_bytes() < elements.saturating_mul(std::mem::size_of::<T>()) {
        return Err(BlasError::InvalidPointer(format!(
            "{ptr} does not hold {elements} elements of {}",
            T::DATATYPE
        )));
    }
    Ok(())
}

/// Shape of an operand to scan.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Extent {
    Matrix { rows: usize, cols: usize, ld: usize },
    Vector { n: usize, inc: usize },
}

pub(crate) fn check_operand<T: DeviceElement>(
    handle: &Handle,
    routine: &str,
    operand: &str,
    is_input: bool,
    ptrs: &[DevicePtr],
    extent: Extent,
) -> BlasResult<()> {
    let mode = handle.check_numerics();
    if mode.is_empty() {
        return Ok(());
    }
    handle.synchronize()?;

    let mut report = NumericsReport::default();
    for ptr in ptrs.iter().filter(|p| !p.is_null()) {
        let r = match extent {
            Extent::Matrix { rows, cols, ld } => scan_matrix::<T>(ptr, rows, cols, ld)?,
            Extent::Vector { n, inc } => scan_vector::<T>(ptr, n, inc)?,
        };
        report.merge(r);
    }

    let direction = if is_input { "input" } else { "output" };
    if mode.contains(CheckNumericsMode::INFO) {
        log::info!(
            "{routine}: {direction} {operand}: has_nan={} has_inf={} has_zero={}",
            report.has_nan,
            report.has_inf,
            report.has_zero
        );
    }
    if report.is_clean() {
        return Ok(());
    }
    if mode.contains(CheckNumericsMode::WARN) {
        log::warn!("{routine}: {direction} {operand} contains NaN or Inf");
    }
    if mode.contains(CheckNumericsMode::FAIL) {
        return Err(BlasError::CheckNumerics {
            routine: routine.to_string(),
            detail: format!(
                "{direction} {operand} has_nan={} has_inf={}",
                report.has_nan, report.has_inf
            ),
        });
    }
    Ok(())
}
