//! Two-phase solution list protocol.
//!
//! Phase 1: no list, `size` receives the number of solutions.
//! Phase 2: a list and its capacity in `size`; up to `min(size, list.len())`
//! indices are written and `size` is set to the number written.

use crate::status::{BlasError, BlasResult};

pub fn write_solutions(solutions: &[i32], list: Option<&mut [i32]>, size: Option<&mut i32>) -> BlasResult<()> {
    let size = size.ok_or_else(|| BlasError::InvalidPointer("size is null".into()))?;
    let total = i32::try_from(solutions.len()).unwrap_or(i32::MAX);
    match list {
        None => *size = total,
        Some(list) => {
            let capacity = usize::try_from(*size).unwrap_or(0).min(list.len());
            let written = capacity.min(solutions.len());
            list[..written].copy_from_slice(&solutions[..written]);
            *size = written as i32;
        }
    }
    Ok(())
}
