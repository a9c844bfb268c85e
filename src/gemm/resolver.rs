//! Decide which solution runs a problem.

use std::fmt;

use crate::gemm::catalog::{catalog, SolutionEntry};
use crate::gemm::problem::GemmProblem;
use crate::status::{BlasError, BlasResult};
use crate::types::GemmFlags;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Check the requested index; never leads to device work.
    ValidateOnly,
    /// Check the requested index, then dispatch.
    Execute,
    /// Dispatch a non-zero index without checking it against the problem.
    /// The index must still name a solution of the problem's precision.
    ExecuteUnchecked,
}

impl ResolveMode {
    pub fn from_flags(flags: GemmFlags) -> Self {
        if flags.contains(GemmFlags::CHECK_SOLUTION_INDEX) {
            ResolveMode::ValidateOnly
        } else if flags.contains(GemmFlags::SKIP_SOLUTION_CHECK) {
            ResolveMode::ExecuteUnchecked
        } else {
            ResolveMode::Execute
        }
    }
}

/// The outcome of resolution.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedSolution {
    requested: i32,
    entry: Option<&'static SolutionEntry>,
}

impl ResolvedSolution {
    /// Index the caller asked for; 0 for the default.
    pub fn requested_index(&self) -> i32 {
        self.requested
    }

    /// Index of the solution that runs; 0 for the reference kernel.
    pub fn index(&self) -> i32 {
        self.entry.map_or(0, |e| e.index)
    }

    pub fn entry(&self) -> Option<&'static SolutionEntry> {
        self.entry
    }

    pub fn is_default(&self) -> bool {
        self.requested == 0
    }

    pub fn kernel_name(&self) -> &str {
        self.entry.map_or(REFERENCE_KERNEL, |e| e.name.as_str())
    }

    /// `(mt0, mt1)` of the tiling the kernel uses.
    pub fn tile(&self) -> (usize, usize) {
        self.entry.map_or(REFERENCE_TILE, |e| (e.tile.mt0, e.tile.mt1))
    }

    pub fn global_split_u(&self) -> usize {
        self.entry.map_or(1, |e| e.global_split_u)
    }

    pub fn workspace_bytes(&self, p: &GemmProblem) -> usize {
        self.entry.map_or(0, |e| e.workspace_bytes(p))
    }
}

impl fmt::Display for ResolvedSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.index(), self.kernel_name())
    }
}

/// Kernel used when index 0 is requested and no catalog entry fits.
pub const REFERENCE_KERNEL: &str = "gemm_reference";
const REFERENCE_TILE: (usize, usize) = (32, 32);

/// Resolve `requested` for problem `p`.
///
/// Index 0 always resolves. A non-zero index must be one that
/// [`enumerate`](crate::gemm::catalog::SolutionCatalog::enumerate) lists for
/// `p`, except in [`ResolveMode::ExecuteUnchecked`].
pub fn resolve(p: &GemmProblem, requested: i32, mode: ResolveMode) -> BlasResult<ResolvedSolution> {
    let cat = catalog();
    if requested == 0 {
        let entry = cat.default_solution(p);
        log::debug!(
            "default solution for {p}: {}",
            entry.map_or(REFERENCE_KERNEL, |e| e.name.as_str())
        );
        return Ok(ResolvedSolution { requested, entry });
    }

    let invalid = || BlasError::InvalidSolutionIndex { index: requested };
    let entry = cat.entry(requested).ok_or_else(invalid)?;
    let accepted = match mode {
        ResolveMode::ExecuteUnchecked => entry.precision == p.precision,
        ResolveMode::ValidateOnly | ResolveMode::Execute => entry.supports(p),
    };
    if !accepted {
        log::debug!("solution {requested} rejected for {p} ({mode:?})");
        return Err(invalid());
    }
    Ok(ResolvedSolution { requested, entry: Some(entry) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DevicePtr;
    use crate::gemm::problem::{BatchLayout, GemmExArgs, MatrixArg};
    use crate::status::Status;
    use crate::types::{Datatype, Operation};

    fn problem(m: i32, n: i32, k: i32) -> GemmProblem {
        let args = GemmExArgs::new(Operation::None, Operation::Transpose, m, n, k)
            .a(MatrixArg::new(DevicePtr::null(), Datatype::F32R, m.max(1)))
            .b(MatrixArg::new(DevicePtr::null(), Datatype::F32R, n.max(1)))
            .c(MatrixArg::new(DevicePtr::null(), Datatype::F32R, m.max(1)))
            .d(MatrixArg::new(DevicePtr::null(), Datatype::F32R, m.max(1)));
        GemmProblem::new(&args, BatchLayout::Single).unwrap()
    }

    #[test]
    fn test_mode_from_flags() {
        assert_eq!(ResolveMode::from_flags(GemmFlags::NONE), ResolveMode::Execute);
        assert_eq!(ResolveMode::from_flags(GemmFlags::CHECK_SOLUTION_INDEX), ResolveMode::ValidateOnly);
        assert_eq!(ResolveMode::from_flags(GemmFlags::SKIP_SOLUTION_CHECK), ResolveMode::ExecuteUnchecked);
        assert_eq!(
            ResolveMode::from_flags(GemmFlags::SKIP_SOLUTION_CHECK | GemmFlags::CHECK_SOLUTION_INDEX),
            ResolveMode::ValidateOnly
        );
    }

    #[test]
    fn test_enumerated_indices_validate() {
        let p = problem(1023, 1024, 1025);
        for idx in catalog().enumerate(&p) {
            let r = resolve(&p, idx, ResolveMode::ValidateOnly).unwrap();
            assert_eq!(r.index(), idx);
            assert!(!r.is_default());
        }
    }

    #[test]
    fn test_foreign_index_is_invalid() {
        let p = problem(1023, 1024, 1025);
        let err = resolve(&p, 12, ResolveMode::Execute).unwrap_err();
        assert!(matches!(err, BlasError::InvalidSolutionIndex { index: 12 }));
        assert_eq!(err.status(), Status::InvalidValue);
        assert!(resolve(&p, -1, ResolveMode::ValidateOnly).is_err());
        assert!(resolve(&p, i32::MAX, ResolveMode::ExecuteUnchecked).is_err());
    }

    #[test]
    fn test_unchecked_only_requires_matching_precision() {
        let p = problem(1023, 1024, 1025);
        // An exact-tile f32 NN solution does not fit, but has the right precision.
        let nn_exact = catalog()
            .entries()
            .iter()
            .find(|e| e.precision == p.precision && e.exact_tile && e.trans_b == Operation::None)
            .unwrap();
        assert!(resolve(&p, nn_exact.index, ResolveMode::Execute).is_err());
        assert!(resolve(&p, nn_exact.index, ResolveMode::ExecuteUnchecked).is_ok());
        // Index 12 is an f64 solution.
        assert!(resolve(&p, 12, ResolveMode::ExecuteUnchecked).is_err());
    }

    #[test]
    fn test_default_always_resolves() {
        for p in [problem(0, 4, 4), problem(4, 4, 0), problem(1, 1, 1), problem(77, 3, 5000)] {
            let r = resolve(&p, 0, ResolveMode::Execute).unwrap();
            assert!(r.is_default());
            if let Some(e) = r.entry() {
                assert!(e.supports(&p));
            }
        }
    }

    #[test]
    fn test_degenerate_problem_still_validates_enumerated() {
        let p = problem(0, 16, 16);
        let found = catalog().enumerate(&p);
        assert!(!found.is_empty());
        for idx in found {
            assert!(resolve(&p, idx, ResolveMode::ValidateOnly).is_ok());
        }
    }
}
