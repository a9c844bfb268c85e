//! Empirical solution selection for a fixed GEMM problem.
//!
//! A [`Tuner`] enumerates the catalog once for the problem, resolves and
//! dispatches every candidate through the ordinary resolver and dispatch
//! path, and keeps the fastest. Results can be persisted in a
//! [`WisdomDb`] so later runs on the same device skip the benchmark.
//!
//! ```rust,no_run
//! use gblas::gemm::{GemmExArgs, MatrixArg};
//! use gblas::tuning::{TuneConfig, Tuner};
//! use gblas::types::{Datatype, Operation};
//! use gblas::Handle;
//!
//! let handle = Handle::host();
//! let a = handle.upload(&vec![1.0f32; 64 * 256]).unwrap();
//! let b = handle.upload(&vec![1.0f32; 64 * 256]).unwrap();
//! let c = handle.alloc::<f32>(64 * 64).unwrap();
//! let args = GemmExArgs::new(Operation::None, Operation::Transpose, 64, 64, 256)
//!     .a(MatrixArg::new(a.ptr(), Datatype::F32R, 64))
//!     .b(MatrixArg::new(b.ptr(), Datatype::F32R, 64))
//!     .c_in_place(MatrixArg::new(c.ptr(), Datatype::F32R, 64));
//! let report = Tuner::new(&handle, TuneConfig::default()).tune_gemm_ex(&args).unwrap();
//! println!("{report}");
//! ```

pub mod measure;
pub mod wisdom;

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

pub use measure::{time_calls, TuneConfig, Timing};
pub use wisdom::{WisdomDb, WisdomEntry, WisdomError};

use crate::gemm::catalog::catalog;
use crate::gemm::dispatch;
use crate::gemm::problem::{BatchLayout, GemmExArgs, GemmProblem};
use crate::gemm::resolver::{resolve, ResolveMode};
use crate::handle::Handle;
use crate::status::{panic_message, BlasError, BlasResult, Status};

/// Measurement of one candidate that ran.
#[derive(Debug, Clone)]
pub struct SolutionTiming {
    pub solution: i32,
    pub kernel: String,
    pub timing: Timing,
}

/// A candidate that could not be resolved or run.
#[derive(Debug, Clone)]
pub struct Rejection {
    pub solution: i32,
    pub status: Status,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct TuneReport {
    pub problem: String,
    pub best_solution: i32,
    pub best_kernel: String,
    /// Minimum over the timed calls of the best solution.
    pub best_time_us: f64,
    /// Candidates in enumeration order.
    pub timings: Vec<SolutionTiming>,
    pub rejected: Vec<Rejection>,
    pub from_wisdom: bool,
}

impl fmt::Display for TuneReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "tuning {}", self.problem)?;
        if self.from_wisdom {
            return write!(
                f,
                "  best: {} ({}) {:.1}us [from wisdom]",
                self.best_solution, self.best_kernel, self.best_time_us
            );
        }
        for t in &self.timings {
            let marker = if t.solution == self.best_solution { " *" } else { "" };
            writeln!(f, "  {:>5} {:<48} {}{marker}", t.solution, t.kernel, t.timing)?;
        }
        for r in &self.rejected {
            writeln!(f, "  {:>5} rejected: {} ({})", r.solution, r.status, r.reason)?;
        }
        write!(
            f,
            "  best: {} ({}) {:.1}us",
            self.best_solution, self.best_kernel, self.best_time_us
        )
    }
}

pub struct Tuner<'h> {
    handle: &'h Handle,
    config: TuneConfig,
    wisdom: Option<WisdomDb>,
}

impl<'h> Tuner<'h> {
    pub fn new(handle: &'h Handle, config: TuneConfig) -> Self {
        Tuner {
            handle,
            config,
            wisdom: None,
        }
    }

    /// Consult and update `db`.
    pub fn with_wisdom(mut self, db: WisdomDb) -> Self {
        self.wisdom = Some(db);
        self
    }

    pub fn wisdom(&self) -> Option<&WisdomDb> {
        self.wisdom.as_ref()
    }

    pub fn into_wisdom(self) -> Option<WisdomDb> {
        self.wisdom
    }

    /// Key under which results for this handle's device are stored.
    pub fn fingerprint(&self) -> String {
        self.handle.stream().kind()
    }

    pub fn tune_gemm_ex(&mut self, args: &GemmExArgs) -> BlasResult<TuneReport> {
        self.tune(args, BatchLayout::Single)
    }

    pub fn tune_gemm_strided_batched_ex(&mut self, args: &GemmExArgs) -> BlasResult<TuneReport> {
        self.tune(args, BatchLayout::Strided)
    }

    pub fn tune_gemm_batched_ex(&mut self, args: &GemmExArgs) -> BlasResult<TuneReport> {
        self.tune(args, BatchLayout::PointerArray)
    }

    /// Benchmark every solution enumerated for `args` and return the
    /// fastest. A later candidate replaces the best only when strictly
    /// faster. When nothing is enumerated the default (index 0) is timed.
    pub fn tune(&mut self, args: &GemmExArgs, layout: BatchLayout) -> BlasResult<TuneReport> {
        let problem = GemmProblem::new(args, layout)?;
        let key = problem_key(&problem);
        let fingerprint = self.fingerprint();

        if let Some(report) = self.from_wisdom(&fingerprint, &key, &problem) {
            return Ok(report);
        }

        let mut candidates = catalog().enumerate(&problem);
        if candidates.is_empty() {
            candidates.push(0);
        }
        log::info!("tuning {key}: {} candidates", candidates.len());

        let mut timings = Vec::new();
        let mut rejected = Vec::new();
        let mut first_error = None;
        let mut best: Option<(i32, String, f64)> = None;

        for index in candidates {
            let outcome = run_candidate(index, || {
                let solution = resolve(&problem, index, ResolveMode::Execute)?;
                let timing = time_calls(self.handle, &self.config, || {
                    dispatch::execute(self.handle, &problem, &solution, args)
                })?;
                Ok((solution.kernel_name().to_string(), timing))
            });
            match outcome {
                Ok((kernel, timing)) => {
                    log::debug!("solution {index} ({kernel}): {timing}");
                    if best.as_ref().map_or(true, |(_, _, t)| timing.min_us < *t) {
                        best = Some((index, kernel.clone(), timing.min_us));
                    }
                    timings.push(SolutionTiming { solution: index, kernel, timing });
                }
                Err(e) => {
                    log::warn!("solution {index} rejected for {key}: {e}");
                    rejected.push(Rejection {
                        solution: index,
                        status: e.status(),
                        reason: e.to_string(),
                    });
                    first_error.get_or_insert(e);
                }
            }
        }

        let Some((best_solution, best_kernel, best_time_us)) = best else {
            return Err(first_error.unwrap_or_else(|| BlasError::Internal(format!("no solution ran for {key}"))));
        };

        if let Some(db) = self.wisdom.as_mut() {
            db.put(&fingerprint, &key, best_solution, &best_kernel, best_time_us);
            if let Err(e) = db.save() {
                log::warn!("failed to save wisdom to {}: {e}", db.path().display());
            }
        }

        Ok(TuneReport {
            problem: key,
            best_solution,
            best_kernel,
            best_time_us,
            timings,
            rejected,
            from_wisdom: false,
        })
    }

    fn from_wisdom(&self, fingerprint: &str, key: &str, problem: &GemmProblem) -> Option<TuneReport> {
        let entry = self.wisdom.as_ref()?.get(fingerprint, key)?;
        if let Err(e) = resolve(problem, entry.solution, ResolveMode::ValidateOnly) {
            log::warn!("stale wisdom for {key}: {e}");
            return None;
        }
        log::info!("tuning {key}: solution {} from wisdom", entry.solution);
        Some(TuneReport {
            problem: key.to_string(),
            best_solution: entry.solution,
            best_kernel: entry.kernel.clone(),
            best_time_us: entry.best_time_us,
            timings: Vec::new(),
            rejected: Vec::new(),
            from_wisdom: true,
        })
    }
}

/// Wisdom key: routine plus everything that affects enumeration.
pub fn problem_key(problem: &GemmProblem) -> String {
    format!("{} {problem} flags={}", problem.layout.routine(), problem.flags)
}

/// Run one candidate; a panic rejects the candidate instead of unwinding
/// out of the tuner.
fn run_candidate<T>(index: i32, f: impl FnOnce() -> BlasResult<T>) -> BlasResult<T> {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        Err(BlasError::Internal(format!("solution {index} panicked: {}", panic_message(&*payload))))
    })
}
