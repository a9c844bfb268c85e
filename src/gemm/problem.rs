//! GEMM call arguments and the validated problem descriptor.
//!
//! [`GemmExArgs`] carries the raw, caller-supplied values of one call and is
//! passed by reference through every layer. [`GemmProblem`] is the
//! normalised, validated key derived from it: sizes as `usize`, conjugate
//! transpose folded into transpose for real types, and the type tags folded
//! into a [`Precision`]. Enumeration and resolution only ever look at the
//! problem; pointers and scalar values stay on the args.

use std::fmt;

use crate::device::DevicePtr;
use crate::gemm::precision::Precision;
use crate::status::{BlasError, BlasResult};
use crate::types::{Datatype, GemmAlgo, GemmFlags, Operation, Scalar, ScalarArg};

/// How the batch members of each operand are addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchLayout {
    /// One problem, `batch_count` and strides ignored.
    Single,
    /// `base + i * stride` for `i` in `0..batch_count`.
    Strided,
    /// One pointer per batch member.
    PointerArray,
}

impl BatchLayout {
    pub fn routine(self) -> &'static str {
        match self {
            BatchLayout::Single => "gemm_ex",
            BatchLayout::Strided => "gemm_strided_batched_ex",
            BatchLayout::PointerArray => "gemm_batched_ex",
        }
    }
}

/// Device address of a matrix operand.
#[derive(Debug, Clone)]
pub enum MatrixAddr {
    Base(DevicePtr),
    PerBatch(Vec<DevicePtr>),
}

/// A matrix operand as passed by the caller.
#[derive(Debug, Clone)]
pub struct MatrixArg {
    pub addr: MatrixAddr,
    pub datatype: Datatype,
    pub ld: i32,
    /// Elements between consecutive batch members (strided calls only).
    pub stride: i64,
}

impl MatrixArg {
    pub fn new(ptr: DevicePtr, datatype: Datatype, ld: i32) -> Self {
        Self::strided(ptr, datatype, ld, 0)
    }

    pub fn strided(ptr: DevicePtr, datatype: Datatype, ld: i32, stride: i64) -> Self {
        Self { addr: MatrixAddr::Base(ptr), datatype, ld, stride }
    }

    pub fn batched(ptrs: Vec<DevicePtr>, datatype: Datatype, ld: i32) -> Self {
        Self { addr: MatrixAddr::PerBatch(ptrs), datatype, ld, stride: 0 }
    }

    pub(crate) fn describe(&self) -> String {
        match &self.addr {
            MatrixAddr::Base(p) => p.to_string(),
            MatrixAddr::PerBatch(ptrs) => format!("[{} pointers]", ptrs.len()),
        }
    }
}

impl Default for MatrixArg {
    fn default() -> Self {
        Self::new(DevicePtr::null(), Datatype::F32R, 0)
    }
}

/// Arguments of one `gemm_*_ex` call: `D = alpha * op(A) * op(B) + beta * C`.
#[derive(Debug, Clone)]
pub struct GemmExArgs {
    pub trans_a: Operation,
    pub trans_b: Operation,
    pub m: i32,
    pub n: i32,
    pub k: i32,
    pub alpha: ScalarArg,
    pub a: MatrixArg,
    pub b: MatrixArg,
    pub beta: ScalarArg,
    pub c: MatrixArg,
    pub d: MatrixArg,
    pub batch_count: i32,
    pub compute_type: Datatype,
    pub algo: GemmAlgo,
    pub solution_index: i32,
    pub flags: GemmFlags,
}

impl GemmExArgs {
    /// f32 defaults: `alpha = 1`, `beta = 0`, one batch, default solution.
    pub fn new(trans_a: Operation, trans_b: Operation, m: i32, n: i32, k: i32) -> Self {
        Self {
            trans_a,
            trans_b,
            m,
            n,
            k,
            alpha: ScalarArg::Host(Scalar::F32(1.0)),
            a: MatrixArg::default(),
            b: MatrixArg::default(),
            beta: ScalarArg::Host(Scalar::F32(0.0)),
            c: MatrixArg::default(),
            d: MatrixArg::default(),
            batch_count: 1,
            compute_type: Datatype::F32R,
            algo: GemmAlgo::Standard,
            solution_index: 0,
            flags: GemmFlags::NONE,
        }
    }

    pub fn alpha(mut self, alpha: impl Into<ScalarArg>) -> Self {
        self.alpha = alpha.into();
        self
    }

    pub fn beta(mut self, beta: impl Into<ScalarArg>) -> Self {
        self.beta = beta.into();
        self
    }

    pub fn a(mut self, a: MatrixArg) -> Self {
        self.a = a;
        self
    }

    pub fn b(mut self, b: MatrixArg) -> Self {
        self.b = b;
        self
    }

    pub fn c(mut self, c: MatrixArg) -> Self {
        self.c = c;
        self
    }

    pub fn d(mut self, d: MatrixArg) -> Self {
        self.d = d;
        self
    }

    /// Use the same operand for C and D (in-place update).
    pub fn c_in_place(mut self, c: MatrixArg) -> Self {
        self.d = c.clone();
        self.c = c;
        self
    }

    pub fn compute_type(mut self, compute_type: Datatype) -> Self {
        self.compute_type = compute_type;
        self
    }

    pub fn batch_count(mut self, batch_count: i32) -> Self {
        self.batch_count = batch_count;
        self
    }

    pub fn solution_index(mut self, index: i32) -> Self {
        self.solution_index = index;
        self
    }

    pub fn flags(mut self, flags: GemmFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// Validated, canonical GEMM problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GemmProblem {
    pub trans_a: Operation,
    pub trans_b: Operation,
    pub m: usize,
    pub n: usize,
    pub k: usize,
    pub lda: usize,
    pub ldb: usize,
    pub ldc: usize,
    pub ldd: usize,
    pub stride_a: usize,
    pub stride_b: usize,
    pub stride_c: usize,
    pub stride_d: usize,
    pub batch_count: usize,
    pub precision: Precision,
    pub layout: BatchLayout,
    pub flags: GemmFlags,
}

impl GemmProblem {
    /// Validate `args` for a call with the given batch layout.
    pub fn new(args: &GemmExArgs, layout: BatchLayout) -> BlasResult<Self> {
        let precision = Precision::from_types(
            args.a.datatype,
            args.b.datatype,
            args.c.datatype,
            args.d.datatype,
            args.compute_type,
        )?;

        let m = non_negative("m", args.m)?;
        let n = non_negative("n", args.n)?;
        let k = non_negative("k", args.k)?;
        let batch_count = match layout {
            BatchLayout::Single => 1,
            _ => non_negative("batch_count", args.batch_count)?,
        };

        let (trans_a, trans_b) = if precision.is_complex() {
            (args.trans_a, args.trans_b)
        } else {
            (canonical(args.trans_a), canonical(args.trans_b))
        };

        let (a_rows, _) = stored_dims(trans_a, m, k);
        let (b_rows, _) = stored_dims(trans_b, k, n);
        let lda = leading_dim("lda", args.a.ld, a_rows)?;
        let ldb = leading_dim("ldb", args.b.ld, b_rows)?;
        let ldc = leading_dim("ldc", args.c.ld, m)?;
        let ldd = leading_dim("ldd", args.d.ld, m)?;

        let strides = match layout {
            BatchLayout::Strided => [
                stride("stride_a", args.a.stride)?,
                stride("stride_b", args.b.stride)?,
                stride("stride_c", args.c.stride)?,
                stride("stride_d", args.d.stride)?,
            ],
            _ => [0; 4],
        };

        let problem = GemmProblem {
            trans_a,
            trans_b,
            m,
            n,
            k,
            lda,
            ldb,
            ldc,
            ldd,
            stride_a: strides[0],
            stride_b: strides[1],
            stride_c: strides[2],
            stride_d: strides[3],
            batch_count,
            precision,
            layout,
            flags: args.flags,
        };
        problem.check_spans()?;
        problem.check_strides()?;
        problem.check_int8x4()?;
        Ok(problem)
    }

    /// No work to do: any of m, n, k or batch_count is zero.
    pub fn is_degenerate(&self) -> bool {
        self.m == 0 || self.n == 0 || self.k == 0 || self.batch_count == 0
    }

    pub fn packed_int8x4(&self) -> bool {
        self.precision == Precision::I8I32 && self.flags.contains(GemmFlags::PACK_INT8X4)
    }

    /// Stored (rows, cols) of A, B, C and D.
    pub fn a_dims(&self) -> (usize, usize) {
        stored_dims(self.trans_a, self.m, self.k)
    }

    pub fn b_dims(&self) -> (usize, usize) {
        stored_dims(self.trans_b, self.k, self.n)
    }

    /// Elements spanned by one batch member of A, B and C/D.
    pub fn a_extent(&self) -> usize {
        let (rows, cols) = self.a_dims();
        extent(rows, cols, self.lda)
    }

    pub fn b_extent(&self) -> usize {
        let (rows, cols) = self.b_dims();
        extent(rows, cols, self.ldb)
    }

    pub fn c_extent(&self) -> usize {
        extent(self.m, self.n, self.ldc)
    }

    pub fn d_extent(&self) -> usize {
        extent(self.m, self.n, self.ldd)
    }

    pub fn flops(&self) -> u64 {
        let per_batch = 2 * self.m as u64 * self.n as u64 * self.k as u64;
        per_batch * self.batch_count as u64
    }

    /// Every operand, across all batch members, must be addressable in bytes.
    fn check_spans(&self) -> BlasResult<()> {
        let (in_size, out_size) = (self.precision.input_type().size_bytes(), self.precision.output_type().size_bytes());
        let (a_rows, a_cols) = self.a_dims();
        let (b_rows, b_cols) = self.b_dims();
        let operands = [
            ("A", a_rows, a_cols, self.lda, self.stride_a, in_size),
            ("B", b_rows, b_cols, self.ldb, self.stride_b, in_size),
            ("C", self.m, self.n, self.ldc, self.stride_c, out_size),
            ("D", self.m, self.n, self.ldd, self.stride_d, out_size),
        ];
        for (name, rows, cols, ld, stride, size) in operands {
            let span = checked_extent(rows, cols, ld).and_then(|extent| {
                if self.layout == BatchLayout::Strided && self.batch_count > 1 {
                    stride.checked_mul(self.batch_count - 1)?.checked_add(extent)
                } else {
                    Some(extent)
                }
            });
            match span.and_then(|elements| elements.checked_mul(size)) {
                Some(bytes) if bytes <= isize::MAX as usize => {}
                _ => {
                    return Err(BlasError::InvalidSize(format!(
                        "{name} ({rows}x{cols}, ld {ld}, batch {}) exceeds the addressable range",
                        self.batch_count
                    )))
                }
            }
        }
        Ok(())
    }

    fn check_strides(&self) -> BlasResult<()> {
        if self.layout != BatchLayout::Strided || self.batch_count <= 1 {
            return Ok(());
        }
        let operands = [
            ("stride_a", self.stride_a, self.a_extent()),
            ("stride_b", self.stride_b, self.b_extent()),
            ("stride_c", self.stride_c, self.c_extent()),
            ("stride_d", self.stride_d, self.d_extent()),
        ];
        for (name, stride, span) in operands {
            if stride == 0 {
                if self.flags.contains(GemmFlags::STRICT_BATCH_STRIDE) {
                    return Err(BlasError::InvalidSize(format!(
                        "{name} is 0 with batch_count {} and STRICT_BATCH_STRIDE set",
                        self.batch_count
                    )));
                }
                continue;
            }
            if stride < span {
                return Err(BlasError::InvalidSize(format!(
                    "{name} {stride} is smaller than the matrix extent {span}"
                )));
            }
        }
        Ok(())
    }

    fn check_int8x4(&self) -> BlasResult<()> {
        if !self.packed_int8x4() {
            return Ok(());
        }
        if self.k % 4 != 0 {
            return Err(BlasError::InvalidSize(format!("int8x4 requires k % 4 == 0, got k={}", self.k)));
        }
        if self.trans_a != Operation::None && self.lda % 4 != 0 {
            return Err(BlasError::InvalidSize(format!("int8x4 requires lda % 4 == 0, got {}", self.lda)));
        }
        if self.trans_b == Operation::None && self.ldb % 4 != 0 {
            return Err(BlasError::InvalidSize(format!("int8x4 requires ldb % 4 == 0, got {}", self.ldb)));
        }
        if self.layout == BatchLayout::Strided && self.batch_count > 1 && (self.stride_a % 4 != 0 || self.stride_b % 4 != 0) {
            return Err(BlasError::InvalidSize("int8x4 requires strides of A and B to be multiples of 4".into()));
        }
        Ok(())
    }
}

impl fmt::Display for GemmProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{} {}x{}x{} lda={} ldb={} ldc={} ldd={} batch={} {}",
            self.trans_a, self.trans_b, self.m, self.n, self.k, self.lda, self.ldb, self.ldc, self.ldd,
            self.batch_count, self.precision
        )
    }
}

fn canonical(op: Operation) -> Operation {
    match op {
        Operation::ConjugateTranspose => Operation::Transpose,
        other => other,
    }
}

/// Stored (rows, cols) of `op(X)` with shape `rows x cols`.
fn stored_dims(op: Operation, rows: usize, cols: usize) -> (usize, usize) {
    if op == Operation::None {
        (rows, cols)
    } else {
        (cols, rows)
    }
}

fn checked_extent(rows: usize, cols: usize, ld: usize) -> Option<usize> {
    if rows == 0 || cols == 0 {
        Some(0)
    } else {
        ld.checked_mul(cols - 1)?.checked_add(rows)
    }
}

fn extent(rows: usize, cols: usize, ld: usize) -> usize {
    checked_extent(rows, cols, ld).unwrap_or(usize::MAX)
}

fn non_negative(name: &str, value: i32) -> BlasResult<usize> {
    usize::try_from(value).map_err(|_| BlasError::InvalidSize(format!("{name} = {value} is negative")))
}

fn leading_dim(name: &str, ld: i32, rows: usize) -> BlasResult<usize> {
    let min = rows.max(1);
    match usize::try_from(ld) {
        Ok(v) if v >= min => Ok(v),
        _ => Err(BlasError::InvalidSize(format!("{name} = {ld} is less than {min}"))),
    }
}

fn stride(name: &str, value: i64) -> BlasResult<usize> {
    usize::try_from(value).map_err(|_| BlasError::InvalidSize(format!("{name} = {value} is negative")))
}
