//! Host-emulated GEMM kernels.
//!
//! A [`GemmJob`] owns everything a launch touches (device pointers keep
//! their allocations alive), so it can be moved into a [`KernelLaunch`]
//! closure and run later on the stream's worker. Bounds were checked by
//! dispatch before the job was built; the kernels only do raw accesses
//! inside those extents.
//!
//! [`KernelLaunch`]: crate::device::KernelLaunch

use rayon::prelude::*;

use crate::device::DevicePtr;
use crate::element::{ComputeScalar, Convert, DeviceElement};
use crate::gemm::problem::GemmProblem;
use crate::handle::Workspace;
use crate::types::Operation;

/// Alpha or beta, as seen by a kernel.
pub(crate) enum ScalarSource<Tc> {
    Host(Tc),
    /// Read when the kernel runs.
    Device(DevicePtr),
}

impl<Tc: ComputeScalar> ScalarSource<Tc> {
    pub(crate) fn value(&self) -> Tc {
        match self {
            ScalarSource::Host(v) => *v,
            // Size was checked at dispatch.
            ScalarSource::Device(p) => p.read::<Tc>().unwrap_or_else(Tc::zero),
        }
    }
}

/// Operand pointers of one batch member.
#[derive(Debug, Clone)]
pub(crate) struct BatchOperands {
    pub a: DevicePtr,
    pub b: DevicePtr,
    pub c: DevicePtr,
    pub d: DevicePtr,
}

pub(crate) struct GemmJob<Tc> {
    pub problem: GemmProblem,
    pub batches: Vec<BatchOperands>,
    pub alpha: ScalarSource<Tc>,
    pub beta: ScalarSource<Tc>,
    pub tile: (usize, usize),
    pub split_k: usize,
    pub workspace: Option<Workspace>,
    /// Tiles may run concurrently: D overlaps neither A, B nor (except
    /// element-for-element) C.
    pub parallel: bool,
}

/// Read-only view of `op(X)`.
#[derive(Clone, Copy)]
struct OpView<T> {
    ptr: *const T,
    ld: usize,
    op: Operation,
    packed: bool,
}

// Safety: views only read memory kept alive by the job's DevicePtrs.
unsafe impl<T: Send> Send for OpView<T> {}
unsafe impl<T: Sync> Sync for OpView<T> {}

impl<T: DeviceElement> OpView<T> {
    fn new(ptr: &DevicePtr, ld: usize, op: Operation, packed: bool) -> Self {
        Self { ptr: ptr.as_mut_ptr::<T>() as *const T, ld, op, packed }
    }

    /// Element `(r, c)` of `op(X)`.
    ///
    /// Packed int8x4 operands interleave groups of four k-values; for
    /// `op == None` k runs along `c`, otherwise along `r`.
    #[inline(always)]
    unsafe fn at(&self, r: usize, c: usize) -> T {
        let (inner, outer) = if self.op == Operation::None { (r, c) } else { (c, r) };
        let offset = if self.packed {
            (outer / 4) * self.ld * 4 + inner * 4 + outer % 4
        } else {
            inner + outer * self.ld
        };
        let v = std::ptr::read_unaligned(self.ptr.add(offset));
        if self.op == Operation::ConjugateTranspose {
            v.conj()
        } else {
            v
        }
    }
}

/// Writable column-major view.
#[derive(Clone, Copy)]
struct OutView<T> {
    ptr: *mut T,
    ld: usize,
}

unsafe impl<T: Send> Send for OutView<T> {}
unsafe impl<T: Sync> Sync for OutView<T> {}

impl<T> OutView<T> {
    #[inline(always)]
    unsafe fn get(&self, i: usize, j: usize) -> T {
        std::ptr::read_unaligned(self.ptr.add(i + j * self.ld))
    }

    #[inline(always)]
    unsafe fn set(&self, i: usize, j: usize, v: T) {
        std::ptr::write_unaligned(self.ptr.add(i + j * self.ld), v)
    }
}

/// Per-batch views shared by the tile workers.
struct Views<Ti, To> {
    a: OpView<Ti>,
    b: OpView<Ti>,
    c: OutView<To>,
    d: OutView<To>,
}

/// Epilogue `D = alpha * acc + beta * C`. C is not read when beta is zero.
#[inline(always)]
unsafe fn store<To, Tc>(views_c: OutView<To>, views_d: OutView<To>, i: usize, j: usize, acc: Tc, alpha: Tc, beta: Tc)
where
    To: DeviceElement + Convert<Tc>,
    Tc: ComputeScalar + Convert<To>,
{
    let mut v = alpha.mul(acc);
    if !beta.is_zero() {
        let c: Tc = views_c.get(i, j).convert();
        v = v.mul_add(beta, c);
    }
    views_d.set(i, j, v.convert());
}

/// Run `job` to completion on the current thread (tiles may fan out on
/// the rayon pool).
pub(crate) fn run<Ti, To, Tc>(job: GemmJob<Tc>)
where
    Ti: DeviceElement + Convert<Tc>,
    To: DeviceElement + Convert<Tc>,
    Tc: ComputeScalar + Convert<To>,
{
    let p = &job.problem;
    let alpha = job.alpha.value();
    let beta = job.beta.value();
    let packed = p.packed_int8x4();

    for batch in &job.batches {
        let views = Views::<Ti, To> {
            a: OpView::new(&batch.a, p.lda, p.trans_a, packed && p.trans_a == Operation::None),
            b: OpView::new(&batch.b, p.ldb, p.trans_b, packed && p.trans_b != Operation::None),
            c: OutView { ptr: batch.c.as_mut_ptr::<To>(), ld: p.ldc },
            d: OutView { ptr: batch.d.as_mut_ptr::<To>(), ld: p.ldd },
        };
        match &job.workspace {
            Some(ws) if job.split_k > 1 && !alpha.is_zero() => {
                split_k(p, &views, ws, job.split_k, alpha, beta, job.parallel)
            }
            _ => tiled(p, &views, job.tile, alpha, beta, job.parallel),
        }
    }
}

fn tiled<Ti, To, Tc>(p: &GemmProblem, v: &Views<Ti, To>, tile: (usize, usize), alpha: Tc, beta: Tc, parallel: bool)
where
    Ti: DeviceElement + Convert<Tc>,
    To: DeviceElement + Convert<Tc>,
    Tc: ComputeScalar + Convert<To>,
{
    let (mt0, mt1) = (tile.0.max(1), tile.1.max(1));
    let tiles: Vec<(usize, usize)> = (0..p.m)
        .step_by(mt0)
        .flat_map(|i0| (0..p.n).step_by(mt1).map(move |j0| (i0, j0)))
        .collect();

    let skip_product = alpha.is_zero();
    let body = |&(i0, j0): &(usize, usize)| {
        let i1 = (i0 + mt0).min(p.m);
        let j1 = (j0 + mt1).min(p.n);
        let mut acc = vec![Tc::zero(); i1 - i0];
        for j in j0..j1 {
            acc.iter_mut().for_each(|x| *x = Tc::zero());
            // Safety: every index stays inside the extents checked at dispatch.
            unsafe {
                if !skip_product {
                    for kk in 0..p.k {
                        let bv: Tc = v.b.at(kk, j).convert();
                        for (r, i) in (i0..i1).enumerate() {
                            let av: Tc = v.a.at(i, kk).convert();
                            acc[r] = acc[r].mul_add(av, bv);
                        }
                    }
                }
                for (r, i) in (i0..i1).enumerate() {
                    store(v.c, v.d, i, j, acc[r], alpha, beta);
                }
            }
        }
    };

    if parallel {
        tiles.par_iter().for_each(body);
    } else {
        tiles.iter().for_each(body);
    }
}

/// Split-K: each of `gsu` partitions accumulates its slice of k into its
/// own region of the workspace, then one pass reduces and applies the
/// epilogue.
fn split_k<Ti, To, Tc>(
    p: &GemmProblem,
    v: &Views<Ti, To>,
    ws: &Workspace,
    gsu: usize,
    alpha: Tc,
    beta: Tc,
    parallel: bool,
) where
    Ti: DeviceElement + Convert<Tc>,
    To: DeviceElement + Convert<Tc>,
    Tc: ComputeScalar + Convert<To>,
{
    let mn = p.m * p.n;
    let chunk = p.k.div_ceil(gsu);
    let partials = OutView::<Tc> { ptr: ws.ptr().as_mut_ptr::<Tc>(), ld: mn };

    let partial = |g: usize| {
        let k0 = (g * chunk).min(p.k);
        let k1 = (k0 + chunk).min(p.k);
        // Safety: partition g owns workspace elements [g*mn, (g+1)*mn).
        unsafe {
            for idx in 0..mn {
                partials.set(idx, g, Tc::zero());
            }
            for j in 0..p.n {
                for kk in k0..k1 {
                    let bv: Tc = v.b.at(kk, j).convert();
                    for i in 0..p.m {
                        let av: Tc = v.a.at(i, kk).convert();
                        let idx = i + j * p.m;
                        partials.set(idx, g, partials.get(idx, g).mul_add(av, bv));
                    }
                }
            }
        }
    };
    // Partitions write disjoint workspace regions and only read A and B.
    (0..gsu).into_par_iter().for_each(partial);

    let reduce = |j: usize| {
        // Safety: column j of D is written by this closure only.
        unsafe {
            for i in 0..p.m {
                let idx = i + j * p.m;
                let mut acc = Tc::zero();
                for g in 0..gsu {
                    acc = acc.add(partials.get(idx, g));
                }
                store(v.c, v.d, i, j, acc, alpha, beta);
            }
        }
    };
    if parallel {
        (0..p.n).into_par_iter().for_each(reduce);
    } else {
        (0..p.n).for_each(reduce);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HandleConfig;
    use crate::device::InlineStream;
    use crate::gemm::problem::{BatchLayout, GemmExArgs, MatrixArg};
    use crate::handle::Handle;
    use crate::types::Datatype;
    use std::sync::Arc;

    fn handle() -> Handle {
        Handle::with_config(Arc::new(InlineStream::new()), HandleConfig::default())
    }

    fn reference(ta: Operation, tb: Operation, m: usize, n: usize, k: usize, a: &[f64], b: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; m * n];
        for j in 0..n {
            for i in 0..m {
                let mut s = 0.0;
                for kk in 0..k {
                    let av = if ta == Operation::None { a[i + kk * m] } else { a[kk + i * k] };
                    let bv = if tb == Operation::None { b[kk + j * k] } else { b[j + kk * n] };
                    s += av * bv;
                }
                out[i + j * m] = s;
            }
        }
        out
    }

    fn job_for(h: &Handle, ta: Operation, tb: Operation, m: usize, n: usize, k: usize, split: usize) -> (Vec<f64>, Vec<f64>) {
        let a: Vec<f64> = (0..m * k).map(|i| (i % 7) as f64 - 3.0).collect();
        let b: Vec<f64> = (0..k * n).map(|i| (i % 5) as f64 * 0.5).collect();
        let (lda, ldb) = (if ta == Operation::None { m } else { k }, if tb == Operation::None { k } else { n });
        let args = GemmExArgs::new(ta, tb, m as i32, n as i32, k as i32)
            .a(MatrixArg::new(DevicePtr::null(), Datatype::F64R, lda as i32))
            .b(MatrixArg::new(DevicePtr::null(), Datatype::F64R, ldb as i32))
            .c(MatrixArg::new(DevicePtr::null(), Datatype::F64R, m as i32))
            .d(MatrixArg::new(DevicePtr::null(), Datatype::F64R, m as i32))
            .compute_type(Datatype::F64R);
        let problem = GemmProblem::new(&args, BatchLayout::Single).unwrap();
        let da = h.upload(&a).unwrap();
        let db = h.upload(&b).unwrap();
        let dd = h.upload(&vec![f64::NAN; m * n]).unwrap();
        let workspace = (split > 1).then(|| h.device_malloc(split * m * n * 8).unwrap());
        let job = GemmJob {
            problem,
            batches: vec![BatchOperands { a: da.ptr(), b: db.ptr(), c: DevicePtr::null(), d: dd.ptr() }],
            alpha: ScalarSource::Host(1.0),
            beta: ScalarSource::Host(0.0),
            tile: (4, 3),
            split_k: split,
            workspace,
            parallel: true,
        };
        run::<f64, f64, f64>(job);
        (h.download(&dd).unwrap(), reference(ta, tb, m, n, k, &a, &b))
    }

    #[test]
    fn test_tiled_matches_reference_for_all_transposes() {
        let h = handle();
        for ta in [Operation::None, Operation::Transpose] {
            for tb in [Operation::None, Operation::Transpose] {
                let (got, want) = job_for(&h, ta, tb, 9, 7, 5, 1);
                assert_eq!(got, want, "{ta}{tb}");
            }
        }
    }

    #[test]
    fn test_split_k_matches_reference() {
        let h = handle();
        let (got, want) = job_for(&h, Operation::None, Operation::Transpose, 5, 6, 37, 4);
        for (g, w) in got.iter().zip(&want) {
            assert!((g - w).abs() < 1e-9);
        }
    }

    #[test]
    fn test_packed_view_addressing() {
        // A is 2x8 (m x k), stored packed with lda 2: groups of four k-values
        // per row, rows interleaved.
        let m = 2;
        let k = 8;
        let mut packed = vec![0i8; m * k];
        for i in 0..m {
            for kk in 0..k {
                packed[(kk / 4) * m * 4 + i * 4 + kk % 4] = (10 * i + kk) as i8;
            }
        }
        let h = handle();
        let buf = h.upload(&packed).unwrap();
        let view = OpView::<i8>::new(&buf.ptr(), m, Operation::None, true);
        for i in 0..m {
            for kk in 0..k {
                assert_eq!(unsafe { view.at(i, kk) }, (10 * i + kk) as i8);
            }
        }
    }
}
