/// `op(X)[r][c]` for a column-major matrix with leading dimension `ld`.
#[inline(always)]
unsafe fn op_at<T: Copy>(x: *const T, ld: usize, trans: u8, r: usize, c: usize) -> T {
    if trans == b'N' {
        *x.add(r + c * ld)
    } else {
        *x.add(c + r * ld)
    }
}

macro_rules! float_gemm {
    ($name:ident, $t:ty) => {
        /// GEMM: `C = alpha * op(A) * op(B) + beta * C` (column-major)
        ///
        /// `trans_a`/`trans_b` are `b'N'` or `b'T'`. C is not read when
        /// `beta == 0`.
        #[no_mangle]
        #[inline(never)]
        pub extern "C" fn $name(
            trans_a: u8,
            trans_b: u8,
            m: usize,
            n: usize,
            k: usize,
            alpha: $t,
            a: *const $t,
            lda: usize,
            b: *const $t,
            ldb: usize,
            beta: $t,
            c: *mut $t,
            ldc: usize,
        ) {
            unsafe {
                for j in 0..n {
                    for i in 0..m {
                        let mut acc: $t = 0.0;
                        for p in 0..k {
                            acc += op_at(a, lda, trans_a, i, p) * op_at(b, ldb, trans_b, p, j);
                        }
                        let dst = c.add(i + j * ldc);
                        *dst = if beta == 0.0 { alpha * acc } else { alpha * acc + beta * *dst };
                    }
                }
            }
        }
    };
}

float_gemm!(scalar_sgemm, f32);
float_gemm!(scalar_dgemm, f64);

/// Integer GEMM: `C = alpha * op(A) * op(B) + beta * C`, i8 in, i32 out.
///
/// Accumulation wraps on overflow.
#[no_mangle]
#[inline(never)]
pub extern "C" fn scalar_gemm_i8_i32(
    trans_a: u8,
    trans_b: u8,
    m: usize,
    n: usize,
    k: usize,
    alpha: i32,
    a: *const i8,
    lda: usize,
    b: *const i8,
    ldb: usize,
    beta: i32,
    c: *mut i32,
    ldc: usize,
) {
    unsafe {
        for j in 0..n {
            for i in 0..m {
                let mut acc = 0i32;
                for p in 0..k {
                    let av = op_at(a, lda, trans_a, i, p) as i32;
                    let bv = op_at(b, ldb, trans_b, p, j) as i32;
                    acc = acc.wrapping_add(av.wrapping_mul(bv));
                }
                let dst = c.add(i + j * ldc);
                let scaled = alpha.wrapping_mul(acc);
                *dst = if beta == 0 { scaled } else { scaled.wrapping_add(beta.wrapping_mul(*dst)) };
            }
        }
    }
}

macro_rules! float_scal {
    ($name:ident, $t:ty) => {
        /// Scale: `x[i * incx] *= alpha`
        #[no_mangle]
        #[inline(never)]
        pub extern "C" fn $name(n: usize, alpha: $t, x: *mut $t, incx: usize) {
            for i in 0..n {
                unsafe {
                    *x.add(i * incx) *= alpha;
                }
            }
        }
    };
}

float_scal!(scalar_sscal, f32);
float_scal!(scalar_dscal, f64);

macro_rules! float_rotm {
    ($name:ident, $t:ty) => {
        /// Modified Givens rotation of `(x, y)` by `param = [flag, h11, h21, h12, h22]`.
        ///
        /// Negative increments start at the last element.
        #[no_mangle]
        #[inline(never)]
        pub extern "C" fn $name(n: usize, x: *mut $t, incx: isize, y: *mut $t, incy: isize, param: *const $t) {
            if n == 0 {
                return;
            }
            unsafe {
                let flag = *param;
                if flag == -2.0 {
                    return;
                }
                let (h11, h21, h12, h22) = if flag < 0.0 {
                    (*param.add(1), *param.add(2), *param.add(3), *param.add(4))
                } else if flag == 0.0 {
                    (1.0, *param.add(2), *param.add(3), 1.0)
                } else {
                    (*param.add(1), -1.0, 1.0, *param.add(4))
                };
                let kx = if incx < 0 { (1 - n as isize) * incx } else { 0 };
                let ky = if incy < 0 { (1 - n as isize) * incy } else { 0 };
                for i in 0..n as isize {
                    let px = x.offset(kx + i * incx);
                    let py = y.offset(ky + i * incy);
                    let w = *px;
                    let z = *py;
                    *px = h11 * w + h12 * z;
                    *py = h21 * w + h22 * z;
                }
            }
        }
    };
}

float_rotm!(scalar_srotm, f32);
float_rotm!(scalar_drotm, f64);
