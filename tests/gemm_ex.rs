//! End-to-end GEMM behaviour through the public entry points.
//!
//! Results are compared against the scalar reference routines; inputs are
//! small integers so every product and partial sum is exact in f32.

use std::sync::{mpsc, Arc};
use std::time::Duration;

use gblas::gemm::{self, catalog, BatchLayout, GemmExArgs, GemmProblem, MatrixArg};
use gblas::{
    CheckNumericsMode, Datatype, DeviceStream, GemmFlags, Handle, HandleConfig, HostStream, InlineStream,
    KernelLaunch, Operation, PointerMode, Scalar, Status,
};
use gblas_scalar_ops::{scalar_dgemm, scalar_gemm_i8_i32, scalar_sgemm};

fn inline_handle() -> (Arc<InlineStream>, Handle) {
    let stream = Arc::new(InlineStream::new());
    let handle = Handle::with_config(stream.clone(), HandleConfig::default());
    (stream, handle)
}

fn host_handle() -> Handle {
    Handle::with_config(Arc::new(HostStream::new()), HandleConfig::default())
}

fn ints(len: usize, seed: usize) -> Vec<f32> {
    (0..len).map(|i| ((i * 7 + seed * 3) % 17) as f32 - 8.0).collect()
}

fn op_char(op: Operation) -> u8 {
    if op == Operation::None { b'N' } else { b'T' }
}

/// Leading dimensions for a tightly packed problem.
fn lds(ta: Operation, tb: Operation, m: i32, n: i32, k: i32) -> (i32, i32, i32) {
    let lda = if ta == Operation::None { m } else { k };
    let ldb = if tb == Operation::None { k } else { n };
    (lda.max(1), ldb.max(1), m.max(1))
}

// ═══════════════════════════════════════════════════════════════════════
// 1. 1023 x 1024 x 1025, A untransposed, B transposed
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_large_nt_query_validate_execute() {
    let handle = host_handle();
    let (m, n, k) = (1023, 1024, 1025);
    let (ta, tb) = (Operation::None, Operation::Transpose);
    let (lda, ldb, ldc) = lds(ta, tb, m, n, k);
    let ha = ints((lda * k) as usize, 1);
    let hb = ints((ldb * k) as usize, 2);
    let a = handle.upload(&ha).unwrap();
    let b = handle.upload(&hb).unwrap();
    let c = handle.alloc::<f32>((ldc * n) as usize).unwrap();

    let args = GemmExArgs::new(ta, tb, m, n, k)
        .a(MatrixArg::new(a.ptr(), Datatype::F32R, lda))
        .b(MatrixArg::new(b.ptr(), Datatype::F32R, ldb))
        .c_in_place(MatrixArg::new(c.ptr(), Datatype::F32R, ldc));

    let mut size = 0;
    assert_eq!(gemm::gemm_ex_get_solutions(Some(&handle), &args, None, Some(&mut size)), Status::Success);
    assert!(size >= 1);
    let mut list = vec![0; size as usize];
    assert_eq!(
        gemm::gemm_ex_get_solutions(Some(&handle), &args, Some(&mut list), Some(&mut size)),
        Status::Success
    );
    assert_eq!(list.len(), size as usize);
    assert!(!list.contains(&12));

    let check = |index: i32| {
        args.clone().solution_index(index).flags(GemmFlags::CHECK_SOLUTION_INDEX)
    };
    assert_eq!(gemm::gemm_ex(Some(&handle), &check(12)), Status::InvalidValue);
    assert_eq!(gemm::gemm_ex(Some(&handle), &args.clone().solution_index(12)), Status::InvalidValue);
    assert_eq!(gemm::gemm_ex(Some(&handle), &check(list[0])), Status::Success);
    assert_eq!(handle.stream().launch_count(), 0);

    assert_eq!(gemm::gemm_ex(Some(&handle), &args.clone().solution_index(list[0])), Status::Success);
    handle.synchronize().unwrap();
    assert_eq!(handle.stream().launch_count(), 1);

    let out = handle.download(&c).unwrap();
    let at = |i: usize, j: usize| out[i + j * ldc as usize];
    for &(i, j) in &[(0usize, 0usize), (1022, 1023), (500, 17), (3, 1000)] {
        let expected: f32 = (0..k as usize)
            .map(|p| ha[i + p * lda as usize] * hb[j + p * ldb as usize])
            .sum();
        assert_eq!(at(i, j), expected, "element ({i}, {j})");
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 2. Degenerate problems enqueue nothing
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_degenerate_shapes_are_no_op_successes() {
    let (stream, handle) = inline_handle();
    for (m, n, k) in [(0, 8, 8), (8, 0, 8), (8, 8, 0)] {
        let args = GemmExArgs::new(Operation::None, Operation::None, m, n, k)
            .a(MatrixArg::new(gblas::DevicePtr::null(), Datatype::F32R, 8))
            .b(MatrixArg::new(gblas::DevicePtr::null(), Datatype::F32R, 8))
            .c_in_place(MatrixArg::new(gblas::DevicePtr::null(), Datatype::F32R, 8))
            .beta(1.5f32);
        assert_eq!(gemm::gemm_ex(Some(&handle), &args), Status::Success, "{m}x{n}x{k}");

        // Enumerated indices of the degenerate problem still resolve.
        let problem = GemmProblem::new(&args, BatchLayout::Single).unwrap();
        for index in catalog().enumerate(&problem) {
            assert_eq!(gemm::gemm_ex(Some(&handle), &args.clone().solution_index(index)), Status::Success);
        }
    }

    let batched = GemmExArgs::new(Operation::None, Operation::None, 8, 8, 8)
        .a(MatrixArg::strided(gblas::DevicePtr::null(), Datatype::F32R, 8, 64))
        .b(MatrixArg::strided(gblas::DevicePtr::null(), Datatype::F32R, 8, 64))
        .c_in_place(MatrixArg::strided(gblas::DevicePtr::null(), Datatype::F32R, 8, 64))
        .batch_count(0);
    assert_eq!(gemm::gemm_strided_batched_ex(Some(&handle), &batched), Status::Success);

    assert_eq!(stream.launch_count(), 0);
    assert!(stream.launched_kernels().is_empty());
}

#[test]
fn test_invalid_arguments_fail_before_any_launch() {
    let (stream, handle) = inline_handle();
    let buf = handle.alloc::<f32>(64).unwrap();
    let good = GemmExArgs::new(Operation::None, Operation::None, 8, 8, 8)
        .a(MatrixArg::new(buf.ptr(), Datatype::F32R, 8))
        .b(MatrixArg::new(buf.ptr(), Datatype::F32R, 8))
        .c(MatrixArg::new(buf.ptr(), Datatype::F32R, 8))
        .d(MatrixArg::new(handle.alloc::<f32>(64).unwrap().ptr(), Datatype::F32R, 8));

    assert_eq!(gemm::gemm_ex(None, &good), Status::InvalidHandle);
    assert_eq!(
        gemm::gemm_ex(Some(&handle), &good.clone().a(MatrixArg::new(buf.ptr(), Datatype::F32R, 7))),
        Status::InvalidSize
    );
    assert_eq!(
        gemm::gemm_ex(Some(&handle), &GemmExArgs { m: -1, ..good.clone() }),
        Status::InvalidSize
    );
    assert_eq!(
        gemm::gemm_ex(Some(&handle), &good.clone().a(MatrixArg::new(gblas::DevicePtr::null(), Datatype::F32R, 8))),
        Status::InvalidPointer
    );
    // A 9x8 operand does not fit in 64 elements.
    assert_eq!(
        gemm::gemm_ex(Some(&handle), &good.clone().a(MatrixArg::new(buf.ptr(), Datatype::F32R, 9))),
        Status::InvalidPointer
    );
    assert_eq!(
        gemm::gemm_ex(Some(&handle), &good.clone().compute_type(Datatype::F64R)),
        Status::NotImplemented
    );
    assert_eq!(
        gemm::gemm_ex(Some(&handle), &good.clone().alpha(2.0f64)),
        Status::InvalidValue
    );
    assert_eq!(stream.launch_count(), 0);
}

#[test]
fn test_unaddressable_output_span_is_rejected() {
    let (stream, handle) = inline_handle();
    let zero = Scalar::C64(gblas::types::Complex64::new(0.0, 0.0));
    let d = handle.alloc::<gblas::types::Complex64>(128).unwrap();
    // ldd * (n - 1) + m elements of 16 bytes wraps a 64-bit byte count.
    let (m, n, k, ldd) = (128, (1 << 30) + 1, 1, 1 << 30);
    let args = GemmExArgs::new(Operation::None, Operation::None, m, n, k)
        .alpha(zero)
        .beta(zero)
        .a(MatrixArg::new(gblas::DevicePtr::null(), Datatype::F64C, m))
        .b(MatrixArg::new(gblas::DevicePtr::null(), Datatype::F64C, k))
        .c(MatrixArg::new(gblas::DevicePtr::null(), Datatype::F64C, ldd))
        .d(MatrixArg::new(d.ptr(), Datatype::F64C, ldd))
        .compute_type(Datatype::F64C);

    assert_eq!(gemm::gemm_ex(Some(&handle), &args), Status::InvalidSize);
    let strided = args.clone().batch_count(2);
    assert_eq!(gemm::gemm_strided_batched_ex(Some(&handle), &strided), Status::InvalidSize);
    assert_eq!(stream.launch_count(), 0);
    assert!(handle.download(&d).unwrap().iter().all(|v| v.re == 0.0 && v.im == 0.0));
}

// ═══════════════════════════════════════════════════════════════════════
// 3. Aliasing, batching, pointer modes
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_in_place_accumulate_matches_reference() {
    let handle = host_handle();
    let (m, n, k) = (37, 29, 41);
    let (ta, tb) = (Operation::Transpose, Operation::None);
    let (lda, ldb, ldc) = lds(ta, tb, m, n, k);
    let ha = ints((lda * m) as usize, 3);
    let hb = ints((ldb * n) as usize, 4);
    let hc = ints((ldc * n) as usize, 5);
    let a = handle.upload(&ha).unwrap();
    let b = handle.upload(&hb).unwrap();
    let c = handle.upload(&hc).unwrap();

    let base = GemmExArgs::new(ta, tb, m, n, k)
        .alpha(2.0f32)
        .beta(-1.0f32)
        .a(MatrixArg::new(a.ptr(), Datatype::F32R, lda))
        .b(MatrixArg::new(b.ptr(), Datatype::F32R, ldb))
        .c_in_place(MatrixArg::new(c.ptr(), Datatype::F32R, ldc));

    let mut expected = hc.clone();
    scalar_sgemm(
        op_char(ta), op_char(tb), m as usize, n as usize, k as usize,
        2.0, ha.as_ptr(), lda as usize, hb.as_ptr(), ldb as usize,
        -1.0, expected.as_mut_ptr(), ldc as usize,
    );

    // Every enumerated solution, plus the default.
    let problem = GemmProblem::new(&base, BatchLayout::Single).unwrap();
    let mut indices = catalog().enumerate(&problem);
    indices.insert(0, 0);
    for index in indices {
        c.copy_from_host(handle.stream().as_ref(), &hc).unwrap();
        assert_eq!(gemm::gemm_ex(Some(&handle), &base.clone().solution_index(index)), Status::Success);
        assert_eq!(handle.download(&c).unwrap(), expected, "solution {index}");
    }
}

#[test]
fn test_strided_batch_with_broadcast_operand() {
    let handle = host_handle();
    let (m, n, k, batches) = (16, 12, 20, 3usize);
    let (lda, ldb, ldc) = (m, k, m);
    let stride_a = (lda * k) as usize + 5;
    let stride_c = (ldc * n) as usize;
    let ha = ints(stride_a * batches, 6);
    let hb = ints((ldb * n) as usize, 7);
    let a = handle.upload(&ha).unwrap();
    let b = handle.upload(&hb).unwrap();
    let d = handle.alloc::<f32>(stride_c * batches).unwrap();

    let args = GemmExArgs::new(Operation::None, Operation::None, m, n, k)
        .a(MatrixArg::strided(a.ptr(), Datatype::F32R, lda, stride_a as i64))
        // stride 0: the same B for every batch member
        .b(MatrixArg::strided(b.ptr(), Datatype::F32R, ldb, 0))
        .c_in_place(MatrixArg::strided(d.ptr(), Datatype::F32R, ldc, stride_c as i64))
        .batch_count(batches as i32);
    assert_eq!(gemm::gemm_strided_batched_ex(Some(&handle), &args), Status::Success);
    let out = handle.download(&d).unwrap();

    for batch in 0..batches {
        let mut expected = vec![0.0f32; stride_c];
        scalar_sgemm(
            b'N', b'N', m as usize, n as usize, k as usize,
            1.0, ha[batch * stride_a..].as_ptr(), lda as usize, hb.as_ptr(), ldb as usize,
            0.0, expected.as_mut_ptr(), ldc as usize,
        );
        assert_eq!(&out[batch * stride_c..(batch + 1) * stride_c], &expected[..], "batch {batch}");
    }

    // The same call rejects zero strides when asked to.
    assert_eq!(
        gemm::gemm_strided_batched_ex(Some(&handle), &args.clone().flags(GemmFlags::STRICT_BATCH_STRIDE)),
        Status::InvalidSize
    );
}

#[test]
fn test_pointer_array_batches() {
    let handle = host_handle();
    let (m, n, k) = (9, 10, 11);
    let host: Vec<(Vec<f32>, Vec<f32>)> = (0..2).map(|s| (ints(99, s), ints(110, s + 10))).collect();
    let a: Vec<_> = host.iter().map(|(ha, _)| handle.upload(ha).unwrap()).collect();
    let b: Vec<_> = host.iter().map(|(_, hb)| handle.upload(hb).unwrap()).collect();
    let d: Vec<_> = (0..2).map(|_| handle.alloc::<f32>(90).unwrap()).collect();

    let args = GemmExArgs::new(Operation::None, Operation::None, m, n, k)
        .a(MatrixArg::batched(a.iter().map(|x| x.ptr()).collect(), Datatype::F32R, m))
        .b(MatrixArg::batched(b.iter().map(|x| x.ptr()).collect(), Datatype::F32R, k))
        .c_in_place(MatrixArg::batched(d.iter().map(|x| x.ptr()).collect(), Datatype::F32R, m))
        .batch_count(2);

    // Split-K solutions cannot take pointer arrays.
    let problem = GemmProblem::new(&args, BatchLayout::PointerArray).unwrap();
    let listed = catalog().enumerate(&problem);
    assert!(listed.iter().all(|i| !catalog().entry(*i).unwrap().is_split_k()));

    assert_eq!(gemm::gemm_batched_ex(Some(&handle), &args), Status::Success);
    for (i, (ha, hb)) in host.iter().enumerate() {
        let mut expected = vec![0.0f32; 90];
        scalar_sgemm(b'N', b'N', 9, 10, 11, 1.0, ha.as_ptr(), 9, hb.as_ptr(), 11, 0.0, expected.as_mut_ptr(), 9);
        assert_eq!(handle.download(&d[i]).unwrap(), expected);
    }

    let short = args.clone().batch_count(3);
    assert_eq!(gemm::gemm_batched_ex(Some(&handle), &short), Status::InvalidPointer);
}

#[test]
fn test_device_pointer_mode_scalars() {
    let mut handle = host_handle();
    let (m, n, k) = (6, 5, 4);
    let ha: Vec<f64> = (0..24).map(|i| i as f64).collect();
    let hb: Vec<f64> = (0..20).map(|i| (i % 3) as f64).collect();
    let hc: Vec<f64> = vec![1.0; 30];
    let a = handle.upload(&ha).unwrap();
    let b = handle.upload(&hb).unwrap();
    let c = handle.upload(&hc).unwrap();
    let alpha = handle.upload(&[0.5f64]).unwrap();
    let beta = handle.upload(&[3.0f64]).unwrap();
    handle.set_pointer_mode(PointerMode::Device);

    let args = GemmExArgs::new(Operation::None, Operation::None, m, n, k)
        .alpha(alpha.ptr())
        .beta(beta.ptr())
        .a(MatrixArg::new(a.ptr(), Datatype::F64R, m))
        .b(MatrixArg::new(b.ptr(), Datatype::F64R, k))
        .c_in_place(MatrixArg::new(c.ptr(), Datatype::F64R, m))
        .compute_type(Datatype::F64R);
    assert_eq!(gemm::gemm_ex(Some(&handle), &args), Status::Success);

    let mut expected = hc.clone();
    scalar_dgemm(b'N', b'N', 6, 5, 4, 0.5, ha.as_ptr(), 6, hb.as_ptr(), 4, 3.0, expected.as_mut_ptr(), 6);
    assert_eq!(handle.download(&c).unwrap(), expected);

    // Host scalars are rejected in device mode.
    assert_eq!(gemm::gemm_ex(Some(&handle), &args.clone().alpha(1.0f64)), Status::InvalidValue);
}

#[test]
fn test_int8_gemm() {
    let handle = host_handle();
    let ha: Vec<i8> = (0..48).map(|i| (i % 11) as i8 - 5).collect();
    let hb: Vec<i8> = (0..40).map(|i| (i % 7) as i8 - 3).collect();
    let a = handle.upload(&ha).unwrap();
    let b = handle.upload(&hb).unwrap();
    let d = handle.alloc::<i32>(30).unwrap();

    let args = GemmExArgs::new(Operation::None, Operation::Transpose, 6, 5, 8)
        .alpha(Scalar::I32(2))
        .beta(Scalar::I32(0))
        .a(MatrixArg::new(a.ptr(), Datatype::I8R, 6))
        .b(MatrixArg::new(b.ptr(), Datatype::I8R, 5))
        .c_in_place(MatrixArg::new(d.ptr(), Datatype::I32R, 6))
        .compute_type(Datatype::I32R);
    assert_eq!(gemm::gemm_ex(Some(&handle), &args), Status::Success);

    let mut expected = vec![0i32; 30];
    scalar_gemm_i8_i32(b'N', b'T', 6, 5, 8, 2, ha.as_ptr(), 6, hb.as_ptr(), 5, 0, expected.as_mut_ptr(), 6);
    assert_eq!(handle.download(&d).unwrap(), expected);
}

#[test]
fn test_alpha_zero_beta_one_is_quick_return() {
    let (stream, handle) = inline_handle();
    let args = GemmExArgs::new(Operation::None, Operation::None, 4, 4, 4)
        .alpha(0.0f32)
        .beta(1.0f32)
        .a(MatrixArg::new(gblas::DevicePtr::null(), Datatype::F32R, 4))
        .b(MatrixArg::new(gblas::DevicePtr::null(), Datatype::F32R, 4))
        .c_in_place(MatrixArg::new(handle.alloc::<f32>(16).unwrap().ptr(), Datatype::F32R, 4));
    assert_eq!(gemm::gemm_ex(Some(&handle), &args), Status::Success);
    assert_eq!(stream.launch_count(), 0);
}

// ═══════════════════════════════════════════════════════════════════════
// 4. Handle modes
// ═══════════════════════════════════════════════════════════════════════

fn tall_k_args(handle: &Handle) -> GemmExArgs {
    let (m, n, k) = (64, 64, 10024);
    let a = handle.upload(&ints(64 * 10024, 8)).unwrap();
    let b = handle.upload(&ints(10024 * 64, 9)).unwrap();
    let c = handle.alloc::<f32>(64 * 64).unwrap();
    GemmExArgs::new(Operation::None, Operation::None, m, n, k)
        .a(MatrixArg::new(a.ptr(), Datatype::F32R, m))
        .b(MatrixArg::new(b.ptr(), Datatype::F32R, k))
        .c_in_place(MatrixArg::new(c.ptr(), Datatype::F32R, m))
}

#[test]
fn test_device_memory_size_query() {
    let (stream, handle) = inline_handle();
    let args = tall_k_args(&handle);

    assert_eq!(handle.stop_device_memory_size_query().unwrap_err().status(), Status::SizeQueryMismatch);
    handle.start_device_memory_size_query().unwrap();
    assert!(handle.is_device_memory_size_query());
    assert_eq!(gemm::gemm_ex(Some(&handle), &args), Status::Success);
    let bytes = handle.stop_device_memory_size_query().unwrap();
    assert!(!handle.is_device_memory_size_query());
    // The default for a tall-k problem is the widest split.
    assert_eq!(bytes, 8 * 64 * 64 * 4);
    assert_eq!(stream.launch_count(), 0);

    handle.start_device_memory_size_query().unwrap();
    assert_eq!(gemm::gemm_ex(Some(&handle), &GemmExArgs { k: 0, ..args.clone() }), Status::Success);
    // Malformed calls still fail while querying.
    let mut bad_lda = args.clone();
    bad_lda.a.ld = 63;
    assert_eq!(gemm::gemm_ex(Some(&handle), &bad_lda), Status::InvalidSize);
    assert_eq!(gemm::gemm_ex(Some(&handle), &args.clone().solution_index(-3)), Status::InvalidValue);
    assert_eq!(handle.stop_device_memory_size_query().unwrap(), 0);

    // Too little device memory for the workspace.
    handle.set_device_memory_size(Some(1024));
    assert_eq!(gemm::gemm_ex(Some(&handle), &args), Status::MemoryError);
    handle.set_device_memory_size(None);
    assert_eq!(gemm::gemm_ex(Some(&handle), &args), Status::Success);
    assert_eq!(stream.launch_count(), 1);
    assert_eq!(handle.device_memory_in_use(), 0);
}

#[test]
fn test_workspace_limit_is_per_call_while_stream_is_busy() {
    let handle = host_handle();
    let first = tall_k_args(&handle);
    let second = tall_k_args(&handle);
    let workspace = 8 * 64 * 64 * 4;
    handle.set_device_memory_size(Some(workspace));

    // Hold the stream so both calls' workspace is in flight together.
    let (release_tx, release_rx) = mpsc::channel::<()>();
    handle
        .stream()
        .launch(KernelLaunch::new("hold", move || {
            let _ = release_rx.recv_timeout(Duration::from_secs(10));
        }))
        .unwrap();

    assert_eq!(gemm::gemm_ex(Some(&handle), &first), Status::Success);
    assert_eq!(gemm::gemm_ex(Some(&handle), &second), Status::Success);
    assert_eq!(handle.device_memory_in_use(), 2 * workspace);

    release_tx.send(()).unwrap();
    handle.synchronize().unwrap();
    assert_eq!(handle.device_memory_in_use(), 0);
}

#[test]
fn test_check_numerics_fail_stops_the_call() {
    let stream = Arc::new(InlineStream::new());
    let config = HandleConfig {
        check_numerics: CheckNumericsMode::FAIL,
        ..HandleConfig::default()
    };
    let handle = Handle::with_config(stream.clone(), config);
    let mut ha = vec![1.0f32; 16];
    ha[5] = f32::NAN;
    let a = handle.upload(&ha).unwrap();
    let b = handle.upload(&[1.0f32; 16]).unwrap();
    let c = handle.alloc::<f32>(16).unwrap();
    let args = GemmExArgs::new(Operation::None, Operation::None, 4, 4, 4)
        .a(MatrixArg::new(a.ptr(), Datatype::F32R, 4))
        .b(MatrixArg::new(b.ptr(), Datatype::F32R, 4))
        .c_in_place(MatrixArg::new(c.ptr(), Datatype::F32R, 4));
    assert_eq!(gemm::gemm_ex(Some(&handle), &args), Status::CheckNumericsFail);
    assert_eq!(stream.launch_count(), 0);

    // Warn-only mode lets the call through.
    let mut handle = handle;
    handle.set_check_numerics(CheckNumericsMode::WARN);
    assert_eq!(gemm::gemm_ex(Some(&handle), &args), Status::Success);
    assert_eq!(stream.launch_count(), 1);
}

#[test]
fn test_solutions_by_type() {
    let (_, handle) = inline_handle();
    let mut size = 0;
    assert_eq!(
        gemm::gemm_ex_get_solutions_by_type(
            Some(&handle), Datatype::F32R, Datatype::F32R, Datatype::F32R, GemmFlags::NONE, None, Some(&mut size)
        ),
        Status::Success
    );
    let mut list = vec![0; size as usize];
    assert_eq!(
        gemm::gemm_ex_get_solutions_by_type(
            Some(&handle), Datatype::F32R, Datatype::F32R, Datatype::F32R, GemmFlags::NONE, Some(&mut list), Some(&mut size),
        ),
        Status::Success
    );
    // Every shape-specific listing is drawn from the by-type listing.
    let args = tall_k_args(&handle);
    let problem = GemmProblem::new(&args, BatchLayout::Single).unwrap();
    assert!(catalog().enumerate(&problem).iter().all(|i| list.contains(i)));

    assert_eq!(
        gemm::gemm_ex_get_solutions_by_type(
            Some(&handle), Datatype::F32R, Datatype::F64R, Datatype::F32R, GemmFlags::NONE, None, Some(&mut size)
        ),
        Status::NotImplemented
    );
}
