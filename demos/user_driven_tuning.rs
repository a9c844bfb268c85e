//! Pick a GEMM solution by hand, then let the tuner pick one.
//!
//! Run with `RUST_LOG=info cargo run --release --example user_driven_tuning`.
//! Set `GBLAS_LAYER=1` to trace every call.

use std::time::Instant;

use gblas::gemm::{self, GemmExArgs, MatrixArg};
use gblas::tuning::{TuneConfig, Tuner, WisdomDb};
use gblas::{Datatype, GemmFlags, Handle, Operation, Status};

fn main() {
    env_logger::init();

    let handle = Handle::host();
    let (m, n, k) = (1023usize, 1024usize, 1025usize);
    let (lda, ldb, ldc) = (m, n, m);

    let host_a: Vec<f32> = (0..lda * k).map(|i| (i % 17) as f32).collect();
    let host_b: Vec<f32> = (0..ldb * k).map(|i| (i % 13) as f32).collect();
    let a = handle.upload(&host_a).expect("upload A");
    let b = handle.upload(&host_b).expect("upload B");
    let c = handle.alloc::<f32>(ldc * n).expect("alloc C");

    let args = GemmExArgs::new(Operation::None, Operation::Transpose, m as i32, n as i32, k as i32)
        .alpha(1.0f32)
        .beta(0.0f32)
        .a(MatrixArg::new(a.ptr(), Datatype::F32R, lda as i32))
        .b(MatrixArg::new(b.ptr(), Datatype::F32R, ldb as i32))
        .c_in_place(MatrixArg::new(c.ptr(), Datatype::F32R, ldc as i32));

    // Number of solutions, then the list itself.
    let mut size = 0;
    let status = gemm::gemm_ex_get_solutions(Some(&handle), &args, None, Some(&mut size));
    assert_eq!(status, Status::Success);
    let mut solutions = vec![0; size as usize];
    let status = gemm::gemm_ex_get_solutions(Some(&handle), &args, Some(&mut solutions), Some(&mut size));
    assert_eq!(status, Status::Success);
    println!("{size} solutions for {m}x{n}x{k} NT: {solutions:?}");

    // An index from another precision does not validate.
    let foreign = args.clone().solution_index(12).flags(GemmFlags::CHECK_SOLUTION_INDEX);
    println!("solution 12 check: {}", gemm::gemm_ex(Some(&handle), &foreign));

    let mut best = (0, f64::INFINITY);
    for &index in &solutions {
        let check = args.clone().solution_index(index).flags(GemmFlags::CHECK_SOLUTION_INDEX);
        if gemm::gemm_ex(Some(&handle), &check) != Status::Success {
            continue;
        }
        let run = args.clone().solution_index(index);
        let start = Instant::now();
        let status = gemm::gemm_ex(Some(&handle), &run);
        handle.synchronize().expect("synchronize");
        let ms = start.elapsed().as_secs_f64() * 1e3;
        println!("  solution {index:>4}: {status} in {ms:.2} ms");
        if status == Status::Success && ms < best.1 {
            best = (index, ms);
        }
    }
    println!("fastest by hand: solution {} ({:.2} ms)", best.0, best.1);

    let out = handle.download(&c).expect("download C");
    let expected: f32 = (0..k).map(|p| host_a[p * lda] * host_b[p * ldb]).sum();
    println!("C[0,0] = {} (expected {expected})", out[0]);

    let mut tuner = Tuner::new(&handle, TuneConfig::fast()).with_wisdom(WisdomDb::load_default());
    match tuner.tune_gemm_ex(&args) {
        Ok(report) => println!("{report}"),
        Err(e) => eprintln!("tuning failed: {e}"),
    }
}
