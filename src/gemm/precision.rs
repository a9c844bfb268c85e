//! The closed set of GEMM type combinations.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::status::{BlasError, BlasResult};
use crate::types::Datatype;

/// Input (A, B), output (C, D) and compute type of a GEMM, as one tag.
///
/// Alpha and beta always have the compute type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Precision {
    /// f64 everywhere.
    F64,
    /// f32 everywhere.
    F32,
    /// f16 everywhere.
    F16,
    /// f16 storage, f32 accumulation.
    F16ComputeF32,
    /// f16 inputs, f32 output and accumulation.
    F16OutF32,
    /// bf16 storage, f32 accumulation.
    Bf16,
    /// bf16 inputs, f32 output and accumulation.
    Bf16OutF32,
    /// i8 inputs, i32 output and accumulation.
    I8I32,
    C32,
    C64,
}

impl Precision {
    /// Catalog registration order.
    pub const ALL: [Precision; 10] = [
        Precision::F64,
        Precision::F32,
        Precision::F16,
        Precision::F16ComputeF32,
        Precision::F16OutF32,
        Precision::Bf16,
        Precision::Bf16OutF32,
        Precision::I8I32,
        Precision::C32,
        Precision::C64,
    ];

    /// Resolve the per-operand type tags of a call.
    pub fn from_types(
        a: Datatype,
        b: Datatype,
        c: Datatype,
        d: Datatype,
        compute: Datatype,
    ) -> BlasResult<Self> {
        if a != b || c != d {
            return Err(unsupported(a, b, c, d, compute));
        }
        Self::from_io(a, c, compute).ok_or_else(|| unsupported(a, b, c, d, compute))
    }

    /// Resolve from input, output and compute type alone.
    pub fn from_io(input: Datatype, output: Datatype, compute: Datatype) -> Option<Self> {
        use Datatype::*;
        let p = match (input, output, compute) {
            (F64R, F64R, F64R) => Precision::F64,
            (F32R, F32R, F32R) => Precision::F32,
            (F16R, F16R, F16R) => Precision::F16,
            (F16R, F16R, F32R) => Precision::F16ComputeF32,
            (F16R, F32R, F32R) => Precision::F16OutF32,
            (Bf16R, Bf16R, F32R) => Precision::Bf16,
            (Bf16R, F32R, F32R) => Precision::Bf16OutF32,
            (I8R, I32R, I32R) => Precision::I8I32,
            (F32C, F32C, F32C) => Precision::C32,
            (F64C, F64C, F64C) => Precision::C64,
            _ => return None,
        };
        Some(p)
    }

    pub fn input_type(self) -> Datatype {
        match self {
            Precision::F64 => Datatype::F64R,
            Precision::F32 => Datatype::F32R,
            Precision::F16 | Precision::F16ComputeF32 | Precision::F16OutF32 => Datatype::F16R,
            Precision::Bf16 | Precision::Bf16OutF32 => Datatype::Bf16R,
            Precision::I8I32 => Datatype::I8R,
            Precision::C32 => Datatype::F32C,
            Precision::C64 => Datatype::F64C,
        }
    }

    pub fn output_type(self) -> Datatype {
        match self {
            Precision::F16 | Precision::F16ComputeF32 => Datatype::F16R,
            Precision::Bf16 => Datatype::Bf16R,
            Precision::F16OutF32 | Precision::Bf16OutF32 | Precision::F32 => Datatype::F32R,
            Precision::F64 => Datatype::F64R,
            Precision::I8I32 => Datatype::I32R,
            Precision::C32 => Datatype::F32C,
            Precision::C64 => Datatype::F64C,
        }
    }

    pub fn compute_type(self) -> Datatype {
        match self {
            Precision::F64 => Datatype::F64R,
            Precision::F16 => Datatype::F16R,
            Precision::I8I32 => Datatype::I32R,
            Precision::C32 => Datatype::F32C,
            Precision::C64 => Datatype::F64C,
            _ => Datatype::F32R,
        }
    }

    pub fn is_complex(self) -> bool {
        matches!(self, Precision::C32 | Precision::C64)
    }

    /// Short tag used in solution names.
    pub fn tag(self) -> &'static str {
        match self {
            Precision::F64 => "DB",
            Precision::F32 => "SB",
            Precision::F16 => "HB",
            Precision::F16ComputeF32 => "HBH",
            Precision::F16OutF32 => "HSS",
            Precision::Bf16 => "BBS",
            Precision::Bf16OutF32 => "BSS",
            Precision::I8I32 => "I8II",
            Precision::C32 => "CB",
            Precision::C64 => "ZB",
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.input_type(),
            self.output_type(),
            self.compute_type()
        )
    }
}

fn unsupported(a: Datatype, b: Datatype, c: Datatype, d: Datatype, compute: Datatype) -> BlasError {
    BlasError::NotImplemented(format!(
        "gemm with a={a} b={b} c={c} d={d} compute={compute}"
    ))
}
