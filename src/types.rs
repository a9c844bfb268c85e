//! Enumerations, flag sets and scalar arguments shared by every routine.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use half::{bf16, f16};
use serde::{Deserialize, Serialize};

use crate::device::DevicePtr;

pub use num_complex::{Complex32, Complex64};

/// Whether an operand is used as stored, transposed or conjugate-transposed.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    None = 111,
    Transpose = 112,
    ConjugateTranspose = 113,
}

impl Operation {
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'N' => Some(Operation::None),
            'T' => Some(Operation::Transpose),
            'C' => Some(Operation::ConjugateTranspose),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Operation::None => 'N',
            Operation::Transpose => 'T',
            Operation::ConjugateTranspose => 'C',
        }
    }

    pub fn is_transposed(self) -> bool {
        self != Operation::None
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Storage type of a matrix, vector or scalar.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Datatype {
    F16R = 150,
    F32R = 151,
    F64R = 152,
    F16C = 153,
    F32C = 154,
    F64C = 155,
    I8R = 160,
    U8R = 161,
    I32R = 162,
    U32R = 163,
    I8C = 164,
    U8C = 165,
    I32C = 166,
    U32C = 167,
    Bf16R = 168,
    Bf16C = 169,
}

impl Datatype {
    pub fn name(self) -> &'static str {
        match self {
            Datatype::F16R => "f16_r",
            Datatype::F32R => "f32_r",
            Datatype::F64R => "f64_r",
            Datatype::F16C => "f16_c",
            Datatype::F32C => "f32_c",
            Datatype::F64C => "f64_c",
            Datatype::I8R => "i8_r",
            Datatype::U8R => "u8_r",
            Datatype::I32R => "i32_r",
            Datatype::U32R => "u32_r",
            Datatype::I8C => "i8_c",
            Datatype::U8C => "u8_c",
            Datatype::I32C => "i32_c",
            Datatype::U32C => "u32_c",
            Datatype::Bf16R => "bf16_r",
            Datatype::Bf16C => "bf16_c",
        }
    }

    /// Size of one element in bytes.
    pub fn size_bytes(self) -> usize {
        match self {
            Datatype::I8R | Datatype::U8R => 1,
            Datatype::F16R | Datatype::Bf16R | Datatype::I8C | Datatype::U8C => 2,
            Datatype::F32R | Datatype::I32R | Datatype::U32R | Datatype::F16C | Datatype::Bf16C => 4,
            Datatype::F64R | Datatype::F32C | Datatype::I32C | Datatype::U32C => 8,
            Datatype::F64C => 16,
        }
    }

    pub fn is_complex(self) -> bool {
        matches!(
            self,
            Datatype::F16C
                | Datatype::F32C
                | Datatype::F64C
                | Datatype::I8C
                | Datatype::U8C
                | Datatype::I32C
                | Datatype::U32C
                | Datatype::Bf16C
        )
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where alpha/beta (and other scalar arguments) live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerMode {
    #[default]
    Host,
    Device,
}

/// Whether kernels may use atomics; recorded on the handle for callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtomicsMode {
    NotAllowed,
    #[default]
    Allowed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GemmAlgo {
    #[default]
    Standard,
}

macro_rules! bitset {
    ($(#[$meta:meta])* $name:ident { $($(#[$cmeta:meta])* $flag:ident = $value:expr),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            $($(#[$cmeta])* pub const $flag: Self = Self($value);)*

            pub const fn from_bits(bits: u32) -> Self {
                Self(bits)
            }

            pub const fn bits(self) -> u32 {
                self.0
            }

            pub const fn contains(self, other: Self) -> bool {
                other.0 != 0 && self.0 & other.0 == other.0
            }

            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }
        }

        impl BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }

        impl BitAnd for $name {
            type Output = Self;
            fn bitand(self, rhs: Self) -> Self {
                Self(self.0 & rhs.0)
            }
        }
    };
}

bitset! {
    /// Which logging layers are active.
    LayerMode {
        NONE = 0x0,
        /// One line per call with the function name and argument values.
        LOG_TRACE = 0x1,
        /// One replayable bench command line per call.
        LOG_BENCH = 0x2,
        /// Aggregated call counts per argument signature.
        LOG_PROFILE = 0x4,
    }
}

bitset! {
    /// NaN/Inf scanning of inputs and outputs.
    CheckNumericsMode {
        NO_CHECK = 0x0,
        /// Log the result of every scan.
        INFO = 0x1,
        /// Log only scans that found NaN or Inf.
        WARN = 0x2,
        /// Fail the call with `CheckNumericsFail` on NaN or Inf.
        FAIL = 0x4,
    }
}

bitset! {
    /// Control flags for the GEMM extended routines.
    GemmFlags {
        NONE = 0x0,
        /// Interpret i8 inputs as packed int8x4.
        PACK_INT8X4 = 0x1,
        /// Validate the solution index without executing.
        CHECK_SOLUTION_INDEX = 0x8,
        /// Trust a non-zero solution index without checking it against the
        /// problem's enumerated solutions.
        SKIP_SOLUTION_CHECK = 0x20,
        /// Reject a zero stride on any operand of a batched call.
        STRICT_BATCH_STRIDE = 0x40,
    }
}

impl fmt::Display for GemmFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A host scalar value tagged with its type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    F16(f16),
    Bf16(bf16),
    F32(f32),
    F64(f64),
    I32(i32),
    C32(Complex32),
    C64(Complex64),
}

impl Scalar {
    pub fn datatype(&self) -> Datatype {
        match self {
            Scalar::F16(_) => Datatype::F16R,
            Scalar::Bf16(_) => Datatype::Bf16R,
            Scalar::F32(_) => Datatype::F32R,
            Scalar::F64(_) => Datatype::F64R,
            Scalar::I32(_) => Datatype::I32R,
            Scalar::C32(_) => Datatype::F32C,
            Scalar::C64(_) => Datatype::F64C,
        }
    }

    pub fn is_zero(&self) -> bool {
        match *self {
            Scalar::F16(v) => v.to_f32() == 0.0,
            Scalar::Bf16(v) => v.to_f32() == 0.0,
            Scalar::F32(v) => v == 0.0,
            Scalar::F64(v) => v == 0.0,
            Scalar::I32(v) => v == 0,
            Scalar::C32(v) => v.re == 0.0 && v.im == 0.0,
            Scalar::C64(v) => v.re == 0.0 && v.im == 0.0,
        }
    }

    pub fn is_one(&self) -> bool {
        match *self {
            Scalar::F16(v) => v.to_f32() == 1.0,
            Scalar::Bf16(v) => v.to_f32() == 1.0,
            Scalar::F32(v) => v == 1.0,
            Scalar::F64(v) => v == 1.0,
            Scalar::I32(v) => v == 1,
            Scalar::C32(v) => v.re == 1.0 && v.im == 0.0,
            Scalar::C64(v) => v.re == 1.0 && v.im == 0.0,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::F16(v) => write!(f, "{v}"),
            Scalar::Bf16(v) => write!(f, "{v}"),
            Scalar::F32(v) => write!(f, "{v}"),
            Scalar::F64(v) => write!(f, "{v}"),
            Scalar::I32(v) => write!(f, "{v}"),
            Scalar::C32(v) => write!(f, "({},{})", v.re, v.im),
            Scalar::C64(v) => write!(f, "({},{})", v.re, v.im),
        }
    }
}

/// A scalar argument: a host value, or a device pointer read when the
/// kernel runs. Must agree with the handle's [`PointerMode`].
#[derive(Debug, Clone)]
pub enum ScalarArg {
    Host(Scalar),
    Device(DevicePtr),
}

impl ScalarArg {
    pub fn host(&self) -> Option<&Scalar> {
        match self {
            ScalarArg::Host(s) => Some(s),
            ScalarArg::Device(_) => None,
        }
    }
}

impl From<Scalar> for ScalarArg {
    fn from(s: Scalar) -> Self {
        ScalarArg::Host(s)
    }
}

impl From<f32> for ScalarArg {
    fn from(v: f32) -> Self {
        ScalarArg::Host(Scalar::F32(v))
    }
}

impl From<f64> for ScalarArg {
    fn from(v: f64) -> Self {
        ScalarArg::Host(Scalar::F64(v))
    }
}

impl From<DevicePtr> for ScalarArg {
    fn from(p: DevicePtr) -> Self {
        ScalarArg::Device(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_contains() {
        let flags = GemmFlags::CHECK_SOLUTION_INDEX | GemmFlags::PACK_INT8X4;
        assert!(flags.contains(GemmFlags::PACK_INT8X4));
        assert!(flags.contains(GemmFlags::CHECK_SOLUTION_INDEX));
        assert!(!flags.contains(GemmFlags::SKIP_SOLUTION_CHECK));
        assert!(!flags.contains(GemmFlags::NONE));
        assert_eq!(flags.bits(), 0x9);
    }

    #[test]
    fn test_operation_chars() {
        for op in [Operation::None, Operation::Transpose, Operation::ConjugateTranspose] {
            assert_eq!(Operation::from_char(op.as_char()), Some(op));
        }
        assert_eq!(Operation::from_char('x'), None);
        assert_eq!(Operation::Transpose as i32, 112);
    }

    #[test]
    fn test_datatype_sizes() {
        assert_eq!(Datatype::I8R.size_bytes(), 1);
        assert_eq!(Datatype::Bf16R.size_bytes(), 2);
        assert_eq!(Datatype::F32C.size_bytes(), 8);
        assert_eq!(Datatype::F64C.size_bytes(), 16);
        assert!(Datatype::F32C.is_complex());
        assert!(!Datatype::F32R.is_complex());
    }

    #[test]
    fn test_scalar_zero_one() {
        assert!(Scalar::F32(0.0).is_zero());
        assert!(Scalar::C64(Complex64::new(1.0, 0.0)).is_one());
        assert!(!Scalar::C32(Complex32::new(1.0, 1.0)).is_one());
        assert!(Scalar::F16(f16::from_f32(1.0)).is_one());
        assert_eq!(Scalar::I32(3).datatype(), Datatype::I32R);
    }
}
