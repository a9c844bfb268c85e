//! Element traits for the closed set of storage and compute types.
//!
//! Kernels are generic over `<Ti, To, Tc>` (input, output, compute) and are
//! instantiated once per supported type combination; the combination is
//! picked from the descriptor's type tags, never by runtime type inspection.

use std::fmt;

use half::{bf16, f16};

use crate::types::{Complex32, Complex64, Datatype, Scalar};

/// A value that can be stored in device memory.
pub trait DeviceElement: Copy + Send + Sync + Default + PartialEq + fmt::Debug + 'static {
    const DATATYPE: Datatype;

    /// Complex conjugate; identity for real types.
    #[inline(always)]
    fn conj(self) -> Self {
        self
    }

    fn is_nan(self) -> bool;

    fn is_inf(self) -> bool;

    fn is_zero(self) -> bool;
}

/// Arithmetic used for accumulation and scaling.
pub trait ComputeScalar: DeviceElement {
    fn zero() -> Self;
    fn one() -> Self;
    fn add(self, rhs: Self) -> Self;
    fn mul(self, rhs: Self) -> Self;

    /// Extract a host scalar of exactly this type.
    fn from_scalar(s: &Scalar) -> Option<Self>;

    #[inline(always)]
    fn mul_add(self, a: Self, b: Self) -> Self {
        self.add(a.mul(b))
    }
}

/// Lossless or rounding conversion between element types.
pub trait Convert<T> {
    fn convert(self) -> T;
}

macro_rules! float_element {
    ($t:ty, $dt:expr) => {
        impl DeviceElement for $t {
            const DATATYPE: Datatype = $dt;
            #[inline(always)]
            fn is_nan(self) -> bool {
                <$t>::is_nan(self)
            }
            #[inline(always)]
            fn is_inf(self) -> bool {
                <$t>::is_infinite(self)
            }
            #[inline(always)]
            fn is_zero(self) -> bool {
                self == <$t>::default()
            }
        }
    };
}

float_element!(f32, Datatype::F32R);
float_element!(f64, Datatype::F64R);
float_element!(f16, Datatype::F16R);
float_element!(bf16, Datatype::Bf16R);

macro_rules! int_element {
    ($t:ty, $dt:expr) => {
        impl DeviceElement for $t {
            const DATATYPE: Datatype = $dt;
            #[inline(always)]
            fn is_nan(self) -> bool {
                false
            }
            #[inline(always)]
            fn is_inf(self) -> bool {
                false
            }
            #[inline(always)]
            fn is_zero(self) -> bool {
                self == 0
            }
        }
    };
}

int_element!(i8, Datatype::I8R);
int_element!(i32, Datatype::I32R);

macro_rules! complex_element {
    ($t:ty, $dt:expr) => {
        impl DeviceElement for $t {
            const DATATYPE: Datatype = $dt;
            #[inline(always)]
            fn conj(self) -> Self {
                <$t>::conj(&self)
            }
            #[inline(always)]
            fn is_nan(self) -> bool {
                self.re.is_nan() || self.im.is_nan()
            }
            #[inline(always)]
            fn is_inf(self) -> bool {
                self.re.is_infinite() || self.im.is_infinite()
            }
            #[inline(always)]
            fn is_zero(self) -> bool {
                self.re == 0.0 && self.im == 0.0
            }
        }
    };
}

complex_element!(Complex32, Datatype::F32C);
complex_element!(Complex64, Datatype::F64C);

macro_rules! compute_scalar {
    ($t:ty, $variant:ident, $zero:expr, $one:expr, add = $add:expr, mul = $mul:expr) => {
        impl ComputeScalar for $t {
            #[inline(always)]
            fn zero() -> Self {
                $zero
            }
            #[inline(always)]
            fn one() -> Self {
                $one
            }
            #[inline(always)]
            fn add(self, rhs: Self) -> Self {
                $add(self, rhs)
            }
            #[inline(always)]
            fn mul(self, rhs: Self) -> Self {
                $mul(self, rhs)
            }
            fn from_scalar(s: &Scalar) -> Option<Self> {
                match *s {
                    Scalar::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

compute_scalar!(f32, F32, 0.0, 1.0, add = |a: f32, b| a + b, mul = |a: f32, b| a * b);
compute_scalar!(f64, F64, 0.0, 1.0, add = |a: f64, b| a + b, mul = |a: f64, b| a * b);
compute_scalar!(f16, F16, f16::ZERO, f16::ONE, add = |a: f16, b| a + b, mul = |a: f16, b| a * b);
compute_scalar!(bf16, Bf16, bf16::ZERO, bf16::ONE, add = |a: bf16, b| a + b, mul = |a: bf16, b| a * b);
// Integer accumulation wraps like the device does.
compute_scalar!(i32, I32, 0, 1, add = i32::wrapping_add, mul = i32::wrapping_mul);
compute_scalar!(
    Complex32,
    C32,
    Complex32::new(0.0, 0.0),
    Complex32::new(1.0, 0.0),
    add = |a: Complex32, b| a + b,
    mul = |a: Complex32, b| a * b
);
compute_scalar!(
    Complex64,
    C64,
    Complex64::new(0.0, 0.0),
    Complex64::new(1.0, 0.0),
    add = |a: Complex64, b| a + b,
    mul = |a: Complex64, b| a * b
);

macro_rules! convert_identity {
    ($($t:ty),*) => {
        $(impl Convert<$t> for $t {
            #[inline(always)]
            fn convert(self) -> $t {
                self
            }
        })*
    };
}

convert_identity!(f32, f64, f16, bf16, i32, Complex32, Complex64);

macro_rules! convert_with {
    ($from:ty => $to:ty, $f:expr) => {
        impl Convert<$to> for $from {
            #[inline(always)]
            fn convert(self) -> $to {
                $f(self)
            }
        }
    };
}

convert_with!(f16 => f32, f16::to_f32);
convert_with!(f32 => f16, f16::from_f32);
convert_with!(bf16 => f32, bf16::to_f32);
convert_with!(f32 => bf16, bf16::from_f32);
convert_with!(i8 => i32, i32::from);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conj_only_affects_complex() {
        assert_eq!(2.5f32.conj(), 2.5);
        assert_eq!(Complex32::new(1.0, 2.0).conj(), Complex32::new(1.0, -2.0));
    }

    #[test]
    fn test_integer_accumulation_wraps() {
        assert_eq!(i32::MAX.add(1), i32::MIN);
        assert_eq!(i32::MAX.mul_add(1, 1), i32::MIN);
    }

    #[test]
    fn test_from_scalar_requires_matching_type() {
        assert_eq!(f32::from_scalar(&Scalar::F32(2.0)), Some(2.0));
        assert_eq!(f32::from_scalar(&Scalar::F64(2.0)), None);
        assert_eq!(i32::from_scalar(&Scalar::I32(7)), Some(7));
    }

    #[test]
    fn test_numeric_classification() {
        assert!(f32::NAN.is_nan());
        assert!(DeviceElement::is_inf(f64::INFINITY));
        assert!(Complex64::new(0.0, f64::NAN).is_nan());
        assert!(!DeviceElement::is_nan(5i8));
        assert!(DeviceElement::is_zero(f16::ZERO));
    }

    #[test]
    fn test_half_round_trip_through_f32() {
        let h = f16::from_f32(1.5);
        let wide: f32 = h.convert();
        let back: f16 = wide.convert();
        assert_eq!(back, h);
    }
}
