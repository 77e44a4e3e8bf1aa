//! Floating-Point Unit (FPU).
//!
//! This module implements the single-precision (F) and double-precision (D)
//! operations on raw IEEE 754 bit patterns. Rounding-sensitive operations run
//! on a software floating-point model so that the requested rounding mode is
//! honored exactly and the raised exception flags are observable; the host
//! floating-point environment is never touched.
//!
//! Operands and results are bit patterns: single-precision values occupy the
//! low 32 bits (NaN-boxing is the register file's job). Every NaN produced by
//! an arithmetic operation is the canonical NaN.

use std::cmp::Ordering;

use simple_soft_float::{FPState, RoundingMode, StatusFlags, F32, F64};

/// Accrued exception flag bits of `fflags`.
pub mod fflags {
    /// Inexact.
    pub const NX: u64 = 1;
    /// Underflow.
    pub const UF: u64 = 2;
    /// Overflow.
    pub const OF: u64 = 4;
    /// Divide by zero.
    pub const DZ: u64 = 8;
    /// Invalid operation.
    pub const NV: u64 = 16;
}

/// Operand precision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FpFormat {
    Single,
    Double,
}

impl FpFormat {
    /// Returns the instruction suffix of the format.
    pub fn suffix(self) -> &'static str {
        match self {
            FpFormat::Single => "s",
            FpFormat::Double => "d",
        }
    }

    fn sign_bit(self) -> u64 {
        match self {
            FpFormat::Single => 1 << 31,
            FpFormat::Double => 1 << 63,
        }
    }

    fn width_mask(self) -> u64 {
        match self {
            FpFormat::Single => 0xffff_ffff,
            FpFormat::Double => u64::MAX,
        }
    }

    /// Returns `(exponent mask, mantissa mask, quiet bit)`.
    fn fields(self) -> (u64, u64, u64) {
        match self {
            FpFormat::Single => (0x7f80_0000, 0x007f_ffff, 0x0040_0000),
            FpFormat::Double => (0x7ff0_0000_0000_0000, 0x000f_ffff_ffff_ffff, 1 << 51),
        }
    }

    /// Returns the canonical quiet NaN of the format.
    pub fn canonical_nan(self) -> u64 {
        match self {
            FpFormat::Single => 0x7fc0_0000,
            FpFormat::Double => 0x7ff8_0000_0000_0000,
        }
    }

    pub fn is_nan(self, bits: u64) -> bool {
        let (exp, man, _) = self.fields();
        bits & exp == exp && bits & man != 0
    }

    pub fn is_signaling_nan(self, bits: u64) -> bool {
        let (_, _, quiet) = self.fields();
        self.is_nan(bits) && bits & quiet == 0
    }
}

/// Two-operand arithmetic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FpBinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl FpBinOp {
    pub fn name(self) -> &'static str {
        match self {
            FpBinOp::Add => "fadd",
            FpBinOp::Sub => "fsub",
            FpBinOp::Mul => "fmul",
            FpBinOp::Div => "fdiv",
        }
    }
}

/// Fused multiply-add flavors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FmaOp {
    /// `a*b + c`
    MAdd,
    /// `a*b - c`
    MSub,
    /// `-(a*b) + c`
    NMSub,
    /// `-(a*b) - c`
    NMAdd,
}

impl FmaOp {
    pub fn name(self) -> &'static str {
        match self {
            FmaOp::MAdd => "fmadd",
            FmaOp::MSub => "fmsub",
            FmaOp::NMSub => "fnmsub",
            FmaOp::NMAdd => "fnmadd",
        }
    }
}

/// Sign-injection flavors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SgnjOp {
    Copy,
    Negate,
    Xor,
}

impl SgnjOp {
    pub fn name(self) -> &'static str {
        match self {
            SgnjOp::Copy => "fsgnj",
            SgnjOp::Negate => "fsgnjn",
            SgnjOp::Xor => "fsgnjx",
        }
    }
}

/// Comparisons writing an integer register.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FpCmpOp {
    Eq,
    Lt,
    Le,
}

impl FpCmpOp {
    pub fn name(self) -> &'static str {
        match self {
            FpCmpOp::Eq => "feq",
            FpCmpOp::Lt => "flt",
            FpCmpOp::Le => "fle",
        }
    }
}

/// Integer side of a conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IntType {
    W,
    Wu,
    L,
    Lu,
}

impl IntType {
    pub fn name(self) -> &'static str {
        match self {
            IntType::W => "w",
            IntType::Wu => "wu",
            IntType::L => "l",
            IntType::Lu => "lu",
        }
    }

    /// Returns true for the 64-bit integer types, which need RV64.
    pub fn is_64(self) -> bool {
        matches!(self, IntType::L | IntType::Lu)
    }
}

/// Result bits plus the exception flags raised while producing them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FpResult {
    pub value: u64,
    pub flags: u64,
}

macro_rules! soft {
    ($fmt:expr, $F:ident => $body:expr) => {
        match $fmt {
            FpFormat::Single => {
                type $F = F32;
                $body
            }
            FpFormat::Double => {
                type $F = F64;
                $body
            }
        }
    };
}

/// Floating-Point Unit.
pub struct Fpu;

impl Fpu {
    /// Maps an instruction or `frm` rounding-mode field to a rounding mode.
    ///
    /// # Returns
    ///
    /// `None` for the reserved encodings 5, 6 and 7.
    pub fn rounding_mode(rm: u64) -> Option<RoundingMode> {
        match rm {
            0 => Some(RoundingMode::TiesToEven),
            1 => Some(RoundingMode::TowardZero),
            2 => Some(RoundingMode::TowardNegative),
            3 => Some(RoundingMode::TowardPositive),
            4 => Some(RoundingMode::TiesToAway),
            _ => None,
        }
    }

    fn flags(st: &FPState) -> u64 {
        let f = st.status_flags;
        let mut bits = 0;
        if f.contains(StatusFlags::INVALID_OPERATION) {
            bits |= fflags::NV;
        }
        if f.contains(StatusFlags::DIVISION_BY_ZERO) {
            bits |= fflags::DZ;
        }
        if f.contains(StatusFlags::OVERFLOW) {
            bits |= fflags::OF;
        }
        if f.contains(StatusFlags::UNDERFLOW) {
            bits |= fflags::UF;
        }
        if f.contains(StatusFlags::INEXACT) {
            bits |= fflags::NX;
        }
        bits
    }

    fn finish(fmt: FpFormat, value: u64, st: &FPState) -> FpResult {
        let value = value & fmt.width_mask();
        let value = if fmt.is_nan(value) {
            fmt.canonical_nan()
        } else {
            value
        };
        FpResult {
            value,
            flags: Self::flags(st),
        }
    }

    /// Executes `fadd`/`fsub`/`fmul`/`fdiv`.
    pub fn binary(op: FpBinOp, fmt: FpFormat, a: u64, b: u64, rm: RoundingMode) -> FpResult {
        let mut st = FPState::default();
        let value = soft!(fmt, F => {
            let x = F::from_bits(a as _);
            let y = F::from_bits(b as _);
            let r = match op {
                FpBinOp::Add => x.add(&y, Some(rm), Some(&mut st)),
                FpBinOp::Sub => x.sub(&y, Some(rm), Some(&mut st)),
                FpBinOp::Mul => x.mul(&y, Some(rm), Some(&mut st)),
                FpBinOp::Div => x.div(&y, Some(rm), Some(&mut st)),
            };
            r.into_bits() as u64
        });
        Self::finish(fmt, value, &st)
    }

    /// Executes `fsqrt`.
    pub fn sqrt(fmt: FpFormat, a: u64, rm: RoundingMode) -> FpResult {
        let mut st = FPState::default();
        let value = soft!(fmt, F => {
            let x = F::from_bits(a as _);
            x.sqrt(Some(rm), Some(&mut st)).into_bits() as u64
        });
        Self::finish(fmt, value, &st)
    }

    /// Executes the fused multiply-add family with a single rounding.
    pub fn fma(op: FmaOp, fmt: FpFormat, a: u64, b: u64, c: u64, rm: RoundingMode) -> FpResult {
        let mut st = FPState::default();
        let value = soft!(fmt, F => {
            let mut x = F::from_bits(a as _);
            let y = F::from_bits(b as _);
            let mut z = F::from_bits(c as _);
            if matches!(op, FmaOp::NMSub | FmaOp::NMAdd) {
                x.toggle_sign();
            }
            if matches!(op, FmaOp::MSub | FmaOp::NMAdd) {
                z.toggle_sign();
            }
            x.fused_mul_add(&y, &z, Some(rm), Some(&mut st)).into_bits() as u64
        });
        Self::finish(fmt, value, &st)
    }

    /// Executes sign injection. No flags are raised and NaN payloads are
    /// preserved.
    pub fn sgnj(op: SgnjOp, fmt: FpFormat, a: u64, b: u64) -> u64 {
        let sign = fmt.sign_bit();
        let a = a & fmt.width_mask();
        let sign_b = match op {
            SgnjOp::Copy => b & sign,
            SgnjOp::Negate => !b & sign,
            SgnjOp::Xor => (a ^ b) & sign,
        };
        (a & !sign) | sign_b
    }

    /// Executes `fmin`/`fmax`.
    ///
    /// Only signaling NaN inputs raise invalid. A single NaN input yields
    /// the other operand; two NaNs yield the canonical NaN. -0 orders below
    /// +0.
    pub fn min_max(is_max: bool, fmt: FpFormat, a: u64, b: u64) -> FpResult {
        let (a, b) = (a & fmt.width_mask(), b & fmt.width_mask());
        let mut flags = 0;
        if fmt.is_signaling_nan(a) || fmt.is_signaling_nan(b) {
            flags |= fflags::NV;
        }
        let value = match (fmt.is_nan(a), fmt.is_nan(b)) {
            (true, true) => fmt.canonical_nan(),
            (true, false) => b,
            (false, true) => a,
            (false, false) => {
                let order = match fmt {
                    FpFormat::Single => {
                        f32::from_bits(a as u32).partial_cmp(&f32::from_bits(b as u32))
                    }
                    FpFormat::Double => f64::from_bits(a).partial_cmp(&f64::from_bits(b)),
                };
                match order {
                    Some(Ordering::Less) => {
                        if is_max {
                            b
                        } else {
                            a
                        }
                    }
                    Some(Ordering::Greater) => {
                        if is_max {
                            a
                        } else {
                            b
                        }
                    }
                    // Equal values differ at most in the sign of zero.
                    _ => {
                        if is_max {
                            a & b
                        } else {
                            a | b
                        }
                    }
                }
            }
        };
        FpResult { value, flags }
    }

    /// Executes `feq`/`flt`/`fle`.
    ///
    /// `feq` is a quiet comparison (invalid only for signaling NaNs); `flt`
    /// and `fle` signal invalid for any NaN.
    pub fn compare(op: FpCmpOp, fmt: FpFormat, a: u64, b: u64) -> FpResult {
        let mut st = FPState::default();
        let order = soft!(fmt, F => {
            let x = F::from_bits(a as _);
            let y = F::from_bits(b as _);
            match op {
                FpCmpOp::Eq => x.compare_quiet(&y, Some(&mut st)),
                FpCmpOp::Lt | FpCmpOp::Le => x.compare_signaling(&y, Some(&mut st)),
            }
        });
        let hit = match op {
            FpCmpOp::Eq => order == Some(Ordering::Equal),
            FpCmpOp::Lt => order == Some(Ordering::Less),
            FpCmpOp::Le => matches!(order, Some(Ordering::Less | Ordering::Equal)),
        };
        FpResult {
            value: hit as u64,
            flags: Self::flags(&st),
        }
    }

    /// Executes `fclass`, returning the one-hot class mask.
    pub fn classify(fmt: FpFormat, a: u64) -> u64 {
        let a = a & fmt.width_mask();
        let (exp, man, _) = fmt.fields();
        let neg = a & fmt.sign_bit() != 0;
        let (e, m) = (a & exp, a & man);
        let bit = if e == exp {
            if m == 0 {
                if neg {
                    0
                } else {
                    7
                }
            } else if fmt.is_signaling_nan(a) {
                8
            } else {
                9
            }
        } else if e == 0 {
            match (m == 0, neg) {
                (true, true) => 3,
                (true, false) => 4,
                (false, true) => 2,
                (false, false) => 5,
            }
        } else if neg {
            1
        } else {
            6
        };
        1 << bit
    }

    /// Converts a float to an integer, saturating out-of-range values and
    /// NaN (which converts to the maximum value). 32-bit results are
    /// sign-extended to 64 bits.
    pub fn to_int(fmt: FpFormat, a: u64, ty: IntType, rm: RoundingMode) -> FpResult {
        let mut st = FPState::default();
        let converted = soft!(fmt, F => {
            let x = F::from_bits(a as _);
            match ty {
                IntType::W => x.to_i32(true, Some(rm), Some(&mut st)).map(|v| v as i64 as u64),
                IntType::Wu => x
                    .to_u32(true, Some(rm), Some(&mut st))
                    .map(|v| v as i32 as i64 as u64),
                IntType::L => x.to_i64(true, Some(rm), Some(&mut st)).map(|v| v as u64),
                IntType::Lu => x.to_u64(true, Some(rm), Some(&mut st)),
            }
        });
        if let Some(value) = converted {
            return FpResult {
                value,
                flags: Self::flags(&st),
            };
        }

        let negative = !fmt.is_nan(a) && a & fmt.sign_bit() != 0;
        let value = match (ty, negative) {
            (IntType::W, false) => i32::MAX as i64 as u64,
            (IntType::W, true) => i32::MIN as i64 as u64,
            (IntType::Wu, false) => u64::MAX,
            (IntType::Wu, true) => 0,
            (IntType::L, false) => i64::MAX as u64,
            (IntType::L, true) => i64::MIN as u64,
            (IntType::Lu, false) => u64::MAX,
            (IntType::Lu, true) => 0,
        };
        FpResult {
            value,
            flags: fflags::NV,
        }
    }

    /// Converts an integer register value to a float.
    pub fn from_int(fmt: FpFormat, v: u64, ty: IntType, rm: RoundingMode) -> FpResult {
        let mut st = FPState::default();
        let value = soft!(fmt, F => {
            let r = match ty {
                IntType::W => F::from_i32(v as i32, Some(rm), Some(&mut st)),
                IntType::Wu => F::from_u32(v as u32, Some(rm), Some(&mut st)),
                IntType::L => F::from_i64(v as i64, Some(rm), Some(&mut st)),
                IntType::Lu => F::from_u64(v, Some(rm), Some(&mut st)),
            };
            r.into_bits() as u64
        });
        Self::finish(fmt, value, &st)
    }

    /// Converts between single and double precision.
    pub fn convert(from: FpFormat, to: FpFormat, a: u64, rm: RoundingMode) -> FpResult {
        let mut st = FPState::default();
        let value = match (from, to) {
            (FpFormat::Single, FpFormat::Double) => {
                let x = F32::from_bits(a as u32);
                F64::convert_from_float(&x, Some(rm), Some(&mut st)).into_bits()
            }
            (FpFormat::Double, FpFormat::Single) => {
                let x = F64::from_bits(a);
                F32::convert_from_float(&x, Some(rm), Some(&mut st)).into_bits() as u64
            }
            _ => a,
        };
        Self::finish(to, value, &st)
    }
}
