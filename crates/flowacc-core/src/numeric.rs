//! Numeric kinds for accumulation values.
//!
//! Every run accumulates in exactly one kind, picked once up front. The
//! [`Accumulator`] trait carries everything the engine needs from that kind:
//! its atomic cell storage, the null sentinel marking an unset cell, and both
//! native and checked addition.
use std::fmt;
use std::sync::atomic::{AtomicI32, AtomicU32, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Numeric kind of an accumulation or weight grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumericKind {
    /// 32-bit signed integer.
    Int,
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
}

impl NumericKind {
    /// The next kind able to hold larger values, if any.
    pub fn wider(self) -> Option<NumericKind> {
        match self {
            NumericKind::Int => Some(NumericKind::Float),
            NumericKind::Float => Some(NumericKind::Double),
            NumericKind::Double => None,
        }
    }

    pub fn overflow_hint(self) -> String {
        match self.wider() {
            Some(w) => format!("rerun with the wider {w} kind"),
            None => "no wider kind is available".to_string(),
        }
    }

    /// Kind to accumulate in when weights of kind `weight` are summed as `self`.
    ///
    /// Integer accumulation of fractional weights takes the weight's kind;
    /// every other combination keeps the requested kind.
    pub fn promote_for_weight(self, weight: NumericKind) -> NumericKind {
        match (self, weight) {
            (NumericKind::Int, NumericKind::Float) => NumericKind::Float,
            (NumericKind::Int, NumericKind::Double) => NumericKind::Double,
            (acc, _) => acc,
        }
    }
}

impl fmt::Display for NumericKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NumericKind::Int => "int",
            NumericKind::Float => "float",
            NumericKind::Double => "double",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for NumericKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "int" | "cell" | "integer" => Ok(NumericKind::Int),
            "float" | "fcell" => Ok(NumericKind::Float),
            "double" | "dcell" => Ok(NumericKind::Double),
            other => Err(format!("unknown numeric kind '{other}' (expected int, float or double)")),
        }
    }
}

// ── Accumulator trait ─────────────────────────────────────────────────────────

/// A value type the accumulation grid can be built from.
///
/// Cells live in `Self::Atomic`. The unset state is the kind's null
/// representation and never collides with a value produced by checked
/// arithmetic. All loads and claims are `SeqCst`: a branch that claims a cell
/// and then reads its siblings must see every claim ordered before its own.
pub trait Accumulator:
    Copy + Clone + fmt::Debug + PartialEq + PartialOrd + Send + Sync + Serialize + 'static
{
    const KIND: NumericKind;

    type Atomic: Send + Sync;

    /// A fresh cell in the unset state.
    fn unset() -> Self::Atomic;

    /// `None` while the cell is unset.
    fn load(cell: &Self::Atomic) -> Option<Self>;

    /// Moves the cell from unset to `value`. Returns `false` if another
    /// writer got there first; the cell is left untouched in that case.
    fn claim(cell: &Self::Atomic, value: Self) -> bool;

    fn zero() -> Self;

    fn from_weight(w: f64) -> Self;

    /// `None` when `w` has no exact-enough representation in this kind.
    fn try_from_weight(w: f64) -> Option<Self>;

    /// Native addition: wraps for integers, IEEE for floats.
    fn add(self, rhs: Self) -> Self;

    /// Sum of `values`, or `None` when the total is not representable.
    /// Only the total is checked: intermediate sums are carried wide enough
    /// that mixed signs cannot overflow on the way.
    fn checked_sum(values: &[Self]) -> Option<Self>;

    fn is_zero(self) -> bool {
        self == Self::zero()
    }

    fn to_f64(self) -> f64;
}

/// Null sentinel shared by integer rasters.
pub const INT_NULL: i32 = i32::MIN;

/// Quiet NaN with a payload, kept apart from NaNs produced by arithmetic.
const F32_UNSET_BITS: u32 = 0x7FE5_A5A5;
const F64_UNSET_BITS: u64 = 0x7FFC_A5A5_A5A5_A5A5;

impl Accumulator for i32 {
    const KIND: NumericKind = NumericKind::Int;
    type Atomic = AtomicI32;

    fn unset() -> AtomicI32 {
        AtomicI32::new(INT_NULL)
    }

    #[inline]
    fn load(cell: &AtomicI32) -> Option<i32> {
        match cell.load(Ordering::SeqCst) {
            INT_NULL => None,
            v => Some(v),
        }
    }

    #[inline]
    fn claim(cell: &AtomicI32, value: i32) -> bool {
        cell.compare_exchange(INT_NULL, value, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn zero() -> i32 {
        0
    }

    fn from_weight(w: f64) -> i32 {
        w as i32
    }

    fn try_from_weight(w: f64) -> Option<i32> {
        (w.fract() == 0.0 && w > INT_NULL as f64 && w <= i32::MAX as f64).then(|| w as i32)
    }

    #[inline]
    fn add(self, rhs: i32) -> i32 {
        self.wrapping_add(rhs)
    }

    fn checked_sum(values: &[i32]) -> Option<i32> {
        let total: i64 = values.iter().map(|&v| v as i64).sum();
        // i32::MIN is the null sentinel, so it is out of range as a sum too.
        i32::try_from(total).ok().filter(|&v| v != INT_NULL)
    }

    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl Accumulator for f32 {
    const KIND: NumericKind = NumericKind::Float;
    type Atomic = AtomicU32;

    fn unset() -> AtomicU32 {
        AtomicU32::new(F32_UNSET_BITS)
    }

    #[inline]
    fn load(cell: &AtomicU32) -> Option<f32> {
        match cell.load(Ordering::SeqCst) {
            F32_UNSET_BITS => None,
            bits => Some(f32::from_bits(bits)),
        }
    }

    #[inline]
    fn claim(cell: &AtomicU32, value: f32) -> bool {
        cell.compare_exchange(F32_UNSET_BITS, value.to_bits(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn zero() -> f32 {
        0.0
    }

    fn from_weight(w: f64) -> f32 {
        w as f32
    }

    fn try_from_weight(w: f64) -> Option<f32> {
        Some(w as f32).filter(|v| v.is_finite())
    }

    #[inline]
    fn add(self, rhs: f32) -> f32 {
        self + rhs
    }

    fn checked_sum(values: &[f32]) -> Option<f32> {
        let native = values.iter().fold(0.0f32, |s, &v| s + v);
        if native.is_finite() {
            return Some(native);
        }
        // A partial sum left the f32 range; redo it in f64.
        let wide = values.iter().fold(0.0f64, |s, &v| s + v as f64) as f32;
        wide.is_finite().then_some(wide)
    }

    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl Accumulator for f64 {
    const KIND: NumericKind = NumericKind::Double;
    type Atomic = AtomicU64;

    fn unset() -> AtomicU64 {
        AtomicU64::new(F64_UNSET_BITS)
    }

    #[inline]
    fn load(cell: &AtomicU64) -> Option<f64> {
        match cell.load(Ordering::SeqCst) {
            F64_UNSET_BITS => None,
            bits => Some(f64::from_bits(bits)),
        }
    }

    #[inline]
    fn claim(cell: &AtomicU64, value: f64) -> bool {
        cell.compare_exchange(F64_UNSET_BITS, value.to_bits(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn zero() -> f64 {
        0.0
    }

    fn from_weight(w: f64) -> f64 {
        w
    }

    fn try_from_weight(w: f64) -> Option<f64> {
        w.is_finite().then_some(w)
    }

    #[inline]
    fn add(self, rhs: f64) -> f64 {
        self + rhs
    }

    fn checked_sum(values: &[f64]) -> Option<f64> {
        let native = values.iter().fold(0.0f64, |s, &v| s + v);
        if native.is_finite() {
            return Some(native);
        }
        // No wider kind: scale by a power of two so no partial sum of up to
        // nine finite values can leave the range, then scale back.
        let scaled = values.iter().fold(0.0f64, |s, &v| s + v / 16.0) * 16.0;
        scaled.is_finite().then_some(scaled)
    }

    fn to_f64(self) -> f64 {
        self
    }
}
