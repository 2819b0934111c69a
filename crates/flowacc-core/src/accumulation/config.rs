//! Run configuration.
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::numeric::NumericKind;

/// What the output holds for cells without flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroMode {
    /// Unreached cells are null; finalized zeros stay zero.
    #[default]
    Null,
    /// Unreached cells are null and so is every finalized zero.
    ZeroThenNullify,
    /// Unreached cells read as zero.
    LeaveZero,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccumConfig {
    /// Requested accumulation kind. May be widened to match fractional weights.
    pub kind: NumericKind,
    /// Abort with [`Error::Overflow`] instead of wrapping or going infinite.
    pub check_overflow: bool,
    /// Recompute upstream masks on demand instead of storing one byte per cell.
    pub use_less_memory: bool,
    pub zero_mode: ZeroMode,
    /// Read null weights as 0 instead of excluding those cells.
    pub null_weight_as_zero: bool,
    /// Worker count; `None` uses the global pool.
    pub threads: Option<usize>,
    /// Reject direction grids containing a cycle before accumulating.
    pub detect_cycles: bool,
}

impl Default for AccumConfig {
    fn default() -> Self {
        Self {
            kind: NumericKind::Double,
            check_overflow: false,
            use_less_memory: false,
            zero_mode: ZeroMode::Null,
            null_weight_as_zero: false,
            threads: None,
            detect_cycles: false,
        }
    }
}

impl AccumConfig {
    /// Set the zero mode from the two command-line style flags, which are
    /// mutually exclusive.
    pub fn with_zero_flags(mut self, nullify_zero: bool, leave_zero: bool) -> Result<Self> {
        self.zero_mode = match (nullify_zero, leave_zero) {
            (true, true) => {
                return Err(Error::Config(
                    "zero_then_nullify and leave_zero are mutually exclusive".into(),
                ))
            }
            (true, false) => ZeroMode::ZeroThenNullify,
            (false, true) => ZeroMode::LeaveZero,
            (false, false) => ZeroMode::Null,
        };
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.threads == Some(0) {
            return Err(Error::Config("thread count must be at least 1".into()));
        }
        Ok(())
    }
}
