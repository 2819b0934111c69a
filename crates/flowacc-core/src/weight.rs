//! Optional per-cell weights.
//!
//! Values are held as `f64` with NaN marking null cells; the kind the weights
//! were read as is kept so the driver can promote an integer accumulation
//! when the weights are fractional.
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::numeric::NumericKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightGrid {
    rows: usize,
    cols: usize,
    kind: NumericKind,
    values: Vec<f64>,
}

impl WeightGrid {
    /// Build from raw values; NaN entries are null.
    pub fn new(rows: usize, cols: usize, values: Vec<f64>, kind: NumericKind) -> Result<Self> {
        if values.len() != rows * cols {
            return Err(Error::DataLength { len: values.len(), rows, cols });
        }
        Ok(Self { rows, cols, kind, values })
    }

    /// Build from optional values, inferring the kind: integral values give
    /// [`NumericKind::Int`], anything fractional gives [`NumericKind::Double`].
    pub fn from_options(rows: usize, cols: usize, values: &[Option<f64>]) -> Result<Self> {
        let integral = values.iter().flatten().all(|v| v.fract() == 0.0);
        let kind = if integral { NumericKind::Int } else { NumericKind::Double };
        let values = values.iter().map(|v| v.unwrap_or(f64::NAN)).collect();
        Self::new(rows, cols, values, kind)
    }

    /// Uniform weight over a `rows × cols` grid.
    pub fn uniform(rows: usize, cols: usize, w: f64) -> Self {
        let kind = if w.fract() == 0.0 { NumericKind::Int } else { NumericKind::Double };
        Self { rows, cols, kind, values: vec![w; rows * cols] }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn kind(&self) -> NumericKind {
        self.kind
    }

    /// `None` for a null cell.
    #[inline]
    pub fn get(&self, idx: usize) -> Option<f64> {
        let v = self.values[idx];
        (!v.is_nan()).then_some(v)
    }

    #[inline]
    pub fn is_null(&self, idx: usize) -> bool {
        self.values[idx].is_nan()
    }

    pub fn check_shape(&self, rows: usize, cols: usize) -> Result<()> {
        if self.rows != rows || self.cols != cols {
            return Err(Error::DimensionMismatch {
                expected_rows: rows,
                expected_cols: cols,
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(())
    }
}

// ── Weight policy ─────────────────────────────────────────────────────────────

/// How the tracer reads a cell's own contribution.
#[derive(Debug, Clone, Copy)]
pub enum Weights<'a> {
    /// Every cell contributes 1.
    Unit,
    /// Null weights are excluded: such cells never feed a neighbour and stay
    /// null themselves.
    Excluding(&'a WeightGrid),
    /// Null weights count as 0.
    NullAsZero(&'a WeightGrid),
}

impl<'a> Weights<'a> {
    pub fn new(grid: Option<&'a WeightGrid>, null_as_zero: bool) -> Self {
        match grid {
            None => Weights::Unit,
            Some(g) if null_as_zero => Weights::NullAsZero(g),
            Some(g) => Weights::Excluding(g),
        }
    }

    /// Contribution of `idx`; `None` only when the cell is excluded.
    #[inline]
    pub fn of(&self, idx: usize) -> Option<f64> {
        match self {
            Weights::Unit => Some(1.0),
            Weights::Excluding(g) => g.get(idx),
            Weights::NullAsZero(g) => Some(g.get(idx).unwrap_or(0.0)),
        }
    }

    #[inline]
    pub fn is_excluded(&self, idx: usize) -> bool {
        match self {
            Weights::Excluding(g) => g.is_null(idx),
            _ => false,
        }
    }
}
