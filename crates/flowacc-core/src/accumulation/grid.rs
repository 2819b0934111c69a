//! Accumulation storage: the shared atomic grid written during a run, and
//! the plain raster it becomes afterwards.
use serde::Serialize;

use super::config::ZeroMode;
use crate::numeric::Accumulator;

/// One atomic slot per cell, every slot written at most once.
pub struct AccumGrid<A: Accumulator> {
    cells: Vec<A::Atomic>,
}

impl<A: Accumulator> AccumGrid<A> {
    /// All cells unset.
    pub fn new(len: usize) -> Self {
        Self { cells: (0..len).map(|_| A::unset()).collect() }
    }

    #[inline]
    pub fn load(&self, idx: usize) -> Option<A> {
        A::load(&self.cells[idx])
    }

    /// Finalize `idx`. `false` means it was already final.
    #[inline]
    pub fn claim(&self, idx: usize, value: A) -> bool {
        A::claim(&self.cells[idx], value)
    }

    pub fn into_raster(self, rows: usize, cols: usize) -> AccumRaster<A> {
        let data = self.cells.iter().map(A::load).collect();
        AccumRaster { rows, cols, data }
    }
}

/// Finished accumulation, row-major; `None` is null.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccumRaster<A> {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<Option<A>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    /// Cells holding a value.
    pub valued: usize,
    pub null: usize,
    pub max: Option<f64>,
}

impl<A: Accumulator> AccumRaster<A> {
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<A> {
        self.data[row * self.cols + col]
    }

    pub fn apply_zero_mode(&mut self, mode: ZeroMode) {
        match mode {
            ZeroMode::Null => {}
            ZeroMode::ZeroThenNullify => {
                for v in &mut self.data {
                    if v.is_some_and(A::is_zero) {
                        *v = None;
                    }
                }
            }
            ZeroMode::LeaveZero => {
                for v in &mut self.data {
                    v.get_or_insert_with(A::zero);
                }
            }
        }
    }

    pub fn summary(&self) -> Summary {
        let valued = self.data.iter().flatten().count();
        let max = self
            .data
            .iter()
            .flatten()
            .map(|v| v.to_f64())
            .fold(None, |m: Option<f64>, v| Some(m.map_or(v, |m| m.max(v))));
        Summary { valued, null: self.data.len() - valued, max }
    }
}
