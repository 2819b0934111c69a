//! Downstream tracing and upstream aggregation.
//!
//! A branch starts at a seed with the seed's own weight, finalizes it, and
//! walks downstream. At each join it sums the finalized upstream values; if
//! any is still unset the branch ends there and the last sibling to arrive
//! finishes the join instead.
use super::grid::AccumGrid;
use super::upstream::Dependencies;
use crate::direction::{DirectionGrid, DIRECTIONS};
use crate::error::{Error, Result};
use crate::numeric::Accumulator;
use crate::weight::Weights;

/// Everything a branch reads, shared by all workers.
pub struct TraceContext<'a, A: Accumulator> {
    pub dirs: &'a DirectionGrid,
    pub weights: Weights<'a>,
    pub deps: &'a Dependencies,
    pub grid: &'a AccumGrid<A>,
    pub check_overflow: bool,
}

/// Result of summing a cell's contributors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregate<A> {
    Ready(A),
    /// At least one contributor is unset.
    NotReady,
    /// Only reported when overflow checking is on.
    Overflow,
}

/// Finalized values feeding one cell, in direction order, with room for the
/// cell's own weight.
struct Inflow<A> {
    values: [A; 9],
    len: usize,
}

impl<A: Accumulator> Inflow<A> {
    fn push(&mut self, v: A) {
        self.values[self.len] = v;
        self.len += 1;
    }

    fn as_slice(&self) -> &[A] {
        &self.values[..self.len]
    }
}

impl<'a, A: Accumulator> TraceContext<'a, A> {
    /// Sum in fixed order. With overflow checking only the total is checked.
    #[inline]
    fn total(&self, values: &[A]) -> Option<A> {
        if self.check_overflow {
            A::checked_sum(values)
        } else {
            Some(values.iter().fold(A::zero(), |s, &v| s.add(v)))
        }
    }

    /// Own contribution of `idx` in the accumulation kind. `Ok(None)` when
    /// the cell is excluded.
    #[inline]
    fn own(&self, idx: usize) -> Result<Option<A>> {
        let Some(w) = self.weights.of(idx) else { return Ok(None) };
        if !self.check_overflow {
            return Ok(Some(A::from_weight(w)));
        }
        A::try_from_weight(w).map(Some).ok_or_else(|| self.overflow(idx))
    }

    fn overflow(&self, idx: usize) -> Error {
        Error::Overflow {
            row: idx / self.dirs.cols(),
            col: idx % self.dirs.cols(),
            kind: A::KIND,
        }
    }

    /// Every neighbour flagged in `mask`, or `None` if any is still unset.
    fn inflow(&self, idx: usize, mask: u8) -> Option<Inflow<A>> {
        let mut inflow = Inflow { values: [A::zero(); 9], len: 0 };
        for d in DIRECTIONS {
            if mask & d == 0 {
                continue;
            }
            let Some(n) = self.dirs.neighbor(idx, d) else { continue };
            inflow.push(self.grid.load(n)?);
        }
        Some(inflow)
    }

    /// Sum of the finalized values of every neighbour flagged in `mask`.
    /// The cell's own weight is not included.
    pub fn sum_up(&self, idx: usize, mask: u8) -> Aggregate<A> {
        self.aggregate(idx, mask, None)
    }

    /// Inflow of `idx` plus `own`, checked as one total.
    fn aggregate(&self, idx: usize, mask: u8, own: Option<A>) -> Aggregate<A> {
        let Some(mut inflow) = self.inflow(idx, mask) else {
            return Aggregate::NotReady;
        };
        if let Some(own) = own {
            inflow.push(own);
        }
        match self.total(inflow.as_slice()) {
            Some(v) => Aggregate::Ready(v),
            None => Aggregate::Overflow,
        }
    }

    /// Start a branch at seed `idx`.
    pub fn trace_seed(&self, idx: usize) -> Result<()> {
        match self.own(idx)? {
            Some(w) => self.trace_down(idx, w),
            None => Ok(()),
        }
    }

    /// Finalize `start` with `value` and keep going downstream until the
    /// flow leaves the grid, reaches a sink, or hits an unready join.
    pub fn trace_down(&self, start: usize, value: A) -> Result<()> {
        let mut idx = start;
        let mut value = value;
        loop {
            if !self.grid.claim(idx, value) {
                // Another branch finished this cell and owns the rest of the path.
                return Ok(());
            }
            let Some(down) = self.dirs.downstream(idx) else {
                return Ok(());
            };
            let Some(own) = self.own(down)? else {
                return Ok(());
            };
            let mask = self.deps.mask(self.dirs, &self.weights, down);
            value = match self.aggregate(down, mask, Some(own)) {
                Aggregate::Ready(v) => v,
                Aggregate::NotReady => return Ok(()),
                Aggregate::Overflow => return Err(self.overflow(down)),
            };
            idx = down;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direction::{E, NONE, S};

    fn chain(n: usize) -> DirectionGrid {
        let mut codes = vec![E; n];
        codes[n - 1] = NONE;
        DirectionGrid::new(1, n, codes).unwrap()
    }

    #[test]
    fn single_branch_walks_to_sink() {
        let dirs = chain(5);
        let deps = Dependencies::OnDemand;
        let grid = AccumGrid::<i32>::new(5);
        let ctx = TraceContext { dirs: &dirs, weights: Weights::Unit, deps: &deps, grid: &grid, check_overflow: true };
        ctx.trace_seed(0).unwrap();
        let r = grid.into_raster(1, 5);
        assert_eq!(r.data, vec![Some(1), Some(2), Some(3), Some(4), Some(5)]);
    }

    #[test]
    fn join_waits_for_every_contributor() {
        // (0,0) → E, (0,1) → S, (1,0) → E, (1,1) sink.
        // (1,1) receives from W (1,0) and N (0,1).
        let dirs = DirectionGrid::new(2, 2, vec![E, S, E, NONE]).unwrap();
        let deps = Dependencies::OnDemand;
        let grid = AccumGrid::<f64>::new(4);
        let ctx = TraceContext { dirs: &dirs, weights: Weights::Unit, deps: &deps, grid: &grid, check_overflow: false };

        let mask = deps.mask(&dirs, &Weights::Unit, 3);
        assert_eq!(ctx.sum_up(3, mask), Aggregate::NotReady);

        ctx.trace_seed(2).unwrap();
        // (1,0) is final, (0,1) is not: the join is still open.
        assert_eq!(grid.load(2), Some(1.0));
        assert_eq!(grid.load(3), None);

        ctx.trace_seed(0).unwrap();
        assert_eq!(grid.load(1), Some(2.0));
        assert_eq!(grid.load(3), Some(4.0));
    }

    #[test]
    fn finalized_cell_is_not_rewritten() {
        let dirs = chain(3);
        let deps = Dependencies::OnDemand;
        let grid = AccumGrid::<i32>::new(3);
        let ctx = TraceContext { dirs: &dirs, weights: Weights::Unit, deps: &deps, grid: &grid, check_overflow: false };
        ctx.trace_seed(0).unwrap();
        ctx.trace_down(1, 100).unwrap();
        assert_eq!(grid.load(1), Some(2));
        assert_eq!(grid.load(2), Some(3));
    }

    #[test]
    fn overflow_names_the_cell() {
        let dirs = chain(3);
        let deps = Dependencies::OnDemand;
        let grid = AccumGrid::<i32>::new(3);
        let ctx = TraceContext { dirs: &dirs, weights: Weights::Unit, deps: &deps, grid: &grid, check_overflow: true };
        let err = ctx.trace_down(0, i32::MAX - 1).unwrap_err();
        assert!(matches!(err, Error::Overflow { row: 0, col: 2, .. }), "{err:?}");
    }

    /// All eight neighbours drain into the centre of a 3×3 grid.
    fn star() -> DirectionGrid {
        use crate::direction::{N, NE, NW, SE, SW, W};
        DirectionGrid::new(3, 3, vec![SE, S, SW, E, NONE, W, NE, N, NW]).unwrap()
    }

    #[test]
    fn mixed_sign_join_checks_only_the_total() {
        use crate::numeric::NumericKind;
        use crate::weight::WeightGrid;

        // E, SE and S of the centre carry i32::MAX, 1 and -10.
        let mut w = vec![0.0; 9];
        w[5] = i32::MAX as f64;
        w[8] = 1.0;
        w[7] = -10.0;
        let wg = WeightGrid::new(3, 3, w, NumericKind::Int).unwrap();
        let dirs = star();
        let deps = Dependencies::build(&dirs, &Weights::Excluding(&wg), false);
        let grid = AccumGrid::<i32>::new(9);
        let ctx = TraceContext { dirs: &dirs, weights: Weights::Excluding(&wg), deps: &deps, grid: &grid, check_overflow: true };
        for seed in [0, 1, 2, 3, 5, 6, 7, 8] {
            ctx.trace_seed(seed).unwrap();
        }
        assert_eq!(grid.load(4), Some(i32::MAX - 9));
    }

    #[test]
    fn unready_join_is_not_an_overflow() {
        // Two finished contributors already exceed i32::MAX, a third is unset.
        let dirs = star();
        let deps = Dependencies::OnDemand;
        let grid = AccumGrid::<i32>::new(9);
        assert!(grid.claim(5, i32::MAX));
        assert!(grid.claim(8, i32::MAX));
        let ctx = TraceContext { dirs: &dirs, weights: Weights::Unit, deps: &deps, grid: &grid, check_overflow: true };
        let mask = deps.mask(&dirs, &Weights::Unit, 4);
        assert_eq!(ctx.sum_up(4, mask), Aggregate::NotReady);
    }

    #[test]
    fn oversized_seed_weight_is_an_overflow() {
        use crate::numeric::NumericKind;
        use crate::weight::WeightGrid;

        let dirs = chain(2);
        let wg = WeightGrid::new(1, 2, vec![3.0e9, 1.0], NumericKind::Double).unwrap();
        let deps = Dependencies::OnDemand;
        let grid = AccumGrid::<i32>::new(2);
        let ctx = TraceContext { dirs: &dirs, weights: Weights::Excluding(&wg), deps: &deps, grid: &grid, check_overflow: true };
        assert!(matches!(ctx.trace_seed(0), Err(Error::Overflow { col: 0, .. })));
        assert_eq!(grid.load(0), None);
    }
}
