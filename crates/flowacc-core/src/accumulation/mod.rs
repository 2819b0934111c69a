//! Parallel flow accumulation over a D8 direction grid.
//!
//! Steps:
//! 1. Allocate the accumulation grid with every cell unset.
//! 2. Build upstream masks, or defer them when memory is tight.
//! 3. Select seed cells (nothing drains into them).
//! 4. Trace every seed downstream in parallel. A branch that reaches a join
//!    whose other contributors are not final yet just stops; whichever
//!    branch arrives last carries on.
//! 5. Apply the zero mode and hand back a plain raster.
pub mod config;
pub mod grid;
pub mod seeds;
pub mod trace;
pub mod upstream;

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, warn};

use crate::direction::DirectionGrid;
use crate::error::{Error, Result};
use crate::numeric::{Accumulator, NumericKind};
use crate::parallel::*;
use crate::weight::{WeightGrid, Weights};
pub use config::{AccumConfig, ZeroMode};
pub use grid::{AccumGrid, AccumRaster, Summary};
use seeds::select_seeds;
use trace::TraceContext;
use upstream::Dependencies;

/// Output of [`run`], in whichever kind the run ended up accumulating in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AccumOutput {
    Int(AccumRaster<i32>),
    Float(AccumRaster<f32>),
    Double(AccumRaster<f64>),
}

impl AccumOutput {
    pub fn kind(&self) -> NumericKind {
        match self {
            AccumOutput::Int(_) => NumericKind::Int,
            AccumOutput::Float(_) => NumericKind::Float,
            AccumOutput::Double(_) => NumericKind::Double,
        }
    }

    pub fn rows(&self) -> usize {
        match self {
            AccumOutput::Int(r) => r.rows,
            AccumOutput::Float(r) => r.rows,
            AccumOutput::Double(r) => r.rows,
        }
    }

    pub fn cols(&self) -> usize {
        match self {
            AccumOutput::Int(r) => r.cols,
            AccumOutput::Float(r) => r.cols,
            AccumOutput::Double(r) => r.cols,
        }
    }

    /// Value at (row, col) widened to `f64`.
    pub fn get_f64(&self, row: usize, col: usize) -> Option<f64> {
        match self {
            AccumOutput::Int(r) => r.get(row, col).map(|v| v as f64),
            AccumOutput::Float(r) => r.get(row, col).map(|v| v as f64),
            AccumOutput::Double(r) => r.get(row, col),
        }
    }

    pub fn summary(&self) -> Summary {
        match self {
            AccumOutput::Int(r) => r.summary(),
            AccumOutput::Float(r) => r.summary(),
            AccumOutput::Double(r) => r.summary(),
        }
    }
}

/// Accumulate in the kind named by `config.kind`, widened when integer
/// accumulation meets fractional weights.
pub fn run(
    dirs: &DirectionGrid,
    weights: Option<&WeightGrid>,
    config: &AccumConfig,
) -> Result<AccumOutput> {
    let mut kind = config.kind;
    if let Some(w) = weights {
        let promoted = kind.promote_for_weight(w.kind());
        if promoted != kind {
            warn!("{} weights cannot be accumulated as {kind}; using {promoted}", w.kind());
            kind = promoted;
        }
    }
    match kind {
        NumericKind::Int => accumulate::<i32>(dirs, weights, config).map(AccumOutput::Int),
        NumericKind::Float => accumulate::<f32>(dirs, weights, config).map(AccumOutput::Float),
        NumericKind::Double => accumulate::<f64>(dirs, weights, config).map(AccumOutput::Double),
    }
}

/// Accumulate in `A`. `config.kind` is ignored here, and weights too
/// fractional for `A` are rejected rather than truncated.
pub fn accumulate<A: Accumulator>(
    dirs: &DirectionGrid,
    weights: Option<&WeightGrid>,
    config: &AccumConfig,
) -> Result<AccumRaster<A>> {
    config.validate()?;
    if let Some(w) = weights {
        w.check_shape(dirs.rows(), dirs.cols())?;
        if A::KIND.promote_for_weight(w.kind()) != A::KIND {
            return Err(Error::Config(format!(
                "{} weights cannot be accumulated as {}; use run() or a wider kind",
                w.kind(),
                A::KIND
            )));
        }
    }
    if config.detect_cycles {
        if let Some((row, col)) = dirs.find_cycle() {
            return Err(Error::CycleDetected { row, col });
        }
    }

    let weights = Weights::new(weights, config.null_weight_as_zero);
    let grid = with_pool(config.threads, || {
        accumulate_in_pool::<A>(dirs, weights, config)
    })??;

    let mut raster = grid.into_raster(dirs.rows(), dirs.cols());
    raster.apply_zero_mode(config.zero_mode);
    let s = raster.summary();
    debug!(valued = s.valued, null = s.null, max = ?s.max, "accumulation finished");
    Ok(raster)
}

fn accumulate_in_pool<A: Accumulator>(
    dirs: &DirectionGrid,
    weights: Weights<'_>,
    config: &AccumConfig,
) -> Result<AccumGrid<A>> {
    let grid = AccumGrid::<A>::new(dirs.len());

    let t = Instant::now();
    let deps = Dependencies::build(dirs, &weights, config.use_less_memory);
    debug!(bytes = deps.footprint(), elapsed = ?t.elapsed(), "upstream masks ready");

    let t = Instant::now();
    let seeds = select_seeds(dirs, &weights, &deps);
    debug!(seeds = seeds.len(), elapsed = ?t.elapsed(), "seeds selected");

    let ctx = TraceContext {
        dirs,
        weights,
        deps: &deps,
        grid: &grid,
        check_overflow: config.check_overflow,
    };
    let t = Instant::now();
    seeds.into_par_iter().try_for_each(|s| ctx.trace_seed(s))?;
    debug!(kind = %A::KIND, elapsed = ?t.elapsed(), "tracing done");

    Ok(grid)
}
