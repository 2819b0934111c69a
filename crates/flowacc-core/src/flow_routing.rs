//! D8 flow routing: direction grid from a heightfield, then accumulation.
use crate::accumulation::{run, AccumConfig, AccumOutput};
use crate::direction::{neighbor_index, DirectionGrid, DIRECTIONS, NONE};
use crate::error::Result;
use crate::heightfield::HeightField;
use crate::parallel::*;

pub struct FlowField {
    pub directions: DirectionGrid,
    pub accumulation: AccumOutput,
}

/// Steepest-descent D8 directions. Cells with no strictly lower neighbour
/// (pits, flats) get [`NONE`]. Elevation strictly drops along every path, so
/// the result is acyclic.
pub fn compute_d8_directions(hf: &HeightField) -> Result<DirectionGrid> {
    let (rows, cols) = (hf.height, hf.width);
    let mut codes = vec![NONE; rows * cols];
    if cols > 0 {
        codes.par_chunks_mut(cols).enumerate().for_each(|(r, out)| {
            for (c, code) in out.iter_mut().enumerate() {
                *code = steepest_descent(hf, r * cols + c);
            }
        });
    }
    DirectionGrid::new(rows, cols, codes)
}

fn steepest_descent(hf: &HeightField, idx: usize) -> u8 {
    let z = hf.data[idx];
    let mut best = NONE;
    let mut best_slope = 0.0f32;
    for d in DIRECTIONS {
        let Some(n) = neighbor_index(hf.height, hf.width, idx, d) else { continue };
        // Odd bit positions (SE, SW, NW, NE) are diagonals.
        let dist = if d.trailing_zeros() % 2 == 1 { std::f32::consts::SQRT_2 } else { 1.0 };
        let slope = (z - hf.data[n]) / dist;
        if slope > best_slope {
            best_slope = slope;
            best = d;
        }
    }
    best
}

/// Route `hf` and accumulate over the resulting directions.
pub fn route_and_accumulate(hf: &HeightField, config: &AccumConfig) -> Result<FlowField> {
    let directions = compute_d8_directions(hf)?;
    let accumulation = run(&directions, None, config)?;
    Ok(FlowField { directions, accumulation })
}
