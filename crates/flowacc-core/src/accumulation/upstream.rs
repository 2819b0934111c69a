//! Upstream dependency masks.
//!
//! A cell's mask has bit `d` set when its neighbour in direction `d` drains
//! into it. Masks are either stored for every cell up front or recomputed
//! each time they are asked for.
use crate::direction::{opposite, DirectionGrid, DIRECTIONS};
use crate::parallel::*;
use crate::weight::Weights;

/// Neighbours of `idx` that drain into it. Excluded (null-weight) neighbours
/// never count.
#[inline]
pub fn find_up(dirs: &DirectionGrid, weights: &Weights<'_>, idx: usize) -> u8 {
    let mut mask = 0u8;
    for d in DIRECTIONS {
        if let Some(n) = dirs.neighbor(idx, d) {
            if dirs.code(n) == opposite(d) && !weights.is_excluded(n) {
                mask |= d;
            }
        }
    }
    mask
}

pub enum Dependencies {
    /// One mask byte per cell.
    Precomputed(Vec<u8>),
    /// Nothing stored; every lookup calls [`find_up`].
    OnDemand,
}

impl Dependencies {
    pub fn build(dirs: &DirectionGrid, weights: &Weights<'_>, less_memory: bool) -> Self {
        if less_memory || dirs.is_empty() {
            return Dependencies::OnDemand;
        }
        let cols = dirs.cols();
        let mut masks = vec![0u8; dirs.len()];
        masks.par_chunks_mut(cols).enumerate().for_each(|(row, out)| {
            for (col, m) in out.iter_mut().enumerate() {
                *m = find_up(dirs, weights, row * cols + col);
            }
        });
        Dependencies::Precomputed(masks)
    }

    #[inline]
    pub fn mask(&self, dirs: &DirectionGrid, weights: &Weights<'_>, idx: usize) -> u8 {
        match self {
            Dependencies::Precomputed(masks) => masks[idx],
            Dependencies::OnDemand => find_up(dirs, weights, idx),
        }
    }

    /// Bytes held by the stored masks.
    pub fn footprint(&self) -> usize {
        match self {
            Dependencies::Precomputed(masks) => masks.len(),
            Dependencies::OnDemand => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direction::{E, N, NE, NONE, NW, S, SE, SW, W};
    use crate::weight::WeightGrid;

    /// All eight neighbours point at the centre.
    fn star() -> DirectionGrid {
        DirectionGrid::new(3, 3, vec![SE, S, SW, E, NONE, W, NE, N, NW]).unwrap()
    }

    #[test]
    fn centre_of_star_has_full_mask() {
        let g = star();
        assert_eq!(find_up(&g, &Weights::Unit, 4), 0xFF);
        for i in [0, 1, 2, 3, 5, 6, 7, 8] {
            assert_eq!(find_up(&g, &Weights::Unit, i), 0, "cell {i}");
        }
    }

    #[test]
    fn null_weight_neighbour_is_excluded() {
        let g = star();
        let mut w = vec![1.0; 9];
        w[0] = f64::NAN; // NW corner
        let wg = WeightGrid::new(3, 3, w, crate::numeric::NumericKind::Int).unwrap();
        assert_eq!(find_up(&g, &Weights::Excluding(&wg), 4), 0xFF & !NW);
        assert_eq!(find_up(&g, &Weights::NullAsZero(&wg), 4), 0xFF);
    }

    #[test]
    fn both_modes_agree() {
        let g = star();
        let pre = Dependencies::build(&g, &Weights::Unit, false);
        let lazy = Dependencies::build(&g, &Weights::Unit, true);
        assert_eq!(pre.footprint(), 9);
        assert_eq!(lazy.footprint(), 0);
        for i in 0..9 {
            assert_eq!(pre.mask(&g, &Weights::Unit, i), lazy.mask(&g, &Weights::Unit, i));
        }
    }
}
