//! Traversal roots: cells with an outflow and nothing draining into them.
use super::upstream::Dependencies;
use crate::direction::{DirectionGrid, NONE};
use crate::parallel::*;
use crate::weight::Weights;

/// Seed cells in ascending index order.
pub fn select_seeds(dirs: &DirectionGrid, weights: &Weights<'_>, deps: &Dependencies) -> Vec<usize> {
    (0..dirs.len())
        .into_par_iter()
        .filter(|&i| {
            dirs.code(i) != NONE && !weights.is_excluded(i) && deps.mask(dirs, weights, i) == 0
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direction::{E, S};
    use crate::numeric::NumericKind;
    use crate::weight::WeightGrid;

    #[test]
    fn heads_of_parallel_chains() {
        // Three rows all flowing east into a null column.
        let mut codes = vec![E; 9];
        for r in 0..3 {
            codes[r * 3 + 2] = NONE;
        }
        let g = DirectionGrid::new(3, 3, codes).unwrap();
        let deps = Dependencies::build(&g, &Weights::Unit, false);
        assert_eq!(select_seeds(&g, &Weights::Unit, &deps), vec![0, 3, 6]);
    }

    #[test]
    fn null_weight_cells_are_not_seeds() {
        let g = DirectionGrid::new(2, 1, vec![S, NONE]).unwrap();
        let wg = WeightGrid::new(2, 1, vec![f64::NAN, 1.0], NumericKind::Int).unwrap();
        let w = Weights::Excluding(&wg);
        let deps = Dependencies::build(&g, &w, true);
        assert!(select_seeds(&g, &w, &deps).is_empty());

        let w = Weights::NullAsZero(&wg);
        let deps = Dependencies::build(&g, &w, true);
        assert_eq!(select_seeds(&g, &w, &deps), vec![0]);
    }
}
