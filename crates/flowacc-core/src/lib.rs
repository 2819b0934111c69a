//! Parallel flow accumulation over D8 flow-direction grids.
//!
//! Each cell of the output holds the summed weight (1 per cell by default)
//! of itself and every cell draining through it. Work starts from cells with
//! nothing upstream and walks downstream on many threads at once; joins are
//! finished by whichever branch arrives last, so no locks are taken.
//!
//! ```
//! use flowacc_core::accumulation::{accumulate, AccumConfig};
//! use flowacc_core::direction::{DirectionGrid, E, NONE};
//!
//! let dirs = DirectionGrid::new(1, 3, vec![E, E, NONE]).unwrap();
//! let acc = accumulate::<i32>(&dirs, None, &AccumConfig::default()).unwrap();
//! assert_eq!(acc.data, vec![Some(1), Some(2), Some(3)]);
//! ```
pub mod accumulation;
pub mod direction;
pub mod error;
pub mod flow_routing;
pub mod heightfield;
pub mod numeric;
pub mod parallel;
pub mod weight;

pub use accumulation::{accumulate, run, AccumConfig, AccumOutput, AccumRaster, ZeroMode};
pub use direction::{DirectionFormat, DirectionGrid};
pub use error::{Error, Result};
pub use numeric::{Accumulator, NumericKind};
pub use weight::WeightGrid;
