//! D8 direction grid: one power-of-two outflow code per cell.
//!
//! Codes run clockwise from east:
//!
//! ```text
//!   NW=32  N=64  NE=128
//!   W=16    .    E=1
//!   SW=8   S=4   SE=2
//! ```
//!
//! `0` means the cell has no outflow (sink, map edge, or masked out).
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const E: u8 = 1;
pub const SE: u8 = 2;
pub const S: u8 = 4;
pub const SW: u8 = 8;
pub const W: u8 = 16;
pub const NW: u8 = 32;
pub const N: u8 = 64;
pub const NE: u8 = 128;

/// No defined outflow.
pub const NONE: u8 = 0;

/// All eight codes in bit order.
pub const DIRECTIONS: [u8; 8] = [E, SE, S, SW, W, NW, N, NE];

/// (d_row, d_col) per bit index, matching [`DIRECTIONS`].
const OFFSETS: [(isize, isize); 8] = [
    (0, 1),   // E
    (1, 1),   // SE
    (1, 0),   // S
    (1, -1),  // SW
    (0, -1),  // W
    (-1, -1), // NW
    (-1, 0),  // N
    (-1, 1),  // NE
];

/// The code pointing the other way; rotating the byte by four bits maps
/// every direction onto its opposite.
#[inline]
pub fn opposite(code: u8) -> u8 {
    code.rotate_left(4)
}

#[inline]
pub fn is_valid_code(code: u8) -> bool {
    code.count_ones() <= 1
}

/// Row/column offset of a single direction code.
#[inline]
pub fn offset(code: u8) -> Option<(isize, isize)> {
    if code.count_ones() == 1 {
        Some(OFFSETS[code.trailing_zeros() as usize])
    } else {
        None
    }
}

/// Index of the neighbour of `idx` in direction `dir` on a `rows × cols`
/// grid, if it lies inside.
#[inline]
pub fn neighbor_index(rows: usize, cols: usize, idx: usize, dir: u8) -> Option<usize> {
    let (dr, dc) = offset(dir)?;
    let r = (idx / cols).checked_add_signed(dr)?;
    let c = (idx % cols).checked_add_signed(dc)?;
    (r < rows && c < cols).then(|| r * cols + c)
}

// ── Grid ──────────────────────────────────────────────────────────────────────

/// Row-major grid of normalized direction codes. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectionGrid {
    rows: usize,
    cols: usize,
    codes: Vec<u8>,
}

impl DirectionGrid {
    /// Build from power-of-two codes, rejecting anything with more than one
    /// bit set.
    pub fn new(rows: usize, cols: usize, codes: Vec<u8>) -> Result<Self> {
        if codes.len() != rows * cols {
            return Err(Error::DataLength { len: codes.len(), rows, cols });
        }
        if let Some(i) = codes.iter().position(|&c| !is_valid_code(c)) {
            return Err(Error::InvalidDirection {
                row: i / cols,
                col: i % cols,
                value: codes[i] as f64,
            });
        }
        Ok(Self { rows, cols, codes })
    }

    /// Build from raw values in any supported encoding; `None` cells are null.
    pub fn from_format(
        rows: usize,
        cols: usize,
        raw: &[Option<f64>],
        format: DirectionFormat,
    ) -> Result<Self> {
        if raw.len() != rows * cols {
            return Err(Error::DataLength { len: raw.len(), rows, cols });
        }
        let format = match format {
            DirectionFormat::Auto => DirectionFormat::detect(raw)?,
            f => f,
        };
        let mut codes = Vec::with_capacity(raw.len());
        for (i, v) in raw.iter().enumerate() {
            let code = match *v {
                None => NONE,
                Some(v) => format.normalize(v).ok_or(Error::InvalidDirection {
                    row: i / cols,
                    col: i % cols,
                    value: v,
                })?,
            };
            codes.push(code);
        }
        Ok(Self { rows, cols, codes })
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    #[inline]
    pub fn code(&self, idx: usize) -> u8 {
        self.codes[idx]
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> u8 {
        self.codes[row * self.cols + col]
    }

    pub fn codes(&self) -> &[u8] {
        &self.codes
    }

    /// Neighbour of `idx` in direction `dir`, if it lies inside the grid.
    #[inline]
    pub fn neighbor(&self, idx: usize, dir: u8) -> Option<usize> {
        neighbor_index(self.rows, self.cols, idx, dir)
    }

    /// The cell `idx` drains into. `None` for null codes and for codes
    /// pointing off the grid.
    #[inline]
    pub fn downstream(&self, idx: usize) -> Option<usize> {
        self.neighbor(idx, self.codes[idx])
    }

    /// First cell found on a direction cycle, as (row, col).
    ///
    /// Walks each unvisited path downstream once, so the pass is linear in
    /// the number of cells.
    pub fn find_cycle(&self) -> Option<(usize, usize)> {
        const UNSEEN: u8 = 0;
        const ON_PATH: u8 = 1;
        const DONE: u8 = 2;

        let mut state = vec![UNSEEN; self.codes.len()];
        let mut path = Vec::new();
        for start in 0..self.codes.len() {
            if state[start] != UNSEEN {
                continue;
            }
            let mut cur = Some(start);
            while let Some(i) = cur {
                match state[i] {
                    DONE => break,
                    ON_PATH => return Some((i / self.cols, i % self.cols)),
                    _ => {
                        state[i] = ON_PATH;
                        path.push(i);
                        cur = self.downstream(i);
                    }
                }
            }
            for i in path.drain(..) {
                state[i] = DONE;
            }
        }
        None
    }
}

// ── Encodings ─────────────────────────────────────────────────────────────────

/// Encoding of a raw direction raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectionFormat {
    /// Pick one of the others from the value range.
    Auto,
    /// Already-normalized power-of-two codes (E=1 … NE=128).
    #[serde(rename = "power2")]
    PowerOfTwo,
    /// Degrees counter-clockwise from east, in 45° steps (0 or 360 = E).
    Degree,
    /// 1..8 counter-clockwise from NE (1=NE, 2=N, … 8=E).
    #[serde(rename = "degree45")]
    Degree45,
}

/// Power-of-two codes ordered counter-clockwise from east, the order used by
/// both degree encodings.
const CCW_FROM_EAST: [u8; 8] = [E, NE, N, NW, W, SW, S, SE];

impl DirectionFormat {
    /// Guess the encoding from the largest positive value.
    ///
    /// Values up to 8 are read as 45° buckets, values that are all powers of
    /// two up to 128 as power-of-two codes, anything else up to 360 as
    /// degrees.
    pub fn detect(raw: &[Option<f64>]) -> Result<Self> {
        let positive = || raw.iter().flatten().copied().filter(|&v| v > 0.0);
        let max = positive().fold(0.0f64, f64::max);
        if max <= 8.0 {
            Ok(DirectionFormat::Degree45)
        } else if max <= 128.0
            && positive().all(|v| v.fract() == 0.0 && (v as u32).is_power_of_two())
        {
            Ok(DirectionFormat::PowerOfTwo)
        } else if max <= 360.0 {
            Ok(DirectionFormat::Degree)
        } else {
            Err(Error::UnknownDirectionFormat { max })
        }
    }

    /// Normalize one raw value. Zero and negative values (flow leaving the
    /// map) become [`NONE`]; `None` means the value is not in the encoding.
    pub fn normalize(self, v: f64) -> Option<u8> {
        if v.is_nan() {
            return None;
        }
        if v <= 0.0 {
            return Some(NONE);
        }
        match self {
            DirectionFormat::PowerOfTwo => {
                let code = v as u32;
                (v.fract() == 0.0 && code <= 128 && code.is_power_of_two()).then_some(code as u8)
            }
            DirectionFormat::Degree => {
                if v > 360.0 {
                    return None;
                }
                let bucket = (v / 45.0).round() as usize % 8;
                Some(CCW_FROM_EAST[bucket])
            }
            DirectionFormat::Degree45 => {
                if v.fract() != 0.0 || v > 8.0 {
                    return None;
                }
                Some(CCW_FROM_EAST[v as usize % 8])
            }
            DirectionFormat::Auto => None,
        }
    }
}

impl std::str::FromStr for DirectionFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "auto" => Ok(DirectionFormat::Auto),
            "power2" => Ok(DirectionFormat::PowerOfTwo),
            "degree" => Ok(DirectionFormat::Degree),
            "degree45" | "45degree" => Ok(DirectionFormat::Degree45),
            other => Err(format!("unknown direction format '{other}'")),
        }
    }
}
