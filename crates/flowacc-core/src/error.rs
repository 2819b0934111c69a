//! Error types for flow accumulation.

use thiserror::Error;

use crate::numeric::NumericKind;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Rejected before any work starts.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("grid size mismatch: expected {expected_rows}x{expected_cols}, got {rows}x{cols}")]
    DimensionMismatch {
        expected_rows: usize,
        expected_cols: usize,
        rows: usize,
        cols: usize,
    },

    #[error("data length {len} does not match a {rows}x{cols} grid")]
    DataLength { len: usize, rows: usize, cols: usize },

    #[error("invalid direction value {value} at ({row}, {col})")]
    InvalidDirection { row: usize, col: usize, value: f64 },

    #[error("cannot detect direction format: maximum value {max} fits no known encoding")]
    UnknownDirectionFormat { max: f64 },

    /// Fatal: the configured numeric kind cannot hold the accumulated value.
    #[error("accumulation overflow at ({row}, {col}) using {kind} values; {}", .kind.overflow_hint())]
    Overflow { row: usize, col: usize, kind: NumericKind },

    #[error("flow direction cycle through ({row}, {col})")]
    CycleDetected { row: usize, col: usize },

    #[error("cannot build worker pool: {0}")]
    ThreadPool(String),
}

pub type Result<T> = std::result::Result<T, Error>;
