/// Command-line runner for the flow accumulation engine.
///
/// Grids are JSON files of the form `{"rows": R, "cols": C, "data": [...]}`,
/// row-major, with `null` for null cells.
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use flowacc_core::flow_routing::route_and_accumulate;
use flowacc_core::heightfield::HeightField;
use flowacc_core::{run, AccumConfig, DirectionFormat, DirectionGrid, NumericKind, WeightGrid};

#[derive(Parser, Debug)]
#[command(name = "flowacc", about = "Parallel D8 flow accumulation")]
struct Cli {
    /// Log phase timings and counts.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Accumulate over a direction grid file.
    Run {
        /// Direction grid (JSON).
        #[arg(short, long)]
        directions: PathBuf,

        /// Optional weight grid (JSON).
        #[arg(short, long)]
        weights: Option<PathBuf>,

        /// Output accumulation grid (JSON).
        #[arg(short, long)]
        output: PathBuf,

        /// Direction encoding: auto, power2, degree or degree45.
        #[arg(long, default_value = "auto")]
        format: DirectionFormat,

        #[command(flatten)]
        accum: AccumArgs,
    },
    /// Generate random terrain, route it and accumulate.
    Synthetic {
        #[arg(long, default_value_t = 256)]
        rows: usize,

        #[arg(long, default_value_t = 256)]
        cols: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Output accumulation grid (JSON).
        #[arg(short, long)]
        output: PathBuf,

        /// Also write the derived direction grid (JSON).
        #[arg(long)]
        directions_out: Option<PathBuf>,

        #[command(flatten)]
        accum: AccumArgs,
    },
}

#[derive(Args, Debug)]
struct AccumArgs {
    /// Accumulation kind: int, float or double.
    #[arg(long, default_value = "double")]
    kind: NumericKind,

    /// Abort when a value does not fit the accumulation kind.
    #[arg(long)]
    check_overflow: bool,

    /// Recompute upstream masks instead of storing them.
    #[arg(long)]
    less_memory: bool,

    /// Null out cells whose accumulation is zero.
    #[arg(long, conflicts_with = "leave_zero")]
    nullify_zero: bool,

    /// Write zero instead of null for cells without flow.
    #[arg(long)]
    leave_zero: bool,

    /// Treat null weights as zero instead of excluding those cells.
    #[arg(long)]
    null_weight_as_zero: bool,

    /// Worker threads (default: all cores).
    #[arg(long)]
    threads: Option<usize>,

    /// Reject direction grids containing a cycle.
    #[arg(long)]
    detect_cycles: bool,

    /// Print the resolved configuration as JSON before running.
    #[arg(long)]
    print_config: bool,
}

impl AccumArgs {
    fn to_config(&self) -> Result<AccumConfig> {
        let config = AccumConfig {
            kind: self.kind,
            check_overflow: self.check_overflow,
            use_less_memory: self.less_memory,
            null_weight_as_zero: self.null_weight_as_zero,
            threads: self.threads,
            detect_cycles: self.detect_cycles,
            ..Default::default()
        }
        .with_zero_flags(self.nullify_zero, self.leave_zero)?;
        config.validate()?;
        if self.print_config {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Ok(config)
    }
}

// ── Grid files ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct GridFile {
    rows: usize,
    cols: usize,
    data: Vec<Option<f64>>,
}

#[derive(Serialize)]
struct CodeFile<'a> {
    rows: usize,
    cols: usize,
    data: &'a [u8],
}

fn read_grid(path: &Path) -> Result<GridFile> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string(value)?;
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("installing log subscriber")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Command::Run { directions, weights, output, format, accum } => {
            let config = accum.to_config()?;

            let raw = read_grid(&directions)?;
            let dirs = DirectionGrid::from_format(raw.rows, raw.cols, &raw.data, format)
                .with_context(|| format!("decoding directions in {}", directions.display()))?;
            let weights = weights
                .map(|p| -> Result<WeightGrid> {
                    let g = read_grid(&p)?;
                    WeightGrid::from_options(g.rows, g.cols, &g.data)
                        .with_context(|| format!("loading weights from {}", p.display()))
                })
                .transpose()?;

            info!(rows = dirs.rows(), cols = dirs.cols(), "accumulating");
            let t = Instant::now();
            let out = run(&dirs, weights.as_ref(), &config)?;
            let s = out.summary();
            info!(
                kind = %out.kind(),
                valued = s.valued,
                null = s.null,
                max = ?s.max,
                elapsed = ?t.elapsed(),
                "done"
            );
            write_json(&output, &out)?;
        }
        Command::Synthetic { rows, cols, seed, output, directions_out, accum } => {
            let config = accum.to_config()?;

            let hf = HeightField::random(cols, rows, seed);
            let t = Instant::now();
            let flow = route_and_accumulate(&hf, &config)?;
            let s = flow.accumulation.summary();
            info!(
                rows,
                cols,
                seed,
                valued = s.valued,
                max = ?s.max,
                elapsed = ?t.elapsed(),
                "synthetic terrain accumulated"
            );
            write_json(&output, &flow.accumulation)?;
            if let Some(path) = directions_out {
                let codes = CodeFile {
                    rows: flow.directions.rows(),
                    cols: flow.directions.cols(),
                    data: flow.directions.codes(),
                };
                write_json(&path, &codes)?;
            }
        }
    }

    Ok(())
}
