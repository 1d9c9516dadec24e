//! anns-dataset CLI - Inspect, summarize, merge and convert vector datasets

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use anns_dataset::{
    dispatch_element, inspect_element, load_vec_with, merge, stats, CastInto, Element,
    ElementType, Format, LoadOptions, LogProgress, NoProgress, Progress, Range, StreamWriter,
};

#[derive(Parser)]
#[command(name = "anns-dataset")]
#[command(about = "Reader and writer for ANN benchmark vector datasets", long_about = None)]
struct Cli {
    /// Report load/store progress
    #[arg(long, global = true)]
    progress: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the record count and dimension
    Inspect {
        path: PathBuf,

        /// Element type (i8, u8, i32, u32, f32)
        #[arg(short = 't', long, default_value = "f32")]
        dtype: ElementType,

        /// Format (auto-detect, vecs, bigann, vecs:u64, ...)
        #[arg(short, long, default_value = "auto-detect")]
        format: Format,
    },

    /// Print the detected format
    Detect {
        path: PathBuf,

        #[arg(short = 't', long, default_value = "f32")]
        dtype: ElementType,
    },

    /// Print per-dimension mean, stddev, min and max
    Stats {
        path: PathBuf,

        #[arg(short = 't', long, default_value = "f32")]
        dtype: ElementType,

        #[arg(short, long, default_value = "auto-detect")]
        format: Format,

        /// First record to include
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Number of records (0 = up to the end)
        #[arg(long, default_value_t = 0)]
        count: usize,

        /// Width of the range graph (0 disables it)
        #[arg(short, long, default_value_t = 40)]
        graph_width: usize,
    },

    /// Concatenate datasets of the same dimension
    Merge {
        /// Output file (truncated)
        #[arg(short, long)]
        output: PathBuf,

        /// Input files, in order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[arg(short = 't', long, default_value = "f32")]
        dtype: ElementType,

        /// Output format (default: format of the first input)
        #[arg(short, long, default_value = "auto-detect")]
        format: Format,
    },

    /// Rewrite a dataset in another layout and/or element type
    Convert {
        input: PathBuf,
        output: PathBuf,

        /// Element type of the input
        #[arg(long, default_value = "f32")]
        from: ElementType,

        /// Element type of the output (default: same as input)
        #[arg(long)]
        to: Option<ElementType>,

        /// Output format
        #[arg(short, long, default_value = "bigann")]
        format: Format,

        /// Records per chunk
        #[arg(long, default_value_t = 100_000)]
        chunk: usize,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut progress: Box<dyn Progress> = if cli.progress {
        Box::new(LogProgress::new("anns-dataset"))
    } else {
        Box::new(NoProgress)
    };

    match cli.command {
        Commands::Inspect {
            path,
            dtype,
            format,
        } => {
            let shape = inspect_element(&path, dtype, format)
                .with_context(|| format!("inspecting {}", path.display()))?;
            println!("{} {}", shape.count, shape.dim);
        }
        Commands::Detect { path, dtype } => {
            let format = anns_dataset::detect_element(&path, dtype, None)
                .with_context(|| format!("detecting {}", path.display()))?;
            println!("{}", format);
        }
        Commands::Stats {
            path,
            dtype,
            format,
            offset,
            count,
            graph_width,
        } => {
            let options = LoadOptions::default()
                .format(format)
                .range(Range::new(offset, count));
            dispatch_element!(dtype, T => {
                run_stats::<T>(&path, options, graph_width, progress.as_mut())?
            });
        }
        Commands::Merge {
            output,
            inputs,
            dtype,
            format,
        } => {
            let summary = dispatch_element!(dtype, T => {
                merge::<T>(&output, &inputs, format, progress.as_mut())?
            });
            println!(
                "{} records of dimension {} written to {} ({})",
                summary.total_records,
                summary.dim,
                output.display(),
                summary.format
            );
        }
        Commands::Convert {
            input,
            output,
            from,
            to,
            format,
            chunk,
        } => {
            if chunk == 0 {
                bail!("--chunk must be positive");
            }
            let to = to.unwrap_or(from);
            let start = Instant::now();
            let written = dispatch_element!(from, S => {
                dispatch_element!(to, D => {
                    convert::<S, D>(&input, &output, format, chunk, progress.as_mut())?
                })
            });
            println!(
                "Converted {} records to {} in {:.2}s",
                written,
                output.display(),
                start.elapsed().as_secs_f64()
            );
        }
    }

    Ok(())
}

fn run_stats<T: Element>(
    path: &Path,
    options: LoadOptions,
    graph_width: usize,
    progress: &mut dyn Progress,
) -> Result<()> {
    let start = Instant::now();
    let (data, shape) = load_vec_with::<T>(path, options, progress)
        .with_context(|| format!("loading {}", path.display()))?;
    tracing::info!(
        "Loaded {} x {} in {:.2}s",
        shape.count,
        shape.dim,
        start.elapsed().as_secs_f64()
    );

    let start = Instant::now();
    let result = stats::compute(&data, shape.dim, shape.count, shape.dim);
    tracing::info!("Statistics computed in {:.2}s", start.elapsed().as_secs_f64());

    print!("{}", stats::render_table(&result, graph_width));
    Ok(())
}

/// Copy `input` to `output` chunk by chunk, casting `S` to `D`
fn convert<S: CastInto<D>, D: Element>(
    input: &Path,
    output: &Path,
    format: Format,
    chunk: usize,
    progress: &mut dyn Progress,
) -> Result<usize> {
    let shape = inspect_element(input, S::TYPE, Format::AUTO_DETECT)
        .with_context(|| format!("inspecting {}", input.display()))?;
    let mut writer = StreamWriter::<D>::open(output, shape.dim, format)
        .with_context(|| format!("creating {}", output.display()))?;

    let mut buffer = vec![D::zeroed(); chunk.min(shape.count.max(1)) * shape.dim];
    let mut offset = 0;
    while offset < shape.count {
        let n = chunk.min(shape.count - offset);
        let dest = &mut buffer[..n * shape.dim];
        anns_dataset::load_with::<D, S>(
            dest,
            input,
            LoadOptions::default().range(Range::new(offset, n)),
            progress,
        )?;
        writer.append_with(dest, shape.dim, n, progress)?;
        offset += n;
    }

    Ok(writer.close()?)
}
