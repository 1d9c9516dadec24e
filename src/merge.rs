//! Concatenate several same-dimension datasets into one file

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::element::Element;
use crate::error::{DatasetError, Result};
use crate::format::detect::resolve;
use crate::format::{Container, Format};
use crate::progress::Progress;
use crate::storage::{load_vec_with, LoadOptions, StreamWriter};

/// Outcome of a merge
#[derive(Debug, Clone, PartialEq)]
pub struct MergeSummary {
    pub format: Format,
    pub dim: usize,
    pub total_records: usize,
    /// (input path, records taken from it, time spent)
    pub inputs: Vec<(PathBuf, usize, Duration)>,
}

/// Merge `inputs` into `output`
///
/// The output format is the detected format of the first input unless
/// `format` names a concrete container. Every input must have the same
/// dimension as the first one.
pub fn merge<T: Element>(
    output: impl AsRef<Path>,
    inputs: &[PathBuf],
    format: Format,
    progress: &mut dyn Progress,
) -> Result<MergeSummary> {
    let output = output.as_ref();
    let Some(first) = inputs.first() else {
        return Err(DatasetError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "merge needs at least one input",
        )));
    };

    // Validate every input before truncating the output
    let reference = resolve(first, T::TYPE, Format::AUTO_DETECT)?;
    let mut shapes = Vec::with_capacity(inputs.len());
    for input in inputs {
        let resolved = resolve(input, T::TYPE, Format::AUTO_DETECT)?;
        if resolved.shape.dim != reference.shape.dim {
            return Err(DatasetError::DimensionMismatch {
                reference: first.clone(),
                expected: reference.shape.dim,
                path: input.clone(),
                found: resolved.shape.dim,
            });
        }
        shapes.push(resolved.shape);
    }

    // Opening the output truncates it; it must not be one of the inputs
    if let Ok(target) = std::fs::canonicalize(output) {
        for input in inputs {
            if std::fs::canonicalize(input)? == target {
                return Err(DatasetError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("output {} is also an input", output.display()),
                )));
            }
        }
    }

    let out_format = match format.container() {
        Container::Vecs | Container::Bigann => format,
        _ => reference.format,
    };
    let dim = reference.shape.dim;
    let mut writer = StreamWriter::<T>::open(output, dim, out_format)?;
    tracing::info!("[merge] Output path : {} ({})", output.display(), writer.format());

    let mut summary = MergeSummary {
        format: writer.format(),
        dim,
        total_records: 0,
        inputs: Vec::with_capacity(inputs.len()),
    };

    for (n, (input, shape)) in inputs.iter().zip(&shapes).enumerate() {
        let start = Instant::now();
        tracing::info!(
            "[merge] Merging {} [size={}] ({:3} / {:3}) ...",
            input.display(),
            shape.count,
            n + 1,
            inputs.len()
        );

        let (data, loaded) = load_vec_with::<T>(input, LoadOptions::default(), progress)?;
        writer.append_with(&data, dim, loaded.count, progress)?;

        let elapsed = start.elapsed();
        tracing::info!("[merge] Done [{:.3}s]", elapsed.as_secs_f64());
        summary.total_records += loaded.count;
        summary.inputs.push((input.clone(), loaded.count, elapsed));
    }

    tracing::info!("[merge] Total dataset size : {}", summary.total_records);
    tracing::info!("[merge] Closing {}", output.display());
    writer.close()?;

    Ok(summary)
}
