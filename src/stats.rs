//! Dimension-wise statistics over an in-memory dataset
//!
//! Two parallel passes with rayon: min/max/sum first, then the squared
//! deviation from the finished mean. Records are dealt round-robin to the
//! workers; each worker owns its accumulators and the partial results are
//! merged by the reduce step.

use std::fmt::Write;

use rayon::prelude::*;

use crate::element::Element;

/// Statistics of one dimension
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DimensionStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Sample variance (divided by `count - 1`)
    pub variance: f64,
}

impl DimensionStats {
    const EMPTY: DimensionStats = DimensionStats {
        min: f64::NAN,
        max: f64::NAN,
        mean: f64::NAN,
        variance: f64::NAN,
    };

    #[inline]
    pub fn stddev(&self) -> f64 {
        self.variance.sqrt()
    }
}

/// Per-worker accumulators for the first pass
struct Extremes {
    min: Vec<f64>,
    max: Vec<f64>,
    sum: Vec<f64>,
}

impl Extremes {
    fn new(dim: usize) -> Self {
        Self {
            min: vec![f64::INFINITY; dim],
            max: vec![f64::NEG_INFINITY; dim],
            sum: vec![0.0; dim],
        }
    }

    fn merge(mut self, other: Self) -> Self {
        for j in 0..self.sum.len() {
            self.min[j] = self.min[j].min(other.min[j]);
            self.max[j] = self.max[j].max(other.max[j]);
            self.sum[j] += other.sum[j];
        }
        self
    }
}

/// Compute statistics for each of the `dim` leading columns of `count`
/// records laid out every `stride` elements in `data`.
///
/// With no records every field is NaN; with one record the variance is 0.
pub fn compute<T: Element>(data: &[T], stride: usize, count: usize, dim: usize) -> Vec<DimensionStats> {
    if count == 0 {
        return vec![DimensionStats::EMPTY; dim];
    }
    assert!(stride >= dim, "stride {} is smaller than dimension {}", stride, dim);
    assert!(
        data.len() >= (count - 1) * stride + dim,
        "buffer holds {} elements, {} records of stride {} need {}",
        data.len(),
        count,
        stride,
        (count - 1) * stride + dim
    );

    let workers = rayon::current_num_threads().clamp(1, count);
    let row = |i: usize| &data[i * stride..i * stride + dim];

    // pass 1: min / max / sum
    let extremes = (0..workers)
        .into_par_iter()
        .map(|w| {
            let mut local = Extremes::new(dim);
            for i in (w..count).step_by(workers) {
                for (j, &v) in row(i).iter().enumerate() {
                    let v = v.to_f64();
                    local.min[j] = local.min[j].min(v);
                    local.max[j] = local.max[j].max(v);
                    local.sum[j] += v;
                }
            }
            local
        })
        .reduce(|| Extremes::new(dim), Extremes::merge);

    let mean: Vec<f64> = extremes.sum.iter().map(|s| s / count as f64).collect();

    // pass 2: squared deviation from the mean
    let squares = (0..workers)
        .into_par_iter()
        .map(|w| {
            let mut local = vec![0.0f64; dim];
            for i in (w..count).step_by(workers) {
                for (j, &v) in row(i).iter().enumerate() {
                    let d = v.to_f64() - mean[j];
                    local[j] += d * d;
                }
            }
            local
        })
        .reduce(
            || vec![0.0f64; dim],
            |mut a, b| {
                a.iter_mut().zip(&b).for_each(|(x, y)| *x += y);
                a
            },
        );

    (0..dim)
        .map(|j| DimensionStats {
            min: extremes.min[j],
            max: extremes.max[j],
            mean: mean[j],
            variance: if count > 1 {
                squares[j] / (count - 1) as f64
            } else {
                0.0
            },
        })
        .collect()
}

/// Render `stats` as a table. A non-zero `graph_width` appends a range bar
/// per dimension, scaled to the largest absolute min/max over all dimensions.
///
/// ```text
/// dim |        mean,      stddev,         min,         max
///   0 | +7.9920e0, ...   [     |---*----- ]
/// ```
pub fn render_table(stats: &[DimensionStats], graph_width: usize) -> String {
    let dim_width = ((stats.len().max(1) as f64).log10() as usize + 1).max(3);
    let scale = stats
        .iter()
        .map(|s| s.min.abs().max(s.max.abs()))
        .filter(|v| v.is_finite())
        .fold(0.0f64, f64::max);
    let scale = if scale > 0.0 { scale } else { 1.0 };

    let mut out = String::new();
    let _ = write!(
        out,
        "{:>w$} | {:>11}, {:>11}, {:>11}, {:>11}",
        "dim",
        "mean",
        "stddev",
        "min",
        "max",
        w = dim_width
    );
    if graph_width > 0 {
        let _ = write!(out, "  {:^w$}", "range", w = graph_width + 2);
    }
    out.push('\n');

    for (j, s) in stats.iter().enumerate() {
        let _ = write!(
            out,
            "{:>w$} | {:>+11.4e}, {:>+11.4e}, {:>+11.4e}, {:>+11.4e}",
            j,
            s.mean,
            s.stddev(),
            s.min,
            s.max,
            w = dim_width
        );
        if graph_width > 0 {
            let _ = write!(out, "  {}", range_bar(s, scale, graph_width));
        }
        out.push('\n');
    }
    out
}

/// `[   |--*---   ]`: `|` marks zero, `-` spans min..max, `*` the mean
fn range_bar(s: &DimensionStats, scale: f64, width: usize) -> String {
    let last = width.saturating_sub(1);
    let pos = |x: f64| -> usize {
        let t = ((x / scale) + 1.0) / 2.0 * last as f64;
        (t.round().max(0.0) as usize).min(last)
    };

    let mut cells = vec![' '; width];
    if width > 0 {
        cells[pos(0.0)] = '|';
        if s.min.is_finite() && s.max.is_finite() {
            for cell in &mut cells[pos(s.min)..=pos(s.max)] {
                *cell = '-';
            }
        }
        if s.mean.is_finite() {
            cells[pos(s.mean)] = '*';
        }
    }

    let mut bar = String::with_capacity(width + 2);
    bar.push('[');
    bar.extend(cells);
    bar.push(']');
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_column() {
        let data = vec![5u8; 30];
        let stats = compute(&data, 3, 10, 3);
        for s in &stats {
            assert_eq!(s.min, 5.0);
            assert_eq!(s.max, 5.0);
            assert_eq!(s.mean, 5.0);
            assert_eq!(s.variance, 0.0);
        }
    }

    #[test]
    fn test_known_variance() {
        // column values 1, 2, 3, 4 -> mean 2.5, sample variance 5/3
        let data = vec![1.0f32, 2.0, 3.0, 4.0];
        let stats = compute(&data, 1, 4, 1);
        assert!((stats[0].mean - 2.5).abs() < 1e-12);
        assert!((stats[0].variance - 5.0 / 3.0).abs() < 1e-12);
        assert_eq!(stats[0].min, 1.0);
        assert_eq!(stats[0].max, 4.0);
    }

    #[test]
    fn test_stride_skips_padding() {
        // dim 2, stride 3: the third column is padding and must be ignored
        let data = vec![1i8, -1, 100, 3, -3, 100];
        let stats = compute(&data, 3, 2, 2);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].max, 3.0);
        assert_eq!(stats[1].min, -3.0);
    }

    #[test]
    fn test_empty_and_single() {
        let stats = compute::<u8>(&[], 4, 0, 4);
        assert_eq!(stats.len(), 4);
        assert!(stats[0].mean.is_nan());

        let stats = compute(&[7u32, 9], 2, 1, 2);
        assert_eq!(stats[1].mean, 9.0);
        assert_eq!(stats[1].variance, 0.0);
    }

    #[test]
    fn test_render_table() {
        let data = vec![-2.0f32, 0.0, 2.0, 4.0];
        let stats = compute(&data, 2, 2, 2);
        let table = render_table(&stats, 21);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("dim"));
        assert!(lines[0].contains("stddev"));
        assert!(lines[1].contains('['));
        assert!(lines[2].ends_with(']'));

        let plain = render_table(&stats, 0);
        assert!(!plain.contains('['));
    }

    #[test]
    fn test_range_bar_marks() {
        let s = DimensionStats {
            min: -1.0,
            max: 1.0,
            mean: 0.5,
            variance: 0.0,
        };
        let bar = range_bar(&s, 1.0, 5);
        assert_eq!(bar, "[---*-]");
    }
}
