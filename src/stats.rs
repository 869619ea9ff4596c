//! Summary statistics behind each chart kind.
//!
//! Every function here is what a plotting primitive would compute on its own
//! before drawing: bins for a histogram, quartiles for a box, counts for a
//! count plot. Nothing is cached between calls.

use crate::data::Dataset;
use crate::error::Result;
use std::collections::HashMap;

/// Upper bound on automatically chosen histogram bins
const MAX_BINS: usize = 200;

/// Resolution of density curves
const KDE_GRID_POINTS: usize = 200;

/// Two-sided 95% normal quantile
const Z_95: f64 = 1.959_963_984_540_054;

/// Present, finite values of a numeric column
pub fn finite(values: &[Option<f64>]) -> Vec<f64> {
    values
        .iter()
        .filter_map(|v| *v)
        .filter(|v| v.is_finite())
        .collect()
}

/// Rows where both cells are present and finite
pub fn paired(xs: &[Option<f64>], ys: &[Option<f64>]) -> Vec<(f64, f64)> {
    xs.iter()
        .zip(ys.iter())
        .filter_map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some((*x, *y)),
            _ => None,
        })
        .collect()
}

pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    Some((min, max))
}

/// Linear-interpolated percentile of already sorted data
pub fn percentile(sorted_data: &[f64], p: f64) -> f64 {
    let n = sorted_data.len();
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return sorted_data[0];
    }

    let rank = p * (n - 1) as f64;
    let lower_idx = rank.floor() as usize;
    let upper_idx = rank.ceil() as usize;

    if lower_idx == upper_idx {
        sorted_data[lower_idx]
    } else {
        let weight = rank - lower_idx as f64;
        sorted_data[lower_idx] * (1.0 - weight) + sorted_data[upper_idx] * weight
    }
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(|a, b| a.total_cmp(b));
    out
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator)
fn std_dev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (n - 1) as f64;
    variance.sqrt()
}

// =============================================================================
// Box plots
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct BoxStats {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    /// Most extreme data point within 1.5 IQR of the box
    pub lower_whisker: f64,
    pub upper_whisker: f64,
    pub outliers: Vec<f64>,
}

pub fn box_stats(values: &[f64]) -> Option<BoxStats> {
    if values.is_empty() {
        return None;
    }
    let ys = sorted(values);

    let q1 = percentile(&ys, 0.25);
    let median = percentile(&ys, 0.50);
    let q3 = percentile(&ys, 0.75);
    let iqr = q3 - q1;

    let lower_fence = q1 - 1.5 * iqr;
    let upper_fence = q3 + 1.5 * iqr;

    let lower_whisker = ys
        .iter()
        .copied()
        .find(|&v| v >= lower_fence)
        .unwrap_or(q1);
    let upper_whisker = ys
        .iter()
        .rev()
        .copied()
        .find(|&v| v <= upper_fence)
        .unwrap_or(q3);

    let outliers = ys
        .iter()
        .copied()
        .filter(|&v| v < lower_fence || v > upper_fence)
        .collect();

    Some(BoxStats {
        q1,
        median,
        q3,
        lower_whisker,
        upper_whisker,
        outliers,
    })
}

impl BoxStats {
    /// Data extent including outliers
    pub fn extent(&self) -> (f64, f64) {
        let lo = self
            .outliers
            .iter()
            .cloned()
            .fold(self.lower_whisker, f64::min);
        let hi = self
            .outliers
            .iter()
            .cloned()
            .fold(self.upper_whisker, f64::max);
        (lo, hi)
    }
}

// =============================================================================
// Histograms and densities
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// `counts.len() + 1` ascending bin edges
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    pub fn bin_width(&self) -> f64 {
        if self.edges.len() < 2 {
            return 1.0;
        }
        self.edges[1] - self.edges[0]
    }

    pub fn max_count(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// (left edge, right edge, count) per bin
    pub fn bins(&self) -> impl Iterator<Item = (f64, f64, usize)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .map(move |(i, &c)| (self.edges[i], self.edges[i + 1], c))
    }
}

/// Bin count from the smaller of the Sturges and Freedman-Diaconis widths.
fn auto_bin_count(sorted_values: &[f64], range: f64) -> usize {
    let n = sorted_values.len() as f64;
    let sturges_width = range / (n.log2() + 1.0);

    let iqr = percentile(sorted_values, 0.75) - percentile(sorted_values, 0.25);
    let fd_width = 2.0 * iqr * n.powf(-1.0 / 3.0);

    let width = if fd_width > 0.0 {
        fd_width.min(sturges_width)
    } else {
        sturges_width
    };

    ((range / width).ceil() as usize).clamp(1, MAX_BINS)
}

pub fn histogram(values: &[f64]) -> Option<Histogram> {
    let (min, max) = min_max(values)?;

    if min == max {
        return Some(Histogram {
            edges: vec![min - 0.5, max + 0.5],
            counts: vec![values.len()],
        });
    }

    let sorted_values = sorted(values);
    let range = max - min;
    let bin_count = auto_bin_count(&sorted_values, range);
    let width = range / bin_count as f64;

    let edges: Vec<f64> = (0..=bin_count)
        .map(|i| if i == bin_count { max } else { min + i as f64 * width })
        .collect();

    let mut counts = vec![0usize; bin_count];
    for &v in values {
        // The last bin is closed on the right.
        let idx = (((v - min) / width).floor() as usize).min(bin_count - 1);
        counts[idx] += 1;
    }

    Some(Histogram { edges, counts })
}

/// Scott's rule: h = std * n^(-1/5)
pub fn scott_bandwidth(data: &[f64]) -> f64 {
    let n = data.len() as f64;
    std_dev(data) * n.powf(-0.2)
}

fn gaussian_kernel(u: f64) -> f64 {
    const SQRT_2PI: f64 = 2.5066282746310002;
    (-0.5 * u * u).exp() / SQRT_2PI
}

/// Gaussian KDE evaluated across the data range, in density units.
/// Empty when the data has fewer than two points or no spread.
pub fn kde_curve(data: &[f64]) -> Vec<(f64, f64)> {
    if data.len() < 2 {
        return Vec::new();
    }
    let bandwidth = scott_bandwidth(data);
    if bandwidth <= 0.0 || !bandwidth.is_finite() {
        return Vec::new();
    }
    let Some((lo, hi)) = min_max(data) else {
        return Vec::new();
    };

    let n = data.len() as f64;
    let step = (hi - lo) / (KDE_GRID_POINTS - 1) as f64;

    (0..KDE_GRID_POINTS)
        .map(|i| {
            let x = lo + i as f64 * step;
            let d: f64 = data
                .iter()
                .map(|&xi| gaussian_kernel((x - xi) / bandwidth))
                .sum();
            (x, d / (n * bandwidth))
        })
        .collect()
}

// =============================================================================
// Categorical counts
// =============================================================================

/// Category counts in order of first appearance, missing cells dropped
pub fn category_counts(labels: &[Option<String>]) -> Vec<(String, usize)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(String, usize)> = Vec::new();

    for label in labels.iter().flatten() {
        match index.get(label.as_str()) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(label.as_str(), counts.len());
                counts.push((label.clone(), 1));
            }
        }
    }
    counts
}

/// Category counts, most frequent first; ties keep first-appearance order.
pub fn value_counts(labels: &[Option<String>]) -> Vec<(String, usize)> {
    let mut counts = category_counts(labels);
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

#[derive(Debug, Clone, PartialEq)]
pub struct PieSlice {
    pub label: String,
    pub count: usize,
    /// Share of the slices shown, 0-100
    pub percent: f64,
}

pub fn top_categories(labels: &[Option<String>], top_n: usize) -> Vec<PieSlice> {
    let top: Vec<(String, usize)> = value_counts(labels).into_iter().take(top_n).collect();
    let total: usize = top.iter().map(|(_, c)| c).sum();

    top.into_iter()
        .map(|(label, count)| PieSlice {
            label,
            count,
            percent: if total == 0 {
                0.0
            } else {
                count as f64 * 100.0 / total as f64
            },
        })
        .collect()
}

// =============================================================================
// Aggregation with confidence intervals
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    pub mean: f64,
    pub low: f64,
    pub high: f64,
    pub n: usize,
}

/// Mean with a 95% normal-approximation interval. A single observation has
/// a zero-width interval.
pub fn mean_ci(values: &[f64]) -> Option<Estimate> {
    if values.is_empty() {
        return None;
    }
    let m = mean(values);
    let half = if values.len() < 2 {
        0.0
    } else {
        Z_95 * std_dev(values) / (values.len() as f64).sqrt()
    };
    Some(Estimate {
        mean: m,
        low: m - half,
        high: m + half,
        n: values.len(),
    })
}

/// Numeric values grouped by category, categories in first-appearance
/// order. Rows missing either cell are skipped.
pub fn group_by_category(labels: &[Option<String>], values: &[Option<f64>]) -> Vec<(String, Vec<f64>)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<f64>)> = Vec::new();

    for (label, value) in labels.iter().zip(values.iter()) {
        let (Some(label), Some(value)) = (label, value) else {
            continue;
        };
        if !value.is_finite() {
            continue;
        }
        match index.get(label.as_str()) {
            Some(&i) => groups[i].1.push(*value),
            None => {
                index.insert(label.as_str(), groups.len());
                groups.push((label.clone(), vec![*value]));
            }
        }
    }
    groups
}

/// Mean of y per distinct x, ascending in x
pub fn aggregate_by_x(xs: &[Option<f64>], ys: &[Option<f64>]) -> Vec<(f64, Estimate)> {
    let mut pairs = paired(xs, ys);
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut out: Vec<(f64, Estimate)> = Vec::new();
    let mut start = 0;
    while start < pairs.len() {
        let x = pairs[start].0;
        let end = pairs[start..]
            .iter()
            .position(|(px, _)| *px != x)
            .map_or(pairs.len(), |offset| start + offset);
        let group: Vec<f64> = pairs[start..end].iter().map(|(_, y)| *y).collect();
        if let Some(estimate) = mean_ci(&group) {
            out.push((x, estimate));
        }
        start = end;
    }
    out
}

// =============================================================================
// Correlation
// =============================================================================

/// Pearson correlation over pairwise-complete rows. `None` with fewer than
/// two pairs or when either side has no variance.
pub fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> Option<f64> {
    let pairs = paired(xs, ys);
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut syy = 0.0;
    let mut sxy = 0.0;
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }

    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

/// Square correlation matrix over a set of numeric columns.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub labels: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn compute(dataset: &Dataset, columns: &[String]) -> Result<Self> {
        let series = columns
            .iter()
            .map(|c| dataset.numeric(c))
            .collect::<Result<Vec<_>>>()?;

        let n = series.len();
        let mut values = vec![vec![None; n]; n];
        for i in 0..n {
            for j in 0..=i {
                let r = pearson(series[i], series[j]);
                values[i][j] = r;
                values[j][i] = r;
            }
        }

        Ok(Self {
            labels: columns.to_vec(),
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.values[row][col]
    }

    /// Cells above the diagonal repeat the ones below it and are hidden.
    pub fn is_masked(&self, row: usize, col: usize) -> bool {
        col > row
    }

    pub fn is_symmetric(&self) -> bool {
        (0..self.len()).all(|i| (0..self.len()).all(|j| self.values[i][j] == self.values[j][i]))
    }

    /// (row, col, value) for every unmasked cell, row-major
    pub fn visible_cells(&self) -> impl Iterator<Item = (usize, usize, Option<f64>)> + '_ {
        (0..self.len()).flat_map(move |i| (0..=i).map(move |j| (i, j, self.values[i][j])))
    }
}
