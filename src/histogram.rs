use serde::Serialize;

/// Default number of bins when edges are derived from the data range.
pub const DEFAULT_BIN_COUNT: usize = 1024;

/// Magnitude below which every multiple of 0.5 is an exact `f64`.
const EXACT_HALVES: f64 = (1u64 << 52) as f64;

/// How a histogram is binned.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramOptions {
    /// Number of equal-width bins used when the data calls for them.
    pub bin_count: usize,
    /// Explicit bin edges; derived from the data's min/max if None.
    pub bin_edges: Option<Vec<f64>>,
}

impl Default for HistogramOptions {
    fn default() -> Self {
        Self {
            bin_count: DEFAULT_BIN_COUNT,
            bin_edges: None,
        }
    }
}

impl HistogramOptions {
    pub fn with_bin_count(mut self, bin_count: usize) -> Self {
        self.bin_count = bin_count;
        self
    }

    pub fn with_bin_edges(mut self, bin_edges: Vec<f64>) -> Self {
        self.bin_edges = Some(bin_edges);
        self
    }
}

/// Counts of samples falling into bins delimited by monotonically increasing edges.
///
/// Bins are half-open `[edge[i], edge[i + 1])` except the last, which also includes its upper edge.
/// Samples outside the edges, and NaNs, are not counted.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    edges: Vec<f64>,
    counts: Vec<u64>,
}

impl Histogram {
    pub fn new(edges: Vec<f64>) -> crate::Result<Self> {
        if edges.len() < 2 {
            return Err(crate::Error::general("a histogram needs at least two bin edges"));
        }
        if edges.iter().any(|e| !e.is_finite()) || edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(crate::Error::general(
                "histogram bin edges must be finite and strictly increasing",
            ));
        }
        let counts = vec![0; edges.len() - 1];
        Ok(Self { edges, counts })
    }

    /// Derive bin edges from the data range.
    ///
    /// Integer data spanning fewer than `bin_count` values gets one bin per integer,
    /// centred on it; anything else gets `bin_count` equal-width bins over `[min, max]`.
    /// A single value gets a single bin centred on it, one unit wide or a few ulps at large magnitudes.
    /// Edges which round to the same value are merged, leaving fewer bins.
    pub fn for_range(min: f64, max: f64, integer: bool, bin_count: usize) -> crate::Result<Self> {
        if !(min.is_finite() && max.is_finite()) || min > max {
            return Err(crate::Error::general(format!(
                "invalid histogram range [{min}, {max}]"
            )));
        }
        let magnitude = min.abs().max(max.abs());
        let mut edges = if min == max {
            let half = 0.5_f64.max(2.0 * f64::EPSILON * magnitude);
            vec![min - half, min + half]
        } else if integer && max - min < bin_count as f64 && magnitude < EXACT_HALVES {
            let n = (max - min) as usize + 1;
            (0..=n).map(|i| min - 0.5 + i as f64).collect()
        } else {
            let n = bin_count.max(1);
            let width = max - min;
            let mut edges: Vec<f64> = (0..=n).map(|i| min + width * i as f64 / n as f64).collect();
            edges[n] = max;
            edges
        };
        edges.dedup();
        Self::new(edges)
    }

    /// An empty histogram with the same edges.
    pub fn empty_like(&self) -> Self {
        Self {
            edges: self.edges.clone(),
            counts: vec![0; self.counts.len()],
        }
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn midpoints(&self) -> Vec<f64> {
        self.edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
    }

    fn bin_index(&self, value: f64) -> Option<usize> {
        let first = self.edges[0];
        let last = self.edges[self.edges.len() - 1];
        if value.is_nan() || value < first || value > last {
            return None;
        }
        if value == last {
            return Some(self.counts.len() - 1);
        }
        Some(self.edges.partition_point(|&e| e <= value) - 1)
    }

    pub fn push(&mut self, value: f64) {
        if let Some(idx) = self.bin_index(value) {
            self.counts[idx] += 1;
        }
    }

    pub fn extend(&mut self, values: impl IntoIterator<Item = f64>) {
        for v in values {
            self.push(v);
        }
    }

    /// Add the counts of another histogram with identical edges.
    pub fn merge(mut self, other: &Self) -> crate::Result<Self> {
        if self.edges != other.edges {
            return Err(crate::Error::general(
                "cannot merge histograms with different bin edges",
            ));
        }
        for (a, b) in self.counts.iter_mut().zip(&other.counts) {
            *a += b;
        }
        Ok(self)
    }
}

/// Linear interpolation of `x` on the monotonic points `(xp, fp)`, clamped at both ends.
pub fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    let (Some(&x_first), Some(&x_last)) = (xp.first(), xp.last()) else {
        return f64::NAN;
    };
    if x <= x_first {
        return fp[0];
    }
    if x >= x_last {
        return fp[fp.len() - 1];
    }
    let hi = xp.partition_point(|&p| p <= x);
    let lo = hi - 1;
    let t = (x - xp[lo]) / (xp[hi] - xp[lo]);
    fp[lo] + t * (fp[hi] - fp[lo])
}

/// Quantiles of weighted samples.
///
/// Each sample sits at the centre of its weight on the cumulative scale,
/// `(cumsum(w) - w / 2) / sum(w)`, and quantiles interpolate linearly between them.
/// Pass `values_sorted` to skip sorting when `values` are already ascending.
pub fn weighted_quantile(
    values: &[f64],
    quantiles: &[f64],
    weights: &[f64],
    values_sorted: bool,
) -> Vec<f64> {
    let (values, weights): (Vec<f64>, Vec<f64>) = if values_sorted {
        (values.to_vec(), weights.to_vec())
    } else {
        let mut order: Vec<usize> = (0..values.len()).collect();
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
        order.iter().map(|&i| (values[i], weights[i])).unzip()
    };

    let total: f64 = weights.iter().sum();
    let mut cumulative = 0.0;
    let positions: Vec<f64> = weights
        .iter()
        .map(|&w| {
            cumulative += w;
            (cumulative - 0.5 * w) / total
        })
        .collect();

    quantiles
        .iter()
        .map(|&q| interp(q, &positions, &values))
        .collect()
}

/// Histogram-derived summary of an image's intensities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RobustStats {
    pub min: f64,
    pub max: f64,
    pub median: f64,
    /// Median absolute deviation about the median.
    pub mad: f64,
    pub mean: f64,
    pub stddev: f64,
    /// Number of samples in the histogram.
    pub count: u64,
}

impl RobustStats {
    /// Returns None if the histogram is empty.
    pub fn from_histogram(histogram: &Histogram) -> Option<Self> {
        let count = histogram.total();
        if count == 0 {
            return None;
        }
        let mids = histogram.midpoints();
        let weights: Vec<f64> = histogram.counts().iter().map(|&c| c as f64).collect();
        let total = count as f64;

        let median = weighted_quantile(&mids, &[0.5], &weights, true)[0];
        let deviations: Vec<f64> = mids.iter().map(|m| (m - median).abs()).collect();
        let mad = weighted_quantile(&deviations, &[0.5], &weights, false)[0];

        let mean = mids.iter().zip(&weights).map(|(m, w)| m * w).sum::<f64>() / total;
        let variance = mids
            .iter()
            .zip(&weights)
            .map(|(m, w)| w * (m - mean).powi(2))
            .sum::<f64>()
            / total;

        let extremes = weighted_quantile(&mids, &[0.0, 1.0], &weights, true);

        Some(Self {
            min: extremes[0],
            max: extremes[1],
            median,
            mad,
            mean,
            stddev: variance.sqrt(),
            count,
        })
    }

    /// `median ± mad_scale * mad`, clamped to `[min, max]`.
    pub fn window(&self, mad_scale: f64) -> (f64, f64) {
        let lo = (self.median - self.mad * mad_scale).max(self.min);
        let hi = (self.median + self.mad * mad_scale).min(self.max);
        (lo.min(hi), hi)
    }
}
