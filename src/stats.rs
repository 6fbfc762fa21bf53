//! Chunk-parallel statistics over a stored array.
//!
//! Each pass reads the array one chunk at a time on the rayon pool,
//! so only a handful of chunks are resident at once.
//! Partial results are merged with commutative, associative operations.

use rayon::prelude::*;
use zarrs::{array::Array, array::ArraySubset, filesystem::FilesystemStore};

use crate::{
    chunk::chunk_subsets,
    element::{ElementKind, with_element_type},
    histogram::{Histogram, HistogramOptions, RobustStats},
    metadata::CHANNEL_AXIS_INDEX,
};

/// Compute [`RobustStats`] of an array, optionally restricted to one index of the channel axis.
pub fn robust_stats(
    array: &Array<FilesystemStore>,
    channel: Option<u64>,
    options: &HistogramOptions,
) -> crate::Result<RobustStats> {
    let path = array.path().as_str().to_string();
    let kind = ElementKind::of(array)?;
    let selections = selections(&path, array.shape(), chunk_subsets(array)?, channel)?;

    let histogram = match &options.bin_edges {
        Some(edges) => Histogram::new(edges.clone())?,
        None => {
            log::info!(
                "Computing range of \"{path}\" over {} chunks",
                selections.len()
            );
            let (min, max) = value_range(array, kind, &selections)?
                .ok_or_else(|| crate::Error::computation(&path, "no samples selected"))?;
            log::debug!("Range of \"{path}\" is [{min}, {max}]");
            Histogram::for_range(min, max, kind.is_integer(), options.bin_count)?
        }
    };

    log::info!(
        "Computing {}-bin histogram of \"{path}\"",
        histogram.counts().len()
    );
    let histogram = accumulate(array, kind, &selections, &histogram)?;
    let stats = RobustStats::from_histogram(&histogram)
        .ok_or_else(|| crate::Error::computation(&path, "no samples within histogram range"))?;
    log::debug!("Statistics of \"{path}\": {stats:?}");
    Ok(stats)
}

/// Non-empty chunk subsets of an array of `shape`, clipped to the channel if given.
fn selections(
    path: &str,
    shape: &[u64],
    chunks: Vec<ArraySubset>,
    channel: Option<u64>,
) -> crate::Result<Vec<ArraySubset>> {
    if let Some(c) = channel {
        let Some(&extent) = shape.get(CHANNEL_AXIS_INDEX) else {
            return Err(crate::Error::computation(path, "array has no channel axis"));
        };
        if c >= extent {
            return Err(crate::Error::computation(
                path,
                format!("channel {c} is out of range for {extent} channels"),
            ));
        }
    }

    let mut out = Vec::with_capacity(chunks.len());
    for subset in chunks {
        if subset.is_empty() {
            continue;
        }
        let Some(c) = channel else {
            out.push(subset);
            continue;
        };
        let mut ranges = subset.to_ranges();
        let range = &mut ranges[CHANNEL_AXIS_INDEX];
        if range.contains(&c) {
            *range = c..c + 1;
            out.push(ArraySubset::new_with_ranges(&ranges));
        }
    }
    if out.is_empty() {
        return Err(crate::Error::computation(path, "empty selection"));
    }
    Ok(out)
}

/// Read a subset as `f64` samples.
fn read_samples(
    array: &Array<FilesystemStore>,
    kind: ElementKind,
    subset: &ArraySubset,
) -> crate::Result<Vec<f64>> {
    with_element_type!(kind, T => {
        let data: Vec<T> = array.retrieve_array_subset(subset)?;
        Ok(data.into_iter().map(|v| v as f64).collect())
    })
}

fn merge_range(a: Option<(f64, f64)>, b: Option<(f64, f64)>) -> Option<(f64, f64)> {
    match (a, b) {
        (Some((a_min, a_max)), Some((b_min, b_max))) => Some((a_min.min(b_min), a_max.max(b_max))),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Minimum and maximum of the non-NaN samples, or None if there are none.
fn value_range(
    array: &Array<FilesystemStore>,
    kind: ElementKind,
    selections: &[ArraySubset],
) -> crate::Result<Option<(f64, f64)>> {
    selections
        .par_iter()
        .map(|subset| {
            let samples = read_samples(array, kind, subset)?;
            Ok::<_, crate::Error>(
                samples
                    .into_iter()
                    .filter(|v| !v.is_nan())
                    .fold(None, |acc, v| merge_range(acc, Some((v, v)))),
            )
        })
        .try_reduce(|| None, |a, b| Ok(merge_range(a, b)))
}

fn accumulate(
    array: &Array<FilesystemStore>,
    kind: ElementKind,
    selections: &[ArraySubset],
    template: &Histogram,
) -> crate::Result<Histogram> {
    selections
        .par_iter()
        .try_fold(
            || template.empty_like(),
            |mut histogram, subset| {
                histogram.extend(read_samples(array, kind, subset)?);
                Ok::<_, crate::Error>(histogram)
            },
        )
        .try_reduce(|| template.empty_like(), |a, b| a.merge(&b))
}
