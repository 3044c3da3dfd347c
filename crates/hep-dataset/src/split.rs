//! Train/validation split arithmetic and shard sizing.

use std::str::FromStr;

use hep_core::{Error, Result};

use crate::config::DatasetLayout;

/// Estimated on-disk bytes per stored value.
pub const BYTES_PER_VALUE: f64 = 24.0;

/// Minimum number of digits in shard file names.
pub const MIN_SHARD_DIGITS: usize = 3;

/// Share of every class reserved for validation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ValidationSplit {
    /// No validation partition.
    #[default]
    None,
    /// Fraction in `(0, 1)`.
    Fraction(f64),
    /// Absolute number of samples per class.
    Count(usize),
}

impl ValidationSplit {
    /// Interpret a command-line value: `0` disables, values below 1 are
    /// fractions, whole numbers are counts.
    pub fn from_value(v: f64) -> Result<Self> {
        if !v.is_finite() || v < 0.0 {
            return Err(Error::Configuration(format!("invalid validation split {v}")));
        }
        if v == 0.0 {
            Ok(Self::None)
        } else if v < 1.0 {
            Ok(Self::Fraction(v))
        } else if v.fract() == 0.0 {
            Ok(Self::Count(v as usize))
        } else {
            Err(Error::Configuration(format!("cannot make fractional validation samples {v}")))
        }
    }
}

impl FromStr for ValidationSplit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let v: f64 = s
            .trim()
            .parse()
            .map_err(|_| Error::Configuration(format!("invalid validation split '{s}'")))?;
        Self::from_value(v)
    }
}

/// Split weights for `n_samples`: fractions summing to 1, or static counts.
///
/// A count larger than `n_samples` yields a negative training weight, which
/// [`set_range_from_splits`] rejects.
pub fn splits_from_val(v: ValidationSplit, n_samples: usize) -> Vec<f64> {
    match v {
        ValidationSplit::None => vec![n_samples as f64],
        ValidationSplit::Fraction(f) => vec![1.0 - f, f],
        ValidationSplit::Count(c) => vec![n_samples as f64 - c as f64, c as f64],
    }
}

fn is_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-8 + 1e-5 * b.abs()
}

/// Turn split weights into contiguous `(start, n)` ranges over `0..length`.
///
/// Weights of at least 1 are static counts and are taken first; the rest are
/// fractions of what remains and must sum to 1. Counts are truncated.
pub fn set_range_from_splits(splits: &[f64], length: usize) -> Result<Vec<(usize, usize)>> {
    if splits.iter().any(|&x| x < 0.0) {
        return Err(Error::Configuration(format!("splits cannot be negative: {splits:?}")));
    }
    let is_static: Vec<bool> = splits.iter().map(|&x| x.trunc() > 0.0).collect();

    let static_sum: f64 =
        splits.iter().zip(&is_static).filter(|(_, s)| **s).map(|(x, _)| x.trunc()).sum();
    if static_sum > length as f64 {
        return Err(Error::Configuration(format!(
            "static splits sum to {static_sum}, exceeding the {length} available samples"
        )));
    }
    let remaining = length as f64 - static_sum;

    let ratios: Vec<f64> =
        splits.iter().zip(&is_static).filter(|(_, s)| !**s).map(|(x, _)| *x).collect();
    let ratio_sum: f64 = ratios.iter().sum();
    if !ratios.is_empty() && !is_close(ratio_sum, 1.0) {
        return Err(Error::Configuration(format!("split fractions sum to {ratio_sum}, not 1.0")));
    }

    let mut start = 0usize;
    Ok(splits
        .iter()
        .zip(&is_static)
        .map(|(&x, &st)| {
            let n = if st { x.trunc() as usize } else { (x * remaining) as usize };
            let range = (start, n);
            start += n;
            range
        })
        .collect())
}

/// Requested shard size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardSize {
    /// Samples per class per shard.
    Samples(usize),
    /// Approximate file size in megabytes.
    Megabytes(usize),
}

impl Default for ShardSize {
    fn default() -> Self {
        Self::Samples(1000)
    }
}

impl FromStr for ShardSize {
    type Err = Error;

    /// `"1000"` or `"100MB"`.
    fn from_str(s: &str) -> Result<Self> {
        let t = s.trim();
        let (digits, mb) = match t.strip_suffix("MB").or_else(|| t.strip_suffix("mb")) {
            Some(d) => (d.trim(), true),
            None => (t, false),
        };
        let n: usize =
            digits.parse().map_err(|_| Error::Configuration(format!("invalid shard size '{s}'")))?;
        if n == 0 {
            return Err(Error::Configuration("shard size must be positive".into()));
        }
        Ok(if mb { Self::Megabytes(n) } else { Self::Samples(n) })
    }
}

impl ShardSize {
    /// Samples per shard window for `layout`, never below 1.
    pub fn stride(&self, layout: &DatasetLayout) -> usize {
        match *self {
            Self::Samples(n) => n.max(1),
            Self::Megabytes(mb) => {
                let mb_per_sample = layout.values_per_sample() as f64 * BYTES_PER_VALUE / 1e6;
                if mb_per_sample <= 0.0 {
                    return 1;
                }
                ((mb as f64 / mb_per_sample) as usize).max(1)
            }
        }
    }
}

/// Zero-padded width of shard indices for a partition of `n_samples`.
pub fn shard_digits(n_samples: usize, stride: usize) -> usize {
    let ratio = n_samples as f64 / stride.max(1) as f64;
    ((ratio + 1.0).log10() as usize).max(MIN_SHARD_DIGITS)
}

/// Window starts covering `start..start + n` in steps of `stride`, with sizes.
pub fn windows(start: usize, n: usize, stride: usize) -> impl Iterator<Item = (usize, usize)> {
    let end = start + n;
    (start..end).step_by(stride.max(1)).map(move |s| (s, stride.max(1).min(end - s)))
}
