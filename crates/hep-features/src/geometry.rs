//! Angular-distance geometry in (η, φ).
//!
//! Pure functions over slices of pseudorapidity and azimuth values. The
//! azimuthal difference is always wrapped into (−π, π] before squaring.

use std::f64::consts::{PI, TAU};

use hep_core::{Error, Result};

/// Wrap an azimuthal difference into (−π, π].
#[inline]
pub fn wrap_phi(dphi: f64) -> f64 {
    let d = dphi % TAU;
    if d > PI {
        d - TAU
    } else if d <= -PI {
        d + TAU
    } else {
        d
    }
}

/// Squared angular distance between two points.
#[inline]
pub fn delta_r_sq(eta_a: f64, phi_a: f64, eta_b: f64, phi_b: f64) -> f64 {
    let deta = eta_a - eta_b;
    let dphi = wrap_phi(phi_a - phi_b);
    deta * deta + dphi * dphi
}

/// Row-major N×M matrix of squared angular distances.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    n_rows: usize,
    n_cols: usize,
    data: Vec<f64>,
}

impl DistanceMatrix {
    /// Pairwise squared distances between collections A (rows) and B (columns).
    pub fn new(a_eta: &[f64], a_phi: &[f64], b_eta: &[f64], b_phi: &[f64]) -> Result<Self> {
        check_pair("A", a_eta, a_phi)?;
        check_pair("B", b_eta, b_phi)?;
        let (n_rows, n_cols) = (a_eta.len(), b_eta.len());
        let mut data = Vec::with_capacity(n_rows * n_cols);
        for i in 0..n_rows {
            for j in 0..n_cols {
                data.push(delta_r_sq(a_eta[i], a_phi[i], b_eta[j], b_phi[j]));
            }
        }
        Ok(Self { n_rows, n_cols, data })
    }

    /// Number of A entries.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of B entries.
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Distance² between A[i] and B[j].
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n_cols + j]
    }

    /// Distances² from A[i] to every B entry.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n_cols..(i + 1) * self.n_cols]
    }
}

fn check_pair(which: &str, eta: &[f64], phi: &[f64]) -> Result<()> {
    if eta.len() != phi.len() {
        return Err(Error::Validation(format!(
            "collection {which}: {} eta values but {} phi values",
            eta.len(),
            phi.len()
        )));
    }
    Ok(())
}

/// Index of the smallest value in `row`, skipping entries where `excluded` is true.
///
/// Ties resolve to the lowest index. `None` when every entry is excluded.
pub fn argmin_excluding(row: &[f64], excluded: Option<&[bool]>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (j, &d) in row.iter().enumerate() {
        if excluded.is_some_and(|m| m[j]) {
            continue;
        }
        match best {
            Some((_, b)) if d >= b => {}
            _ => best = Some((j, d)),
        }
    }
    best.map(|(j, _)| j)
}

/// For every A entry, the index of the closest B entry (lowest index on ties).
///
/// B must be non-empty.
pub fn nearest_match(
    a_eta: &[f64],
    a_phi: &[f64],
    b_eta: &[f64],
    b_phi: &[f64],
) -> Result<Vec<usize>> {
    if b_eta.is_empty() {
        return Err(Error::Validation("nearest_match: reference collection is empty".into()));
    }
    let m = DistanceMatrix::new(a_eta, a_phi, b_eta, b_phi)?;
    Ok((0..m.n_rows()).filter_map(|i| argmin_excluding(m.row(i), None)).collect())
}
