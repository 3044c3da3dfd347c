//! Four-vectors and reference-relative features.

use crate::geometry::wrap_phi;

/// Energy-momentum four-vector `(E, px, py, pz)`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FourVector {
    /// Energy.
    pub e: f64,
    /// x momentum.
    pub px: f64,
    /// y momentum.
    pub py: f64,
    /// z momentum.
    pub pz: f64,
}

impl FourVector {
    /// Build from transverse momentum, pseudorapidity, azimuth and mass.
    pub fn from_pt_eta_phi_m(pt: f64, eta: f64, phi: f64, m: f64) -> Self {
        let pt = pt.abs();
        let px = pt * phi.cos();
        let py = pt * phi.sin();
        let pz = pt * eta.sinh();
        let p2 = px * px + py * py + pz * pz;
        let e = if m >= 0.0 { (p2 + m * m).sqrt() } else { (p2 - m * m).max(0.0).sqrt() };
        Self { e, px, py, pz }
    }
}

/// Reference direction and magnitude for relative features.
///
/// The default `(0, 0, 0)` stands in for an event with no such object.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Reference {
    /// Transverse momentum or energy of the reference object.
    pub pt: f64,
    /// Pseudorapidity.
    pub eta: f64,
    /// Azimuth.
    pub phi: f64,
}

impl Reference {
    /// Highest-`pt` entry among parallel slices, strictly above zero; first wins ties.
    pub fn leading(pt: &[f64], eta: &[f64], phi: &[f64]) -> Self {
        let mut best: Option<usize> = None;
        let mut best_pt = 0.0;
        for (i, &p) in pt.iter().enumerate() {
            if p > best_pt {
                best_pt = p;
                best = Some(i);
            }
        }
        match best {
            Some(i) => Self {
                pt: best_pt,
                eta: eta.get(i).copied().unwrap_or(0.0),
                phi: phi.get(i).copied().unwrap_or(0.0),
            },
            None => Self::default(),
        }
    }

    /// The higher-`pt` of two references; `self` wins ties.
    pub fn max(self, other: Reference) -> Self {
        if other.pt > self.pt { other } else { self }
    }
}

/// Angular offsets and distance-weighted combinations relative to a reference.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RelativeFeatures {
    /// `η_ref − η`.
    pub delta_eta: f64,
    /// Wrapped `φ_ref − φ`.
    pub delta_phi: f64,
    /// `sqrt(Δη² + Δφ²)`.
    pub delta_r: f64,
    /// `min(pt², pt_ref²) · ΔR²`.
    pub kt: f64,
    /// `min(pt⁻², pt_ref⁻²) · ΔR²`.
    pub anti_kt: f64,
}

impl RelativeFeatures {
    /// Features of an object at `(pt, eta, phi)` relative to `r`.
    pub fn new(r: &Reference, pt: f64, eta: f64, phi: f64) -> Self {
        let delta_eta = r.eta - eta;
        let delta_phi = wrap_phi(r.phi - phi);
        let dr2 = delta_eta * delta_eta + delta_phi * delta_phi;
        Self {
            delta_eta,
            delta_phi,
            delta_r: dr2.sqrt(),
            kt: kt_distance(pt, r.pt, dr2),
            anti_kt: anti_kt_distance(pt, r.pt, dr2),
        }
    }
}

/// `min(a², b²) · dr²`.
pub fn kt_distance(a: f64, b: f64, dr2: f64) -> f64 {
    (a * a).min(b * b) * dr2
}

/// `min(a⁻², b⁻²) · dr²`, with a zero momentum counting as infinite `p⁻²`.
///
/// When both momenta are zero the result is 0.0.
pub fn anti_kt_distance(a: f64, b: f64, dr2: f64) -> f64 {
    let inv = |p: f64| if p != 0.0 { 1.0 / (p * p) } else { f64::INFINITY };
    let m = inv(a).min(inv(b));
    if m.is_finite() { m * dr2 } else { 0.0 }
}
