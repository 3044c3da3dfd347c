//! Cone isolation sums.

use serde::{Deserialize, Serialize};

use hep_core::{Error, Result};

use crate::geometry::DistanceMatrix;

/// Isolation cone settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolationConfig {
    /// Cone radius in ΔR.
    pub cone: f64,
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self { cone: 0.3 }
    }
}

impl IsolationConfig {
    /// Reject non-positive or non-finite cones.
    pub fn validate(&self) -> Result<()> {
        if !(self.cone.is_finite() && self.cone > 0.0) {
            return Err(Error::Configuration(format!(
                "isolation cone must be positive, got {}",
                self.cone
            )));
        }
        Ok(())
    }
}

/// One collection of objects in (η, φ) with their transverse energies.
#[derive(Debug, Clone, Copy)]
pub struct Cone<'a> {
    /// Pseudorapidities.
    pub eta: &'a [f64],
    /// Azimuths.
    pub phi: &'a [f64],
    /// Transverse momenta or energies.
    pub energy: &'a [f64],
}

impl Cone<'_> {
    fn len(&self) -> Result<usize> {
        let n = self.eta.len();
        if self.phi.len() != n || self.energy.len() != n {
            return Err(Error::Validation(format!(
                "isolation input lengths differ: eta {}, phi {}, energy {}",
                n,
                self.phi.len(),
                self.energy.len()
            )));
        }
        Ok(n)
    }
}

/// `iso[i] = Σ_j ΔR²(i, j) · energy_ref[j] · [ΔR²(i, j) < cone²] / energy_target[i]`.
///
/// Reference energies are weighted by their squared distance to the target,
/// so a coincident object contributes nothing. Targets with zero energy get 0.0.
pub fn isolation(target: Cone<'_>, reference: Cone<'_>, cfg: &IsolationConfig) -> Result<Vec<f64>> {
    let n = target.len()?;
    reference.len()?;
    let dr2 = DistanceMatrix::new(target.eta, target.phi, reference.eta, reference.phi)?;
    let cut2 = cfg.cone * cfg.cone;

    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let e = target.energy[i];
        if e == 0.0 {
            out.push(0.0);
            continue;
        }
        let sum: f64 = dr2
            .row(i)
            .iter()
            .zip(reference.energy)
            .filter(|(d, _)| **d < cut2)
            .map(|(d, w)| d * w)
            .sum();
        out.push(sum / e);
    }
    Ok(out)
}

/// Isolation of a collection against itself, minus one unit for the
/// self-pairing. An object alone in its cone scores -1.0.
pub fn self_isolation(objects: Cone<'_>, cfg: &IsolationConfig) -> Result<Vec<f64>> {
    let mut iso = isolation(objects, objects, cfg)?;
    for (v, e) in iso.iter_mut().zip(objects.energy) {
        if *e != 0.0 {
            *v -= 1.0;
        }
    }
    Ok(iso)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cone<'a>(eta: &'a [f64], phi: &'a [f64], energy: &'a [f64]) -> Cone<'a> {
        Cone { eta, phi, energy }
    }

    #[test]
    fn sums_distance_weighted_energy_inside_the_cone() {
        let cfg = IsolationConfig::default();
        let iso = isolation(
            cone(&[0.0], &[0.0], &[10.0]),
            cone(&[0.1, 0.0, 1.0], &[0.1, 0.29, 0.0], &[2.0, 3.0, 50.0]),
            &cfg,
        )
        .unwrap();
        let expected = (0.02 * 2.0 + 0.29 * 0.29 * 3.0) / 10.0;
        assert_relative_eq!(iso[0], expected, epsilon = 1e-12);
    }

    #[test]
    fn isolated_object_scores() {
        let cfg = IsolationConfig::default();
        let objs = cone(&[0.0, 2.0], &[0.0, 2.0], &[25.0, 40.0]);
        let cross = isolation(objs, cone(&[], &[], &[]), &cfg).unwrap();
        assert_eq!(cross, vec![0.0, 0.0]);
        // Neighbour outside the cone: only the object itself.
        assert_eq!(self_isolation(objs, &cfg).unwrap(), vec![-1.0, -1.0]);
    }

    #[test]
    fn coincident_reference_contributes_nothing() {
        let cfg = IsolationConfig::default();
        let target = cone(&[0.5], &[1.0], &[20.0]);
        let iso = isolation(target, cone(&[0.5], &[1.0], &[80.0]), &cfg).unwrap();
        assert_eq!(iso, vec![0.0]);
    }

    #[test]
    fn self_pairing_removes_exactly_one_unit() {
        let cfg = IsolationConfig::default();
        let objs = cone(&[0.0, 0.1], &[0.0, 0.0], &[20.0, 5.0]);
        let own = self_isolation(objs, &cfg).unwrap();
        assert_relative_eq!(own[0], 0.01 * 5.0 / 20.0 - 1.0, epsilon = 1e-12);
        assert_relative_eq!(own[1], 0.01 * 20.0 / 5.0 - 1.0, epsilon = 1e-12);

        let raw = isolation(objs, objs, &cfg).unwrap();
        for (r, s) in raw.iter().zip(&own) {
            assert_relative_eq!(r - s, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn zero_energy_target_is_zero() {
        let cfg = IsolationConfig::default();
        let objs = cone(&[0.0], &[0.0], &[0.0]);
        assert_eq!(self_isolation(objs, &cfg).unwrap(), vec![0.0]);
    }

    #[test]
    fn cone_must_be_positive() {
        assert!(IsolationConfig { cone: 0.0 }.validate().is_err());
        assert!(IsolationConfig::default().validate().is_ok());
    }
}
