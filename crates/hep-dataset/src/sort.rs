//! Row ordering inside one event block.
//!
//! A block is an `(n_rows, n_columns)` slice of an object table for a single
//! event. Rows are either shuffled or ordered by a list of keys, where the
//! first key listed is the primary one. All-zero rows are padding and always
//! end up last, whatever the direction.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, ArrayView1, Axis};
use rand::Rng;
use rand::seq::SliceRandom;

use hep_core::{Error, Result};
use hep_features::{Reference, RelativeFeatures};

/// Quantities recomputed from a block relative to its leading row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortMetric {
    /// Wrapped Δφ to the leading row.
    MaxLepDeltaPhi,
    /// Δη to the leading row.
    MaxLepDeltaEta,
    /// ΔR to the leading row.
    MaxLepDeltaR,
    /// kt distance to the leading row.
    MaxLepKt,
    /// anti-kt distance to the leading row.
    MaxLepAntiKt,
}

impl SortMetric {
    /// Every metric.
    pub const ALL: [SortMetric; 5] = [
        SortMetric::MaxLepDeltaPhi,
        SortMetric::MaxLepDeltaEta,
        SortMetric::MaxLepDeltaR,
        SortMetric::MaxLepKt,
        SortMetric::MaxLepAntiKt,
    ];

    /// Name used in sort specifications.
    pub fn name(self) -> &'static str {
        match self {
            SortMetric::MaxLepDeltaPhi => "MaxLepDeltaPhi",
            SortMetric::MaxLepDeltaEta => "MaxLepDeltaEta",
            SortMetric::MaxLepDeltaR => "MaxLepDeltaR",
            SortMetric::MaxLepKt => "MaxLepKt",
            SortMetric::MaxLepAntiKt => "MaxLepAntiKt",
        }
    }

    /// Inverse of [`SortMetric::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    fn pick(self, f: &RelativeFeatures) -> f64 {
        match self {
            SortMetric::MaxLepDeltaPhi => f.delta_phi,
            SortMetric::MaxLepDeltaEta => f.delta_eta,
            SortMetric::MaxLepDeltaR => f.delta_r,
            SortMetric::MaxLepKt => f.kt,
            SortMetric::MaxLepAntiKt => f.anti_kt,
        }
    }
}

/// How rows of each event block are ordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortSpec {
    /// Random order (`shuffle` or `random`).
    Shuffle,
    /// Keys in priority order. A name matching a column of the block sorts by
    /// that column (`PT` and `PT_or_ET` stand in for each other); otherwise it
    /// must be a [`SortMetric`].
    Keys(Vec<String>),
}

impl FromStr for SortSpec {
    type Err = Error;

    /// `"shuffle"`, `"random"` or a comma-separated key list (`"PT,Eta"`).
    fn from_str(s: &str) -> Result<Self> {
        let keys: Vec<String> =
            s.split(',').map(str::trim).filter(|k| !k.is_empty()).map(String::from).collect();
        if keys.is_empty() {
            return Err(Error::Configuration("empty sort specification".into()));
        }
        if keys.iter().any(|k| k == "shuffle" || k == "random") {
            return Ok(SortSpec::Shuffle);
        }
        Ok(SortSpec::Keys(keys))
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortSpec::Shuffle => f.write_str("shuffle"),
            SortSpec::Keys(keys) => f.write_str(&keys.join(",")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BoundKey {
    Column(usize),
    Metric(SortMetric),
}

/// Column positions of the quantities metrics need.
#[derive(Debug, Clone, Copy, PartialEq)]
struct MetricColumns {
    pt: usize,
    eta: usize,
    phi: usize,
}

/// A [`SortSpec`] resolved against the column layout of a block.
#[derive(Debug, Clone, PartialEq)]
pub struct SortPlan {
    shuffle: bool,
    keys: Vec<BoundKey>,
    energy: Option<usize>,
    metric_cols: Option<MetricColumns>,
}

/// Names of the magnitude column, in lookup order.
const MAGNITUDE_COLUMNS: [&str; 2] = ["PT_or_ET", "PT"];

/// Position of column `name`, accepting either magnitude name for the other.
fn column_position(columns: &[&str], name: &str) -> Option<usize> {
    columns.iter().position(|c| *c == name).or_else(|| {
        if MAGNITUDE_COLUMNS.contains(&name) {
            MAGNITUDE_COLUMNS.iter().find_map(|m| columns.iter().position(|c| c == m))
        } else {
            None
        }
    })
}

impl SortSpec {
    /// Columns a block must carry for this spec, beyond the selected features.
    ///
    /// `available` is the full column list of the source table.
    pub fn required_columns<'a>(&self, available: &[&'a str]) -> Result<Vec<&'a str>> {
        let SortSpec::Keys(keys) = self else {
            return Ok(Vec::new());
        };
        let find = |name: &str| column_position(available, name).map(|i| available[i]);
        let mut out = Vec::new();
        let mut push = |c: &'a str| {
            if !out.contains(&c) {
                out.push(c);
            }
        };
        if let Some(e) = find("Energy") {
            push(e);
        }
        for key in keys {
            if let Some(c) = find(key.as_str()) {
                push(c);
            } else if SortMetric::from_name(key).is_some() {
                let pt = MAGNITUDE_COLUMNS.iter().find_map(|m| find(*m)).ok_or_else(|| {
                    Error::Configuration(format!("sort metric '{key}' needs a PT column"))
                })?;
                push(pt);
                for c in ["Eta", "Phi"] {
                    push(find(c).ok_or_else(|| {
                        Error::Configuration(format!("sort metric '{key}' needs column '{c}'"))
                    })?);
                }
            } else {
                return Err(Error::Configuration(format!("unrecognized sort key '{key}'")));
            }
        }
        Ok(out)
    }

    /// Resolve key names against the block columns `columns`.
    pub fn bind(&self, columns: &[&str]) -> Result<SortPlan> {
        let pos = |name: &str| column_position(columns, name);
        let keys = match self {
            SortSpec::Shuffle => {
                return Ok(SortPlan {
                    shuffle: true,
                    keys: Vec::new(),
                    energy: None,
                    metric_cols: None,
                });
            }
            SortSpec::Keys(keys) => keys,
        };

        let mut bound = Vec::with_capacity(keys.len());
        let mut metric_cols = None;
        for key in keys {
            if let Some(i) = pos(key.as_str()) {
                bound.push(BoundKey::Column(i));
                continue;
            }
            let metric = SortMetric::from_name(key)
                .ok_or_else(|| Error::Configuration(format!("unrecognized sort key '{key}'")))?;
            if metric_cols.is_none() {
                let missing = |c: &str| {
                    Error::Configuration(format!("sort metric '{key}' needs column '{c}'"))
                };
                metric_cols = Some(MetricColumns {
                    pt: MAGNITUDE_COLUMNS
                        .iter()
                        .find_map(|m| pos(*m))
                        .ok_or_else(|| missing("PT"))?,
                    eta: pos("Eta").ok_or_else(|| missing("Eta"))?,
                    phi: pos("Phi").ok_or_else(|| missing("Phi"))?,
                });
            }
            bound.push(BoundKey::Metric(metric));
        }
        Ok(SortPlan { shuffle: false, keys: bound, energy: pos("Energy"), metric_cols })
    }
}

fn is_padding(row: ArrayView1<'_, f64>) -> bool {
    row.iter().all(|&v| v == 0.0)
}

impl SortPlan {
    /// Plan that leaves blocks untouched.
    pub fn identity() -> Self {
        Self { shuffle: false, keys: Vec::new(), energy: None, metric_cols: None }
    }

    /// Whether the plan reorders rows at all.
    pub fn is_identity(&self) -> bool {
        !self.shuffle && self.keys.is_empty()
    }

    fn key_values(&self, block: &Array2<f64>, real: &[bool]) -> Vec<Vec<f64>> {
        let reference = self.metric_cols.map(|mc| {
            let pick = |col: usize| -> Vec<f64> {
                block
                    .column(col)
                    .iter()
                    .zip(real)
                    .map(|(&v, &r)| if r { v } else { 0.0 })
                    .collect()
            };
            (Reference::leading(&pick(mc.pt), &pick(mc.eta), &pick(mc.phi)), mc)
        });

        self.keys
            .iter()
            .map(|key| match *key {
                BoundKey::Column(c) => block.column(c).to_vec(),
                BoundKey::Metric(m) => {
                    let Some((r, mc)) = reference else {
                        return vec![0.0; block.nrows()];
                    };
                    block
                        .rows()
                        .into_iter()
                        .map(|row| {
                            let f = RelativeFeatures::new(&r, row[mc.pt], row[mc.eta], row[mc.phi]);
                            m.pick(&f)
                        })
                        .collect()
                }
            })
            .collect()
    }

    /// Reorder the rows of `block` in place.
    ///
    /// Rows whose `Energy` is exactly 0 are zeroed first. Ordering is stable:
    /// rows with equal keys keep their input order in both directions.
    pub fn sort_rows<R: Rng + ?Sized>(&self, block: &mut Array2<f64>, ascending: bool, rng: &mut R) {
        if self.is_identity() || block.nrows() < 2 {
            return;
        }
        if let Some(e) = self.energy.filter(|_| !self.shuffle) {
            for mut row in block.rows_mut() {
                if row[e] == 0.0 {
                    row.fill(0.0);
                }
            }
        }
        let real: Vec<bool> = block.rows().into_iter().map(|r| !is_padding(r)).collect();

        let order: Vec<usize> = if self.shuffle {
            let mut live: Vec<usize> = (0..real.len()).filter(|&i| real[i]).collect();
            live.shuffle(rng);
            live.extend((0..real.len()).filter(|&i| !real[i]));
            live
        } else {
            let values = self.key_values(block, &real);
            let mut order: Vec<usize> = (0..real.len()).collect();
            order.sort_by(|&a, &b| {
                real[b].cmp(&real[a]).then_with(|| {
                    values.iter().fold(Ordering::Equal, |acc, v| {
                        acc.then_with(|| {
                            let o = v[a].total_cmp(&v[b]);
                            if ascending { o } else { o.reverse() }
                        })
                    })
                })
            });
            order
        };

        if order.iter().enumerate().all(|(i, &j)| i == j) {
            return;
        }
        *block = block.select(Axis(0), &order);
    }
}

/// Sort one block with `spec` resolved against `columns`.
pub fn sort_rows<R: Rng + ?Sized>(
    block: &mut Array2<f64>,
    columns: &[&str],
    spec: &SortSpec,
    ascending: bool,
    rng: &mut R,
) -> Result<()> {
    spec.bind(columns)?.sort_rows(block, ascending, rng);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const COLS: [&str; 4] = ["Energy", "PT_or_ET", "Eta", "Phi"];

    fn rng() -> StdRng {
        StdRng::seed_from_u64(11)
    }

    fn keys(k: &[&str]) -> SortSpec {
        SortSpec::Keys(k.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn parses_specs() {
        assert_eq!("shuffle".parse::<SortSpec>().unwrap(), SortSpec::Shuffle);
        assert_eq!("random".parse::<SortSpec>().unwrap(), SortSpec::Shuffle);
        assert_eq!("PT_or_ET, Eta".parse::<SortSpec>().unwrap(), keys(&["PT_or_ET", "Eta"]));
        assert!("".parse::<SortSpec>().is_err());
        assert_eq!(keys(&["PT", "Eta"]).to_string(), "PT,Eta");
    }

    #[test]
    fn padding_last_in_both_directions() {
        let block = array![
            [0.0, 0.0, 0.0, 0.0],
            [10.0, 3.0, 0.1, 0.0],
            [0.0, 0.0, 0.0, 0.0],
            [20.0, 7.0, 0.2, 0.0],
            [15.0, 5.0, 0.3, 0.0],
        ];
        let spec = keys(&["PT_or_ET"]);

        let mut asc = block.clone();
        sort_rows(&mut asc, &COLS, &spec, true, &mut rng()).unwrap();
        assert_eq!(asc.column(1).to_vec(), vec![3.0, 5.0, 7.0, 0.0, 0.0]);

        let mut desc = block;
        sort_rows(&mut desc, &COLS, &spec, false, &mut rng()).unwrap();
        assert_eq!(desc.column(1).to_vec(), vec![7.0, 5.0, 3.0, 0.0, 0.0]);
    }

    #[test]
    fn zero_energy_rows_become_padding() {
        let mut block = array![[0.0, 9.0, 1.0, 1.0], [5.0, 2.0, 0.0, 0.0], [6.0, 4.0, 0.0, 0.0]];
        sort_rows(&mut block, &COLS, &keys(&["PT_or_ET"]), false, &mut rng()).unwrap();
        assert_eq!(block.row(0).to_vec(), vec![6.0, 4.0, 0.0, 0.0]);
        assert_eq!(block.row(2).to_vec(), vec![0.0; 4]);
    }

    #[test]
    fn first_key_is_primary() {
        let mut block = array![
            [1.0, 2.0, 0.5, 0.0],
            [1.0, 1.0, 0.9, 0.0],
            [1.0, 2.0, 0.1, 0.0],
            [1.0, 1.0, 0.3, 0.0],
        ];
        sort_rows(&mut block, &COLS, &keys(&["PT_or_ET", "Eta"]), true, &mut rng()).unwrap();
        assert_eq!(block.column(1).to_vec(), vec![1.0, 1.0, 2.0, 2.0]);
        assert_eq!(block.column(2).to_vec(), vec![0.3, 0.9, 0.1, 0.5]);
    }

    #[test]
    fn descending_keeps_ties_in_input_order() {
        let mut block = array![[1.0, 5.0, 0.1, 0.0], [2.0, 5.0, 0.2, 0.0], [3.0, 6.0, 0.3, 0.0]];
        sort_rows(&mut block, &COLS, &keys(&["PT_or_ET"]), false, &mut rng()).unwrap();
        assert_eq!(block.column(0).to_vec(), vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn delta_r_metric_uses_leading_row() {
        let mut block = array![
            [5.0, 5.0, 2.0, 0.0],
            [40.0, 40.0, 0.0, 0.0],
            [6.0, 6.0, 0.5, 0.0],
        ];
        sort_rows(&mut block, &COLS, &keys(&["MaxLepDeltaR"]), true, &mut rng()).unwrap();
        assert_eq!(block.column(1).to_vec(), vec![40.0, 6.0, 5.0]);
        assert_relative_eq!(block[[1, 2]], 0.5);
    }

    #[test]
    fn stored_column_wins_over_metric() {
        let cols = ["Energy", "PT_or_ET", "Eta", "Phi", "MaxLepDeltaR"];
        let plan = keys(&["MaxLepDeltaR"]).bind(&cols).unwrap();
        assert_eq!(plan.keys, vec![BoundKey::Column(4)]);
    }

    #[test]
    fn magnitude_names_are_interchangeable() {
        let plan = keys(&["PT"]).bind(&COLS).unwrap();
        assert_eq!(plan.keys, vec![BoundKey::Column(1)]);
        let jet_cols = ["Energy", "PT", "Eta", "Phi"];
        let plan = keys(&["PT_or_ET"]).bind(&jet_cols).unwrap();
        assert_eq!(plan.keys, vec![BoundKey::Column(1)]);
        assert_eq!(keys(&["PT"]).required_columns(&COLS).unwrap(), vec!["Energy", "PT_or_ET"]);
    }

    #[test]
    fn unknown_key_is_rejected() {
        assert!(keys(&["Mystery"]).bind(&COLS).is_err());
        assert!(keys(&["MaxLepKt"]).bind(&["Energy", "Eta"]).is_err());
        assert!(keys(&["Mystery"]).required_columns(&COLS).is_err());
    }

    #[test]
    fn required_columns_cover_metrics() {
        let table = ["Entry", "Energy", "Px", "PT", "Eta", "Phi", "Mass"];
        let req = keys(&["MaxLepKt", "Mass"]).required_columns(&table).unwrap();
        assert_eq!(req, vec!["Energy", "PT", "Eta", "Phi", "Mass"]);
        assert!(SortSpec::Shuffle.required_columns(&table).unwrap().is_empty());
    }

    #[test]
    fn shuffle_keeps_padding_last() {
        let mut block = Array2::<f64>::zeros((6, 4));
        for i in 0..4 {
            block[[i, 0]] = (i + 1) as f64;
        }
        sort_rows(&mut block, &COLS, &SortSpec::Shuffle, true, &mut rng()).unwrap();
        let mut firsts: Vec<f64> = block.column(0).iter().take(4).copied().collect();
        firsts.sort_by(f64::total_cmp);
        assert_eq!(firsts, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(block.row(4).to_vec(), vec![0.0; 4]);
        assert_eq!(block.row(5).to_vec(), vec![0.0; 4]);
    }

    proptest! {
        #[test]
        fn sorting_is_idempotent(
            rows in prop::collection::vec((0u8..4, -3.0f64..3.0, 0.0f64..50.0), 0..12),
            ascending in any::<bool>(),
        ) {
            let mut block = Array2::<f64>::zeros((rows.len(), 4));
            for (i, (kind, eta, pt)) in rows.iter().enumerate() {
                if *kind > 0 {
                    block[[i, 0]] = pt + 1.0;
                    block[[i, 1]] = *pt;
                    block[[i, 2]] = *eta;
                }
            }
            let spec = keys(&["PT_or_ET", "Eta"]);
            sort_rows(&mut block, &COLS, &spec, ascending, &mut rng()).unwrap();
            let once = block.clone();
            sort_rows(&mut block, &COLS, &spec, ascending, &mut rng()).unwrap();
            prop_assert_eq!(once.clone(), block);

            let first_pad = (0..once.nrows()).find(|&i| once.row(i).iter().all(|&v| v == 0.0));
            if let Some(p) = first_pad {
                for i in p..once.nrows() {
                    prop_assert!(once.row(i).iter().all(|&v| v == 0.0));
                }
            }
        }
    }
}
