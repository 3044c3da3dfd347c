//! Dense tensors from table stores.
//!
//! Object tables hold a variable number of rows per event; the per-event
//! counts live in the `NumValues` table. [`load_range`] is the raw contiguous
//! read, [`load_events`] turns a window of events into a fixed
//! `(events, rows_per_event, columns)` tensor.

use ndarray::{Array2, Array3, Axis, s};
use rand::Rng;

use hep_core::{Error, Result, TableKey};
use hep_io::{NUM_VALUES_KEY, TableStore};

use crate::config::{AuxSpec, InputSpec};
use crate::sort::{SortPlan, SortSpec};

/// Read rows `start_row..start_row + num_rows` of `key` and reshape them to
/// `(num_rows / rows_per_event, rows_per_event, columns.len())`.
///
/// The range is not aligned to events; `num_rows` must be a multiple of
/// `rows_per_event` and the table must hold every requested row.
pub fn load_range(
    store: &TableStore,
    key: &str,
    start_row: usize,
    num_rows: usize,
    columns: &[&str],
    rows_per_event: usize,
) -> Result<Array3<f64>> {
    if rows_per_event == 0 || num_rows % rows_per_event != 0 {
        return Err(Error::Validation(format!(
            "{num_rows} rows of '{key}' do not split into events of {rows_per_event}"
        )));
    }
    let frame = store.select(key, start_row, start_row + num_rows, Some(columns))?;
    if frame.n_rows() != num_rows {
        return Err(Error::InsufficientData {
            dir: store.path().to_path_buf(),
            requested: start_row + num_rows,
            available: start_row + frame.n_rows(),
        });
    }
    let shape = (num_rows / rows_per_event, rows_per_event, columns.len());
    Array3::from_shape_vec(shape, frame.to_row_major())
        .map_err(|e| Error::Validation(format!("cannot reshape '{key}': {e}")))
}

/// Per-event row counts of object table `key` for events `first..first + n`,
/// and the row offset of event `first`.
pub fn event_rows(
    store: &TableStore,
    key: &str,
    first: usize,
    n: usize,
) -> Result<(usize, Vec<usize>)> {
    let counts_of = |start: usize, stop: usize| -> Result<Vec<usize>> {
        let frame = store.select(NUM_VALUES_KEY, start, stop, Some(&[key]))?;
        Ok(frame.column(key).unwrap_or_default().iter().map(|&c| c as usize).collect())
    };
    let offset = counts_of(0, first)?.iter().sum();
    let counts = counts_of(first, first + n)?;
    if counts.len() != n {
        return Err(Error::InsufficientData {
            dir: store.path().to_path_buf(),
            requested: first + n,
            available: first + counts.len(),
        });
    }
    Ok((offset, counts))
}

/// Load events `first..first + n` of `input` as a padded tensor.
///
/// Each event's rows are ordered by `sort` (if any), then truncated or
/// zero-padded to `rows_per_event`.
pub fn load_events<R: Rng + ?Sized>(
    store: &TableStore,
    input: &InputSpec,
    first: usize,
    n: usize,
    sort: Option<&SortSpec>,
    ascending: bool,
    rng: &mut R,
) -> Result<Array3<f64>> {
    let kind = input.kind()?;
    let selected = input.column_refs();
    let mut read_cols = selected.clone();
    if let Some(spec) = sort {
        for c in spec.required_columns(&TableKey::Object(kind).column_names())? {
            if !read_cols.contains(&c) {
                read_cols.push(c);
            }
        }
    }
    let plan = match sort {
        Some(spec) => spec.bind(&read_cols)?,
        None => SortPlan::identity(),
    };

    let (offset, counts) = event_rows(store, &input.key, first, n)?;
    let total: usize = counts.iter().sum();
    let rows = load_range(store, &input.key, offset, total, &read_cols, 1)?
        .index_axis_move(Axis(1), 0);

    let rpe = input.rows_per_event;
    let mut out = Array3::<f64>::zeros((n, rpe, selected.len()));
    let mut at = 0;
    for (e, &count) in counts.iter().enumerate() {
        let mut block = rows.slice(s![at..at + count, ..]).to_owned();
        at += count;
        plan.sort_rows(&mut block, ascending, rng);
        let keep = count.min(rpe);
        out.slice_mut(s![e, ..keep, ..])
            .assign(&block.slice(s![..keep, ..selected.len()]));
    }
    Ok(out)
}

/// Load the auxiliary vector of events `first..first + n`.
pub fn load_aux(store: &TableStore, aux: &AuxSpec, first: usize, n: usize) -> Result<Array2<f64>> {
    let cols = aux.column_refs();
    Ok(load_range(store, &aux.key, first, n, &cols, 1)?.index_axis_move(Axis(1), 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hep_core::ObjectKind;
    use hep_io::Frame;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::path::PathBuf;

    fn tmp_dir(name: &str) -> PathBuf {
        let nanos =
            std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_nanos();
        let mut p = std::env::temp_dir();
        p.push(format!("hepten_tensorize_{}_{}_{}", std::process::id(), nanos, name));
        p
    }

    /// Store with jet counts `counts`; jet row `i` has PT = i + 1.
    fn jet_store(name: &str, counts: &[usize]) -> TableStore {
        let store = TableStore::create(tmp_dir(name)).unwrap();
        let total: usize = counts.iter().sum();

        let names: Vec<String> =
            TableKey::Object(ObjectKind::Jet).column_names().iter().map(|s| s.to_string()).collect();
        let mut cols = vec![vec![0.0; total]; names.len()];
        let idx = |n: &str| names.iter().position(|c| c == n).unwrap();
        let mut row = 0;
        for (e, &c) in counts.iter().enumerate() {
            for _ in 0..c {
                cols[idx("Entry")][row] = e as f64;
                cols[idx("Energy")][row] = 100.0 + row as f64;
                cols[idx("PT")][row] = row as f64 + 1.0;
                cols[idx("Eta")][row] = 0.1 * row as f64;
                row += 1;
            }
        }
        store.put("Jet", &Frame::new(names, cols).unwrap()).unwrap();

        let kinds: Vec<String> = ObjectKind::ALL.iter().map(|k| k.name().to_string()).collect();
        let nv: Vec<Vec<f64>> = ObjectKind::ALL
            .iter()
            .map(|k| {
                if *k == ObjectKind::Jet {
                    counts.iter().map(|&c| c as f64).collect()
                } else {
                    vec![0.0; counts.len()]
                }
            })
            .collect();
        store.put(NUM_VALUES_KEY, &Frame::new(kinds, nv).unwrap()).unwrap();
        store
    }

    fn jets(columns: &[&str], rpe: usize) -> InputSpec {
        InputSpec {
            key: "Jet".into(),
            columns: columns.iter().map(|s| s.to_string()).collect(),
            rows_per_event: rpe,
        }
    }

    #[test]
    fn load_range_reshapes() {
        let store = jet_store("range", &[2, 2, 2]);
        let t = load_range(&store, "Jet", 2, 4, &["PT", "Eta"], 2).unwrap();
        assert_eq!(t.dim(), (2, 2, 2));
        assert_eq!(t[[0, 0, 0]], 3.0);
        assert_eq!(t[[1, 1, 0]], 6.0);

        assert!(matches!(
            load_range(&store, "Jet", 0, 3, &["PT"], 2),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            load_range(&store, "Jet", 4, 4, &["PT"], 2),
            Err(Error::InsufficientData { requested: 8, available: 6, .. })
        ));
        std::fs::remove_dir_all(store.path()).ok();
    }

    #[test]
    fn events_are_padded_and_truncated() {
        let store = jet_store("pad", &[3, 0, 1, 2]);
        let mut rng = StdRng::seed_from_u64(0);
        let t = load_events(&store, &jets(&["PT"], 2), 1, 3, None, true, &mut rng).unwrap();
        assert_eq!(t.dim(), (3, 2, 1));
        // Event 1 is empty, event 2 has jet row 3, event 3 has rows 4 and 5.
        assert_eq!(t.index_axis(Axis(0), 0).iter().copied().collect::<Vec<_>>(), vec![0.0, 0.0]);
        assert_eq!(t.index_axis(Axis(0), 1).iter().copied().collect::<Vec<_>>(), vec![4.0, 0.0]);
        assert_eq!(t.index_axis(Axis(0), 2).iter().copied().collect::<Vec<_>>(), vec![5.0, 6.0]);

        let t = load_events(&store, &jets(&["PT"], 2), 0, 1, None, true, &mut rng).unwrap();
        assert_eq!(t.iter().copied().collect::<Vec<_>>(), vec![1.0, 2.0]);
        std::fs::remove_dir_all(store.path()).ok();
    }

    #[test]
    fn sorting_happens_before_truncation() {
        let store = jet_store("sorted", &[3]);
        let mut rng = StdRng::seed_from_u64(0);
        let spec: SortSpec = "PT".parse().unwrap();
        // Sort key PT is read even though only Eta is selected.
        let t = load_events(&store, &jets(&["Eta"], 2), 0, 1, Some(&spec), false, &mut rng).unwrap();
        assert_eq!(t.dim(), (1, 2, 1));
        approx::assert_relative_eq!(t[[0, 0, 0]], 0.2);
        approx::assert_relative_eq!(t[[0, 1, 0]], 0.1);
        std::fs::remove_dir_all(store.path()).ok();
    }

    #[test]
    fn short_store_reports_missing_events() {
        let store = jet_store("short", &[1, 1]);
        let mut rng = StdRng::seed_from_u64(0);
        let err = load_events(&store, &jets(&["PT"], 1), 1, 5, None, true, &mut rng).unwrap_err();
        assert!(matches!(err, Error::InsufficientData { requested: 6, available: 2, .. }), "{err}");
        std::fs::remove_dir_all(store.path()).ok();
    }
}
