//! Preallocated columnar buffers for the feature tables.

use std::ops::{Index, IndexMut};

use hep_core::{Column, EventColumn, ObjectKind, Result};
use hep_io::Frame;

/// One value per [`ObjectKind`], indexed by kind.
#[derive(Debug, Clone, PartialEq)]
pub struct PerKind<T>([T; ObjectKind::ALL.len()]);

impl<T> PerKind<T> {
    /// Build by calling `f` for every kind in [`ObjectKind::ALL`] order.
    pub fn from_fn(mut f: impl FnMut(ObjectKind) -> T) -> Self {
        Self(ObjectKind::ALL.map(&mut f))
    }

    /// `(kind, value)` pairs in table order.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectKind, &T)> {
        ObjectKind::ALL.into_iter().zip(self.0.iter())
    }

    /// Consume into `(kind, value)` pairs.
    pub fn into_iter_kinds(self) -> impl Iterator<Item = (ObjectKind, T)> {
        ObjectKind::ALL.into_iter().zip(self.0)
    }
}

impl<T: Default> Default for PerKind<T> {
    fn default() -> Self {
        Self::from_fn(|_| T::default())
    }
}

impl<T> Index<ObjectKind> for PerKind<T> {
    type Output = T;
    fn index(&self, kind: ObjectKind) -> &T {
        &self.0[kind.index()]
    }
}

impl<T> IndexMut<ObjectKind> for PerKind<T> {
    fn index_mut(&mut self, kind: ObjectKind) -> &mut T {
        &mut self.0[kind.index()]
    }
}

/// Flat feature table of one object type.
///
/// Columns follow [`ObjectKind::schema`]. Rows are appended whole, so every
/// column always has the same length.
#[derive(Debug, Clone)]
pub struct ObjectTable {
    kind: ObjectKind,
    schema: Vec<Column>,
    slots: Vec<Option<usize>>,
    columns: Vec<Vec<f64>>,
}

impl ObjectTable {
    /// Empty table with room for `capacity` rows in every column.
    pub fn with_capacity(kind: ObjectKind, capacity: usize) -> Self {
        let schema = kind.schema();
        let mut slots = vec![None; Column::ALL.len()];
        for (i, c) in schema.iter().enumerate() {
            slots[c.ordinal()] = Some(i);
        }
        let columns = schema.iter().map(|_| Vec::with_capacity(capacity)).collect();
        Self { kind, schema, slots, columns }
    }

    /// Object type.
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Column order.
    pub fn schema(&self) -> &[Column] {
        &self.schema
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    /// Allocated row capacity (smallest over columns).
    pub fn capacity(&self) -> usize {
        self.columns.iter().map(Vec::capacity).min().unwrap_or(0)
    }

    /// Position of `col` in this table, if present.
    pub fn slot(&self, col: Column) -> Option<usize> {
        self.slots[col.ordinal()]
    }

    /// A zeroed row buffer in schema order.
    pub fn blank_row(&self) -> Vec<f64> {
        vec![0.0; self.schema.len()]
    }

    /// Set `col` in a row buffer. Columns outside this schema are ignored.
    pub fn set_in(&self, row: &mut [f64], col: Column, value: f64) {
        if let Some(i) = self.slot(col) {
            row[i] = value;
        }
    }

    /// Append a complete row; returns its index.
    pub fn push_row(&mut self, row: &[f64]) -> usize {
        debug_assert_eq!(row.len(), self.columns.len());
        for (col, &v) in self.columns.iter_mut().zip(row) {
            col.push(v);
        }
        self.n_rows() - 1
    }

    /// Value at `(row, col)`, 0.0 when the column is absent.
    pub fn get(&self, row: usize, col: Column) -> f64 {
        self.slot(col).map_or(0.0, |i| self.columns[i][row])
    }

    /// Overwrite `(row, col)`. Columns outside this schema are ignored.
    pub fn set(&mut self, row: usize, col: Column, value: f64) {
        if let Some(i) = self.slot(col) {
            self.columns[i][row] = value;
        }
    }

    /// Whole column, if present.
    pub fn column(&self, col: Column) -> Option<&[f64]> {
        self.slot(col).map(|i| self.columns[i].as_slice())
    }

    /// Rows `start..start + len` of `col`.
    pub fn column_range(&self, col: Column, start: usize, len: usize) -> &[f64] {
        match self.slot(col) {
            Some(i) => &self.columns[i][start..start + len],
            None => &[],
        }
    }

    /// Drop every row whose index is flagged in `drop`.
    pub fn remove_rows(&mut self, drop: &[bool]) {
        for col in &mut self.columns {
            let mut i = 0;
            col.retain(|_| {
                let keep = !drop[i];
                i += 1;
                keep
            });
        }
    }

    /// Convert to a storage frame.
    pub fn into_frame(self) -> Result<Frame> {
        let names = self.schema.iter().map(|c| c.name().to_string()).collect();
        Frame::new(names, self.columns)
    }
}

/// Event-level aggregate table (`EventChars`).
#[derive(Debug, Clone, Default)]
pub struct EventTable {
    rows: Vec<[f64; EventColumn::ALL.len()]>,
}

impl EventTable {
    /// Empty table with room for `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { rows: Vec::with_capacity(capacity) }
    }

    /// Append one event.
    pub fn push(&mut self, row: [f64; EventColumn::ALL.len()]) {
        self.rows.push(row);
    }

    /// Number of events.
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Value of `col` for event `row`.
    pub fn get(&self, row: usize, col: EventColumn) -> f64 {
        let i = EventColumn::ALL.iter().position(|c| *c == col).unwrap_or(0);
        self.rows[row][i]
    }

    /// Convert to a storage frame.
    pub fn into_frame(self) -> Result<Frame> {
        let names = EventColumn::ALL.iter().map(|c| c.name().to_string()).collect();
        let columns = (0..EventColumn::ALL.len())
            .map(|i| self.rows.iter().map(|r| r[i]).collect())
            .collect();
        Frame::new(names, columns)
    }
}

/// Per-event, per-type object counts (`NumValues`).
#[derive(Debug, Clone, Default)]
pub struct CountTable {
    counts: PerKind<Vec<usize>>,
}

impl CountTable {
    /// Empty table with room for `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { counts: PerKind::from_fn(|_| Vec::with_capacity(capacity)) }
    }

    /// Append the counts of one event.
    pub fn push(&mut self, counts: &PerKind<usize>) {
        for (kind, n) in counts.iter() {
            self.counts[kind].push(*n);
        }
    }

    /// Number of events.
    pub fn n_rows(&self) -> usize {
        self.counts[ObjectKind::Electron].len()
    }

    /// Counts of `kind`, one per event.
    pub fn counts(&self, kind: ObjectKind) -> &[usize] {
        &self.counts[kind]
    }

    /// Mutable counts of `kind`.
    pub fn counts_mut(&mut self, kind: ObjectKind) -> &mut [usize] {
        &mut self.counts[kind]
    }

    /// Convert to a storage frame, one column per object type.
    pub fn into_frame(self) -> Result<Frame> {
        let mut names = Vec::with_capacity(ObjectKind::ALL.len());
        let mut columns = Vec::with_capacity(ObjectKind::ALL.len());
        for (kind, counts) in self.counts.into_iter_kinds() {
            names.push(kind.name().to_string());
            columns.push(counts.into_iter().map(|n| n as f64).collect());
        }
        Frame::new(names, columns)
    }
}
