use tracing::trace;

use crate::fetcher::Record;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub key: String,
    pub label: String,
    pub visible: bool,
}

impl Column {
    pub fn new(key: &str) -> Self {
        Column {
            key: key.to_string(),
            label: key.to_uppercase(),
            visible: true,
        }
    }
}

/// Ordered, visibility-tagged set of columns shown by the table.
///
/// The column set is owned by the view and is never merged: every successful
/// fetch of a non-empty page replaces it with the fields of that page's first
/// record, dropping any order or visibility changes the user made before.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnModel {
    columns: Vec<Column>,
}

impl ColumnModel {
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Column> {
        self.columns.get(idx)
    }

    pub fn visible(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.visible)
    }

    pub fn visible_count(&self) -> usize {
        self.visible().count()
    }

    /// Re-seed the model from a freshly fetched page.
    /// Returns false (and keeps the current columns) when the page is empty.
    pub fn reseed(&mut self, records: &[Record]) -> bool {
        match records.first() {
            Some(sample) => {
                self.columns = derive_columns(sample);
                trace!("Derived {} columns from first record", self.columns.len());
                true
            }
            None => {
                trace!("Empty page, keeping {} columns", self.columns.len());
                false
            }
        }
    }

    pub fn set_visibility(&mut self, key: &str, visible: bool) -> bool {
        match self.columns.iter_mut().find(|c| c.key == key) {
            Some(column) => {
                column.visible = visible;
                true
            }
            None => false,
        }
    }

    pub fn toggle_visibility(&mut self, key: &str) -> bool {
        let visible = match self.columns.iter().find(|c| c.key == key) {
            Some(column) => !column.visible,
            None => return false,
        };
        self.set_visibility(key, visible)
    }

    pub fn reorder(&mut self, from: usize, to: usize) -> bool {
        move_element(&mut self.columns, from, to)
    }
}

pub fn derive_columns(sample: &Record) -> Vec<Column> {
    sample.keys().map(|key| Column::new(key)).collect()
}

/// Moves the element at `from` to `to`, shifting everything in between.
/// Out of range indices leave the sequence untouched.
pub fn move_element<T>(seq: &mut Vec<T>, from: usize, to: usize) -> bool {
    if from >= seq.len() || to >= seq.len() {
        return false;
    }
    if from != to {
        let item = seq.remove(from);
        seq.insert(to, item);
    }
    true
}
