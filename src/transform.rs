use std::cmp::Ordering;

use serde_json::Value;

use crate::fetcher::Record;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn flip(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    pub fn indicator(self) -> &'static str {
        match self {
            SortDirection::Ascending => "▲",
            SortDirection::Descending => "▼",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortState {
    pub column: Option<String>,
    pub direction: SortDirection,
}

impl SortState {
    /// Same column flips the direction, another column starts ascending.
    pub fn toggle(&mut self, key: &str) {
        if self.column.as_deref() == Some(key) {
            self.direction = self.direction.flip();
        } else {
            self.column = Some(key.to_string());
            self.direction = SortDirection::Ascending;
        }
    }

    pub fn indicator_for(&self, key: &str) -> Option<&'static str> {
        (self.column.as_deref() == Some(key)).then(|| self.direction.indicator())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub title: String,
    pub body: String,
}

static NULL: Value = Value::Null;

// null < bool < number < string < array < object
fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => {
                let a = a.as_f64().unwrap_or(f64::NAN);
                let b = b.as_f64().unwrap_or(f64::NAN);
                a.partial_cmp(&b).unwrap_or(Ordering::Equal)
            }
        },
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => {
            a.to_string().cmp(&b.to_string())
        }
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

/// Stable sort of a page by one field. Missing fields sort like `null`.
pub fn sort_records(records: &mut [Record], column: &str, direction: SortDirection) {
    records.sort_by(|a, b| {
        let a = a.get(column).unwrap_or(&NULL);
        let b = b.get(column).unwrap_or(&NULL);
        match direction {
            SortDirection::Ascending => compare_values(a, b),
            SortDirection::Descending => compare_values(b, a),
        }
    });
}
