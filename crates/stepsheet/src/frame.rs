//! Frames: ordered, equal-length columns of values.

use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;

/// A single tabular dataset.
///
/// Columns keep their insertion order; every column has `num_rows` cells.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Frame {
    columns: IndexMap<String, Vec<Value>>,
    num_rows: usize,
}

/// Errors from frame manipulation and CSV I/O.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("column not found: {0:?}")]
    ColumnNotFound(String),

    #[error("column already exists: {0:?}")]
    DuplicateColumn(String),

    #[error("column {column:?} has {found} values, frame has {expected} rows")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("row mask has {found} entries, frame has {expected} rows")]
    MaskLength { expected: usize, found: usize },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Frame {
    /// Create an empty frame (no columns, no rows).
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a frame from named columns. All columns must have the same length.
    pub fn from_columns<I, S>(columns: I) -> Result<Self, FrameError>
    where
        I: IntoIterator<Item = (S, Vec<Value>)>,
        S: Into<String>,
    {
        let mut frame = Self::new();
        for (name, values) in columns {
            let name = name.into();
            if frame.has_column(&name) {
                return Err(FrameError::DuplicateColumn(name));
            }
            frame.set_column(name, values)?;
        }
        Ok(frame)
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.num_rows == 0
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Column headers in order.
    pub fn column_headers(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.get_index_of(name)
    }

    /// Iterate over `(header, values)` pairs.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.columns
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Set (or overwrite) a column, keeping its position if it exists.
    ///
    /// A frame without columns adopts the length of the first column set.
    pub fn set_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<Value>,
    ) -> Result<(), FrameError> {
        let name = name.into();
        self.check_length(&name, values.len())?;
        self.num_rows = values.len();
        self.columns.insert(name, values);
        Ok(())
    }

    /// Insert a new column at position `loc` (clamped to the end).
    pub fn insert_column(
        &mut self,
        loc: usize,
        name: impl Into<String>,
        values: Vec<Value>,
    ) -> Result<(), FrameError> {
        let name = name.into();
        if self.has_column(&name) {
            return Err(FrameError::DuplicateColumn(name));
        }
        self.check_length(&name, values.len())?;
        self.num_rows = values.len();
        let loc = loc.min(self.columns.len());
        self.columns.shift_insert(loc, name, values);
        Ok(())
    }

    /// Remove a column, returning its values.
    pub fn drop_column(&mut self, name: &str) -> Result<Vec<Value>, FrameError> {
        self.columns
            .shift_remove(name)
            .ok_or_else(|| FrameError::ColumnNotFound(name.to_string()))
    }

    /// Rename columns. The mapping is applied to every header at once, so
    /// `{A: B, B: A}` swaps two columns. Keys that are not headers are ignored.
    pub fn rename_columns(&mut self, mapping: &IndexMap<String, String>) -> Result<(), FrameError> {
        let mut renamed: IndexMap<String, Vec<Value>> = IndexMap::with_capacity(self.columns.len());
        for (name, values) in std::mem::take(&mut self.columns) {
            let new_name = mapping.get(&name).cloned().unwrap_or(name);
            if renamed.contains_key(&new_name) {
                return Err(FrameError::DuplicateColumn(new_name));
            }
            renamed.insert(new_name, values);
        }
        self.columns = renamed;
        Ok(())
    }

    /// A new frame holding only the given columns, in the given order.
    pub fn select(&self, names: &[String]) -> Result<Frame, FrameError> {
        let mut selected = Frame {
            columns: IndexMap::with_capacity(names.len()),
            num_rows: self.num_rows,
        };
        for name in names {
            let values = self
                .column(name)
                .ok_or_else(|| FrameError::ColumnNotFound(name.clone()))?;
            selected.columns.insert(name.clone(), values.to_vec());
        }
        Ok(selected)
    }

    /// Keep the rows where `mask` is true.
    pub fn filter_rows(&self, mask: &[bool]) -> Result<Frame, FrameError> {
        if mask.len() != self.num_rows {
            return Err(FrameError::MaskLength {
                expected: self.num_rows,
                found: mask.len(),
            });
        }
        let columns = self
            .columns
            .iter()
            .map(|(name, values)| {
                let kept = values
                    .iter()
                    .zip(mask)
                    .filter(|(_, keep)| **keep)
                    .map(|(v, _)| v.clone())
                    .collect();
                (name.clone(), kept)
            })
            .collect();
        Ok(Frame {
            columns,
            num_rows: mask.iter().filter(|keep| **keep).count(),
        })
    }

    /// The first `n` rows.
    pub fn head(&self, n: usize) -> Frame {
        let n = n.min(self.num_rows);
        Frame {
            columns: self
                .columns
                .iter()
                .map(|(name, values)| (name.clone(), values[..n].to_vec()))
                .collect(),
            num_rows: n,
        }
    }

    fn check_length(&self, name: &str, len: usize) -> Result<(), FrameError> {
        if !self.columns.is_empty() && len != self.num_rows {
            // Overwriting the only column may change the row count.
            let only_this = self.columns.len() == 1 && self.columns.contains_key(name);
            if !only_this {
                return Err(FrameError::LengthMismatch {
                    column: name.to_string(),
                    expected: self.num_rows,
                    found: len,
                });
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // CSV
    // ------------------------------------------------------------------------

    /// Read a CSV file with a header row, inferring cell types.
    pub fn read_csv(path: impl AsRef<Path>) -> Result<Frame, FrameError> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(file)
    }

    /// Read CSV data with a header row, inferring cell types.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Frame, FrameError> {
        let mut reader = csv::Reader::from_reader(reader);
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut columns: Vec<Vec<Value>> = vec![Vec::new(); headers.len()];

        for record in reader.records() {
            let record = record?;
            for (i, column) in columns.iter_mut().enumerate() {
                column.push(infer_cell(record.get(i).unwrap_or("")));
            }
        }

        Frame::from_columns(headers.into_iter().zip(columns))
    }

    /// Write the frame as CSV with a header row. Nulls become empty cells.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), FrameError> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(self.columns.keys())?;
        for row in 0..self.num_rows {
            writer.write_record(self.columns.values().map(|col| match &col[row] {
                Value::Null => String::new(),
                other => other.to_string(),
            }))?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Infer a typed value from a raw CSV cell.
pub fn infer_cell(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return Value::Int(n);
    }
    if let Ok(n) = trimmed.parse::<f64>() {
        if n.is_finite() {
            return Value::Float(n);
        }
    }
    match trimmed {
        "True" | "true" => Value::Bool(true),
        "False" | "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}
