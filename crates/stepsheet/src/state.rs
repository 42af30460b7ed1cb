//! State: a snapshot of every dataframe in an analysis.

use crate::frame::Frame;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Marker for "one new dataframe, position resolved after execution" in
/// created/modified dataframe index sets.
pub const NEW_DATAFRAME_INDEX: i64 = -1;

/// Ordered, named dataframes. A dataframe's index is its position.
///
/// States are values: steps build a new state from the previous one and the
/// pipeline never changes a state once it has been published.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct State {
    dataframes: IndexMap<String, Frame>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add (or replace) a named dataframe.
    pub fn with_frame(mut self, name: impl Into<String>, frame: Frame) -> Self {
        self.insert_frame(name, frame);
        self
    }

    pub fn len(&self) -> usize {
        self.dataframes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dataframes.is_empty()
    }

    /// Dataframe names in index order.
    pub fn df_names(&self) -> impl Iterator<Item = &str> {
        self.dataframes.keys().map(String::as_str)
    }

    pub fn frame(&self, name: &str) -> Option<&Frame> {
        self.dataframes.get(name)
    }

    pub fn frame_mut(&mut self, name: &str) -> Option<&mut Frame> {
        self.dataframes.get_mut(name)
    }

    /// Name and frame at a dataframe index.
    pub fn frame_at(&self, index: usize) -> Option<(&str, &Frame)> {
        self.dataframes
            .get_index(index)
            .map(|(name, frame)| (name.as_str(), frame))
    }

    pub fn frame_at_mut(&mut self, index: usize) -> Option<(&str, &mut Frame)> {
        self.dataframes
            .get_index_mut(index)
            .map(|(name, frame)| (name.as_str(), frame))
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.dataframes.get_index_of(name)
    }

    /// Iterate over `(name, frame)` pairs in index order.
    pub fn frames(&self) -> impl Iterator<Item = (&str, &Frame)> {
        self.dataframes
            .iter()
            .map(|(name, frame)| (name.as_str(), frame))
    }

    /// Insert a dataframe. An existing name keeps its index; a new name is
    /// appended. Returns the dataframe index.
    pub fn insert_frame(&mut self, name: impl Into<String>, frame: Frame) -> usize {
        self.dataframes.insert_full(name.into(), frame).0
    }

    /// Remove a dataframe, shifting later dataframes down by one.
    pub fn remove_frame(&mut self, name: &str) -> Option<Frame> {
        self.dataframes.shift_remove(name)
    }

    /// A dataframe name based on `base` that is not taken yet:
    /// `base`, then `base_1`, `base_2`, ...
    pub fn unique_name(&self, base: &str) -> String {
        if !self.dataframes.contains_key(base) {
            return base.to_string();
        }
        (1..)
            .map(|n| format!("{base}_{n}"))
            .find(|candidate| !self.dataframes.contains_key(candidate))
            .unwrap_or_else(|| base.to_string())
    }
}

/// Turn arbitrary text (e.g. a file stem) into a usable dataframe name.
pub fn sanitize_df_name(raw: &str) -> String {
    let mut name: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert_str(0, "df_");
    }
    if RESERVED_NAMES.contains(&name.as_str()) {
        name.push_str("_df");
    }
    name
}

/// Names a generated script cannot assign to: Python keywords and the
/// pandas alias every script imports.
const RESERVED_NAMES: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield", "pd",
];
