//! Reconciliation of two states: which dataframes and columns a step
//! created, deleted, renamed or modified.
//!
//! Used by `ai_transformation`, whose effects are only known after running
//! the user's code.

use indexmap::IndexMap;
use stepsheet::{Frame, State, Value};

/// Column changes within one dataframe.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnRecon {
    pub created_columns: Vec<String>,
    pub deleted_columns: Vec<String>,
    /// Old header to new header.
    pub renamed_columns: IndexMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataframeRecon {
    pub column_recon: ColumnRecon,
    pub num_added_or_removed_rows: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateRecon {
    pub created_dataframe_names: Vec<String>,
    pub deleted_dataframe_names: Vec<String>,
    pub modified_dataframes_recons: IndexMap<String, DataframeRecon>,
}

impl StateRecon {
    pub fn is_empty(&self) -> bool {
        self.created_dataframe_names.is_empty()
            && self.deleted_dataframe_names.is_empty()
            && self.modified_dataframes_recons.is_empty()
    }

    /// Entries for the `result` execution data object.
    pub fn into_entries(self) -> IndexMap<String, Value> {
        let modified = self
            .modified_dataframes_recons
            .into_iter()
            .map(|(name, recon)| (name, recon.into_value()))
            .collect::<IndexMap<_, _>>();
        IndexMap::from([
            (
                "created_dataframe_names".to_string(),
                Value::from(self.created_dataframe_names),
            ),
            (
                "deleted_dataframe_names".to_string(),
                Value::from(self.deleted_dataframe_names),
            ),
            ("modified_dataframes_recons".to_string(), Value::from(modified)),
        ])
    }
}

impl DataframeRecon {
    fn into_value(self) -> Value {
        let renamed = self
            .column_recon
            .renamed_columns
            .into_iter()
            .map(|(old, new)| (old, Value::from(new)))
            .collect::<IndexMap<_, _>>();
        let column_recon = IndexMap::from([
            (
                "created_columns".to_string(),
                Value::from(self.column_recon.created_columns),
            ),
            (
                "deleted_columns".to_string(),
                Value::from(self.column_recon.deleted_columns),
            ),
            ("renamed_columns".to_string(), Value::from(renamed)),
        ]);
        Value::from(IndexMap::from([
            ("column_recon".to_string(), Value::from(column_recon)),
            (
                "num_added_or_removed_rows".to_string(),
                Value::from(self.num_added_or_removed_rows),
            ),
        ]))
    }
}

/// Compare `prev` with `post`.
///
/// Dataframes are matched by name. A dataframe counts as modified when it
/// exists in both states with different contents.
pub fn reconcile(prev: &State, post: &State) -> StateRecon {
    let mut recon = StateRecon::default();
    for (name, post_frame) in post.frames() {
        match prev.frame(name) {
            None => recon.created_dataframe_names.push(name.to_string()),
            Some(prev_frame) if prev_frame != post_frame => {
                recon
                    .modified_dataframes_recons
                    .insert(name.to_string(), reconcile_frame(prev_frame, post_frame));
            }
            Some(_) => {}
        }
    }
    recon.deleted_dataframe_names = prev
        .df_names()
        .filter(|name| post.frame(name).is_none())
        .map(String::from)
        .collect();
    recon
}

/// Compare two versions of one dataframe.
///
/// A deleted column whose values equal those of a created column is reported
/// as a rename instead.
pub fn reconcile_frame(prev: &Frame, post: &Frame) -> DataframeRecon {
    let mut created: Vec<&str> = post
        .column_headers()
        .filter(|header| !prev.has_column(header))
        .collect();
    let mut deleted: Vec<&str> = prev
        .column_headers()
        .filter(|header| !post.has_column(header))
        .collect();

    let mut renamed = IndexMap::new();
    deleted.retain(|old| {
        let old_values = prev.column(old);
        match created
            .iter()
            .position(|new| post.column(new) == old_values)
        {
            Some(position) => {
                renamed.insert(old.to_string(), created.remove(position).to_string());
                false
            }
            None => true,
        }
    });

    let rows_delta = post.num_rows() as i64 - prev.num_rows() as i64;
    DataframeRecon {
        column_recon: ColumnRecon {
            created_columns: created.into_iter().map(String::from).collect(),
            deleted_columns: deleted.into_iter().map(String::from).collect(),
            renamed_columns: renamed,
        },
        num_added_or_removed_rows: rows_delta,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().map(|n| Value::Int(*n)).collect()
    }

    #[test]
    fn test_column_changes() {
        let prev = Frame::from_columns([
            ("A", ints(&[1, 2])),
            ("B", ints(&[3, 4])),
            ("C", ints(&[5, 6])),
        ])
        .unwrap();
        let post = Frame::from_columns([
            ("A", ints(&[1, 2])),
            ("Bee", ints(&[3, 4])),
            ("D", ints(&[0, 0])),
        ])
        .unwrap();

        let recon = reconcile_frame(&prev, &post);
        assert_eq!(recon.column_recon.created_columns, vec!["D"]);
        assert_eq!(recon.column_recon.deleted_columns, vec!["C"]);
        assert_eq!(
            recon.column_recon.renamed_columns,
            IndexMap::from([("B".to_string(), "Bee".to_string())])
        );
        assert_eq!(recon.num_added_or_removed_rows, 0);
    }

    #[test]
    fn test_state_changes() {
        let df = Frame::from_columns([("A", ints(&[1, 2, 3]))]).unwrap();
        let prev = State::new()
            .with_frame("df", df.clone())
            .with_frame("gone", Frame::new());
        let post = State::new()
            .with_frame("df", df.head(1))
            .with_frame("df2", df);

        let recon = reconcile(&prev, &post);
        assert_eq!(recon.created_dataframe_names, vec!["df2"]);
        assert_eq!(recon.deleted_dataframe_names, vec!["gone"]);
        assert_eq!(
            recon.modified_dataframes_recons["df"].num_added_or_removed_rows,
            -2
        );
    }

    #[test]
    fn test_unchanged_state() {
        let state = State::new().with_frame("df", Frame::new());
        assert!(reconcile(&state, &state).is_empty());
    }

    #[test]
    fn test_entries_shape() {
        let prev = State::new().with_frame("df", Frame::from_columns([("A", ints(&[1]))]).unwrap());
        let post = State::new().with_frame("df", Frame::from_columns([("X", ints(&[1]))]).unwrap());

        let entries = reconcile(&prev, &post).into_entries();
        let df = entries["modified_dataframes_recons"].as_object().unwrap()["df"]
            .as_object()
            .unwrap();
        let renamed = df["column_recon"].as_object().unwrap()["renamed_columns"]
            .as_object()
            .unwrap();
        assert_eq!(renamed["A"], Value::from("X"));
        assert_eq!(df["num_added_or_removed_rows"], Value::Int(0));
    }
}
