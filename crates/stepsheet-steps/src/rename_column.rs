//! `rename_column`: rename one column.
//!
//! Consecutive renames on the same dataframe collapse into one `rename` call
//! whose mapping goes from the headers before the first rename to the
//! headers after the last.

use crate::chunk_context;
use indexmap::IndexMap;
use std::any::Any;
use std::collections::BTreeSet;
use std::sync::Arc;
use stepsheet::{
    ChunkContext, CodeChunk, ExecutionData, ExecutionError, Params, State, StepOutput,
    StepPerformer, Value, downcast, py_literal, require_sheet, require_str, sheet_index_set,
};

pub struct RenameColumn;

impl StepPerformer for RenameColumn {
    fn step_version(&self) -> u32 {
        2
    }

    fn step_type(&self) -> &'static str {
        "rename_column"
    }

    fn execute(&self, prev_state: &State, params: &Params) -> Result<StepOutput, ExecutionError> {
        let (_, df_name, frame) = require_sheet(prev_state, params)?;
        let old_header = require_str(params, "old_column_header")?;
        let new_header = require_str(params, "new_column_header")?;
        if !frame.has_column(old_header) {
            return Err(ExecutionError::MissingColumn(old_header.to_string()));
        }

        let mut frame = frame.clone();
        frame.rename_columns(&IndexMap::from([(
            old_header.to_string(),
            new_header.to_string(),
        )]))?;

        let mut state = prev_state.clone();
        state.insert_frame(df_name.to_string(), frame);
        Ok(StepOutput::new(state))
    }

    fn transpile(
        &self,
        prev_state: &Arc<State>,
        post_state: &Arc<State>,
        params: &Params,
        execution_data: Option<&ExecutionData>,
    ) -> Vec<Box<dyn CodeChunk>> {
        let mut mapping = IndexMap::new();
        if let (Some(old), Some(new)) = (
            params.get("old_column_header").and_then(Value::as_str),
            params.get("new_column_header").and_then(Value::as_str),
        ) {
            if old != new {
                mapping.insert(old.to_string(), new.to_string());
            }
        }
        vec![Box::new(RenameColumnChunk {
            ctx: chunk_context(prev_state, post_state, params, execution_data),
            mapping,
        })]
    }

    fn modified_dataframe_indexes(&self, params: &Params) -> BTreeSet<i64> {
        sheet_index_set(params)
    }

    fn created_dataframe_indexes(&self, _params: &Params) -> BTreeSet<i64> {
        BTreeSet::new()
    }
}

#[derive(Debug)]
pub struct RenameColumnChunk {
    ctx: ChunkContext,
    /// Header in `prev_state` to header in `post_state`.
    mapping: IndexMap<String, String>,
}

impl RenameColumnChunk {
    pub fn mapping(&self) -> &IndexMap<String, String> {
        &self.mapping
    }
}

impl CodeChunk for RenameColumnChunk {
    fn context(&self) -> &ChunkContext {
        &self.ctx
    }

    fn chunk_type(&self) -> &'static str {
        "rename_column"
    }

    fn display_name(&self) -> String {
        "Renamed columns".to_string()
    }

    fn description_comment(&self) -> String {
        let renames = self
            .mapping
            .iter()
            .map(|(old, new)| format!("{old} to {new}"))
            .collect::<Vec<_>>();
        format!(
            "Renamed {} in {}",
            renames.join(", "),
            self.ctx.sheet_name().unwrap_or_default()
        )
    }

    fn transpile(&self) -> Vec<String> {
        let Some(df_name) = self.ctx.sheet_name() else {
            return Vec::new();
        };
        if self.mapping.is_empty() {
            return Vec::new();
        }
        let columns = Value::Object(
            self.mapping
                .iter()
                .map(|(old, new)| (old.clone(), Value::from(new.as_str())))
                .collect(),
        );
        vec![format!(
            "{df_name}.rename(columns={}, inplace=True)",
            py_literal(&columns)
        )]
    }

    fn combine_right(&self, other: &dyn CodeChunk) -> Option<Box<dyn CodeChunk>> {
        let other = downcast::<RenameColumnChunk>(other)?;
        if !self.params_match(other, &["sheet_index"]) {
            return None;
        }

        let mut mapping = self.mapping.clone();
        for (old, new) in &other.mapping {
            // `old` is either a header produced by this chunk or an untouched
            // original header.
            match mapping.iter_mut().find(|(_, produced)| *produced == old) {
                Some((_, produced)) => *produced = new.clone(),
                None => {
                    mapping.insert(old.clone(), new.clone());
                }
            }
        }
        mapping.retain(|old, new| old != new);

        // Keep the mapping in the order of the original headers.
        let original_order: Vec<&str> = self
            .ctx
            .sheet_name()
            .and_then(|name| self.ctx.prev_state.frame(name))
            .map(|frame| frame.column_headers().collect())
            .unwrap_or_default();
        mapping.sort_by_cached_key(|old, _| {
            original_order
                .iter()
                .position(|header| header == old)
                .unwrap_or(usize::MAX)
        });

        Some(Box::new(RenameColumnChunk {
            ctx: self.ctx.spanning(&other.ctx, self.ctx.params.clone()),
            mapping,
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepsheet::{Frame, ParamsExt};

    fn state() -> Arc<State> {
        let df = Frame::from_columns([
            ("A", vec![Value::Int(1)]),
            ("B", vec![Value::Int(2)]),
        ])
        .unwrap();
        Arc::new(State::new().with_frame("df", df))
    }

    fn rename(old: &str, new: &str) -> Params {
        Params::new()
            .with("sheet_index", 0i64)
            .with("old_column_header", old)
            .with("new_column_header", new)
    }

    fn chunk(prev: &Arc<State>, params: &Params) -> (Arc<State>, Box<dyn CodeChunk>) {
        let post = Arc::new(RenameColumn.execute(prev, params).unwrap().state);
        let mut chunks = RenameColumn.transpile(prev, &post, params, None);
        (post, chunks.remove(0))
    }

    #[test]
    fn test_execute_and_code() {
        let prev = state();
        let (post, chunk) = chunk(&prev, &rename("A", "X"));

        assert_eq!(
            post.frame("df").unwrap().column_headers().collect::<Vec<_>>(),
            vec!["X", "B"]
        );
        assert_eq!(
            chunk.transpile(),
            vec!["df.rename(columns={'A': 'X'}, inplace=True)"]
        );
    }

    #[test]
    fn test_missing_and_colliding_headers() {
        assert!(matches!(
            RenameColumn.execute(&state(), &rename("Z", "Y")),
            Err(ExecutionError::MissingColumn(name)) if name == "Z"
        ));
        assert!(matches!(
            RenameColumn.execute(&state(), &rename("A", "B")),
            Err(ExecutionError::Frame(_))
        ));
    }

    #[test]
    fn test_chained_renames_compose() {
        let s0 = state();
        let (s1, first) = chunk(&s0, &rename("A", "X"));
        let (s2, second) = chunk(&s1, &rename("X", "Y"));
        let (_, third) = chunk(&s2, &rename("B", "A"));

        let merged = first.combine_right(second.as_ref()).unwrap();
        let merged = merged.combine_right(third.as_ref()).unwrap();
        assert_eq!(
            merged.transpile(),
            vec!["df.rename(columns={'A': 'Y', 'B': 'A'}, inplace=True)"]
        );
    }

    #[test]
    fn test_rename_does_not_combine_with_delete() {
        let s0 = state();
        let (s1, renamed) = chunk(&s0, &rename("A", "X"));
        let params = Params::new()
            .with("sheet_index", 0i64)
            .with("column_headers", vec!["X"]);
        let s2 = Arc::new(crate::DeleteColumn.execute(&s1, &params).unwrap().state);
        let deleted = crate::DeleteColumn.transpile(&s1, &s2, &params, None).remove(0);

        assert!(renamed.combine_right(deleted.as_ref()).is_none());
        assert!(deleted.combine_right(renamed.as_ref()).is_none());
    }

    #[test]
    fn test_rename_back_cancels_out() {
        let s0 = state();
        let (s1, first) = chunk(&s0, &rename("A", "X"));
        let (_, second) = chunk(&s1, &rename("X", "A"));

        let merged = first.combine_right(second.as_ref()).unwrap();
        assert!(merged.transpile().is_empty());
    }
}
