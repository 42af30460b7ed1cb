//! `delete_column`: drop columns from a dataframe.

use crate::chunk_context;
use std::any::Any;
use std::collections::BTreeSet;
use std::sync::Arc;
use stepsheet::{
    ChunkContext, CodeChunk, ExecutionData, ExecutionError, Params, State, StepOutput,
    StepPerformer, Value, downcast, py_str_list, require_sheet, require_string_list,
    sheet_index_set,
};

pub struct DeleteColumn;

impl StepPerformer for DeleteColumn {
    fn step_version(&self) -> u32 {
        3
    }

    fn step_type(&self) -> &'static str {
        "delete_column"
    }

    fn execute(&self, prev_state: &State, params: &Params) -> Result<StepOutput, ExecutionError> {
        let (_, df_name, frame) = require_sheet(prev_state, params)?;
        let column_headers = require_string_list(params, "column_headers")?;

        let mut frame = frame.clone();
        for header in &column_headers {
            if !frame.has_column(header) {
                return Err(ExecutionError::MissingColumn(header.clone()));
            }
            frame.drop_column(header)?;
        }

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
        let column_headers = params
            .get("column_headers")
            .and_then(Value::as_string_list)
            .unwrap_or_default();
        vec![Box::new(DeleteColumnChunk {
            ctx: chunk_context(prev_state, post_state, params, execution_data),
            column_headers,
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
pub struct DeleteColumnChunk {
    ctx: ChunkContext,
    column_headers: Vec<String>,
}

impl CodeChunk for DeleteColumnChunk {
    fn context(&self) -> &ChunkContext {
        &self.ctx
    }

    fn chunk_type(&self) -> &'static str {
        "delete_column"
    }

    fn display_name(&self) -> String {
        "Deleted columns".to_string()
    }

    fn description_comment(&self) -> String {
        format!(
            "Deleted columns {}",
            self.column_headers.join(", ")
        )
    }

    fn transpile(&self) -> Vec<String> {
        let Some(df_name) = self.ctx.sheet_name() else {
            return Vec::new();
        };
        if self.column_headers.is_empty() {
            return Vec::new();
        }
        vec![format!(
            "{df_name}.drop({}, axis=1, inplace=True)",
            py_str_list(&self.column_headers)
        )]
    }

    fn combine_right(&self, other: &dyn CodeChunk) -> Option<Box<dyn CodeChunk>> {
        let other = downcast::<DeleteColumnChunk>(other)?;
        if !self.params_match(other, &["sheet_index"]) {
            return None;
        }
        let mut column_headers = self.column_headers.clone();
        column_headers.extend(other.column_headers.iter().cloned());

        let mut params = self.ctx.params.clone();
        params.insert("column_headers".into(), Value::from(column_headers.clone()));
        Some(Box::new(DeleteColumnChunk {
            ctx: self.ctx.spanning(&other.ctx, params),
            column_headers,
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
            ("C", vec![Value::Int(3)]),
        ])
        .unwrap();
        Arc::new(State::new().with_frame("df", df))
    }

    fn delete(headers: Vec<&str>) -> Params {
        Params::new()
            .with("sheet_index", 0i64)
            .with("column_headers", headers)
    }

    #[test]
    fn test_execute() {
        let output = DeleteColumn.execute(&state(), &delete(vec!["A", "C"])).unwrap();
        let df = output.state.frame("df").unwrap();
        assert_eq!(df.column_headers().collect::<Vec<_>>(), vec!["B"]);
    }

    #[test]
    fn test_missing_column_leaves_state_alone() {
        let prev = state();
        let err = DeleteColumn.execute(&prev, &delete(vec!["A", "Z"])).unwrap_err();
        assert!(matches!(err, ExecutionError::MissingColumn(name) if name == "Z"));
        assert_eq!(prev.frame("df").unwrap().num_columns(), 3);
    }

    #[test]
    fn test_consecutive_deletes_merge() {
        let s0 = state();
        let p1 = delete(vec!["A"]);
        let s1 = Arc::new(DeleteColumn.execute(&s0, &p1).unwrap().state);
        let p2 = delete(vec!["C"]);
        let s2 = Arc::new(DeleteColumn.execute(&s1, &p2).unwrap().state);

        let first = DeleteColumn.transpile(&s0, &s1, &p1, None).remove(0);
        let second = DeleteColumn.transpile(&s1, &s2, &p2, None).remove(0);
        let merged = first.combine_right(second.as_ref()).unwrap();

        assert_eq!(
            merged.transpile(),
            vec!["df.drop(['A', 'C'], axis=1, inplace=True)"]
        );
        assert!(Arc::ptr_eq(&merged.context().post_state, &s2));
    }
}
