//! `add_column`: insert a new column of zeros.

use crate::chunk_context;
use std::any::Any;
use std::collections::BTreeSet;
use std::sync::Arc;
use stepsheet::{
    ChunkContext, CodeChunk, ExecutionData, ExecutionError, Frame, Params, State, StepOutput,
    StepPerformer, Value, py_str, require_sheet, require_str, sheet_index_set,
};

/// Adds a column filled with `0` at `column_header_index` (-1 or past the
/// end appends).
pub struct AddColumn;

impl StepPerformer for AddColumn {
    fn step_version(&self) -> u32 {
        2
    }

    fn step_type(&self) -> &'static str {
        "add_column"
    }

    fn execute(&self, prev_state: &State, params: &Params) -> Result<StepOutput, ExecutionError> {
        let (_, df_name, frame) = require_sheet(prev_state, params)?;
        let column_header = require_str(params, "column_header")?;
        let loc = insert_location(frame, params);

        let mut frame = frame.clone();
        frame.insert_column(loc, column_header, vec![Value::Int(0); frame.num_rows()])?;

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
        vec![Box::new(AddColumnChunk {
            ctx: chunk_context(prev_state, post_state, params, execution_data),
        })]
    }

    fn modified_dataframe_indexes(&self, params: &Params) -> BTreeSet<i64> {
        sheet_index_set(params)
    }

    fn created_dataframe_indexes(&self, _params: &Params) -> BTreeSet<i64> {
        BTreeSet::new()
    }
}

/// Column position for the new column; missing, negative or out of range
/// indexes append.
fn insert_location(frame: &Frame, params: &Params) -> usize {
    params
        .get("column_header_index")
        .and_then(Value::as_i64)
        .and_then(|index| usize::try_from(index).ok())
        .map_or(frame.num_columns(), |index| index.min(frame.num_columns()))
}

#[derive(Debug)]
pub struct AddColumnChunk {
    ctx: ChunkContext,
}

impl CodeChunk for AddColumnChunk {
    fn context(&self) -> &ChunkContext {
        &self.ctx
    }

    fn chunk_type(&self) -> &'static str {
        "add_column"
    }

    fn display_name(&self) -> String {
        "Added column".to_string()
    }

    fn description_comment(&self) -> String {
        format!(
            "Added column {} to {}",
            self.ctx.param_str("column_header").unwrap_or_default(),
            self.ctx.sheet_name().unwrap_or_default()
        )
    }

    fn transpile(&self) -> Vec<String> {
        let (Some(df_name), Some(column_header)) =
            (self.ctx.sheet_name(), self.ctx.param_str("column_header"))
        else {
            return Vec::new();
        };
        let Some(frame) = self.ctx.prev_state.frame(df_name) else {
            return Vec::new();
        };
        let loc = insert_location(frame, &self.ctx.params);
        vec![format!("{df_name}.insert({loc}, {}, 0)", py_str(column_header))]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepsheet::ParamsExt;

    fn state() -> State {
        let df = Frame::from_columns([
            ("A", vec![Value::Int(1), Value::Int(2)]),
            ("C", vec![Value::Int(3), Value::Int(4)]),
        ])
        .unwrap();
        State::new().with_frame("df", df)
    }

    fn params(header: &str, index: i64) -> Params {
        Params::new()
            .with("sheet_index", 0i64)
            .with("column_header", header)
            .with("column_header_index", index)
    }

    #[test]
    fn test_insert_in_the_middle() {
        let output = AddColumn.execute(&state(), &params("B", 1)).unwrap();
        let df = output.state.frame("df").unwrap();

        assert_eq!(df.column_headers().collect::<Vec<_>>(), vec!["A", "B", "C"]);
        assert_eq!(df.column("B"), Some(&[Value::Int(0), Value::Int(0)][..]));
    }

    #[test]
    fn test_negative_index_appends() {
        let output = AddColumn.execute(&state(), &params("D", -1)).unwrap();
        let headers: Vec<_> = output.state.frame("df").unwrap().column_headers().map(String::from).collect();
        assert_eq!(headers, vec!["A", "C", "D"]);
    }

    #[test]
    fn test_duplicate_header_fails() {
        let err = AddColumn.execute(&state(), &params("A", 0)).unwrap_err();
        assert!(matches!(err, ExecutionError::Frame(_)));
    }

    #[test]
    fn test_code() {
        let prev = Arc::new(state());
        let p = params("B", -1);
        let post = Arc::new(AddColumn.execute(&prev, &p).unwrap().state);
        let chunks = AddColumn.transpile(&prev, &post, &p, None);

        assert_eq!(chunks[0].transpile(), vec!["df.insert(2, 'B', 0)"]);
        assert_eq!(chunks[0].description_comment(), "Added column B to df");
    }
}
