//! `ai_transformation`: run user-approved generated code against the state.
//!
//! The code runs in the script interpreter. When it ends with an expression
//! that evaluates to a dataframe, that dataframe is kept as a new dataframe
//! and the generated code assigns it to the new name.

use crate::chunk_context;
use crate::recon::reconcile;
use std::any::Any;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use stepsheet::{
    ChunkContext, CodeChunk, ExecutionData, ExecutionError, NEW_DATAFRAME_INDEX, Params,
    ScriptValue, State, StepOutput, StepPerformer, Value, require_str, run_script,
};

pub struct AiTransformation;

impl StepPerformer for AiTransformation {
    fn step_version(&self) -> u32 {
        1
    }

    fn step_type(&self) -> &'static str {
        "ai_transformation"
    }

    fn execute(&self, prev_state: &State, params: &Params) -> Result<StepOutput, ExecutionError> {
        let code = require_str(params, "edited_completion")?;

        let started = Instant::now();
        let outcome = run_script(prev_state, code)?;
        let processing_time = started.elapsed().as_secs_f64();

        let mut state = outcome.state;
        let last_line_is_dataframe = matches!(outcome.last_value, Some(ScriptValue::Frame(_)));
        let last_line_value = outcome
            .last_value
            .as_ref()
            .and_then(ScriptValue::primitive)
            .cloned()
            .unwrap_or_default();

        let mut created_dataframe_name = None;
        let mut last_expression_line = None;
        if let (Some(ScriptValue::Frame(frame)), Some(expression)) =
            (outcome.last_value, outcome.last_expression)
        {
            // A bare name refers to a dataframe that is already in the state.
            if !expression.is_name {
                let name = state.unique_name(&format!("df{}", state.len() + 1));
                state.insert_frame(name.clone(), frame);
                created_dataframe_name = Some(name);
                last_expression_line = Some(expression.line);
            }
        }

        let mut result = ExecutionData::new();
        result.insert("last_line_value".into(), last_line_value);
        result.extend(reconcile(prev_state, &state).into_entries());

        tracing::debug!(
            processing_time,
            last_line_is_dataframe,
            created = ?created_dataframe_name,
            "ran generated code"
        );

        let mut execution_data = ExecutionData::new();
        execution_data.insert("pandas_processing_time".into(), Value::from(processing_time));
        execution_data.insert("last_line_is_dataframe".into(), Value::from(last_line_is_dataframe));
        execution_data.insert("result".into(), Value::from(result));
        execution_data.insert("created_dataframe_name".into(), Value::from(created_dataframe_name));
        execution_data.insert("last_expression_line".into(), Value::from(last_expression_line));
        Ok(StepOutput::new(state).with_execution_data(execution_data))
    }

    fn transpile(
        &self,
        prev_state: &Arc<State>,
        post_state: &Arc<State>,
        params: &Params,
        execution_data: Option<&ExecutionData>,
    ) -> Vec<Box<dyn CodeChunk>> {
        vec![Box::new(AiTransformationChunk {
            ctx: chunk_context(prev_state, post_state, params, execution_data),
        })]
    }

    fn modified_dataframe_indexes(&self, _params: &Params) -> BTreeSet<i64> {
        BTreeSet::new()
    }

    fn created_dataframe_indexes(&self, _params: &Params) -> BTreeSet<i64> {
        BTreeSet::from([NEW_DATAFRAME_INDEX])
    }
}

#[derive(Debug)]
pub struct AiTransformationChunk {
    ctx: ChunkContext,
}

impl CodeChunk for AiTransformationChunk {
    fn context(&self) -> &ChunkContext {
        &self.ctx
    }

    fn chunk_type(&self) -> &'static str {
        "ai_transformation"
    }

    fn display_name(&self) -> String {
        "AI Transformation".to_string()
    }

    fn description_comment(&self) -> String {
        self.ctx
            .param_str("user_input")
            .unwrap_or_default()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn transpile(&self) -> Vec<String> {
        let code = self.ctx.param_str("edited_completion").unwrap_or_default();
        let mut lines: Vec<String> = code.trim_end().lines().map(String::from).collect();

        let created = self
            .get_execution_data("created_dataframe_name")
            .and_then(Value::as_str);
        let line = self
            .get_execution_data("last_expression_line")
            .and_then(Value::as_i64)
            .and_then(|line| usize::try_from(line).ok());
        if let (Some(name), Some(line)) = (created, line) {
            if let Some(source) = line.checked_sub(1).and_then(|i| lines.get_mut(i)) {
                *source = format!("{name} = {}", source.trim());
            }
        }
        lines
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepsheet::{Frame, ParamsExt};

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().map(|n| Value::Int(*n)).collect()
    }

    fn state() -> Arc<State> {
        let df = Frame::from_columns([("A", ints(&[1, 2, 3]))]).unwrap();
        Arc::new(State::new().with_frame("df", df))
    }

    fn ai(user_input: &str, code: &str) -> Params {
        Params::new()
            .with("user_input", user_input)
            .with("edited_completion", code)
    }

    fn result<'a>(execution_data: &'a ExecutionData, key: &str) -> &'a Value {
        &execution_data["result"].as_object().unwrap()[key]
    }

    #[test]
    fn test_double_column() {
        let output = AiTransformation
            .execute(&state(), &ai("double column A", "df['A'] = df['A'] * 2"))
            .unwrap();

        assert_eq!(
            output.state.frame("df").unwrap().column("A"),
            Some(ints(&[2, 4, 6]).as_slice())
        );
        let data = output.execution_data.unwrap();
        assert_eq!(data["last_line_is_dataframe"], Value::Bool(false));
        assert_eq!(*result(&data, "last_line_value"), Value::Null);
        assert!(data["pandas_processing_time"].as_f64().unwrap() >= 0.0);
        assert!(data["result"].as_object().unwrap()["modified_dataframes_recons"]
            .as_object()
            .unwrap()
            .contains_key("df"));
    }

    #[test]
    fn test_scalar_last_line() {
        let output = AiTransformation
            .execute(&state(), &ai("total of A", "df['A'].sum()"))
            .unwrap();
        let data = output.execution_data.unwrap();

        assert_eq!(*result(&data, "last_line_value"), Value::Int(6));
        assert_eq!(data["last_line_is_dataframe"], Value::Bool(false));
        assert_eq!(output.state, *state());
    }

    #[test]
    fn test_dataframe_last_line_becomes_new_dataframe() {
        let prev = state();
        let params = ai("rows where A > 1", "mask = df['A'] > 1\ndf[mask]\n\n");
        let output = AiTransformation.execute(&prev, &params).unwrap();

        let df2 = output.state.frame("df2").unwrap();
        assert_eq!(df2.column("A"), Some(ints(&[2, 3]).as_slice()));

        let data = output.execution_data.unwrap();
        assert_eq!(data["last_line_is_dataframe"], Value::Bool(true));
        assert_eq!(*result(&data, "last_line_value"), Value::Null);
        assert_eq!(
            *result(&data, "created_dataframe_names"),
            Value::from(vec!["df2"])
        );

        let post = Arc::new(output.state);
        let chunk = AiTransformation
            .transpile(&prev, &post, &params, Some(&data))
            .remove(0);
        assert_eq!(chunk.transpile(), vec!["mask = df['A'] > 1", "df2 = df[mask]"]);
        assert_eq!(chunk.description_comment(), "rows where A > 1");
    }

    #[test]
    fn test_bare_name_is_not_copied() {
        let output = AiTransformation.execute(&state(), &ai("show", "df")).unwrap();
        let data = output.execution_data.unwrap();

        assert_eq!(data["last_line_is_dataframe"], Value::Bool(true));
        assert_eq!(data["created_dataframe_name"], Value::Null);
        assert_eq!(output.state.len(), 1);
    }

    #[test]
    fn test_script_error() {
        let err = AiTransformation
            .execute(&state(), &ai("oops", "df['A'] = missing + 1"))
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Script(_)));
    }

    #[test]
    fn test_user_input_is_optional() {
        let prev = state();
        let params = Params::new().with("edited_completion", "df['A'] = df['A'] + 1");
        let output = AiTransformation.execute(&prev, &params).unwrap();
        assert_eq!(
            output.state.frame("df").unwrap().column("A"),
            Some(ints(&[2, 3, 4]).as_slice())
        );

        let post = Arc::new(output.state);
        let chunk = AiTransformation
            .transpile(&prev, &post, &params, output.execution_data.as_ref())
            .remove(0);
        assert_eq!(chunk.description_comment(), "");
        assert_eq!(chunk.transpile(), vec!["df['A'] = df['A'] + 1"]);
    }

    #[test]
    fn test_missing_params() {
        let params = Params::new().with("user_input", "no code");
        assert!(matches!(
            AiTransformation.execute(&state(), &params),
            Err(ExecutionError::MissingParam(key)) if key == "edited_completion"
        ));
    }
}
