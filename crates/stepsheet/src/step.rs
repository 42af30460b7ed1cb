//! Step performers: the executable side of a step.

use crate::code_chunk::CodeChunk;
use crate::frame::{Frame, FrameError};
use crate::script::ScriptError;
use crate::state::State;
use crate::value::{ExecutionData, Params, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Result of executing a step.
#[derive(Debug, Clone)]
pub struct StepOutput {
    pub state: State,
    pub execution_data: Option<ExecutionData>,
}

impl StepOutput {
    pub fn new(state: State) -> Self {
        Self {
            state,
            execution_data: None,
        }
    }

    pub fn with_execution_data(mut self, execution_data: ExecutionData) -> Self {
        self.execution_data = Some(execution_data);
        self
    }
}

/// Errors that abort a step. The state is left untouched.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("missing param: {0}")]
    MissingParam(String),

    #[error("invalid param {key}: expected {expected}, found {found}")]
    InvalidParam {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("no dataframe at index {0}")]
    MissingDataframe(i64),

    #[error("column not found: {0:?}")]
    MissingColumn(String),

    #[error("script failed at {0}")]
    Script(#[from] ScriptError),

    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// One kind of user operation.
///
/// Performers are stateless: everything a step needs arrives in its params,
/// and `execute` builds a new state instead of changing `prev_state`.
pub trait StepPerformer: Send + Sync {
    /// Schema version of this step's params, stored with saved analyses.
    fn step_version(&self) -> u32;

    /// Stable identifier used for registry lookup and saved analyses.
    fn step_type(&self) -> &'static str;

    /// Apply the step to `prev_state`.
    fn execute(&self, prev_state: &State, params: &Params) -> Result<StepOutput, ExecutionError>;

    /// Code chunks reproducing an executed step.
    fn transpile(
        &self,
        prev_state: &Arc<State>,
        post_state: &Arc<State>,
        params: &Params,
        execution_data: Option<&ExecutionData>,
    ) -> Vec<Box<dyn CodeChunk>>;

    /// Dataframe indexes this step changes.
    fn modified_dataframe_indexes(&self, params: &Params) -> BTreeSet<i64>;

    /// Dataframe indexes this step creates. `NEW_DATAFRAME_INDEX` stands for
    /// a dataframe whose position is only known after execution.
    fn created_dataframe_indexes(&self, params: &Params) -> BTreeSet<i64>;
}

// ============================================================================
// Param helpers
// ============================================================================

pub fn require_param<'a>(params: &'a Params, key: &str) -> Result<&'a Value, ExecutionError> {
    params
        .get(key)
        .ok_or_else(|| ExecutionError::MissingParam(key.to_string()))
}

pub fn require_str<'a>(params: &'a Params, key: &str) -> Result<&'a str, ExecutionError> {
    let value = require_param(params, key)?;
    value.as_str().ok_or_else(|| invalid(key, "str", value))
}

pub fn require_i64(params: &Params, key: &str) -> Result<i64, ExecutionError> {
    let value = require_param(params, key)?;
    value.as_i64().ok_or_else(|| invalid(key, "int", value))
}

pub fn require_string_list(params: &Params, key: &str) -> Result<Vec<String>, ExecutionError> {
    let value = require_param(params, key)?;
    value.as_string_list().ok_or_else(|| invalid(key, "list of str", value))
}

fn invalid(key: &str, expected: &'static str, found: &Value) -> ExecutionError {
    ExecutionError::InvalidParam {
        key: key.to_string(),
        expected,
        found: found.kind(),
    }
}

/// Resolve the `sheet_index` param to a position, name and frame.
pub fn require_sheet<'a>(
    state: &'a State,
    params: &Params,
) -> Result<(usize, &'a str, &'a Frame), ExecutionError> {
    let index = require_i64(params, "sheet_index")?;
    let position = usize::try_from(index).map_err(|_| ExecutionError::MissingDataframe(index))?;
    let (name, frame) = state
        .frame_at(position)
        .ok_or(ExecutionError::MissingDataframe(index))?;
    Ok((position, name, frame))
}

/// `{sheet_index}` from params, or an empty set when it is missing.
pub fn sheet_index_set(params: &Params) -> BTreeSet<i64> {
    params
        .get("sheet_index")
        .and_then(Value::as_i64)
        .into_iter()
        .collect()
}
