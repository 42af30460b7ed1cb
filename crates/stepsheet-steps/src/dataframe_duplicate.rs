//! `dataframe_duplicate`: copy a dataframe under a new name.

use crate::{chunk_context, new_dataframe_names};
use std::any::Any;
use std::collections::BTreeSet;
use std::sync::Arc;
use stepsheet::{
    ChunkContext, CodeChunk, ExecutionData, ExecutionError, NEW_DATAFRAME_INDEX, Params, State,
    StepOutput, StepPerformer, require_sheet,
};

/// Appends a deep copy of the dataframe at `sheet_index`, named
/// `<name>_copy` (or `<name>_copy_1`, ... when taken).
pub struct DataframeDuplicate;

impl StepPerformer for DataframeDuplicate {
    fn step_version(&self) -> u32 {
        1
    }

    fn step_type(&self) -> &'static str {
        "dataframe_duplicate"
    }

    fn execute(&self, prev_state: &State, params: &Params) -> Result<StepOutput, ExecutionError> {
        let (_, df_name, frame) = require_sheet(prev_state, params)?;
        let copy_name = prev_state.unique_name(&format!("{df_name}_copy"));

        let mut state = prev_state.clone();
        state.insert_frame(copy_name, frame.clone());
        Ok(StepOutput::new(state))
    }

    fn transpile(
        &self,
        prev_state: &Arc<State>,
        post_state: &Arc<State>,
        params: &Params,
        execution_data: Option<&ExecutionData>,
    ) -> Vec<Box<dyn CodeChunk>> {
        vec![Box::new(DataframeDuplicateChunk {
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
pub struct DataframeDuplicateChunk {
    ctx: ChunkContext,
}

impl DataframeDuplicateChunk {
    fn copy_name(&self) -> Option<&str> {
        new_dataframe_names(&self.ctx.prev_state, &self.ctx.post_state)
            .first()
            .copied()
    }
}

impl CodeChunk for DataframeDuplicateChunk {
    fn context(&self) -> &ChunkContext {
        &self.ctx
    }

    fn chunk_type(&self) -> &'static str {
        "dataframe_duplicate"
    }

    fn display_name(&self) -> String {
        "Duplicated dataframe".to_string()
    }

    fn description_comment(&self) -> String {
        format!(
            "Duplicated {}",
            self.ctx.sheet_name().unwrap_or_default()
        )
    }

    fn transpile(&self) -> Vec<String> {
        match (self.ctx.sheet_name(), self.copy_name()) {
            (Some(df_name), Some(copy_name)) => {
                vec![format!("{copy_name} = {df_name}.copy(deep=True)")]
            }
            _ => Vec::new(),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
