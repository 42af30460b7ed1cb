//! `simple_import`: read CSV files into new dataframes.

use crate::{chunk_context, new_dataframe_names};
use std::any::Any;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use stepsheet::{
    ChunkContext, CodeChunk, ExecutionData, ExecutionError, Frame, NEW_DATAFRAME_INDEX, Params,
    State, StepOutput, StepPerformer, Value, downcast, py_path, require_string_list,
    sanitize_df_name,
};

/// Imports each file in `file_names` as a dataframe named after the file stem.
pub struct SimpleImport;

impl StepPerformer for SimpleImport {
    fn step_version(&self) -> u32 {
        2
    }

    fn step_type(&self) -> &'static str {
        "simple_import"
    }

    fn execute(&self, prev_state: &State, params: &Params) -> Result<StepOutput, ExecutionError> {
        let file_names = require_string_list(params, "file_names")?;

        let mut state = prev_state.clone();
        for file_name in &file_names {
            let frame = Frame::read_csv(file_name)?;
            let df_name = state.unique_name(&dataframe_name_for(file_name));
            tracing::debug!(file = %file_name, df_name = %df_name, rows = frame.num_rows(), "imported file");
            state.insert_frame(df_name, frame);
        }
        Ok(StepOutput::new(state))
    }

    fn transpile(
        &self,
        prev_state: &Arc<State>,
        post_state: &Arc<State>,
        params: &Params,
        execution_data: Option<&ExecutionData>,
    ) -> Vec<Box<dyn CodeChunk>> {
        vec![Box::new(SimpleImportChunk {
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

fn dataframe_name_for(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(file_name);
    sanitize_df_name(stem)
}

#[derive(Debug)]
pub struct SimpleImportChunk {
    ctx: ChunkContext,
}

impl SimpleImportChunk {
    fn file_names(&self) -> Vec<String> {
        self.ctx
            .get_param("file_names")
            .and_then(Value::as_string_list)
            .unwrap_or_default()
    }
}

impl CodeChunk for SimpleImportChunk {
    fn context(&self) -> &ChunkContext {
        &self.ctx
    }

    fn chunk_type(&self) -> &'static str {
        "simple_import"
    }

    fn display_name(&self) -> String {
        "Imported files".to_string()
    }

    fn description_comment(&self) -> String {
        format!("Imported {}", self.file_names().join(", "))
    }

    fn transpile(&self) -> Vec<String> {
        // New dataframes appear in the same order as the files they came from.
        let df_names = new_dataframe_names(&self.ctx.prev_state, &self.ctx.post_state);
        self.file_names()
            .iter()
            .zip(df_names)
            .map(|(file_name, df_name)| format!("{df_name} = pd.read_csv({})", py_path(file_name)))
            .collect()
    }

    fn combine_right(&self, other: &dyn CodeChunk) -> Option<Box<dyn CodeChunk>> {
        let other = downcast::<SimpleImportChunk>(other)?;
        let mut file_names = self.file_names();
        file_names.extend(other.file_names());

        let mut params = self.ctx.params.clone();
        params.insert("file_names".into(), Value::from(file_names));
        Some(Box::new(SimpleImportChunk {
            ctx: self.ctx.spanning(&other.ctx, params),
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
