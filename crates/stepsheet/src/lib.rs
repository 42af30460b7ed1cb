//! Stepsheet: a replayable step log for tabular data.
//!
//! Each user operation is a step. A [`StepPerformer`] applies it to a
//! [`State`] (a set of named dataframes), and the matching [`CodeChunk`]
//! turns the same transition into pandas code. The [`Pipeline`] keeps the
//! ordered log, merges adjacent chunks where possible, and emits the whole
//! script.

mod analysis;
mod code_chunk;
mod frame;
mod pipeline;
mod registry;
pub mod script;
mod session;
mod state;
mod step;
mod value;

pub use analysis::{Analysis, AnalysisError, SavedStep, detect_format};
pub use code_chunk::{
    ChunkContext, CodeChunk, downcast, py_list, py_literal, py_path, py_str, py_str_list,
};
pub use frame::{Frame, FrameError, infer_cell};
pub use pipeline::{MergePolicy, Pipeline, PipelineError, SCRIPT_HEADER, StepRecord};
pub use registry::{Registry, RegistryError};
pub use script::{ScriptError, ScriptErrorKind, ScriptOutcome, ScriptValue, run_script};
pub use session::{SessionCache, SharedPipeline, fingerprint_state};
pub use state::{NEW_DATAFRAME_INDEX, State, sanitize_df_name};
pub use step::{
    ExecutionError, StepOutput, StepPerformer, require_i64, require_param, require_sheet,
    require_str, require_string_list, sheet_index_set,
};
pub use value::{ExecutionData, Params, ParamsExt, Value};
