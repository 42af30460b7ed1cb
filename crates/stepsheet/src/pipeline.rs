//! Pipeline: the step log.
//!
//! Every applied step is kept as a [`StepRecord`] holding the states on either
//! side of it, so the log can be undone, replayed against new input data, and
//! turned into one script. Code chunks are appended as steps are applied and
//! merged with their left neighbour when the chunk kind allows it.

use crate::analysis::{Analysis, SavedStep};
use crate::code_chunk::{CodeChunk, py_path};
use crate::registry::Registry;
use crate::state::{NEW_DATAFRAME_INDEX, State};
use crate::step::{ExecutionError, StepPerformer};
use crate::value::{ExecutionData, Params};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// First line of every generated script.
pub const SCRIPT_HEADER: &str = "import pandas as pd";

/// When adjacent code chunks are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    /// Merge after every appended chunk.
    #[default]
    Eager,
    /// Keep one chunk per step.
    Disabled,
}

impl std::str::FromStr for MergePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "eager" => Ok(MergePolicy::Eager),
            "disabled" | "off" | "none" => Ok(MergePolicy::Disabled),
            other => Err(format!("unknown merge policy: {other}")),
        }
    }
}

/// One applied step.
#[derive(Debug, Clone)]
pub struct StepRecord {
    pub step_id: String,
    pub step_type: String,
    pub step_version: u32,
    pub params: Params,
    pub prev_state: Arc<State>,
    pub post_state: Arc<State>,
    pub execution_data: Option<ExecutionData>,
    /// Resolved indexes of dataframes the step changed.
    pub modified: BTreeSet<usize>,
    /// Resolved indexes of dataframes the step created.
    pub created: BTreeSet<usize>,
}

/// Errors from applying, replaying or loading steps.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("unknown step type: {0}")]
    UnknownStepType(String),

    #[error("step {step_type} failed: {source}")]
    Execution {
        step_type: String,
        params: Params,
        #[source]
        source: ExecutionError,
    },

    #[error("replay failed at step {index}: {source}")]
    Replay {
        index: usize,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("step {step_type} was saved at version {saved}, current version is {current}")]
    VersionMismatch {
        step_type: String,
        saved: u32,
        current: u32,
    },
}

/// Ordered log of applied steps and the code they generate.
pub struct Pipeline {
    registry: Arc<Registry>,
    initial_state: Arc<State>,
    records: Vec<StepRecord>,
    chunks: Vec<Box<dyn CodeChunk>>,
    merge_policy: MergePolicy,
    next_step_id: u64,
    /// Dataframe name to the CSV file it was read from.
    input_sources: IndexMap<String, String>,
}

impl Pipeline {
    /// Create an empty log starting from `initial_state`.
    pub fn new(registry: Arc<Registry>, initial_state: State) -> Self {
        Self {
            registry,
            initial_state: Arc::new(initial_state),
            records: Vec::new(),
            chunks: Vec::new(),
            merge_policy: MergePolicy::default(),
            next_step_id: 0,
            input_sources: IndexMap::new(),
        }
    }

    /// Set the merge policy.
    pub fn with_merge_policy(mut self, merge_policy: MergePolicy) -> Self {
        self.merge_policy = merge_policy;
        self.rebuild_chunks();
        self
    }

    /// Record where the initial dataframes come from, so the script reads
    /// them itself instead of expecting them to exist.
    pub fn with_input_sources<I, K, V>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.input_sources = sources
            .into_iter()
            .map(|(name, path)| (name.into(), path.into()))
            .collect();
        self
    }

    pub fn input_sources(&self) -> &IndexMap<String, String> {
        &self.input_sources
    }

    pub fn merge_policy(&self) -> MergePolicy {
        self.merge_policy
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn initial_state(&self) -> &Arc<State> {
        &self.initial_state
    }

    /// State after the last applied step.
    pub fn state(&self) -> &Arc<State> {
        self.records
            .last()
            .map_or(&self.initial_state, |record| &record.post_state)
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn chunks(&self) -> &[Box<dyn CodeChunk>] {
        &self.chunks
    }

    /// Number of applied steps.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Execute a step against the current state and append it to the log.
    ///
    /// On failure nothing changes.
    pub fn apply(&mut self, step_type: &str, params: Params) -> Result<&StepRecord, PipelineError> {
        let performer = self
            .registry
            .get(step_type)
            .ok_or_else(|| PipelineError::UnknownStepType(step_type.to_string()))?;

        let prev_state = Arc::clone(self.state());
        let step_id = format!("step-{}", self.next_step_id);
        let record = match run_step(performer.as_ref(), step_id, prev_state, params) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(step_type, error = %err, "step failed");
                return Err(err);
            }
        };
        self.next_step_id += 1;

        tracing::info!(
            step_type,
            step_id = %record.step_id,
            modified = ?record.modified,
            created = ?record.created,
            "applied step"
        );

        for chunk in transpile_record(performer.as_ref(), &record) {
            self.push_chunk(chunk);
        }
        self.records.push(record);
        Ok(&self.records[self.records.len() - 1])
    }

    /// Remove the last step. Returns it, or `None` if the log is empty.
    pub fn undo(&mut self) -> Option<StepRecord> {
        let record = self.records.pop()?;
        tracing::info!(step_type = %record.step_type, step_id = %record.step_id, "undid step");
        self.rebuild_chunks();
        Some(record)
    }

    /// Drop every step, returning to the initial state.
    pub fn clear(&mut self) {
        tracing::info!(steps = self.records.len(), "cleared step log");
        self.records.clear();
        self.chunks.clear();
    }

    /// Re-execute every step from the initial state.
    ///
    /// Fails with the position of the first failing step and leaves the log
    /// as it was.
    pub fn replay(&mut self) -> Result<(), PipelineError> {
        let mut replayed = Vec::with_capacity(self.records.len());
        let mut state = Arc::clone(&self.initial_state);

        for (index, record) in self.records.iter().enumerate() {
            let performer = self
                .registry
                .get(&record.step_type)
                .ok_or_else(|| PipelineError::UnknownStepType(record.step_type.clone()))
                .map_err(|err| replay_error(index, err))?;
            let fresh = run_step(
                performer.as_ref(),
                record.step_id.clone(),
                state,
                record.params.clone(),
            )
            .map_err(|err| replay_error(index, err))?;
            state = Arc::clone(&fresh.post_state);
            replayed.push(fresh);
        }

        tracing::debug!(steps = replayed.len(), "replayed step log");
        self.records = replayed;
        self.rebuild_chunks();
        Ok(())
    }

    /// Swap in new input data and replay every step against it.
    ///
    /// On failure the previous initial state and log are kept. On success the
    /// recorded input sources are dropped, since they describe the old data.
    pub fn set_initial_state(&mut self, state: State) -> Result<(), PipelineError> {
        let previous = std::mem::replace(&mut self.initial_state, Arc::new(state));
        if let Err(err) = self.replay() {
            self.initial_state = previous;
            return Err(err);
        }
        self.input_sources.clear();
        Ok(())
    }

    /// The full generated script: the import header, the reads of the input
    /// sources, then each chunk's description comment and lines. Empty when
    /// there are no input sources and no chunk produced code.
    pub fn code(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if !self.input_sources.is_empty() {
            lines.push(SCRIPT_HEADER.to_string());
            lines.push(String::new());
            lines.push("# Read input data".to_string());
            for (name, path) in &self.input_sources {
                lines.push(format!("{name} = pd.read_csv({})", py_path(path)));
            }
        }
        for chunk in &self.chunks {
            let chunk_lines = chunk.transpile();
            if chunk_lines.is_empty() {
                continue;
            }
            if lines.is_empty() {
                lines.push(SCRIPT_HEADER.to_string());
            }
            lines.push(String::new());
            lines.push(format!("# {}", chunk.description_comment()));
            lines.extend(chunk_lines);
        }
        lines
    }

    /// [`Pipeline::code`] joined into one string.
    pub fn script(&self) -> String {
        let mut script = self.code().join("\n");
        if !script.is_empty() {
            script.push('\n');
        }
        script
    }

    /// Positions of the steps that modified or created the dataframe at `index`.
    pub fn steps_touching(&self, index: usize) -> Vec<usize> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, record)| record.modified.contains(&index) || record.created.contains(&index))
            .map(|(position, _)| position)
            .collect()
    }

    /// The applied steps as a saved analysis.
    pub fn to_analysis(&self, name: impl Into<String>) -> Analysis {
        Analysis {
            name: name.into(),
            steps: self
                .records
                .iter()
                .map(|record| SavedStep {
                    step_type: record.step_type.clone(),
                    step_version: record.step_version,
                    params: record.params.clone(),
                })
                .collect(),
        }
    }

    /// Rebuild a pipeline by applying a saved analysis to `initial_state`.
    ///
    /// Every step type must be registered at the version it was saved with.
    pub fn from_analysis(
        registry: Arc<Registry>,
        analysis: &Analysis,
        initial_state: State,
        merge_policy: MergePolicy,
    ) -> Result<Self, PipelineError> {
        for saved in &analysis.steps {
            let performer = registry
                .get(&saved.step_type)
                .ok_or_else(|| PipelineError::UnknownStepType(saved.step_type.clone()))?;
            if performer.step_version() != saved.step_version {
                return Err(PipelineError::VersionMismatch {
                    step_type: saved.step_type.clone(),
                    saved: saved.step_version,
                    current: performer.step_version(),
                });
            }
        }

        let mut pipeline = Self::new(registry, initial_state).with_merge_policy(merge_policy);
        for (index, saved) in analysis.steps.iter().enumerate() {
            pipeline
                .apply(&saved.step_type, saved.params.clone())
                .map_err(|err| replay_error(index, err))?;
        }
        tracing::info!(analysis = %analysis.name, steps = pipeline.len(), "loaded analysis");
        Ok(pipeline)
    }

    fn push_chunk(&mut self, mut chunk: Box<dyn CodeChunk>) {
        if self.merge_policy == MergePolicy::Eager {
            while let Some(last) = self.chunks.last() {
                if last.chunk_type() != chunk.chunk_type() {
                    break;
                }
                let Some(combined) = last.combine_right(chunk.as_ref()) else {
                    break;
                };
                tracing::debug!(chunk_type = combined.chunk_type(), "merged code chunks");
                self.chunks.pop();
                chunk = combined;
            }
        }
        self.chunks.push(chunk);
    }

    fn rebuild_chunks(&mut self) {
        self.chunks.clear();
        let records = std::mem::take(&mut self.records);
        for record in &records {
            // Records only exist for registered step types.
            if let Some(performer) = self.registry.get(&record.step_type) {
                for chunk in transpile_record(performer.as_ref(), record) {
                    self.push_chunk(chunk);
                }
            }
        }
        self.records = records;
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("steps", &self.records.len())
            .field("chunks", &self.chunks.len())
            .field("merge_policy", &self.merge_policy)
            .finish()
    }
}

fn run_step(
    performer: &dyn StepPerformer,
    step_id: String,
    prev_state: Arc<State>,
    params: Params,
) -> Result<StepRecord, PipelineError> {
    let output = match performer.execute(&prev_state, &params) {
        Ok(output) => output,
        Err(source) => {
            return Err(PipelineError::Execution {
                step_type: performer.step_type().to_string(),
                params,
                source,
            });
        }
    };
    let post_state = Arc::new(output.state);

    let (modified, created) = resolve_indexes(
        &prev_state,
        &post_state,
        &performer.modified_dataframe_indexes(&params),
        &performer.created_dataframe_indexes(&params),
    );

    Ok(StepRecord {
        step_id,
        step_type: performer.step_type().to_string(),
        step_version: performer.step_version(),
        params,
        prev_state,
        post_state,
        execution_data: output.execution_data,
        modified,
        created,
    })
}

fn transpile_record(performer: &dyn StepPerformer, record: &StepRecord) -> Vec<Box<dyn CodeChunk>> {
    performer.transpile(
        &record.prev_state,
        &record.post_state,
        &record.params,
        record.execution_data.as_ref(),
    )
}

fn replay_error(index: usize, err: PipelineError) -> PipelineError {
    PipelineError::Replay {
        index,
        source: Box::new(err),
    }
}

/// Resolve declared index sets against what actually changed.
///
/// Dataframes whose name is new in `post` are created; dataframes present on
/// both sides with different contents are modified. Declared non-negative
/// indexes are kept when they exist in `post`; `NEW_DATAFRAME_INDEX` is
/// replaced by the observed new positions.
fn resolve_indexes(
    prev: &State,
    post: &State,
    declared_modified: &BTreeSet<i64>,
    declared_created: &BTreeSet<i64>,
) -> (BTreeSet<usize>, BTreeSet<usize>) {
    let mut modified = BTreeSet::new();
    let mut created = BTreeSet::new();

    for (index, (name, frame)) in post.frames().enumerate() {
        match prev.frame(name) {
            None => {
                created.insert(index);
            }
            Some(before) if before != frame => {
                modified.insert(index);
            }
            Some(_) => {}
        }
    }

    let declared = |set: &BTreeSet<i64>| -> Vec<usize> {
        set.iter()
            .filter(|index| **index != NEW_DATAFRAME_INDEX)
            .filter_map(|index| usize::try_from(*index).ok())
            .filter(|index| *index < post.len())
            .collect()
    };
    modified.extend(declared(declared_modified));
    created.extend(declared(declared_created));

    // A created dataframe is not also reported as modified.
    modified.retain(|index| !created.contains(index));
    (modified, created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code_chunk::{ChunkContext, downcast, py_str};
    use crate::frame::Frame;
    use crate::registry::RegistryError;
    use crate::step::{StepOutput, require_sheet, require_str, sheet_index_set};
    use crate::value::{ParamsExt, Value};
    use std::any::Any;

    // A minimal "set a constant column" step, enough to exercise the log.
    struct SetColumn;

    #[derive(Debug)]
    struct SetColumnChunk {
        ctx: ChunkContext,
        headers: Vec<String>,
    }

    impl CodeChunk for SetColumnChunk {
        fn context(&self) -> &ChunkContext {
            &self.ctx
        }

        fn chunk_type(&self) -> &'static str {
            "set_column"
        }

        fn display_name(&self) -> String {
            "Set column".into()
        }

        fn description_comment(&self) -> String {
            format!("Set {}", self.headers.join(", "))
        }

        fn transpile(&self) -> Vec<String> {
            let df = self.ctx.sheet_name().unwrap_or("df");
            self.headers
                .iter()
                .map(|header| format!("{df}[{}] = 0", py_str(header)))
                .collect()
        }

        fn combine_right(&self, other: &dyn CodeChunk) -> Option<Box<dyn CodeChunk>> {
            let other = downcast::<SetColumnChunk>(other)?;
            if !self.params_match(other, &["sheet_index"]) {
                return None;
            }
            let mut headers = self.headers.clone();
            headers.extend(other.headers.iter().cloned());
            Some(Box::new(SetColumnChunk {
                ctx: self.ctx.spanning(&other.ctx, self.ctx.params.clone()),
                headers,
            }))
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    impl StepPerformer for SetColumn {
        fn step_version(&self) -> u32 {
            1
        }

        fn step_type(&self) -> &'static str {
            "set_column"
        }

        fn execute(&self, prev_state: &State, params: &Params) -> Result<StepOutput, ExecutionError> {
            let (_, name, frame) = require_sheet(prev_state, params)?;
            let header = require_str(params, "column_header")?;
            let mut frame = frame.clone();
            frame.set_column(header, vec![Value::Int(0); frame.num_rows()])?;
            let mut state = prev_state.clone();
            state.insert_frame(name.to_string(), frame);
            Ok(StepOutput::new(state))
        }

        fn transpile(
            &self,
            prev_state: &Arc<State>,
            post_state: &Arc<State>,
            params: &Params,
            execution_data: Option<&ExecutionData>,
        ) -> Vec<Box<dyn CodeChunk>> {
            let header = params
                .get("column_header")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            vec![Box::new(SetColumnChunk {
                ctx: ChunkContext::new(
                    Arc::clone(prev_state),
                    Arc::clone(post_state),
                    params.clone(),
                    execution_data.cloned(),
                ),
                headers: vec![header],
            })]
        }

        fn modified_dataframe_indexes(&self, params: &Params) -> BTreeSet<i64> {
            sheet_index_set(params)
        }

        fn created_dataframe_indexes(&self, _params: &Params) -> BTreeSet<i64> {
            BTreeSet::new()
        }
    }

    fn registry() -> Arc<Registry> {
        let mut registry = Registry::new();
        registry.register(SetColumn).unwrap();
        Arc::new(registry)
    }

    fn initial_state() -> State {
        let df = Frame::from_columns([("A", vec![Value::Int(1), Value::Int(2)])]).unwrap();
        let other = Frame::from_columns([("X", vec![Value::Int(9)])]).unwrap();
        State::new().with_frame("df", df).with_frame("other", other)
    }

    fn set(sheet_index: i64, header: &str) -> Params {
        Params::new()
            .with("sheet_index", sheet_index)
            .with("column_header", header)
    }

    #[test]
    fn test_apply_advances_state() {
        let mut pipeline = Pipeline::new(registry(), initial_state());
        let record = pipeline.apply("set_column", set(0, "B")).unwrap();

        assert_eq!(record.modified, BTreeSet::from([0]));
        assert!(record.created.is_empty());
        assert!(pipeline.state().frame("df").unwrap().has_column("B"));
        assert!(!pipeline.initial_state().frame("df").unwrap().has_column("B"));
    }

    #[test]
    fn test_failed_step_changes_nothing() {
        let mut pipeline = Pipeline::new(registry(), initial_state());
        pipeline.apply("set_column", set(0, "B")).unwrap();
        let before = Arc::clone(pipeline.state());

        let err = pipeline.apply("set_column", set(7, "C")).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Execution { ref step_type, source: ExecutionError::MissingDataframe(7), .. }
                if step_type == "set_column"
        ));
        assert_eq!(pipeline.len(), 1);
        assert_eq!(pipeline.chunks().len(), 1);
        assert!(Arc::ptr_eq(&before, pipeline.state()));

        assert!(matches!(
            pipeline.apply("nope", Params::new()),
            Err(PipelineError::UnknownStepType(_))
        ));
    }

    #[test]
    fn test_eager_merge_only_for_matching_params() {
        let mut pipeline = Pipeline::new(registry(), initial_state());
        pipeline.apply("set_column", set(0, "B")).unwrap();
        pipeline.apply("set_column", set(0, "C")).unwrap();
        assert_eq!(pipeline.chunks().len(), 1);

        pipeline.apply("set_column", set(1, "Y")).unwrap();
        assert_eq!(pipeline.chunks().len(), 2);

        let code = pipeline.code();
        assert_eq!(
            code,
            vec![
                "import pandas as pd",
                "",
                "# Set B, C",
                "df['B'] = 0",
                "df['C'] = 0",
                "",
                "# Set Y",
                "other['Y'] = 0",
            ]
        );
    }

    #[test]
    fn test_disabled_merge_keeps_every_chunk() {
        let mut pipeline =
            Pipeline::new(registry(), initial_state()).with_merge_policy(MergePolicy::Disabled);
        pipeline.apply("set_column", set(0, "B")).unwrap();
        pipeline.apply("set_column", set(0, "C")).unwrap();
        assert_eq!(pipeline.chunks().len(), 2);
    }

    #[test]
    fn test_undo_and_clear() {
        let mut pipeline = Pipeline::new(registry(), initial_state());
        pipeline.apply("set_column", set(0, "B")).unwrap();
        pipeline.apply("set_column", set(0, "C")).unwrap();

        let undone = pipeline.undo().unwrap();
        assert_eq!(undone.params["column_header"], Value::from("C"));
        assert_eq!(pipeline.chunks().len(), 1);
        assert!(!pipeline.state().frame("df").unwrap().has_column("C"));

        pipeline.clear();
        assert!(pipeline.is_empty());
        assert!(pipeline.code().is_empty());
        assert!(pipeline.undo().is_none());
    }

    #[test]
    fn test_set_initial_state_replays() {
        let mut pipeline = Pipeline::new(registry(), initial_state());
        pipeline.apply("set_column", set(1, "Y")).unwrap();

        let replacement = State::new()
            .with_frame("df", Frame::new())
            .with_frame("fresh", Frame::from_columns([("Z", vec![Value::Int(5)])]).unwrap());
        pipeline.set_initial_state(replacement).unwrap();

        let fresh = pipeline.state().frame("fresh").unwrap();
        assert_eq!(fresh.column("Y"), Some(&[Value::Int(0)][..]));

        // Only one dataframe: the step on sheet 1 cannot replay.
        let err = pipeline
            .set_initial_state(State::new().with_frame("df", Frame::new()))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Replay { index: 0, .. }));
        assert!(pipeline.initial_state().frame("fresh").is_some());
    }

    #[test]
    fn test_input_sources_make_script_self_contained() {
        let dir = std::env::temp_dir().join("stepsheet_pipeline_sources");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("input.csv");
        std::fs::write(&path, "A\n1\n2\n").unwrap();
        let path = path.to_string_lossy().into_owned();

        let state = State::new().with_frame("df", Frame::read_csv(&path).unwrap());
        let mut pipeline =
            Pipeline::new(registry(), state).with_input_sources([("df", path.as_str())]);
        assert_eq!(
            pipeline.code(),
            vec![
                SCRIPT_HEADER.to_string(),
                String::new(),
                "# Read input data".to_string(),
                format!("df = pd.read_csv(r'{path}')"),
            ]
        );

        pipeline.apply("set_column", set(0, "B")).unwrap();
        let replayed = crate::script::run_script(&State::new(), &pipeline.script()).unwrap();
        assert_eq!(replayed.state, **pipeline.state());

        pipeline.set_initial_state(initial_state()).unwrap();
        assert!(pipeline.input_sources().is_empty());
    }

    #[test]
    fn test_steps_touching() {
        let mut pipeline = Pipeline::new(registry(), initial_state());
        pipeline.apply("set_column", set(0, "B")).unwrap();
        pipeline.apply("set_column", set(1, "Y")).unwrap();
        pipeline.apply("set_column", set(0, "C")).unwrap();

        assert_eq!(pipeline.steps_touching(0), vec![0, 2]);
        assert_eq!(pipeline.steps_touching(1), vec![1]);
        assert!(pipeline.steps_touching(5).is_empty());
    }

    #[test]
    fn test_analysis_roundtrip_and_version_check() {
        let mut pipeline = Pipeline::new(registry(), initial_state());
        pipeline.apply("set_column", set(0, "B")).unwrap();
        let mut analysis = pipeline.to_analysis("demo");

        let loaded =
            Pipeline::from_analysis(registry(), &analysis, initial_state(), MergePolicy::Eager)
                .unwrap();
        assert_eq!(loaded.state(), pipeline.state());

        analysis.steps[0].step_version = 9;
        let err = Pipeline::from_analysis(registry(), &analysis, initial_state(), MergePolicy::Eager)
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::VersionMismatch { saved: 9, current: 1, .. }
        ));
    }

    #[test]
    fn test_resolve_indexes_replaces_new_marker() {
        let prev = initial_state();
        let post = prev.clone().with_frame("df_copy", Frame::new());

        let (modified, created) = resolve_indexes(
            &prev,
            &post,
            &BTreeSet::new(),
            &BTreeSet::from([NEW_DATAFRAME_INDEX]),
        );
        assert!(modified.is_empty());
        assert_eq!(created, BTreeSet::from([2]));
    }

    #[test]
    fn test_duplicate_registration_surfaces() {
        let mut registry = Registry::new();
        registry.register(SetColumn).unwrap();
        assert!(matches!(
            registry.register(SetColumn),
            Err(RegistryError::Duplicate(_))
        ));
    }

    #[test]
    fn test_merge_policy_from_str() {
        assert_eq!("Eager".parse::<MergePolicy>(), Ok(MergePolicy::Eager));
        assert_eq!("disabled".parse::<MergePolicy>(), Ok(MergePolicy::Disabled));
        assert!("sometimes".parse::<MergePolicy>().is_err());
    }
}
