//! Cross-step properties: generated code reproduces execution, merging keeps
//! that true, and the pipeline stitches it all into one script.

use std::sync::Arc;
use stepsheet::{
    Analysis, Frame, MergePolicy, Params, ParamsExt, Pipeline, SCRIPT_HEADER, State, Value,
    run_script,
};
use stepsheet_steps::default_registry;

fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().map(|n| Value::Int(*n)).collect()
}

fn initial_state() -> State {
    let df = Frame::from_columns([
        ("A", ints(&[1, 2, 3])),
        ("B", ints(&[4, 5, 6])),
        ("C", ints(&[7, 8, 9])),
    ])
    .unwrap();
    State::new().with_frame("df", df)
}

fn pipeline(policy: MergePolicy) -> Pipeline {
    Pipeline::new(Arc::new(default_registry().unwrap()), initial_state()).with_merge_policy(policy)
}

fn write_csv(name: &str, contents: &str) -> String {
    let dir = std::env::temp_dir().join("stepsheet_steps_it");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path.to_string_lossy().into_owned()
}

fn add(header: &str, index: i64) -> Params {
    Params::new()
        .with("sheet_index", 0i64)
        .with("column_header", header)
        .with("column_header_index", index)
}

fn rename(old: &str, new: &str) -> Params {
    Params::new()
        .with("sheet_index", 0i64)
        .with("old_column_header", old)
        .with("new_column_header", new)
}

fn delete(headers: Vec<&str>) -> Params {
    Params::new()
        .with("sheet_index", 0i64)
        .with("column_headers", headers)
}

fn ai(user_input: &str, code: &str) -> Params {
    Params::new()
        .with("user_input", user_input)
        .with("edited_completion", code)
}

/// Every kind of step, in an order where each one applies.
fn every_step() -> Vec<(&'static str, Params)> {
    let path = write_csv("orders.csv", "id,amount\n1,10\n2,20\n");
    vec![
        ("add_column", add("D", -1)),
        ("rename_column", rename("A", "X")),
        ("delete_column", delete(vec!["B"])),
        ("dataframe_duplicate", Params::new().with("sheet_index", 0i64)),
        ("simple_import", Params::new().with("file_names", vec![path])),
        ("ai_transformation", ai("double C", "df['C'] = df['C'] * 2")),
    ]
}

/// Run the generated script from the initial state.
fn run_generated(pipeline: &Pipeline) -> State {
    run_script(pipeline.initial_state(), &pipeline.script())
        .unwrap()
        .state
}

#[test]
fn test_each_chunk_reproduces_its_step() {
    let mut pipeline = pipeline(MergePolicy::Disabled);
    for (step_type, params) in every_step() {
        let record = pipeline.apply(step_type, params).unwrap().clone();
        let chunk = pipeline.chunks().last().unwrap();

        let code = chunk.transpile().join("\n");
        let replayed = run_script(&record.prev_state, &code).unwrap().state;
        assert_eq!(replayed, *record.post_state, "{step_type} code diverged:\n{code}");
    }
}

#[test]
fn test_generated_script_reproduces_pipeline() {
    for policy in [MergePolicy::Eager, MergePolicy::Disabled] {
        let mut pipeline = pipeline(policy);
        for (step_type, params) in every_step() {
            pipeline.apply(step_type, params).unwrap();
        }
        assert_eq!(run_generated(&pipeline), **pipeline.state(), "policy {policy:?}");
    }
}

#[test]
fn test_merged_column_steps_reproduce_pipeline() {
    let mut pipeline = pipeline(MergePolicy::Eager);
    pipeline.apply("rename_column", rename("A", "X")).unwrap();
    pipeline.apply("rename_column", rename("X", "Y")).unwrap();
    pipeline.apply("rename_column", rename("B", "A")).unwrap();
    pipeline.apply("delete_column", delete(vec!["C"])).unwrap();
    pipeline.apply("delete_column", delete(vec!["Y"])).unwrap();

    assert_eq!(pipeline.len(), 5);
    assert_eq!(pipeline.chunks().len(), 2);
    assert_eq!(
        pipeline.code(),
        vec![
            SCRIPT_HEADER,
            "",
            "# Renamed A to Y, B to A in df",
            "df.rename(columns={'A': 'Y', 'B': 'A'}, inplace=True)",
            "",
            "# Deleted columns C, Y",
            "df.drop(['C', 'Y'], axis=1, inplace=True)",
        ]
    );
    assert_eq!(run_generated(&pipeline), **pipeline.state());
}

#[test]
fn test_different_kinds_do_not_merge() {
    let mut pipeline = pipeline(MergePolicy::Eager);
    pipeline.apply("delete_column", delete(vec!["C"])).unwrap();
    pipeline.apply("add_column", add("C", -1)).unwrap();
    pipeline.apply("delete_column", delete(vec!["A"])).unwrap();

    let kinds: Vec<_> = pipeline.chunks().iter().map(|c| c.chunk_type()).collect();
    assert_eq!(kinds, vec!["delete_column", "add_column", "delete_column"]);
}

#[test]
fn test_import_of_reserved_file_names_keeps_script_runnable() {
    let pd = write_csv("pd.csv", "id\n1\n2\n");
    let none = write_csv("None.csv", "id\n3\n");
    let mut pipeline = pipeline(MergePolicy::Eager);
    pipeline
        .apply("simple_import", Params::new().with("file_names", vec![pd, none]))
        .unwrap();
    pipeline
        .apply("ai_transformation", ai("bump ids", "pd_df['id'] = pd_df['id'] + 1"))
        .unwrap();

    let names: Vec<_> = pipeline.state().df_names().collect();
    assert_eq!(names, vec!["df", "pd_df", "None_df"]);
    assert_eq!(run_generated(&pipeline), **pipeline.state());
}

#[test]
fn test_ai_transformation_scenario() {
    let df = Frame::from_columns([("A", ints(&[1, 2, 3]))]).unwrap();
    let mut pipeline = Pipeline::new(
        Arc::new(default_registry().unwrap()),
        State::new().with_frame("df", df),
    );

    let record = pipeline
        .apply("ai_transformation", ai("double column A", "df['A'] = df['A'] * 2"))
        .unwrap();
    assert_eq!(
        record.post_state.frame("df").unwrap().column("A"),
        Some(ints(&[2, 4, 6]).as_slice())
    );

    let data = serde_json::to_value(record.execution_data.as_ref().unwrap()).unwrap();
    assert_eq!(data["last_line_is_dataframe"], serde_json::json!(false));
    assert_eq!(data["result"]["last_line_value"], serde_json::Value::Null);

    assert_eq!(
        pipeline.code(),
        vec![SCRIPT_HEADER, "", "# double column A", "df['A'] = df['A'] * 2"]
    );
}

#[test]
fn test_undo_then_replay_from_analysis() {
    let mut pipeline = pipeline(MergePolicy::Eager);
    for (step_type, params) in every_step() {
        pipeline.apply(step_type, params).unwrap();
    }
    pipeline.undo().unwrap();

    let analysis = pipeline.to_analysis("cleanup");
    let yaml = analysis.to_bytes("yaml").unwrap();
    let loaded = Analysis::from_bytes_format(&yaml, "yaml").unwrap();

    let rebuilt = Pipeline::from_analysis(
        Arc::new(default_registry().unwrap()),
        &loaded,
        initial_state(),
        MergePolicy::Eager,
    )
    .unwrap();
    assert_eq!(rebuilt.state(), pipeline.state());
    assert_eq!(rebuilt.code(), pipeline.code());
}
