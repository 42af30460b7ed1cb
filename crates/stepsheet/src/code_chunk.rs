//! Code chunks: the generated-code side of a step.

use crate::state::State;
use crate::value::{ExecutionData, Params, Value};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Inputs shared by every code chunk.
///
/// States are shared with the step log; a chunk never owns them exclusively.
#[derive(Debug, Clone)]
pub struct ChunkContext {
    pub prev_state: Arc<State>,
    pub post_state: Arc<State>,
    pub params: Params,
    pub execution_data: Option<ExecutionData>,
}

impl ChunkContext {
    pub fn new(
        prev_state: Arc<State>,
        post_state: Arc<State>,
        params: Params,
        execution_data: Option<ExecutionData>,
    ) -> Self {
        Self {
            prev_state,
            post_state,
            params,
            execution_data,
        }
    }

    /// Look up a param. A missing key is `None`, never an error.
    pub fn get_param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// Look up an execution data entry. `None` when the key is missing or the
    /// step produced no execution data at all.
    pub fn get_execution_data(&self, key: &str) -> Option<&Value> {
        self.execution_data.as_ref()?.get(key)
    }

    /// Whether both contexts agree on every key in `keys`. A key absent on
    /// both sides counts as equal.
    pub fn params_match(&self, other: &ChunkContext, keys: &[&str]) -> bool {
        keys.iter()
            .all(|key| self.get_param(key) == other.get_param(key))
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.get_param(key).and_then(Value::as_str)
    }

    pub fn param_i64(&self, key: &str) -> Option<i64> {
        self.get_param(key).and_then(Value::as_i64)
    }

    /// Name of the dataframe at the `sheet_index` param, as it was before the step.
    pub fn sheet_name(&self) -> Option<&str> {
        let index = usize::try_from(self.param_i64("sheet_index")?).ok()?;
        self.prev_state.frame_at(index).map(|(name, _)| name)
    }

    /// Context for a chunk covering `self` followed by `right`.
    pub fn spanning(&self, right: &ChunkContext, params: Params) -> ChunkContext {
        ChunkContext {
            prev_state: Arc::clone(&self.prev_state),
            post_state: Arc::clone(&right.post_state),
            params,
            execution_data: None,
        }
    }
}

/// The code-generating half of a step.
///
/// A chunk turns one prev→post state transition into source lines that
/// reproduce it, and may absorb an adjacent chunk of the same kind so the
/// generated script stays short.
pub trait CodeChunk: fmt::Debug + Send + Sync {
    fn context(&self) -> &ChunkContext;

    /// Stable identifier of the chunk kind. Only chunks of the same type
    /// are offered to each other for merging.
    fn chunk_type(&self) -> &'static str;

    /// Short human-readable name, e.g. "Added column".
    fn display_name(&self) -> String;

    /// One-line description rendered as a comment above the chunk's code.
    fn description_comment(&self) -> String;

    /// Source lines reproducing the transition from `prev_state` to `post_state`.
    fn transpile(&self) -> Vec<String>;

    /// Merge `other`, which directly follows `self` in the log, into a single
    /// chunk. `None` means the pair must stay separate.
    fn combine_right(&self, other: &dyn CodeChunk) -> Option<Box<dyn CodeChunk>> {
        let _ = other;
        None
    }

    fn as_any(&self) -> &dyn Any;

    fn get_param(&self, key: &str) -> Option<&Value> {
        self.context().get_param(key)
    }

    fn get_execution_data(&self, key: &str) -> Option<&Value> {
        self.context().get_execution_data(key)
    }

    fn params_match(&self, other: &dyn CodeChunk, keys: &[&str]) -> bool {
        self.context().params_match(other.context(), keys)
    }
}

/// Downcast a chunk to a concrete chunk type.
pub fn downcast<T: CodeChunk + 'static>(chunk: &dyn CodeChunk) -> Option<&T> {
    chunk.as_any().downcast_ref::<T>()
}

// ============================================================================
// Rendering values as source literals
// ============================================================================

/// Render a string as a single-quoted literal.
pub fn py_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Render a file path, preferring a raw string so Windows paths stay readable.
pub fn py_path(path: &str) -> String {
    let raw_safe = !path.contains(['\'', '\n', '\r']) && !path.ends_with('\\');
    if raw_safe {
        format!("r'{path}'")
    } else {
        py_str(path)
    }
}

/// Render a value as a source literal.
pub fn py_literal(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(f) if f.is_nan() => "float('nan')".to_string(),
        Value::Float(f) if f.is_infinite() => {
            let sign = if *f < 0.0 { "-" } else { "" };
            format!("{sign}float('inf')")
        }
        Value::Float(_) => value.to_string(),
        Value::String(s) => py_str(s),
        Value::Array(items) => format!("[{}]", py_list(items.iter())),
        Value::Object(object) => {
            let entries = object
                .iter()
                .map(|(key, value)| format!("{}: {}", py_str(key), py_literal(value)))
                .collect::<Vec<_>>();
            format!("{{{}}}", entries.join(", "))
        }
    }
}

/// Comma-separated literals, without brackets.
pub fn py_list<'a>(items: impl Iterator<Item = &'a Value>) -> String {
    items.map(py_literal).collect::<Vec<_>>().join(", ")
}

/// A list literal of strings, e.g. `['A', 'B']`.
pub fn py_str_list<S: AsRef<str>>(items: &[S]) -> String {
    let quoted = items
        .iter()
        .map(|item| py_str(item.as_ref()))
        .collect::<Vec<_>>();
    format!("[{}]", quoted.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::value::ParamsExt;

    fn context(params: Params, execution_data: Option<ExecutionData>) -> ChunkContext {
        let state = Arc::new(State::new().with_frame("df", Frame::new()));
        ChunkContext::new(Arc::clone(&state), state, params, execution_data)
    }

    #[test]
    fn test_absent_lookups_are_none() {
        let ctx = context(Params::new().with("sheet_index", 0i64), None);

        assert_eq!(ctx.get_param("missing"), None);
        assert_eq!(ctx.get_execution_data("anything"), None);

        let ctx = context(Params::new(), Some(ExecutionData::new().with("time", 0.5)));
        assert_eq!(ctx.get_execution_data("missing"), None);
        assert_eq!(ctx.get_execution_data("time"), Some(&Value::Float(0.5)));
    }

    #[test]
    fn test_params_match() {
        let left = context(Params::new().with("sheet_index", 0i64).with("x", 1i64), None);
        let right = context(Params::new().with("sheet_index", 0i64).with("x", 2i64), None);

        assert!(left.params_match(&right, &["sheet_index"]));
        assert!(!left.params_match(&right, &["sheet_index", "x"]));
        // absent on both sides
        assert!(left.params_match(&right, &["nope"]));
    }

    #[test]
    fn test_sheet_name() {
        let ctx = context(Params::new().with("sheet_index", 0i64), None);
        assert_eq!(ctx.sheet_name(), Some("df"));

        let ctx = context(Params::new().with("sheet_index", 3i64), None);
        assert_eq!(ctx.sheet_name(), None);
    }

    #[test]
    fn test_literals() {
        assert_eq!(py_str("it's"), r"'it\'s'");
        assert_eq!(py_literal(&Value::Float(2.0)), "2.0");
        assert_eq!(py_literal(&Value::Null), "None");
        assert_eq!(py_str_list(&["A", "B"]), "['A', 'B']");
        assert_eq!(py_path(r"C:\data\x.csv"), r"r'C:\data\x.csv'");
        assert_eq!(py_path(r"C:\data\"), r"'C:\\data\\'");

        let mapping = Value::Object(
            [("A".to_string(), Value::from("B"))].into_iter().collect(),
        );
        assert_eq!(py_literal(&mapping), "{'A': 'B'}");
    }
}
