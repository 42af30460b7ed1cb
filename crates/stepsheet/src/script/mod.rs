//! Script interpreter for pandas-flavoured transformation code.
//!
//! Runs the line-oriented subset of Python that generated code and
//! user-edited completions are written in: one statement per line, with
//! dataframes, series and scalars as values. Every dataframe bound to a
//! name lives in the interpreter's [`State`]. Other values are
//! script-local and discarded afterwards.
//!
//! ```
//! use stepsheet::{Frame, State, Value, script::run_script};
//!
//! let df = Frame::from_columns([("A", vec![Value::Int(1), Value::Int(2)])]).unwrap();
//! let state = State::new().with_frame("df", df);
//!
//! let outcome = run_script(&state, "df['B'] = df['A'] + 10").unwrap();
//! let b = outcome.state.frame("df").unwrap().column("B").unwrap();
//! assert_eq!(b, &[Value::Int(11), Value::Int(12)]);
//! ```

mod eval;
mod lexer;
mod parser;

pub use eval::Interpreter;

use crate::frame::{Frame, FrameError};
use crate::state::State;
use crate::value::Value;

/// A script failure, tagged with the 1-based line it happened on.
#[derive(Debug, thiserror::Error)]
#[error("line {line}: {kind}")]
pub struct ScriptError {
    pub line: usize,
    pub kind: ScriptErrorKind,
}

#[derive(Debug, thiserror::Error)]
pub enum ScriptErrorKind {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("name {0:?} is not defined")]
    UnknownName(String),

    #[error("key not found: {0:?}")]
    Key(String),

    #[error("type error: {0}")]
    Type(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// A value produced while running a script.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Scalar(Value),
    Series(Vec<Value>),
    Frame(Frame),
    Module(String),
}

impl ScriptValue {
    pub fn kind(&self) -> &'static str {
        match self {
            ScriptValue::Scalar(v) => v.kind(),
            ScriptValue::Series(_) => "Series",
            ScriptValue::Frame(_) => "DataFrame",
            ScriptValue::Module(_) => "module",
        }
    }

    pub fn as_frame(&self) -> Option<&Frame> {
        match self {
            ScriptValue::Frame(frame) => Some(frame),
            _ => None,
        }
    }

    /// The value if it is a primitive scalar (string, bool, int or float).
    pub fn primitive(&self) -> Option<&Value> {
        match self {
            ScriptValue::Scalar(v) if v.is_primitive() => Some(v),
            _ => None,
        }
    }
}

/// The bare expression a script ended with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastExpression {
    /// 1-based line number.
    pub line: usize,
    /// Source text of the line, trimmed.
    pub source: String,
    /// The expression is just a name, e.g. `df`.
    pub is_name: bool,
}

/// Result of running a script.
#[derive(Debug, Clone)]
pub struct ScriptOutcome {
    pub state: State,
    /// Value of the final statement, if it was an expression.
    pub last_value: Option<ScriptValue>,
    pub last_expression: Option<LastExpression>,
}

/// Run `source` against a copy of `state`.
pub fn run_script(state: &State, source: &str) -> Result<ScriptOutcome, ScriptError> {
    Interpreter::new(state.clone()).run(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().map(|n| Value::Int(*n)).collect()
    }

    fn state_with_a(values: &[i64]) -> State {
        State::new().with_frame("df", Frame::from_columns([("A", ints(values))]).unwrap())
    }

    #[test]
    fn test_doubling_a_column() {
        let outcome = run_script(&state_with_a(&[1, 2, 3]), "df['A'] = df['A'] * 2").unwrap();

        assert_eq!(
            outcome.state.frame("df").unwrap().column("A"),
            Some(ints(&[2, 4, 6]).as_slice())
        );
        assert!(outcome.last_value.is_none());
        assert!(outcome.last_expression.is_none());
    }

    #[test]
    fn test_last_expression_is_reported() {
        let source = "import pandas as pd\n\ntotal = df['A'].sum()\ntotal\n";
        let outcome = run_script(&state_with_a(&[1, 2, 3]), source).unwrap();

        assert_eq!(outcome.last_value, Some(ScriptValue::Scalar(Value::Int(6))));
        let last = outcome.last_expression.unwrap();
        assert_eq!(last.line, 4);
        assert!(last.is_name);
    }

    #[test]
    fn test_error_carries_line_number() {
        let source = "x = 1\ny = missing + 1";
        let err = run_script(&state_with_a(&[1]), source).unwrap_err();

        assert_eq!(err.line, 2);
        assert!(matches!(err.kind, ScriptErrorKind::UnknownName(ref name) if name == "missing"));
        assert_eq!(err.to_string(), "line 2: name \"missing\" is not defined");
    }

    #[test]
    fn test_input_state_is_untouched() {
        let state = state_with_a(&[1]);
        run_script(&state, "df['B'] = 5\nother = df.copy()").unwrap();

        assert_eq!(state.len(), 1);
        assert!(!state.frame("df").unwrap().has_column("B"));
    }

    #[test]
    fn test_primitive_classification() {
        assert_eq!(ScriptValue::Scalar(Value::from("x")).primitive(), Some(&Value::from("x")));
        assert_eq!(ScriptValue::Scalar(Value::Null).primitive(), None);
        assert_eq!(ScriptValue::Series(ints(&[1])).primitive(), None);
        assert_eq!(ScriptValue::Frame(Frame::new()).kind(), "DataFrame");
    }
}
