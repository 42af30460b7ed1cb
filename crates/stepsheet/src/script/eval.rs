//! Statement execution and expression evaluation.

use super::parser::{BinOp, Expr, Stmt, Target, UnaryOp, parse_line};
use super::{LastExpression, ScriptError, ScriptErrorKind, ScriptOutcome, ScriptValue};
use crate::frame::Frame;
use crate::state::State;
use crate::value::Value;
use indexmap::IndexMap;
use std::cmp::Ordering;

type EvalResult<T> = Result<T, ScriptErrorKind>;

/// Executes scripts against a [`State`], one statement at a time.
///
/// `pd` is bound to pandas before the first line runs, so snippets that
/// omit the import still work.
#[derive(Debug, Clone)]
pub struct Interpreter {
    state: State,
    locals: IndexMap<String, ScriptValue>,
}

impl Interpreter {
    pub fn new(state: State) -> Self {
        let mut locals = IndexMap::new();
        locals.insert("pd".to_string(), ScriptValue::Module("pandas".into()));
        Self { state, locals }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// A script-local (non-dataframe) variable.
    pub fn local(&self, name: &str) -> Option<&ScriptValue> {
        self.locals.get(name)
    }

    /// Run every line of `source`, consuming the interpreter.
    pub fn run(mut self, source: &str) -> Result<ScriptOutcome, ScriptError> {
        let mut last_value = None;
        let mut last_expression = None;

        for (i, raw) in source.lines().enumerate() {
            let line = i + 1;
            let stmt = parse_line(raw).map_err(|kind| ScriptError { line, kind })?;
            let Some(stmt) = stmt else {
                continue;
            };
            let is_name = matches!(stmt, Stmt::Expr(Expr::Name(_)));

            match self.exec(stmt).map_err(|kind| ScriptError { line, kind })? {
                Some(value) => {
                    last_value = Some(value);
                    last_expression = Some(LastExpression {
                        line,
                        source: raw.trim().to_string(),
                        is_name,
                    });
                }
                None => {
                    last_value = None;
                    last_expression = None;
                }
            }
        }

        Ok(ScriptOutcome {
            state: self.state,
            last_value,
            last_expression,
        })
    }

    fn exec(&mut self, stmt: Stmt) -> EvalResult<Option<ScriptValue>> {
        match stmt {
            Stmt::Import { module, alias } => {
                if module != "pandas" {
                    return Err(ScriptErrorKind::Unsupported(format!("module {module:?}")));
                }
                self.locals.insert(alias, ScriptValue::Module(module));
                Ok(None)
            }
            Stmt::Assign { target, value } => {
                let value = self.eval(&value)?;
                self.assign(target, value)?;
                Ok(None)
            }
            Stmt::Del(target) => {
                self.delete(target)?;
                Ok(None)
            }
            Stmt::Expr(expr) => self.eval(&expr).map(Some),
        }
    }

    fn assign(&mut self, target: Target, value: ScriptValue) -> EvalResult<()> {
        match target {
            Target::Name(name) => match value {
                ScriptValue::Frame(frame) => {
                    self.locals.shift_remove(&name);
                    self.state.insert_frame(name, frame);
                }
                other => {
                    self.state.remove_frame(&name);
                    self.locals.insert(name, other);
                }
            },
            Target::Column { frame, column } => {
                let column = column_name(self.eval(&column)?)?;
                let df = self
                    .state
                    .frame_mut(&frame)
                    .ok_or(ScriptErrorKind::UnknownName(frame))?;
                let values = into_column_values(value, df.num_rows())?;
                df.set_column(column, values)?;
            }
        }
        Ok(())
    }

    fn delete(&mut self, target: Target) -> EvalResult<()> {
        match target {
            Target::Name(name) => {
                let removed = self.state.remove_frame(&name).is_some()
                    || self.locals.shift_remove(&name).is_some();
                if !removed {
                    return Err(ScriptErrorKind::UnknownName(name));
                }
            }
            Target::Column { frame, column } => {
                let column = column_name(self.eval(&column)?)?;
                let df = self
                    .state
                    .frame_mut(&frame)
                    .ok_or(ScriptErrorKind::UnknownName(frame))?;
                df.drop_column(&column)?;
            }
        }
        Ok(())
    }

    fn lookup(&self, name: &str) -> EvalResult<ScriptValue> {
        if let Some(frame) = self.state.frame(name) {
            return Ok(ScriptValue::Frame(frame.clone()));
        }
        self.locals
            .get(name)
            .cloned()
            .ok_or_else(|| ScriptErrorKind::UnknownName(name.to_string()))
    }

    fn eval(&mut self, expr: &Expr) -> EvalResult<ScriptValue> {
        match expr {
            Expr::Literal(v) => Ok(ScriptValue::Scalar(v.clone())),
            Expr::Name(name) => self.lookup(name),
            Expr::List(items) => {
                let values = items
                    .iter()
                    .map(|item| self.eval(item).and_then(into_scalar))
                    .collect::<EvalResult<Vec<_>>>()?;
                Ok(ScriptValue::Scalar(Value::Array(values)))
            }
            Expr::Dict(entries) => {
                let mut object = IndexMap::with_capacity(entries.len());
                for (key, value) in entries {
                    let key = column_name(self.eval(key)?)?;
                    let value = match self.eval(value)? {
                        // a series inside a dict literal is kept as a plain list
                        ScriptValue::Series(values) => Value::Array(values),
                        other => into_scalar(other)?,
                    };
                    object.insert(key, value);
                }
                Ok(ScriptValue::Scalar(Value::Object(object)))
            }
            Expr::Unary { op, operand } => {
                let operand = self.eval(operand)?;
                unary(*op, operand)
            }
            Expr::Binary {
                op: op @ (BinOp::And | BinOp::Or),
                left,
                right,
            } => {
                let left = self.eval(left)?;
                let ScriptValue::Scalar(ref value) = left else {
                    return Err(ambiguous_truth(&left));
                };
                let short_circuit = truthy(value) == (*op == BinOp::Or);
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(right)
                }
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binary(*op, left, right)
            }
            Expr::Index { target, index } => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                subscript(target, index)
            }
            Expr::Attribute { target, name } => {
                let target = self.eval(target)?;
                attribute(target, name)
            }
            Expr::Call { func, args, kwargs } => {
                let args = self.eval_args(args, kwargs)?;
                match func.as_ref() {
                    Expr::Attribute { target, name } => self.call_method(target, name, args),
                    Expr::Name(name) => call_builtin(name, args),
                    _ => Err(ScriptErrorKind::Type("expression is not callable".into())),
                }
            }
        }
    }

    fn eval_args(&mut self, args: &[Expr], kwargs: &[(String, Expr)]) -> EvalResult<Args> {
        let positional = args
            .iter()
            .map(|arg| self.eval(arg))
            .collect::<EvalResult<Vec<_>>>()?;
        let mut keywords = IndexMap::with_capacity(kwargs.len());
        for (name, arg) in kwargs {
            keywords.insert(name.clone(), self.eval(arg)?);
        }
        Ok(Args {
            positional,
            keywords,
        })
    }

    fn call_method(&mut self, target: &Expr, method: &str, args: Args) -> EvalResult<ScriptValue> {
        // In-place dataframe methods write through to the named dataframe.
        if let Expr::Name(name) = target {
            if self.state.frame(name).is_some() && mutates_in_place(method, &args)? {
                let df = self
                    .state
                    .frame_mut(name)
                    .ok_or_else(|| ScriptErrorKind::UnknownName(name.clone()))?;
                mutate_frame(df, method, &args)?;
                return Ok(ScriptValue::Scalar(Value::Null));
            }
        }

        match self.eval(target)? {
            ScriptValue::Frame(mut frame) => {
                if mutates_in_place(method, &args)? {
                    mutate_frame(&mut frame, method, &args)?;
                    return Ok(ScriptValue::Scalar(Value::Null));
                }
                frame_method(frame, method, &args)
            }
            ScriptValue::Series(values) => series_method(values, method, &args),
            ScriptValue::Module(module) => module_function(&module, method, &args),
            ScriptValue::Scalar(value) => scalar_method(value, method, &args),
        }
    }
}

// ============================================================================
// Arguments
// ============================================================================

struct Args {
    positional: Vec<ScriptValue>,
    keywords: IndexMap<String, ScriptValue>,
}

impl Args {
    /// Argument by position, falling back to its keyword name.
    fn get(&self, index: usize, name: &str) -> Option<&ScriptValue> {
        self.positional.get(index).or_else(|| self.keywords.get(name))
    }

    fn required(&self, index: usize, name: &str) -> EvalResult<&ScriptValue> {
        self.get(index, name)
            .ok_or_else(|| ScriptErrorKind::Type(format!("missing required argument {name:?}")))
    }

    fn scalar(&self, index: usize, name: &str) -> EvalResult<Option<&Value>> {
        match self.get(index, name) {
            None => Ok(None),
            Some(ScriptValue::Scalar(v)) => Ok(Some(v)),
            Some(other) => Err(ScriptErrorKind::Type(format!(
                "argument {name:?} must be a scalar, not {}",
                other.kind()
            ))),
        }
    }

    fn int(&self, index: usize, name: &str) -> EvalResult<Option<i64>> {
        match self.scalar(index, name)? {
            None => Ok(None),
            Some(Value::Int(n)) => Ok(Some(*n)),
            Some(other) => Err(ScriptErrorKind::Type(format!(
                "argument {name:?} must be an int, not {}",
                other.kind()
            ))),
        }
    }

    /// Keyword-only boolean flag such as `inplace=True`.
    fn flag(&self, name: &str) -> EvalResult<bool> {
        match self.keywords.get(name) {
            None => Ok(false),
            Some(ScriptValue::Scalar(v)) => Ok(truthy(v)),
            Some(other) => Err(ambiguous_truth(other)),
        }
    }
}

// ============================================================================
// Dataframes
// ============================================================================

fn mutates_in_place(method: &str, args: &Args) -> EvalResult<bool> {
    Ok(match method {
        "insert" => true,
        "rename" | "drop" | "reset_index" | "fillna" => args.flag("inplace")?,
        _ => false,
    })
}

fn mutate_frame(frame: &mut Frame, method: &str, args: &Args) -> EvalResult<()> {
    match method {
        "insert" => {
            let loc = args
                .int(0, "loc")?
                .ok_or_else(|| ScriptErrorKind::Type("missing required argument \"loc\"".into()))?;
            if loc < 0 || loc as usize > frame.num_columns() {
                return Err(ScriptErrorKind::Type(format!(
                    "insert location {loc} is out of bounds"
                )));
            }
            let column = column_name(args.required(1, "column")?.clone())?;
            let values = into_column_values(args.required(2, "value")?.clone(), frame.num_rows())?;
            frame.insert_column(loc as usize, column, values)?;
        }
        "rename" => {
            let Some(ScriptValue::Scalar(Value::Object(columns))) = args.keywords.get("columns")
            else {
                return Err(ScriptErrorKind::Type(
                    "rename expects columns={old: new}".into(),
                ));
            };
            let mapping = columns
                .iter()
                .map(|(old, new)| match new {
                    Value::String(new) => Ok((old.clone(), new.clone())),
                    other => Err(ScriptErrorKind::Type(format!(
                        "new column name must be a str, not {}",
                        other.kind()
                    ))),
                })
                .collect::<EvalResult<IndexMap<_, _>>>()?;
            frame.rename_columns(&mapping)?;
        }
        "drop" => {
            let labels = match (args.get(0, "labels"), args.keywords.get("columns")) {
                (_, Some(columns)) => columns,
                (Some(labels), None) => {
                    let axis = args.scalar(1, "axis")?.cloned().unwrap_or(Value::Int(0));
                    if !matches!(axis, Value::Int(1)) && axis.as_str() != Some("columns") {
                        return Err(ScriptErrorKind::Unsupported(
                            "dropping rows; pass axis=1 or columns=[...]".into(),
                        ));
                    }
                    labels
                }
                (None, None) => {
                    return Err(ScriptErrorKind::Type("drop needs column labels".into()));
                }
            };
            for label in label_list(labels.clone())? {
                frame.drop_column(&label)?;
            }
        }
        // Frames carry no row index, so there is nothing to reset.
        "reset_index" => {}
        "fillna" => {
            let fill = into_scalar(args.required(0, "value")?.clone())?;
            let headers: Vec<String> = frame.column_headers().map(str::to_string).collect();
            for header in headers {
                let values = frame
                    .column(&header)
                    .map(|values| fill_nulls(values, &fill))
                    .unwrap_or_default();
                frame.set_column(header, values)?;
            }
        }
        other => {
            return Err(ScriptErrorKind::Unsupported(format!(
                "in-place DataFrame.{other}"
            )));
        }
    }
    Ok(())
}

fn frame_method(mut frame: Frame, method: &str, args: &Args) -> EvalResult<ScriptValue> {
    match method {
        "copy" => Ok(ScriptValue::Frame(frame)),
        "head" => {
            let n = args.int(0, "n")?.unwrap_or(5).max(0) as usize;
            Ok(ScriptValue::Frame(frame.head(n)))
        }
        "rename" | "drop" | "reset_index" | "fillna" => {
            mutate_frame(&mut frame, method, args)?;
            Ok(ScriptValue::Frame(frame))
        }
        other => Err(ScriptErrorKind::Unsupported(format!("DataFrame.{other}"))),
    }
}

fn module_function(module: &str, function: &str, args: &Args) -> EvalResult<ScriptValue> {
    match function {
        "read_csv" => {
            let path = args
                .scalar(0, "filepath_or_buffer")?
                .and_then(Value::as_str)
                .ok_or_else(|| ScriptErrorKind::Type("read_csv expects a path".into()))?;
            Ok(ScriptValue::Frame(Frame::read_csv(path)?))
        }
        "DataFrame" => {
            let columns = match args.scalar(0, "data")? {
                None => IndexMap::new(),
                Some(Value::Object(columns)) => columns.clone(),
                Some(other) => {
                    return Err(ScriptErrorKind::Type(format!(
                        "DataFrame expects a dict of columns, not {}",
                        other.kind()
                    )));
                }
            };
            let columns = columns
                .into_iter()
                .map(|(name, values)| match values {
                    Value::Array(values) => (name, values),
                    scalar => (name, vec![scalar]),
                })
                .collect::<Vec<_>>();
            Ok(ScriptValue::Frame(Frame::from_columns(columns)?))
        }
        other => Err(ScriptErrorKind::Unsupported(format!("{module}.{other}"))),
    }
}

fn attribute(target: ScriptValue, name: &str) -> EvalResult<ScriptValue> {
    match (&target, name) {
        (ScriptValue::Frame(frame), "columns") => Ok(ScriptValue::Scalar(Value::from(
            frame.column_headers().collect::<Vec<_>>(),
        ))),
        (ScriptValue::Frame(frame), "shape") => Ok(ScriptValue::Scalar(Value::from(vec![
            frame.num_rows(),
            frame.num_columns(),
        ]))),
        (ScriptValue::Frame(frame), "empty") => {
            Ok(ScriptValue::Scalar(Value::Bool(frame.num_rows() == 0)))
        }
        (ScriptValue::Series(values), "values") => {
            Ok(ScriptValue::Scalar(Value::Array(values.clone())))
        }
        _ => Err(ScriptErrorKind::Unsupported(format!(
            "attribute {name:?} of {}",
            target.kind()
        ))),
    }
}

// ============================================================================
// Series
// ============================================================================

fn series_method(values: Vec<Value>, method: &str, args: &Args) -> EvalResult<ScriptValue> {
    let present = || values.iter().filter(|v| !v.is_null());
    match method {
        "sum" => {
            let mut total = Value::Int(0);
            for value in present() {
                total = arithmetic(BinOp::Add, &total, value)?;
            }
            Ok(ScriptValue::Scalar(total))
        }
        "mean" => {
            let numbers = present()
                .map(|v| {
                    number(v).map(Number::to_f64).ok_or_else(|| {
                        ScriptErrorKind::Type(format!("cannot average {}", v.kind()))
                    })
                })
                .collect::<EvalResult<Vec<_>>>()?;
            let mean = if numbers.is_empty() {
                Value::Null
            } else {
                Value::Float(numbers.iter().sum::<f64>() / numbers.len() as f64)
            };
            Ok(ScriptValue::Scalar(mean))
        }
        "min" | "max" => {
            let wanted = if method == "min" {
                Ordering::Less
            } else {
                Ordering::Greater
            };
            let mut best: Option<&Value> = None;
            for value in present() {
                best = match best {
                    Some(current) if order(value, current)? != wanted => Some(current),
                    _ => Some(value),
                };
            }
            Ok(ScriptValue::Scalar(best.cloned().unwrap_or_default()))
        }
        "count" => Ok(ScriptValue::Scalar(Value::from(present().count()))),
        "fillna" => {
            let fill = into_scalar(args.required(0, "value")?.clone())?;
            Ok(ScriptValue::Series(fill_nulls(&values, &fill)))
        }
        "abs" => unary_numeric(ScriptValue::Series(values), absolute),
        "round" => {
            let decimals = args.int(0, "decimals")?.unwrap_or(0);
            let rounded = values
                .iter()
                .map(|v| round_value(v, Some(decimals)))
                .collect::<EvalResult<Vec<_>>>()?;
            Ok(ScriptValue::Series(rounded))
        }
        "copy" => Ok(ScriptValue::Series(values)),
        "tolist" => Ok(ScriptValue::Scalar(Value::Array(values))),
        other => Err(ScriptErrorKind::Unsupported(format!("Series.{other}"))),
    }
}

fn fill_nulls(values: &[Value], fill: &Value) -> Vec<Value> {
    values
        .iter()
        .map(|v| if v.is_null() { fill.clone() } else { v.clone() })
        .collect()
}

// ============================================================================
// Scalars and builtins
// ============================================================================

fn scalar_method(value: Value, method: &str, args: &Args) -> EvalResult<ScriptValue> {
    let Value::String(s) = &value else {
        return Err(ScriptErrorKind::Unsupported(format!(
            "{}.{method}",
            value.kind()
        )));
    };
    let result = match method {
        "upper" => s.to_uppercase(),
        "lower" => s.to_lowercase(),
        "strip" => s.trim().to_string(),
        "replace" => {
            let old = args.scalar(0, "old")?.and_then(Value::as_str);
            let new = args.scalar(1, "new")?.and_then(Value::as_str);
            match (old, new) {
                (Some(old), Some(new)) => s.replace(old, new),
                _ => return Err(ScriptErrorKind::Type("replace expects two strings".into())),
            }
        }
        other => return Err(ScriptErrorKind::Unsupported(format!("str.{other}"))),
    };
    Ok(ScriptValue::Scalar(Value::String(result)))
}

fn call_builtin(name: &str, args: Args) -> EvalResult<ScriptValue> {
    match name {
        "len" => {
            let len = match args.required(0, "obj")? {
                ScriptValue::Frame(frame) => frame.num_rows(),
                ScriptValue::Series(values) => values.len(),
                ScriptValue::Scalar(Value::String(s)) => s.chars().count(),
                ScriptValue::Scalar(Value::Array(items)) => items.len(),
                ScriptValue::Scalar(Value::Object(object)) => object.len(),
                other => {
                    return Err(ScriptErrorKind::Type(format!(
                        "object of type {} has no len()",
                        other.kind()
                    )));
                }
            };
            Ok(ScriptValue::Scalar(Value::from(len)))
        }
        "abs" => unary_numeric(args.required(0, "x")?.clone(), absolute),
        "round" => {
            let decimals = args.int(1, "ndigits")?;
            match args.required(0, "number")? {
                ScriptValue::Scalar(v) => round_value(v, decimals).map(ScriptValue::Scalar),
                ScriptValue::Series(values) => values
                    .iter()
                    .map(|v| round_value(v, Some(decimals.unwrap_or(0))))
                    .collect::<EvalResult<Vec<_>>>()
                    .map(ScriptValue::Series),
                other => Err(ScriptErrorKind::Type(format!("cannot round {}", other.kind()))),
            }
        }
        "str" => {
            let value = into_scalar(args.required(0, "object")?.clone())?;
            Ok(ScriptValue::Scalar(Value::String(value.to_string())))
        }
        "int" => {
            let value = into_scalar(args.required(0, "x")?.clone())?;
            let n = match &value {
                Value::Int(n) => Some(*n),
                Value::Bool(b) => Some(i64::from(*b)),
                Value::Float(f) if f.is_finite() => Some(f.trunc() as i64),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            };
            n.map(|n| ScriptValue::Scalar(Value::Int(n))).ok_or_else(|| {
                ScriptErrorKind::Type(format!("cannot convert {value:?} to int"))
            })
        }
        "float" => {
            let value = into_scalar(args.required(0, "x")?.clone())?;
            let f = match &value {
                Value::String(s) => s.trim().parse().ok(),
                other => number(other).map(Number::to_f64),
            };
            f.map(|f| ScriptValue::Scalar(Value::Float(f))).ok_or_else(|| {
                ScriptErrorKind::Type(format!("cannot convert {value:?} to float"))
            })
        }
        "print" => {
            tracing::debug!(args = args.positional.len(), "script print() ignored");
            Ok(ScriptValue::Scalar(Value::Null))
        }
        other => Err(ScriptErrorKind::UnknownName(other.to_string())),
    }
}

fn absolute(n: Number) -> Value {
    match n {
        Number::Int(n) => n.checked_abs().map_or(Value::Float((n as f64).abs()), Value::Int),
        Number::Float(f) => Value::Float(f.abs()),
    }
}

/// Round half to even. Without `decimals` an int is returned.
fn round_value(value: &Value, decimals: Option<i64>) -> EvalResult<Value> {
    let Some(n) = number(value) else {
        return match value {
            Value::Null => Ok(Value::Null),
            other => Err(ScriptErrorKind::Type(format!("cannot round {}", other.kind()))),
        };
    };
    Ok(match (n, decimals) {
        (Number::Int(n), _) => Value::Int(n),
        (Number::Float(f), None) => Value::Int(f.round_ties_even() as i64),
        (Number::Float(f), Some(d)) => {
            let scale = 10f64.powi(d.clamp(-300, 300) as i32);
            Value::Float((f * scale).round_ties_even() / scale)
        }
    })
}

// ============================================================================
// Operators
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn to_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(f) => f,
        }
    }
}

fn number(value: &Value) -> Option<Number> {
    match value {
        Value::Bool(b) => Some(Number::Int(i64::from(*b))),
        Value::Int(n) => Some(Number::Int(*n)),
        Value::Float(f) => Some(Number::Float(*f)),
        _ => None,
    }
}

fn symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
        BinOp::Eq => "==",
        BinOp::Ne => "!=",
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Gt => ">",
        BinOp::Ge => ">=",
        BinOp::BitAnd => "&",
        BinOp::BitOr => "|",
        BinOp::And => "and",
        BinOp::Or => "or",
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(n) => *n != 0,
        Value::Float(f) => *f != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(object) => !object.is_empty(),
    }
}

fn ambiguous_truth(value: &ScriptValue) -> ScriptErrorKind {
    ScriptErrorKind::Type(format!(
        "the truth value of a {} is ambiguous; use & or |",
        value.kind()
    ))
}

fn unary(op: UnaryOp, operand: ScriptValue) -> EvalResult<ScriptValue> {
    match op {
        UnaryOp::Neg => unary_numeric(operand, |n| match n {
            Number::Int(n) => n.checked_neg().map_or(Value::Float(-(n as f64)), Value::Int),
            Number::Float(f) => Value::Float(-f),
        }),
        UnaryOp::Not => match operand {
            ScriptValue::Scalar(v) => Ok(ScriptValue::Scalar(Value::Bool(!truthy(&v)))),
            other => Err(ambiguous_truth(&other)),
        },
        UnaryOp::Invert => {
            let invert = |v: &Value| match v {
                Value::Bool(b) => Ok(Value::Bool(!b)),
                Value::Int(n) => Ok(Value::Int(!n)),
                other => Err(ScriptErrorKind::Type(format!(
                    "bad operand type for ~: {}",
                    other.kind()
                ))),
            };
            match operand {
                ScriptValue::Scalar(v) => invert(&v).map(ScriptValue::Scalar),
                ScriptValue::Series(values) => values
                    .iter()
                    .map(invert)
                    .collect::<EvalResult<Vec<_>>>()
                    .map(ScriptValue::Series),
                other => Err(ScriptErrorKind::Type(format!(
                    "bad operand type for ~: {}",
                    other.kind()
                ))),
            }
        }
    }
}

/// Apply a numeric function to a scalar or every cell of a series. Nulls pass through.
fn unary_numeric(operand: ScriptValue, f: impl Fn(Number) -> Value) -> EvalResult<ScriptValue> {
    let apply = |v: &Value| match (v, number(v)) {
        (Value::Null, _) => Ok(Value::Null),
        (_, Some(n)) => Ok(f(n)),
        (other, None) => Err(ScriptErrorKind::Type(format!(
            "bad operand type: {}",
            other.kind()
        ))),
    };
    match operand {
        ScriptValue::Scalar(v) => apply(&v).map(ScriptValue::Scalar),
        ScriptValue::Series(values) => values
            .iter()
            .map(apply)
            .collect::<EvalResult<Vec<_>>>()
            .map(ScriptValue::Series),
        other => Err(ScriptErrorKind::Type(format!(
            "bad operand type: {}",
            other.kind()
        ))),
    }
}

/// Binary operator with scalar broadcasting over series.
fn binary(op: BinOp, left: ScriptValue, right: ScriptValue) -> EvalResult<ScriptValue> {
    match (left, right) {
        (ScriptValue::Scalar(a), ScriptValue::Scalar(b)) => scalar_op(op, &a, &b).map(ScriptValue::Scalar),
        (ScriptValue::Series(a), ScriptValue::Series(b)) => {
            if a.len() != b.len() {
                return Err(ScriptErrorKind::Type(format!(
                    "series lengths differ: {} and {}",
                    a.len(),
                    b.len()
                )));
            }
            a.iter()
                .zip(&b)
                .map(|(x, y)| scalar_op(op, x, y))
                .collect::<EvalResult<Vec<_>>>()
                .map(ScriptValue::Series)
        }
        (ScriptValue::Series(a), ScriptValue::Scalar(b)) => a
            .iter()
            .map(|x| scalar_op(op, x, &b))
            .collect::<EvalResult<Vec<_>>>()
            .map(ScriptValue::Series),
        (ScriptValue::Scalar(a), ScriptValue::Series(b)) => b
            .iter()
            .map(|y| scalar_op(op, &a, y))
            .collect::<EvalResult<Vec<_>>>()
            .map(ScriptValue::Series),
        (left, right) => Err(ScriptErrorKind::Type(format!(
            "unsupported operand types for {}: {} and {}",
            symbol(op),
            left.kind(),
            right.kind()
        ))),
    }
}

fn scalar_op(op: BinOp, a: &Value, b: &Value) -> EvalResult<Value> {
    match op {
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => arithmetic(op, a, b),
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => compare(op, a, b),
        BinOp::BitAnd | BinOp::BitOr => match (a, b) {
            (Value::Int(x), Value::Int(y)) => Ok(Value::Int(if op == BinOp::BitAnd {
                x & y
            } else {
                x | y
            })),
            _ => {
                // missing values count as false
                let (x, y) = (truthy(a), truthy(b));
                let both_boolish = [a, b]
                    .iter()
                    .all(|v| matches!(v, Value::Bool(_) | Value::Null));
                if !both_boolish {
                    return Err(ScriptErrorKind::Type(format!(
                        "unsupported operand types for {}: {} and {}",
                        symbol(op),
                        a.kind(),
                        b.kind()
                    )));
                }
                Ok(Value::Bool(if op == BinOp::BitAnd { x && y } else { x || y }))
            }
        },
        BinOp::And | BinOp::Or => {
            let pick_left = truthy(a) == (op == BinOp::Or);
            Ok(if pick_left { a.clone() } else { b.clone() })
        }
    }
}

/// Largest string `str * int` may build.
const MAX_STRING_LEN: usize = 1 << 24;

fn arithmetic(op: BinOp, a: &Value, b: &Value) -> EvalResult<Value> {
    if a.is_null() || b.is_null() {
        return Ok(Value::Null);
    }
    match (a, b, op) {
        (Value::String(x), Value::String(y), BinOp::Add) => {
            return Ok(Value::String(format!("{x}{y}")));
        }
        (Value::String(s), Value::Int(n), BinOp::Mul) | (Value::Int(n), Value::String(s), BinOp::Mul) => {
            let count = usize::try_from((*n).max(0)).unwrap_or(usize::MAX);
            return match s.len().checked_mul(count) {
                Some(len) if len <= MAX_STRING_LEN => Ok(Value::String(s.repeat(count))),
                _ => Err(ScriptErrorKind::Type(format!(
                    "repeated string would exceed {MAX_STRING_LEN} bytes"
                ))),
            };
        }
        _ => {}
    }

    let (Some(x), Some(y)) = (number(a), number(b)) else {
        return Err(ScriptErrorKind::Type(format!(
            "unsupported operand types for {}: {} and {}",
            symbol(op),
            a.kind(),
            b.kind()
        )));
    };

    Ok(match (x, y) {
        (Number::Int(x), Number::Int(y)) => match op {
            BinOp::Add => x.checked_add(y).map_or(Value::Float(x as f64 + y as f64), Value::Int),
            BinOp::Sub => x.checked_sub(y).map_or(Value::Float(x as f64 - y as f64), Value::Int),
            BinOp::Mul => x.checked_mul(y).map_or(Value::Float(x as f64 * y as f64), Value::Int),
            BinOp::Div if y == 0 => Value::Null,
            BinOp::Div => Value::Float(x as f64 / y as f64),
            BinOp::Mod if y == 0 => Value::Null,
            BinOp::Mod => {
                // result takes the sign of the divisor
                let r = x.wrapping_rem(y);
                Value::Int(if r != 0 && (r < 0) != (y < 0) { r + y } else { r })
            }
            _ => unreachable!("arithmetic called with {op:?}"),
        },
        (x, y) => {
            let (x, y) = (x.to_f64(), y.to_f64());
            match op {
                BinOp::Add => Value::Float(x + y),
                BinOp::Sub => Value::Float(x - y),
                BinOp::Mul => Value::Float(x * y),
                BinOp::Div | BinOp::Mod if y == 0.0 => Value::Null,
                BinOp::Div => Value::Float(x / y),
                BinOp::Mod => Value::Float(x - y * (x / y).floor()),
                _ => unreachable!("arithmetic called with {op:?}"),
            }
        }
    })
}

fn compare(op: BinOp, a: &Value, b: &Value) -> EvalResult<Value> {
    if a.is_null() || b.is_null() {
        return Ok(Value::Bool(op == BinOp::Ne));
    }
    let ordering = order(a, b);
    let result = match op {
        BinOp::Eq => ordering.map_or(a == b, Ordering::is_eq),
        BinOp::Ne => ordering.map_or(a != b, Ordering::is_ne),
        BinOp::Lt => ordering?.is_lt(),
        BinOp::Le => ordering?.is_le(),
        BinOp::Gt => ordering?.is_gt(),
        BinOp::Ge => ordering?.is_ge(),
        _ => unreachable!("compare called with {op:?}"),
    };
    Ok(Value::Bool(result))
}

fn order(a: &Value, b: &Value) -> EvalResult<Ordering> {
    let ordering = match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => match (number(a), number(b)) {
            (Some(x), Some(y)) => x.to_f64().partial_cmp(&y.to_f64()),
            _ => None,
        },
    };
    ordering.ok_or_else(|| {
        ScriptErrorKind::Type(format!(
            "cannot order {} and {}",
            a.kind(),
            b.kind()
        ))
    })
}

// ============================================================================
// Indexing and conversions
// ============================================================================

fn subscript(target: ScriptValue, index: ScriptValue) -> EvalResult<ScriptValue> {
    match (target, index) {
        (ScriptValue::Frame(frame), ScriptValue::Scalar(Value::String(column))) => frame
            .column(&column)
            .map(|values| ScriptValue::Series(values.to_vec()))
            .ok_or(ScriptErrorKind::Key(column)),
        (ScriptValue::Frame(frame), ScriptValue::Scalar(labels @ Value::Array(_))) => {
            let labels = label_list(ScriptValue::Scalar(labels))?;
            if let Some(missing) = labels.iter().find(|label| !frame.has_column(label)) {
                return Err(ScriptErrorKind::Key(missing.clone()));
            }
            Ok(ScriptValue::Frame(frame.select(&labels)?))
        }
        (ScriptValue::Frame(frame), ScriptValue::Series(mask)) => {
            Ok(ScriptValue::Frame(frame.filter_rows(&bool_mask(&mask)?)?))
        }
        (ScriptValue::Series(values), ScriptValue::Series(mask)) => {
            let mask = bool_mask(&mask)?;
            if mask.len() != values.len() {
                return Err(ScriptErrorKind::Type(format!(
                    "mask has {} entries, series has {}",
                    mask.len(),
                    values.len()
                )));
            }
            Ok(ScriptValue::Series(
                values
                    .into_iter()
                    .zip(mask)
                    .filter_map(|(v, keep)| keep.then_some(v))
                    .collect(),
            ))
        }
        (ScriptValue::Series(values), ScriptValue::Scalar(Value::Int(i))) => values
            .get(usize::try_from(i).unwrap_or(usize::MAX))
            .cloned()
            .map(ScriptValue::Scalar)
            .ok_or(ScriptErrorKind::Key(i.to_string())),
        (ScriptValue::Scalar(Value::Array(items)), ScriptValue::Scalar(Value::Int(i))) => {
            let len = items.len() as i64;
            let position = if i < 0 { len + i } else { i };
            usize::try_from(position)
                .ok()
                .and_then(|p| items.get(p))
                .cloned()
                .map(ScriptValue::Scalar)
                .ok_or(ScriptErrorKind::Key(i.to_string()))
        }
        (ScriptValue::Scalar(Value::Object(object)), ScriptValue::Scalar(Value::String(key))) => {
            object
                .get(&key)
                .cloned()
                .map(ScriptValue::Scalar)
                .ok_or(ScriptErrorKind::Key(key))
        }
        (target, index) => Err(ScriptErrorKind::Type(format!(
            "{} cannot be indexed by {}",
            target.kind(),
            index.kind()
        ))),
    }
}

fn bool_mask(values: &[Value]) -> EvalResult<Vec<bool>> {
    values
        .iter()
        .map(|v| match v {
            Value::Bool(b) => Ok(*b),
            Value::Null => Ok(false),
            other => Err(ScriptErrorKind::Type(format!(
                "row mask must hold bools, found {}",
                other.kind()
            ))),
        })
        .collect()
}

fn into_scalar(value: ScriptValue) -> EvalResult<Value> {
    match value {
        ScriptValue::Scalar(v) => Ok(v),
        other => Err(ScriptErrorKind::Type(format!(
            "expected a scalar, found {}",
            other.kind()
        ))),
    }
}

fn column_name(value: ScriptValue) -> EvalResult<String> {
    match value {
        ScriptValue::Scalar(Value::String(name)) => Ok(name),
        other => Err(ScriptErrorKind::Type(format!(
            "column labels must be str, not {}",
            other.kind()
        ))),
    }
}

/// A single label or a list of labels.
fn label_list(value: ScriptValue) -> EvalResult<Vec<String>> {
    match value {
        ScriptValue::Scalar(Value::String(label)) => Ok(vec![label]),
        ScriptValue::Scalar(list @ Value::Array(_)) => list.as_string_list().ok_or_else(|| {
            ScriptErrorKind::Type("column labels must be str".into())
        }),
        other => Err(ScriptErrorKind::Type(format!(
            "expected column labels, found {}",
            other.kind()
        ))),
    }
}

/// Cells for a column: a series or list as-is, a scalar broadcast to every row.
fn into_column_values(value: ScriptValue, num_rows: usize) -> EvalResult<Vec<Value>> {
    match value {
        ScriptValue::Series(values) => Ok(values),
        ScriptValue::Scalar(Value::Array(items)) => Ok(items),
        ScriptValue::Scalar(v) => Ok(vec![v; num_rows]),
        other => Err(ScriptErrorKind::Type(format!(
            "cannot store a {} in a column",
            other.kind()
        ))),
    }
}
