//! Statement and expression parser.
//!
//! One statement per line. Operator precedence follows Python:
//! `or` < `and` < `not` < comparisons < `|` < `&` < `+ -` < `* / %` < unary < postfix.

use super::ScriptErrorKind;
use super::lexer::{Token, tokenize};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Stmt {
    Import { module: String, alias: String },
    Assign { target: Target, value: Expr },
    Del(Target),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Target {
    Name(String),
    Column { frame: String, column: Expr },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    BitAnd,
    BitOr,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Neg,
    Not,
    Invert,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    Name(String),
    List(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Attribute {
        target: Box<Expr>,
        name: String,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
    },
}

/// Parse one line. Returns `None` for blank and comment-only lines.
pub(crate) fn parse_line(line: &str) -> Result<Option<Stmt>, ScriptErrorKind> {
    let tokens = tokenize(line)?;
    if tokens.is_empty() {
        return Ok(None);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let stmt = parser.statement()?;
    if let Some(token) = parser.peek() {
        return Err(ScriptErrorKind::Syntax(format!(
            "unexpected {token:?} after statement"
        )));
    }
    Ok(Some(stmt))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Name(name)) if name == keyword)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ScriptErrorKind> {
        match self.next() {
            Some(ref token) if token == expected => Ok(()),
            Some(token) => Err(ScriptErrorKind::Syntax(format!(
                "expected {expected:?}, found {token:?}"
            ))),
            None => Err(ScriptErrorKind::Syntax(format!(
                "expected {expected:?}, found end of line"
            ))),
        }
    }

    fn expect_name(&mut self) -> Result<String, ScriptErrorKind> {
        match self.next() {
            Some(Token::Name(name)) => Ok(name),
            Some(token) => Err(ScriptErrorKind::Syntax(format!(
                "expected a name, found {token:?}"
            ))),
            None => Err(ScriptErrorKind::Syntax(
                "expected a name, found end of line".into(),
            )),
        }
    }

    fn statement(&mut self) -> Result<Stmt, ScriptErrorKind> {
        if self.peek_keyword("import") {
            self.pos += 1;
            let module = self.expect_name()?;
            let alias = if self.peek_keyword("as") {
                self.pos += 1;
                self.expect_name()?
            } else {
                module.clone()
            };
            return Ok(Stmt::Import { module, alias });
        }

        if self.peek_keyword("del") {
            self.pos += 1;
            let expr = self.expression()?;
            return Ok(Stmt::Del(into_target(expr)?));
        }

        let expr = self.expression()?;
        if self.eat(&Token::Assign) {
            let target = into_target(expr)?;
            let value = self.expression()?;
            return Ok(Stmt::Assign { target, value });
        }
        Ok(Stmt::Expr(expr))
    }

    fn expression(&mut self) -> Result<Expr, ScriptErrorKind> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, ScriptErrorKind> {
        let mut left = self.and_expr()?;
        while self.peek_keyword("or") {
            self.pos += 1;
            let right = self.and_expr()?;
            left = binary(BinOp::Or, left, right);
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, ScriptErrorKind> {
        let mut left = self.not_expr()?;
        while self.peek_keyword("and") {
            self.pos += 1;
            let right = self.not_expr()?;
            left = binary(BinOp::And, left, right);
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr, ScriptErrorKind> {
        if self.peek_keyword("not") {
            self.pos += 1;
            let operand = self.not_expr()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ScriptErrorKind> {
        let left = self.bit_or()?;
        let op = match self.peek() {
            Some(Token::Eq) => BinOp::Eq,
            Some(Token::Ne) => BinOp::Ne,
            Some(Token::Lt) => BinOp::Lt,
            Some(Token::Le) => BinOp::Le,
            Some(Token::Gt) => BinOp::Gt,
            Some(Token::Ge) => BinOp::Ge,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.bit_or()?;
        Ok(binary(op, left, right))
    }

    fn bit_or(&mut self) -> Result<Expr, ScriptErrorKind> {
        let mut left = self.bit_and()?;
        while self.eat(&Token::Pipe) {
            let right = self.bit_and()?;
            left = binary(BinOp::BitOr, left, right);
        }
        Ok(left)
    }

    fn bit_and(&mut self) -> Result<Expr, ScriptErrorKind> {
        let mut left = self.arith()?;
        while self.eat(&Token::Amp) {
            let right = self.arith()?;
            left = binary(BinOp::BitAnd, left, right);
        }
        Ok(left)
    }

    fn arith(&mut self) -> Result<Expr, ScriptErrorKind> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.term()?;
            left = binary(op, left, right);
        }
    }

    fn term(&mut self) -> Result<Expr, ScriptErrorKind> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Mod,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.unary()?;
            left = binary(op, left, right);
        }
    }

    fn unary(&mut self) -> Result<Expr, ScriptErrorKind> {
        let op = match self.peek() {
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Tilde) => UnaryOp::Invert,
            Some(Token::Plus) => {
                self.pos += 1;
                return self.unary();
            }
            _ => return self.postfix(),
        };
        self.pos += 1;
        let operand = self.unary()?;
        // Fold negative literals so `-1` stays a plain value.
        if op == UnaryOp::Neg {
            match operand {
                Expr::Literal(Value::Int(n)) => return Ok(Expr::Literal(Value::Int(-n))),
                Expr::Literal(Value::Float(n)) => return Ok(Expr::Literal(Value::Float(-n))),
                _ => {}
            }
        }
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn postfix(&mut self) -> Result<Expr, ScriptErrorKind> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Token::LBracket) {
                let index = self.expression()?;
                self.expect(&Token::RBracket)?;
                expr = Expr::Index {
                    target: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.eat(&Token::Dot) {
                let name = self.expect_name()?;
                expr = Expr::Attribute {
                    target: Box::new(expr),
                    name,
                };
            } else if self.eat(&Token::LParen) {
                let (args, kwargs) = self.call_args()?;
                expr = Expr::Call {
                    func: Box::new(expr),
                    args,
                    kwargs,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    /// Arguments after an opening `(`, consuming the closing `)`.
    fn call_args(&mut self) -> Result<(Vec<Expr>, Vec<(String, Expr)>), ScriptErrorKind> {
        let mut args = Vec::new();
        let mut kwargs = Vec::new();

        while !self.eat(&Token::RParen) {
            let is_keyword = matches!(self.peek(), Some(Token::Name(_)))
                && self.tokens.get(self.pos + 1) == Some(&Token::Assign);
            if is_keyword {
                let name = self.expect_name()?;
                self.pos += 1;
                kwargs.push((name, self.expression()?));
            } else {
                if !kwargs.is_empty() {
                    return Err(ScriptErrorKind::Syntax(
                        "positional argument follows keyword argument".into(),
                    ));
                }
                args.push(self.expression()?);
            }
            if !self.eat(&Token::Comma) {
                self.expect(&Token::RParen)?;
                break;
            }
        }

        Ok((args, kwargs))
    }

    fn primary(&mut self) -> Result<Expr, ScriptErrorKind> {
        match self.next() {
            Some(Token::Int(n)) => Ok(Expr::Literal(Value::Int(n))),
            Some(Token::Float(n)) => Ok(Expr::Literal(Value::Float(n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Name(name)) => Ok(match name.as_str() {
                "True" => Expr::Literal(Value::Bool(true)),
                "False" => Expr::Literal(Value::Bool(false)),
                "None" => Expr::Literal(Value::Null),
                _ => Expr::Name(name),
            }),
            Some(Token::LParen) => {
                let expr = self.expression()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Some(Token::LBracket) => {
                let mut items = Vec::new();
                while !self.eat(&Token::RBracket) {
                    items.push(self.expression()?);
                    if !self.eat(&Token::Comma) {
                        self.expect(&Token::RBracket)?;
                        break;
                    }
                }
                Ok(Expr::List(items))
            }
            Some(Token::LBrace) => {
                let mut entries = Vec::new();
                while !self.eat(&Token::RBrace) {
                    let key = self.expression()?;
                    self.expect(&Token::Colon)?;
                    let value = self.expression()?;
                    entries.push((key, value));
                    if !self.eat(&Token::Comma) {
                        self.expect(&Token::RBrace)?;
                        break;
                    }
                }
                Ok(Expr::Dict(entries))
            }
            Some(token) => Err(ScriptErrorKind::Syntax(format!(
                "unexpected {token:?}"
            ))),
            None => Err(ScriptErrorKind::Syntax("unexpected end of line".into())),
        }
    }
}

fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn into_target(expr: Expr) -> Result<Target, ScriptErrorKind> {
    match expr {
        Expr::Name(name) => Ok(Target::Name(name)),
        Expr::Index { target, index } => match *target {
            Expr::Name(frame) => Ok(Target::Column {
                frame,
                column: *index,
            }),
            _ => Err(ScriptErrorKind::Syntax(
                "can only assign to a column of a named dataframe".into(),
            )),
        },
        _ => Err(ScriptErrorKind::Syntax("cannot assign to expression".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Stmt {
        parse_line(line).unwrap().unwrap()
    }

    #[test]
    fn test_column_assignment() {
        let stmt = parse("df['A'] = df['A'] * 2");
        let Stmt::Assign { target, value } = stmt else {
            panic!("expected assignment");
        };
        assert_eq!(
            target,
            Target::Column {
                frame: "df".into(),
                column: Expr::Literal(Value::from("A")),
            }
        );
        assert!(matches!(value, Expr::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn test_precedence() {
        // (1 + (2 * 3)) > 4
        let Stmt::Expr(expr) = parse("1 + 2 * 3 > 4") else {
            panic!("expected expression");
        };
        let Expr::Binary { op, left, .. } = expr else {
            panic!("expected comparison");
        };
        assert_eq!(op, BinOp::Gt);
        assert!(matches!(*left, Expr::Binary { op: BinOp::Add, .. }));
    }

    #[test]
    fn test_method_call_with_kwargs() {
        let Stmt::Expr(expr) = parse("df.rename(columns={'A': 'B'}, inplace=True)") else {
            panic!("expected expression");
        };
        let Expr::Call { func, args, kwargs } = expr else {
            panic!("expected call");
        };
        assert!(matches!(*func, Expr::Attribute { ref name, .. } if name == "rename"));
        assert!(args.is_empty());
        assert_eq!(kwargs.len(), 2);
        assert_eq!(kwargs[1], ("inplace".into(), Expr::Literal(Value::Bool(true))));
    }

    #[test]
    fn test_import_and_del() {
        assert_eq!(
            parse("import pandas as pd"),
            Stmt::Import {
                module: "pandas".into(),
                alias: "pd".into()
            }
        );
        assert_eq!(parse("del df"), Stmt::Del(Target::Name("df".into())));
    }

    #[test]
    fn test_blank_and_comment_lines() {
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(parse_line("# just a note").unwrap(), None);
    }

    #[test]
    fn test_negative_literal_folding() {
        assert_eq!(parse("-3"), Stmt::Expr(Expr::Literal(Value::Int(-3))));
    }

    #[test]
    fn test_invalid_target() {
        assert!(matches!(
            parse_line("df['A'] + 1 = 2"),
            Err(ScriptErrorKind::Syntax(_))
        ));
        assert!(matches!(
            parse_line("df['A'] 2"),
            Err(ScriptErrorKind::Syntax(_))
        ));
    }
}
