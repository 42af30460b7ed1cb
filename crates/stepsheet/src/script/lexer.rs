//! Line tokenizer.

use super::ScriptErrorKind;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Amp,
    Pipe,
    Tilde,
}

/// Tokenize one source line. Everything after an unquoted `#` is dropped.
pub(crate) fn tokenize(line: &str) -> Result<Vec<Token>, ScriptErrorKind> {
    let chars: Vec<char> = line.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\r' => i += 1,
            '#' => break,
            '\'' | '"' => {
                let (s, next) = lex_string(&chars, i, false)?;
                tokens.push(Token::Str(s));
                i = next;
            }
            'r' | 'R' if matches!(chars.get(i + 1), Some('\'' | '"')) => {
                let (s, next) = lex_string(&chars, i + 1, true)?;
                tokens.push(Token::Str(s));
                i = next;
            }
            c if c.is_ascii_digit() => {
                let (token, next) = lex_number(&chars, i)?;
                tokens.push(token);
                i = next;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Name(chars[start..i].iter().collect()));
            }
            _ => {
                let next = chars.get(i + 1).copied();
                let (token, width) = match (c, next) {
                    ('=', Some('=')) => (Token::Eq, 2),
                    ('!', Some('=')) => (Token::Ne, 2),
                    ('<', Some('=')) => (Token::Le, 2),
                    ('>', Some('=')) => (Token::Ge, 2),
                    ('=', _) => (Token::Assign, 1),
                    ('<', _) => (Token::Lt, 1),
                    ('>', _) => (Token::Gt, 1),
                    ('(', _) => (Token::LParen, 1),
                    (')', _) => (Token::RParen, 1),
                    ('[', _) => (Token::LBracket, 1),
                    (']', _) => (Token::RBracket, 1),
                    ('{', _) => (Token::LBrace, 1),
                    ('}', _) => (Token::RBrace, 1),
                    (',', _) => (Token::Comma, 1),
                    (':', _) => (Token::Colon, 1),
                    ('.', _) => (Token::Dot, 1),
                    ('+', _) => (Token::Plus, 1),
                    ('-', _) => (Token::Minus, 1),
                    ('*', _) => (Token::Star, 1),
                    ('/', _) => (Token::Slash, 1),
                    ('%', _) => (Token::Percent, 1),
                    ('&', _) => (Token::Amp, 1),
                    ('|', _) => (Token::Pipe, 1),
                    ('~', _) => (Token::Tilde, 1),
                    _ => {
                        return Err(ScriptErrorKind::Syntax(format!(
                            "unexpected character {c:?}"
                        )));
                    }
                };
                tokens.push(token);
                i += width;
            }
        }
    }

    Ok(tokens)
}

fn lex_string(chars: &[char], start: usize, raw: bool) -> Result<(String, usize), ScriptErrorKind> {
    let quote = chars[start];
    let mut s = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        let c = chars[i];
        if c == quote {
            return Ok((s, i + 1));
        }
        if c == '\\' && i + 1 < chars.len() {
            let escaped = chars[i + 1];
            if raw {
                // Raw strings keep the backslash, but it still protects a quote.
                s.push('\\');
                s.push(escaped);
            } else {
                s.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '0' => '\0',
                    other => other,
                });
            }
            i += 2;
            continue;
        }
        s.push(c);
        i += 1;
    }

    Err(ScriptErrorKind::Syntax("unterminated string literal".into()))
}

fn lex_number(chars: &[char], start: usize) -> Result<(Token, usize), ScriptErrorKind> {
    let mut i = start;
    let mut is_float = false;

    while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '_') {
        i += 1;
    }
    if i < chars.len() && chars[i] == '.' && chars.get(i + 1).is_some_and(char::is_ascii_digit) {
        is_float = true;
        i += 1;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    } else if i < chars.len() && chars[i] == '.' && !chars.get(i + 1).is_some_and(|c| c.is_alphabetic()) {
        // `2.` is a float, `2.real` would be attribute access
        is_float = true;
        i += 1;
    }
    if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
        let mut j = i + 1;
        if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
            j += 1;
        }
        if j < chars.len() && chars[j].is_ascii_digit() {
            is_float = true;
            i = j;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
        }
    }

    let text: String = chars[start..i].iter().filter(|c| **c != '_').collect();
    let token = if is_float {
        text.parse::<f64>()
            .map(Token::Float)
            .map_err(|_| ScriptErrorKind::Syntax(format!("invalid number {text:?}")))?
    } else {
        text.parse::<i64>()
            .map(Token::Int)
            .map_err(|_| ScriptErrorKind::Syntax(format!("invalid number {text:?}")))?
    };
    Ok((token, i))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_assignment() {
        let tokens = tokenize("df['A'] = df['A'] * 2").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Name("df".into()),
                Token::LBracket,
                Token::Str("A".into()),
                Token::RBracket,
                Token::Assign,
                Token::Name("df".into()),
                Token::LBracket,
                Token::Str("A".into()),
                Token::RBracket,
                Token::Star,
                Token::Int(2),
            ]
        );
    }

    #[test]
    fn test_numbers_and_operators() {
        let tokens = tokenize("1.5 >= 2e3 != 10_000").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Float(1.5),
                Token::Ge,
                Token::Float(2000.0),
                Token::Ne,
                Token::Int(10_000),
            ]
        );
    }

    #[test]
    fn test_comments_and_strings() {
        let tokens = tokenize(r#"x = "it's # not a comment"  # a comment"#).unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[2], Token::Str("it's # not a comment".into()));
    }

    #[test]
    fn test_raw_string_keeps_backslashes() {
        let tokens = tokenize(r"pd.read_csv(r'C:\data\file.csv')").unwrap();
        assert!(tokens.contains(&Token::Str(r"C:\data\file.csv".into())));
    }

    #[test]
    fn test_unterminated_string() {
        assert!(matches!(
            tokenize("df['A"),
            Err(ScriptErrorKind::Syntax(_))
        ));
    }
}
