// SPDX-License-Identifier: MIT OR Apache-2.0
//! Tokenizer for the expression language.

use crate::error::ScriptError;

/// What a `{...}` brace group refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BraceKind {
    /// `{$NAME}` environment variable
    Env(String),
    /// `{obj}` or `{obj.param}` parameter reference
    Param(String),
    /// Reference with too many dots
    Invalid,
    /// Not a reference (dict literal or free text)
    Literal,
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Classify the content between a pair of braces
pub fn classify_brace(inner: &str) -> BraceKind {
    if let Some(name) = inner.strip_prefix('$') {
        if !name.is_empty() && name.chars().all(is_word) {
            return BraceKind::Env(name.to_string());
        }
        return BraceKind::Literal;
    }
    if inner.is_empty() || inner.contains(':') || !inner.chars().all(|c| is_word(c) || c == '.') {
        return BraceKind::Literal;
    }
    if inner.split('.').any(str::is_empty) {
        return BraceKind::Literal;
    }
    match inner.matches('.').count() {
        0 | 1 => BraceKind::Param(inner.to_string()),
        _ => BraceKind::Invalid,
    }
}

/// A lexical token
#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    /// Integer literal
    Int(i64),
    /// Float literal
    Float(f64),
    /// String literal
    Str(String),
    /// Identifier or keyword
    Ident(String),
    /// `{reference}` with its inner text (including a leading `$` for env)
    Ref(String),
    /// Operator or punctuation
    Op(&'static str),
    /// End of input
    Eof,
}

/// A token with its byte offset
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The token
    pub tok: Tok,
    /// Byte offset in the source
    pub pos: usize,
}

const OPERATORS: [&str; 25] = [
    "**", "//", "==", "!=", "<=", ">=", "+", "-", "*", "/", "%", "<", ">", "(", ")", "[", "]",
    "{", "}", ",", ":", "=", "!", ".", ";",
];

/// Split source text into tokens
pub fn tokenize(src: &str) -> Result<Vec<Token>, ScriptError> {
    let mut tokens = Vec::new();
    let bytes = src.as_bytes();
    let mut i = 0;

    while i < src.len() {
        let c = src[i..].chars().next().unwrap_or(' ');

        if c.is_whitespace() {
            i += c.len_utf8();
            continue;
        }

        if c == '#' {
            while i < src.len() && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }

        if c == '{' {
            if let Some(end) = src[i + 1..].find('}') {
                let inner = &src[i + 1..i + 1 + end];
                match classify_brace(inner) {
                    BraceKind::Env(name) => {
                        tokens.push(Token { tok: Tok::Ref(format!("${name}")), pos: i });
                        i += end + 2;
                        continue;
                    }
                    BraceKind::Param(name) => {
                        tokens.push(Token { tok: Tok::Ref(name), pos: i });
                        i += end + 2;
                        continue;
                    }
                    BraceKind::Invalid => {
                        return Err(ScriptError::Syntax {
                            pos: i,
                            message: format!("invalid reference {{{inner}}}"),
                        });
                    }
                    BraceKind::Literal => {}
                }
            }
        }

        if c.is_ascii_digit() || (c == '.' && src[i + 1..].starts_with(|d: char| d.is_ascii_digit())) {
            let start = i;
            let mut is_float = false;
            while i < src.len() {
                let d = bytes[i] as char;
                if d.is_ascii_digit() || d == '_' {
                    i += 1;
                } else if d == '.' && !is_float {
                    is_float = true;
                    i += 1;
                } else if (d == 'e' || d == 'E')
                    && src[i + 1..].starts_with(|n: char| n.is_ascii_digit() || n == '-' || n == '+')
                {
                    is_float = true;
                    i += 2;
                } else {
                    break;
                }
            }
            let text: String = src[start..i].chars().filter(|c| *c != '_').collect();
            let tok = if is_float {
                text.parse::<f64>().map(Tok::Float).ok()
            } else {
                text.parse::<i64>().map(Tok::Int).ok()
            };
            let tok = tok.ok_or_else(|| ScriptError::Syntax {
                pos: start,
                message: format!("invalid number {text}"),
            })?;
            tokens.push(Token { tok, pos: start });
            continue;
        }

        if c == '"' || c == '\'' {
            let start = i;
            i += 1;
            let mut value = String::new();
            let mut closed = false;
            while i < src.len() {
                let ch = src[i..].chars().next().unwrap_or(c);
                i += ch.len_utf8();
                if ch == c {
                    closed = true;
                    break;
                }
                if ch == '\\' && i < src.len() {
                    let esc = src[i..].chars().next().unwrap_or('\\');
                    i += esc.len_utf8();
                    value.push(match esc {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                } else {
                    value.push(ch);
                }
            }
            if !closed {
                return Err(ScriptError::Syntax {
                    pos: start,
                    message: "unterminated string".to_string(),
                });
            }
            tokens.push(Token { tok: Tok::Str(value), pos: start });
            continue;
        }

        if is_word(c) {
            let start = i;
            while i < src.len() {
                let ch = src[i..].chars().next().unwrap_or(' ');
                if !is_word(ch) {
                    break;
                }
                i += ch.len_utf8();
            }
            tokens.push(Token { tok: Tok::Ident(src[start..i].to_string()), pos: start });
            continue;
        }

        match OPERATORS.iter().find(|op| src[i..].starts_with(**op)) {
            Some(op) => {
                tokens.push(Token { tok: Tok::Op(op), pos: i });
                i += op.len();
            }
            None => {
                return Err(ScriptError::Syntax {
                    pos: i,
                    message: format!("unexpected character {c:?}"),
                });
            }
        }
    }

    tokens.push(Token { tok: Tok::Eof, pos: src.len() });
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(src: &str) -> Vec<Tok> {
        tokenize(src).unwrap().into_iter().map(|t| t.tok).collect()
    }

    #[test]
    fn test_classify_brace() {
        assert_eq!(classify_brace("$HOME"), BraceKind::Env("HOME".into()));
        assert_eq!(classify_brace("node.value"), BraceKind::Param("node.value".into()));
        assert_eq!(classify_brace("node"), BraceKind::Param("node".into()));
        assert_eq!(classify_brace("'a': 1"), BraceKind::Literal);
        assert_eq!(classify_brace("a.b.c"), BraceKind::Invalid);
        assert_eq!(classify_brace(""), BraceKind::Literal);
    }

    #[test]
    fn test_tokenize_mixed() {
        assert_eq!(
            toks("{a.x} + 2.5 * 'hi'"),
            vec![
                Tok::Ref("a.x".into()),
                Tok::Op("+"),
                Tok::Float(2.5),
                Tok::Op("*"),
                Tok::Str("hi".into()),
                Tok::Eof,
            ]
        );
        assert_eq!(
            toks("{'k': {$HOME}}"),
            vec![
                Tok::Op("{"),
                Tok::Str("k".into()),
                Tok::Op(":"),
                Tok::Ref("$HOME".into()),
                Tok::Op("}"),
                Tok::Eof,
            ]
        );
        assert_eq!(toks("a // 2 ** 3"), vec![
            Tok::Ident("a".into()),
            Tok::Op("//"),
            Tok::Int(2),
            Tok::Op("**"),
            Tok::Int(3),
            Tok::Eof,
        ]);
    }

    #[test]
    fn test_tokenize_errors() {
        assert!(tokenize("'open").is_err());
        assert!(tokenize("a ? b").is_err());
    }
}
