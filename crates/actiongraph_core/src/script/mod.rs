// SPDX-License-Identifier: MIT OR Apache-2.0
//! Expression scripts attached to parameters.
//!
//! A [`Script`] keeps the source text and the `{reference}` tokens found in
//! it. Each reference is either resolved to a [`ParamId`] or still pending;
//! the owning document resolves pending references and keeps tokens in
//! canonical form when objects or parameters are renamed.
//!
//! ## Reference tokens
//!
//! - `{$NAME}` environment variable, read on every evaluation
//! - `{obj}` object handle of a sibling (same as `{obj.message}`)
//! - `{obj.param}` parameter of a sibling
//! - `{__this__.param}` parameter of the same object
//! - `{__graph__.param}` parameter of the owning graph

pub mod interp;
pub mod lexer;
pub mod parser;

pub use interp::Interpreter;
pub use parser::{parse_program, Program};

use crate::id::ParamId;
use crate::param::PARAM_MESSAGE;
use lexer::{classify_brace, BraceKind};
use tracing::warn;

/// Object name that refers to the script owner
pub const THIS: &str = "__this__";
/// Object name that refers to the owning graph
pub const GRAPH: &str = "__graph__";

/// One `{reference}` token of a script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRef {
    /// Token text between the braces
    pub token: String,
    /// Resolved parameter, if any
    pub param: Option<ParamId>,
}

impl ScriptRef {
    /// Object part of the token
    pub fn object_name(&self) -> &str {
        split_token(&self.token).0
    }

    /// Parameter part of the token
    pub fn param_name(&self) -> &str {
        split_token(&self.token).1
    }
}

/// Split a token into object and parameter names
pub fn split_token(token: &str) -> (&str, &str) {
    token.split_once('.').unwrap_or((token, PARAM_MESSAGE))
}

/// Build a token from object and parameter names
pub fn make_token(object: &str, param: &str) -> String {
    if param == PARAM_MESSAGE {
        object.to_string()
    } else {
        format!("{object}.{param}")
    }
}

/// Visit every `{...}` group of `code`, returning the byte range of the group
/// and its classification.
fn scan_braces(code: &str) -> Vec<(usize, usize, BraceKind)> {
    let mut found = Vec::new();
    let mut start = 0;
    while let Some(open) = code[start..].find('{').map(|i| i + start) {
        let Some(close) = code[open + 1..].find('}').map(|i| i + open + 1) else {
            break;
        };
        let inner = &code[open + 1..close];
        if let Some(nested) = inner.rfind('{') {
            start = open + 1 + nested;
            continue;
        }
        found.push((open, close + 1, classify_brace(inner)));
        start = close + 1;
    }
    found
}

/// Source text and reference bookkeeping of an expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    code: String,
    refs: Vec<ScriptRef>,
    env_vars: Vec<String>,
}

impl Script {
    /// Scan `code` for references. `{obj.message}` tokens are normalized to
    /// `{obj}` and tokens with more than one dot are dropped with a warning.
    pub fn parse(code: &str) -> Self {
        let mut normalized = String::with_capacity(code.len());
        let mut refs: Vec<ScriptRef> = Vec::new();
        let mut env_vars: Vec<String> = Vec::new();
        let mut last = 0;

        for (open, close, kind) in scan_braces(code) {
            match kind {
                BraceKind::Param(token) => {
                    let (object, param) = split_token(&token);
                    let token = make_token(object, param);
                    normalized.push_str(&code[last..open]);
                    normalized.push('{');
                    normalized.push_str(&token);
                    normalized.push('}');
                    last = close;
                    if !refs.iter().any(|r| r.token == token) {
                        refs.push(ScriptRef { token, param: None });
                    }
                }
                BraceKind::Env(name) => {
                    if !env_vars.contains(&name) {
                        env_vars.push(name);
                    }
                }
                BraceKind::Invalid => {
                    warn!(token = &code[open..close], "Invalid parameter reference ignored");
                }
                BraceKind::Literal => {}
            }
        }
        normalized.push_str(&code[last..]);

        Self { code: normalized, refs, env_vars }
    }

    /// Source text
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Parameter references in order of first appearance
    pub fn refs(&self) -> &[ScriptRef] {
        &self.refs
    }

    pub(crate) fn refs_mut(&mut self) -> &mut [ScriptRef] {
        &mut self.refs
    }

    /// Environment variables read by the script
    pub fn env_vars(&self) -> &[String] {
        &self.env_vars
    }

    /// Whether every reference is resolved
    pub fn is_complete(&self) -> bool {
        self.refs.iter().all(|r| r.param.is_some())
    }

    /// Resolved source parameters
    pub fn input_params(&self) -> impl Iterator<Item = ParamId> + '_ {
        self.refs.iter().filter_map(|r| r.param)
    }

    /// Whether the script is exactly one reference
    pub fn is_direct(&self) -> bool {
        self.refs.len() == 1 && self.code.trim() == format!("{{{}}}", self.refs[0].token)
    }

    /// Rewrite every occurrence of `{old}` to `{new}`
    pub fn replace_token(&mut self, old: &str, new: &str) {
        if old == new {
            return;
        }
        self.code = self.code.replace(&format!("{{{old}}}"), &format!("{{{new}}}"));
        for r in &mut self.refs {
            if r.token == old {
                r.token = new.to_string();
            }
        }
        let mut seen = Vec::new();
        self.refs.retain(|r| {
            if seen.contains(&r.token) {
                false
            } else {
                seen.push(r.token.clone());
                true
            }
        });
    }

    /// Replace every reference with the text produced by `param_text` and
    /// every env token with its current value.
    pub fn substitute<F>(&self, param_text: F) -> String
    where
        F: Fn(&ScriptRef) -> Option<String>,
    {
        let mut out = String::with_capacity(self.code.len());
        let mut last = 0;
        for (open, close, kind) in scan_braces(&self.code) {
            let text = match kind {
                BraceKind::Param(token) => self
                    .refs
                    .iter()
                    .find(|r| r.token == token)
                    .and_then(&param_text),
                BraceKind::Env(name) => Some(read_env(&name)),
                BraceKind::Invalid | BraceKind::Literal => None,
            };
            if let Some(text) = text {
                out.push_str(&self.code[last..open]);
                out.push_str(&text);
                last = close;
            }
        }
        out.push_str(&self.code[last..]);
        out
    }
}

/// Current value of an environment variable, `""` with a warning if unset
pub fn read_env(name: &str) -> String {
    match std::env::var(name) {
        Ok(value) => value,
        Err(_) => {
            warn!(name, "Environment variable not found");
            String::new()
        }
    }
}

/// Whether `code` is a valid `execution` chain: empty or `{obj.execution}`
pub(crate) fn is_execution_chain(code: &str) -> bool {
    let code = code.trim();
    if code.is_empty() {
        return true;
    }
    let script = Script::parse(code);
    script.is_direct() && script.refs[0].param_name() == crate::param::PARAM_EXECUTION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_references() {
        let script = Script::parse("{a.x} + {b.message} * {a.x} + len({$HOME})");
        assert_eq!(script.code(), "{a.x} + {b} * {a.x} + len({$HOME})");
        let tokens: Vec<_> = script.refs().iter().map(|r| r.token.as_str()).collect();
        assert_eq!(tokens, vec!["a.x", "b"]);
        assert_eq!(script.env_vars(), ["HOME".to_string()]);
        assert!(!script.is_complete());
    }

    #[test]
    fn test_dict_literal_and_invalid_tokens() {
        let script = Script::parse("{'k': {a.x}} if {a.b.c} else 0");
        let tokens: Vec<_> = script.refs().iter().map(|r| r.token.as_str()).collect();
        assert_eq!(tokens, vec!["a.x"]);
    }

    #[test]
    fn test_direct_and_replace() {
        let mut script = Script::parse(" {a.x} ");
        assert!(script.is_direct());
        assert_eq!(script.refs()[0].object_name(), "a");
        assert_eq!(script.refs()[0].param_name(), "x");
        script.replace_token("a.x", "renamed.x");
        assert_eq!(script.code(), " {renamed.x} ");
        assert!(!Script::parse("{a.x} + 1").is_direct());
    }

    #[test]
    fn test_substitute() {
        let script = Script::parse("path/{a.x}/{b}");
        let text = script.substitute(|r| (r.token == "a.x").then(|| "dir".to_string()));
        assert_eq!(text, "path/dir/{b}");
    }

    #[test]
    fn test_execution_chain() {
        assert!(is_execution_chain("{a.execution}"));
        assert!(is_execution_chain(""));
        assert!(!is_execution_chain("{a.enabled}"));
        assert!(!is_execution_chain("{a.execution} + 1"));
    }
}
