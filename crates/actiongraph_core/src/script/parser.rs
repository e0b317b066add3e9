// SPDX-License-Identifier: MIT OR Apache-2.0
//! Recursive descent parser producing the expression AST.
//!
//! Two forms are accepted:
//! - a single expression, e.g. `{a.x} * 2 if {a.enabled} else 0`
//! - a function body (any code using the `return` keyword) made of
//!   assignments, `if`/`elif`/`else` blocks delimited by indentation, and
//!   `return` statements

use crate::error::ScriptError;
use crate::script::lexer::{tokenize, Tok, Token};
use crate::value::Value;

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `+x`
    Pos,
    /// `not x`
    Not,
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `//`
    FloorDiv,
    /// `%`
    Mod,
    /// `**`
    Pow,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `in`
    In,
    /// `not in`
    NotIn,
}

/// Expression node
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value
    Literal(Value),
    /// `{token}` reference
    Ref(String),
    /// Local variable
    Name(String),
    /// List literal
    List(Vec<Expr>),
    /// Dict literal
    Dict(Vec<(Expr, Expr)>),
    /// Unary operation
    Unary(UnaryOp, Box<Expr>),
    /// Binary operation
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// Short-circuit `and`
    And(Box<Expr>, Box<Expr>),
    /// Short-circuit `or`
    Or(Box<Expr>, Box<Expr>),
    /// `then if cond else otherwise`
    Cond {
        /// Value when the condition holds
        then: Box<Expr>,
        /// Condition
        cond: Box<Expr>,
        /// Value otherwise
        otherwise: Box<Expr>,
    },
    /// `value[index]`
    Index(Box<Expr>, Box<Expr>),
    /// Builtin function call
    Call(String, Vec<Expr>),
}

/// Statement of a function body
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `name = expr`
    Assign(String, Expr),
    /// `return expr`
    Return(Expr),
    /// `if`/`elif`/`else` chain
    If {
        /// Conditions with their blocks, in order
        branches: Vec<(Expr, Vec<Stmt>)>,
        /// `else` block
        otherwise: Vec<Stmt>,
    },
    /// `pass`
    Pass,
}

/// A parsed script
#[derive(Debug, Clone, PartialEq)]
pub enum Program {
    /// Single expression
    Expr(Expr),
    /// Function body
    Body(Vec<Stmt>),
}

/// Whether the code should be parsed as a function body
pub fn is_function_body(code: &str) -> bool {
    code.lines().any(|line| {
        let line = line.trim_start();
        line == "return" || line.starts_with("return ") || line.starts_with("return(")
    })
}

/// Parse a script, choosing the form by the `return` keyword heuristic
pub fn parse_program(code: &str) -> Result<Program, ScriptError> {
    if is_function_body(code) {
        parse_body(code).map(Program::Body)
    } else {
        parse_expr(code).map(Program::Expr)
    }
}

/// Parse a single expression
pub fn parse_expr(code: &str) -> Result<Expr, ScriptError> {
    let mut parser = Parser::new(tokenize(code)?);
    let expr = parser.expr()?;
    parser.expect_end()?;
    Ok(expr)
}

/// Parse a function body
pub fn parse_body(code: &str) -> Result<Vec<Stmt>, ScriptError> {
    let mut lines = Vec::new();
    let mut offset = 0;
    for raw in code.split('\n') {
        let content = raw.trim_end();
        let trimmed = content.trim_start();
        if !trimmed.is_empty() && !trimmed.starts_with('#') {
            let indent = content.len() - trimmed.len();
            lines.push(Line { indent, text: trimmed, offset: offset + indent });
        }
        offset += raw.len() + 1;
    }

    let mut pos = 0;
    let indent = lines.first().map_or(0, |l| l.indent);
    let block = parse_block(&lines, &mut pos, indent)?;
    if let Some(line) = lines.get(pos) {
        return Err(syntax(line.offset, "unexpected indentation"));
    }
    Ok(block)
}

struct Line<'a> {
    indent: usize,
    text: &'a str,
    offset: usize,
}

fn syntax(pos: usize, message: impl Into<String>) -> ScriptError {
    ScriptError::Syntax { pos, message: message.into() }
}

fn keyword_rest<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(keyword)?;
    if rest.is_empty() || rest.starts_with(|c: char| c.is_whitespace() || c == '(' || c == ':') {
        Some(rest)
    } else {
        None
    }
}

fn parse_block(lines: &[Line<'_>], pos: &mut usize, indent: usize) -> Result<Vec<Stmt>, ScriptError> {
    let mut block = Vec::new();
    while let Some(line) = lines.get(*pos) {
        if line.indent < indent {
            break;
        }
        if line.indent > indent {
            return Err(syntax(line.offset, "unexpected indentation"));
        }

        if let Some(rest) = keyword_rest(line.text, "if") {
            let mut branches = Vec::new();
            let mut otherwise = Vec::new();
            let cond = parse_condition(rest, line.offset)?;
            *pos += 1;
            branches.push((cond, parse_nested(lines, pos, indent, line.offset)?));

            while let Some(next) = lines.get(*pos) {
                if next.indent != indent {
                    break;
                }
                if let Some(rest) = keyword_rest(next.text, "elif") {
                    let cond = parse_condition(rest, next.offset)?;
                    *pos += 1;
                    branches.push((cond, parse_nested(lines, pos, indent, next.offset)?));
                } else if let Some(rest) = keyword_rest(next.text, "else") {
                    if rest.trim() != ":" {
                        return Err(syntax(next.offset, "expected ':' after else"));
                    }
                    *pos += 1;
                    otherwise = parse_nested(lines, pos, indent, next.offset)?;
                    break;
                } else {
                    break;
                }
            }
            block.push(Stmt::If { branches, otherwise });
            continue;
        }

        let stmt = if let Some(rest) = keyword_rest(line.text, "return") {
            if rest.trim().is_empty() {
                Stmt::Return(Expr::Literal(Value::None))
            } else {
                Stmt::Return(parse_expr(rest).map_err(|e| shift(e, line.offset + 6))?)
            }
        } else if line.text == "pass" {
            Stmt::Pass
        } else if keyword_rest(line.text, "elif").is_some() || keyword_rest(line.text, "else").is_some() {
            return Err(syntax(line.offset, "elif/else without if"));
        } else {
            parse_assignment(line.text).map_err(|e| shift(e, line.offset))?
        };
        block.push(stmt);
        *pos += 1;
    }
    Ok(block)
}

fn parse_nested(
    lines: &[Line<'_>],
    pos: &mut usize,
    indent: usize,
    offset: usize,
) -> Result<Vec<Stmt>, ScriptError> {
    match lines.get(*pos) {
        Some(next) if next.indent > indent => parse_block(lines, pos, next.indent),
        _ => Err(syntax(offset, "expected an indented block")),
    }
}

fn parse_condition(rest: &str, offset: usize) -> Result<Expr, ScriptError> {
    let Some(cond) = rest.trim_end().strip_suffix(':') else {
        return Err(syntax(offset, "expected ':'"));
    };
    parse_expr(cond).map_err(|e| shift(e, offset))
}

fn parse_assignment(text: &str) -> Result<Stmt, ScriptError> {
    let tokens = tokenize(text)?;
    match (tokens.first(), tokens.get(1)) {
        (Some(Token { tok: Tok::Ident(name), .. }), Some(Token { tok: Tok::Op("="), pos })) => {
            let mut parser = Parser::new(tokens[2..].to_vec());
            let expr = parser.expr().map_err(|e| shift(e, pos + 1))?;
            parser.expect_end()?;
            Ok(Stmt::Assign(name.clone(), expr))
        }
        _ => Err(syntax(0, "expected an assignment, if or return statement")),
    }
}

fn shift(err: ScriptError, by: usize) -> ScriptError {
    match err {
        ScriptError::Syntax { pos, message } => ScriptError::Syntax { pos: pos + by, message },
        other => other,
    }
}

const RESERVED: [&str; 12] = [
    "and", "or", "not", "if", "else", "elif", "in", "return", "True", "False", "None", "pass",
];

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &Tok {
        self.tokens.get(self.pos).map_or(&Tok::Eof, |t| &t.tok)
    }

    fn peek_at(&self, offset: usize) -> &Tok {
        self.tokens.get(self.pos + offset).map_or(&Tok::Eof, |t| &t.tok)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(0, |t| t.pos)
    }

    fn advance(&mut self) -> Tok {
        let tok = self.peek().clone();
        self.pos += 1;
        tok
    }

    fn is_op(&self, op: &str) -> bool {
        matches!(self.peek(), Tok::Op(o) if *o == op)
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Tok::Ident(k) if k == keyword)
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if self.is_op(op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.is_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: &str) -> Result<(), ScriptError> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(syntax(self.offset(), format!("expected '{op}', found {:?}", self.peek())))
        }
    }

    fn expect_end(&self) -> Result<(), ScriptError> {
        match self.peek() {
            Tok::Eof => Ok(()),
            other => Err(syntax(self.offset(), format!("unexpected {other:?}"))),
        }
    }

    fn expr(&mut self) -> Result<Expr, ScriptError> {
        let then = self.or_expr()?;
        if self.eat_keyword("if") {
            let cond = self.or_expr()?;
            if !self.eat_keyword("else") {
                return Err(syntax(self.offset(), "expected 'else' in conditional expression"));
            }
            let otherwise = self.expr()?;
            return Ok(Expr::Cond {
                then: Box::new(then),
                cond: Box::new(cond),
                otherwise: Box::new(otherwise),
            });
        }
        Ok(then)
    }

    fn or_expr(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.and_expr()?;
        while self.eat_keyword("or") {
            let rhs = self.and_expr()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.not_expr()?;
        while self.eat_keyword("and") {
            let rhs = self.not_expr()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<Expr, ScriptError> {
        if self.eat_keyword("not") {
            let operand = self.not_expr()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.sum()?;
        loop {
            let op = match self.peek() {
                Tok::Op("==") => BinOp::Eq,
                Tok::Op("!=") => BinOp::Ne,
                Tok::Op("<") => BinOp::Lt,
                Tok::Op("<=") => BinOp::Le,
                Tok::Op(">") => BinOp::Gt,
                Tok::Op(">=") => BinOp::Ge,
                Tok::Ident(k) if k == "in" => BinOp::In,
                Tok::Ident(k) if k == "not" && matches!(self.peek_at(1), Tok::Ident(n) if n == "in") => {
                    BinOp::NotIn
                }
                _ => break,
            };
            self.pos += if op == BinOp::NotIn { 2 } else { 1 };
            let rhs = self.sum()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn sum(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Tok::Op("+") => BinOp::Add,
                Tok::Op("-") => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Tok::Op("*") => BinOp::Mul,
                Tok::Op("/") => BinOp::Div,
                Tok::Op("//") => BinOp::FloorDiv,
                Tok::Op("%") => BinOp::Mod,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ScriptError> {
        if self.eat_op("-") {
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.unary()?)));
        }
        if self.eat_op("+") {
            return Ok(Expr::Unary(UnaryOp::Pos, Box::new(self.unary()?)));
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr, ScriptError> {
        let base = self.postfix()?;
        if self.eat_op("**") {
            let exponent = self.unary()?;
            return Ok(Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = self.atom()?;
        while self.eat_op("[") {
            let index = self.expr()?;
            self.expect_op("]")?;
            expr = Expr::Index(Box::new(expr), Box::new(index));
        }
        Ok(expr)
    }

    fn atom(&mut self) -> Result<Expr, ScriptError> {
        let pos = self.offset();
        match self.advance() {
            Tok::Int(i) => Ok(Expr::Literal(Value::Int(i))),
            Tok::Float(f) => Ok(Expr::Literal(Value::Float(f))),
            Tok::Str(mut s) => {
                // adjacent string literals concatenate
                while let Tok::Str(next) = self.peek().clone() {
                    s.push_str(&next);
                    self.pos += 1;
                }
                Ok(Expr::Literal(Value::Str(s)))
            }
            Tok::Ref(token) => Ok(Expr::Ref(token)),
            Tok::Ident(name) => {
                match name.as_str() {
                    "True" => return Ok(Expr::Literal(Value::Bool(true))),
                    "False" => return Ok(Expr::Literal(Value::Bool(false))),
                    "None" => return Ok(Expr::Literal(Value::None)),
                    reserved if RESERVED.contains(&reserved) => {
                        return Err(syntax(pos, format!("unexpected keyword '{reserved}'")));
                    }
                    _ => {}
                }
                if self.eat_op("(") {
                    let args = self.sequence(")")?;
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Name(name))
                }
            }
            Tok::Op("(") => {
                let expr = self.expr()?;
                self.expect_op(")")?;
                Ok(expr)
            }
            Tok::Op("[") => Ok(Expr::List(self.sequence("]")?)),
            Tok::Op("{") => {
                let mut entries = Vec::new();
                while !self.eat_op("}") {
                    let key = self.expr()?;
                    self.expect_op(":")?;
                    let value = self.expr()?;
                    entries.push((key, value));
                    if !self.eat_op(",") {
                        self.expect_op("}")?;
                        break;
                    }
                }
                Ok(Expr::Dict(entries))
            }
            other => Err(syntax(pos, format!("unexpected {other:?}"))),
        }
    }

    fn sequence(&mut self, close: &str) -> Result<Vec<Expr>, ScriptError> {
        let mut items = Vec::new();
        while !self.eat_op(close) {
            items.push(self.expr()?);
            if !self.eat_op(",") {
                self.expect_op(close)?;
                break;
            }
        }
        Ok(items)
    }
}
