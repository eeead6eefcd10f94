// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Expression parsing and evaluation.
//!
//! A self-contained recursive-descent interpreter over the assembler's
//! expression language: integer/float arithmetic, comparisons, strings
//! with `{expr}` interpolation, list literals, a closed builtin function
//! table and single-parameter lambda literals (`|x| expr`). No host code
//! is ever executed on behalf of source text.
//!
//! The public entry points mirror the coercion ladder used by the
//! directive and instruction encoders: [`expression`] yields a [`Value`],
//! [`int_expression`] coerces to integer (warning on float truncation),
//! [`byte_expression`] and [`word_expression`] range-check and mask to 8
//! or 16 bits. All failures are reported as diagnostics and replaced by a
//! defined fallback so a pass always runs to completion.

use std::fmt;
use std::rc::Rc;

use crate::core::context::Context;
use crate::core::petscii;

/// Error returned from expression parsing or evaluation.
#[derive(Debug, Clone)]
pub struct EvalError {
    pub message: String,
}

impl EvalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EvalError {}

/// Host function registered through the extension interface.
pub type NativeImpl = Rc<dyn Fn(&[Value]) -> Result<Value, EvalError>>;

#[derive(Clone)]
pub struct NativeFn {
    pub name: String,
    pub func: NativeImpl,
}

/// Single-parameter function literal.
#[derive(Debug, Clone)]
pub struct Lambda {
    pub param: String,
    pub body: Rc<Ast>,
}

impl Lambda {
    /// The identity function, used as the fallback when a function value
    /// was expected but not produced.
    pub fn identity() -> Self {
        Self {
            param: "x".to_string(),
            body: Rc::new(Ast::Ident("x".to_string())),
        }
    }
}

/// Result of evaluating an expression.
#[derive(Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Lambda(Lambda),
    Native(NativeFn),
}

impl Value {
    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Lambda(_) | Value::Native(_))
    }

    fn truthy(&self) -> bool {
        match self {
            Value::Int(v) => *v != 0,
            Value::Float(v) => *v != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(l) => !l.is_empty(),
            Value::Lambda(_) | Value::Native(_) => true,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "Int({v})"),
            Value::Float(v) => write!(f, "Float({v})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::List(l) => write!(f, "List({l:?})"),
            Value::Lambda(l) => write!(f, "Lambda(|{}| ...)", l.param),
            Value::Native(n) => write!(f, "Native({})", n.name),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            _ => false,
        }
    }
}

/// Render a value the way it appears in `.print` output and string
/// interpolation.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Int(v) => format!("{v}"),
        Value::Float(v) => format!("{v}"),
        Value::Str(s) => s.clone(),
        Value::List(l) => {
            let inner: Vec<String> = l.iter().map(format_value).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Lambda(l) => format!("|{}| <function>", l.param),
        Value::Native(n) => format!("<function {}>", n.name),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Minus,
    BitNot,
    LogicNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Mod,
    Power,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LogicAnd,
    LogicOr,
}

/// Pieces of an interpolated string literal.
#[derive(Debug, Clone, PartialEq)]
pub enum StrPiece {
    Lit(String),
    Expr(Box<Ast>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    Int(i64),
    Float(f64),
    Str(Vec<StrPiece>),
    Ident(String),
    List(Vec<Ast>),
    Unary(UnaryOp, Box<Ast>),
    Binary(BinaryOp, Box<Ast>, Box<Ast>),
    Call(String, Vec<Ast>),
    Lambda(String, Rc<Ast>),
}

// ---------------------------------------------------------------------------
// Lexing

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Int(i64),
    Float(f64),
    Str { text: String, interpolated: bool },
    Ident(String),
    Op(&'static str),
    End,
}

struct Scanner<'a> {
    input: &'a [u8],
    cursor: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            input: text.as_bytes(),
            cursor: 0,
        }
    }

    fn peek(&self, offset: usize) -> u8 {
        self.input.get(self.cursor + offset).copied().unwrap_or(0)
    }

    fn next_tok(&mut self) -> Result<Tok, EvalError> {
        while matches!(self.peek(0), b' ' | b'\t' | b'\r' | b'\n') {
            self.cursor += 1;
        }
        let c = self.peek(0);
        if c == 0 {
            return Ok(Tok::End);
        }

        if c.is_ascii_digit() {
            return self.scan_number();
        }
        if c.is_ascii_alphabetic() || c == b'_' {
            let start = self.cursor;
            while self.peek(0).is_ascii_alphanumeric() || self.peek(0) == b'_' {
                self.cursor += 1;
            }
            let text = std::str::from_utf8(&self.input[start..self.cursor])
                .map_err(|_| EvalError::new("Invalid identifier"))?;
            return Ok(Tok::Ident(text.to_string()));
        }
        if c == b'"' || c == b'\'' {
            return self.scan_string(c);
        }

        let two: &[u8] = &[self.peek(0), self.peek(1)];
        let op2 = match two {
            b"**" => Some("**"),
            b"<<" => Some("<<"),
            b">>" => Some(">>"),
            b"<=" => Some("<="),
            b">=" => Some(">="),
            b"==" => Some("=="),
            b"!=" => Some("!="),
            b"&&" => Some("&&"),
            b"||" => Some("||"),
            _ => None,
        };
        if let Some(op) = op2 {
            self.cursor += 2;
            return Ok(Tok::Op(op));
        }

        let op1 = match c {
            b'+' => "+",
            b'-' => "-",
            b'*' => "*",
            b'/' => "/",
            b'%' => "%",
            b'&' => "&",
            b'|' => "|",
            b'^' => "^",
            b'~' => "~",
            b'!' => "!",
            b'<' => "<",
            b'>' => ">",
            b'(' => "(",
            b')' => ")",
            b'[' => "[",
            b']' => "]",
            b',' => ",",
            _ => {
                return Err(EvalError::new(format!(
                    "Illegal character in expression: {}",
                    c as char
                )))
            }
        };
        self.cursor += 1;
        Ok(Tok::Op(op1))
    }

    fn scan_number(&mut self) -> Result<Tok, EvalError> {
        let start = self.cursor;
        while self.peek(0).is_ascii_alphanumeric() || self.peek(0) == b'_' || self.peek(0) == b'.'
        {
            // A dot only belongs to the number when a digit follows.
            if self.peek(0) == b'.' && !self.peek(1).is_ascii_digit() {
                break;
            }
            self.cursor += 1;
        }
        let raw = std::str::from_utf8(&self.input[start..self.cursor])
            .map_err(|_| EvalError::new("Invalid number"))?;
        let text: String = raw.chars().filter(|&c| c != '_').collect();

        let invalid = || EvalError::new(format!("Invalid number: {raw}"));
        if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            return i64::from_str_radix(hex, 16)
                .map(Tok::Int)
                .map_err(|_| invalid());
        }
        if let Some(bin) = text.strip_prefix("0b").or_else(|| text.strip_prefix("0B")) {
            return i64::from_str_radix(bin, 2)
                .map(Tok::Int)
                .map_err(|_| invalid());
        }
        if text.contains('.') {
            return text.parse::<f64>().map(Tok::Float).map_err(|_| invalid());
        }
        if let Ok(value) = text.parse::<i64>() {
            return Ok(Tok::Int(value));
        }
        // Exponent notation like 1e5 lexes as a single word.
        text.parse::<f64>().map(Tok::Float).map_err(|_| invalid())
    }

    fn scan_string(&mut self, quote: u8) -> Result<Tok, EvalError> {
        let start = self.cursor;
        self.cursor += 1;
        while self.peek(0) != 0 && self.peek(0) != quote {
            self.cursor += 1;
        }
        if self.peek(0) != quote {
            return Err(EvalError::new(format!(
                "Unterminated string: {}",
                String::from_utf8_lossy(&self.input[start..])
            )));
        }
        let text = String::from_utf8_lossy(&self.input[start + 1..self.cursor]).to_string();
        self.cursor += 1;
        Ok(Tok::Str {
            text,
            interpolated: quote == b'"',
        })
    }
}

// ---------------------------------------------------------------------------
// Parsing

struct Parser<'a> {
    scanner: Scanner<'a>,
    current: Tok,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Result<Self, EvalError> {
        let mut scanner = Scanner::new(text);
        let current = scanner.next_tok()?;
        Ok(Self { scanner, current })
    }

    fn advance(&mut self) -> Result<Tok, EvalError> {
        let next = self.scanner.next_tok()?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn eat_op(&mut self, op: &str) -> Result<bool, EvalError> {
        if self.current == Tok::Op(match_static(op)) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect_op(&mut self, op: &'static str) -> Result<(), EvalError> {
        if !self.eat_op(op)? {
            return Err(EvalError::new(format!("Expected '{op}'")));
        }
        Ok(())
    }

    fn parse_expr(&mut self) -> Result<Ast, EvalError> {
        if self.current == Tok::Op("|") {
            return self.parse_lambda();
        }
        self.parse_logic_or()
    }

    fn parse_lambda(&mut self) -> Result<Ast, EvalError> {
        self.expect_op("|")?;
        let param = match self.advance()? {
            Tok::Ident(name) => name,
            _ => return Err(EvalError::new("Expected parameter name in function literal")),
        };
        self.expect_op("|")?;
        let body = self.parse_expr()?;
        Ok(Ast::Lambda(param, Rc::new(body)))
    }

    fn parse_logic_or(&mut self) -> Result<Ast, EvalError> {
        let mut left = self.parse_logic_and()?;
        while self.eat_op("||")? {
            let right = self.parse_logic_and()?;
            left = Ast::Binary(BinaryOp::LogicOr, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_logic_and(&mut self) -> Result<Ast, EvalError> {
        let mut left = self.parse_comparison()?;
        while self.eat_op("&&")? {
            let right = self.parse_comparison()?;
            left = Ast::Binary(BinaryOp::LogicAnd, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Ast, EvalError> {
        let mut left = self.parse_bit_or()?;
        loop {
            let op = match &self.current {
                Tok::Op("==") => BinaryOp::Eq,
                Tok::Op("!=") => BinaryOp::Ne,
                Tok::Op("<") => BinaryOp::Lt,
                Tok::Op("<=") => BinaryOp::Le,
                Tok::Op(">") => BinaryOp::Gt,
                Tok::Op(">=") => BinaryOp::Ge,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_bit_or()?;
            left = Ast::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_bit_or(&mut self) -> Result<Ast, EvalError> {
        let mut left = self.parse_bit_xor()?;
        while self.eat_op("|")? {
            let right = self.parse_bit_xor()?;
            left = Ast::Binary(BinaryOp::BitOr, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_bit_xor(&mut self) -> Result<Ast, EvalError> {
        let mut left = self.parse_bit_and()?;
        while self.eat_op("^")? {
            let right = self.parse_bit_and()?;
            left = Ast::Binary(BinaryOp::BitXor, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_bit_and(&mut self) -> Result<Ast, EvalError> {
        let mut left = self.parse_shift()?;
        while self.eat_op("&")? {
            let right = self.parse_shift()?;
            left = Ast::Binary(BinaryOp::BitAnd, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_shift(&mut self) -> Result<Ast, EvalError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match &self.current {
                Tok::Op("<<") => BinaryOp::Shl,
                Tok::Op(">>") => BinaryOp::Shr,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_additive()?;
            left = Ast::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Ast, EvalError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match &self.current {
                Tok::Op("+") => BinaryOp::Add,
                Tok::Op("-") => BinaryOp::Subtract,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_multiplicative()?;
            left = Ast::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Ast, EvalError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match &self.current {
                Tok::Op("*") => BinaryOp::Multiply,
                Tok::Op("/") => BinaryOp::Divide,
                Tok::Op("%") => BinaryOp::Mod,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_unary()?;
            left = Ast::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Ast, EvalError> {
        let op = match &self.current {
            Tok::Op("-") => Some(UnaryOp::Minus),
            Tok::Op("~") => Some(UnaryOp::BitNot),
            Tok::Op("!") => Some(UnaryOp::LogicNot),
            Tok::Op("+") => None, // unary plus is a no-op
            _ => return self.parse_power(),
        };
        self.advance()?;
        let operand = self.parse_unary()?;
        Ok(match op {
            Some(op) => Ast::Unary(op, Box::new(operand)),
            None => operand,
        })
    }

    fn parse_power(&mut self) -> Result<Ast, EvalError> {
        let base = self.parse_primary()?;
        if self.eat_op("**")? {
            // Right-associative; the exponent may itself be unary.
            let exponent = self.parse_unary()?;
            return Ok(Ast::Binary(
                BinaryOp::Power,
                Box::new(base),
                Box::new(exponent),
            ));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Ast, EvalError> {
        match self.advance()? {
            Tok::Int(v) => Ok(Ast::Int(v)),
            Tok::Float(v) => Ok(Ast::Float(v)),
            Tok::Str { text, interpolated } => parse_str_pieces(&text, interpolated),
            Tok::Ident(name) => {
                if self.eat_op("(")? {
                    let args = self.parse_args(")")?;
                    Ok(Ast::Call(name, args))
                } else {
                    Ok(Ast::Ident(name))
                }
            }
            Tok::Op("(") => {
                let inner = self.parse_expr()?;
                self.expect_op(")")?;
                Ok(inner)
            }
            Tok::Op("[") => {
                let items = self.parse_args("]")?;
                Ok(Ast::List(items))
            }
            Tok::Op("|") => {
                // Function literal in value position.
                let param = match self.advance()? {
                    Tok::Ident(name) => name,
                    _ => {
                        return Err(EvalError::new(
                            "Expected parameter name in function literal",
                        ))
                    }
                };
                self.expect_op("|")?;
                let body = self.parse_expr()?;
                Ok(Ast::Lambda(param, Rc::new(body)))
            }
            Tok::End => Err(EvalError::new("Unexpected end of expression")),
            tok => Err(EvalError::new(format!("Unexpected token: {tok:?}"))),
        }
    }

    fn parse_args(&mut self, close: &'static str) -> Result<Vec<Ast>, EvalError> {
        let mut args = Vec::new();
        if self.eat_op(close)? {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if self.eat_op(",")? {
                continue;
            }
            self.expect_op(close)?;
            return Ok(args);
        }
    }
}

fn match_static(op: &str) -> &'static str {
    match op {
        "**" => "**",
        "<<" => "<<",
        ">>" => ">>",
        "<=" => "<=",
        ">=" => ">=",
        "==" => "==",
        "!=" => "!=",
        "&&" => "&&",
        "||" => "||",
        "+" => "+",
        "-" => "-",
        "*" => "*",
        "/" => "/",
        "%" => "%",
        "&" => "&",
        "|" => "|",
        "^" => "^",
        "~" => "~",
        "!" => "!",
        "<" => "<",
        ">" => ">",
        "(" => "(",
        ")" => ")",
        "[" => "[",
        "]" => "]",
        "," => ",",
        _ => "",
    }
}

/// Split a string literal body into literal and `{expr}` pieces.
fn parse_str_pieces(text: &str, interpolated: bool) -> Result<Ast, EvalError> {
    if !interpolated {
        return Ok(Ast::Str(vec![StrPiece::Lit(text.to_string())]));
    }
    let mut pieces = Vec::new();
    let mut lit = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '{' {
            let mut inner = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                inner.push(c);
            }
            if !closed {
                return Err(EvalError::new(format!(
                    "Unterminated interpolation in string: \"{text}\""
                )));
            }
            if !lit.is_empty() {
                pieces.push(StrPiece::Lit(std::mem::take(&mut lit)));
            }
            pieces.push(StrPiece::Expr(Box::new(parse(&inner)?)));
        } else {
            lit.push(c);
        }
    }
    if !lit.is_empty() || pieces.is_empty() {
        pieces.push(StrPiece::Lit(lit));
    }
    Ok(Ast::Str(pieces))
}

/// Parse a single expression; trailing input is an error.
pub fn parse(text: &str) -> Result<Ast, EvalError> {
    let mut parser = Parser::new(text)?;
    let ast = parser.parse_expr()?;
    if parser.current != Tok::End {
        return Err(EvalError::new(format!(
            "Unexpected trailing input in expression: \"{text}\""
        )));
    }
    Ok(ast)
}

/// Parse a directive argument list. Arguments are separated by commas;
/// the comma may be omitted between two complete expressions, so both
/// `.repeat "i", 3` and `.repeat "i" 3` parse.
pub fn parse_list(text: &str) -> Result<Vec<Ast>, EvalError> {
    let mut parser = Parser::new(text)?;
    let mut items = Vec::new();
    while parser.current != Tok::End {
        items.push(parser.parse_expr()?);
        parser.eat_op(",")?;
    }
    Ok(items)
}

// ---------------------------------------------------------------------------
// Evaluation

fn eval(ast: &Ast, ctx: &Context, local: Option<(&str, &Value)>) -> Result<Value, EvalError> {
    match ast {
        Ast::Int(v) => Ok(Value::Int(*v)),
        Ast::Float(v) => Ok(Value::Float(*v)),
        Ast::Str(pieces) => {
            let mut out = String::new();
            for piece in pieces {
                match piece {
                    StrPiece::Lit(s) => out.push_str(s),
                    StrPiece::Expr(inner) => {
                        out.push_str(&format_value(&eval(inner, ctx, local)?))
                    }
                }
            }
            Ok(Value::Str(out))
        }
        Ast::Ident(name) => lookup(name, ctx, local),
        Ast::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(eval(item, ctx, local)?);
            }
            Ok(Value::List(out))
        }
        Ast::Unary(op, operand) => apply_unary(*op, &eval(operand, ctx, local)?),
        Ast::Binary(op, left, right) => {
            // Short-circuit the logical operators.
            match op {
                BinaryOp::LogicAnd => {
                    let l = eval(left, ctx, local)?;
                    if !l.truthy() {
                        return Ok(Value::Int(0));
                    }
                    return Ok(Value::Int(eval(right, ctx, local)?.truthy() as i64));
                }
                BinaryOp::LogicOr => {
                    let l = eval(left, ctx, local)?;
                    if l.truthy() {
                        return Ok(Value::Int(1));
                    }
                    return Ok(Value::Int(eval(right, ctx, local)?.truthy() as i64));
                }
                _ => {}
            }
            let l = eval(left, ctx, local)?;
            let r = eval(right, ctx, local)?;
            apply_binary(*op, &l, &r)
        }
        Ast::Call(name, args) => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval(arg, ctx, local)?);
            }
            call_named(name, &values, ctx, local)
        }
        Ast::Lambda(param, body) => Ok(Value::Lambda(Lambda {
            param: param.clone(),
            body: Rc::clone(body),
        })),
    }
}

fn lookup(name: &str, ctx: &Context, local: Option<(&str, &Value)>) -> Result<Value, EvalError> {
    if let Some((param, value)) = local {
        if param == name {
            return Ok(value.clone());
        }
    }
    if let Some(value) = ctx.symbols.get(name) {
        return Ok(value.clone());
    }
    Err(EvalError::new(format!("Name '{name}' is not defined")))
}

fn call_named(
    name: &str,
    args: &[Value],
    ctx: &Context,
    local: Option<(&str, &Value)>,
) -> Result<Value, EvalError> {
    if let Some((param, value)) = local {
        if param == name && value.is_callable() {
            return call_value(&value.clone(), args, ctx);
        }
    }
    if let Some(value) = ctx.symbols.get(name) {
        if value.is_callable() {
            return call_value(&value.clone(), args, ctx);
        }
        return Err(EvalError::new(format!("'{name}' is not callable")));
    }
    call_builtin(name, args, ctx)
}

/// Invoke a function value (lambda or registered native).
pub fn call_value(callee: &Value, args: &[Value], ctx: &Context) -> Result<Value, EvalError> {
    match callee {
        Value::Lambda(lambda) => {
            if args.len() != 1 {
                return Err(EvalError::new(format!(
                    "Function expects one argument, got {}",
                    args.len()
                )));
            }
            eval(&lambda.body, ctx, Some((&lambda.param, &args[0])))
        }
        Value::Native(native) => (native.func)(args),
        _ => Err(EvalError::new("Value is not callable")),
    }
}

fn apply_unary(op: UnaryOp, value: &Value) -> Result<Value, EvalError> {
    match (op, value) {
        (UnaryOp::Minus, Value::Int(v)) => Ok(Value::Int(v.wrapping_neg())),
        (UnaryOp::Minus, Value::Float(v)) => Ok(Value::Float(-v)),
        (UnaryOp::BitNot, Value::Int(v)) => Ok(Value::Int(!v)),
        (UnaryOp::LogicNot, v) => Ok(Value::Int(!v.truthy() as i64)),
        _ => Err(EvalError::new("Unsupported operand type for unary operator")),
    }
}

fn numeric_pair(l: &Value, r: &Value) -> Option<(f64, f64)> {
    let as_f64 = |v: &Value| match v {
        Value::Int(v) => Some(*v as f64),
        Value::Float(v) => Some(*v),
        _ => None,
    };
    Some((as_f64(l)?, as_f64(r)?))
}

fn int_pair(l: &Value, r: &Value) -> Result<(i64, i64), EvalError> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => Ok((*a, *b)),
        _ => Err(EvalError::new("Operator requires integer operands")),
    }
}

fn apply_binary(op: BinaryOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
    match op {
        BinaryOp::Add => match (l, r) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_add(*b))),
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
            (Value::List(a), Value::List(b)) => {
                let mut out = a.clone();
                out.extend(b.iter().cloned());
                Ok(Value::List(out))
            }
            _ => numeric_pair(l, r)
                .map(|(a, b)| Value::Float(a + b))
                .ok_or_else(|| EvalError::new("Unsupported operand types for +")),
        },
        BinaryOp::Subtract => match (l, r) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_sub(*b))),
            _ => numeric_pair(l, r)
                .map(|(a, b)| Value::Float(a - b))
                .ok_or_else(|| EvalError::new("Unsupported operand types for -")),
        },
        BinaryOp::Multiply => match (l, r) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_mul(*b))),
            (Value::Str(s), Value::Int(n)) | (Value::Int(n), Value::Str(s)) => {
                Ok(Value::Str(s.repeat((*n).max(0) as usize)))
            }
            (Value::List(items), Value::Int(n)) | (Value::Int(n), Value::List(items)) => {
                let mut out = Vec::new();
                for _ in 0..(*n).max(0) {
                    out.extend(items.iter().cloned());
                }
                Ok(Value::List(out))
            }
            _ => numeric_pair(l, r)
                .map(|(a, b)| Value::Float(a * b))
                .ok_or_else(|| EvalError::new("Unsupported operand types for *")),
        },
        BinaryOp::Divide => {
            let (a, b) =
                numeric_pair(l, r).ok_or_else(|| EvalError::new("Unsupported operand types for /"))?;
            if b == 0.0 {
                return Err(EvalError::new("Division by zero"));
            }
            Ok(Value::Float(a / b))
        }
        // The remainder follows the divisor's sign: 7 % -3 is -2.
        BinaryOp::Mod => match (l, r) {
            (Value::Int(a), Value::Int(b)) => {
                if *b == 0 {
                    return Err(EvalError::new("Modulo by zero"));
                }
                let mut rem = a.wrapping_rem(*b);
                if rem != 0 && (rem < 0) != (*b < 0) {
                    rem += b;
                }
                Ok(Value::Int(rem))
            }
            _ => {
                let (a, b) = numeric_pair(l, r)
                    .ok_or_else(|| EvalError::new("Unsupported operand types for %"))?;
                if b == 0.0 {
                    return Err(EvalError::new("Modulo by zero"));
                }
                let mut rem = a % b;
                if rem != 0.0 && (rem < 0.0) != (b < 0.0) {
                    rem += b;
                }
                Ok(Value::Float(rem))
            }
        },
        BinaryOp::Power => match (l, r) {
            (Value::Int(a), Value::Int(b)) if *b >= 0 => {
                Ok(Value::Int(a.wrapping_pow((*b).min(u32::MAX as i64) as u32)))
            }
            _ => numeric_pair(l, r)
                .map(|(a, b)| Value::Float(a.powf(b)))
                .ok_or_else(|| EvalError::new("Unsupported operand types for **")),
        },
        BinaryOp::Shl => {
            let (a, b) = int_pair(l, r)?;
            Ok(Value::Int(a << (b & 0x3f)))
        }
        BinaryOp::Shr => {
            let (a, b) = int_pair(l, r)?;
            Ok(Value::Int(((a as u64) >> (b & 0x3f)) as i64))
        }
        BinaryOp::BitAnd => {
            let (a, b) = int_pair(l, r)?;
            Ok(Value::Int(a & b))
        }
        BinaryOp::BitOr => {
            let (a, b) = int_pair(l, r)?;
            Ok(Value::Int(a | b))
        }
        BinaryOp::BitXor => {
            let (a, b) = int_pair(l, r)?;
            Ok(Value::Int(a ^ b))
        }
        BinaryOp::Eq => Ok(Value::Int((l == r) as i64)),
        BinaryOp::Ne => Ok(Value::Int((l != r) as i64)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (l, r) {
                (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
                _ => numeric_pair(l, r).and_then(|(a, b)| a.partial_cmp(&b)),
            }
            .ok_or_else(|| EvalError::new("Unsupported operand types for comparison"))?;
            let result = match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            };
            Ok(Value::Int(result as i64))
        }
        BinaryOp::LogicAnd | BinaryOp::LogicOr => unreachable!("short-circuited in eval"),
    }
}

fn call_builtin(name: &str, args: &[Value], ctx: &Context) -> Result<Value, EvalError> {
    let arity = |n: usize| -> Result<(), EvalError> {
        if args.len() != n {
            return Err(EvalError::new(format!(
                "{name}() takes {n} argument(s), got {}",
                args.len()
            )));
        }
        Ok(())
    };
    let float_arg = |v: &Value| -> Result<f64, EvalError> {
        match v {
            Value::Int(v) => Ok(*v as f64),
            Value::Float(v) => Ok(*v),
            _ => Err(EvalError::new(format!("{name}() expects a number"))),
        }
    };
    let int_arg = |v: &Value| -> Result<i64, EvalError> {
        match v {
            Value::Int(v) => Ok(*v),
            _ => Err(EvalError::new(format!("{name}() expects an integer"))),
        }
    };

    match name {
        "lo" => {
            arity(1)?;
            Ok(Value::Int(int_arg(&args[0])? & 0xff))
        }
        "hi" => {
            arity(1)?;
            Ok(Value::Int((int_arg(&args[0])? >> 8) & 0xff))
        }
        "chr" => {
            arity(1)?;
            let code = int_arg(&args[0])?;
            let c = petscii::chr(ctx.encoding, code)
                .ok_or_else(|| EvalError::new(format!("Unknown character code: {code}")))?;
            Ok(Value::Str(c.to_string()))
        }
        "ord" => {
            arity(1)?;
            match &args[0] {
                Value::Str(s) if s.chars().count() == 1 => {
                    let c = s.chars().next().unwrap_or('\0');
                    let code = petscii::ord(ctx.encoding, c)
                        .ok_or_else(|| EvalError::new(format!("Unknown character \"{c}\"")))?;
                    Ok(Value::Int(code as i64))
                }
                _ => Err(EvalError::new("ord() expects a single character")),
            }
        }
        "len" => {
            arity(1)?;
            match &args[0] {
                Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
                Value::List(l) => Ok(Value::Int(l.len() as i64)),
                _ => Err(EvalError::new("len() expects text or a list")),
            }
        }
        "abs" => {
            arity(1)?;
            match &args[0] {
                Value::Int(v) => Ok(Value::Int(v.wrapping_abs())),
                Value::Float(v) => Ok(Value::Float(v.abs())),
                _ => Err(EvalError::new("abs() expects a number")),
            }
        }
        "min" | "max" => {
            if args.len() < 2 {
                return Err(EvalError::new(format!("{name}() takes at least 2 arguments")));
            }
            let mut best = args[0].clone();
            for arg in &args[1..] {
                let (a, b) = numeric_pair(&best, arg)
                    .ok_or_else(|| EvalError::new(format!("{name}() expects numbers")))?;
                let replace = if name == "min" { b < a } else { b > a };
                if replace {
                    best = arg.clone();
                }
            }
            Ok(best)
        }
        "round" => {
            arity(1)?;
            Ok(Value::Int(float_arg(&args[0])?.round() as i64))
        }
        "floor" => {
            arity(1)?;
            Ok(Value::Int(float_arg(&args[0])?.floor() as i64))
        }
        "ceil" => {
            arity(1)?;
            Ok(Value::Int(float_arg(&args[0])?.ceil() as i64))
        }
        "sqrt" => {
            arity(1)?;
            Ok(Value::Float(float_arg(&args[0])?.sqrt()))
        }
        "pow" => {
            arity(2)?;
            Ok(Value::Float(float_arg(&args[0])?.powf(float_arg(&args[1])?)))
        }
        "sin" => {
            arity(1)?;
            Ok(Value::Float(float_arg(&args[0])?.sin()))
        }
        "cos" => {
            arity(1)?;
            Ok(Value::Float(float_arg(&args[0])?.cos()))
        }
        "tan" => {
            arity(1)?;
            Ok(Value::Float(float_arg(&args[0])?.tan()))
        }
        "atan" => {
            arity(1)?;
            Ok(Value::Float(float_arg(&args[0])?.atan()))
        }
        "log" => {
            arity(1)?;
            Ok(Value::Float(float_arg(&args[0])?.ln()))
        }
        "exp" => {
            arity(1)?;
            Ok(Value::Float(float_arg(&args[0])?.exp()))
        }
        _ => Err(EvalError::new(format!("Name '{name}' is not defined"))),
    }
}

// ---------------------------------------------------------------------------
// Reporting entry points

/// Evaluate expression text against the environment. Any failure is
/// reported as one error diagnostic and `None` is returned.
pub fn expression(text: &str, ctx: &mut Context) -> Option<Value> {
    match parse(text).and_then(|ast| eval(&ast, ctx, None)) {
        Ok(value) => Some(value),
        Err(err) => {
            ctx.report_error(format!("{}: \"{}\"", err.message, text));
            None
        }
    }
}

/// Evaluate a directive argument list; a failure reports one error and
/// yields an empty list.
pub fn expression_list(text: &str, ctx: &mut Context) -> Vec<Value> {
    let parsed = match parse_list(text) {
        Ok(items) => items,
        Err(err) => {
            ctx.report_error(format!("{}: \"{}\"", err.message, text));
            return Vec::new();
        }
    };
    let mut values = Vec::with_capacity(parsed.len());
    for ast in &parsed {
        match eval(ast, ctx, None) {
            Ok(value) => values.push(value),
            Err(err) => {
                ctx.report_error(format!("{}: \"{}\"", err.message, text));
                return Vec::new();
            }
        }
    }
    values
}

/// Coerce an already-evaluated value to integer; float truncation warns,
/// anything non-numeric reports an error and yields 0.
pub fn int_value(value: &Value, ctx: &mut Context) -> i64 {
    match value {
        Value::Int(v) => *v,
        Value::Float(v) => {
            let truncated = v.trunc();
            if *v != truncated {
                ctx.report_warning(format!("Truncating float value: {v}"));
            }
            truncated as i64
        }
        other => {
            ctx.report_error(format!(
                "Expected an int value instead of: \"{}\"",
                format_value(other)
            ));
            0
        }
    }
}

/// Coerce to a byte. Accepted iff in `[-128, 255]`; out of range reports
/// one error. The low 8 bits are returned regardless.
pub fn byte_value(value: &Value, ctx: &mut Context) -> u8 {
    let v = int_value(value, ctx);
    if !(-128..=255).contains(&v) {
        ctx.report_error(format!("Byte value out of range: {v}"));
    }
    (v & 0xff) as u8
}

/// Coerce to a word. Accepted iff in `[-32768, 65535]`; out of range
/// reports one error. The low 16 bits are returned regardless.
pub fn word_value(value: &Value, ctx: &mut Context) -> u16 {
    let v = int_value(value, ctx);
    if !(-32768..=65535).contains(&v) {
        ctx.report_error(format!("Word value out of range: {v}"));
    }
    (v & 0xffff) as u16
}

pub fn int_expression(text: &str, ctx: &mut Context) -> i64 {
    match expression(text, ctx) {
        Some(value) => int_value(&value, ctx),
        None => 0,
    }
}

pub fn byte_expression(text: &str, ctx: &mut Context) -> u8 {
    match expression(text, ctx) {
        Some(value) => byte_value(&value, ctx),
        None => 0,
    }
}

pub fn word_expression(text: &str, ctx: &mut Context) -> u16 {
    match expression(text, ctx) {
        Some(value) => word_value(&value, ctx),
        None => 0,
    }
}

/// Validate that a value is callable; anything else reports an error and
/// falls back to the identity function.
pub fn function_value(value: &Value, ctx: &mut Context) -> Value {
    if value.is_callable() {
        value.clone()
    } else {
        ctx.report_error(format!(
            "Expected a function instead of: \"{}\"",
            format_value(value)
        ));
        Value::Lambda(Lambda::identity())
    }
}
