//! Template expression language.
//!
//! Expressions appear inside `{{ }}`, `@if`, `@elseif` and `@foreach`. The
//! grammar is a small scripting subset:
//!
//! ```text
//! ternary     = coalesce ( "?" ternary ":" ternary )?
//! coalesce    = or ( "??" coalesce )?
//! or          = and ( ( "||" | "or" ) and )*
//! and         = equality ( ( "&&" | "and" ) equality )*
//! equality    = compare ( ( "==" | "!=" | "===" | "!==" ) compare )*
//! compare     = concat ( ( "<" | "<=" | ">" | ">=" ) concat )*
//! concat      = additive ( "." additive )*
//! additive    = term ( ( "+" | "-" ) term )*
//! term        = unary ( ( "*" | "/" | "%" ) unary )*
//! unary       = ( "!" | "-" ) unary | postfix
//! postfix     = primary ( "[" ternary "]" | "->" ident )*
//! primary     = $var | string | number | true | false | null
//!             | func "(" args ")" | "(" ternary ")"
//! ```
//!
//! Undefined variables and missing keys evaluate to `null`.

use std::cmp::Ordering;

use serde_json::Value;

use crate::value::{self, ArithOp};

/// Read-only variable lookup used during evaluation.
pub(crate) trait Scope {
    fn lookup(&self, name: &str) -> Option<&Value>;
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Var(String),
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Arrow,
    FatArrow,
    Question,
    Colon,
    Coalesce,
    OrOr,
    AndAnd,
    Not,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Dot,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn tokenize(src: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        let next2 = chars.get(i + 2).copied();

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let (token, len) = match (c, next, next2) {
            ('$', Some(n), _) if is_ident_start(n) => {
                let end = (i + 1..chars.len())
                    .find(|&j| !is_ident_char(chars[j]))
                    .unwrap_or(chars.len());
                (Token::Var(chars[i + 1..end].iter().collect()), end - i)
            }
            (c, _, _) if is_ident_start(c) => {
                let end = (i..chars.len())
                    .find(|&j| !is_ident_char(chars[j]))
                    .unwrap_or(chars.len());
                (Token::Ident(chars[i..end].iter().collect()), end - i)
            }
            (c, _, _) if c.is_ascii_digit() => lex_number(&chars, i)?,
            ('\'' | '"', _, _) => lex_string(&chars, i)?,
            ('=', Some('='), Some('=')) => (Token::StrictEq, 3),
            ('!', Some('='), Some('=')) => (Token::StrictNe, 3),
            ('=', Some('='), _) => (Token::Eq, 2),
            ('=', Some('>'), _) => (Token::FatArrow, 2),
            ('!', Some('='), _) => (Token::Ne, 2),
            ('<', Some('='), _) => (Token::Le, 2),
            ('>', Some('='), _) => (Token::Ge, 2),
            ('?', Some('?'), _) => (Token::Coalesce, 2),
            ('|', Some('|'), _) => (Token::OrOr, 2),
            ('&', Some('&'), _) => (Token::AndAnd, 2),
            ('-', Some('>'), _) => (Token::Arrow, 2),
            ('(', _, _) => (Token::LParen, 1),
            (')', _, _) => (Token::RParen, 1),
            ('[', _, _) => (Token::LBracket, 1),
            (']', _, _) => (Token::RBracket, 1),
            (',', _, _) => (Token::Comma, 1),
            ('?', _, _) => (Token::Question, 1),
            (':', _, _) => (Token::Colon, 1),
            ('!', _, _) => (Token::Not, 1),
            ('<', _, _) => (Token::Lt, 1),
            ('>', _, _) => (Token::Gt, 1),
            ('+', _, _) => (Token::Plus, 1),
            ('-', _, _) => (Token::Minus, 1),
            ('*', _, _) => (Token::Star, 1),
            ('/', _, _) => (Token::Slash, 1),
            ('%', _, _) => (Token::Percent, 1),
            ('.', _, _) => (Token::Dot, 1),
            _ => return Err(format!("unexpected character '{c}'")),
        };

        tokens.push(token);
        i += len;
    }

    Ok(tokens)
}

fn lex_number(chars: &[char], start: usize) -> Result<(Token, usize), String> {
    let mut end = start;
    while end < chars.len() && chars[end].is_ascii_digit() {
        end += 1;
    }
    let mut is_float = false;
    if end + 1 < chars.len() && chars[end] == '.' && chars[end + 1].is_ascii_digit() {
        is_float = true;
        end += 1;
        while end < chars.len() && chars[end].is_ascii_digit() {
            end += 1;
        }
    }

    let text: String = chars[start..end].iter().collect();
    let token = if is_float {
        Token::Float(text.parse().map_err(|_| format!("invalid number '{text}'"))?)
    } else {
        Token::Int(text.parse().map_err(|_| format!("integer out of range '{text}'"))?)
    };
    Ok((token, end - start))
}

fn lex_string(chars: &[char], start: usize) -> Result<(Token, usize), String> {
    let quote = chars[start];
    let mut out = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        let c = chars[i];
        if c == quote {
            return Ok((Token::Str(out), i + 1 - start));
        }
        if c == '\\'
            && let Some(&escaped) = chars.get(i + 1)
        {
            let replacement = match (quote, escaped) {
                (_, '\\') => Some('\\'),
                (q, e) if e == q => Some(q),
                ('"', 'n') => Some('\n'),
                ('"', 't') => Some('\t'),
                ('"', 'r') => Some('\r'),
                ('"', '$') => Some('$'),
                _ => None,
            };
            if let Some(r) = replacement {
                out.push(r);
                i += 2;
                continue;
            }
        }
        out.push(c);
        i += 1;
    }

    Err("unterminated string literal".to_owned())
}

/// Built-in function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Func {
    Isset,
    Empty,
    Count,
    Upper,
    Lower,
    Trim,
}

impl Func {
    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "isset" => Some(Self::Isset),
            "empty" => Some(Self::Empty),
            "count" => Some(Self::Count),
            "strtoupper" => Some(Self::Upper),
            "strtolower" => Some(Self::Lower),
            "trim" => Some(Self::Trim),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
    Concat,
    Arith(ArithOp),
}

/// Parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    Var(String),
    Index(Box<Expr>, Box<Expr>),
    Prop(Box<Expr>, String),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Coalesce(Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    Call(Func, Vec<Expr>),
}

/// Header of a `foreach` block: `$items as $item` or `$items as $k => $v`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ForeachHeader {
    pub(crate) iterable: Expr,
    pub(crate) key: Option<String>,
    pub(crate) value: String,
}

/// Parse a complete expression.
pub(crate) fn parse_expression(src: &str) -> Result<Expr, String> {
    let mut parser = Parser::new(src)?;
    let expr = parser.ternary()?;
    parser.finish()?;
    Ok(expr)
}

/// Parse a `foreach` header.
pub(crate) fn parse_foreach(src: &str) -> Result<ForeachHeader, String> {
    let mut parser = Parser::new(src)?;
    let iterable = parser.ternary()?;

    match parser.advance() {
        Some(Token::Ident(kw)) if kw.eq_ignore_ascii_case("as") => {}
        _ => return Err(format!("expected 'as' in foreach header '{src}'")),
    }

    let first = parser.loop_var()?;
    let header = if parser.eat(&Token::FatArrow) {
        ForeachHeader {
            iterable,
            key: Some(first),
            value: parser.loop_var()?,
        }
    } else {
        ForeachHeader {
            iterable,
            key: None,
            value: first,
        }
    };
    parser.finish()?;
    Ok(header)
}

/// Returns `true` for names the engine reserves for itself.
pub(crate) fn is_reserved(name: &str) -> bool {
    name.starts_with("__")
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(src: &str) -> Result<Self, String> {
        let tokens = tokenize(src)?;
        if tokens.is_empty() {
            return Err("empty expression".to_owned());
        }
        Ok(Self { tokens, pos: 0 })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if let Some(Token::Ident(name)) = self.peek()
            && name.eq_ignore_ascii_case(keyword)
        {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), String> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(format!("expected {token:?}, found {:?}", self.peek()))
        }
    }

    fn finish(&self) -> Result<(), String> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(format!("unexpected {token:?}")),
        }
    }

    fn loop_var(&mut self) -> Result<String, String> {
        match self.advance() {
            Some(Token::Var(name)) if is_reserved(&name) => {
                Err(format!("loop variable ${name} is reserved"))
            }
            Some(Token::Var(name)) => Ok(name),
            other => Err(format!("expected loop variable, found {other:?}")),
        }
    }

    fn ternary(&mut self) -> Result<Expr, String> {
        let cond = self.coalesce()?;
        if !self.eat(&Token::Question) {
            return Ok(cond);
        }
        let then = self.ternary()?;
        self.expect(&Token::Colon)?;
        let otherwise = self.ternary()?;
        Ok(Expr::Ternary(Box::new(cond), Box::new(then), Box::new(otherwise)))
    }

    fn coalesce(&mut self) -> Result<Expr, String> {
        let left = self.or()?;
        if self.eat(&Token::Coalesce) {
            let right = self.coalesce()?;
            return Ok(Expr::Coalesce(Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn or(&mut self) -> Result<Expr, String> {
        let mut left = self.and()?;
        while self.eat(&Token::OrOr) || self.eat_keyword("or") {
            let right = self.and()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, String> {
        let mut left = self.equality()?;
        while self.eat(&Token::AndAnd) || self.eat_keyword("and") {
            let right = self.equality()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn binary_level(
        &mut self,
        ops: &[(Token, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr, String>,
    ) -> Result<Expr, String> {
        let mut left = next(self)?;
        'outer: loop {
            for (token, op) in ops {
                if self.eat(token) {
                    let right = next(self)?;
                    left = Expr::Binary(*op, Box::new(left), Box::new(right));
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    fn equality(&mut self) -> Result<Expr, String> {
        self.binary_level(
            &[
                (Token::StrictEq, BinaryOp::StrictEq),
                (Token::StrictNe, BinaryOp::StrictNe),
                (Token::Eq, BinaryOp::Eq),
                (Token::Ne, BinaryOp::Ne),
            ],
            Self::compare,
        )
    }

    fn compare(&mut self) -> Result<Expr, String> {
        self.binary_level(
            &[
                (Token::Le, BinaryOp::Le),
                (Token::Ge, BinaryOp::Ge),
                (Token::Lt, BinaryOp::Lt),
                (Token::Gt, BinaryOp::Gt),
            ],
            Self::concat,
        )
    }

    fn concat(&mut self) -> Result<Expr, String> {
        self.binary_level(&[(Token::Dot, BinaryOp::Concat)], Self::additive)
    }

    fn additive(&mut self) -> Result<Expr, String> {
        self.binary_level(
            &[
                (Token::Plus, BinaryOp::Arith(ArithOp::Add)),
                (Token::Minus, BinaryOp::Arith(ArithOp::Sub)),
            ],
            Self::term,
        )
    }

    fn term(&mut self) -> Result<Expr, String> {
        self.binary_level(
            &[
                (Token::Star, BinaryOp::Arith(ArithOp::Mul)),
                (Token::Slash, BinaryOp::Arith(ArithOp::Div)),
                (Token::Percent, BinaryOp::Arith(ArithOp::Rem)),
            ],
            Self::unary,
        )
    }

    fn unary(&mut self) -> Result<Expr, String> {
        if self.eat(&Token::Not) {
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        if self.eat(&Token::Minus) {
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, String> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Token::LBracket) {
                let key = self.ternary()?;
                self.expect(&Token::RBracket)?;
                expr = Expr::Index(Box::new(expr), Box::new(key));
            } else if self.eat(&Token::Arrow) {
                match self.advance() {
                    Some(Token::Ident(name)) => expr = Expr::Prop(Box::new(expr), name),
                    other => return Err(format!("expected property name, found {other:?}")),
                }
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, String> {
        match self.advance() {
            Some(Token::Var(name)) => Ok(Expr::Var(name)),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Int(i)) => Ok(Expr::Literal(Value::from(i))),
            Some(Token::Float(f)) => Ok(Expr::Literal(value::Num::Float(f).into_value())),
            Some(Token::LParen) => {
                let expr = self.ternary()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Some(Token::Ident(name)) => match name.to_ascii_lowercase().as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" => Ok(Expr::Literal(Value::Null)),
                _ => self.call(&name),
            },
            other => Err(format!("unexpected {other:?}")),
        }
    }

    fn call(&mut self, name: &str) -> Result<Expr, String> {
        let func = Func::from_name(name).ok_or_else(|| format!("unknown function '{name}'"))?;
        self.expect(&Token::LParen)?;

        let mut args = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                args.push(self.ternary()?);
                if self.eat(&Token::RParen) {
                    break;
                }
                self.expect(&Token::Comma)?;
            }
        }

        let arity_ok = match func {
            Func::Isset => !args.is_empty(),
            _ => args.len() == 1,
        };
        if !arity_ok {
            return Err(format!("wrong number of arguments for '{name}'"));
        }
        if func == Func::Isset
            && !args
                .iter()
                .all(|a| matches!(a, Expr::Var(_) | Expr::Index(..) | Expr::Prop(..)))
        {
            return Err("isset() only accepts variables".to_owned());
        }

        Ok(Expr::Call(func, args))
    }
}

impl Expr {
    /// Evaluate against a scope.
    pub(crate) fn eval(&self, scope: &dyn Scope) -> Result<Value, String> {
        match self {
            Self::Literal(v) => Ok(v.clone()),
            Self::Var(name) => Ok(scope.lookup(name).cloned().unwrap_or(Value::Null)),
            Self::Index(base, key) => {
                let base = base.eval(scope)?;
                let key = key.eval(scope)?;
                Ok(index(base, &key))
            }
            Self::Prop(base, name) => Ok(match base.eval(scope)? {
                Value::Object(mut map) => map.remove(name).unwrap_or(Value::Null),
                _ => Value::Null,
            }),
            Self::Not(inner) => Ok(Value::Bool(!value::is_truthy(&inner.eval(scope)?))),
            Self::Neg(inner) => value::arith(ArithOp::Sub, &Value::from(0), &inner.eval(scope)?),
            Self::Coalesce(left, right) => match left.eval(scope)? {
                Value::Null => right.eval(scope),
                v => Ok(v),
            },
            Self::Ternary(cond, then, otherwise) => {
                if value::is_truthy(&cond.eval(scope)?) {
                    then.eval(scope)
                } else {
                    otherwise.eval(scope)
                }
            }
            Self::Binary(op, left, right) => eval_binary(*op, left, right, scope),
            Self::Call(func, args) => eval_call(*func, args, scope),
        }
    }
}

fn index(base: Value, key: &Value) -> Value {
    match base {
        Value::Array(mut items) => value::to_num(key)
            .and_then(|n| match n {
                value::Num::Int(i) => usize::try_from(i).ok(),
                value::Num::Float(_) => None,
            })
            .filter(|&i| i < items.len())
            .map_or(Value::Null, |i| items.swap_remove(i)),
        Value::Object(mut map) => map.remove(&value::to_text(key)).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn eval_binary(op: BinaryOp, left: &Expr, right: &Expr, scope: &dyn Scope) -> Result<Value, String> {
    let l = left.eval(scope)?;
    match op {
        BinaryOp::Or if value::is_truthy(&l) => return Ok(Value::Bool(true)),
        BinaryOp::And if !value::is_truthy(&l) => return Ok(Value::Bool(false)),
        BinaryOp::Or | BinaryOp::And => {
            return Ok(Value::Bool(value::is_truthy(&right.eval(scope)?)));
        }
        _ => {}
    }

    let r = right.eval(scope)?;
    let result = match op {
        BinaryOp::Eq => Value::Bool(value::loose_eq(&l, &r)),
        BinaryOp::Ne => Value::Bool(!value::loose_eq(&l, &r)),
        BinaryOp::StrictEq => Value::Bool(value::strict_eq(&l, &r)),
        BinaryOp::StrictNe => Value::Bool(!value::strict_eq(&l, &r)),
        BinaryOp::Lt => Value::Bool(value::compare(&l, &r)? == Ordering::Less),
        BinaryOp::Le => Value::Bool(value::compare(&l, &r)? != Ordering::Greater),
        BinaryOp::Gt => Value::Bool(value::compare(&l, &r)? == Ordering::Greater),
        BinaryOp::Ge => Value::Bool(value::compare(&l, &r)? != Ordering::Less),
        BinaryOp::Concat => Value::String(value::to_text(&l) + &value::to_text(&r)),
        BinaryOp::Arith(op) => value::arith(op, &l, &r)?,
        BinaryOp::Or | BinaryOp::And => Value::Null,
    };
    Ok(result)
}

fn eval_call(func: Func, args: &[Expr], scope: &dyn Scope) -> Result<Value, String> {
    if func == Func::Isset {
        for arg in args {
            if arg.eval(scope)?.is_null() {
                return Ok(Value::Bool(false));
            }
        }
        return Ok(Value::Bool(true));
    }

    let arg = match args.first() {
        Some(arg) => arg.eval(scope)?,
        None => Value::Null,
    };
    let result = match func {
        Func::Empty => Value::Bool(!value::is_truthy(&arg)),
        Func::Count => Value::from(value::count(&arg)),
        Func::Upper => Value::String(value::to_text(&arg).to_uppercase()),
        Func::Lower => Value::String(value::to_text(&arg).to_lowercase()),
        Func::Trim => Value::String(value::to_text(&arg).trim().to_owned()),
        Func::Isset => Value::Null,
    };
    Ok(result)
}
