//! Condition expressions.
//!
//! ```text
//! or      := and ( "or" and )*
//! and     := not ( "and" not )*
//! not     := "!" not | primary
//! primary := "(" or ")" | Func "(" args ")" | operand ( cmp operand )?
//! cmp     := "==" | "!=" | "<" | "<=" | ">" | ">="
//! ```
//!
//! Keywords are case-insensitive. Operands are quoted strings or unquoted
//! runs (`$(X)`, `true`, `1.5`); they are expanded right before comparison.
//!
//! Malformed syntax is an [`ExpressionError`], and so is a bare operand that
//! does not expand to a boolean. A relational comparison over text that is not
//! numeric is simply false.

use super::expand::{Scope, expand};
use super::expression::find_close;
use super::functions::parse_number;
use crate::{ExpressionError, NameMap};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Operand(String),
    Func(String),
    LParen,
    RParen,
    Comma,
    Not,
    And,
    Or,
    Cmp(CmpOp),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug)]
enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare(String, CmpOp, String),
    Bare(String),
    Call(String, Vec<String>),
}

fn invalid(condition: &str, reason: impl Into<String>) -> ExpressionError {
    ExpressionError::InvalidCondition { condition: condition.to_string(), reason: reason.into() }
}

/// Skip to the end of a `$(`/`@(`/`%(` group starting at `i`, if one starts there.
fn skip_reference(text: &str, i: usize) -> Result<Option<usize>, ExpressionError> {
    let bytes = text.as_bytes();
    if matches!(bytes[i], b'$' | b'@' | b'%') && bytes.get(i + 1) == Some(&b'(') {
        let close = find_close(text, i + 2).ok_or_else(|| invalid(text, format!("unbalanced reference at {i}")))?;
        return Ok(Some(close + 1));
    }
    Ok(None)
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b >= 0x80 || matches!(b, b'_' | b'.' | b'-' | b'+' | b'\\' | b'/' | b':' | b';' | b'*' | b'?')
}

fn tokenize(text: &str) -> Result<Vec<Token>, ExpressionError> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match b {
            _ if b.is_ascii_whitespace() => i += 1,
            b'(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            b')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            b',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            b'\'' => {
                let start = i + 1;
                let mut j = start;
                loop {
                    if j >= bytes.len() {
                        return Err(invalid(text, format!("unterminated quote at {i}")));
                    }
                    if bytes[j] == b'\'' {
                        break;
                    }
                    j = skip_reference(text, j)?.unwrap_or(j + 1);
                }
                tokens.push(Token::Operand(text[start..j].to_string()));
                i = j + 1;
            }
            b'=' | b'!' | b'<' | b'>' => {
                let next_eq = bytes.get(i + 1) == Some(&b'=');
                let (token, width) = match (b, next_eq) {
                    (b'=', true) => (Token::Cmp(CmpOp::Eq), 2),
                    (b'!', true) => (Token::Cmp(CmpOp::Ne), 2),
                    (b'<', true) => (Token::Cmp(CmpOp::Le), 2),
                    (b'>', true) => (Token::Cmp(CmpOp::Ge), 2),
                    (b'<', false) => (Token::Cmp(CmpOp::Lt), 1),
                    (b'>', false) => (Token::Cmp(CmpOp::Gt), 1),
                    (b'!', false) => (Token::Not, 1),
                    _ => return Err(invalid(text, format!("single '=' at {i}; use '=='"))),
                };
                tokens.push(token);
                i += width;
            }
            _ => {
                let start = i;
                let mut plain = true;
                while i < bytes.len() {
                    if let Some(end) = skip_reference(text, i)? {
                        plain = false;
                        i = end;
                    } else if is_word_byte(bytes[i]) {
                        i += 1;
                    } else {
                        break;
                    }
                }
                if i == start {
                    return Err(invalid(text, format!("unexpected character '{}' at {start}", &text[start..].chars().next().unwrap_or('?'))));
                }
                let word = &text[start..i];
                let followed_by_paren = text[i..].trim_start().starts_with('(');
                tokens.push(match word.to_ascii_lowercase().as_str() {
                    "and" if plain => Token::And,
                    "or" if plain => Token::Or,
                    _ if plain && followed_by_paren && super::expression::is_identifier(word) => Token::Func(word.to_string()),
                    _ => Token::Operand(word.to_string()),
                });
            }
        }
    }
    Ok(tokens)
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    text: &'t str,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<(), ExpressionError> {
        match self.next() {
            Some(t) if t == token => Ok(()),
            Some(t) => Err(invalid(self.text, format!("expected {what}, found {t:?}"))),
            None => Err(invalid(self.text, format!("expected {what} at end of condition"))),
        }
    }

    fn or(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            lhs = Expr::Or(Box::new(lhs), Box::new(self.and()?));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.not()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            lhs = Expr::And(Box::new(lhs), Box::new(self.not()?));
        }
        Ok(lhs)
    }

    fn not(&mut self) -> Result<Expr, ExpressionError> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.not()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ExpressionError> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.or()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::Func(name)) => {
                self.expect(Token::LParen, "'('")?;
                let mut args = Vec::new();
                if self.peek() == Some(&Token::RParen) {
                    self.pos += 1;
                    return Ok(Expr::Call(name, args));
                }
                loop {
                    match self.next() {
                        Some(Token::Operand(a)) => args.push(a),
                        other => return Err(invalid(self.text, format!("expected an argument to {name}, found {other:?}"))),
                    }
                    match self.next() {
                        Some(Token::Comma) => continue,
                        Some(Token::RParen) => break,
                        other => return Err(invalid(self.text, format!("expected ',' or ')' in {name}, found {other:?}"))),
                    }
                }
                Ok(Expr::Call(name, args))
            }
            Some(Token::Operand(lhs)) => {
                if let Some(Token::Cmp(op)) = self.peek().cloned() {
                    self.pos += 1;
                    match self.next() {
                        Some(Token::Operand(rhs)) => Ok(Expr::Compare(lhs, op, rhs)),
                        other => Err(invalid(self.text, format!("expected an operand after {op:?}, found {other:?}"))),
                    }
                } else {
                    Ok(Expr::Bare(lhs))
                }
            }
            Some(t) => Err(invalid(self.text, format!("unexpected {t:?}"))),
            None => Err(invalid(self.text, "unexpected end of condition")),
        }
    }
}

fn parse_condition(text: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(text)?;
    let mut parser = Parser { tokens: &tokens, pos: 0, text };
    let expr = parser.or()?;
    if let Some(t) = parser.peek() {
        return Err(invalid(text, format!("unexpected {t:?} after complete expression")));
    }
    Ok(expr)
}

/// Evaluate a condition. An empty (or all-whitespace) condition is true.
pub fn evaluate_condition(text: &str, scope: &Scope<'_>) -> Result<bool, ExpressionError> {
    if text.trim().is_empty() {
        return Ok(true);
    }
    let expr = parse_condition(text)?;
    eval(&expr, text, scope)
}

fn eval(expr: &Expr, text: &str, scope: &Scope<'_>) -> Result<bool, ExpressionError> {
    match expr {
        Expr::Or(a, b) => Ok(eval(a, text, scope)? || eval(b, text, scope)?),
        Expr::And(a, b) => Ok(eval(a, text, scope)? && eval(b, text, scope)?),
        Expr::Not(inner) => Ok(!eval(inner, text, scope)?),
        Expr::Compare(lhs, op, rhs) => compare(&expand(lhs, scope)?, *op, &expand(rhs, scope)?),
        Expr::Bare(operand) => boolean(&expand(operand, scope)?, text),
        Expr::Call(name, args) => call(name, args, scope),
    }
}

/// A bare operand must expand to a boolean word; anything else is a coercion failure.
fn boolean(value: &str, text: &str) -> Result<bool, ExpressionError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "!false" | "!off" | "!no" => Ok(true),
        "false" | "off" | "no" | "!true" | "!on" | "!yes" => Ok(false),
        _ => Err(invalid(text, format!("\"{value}\" does not evaluate to a boolean"))),
    }
}

fn compare(lhs: &str, op: CmpOp, rhs: &str) -> Result<bool, ExpressionError> {
    if let (Some(a), Some(b)) = (parse_number(lhs), parse_number(rhs)) {
        return Ok(match op {
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            CmpOp::Lt => a < b,
            CmpOp::Le => a <= b,
            CmpOp::Gt => a > b,
            CmpOp::Ge => a >= b,
        });
    }
    match op {
        CmpOp::Eq => Ok(lhs.eq_ignore_ascii_case(rhs)),
        CmpOp::Ne => Ok(!lhs.eq_ignore_ascii_case(rhs)),
        _ => semantic_false!(lhs, rhs, ?op, "relational comparison of non-numeric values"),
    }
}

fn call(name: &str, args: &[String], scope: &Scope<'_>) -> Result<bool, ExpressionError> {
    let [arg] = args else {
        return Err(ExpressionError::InvalidArguments {
            name: name.to_string(),
            reason: format!("expected 1 argument, got {}", args.len()),
        });
    };
    let value = expand(arg, scope)?;
    match name.to_ascii_lowercase().as_str() {
        "exists" => {
            let value = value.trim();
            if value.is_empty() {
                return Ok(false);
            }
            Ok(scope.base_dir.join(value).exists())
        }
        "hastrailingslash" => Ok(value.ends_with('/') || value.ends_with('\\')),
        _ => Err(ExpressionError::UnknownFunction { name: name.to_string() }),
    }
}

/// Record `'$(A)|$(B)' == 'x|y'` pairs: each property name gets the value it was compared against.
pub(crate) fn record_conditioned_properties(condition: &str, out: &mut NameMap<Vec<String>>) {
    let pattern = regex!(r"'((?:\s*\$\([A-Za-z_][A-Za-z0-9_\-]*\)\s*\|?)+)'\s*==\s*'([^'$@%]*)'");
    for caps in pattern.captures_iter(condition) {
        let names = caps[1].split('|').map(|n| n.trim().trim_start_matches("$(").trim_end_matches(')'));
        let values = caps[2].split('|');
        for (name, value) in names.zip(values) {
            match out.get_mut(name) {
                Some(list) => {
                    if !list.iter().any(|v| v == value) {
                        list.push(value.to_string());
                    }
                }
                None => {
                    out.insert(name, vec![value.to_string()]);
                }
            }
        }
    }
}
