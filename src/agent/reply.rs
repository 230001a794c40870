//! Model reply protocol
//!
//! A reply that starts with [`SENTINEL`] announces a complete expense as a
//! list of `key=value` pairs; anything else is a clarification to pass back
//! to the user verbatim.
//!
//! ```text
//! REGISTRAR: tipo=gasto, valor=12.50, categoria=Transporte, date=2024-05-03, descripcion="Taxi, aeropuerto"
//! ```
//!
//! Values may be bare (no commas or quotes, surrounding blanks trimmed) or
//! double-quoted with `\"` and `\\` escapes. All five keys are required,
//! each exactly once, in any order.

use crate::error::FinbotError;
use crate::ledger::{parse_date, Amount, Category, ExpenseKind, ExpenseRecord};
use std::collections::HashMap;
use std::iter::Peekable;
use std::str::Chars;

/// Prefix that marks a completed extraction
pub const SENTINEL: &str = "REGISTRAR:";

/// Keys of a completed extraction
pub const KEYS: [&str; 5] = ["tipo", "valor", "categoria", "date", "descripcion"];

/// Classified model reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionReply {
    /// Free text to relay to the user
    Clarification(String),
    /// Every field present and valid
    Completion(ExpenseRecord),
    /// Sentinel present but the body is unusable; carries the
    /// [`FinbotError::ReplyParse`] message
    Malformed(String),
}

impl ExtractionReply {
    /// Classify a raw model reply
    ///
    /// Leading whitespace before the sentinel is ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use finbot::agent::reply::ExtractionReply;
    ///
    /// let reply = ExtractionReply::parse("¿Cuánto pagaste?");
    /// assert_eq!(reply, ExtractionReply::Clarification("¿Cuánto pagaste?".to_string()));
    ///
    /// let reply = ExtractionReply::parse(
    ///     "REGISTRAR: tipo=gasto, valor=8, categoria=Food, date=2024-05-03, descripcion=Menu",
    /// );
    /// assert!(matches!(reply, ExtractionReply::Completion(_)));
    /// ```
    pub fn parse(reply: &str) -> Self {
        match reply.trim_start().strip_prefix(SENTINEL) {
            None => Self::Clarification(reply.to_string()),
            Some(body) => match parse_record(body) {
                Ok(record) => Self::Completion(record),
                Err(err) => Self::Malformed(err.to_string()),
            },
        }
    }
}

/// Parse the text after the sentinel into a validated record
///
/// # Errors
///
/// Returns `FinbotError::ReplyParse` naming the first problem found
pub fn parse_record(body: &str) -> Result<ExpenseRecord, FinbotError> {
    validate_record(body).map_err(FinbotError::ReplyParse)
}

fn validate_record(body: &str) -> Result<ExpenseRecord, String> {
    let fields = parse_pairs(body)?;

    let missing: Vec<&str> = KEYS
        .iter()
        .copied()
        .filter(|key| !fields.contains_key(key))
        .collect();
    if !missing.is_empty() {
        return Err(format!("missing fields: {}", missing.join(", ")));
    }

    let description = fields["descripcion"].trim();
    if description.is_empty() {
        return Err("descripcion is empty".to_string());
    }

    Ok(ExpenseRecord {
        kind: ExpenseKind::parse(&fields["tipo"])?,
        amount: Amount::parse(&fields["valor"])?,
        category: Category::parse(&fields["categoria"])?,
        date: parse_date(&fields["date"])?,
        description: description.to_string(),
    })
}

fn parse_pairs(body: &str) -> Result<HashMap<&'static str, String>, String> {
    let mut chars = body.chars().peekable();
    let mut fields = HashMap::new();

    loop {
        skip_whitespace(&mut chars);
        let key = read_key(&mut chars)?;
        if fields.contains_key(key) {
            return Err(format!("duplicate field '{}'", key));
        }

        skip_whitespace(&mut chars);
        let value = if chars.peek() == Some(&'"') {
            chars.next();
            let value = read_quoted(&mut chars)?;
            skip_whitespace(&mut chars);
            value
        } else {
            read_bare(&mut chars, key)?
        };
        fields.insert(key, value);

        match chars.next() {
            None => break,
            Some(',') => continue,
            Some(c) => return Err(format!("unexpected '{}' after field '{}'", c, key)),
        }
    }

    Ok(fields)
}

fn skip_whitespace(chars: &mut Peekable<Chars<'_>>) {
    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
    }
}

fn read_key(chars: &mut Peekable<Chars<'_>>) -> Result<&'static str, String> {
    let mut raw = String::new();
    loop {
        match chars.next() {
            Some('=') => break,
            Some(',') | None => {
                return Err(if raw.trim().is_empty() {
                    "expected key=value".to_string()
                } else {
                    format!("expected '=' after '{}'", raw.trim())
                })
            }
            Some(c) => raw.push(c),
        }
    }

    let raw = raw.trim();
    KEYS.iter()
        .copied()
        .find(|key| *key == raw)
        .ok_or_else(|| format!("unknown field '{}'", raw))
}

fn read_quoted(chars: &mut Peekable<Chars<'_>>) -> Result<String, String> {
    let mut value = String::new();
    loop {
        match chars.next() {
            Some('"') => return Ok(value),
            Some('\\') => match chars.next() {
                Some(c @ ('"' | '\\')) => value.push(c),
                Some(c) => return Err(format!("invalid escape '\\{}'", c)),
                None => return Err("unterminated quoted value".to_string()),
            },
            Some(c) => value.push(c),
            None => return Err("unterminated quoted value".to_string()),
        }
    }
}

fn read_bare(chars: &mut Peekable<Chars<'_>>, key: &str) -> Result<String, String> {
    let mut value = String::new();
    while let Some(&c) = chars.peek() {
        match c {
            ',' => break,
            '"' => return Err(format!("stray quote in field '{}'", key)),
            _ => {
                value.push(c);
                chars.next();
            }
        }
    }

    let value = value.trim();
    if value.is_empty() {
        return Err(format!("field '{}' is empty", key));
    }
    Ok(value.to_string())
}
