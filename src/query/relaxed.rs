//! Relaxed object-literal parsing
//!
//! Admin consoles send loosely written expressions such as `status:connected`
//! or `{ram: {'>': 4}, hostname: {contains: gpu}}`. JSON5 already covers
//! unquoted keys, single quotes, comments and trailing commas; on top of that
//! the outer braces are optional and bare words are read as strings.

use serde_json::Value;

use crate::types::QueryError;

/// Parse a relaxed literal into a JSON value.
///
/// Blank input yields an empty object.
pub fn parse(input: &str) -> Result<Value, QueryError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(Value::Object(Default::default()));
    }

    let quoted = quote_bare_words(trimmed);
    let source = if quoted.starts_with('{') || quoted.starts_with('[') {
        quoted
    } else {
        format!("{{{}}}", quoted)
    };

    let mut value =
        json5::from_str::<Value>(&source).map_err(|e| QueryError::Syntax(e.to_string()))?;
    integral_numbers(&mut value);
    Ok(value)
}

/// Store whole numbers as integers so `ram: 8` compares equal to a stored `8`.
fn integral_numbers(value: &mut Value) {
    match value {
        Value::Number(n) if n.is_f64() => {
            if let Some(f) = n.as_f64() {
                if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    *value = Value::from(f as i64);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(integral_numbers),
        Value::Object(map) => map.values_mut().for_each(integral_numbers),
        _ => {}
    }
}

/// Normalize an event payload into a parsed value.
///
/// Strings go through [`parse`]; structured payloads are taken as they are.
pub fn parse_payload(data: &Value) -> Result<Value, QueryError> {
    match data {
        Value::Null => Ok(Value::Object(Default::default())),
        Value::String(text) => parse(text),
        other => Ok(other.clone()),
    }
}

fn is_delimiter(c: char) -> bool {
    matches!(c, '{' | '}' | '[' | ']' | ':' | ',' | '"' | '\'')
}

fn starts_comment(chars: &[char], i: usize) -> bool {
    chars[i] == '/' && matches!(chars.get(i + 1), Some('/') | Some('*'))
}

/// Words left unquoted: keywords and complete numbers. `3fa85f64` or
/// `10.0.0.1` are strings.
fn is_literal(word: &str) -> bool {
    matches!(word, "true" | "false" | "null") || serde_json::from_str::<serde_json::Number>(word).is_ok()
}

/// Wrap every bare word (keys and values alike) in double quotes.
///
/// Whitespace inside a word is kept, so `hostname: my host` reads as one string.
///
/// Quoted strings and comments are copied through untouched.
fn quote_bare_words(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 16);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '\'' => {
                let start = i;
                i += 1;
                while i < chars.len() && chars[i] != c {
                    if chars[i] == '\\' {
                        i += 1;
                    }
                    i += 1;
                }
                let end = (i + 1).min(chars.len());
                out.extend(&chars[start..end]);
                i = end;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    out.push(chars[i]);
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let start = i;
                i += 2;
                while i + 1 < chars.len() && !(chars[i] == '*' && chars[i + 1] == '/') {
                    i += 1;
                }
                let end = (i + 2).min(chars.len());
                out.extend(&chars[start..end]);
                i = end;
            }
            c if is_delimiter(c) || c.is_whitespace() => {
                out.push(c);
                i += 1;
            }
            _ => {
                // A bare word runs to the next delimiter, inner spaces included
                let start = i;
                while i < chars.len() && !is_delimiter(chars[i]) && !starts_comment(&chars, i) {
                    i += 1;
                }
                let raw: String = chars[start..i].iter().collect();
                let word = raw.trim_end();
                if is_literal(word) {
                    out.push_str(word);
                } else {
                    out.push('"');
                    out.push_str(&word.replace('\\', "\\\\"));
                    out.push('"');
                }
                out.push_str(&raw[word.len()..]);
            }
        }
    }

    out
}
