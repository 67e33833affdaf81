//! Literal scanning for `VALUES (...)`, `SET` and `DEFAULT` clauses.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{DbResult, SyntaxError};
use crate::value::{parse_iso_date, Value};

/// Splits `text` on top-level `separator`s, honoring quotes (with
/// backslash and doubled-quote escapes) and nested `()`, `[]` and `{}`.
/// Pieces are trimmed; an all-blank input yields no pieces.
pub(crate) fn split_top_level(text: &str, separator: char) -> DbResult<Vec<String>> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth: i32 = 0;
    let mut quote: Option<char> = None;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if let Some(q) = quote {
            current.push(ch);
            if ch == '\\' {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            } else if ch == q {
                if chars.peek() == Some(&q) {
                    current.push(q);
                    chars.next();
                } else {
                    quote = None;
                }
            }
            continue;
        }
        match ch {
            '\'' | '"' | '`' => {
                quote = Some(ch);
                current.push(ch);
            }
            '(' | '[' | '{' => {
                depth += 1;
                current.push(ch);
            }
            ')' | ']' | '}' => {
                depth -= 1;
                if depth < 0 {
                    return Err(SyntaxError::UnbalancedParentheses {
                        input: text.to_string(),
                    }
                    .into());
                }
                current.push(ch);
            }
            c if c == separator && depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            other => current.push(other),
        }
    }

    if quote.is_some() {
        return Err(SyntaxError::UnterminatedString {
            input: text.to_string(),
        }
        .into());
    }
    if depth != 0 {
        return Err(SyntaxError::UnbalancedParentheses {
            input: text.to_string(),
        }
        .into());
    }
    if !current.trim().is_empty() || !parts.is_empty() {
        parts.push(current.trim().to_string());
    }
    Ok(parts)
}

/// Strips matching quotes and resolves escapes. Returns `None` if `token`
/// is not a complete quoted string.
pub(crate) fn unquote(token: &str) -> Option<String> {
    let mut chars = token.chars();
    let open = chars.next()?;
    if !matches!(open, '\'' | '"' | '`') || token.len() < 2 || !token.ends_with(open) {
        return None;
    }
    let inner = &token[open.len_utf8()..token.len() - open.len_utf8()];
    let mut out = String::with_capacity(inner.len());
    let mut it = inner.chars().peekable();
    while let Some(ch) = it.next() {
        match ch {
            '\\' => match it.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('0') => out.push('\0'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            },
            c if c == open && it.peek() == Some(&open) => {
                out.push(open);
                it.next();
            }
            other => out.push(other),
        }
    }
    Some(out)
}

fn iso_date_pattern() -> &'static Option<Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\d{4}-\d{2}-\d{2}([T ]\d{2}:\d{2}(:\d{2}(\.\d+)?)?(Z|[+-]\d{2}:?\d{2})?)?$").ok()
    })
}

fn looks_numeric(token: &str) -> bool {
    let body = token.strip_prefix(['-', '+']).unwrap_or(token);
    body.starts_with(|c: char| c.is_ascii_digit() || c == '.')
        && body.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '-' | '+'))
}

/// Classifies one literal token. Returns `None` for the `?` placeholder.
///
/// Order: placeholder, `NULL`, booleans, quoted strings, numbers, JSON
/// objects and arrays, bare ISO-8601 dates, then raw text.
pub(crate) fn parse_value(token: &str) -> Option<Value> {
    let token = token.trim();
    if token == "?" {
        return None;
    }
    if token.eq_ignore_ascii_case("null") {
        return Some(Value::Null);
    }
    if token.eq_ignore_ascii_case("true") {
        return Some(Value::Bool(true));
    }
    if token.eq_ignore_ascii_case("false") {
        return Some(Value::Bool(false));
    }
    if let Some(text) = unquote(token) {
        return Some(Value::Text(text));
    }
    if looks_numeric(token) {
        if let Ok(v) = token.parse::<i64>() {
            return Some(Value::Int(v));
        }
        if let Ok(v) = token.parse::<f64>() {
            return Some(Value::Float(v));
        }
    }
    if token.starts_with('{') || token.starts_with('[') {
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(token) {
            return Some(Value::from_json(json));
        }
    }
    if iso_date_pattern().as_ref().is_some_and(|re| re.is_match(token)) {
        if let Some(date) = parse_iso_date(token) {
            return Some(Value::Date(date));
        }
    }
    Some(Value::Text(token.to_string()))
}

/// Parses a comma-separated literal list. `None` marks a placeholder.
pub(crate) fn parse_values(text: &str) -> DbResult<Vec<Option<Value>>> {
    Ok(split_top_level(text, ',')?
        .iter()
        .map(|token| parse_value(token))
        .collect())
}
