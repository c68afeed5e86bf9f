//! JSON-with-comments parsing for settings templates.
//!
//! Templates may document themselves in two ways, both removed here:
//!
//! - `//` line comments and `/* */` block comments outside string literals;
//! - *comment keys*: object keys starting with `//` or `_comment`
//!   (e.g. `"_comment": "explains the block below"`).
//!
//! Parsing is pure and idempotent: parsing already-clean JSON returns it
//! unchanged.
use serde_json::{Map, Value};
use thiserror::Error;

/// Key prefixes that mark documentation rather than data.
pub const COMMENT_KEY_PREFIXES: &[&str] = &["//", "_comment"];

/// Errors from [`parse`].
#[derive(Error, Debug)]
pub enum JsoncError {
    /// A `/*` comment is never closed.
    #[error("unterminated block comment starting at line {line}, column {column}")]
    UnterminatedComment {
        /// 1-based line of the opening `/*`.
        line: usize,
        /// 1-based column of the opening `/*`.
        column: usize,
    },

    /// The text is not valid JSON once comments are removed.
    #[error("invalid JSON at line {line}, column {column}: {source}")]
    Syntax {
        /// 1-based line reported by the JSON parser.
        line: usize,
        /// 1-based column reported by the JSON parser.
        column: usize,
        /// Underlying parser error.
        source: serde_json::Error,
    },
}

/// Returns `true` if `key` marks a documentation-only entry.
#[must_use]
pub fn is_comment_key(key: &str) -> bool {
    COMMENT_KEY_PREFIXES.iter().any(|p| key.starts_with(p))
}

/// Parse JSONC text into a clean [`Value`] with all comments removed.
///
/// # Errors
///
/// Returns [`JsoncError`] if a block comment is unterminated or the text is
/// not valid JSON after comment removal.
///
/// # Examples
///
/// ```
/// use devkit_installer::config::jsonc;
///
/// let value = jsonc::parse(r#"{
///     // enable the guard
///     "_comment": "hooks run before every tool call",
///     "hooks": {}
/// }"#).unwrap();
///
/// assert_eq!(value, serde_json::json!({ "hooks": {} }));
/// ```
pub fn parse(text: &str) -> Result<Value, JsoncError> {
    let stripped = strip_comments(text)?;
    let value: Value = serde_json::from_str(&stripped).map_err(|e| JsoncError::Syntax {
        line: e.line(),
        column: e.column(),
        source: e,
    })?;
    Ok(strip_comment_keys(value))
}

/// Parse JSONC text that must describe a JSON object.
///
/// # Errors
///
/// Returns [`JsoncError`] on a syntax error.  A non-object top level is
/// reported as `Ok(None)` so callers can word their own error.
pub fn parse_object(text: &str) -> Result<Option<Map<String, Value>>, JsoncError> {
    match parse(text)? {
        Value::Object(map) => Ok(Some(map)),
        _ => Ok(None),
    }
}

/// Recursively drop comment keys from every object in `value`.
#[must_use]
pub fn strip_comment_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(k, _)| !is_comment_key(k))
                .map(|(k, v)| (k, strip_comment_keys(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_comment_keys).collect()),
        other => other,
    }
}

/// Replace `//` and `/* */` comments outside string literals with spaces.
///
/// Newlines are preserved so that parser line numbers still match the
/// original text.
fn strip_comments(text: &str) -> Result<String, JsoncError> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;
    let mut line = 1;
    let mut column = 0;

    while let Some(c) = chars.next() {
        column += 1;
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            } else if c == '\n' {
                line += 1;
                column = 0;
            }
            continue;
        }

        match (c, chars.peek()) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                out.push(' ');
                for inner in chars.by_ref() {
                    if inner == '\n' {
                        out.push('\n');
                        line += 1;
                        column = 0;
                        break;
                    }
                    out.push(' ');
                }
            }
            ('/', Some('*')) => {
                let (start_line, start_column) = (line, column);
                chars.next();
                out.push_str("  ");
                column += 1;
                let mut closed = false;
                let mut prev = '\0';
                for inner in chars.by_ref() {
                    column += 1;
                    if inner == '\n' {
                        out.push('\n');
                        line += 1;
                        column = 0;
                    } else {
                        out.push(' ');
                    }
                    if prev == '*' && inner == '/' {
                        closed = true;
                        break;
                    }
                    prev = inner;
                }
                if !closed {
                    return Err(JsoncError::UnterminatedComment {
                        line: start_line,
                        column: start_column,
                    });
                }
            }
            ('\n', _) => {
                out.push(c);
                line += 1;
                column = 0;
            }
            _ => out.push(c),
        }
    }
    Ok(out)
}
