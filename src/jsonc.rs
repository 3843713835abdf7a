//! Helpers for the JSON-with-comments dialect used by external service
//! configuration. Comments are tolerated on input; output is plain JSON.

use serde_json::Value;

use crate::error::{Error, Result};

/// Parses configuration text, tolerating `//` and `/* */` comments.
pub fn parse(text: &str) -> Result<Value> {
    let stripped = strip_comments(text);
    let trimmed = stripped.trim();
    if trimmed.is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(trimmed).map_err(Error::from)
}

/// Serializes a configuration value back to text.
pub fn format(value: &Value) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(Error::from)
}

/// Removes `//` line comments and `/* */` block comments, leaving string
/// literals untouched.
pub fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' => match chars.peek() {
                Some('/') => {
                    for c in chars.by_ref() {
                        if c == '\n' {
                            out.push('\n');
                            break;
                        }
                    }
                }
                Some('*') => {
                    chars.next();
                    let mut prev = '\0';
                    for c in chars.by_ref() {
                        if prev == '*' && c == '/' {
                            break;
                        }
                        prev = c;
                    }
                }
                _ => out.push(c),
            },
            _ => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_comments() {
        let value = parse(
            r#"
            {
                // Some comment
                "url": "https://github.com",
                "token": "secret"
            }"#,
        )
        .unwrap();
        assert_eq!(value["url"], "https://github.com");
        assert_eq!(value["token"], "secret");
    }

    #[test]
    fn test_parse_block_comments() {
        let value = parse(r#"{ /* block */ "a": 1 }"#).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn test_slashes_inside_strings_survive() {
        let value = parse(r#"{ "url": "https://github.com" }"#).unwrap();
        assert_eq!(value["url"], "https://github.com");
    }

    #[test]
    fn test_parse_empty_is_object() {
        let value = parse("  // nothing here\n").unwrap();
        assert!(value.as_object().unwrap().is_empty());
    }
}
