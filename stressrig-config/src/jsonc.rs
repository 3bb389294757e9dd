//! JSON with comments
//!
//! Configuration files may carry `// line` and `/* block */` comments.
//! Comments are blanked out (newlines kept, so parser positions stay
//! accurate) before the document is handed to `serde_json`.

use crate::error::{ConfigError, ConfigResult};

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    String,
    StringEscape,
    LineComment,
    BlockComment,
}

/// Remove comments from a JSON document, leaving string contents intact
pub fn strip_comments(input: &str) -> ConfigResult<String> {
    let mut out = String::with_capacity(input.len());
    let mut state = State::Code;
    let mut chars = input.chars().peekable();
    let mut line = 1usize;
    let mut block_start = 0usize;

    while let Some(c) = chars.next() {
        if c == '\n' {
            line += 1;
        }
        match state {
            State::Code => match c {
                '"' => {
                    state = State::String;
                    out.push(c);
                }
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    state = State::LineComment;
                    out.push_str("  ");
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = State::BlockComment;
                    block_start = line;
                    out.push_str("  ");
                }
                _ => out.push(c),
            },
            State::String => {
                match c {
                    '\\' => state = State::StringEscape,
                    '"' => state = State::Code,
                    _ => {}
                }
                out.push(c);
            }
            State::StringEscape => {
                state = State::String;
                out.push(c);
            }
            State::LineComment => {
                if c == '\n' {
                    state = State::Code;
                    out.push('\n');
                } else {
                    out.push(' ');
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Code;
                    out.push_str("  ");
                } else if c == '\n' {
                    out.push('\n');
                } else {
                    out.push(' ');
                }
            }
        }
    }

    if state == State::BlockComment {
        return Err(ConfigError::CommentError(format!(
            "unterminated block comment starting on line {}",
            block_start
        )));
    }

    Ok(out)
}

/// Strip comments and deserialize
pub fn from_str<T>(input: &str) -> ConfigResult<T>
where
    T: serde::de::DeserializeOwned,
{
    let stripped = strip_comments(input)?;
    Ok(serde_json::from_str(&stripped)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_line_and_block_comments() {
        let doc = r#"{
            // a line comment
            "a": 1, /* inline */ "b": 2
            /* multi
               line */
        }"#;
        let value: Value = from_str(doc).unwrap();
        assert_eq!(value["a"], 1);
        assert_eq!(value["b"], 2);
    }

    #[test]
    fn test_comment_markers_inside_strings_are_kept() {
        let doc = r#"{"url": "http://example.com/*x*/", "q": "say \"//hi\""}"#;
        let value: Value = from_str(doc).unwrap();
        assert_eq!(value["url"], "http://example.com/*x*/");
        assert_eq!(value["q"], "say \"//hi\"");
    }

    #[test]
    fn test_newlines_preserved() {
        let stripped = strip_comments("// one\n// two\n{}").unwrap();
        assert_eq!(stripped.lines().count(), 3);
    }

    #[test]
    fn test_unterminated_block_comment() {
        let err = strip_comments("{\n/* never closed\n}").unwrap_err();
        assert!(matches!(err, ConfigError::CommentError(_)));
        assert!(err.to_string().contains("line 2"));
    }
}
