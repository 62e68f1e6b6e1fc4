use crate::diagnostic::{Position, Range};
use line_index::{LineIndex, TextSize};
use serde_json::Value;
use std::collections::HashMap;

/// Half-open byte span inside the document text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldSpan {
    key: Span,
    value: Span,
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("malformed configuration document: {0}")]
    Syntax(#[from] serde_json::Error),
}

/// A parsed configuration document with source positions.
///
/// Holds the raw text, the parsed tree, and a map from each top-level
/// field to its key and value byte spans, so diagnostics can point at the
/// exact text the user has to fix. Created per validation request and
/// discarded after the caller consumes the diagnostics.
pub struct ConfigDocument {
    text: String,
    root: Value,
    fields: HashMap<String, FieldSpan>,
    line_index: LineIndex,
}

impl std::fmt::Debug for ConfigDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigDocument")
            .field("text", &self.text)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

impl ConfigDocument {
    pub fn parse(text: &str) -> Result<Self, DocumentError> {
        let root: Value = serde_json::from_str(text)?;
        let fields = scan_top_level_fields(text);
        Ok(Self {
            text: text.to_string(),
            root,
            fields,
            line_index: LineIndex::new(text),
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// String value of a top-level field, when present and a string.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.root.get(name)?.as_str()
    }

    /// Source range of a top-level field's value.
    pub fn value_range(&self, name: &str) -> Option<Range> {
        self.fields.get(name).map(|f| self.range_of(f.value))
    }

    /// Source range of a top-level field's key (including quotes).
    pub fn key_range(&self, name: &str) -> Option<Range> {
        self.fields.get(name).map(|f| self.range_of(f.key))
    }

    /// Value range of the field, or the document root when the field does
    /// not occur in the source (e.g. a missing required property).
    pub fn value_range_or_root(&self, name: &str) -> Range {
        self.value_range(name).unwrap_or_else(|| self.root_range())
    }

    /// Fallback range anchored at the start of the document.
    pub fn root_range(&self) -> Range {
        Range::new(0, 0, 0, 1)
    }

    fn range_of(&self, span: Span) -> Range {
        let start = self.line_index.line_col(TextSize::from(span.start as u32));
        let end = self.line_index.line_col(TextSize::from(span.end as u32));
        Range {
            start: Position {
                line: start.line,
                character: start.col,
            },
            end: Position {
                line: end.line,
                character: end.col,
            },
        }
    }
}

/// Records the key and value spans of every top-level field.
///
/// The text has already been validated by `serde_json`, so the scanner can
/// assume well-formed JSON; it only needs to be string-aware while walking
/// nested structures.
fn scan_top_level_fields(text: &str) -> HashMap<String, FieldSpan> {
    let bytes = text.as_bytes();
    let mut fields = HashMap::new();

    let mut i = match bytes.iter().position(|&b| b == b'{') {
        Some(pos) => pos + 1,
        None => return fields,
    };

    loop {
        i = skip_insignificant(bytes, i);
        if i >= bytes.len() || bytes[i] == b'}' {
            break;
        }
        if bytes[i] != b'"' {
            break;
        }

        let key_start = i;
        let key_end = skip_string(bytes, i);
        let key = text[key_start + 1..key_end - 1].to_string();

        i = skip_insignificant(bytes, key_end);
        if i >= bytes.len() || bytes[i] != b':' {
            break;
        }
        i = skip_insignificant(bytes, i + 1);
        if i >= bytes.len() {
            break;
        }

        let value_start = i;
        let value_end = skip_value(bytes, i);
        fields.insert(
            key,
            FieldSpan {
                key: Span::new(key_start, key_end),
                value: Span::new(value_start, value_end),
            },
        );
        i = value_end;
    }

    fields
}

fn skip_insignificant(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && matches!(bytes[i], b' ' | b'\t' | b'\r' | b'\n' | b',') {
        i += 1;
    }
    i
}

/// `i` points at the opening quote; returns the index just past the
/// closing quote.
fn skip_string(bytes: &[u8], i: usize) -> usize {
    let mut j = i + 1;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 2,
            b'"' => return j + 1,
            _ => j += 1,
        }
    }
    j
}

/// `i` points at the first byte of a value; returns the index just past it.
fn skip_value(bytes: &[u8], i: usize) -> usize {
    match bytes[i] {
        b'"' => skip_string(bytes, i),
        b'{' | b'[' => {
            let mut depth = 0usize;
            let mut j = i;
            while j < bytes.len() {
                match bytes[j] {
                    b'"' => {
                        j = skip_string(bytes, j);
                        continue;
                    }
                    b'{' | b'[' => depth += 1,
                    b'}' | b']' => {
                        depth -= 1;
                        if depth == 0 {
                            return j + 1;
                        }
                    }
                    _ => {}
                }
                j += 1;
            }
            j
        }
        _ => {
            let mut j = i;
            while j < bytes.len() && !matches!(bytes[j], b',' | b'}' | b']' | b' ' | b'\t' | b'\r' | b'\n')
            {
                j += 1;
            }
            j
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
  "schemaVersion": "0.0.1",
  "cliVersion": "0.9.0",
  "board": "acme:avr:nano",
  "port": "/dev/ttyACM0",
  "additionalUrls": ["https://example.com/a.json", "https://example.com/b.json"]
}"#;

    #[test]
    fn test_parse_rejects_malformed_json() {
        assert!(matches!(
            ConfigDocument::parse("{ nope"),
            Err(DocumentError::Syntax(_))
        ));
    }

    #[test]
    fn test_value_range_covers_the_quoted_value() {
        let doc = ConfigDocument::parse(DOC).unwrap();
        let range = doc.value_range("cliVersion").unwrap();

        assert_eq!(range.start.line, 2);
        // `  "cliVersion": ` is 16 characters.
        assert_eq!(range.start.character, 16);
        assert_eq!(range.end.line, 2);
        assert_eq!(range.end.character, 23);

        let line = DOC.lines().nth(2).unwrap();
        assert_eq!(
            &line[range.start.character as usize..range.end.character as usize],
            "\"0.9.0\""
        );
    }

    #[test]
    fn test_key_range_covers_the_quoted_key() {
        let doc = ConfigDocument::parse(DOC).unwrap();
        let range = doc.key_range("board").unwrap();
        let line = DOC.lines().nth(3).unwrap();
        assert_eq!(
            &line[range.start.character as usize..range.end.character as usize],
            "\"board\""
        );
    }

    #[test]
    fn test_array_value_span_is_balanced() {
        let doc = ConfigDocument::parse(DOC).unwrap();
        let range = doc.value_range("additionalUrls").unwrap();
        let line = DOC.lines().nth(5).unwrap();
        let text = &line[range.start.character as usize..range.end.character as usize];
        assert!(text.starts_with('['));
        assert!(text.ends_with(']'));
    }

    #[test]
    fn test_missing_field_falls_back_to_root_range() {
        let doc = ConfigDocument::parse(r#"{"port": "COM3"}"#).unwrap();
        assert_eq!(doc.value_range("board"), None);
        assert_eq!(doc.value_range_or_root("board"), doc.root_range());
    }

    #[test]
    fn test_escaped_strings_do_not_confuse_the_scanner() {
        let doc = ConfigDocument::parse(r#"{"alias": "say \"hi\"", "port": "COM3"}"#).unwrap();
        let alias = doc.value_range("alias").unwrap();
        let port = doc.value_range("port").unwrap();

        assert_eq!(alias.start.character, 10);
        assert_eq!(alias.end.character, 22);
        assert!(port.start.character > alias.end.character);
        assert_eq!(doc.field_str("alias"), Some("say \"hi\""));
    }

    #[test]
    fn test_non_string_scalars_and_nested_objects() {
        let doc =
            ConfigDocument::parse(r#"{"flag": true, "nested": {"a": [1, 2]}, "port": "COM3"}"#)
                .unwrap();
        let flag = doc.value_range("flag").unwrap();
        assert_eq!(flag.end.character - flag.start.character, 4);
        let nested = doc.value_range("nested").unwrap();
        assert_eq!(nested.end.character - nested.start.character, 13);
        assert!(doc.value_range("port").is_some());
    }

    #[test]
    fn test_field_str() {
        let doc = ConfigDocument::parse(DOC).unwrap();
        assert_eq!(doc.field_str("port"), Some("/dev/ttyACM0"));
        assert_eq!(doc.field_str("additionalUrls"), None);
        assert_eq!(doc.field_str("missing"), None);
    }
}
