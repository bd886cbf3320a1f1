//! Canonical JSON encoding.
//!
//! Every structured signature in the protocol covers the canonical JSON
//! form of its input: object keys sorted lexicographically, `,` and `:`
//! separators with no surrounding whitespace, and pure-ASCII output with
//! non-ASCII characters escaped as `\uXXXX` (astral code points as
//! surrogate pairs). All signing and verification of structured values
//! must go through this module to avoid format drift between replicas.

use std::fmt::Write as _;

use serde::Serialize;
use serde_json::Value;

use crate::error::ChainError;

/// Encodes any serializable value into canonical JSON bytes.
pub fn to_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, ChainError> {
    Ok(to_string(value)?.into_bytes())
}

/// Encodes any serializable value into a canonical JSON string.
///
/// The output is guaranteed to be ASCII.
pub fn to_string<T: Serialize>(value: &T) -> Result<String, ChainError> {
    let value = serde_json::to_value(value)
        .map_err(|e| ChainError::Codec(format!("value is not JSON-representable: {e}")))?;

    let mut out = String::new();
    write_value(&mut out, &value);
    Ok(out)
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => {
            let _ = write!(out, "{n}");
        }
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            // Sort keys explicitly rather than relying on the map's
            // iteration order, which depends on serde_json features.
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, &map[key]);
            }
            out.push('}');
        }
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{08}' => out.push_str("\\b"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\u{0c}' => out.push_str("\\f"),
            '\r' => out.push_str("\\r"),
            c if (c as u32) >= 0x20 && (c as u32) < 0x7f => out.push(c),
            c => {
                let cp = c as u32;
                if cp <= 0xffff {
                    let _ = write!(out, "\\u{cp:04x}");
                } else {
                    // Encode astral code points as a UTF-16 surrogate pair.
                    let v = cp - 0x1_0000;
                    let hi = 0xd800 + (v >> 10);
                    let lo = 0xdc00 + (v & 0x3ff);
                    let _ = write!(out, "\\u{hi:04x}\\u{lo:04x}");
                }
            }
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn object_keys_are_sorted_with_compact_separators() {
        let value = json!({"b": 1, "a": "x", "c": [1, 2]});
        assert_eq!(to_string(&value).unwrap(), r#"{"a":"x","b":1,"c":[1,2]}"#);
    }

    #[test]
    fn nested_objects_are_canonicalized_recursively() {
        let value = json!({"outer": {"z": null, "y": {"q": true, "p": false}}});
        assert_eq!(
            to_string(&value).unwrap(),
            r#"{"outer":{"y":{"p":false,"q":true},"z":null}}"#,
        );
    }

    #[test]
    fn plain_strings_and_numbers_pass_through() {
        assert_eq!(to_string(&"hello world").unwrap(), r#""hello world""#);
        assert_eq!(to_string(&42).unwrap(), "42");
        assert_eq!(to_string(&-7).unwrap(), "-7");
    }

    #[test]
    fn control_characters_use_short_escapes() {
        assert_eq!(
            to_string(&"a\"b\\c\nd\te\rf\u{08}g\u{0c}h").unwrap(),
            r#""a\"b\\c\nd\te\rf\bg\fh""#,
        );
        assert_eq!(
            to_string(&"\u{01}\u{1f}").unwrap(),
            "\"\\u0001\\u001f\"",
        );
    }

    #[test]
    fn non_ascii_is_escaped_to_ascii() {
        assert_eq!(to_string(&"h\u{e9}llo").unwrap(), "\"h\\u00e9llo\"");
        assert_eq!(to_string(&"\u{7f}").unwrap(), "\"\\u007f\"");
        // An astral code point becomes a surrogate pair.
        assert_eq!(to_string(&"\u{1f389}").unwrap(), "\"\\ud83c\\udf89\"");
        assert!(to_string(&"\u{65e5}\u{672c}\u{8a9e}").unwrap().is_ascii());
    }

    #[test]
    fn signature_preimage_shape_is_stable() {
        // The exact pre-image used for message signatures.
        let value = json!({"payload": {"to": "a", "from": "b"}, "namespace": "ns"});
        assert_eq!(
            to_string(&value).unwrap(),
            r#"{"namespace":"ns","payload":{"from":"b","to":"a"}}"#,
        );
    }
}
