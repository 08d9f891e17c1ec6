//! String and query-string helpers shared by the engine, [`Url`](crate::Url)
//! and [`Request`](crate::Request).

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Characters escaped by a URI component encoder.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Strip spaces, tabs, line breaks, vertical tabs and form feeds.
pub fn trim(s: &str) -> &str {
    s.trim_matches(|c| matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0B' | '\x0C'))
}

/// Escape text for insertion as markup.
pub fn html_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Reverse [`html_encode`].
pub fn html_decode(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Size of `s` in bytes once UTF-8 encoded.
pub fn byte_size(s: &str) -> usize {
    s.len()
}

/// Replace every occurrence of each key with its value in a single pass.
///
/// At each position the first listed key that matches wins, and replaced
/// text is never rescanned.
pub fn str_replace(s: &str, data: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(c) = rest.chars().next() {
        let hit = data
            .iter()
            .find(|(key, _)| !key.is_empty() && rest.starts_with(key));
        match hit {
            Some((key, value)) => {
                out.push_str(value);
                rest = &rest[key.len()..];
            }
            None => {
                out.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }
    out
}

/// Encode a value as a URI component.
pub fn encode_component(s: &str) -> String {
    utf8_percent_encode(s, COMPONENT).to_string()
}

/// Decode a URI component.
pub fn decode_component(s: &str) -> Result<String> {
    percent_decode_str(s)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|e| Error::InvalidUrl {
            component: s.to_string(),
            reason: e.to_string(),
        })
}

/// Serialize a JSON object into a bracketed query string.
///
/// Nested objects become `a[b]=1`, arrays `a[]=1&a[]=2`, and arrays of
/// objects `a[][b]=1`. Null values are skipped. Non-object input yields an
/// empty string.
pub fn object_to_query(data: &Value) -> String {
    match data {
        Value::Object(map) => build_query(map, None),
        _ => String::new(),
    }
}

fn build_query(map: &Map<String, Value>, prefix: Option<&str>) -> String {
    let mut parts = Vec::new();
    for (key, value) in map {
        let name = match prefix {
            Some(prefix) => format!("{}[{}]", prefix, encode_component(key)),
            None => encode_component(key),
        };
        match value {
            Value::Null => continue,
            Value::Array(items) => {
                let name = format!("{}[]", name);
                for item in items {
                    match item {
                        Value::Object(inner) => parts.push(build_query(inner, Some(&name))),
                        Value::Null | Value::Array(_) => continue,
                        scalar => parts.push(format!("{}={}", name, encode_scalar(scalar))),
                    }
                }
            }
            Value::Object(inner) => parts.push(build_query(inner, Some(&name))),
            scalar => parts.push(format!("{}={}", name, encode_scalar(scalar))),
        }
    }
    parts.retain(|part| !part.is_empty());
    parts.join("&")
}

fn encode_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => encode_component(s),
        other => encode_component(&other.to_string()),
    }
}

/// Parse a bracketed query string into a JSON object.
///
/// The inverse of [`object_to_query`]: repeated plain keys collapse into
/// arrays, `a[]` appends, and `a[][b]` writes into the last object of the
/// array, starting one if the array is empty or ends in a scalar.
pub fn query_to_object(query: &str) -> Result<Value> {
    let mut root = Value::Object(Map::new());
    for part in query.split('&').filter(|part| !part.is_empty()) {
        let (raw_key, raw_value) = part.split_once('=').unwrap_or((part, ""));
        let key = decode_component(raw_key)?;
        let value = decode_component(raw_value)?;
        let path = key_path(&key);
        if path.is_empty() {
            continue;
        }
        root = set_deep(root, &path, value);
    }
    Ok(root)
}

/// Split `a[b][]` into `["a", "b", ""]`.
fn key_path(key: &str) -> Vec<String> {
    let mut path = Vec::new();
    let mut name = String::new();
    let mut chars = key.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '[' if chars.peek() == Some(&']') => {
                chars.next();
                if !name.is_empty() {
                    path.push(std::mem::take(&mut name));
                }
                path.push(String::new());
            }
            '[' | ']' => {
                if !name.is_empty() {
                    path.push(std::mem::take(&mut name));
                }
            }
            _ => name.push(c),
        }
    }
    if !name.is_empty() {
        path.push(name);
    }
    path
}

fn set_deep(target: Value, path: &[String], value: String) -> Value {
    let Some((key, rest)) = path.split_first() else {
        return target;
    };

    if key.is_empty() {
        let mut items = match target {
            Value::Array(items) => items,
            _ => Vec::new(),
        };
        if rest.is_empty() {
            items.push(Value::String(value));
        } else {
            let needs_slot = !matches!(items.last(), Some(Value::Object(_)));
            if needs_slot {
                items.push(Value::Object(Map::new()));
            }
            if let Some(last) = items.pop() {
                items.push(set_deep(last, rest, value));
            }
        }
        return Value::Array(items);
    }

    let mut map = match target {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    if rest.is_empty() {
        let merged = match map.remove(key) {
            None => Value::String(value),
            Some(Value::Array(mut items)) => {
                items.push(Value::String(value));
                Value::Array(items)
            }
            Some(existing) => Value::Array(vec![existing, Value::String(value)]),
        };
        map.insert(key.clone(), merged);
    } else {
        let child = map
            .remove(key)
            .unwrap_or_else(|| Value::Object(Map::new()));
        map.insert(key.clone(), set_deep(child, rest, value));
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("  padded\t", "padded")]
    #[case("\x0B\x0Cvt-ff\r\n", "vt-ff")]
    #[case("   ", "")]
    #[case("inner space kept", "inner space kept")]
    fn trim_strips_markup_whitespace(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(trim(input), expected);
    }

    #[test]
    fn html_encode_escapes_markup() {
        let raw = r#"<b class="x">Tom & Jerry's</b>"#;
        let encoded = html_encode(raw);
        assert_eq!(
            encoded,
            "&lt;b class=&quot;x&quot;&gt;Tom &amp; Jerry&#39;s&lt;/b&gt;"
        );
        assert_eq!(html_decode(&encoded), raw);
        assert_eq!(html_decode("&amp;lt;"), "&lt;");
    }

    #[test]
    fn byte_size_counts_utf8() {
        assert_eq!(byte_size("abc"), 3);
        assert_eq!(byte_size("é"), 2);
        assert_eq!(byte_size("€"), 3);
        assert_eq!(byte_size("😀"), 4);
    }

    #[test]
    fn str_replace_is_single_pass() {
        let out = str_replace("{name} at {time}", &[("{name}", "{time}"), ("{time}", "9:00")]);
        assert_eq!(out, "{time} at 9:00");
        assert_eq!(str_replace("abc", &[]), "abc");
    }

    #[test]
    fn object_to_query_flattens_nested_values() {
        let data = json!({
            "service": "cleaning",
            "page": 2,
            "skip": null,
            "filter": {"doctor": "Ana Cruz"},
            "ids": [1, 2],
            "slots": [{"start": "9:00"}]
        });
        assert_eq!(
            object_to_query(&data),
            "service=cleaning&page=2&filter[doctor]=Ana%20Cruz&ids[]=1&ids[]=2&slots[][start]=9%3A00"
        );
        assert_eq!(object_to_query(&json!("scalar")), "");
    }

    #[test]
    fn query_to_object_rebuilds_nesting() {
        let parsed =
            query_to_object("service=cleaning&filter[doctor]=Ana%20Cruz&ids[]=1&ids[]=2&tag=a&tag=b")
                .unwrap();
        assert_eq!(
            parsed,
            json!({
                "service": "cleaning",
                "filter": {"doctor": "Ana Cruz"},
                "ids": ["1", "2"],
                "tag": ["a", "b"]
            })
        );
    }

    #[test]
    fn query_to_object_groups_array_objects() {
        let parsed = query_to_object("s[][start]=9&s[][end]=10&s[][start]=11").unwrap();
        assert_eq!(
            parsed,
            json!({"s": [{"start": ["9", "11"], "end": "10"}]})
        );
    }

    #[test]
    fn query_to_object_handles_empty_and_bad_input() {
        assert_eq!(query_to_object("").unwrap(), json!({}));
        assert_eq!(query_to_object("flag").unwrap(), json!({"flag": ""}));
        assert!(query_to_object("bad=%FF").is_err());
    }
}
