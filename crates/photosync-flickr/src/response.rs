//! Response body normalization
//!
//! Flickr does not always answer in JSON. REST calls return JSON, the upload
//! endpoint returns a small XML document, and OAuth failures come back as a
//! querystring. Everything is normalized to the JSON shape before the
//! `stat` field is checked:
//!
//! ```text
//! <rsp stat="ok"><photoid>123</photoid></rsp>
//!     => {"stat": "ok", "photoid": {"_content": "123"}}
//! <rsp stat="fail"><err code="5" msg="Filetype was not recognised"/></rsp>
//!     => {"stat": "fail", "err": {"code": "5", "msg": "Filetype was not recognised"}}
//! oauth_problem=signature_invalid
//!     => {"stat": "fail", "oauth_problem": "signature_invalid"}
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::FlickrError;

static XML_DECLARATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\s*<\?xml.*?\?>").expect("static regex"));
static RSP_ELEMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<rsp\b([^>]*)>(.*)</rsp>").expect("static regex"));
static CHILD_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<([A-Za-z_][\w.-]*)((?:\s+[\w:.-]+\s*=\s*(?:\x22[^\x22]*\x22|'[^']*'))*)\s*(?:/>|>([^<]*)</[A-Za-z_][\w.-]*\s*>)")
        .expect("static regex")
});
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([\w:.-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("static regex")
});

/// Code reported for OAuth problems, which carry no Flickr error code
pub const OAUTH_PROBLEM_CODE: i64 = 0;

/// Parses a body and checks its `stat`
pub fn normalize(body: &str) -> Result<Value, FlickrError> {
    check_stat(parse_body(body)?)
}

/// Parses a response body of any of the three shapes into a JSON value
pub fn parse_body(body: &str) -> Result<Value, FlickrError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(FlickrError::InvalidResponse("empty response body".into()));
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }
    if trimmed.starts_with('<') {
        return parse_xml(trimmed);
    }
    if trimmed.contains('=') && !trimmed.contains(char::is_whitespace) {
        return Ok(parse_querystring(trimmed));
    }

    Err(FlickrError::InvalidResponse(format!(
        "unrecognized response body: {}",
        truncate(trimmed, 200)
    )))
}

/// Returns the value unchanged if `stat` is `ok` (or absent), an
/// [`FlickrError::Api`] otherwise
pub fn check_stat(value: Value) -> Result<Value, FlickrError> {
    match value.get("stat").and_then(Value::as_str) {
        None | Some("ok") => Ok(value),
        Some(_) => {
            let (code, message) = failure_details(&value);
            Err(FlickrError::Api { code, message })
        }
    }
}

/// Follows a dotted path such as `photoset.photo` into `value`
///
/// An empty path selects the whole value.
pub fn select<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| match current {
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => current.get(segment),
        })
}

fn failure_details(value: &Value) -> (i64, String) {
    // JSON: {"stat":"fail","code":1,"message":"..."}
    if let Some(code) = value.get("code").and_then(as_i64_lenient) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return (code, message);
    }
    // XML: {"stat":"fail","err":{"code":"5","msg":"..."}}
    if let Some(err) = value.get("err") {
        let code = err.get("code").and_then(as_i64_lenient).unwrap_or(-1);
        let message = err
            .get("msg")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return (code, message);
    }
    if let Some(problem) = value.get("oauth_problem").and_then(Value::as_str) {
        return (OAUTH_PROBLEM_CODE, format!("oauth_problem={problem}"));
    }
    (-1, value.to_string())
}

fn as_i64_lenient(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_xml(body: &str) -> Result<Value, FlickrError> {
    let body = XML_DECLARATION.replace(body, "");

    let (mut root, inner) = match RSP_ELEMENT.captures(&body) {
        Some(caps) => {
            let attributes = caps.get(1).map_or("", |m| m.as_str());
            let inner = caps.get(2).map_or("", |m| m.as_str()).to_string();
            (parse_attributes(attributes), inner)
        }
        None => (Map::new(), body.to_string()),
    };

    let mut children = 0;
    for caps in CHILD_ELEMENT.captures_iter(&inner) {
        let name = &caps[1];
        let mut node = parse_attributes(caps.get(2).map_or("", |m| m.as_str()));
        if let Some(text) = caps.get(3) {
            let text = text.as_str().trim();
            if !text.is_empty() {
                node.insert("_content".into(), Value::String(unescape(text)));
            }
        }
        root.insert(name.to_string(), Value::Object(node));
        children += 1;
    }

    if root.is_empty() && children == 0 {
        return Err(FlickrError::InvalidResponse(format!(
            "unparseable XML response: {}",
            truncate(&body, 200)
        )));
    }
    Ok(Value::Object(root))
}

fn parse_attributes(source: &str) -> Map<String, Value> {
    ATTRIBUTE
        .captures_iter(source)
        .map(|caps| {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map_or("", |m| m.as_str());
            (caps[1].to_string(), Value::String(unescape(value)))
        })
        .collect()
}

fn parse_querystring(body: &str) -> Value {
    let mut map: Map<String, Value> = url::form_urlencoded::parse(body.as_bytes())
        .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
        .collect();
    if map.contains_key("oauth_problem") && !map.contains_key("stat") {
        map.insert("stat".into(), Value::String("fail".into()));
    }
    Value::Object(map)
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
