//! Request payload for the upstream generate endpoint.
//!
//! The upstream expects a positional array, mostly nulls, serialized to
//! compact JSON and then embedded as a string inside a second JSON array in
//! the `f.req` form field. The shape mirrors what the web client sends and
//! has no meaning of its own; positions must not move.

use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::{json, Value};
use std::io;

/// Form field carrying the serialized request.
pub const FORM_FIELD: &str = "f.req";

/// Number of top-level positions in the request array.
pub const REQUEST_ARRAY_LEN: usize = 62;

/// Position of the per-call session id in the request array.
pub const SESSION_ID_SLOT: usize = 4;
/// Position of the per-call request UUID in the request array.
pub const REQUEST_UUID_SLOT: usize = 59;

/// Identifiers generated fresh for every forwarded prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIds {
    /// Random UUID as 32 lowercase hex digits.
    pub session_id: String,
    /// Random UUID, uppercase, hyphenated.
    pub request_uuid: String,
}

impl RequestIds {
    pub fn generate() -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().simple().to_string(),
            request_uuid: uuid::Uuid::new_v4().hyphenated().to_string().to_uppercase(),
        }
    }
}

/// Escape a prompt for embedding inside a JSON string.
///
/// Backslashes go first so the escapes added for quotes and newlines are not
/// escaped a second time.
pub fn escape_prompt(prompt: &str) -> String {
    prompt
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Escape serialized JSON for the form layer. Newlines are left alone.
pub fn escape_for_form(json: &str) -> String {
    json.replace('\\', "\\\\").replace('"', "\\\"")
}

fn push_nulls(fields: &mut Vec<Value>, n: usize) {
    fields.extend(std::iter::repeat(Value::Null).take(n));
}

/// Build the positional request array for one prompt.
pub fn build_request_array(prompt: &str, token: &str, ids: &RequestIds, locale: &str) -> Value {
    let mut fields: Vec<Value> = Vec::with_capacity(REQUEST_ARRAY_LEN);

    fields.push(json!([escape_prompt(prompt), 0, null, null, null, null, 0]));
    fields.push(json!([locale]));
    fields.push(json!(["", "", "", null, null, null, null, null, null, ""]));
    fields.push(Value::from(token));
    fields.push(Value::from(ids.session_id.as_str()));
    push_nulls(&mut fields, 1);
    fields.push(json!([0]));
    fields.push(json!(1));
    push_nulls(&mut fields, 2);
    fields.push(json!(1));
    fields.push(json!(0));
    push_nulls(&mut fields, 5);
    fields.push(json!([[0]]));
    fields.push(json!(0));
    push_nulls(&mut fields, 8);
    fields.push(json!(1));
    push_nulls(&mut fields, 2);
    fields.push(json!([4]));
    push_nulls(&mut fields, 10);
    fields.push(json!([2]));
    push_nulls(&mut fields, 11);
    fields.push(json!(0));
    push_nulls(&mut fields, 5);
    fields.push(Value::from(ids.request_uuid.as_str()));
    push_nulls(&mut fields, 1);
    fields.push(json!([]));

    debug_assert_eq!(fields.len(), REQUEST_ARRAY_LEN);
    Value::Array(fields)
}

/// Compact formatter that writes everything outside printable ASCII as
/// lowercase `\uXXXX` escapes, the way the upstream web client encodes.
struct AsciiFormatter;

impl Formatter for AsciiFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (i, ch) in fragment.char_indices() {
            if ch.is_ascii() && ch != '\u{7f}' {
                continue;
            }
            writer.write_all(fragment[start..i].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }
            start = i + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

/// Serialize to compact, ASCII-only JSON.
pub fn to_ascii_json(value: &Value) -> serde_json::Result<String> {
    let mut out = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut out, AsciiFormatter);
    value.serialize(&mut ser)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// The form sent to the generate endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadForm {
    /// Value of the `f.req` field: `[null,"<escaped request json>"]`.
    pub f_req: String,
}

impl UploadForm {
    pub fn new(prompt: &str, token: &str, ids: &RequestIds, locale: &str) -> serde_json::Result<Self> {
        let request = build_request_array(prompt, token, ids, locale);
        let json = to_ascii_json(&request)?;
        Ok(Self {
            f_req: format!("[null,\"{}\"]", escape_for_form(&json)),
        })
    }

    /// Fields in send order. The empty-named field is always present.
    pub fn fields(&self) -> [(&str, &str); 2] {
        [(FORM_FIELD, self.f_req.as_str()), ("", "")]
    }

    /// `application/x-www-form-urlencoded` body.
    pub fn encode(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.fields())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_ids() -> RequestIds {
        RequestIds {
            session_id: "SESSION_ID".to_string(),
            request_uuid: "REQUEST_UUID".to_string(),
        }
    }

    /// Undo `escape_prompt`.
    fn unescape_prompt(escaped: &str) -> String {
        let mut out = String::new();
        let mut chars = escaped.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => out.push('\n'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        }
        out
    }

    /// Parse an `f.req` value the way the upstream does and return the prompt.
    fn decode_prompt(f_req: &str) -> String {
        let outer: Value = serde_json::from_str(f_req).unwrap();
        assert!(outer[0].is_null());
        let inner: Value = serde_json::from_str(outer[1].as_str().unwrap()).unwrap();
        unescape_prompt(inner[0][0].as_str().unwrap())
    }

    #[test]
    fn test_escape_order() {
        assert_eq!(escape_prompt(r#"a\"b"#), r#"a\\\"b"#);
        assert_eq!(escape_prompt("line1\nline2"), r"line1\nline2");
        assert_eq!(escape_prompt(r"C:\path"), r"C:\\path");
        assert_eq!(escape_prompt(""), "");
    }

    #[test]
    fn test_form_escape_leaves_newlines() {
        assert_eq!(escape_for_form("[\"a\\\\b\"]\n"), "[\\\"a\\\\\\\\b\\\"]\n");
    }

    #[test]
    fn test_request_array_matches_web_client_shape() {
        let value = build_request_array("P", "TOKEN", &fixed_ids(), "en-US");
        let expected = concat!(
            r#"[["P",0,null,null,null,null,0],["en-US"],["","","",null,null,null,null,null,null,""],"#,
            r#""TOKEN","SESSION_ID",null,[0],1,null,null,1,0,null,null,null,null,null,[[0]],0,"#,
            r#"null,null,null,null,null,null,null,null,1,null,null,[4],"#,
            r#"null,null,null,null,null,null,null,null,null,null,[2],"#,
            r#"null,null,null,null,null,null,null,null,null,null,null,0,"#,
            r#"null,null,null,null,null,"REQUEST_UUID",null,[]]"#
        );
        assert_eq!(to_ascii_json(&value).unwrap(), expected);
        assert_eq!(value.as_array().unwrap().len(), REQUEST_ARRAY_LEN);
        assert_eq!(value[SESSION_ID_SLOT], "SESSION_ID");
        assert_eq!(value[REQUEST_UUID_SLOT], "REQUEST_UUID");
    }

    #[test]
    fn test_ascii_json_escapes_non_ascii() {
        let value = json!(["café", "😀", "tab\there", "\u{7f}"]);
        assert_eq!(
            to_ascii_json(&value).unwrap(),
            r#"["caf\u00e9","\ud83d\ude00","tab\there","\u007f"]"#
        );
    }

    #[test]
    fn test_f_req_wrapping() {
        let form = UploadForm::new("hi", "TOKEN", &fixed_ids(), "en-US").unwrap();
        assert!(form.f_req.starts_with(r#"[null,"[[\"hi\",0,null"#));
        assert!(form.f_req.ends_with(r#"\"REQUEST_UUID\",null,[]]"]"#));
    }

    #[test]
    fn test_prompt_round_trip() {
        let prompts = [
            "plain",
            "",
            "quote \" inside",
            "back\\slash and \\\" both",
            "multi\nline\n\nprompt",
            "trailing backslash \\",
            "unicode ünïcödé and 日本語 😀",
            "{\"json\": [1, 2, \"x\\n\"]}",
        ];
        for prompt in prompts {
            let form = UploadForm::new(prompt, "TOKEN", &fixed_ids(), "en-US").unwrap();
            assert_eq!(decode_prompt(&form.f_req), prompt, "prompt {prompt:?}");
        }
    }

    #[test]
    fn test_encoded_body_has_empty_field() {
        let form = UploadForm::new("a b&c", "TOKEN", &fixed_ids(), "en-US").unwrap();
        let body = form.encode();
        assert!(body.starts_with("f.req=%5Bnull%2C%22"));
        assert!(body.ends_with("&="));

        let pairs: Vec<(String, String)> = url::form_urlencoded::parse(body.as_bytes())
            .into_owned()
            .collect();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].0, FORM_FIELD);
        assert_eq!(pairs[0].1, form.f_req);
        assert_eq!(pairs[1], (String::new(), String::new()));
    }

    #[test]
    fn test_generated_ids_are_well_formed_and_fresh() {
        let a = RequestIds::generate();
        let b = RequestIds::generate();

        assert_eq!(a.session_id.len(), 32);
        assert!(a
            .session_id
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));

        assert_eq!(a.request_uuid.len(), 36);
        assert_eq!(a.request_uuid, a.request_uuid.to_uppercase());
        assert!(uuid::Uuid::parse_str(&a.request_uuid).is_ok());

        assert_ne!(a.session_id, b.session_id);
        assert_ne!(a.request_uuid, b.request_uuid);
    }
}
