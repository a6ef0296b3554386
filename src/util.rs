use std::{borrow::Cow, fmt::Display, str::Utf8Error};

use once_cell::sync::Lazy;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use serde_json::Value;
use url::Url;

/// returns single-quoted string
pub(crate) fn quote<T>(s: &T) -> String
where
    T: AsRef<str> + std::fmt::Debug + ?Sized,
{
    let s = format!("{s:?}")
        .replace(r#"\""#, "\"")
        .replace('\'', r#"\'"#);
    format!("'{}'", &s[1..s.len() - 1])
}

pub(crate) fn join_iter<T>(iterable: T, sep: &str) -> String
where
    T: IntoIterator,
    T::Item: Display,
{
    iterable
        .into_iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(sep)
}

const FRAGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'%');

pub(crate) fn fragment_escape(s: &str) -> String {
    utf8_percent_encode(s, FRAGMENT).to_string()
}

pub(crate) fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

pub(crate) fn path_unescape(s: &str) -> Result<String, Utf8Error> {
    Ok(percent_decode_str(s).decode_utf8()?.into_owned())
}

pub(crate) fn unescape(token: &str) -> Result<String, Utf8Error> {
    path_unescape(&token.replace("~1", "/").replace("~0", "~"))
}

pub(crate) fn fragment_to_anchor(fragment: &str) -> Result<Option<Cow<str>>, Utf8Error> {
    if fragment.is_empty() || fragment.starts_with('/') {
        Ok(None) // json-pointer
    } else {
        Ok(Some(percent_decode_str(fragment).decode_utf8()?)) // anchor
    }
}

pub(crate) fn split(url: &str) -> (&str, &str) {
    if let Some(i) = url.find('#') {
        (&url[..i], &url[i + 1..])
    } else {
        (url, "")
    }
}

pub(crate) fn ptr_tokens(ptr: &str) -> impl Iterator<Item = Result<String, Utf8Error>> + '_ {
    ptr.split('/').skip(1).map(unescape)
}

static STANDIN: Lazy<Url> = Lazy::new(|| Url::parse("schema://local/").expect("static url"));

/// Parses `s` as an absolute url; bare paths like `schema.json` resolve
/// against a fixed standin base so they remain usable as resource keys.
pub(crate) fn parse_url(s: &str) -> Result<Url, url::ParseError> {
    match Url::parse(s) {
        Err(url::ParseError::RelativeUrlWithoutBase) => STANDIN.join(s),
        r => r,
    }
}

/// navigates `ptr` within `v`
pub(crate) fn lookup_ptr<'a>(v: &'a Value, ptr: &str) -> Result<Option<&'a Value>, Utf8Error> {
    let mut v = v;
    for tok in ptr_tokens(ptr) {
        let tok = tok?;
        match v {
            Value::Object(obj) => {
                if let Some(pvalue) = obj.get(&tok) {
                    v = pvalue;
                    continue;
                }
            }
            Value::Array(arr) => {
                if let Ok(i) = tok.parse::<usize>() {
                    if let Some(item) = arr.get(i) {
                        v = item;
                        continue;
                    }
                }
            }
            _ => {}
        }
        return Ok(None);
    }
    Ok(Some(v))
}

/// serde_json treats 0 and 0.0 not equal. so we cannot simply use v1==v2
pub(crate) fn equals(v1: &Value, v2: &Value) -> bool {
    match (v1, v2) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(b1), Value::Bool(b2)) => b1 == b2,
        (Value::Number(n1), Value::Number(n2)) => {
            if let (Some(n1), Some(n2)) = (n1.as_u64(), n2.as_u64()) {
                return n1 == n2;
            }
            if let (Some(n1), Some(n2)) = (n1.as_i64(), n2.as_i64()) {
                return n1 == n2;
            }
            if let (Some(n1), Some(n2)) = (n1.as_f64(), n2.as_f64()) {
                return n1 == n2;
            }
            false
        }
        (Value::String(s1), Value::String(s2)) => s1 == s2,
        (Value::Array(arr1), Value::Array(arr2)) => {
            if arr1.len() != arr2.len() {
                return false;
            }
            arr1.iter().zip(arr2).all(|(e1, e2)| equals(e1, e2))
        }
        (Value::Object(obj1), Value::Object(obj2)) => {
            if obj1.len() != obj2.len() {
                return false;
            }
            for (k1, v1) in obj1 {
                if let Some(v2) = obj2.get(k1) {
                    if !equals(v1, v2) {
                        return false;
                    }
                } else {
                    return false;
                }
            }
            true
        }
        _ => false,
    }
}

pub(crate) fn to_strings(v: &Value) -> Vec<String> {
    if let Value::Array(a) = v {
        a.iter()
            .filter_map(|t| {
                if let Value::String(t) = t {
                    Some(t.clone())
                } else {
                    None
                }
            })
            .collect()
    } else {
        vec![]
    }
}

/// appends a schema token to an absolute location like `http://a.com/s.json#/a/b`
pub(crate) fn append_frag(loc: &str, token: &str) -> String {
    let token = fragment_escape(&escape(token));
    if loc.contains('#') {
        format!("{loc}/{token}")
    } else {
        format!("{loc}#/{token}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote() {
        assert_eq!(quote(r#"abc"def'ghi"#), r#"'abc"def\'ghi'"#);
    }

    #[test]
    fn test_fragment_to_anchor() {
        assert_eq!(fragment_to_anchor(""), Ok(None));
        assert_eq!(fragment_to_anchor("/a/b"), Ok(None));
        assert_eq!(fragment_to_anchor("abcd"), Ok(Some(Cow::from("abcd"))));
        assert_eq!(
            fragment_to_anchor("%61%62%63%64"),
            Ok(Some(Cow::from("abcd")))
        );
    }

    #[test]
    fn test_equals() {
        let tests = [["1.0", "1"], ["-1.0", "-1"]];
        for [a, b] in tests {
            let a = serde_json::from_str(a).unwrap();
            let b = serde_json::from_str(b).unwrap();
            assert!(equals(&a, &b));
        }
    }

    #[test]
    fn test_lookup_ptr() {
        let v: Value = serde_json::from_str(r#"{"a": {"b~/c": [10, 20]}}"#).unwrap();
        let got = lookup_ptr(&v, "/a/b~0~1c/1").unwrap();
        assert_eq!(got, Some(&Value::from(20)));
        assert_eq!(lookup_ptr(&v, "/a/x").unwrap(), None);
    }

    #[test]
    fn test_parse_url() {
        assert_eq!(
            parse_url("http://a.com/s.json").unwrap().as_str(),
            "http://a.com/s.json"
        );
        assert_eq!(
            parse_url("schema.json").unwrap().as_str(),
            "schema://local/schema.json"
        );
    }
}
