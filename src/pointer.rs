use std::fmt::{self, Display, Write};
use std::str::Utf8Error;

use serde::Serialize;

use crate::util::{escape, fragment_escape, unescape};

/// Single RFC-6901 reference token: either an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    Prop(String),
    Item(usize),
}

impl Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Prop(s) => f.write_str(&escape(s)),
            Token::Item(i) => write!(f, "{i}"),
        }
    }
}

impl From<String> for Token {
    fn from(prop: String) -> Self {
        Token::Prop(prop)
    }
}

impl From<&str> for Token {
    fn from(prop: &str) -> Self {
        Token::Prop(prop.to_owned())
    }
}

impl From<usize> for Token {
    fn from(index: usize) -> Self {
        Token::Item(index)
    }
}

/// RFC-6901 json-pointer. Used both to navigate instances and as the
/// identity of a location in annotation/anchor tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct JsonPointer(Vec<Token>);

impl JsonPointer {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn tokens(&self) -> &[Token] {
        &self.0
    }

    pub fn push(&mut self, tok: Token) {
        self.0.push(tok);
    }

    /// returns a new pointer descending into property `name`
    pub fn prop(&self, name: &str) -> Self {
        let mut p = self.clone();
        p.0.push(name.into());
        p
    }

    /// returns a new pointer descending into item `i`
    pub fn item(&self, i: usize) -> Self {
        let mut p = self.clone();
        p.0.push(i.into());
        p
    }

    /// drops the last token; root stays root
    pub fn parent(&self) -> Self {
        let mut p = self.clone();
        p.0.pop();
        p
    }

    /// If `base` is a strict prefix, returns the remaining suffix.
    /// Otherwise returns self unchanged; callers must not assume the
    /// result is shorter.
    pub fn relative_to(&self, base: &JsonPointer) -> JsonPointer {
        if base.0.len() < self.0.len() && self.0.starts_with(&base.0) {
            JsonPointer(self.0[base.0.len()..].to_vec())
        } else {
            self.clone()
        }
    }

    /// uri fragment form: `#/a/b~1c`, percent-encoded
    pub fn as_fragment(&self) -> String {
        let mut r = String::from("#");
        for tok in &self.0 {
            r.push('/');
            match tok {
                Token::Prop(s) => r.push_str(&fragment_escape(&escape(s))),
                Token::Item(i) => write!(&mut r, "{i}").expect("write to String"),
            }
        }
        r
    }

    /// parses `#/a/b~1c` or `/a/b~1c`; tokens that look like indices
    /// (no leading zero) become items
    pub fn parse(s: &str) -> Result<Self, Utf8Error> {
        let s = s.strip_prefix('#').unwrap_or(s);
        if s.is_empty() {
            return Ok(Self::root());
        }
        let mut tokens = vec![];
        for tok in s.split('/').skip(1) {
            let tok = unescape(tok)?;
            if tok.parse::<usize>().is_ok() && (tok == "0" || !tok.starts_with('0')) {
                tokens.push(Token::Item(tok.parse().expect("checked parse")));
            } else {
                tokens.push(Token::Prop(tok));
            }
        }
        Ok(Self(tokens))
    }
}

impl Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for tok in &self.0 {
            f.write_char('/')?;
            tok.fmt(f)?;
        }
        Ok(())
    }
}

impl Serialize for JsonPointer {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl FromIterator<Token> for JsonPointer {
    fn from_iter<T: IntoIterator<Item = Token>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_escaping() {
        let ptr = JsonPointer::root().prop("a").prop("b/c").prop("d~e").item(3);
        assert_eq!(ptr.to_string(), "/a/b~1c/d~0e/3");
        assert_eq!(JsonPointer::root().to_string(), "");
    }

    #[test]
    fn test_fragment_round_trip() {
        let ptr = JsonPointer::root().prop("a").prop("b/c").item(0);
        let frag = ptr.as_fragment();
        assert_eq!(frag, "#/a/b~1c/0");
        assert_eq!(JsonPointer::parse(&frag).unwrap(), ptr);
        assert_eq!(JsonPointer::parse("#").unwrap(), JsonPointer::root());
    }

    #[test]
    fn test_relative_to() {
        let base = JsonPointer::root().prop("a");
        let ptr = JsonPointer::root().prop("a").prop("b").item(1);
        assert_eq!(ptr.relative_to(&base).to_string(), "/b/1");

        // not a strict prefix: original returned unchanged
        let other = JsonPointer::root().prop("x");
        assert_eq!(ptr.relative_to(&other), ptr);
        assert_eq!(ptr.relative_to(&ptr), ptr);
    }

    #[test]
    fn test_parent() {
        let ptr = JsonPointer::root().prop("a").item(2);
        assert_eq!(ptr.parent().to_string(), "/a");
        assert_eq!(JsonPointer::root().parent(), JsonPointer::root());
    }

    #[test]
    fn test_numeric_tokens_parse_as_items() {
        let ptr = JsonPointer::parse("/items/0").unwrap();
        assert_eq!(
            ptr.tokens(),
            &[Token::Prop("items".into()), Token::Item(0)]
        );
        // leading zero stays a property name
        let ptr = JsonPointer::parse("/a/01").unwrap();
        assert_eq!(ptr.tokens()[1], Token::Prop("01".into()));
    }
}
