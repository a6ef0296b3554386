use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{self, Display};

use regex::Regex;
use serde_json::{Map, Value};
use url::Url;

use crate::context::{Context, Resource, Root};
use crate::dialect::{Dialect, KeywordKind, POS_ITEM, POS_PROP, POS_SELF, SUBSCHEMAS};
use crate::keywords::{Keyword, KeywordInstance};
use crate::pointer::JsonPointer;
use crate::util::{escape, fragment_to_anchor, lookup_ptr, parse_url, path_unescape, split, to_strings};
use crate::{BooleanSchema, ObjectSchema, Schema, SchemaIndex};

/// Error type for [`Context::compile`] and [`Context::add_resource`].
#[derive(Debug)]
pub enum CompileError {
    ParseUrlError {
        url: String,
        src: url::ParseError,
    },
    ResourceNotFound {
        url: String,
    },
    InvalidFragment {
        url: String,
    },
    InvalidMetaSchema {
        url: String,
    },
    InvalidVocabulary {
        url: String,
    },
    UnsupportedVocabulary {
        url: String,
        vocabulary: String,
    },
    InvalidId {
        loc: String,
    },
    InvalidAnchor {
        loc: String,
    },
    DuplicateId {
        url: String,
        id: String,
    },
    InvalidRegex {
        loc: String,
        src: regex::Error,
    },
    UrlFragmentNotFound {
        url: String,
    },
    SchemaNotBooleanOrObject {
        loc: String,
    },
    AnchorNotFound {
        url: String,
        anchor: String,
    },
}

impl Error for CompileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ParseUrlError { src, .. } => Some(src),
            Self::InvalidRegex { src, .. } => Some(src),
            _ => None,
        }
    }
}

impl Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParseUrlError { url, src } => write!(f, "error parsing url {url}: {src}"),
            Self::ResourceNotFound { url } => write!(f, "resource {url} not found"),
            Self::InvalidFragment { url } => write!(f, "invalid fragment in {url}"),
            Self::InvalidMetaSchema { url } => write!(f, "invalid meta-schema {url}"),
            Self::InvalidVocabulary { url } => write!(f, "invalid $vocabulary in {url}"),
            Self::UnsupportedVocabulary { url, vocabulary } => {
                write!(f, "{url} requires unsupported vocabulary {vocabulary}")
            }
            Self::InvalidId { loc } => write!(f, "invalid $id at {loc}"),
            Self::InvalidAnchor { loc } => write!(f, "invalid $anchor at {loc}"),
            Self::DuplicateId { url, id } => write!(f, "duplicate $id {id} in {url}"),
            Self::InvalidRegex { loc, src } => write!(f, "invalid regex at {loc}: {src}"),
            Self::UrlFragmentNotFound { url } => write!(f, "fragment in {url} not found"),
            Self::SchemaNotBooleanOrObject { loc } => {
                write!(f, "schema at {loc} must be boolean or object")
            }
            Self::AnchorNotFound { url, anchor } => {
                write!(f, "anchor {anchor} not found in {url}")
            }
        }
    }
}

impl Context {
    /// Compiles the schema at `loc` into the arena and returns its
    /// index. `loc` is a url optionally followed by a json-pointer or
    /// anchor fragment; the url must belong to an added resource.
    /// Compiling the same location twice returns the same index.
    pub fn compile(&mut self, loc: &str) -> Result<SchemaIndex, CompileError> {
        let (u, frag) = split(loc);
        let url = parse_url(u)
            .map_err(|src| CompileError::ParseUrlError {
                url: u.to_owned(),
                src,
            })?
            .to_string();

        // the url may name a document or a resource embedded in one
        let (doc_url, res_ptr) = if self.docs.contains_key(&url) {
            self.scan_root(&url)?;
            (url.clone(), String::new())
        } else {
            if !self.res_map.contains_key(&url) {
                // embedded ids surface only when their document is scanned
                let urls: Vec<String> = self.docs.keys().cloned().collect();
                for u in urls {
                    self.scan_root(&u)?;
                }
            }
            match self.res_map.get(&url) {
                Some((doc_url, res_ptr)) => (doc_url.clone(), res_ptr.clone()),
                None => return Err(CompileError::ResourceNotFound { url }),
            }
        };

        let ptr = match fragment_to_anchor(frag)
            .map_err(|_| CompileError::InvalidFragment { url: loc.to_owned() })?
        {
            None => {
                let frag = path_unescape(frag)
                    .map_err(|_| CompileError::InvalidFragment { url: loc.to_owned() })?;
                format!("{res_ptr}{frag}")
            }
            Some(anchor) => {
                let target = self
                    .roots
                    .get(&doc_url)
                    .and_then(|root| root.resources.get(&res_ptr))
                    .and_then(|res| {
                        res.anchors
                            .get(anchor.as_ref())
                            .or_else(|| res.dynamic_anchors.get(anchor.as_ref()))
                    });
                match target {
                    Some(ptr) => ptr.clone(),
                    None => {
                        return Err(CompileError::AnchorNotFound {
                            url,
                            anchor: anchor.into_owned(),
                        })
                    }
                }
            }
        };

        self.compile_ptr(&doc_url, &ptr)
    }

    /// reports whether `loc` resolves to a dynamic anchor of its resource
    pub(crate) fn is_dynamic_anchor(&self, loc: &str) -> bool {
        let (u, frag) = split(loc);
        let Ok(Some(anchor)) = fragment_to_anchor(frag) else {
            return false;
        };
        let (doc_url, res_ptr) = if self.docs.contains_key(u) {
            (u.to_owned(), String::new())
        } else {
            match self.res_map.get(u) {
                Some((doc_url, res_ptr)) => (doc_url.clone(), res_ptr.clone()),
                None => return false,
            }
        };
        self.roots
            .get(&doc_url)
            .and_then(|root| root.resources.get(&res_ptr))
            .map_or(false, |res| res.dynamic_anchors.contains_key(anchor.as_ref()))
    }

    /// Resolves a dynamic anchor against the dynamic scope: the first
    /// (outermost) resource in scope defining the anchor wins.
    pub(crate) fn resolve_dynamic_anchor(&self, name: &str) -> Option<String> {
        for id in &self.dynamic_scope {
            if let Some((doc_url, res_ptr)) = self.res_map.get(id) {
                let root = self.roots.get(doc_url)?;
                let res = root.resources.get(res_ptr)?;
                if let Some(ptr) = res.dynamic_anchors.get(name) {
                    return Some(format!("{doc_url}#{ptr}"));
                }
            }
        }
        None
    }

    fn scan_root(&mut self, url: &str) -> Result<(), CompileError> {
        if self.roots.contains_key(url) {
            return Ok(());
        }
        let doc = self
            .docs
            .get(url)
            .cloned()
            .ok_or_else(|| CompileError::ResourceNotFound {
                url: url.to_owned(),
            })?;
        let active_keywords = self.active_keywords(&doc)?;

        let mut resources = HashMap::new();
        self.scan_value(url, &doc, String::new(), String::new(), &mut resources)?;

        self.roots.insert(
            url.to_owned(),
            Root {
                url: url.to_owned(),
                doc,
                resources,
                active_keywords,
            },
        );
        Ok(())
    }

    /// keywords activated by the document's meta-schema
    fn active_keywords(&self, doc: &Value) -> Result<Vec<KeywordKind>, CompileError> {
        let Some(sch) = doc.get("$schema") else {
            return Ok(self.dialect.keywords(None));
        };
        let Value::String(sch) = sch else {
            return Err(CompileError::InvalidMetaSchema {
                url: sch.to_string(),
            });
        };
        if Dialect::from_url(sch).is_some() {
            return Ok(self.dialect.keywords(None));
        }

        // custom meta-schema: its $vocabulary decides the keyword set
        let meta_url = parse_url(sch)
            .map_err(|src| CompileError::ParseUrlError {
                url: sch.clone(),
                src,
            })?
            .to_string();
        let meta = self
            .docs
            .get(&meta_url)
            .ok_or_else(|| CompileError::InvalidMetaSchema { url: sch.clone() })?;
        let Some(vocabs) = meta.get("$vocabulary") else {
            return Ok(self.dialect.keywords(None));
        };
        let Value::Object(vocabs) = vocabs else {
            return Err(CompileError::InvalidVocabulary { url: meta_url });
        };

        let known = self.dialect.vocabularies();
        let mut active = HashSet::new();
        for (vocab, required) in vocabs {
            if known.contains(&vocab.as_str()) {
                active.insert(vocab.clone());
            } else if required == &Value::Bool(true) {
                return Err(CompileError::UnsupportedVocabulary {
                    url: meta_url,
                    vocabulary: vocab.clone(),
                });
            }
            // unknown optional vocabularies are ignored
        }
        Ok(self.dialect.keywords(Some(&active)))
    }

    /// Walks subschema positions collecting resources and anchors.
    /// `res_ptr` is the pointer of the innermost enclosing resource.
    fn scan_value(
        &mut self,
        url: &str,
        v: &Value,
        ptr: String,
        res_ptr: String,
        resources: &mut HashMap<String, Resource>,
    ) -> Result<(), CompileError> {
        let Value::Object(obj) = v else {
            return Ok(());
        };

        let mut res_ptr = res_ptr;
        let base = match resources.get(&res_ptr) {
            Some(res) => res.id.clone(),
            None => url.to_owned(),
        };

        // A plain $id establishes a new resource. A fragment-only $id
        // (legacy draft-07 form) merely names an anchor.
        let mut plain_id = None;
        let mut id_anchor = None;
        match obj.get("$id") {
            Some(Value::String(id)) => {
                let loc = format!("{url}#{ptr}");
                let base_url = Url::parse(&base)
                    .map_err(|src| CompileError::ParseUrlError { url: base.clone(), src })?;
                let mut joined = base_url
                    .join(id)
                    .map_err(|_| CompileError::InvalidId { loc: loc.clone() })?;
                match joined.fragment() {
                    Some(frag) if !frag.is_empty() => {
                        let anchor = frag.to_owned();
                        joined.set_fragment(None);
                        if joined.as_str() != base {
                            return Err(CompileError::InvalidId { loc });
                        }
                        id_anchor = Some(anchor);
                    }
                    _ => {
                        joined.set_fragment(None);
                        plain_id = Some(joined.to_string());
                    }
                }
            }
            Some(_) => {
                return Err(CompileError::InvalidId {
                    loc: format!("{url}#{ptr}"),
                })
            }
            None => {}
        }

        if ptr.is_empty() || plain_id.is_some() {
            let id = plain_id.unwrap_or(base);
            if let Some((prev_url, prev_ptr)) = self.res_map.get(&id) {
                if (prev_url.as_str(), prev_ptr.as_str()) != (url, ptr.as_str()) {
                    return Err(CompileError::DuplicateId {
                        url: url.to_owned(),
                        id,
                    });
                }
            }
            self.res_map.insert(id.clone(), (url.to_owned(), ptr.clone()));
            resources.insert(ptr.clone(), Resource::new(id));
            res_ptr = ptr.clone();
        }

        if let Some(anchor) = id_anchor {
            let res = resources.get_mut(&res_ptr).ok_or_else(|| {
                CompileError::ResourceNotFound {
                    url: url.to_owned(),
                }
            })?;
            res.anchors.insert(anchor, ptr.clone());
        }

        for (kw, field) in [("$anchor", false), ("$dynamicAnchor", true)] {
            if let Some(anchor) = obj.get(kw) {
                let Value::String(anchor) = anchor else {
                    return Err(CompileError::InvalidAnchor {
                        loc: format!("{url}#{ptr}"),
                    });
                };
                if !valid_anchor(anchor) {
                    return Err(CompileError::InvalidAnchor {
                        loc: format!("{url}#{ptr}"),
                    });
                }
                let res = resources.get_mut(&res_ptr).ok_or_else(|| {
                    CompileError::ResourceNotFound {
                        url: url.to_owned(),
                    }
                })?;
                if field {
                    res.dynamic_anchors.insert(anchor.clone(), ptr.clone());
                } else {
                    res.anchors.insert(anchor.clone(), ptr.clone());
                }
            }
        }

        for (kw, v) in obj {
            let Some(&pos) = SUBSCHEMAS.get(kw.as_str()) else {
                continue;
            };
            let kw_ptr = format!("{ptr}/{}", escape(kw));
            if pos & POS_SELF != 0 {
                self.scan_value(url, v, kw_ptr.clone(), res_ptr.clone(), resources)?;
            }
            if pos & POS_PROP != 0 {
                if let Value::Object(props) = v {
                    for (name, child) in props {
                        let child_ptr = format!("{kw_ptr}/{}", escape(name));
                        self.scan_value(url, child, child_ptr, res_ptr.clone(), resources)?;
                    }
                }
            }
            if pos & POS_ITEM != 0 {
                if let Value::Array(items) = v {
                    for (i, child) in items.iter().enumerate() {
                        let child_ptr = format!("{kw_ptr}/{i}");
                        self.scan_value(url, child, child_ptr, res_ptr.clone(), resources)?;
                    }
                }
            }
        }
        Ok(())
    }

    pub(crate) fn compile_ptr(&mut self, url: &str, ptr: &str) -> Result<SchemaIndex, CompileError> {
        let loc = format!("{url}#{ptr}");
        if let Some(index) = self.schemas.get_by_loc(&loc) {
            return Ok(index);
        }

        let root = self
            .roots
            .get(url)
            .ok_or_else(|| CompileError::ResourceNotFound {
                url: url.to_owned(),
            })?;
        let doc = root.doc.clone();
        let active = root.active_keywords.clone();
        let base_id = root.base_id(ptr).to_owned();
        let resource_id = root.resources.get(ptr).map(|res| res.id.clone());

        let v = lookup_ptr(&doc, ptr)
            .map_err(|_| CompileError::InvalidFragment { url: loc.clone() })?
            .ok_or_else(|| CompileError::UrlFragmentNotFound { url: loc.clone() })?;

        let location = JsonPointer::parse(ptr)
            .map_err(|_| CompileError::InvalidFragment { url: loc.clone() })?;

        match v {
            Value::Bool(b) => {
                let sch = Schema::Boolean(BooleanSchema {
                    value: *b,
                    location,
                    loc: loc.clone(),
                });
                Ok(self.schemas.insert(loc, sch))
            }
            Value::Object(obj) => {
                let obj = obj.clone();
                let keywords = self.compile_keywords(url, ptr, &loc, &obj, &active, &base_id)?;
                let sch = Schema::Object(ObjectSchema {
                    raw: obj,
                    keywords,
                    location,
                    resource_id,
                    loc: loc.clone(),
                });
                Ok(self.schemas.insert(loc, sch))
            }
            _ => Err(CompileError::SchemaNotBooleanOrObject { loc }),
        }
    }

    /// Parses the recognized keywords in dialect order. Subschemas
    /// compile recursively; references stay as locations and resolve
    /// lazily at evaluation time.
    fn compile_keywords(
        &mut self,
        url: &str,
        ptr: &str,
        loc: &str,
        obj: &Map<String, Value>,
        active: &[KeywordKind],
        base_id: &str,
    ) -> Result<Vec<KeywordInstance>, CompileError> {
        use KeywordKind::*;

        let sub_self = |kw: &str| format!("{ptr}/{}", escape(kw));
        let sub_prop = |kw: &str, name: &str| format!("{ptr}/{}/{}", escape(kw), escape(name));
        let sub_item = |kw: &str, i: usize| format!("{ptr}/{}/{i}", escape(kw));

        let mut keywords = Vec::new();
        for &kind in active {
            let Some(v) = obj.get(kind.name()) else {
                continue;
            };
            let value = match kind {
                // identifiers are consumed while scanning the document
                KeywordKind::Schema | Vocabulary | Id | Anchor | DynamicAnchor | Comment
                | Defs => continue,

                Title | Description | Default | Deprecated | ReadOnly | WriteOnly | Examples => {
                    Keyword::Annotation(v.clone())
                }

                Type => {
                    let types = match v {
                        Value::String(s) => crate::keywords::Type::from_str(s)
                            .into_iter()
                            .collect(),
                        Value::Array(arr) => arr
                            .iter()
                            .filter_map(|t| t.as_str())
                            .filter_map(crate::keywords::Type::from_str)
                            .collect(),
                        _ => continue,
                    };
                    Keyword::Type(types)
                }
                Enum => match v {
                    Value::Array(arr) => Keyword::Enum(arr.clone()),
                    _ => continue,
                },
                Const => Keyword::Const(v.clone()),
                MultipleOf | Maximum | ExclusiveMaximum | Minimum | ExclusiveMinimum => {
                    let Value::Number(n) = v else {
                        continue;
                    };
                    let n = n.clone();
                    match kind {
                        MultipleOf => Keyword::MultipleOf(n),
                        Maximum => Keyword::Maximum(n),
                        ExclusiveMaximum => Keyword::ExclusiveMaximum(n),
                        Minimum => Keyword::Minimum(n),
                        _ => Keyword::ExclusiveMinimum(n),
                    }
                }
                MaxLength | MinLength | MaxItems | MinItems | MaxProperties | MinProperties
                | MinContains | MaxContains => {
                    let Some(n) = v.as_u64() else {
                        continue;
                    };
                    let n = n as usize;
                    match kind {
                        MaxLength => Keyword::MaxLength(n),
                        MinLength => Keyword::MinLength(n),
                        MaxItems => Keyword::MaxItems(n),
                        MinItems => Keyword::MinItems(n),
                        MaxProperties => Keyword::MaxProperties(n),
                        MinProperties => Keyword::MinProperties(n),
                        MinContains => Keyword::MinContains(n),
                        _ => Keyword::MaxContains(n),
                    }
                }
                Pattern => {
                    let Value::String(s) = v else {
                        continue;
                    };
                    let regex = Regex::new(s).map_err(|src| CompileError::InvalidRegex {
                        loc: format!("{loc}/pattern"),
                        src,
                    })?;
                    Keyword::Pattern(regex)
                }
                UniqueItems => match v {
                    Value::Bool(true) => Keyword::UniqueItems,
                    _ => continue,
                },
                Required => Keyword::Required(to_strings(v)),
                DependentRequired => {
                    let Value::Object(deps) = v else {
                        continue;
                    };
                    Keyword::DependentRequired(
                        deps.iter().map(|(k, v)| (k.clone(), to_strings(v))).collect(),
                    )
                }
                Format => {
                    let Value::String(name) = v else {
                        continue;
                    };
                    Keyword::Format {
                        name: name.clone(),
                        func: self.formats.get(name.as_str()).map(|f| f.func),
                    }
                }

                Properties => {
                    let Value::Object(props) = v else {
                        continue;
                    };
                    let mut list = Vec::with_capacity(props.len());
                    for name in props.keys() {
                        let index = self.compile_ptr(url, &sub_prop("properties", name))?;
                        list.push((name.clone(), index));
                    }
                    Keyword::Properties(list)
                }
                PatternProperties => {
                    let Value::Object(props) = v else {
                        continue;
                    };
                    let mut list = Vec::with_capacity(props.len());
                    for pat in props.keys() {
                        let regex = Regex::new(pat).map_err(|src| CompileError::InvalidRegex {
                            loc: format!("{loc}/patternProperties"),
                            src,
                        })?;
                        let index =
                            self.compile_ptr(url, &sub_prop("patternProperties", pat))?;
                        list.push((regex, index));
                    }
                    Keyword::PatternProperties(list)
                }
                DependentSchemas => {
                    let Value::Object(deps) = v else {
                        continue;
                    };
                    let mut list = Vec::with_capacity(deps.len());
                    for name in deps.keys() {
                        let index = self.compile_ptr(url, &sub_prop("dependentSchemas", name))?;
                        list.push((name.clone(), index));
                    }
                    Keyword::DependentSchemas(list)
                }
                AdditionalProperties | PropertyNames | Items | Contains | Not | If | Then
                | Else | UnevaluatedItems | UnevaluatedProperties => {
                    let index = self.compile_ptr(url, &sub_self(kind.name()))?;
                    match kind {
                        AdditionalProperties => Keyword::AdditionalProperties(index),
                        PropertyNames => Keyword::PropertyNames(index),
                        Items => Keyword::Items(index),
                        Contains => Keyword::Contains(index),
                        Not => Keyword::Not(index),
                        If => Keyword::If(index),
                        Then => Keyword::Then(index),
                        Else => Keyword::Else(index),
                        UnevaluatedItems => Keyword::UnevaluatedItems(index),
                        _ => Keyword::UnevaluatedProperties(index),
                    }
                }
                PrefixItems | AllOf | AnyOf | OneOf => {
                    let Value::Array(items) = v else {
                        continue;
                    };
                    let mut list = Vec::with_capacity(items.len());
                    for i in 0..items.len() {
                        list.push(self.compile_ptr(url, &sub_item(kind.name(), i))?);
                    }
                    match kind {
                        PrefixItems => Keyword::PrefixItems(list),
                        AllOf => Keyword::AllOf(list),
                        AnyOf => Keyword::AnyOf(list),
                        _ => Keyword::OneOf(list),
                    }
                }

                Ref | DynamicRef => {
                    let Value::String(s) = v else {
                        continue;
                    };
                    let target = resolve_against(base_id, s).ok_or_else(|| {
                        CompileError::ParseUrlError {
                            url: s.clone(),
                            src: url::ParseError::RelativeUrlWithoutBase,
                        }
                    })?;
                    if kind == Ref {
                        Keyword::Ref(target)
                    } else {
                        let (_, frag) = split(&target);
                        let anchor = match fragment_to_anchor(frag) {
                            Ok(Some(anchor)) => Some(anchor.into_owned()),
                            _ => None,
                        };
                        Keyword::DynamicRef { target, anchor }
                    }
                }
            };
            keywords.push(KeywordInstance { kind, value });
        }
        Ok(keywords)
    }
}

/// joins a reference against the base resource id, keeping the fragment
fn resolve_against(base_id: &str, reference: &str) -> Option<String> {
    let base = Url::parse(base_id).ok()?;
    let joined = base.join(reference).ok()?;
    Some(joined.to_string())
}

// see https://www.w3.org/TR/xml-names/#NT-NCName
fn valid_anchor(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_anchor() {
        assert!(valid_anchor("node"));
        assert!(valid_anchor("_tmp"));
        assert!(valid_anchor("a-b.c_d1"));
        assert!(!valid_anchor(""));
        assert!(!valid_anchor("1abc"));
        assert!(!valid_anchor("a/b"));
    }

    #[test]
    fn test_resolve_against() {
        assert_eq!(
            resolve_against("http://a.com/dir/s.json", "other.json").as_deref(),
            Some("http://a.com/dir/other.json")
        );
        assert_eq!(
            resolve_against("http://a.com/s.json", "#/$defs/a").as_deref(),
            Some("http://a.com/s.json#/$defs/a")
        );
    }
}
