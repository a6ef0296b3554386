use std::collections::HashMap;
use std::rc::Rc;

use ahash::{AHashMap, AHashSet};
use serde_json::Value;

use crate::compiler::CompileError;
use crate::dialect::{Dialect, KeywordKind};
use crate::formats::{Format, FORMATS};
use crate::output::ValidationResult;
use crate::pointer::JsonPointer;
use crate::util::parse_url;
use crate::validator::Evaluator;
use crate::{Schema, SchemaIndex, Schemas};

/// A scanned schema document: its resources, anchors and the keyword
/// set its meta-schema activates.
pub(crate) struct Root {
    pub(crate) url: String,
    pub(crate) doc: Rc<Value>,
    /// json-pointer of resource root => resource
    pub(crate) resources: HashMap<String, Resource>,
    /// dialect keywords surviving the vocabulary filter, in order
    pub(crate) active_keywords: Vec<KeywordKind>,
}

impl Root {
    /// the base uri in effect at `ptr`, for resolving references
    pub(crate) fn base_id(&self, ptr: &str) -> &str {
        &self.resource_of(ptr).1.id
    }

    /// the innermost resource enclosing `ptr`
    pub(crate) fn resource_of<'s, 'p>(&'s self, mut ptr: &'p str) -> (&'p str, &'s Resource) {
        loop {
            if let Some(res) = self.resources.get(ptr) {
                return (ptr, res);
            }
            match ptr.rfind('/') {
                Some(i) => ptr = &ptr[..i],
                // root resource always exists
                None => {
                    let res = &self.resources[""];
                    return ("", res);
                }
            }
        }
    }
}

/// A schema resource: the document root, or a subschema with `$id`.
pub(crate) struct Resource {
    pub(crate) id: String,
    /// anchor name => json-pointer within the document
    pub(crate) anchors: HashMap<String, String>,
    /// dynamic anchor name => json-pointer within the document
    pub(crate) dynamic_anchors: HashMap<String, String>,
}

impl Resource {
    pub(crate) fn new(id: String) -> Self {
        Self {
            id,
            anchors: HashMap::new(),
            dynamic_anchors: HashMap::new(),
        }
    }
}

/// Shared state for compiling and validating schemas. Owns the schema
/// arena, the added resources, and the tables built while scanning
/// them. A single context can validate any number of instances.
pub struct Context {
    pub(crate) dialect: Dialect,
    /// url => raw document, as added by the caller
    pub(crate) docs: AHashMap<String, Rc<Value>>,
    /// url => scanned root
    pub(crate) roots: AHashMap<String, Root>,
    /// resource id => (document url, json-pointer of resource root)
    pub(crate) res_map: AHashMap<String, (String, String)>,
    pub(crate) schemas: Schemas,
    /// references in flight, keyed by (schema location, instance location)
    pub(crate) resolving: AHashSet<(String, String)>,
    /// resource ids entered during evaluation, outermost first
    pub(crate) dynamic_scope: Vec<String>,
    pub(crate) formats: HashMap<&'static str, Format>,
    pub(crate) assert_formats: bool,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self {
            dialect: Dialect::default(),
            docs: AHashMap::new(),
            roots: AHashMap::new(),
            res_map: AHashMap::new(),
            schemas: Schemas::default(),
            resolving: AHashSet::new(),
            dynamic_scope: Vec::new(),
            formats: FORMATS.clone(),
            assert_formats: false,
        }
    }

    /// Adds a schema document under `url`. References from other
    /// documents resolve against the resources added here; nothing is
    /// fetched from elsewhere.
    pub fn add_resource(&mut self, url: &str, json: Value) -> Result<(), CompileError> {
        let url = parse_url(url).map_err(|src| CompileError::ParseUrlError {
            url: url.to_owned(),
            src,
        })?;
        self.docs.insert(url.to_string(), Rc::new(json));
        Ok(())
    }

    /// Registers a custom format, replacing any existing format with
    /// the same name. Takes effect for schemas compiled afterwards.
    pub fn register_format(&mut self, format: Format) {
        self.formats.insert(format.name, format);
    }

    /// Makes `format` behave as an assertion. By default it only
    /// annotates, as draft 2020-12 prescribes.
    pub fn enable_format_assertions(&mut self) {
        self.assert_formats = true;
    }

    /// the compiled schema behind an index
    pub fn schema(&self, index: SchemaIndex) -> Rc<Schema> {
        self.schemas.get(index)
    }

    /// Validates `v` against the compiled schema. All failing keywords
    /// are collected; evaluation never stops at the first error.
    /// Needs `&mut self` because references compile lazily into the
    /// arena during evaluation.
    pub fn validate(&mut self, v: &Value, sch: SchemaIndex) -> ValidationResult {
        self.resolving.clear();
        self.dynamic_scope.clear();
        let (annotations, errors) = Evaluator { ctx: self }.eval(sch, v, JsonPointer::root());
        let valid = errors.is_empty();
        ValidationResult {
            valid,
            instance_location: JsonPointer::root(),
            errors,
            // annotations come only from successful evaluation
            annotations: if valid {
                annotations.into_sorted()
            } else {
                Vec::new()
            },
        }
    }
}
