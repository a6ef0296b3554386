/*!
Implements json-schema draft 2020-12 validation with full annotation
collection.

Schemas are compiled into an arena owned by [`Context`] and addressed
by [`SchemaIndex`]. The same context can compile any number of schemas
from the resources added to it, and validate any number of instances
against them.

```rust,no_run
use percheron::Context;
use serde_json::json;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let schema = json!({
        "type": "object",
        "properties": {
            "name": { "type": "string" }
        },
        "required": ["name"]
    });
    let instance = json!({ "name": "percheron" });

    let mut ctx = Context::new();
    ctx.add_resource("schema.json", schema)?;
    let sch = ctx.compile("schema.json")?;
    let result = ctx.validate(&instance, sch);
    assert!(result.valid);
    Ok(())
}
```

Validation never fails fast: every failing keyword is reported, with
applicator failures nesting the branch errors that caused them. The
result also carries the annotations collected from the successful
parts of the evaluation.
*/

mod annotations;
mod compiler;
mod context;
mod dialect;
mod formats;
mod keywords;
mod output;
mod pointer;
mod util;
mod validator;

use std::rc::Rc;

use ahash::AHashMap;
use serde_json::{Map, Value};

pub use annotations::{Annotation, AnnotationContainer, AnnotationValue, Applied};
pub use compiler::CompileError;
pub use context::Context;
pub use dialect::{Dialect, KeywordKind};
pub use formats::Format;
pub use keywords::{KeywordInstance, Type};
pub use output::{ErrorKind, FlagOutput, OneOf, ValidationError, ValidationResult};
pub use pointer::{JsonPointer, Token};

/// Identifies a schema in a [`Context`]'s arena. Copyable handle,
/// valid for the lifetime of the context it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaIndex(usize);

/// Arena of compiled schemas, deduplicated by absolute location.
#[derive(Default)]
pub(crate) struct Schemas {
    list: Vec<Rc<Schema>>,
    map: AHashMap<String, SchemaIndex>, // abs location => index
}

impl Schemas {
    pub(crate) fn insert(&mut self, loc: String, sch: Schema) -> SchemaIndex {
        let index = SchemaIndex(self.list.len());
        self.list.push(Rc::new(sch));
        self.map.insert(loc, index);
        index
    }

    // Rc clone lets callers hold the schema while the arena grows
    // underneath them during lazy reference compilation.
    pub(crate) fn get(&self, index: SchemaIndex) -> Rc<Schema> {
        Rc::clone(&self.list[index.0])
    }

    pub(crate) fn get_by_loc(&self, loc: &str) -> Option<SchemaIndex> {
        self.map.get(loc).copied()
    }
}

/// A compiled schema: draft 2020-12 allows `true`/`false` wherever a
/// schema is expected, so this is a two-armed type by construction.
#[derive(Debug)]
pub enum Schema {
    Boolean(BooleanSchema),
    Object(ObjectSchema),
}

impl Schema {
    /// location of this schema within its document
    pub fn location(&self) -> &JsonPointer {
        match self {
            Schema::Boolean(b) => &b.location,
            Schema::Object(o) => &o.location,
        }
    }

    pub(crate) fn loc(&self) -> &str {
        match self {
            Schema::Boolean(b) => &b.loc,
            Schema::Object(o) => &o.loc,
        }
    }

    /// Reproduces the schema as it appeared in its source document.
    /// Unknown and inactive keywords survive compilation untouched.
    pub fn to_value(&self) -> Value {
        match self {
            Schema::Boolean(b) => Value::Bool(b.value),
            Schema::Object(o) => Value::Object(o.raw.clone()),
        }
    }
}

/// `true` admits everything, `false` admits nothing.
#[derive(Debug)]
pub struct BooleanSchema {
    pub value: bool,
    pub location: JsonPointer,
    pub(crate) loc: String,
}

#[derive(Debug)]
pub struct ObjectSchema {
    /// keyword map exactly as found in the source document
    pub(crate) raw: Map<String, Value>,
    /// recognized keywords in dialect evaluation order
    pub(crate) keywords: Vec<KeywordInstance>,
    pub location: JsonPointer,
    /// resource id, if this schema is a resource root
    pub(crate) resource_id: Option<String>,
    pub(crate) loc: String,
}

impl ObjectSchema {
    /// the recognized keywords, in the order they will be evaluated
    pub fn keywords(&self) -> &[KeywordInstance] {
        &self.keywords
    }
}
