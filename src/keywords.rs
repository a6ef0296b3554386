use std::fmt::{self, Display};

use regex::Regex;
use serde_json::{Number, Value};

use crate::dialect::KeywordKind;
use crate::SchemaIndex;

/// JSON types as the `type` keyword sees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Null,
    Boolean,
    Number,
    Integer,
    String,
    Array,
    Object,
}

impl Type {
    pub(crate) fn of(v: &Value) -> Self {
        match v {
            Value::Null => Type::Null,
            Value::Bool(_) => Type::Boolean,
            Value::Number(_) => Type::Number,
            Value::String(_) => Type::String,
            Value::Array(_) => Type::Array,
            Value::Object(_) => Type::Object,
        }
    }

    pub(crate) fn from_str(s: &str) -> Option<Self> {
        match s {
            "null" => Some(Type::Null),
            "boolean" => Some(Type::Boolean),
            "number" => Some(Type::Number),
            "integer" => Some(Type::Integer),
            "string" => Some(Type::String),
            "array" => Some(Type::Array),
            "object" => Some(Type::Object),
            _ => None,
        }
    }

    /// reports whether the value belongs to this type; `integer` accepts
    /// any number with a zero fraction, including `2.0`
    pub(crate) fn matches(&self, v: &Value) -> bool {
        match self {
            Type::Integer => match v {
                Value::Number(n) => {
                    n.is_i64() || n.is_u64() || n.as_f64().map_or(false, |f| f.fract() == 0.0)
                }
                _ => false,
            },
            t => *t == Type::of(v),
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Null => write!(f, "null"),
            Type::Boolean => write!(f, "boolean"),
            Type::Number => write!(f, "number"),
            Type::Integer => write!(f, "integer"),
            Type::String => write!(f, "string"),
            Type::Array => write!(f, "array"),
            Type::Object => write!(f, "object"),
        }
    }
}

/// One keyword of a compiled object schema, in evaluation order.
#[derive(Debug)]
pub struct KeywordInstance {
    pub kind: KeywordKind,
    pub(crate) value: Keyword,
}

/// Parsed keyword payload. Applicators hold indexes into the schema
/// arena; the raw form is kept separately on the schema for round-trip.
#[derive(Debug)]
pub(crate) enum Keyword {
    // meta-data keywords merely annotate
    Annotation(Value),

    // assertions
    Type(Vec<Type>),
    Enum(Vec<Value>),
    Const(Value),
    MultipleOf(Number),
    Maximum(Number),
    ExclusiveMaximum(Number),
    Minimum(Number),
    ExclusiveMinimum(Number),
    MaxLength(usize),
    MinLength(usize),
    Pattern(Regex),
    MaxItems(usize),
    MinItems(usize),
    UniqueItems,
    MaxProperties(usize),
    MinProperties(usize),
    Required(Vec<String>),
    DependentRequired(Vec<(String, Vec<String>)>),
    Format {
        name: String,
        func: Option<fn(&str) -> bool>,
    },
    MinContains(usize),
    MaxContains(usize),

    // applicators
    Properties(Vec<(String, SchemaIndex)>),
    PatternProperties(Vec<(Regex, SchemaIndex)>),
    AdditionalProperties(SchemaIndex),
    PropertyNames(SchemaIndex),
    PrefixItems(Vec<SchemaIndex>),
    Items(SchemaIndex),
    Contains(SchemaIndex),
    AllOf(Vec<SchemaIndex>),
    AnyOf(Vec<SchemaIndex>),
    OneOf(Vec<SchemaIndex>),
    Not(SchemaIndex),
    If(SchemaIndex),
    Then(SchemaIndex),
    Else(SchemaIndex),
    DependentSchemas(Vec<(String, SchemaIndex)>),
    UnevaluatedItems(SchemaIndex),
    UnevaluatedProperties(SchemaIndex),

    // references, resolved lazily at evaluation time
    Ref(String),
    DynamicRef {
        target: String,
        anchor: Option<String>,
    },
}
