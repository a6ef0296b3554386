use std::fmt::{self, Display, Formatter};

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{Number, Value};

use crate::annotations::Annotation;
use crate::keywords::Type;
use crate::pointer::JsonPointer;
use crate::util::{join_iter, quote};

/// how a `oneOf` failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OneOf {
    /// none of the subschemas matched
    NoneMatch,
    /// subschemas at both indexes matched
    MultiMatch(usize, usize),
}

/// One issue kind per keyword family. Composite kinds carry their
/// branch detail in [`ValidationError::causes`], never flattened.
#[derive(Debug)]
pub enum ErrorKind {
    FalseSchema,
    Type { got: Type, want: Vec<Type> },
    Enum { got: Value, want: Vec<Value> },
    Const { got: Value, want: Value },
    Format { got: String, want: String },
    UnknownFormat { format: String },
    MinProperties { got: usize, want: usize },
    MaxProperties { got: usize, want: usize },
    Required { want: Vec<String> },
    DependentRequired { got: String, want: Vec<String> },
    Properties { got: Vec<String> },
    PatternProperties { got: Vec<String> },
    PropertyName { got: String },
    AdditionalProperties { got: Vec<String> },
    DependentSchemas { got: String },
    MinItems { got: usize, want: usize },
    MaxItems { got: usize, want: usize },
    UniqueItems { got: [usize; 2] },
    PrefixItems,
    Items,
    Contains,
    MinContains { got: Vec<usize>, want: usize },
    MaxContains { got: Vec<usize>, want: usize },
    MinLength { got: usize, want: usize },
    MaxLength { got: usize, want: usize },
    Pattern { got: String, want: String },
    Minimum { got: Number, want: Number },
    Maximum { got: Number, want: Number },
    ExclusiveMinimum { got: Number, want: Number },
    ExclusiveMaximum { got: Number, want: Number },
    MultipleOf { got: Number, want: Number },
    Not,
    AllOf { subschema: Option<usize> },
    AnyOf { subschema: Option<usize> },
    OneOf(OneOf),
    Then,
    Else,
    Reference { url: String },
    DynamicReference { url: String },
    InvalidReference { url: String },
    RefCycle { url: String },
    UnevaluatedProperties { got: Vec<String> },
    UnevaluatedItems { got: Vec<usize> },
}

impl ErrorKind {
    /// the keyword this error belongs to, if any
    pub fn keyword(&self) -> Option<&'static str> {
        use ErrorKind::*;
        match self {
            FalseSchema => None,
            Type { .. } => Some("type"),
            Enum { .. } => Some("enum"),
            Const { .. } => Some("const"),
            Format { .. } | UnknownFormat { .. } => Some("format"),
            MinProperties { .. } => Some("minProperties"),
            MaxProperties { .. } => Some("maxProperties"),
            Required { .. } => Some("required"),
            DependentRequired { .. } => Some("dependentRequired"),
            Properties { .. } => Some("properties"),
            PatternProperties { .. } => Some("patternProperties"),
            PropertyName { .. } => Some("propertyNames"),
            AdditionalProperties { .. } => Some("additionalProperties"),
            DependentSchemas { .. } => Some("dependentSchemas"),
            MinItems { .. } => Some("minItems"),
            MaxItems { .. } => Some("maxItems"),
            UniqueItems { .. } => Some("uniqueItems"),
            PrefixItems => Some("prefixItems"),
            Items => Some("items"),
            Contains => Some("contains"),
            MinContains { .. } => Some("minContains"),
            MaxContains { .. } => Some("maxContains"),
            MinLength { .. } => Some("minLength"),
            MaxLength { .. } => Some("maxLength"),
            Pattern { .. } => Some("pattern"),
            Minimum { .. } => Some("minimum"),
            Maximum { .. } => Some("maximum"),
            ExclusiveMinimum { .. } => Some("exclusiveMinimum"),
            ExclusiveMaximum { .. } => Some("exclusiveMaximum"),
            MultipleOf { .. } => Some("multipleOf"),
            Not => Some("not"),
            AllOf { .. } => Some("allOf"),
            AnyOf { .. } => Some("anyOf"),
            OneOf(_) => Some("oneOf"),
            Then => Some("then"),
            Else => Some("else"),
            Reference { .. } | InvalidReference { .. } | RefCycle { .. } => Some("$ref"),
            DynamicReference { .. } => Some("$dynamicRef"),
            UnevaluatedProperties { .. } => Some("unevaluatedProperties"),
            UnevaluatedItems { .. } => Some("unevaluatedItems"),
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        use ErrorKind::*;
        match self {
            FalseSchema => write!(f, "false schema"),
            Type { got, want } => {
                write!(f, "want {}, but got {got}", join_iter(want, " or "))
            }
            Enum { want, .. } => {
                if want.len() == 1 {
                    write!(f, "value must be {}", want[0])
                } else {
                    write!(f, "value must be one of {}", join_iter(want, ", "))
                }
            }
            Const { want, .. } => write!(f, "value must be {want}"),
            Format { got, want } => write!(f, "{} is not valid {want}", quote(got)),
            UnknownFormat { format } => write!(f, "unknown format {}", quote(format)),
            MinProperties { got, want } => {
                write!(f, "minimum {want} properties required, but got {got} properties")
            }
            MaxProperties { got, want } => {
                write!(f, "maximum {want} properties allowed, but got {got} properties")
            }
            Required { want } => write!(
                f,
                "missing properties {}",
                join_iter(want.iter().map(quote), ", ")
            ),
            DependentRequired { got, want } => write!(
                f,
                "properties {} required, if {} property exists",
                join_iter(want.iter().map(quote), ", "),
                quote(got)
            ),
            Properties { got } => write!(
                f,
                "invalid properties {}",
                join_iter(got.iter().map(quote), ", ")
            ),
            PatternProperties { got } => write!(
                f,
                "invalid properties {}",
                join_iter(got.iter().map(quote), ", ")
            ),
            PropertyName { got } => write!(f, "invalid property name {}", quote(got)),
            AdditionalProperties { got } => write!(
                f,
                "additional properties {} not allowed",
                join_iter(got.iter().map(quote), ", ")
            ),
            DependentSchemas { got } => write!(f, "validation failed, if {} property exists", quote(got)),
            MinItems { got, want } => {
                write!(f, "minimum {want} items required, but got {got} items")
            }
            MaxItems { got, want } => {
                write!(f, "maximum {want} items allowed, but got {got} items")
            }
            UniqueItems { got: [i, j] } => write!(f, "items at {i} and {j} are equal"),
            PrefixItems => write!(f, "prefix items invalid"),
            Items => write!(f, "items invalid"),
            Contains => write!(f, "no item matches contains schema"),
            MinContains { got, want } => write!(
                f,
                "minimum {want} items required to match contains schema, but matched {} items at {}",
                got.len(),
                join_iter(got, ", ")
            ),
            MaxContains { got, want } => write!(
                f,
                "maximum {want} items allowed to match contains schema, but matched {} items at {}",
                got.len(),
                join_iter(got, ", ")
            ),
            MinLength { got, want } => {
                write!(f, "minimum {want} characters required, but got {got} characters")
            }
            MaxLength { got, want } => {
                write!(f, "maximum {want} characters allowed, but got {got} characters")
            }
            Pattern { got, want } => {
                write!(f, "{} does not match pattern {}", quote(got), quote(want))
            }
            Minimum { got, want } => write!(f, "must be >={want}, but got {got}"),
            Maximum { got, want } => write!(f, "must be <={want}, but got {got}"),
            ExclusiveMinimum { got, want } => write!(f, "must be >{want}, but got {got}"),
            ExclusiveMaximum { got, want } => write!(f, "must be <{want}, but got {got}"),
            MultipleOf { got, want } => write!(f, "{got} is not a multiple of {want}"),
            Not => write!(f, "not failed"),
            AllOf { subschema: Some(i) } => write!(f, "allOf failed at subschema {i}"),
            AllOf { subschema: None } => write!(f, "allOf failed"),
            AnyOf { subschema: Some(i) } => write!(f, "anyOf failed at subschema {i}"),
            AnyOf { subschema: None } => write!(f, "anyOf failed"),
            OneOf(self::OneOf::NoneMatch) => write!(f, "oneOf failed, none matched"),
            OneOf(self::OneOf::MultiMatch(i, j)) => {
                write!(f, "oneOf failed, subschemas {i} and {j} matched")
            }
            Then => write!(f, "if condition matched, but then failed"),
            Else => write!(f, "if condition did not match, and else failed"),
            Reference { url } => write!(f, "validation failed against referenced schema {url}"),
            DynamicReference { url } => {
                write!(f, "validation failed against dynamically referenced schema {url}")
            }
            InvalidReference { url } => write!(f, "cannot resolve reference {url}"),
            RefCycle { url } => write!(f, "reference cycle detected at {url}"),
            UnevaluatedProperties { got } => write!(
                f,
                "unevaluated properties {}",
                join_iter(got.iter().map(quote), ", ")
            ),
            UnevaluatedItems { got } => {
                write!(f, "unevaluated items at {}", join_iter(got, ", "))
            }
        }
    }
}

/// A failing keyword at one location. Composite keywords nest the
/// errors of the branches they delegated to under `causes`.
#[derive(Debug)]
pub struct ValidationError {
    pub kind: ErrorKind,
    pub keyword_location: JsonPointer,
    pub instance_location: JsonPointer,
    pub absolute_keyword_location: Option<String>,
    pub causes: Vec<ValidationError>,
}

impl ValidationError {
    pub fn keyword(&self) -> Option<&'static str> {
        self.kind.keyword()
    }

    /// human-readable message for this error alone, without causes
    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    fn write_indented(&self, f: &mut Formatter<'_>, indent: usize) -> fmt::Result {
        if indent > 0 {
            writeln!(f)?;
            for _ in 0..indent - 1 {
                write!(f, "  ")?;
            }
            write!(f, "- ")?;
        }
        write!(
            f,
            "at {}: {}",
            quote(&self.instance_location.to_string()),
            self.kind
        )?;
        for cause in &self.causes {
            cause.write_indented(f, indent + 1)?;
        }
        Ok(())
    }
}

impl Display for ValidationError {
    /// Formats the error hierarchy, one indented line per cause.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

impl Serialize for ValidationError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut n = 4;
        if self.absolute_keyword_location.is_some() {
            n += 1;
        }
        if !self.causes.is_empty() {
            n += 1;
        }
        let mut map = serializer.serialize_map(Some(n))?;
        map.serialize_entry("keyword", self.keyword().unwrap_or(""))?;
        map.serialize_entry("message", &self.message())?;
        map.serialize_entry("keywordLocation", &self.keyword_location)?;
        if let Some(abs) = &self.absolute_keyword_location {
            map.serialize_entry("absoluteKeywordLocation", abs)?;
        }
        map.serialize_entry("instanceLocation", &self.instance_location)?;
        if !self.causes.is_empty() {
            map.serialize_entry("errors", &self.causes)?;
        }
        map.end()
    }
}

/// Outcome of one top-level `validate` call.
#[derive(Debug)]
pub struct ValidationResult {
    pub valid: bool,
    pub instance_location: JsonPointer,
    pub errors: Vec<ValidationError>,
    pub annotations: Vec<Annotation>,
}

impl ValidationResult {
    /// the `Flag` output format, merely the boolean result
    pub fn flag_output(&self) -> FlagOutput {
        FlagOutput { valid: self.valid }
    }
}

impl Serialize for ValidationResult {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut n = 2;
        if !self.errors.is_empty() {
            n += 1;
        }
        if !self.annotations.is_empty() {
            n += 1;
        }
        let mut map = serializer.serialize_map(Some(n))?;
        map.serialize_entry("valid", &self.valid)?;
        map.serialize_entry("instanceLocation", &self.instance_location)?;
        if !self.errors.is_empty() {
            map.serialize_entry("errors", &self.errors)?;
        }
        if !self.annotations.is_empty() {
            map.serialize_entry("annotations", &self.annotations)?;
        }
        map.end()
    }
}

impl Display for ValidationResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_json_to_fmt(f, self)
    }
}

/// Simplest output format, merely the boolean result.
pub struct FlagOutput {
    pub valid: bool,
}

impl Serialize for FlagOutput {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("valid", &self.valid)?;
        map.end()
    }
}

impl Display for FlagOutput {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_json_to_fmt(f, self)
    }
}

pub(crate) fn write_json_to_fmt<T: Serialize>(f: &mut Formatter, value: &T) -> fmt::Result {
    let s = if f.alternate() {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    f.write_str(&s.map_err(|_| fmt::Error)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err(kind: ErrorKind) -> ValidationError {
        ValidationError {
            kind,
            keyword_location: JsonPointer::root().prop("minimum"),
            instance_location: JsonPointer::root(),
            absolute_keyword_location: None,
            causes: vec![],
        }
    }

    #[test]
    fn test_display_tree() {
        let mut outer = err(ErrorKind::AllOf { subschema: None });
        outer.causes.push(err(ErrorKind::Maximum {
            got: 15.into(),
            want: 10.into(),
        }));
        let s = outer.to_string();
        assert!(s.starts_with("at '': allOf failed"), "{s}");
        assert!(s.contains("- at '': must be <=10, but got 15"), "{s}");
    }

    #[test]
    fn test_serialize_shape() {
        let result = ValidationResult {
            valid: false,
            instance_location: JsonPointer::root(),
            errors: vec![err(ErrorKind::Minimum {
                got: (-1).into(),
                want: 0.into(),
            })],
            annotations: vec![],
        };
        let v = serde_json::to_value(&result).unwrap();
        assert_eq!(v["valid"], Value::Bool(false));
        assert_eq!(v["errors"][0]["keyword"], "minimum");
        assert_eq!(v["errors"][0]["keywordLocation"], "/minimum");
        // empty annotations are omitted entirely
        assert!(v.get("annotations").is_none());
        assert!(v["errors"][0].get("errors").is_none());
    }

    #[test]
    fn test_flag_output() {
        let flag = FlagOutput { valid: true };
        assert_eq!(flag.to_string(), r#"{"valid":true}"#);
    }
}
