use std::collections::BTreeSet;

use ahash::AHashMap;
use serde::ser::SerializeMap;
use serde::Serialize;
use serde_json::Value;

use crate::dialect::KeywordKind;
use crate::pointer::JsonPointer;

/// How far an array applicator reached into the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// items `0..n` were evaluated
    UpTo(usize),
    /// every item was evaluated
    All,
}

/// Keyword-specific annotation payload.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationValue {
    /// property names an object applicator matched
    Properties(BTreeSet<String>),
    /// array indices `contains` matched
    Indices(BTreeSet<usize>),
    /// prefix reached by an array applicator
    Applied(Applied),
    /// outcome of `if`
    Bool(bool),
    /// raw value annotations (`title`, `default`, `format`, ...)
    Json(Value),
}

impl AnnotationValue {
    /// raw JSON form used on the wire
    pub fn to_value(&self) -> Value {
        match self {
            AnnotationValue::Properties(props) => {
                Value::Array(props.iter().cloned().map(Value::String).collect())
            }
            AnnotationValue::Indices(indices) => {
                Value::Array(indices.iter().map(|&i| Value::from(i)).collect())
            }
            AnnotationValue::Applied(Applied::UpTo(n)) => Value::from(*n),
            AnnotationValue::Applied(Applied::All) => Value::Bool(true),
            AnnotationValue::Bool(b) => Value::Bool(*b),
            AnnotationValue::Json(v) => v.clone(),
        }
    }

    // Two annotations from the same keyword type at the same instance
    // location accumulate rather than clobber: multiple applicator
    // branches may visit the location.
    fn merge(&mut self, new: AnnotationValue) {
        match (self, new) {
            (AnnotationValue::Properties(old), AnnotationValue::Properties(new)) => {
                old.extend(new);
            }
            (AnnotationValue::Indices(old), AnnotationValue::Indices(new)) => {
                old.extend(new);
            }
            (AnnotationValue::Applied(old), AnnotationValue::Applied(new)) => {
                *old = match (*old, new) {
                    (Applied::All, _) | (_, Applied::All) => Applied::All,
                    (Applied::UpTo(a), Applied::UpTo(b)) => Applied::UpTo(a.max(b)),
                };
            }
            (old, new) => *old = new,
        }
    }
}

/// Non-failing, informational output a keyword attaches to an instance
/// location, consumable by later keywords and surfaced in the result.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub kind: KeywordKind,
    pub instance_location: JsonPointer,
    pub schema_location: JsonPointer,
    pub absolute_schema_location: Option<String>,
    pub value: AnnotationValue,
}

impl Serialize for Annotation {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let n = 4 + self.absolute_schema_location.as_ref().map_or(0, |_| 1);
        let mut map = serializer.serialize_map(Some(n))?;
        map.serialize_entry("keyword", self.kind.name())?;
        map.serialize_entry("instanceLocation", &self.instance_location)?;
        map.serialize_entry("schemaLocation", &self.schema_location)?;
        if let Some(abs) = &self.absolute_schema_location {
            map.serialize_entry("absoluteSchemaLocation", abs)?;
        }
        map.serialize_entry("value", &self.value.to_value())?;
        map.end()
    }
}

/// Per-instance-location storage of keyword annotations with merge
/// semantics. Keyed by `(keyword type, instance location)`.
#[derive(Debug, Clone, Default)]
pub struct AnnotationContainer {
    map: AHashMap<(KeywordKind, JsonPointer), Annotation>,
}

impl AnnotationContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ann: Annotation) {
        let key = (ann.kind, ann.instance_location.clone());
        match self.map.get_mut(&key) {
            Some(existing) => existing.value.merge(ann.value),
            None => {
                self.map.insert(key, ann);
            }
        }
    }

    pub fn get(&self, kind: KeywordKind, instance_location: &JsonPointer) -> Option<&Annotation> {
        self.map.get(&(kind, instance_location.clone()))
    }

    /// combines annotations from an independently evaluated branch
    pub fn merge(&mut self, other: AnnotationContainer) {
        for ann in other.map.into_values() {
            self.insert(ann);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.map.values()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// deterministic order for results: by instance location, then keyword
    pub fn into_sorted(self) -> Vec<Annotation> {
        let mut v: Vec<Annotation> = self.map.into_values().collect();
        v.sort_by(|a, b| {
            (a.instance_location.to_string(), a.kind.name())
                .cmp(&(b.instance_location.to_string(), b.kind.name()))
        });
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ann(kind: KeywordKind, loc: JsonPointer, value: AnnotationValue) -> Annotation {
        Annotation {
            kind,
            instance_location: loc,
            schema_location: JsonPointer::root(),
            absolute_schema_location: None,
            value,
        }
    }

    #[test]
    fn test_property_sets_union() {
        let mut c = AnnotationContainer::new();
        let loc = JsonPointer::root();
        c.insert(ann(
            KeywordKind::Properties,
            loc.clone(),
            AnnotationValue::Properties(BTreeSet::from(["a".to_owned()])),
        ));
        c.insert(ann(
            KeywordKind::Properties,
            loc.clone(),
            AnnotationValue::Properties(BTreeSet::from(["b".to_owned()])),
        ));
        let got = c.get(KeywordKind::Properties, &loc).unwrap();
        assert_eq!(
            got.value,
            AnnotationValue::Properties(BTreeSet::from(["a".to_owned(), "b".to_owned()]))
        );
    }

    #[test]
    fn test_applied_merges_to_largest() {
        let mut c = AnnotationContainer::new();
        let loc = JsonPointer::root();
        c.insert(ann(
            KeywordKind::PrefixItems,
            loc.clone(),
            AnnotationValue::Applied(Applied::UpTo(2)),
        ));
        c.insert(ann(
            KeywordKind::PrefixItems,
            loc.clone(),
            AnnotationValue::Applied(Applied::UpTo(5)),
        ));
        let got = c.get(KeywordKind::PrefixItems, &loc).unwrap();
        assert_eq!(got.value, AnnotationValue::Applied(Applied::UpTo(5)));

        c.insert(ann(
            KeywordKind::PrefixItems,
            loc.clone(),
            AnnotationValue::Applied(Applied::All),
        ));
        let got = c.get(KeywordKind::PrefixItems, &loc).unwrap();
        assert_eq!(got.value, AnnotationValue::Applied(Applied::All));
    }

    #[test]
    fn test_merge_with_self_is_idempotent() {
        let mut c = AnnotationContainer::new();
        c.insert(ann(
            KeywordKind::Properties,
            JsonPointer::root(),
            AnnotationValue::Properties(BTreeSet::from(["a".to_owned(), "b".to_owned()])),
        ));
        c.insert(ann(
            KeywordKind::Contains,
            JsonPointer::root().prop("x"),
            AnnotationValue::Indices(BTreeSet::from([0, 2])),
        ));
        let before = c.clone().into_sorted();
        let copy = c.clone();
        c.merge(copy);
        assert_eq!(c.into_sorted(), before);
    }

    #[test]
    fn test_distinct_locations_do_not_merge() {
        let mut c = AnnotationContainer::new();
        c.insert(ann(
            KeywordKind::Properties,
            JsonPointer::root(),
            AnnotationValue::Properties(BTreeSet::from(["a".to_owned()])),
        ));
        c.insert(ann(
            KeywordKind::Properties,
            JsonPointer::root().prop("a"),
            AnnotationValue::Properties(BTreeSet::from(["b".to_owned()])),
        ));
        assert_eq!(c.len(), 2);
    }
}
