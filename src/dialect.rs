use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;

use crate::util::{path_unescape, split};

/// Identity of every keyword the 2020-12 dialect recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeywordKind {
    // identifiers
    Schema,
    Vocabulary,
    Id,
    Anchor,
    DynamicAnchor,
    Comment,
    Defs,
    // meta-data annotations
    Title,
    Description,
    Default,
    Deprecated,
    ReadOnly,
    WriteOnly,
    Examples,
    // assertions
    Type,
    Enum,
    Const,
    MultipleOf,
    Maximum,
    ExclusiveMaximum,
    Minimum,
    ExclusiveMinimum,
    MaxLength,
    MinLength,
    Pattern,
    MaxItems,
    MinItems,
    UniqueItems,
    MaxProperties,
    MinProperties,
    Required,
    DependentRequired,
    Format,
    // structural applicators
    Properties,
    PatternProperties,
    AdditionalProperties,
    PropertyNames,
    PrefixItems,
    Items,
    Contains,
    // contains-annotation consumers
    MinContains,
    MaxContains,
    // references
    Ref,
    DynamicRef,
    // in-place applicators
    AllOf,
    AnyOf,
    OneOf,
    Not,
    If,
    Then,
    Else,
    DependentSchemas,
    // unevaluated, strictly last
    UnevaluatedItems,
    UnevaluatedProperties,
}

pub(crate) const VOCAB_CORE: &str = "https://json-schema.org/draft/2020-12/vocab/core";
pub(crate) const VOCAB_APPLICATOR: &str = "https://json-schema.org/draft/2020-12/vocab/applicator";
pub(crate) const VOCAB_UNEVALUATED: &str =
    "https://json-schema.org/draft/2020-12/vocab/unevaluated";
pub(crate) const VOCAB_VALIDATION: &str = "https://json-schema.org/draft/2020-12/vocab/validation";
pub(crate) const VOCAB_META_DATA: &str = "https://json-schema.org/draft/2020-12/vocab/meta-data";
pub(crate) const VOCAB_FORMAT_ANNOTATION: &str =
    "https://json-schema.org/draft/2020-12/vocab/format-annotation";
pub(crate) const VOCAB_FORMAT_ASSERTION: &str =
    "https://json-schema.org/draft/2020-12/vocab/format-assertion";
pub(crate) const VOCAB_CONTENT: &str = "https://json-schema.org/draft/2020-12/vocab/content";

static VOCABS_2020: &[&str] = &[
    VOCAB_CORE,
    VOCAB_APPLICATOR,
    VOCAB_UNEVALUATED,
    VOCAB_VALIDATION,
    VOCAB_META_DATA,
    VOCAB_FORMAT_ANNOTATION,
    VOCAB_FORMAT_ASSERTION,
    VOCAB_CONTENT,
];

// Evaluation order is a correctness contract, not a preference:
// `minContains`/`maxContains` read the annotation `contains` records,
// `then`/`else` read the outcome `if` records, and the unevaluated
// keywords read everything recorded before them, including annotations
// merged from `$ref` and the in-place applicator branches.
static KEYWORDS_2020: &[KeywordKind] = &[
    KeywordKind::Schema,
    KeywordKind::Vocabulary,
    KeywordKind::Id,
    KeywordKind::Anchor,
    KeywordKind::DynamicAnchor,
    KeywordKind::Comment,
    KeywordKind::Defs,
    KeywordKind::Title,
    KeywordKind::Description,
    KeywordKind::Default,
    KeywordKind::Deprecated,
    KeywordKind::ReadOnly,
    KeywordKind::WriteOnly,
    KeywordKind::Examples,
    KeywordKind::Type,
    KeywordKind::Enum,
    KeywordKind::Const,
    KeywordKind::MultipleOf,
    KeywordKind::Maximum,
    KeywordKind::ExclusiveMaximum,
    KeywordKind::Minimum,
    KeywordKind::ExclusiveMinimum,
    KeywordKind::MaxLength,
    KeywordKind::MinLength,
    KeywordKind::Pattern,
    KeywordKind::MaxItems,
    KeywordKind::MinItems,
    KeywordKind::UniqueItems,
    KeywordKind::MaxProperties,
    KeywordKind::MinProperties,
    KeywordKind::Required,
    KeywordKind::DependentRequired,
    KeywordKind::Format,
    KeywordKind::Properties,
    KeywordKind::PatternProperties,
    KeywordKind::AdditionalProperties,
    KeywordKind::PropertyNames,
    KeywordKind::PrefixItems,
    KeywordKind::Items,
    KeywordKind::Contains,
    KeywordKind::MinContains,
    KeywordKind::MaxContains,
    KeywordKind::Ref,
    KeywordKind::DynamicRef,
    KeywordKind::AllOf,
    KeywordKind::AnyOf,
    KeywordKind::OneOf,
    KeywordKind::Not,
    KeywordKind::If,
    KeywordKind::Then,
    KeywordKind::Else,
    KeywordKind::DependentSchemas,
    KeywordKind::UnevaluatedItems,
    KeywordKind::UnevaluatedProperties,
];

impl KeywordKind {
    pub fn name(&self) -> &'static str {
        use KeywordKind::*;
        match self {
            Schema => "$schema",
            Vocabulary => "$vocabulary",
            Id => "$id",
            Anchor => "$anchor",
            DynamicAnchor => "$dynamicAnchor",
            Comment => "$comment",
            Defs => "$defs",
            Title => "title",
            Description => "description",
            Default => "default",
            Deprecated => "deprecated",
            ReadOnly => "readOnly",
            WriteOnly => "writeOnly",
            Examples => "examples",
            Type => "type",
            Enum => "enum",
            Const => "const",
            MultipleOf => "multipleOf",
            Maximum => "maximum",
            ExclusiveMaximum => "exclusiveMaximum",
            Minimum => "minimum",
            ExclusiveMinimum => "exclusiveMinimum",
            MaxLength => "maxLength",
            MinLength => "minLength",
            Pattern => "pattern",
            MaxItems => "maxItems",
            MinItems => "minItems",
            UniqueItems => "uniqueItems",
            MaxProperties => "maxProperties",
            MinProperties => "minProperties",
            Required => "required",
            DependentRequired => "dependentRequired",
            Format => "format",
            Properties => "properties",
            PatternProperties => "patternProperties",
            AdditionalProperties => "additionalProperties",
            PropertyNames => "propertyNames",
            PrefixItems => "prefixItems",
            Items => "items",
            Contains => "contains",
            MinContains => "minContains",
            MaxContains => "maxContains",
            Ref => "$ref",
            DynamicRef => "$dynamicRef",
            AllOf => "allOf",
            AnyOf => "anyOf",
            OneOf => "oneOf",
            Not => "not",
            If => "if",
            Then => "then",
            Else => "else",
            DependentSchemas => "dependentSchemas",
            UnevaluatedItems => "unevaluatedItems",
            UnevaluatedProperties => "unevaluatedProperties",
        }
    }

    /// the vocabulary this keyword belongs to; `None` means the keyword
    /// survives any vocabulary filter
    pub fn vocabulary(&self) -> Option<&'static str> {
        use KeywordKind::*;
        match self {
            Schema | Vocabulary | Id | Anchor | DynamicAnchor | Comment | Defs | Ref
            | DynamicRef => Some(VOCAB_CORE),
            Title | Description | Default | Deprecated | ReadOnly | WriteOnly | Examples => {
                Some(VOCAB_META_DATA)
            }
            Type | Enum | Const | MultipleOf | Maximum | ExclusiveMaximum | Minimum
            | ExclusiveMinimum | MaxLength | MinLength | Pattern | MaxItems | MinItems
            | UniqueItems | MaxProperties | MinProperties | Required | DependentRequired
            | MinContains | MaxContains => Some(VOCAB_VALIDATION),
            Format => Some(VOCAB_FORMAT_ANNOTATION),
            Properties | PatternProperties | AdditionalProperties | PropertyNames | PrefixItems
            | Items | Contains | AllOf | AnyOf | OneOf | Not | If | Then | Else
            | DependentSchemas => Some(VOCAB_APPLICATOR),
            UnevaluatedItems | UnevaluatedProperties => Some(VOCAB_UNEVALUATED),
        }
    }
}

pub(crate) const POS_SELF: u8 = 1 << 0;
pub(crate) const POS_PROP: u8 = 1 << 1;
pub(crate) const POS_ITEM: u8 = 1 << 2;

/// keyword => positions at which subschemas appear; used when collecting
/// embedded resources and anchors
pub(crate) static SUBSCHEMAS: Lazy<HashMap<&'static str, u8>> = Lazy::new(|| {
    HashMap::from([
        ("$defs", POS_PROP),
        ("not", POS_SELF),
        ("allOf", POS_ITEM),
        ("anyOf", POS_ITEM),
        ("oneOf", POS_ITEM),
        ("if", POS_SELF),
        ("then", POS_SELF),
        ("else", POS_SELF),
        ("properties", POS_PROP),
        ("patternProperties", POS_PROP),
        ("additionalProperties", POS_SELF),
        ("propertyNames", POS_SELF),
        ("dependentSchemas", POS_PROP),
        ("prefixItems", POS_ITEM),
        ("items", POS_SELF),
        ("contains", POS_SELF),
        ("unevaluatedItems", POS_SELF),
        ("unevaluatedProperties", POS_SELF),
    ])
});

/// A named version of JSON Schema with a fixed keyword set and
/// vocabulary list. Currently only draft 2020-12.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Dialect {
    #[default]
    Draft2020,
}

impl Dialect {
    /// The ordered keyword list, filtered by the active vocabulary set.
    /// Keywords without a vocabulary are always included; `None` or an
    /// empty set means "all keywords" (meta-schema bootstrap).
    pub fn keywords(&self, active_vocabularies: Option<&HashSet<String>>) -> Vec<KeywordKind> {
        match active_vocabularies {
            None => KEYWORDS_2020.to_vec(),
            Some(set) if set.is_empty() => KEYWORDS_2020.to_vec(),
            Some(set) => KEYWORDS_2020
                .iter()
                .copied()
                .filter(|k| k.vocabulary().map_or(true, |v| set.contains(v)))
                .collect(),
        }
    }

    pub fn vocabularies(&self) -> &'static [&'static str] {
        VOCABS_2020
    }

    pub(crate) fn from_url(url: &str) -> Option<Dialect> {
        let (mut url, fragment) = split(url);
        if !fragment.is_empty() {
            return None;
        }
        if let Some(s) = url.strip_prefix("http://") {
            url = s;
        }
        if let Some(s) = url.strip_prefix("https://") {
            url = s;
        }
        let Ok(url) = path_unescape(url) else {
            return None;
        };
        match url.as_str() {
            "json-schema.org/schema" => Some(Dialect::Draft2020),
            "json-schema.org/draft/2020-12/schema" => Some(Dialect::Draft2020),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(kws: &[KeywordKind], kind: KeywordKind) -> usize {
        kws.iter().position(|&k| k == kind).unwrap()
    }

    #[test]
    fn test_order_dependencies() {
        let kws = Dialect::Draft2020.keywords(None);
        // annotation producers strictly before their consumers
        assert!(position(&kws, KeywordKind::Properties) < position(&kws, KeywordKind::AdditionalProperties));
        assert!(position(&kws, KeywordKind::PatternProperties) < position(&kws, KeywordKind::AdditionalProperties));
        assert!(position(&kws, KeywordKind::Contains) < position(&kws, KeywordKind::MinContains));
        assert!(position(&kws, KeywordKind::Contains) < position(&kws, KeywordKind::MaxContains));
        assert!(position(&kws, KeywordKind::If) < position(&kws, KeywordKind::Then));
        assert!(position(&kws, KeywordKind::If) < position(&kws, KeywordKind::Else));
        assert!(position(&kws, KeywordKind::PrefixItems) < position(&kws, KeywordKind::Items));
        // unevaluated keywords come after everything that evaluates
        let uneval_props = position(&kws, KeywordKind::UnevaluatedProperties);
        let uneval_items = position(&kws, KeywordKind::UnevaluatedItems);
        for kind in [
            KeywordKind::Properties,
            KeywordKind::PatternProperties,
            KeywordKind::AdditionalProperties,
            KeywordKind::Items,
            KeywordKind::PrefixItems,
            KeywordKind::Contains,
            KeywordKind::Ref,
            KeywordKind::DynamicRef,
            KeywordKind::AllOf,
            KeywordKind::AnyOf,
            KeywordKind::OneOf,
            KeywordKind::If,
            KeywordKind::Then,
            KeywordKind::Else,
            KeywordKind::DependentSchemas,
        ] {
            assert!(position(&kws, kind) < uneval_props, "{:?}", kind);
            assert!(position(&kws, kind) < uneval_items, "{:?}", kind);
        }
    }

    #[test]
    fn test_vocabulary_filter() {
        let active = HashSet::from([VOCAB_CORE.to_owned(), VOCAB_VALIDATION.to_owned()]);
        let kws = Dialect::Draft2020.keywords(Some(&active));
        assert!(kws.contains(&KeywordKind::Ref));
        assert!(kws.contains(&KeywordKind::Minimum));
        assert!(!kws.contains(&KeywordKind::Properties));
        assert!(!kws.contains(&KeywordKind::Title));

        // empty set means everything
        let all = Dialect::Draft2020.keywords(Some(&HashSet::new()));
        assert_eq!(all.len(), Dialect::Draft2020.keywords(None).len());
    }

    #[test]
    fn test_from_url() {
        let tests = [
            ("http://json-schema.org/draft/2020-12/schema", true),
            ("https://json-schema.org/draft/2020-12/schema", true),
            ("https://json-schema.org/schema", true),
            ("https://json-schema.org/%64raft/2020-12/schema", true),
            ("https://json-schema.org/draft-07/schema", false),
        ];
        for (url, want) in tests {
            assert_eq!(Dialect::from_url(url).is_some(), want, "for {url}");
        }
    }
}
