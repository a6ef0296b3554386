use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde_json::{Number, Value};

use crate::annotations::{Annotation, AnnotationContainer, AnnotationValue, Applied};
use crate::context::Context;
use crate::dialect::KeywordKind;
use crate::keywords::{Keyword, Type};
use crate::output::{ErrorKind, OneOf, ValidationError};
use crate::pointer::JsonPointer;
use crate::util::{append_frag, equals};
use crate::{ObjectSchema, Schema, SchemaIndex};

/// Walks an instance against a compiled schema, collecting every
/// failing keyword and the annotations of the successful ones.
pub(crate) struct Evaluator<'c> {
    pub(crate) ctx: &'c mut Context,
}

impl Evaluator<'_> {
    /// Evaluates the schema at `index` against `v` located at `vloc`.
    /// An empty error list means the instance is valid here.
    pub(crate) fn eval(
        &mut self,
        index: SchemaIndex,
        v: &Value,
        vloc: JsonPointer,
    ) -> (AnnotationContainer, Vec<ValidationError>) {
        let sch = self.ctx.schemas.get(index);
        match sch.as_ref() {
            Schema::Boolean(b) => {
                let mut errors = Vec::new();
                if !b.value {
                    errors.push(ValidationError {
                        kind: ErrorKind::FalseSchema,
                        keyword_location: b.location.clone(),
                        instance_location: vloc,
                        absolute_keyword_location: Some(b.loc.clone()),
                        causes: Vec::new(),
                    });
                }
                (AnnotationContainer::new(), errors)
            }
            Schema::Object(obj) => self.eval_object(obj, v, vloc),
        }
    }

    fn eval_object(
        &mut self,
        obj: &ObjectSchema,
        v: &Value,
        vloc: JsonPointer,
    ) -> (AnnotationContainer, Vec<ValidationError>) {
        let mut annotations = AnnotationContainer::new();
        let mut errors: Vec<ValidationError> = Vec::new();

        // entering a schema resource extends the dynamic scope
        let scope_pushed = match &obj.resource_id {
            Some(id) => {
                self.ctx.dynamic_scope.push(id.clone());
                true
            }
            None => false,
        };

        // carried between keywords of this schema
        let mut if_matched: Option<bool> = None;
        let mut contains_indices: Option<BTreeSet<usize>> = None;

        for kw in &obj.keywords {
            match &kw.value {
                Keyword::Annotation(value) => {
                    annotate(&mut annotations, obj, kw.kind, &vloc, AnnotationValue::Json(value.clone()));
                }

                Keyword::Type(want) => {
                    if !want.iter().any(|t| t.matches(v)) {
                        errors.push(kw_error(
                            obj,
                            kw.kind,
                            &vloc,
                            ErrorKind::Type {
                                got: Type::of(v),
                                want: want.clone(),
                            },
                            Vec::new(),
                        ));
                    }
                }
                Keyword::Enum(want) => {
                    if !want.iter().any(|w| equals(w, v)) {
                        errors.push(kw_error(
                            obj,
                            kw.kind,
                            &vloc,
                            ErrorKind::Enum {
                                got: v.clone(),
                                want: want.clone(),
                            },
                            Vec::new(),
                        ));
                    }
                }
                Keyword::Const(want) => {
                    if !equals(want, v) {
                        errors.push(kw_error(
                            obj,
                            kw.kind,
                            &vloc,
                            ErrorKind::Const {
                                got: v.clone(),
                                want: want.clone(),
                            },
                            Vec::new(),
                        ));
                    }
                }

                Keyword::MultipleOf(want) => {
                    if let Value::Number(got) = v {
                        let multiple = match (got.as_f64(), want.as_f64()) {
                            (Some(g), Some(w)) => (g / w).fract() == 0.0,
                            _ => false,
                        };
                        if !multiple {
                            errors.push(kw_error(
                                obj,
                                kw.kind,
                                &vloc,
                                ErrorKind::MultipleOf {
                                    got: got.clone(),
                                    want: want.clone(),
                                },
                                Vec::new(),
                            ));
                        }
                    }
                }
                Keyword::Maximum(want) => {
                    if let Value::Number(got) = v {
                        if num_cmp(got, want) == Some(Ordering::Greater) {
                            errors.push(kw_error(
                                obj,
                                kw.kind,
                                &vloc,
                                ErrorKind::Maximum {
                                    got: got.clone(),
                                    want: want.clone(),
                                },
                                Vec::new(),
                            ));
                        }
                    }
                }
                Keyword::ExclusiveMaximum(want) => {
                    if let Value::Number(got) = v {
                        if num_cmp(got, want) != Some(Ordering::Less) {
                            errors.push(kw_error(
                                obj,
                                kw.kind,
                                &vloc,
                                ErrorKind::ExclusiveMaximum {
                                    got: got.clone(),
                                    want: want.clone(),
                                },
                                Vec::new(),
                            ));
                        }
                    }
                }
                Keyword::Minimum(want) => {
                    if let Value::Number(got) = v {
                        if num_cmp(got, want) == Some(Ordering::Less) {
                            errors.push(kw_error(
                                obj,
                                kw.kind,
                                &vloc,
                                ErrorKind::Minimum {
                                    got: got.clone(),
                                    want: want.clone(),
                                },
                                Vec::new(),
                            ));
                        }
                    }
                }
                Keyword::ExclusiveMinimum(want) => {
                    if let Value::Number(got) = v {
                        if num_cmp(got, want) != Some(Ordering::Greater) {
                            errors.push(kw_error(
                                obj,
                                kw.kind,
                                &vloc,
                                ErrorKind::ExclusiveMinimum {
                                    got: got.clone(),
                                    want: want.clone(),
                                },
                                Vec::new(),
                            ));
                        }
                    }
                }

                Keyword::MaxLength(want) => {
                    if let Value::String(s) = v {
                        let got = s.chars().count();
                        if got > *want {
                            errors.push(kw_error(
                                obj,
                                kw.kind,
                                &vloc,
                                ErrorKind::MaxLength { got, want: *want },
                                Vec::new(),
                            ));
                        }
                    }
                }
                Keyword::MinLength(want) => {
                    if let Value::String(s) = v {
                        let got = s.chars().count();
                        if got < *want {
                            errors.push(kw_error(
                                obj,
                                kw.kind,
                                &vloc,
                                ErrorKind::MinLength { got, want: *want },
                                Vec::new(),
                            ));
                        }
                    }
                }
                Keyword::Pattern(regex) => {
                    if let Value::String(s) = v {
                        if !regex.is_match(s) {
                            errors.push(kw_error(
                                obj,
                                kw.kind,
                                &vloc,
                                ErrorKind::Pattern {
                                    got: s.clone(),
                                    want: regex.as_str().to_owned(),
                                },
                                Vec::new(),
                            ));
                        }
                    }
                }

                Keyword::MaxItems(want) => {
                    if let Value::Array(arr) = v {
                        if arr.len() > *want {
                            errors.push(kw_error(
                                obj,
                                kw.kind,
                                &vloc,
                                ErrorKind::MaxItems {
                                    got: arr.len(),
                                    want: *want,
                                },
                                Vec::new(),
                            ));
                        }
                    }
                }
                Keyword::MinItems(want) => {
                    if let Value::Array(arr) = v {
                        if arr.len() < *want {
                            errors.push(kw_error(
                                obj,
                                kw.kind,
                                &vloc,
                                ErrorKind::MinItems {
                                    got: arr.len(),
                                    want: *want,
                                },
                                Vec::new(),
                            ));
                        }
                    }
                }
                Keyword::UniqueItems => {
                    if let Value::Array(arr) = v {
                        'outer: for i in 1..arr.len() {
                            for j in 0..i {
                                if equals(&arr[i], &arr[j]) {
                                    errors.push(kw_error(
                                        obj,
                                        kw.kind,
                                        &vloc,
                                        ErrorKind::UniqueItems { got: [j, i] },
                                        Vec::new(),
                                    ));
                                    break 'outer;
                                }
                            }
                        }
                    }
                }

                Keyword::MaxProperties(want) => {
                    if let Value::Object(map) = v {
                        if map.len() > *want {
                            errors.push(kw_error(
                                obj,
                                kw.kind,
                                &vloc,
                                ErrorKind::MaxProperties {
                                    got: map.len(),
                                    want: *want,
                                },
                                Vec::new(),
                            ));
                        }
                    }
                }
                Keyword::MinProperties(want) => {
                    if let Value::Object(map) = v {
                        if map.len() < *want {
                            errors.push(kw_error(
                                obj,
                                kw.kind,
                                &vloc,
                                ErrorKind::MinProperties {
                                    got: map.len(),
                                    want: *want,
                                },
                                Vec::new(),
                            ));
                        }
                    }
                }
                Keyword::Required(want) => {
                    if let Value::Object(map) = v {
                        let missing: Vec<String> = want
                            .iter()
                            .filter(|name| !map.contains_key(*name))
                            .cloned()
                            .collect();
                        if !missing.is_empty() {
                            errors.push(kw_error(
                                obj,
                                kw.kind,
                                &vloc,
                                ErrorKind::Required { want: missing },
                                Vec::new(),
                            ));
                        }
                    }
                }
                Keyword::DependentRequired(deps) => {
                    if let Value::Object(map) = v {
                        for (prop, needs) in deps {
                            if !map.contains_key(prop) {
                                continue;
                            }
                            let missing: Vec<String> = needs
                                .iter()
                                .filter(|name| !map.contains_key(*name))
                                .cloned()
                                .collect();
                            if !missing.is_empty() {
                                errors.push(kw_error(
                                    obj,
                                    kw.kind,
                                    &vloc,
                                    ErrorKind::DependentRequired {
                                        got: prop.clone(),
                                        want: missing,
                                    },
                                    Vec::new(),
                                ));
                            }
                        }
                    }
                }

                Keyword::Format { name, func } => {
                    if self.ctx.assert_formats {
                        match func {
                            None => {
                                errors.push(kw_error(
                                    obj,
                                    kw.kind,
                                    &vloc,
                                    ErrorKind::UnknownFormat {
                                        format: name.clone(),
                                    },
                                    Vec::new(),
                                ));
                                continue;
                            }
                            Some(func) => {
                                if let Value::String(s) = v {
                                    if !func(s) {
                                        errors.push(kw_error(
                                            obj,
                                            kw.kind,
                                            &vloc,
                                            ErrorKind::Format {
                                                got: s.clone(),
                                                want: name.clone(),
                                            },
                                            Vec::new(),
                                        ));
                                        continue;
                                    }
                                }
                            }
                        }
                    }
                    annotate(
                        &mut annotations,
                        obj,
                        kw.kind,
                        &vloc,
                        AnnotationValue::Json(Value::String(name.clone())),
                    );
                }

                Keyword::Properties(list) => {
                    if let Value::Object(map) = v {
                        let mut applied = BTreeSet::new();
                        let mut failed = Vec::new();
                        let mut causes = Vec::new();
                        for (name, index) in list {
                            let Some(pvalue) = map.get(name) else {
                                continue;
                            };
                            let (anns, errs) = self.eval(*index, pvalue, vloc.prop(name));
                            if errs.is_empty() {
                                applied.insert(name.clone());
                                annotations.merge(anns);
                            } else {
                                failed.push(name.clone());
                                causes.extend(errs);
                            }
                        }
                        if !applied.is_empty() {
                            annotate(
                                &mut annotations,
                                obj,
                                kw.kind,
                                &vloc,
                                AnnotationValue::Properties(applied),
                            );
                        }
                        if !failed.is_empty() {
                            errors.push(kw_error(
                                obj,
                                kw.kind,
                                &vloc,
                                ErrorKind::Properties { got: failed },
                                causes,
                            ));
                        }
                    }
                }
                Keyword::PatternProperties(list) => {
                    if let Value::Object(map) = v {
                        let mut applied = BTreeSet::new();
                        let mut failed = Vec::new();
                        let mut causes = Vec::new();
                        for (name, pvalue) in map {
                            for (regex, index) in list {
                                if !regex.is_match(name) {
                                    continue;
                                }
                                let (anns, errs) = self.eval(*index, pvalue, vloc.prop(name));
                                if errs.is_empty() {
                                    applied.insert(name.clone());
                                    annotations.merge(anns);
                                } else {
                                    failed.push(name.clone());
                                    causes.extend(errs);
                                }
                            }
                        }
                        if !applied.is_empty() {
                            annotate(
                                &mut annotations,
                                obj,
                                kw.kind,
                                &vloc,
                                AnnotationValue::Properties(applied),
                            );
                        }
                        if !failed.is_empty() {
                            failed.dedup();
                            errors.push(kw_error(
                                obj,
                                kw.kind,
                                &vloc,
                                ErrorKind::PatternProperties { got: failed },
                                causes,
                            ));
                        }
                    }
                }
                Keyword::AdditionalProperties(index) => {
                    if let Value::Object(map) = v {
                        let mut applied = BTreeSet::new();
                        let mut failed = Vec::new();
                        let mut causes = Vec::new();
                        for (name, pvalue) in map {
                            if covered_by_siblings(obj, name) {
                                continue;
                            }
                            let (anns, errs) = self.eval(*index, pvalue, vloc.prop(name));
                            if errs.is_empty() {
                                applied.insert(name.clone());
                                annotations.merge(anns);
                            } else {
                                failed.push(name.clone());
                                causes.extend(errs);
                            }
                        }
                        if !applied.is_empty() {
                            annotate(
                                &mut annotations,
                                obj,
                                kw.kind,
                                &vloc,
                                AnnotationValue::Properties(applied),
                            );
                        }
                        if !failed.is_empty() {
                            errors.push(kw_error(
                                obj,
                                kw.kind,
                                &vloc,
                                ErrorKind::AdditionalProperties { got: failed },
                                causes,
                            ));
                        }
                    }
                }
                Keyword::PropertyNames(index) => {
                    if let Value::Object(map) = v {
                        for name in map.keys() {
                            let name_value = Value::String(name.clone());
                            let (_, errs) = self.eval(*index, &name_value, vloc.prop(name));
                            if !errs.is_empty() {
                                errors.push(kw_error(
                                    obj,
                                    kw.kind,
                                    &vloc,
                                    ErrorKind::PropertyName { got: name.clone() },
                                    errs,
                                ));
                            }
                        }
                    }
                }

                Keyword::PrefixItems(list) => {
                    if let Value::Array(arr) = v {
                        let mut causes = Vec::new();
                        let evaluated = list.len().min(arr.len());
                        for (i, index) in list.iter().take(evaluated).enumerate() {
                            let (anns, errs) = self.eval(*index, &arr[i], vloc.item(i));
                            if errs.is_empty() {
                                annotations.merge(anns);
                            } else {
                                causes.extend(errs);
                            }
                        }
                        if causes.is_empty() {
                            let applied = if evaluated >= arr.len() {
                                Applied::All
                            } else {
                                Applied::UpTo(evaluated)
                            };
                            annotate(
                                &mut annotations,
                                obj,
                                kw.kind,
                                &vloc,
                                AnnotationValue::Applied(applied),
                            );
                        } else {
                            errors.push(kw_error(obj, kw.kind, &vloc, ErrorKind::PrefixItems, causes));
                        }
                    }
                }
                Keyword::Items(index) => {
                    if let Value::Array(arr) = v {
                        let start = prefix_len(obj).min(arr.len());
                        let mut causes = Vec::new();
                        for (i, item) in arr.iter().enumerate().skip(start) {
                            let (anns, errs) = self.eval(*index, item, vloc.item(i));
                            if errs.is_empty() {
                                annotations.merge(anns);
                            } else {
                                causes.extend(errs);
                            }
                        }
                        if causes.is_empty() {
                            annotate(
                                &mut annotations,
                                obj,
                                kw.kind,
                                &vloc,
                                AnnotationValue::Applied(Applied::All),
                            );
                        } else {
                            errors.push(kw_error(obj, kw.kind, &vloc, ErrorKind::Items, causes));
                        }
                    }
                }
                Keyword::Contains(index) => {
                    if let Value::Array(arr) = v {
                        let mut matched = BTreeSet::new();
                        let mut causes = Vec::new();
                        for (i, item) in arr.iter().enumerate() {
                            let (anns, errs) = self.eval(*index, item, vloc.item(i));
                            if errs.is_empty() {
                                matched.insert(i);
                                annotations.merge(anns);
                            } else {
                                causes.extend(errs);
                            }
                        }
                        // minContains: 0 makes an empty match acceptable
                        let min_zero =
                            obj.raw.get("minContains").and_then(Value::as_u64) == Some(0);
                        if matched.is_empty() && !min_zero {
                            errors.push(kw_error(obj, kw.kind, &vloc, ErrorKind::Contains, causes));
                        } else {
                            annotate(
                                &mut annotations,
                                obj,
                                kw.kind,
                                &vloc,
                                AnnotationValue::Indices(matched.clone()),
                            );
                        }
                        contains_indices = Some(matched);
                    }
                }
                Keyword::MinContains(want) => {
                    if let Some(matched) = &contains_indices {
                        if matched.len() < *want {
                            errors.push(kw_error(
                                obj,
                                kw.kind,
                                &vloc,
                                ErrorKind::MinContains {
                                    got: matched.iter().copied().collect(),
                                    want: *want,
                                },
                                Vec::new(),
                            ));
                        }
                    }
                }
                Keyword::MaxContains(want) => {
                    if let Some(matched) = &contains_indices {
                        if matched.len() > *want {
                            errors.push(kw_error(
                                obj,
                                kw.kind,
                                &vloc,
                                ErrorKind::MaxContains {
                                    got: matched.iter().copied().collect(),
                                    want: *want,
                                },
                                Vec::new(),
                            ));
                        }
                    }
                }

                Keyword::AllOf(list) => {
                    let mut causes = Vec::new();
                    for (i, index) in list.iter().enumerate() {
                        let (anns, errs) = self.eval(*index, v, vloc.clone());
                        if errs.is_empty() {
                            annotations.merge(anns);
                        } else {
                            causes.push(arm_error(
                                obj,
                                kw.kind,
                                i,
                                &vloc,
                                ErrorKind::AllOf { subschema: Some(i) },
                                errs,
                            ));
                        }
                    }
                    if !causes.is_empty() {
                        errors.push(kw_error(
                            obj,
                            kw.kind,
                            &vloc,
                            ErrorKind::AllOf { subschema: None },
                            causes,
                        ));
                    }
                }
                Keyword::AnyOf(list) => {
                    // every arm is evaluated, no matter how many match
                    let mut causes = Vec::new();
                    let mut matched = false;
                    for (i, index) in list.iter().enumerate() {
                        let (anns, errs) = self.eval(*index, v, vloc.clone());
                        if errs.is_empty() {
                            matched = true;
                            annotations.merge(anns);
                        } else {
                            causes.push(arm_error(
                                obj,
                                kw.kind,
                                i,
                                &vloc,
                                ErrorKind::AnyOf { subschema: Some(i) },
                                errs,
                            ));
                        }
                    }
                    if !matched {
                        errors.push(kw_error(
                            obj,
                            kw.kind,
                            &vloc,
                            ErrorKind::AnyOf { subschema: None },
                            causes,
                        ));
                    }
                }
                Keyword::OneOf(list) => {
                    let mut causes = Vec::new();
                    let mut matches = Vec::new();
                    for (i, index) in list.iter().enumerate() {
                        let (anns, errs) = self.eval(*index, v, vloc.clone());
                        if errs.is_empty() {
                            // only the first match contributes annotations
                            if matches.is_empty() {
                                annotations.merge(anns);
                            }
                            matches.push(i);
                        } else {
                            causes.push(arm_error(
                                obj,
                                kw.kind,
                                i,
                                &vloc,
                                ErrorKind::OneOf(OneOf::NoneMatch),
                                errs,
                            ));
                        }
                    }
                    match matches.as_slice() {
                        [_] => {}
                        [] => {
                            errors.push(kw_error(
                                obj,
                                kw.kind,
                                &vloc,
                                ErrorKind::OneOf(OneOf::NoneMatch),
                                causes,
                            ));
                        }
                        [first, second, ..] => {
                            errors.push(kw_error(
                                obj,
                                kw.kind,
                                &vloc,
                                ErrorKind::OneOf(OneOf::MultiMatch(*first, *second)),
                                Vec::new(),
                            ));
                        }
                    }
                }
                Keyword::Not(index) => {
                    let (_, errs) = self.eval(*index, v, vloc.clone());
                    if errs.is_empty() {
                        errors.push(kw_error(obj, kw.kind, &vloc, ErrorKind::Not, Vec::new()));
                    }
                }
                Keyword::If(index) => {
                    let (anns, errs) = self.eval(*index, v, vloc.clone());
                    let matched = errs.is_empty();
                    if matched {
                        annotations.merge(anns);
                    }
                    if_matched = Some(matched);
                }
                Keyword::Then(index) => {
                    if if_matched == Some(true) {
                        let (anns, errs) = self.eval(*index, v, vloc.clone());
                        if errs.is_empty() {
                            annotations.merge(anns);
                        } else {
                            errors.push(kw_error(obj, kw.kind, &vloc, ErrorKind::Then, errs));
                        }
                    }
                }
                Keyword::Else(index) => {
                    if if_matched == Some(false) {
                        let (anns, errs) = self.eval(*index, v, vloc.clone());
                        if errs.is_empty() {
                            annotations.merge(anns);
                        } else {
                            errors.push(kw_error(obj, kw.kind, &vloc, ErrorKind::Else, errs));
                        }
                    }
                }
                Keyword::DependentSchemas(list) => {
                    if let Value::Object(map) = v {
                        for (name, index) in list {
                            if !map.contains_key(name) {
                                continue;
                            }
                            let (anns, errs) = self.eval(*index, v, vloc.clone());
                            if errs.is_empty() {
                                annotations.merge(anns);
                            } else {
                                errors.push(kw_error(
                                    obj,
                                    kw.kind,
                                    &vloc,
                                    ErrorKind::DependentSchemas { got: name.clone() },
                                    errs,
                                ));
                            }
                        }
                    }
                }

                Keyword::Ref(target) => {
                    let (anns, errs) = self.eval_reference(target, v, &vloc, obj, kw.kind);
                    annotations.merge(anns);
                    errors.extend(errs);
                }
                Keyword::DynamicRef { target, anchor } => {
                    let (anns, errs) =
                        self.eval_dynamic_reference(target, anchor.as_deref(), v, &vloc, obj, kw.kind);
                    annotations.merge(anns);
                    errors.extend(errs);
                }

                Keyword::UnevaluatedItems(index) => {
                    if let Value::Array(arr) = v {
                        let (start, skip) = evaluated_items(&annotations, &vloc);
                        let mut causes = Vec::new();
                        let mut failed = Vec::new();
                        for (i, item) in arr.iter().enumerate().skip(start) {
                            if skip.contains(&i) {
                                continue;
                            }
                            let (anns, errs) = self.eval(*index, item, vloc.item(i));
                            if errs.is_empty() {
                                annotations.merge(anns);
                            } else {
                                failed.push(i);
                                causes.extend(errs);
                            }
                        }
                        if failed.is_empty() {
                            annotate(
                                &mut annotations,
                                obj,
                                kw.kind,
                                &vloc,
                                AnnotationValue::Applied(Applied::All),
                            );
                        } else {
                            errors.push(kw_error(
                                obj,
                                kw.kind,
                                &vloc,
                                ErrorKind::UnevaluatedItems { got: failed },
                                causes,
                            ));
                        }
                    }
                }
                Keyword::UnevaluatedProperties(index) => {
                    if let Value::Object(map) = v {
                        let evaluated = evaluated_properties(&annotations, &vloc);
                        let mut applied = BTreeSet::new();
                        let mut failed = Vec::new();
                        let mut causes = Vec::new();
                        for (name, pvalue) in map {
                            if evaluated.contains(name) {
                                continue;
                            }
                            let (anns, errs) = self.eval(*index, pvalue, vloc.prop(name));
                            if errs.is_empty() {
                                applied.insert(name.clone());
                                annotations.merge(anns);
                            } else {
                                failed.push(name.clone());
                                causes.extend(errs);
                            }
                        }
                        if !applied.is_empty() {
                            annotate(
                                &mut annotations,
                                obj,
                                kw.kind,
                                &vloc,
                                AnnotationValue::Properties(applied),
                            );
                        }
                        if !failed.is_empty() {
                            errors.push(kw_error(
                                obj,
                                kw.kind,
                                &vloc,
                                ErrorKind::UnevaluatedProperties { got: failed },
                                causes,
                            ));
                        }
                    }
                }
            }
        }

        if scope_pushed {
            self.ctx.dynamic_scope.pop();
        }
        (annotations, errors)
    }

    /// Resolves and evaluates a `$ref` target. Compilation happens
    /// lazily here; a target that cannot be resolved is a validation
    /// error, not a panic. Re-entering the same (target, instance)
    /// pair reports a cycle instead of recursing forever.
    fn eval_reference(
        &mut self,
        target: &str,
        v: &Value,
        vloc: &JsonPointer,
        obj: &ObjectSchema,
        kind: KeywordKind,
    ) -> (AnnotationContainer, Vec<ValidationError>) {
        let mut annotations = AnnotationContainer::new();
        let mut errors = Vec::new();

        let key = (target.to_owned(), vloc.to_string());
        if self.ctx.resolving.contains(&key) {
            errors.push(kw_error(
                obj,
                kind,
                vloc,
                ErrorKind::RefCycle {
                    url: target.to_owned(),
                },
                Vec::new(),
            ));
            return (annotations, errors);
        }
        self.ctx.resolving.insert(key.clone());

        match self.ctx.compile(target) {
            Err(_) => errors.push(kw_error(
                obj,
                kind,
                vloc,
                ErrorKind::InvalidReference {
                    url: target.to_owned(),
                },
                Vec::new(),
            )),
            Ok(index) => {
                let (anns, errs) = self.eval(index, v, vloc.clone());
                if errs.is_empty() {
                    annotations.merge(anns);
                } else {
                    let err_kind = match kind {
                        KeywordKind::DynamicRef => ErrorKind::DynamicReference {
                            url: target.to_owned(),
                        },
                        _ => ErrorKind::Reference {
                            url: target.to_owned(),
                        },
                    };
                    errors.push(kw_error(obj, kind, vloc, err_kind, errs));
                }
            }
        }

        self.ctx.resolving.remove(&key);
        (annotations, errors)
    }

    /// `$dynamicRef`: if the initial target lands on a `$dynamicAnchor`,
    /// the anchor re-resolves against the dynamic scope and the
    /// outermost resource defining it wins. Otherwise behaves as `$ref`.
    fn eval_dynamic_reference(
        &mut self,
        target: &str,
        anchor: Option<&str>,
        v: &Value,
        vloc: &JsonPointer,
        obj: &ObjectSchema,
        kind: KeywordKind,
    ) -> (AnnotationContainer, Vec<ValidationError>) {
        // compiling the initial target scans its document, which makes
        // the anchor tables available
        if self.ctx.compile(target).is_err() {
            let errors = vec![kw_error(
                obj,
                kind,
                vloc,
                ErrorKind::InvalidReference {
                    url: target.to_owned(),
                },
                Vec::new(),
            )];
            return (AnnotationContainer::new(), errors);
        }

        let resolved = match anchor {
            Some(name) if self.ctx.is_dynamic_anchor(target) => self
                .ctx
                .resolve_dynamic_anchor(name)
                .unwrap_or_else(|| target.to_owned()),
            _ => target.to_owned(),
        };
        self.eval_reference(&resolved, v, vloc, obj, kind)
    }
}

fn kw_error(
    obj: &ObjectSchema,
    kind: KeywordKind,
    vloc: &JsonPointer,
    err: ErrorKind,
    causes: Vec<ValidationError>,
) -> ValidationError {
    ValidationError {
        kind: err,
        keyword_location: obj.location.prop(kind.name()),
        instance_location: vloc.clone(),
        absolute_keyword_location: Some(append_frag(&obj.loc, kind.name())),
        causes,
    }
}

/// wraps the errors of one `allOf`/`anyOf`/`oneOf` arm
fn arm_error(
    obj: &ObjectSchema,
    kind: KeywordKind,
    arm: usize,
    vloc: &JsonPointer,
    err: ErrorKind,
    mut causes: Vec<ValidationError>,
) -> ValidationError {
    if causes.len() == 1 {
        return causes.remove(0);
    }
    ValidationError {
        kind: err,
        keyword_location: obj.location.prop(kind.name()).item(arm),
        instance_location: vloc.clone(),
        absolute_keyword_location: Some(append_frag(
            &append_frag(&obj.loc, kind.name()),
            &arm.to_string(),
        )),
        causes,
    }
}

fn annotate(
    annotations: &mut AnnotationContainer,
    obj: &ObjectSchema,
    kind: KeywordKind,
    vloc: &JsonPointer,
    value: AnnotationValue,
) {
    annotations.insert(Annotation {
        kind,
        instance_location: vloc.clone(),
        schema_location: obj.location.prop(kind.name()),
        absolute_schema_location: Some(append_frag(&obj.loc, kind.name())),
        value,
    });
}

/// the number of prefix items this schema itself declares
fn prefix_len(obj: &ObjectSchema) -> usize {
    obj.keywords
        .iter()
        .find_map(|kw| match &kw.value {
            Keyword::PrefixItems(list) => Some(list.len()),
            _ => None,
        })
        .unwrap_or(0)
}

/// whether a property name is claimed by sibling `properties` or
/// `patternProperties`, which decides what counts as additional
fn covered_by_siblings(obj: &ObjectSchema, name: &str) -> bool {
    for kw in &obj.keywords {
        match &kw.value {
            Keyword::Properties(list) => {
                if list.iter().any(|(n, _)| n == name) {
                    return true;
                }
            }
            Keyword::PatternProperties(list) => {
                if list.iter().any(|(regex, _)| regex.is_match(name)) {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

/// Items already evaluated at `vloc`, from the annotations recorded so
/// far: a starting prefix plus the indices `contains` matched.
fn evaluated_items(annotations: &AnnotationContainer, vloc: &JsonPointer) -> (usize, BTreeSet<usize>) {
    let mut start = 0;
    for kind in [
        KeywordKind::PrefixItems,
        KeywordKind::Items,
        KeywordKind::UnevaluatedItems,
    ] {
        if let Some(ann) = annotations.get(kind, vloc) {
            match ann.value {
                AnnotationValue::Applied(Applied::All) => return (usize::MAX, BTreeSet::new()),
                AnnotationValue::Applied(Applied::UpTo(n)) => start = start.max(n),
                _ => {}
            }
        }
    }
    let skip = match annotations.get(KeywordKind::Contains, vloc) {
        Some(ann) => match &ann.value {
            AnnotationValue::Indices(indices) => indices.clone(),
            _ => BTreeSet::new(),
        },
        None => BTreeSet::new(),
    };
    (start, skip)
}

/// property names already evaluated at `vloc`, per the annotations
/// recorded so far, including those merged from references and
/// in-place applicator branches
fn evaluated_properties(annotations: &AnnotationContainer, vloc: &JsonPointer) -> BTreeSet<String> {
    let mut evaluated = BTreeSet::new();
    for kind in [
        KeywordKind::Properties,
        KeywordKind::PatternProperties,
        KeywordKind::AdditionalProperties,
        KeywordKind::UnevaluatedProperties,
    ] {
        if let Some(ann) = annotations.get(kind, vloc) {
            if let AnnotationValue::Properties(names) = &ann.value {
                evaluated.extend(names.iter().cloned());
            }
        }
    }
    evaluated
}

fn num_cmp(n1: &Number, n2: &Number) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (n1.as_u64(), n2.as_u64()) {
        return Some(a.cmp(&b));
    }
    if let (Some(a), Some(b)) = (n1.as_i64(), n2.as_i64()) {
        return Some(a.cmp(&b));
    }
    n1.as_f64()?.partial_cmp(&n2.as_f64()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_num_cmp() {
        let n = |v: Value| match v {
            Value::Number(n) => n,
            _ => unreachable!(),
        };
        assert_eq!(num_cmp(&n(json!(1)), &n(json!(1.0))), Some(Ordering::Equal));
        assert_eq!(num_cmp(&n(json!(2)), &n(json!(1.5))), Some(Ordering::Greater));
        assert_eq!(num_cmp(&n(json!(-3)), &n(json!(1))), Some(Ordering::Less));
    }
}
