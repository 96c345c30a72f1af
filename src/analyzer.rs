//! Read-only schema introspection.
//!
//! Everything here consumes schema nodes without mutating them: diffing
//! two schema versions, extracting the conditional dependency graph,
//! classifying field presence, and generating deterministic example
//! values for documentation.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::schema::{
    Alternatives, ConditionalRule, DefaultValue, FieldSpec, Matcher, NodeKind, ObjectRule,
    SchemaNode, StringFormat,
};

/// Field-level difference between two object schemas.
///
/// `changed` lists keys present in both whose spec differs structurally
/// (kind, constraint set, presence metadata) - reference identity plays
/// no part. Version tags of both operands ride along for release notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<String>,
    pub from_version: Option<String>,
    pub to_version: Option<String>,
}

/// Compare two schemas key by key.
///
/// `added` holds keys only in `b` (in `b`'s order), `removed` keys only
/// in `a` (in `a`'s order). Non-object nodes have no keys and produce an
/// empty field diff.
pub fn diff(a: &SchemaNode, b: &SchemaNode) -> SchemaDiff {
    let empty = Vec::new();
    let a_fields = a.as_object().map(|o| &o.fields).unwrap_or(&empty);
    let b_fields = b.as_object().map(|o| &o.fields).unwrap_or(&empty);

    let mut added = Vec::new();
    let mut removed = Vec::new();
    let mut changed = Vec::new();

    for (name, b_spec) in b_fields {
        match a_fields.iter().find(|(k, _)| k == name) {
            None => added.push(name.clone()),
            Some((_, a_spec)) => {
                if !specs_equal(a_spec, b_spec) {
                    changed.push(name.clone());
                }
            }
        }
    }
    for (name, _) in a_fields {
        if !b_fields.iter().any(|(k, _)| k == name) {
            removed.push(name.clone());
        }
    }

    SchemaDiff {
        added,
        removed,
        changed,
        from_version: a.version().map(String::from),
        to_version: b.version().map(String::from),
    }
}

/// Map each conditional field to the set of fields it depends on.
///
/// Works off the conditional rules as data; no validation runs. Fields
/// without a conditional rule are absent from the map.
pub fn dependency_graph(schema: &SchemaNode) -> BTreeMap<String, BTreeSet<String>> {
    let mut graph = BTreeMap::new();
    if let Some(object) = schema.as_object() {
        for (name, spec) in &object.fields {
            if let Some(rule) = &spec.conditional {
                graph
                    .entry(name.clone())
                    .or_insert_with(BTreeSet::new)
                    .insert(rule.depends_on.clone());
            }
        }
    }
    graph
}

/// Presence class of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Required,
    Optional,
    Conditional,
}

/// Classify each field, in declaration order.
pub fn field_presence(schema: &SchemaNode) -> Vec<(String, Presence)> {
    let Some(object) = schema.as_object() else {
        return Vec::new();
    };
    object
        .fields
        .iter()
        .map(|(name, spec)| {
            let presence = if spec.conditional.is_some() {
                Presence::Conditional
            } else if spec.required {
                Presence::Required
            } else {
                Presence::Optional
            };
            (name.clone(), presence)
        })
        .collect()
}

/// Produce one concrete value satisfying the schema's constraints.
///
/// Generation is deterministic - the same schema always yields the same
/// example, so documentation built from it is reproducible. Enumerations
/// use their first value; bounded numbers and dates sit on their lower
/// bound; arrays hold one element; alternatives use the first candidate.
/// Regex patterns are not synthesized (see the describe output instead).
pub fn generate_example(schema: &SchemaNode) -> Value {
    match &schema.kind {
        NodeKind::String(c) => {
            if let Some(allowed) = &c.allowed {
                if let Some(first) = allowed.first() {
                    return Value::String(first.clone());
                }
            }
            if c.format == Some(StringFormat::Email) {
                return Value::String("user@example.com".to_string());
            }
            let mut s = "example".to_string();
            if let Some(min) = c.min_len {
                while s.chars().count() < min {
                    s.push('x');
                }
            }
            if let Some(max) = c.max_len {
                s = s.chars().take(max).collect();
            }
            Value::String(s)
        }

        NodeKind::Number(c) => {
            let n = if let Some(allowed) = &c.allowed {
                allowed.first().copied().unwrap_or(0.0)
            } else if let Some(min) = c.min {
                min
            } else if let Some(max) = c.max {
                max.min(0.0)
            } else {
                0.0
            };
            if c.integer || n.fract() == 0.0 {
                json!(n as i64)
            } else {
                json!(n)
            }
        }

        NodeKind::Boolean => Value::Bool(true),

        NodeKind::Date(c) => {
            let fallback = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
            let d = c.min.or(c.max).unwrap_or(fallback);
            Value::String(d.format("%Y-%m-%d").to_string())
        }

        NodeKind::Object(object) => {
            let mut out = Map::new();
            for (name, spec) in &object.fields {
                let effective = effective_example_spec(spec);
                match &effective.schema.kind {
                    NodeKind::Forbidden | NodeKind::Strip => continue,
                    _ => {}
                }
                let value = match &effective.default {
                    Some(DefaultValue::Fixed(v)) => v.clone(),
                    // Dynamic suppliers are skipped: determinism wins.
                    _ => generate_example(&effective.schema),
                };
                out.insert(name.clone(), value);
            }
            Value::Object(out)
        }

        NodeKind::Array(element) => Value::Array(vec![generate_example(element)]),

        NodeKind::Alternatives(alt) => alt
            .candidates
            .first()
            .map(generate_example)
            .unwrap_or(Value::Null),

        NodeKind::Forbidden | NodeKind::Strip => Value::Null,
    }
}

/// Human-readable structural description.
pub fn describe(schema: &SchemaNode) -> String {
    describe_node(schema, 0)
}

/// Description paired with a generated example.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaDescription {
    pub description: String,
    pub example: Value,
}

pub fn describe_with_examples(schema: &SchemaNode) -> SchemaDescription {
    SchemaDescription {
        description: describe(schema),
        example: generate_example(schema),
    }
}

// --- Internal implementation ---

/// Conditional rules supersede the base schema, so examples and
/// descriptions follow the first branch.
fn effective_example_spec(spec: &FieldSpec) -> &FieldSpec {
    spec.conditional
        .as_ref()
        .and_then(|rule| rule.branches.first())
        .map(|branch| branch.then.as_ref())
        .unwrap_or(spec)
}

fn describe_node(schema: &SchemaNode, depth: usize) -> String {
    match &schema.kind {
        NodeKind::String(c) => {
            let mut parts = Vec::new();
            if let Some(min) = c.min_len {
                parts.push(format!("min length {min}"));
            }
            if let Some(max) = c.max_len {
                parts.push(format!("max length {max}"));
            }
            if let Some(pattern) = &c.pattern {
                parts.push(format!("pattern {}", pattern.as_str()));
            }
            if let Some(allowed) = &c.allowed {
                parts.push(format!("one of: {}", allowed.join(", ")));
            }
            if c.format == Some(StringFormat::Email) {
                parts.push("email".to_string());
            }
            with_parts("string", &parts)
        }
        NodeKind::Number(c) => {
            let mut parts = Vec::new();
            if c.integer {
                parts.push("integer".to_string());
            }
            if let Some(min) = c.min {
                parts.push(format!("min {min}"));
            }
            if let Some(max) = c.max {
                parts.push(format!("max {max}"));
            }
            with_parts("number", &parts)
        }
        NodeKind::Boolean => "boolean".to_string(),
        NodeKind::Date(c) => {
            let mut parts = Vec::new();
            if let Some(min) = c.min {
                parts.push(format!("not before {min}"));
            }
            if let Some(max) = c.max {
                parts.push(format!("not after {max}"));
            }
            with_parts("date", &parts)
        }
        NodeKind::Object(object) => {
            let indent = "  ".repeat(depth + 1);
            let mut out = String::from("object {\n");
            for (name, spec) in &object.fields {
                let presence = match &spec.conditional {
                    Some(rule) => format!("conditional on {}", rule.depends_on),
                    None if spec.required => "required".to_string(),
                    None => "optional".to_string(),
                };
                let effective = effective_example_spec(spec);
                out.push_str(&format!(
                    "{indent}{name}: {} ({presence})\n",
                    describe_node(&effective.schema, depth + 1)
                ));
            }
            out.push_str(&"  ".repeat(depth));
            out.push('}');
            out
        }
        NodeKind::Array(element) => format!("array of {}", describe_node(element, depth)),
        NodeKind::Alternatives(alt) => {
            let candidates: Vec<String> = alt
                .candidates
                .iter()
                .map(|c| describe_node(c, depth))
                .collect();
            format!("one of: {}", candidates.join(" | "))
        }
        NodeKind::Forbidden => "forbidden".to_string(),
        NodeKind::Strip => "stripped".to_string(),
    }
}

fn with_parts(base: &str, parts: &[String]) -> String {
    if parts.is_empty() {
        base.to_string()
    } else {
        format!("{base} ({})", parts.join(", "))
    }
}

/// Structural node equality: kinds and constraint sets, never identity.
/// Closures (predicates, suppliers, custom validators) compare by
/// presence only.
pub(crate) fn nodes_equal(a: &SchemaNode, b: &SchemaNode) -> bool {
    match (&a.kind, &b.kind) {
        (NodeKind::String(x), NodeKind::String(y)) => {
            x.min_len == y.min_len
                && x.max_len == y.max_len
                && x.pattern.as_ref().map(|p| p.as_str()) == y.pattern.as_ref().map(|p| p.as_str())
                && x.allowed == y.allowed
                && x.format == y.format
        }
        (NodeKind::Number(x), NodeKind::Number(y)) => {
            x.min == y.min && x.max == y.max && x.integer == y.integer && x.allowed == y.allowed
        }
        (NodeKind::Boolean, NodeKind::Boolean) => true,
        (NodeKind::Date(x), NodeKind::Date(y)) => x.min == y.min && x.max == y.max,
        (NodeKind::Object(x), NodeKind::Object(y)) => {
            x.fields.len() == y.fields.len()
                && x.fields.iter().zip(&y.fields).all(|((ka, sa), (kb, sb))| {
                    ka == kb && specs_equal(sa, sb)
                })
                && rules_equal(&x.rules, &y.rules)
        }
        (NodeKind::Array(x), NodeKind::Array(y)) => nodes_equal(x, y),
        (NodeKind::Alternatives(x), NodeKind::Alternatives(y)) => alternatives_equal(x, y),
        (NodeKind::Forbidden, NodeKind::Forbidden) => true,
        (NodeKind::Strip, NodeKind::Strip) => true,
        _ => false,
    }
}

pub(crate) fn specs_equal(a: &FieldSpec, b: &FieldSpec) -> bool {
    a.required == b.required
        && a.redacted == b.redacted
        && a.translation_key == b.translation_key
        && defaults_equal(&a.default, &b.default)
        && a.custom.is_some() == b.custom.is_some()
        && conditionals_equal(&a.conditional, &b.conditional)
        && nodes_equal(&a.schema, &b.schema)
}

fn defaults_equal(a: &Option<DefaultValue>, b: &Option<DefaultValue>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(DefaultValue::Fixed(x)), Some(DefaultValue::Fixed(y))) => x == y,
        (Some(DefaultValue::Dynamic(_)), Some(DefaultValue::Dynamic(_))) => true,
        _ => false,
    }
}

fn conditionals_equal(a: &Option<ConditionalRule>, b: &Option<ConditionalRule>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => {
            x.depends_on == y.depends_on
                && x.branches.len() == y.branches.len()
                && x.branches.iter().zip(&y.branches).all(|(ba, bb)| {
                    matchers_equal(&ba.is, &bb.is)
                        && specs_equal(&ba.then, &bb.then)
                        && match (&ba.otherwise, &bb.otherwise) {
                            (None, None) => true,
                            (Some(oa), Some(ob)) => specs_equal(oa, ob),
                            _ => false,
                        }
                })
        }
        _ => false,
    }
}

fn matchers_equal(a: &Matcher, b: &Matcher) -> bool {
    match (a, b) {
        (Matcher::Equals(x), Matcher::Equals(y)) => x == y,
        (Matcher::Predicate(_), Matcher::Predicate(_)) => true,
        _ => false,
    }
}

fn rules_equal(a: &[ObjectRule], b: &[ObjectRule]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(x, y)| match (x, y) {
            (ObjectRule::MutuallyExclusive(fa), ObjectRule::MutuallyExclusive(fb)) => fa == fb,
            (ObjectRule::AtLeastOneOf(fa), ObjectRule::AtLeastOneOf(fb)) => fa == fb,
            _ => false,
        })
}

fn alternatives_equal(a: &Alternatives, b: &Alternatives) -> bool {
    a.candidates.len() == b.candidates.len()
        && a.candidates
            .iter()
            .zip(&b.candidates)
            .all(|(x, y)| nodes_equal(x, y))
        && match (&a.resolver, &b.resolver) {
            (None, None) => true,
            (Some(x), Some(y)) => x.key == y.key && x.mapping == y.mapping,
            _ => false,
        }
}
