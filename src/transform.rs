//! Structural transformers - pure derivations of new schemas.
//!
//! Every operation returns a new [`SchemaNode`]; the input is never
//! mutated, so a schema can be shared and used as the basis for several
//! derivations at once. Field order of untouched fields is preserved
//! throughout. Operations that only make sense on object schemas are the
//! identity on other node kinds.

use serde_json::{Map, Value};

use crate::schema::{FieldSpec, NodeKind, ObjectSchema, SchemaNode};

/// Marker substituted for redacted values.
pub const REDACTED: &str = "[REDACTED]";

impl SchemaNode {
    /// Flip every top-level field to optional. Nested schemas are left
    /// untouched; conditional branches of a top-level field count as part
    /// of that field's presence metadata and are flipped too.
    pub fn partial(&self) -> SchemaNode {
        self.map_object(|object| ObjectSchema {
            fields: object
                .fields
                .iter()
                .map(|(name, spec)| (name.clone(), relax(spec)))
                .collect(),
            rules: object.rules.clone(),
        })
    }

    /// [`partial`](Self::partial) applied recursively: through nested
    /// object schemas and through array element schemas. An array of
    /// objects becomes an array of partial objects, not an optional array.
    pub fn deep_partial(&self) -> SchemaNode {
        match &self.kind {
            NodeKind::Object(object) => {
                let fields = object
                    .fields
                    .iter()
                    .map(|(name, spec)| {
                        let mut spec = relax(spec);
                        spec.schema = spec.schema.deep_partial();
                        (name.clone(), spec)
                    })
                    .collect();
                self.rebuild(NodeKind::Object(ObjectSchema {
                    fields,
                    rules: object.rules.clone(),
                }))
            }
            NodeKind::Array(element) => {
                self.rebuild(NodeKind::Array(Box::new(element.deep_partial())))
            }
            _ => self.clone(),
        }
    }

    /// Keep only the named fields. Unknown keys are ignored, and the
    /// surviving fields keep their relative order.
    pub fn pick(&self, keys: &[&str]) -> SchemaNode {
        self.pick_by(|name, _| keys.contains(&name))
    }

    /// Drop the named fields. Unknown keys are ignored.
    pub fn omit(&self, keys: &[&str]) -> SchemaNode {
        self.pick_by(|name, _| !keys.contains(&name))
    }

    /// Keep the fields the predicate accepts, in original order.
    pub fn pick_by<F>(&self, predicate: F) -> SchemaNode
    where
        F: Fn(&str, &FieldSpec) -> bool,
    {
        self.map_object(|object| ObjectSchema {
            fields: object
                .fields
                .iter()
                .filter(|(name, spec)| predicate(name, spec))
                .cloned()
                .collect(),
            rules: object.rules.clone(),
        })
    }

    /// Drop the fields the predicate accepts.
    pub fn omit_by<F>(&self, predicate: F) -> SchemaNode
    where
        F: Fn(&str, &FieldSpec) -> bool,
    {
        self.pick_by(|name, spec| !predicate(name, spec))
    }

    /// Union of both objects' fields. On a key collision the definition
    /// from `other` wins wholesale - constraints from the overridden side
    /// are not merged in, so the policy is overwrite, never a silent mix.
    /// Untouched fields keep `self`'s order; fields only in `other` are
    /// appended in `other`'s order.
    pub fn merge(&self, other: &SchemaNode) -> SchemaNode {
        let Some(extra) = other.as_object() else {
            return self.clone();
        };
        self.extend_with(extra.fields.iter().cloned())
    }

    /// [`merge`](Self::merge) with inline extra fields; the extras win on
    /// collision.
    pub fn extend_with<I>(&self, extra: I) -> SchemaNode
    where
        I: IntoIterator<Item = (String, FieldSpec)>,
    {
        self.map_object(|object| {
            let mut fields = object.fields.clone();
            for (name, spec) in extra {
                if let Some(slot) = fields.iter_mut().find(|(existing, _)| *existing == name) {
                    slot.1 = spec;
                } else {
                    fields.push((name, spec));
                }
            }
            ObjectSchema {
                fields,
                rules: object.rules.clone(),
            }
        })
    }

    /// A redactor masking the named keys, plus every field marked
    /// [`redacted`](FieldSpec::redacted) anywhere in this schema, in an
    /// already-validated value. Redaction is display-only: it never
    /// changes validation behavior.
    pub fn with_redacted_fields(&self, keys: &[&str]) -> Redactor {
        let mut collected: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        collect_marked(self, &mut collected);
        Redactor { keys: collected }
    }

    fn map_object<F>(&self, f: F) -> SchemaNode
    where
        F: FnOnce(&ObjectSchema) -> ObjectSchema,
    {
        match &self.kind {
            NodeKind::Object(object) => self.rebuild(NodeKind::Object(f(object))),
            _ => self.clone(),
        }
    }

    // Derivations stay in the same version lineage as their base.
    fn rebuild(&self, kind: NodeKind) -> SchemaNode {
        SchemaNode {
            kind,
            version: self.version.clone(),
        }
    }
}

fn relax(spec: &FieldSpec) -> FieldSpec {
    let mut spec = spec.clone();
    spec.required = false;
    if let Some(rule) = &mut spec.conditional {
        for branch in &mut rule.branches {
            branch.then.required = false;
            if let Some(otherwise) = &mut branch.otherwise {
                otherwise.required = false;
            }
        }
    }
    spec
}

fn collect_marked(node: &SchemaNode, out: &mut Vec<String>) {
    match &node.kind {
        NodeKind::Object(object) => {
            for (name, spec) in &object.fields {
                if spec.redacted && !out.iter().any(|k| k == name) {
                    out.push(name.clone());
                }
                collect_marked(&spec.schema, out);
            }
        }
        NodeKind::Array(element) => collect_marked(element, out),
        NodeKind::Alternatives(alt) => {
            for candidate in &alt.candidates {
                collect_marked(candidate, out);
            }
        }
        _ => {}
    }
}

/// Schema-bound masking of sensitive values for display.
#[derive(Debug, Clone)]
pub struct Redactor {
    keys: Vec<String>,
}

impl Redactor {
    /// Replace every matching key's value with [`REDACTED`], recursing
    /// through nested objects and arrays. The input is not mutated.
    pub fn redact(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut out = Map::new();
                for (key, child) in map {
                    if self.keys.iter().any(|k| k == key) {
                        out.insert(key.clone(), Value::String(REDACTED.to_string()));
                    } else {
                        out.insert(key.clone(), self.redact(child));
                    }
                }
                Value::Object(out)
            }
            Value::Array(items) => Value::Array(items.iter().map(|v| self.redact(v)).collect()),
            other => other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{array, field, number, object, string};
    use crate::validator::validate;
    use serde_json::json;

    fn user_schema() -> SchemaNode {
        object([
            ("name", field(string()).required()),
            ("age", field(number()).required()),
            ("email", field(string().email())),
        ])
        .unwrap()
    }

    fn keys(schema: &SchemaNode) -> Vec<&str> {
        schema.as_object().unwrap().keys().collect()
    }

    #[test]
    fn partial_flips_top_level_only() {
        let schema = object([(
            "profile",
            field(object([("name", field(string()).required())]).unwrap()).required(),
        )])
        .unwrap();

        let partial = schema.partial();
        // Top level: profile may be absent.
        assert!(validate(&partial, &json!({})).is_ok());
        // Nested schema untouched: a present profile still needs name.
        assert!(validate(&partial, &json!({"profile": {}})).is_err());
    }

    #[test]
    fn deep_partial_recurses_through_arrays() {
        let item = object([("sku", field(string()).required())]).unwrap();
        let schema = object([("items", field(array(item)).required())]).unwrap();

        let deep = schema.deep_partial();
        // The array itself stays an array, its element objects go partial.
        assert!(validate(&deep, &json!({"items": [{}]})).is_ok());
        assert!(validate(&deep, &json!({"items": "nope"})).is_err());
    }

    #[test]
    fn pick_and_omit_ignore_unknown_keys() {
        let schema = user_schema();
        assert_eq!(keys(&schema.pick(&["name", "ghost"])), vec!["name"]);
        assert_eq!(keys(&schema.omit(&["ghost"])), vec!["name", "age", "email"]);
    }

    #[test]
    fn omit_preserves_order_of_survivors() {
        let schema = user_schema();
        assert_eq!(keys(&schema.omit(&["age"])), vec!["name", "email"]);
    }

    #[test]
    fn pick_by_predicate_sees_key_and_spec() {
        let schema = user_schema();
        let required_only = schema.pick_by(|_, spec| spec.required);
        assert_eq!(keys(&required_only), vec!["name", "age"]);
    }

    #[test]
    fn merge_second_argument_wins() {
        let a = object([("a", field(string()))]).unwrap();
        let b = object([("a", field(number()))]).unwrap();
        let merged = a.merge(&b);

        // "a" now validates as a number, not a string.
        assert!(validate(&merged, &json!({"a": 1})).is_ok());
        assert!(validate(&merged, &json!({"a": "s"})).is_err());
    }

    #[test]
    fn merge_appends_new_fields_after_base() {
        let a = object([("x", field(string())), ("y", field(string()))]).unwrap();
        let b = object([("y", field(number())), ("z", field(number()))]).unwrap();
        assert_eq!(keys(&a.merge(&b)), vec!["x", "y", "z"]);
    }

    #[test]
    fn transformers_do_not_mutate_input() {
        let schema = user_schema();
        let _ = schema.partial();
        let _ = schema.pick(&["name"]);
        let _ = schema.omit(&["name"]);

        assert_eq!(keys(&schema), vec!["name", "age", "email"]);
        assert!(schema.as_object().unwrap().get("name").unwrap().required);
    }

    #[test]
    fn redactor_masks_named_and_marked_keys() {
        let schema = object([
            ("username", field(string())),
            ("token", field(string()).redacted()),
        ])
        .unwrap();

        let redactor = schema.with_redacted_fields(&["password"]);
        let masked = redactor.redact(&json!({
            "username": "a",
            "token": "t0ps3cret",
            "password": "p",
        }));
        assert_eq!(
            masked,
            json!({"username": "a", "token": REDACTED, "password": REDACTED})
        );
    }

    #[test]
    fn redaction_does_not_affect_validation() {
        let schema = object([
            ("username", field(string()).required()),
            ("password", field(string())),
        ])
        .unwrap();
        let _redactor = schema.with_redacted_fields(&["password"]);

        // Password optional and absent: untouched by redaction config.
        let value = validate(&schema, &json!({"username": "a"})).unwrap();
        assert_eq!(value, json!({"username": "a"}));
    }
}
