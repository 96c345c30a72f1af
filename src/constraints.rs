//! Cross-field constraint combinators.
//!
//! `require_if` and `conditional_field` are sugar over [`ConditionalRule`]:
//! both build a branch table kept as plain data, so the analyzer can read
//! dependencies without running validation. `mutually_exclusive` and
//! `at_least_one_of` build whole-object rules attached with
//! [`SchemaNode::with_rule`](crate::schema::SchemaNode::with_rule).

use std::sync::Arc;

use serde_json::Value;

use crate::schema::{
    ConditionalBranch, ConditionalRule, FieldSpec, Matcher, ObjectRule, SchemaNode,
};

/// Field that is required only when `depends_on` resolves to `trigger`,
/// and optional (with the same schema) otherwise.
pub fn require_if(
    schema: impl Into<SchemaNode>,
    depends_on: impl Into<String>,
    trigger: impl Into<Value>,
) -> FieldSpec {
    let schema = schema.into();
    let rule = ConditionalRule {
        depends_on: depends_on.into(),
        branches: vec![ConditionalBranch {
            is: Matcher::Equals(trigger.into()),
            then: Box::new(FieldSpec::new(schema.clone()).required()),
            otherwise: Some(Box::new(FieldSpec::new(schema.clone()))),
        }],
    };
    FieldSpec::new(schema).when(rule)
}

/// Field whose effective spec is chosen from a branch table keyed on
/// another field's resolved value. Branches are evaluated in order, first
/// match wins; with no match and no `otherwise` anywhere, the field is
/// unconstrained.
pub fn conditional_field(
    depends_on: impl Into<String>,
    branches: Vec<ConditionalBranch>,
) -> FieldSpec {
    // The base schema is never consulted: the rule supersedes it.
    let first = branches
        .first()
        .map(|b| b.then.schema.clone())
        .unwrap_or_else(crate::schema::strip);
    FieldSpec::new(first).when(ConditionalRule {
        depends_on: depends_on.into(),
        branches,
    })
}

/// Branch matching an exact dependency value.
pub fn branch(is: impl Into<Value>, then: impl Into<FieldSpec>) -> ConditionalBranch {
    ConditionalBranch {
        is: Matcher::Equals(is.into()),
        then: Box::new(then.into()),
        otherwise: None,
    }
}

/// Branch matching a predicate over the dependency value.
pub fn branch_when<P>(predicate: P, then: impl Into<FieldSpec>) -> ConditionalBranch
where
    P: Fn(&Value) -> bool + Send + Sync + 'static,
{
    ConditionalBranch {
        is: Matcher::Predicate(Arc::new(predicate)),
        then: Box::new(then.into()),
        otherwise: None,
    }
}

impl ConditionalBranch {
    /// Spec applied when no branch in the rule matches.
    pub fn otherwise(mut self, spec: impl Into<FieldSpec>) -> Self {
        self.otherwise = Some(Box::new(spec.into()));
        self
    }
}

/// Whole-object rule: at most one of the named fields may be present in
/// the validated output.
pub fn mutually_exclusive<I, S>(fields: I) -> ObjectRule
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    ObjectRule::MutuallyExclusive(fields.into_iter().map(Into::into).collect())
}

/// Whole-object rule: at least one of the named fields must be present in
/// the validated output.
pub fn at_least_one_of<I, S>(fields: I) -> ObjectRule
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    ObjectRule::AtLeastOneOf(fields.into_iter().map(Into::into).collect())
}

/// Field with a supplier-produced default, evaluated once per validation
/// call in which the field is absent. Two calls at different times may
/// therefore receive different defaults.
pub fn dynamic_default<F>(schema: impl Into<SchemaNode>, supplier: F) -> FieldSpec
where
    F: Fn() -> Value + Send + Sync + 'static,
{
    FieldSpec::new(schema.into()).dynamic_default(supplier)
}
