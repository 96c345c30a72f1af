//! Recursive-descent validation of values against schema nodes.
//!
//! The engine is exhaustive, not short-circuiting: all issues across
//! sibling fields are collected before failure is reported, so a caller
//! sees every problem in one pass. Nested object and array validation
//! recurses and merges child issues with their path prefixed.
//!
//! The synchronous path is purely computational and reentrant; the only
//! suspension point is [`validate_async`]'s extra-validator sequence,
//! which awaits each validator to completion before starting the next.

use chrono::{DateTime, NaiveDate};
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{
    AggregateError, ErrorKind, PathSegment, ProjectionError, ValidationIssue,
};
use crate::schema::{
    ConditionalRule, FieldSpec, NodeKind, ObjectRule, ObjectSchema, SchemaNode, StringFormat,
};

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Options for a validation pass.
#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    /// Keep input keys that no field declares instead of dropping them.
    pub retain_unknown: bool,
}

impl ValidateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn retain_unknown(mut self, retain: bool) -> Self {
        self.retain_unknown = retain;
        self
    }
}

/// Outcome of [`safe_validate`]: exactly one of `value`/`error` is set.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub value: Option<Value>,
    pub error: Option<AggregateError>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<Value, AggregateError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.value.unwrap_or(Value::Null)),
        }
    }
}

/// Validate `input` against `schema`, returning the typed output value
/// with defaults applied and strip markers resolved.
///
/// # Errors
///
/// Returns an [`AggregateError`] carrying every issue found in the pass.
pub fn validate(schema: &SchemaNode, input: &Value) -> Result<Value, AggregateError> {
    validate_with(schema, input, &ValidateOptions::default())
}

/// [`validate`] with explicit options.
pub fn validate_with(
    schema: &SchemaNode,
    input: &Value,
    options: &ValidateOptions,
) -> Result<Value, AggregateError> {
    let mut path = Vec::new();
    check(schema, input, &mut path, options).map_err(AggregateError::new)
}

/// Never-failing variant of [`validate`], preferred at call sites that
/// map the outcome to a response instead of propagating an error.
pub fn safe_validate(schema: &SchemaNode, input: &Value) -> ValidationReport {
    match validate(schema, input) {
        Ok(value) => ValidationReport {
            value: Some(value),
            error: None,
        },
        Err(error) => ValidationReport {
            value: None,
            error: Some(error),
        },
    }
}

/// Validate and project the output onto a static Rust type.
///
/// This is the type-projection surface: the schema describes the runtime
/// shape and `T` is its compile-time counterpart, connected through serde.
/// Outputs of derived schemas (partial, pick, merge, ...) project the same
/// way onto the correspondingly derived target types.
pub fn validate_as<T: DeserializeOwned>(
    schema: &SchemaNode,
    input: &Value,
) -> Result<T, ProjectionError> {
    let value = validate(schema, input)?;
    serde_json::from_value(value).map_err(|source| ProjectionError::Projection { source })
}

/// Asynchronous validator: receives the already-validated value and
/// builds its future up front, cloning whatever the future needs.
pub type AsyncValidator =
    Box<dyn Fn(&Value) -> BoxFuture<'static, Result<(), String>> + Send + Sync>;

/// Run the full synchronous pass, then the extra validators.
///
/// The extra validators run only if the synchronous pass succeeds, each
/// receiving the validated value. They run strictly sequentially in the
/// order supplied; the first failure aborts the remainder and surfaces as
/// a single `AsyncValidationFailed` issue. Distinct calls are independent
/// and may run concurrently, since schemas carry no mutable state.
pub async fn validate_async(
    schema: &SchemaNode,
    input: &Value,
    validators: &[AsyncValidator],
) -> Result<Value, AggregateError> {
    let value = validate(schema, input)?;

    for validator in validators {
        if let Err(message) = validator(&value).await {
            return Err(AggregateError::new(vec![ValidationIssue::new(
                Vec::new(),
                message,
                ErrorKind::AsyncValidationFailed,
            )]));
        }
    }

    Ok(value)
}

// --- Internal implementation ---

fn check(
    node: &SchemaNode,
    value: &Value,
    path: &mut Vec<PathSegment>,
    options: &ValidateOptions,
) -> Result<Value, Vec<ValidationIssue>> {
    match &node.kind {
        NodeKind::String(constraints) => {
            let Some(s) = value.as_str() else {
                return Err(mismatch(path, "string", value));
            };
            let mut issues = Vec::new();
            let len = s.chars().count();
            if let Some(min) = constraints.min_len {
                if len < min {
                    push_violation(&mut issues, path, format!("shorter than minimum length {min}"));
                }
            }
            if let Some(max) = constraints.max_len {
                if len > max {
                    push_violation(&mut issues, path, format!("longer than maximum length {max}"));
                }
            }
            if let Some(pattern) = &constraints.pattern {
                if !pattern.is_match(s) {
                    push_violation(
                        &mut issues,
                        path,
                        format!("does not match pattern {}", pattern.as_str()),
                    );
                }
            }
            if let Some(allowed) = &constraints.allowed {
                if !allowed.iter().any(|a| a == s) {
                    push_violation(
                        &mut issues,
                        path,
                        format!("must be one of: {}", allowed.join(", ")),
                    );
                }
            }
            if constraints.format == Some(StringFormat::Email) && !is_plausible_email(s) {
                push_violation(&mut issues, path, format!("\"{s}\" is not a valid email"));
            }
            if issues.is_empty() {
                Ok(Value::String(s.to_string()))
            } else {
                Err(issues)
            }
        }

        NodeKind::Number(constraints) => {
            let Some(n) = value.as_f64() else {
                return Err(mismatch(path, "number", value));
            };
            let mut issues = Vec::new();
            if constraints.integer && n.fract() != 0.0 {
                push_violation(&mut issues, path, format!("{n} is not an integer"));
            }
            if let Some(min) = constraints.min {
                if n < min {
                    push_violation(&mut issues, path, format!("{n} is below minimum {min}"));
                }
            }
            if let Some(max) = constraints.max {
                if n > max {
                    push_violation(&mut issues, path, format!("{n} is above maximum {max}"));
                }
            }
            if let Some(allowed) = &constraints.allowed {
                if !allowed.iter().any(|a| a == &n) {
                    push_violation(&mut issues, path, format!("{n} is not an allowed value"));
                }
            }
            if issues.is_empty() {
                Ok(value.clone())
            } else {
                Err(issues)
            }
        }

        NodeKind::Boolean => match value.as_bool() {
            Some(b) => Ok(Value::Bool(b)),
            None => Err(mismatch(path, "boolean", value)),
        },

        NodeKind::Date(constraints) => {
            let Some(s) = value.as_str() else {
                return Err(mismatch(path, "date string", value));
            };
            let Some(parsed) = parse_date(s) else {
                return Err(vec![ValidationIssue::new(
                    path.clone(),
                    format!("\"{s}\" is not an RFC 3339 datetime or YYYY-MM-DD date"),
                    ErrorKind::TypeMismatch,
                )]);
            };
            let mut issues = Vec::new();
            if let Some(min) = constraints.min {
                if parsed < min {
                    push_violation(&mut issues, path, format!("date is before minimum {min}"));
                }
            }
            if let Some(max) = constraints.max {
                if parsed > max {
                    push_violation(&mut issues, path, format!("date is after maximum {max}"));
                }
            }
            if issues.is_empty() {
                Ok(Value::String(s.to_string()))
            } else {
                Err(issues)
            }
        }

        NodeKind::Array(element) => {
            let Some(items) = value.as_array() else {
                return Err(mismatch(path, "array", value));
            };
            let mut issues = Vec::new();
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                path.push(PathSegment::Index(i));
                match check(element, item, path, options) {
                    Ok(validated) => out.push(validated),
                    Err(child) => issues.extend(child),
                }
                path.pop();
            }
            if issues.is_empty() {
                Ok(Value::Array(out))
            } else {
                Err(issues)
            }
        }

        NodeKind::Object(object) => check_object(object, value, path, options),

        NodeKind::Alternatives(alt) => {
            // Key-based dispatch first: a mapping hit validates only the
            // dispatched candidate, so its issues are authoritative.
            if let Some(resolver) = &alt.resolver {
                let discriminator = value.get(&resolver.key);
                let dispatched = discriminator.and_then(|d| {
                    resolver
                        .mapping
                        .iter()
                        .find(|(expected, _)| expected == d)
                        .and_then(|(_, index)| alt.candidates.get(*index))
                });
                if let Some(candidate) = dispatched {
                    return check(candidate, value, path, options);
                }
            }

            let mut collected = Vec::new();
            for candidate in &alt.candidates {
                match check(candidate, value, path, options) {
                    Ok(validated) => return Ok(validated),
                    Err(child) => collected.extend(child),
                }
            }
            if collected.is_empty() {
                // No candidates configured; nothing can match.
                collected.push(ValidationIssue::new(
                    path.clone(),
                    "no alternative matched".to_string(),
                    ErrorKind::TypeMismatch,
                ));
            }
            Err(collected)
        }

        NodeKind::Forbidden => {
            if value.is_null() {
                Ok(Value::Null)
            } else {
                Err(vec![ValidationIssue::new(
                    path.clone(),
                    "value must not be present".to_string(),
                    ErrorKind::ForbiddenFieldPresent,
                )])
            }
        }

        // Strip is resolved at object-field level; standalone it accepts
        // anything and yields nothing.
        NodeKind::Strip => Ok(Value::Null),
    }
}

fn check_object(
    object: &ObjectSchema,
    value: &Value,
    path: &mut Vec<PathSegment>,
    options: &ValidateOptions,
) -> Result<Value, Vec<ValidationIssue>> {
    let Some(input) = value.as_object() else {
        return Err(mismatch(path, "object", value));
    };

    let mut out = Map::new();
    let mut issues = Vec::new();

    // Declaration order matters here: a conditional field observes the
    // already-resolved value of the field it depends on.
    for (name, spec) in &object.fields {
        path.push(PathSegment::Key(name.clone()));

        let effective = match &spec.conditional {
            Some(rule) => resolve_conditional(rule, &out, input),
            None => Some(spec),
        };

        match effective {
            // No branch applies and no otherwise exists: unconstrained,
            // the raw value (if any) passes through.
            None => {
                if let Some(raw) = input.get(name) {
                    out.insert(name.clone(), raw.clone());
                }
            }
            Some(effective) => {
                check_field(name, spec, effective, input, &mut out, path, options, &mut issues);
            }
        }

        path.pop();
    }

    if options.retain_unknown {
        for (key, raw) in input {
            let declared = object.fields.iter().any(|(name, _)| name == key);
            if !declared && !out.contains_key(key) {
                out.insert(key.clone(), raw.clone());
            }
        }
    }

    // Whole-object rules run after all individual fields.
    for rule in &object.rules {
        match rule {
            ObjectRule::MutuallyExclusive(fields) => {
                let present: Vec<&str> = fields
                    .iter()
                    .filter(|f| out.contains_key(f.as_str()))
                    .map(String::as_str)
                    .collect();
                if present.len() > 1 {
                    issues.push(ValidationIssue::new(
                        path.clone(),
                        format!(
                            "fields {} are mutually exclusive, got {}",
                            fields.join(", "),
                            present.join(", ")
                        ),
                        ErrorKind::MutualExclusionViolated,
                    ));
                }
            }
            ObjectRule::AtLeastOneOf(fields) => {
                let any_present = fields.iter().any(|f| out.contains_key(f.as_str()));
                if !any_present {
                    issues.push(ValidationIssue::new(
                        path.clone(),
                        format!("at least one of {} is required", fields.join(", ")),
                        ErrorKind::AtLeastOneRequired,
                    ));
                }
            }
        }
    }

    if issues.is_empty() {
        Ok(Value::Object(out))
    } else {
        Err(issues)
    }
}

/// Validate one declared field into `out`.
///
/// `spec` is the declared field spec (carrier of translation key and the
/// field-attached custom validator); `effective` is the spec actually
/// enforced, which differs when a conditional branch was chosen.
#[allow(clippy::too_many_arguments)]
fn check_field(
    name: &str,
    spec: &FieldSpec,
    effective: &FieldSpec,
    input: &Map<String, Value>,
    out: &mut Map<String, Value>,
    path: &mut Vec<PathSegment>,
    options: &ValidateOptions,
    issues: &mut Vec<ValidationIssue>,
) {
    match &effective.schema.kind {
        NodeKind::Forbidden => {
            if let Some(raw) = input.get(name) {
                if !raw.is_null() {
                    issues.push(field_issue(
                        spec,
                        path,
                        "field must not be present".to_string(),
                        ErrorKind::ForbiddenFieldPresent,
                    ));
                }
            }
        }

        // Always accepted, never part of the output.
        NodeKind::Strip => {}

        _ => match input.get(name) {
            Some(raw) => match check(&effective.schema, raw, path, options) {
                Ok(validated) => {
                    let custom = effective.custom.as_ref().or(spec.custom.as_ref());
                    match custom.map(|c| c.check(&validated)) {
                        Some(Err(message)) => issues.push(field_issue(
                            spec,
                            path,
                            message,
                            ErrorKind::CustomValidationFailed,
                        )),
                        _ => {
                            out.insert(name.to_string(), validated);
                        }
                    }
                }
                Err(children) => {
                    for mut issue in children {
                        // Direct issues on this field inherit its
                        // translation key; deeper paths keep their own.
                        if issue.translation_key.is_none() && issue.path.len() == path.len() {
                            issue.translation_key = spec.translation_key.clone();
                        }
                        issues.push(issue);
                    }
                }
            },
            None => {
                if let Some(default) = &effective.default {
                    // Dynamic suppliers run once per validation call.
                    out.insert(name.to_string(), default.produce());
                } else if effective.required {
                    issues.push(field_issue(
                        spec,
                        path,
                        "missing required field".to_string(),
                        ErrorKind::MissingRequiredField,
                    ));
                }
            }
        },
    }
}

/// Pick the effective spec for a conditional field.
///
/// Branches are evaluated in order against the dependency's resolved
/// value (falling back to the raw input when the dependency is declared
/// later); the first matching `is` wins. With no match, the first
/// `otherwise` across the branch list applies; with none, `None` is
/// returned and the field is unconstrained.
fn resolve_conditional<'a>(
    rule: &'a ConditionalRule,
    resolved: &Map<String, Value>,
    input: &Map<String, Value>,
) -> Option<&'a FieldSpec> {
    let null = Value::Null;
    let dependency = resolved
        .get(&rule.depends_on)
        .or_else(|| input.get(&rule.depends_on))
        .unwrap_or(&null);

    for branch in &rule.branches {
        if branch.is.matches(dependency) {
            return Some(&branch.then);
        }
    }
    rule.branches
        .iter()
        .find_map(|branch| branch.otherwise.as_deref())
}

fn mismatch(path: &[PathSegment], expected: &str, actual: &Value) -> Vec<ValidationIssue> {
    vec![ValidationIssue::new(
        path.to_vec(),
        format!("expected {expected}, got {}", json_type_name(actual)),
        ErrorKind::TypeMismatch,
    )]
}

fn push_violation(issues: &mut Vec<ValidationIssue>, path: &[PathSegment], message: String) {
    issues.push(ValidationIssue::new(
        path.to_vec(),
        message,
        ErrorKind::ConstraintViolation,
    ));
}

fn field_issue(
    spec: &FieldSpec,
    path: &[PathSegment],
    message: String,
    kind: ErrorKind,
) -> ValidationIssue {
    let mut issue = ValidationIssue::new(path.to_vec(), message, kind);
    issue.translation_key = spec.translation_key.clone();
    issue
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.date_naive())
        .ok()
        .or_else(|| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

fn is_plausible_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !s.chars().any(char::is_whitespace)
}
