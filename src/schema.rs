//! Schema node model - the immutable tree of combinators.
//!
//! Schemas are built once by composing the free functions in this module
//! (`string`, `number`, `object`, `array`, ...) and are then shared freely:
//! every node is an immutable value, and every derivation in
//! [`crate::transform`] returns a new node without touching its input.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use regex::Regex;
use serde_json::Value;

use crate::error::BuildError;

/// A schema describing the expected shape and constraints of a value.
///
/// The `version` tag is opaque metadata for release-to-release comparison
/// (see [`crate::analyzer::diff`]); it never affects validation.
#[derive(Debug, Clone)]
pub struct SchemaNode {
    pub kind: NodeKind,
    pub version: Option<String>,
}

/// The variants a schema node can take.
#[derive(Debug, Clone)]
pub enum NodeKind {
    String(StringConstraints),
    Number(NumberConstraints),
    Boolean,
    Date(DateConstraints),
    Object(ObjectSchema),
    Array(Box<SchemaNode>),
    Alternatives(Alternatives),
    /// The key must be absent (or null) in the input.
    Forbidden,
    /// Always accepted, always removed from the output.
    Strip,
}

impl SchemaNode {
    pub fn new(kind: NodeKind) -> Self {
        SchemaNode {
            kind,
            version: None,
        }
    }

    /// Attach an opaque version tag, returning a new node.
    pub fn with_version(&self, tag: impl Into<String>) -> SchemaNode {
        SchemaNode {
            kind: self.kind.clone(),
            version: Some(tag.into()),
        }
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Attach a whole-object rule (mutual exclusion, at-least-one-of).
    ///
    /// Non-object nodes are returned unchanged.
    pub fn with_rule(&self, rule: ObjectRule) -> SchemaNode {
        let mut node = self.clone();
        if let NodeKind::Object(obj) = &mut node.kind {
            obj.rules.push(rule);
        }
        node
    }

    /// Install a key-based resolver on an alternatives node.
    ///
    /// `mapping` pairs a discriminator value with a candidate index. During
    /// validation the discriminator field named `key` is looked up in the
    /// input; a mapping hit validates only that candidate. A miss (or a
    /// non-alternatives node) falls back to ordered trial.
    pub fn with_resolver(
        &self,
        key: impl Into<String>,
        mapping: Vec<(Value, usize)>,
    ) -> SchemaNode {
        let mut node = self.clone();
        if let NodeKind::Alternatives(alt) = &mut node.kind {
            alt.resolver = Some(KeyResolver {
                key: key.into(),
                mapping,
            });
        }
        node
    }

    /// The object schema behind this node, if it is an object.
    pub fn as_object(&self) -> Option<&ObjectSchema> {
        match &self.kind {
            NodeKind::Object(obj) => Some(obj),
            _ => None,
        }
    }
}

/// Constraints for string primitives.
#[derive(Debug, Clone, Default)]
pub struct StringConstraints {
    pub min_len: Option<usize>,
    pub max_len: Option<usize>,
    pub pattern: Option<Regex>,
    pub allowed: Option<Vec<String>>,
    pub format: Option<StringFormat>,
}

/// Well-known string formats with dedicated checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFormat {
    Email,
}

/// Constraints for number primitives. Bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct NumberConstraints {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub integer: bool,
    pub allowed: Option<Vec<f64>>,
}

/// Constraints for date primitives. Accepted input is an RFC 3339 datetime
/// or a `YYYY-MM-DD` date string; bounds compare the calendar date.
#[derive(Debug, Clone, Default)]
pub struct DateConstraints {
    pub min: Option<NaiveDate>,
    pub max: Option<NaiveDate>,
}

/// An ordered mapping of field name to spec, plus whole-object rules.
///
/// Field order is insertion order and is preserved by every structural
/// transformer; keys are unique (enforced by [`object`]).
#[derive(Debug, Clone, Default)]
pub struct ObjectSchema {
    pub fields: Vec<(String, FieldSpec)>,
    pub rules: Vec<ObjectRule>,
}

impl ObjectSchema {
    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, spec)| spec)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }
}

/// A whole-object rule checked after all individual fields validate.
#[derive(Debug, Clone)]
pub enum ObjectRule {
    /// At most one of the named fields may be present.
    MutuallyExclusive(Vec<String>),
    /// At least one of the named fields must be present.
    AtLeastOneOf(Vec<String>),
}

/// Ordered candidates with an optional key-based dispatch.
#[derive(Debug, Clone)]
pub struct Alternatives {
    pub candidates: Vec<SchemaNode>,
    pub resolver: Option<KeyResolver>,
}

/// Key-based dispatch for an alternatives node.
#[derive(Debug, Clone)]
pub struct KeyResolver {
    pub key: String,
    pub mapping: Vec<(Value, usize)>,
}

/// A schema attached to an object key, plus per-field metadata.
///
/// When `conditional` is set it supersedes `schema`: the chosen branch's
/// spec is validated in place of this one, and if no branch applies the
/// field is accepted as-is (see [`crate::validator`]).
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub schema: SchemaNode,
    pub required: bool,
    pub default: Option<DefaultValue>,
    pub redacted: bool,
    pub translation_key: Option<String>,
    pub conditional: Option<ConditionalRule>,
    pub custom: Option<CustomValidator>,
}

impl FieldSpec {
    pub fn new(schema: SchemaNode) -> Self {
        FieldSpec {
            schema,
            required: false,
            default: None,
            redacted: false,
            translation_key: None,
            conditional: None,
            custom: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Fixed default applied when the field is absent from the input.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Fixed(value.into()));
        self
    }

    /// Lazily evaluated default: the supplier runs once per validation call
    /// in which the field is absent, never at schema-construction time.
    pub fn dynamic_default<F>(mut self, supplier: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Dynamic(DynamicDefault(Arc::new(supplier))));
        self
    }

    /// Mark the field for post-validation masking (see
    /// [`SchemaNode::with_redacted_fields`](crate::transform)).
    pub fn redacted(mut self) -> Self {
        self.redacted = true;
        self
    }

    /// Lookup key for the error-formatting boundary. Has no effect on
    /// validation outcome.
    pub fn translation_key(mut self, key: impl Into<String>) -> Self {
        self.translation_key = Some(key.into());
        self
    }

    /// Runs only after the field's own schema validation succeeds; an `Err`
    /// becomes a `CustomValidationFailed` issue at the field's path.
    pub fn custom<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.custom = Some(CustomValidator(Arc::new(validator)));
        self
    }

    /// Attach a conditional rule; it supersedes this spec's base schema.
    pub fn when(mut self, rule: ConditionalRule) -> Self {
        self.conditional = Some(rule);
        self
    }
}

impl From<SchemaNode> for FieldSpec {
    fn from(schema: SchemaNode) -> Self {
        FieldSpec::new(schema)
    }
}

/// Default applied when a field is absent from the input.
#[derive(Clone)]
pub enum DefaultValue {
    Fixed(Value),
    Dynamic(DynamicDefault),
}

impl DefaultValue {
    /// Produce the default for one validation call.
    pub fn produce(&self) -> Value {
        match self {
            DefaultValue::Fixed(v) => v.clone(),
            DefaultValue::Dynamic(f) => (f.0)(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Fixed(v) => f.debug_tuple("Fixed").field(v).finish(),
            DefaultValue::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Zero-argument default supplier.
#[derive(Clone)]
pub struct DynamicDefault(pub(crate) Arc<dyn Fn() -> Value + Send + Sync>);

/// Caller-supplied per-field validator.
#[derive(Clone)]
pub struct CustomValidator(pub(crate) Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>);

impl CustomValidator {
    pub fn check(&self, value: &Value) -> Result<(), String> {
        (self.0)(value)
    }
}

impl fmt::Debug for CustomValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomValidator(..)")
    }
}

/// A branch table selecting a field's effective spec based on another
/// field's resolved value.
///
/// Kept as plain data (no dispatch closure) so the analyzer can extract
/// dependency graphs and presence classes without running validation.
#[derive(Debug, Clone)]
pub struct ConditionalRule {
    pub depends_on: String,
    pub branches: Vec<ConditionalBranch>,
}

/// One branch of a conditional rule. Branches are evaluated in order and
/// the first matching `is` wins; if none match, the first `otherwise`
/// found across the branch list applies, and failing that the field is
/// unconstrained.
#[derive(Debug, Clone)]
pub struct ConditionalBranch {
    pub is: Matcher,
    pub then: Box<FieldSpec>,
    pub otherwise: Option<Box<FieldSpec>>,
}

/// Exact-match or predicate comparison against the dependency's value.
#[derive(Clone)]
pub enum Matcher {
    Equals(Value),
    Predicate(Arc<dyn Fn(&Value) -> bool + Send + Sync>),
}

impl Matcher {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Matcher::Equals(expected) => expected == value,
            Matcher::Predicate(pred) => pred(value),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Equals(v) => f.debug_tuple("Equals").field(v).finish(),
            Matcher::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

// --- Builders ---

/// Fluent builder for string schemas.
#[derive(Debug, Clone, Default)]
pub struct StringSchema {
    constraints: StringConstraints,
}

impl StringSchema {
    pub fn min_len(mut self, n: usize) -> Self {
        self.constraints.min_len = Some(n);
        self
    }

    pub fn max_len(mut self, n: usize) -> Self {
        self.constraints.max_len = Some(n);
        self
    }

    /// Constrain values to match a regex.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidPattern`] if the regex does not compile.
    pub fn pattern(mut self, pattern: &str) -> Result<Self, BuildError> {
        let regex = Regex::new(pattern).map_err(|source| BuildError::InvalidPattern { source })?;
        self.constraints.pattern = Some(regex);
        Ok(self)
    }

    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constraints.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn email(mut self) -> Self {
        self.constraints.format = Some(StringFormat::Email);
        self
    }
}

impl From<StringSchema> for SchemaNode {
    fn from(builder: StringSchema) -> Self {
        SchemaNode::new(NodeKind::String(builder.constraints))
    }
}

impl From<StringSchema> for FieldSpec {
    fn from(builder: StringSchema) -> Self {
        FieldSpec::new(builder.into())
    }
}

/// Fluent builder for number schemas.
#[derive(Debug, Clone, Default)]
pub struct NumberSchema {
    constraints: NumberConstraints,
}

impl NumberSchema {
    pub fn min(mut self, n: f64) -> Self {
        self.constraints.min = Some(n);
        self
    }

    pub fn max(mut self, n: f64) -> Self {
        self.constraints.max = Some(n);
        self
    }

    pub fn integer(mut self) -> Self {
        self.constraints.integer = true;
        self
    }

    pub fn one_of<I>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        self.constraints.allowed = Some(values.into_iter().collect());
        self
    }
}

impl From<NumberSchema> for SchemaNode {
    fn from(builder: NumberSchema) -> Self {
        SchemaNode::new(NodeKind::Number(builder.constraints))
    }
}

impl From<NumberSchema> for FieldSpec {
    fn from(builder: NumberSchema) -> Self {
        FieldSpec::new(builder.into())
    }
}

/// Fluent builder for date schemas.
#[derive(Debug, Clone, Default)]
pub struct DateSchema {
    constraints: DateConstraints,
}

impl DateSchema {
    pub fn not_before(mut self, date: NaiveDate) -> Self {
        self.constraints.min = Some(date);
        self
    }

    pub fn not_after(mut self, date: NaiveDate) -> Self {
        self.constraints.max = Some(date);
        self
    }
}

impl From<DateSchema> for SchemaNode {
    fn from(builder: DateSchema) -> Self {
        SchemaNode::new(NodeKind::Date(builder.constraints))
    }
}

impl From<DateSchema> for FieldSpec {
    fn from(builder: DateSchema) -> Self {
        FieldSpec::new(builder.into())
    }
}

/// Start a string schema.
pub fn string() -> StringSchema {
    StringSchema::default()
}

/// Start a number schema.
pub fn number() -> NumberSchema {
    NumberSchema::default()
}

/// A boolean schema.
pub fn boolean() -> SchemaNode {
    SchemaNode::new(NodeKind::Boolean)
}

/// Start a date schema.
pub fn date() -> DateSchema {
    DateSchema::default()
}

/// An array whose every element validates against `element`.
pub fn array(element: impl Into<SchemaNode>) -> SchemaNode {
    SchemaNode::new(NodeKind::Array(Box::new(element.into())))
}

/// Ordered alternatives; the first fully succeeding candidate wins.
pub fn alternatives<I>(candidates: I) -> SchemaNode
where
    I: IntoIterator,
    I::Item: Into<SchemaNode>,
{
    SchemaNode::new(NodeKind::Alternatives(Alternatives {
        candidates: candidates.into_iter().map(Into::into).collect(),
        resolver: None,
    }))
}

/// A field that must be absent (or null).
pub fn forbidden() -> SchemaNode {
    SchemaNode::new(NodeKind::Forbidden)
}

/// A field that always validates and is always removed from the output.
pub fn strip() -> SchemaNode {
    SchemaNode::new(NodeKind::Strip)
}

/// Wrap a schema into a field spec builder.
pub fn field(schema: impl Into<SchemaNode>) -> FieldSpec {
    FieldSpec::new(schema.into())
}

/// Build an object schema from ordered `(name, spec)` pairs.
///
/// # Errors
///
/// Returns [`BuildError::DuplicateField`] on a repeated key and
/// [`BuildError::RequiredForbidden`] when a field is both `required` and
/// `Forbidden` - that combination can never validate.
pub fn object<I, K, F>(fields: I) -> Result<SchemaNode, BuildError>
where
    I: IntoIterator<Item = (K, F)>,
    K: Into<String>,
    F: Into<FieldSpec>,
{
    let mut collected: Vec<(String, FieldSpec)> = Vec::new();

    for (key, spec) in fields {
        let name = key.into();
        let spec = spec.into();

        if collected.iter().any(|(existing, _)| *existing == name) {
            return Err(BuildError::DuplicateField { name });
        }
        if spec.required && matches!(spec.schema.kind, NodeKind::Forbidden) {
            return Err(BuildError::RequiredForbidden { name });
        }
        collected.push((name, spec));
    }

    Ok(SchemaNode::new(NodeKind::Object(ObjectSchema {
        fields: collected,
        rules: Vec::new(),
    })))
}

/// Explicit name-to-schema registry, passed by the caller.
///
/// Replaces the module-level registries seen in adjacent code: the engine
/// never holds global mutable state, so sharing named schemas is the
/// caller's choice and scope.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    entries: Vec<(String, SchemaNode)>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema under a name; a repeated name replaces the
    /// previous entry.
    pub fn register(&mut self, name: impl Into<String>, schema: SchemaNode) {
        let name = name.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == name) {
            slot.1 = schema;
        } else {
            self.entries.push((name, schema));
        }
    }

    pub fn get(&self, name: &str) -> Option<&SchemaNode> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, schema)| schema)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}
