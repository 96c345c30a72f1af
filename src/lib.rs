//! Declarative schema validation and transformation engine.
//!
//! Schemas are built programmatically as a tree of combinators, validated
//! against with exhaustive issue collection, and evolved through pure
//! structural transformers (`partial`, `pick`, `merge`, ...) that never
//! mutate their input.
//!
//! # Example
//!
//! ```
//! use schema_forge::{field, number, object, string, validate};
//! use serde_json::json;
//!
//! let user = object([
//!     ("name", field(string().min_len(1)).required()),
//!     ("age", field(number().min(0.0))),
//! ])
//! .unwrap();
//!
//! let value = validate(&user, &json!({"name": "ada", "age": 36})).unwrap();
//! assert_eq!(value, json!({"name": "ada", "age": 36}));
//!
//! // Derive a schema for PATCH-style updates; the original is untouched.
//! let update = user.partial();
//! assert!(validate(&update, &json!({})).is_ok());
//! assert!(validate(&user, &json!({})).is_err());
//! ```
//!
//! # Cross-field rules
//!
//! ```
//! use schema_forge::{field, object, require_if, string, validate, ErrorKind};
//! use serde_json::json;
//!
//! let account = object([
//!     ("status", field(string())),
//!     ("reason", require_if(string(), "status", "inactive")),
//! ])
//! .unwrap();
//!
//! assert!(validate(&account, &json!({"status": "active"})).is_ok());
//!
//! let err = validate(&account, &json!({"status": "inactive"})).unwrap_err();
//! assert_eq!(err.issues[0].kind, ErrorKind::MissingRequiredField);
//! ```

mod analyzer;
mod constraints;
mod error;
mod schema;
mod transform;
mod validator;

pub use analyzer::{
    dependency_graph, describe, describe_with_examples, diff, field_presence, generate_example,
    Presence, SchemaDescription, SchemaDiff,
};
pub use constraints::{
    at_least_one_of, branch, branch_when, conditional_field, dynamic_default, mutually_exclusive,
    require_if,
};
pub use error::{
    format_error, path_to_string, AggregateError, BuildError, ErrorKind, FormattedError,
    FormattedIssue, PathSegment, ProjectionError, TranslationMap, ValidationIssue,
};
pub use schema::{
    alternatives, array, boolean, date, field, forbidden, number, object, string, strip,
    Alternatives, ConditionalBranch, ConditionalRule, CustomValidator, DateConstraints,
    DateSchema, DefaultValue, DynamicDefault, FieldSpec, KeyResolver, Matcher, NodeKind,
    NumberConstraints, NumberSchema, ObjectRule, ObjectSchema, SchemaNode, SchemaRegistry,
    StringConstraints, StringFormat, StringSchema,
};
pub use transform::{Redactor, REDACTED};
pub use validator::{
    json_type_name, safe_validate, validate, validate_as, validate_async, validate_with,
    AsyncValidator, ValidateOptions, ValidationReport,
};
