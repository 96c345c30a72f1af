//! Integration tests for the validation engine.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::FutureExt;
use schema_forge::{
    alternatives, array, at_least_one_of, boolean, branch, conditional_field, field, forbidden,
    format_error, mutually_exclusive, number, object, require_if, safe_validate, string, strip,
    validate, validate_as, validate_async, validate_with, AsyncValidator, ErrorKind, SchemaNode,
    SchemaRegistry, TranslationMap, ValidateOptions,
};
use serde_json::{json, Value};

// === Exhaustive Issue Collection ===

mod issue_collection {
    use super::*;

    #[test]
    fn all_sibling_issues_reported_in_one_pass() {
        let schema = object([
            ("a", field(string()).required()),
            ("b", field(number()).required()),
        ])
        .unwrap();

        let err = validate(&schema, &json!({})).unwrap_err();
        assert_eq!(err.issues.len(), 2);
        assert_eq!(err.issues[0].path_string(), "/a");
        assert_eq!(err.issues[1].path_string(), "/b");
        assert!(err
            .issues
            .iter()
            .all(|i| i.kind == ErrorKind::MissingRequiredField));
    }

    #[test]
    fn nested_issues_carry_prefixed_paths() {
        let address = object([
            ("street", field(string()).required()),
            ("zip", field(string().min_len(5)).required()),
        ])
        .unwrap();
        let schema = object([
            ("name", field(string()).required()),
            ("address", field(address).required()),
        ])
        .unwrap();

        let err = validate(&schema, &json!({"address": {"zip": "1"}})).unwrap_err();
        let paths: Vec<String> = err.issues.iter().map(|i| i.path_string()).collect();
        assert!(paths.contains(&"/name".to_string()));
        assert!(paths.contains(&"/address/street".to_string()));
        assert!(paths.contains(&"/address/zip".to_string()));
    }

    #[test]
    fn array_of_objects_reports_per_index() {
        let item = object([("sku", field(string()).required())]).unwrap();
        let schema = object([("items", field(array(item)).required())]).unwrap();

        let err = validate(&schema, &json!({"items": [{"sku": "a"}, {}, {"sku": 3}]})).unwrap_err();
        let paths: Vec<String> = err.issues.iter().map(|i| i.path_string()).collect();
        assert_eq!(paths, vec!["/items/1/sku", "/items/2/sku"]);
    }

    #[test]
    fn no_partial_success() {
        let schema = object([
            ("good", field(string())),
            ("bad", field(number()).required()),
        ])
        .unwrap();

        let report = safe_validate(&schema, &json!({"good": "ok"}));
        assert!(report.value.is_none());
        assert!(report.error.is_some());
    }
}

// === Conditional Fields ===

mod conditionals {
    use super::*;

    fn account() -> SchemaNode {
        object([
            ("status", field(string())),
            ("reason", require_if(string(), "status", "inactive")),
        ])
        .unwrap()
    }

    #[test]
    fn trigger_absent_field_optional() {
        assert!(validate(&account(), &json!({"status": "active"})).is_ok());
    }

    #[test]
    fn trigger_present_field_required() {
        let err = validate(&account(), &json!({"status": "inactive"})).unwrap_err();
        assert_eq!(err.issues.len(), 1);
        assert_eq!(err.issues[0].kind, ErrorKind::MissingRequiredField);
        assert_eq!(err.issues[0].path_string(), "/reason");
    }

    #[test]
    fn dependency_observed_after_its_own_default() {
        // status is declared first and defaulted, so the conditional on
        // reason sees the resolved default, not the raw (absent) input.
        let schema = object([
            ("status", field(string()).default_value("inactive")),
            ("reason", require_if(string(), "status", "inactive")),
        ])
        .unwrap();

        let err = validate(&schema, &json!({})).unwrap_err();
        assert_eq!(err.issues[0].path_string(), "/reason");
    }

    #[test]
    fn branch_order_first_match_wins() {
        let schema = object([
            ("tier", field(string())),
            (
                "limit",
                conditional_field(
                    "tier",
                    vec![
                        branch("free", field(number().max(10.0)).required()),
                        // Unreachable for "free": the first branch wins.
                        branch("free", field(number().max(1000.0)).required()),
                    ],
                ),
            ),
        ])
        .unwrap();

        assert!(validate(&schema, &json!({"tier": "free", "limit": 5})).is_ok());
        assert!(validate(&schema, &json!({"tier": "free", "limit": 500})).is_err());
    }
}

// === Alternatives ===

mod alternatives_schema {
    use super::*;

    #[test]
    fn first_success_wins_in_order() {
        let schema = alternatives([
            SchemaNode::from(string().min_len(3)),
            SchemaNode::from(string().min_len(1)),
        ]);

        // "ab" fails the first candidate but passes the second.
        assert!(validate(&schema, &json!("ab")).is_ok());
    }

    #[test]
    fn all_candidate_issues_reported_on_total_failure() {
        let schema = alternatives([SchemaNode::from(string()), SchemaNode::from(number())]);

        let err = validate(&schema, &json!(true)).unwrap_err();
        assert_eq!(err.issues.len(), 2);
        assert!(err.issues.iter().all(|i| i.kind == ErrorKind::TypeMismatch));
    }

    #[test]
    fn key_resolver_dispatches_single_candidate() {
        let text = object([
            ("type", field(string())),
            ("body", field(string()).required()),
        ])
        .unwrap();
        let count = object([
            ("type", field(string())),
            ("value", field(number()).required()),
        ])
        .unwrap();

        let schema = alternatives([text, count])
            .with_resolver("type", vec![(json!("text"), 0), (json!("count"), 1)]);

        assert!(validate(&schema, &json!({"type": "count", "value": 3})).is_ok());

        // Dispatched candidate's issues are authoritative: only the
        // "count" candidate is tried, so exactly one issue comes back.
        let err = validate(&schema, &json!({"type": "count"})).unwrap_err();
        assert_eq!(err.issues.len(), 1);
        assert_eq!(err.issues[0].path_string(), "/value");
    }

    #[test]
    fn resolver_miss_falls_back_to_ordered_trial() {
        let schema = alternatives([SchemaNode::from(string()), SchemaNode::from(number())])
            .with_resolver("type", vec![(json!("text"), 0)]);

        // Non-object input has no discriminator; ordered trial applies.
        assert!(validate(&schema, &json!(42)).is_ok());
    }
}

// === Object-Level Rules ===

mod object_rules {
    use super::*;

    #[test]
    fn mutual_exclusion_counts_resolved_fields() {
        let schema = object([
            ("card", field(string())),
            ("iban", field(string())),
            ("note", field(string())),
        ])
        .unwrap()
        .with_rule(mutually_exclusive(["card", "iban"]));

        assert!(validate(&schema, &json!({"card": "x", "note": "n"})).is_ok());

        let err = validate(&schema, &json!({"card": "x", "iban": "y"})).unwrap_err();
        assert_eq!(err.issues.len(), 1);
        assert_eq!(err.issues[0].kind, ErrorKind::MutualExclusionViolated);
    }

    #[test]
    fn at_least_one_counts_defaults() {
        // A defaulted field is present in the output, satisfying the rule.
        let schema = object([
            ("email", field(string()).default_value("none@example.com")),
            ("phone", field(string())),
        ])
        .unwrap()
        .with_rule(at_least_one_of(["email", "phone"]));

        assert!(validate(&schema, &json!({})).is_ok());
    }

    #[test]
    fn rules_combine_with_field_issues() {
        let schema = object([
            ("name", field(string()).required()),
            ("email", field(string())),
            ("phone", field(string())),
        ])
        .unwrap()
        .with_rule(at_least_one_of(["email", "phone"]));

        let err = validate(&schema, &json!({})).unwrap_err();
        let kinds: Vec<ErrorKind> = err.issues.iter().map(|i| i.kind).collect();
        assert!(kinds.contains(&ErrorKind::MissingRequiredField));
        assert!(kinds.contains(&ErrorKind::AtLeastOneRequired));
    }
}

// === Sentinels and Unknown Keys ===

mod sentinels {
    use super::*;

    #[test]
    fn forbidden_rejects_values_but_not_null() {
        let schema = object([
            ("name", field(string())),
            ("internal_id", field(forbidden())),
        ])
        .unwrap();

        assert!(validate(&schema, &json!({"name": "a"})).is_ok());
        assert!(validate(&schema, &json!({"name": "a", "internal_id": null})).is_ok());

        let err = validate(&schema, &json!({"name": "a", "internal_id": "x"})).unwrap_err();
        assert_eq!(err.issues[0].kind, ErrorKind::ForbiddenFieldPresent);
    }

    #[test]
    fn strip_removes_value_even_when_retaining_unknown() {
        let schema = object([
            ("name", field(string())),
            ("csrf_token", field(strip())),
        ])
        .unwrap();
        let options = ValidateOptions::new().retain_unknown(true);

        let value = validate_with(
            &schema,
            &json!({"name": "a", "csrf_token": "t", "trace": "keep"}),
            &options,
        )
        .unwrap();
        assert_eq!(value, json!({"name": "a", "trace": "keep"}));
    }
}

// === Error Formatting and Localization ===

mod formatting {
    use super::*;

    #[test]
    fn translation_key_swaps_message_at_the_boundary() {
        let schema = object([(
            "name",
            field(string()).required().translation_key("errors.user.name"),
        )])
        .unwrap();

        let err = validate(&schema, &json!({})).unwrap_err();
        let mut translations = TranslationMap::new();
        translations.insert(
            "errors.user.name".to_string(),
            "Name is required".to_string(),
        );

        let formatted = format_error(&err, Some(&translations));
        assert_eq!(formatted.details[0].path, "/name");
        assert_eq!(formatted.details[0].message, "Name is required");
        assert_eq!(formatted.details[0].kind, ErrorKind::MissingRequiredField);

        // Same error without a map: engine message untouched.
        let formatted = format_error(&err, None);
        assert_eq!(formatted.details[0].message, "missing required field");
    }

    #[test]
    fn formatted_error_serializes() {
        let schema = object([("age", field(number()).required())]).unwrap();
        let err = validate(&schema, &json!({})).unwrap_err();

        let serialized = serde_json::to_value(format_error(&err, None)).unwrap();
        assert_eq!(serialized["details"][0]["path"], "/age");
        assert_eq!(serialized["details"][0]["kind"], "missing_required_field");
    }
}

// === Typed Projection ===

mod projection {
    use super::*;

    #[derive(serde::Deserialize)]
    struct Signup {
        username: String,
        newsletter: bool,
    }

    #[test]
    fn validated_output_projects_onto_struct() {
        let schema = object([
            ("username", field(string().min_len(3)).required()),
            ("newsletter", field(boolean()).default_value(false)),
        ])
        .unwrap();

        let signup: Signup =
            validate_as(&schema, &json!({"username": "ada", "extra": "dropped"})).unwrap();
        assert_eq!(signup.username, "ada");
        assert!(!signup.newsletter);
    }

    #[test]
    fn projection_tracks_derived_schemas() {
        #[derive(serde::Deserialize)]
        struct Patch {
            username: Option<String>,
        }

        let schema = object([("username", field(string()).required())]).unwrap();
        let patch: Patch = validate_as(&schema.partial(), &json!({})).unwrap();
        assert!(patch.username.is_none());
    }
}

// === Registry ===

mod registry {
    use super::*;

    #[test]
    fn caller_scoped_registry_shares_schemas() {
        let mut registry = SchemaRegistry::new();
        registry.register(
            "user.create",
            object([("name", field(string()).required())]).unwrap(),
        );
        registry.register("user.update", registry.get("user.create").unwrap().partial());

        assert!(validate(registry.get("user.update").unwrap(), &json!({})).is_ok());
        assert!(validate(registry.get("user.create").unwrap(), &json!({})).is_err());
    }
}

// === Async Validators ===

mod async_validation {
    use super::*;

    fn recording(
        log: &Arc<Mutex<Vec<&'static str>>>,
        name: &'static str,
        outcome: Result<(), &'static str>,
    ) -> AsyncValidator {
        let log = log.clone();
        Box::new(move |_value: &Value| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(name);
                outcome.map_err(String::from)
            }
            .boxed()
        })
    }

    #[tokio::test]
    async fn validators_run_sequentially_first_failure_wins() {
        let schema = object([("name", field(string()).required())]).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        let validators = vec![
            recording(&log, "uniqueness", Ok(())),
            recording(&log, "denylist", Err("name is denylisted")),
            recording(&log, "audit", Ok(())),
        ];

        let err = validate_async(&schema, &json!({"name": "a"}), &validators)
            .await
            .unwrap_err();

        assert_eq!(err.issues.len(), 1);
        assert_eq!(err.issues[0].kind, ErrorKind::AsyncValidationFailed);
        assert_eq!(err.issues[0].message, "name is denylisted");
        // The failure aborts the remainder: "audit" never ran.
        assert_eq!(*log.lock().unwrap(), vec!["uniqueness", "denylist"]);
    }

    #[tokio::test]
    async fn sync_failure_short_circuits_async_validators() {
        let schema = object([("name", field(string()).required())]).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let seen = calls.clone();
        let validators: Vec<AsyncValidator> = vec![Box::new(move |_| {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            .boxed()
        })];

        let err = validate_async(&schema, &json!({}), &validators)
            .await
            .unwrap_err();
        assert_eq!(err.issues[0].kind, ErrorKind::MissingRequiredField);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn validators_receive_the_validated_value() {
        // Defaults are applied before the async stage sees the value.
        let schema = object([("role", field(string()).default_value("viewer"))]).unwrap();

        let validators: Vec<AsyncValidator> = vec![Box::new(|value: &Value| {
            let role = value["role"].clone();
            async move {
                if role == json!("viewer") {
                    Ok(())
                } else {
                    Err("unexpected role".to_string())
                }
            }
            .boxed()
        })];

        let value = validate_async(&schema, &json!({}), &validators)
            .await
            .unwrap();
        assert_eq!(value, json!({"role": "viewer"}));
    }

    #[tokio::test]
    async fn success_returns_validated_value() {
        let schema = object([("name", field(string()).required())]).unwrap();
        let value = validate_async(&schema, &json!({"name": "a"}), &[])
            .await
            .unwrap();
        assert_eq!(value, json!({"name": "a"}));
    }
}
