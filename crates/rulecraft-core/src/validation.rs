use std::collections::HashMap;
use std::fmt;

use jsonschema::JSONSchema;
use schemars::schema::RootSchema;
use serde::Serialize;
use serde_json::Value;

use crate::error::Error;
use crate::records::test_case_records_json_schema;
use crate::rules::rule_store_json_schema;

/// Attributes every field must carry before enrichment.
pub const REQUIRED_FIELD_ATTRIBUTES: [&str; 7] = [
    "data_type",
    "mandatory_field",
    "from_source",
    "primary_key",
    "required_for_deployment",
    "deployment_validation",
    "business_rules",
];

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Error,
    Warning,
}

/// Structured validation issue with location and hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub severity: IssueSeverity,
    pub code: String,
    pub path: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ValidationIssue {
    /// Create a new validation issue.
    pub fn new(
        severity: IssueSeverity,
        code: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
        hint: Option<String>,
    ) -> Self {
        Self {
            severity,
            code: code.into(),
            path: path.into(),
            message: message.into(),
            hint,
        }
    }
}

/// Aggregated validation report with errors and warnings.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Returns true when there are no errors.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error issue.
    pub fn push_error(&mut self, issue: ValidationIssue) {
        self.errors.push(issue);
    }

    /// Add a warning issue.
    pub fn push_warning(&mut self, issue: ValidationIssue) {
        self.warnings.push(issue);
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.first() {
            None => write!(f, "no errors ({} warnings)", self.warnings.len()),
            Some(first) => {
                write!(f, "{} at {}: {}", first.code, first.path, first.message)?;
                if self.errors.len() > 1 {
                    write!(f, " (and {} more errors)", self.errors.len() - 1)?;
                }
                Ok(())
            }
        }
    }
}

/// Validate a json document against a JSON Schema.
///
/// Each schema failure becomes a `schema_violation` issue at the instance path.
pub fn validate_json_schema(document: &Value, schema: &Value) -> Result<ValidationReport, Error> {
    let compiled = JSONSchema::compile(schema).map_err(|err| Error::Schema(err.to_string()))?;

    let mut report = ValidationReport::default();

    if let Err(errors) = compiled.validate(document) {
        for error in errors {
            let path = normalized_json_pointer(&error.instance_path.to_string());
            report.push_error(ValidationIssue::new(
                IssueSeverity::Error,
                "schema_violation",
                path,
                error.to_string(),
                None,
            ));
        }
    }

    Ok(report)
}

/// Validate the shape of a rule store document.
///
/// The structural pass runs against [`rule_store_json_schema`] and reports
/// every violation at once. Checks the schema cannot express run only on a
/// structurally valid document.
pub fn validate_rule_store(document: &Value) -> ValidationReport {
    let mut report = structural_report(document, rule_store_json_schema());
    if !report.is_ok() {
        return report;
    }

    let Some(parents) = document.as_object() else {
        return report;
    };

    if parents.is_empty() {
        report.push_error(ValidationIssue::new(
            IssueSeverity::Error,
            "rules_empty",
            "/",
            "no rules to validate",
            Some("check that the upstream export produced at least one parent field".to_string()),
        ));
        return report;
    }

    let mut first_parent: HashMap<&str, &str> = HashMap::new();
    for (parent, details) in parents {
        let fields_path = format!("/{}/fields", escape_pointer(parent));
        let Some(fields) = details.get("fields").and_then(Value::as_object) else {
            continue;
        };

        if fields.is_empty() {
            report.push_warning(ValidationIssue::new(
                IssueSeverity::Warning,
                "fields_empty",
                fields_path.clone(),
                format!("parent '{parent}' has no fields"),
                None,
            ));
        }

        for field in fields.keys() {
            match first_parent.get(field.as_str()) {
                Some(first) => report.push_warning(ValidationIssue::new(
                    IssueSeverity::Warning,
                    "field_name_shared",
                    format!("{fields_path}/{}", escape_pointer(field)),
                    format!("field '{field}' of {parent} is also defined in {first}"),
                    Some("generated test cases of both fields share one group".to_string()),
                )),
                None => {
                    first_parent.insert(field, parent);
                }
            }
        }
    }

    report
}

/// Validate the shape of a test case records document.
pub fn validate_test_case_records(document: &Value) -> ValidationReport {
    let mut report = structural_report(document, test_case_records_json_schema());
    if !report.is_ok() {
        return report;
    }

    let Some(groups) = document.as_object() else {
        return report;
    };

    for (field, cases) in groups {
        let Some(cases) = cases.as_array() else {
            continue;
        };
        for (idx, case) in cases.iter().enumerate() {
            if case.get("key").is_some() {
                report.push_warning(ValidationIssue::new(
                    IssueSeverity::Warning,
                    "key_overwritten",
                    format!("/{}/{idx}/key", escape_pointer(field)),
                    format!("test case {idx} of field {field} already has a key"),
                    Some("existing keys are replaced with fresh ones".to_string()),
                ));
            }
        }
    }

    report
}

fn structural_report(document: &Value, schema: RootSchema) -> ValidationReport {
    let checked = serde_json::to_value(schema)
        .map_err(Error::from)
        .and_then(|schema| validate_json_schema(document, &schema));

    match checked {
        Ok(report) => report,
        Err(err) => {
            let mut report = ValidationReport::default();
            report.push_error(ValidationIssue::new(
                IssueSeverity::Error,
                "schema_validation_error",
                "/",
                err.to_string(),
                None,
            ));
            report
        }
    }
}

fn normalized_json_pointer(pointer: &str) -> String {
    if pointer.is_empty() {
        "/".to_string()
    } else {
        pointer.to_string()
    }
}

fn escape_pointer(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn field() -> Value {
        json!({
            "data_type": "string",
            "mandatory_field": true,
            "from_source": "CRM",
            "primary_key": false,
            "required_for_deployment": true,
            "deployment_validation": false,
            "business_rules": "Mandatory, only alphabets"
        })
    }

    fn codes(issues: &[ValidationIssue]) -> Vec<&str> {
        issues.iter().map(|issue| issue.code.as_str()).collect()
    }

    #[test]
    fn accepts_complete_rule_store() {
        let document = json!({ "customer": { "fields": { "first_name": field() } } });
        let report = validate_rule_store(&document);
        assert!(report.is_ok(), "unexpected errors: {report}");
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn keeps_unknown_attributes_valid() {
        let mut spec = field();
        spec["sheet_row"] = json!(12);
        let document = json!({ "customer": { "fields": { "first_name": spec } } });
        assert!(validate_rule_store(&document).is_ok());
    }

    #[test]
    fn rejects_non_object_and_empty_rule_store() {
        let report = validate_rule_store(&json!(["customer"]));
        assert_eq!(codes(&report.errors), ["schema_violation"]);
        assert_eq!(report.errors[0].path, "/");

        let report = validate_rule_store(&json!({}));
        assert_eq!(codes(&report.errors), ["rules_empty"]);
        assert_eq!(report.errors[0].message, "no rules to validate");
    }

    #[test]
    fn reports_missing_fields_with_parent_path() {
        let document = json!({
            "customer": { "fields": { "first_name": field() } },
            "address": { "description": "no fields here" }
        });
        let report = validate_rule_store(&document);
        assert_eq!(codes(&report.errors), ["schema_violation"]);
        assert_eq!(report.errors[0].path, "/address");
        assert!(report.errors[0].message.contains("fields"));
    }

    #[test]
    fn reports_every_missing_attribute() {
        let mut spec = field();
        let spec_map = spec.as_object_mut().expect("object");
        spec_map.remove("primary_key");
        spec_map.remove("business_rules");
        let document = json!({ "customer": { "fields": { "first_name": spec } } });

        let report = validate_rule_store(&document);
        assert_eq!(report.errors.len(), 2);
        assert!(
            report
                .errors
                .iter()
                .all(|issue| issue.path == "/customer/fields/first_name")
        );
        for attribute in ["primary_key", "business_rules"] {
            assert!(
                report
                    .errors
                    .iter()
                    .any(|issue| issue.message.contains(attribute)),
                "no issue names {attribute}"
            );
        }
    }

    #[test]
    fn reports_wrong_attribute_types() {
        let mut spec = field();
        spec["mandatory_field"] = json!("yes");
        spec["from_source"] = json!(3);
        spec["constraints"] = json!(["Mandatory", 4]);
        let document = json!({ "customer": { "fields": { "first_name": spec } } });

        let report = validate_rule_store(&document);
        let mut paths: Vec<_> = report.errors.iter().map(|issue| issue.path.as_str()).collect();
        paths.sort_unstable();
        paths.dedup();
        assert_eq!(
            paths,
            [
                "/customer/fields/first_name/constraints/1",
                "/customer/fields/first_name/from_source",
                "/customer/fields/first_name/mandatory_field",
            ]
        );
    }

    #[test]
    fn schema_requires_every_original_attribute() {
        let schema = serde_json::to_value(rule_store_json_schema()).expect("encode schema");
        let required: Vec<_> = schema["definitions"]["FieldSpec"]["required"]
            .as_array()
            .expect("required list")
            .iter()
            .filter_map(Value::as_str)
            .collect();
        for attribute in REQUIRED_FIELD_ATTRIBUTES {
            assert!(required.contains(&attribute), "{attribute} not required");
        }
        assert!(!required.contains(&"constraints"));
    }

    #[test]
    fn warns_on_empty_parents_and_shared_field_names() {
        let document = json!({
            "customer": { "fields": { "id": field() } },
            "account": { "fields": { "id": field() } },
            "notes": { "fields": {} }
        });
        let report = validate_rule_store(&document);
        assert!(report.is_ok());
        assert_eq!(codes(&report.warnings), ["field_name_shared", "fields_empty"]);
        assert_eq!(report.warnings[0].path, "/account/fields/id");
        assert!(report.warnings[0].message.contains("customer"));
    }

    #[test]
    fn records_must_be_objects_in_lists() {
        let document = json!({
            "first_name": [{ "test_case": "valid" }, 4],
            "last_name": { "test_case": "not a list" }
        });
        let report = validate_test_case_records(&document);
        let mut paths: Vec<_> = report.errors.iter().map(|issue| issue.path.as_str()).collect();
        paths.sort_unstable();
        assert_eq!(paths, ["/first_name/1", "/last_name"]);
        assert!(report.errors.iter().all(|issue| issue.code == "schema_violation"));
    }

    #[test]
    fn warns_when_keys_will_be_replaced() {
        let document = json!({ "first_name": [{ "test_case": "valid", "key": "abc" }] });
        let report = validate_test_case_records(&document);
        assert!(report.is_ok());
        assert_eq!(codes(&report.warnings), ["key_overwritten"]);
        assert_eq!(report.warnings[0].path, "/first_name/0/key");
    }

    #[test]
    fn uncompilable_schema_is_reported() {
        let err = validate_json_schema(&json!({}), &json!({ "type": 12 }))
            .expect_err("invalid schema");
        assert!(matches!(err, Error::Schema(_)));
    }
}
