use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::validation::{IssueSeverity, ValidationIssue, ValidationReport, validate_test_case_records};

/// Attribute holding the unique identifier of a test case.
pub const KEY_ATTRIBUTE: &str = "key";

/// A single generated test case; attributes are kept in their original order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct TestCase {
    pub attributes: Map<String, Value>,
}

impl TestCase {
    pub fn new(attributes: Map<String, Value>) -> Self {
        Self { attributes }
    }

    pub fn key(&self) -> Option<&str> {
        self.attributes.get(KEY_ATTRIBUTE).and_then(Value::as_str)
    }

    pub fn set_key(&mut self, key: impl Into<String>) {
        self.attributes
            .insert(KEY_ATTRIBUTE.to_string(), Value::String(key.into()));
    }

    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.attributes.get(attribute)
    }
}

/// Test cases grouped by the field they exercise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct TestCaseRecords {
    pub groups: IndexMap<String, Vec<TestCase>>,
}

impl TestCaseRecords {
    /// Validate a raw json document and decode it into grouped records.
    pub fn from_value(document: Value) -> Result<Self, ValidationReport> {
        let report = validate_test_case_records(&document);
        if !report.is_ok() {
            return Err(report);
        }

        serde_json::from_value(document).map_err(|err| {
            let mut report = ValidationReport::default();
            report.push_error(ValidationIssue::new(
                IssueSeverity::Error,
                "invalid_test_cases",
                "/",
                err.to_string(),
                None,
            ));
            report
        })
    }

    /// Append test cases to a field's group, creating it when absent.
    pub fn extend(&mut self, field: &str, cases: impl IntoIterator<Item = TestCase>) {
        self.groups.entry(field.to_string()).or_default().extend(cases);
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn record_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn iter_records(&self) -> impl Iterator<Item = (&str, &TestCase)> {
        self.groups
            .iter()
            .flat_map(|(field, cases)| cases.iter().map(move |case| (field.as_str(), case)))
    }

    pub fn iter_records_mut(&mut self) -> impl Iterator<Item = &mut TestCase> {
        self.groups.values_mut().flat_map(|cases| cases.iter_mut())
    }

    /// Keys of all records, in document order; records without a key are skipped.
    pub fn keys(&self) -> Vec<&str> {
        self.iter_records().filter_map(|(_, case)| case.key()).collect()
    }
}

/// JSON Schema for test case records documents.
pub fn test_case_records_json_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(TestCaseRecords)
}
