use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::validation::{IssueSeverity, ValidationIssue, ValidationReport, validate_rule_store};

/// Rule store keyed by parent field name, in the order the rules were exported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RuleStore {
    pub parents: IndexMap<String, ParentRule>,
}

/// A parent field grouping the fields that share it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ParentRule {
    pub fields: IndexMap<String, FieldSpec>,
}

/// Validation attributes of a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldSpec {
    pub data_type: String,
    pub mandatory_field: bool,
    pub from_source: BoolOrText,
    pub primary_key: bool,
    pub required_for_deployment: bool,
    pub deployment_validation: BoolOrText,
    /// Free-text business rules as written in the spreadsheet.
    pub business_rules: String,
    /// Discrete constraints extracted from `business_rules`; set by enrichment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Vec<String>>,
    /// Attributes not known to this model, carried through unchanged.
    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: IndexMap<String, Value>,
}

/// Attribute that exports either as a yes/no flag or as free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum BoolOrText {
    Flag(bool),
    Text(String),
}

impl RuleStore {
    /// Validate a raw json document and decode it into a rule store.
    pub fn from_value(document: Value) -> Result<Self, ValidationReport> {
        let report = validate_rule_store(&document);
        if !report.is_ok() {
            return Err(report);
        }

        serde_json::from_value(document).map_err(|err| {
            let mut report = ValidationReport::default();
            report.push_error(ValidationIssue::new(
                IssueSeverity::Error,
                "invalid_rule_store",
                "/",
                err.to_string(),
                None,
            ));
            report
        })
    }

    /// Iterate over `(parent, field, spec)` in stored order.
    pub fn iter_fields(&self) -> impl Iterator<Item = (&str, &str, &FieldSpec)> {
        self.parents.iter().flat_map(|(parent, rule)| {
            rule.fields
                .iter()
                .map(move |(field, spec)| (parent.as_str(), field.as_str(), spec))
        })
    }

    pub fn field_count(&self) -> usize {
        self.parents.values().map(|rule| rule.fields.len()).sum()
    }
}

impl FieldSpec {
    /// Copy of this spec with `constraints` replaced; every other attribute is kept as is.
    pub fn with_constraints(&self, constraints: Vec<String>) -> Self {
        Self {
            constraints: Some(constraints),
            ..self.clone()
        }
    }
}

/// JSON Schema for rule store documents.
pub fn rule_store_json_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(RuleStore)
}
