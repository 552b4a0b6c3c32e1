//! Core contracts and helpers for rulecraft.
//!
//! This crate defines the rule store and test case documents, their shape
//! validation, the constraint normalizer, and the json persistence helpers
//! shared by the pipeline stages.

pub mod constraints;
pub mod error;
pub mod persist;
pub mod records;
pub mod rules;
pub mod validation;

use std::path::Path;

pub use constraints::{join_constraints, normalize_constraints};
pub use error::{Error, Result};
pub use persist::{backup_existing, read_json, replace_with_backup, write_json_atomic};
pub use records::{KEY_ATTRIBUTE, TestCase, TestCaseRecords, test_case_records_json_schema};
pub use rules::{BoolOrText, FieldSpec, ParentRule, RuleStore, rule_store_json_schema};
pub use validation::{
    IssueSeverity, REQUIRED_FIELD_ATTRIBUTES, ValidationIssue, ValidationReport,
    validate_json_schema, validate_rule_store, validate_test_case_records,
};

/// Load and shape-check a rule store document.
pub fn load_rule_store(path: &Path) -> Result<RuleStore> {
    let document = read_json(path)?;
    RuleStore::from_value(document).map_err(|report| Error::Shape {
        path: path.to_path_buf(),
        report,
    })
}

/// Load and shape-check a test case records document.
pub fn load_test_cases(path: &Path) -> Result<TestCaseRecords> {
    let document = read_json(path)?;
    TestCaseRecords::from_value(document).map_err(|report| Error::Shape {
        path: path.to_path_buf(),
        report,
    })
}
