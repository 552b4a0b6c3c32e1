use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use rulecraft_core::{
    FieldSpec, RuleStore, TestCase, TestCaseRecords, join_constraints, load_rule_store,
    write_json_atomic,
};
use rulecraft_llm::{RetryPolicy, TextGenerator};

use crate::errors::{CasesError, GenerationError};

/// Output token budget for one field's test cases.
pub const DEFAULT_TEST_CASE_TOKENS: u32 = 1000;

/// Options for a generation run.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub max_output_tokens: u32,
    pub retry: RetryPolicy,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            max_output_tokens: DEFAULT_TEST_CASE_TOKENS,
            retry: RetryPolicy::default(),
        }
    }
}

/// Summary of a generation run.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub model: String,
    pub fields_total: usize,
    pub test_cases: usize,
    pub failed_fields: Vec<FailedField>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FailedField {
    pub parent: String,
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub records: TestCaseRecords,
    pub report: GenerationReport,
}

/// Prompt asking the model for test cases of one field.
pub fn build_test_case_prompt(field: &str, spec: &FieldSpec) -> String {
    let constraints = match spec.constraints.as_deref() {
        Some(list) if !list.is_empty() => join_constraints(list),
        _ => "none extracted".to_string(),
    };

    format!(
        "Write test cases for the field '{field}' of type '{data_type}'.\n\
         Business rules: {rules}\n\
         Constraints: {constraints}\n\
         Mandatory: {mandatory}. Primary key: {primary_key}.\n\
         Cover valid values and every constraint violation.\n\
         Respond with a JSON array only. Each element is an object with the keys \
         \"test_case\", \"input_value\", \"expected_result\" and \"type\" \
         (\"positive\" or \"negative\").",
        data_type = spec.data_type,
        rules = spec.business_rules,
        mandatory = spec.mandatory_field,
        primary_key = spec.primary_key,
    )
}

/// Parse a model response into test case objects.
///
/// Accepts fenced output and prose around the array; the outermost `[...]`
/// must hold only json objects.
pub fn parse_test_cases(field: &str, raw: &str) -> Result<Vec<TestCase>, GenerationError> {
    let parse_error = |message: String| GenerationError::Parse {
        field: field.to_string(),
        message,
    };

    let (start, end) = match (raw.find('['), raw.rfind(']')) {
        (Some(start), Some(end)) if start < end => (start, end),
        _ => return Err(parse_error("response has no json array".to_string())),
    };

    let items: Vec<Value> =
        serde_json::from_str(&raw[start..=end]).map_err(|err| parse_error(err.to_string()))?;
    if items.is_empty() {
        return Err(parse_error("response array is empty".to_string()));
    }

    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| match item {
            Value::Object(attributes) => Ok(TestCase::new(attributes)),
            _ => Err(parse_error(format!("element {idx} is not an object"))),
        })
        .collect()
}

/// Asks the model for test cases field by field.
pub struct TestCaseGenerator<'a> {
    generator: &'a dyn TextGenerator,
    options: GenerateOptions,
}

impl<'a> TestCaseGenerator<'a> {
    pub fn new(generator: &'a dyn TextGenerator, options: &GenerateOptions) -> Self {
        Self {
            generator,
            options: options.clone(),
        }
    }

    async fn generate_field(
        &self,
        field: &str,
        spec: &FieldSpec,
    ) -> Result<Vec<TestCase>, GenerationError> {
        let prompt = build_test_case_prompt(field, spec);
        let raw = self
            .generator
            .generate(&prompt, self.options.max_output_tokens)
            .await
            .map_err(|source| GenerationError::Model {
                field: field.to_string(),
                source,
            })?;
        parse_test_cases(field, &raw)
    }

    /// Generate test cases for every field, grouped by field name in stored order.
    ///
    /// A field that fails keeps an empty group and is listed in the report; a
    /// rejected credential aborts the run. Fields sharing a name under different
    /// parents share one group, in parent order.
    pub async fn generate(&self, rules: &RuleStore) -> Result<GenerationOutcome, CasesError> {
        let started_at = Utc::now();
        let mut records = TestCaseRecords::default();
        let mut failed_fields = Vec::new();

        info!(
            event = "generation_started",
            model = %self.generator.model(),
            fields = rules.field_count()
        );

        for (parent, field, spec) in rules.iter_fields() {
            let label = format!("{parent}.{field}");
            let result = self
                .options
                .retry
                .run(&label, move || self.generate_field(field, spec))
                .await;

            match result {
                Err(err) if err.is_configuration() => {
                    error!(
                        event = "generation_aborted",
                        parent = %parent,
                        field = %field,
                        error = %err
                    );
                    return Err(CasesError::Configuration(err.to_string()));
                }
                Ok(cases) => {
                    debug!(
                        event = "field_generated",
                        parent = %parent,
                        field = %field,
                        test_cases = cases.len()
                    );
                    records.extend(field, cases);
                }
                Err(err) => {
                    warn!(
                        event = "field_generation_failed",
                        parent = %parent,
                        field = %field,
                        error = %err
                    );
                    failed_fields.push(FailedField {
                        parent: parent.to_string(),
                        field: field.to_string(),
                        message: err.to_string(),
                    });
                    records.extend(field, Vec::new());
                }
            }
        }

        let report = GenerationReport {
            started_at,
            finished_at: Utc::now(),
            model: self.generator.model().to_string(),
            fields_total: rules.field_count(),
            test_cases: records.record_count(),
            failed_fields,
        };

        info!(
            event = "generation_finished",
            test_cases = report.test_cases,
            failed = report.failed_fields.len()
        );

        Ok(GenerationOutcome { records, report })
    }
}

/// Load enriched (or plain) rules, generate test cases and persist them.
pub async fn generate_test_cases_file(
    generator: &dyn TextGenerator,
    options: &GenerateOptions,
    rules_path: &Path,
    output: &Path,
) -> Result<GenerationReport, CasesError> {
    if generator.model().trim().is_empty() {
        return Err(CasesError::Configuration(
            "no model identifier configured".to_string(),
        ));
    }

    let rules = load_rule_store(rules_path).inspect_err(|err| {
        warn!(event = "rules_rejected", path = %rules_path.display(), error = %err);
    })?;

    let outcome = TestCaseGenerator::new(generator, options)
        .generate(&rules)
        .await?;

    write_json_atomic(output, &outcome.records).inspect_err(|err| {
        error!(event = "test_cases_write_failed", path = %output.display(), error = %err);
    })?;
    info!(event = "test_cases_written", path = %output.display());

    Ok(outcome.report)
}
