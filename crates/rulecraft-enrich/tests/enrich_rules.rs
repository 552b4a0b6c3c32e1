use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use rulecraft_core::{Error as CoreError, RuleStore};
use rulecraft_enrich::{EnrichError, EnrichOptions, RuleEnricher, enrich_rules_file};
use rulecraft_llm::{LlmError, RetryPolicy, TextGenerator};
use serde_json::{Value, json};

/// Answers by field name and records every prompt it receives.
struct StubGenerator {
    model: String,
    answers: Vec<(&'static str, Result<String, LlmError>)>,
    prompts: Mutex<Vec<String>>,
}

impl StubGenerator {
    fn new(answers: Vec<(&'static str, Result<String, LlmError>)>) -> Self {
        Self {
            model: "stub-model".to_string(),
            answers,
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.prompts.lock().expect("prompts lock").len()
    }
}

#[async_trait]
impl TextGenerator for StubGenerator {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, max_output_tokens: u32) -> Result<String, LlmError> {
        assert_eq!(max_output_tokens, 200);
        self.prompts
            .lock()
            .expect("prompts lock")
            .push(prompt.to_string());
        self.answers
            .iter()
            .find(|(field, _)| prompt.contains(&format!("'{field}'")))
            .map(|(_, answer)| answer.clone())
            .unwrap_or_else(|| Err(LlmError::InvalidResponse("unexpected prompt".to_string())))
    }
}

fn field(data_type: &str, business_rules: &str) -> Value {
    json!({
        "data_type": data_type,
        "mandatory_field": true,
        "from_source": "CRM",
        "primary_key": false,
        "required_for_deployment": true,
        "deployment_validation": false,
        "business_rules": business_rules
    })
}

fn sample_rules() -> Value {
    json!({
        "customer": {
            "fields": {
                "first_name": field("string", "Mandatory, No Special Characters, Only Alphabets"),
                "birth_date": field("date", "Must be in the past")
            }
        },
        "account": {
            "fields": {
                "account_id": field("integer", "Unique positive number")
            }
        }
    })
}

fn options() -> EnrichOptions {
    EnrichOptions {
        retry: RetryPolicy::none(),
        ..EnrichOptions::default()
    }
}

fn temp_dir(label: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push(format!("rulecraft_enrich_{label}_{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn write_rules(dir: &Path, rules: &Value) -> PathBuf {
    let path = dir.join("processed_rules.json");
    fs::write(&path, serde_json::to_vec_pretty(rules).expect("encode rules")).expect("write rules");
    path
}

fn all_answered() -> StubGenerator {
    StubGenerator::new(vec![
        (
            "first_name",
            Ok("```Mandatory, No Special Characters, Only Alphabets```".to_string()),
        ),
        ("birth_date", Ok("Mandatory, Past Date".to_string())),
        ("account_id", Ok("Unique, Positive".to_string())),
    ])
}

#[tokio::test]
async fn enrichment_preserves_attributes_and_adds_constraints() {
    let rules = RuleStore::from_value(sample_rules()).expect("decode rules");
    let generator = all_answered();

    let outcome = RuleEnricher::new(&generator, &options())
        .enrich(&rules)
        .await
        .expect("enrich");

    let original = sample_rules();
    let enriched = serde_json::to_value(&outcome.rules).expect("encode enriched");
    for (parent, details) in original.as_object().expect("object") {
        for (name, spec) in details["fields"].as_object().expect("fields") {
            let mut enriched_spec = enriched[parent]["fields"][name]
                .as_object()
                .cloned()
                .expect("enriched field");
            assert!(enriched_spec.remove("constraints").is_some());
            assert_eq!(&Value::Object(enriched_spec), spec, "{parent}.{name} changed");
        }
    }

    assert_eq!(
        enriched["customer"]["fields"]["first_name"]["constraints"],
        json!(["Mandatory", "No Special Characters", "Only Alphabets"])
    );
    assert!(outcome.report.is_complete());
    assert_eq!(outcome.report.fields_enriched, 3);
    assert_eq!(outcome.report.model, "stub-model");
}

#[tokio::test]
async fn enrichment_calls_model_once_per_field_in_order() {
    let rules = RuleStore::from_value(sample_rules()).expect("decode rules");
    let generator = all_answered();

    let outcome = RuleEnricher::new(&generator, &options())
        .enrich(&rules)
        .await
        .expect("enrich");

    let prompts = generator.prompts.lock().expect("prompts lock").clone();
    assert_eq!(prompts.len(), 3);
    assert!(prompts[0].contains("'first_name'"));
    assert!(prompts[1].contains("'birth_date'"));
    assert!(prompts[2].contains("'account_id'"));

    let order: Vec<_> = outcome
        .rules
        .iter_fields()
        .map(|(parent, field, _)| format!("{parent}.{field}"))
        .collect();
    assert_eq!(
        order,
        ["customer.first_name", "customer.birth_date", "account.account_id"]
    );
}

#[tokio::test]
async fn failed_field_degrades_to_empty_constraints() {
    let rules = RuleStore::from_value(sample_rules()).expect("decode rules");
    let generator = StubGenerator::new(vec![
        ("first_name", Ok("Mandatory, Only Alphabets".to_string())),
        (
            "birth_date",
            Err(LlmError::Request("connection reset".to_string())),
        ),
        ("account_id", Ok("Unique".to_string())),
    ]);

    let outcome = RuleEnricher::new(&generator, &options())
        .enrich(&rules)
        .await
        .expect("enrich");

    let customer = &outcome.rules.parents["customer"].fields;
    assert_eq!(
        customer["first_name"].constraints.as_deref(),
        Some(&["Mandatory".to_string(), "Only Alphabets".to_string()][..])
    );
    assert_eq!(customer["birth_date"].constraints.as_deref(), Some(&[][..]));
    assert_eq!(
        outcome.rules.parents["account"].fields["account_id"]
            .constraints
            .as_deref(),
        Some(&["Unique".to_string()][..])
    );

    assert_eq!(outcome.report.unresolved.len(), 1);
    assert_eq!(outcome.report.unresolved[0].parent, "customer");
    assert_eq!(outcome.report.unresolved[0].field, "birth_date");
    assert_eq!(outcome.report.fields_enriched, 2);
}

#[tokio::test]
async fn blank_model_answer_is_unresolved() {
    let rules = RuleStore::from_value(json!({
        "customer": { "fields": { "first_name": field("string", "Anything") } }
    }))
    .expect("decode rules");
    let generator = StubGenerator::new(vec![("first_name", Ok("``` , ```".to_string()))]);

    let outcome = RuleEnricher::new(&generator, &options())
        .enrich(&rules)
        .await
        .expect("enrich");

    assert_eq!(outcome.report.unresolved.len(), 1);
    assert!(outcome.report.unresolved[0].message.contains("no constraints"));
}

#[tokio::test]
async fn retry_policy_recovers_transient_failures() {
    struct FlakyGenerator {
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl TextGenerator for FlakyGenerator {
        fn model(&self) -> &str {
            "flaky"
        }

        async fn generate(&self, _prompt: &str, _max: u32) -> Result<String, LlmError> {
            let mut calls = self.calls.lock().expect("calls lock");
            *calls += 1;
            if *calls == 1 {
                Err(LlmError::RateLimited("quota".to_string()))
            } else {
                Ok("Mandatory".to_string())
            }
        }
    }

    let rules = RuleStore::from_value(json!({
        "customer": { "fields": { "first_name": field("string", "Mandatory") } }
    }))
    .expect("decode rules");
    let generator = FlakyGenerator {
        calls: Mutex::new(0),
    };
    let options = EnrichOptions {
        retry: RetryPolicy {
            max_attempts: 2,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        },
        ..EnrichOptions::default()
    };

    let outcome = RuleEnricher::new(&generator, &options)
        .enrich(&rules)
        .await
        .expect("enrich");

    assert!(outcome.report.is_complete());
    assert_eq!(*generator.calls.lock().expect("calls lock"), 2);
}

#[tokio::test]
async fn enrich_rules_file_writes_enriched_document() {
    let dir = temp_dir("file");
    let input = write_rules(&dir, &sample_rules());
    let output = dir.join("out/constraints_processed_rules.json");
    let generator = all_answered();

    let report = enrich_rules_file(&generator, &options(), &input, &output)
        .await
        .expect("enrich file");

    assert!(report.is_complete());
    let written: Value =
        serde_json::from_str(&fs::read_to_string(&output).expect("read output")).expect("parse");
    assert_eq!(
        written["account"]["fields"]["account_id"]["constraints"],
        json!(["Unique", "Positive"])
    );
    let parents: Vec<_> = written.as_object().expect("object").keys().cloned().collect();
    assert_eq!(parents, ["customer", "account"]);
}

#[tokio::test]
async fn missing_fields_abort_before_any_model_call() {
    let dir = temp_dir("shape");
    let mut rules = sample_rules();
    rules["account"] = json!({ "description": "no fields" });
    let input = write_rules(&dir, &rules);
    let output = dir.join("constraints_processed_rules.json");
    let generator = all_answered();

    let err = enrich_rules_file(&generator, &options(), &input, &output)
        .await
        .expect_err("shape error");

    match err {
        EnrichError::Core(CoreError::Shape { report, .. }) => {
            assert_eq!(report.errors[0].code, "schema_violation");
            assert_eq!(report.errors[0].path, "/account");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(generator.calls(), 0);
    assert!(!output.exists());
}

#[tokio::test]
async fn unwritable_output_fails_loudly() {
    let dir = temp_dir("unwritable");
    let input = write_rules(&dir, &sample_rules());
    // A directory squats on the output path, so the final rename fails.
    let output = dir.join("taken");
    fs::create_dir_all(output.join("child")).expect("create blocking dir");
    let generator = all_answered();

    let err = enrich_rules_file(&generator, &options(), &input, &output)
        .await
        .expect_err("write must fail");

    assert!(matches!(err, EnrichError::Core(CoreError::Persistence { .. })));
}

#[tokio::test]
async fn rejected_credential_aborts_without_output() {
    let dir = temp_dir("rejected");
    let input = write_rules(&dir, &sample_rules());
    let output = dir.join("constraints_processed_rules.json");
    let generator = StubGenerator::new(vec![
        (
            "first_name",
            Err(LlmError::Configuration("gemini rejected the api key".to_string())),
        ),
        ("birth_date", Ok("Mandatory".to_string())),
        ("account_id", Ok("Unique".to_string())),
    ]);

    let err = enrich_rules_file(&generator, &options(), &input, &output)
        .await
        .expect_err("configuration error");

    assert!(matches!(err, EnrichError::Configuration(_)));
    assert_eq!(generator.calls(), 1);
    assert!(!output.exists());
}

#[tokio::test]
async fn blank_answer_is_retried() {
    let rules = RuleStore::from_value(json!({
        "customer": { "fields": { "first_name": field("string", "Anything") } }
    }))
    .expect("decode rules");
    let generator = StubGenerator::new(vec![("first_name", Ok("```text\n```".to_string()))]);
    let options = EnrichOptions {
        retry: RetryPolicy {
            max_attempts: 3,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        },
        ..EnrichOptions::default()
    };

    let outcome = RuleEnricher::new(&generator, &options)
        .enrich(&rules)
        .await
        .expect("enrich");

    assert_eq!(generator.calls(), 3);
    assert_eq!(outcome.report.unresolved.len(), 1);
}

#[tokio::test]
async fn blank_model_identifier_is_a_configuration_error() {
    let dir = temp_dir("config");
    let input = write_rules(&dir, &sample_rules());
    let output = dir.join("constraints_processed_rules.json");
    let mut generator = all_answered();
    generator.model = " ".to_string();

    let err = enrich_rules_file(&generator, &options(), &input, &output)
        .await
        .expect_err("configuration error");

    assert!(matches!(err, EnrichError::Configuration(_)));
    assert_eq!(generator.calls(), 0);
}
