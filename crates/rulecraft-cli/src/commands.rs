use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;

use rulecraft_cases::{GenerateOptions, add_unique_keys, generate_test_cases_file};
use rulecraft_core::{
    Error as CoreError, ValidationReport, load_rule_store, read_json, rule_store_json_schema,
    validate_rule_store, write_json_atomic,
};
use rulecraft_enrich::{EnrichOptions, enrich_rules_file};
use rulecraft_llm::{GeminiClient, LlmError};

use crate::settings::{LlmProvider, Settings};
use crate::CliError;

/// Build the model client, failing before any stage touches a file or the network.
pub fn connect(settings: &Settings) -> Result<GeminiClient, CliError> {
    if settings.llm.provider == LlmProvider::Off {
        return Err(CliError::Configuration(
            "llm provider is off; set [llm] provider = \"gemini\"".to_string(),
        ));
    }

    GeminiClient::new(&settings.llm.gemini()).map_err(|err| match err {
        LlmError::Configuration(message) => CliError::Configuration(message),
        other => CliError::Llm(other),
    })
}

pub fn cmd_validate(rules: &Path) -> Result<(), CliError> {
    let document = read_json(rules)?;
    let report = validate_rule_store(&document);
    print_report(&report);

    if !report.is_ok() {
        return Err(CoreError::Shape {
            path: rules.to_path_buf(),
            report,
        }
        .into());
    }

    let store = load_rule_store(rules)?;
    println!(
        "rules validated: {} parents, {} fields",
        store.parents.len(),
        store.field_count()
    );
    Ok(())
}

pub async fn cmd_enrich(
    settings: &Settings,
    client: &GeminiClient,
    input: &Path,
    output: &Path,
) -> Result<(), CliError> {
    let options = EnrichOptions {
        max_output_tokens: settings.enrich.max_output_tokens,
        retry: settings.retry.clone(),
    };

    let timer = Instant::now();
    let report = enrich_rules_file(client, &options, input, output).await?;
    write_report(output, &report)?;

    println!(
        "enriched {}/{} fields -> {} ({} ms)",
        report.fields_enriched,
        report.fields_total,
        output.display(),
        timer.elapsed().as_millis()
    );
    for field in &report.unresolved {
        eprintln!(
            "unresolved {}.{}: {}",
            field.parent, field.field, field.message
        );
    }
    Ok(())
}

pub async fn cmd_generate(
    settings: &Settings,
    client: &GeminiClient,
    rules: &Path,
    output: &Path,
) -> Result<(), CliError> {
    let options = GenerateOptions {
        max_output_tokens: settings.generate.max_output_tokens,
        retry: settings.retry.clone(),
    };

    let timer = Instant::now();
    let report = generate_test_cases_file(client, &options, rules, output).await?;
    write_report(output, &report)?;

    println!(
        "generated {} test cases for {} fields -> {} ({} ms)",
        report.test_cases,
        report.fields_total,
        output.display(),
        timer.elapsed().as_millis()
    );
    for field in &report.failed_fields {
        eprintln!("failed {}.{}: {}", field.parent, field.field, field.message);
    }
    Ok(())
}

pub fn cmd_add_keys(input: &Path, output: &Path) -> Result<(), CliError> {
    let report = add_unique_keys(input, output)?;

    println!(
        "keyed {} test cases in {} groups -> {}",
        report.records,
        report.groups,
        output.display()
    );
    if let Some(backup) = &report.backup {
        println!("previous output kept at {}", backup.display());
    }
    Ok(())
}

/// Validate, enrich (unless skipped), generate and key, in that order.
pub async fn cmd_run(settings: &Settings, skip_enrich: bool) -> Result<(), CliError> {
    let paths = &settings.paths;
    let client = connect(settings)?;

    cmd_validate(&paths.processed_rules_file)?;

    let rules_for_generation = if skip_enrich {
        tracing::info!(event = "enrichment_skipped");
        paths.processed_rules_file.clone()
    } else {
        cmd_enrich(
            settings,
            &client,
            &paths.processed_rules_file,
            &paths.constraints_processed_rules_file,
        )
        .await?;
        paths.constraints_processed_rules_file.clone()
    };

    cmd_generate(
        settings,
        &client,
        &rules_for_generation,
        &paths.generated_test_cases_file,
    )
    .await?;

    cmd_add_keys(&paths.generated_test_cases_file, &paths.test_case_keys_file)
}

pub fn cmd_schema() -> Result<(), CliError> {
    let schema = rule_store_json_schema();
    println!("{}", serde_json::to_string_pretty(&schema).map_err(CoreError::from)?);
    Ok(())
}

/// Stage reports live next to their output as `<output>.report.json`.
pub fn report_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".report.json");
    output.with_file_name(name)
}

fn write_report<T: Serialize>(output: &Path, report: &T) -> Result<(), CliError> {
    let path = report_path(output);
    write_json_atomic(&path, report)?;
    tracing::info!(event = "report_written", path = %path.display());
    Ok(())
}

fn print_report(report: &ValidationReport) {
    for issue in &report.errors {
        eprintln!("error {} {}: {}", issue.code, issue.path, issue.message);
        if let Some(hint) = &issue.hint {
            eprintln!("  hint: {hint}");
        }
    }
    for issue in &report.warnings {
        eprintln!("warning {} {}: {}", issue.code, issue.path, issue.message);
        if let Some(hint) = &issue.hint {
            eprintln!("  hint: {hint}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_sits_next_to_output() {
        assert_eq!(
            report_path(Path::new("data/test_case_with_keys.json")),
            PathBuf::from("data/test_case_with_keys.json.report.json")
        );
    }

    #[test]
    fn provider_off_is_a_configuration_error() {
        let mut settings = Settings::default();
        settings.llm.provider = LlmProvider::Off;
        settings.llm.api_key = Some("secret".to_string());

        let err = connect(&settings).expect_err("provider off");
        assert!(matches!(err, CliError::Configuration(_)));
    }

    #[test]
    fn configured_gemini_connects() {
        let mut settings = Settings::default();
        settings.llm.api_key = Some("secret".to_string());
        assert!(connect(&settings).is_ok());
    }
}
