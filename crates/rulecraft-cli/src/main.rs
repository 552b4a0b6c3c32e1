mod commands;
mod logging;
mod settings;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use rulecraft_cases::CasesError;
use rulecraft_core::Error as CoreError;
use rulecraft_enrich::EnrichError;
use rulecraft_llm::LlmError;
use thiserror::Error;
use uuid::Uuid;

use commands::{cmd_add_keys, cmd_enrich, cmd_generate, cmd_run, cmd_schema, cmd_validate, connect};
use logging::init_logging;
use settings::{Settings, SettingsError, load_or_create_settings};

#[derive(Debug, Error)]
enum CliError {
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("enrichment failed: {0}")]
    Enrich(#[from] EnrichError),
    #[error("test case stage failed: {0}")]
    Cases(#[from] CasesError),
    #[error("llm error: {0}")]
    Llm(LlmError),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("logging error: {0}")]
    Logging(String),
}

#[derive(Parser, Debug)]
#[command(name = "rulecraft", version, about = "Business rules to keyed test cases")]
struct Cli {
    /// Settings file; created with defaults when missing.
    #[arg(long, global = true, default_value = "config/settings.toml")]
    config: PathBuf,
    /// Increase stderr log verbosity (-v info, -vv debug).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check the shape of a rule store.
    Validate(ValidateArgs),
    /// Extract constraints for every field of a rule store.
    Enrich(StageArgs),
    /// Generate test cases from (enriched) rules.
    Generate(GenerateArgs),
    /// Attach a unique key to every generated test case.
    AddKeys(StageArgs),
    /// Run validate, enrich, generate and add-keys in sequence.
    Run(RunArgs),
    /// Print the JSON Schema of rule store documents.
    Schema,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// Rule store to check; defaults to `paths.processed_rules_file`.
    #[arg(long)]
    rules: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct StageArgs {
    /// Input document; defaults to the stage's input from settings.
    #[arg(long)]
    input: Option<PathBuf>,
    /// Output document; defaults to the stage's output from settings.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Rule store to generate from; defaults to `paths.constraints_processed_rules_file`.
    #[arg(long)]
    rules: Option<PathBuf>,
    /// Output document; defaults to `paths.generated_test_cases_file`.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Generate test cases straight from the processed rules.
    #[arg(long, default_value_t = false)]
    skip_enrich: bool,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    if let Command::Schema = cli.command {
        return cmd_schema();
    }

    let settings = load_or_create_settings(&cli.config)?;
    let log_path = init_logging(&settings.paths.logs_dir, cli.verbose)?;

    let run_id = Uuid::new_v4().to_string();
    let command = format!("{:?}", cli.command);
    tracing::info!(
        event = "run_started",
        run_id = %run_id,
        command = %command,
        config = %cli.config.display(),
        log = %log_path.display()
    );
    let timer = Instant::now();

    let result = dispatch(cli.command, &settings).await;

    let duration_ms = timer.elapsed().as_millis() as u64;
    match &result {
        Ok(()) => tracing::info!(event = "run_finished", status = "success", duration_ms),
        Err(err) => tracing::error!(
            event = "run_finished",
            status = "failed",
            duration_ms,
            error = %err
        ),
    }

    result
}

async fn dispatch(command: Command, settings: &Settings) -> Result<(), CliError> {
    let paths = &settings.paths;
    match command {
        Command::Validate(args) => {
            cmd_validate(&args.rules.unwrap_or_else(|| paths.processed_rules_file.clone()))
        }
        Command::Enrich(args) => {
            let client = connect(settings)?;
            let input = args
                .input
                .unwrap_or_else(|| paths.processed_rules_file.clone());
            let output = args
                .output
                .unwrap_or_else(|| paths.constraints_processed_rules_file.clone());
            cmd_enrich(settings, &client, &input, &output).await
        }
        Command::Generate(args) => {
            let client = connect(settings)?;
            let rules = args
                .rules
                .unwrap_or_else(|| paths.constraints_processed_rules_file.clone());
            let output = args
                .output
                .unwrap_or_else(|| paths.generated_test_cases_file.clone());
            cmd_generate(settings, &client, &rules, &output).await
        }
        Command::AddKeys(args) => {
            let input = args
                .input
                .unwrap_or_else(|| paths.generated_test_cases_file.clone());
            let output = args
                .output
                .unwrap_or_else(|| paths.test_case_keys_file.clone());
            cmd_add_keys(&input, &output)
        }
        Command::Run(args) => cmd_run(settings, args.skip_enrich).await,
        Command::Schema => cmd_schema(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_reads_rules_option() {
        let cli = Cli::try_parse_from([
            "rulecraft",
            "generate",
            "--rules",
            "data/custom_rules.json",
            "--output",
            "data/cases.json",
        ])
        .expect("parse args");

        match cli.command {
            Command::Generate(args) => {
                assert_eq!(args.rules, Some(PathBuf::from("data/custom_rules.json")));
                assert_eq!(args.output, Some(PathBuf::from("data/cases.json")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn generate_rejects_input_option() {
        assert!(Cli::try_parse_from(["rulecraft", "generate", "--input", "rules.json"]).is_err());
    }
}
