use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use rulecraft_core::{ParentRule, RuleStore, load_rule_store, write_json_atomic};
use rulecraft_llm::{RetryPolicy, TextGenerator};

use crate::errors::EnrichError;
use crate::extractor::{ConstraintExtractor, DEFAULT_CONSTRAINT_TOKENS};

/// Options for an enrichment run.
#[derive(Debug, Clone)]
pub struct EnrichOptions {
    /// Output token budget per extraction call.
    pub max_output_tokens: u32,
    /// Retry policy applied around each field's extraction.
    pub retry: RetryPolicy,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            max_output_tokens: DEFAULT_CONSTRAINT_TOKENS,
            retry: RetryPolicy::default(),
        }
    }
}

/// A field whose constraints could not be extracted; it is written with an empty list.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UnresolvedField {
    pub parent: String,
    pub field: String,
    pub message: String,
}

/// Summary of an enrichment run.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub model: String,
    pub fields_total: usize,
    pub fields_enriched: usize,
    pub unresolved: Vec<UnresolvedField>,
}

impl EnrichmentReport {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Enriched rules together with the run summary.
#[derive(Debug, Clone)]
pub struct EnrichmentOutcome {
    pub rules: RuleStore,
    pub report: EnrichmentReport,
}

/// Walks a rule store and attaches extracted constraints to every field.
pub struct RuleEnricher<'a> {
    extractor: ConstraintExtractor<'a>,
    retry: RetryPolicy,
}

impl<'a> RuleEnricher<'a> {
    pub fn new(generator: &'a dyn TextGenerator, options: &EnrichOptions) -> Self {
        Self {
            extractor: ConstraintExtractor::new(generator)
                .with_max_output_tokens(options.max_output_tokens),
            retry: options.retry.clone(),
        }
    }

    /// Enrich every field in stored order, one model call at a time.
    ///
    /// A field whose extraction fails keeps all its attributes, gets an empty
    /// `constraints` list and is listed in the report. A rejected credential
    /// aborts the whole run instead.
    pub async fn enrich(&self, rules: &RuleStore) -> Result<EnrichmentOutcome, EnrichError> {
        let started_at = Utc::now();
        let fields_total = rules.field_count();
        let mut enriched = RuleStore::default();
        let mut unresolved = Vec::new();

        info!(
            event = "enrichment_started",
            model = %self.extractor.model(),
            parents = rules.parents.len(),
            fields = fields_total
        );

        for (parent, rule) in &rules.parents {
            let mut enriched_rule = ParentRule::default();

            for (field, spec) in &rule.fields {
                let label = format!("{parent}.{field}");
                let result = self
                    .retry
                    .run(&label, move || {
                        self.extractor
                            .extract(field, &spec.data_type, &spec.business_rules)
                    })
                    .await;

                let constraints = match result {
                    Err(err) if err.is_configuration() => {
                        error!(
                            event = "enrichment_aborted",
                            parent = %parent,
                            field = %field,
                            error = %err
                        );
                        return Err(EnrichError::Configuration(err.to_string()));
                    }
                    Ok(constraints) => {
                        debug!(
                            event = "field_enriched",
                            parent = %parent,
                            field = %field,
                            constraints = constraints.len()
                        );
                        constraints
                    }
                    Err(err) => {
                        warn!(
                            event = "field_unresolved",
                            parent = %parent,
                            field = %field,
                            error = %err
                        );
                        unresolved.push(UnresolvedField {
                            parent: parent.clone(),
                            field: field.clone(),
                            message: err.to_string(),
                        });
                        Vec::new()
                    }
                };

                enriched_rule
                    .fields
                    .insert(field.clone(), spec.with_constraints(constraints));
            }

            enriched.parents.insert(parent.clone(), enriched_rule);
        }

        let report = EnrichmentReport {
            started_at,
            finished_at: Utc::now(),
            model: self.extractor.model().to_string(),
            fields_total,
            fields_enriched: fields_total - unresolved.len(),
            unresolved,
        };

        info!(
            event = "enrichment_finished",
            fields = report.fields_total,
            enriched = report.fields_enriched,
            unresolved = report.unresolved.len()
        );

        Ok(EnrichmentOutcome {
            rules: enriched,
            report,
        })
    }
}

/// Load, validate, enrich and persist a rule store.
///
/// Shape errors abort before any model call and leave `output` untouched, as does
/// a credential the model rejects mid-run.
pub async fn enrich_rules_file(
    generator: &dyn TextGenerator,
    options: &EnrichOptions,
    input: &Path,
    output: &Path,
) -> Result<EnrichmentReport, EnrichError> {
    if generator.model().trim().is_empty() {
        return Err(EnrichError::Configuration(
            "no model identifier configured".to_string(),
        ));
    }

    let rules = load_rule_store(input).inspect_err(|err| {
        warn!(event = "rules_rejected", path = %input.display(), error = %err);
    })?;

    let outcome = RuleEnricher::new(generator, options).enrich(&rules).await?;

    write_json_atomic(output, &outcome.rules).inspect_err(|err| {
        error!(event = "enriched_rules_write_failed", path = %output.display(), error = %err);
    })?;
    info!(event = "enriched_rules_written", path = %output.display());

    Ok(outcome.report)
}
