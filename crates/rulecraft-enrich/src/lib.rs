//! Rule enrichment: extracts constraint lists from free-text business rules.

pub mod enricher;
pub mod errors;
pub mod extractor;

pub use enricher::{
    EnrichOptions, EnrichmentOutcome, EnrichmentReport, RuleEnricher, UnresolvedField,
    enrich_rules_file,
};
pub use errors::{EnrichError, ExtractionError};
pub use extractor::{ConstraintExtractor, DEFAULT_CONSTRAINT_TOKENS, build_constraint_prompt};
