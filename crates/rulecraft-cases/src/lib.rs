//! Test case stages: generation from enriched rules and unique key assignment.

pub mod errors;
pub mod generate;
pub mod keys;

pub use errors::{CasesError, GenerationError};
pub use generate::{
    DEFAULT_TEST_CASE_TOKENS, FailedField, GenerateOptions, GenerationOutcome, GenerationReport,
    TestCaseGenerator, build_test_case_prompt, generate_test_cases_file, parse_test_cases,
};
pub use keys::{KeyReport, add_unique_keys, assign_keys};
