use rulecraft_core::normalize_constraints;
use rulecraft_llm::TextGenerator;

use crate::errors::ExtractionError;

/// Output token budget for a single constraint extraction.
pub const DEFAULT_CONSTRAINT_TOKENS: u32 = 200;

/// Prompt asking the model for the constraints of one field.
pub fn build_constraint_prompt(field: &str, data_type: &str, business_rules: &str) -> String {
    format!(
        "Based on the field '{field}' of type '{data_type}' and the business rules \
         '{business_rules}', extract the constraints that apply to this field.\n\
         List the constraints only, separated by commas. Do not include a header or any \
         information about the field name.\n\
         For example, the constraints for First Name would be written as:\n\
         Mandatory, No Special Characters, Only Alphabets"
    )
}

/// Turns one field's business rules into a constraint list with a single model call.
pub struct ConstraintExtractor<'a> {
    generator: &'a dyn TextGenerator,
    max_output_tokens: u32,
}

impl<'a> ConstraintExtractor<'a> {
    pub fn new(generator: &'a dyn TextGenerator) -> Self {
        Self {
            generator,
            max_output_tokens: DEFAULT_CONSTRAINT_TOKENS,
        }
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn model(&self) -> &str {
        self.generator.model()
    }

    pub async fn extract(
        &self,
        field: &str,
        data_type: &str,
        business_rules: &str,
    ) -> Result<Vec<String>, ExtractionError> {
        let prompt = build_constraint_prompt(field, data_type, business_rules);
        let raw = self
            .generator
            .generate(&prompt, self.max_output_tokens)
            .await
            .map_err(|source| ExtractionError::Model {
                field: field.to_string(),
                source,
            })?;

        let constraints = normalize_constraints(&raw);
        if constraints.is_empty() {
            return Err(ExtractionError::Empty {
                field: field.to_string(),
            });
        }
        Ok(constraints)
    }
}
