mod llm;

pub use llm::{html_to_text, LlmExtractor};

use crate::convocatoria::SchemaDescription;

/// What an [`Extractor`] returns for one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// JSON text, expected to be an array of candidate records.
    Success(String),
    /// Human readable reason the page could not be extracted.
    Failure(String),
}

/// Retrieves a page and extracts candidate records from it against `schema`.
#[async_trait::async_trait]
pub trait Extractor {
    async fn extract(
        &self,
        url: &str,
        instruction: &str,
        schema: &SchemaDescription,
    ) -> Outcome;
}
