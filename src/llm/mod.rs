//! Contract for the optional LLM fallback tier.
//!
//! The core never constructs an evaluator; the embedding application hands
//! one to the scanner when a provider is configured. Evaluators return the
//! same result shape parsers do, plus token usage for the scan summary.

use anyhow::Result;

use crate::verdict::{ParseResult, TokenUsage};

/// Structured verdict from the fallback evaluator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmVerdict {
    pub result: ParseResult,
    pub tokens: TokenUsage,
}

/// Fallback evaluator for panes no parser recognizes. Called only when a
/// provider is configured; errors become error verdicts for that pane.
pub trait LlmEvaluator: Send + Sync {
    /// Provider label, for verdict annotation (`anthropic`, `openai`, ...).
    fn provider(&self) -> &str;

    /// Model label, for verdict annotation.
    fn model(&self) -> &str;

    /// Classifies the headered pane content.
    fn evaluate(&self, content: &str) -> Result<LlmVerdict>;
}
