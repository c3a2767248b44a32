//! Prompt assembly: retrieved context plus the question, formatted for the generator.

use serde::Serialize;

use crate::config::RagConfig;
use crate::document::SearchResult;
use crate::error::{RagError, Result};

const CONTEXT_PLACEHOLDER: &str = "{context}";
const QUESTION_PLACEHOLDER: &str = "{question}";
const CONTEXT_SEPARATOR: &str = "\n\n";

/// The instruction template used unless a custom one is supplied.
pub const DEFAULT_TEMPLATE: &str = "\
You are an assistant for question-answering tasks. \
Use only the following pieces of retrieved context to answer the question. \
If the context does not contain the answer, say that you don't know. \
Keep the answer concise.

Context:
{context}

Question: {question}

Answer:";

/// A formatted prompt ready for the generator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prompt {
    /// The complete prompt text.
    pub text: String,
    /// The context section that was inserted.
    pub context: String,
    /// Positions, in the input results, of the chunks placed in the context.
    pub kept: Vec<usize>,
    /// How many retrieved chunks were dropped to fit the context budget.
    pub dropped: usize,
}

/// Joins retrieved chunks into a bounded context and merges it with the question.
///
/// When the joined context would exceed `max_context_chars`, whole chunks
/// are dropped starting from the lowest score. Chunk text is never cut.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    template: String,
    max_context_chars: usize,
}

impl Prompt {
    /// Number of chunks placed in the context.
    pub fn included(&self) -> usize {
        self.kept.len()
    }
}

impl PromptAssembler {
    /// Create an assembler with [`DEFAULT_TEMPLATE`].
    pub fn new(max_context_chars: usize) -> Self {
        Self { template: DEFAULT_TEMPLATE.to_string(), max_context_chars }
    }

    /// Create an assembler with the context budget from `config`.
    pub fn from_config(config: &RagConfig) -> Self {
        Self::new(config.max_context_chars)
    }

    /// Replace the instruction template.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigurationError`] unless the template contains
    /// both `{context}` and `{question}`.
    pub fn with_template(mut self, template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        for placeholder in [CONTEXT_PLACEHOLDER, QUESTION_PLACEHOLDER] {
            if !template.contains(placeholder) {
                return Err(RagError::ConfigurationError(format!(
                    "prompt template must contain {placeholder}"
                )));
            }
        }
        self.template = template;
        Ok(self)
    }

    /// Build the prompt for `question` from `results` in the order given.
    pub fn assemble(&self, question: &str, results: &[SearchResult]) -> Prompt {
        let mut kept: Vec<usize> = (0..results.len()).collect();
        let mut length = joined_len(results, &kept);

        while length > self.max_context_chars {
            // Lowest score goes first; among equal scores the later one.
            let Some(victim) = kept
                .iter()
                .enumerate()
                .min_by(|(ia, a), (ib, b)| {
                    results[**a]
                        .score
                        .partial_cmp(&results[**b].score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then(ib.cmp(ia))
                })
                .map(|(slot, _)| slot)
            else {
                break;
            };
            kept.remove(victim);
            length = joined_len(results, &kept);
        }

        let context = kept
            .iter()
            .map(|&i| results[i].chunk.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);

        Prompt {
            text: render(&self.template, &context, question),
            dropped: results.len() - kept.len(),
            kept,
            context,
        }
    }
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::from_config(&RagConfig::default())
    }
}

fn joined_len(results: &[SearchResult], kept: &[usize]) -> usize {
    let text: usize = kept.iter().map(|&i| results[i].chunk.text.chars().count()).sum();
    text + CONTEXT_SEPARATOR.len() * kept.len().saturating_sub(1)
}

/// Substitute both placeholders in a single pass so that inserted text is
/// never itself scanned for placeholders.
fn render(template: &str, context: &str, question: &str) -> String {
    let mut out = String::with_capacity(template.len() + context.len() + question.len());
    let mut rest = template;
    loop {
        let next_context = rest.find(CONTEXT_PLACEHOLDER).map(|i| (i, CONTEXT_PLACEHOLDER, context));
        let next_question =
            rest.find(QUESTION_PLACEHOLDER).map(|i| (i, QUESTION_PLACEHOLDER, question));
        let next = match (next_context, next_question) {
            (Some(c), Some(q)) => Some(if c.0 <= q.0 { c } else { q }),
            (c, q) => c.or(q),
        };
        let Some((at, placeholder, value)) = next else {
            out.push_str(rest);
            return out;
        };
        out.push_str(&rest[..at]);
        out.push_str(value);
        rest = &rest[at + placeholder.len()..];
    }
}
