//! Grounded answer generation.
//!
//! Retrieves the top-k chunks for a question, stuffs them into a fixed
//! prompt template, and asks the chat model for an answer with no
//! accompanying chat history. Citations come back aligned 1:1 with the
//! retrieved chunks, in retrieval order, carrying the true cosine score.

use anyhow::Result;

use crate::index::VectorIndex;
use crate::llm::{ChatMessage, ChatModel, ChatOptions};
use crate::models::Citation;

/// Prompt template for grounded answers. `{context}` and `{question}` are the
/// only slots; no chat history is sent alongside.
pub const ANSWER_TEMPLATE: &str = "\
Use the provided context to answer the question politely. If you cannot find \
the answer in the context, say that you do not know.

Context:
{context}

Question: {question}

Detailed answer:";

/// Maximum excerpt length (characters) shown per citation.
const EXCERPT_CHARS: usize = 200;

/// A model answer plus the sources it was grounded on.
#[derive(Debug)]
pub struct Answer {
    pub text: String,
    pub citations: Vec<Citation>,
}

/// Fill the template with retrieved context and the user question.
pub fn build_prompt(context: &str, question: &str) -> String {
    ANSWER_TEMPLATE
        .replace("{context}", context)
        .replace("{question}", question)
}

/// Retrieve, prompt, and generate.
///
/// The caller guarantees the index exists and was built from at least one
/// embedded chunk; `top_k` clamps `k` into `[1, len]`. On model failure the
/// error propagates and nothing else happens: the conversation log is only
/// touched by the caller on success.
pub async fn generate_answer(
    model: &dyn ChatModel,
    opts: &ChatOptions,
    index: &VectorIndex,
    question_vec: &[f32],
    question: &str,
    k: usize,
) -> Result<Answer> {
    let hits = index.top_k(question_vec, k);

    let context = hits
        .iter()
        .map(|h| h.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let citations: Vec<Citation> = hits
        .iter()
        .map(|h| Citation {
            source_name: h.chunk.source_name.clone(),
            score: h.score,
            excerpt: h.chunk.text.chars().take(EXCERPT_CHARS).collect(),
        })
        .collect();

    let prompt = build_prompt(&context, question);
    let text = model
        .complete(&[ChatMessage::user(prompt)], opts)
        .await?;

    Ok(Answer { text, citations })
}
