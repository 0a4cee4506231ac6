use serde_json::Value;

use crate::model::LoanDecision;

/// Upper bound on carried-over conversation, in characters.
pub const MAX_CONTEXT_CHARS: usize = 2500;

pub const APPROVED_SUFFIX: &str = "again congrats on your approved loan";
pub const DENIED_SUFFIX: &str = "again sorry about the unapproved loan";

const ANSWER_INSTRUCTION: &str = "Provide a concise, direct answer within 800 characters.";

/// Returns the last `max_chars` characters of `text`.
pub fn keep_tail(text: &str, max_chars: usize) -> &str {
    let total = text.chars().count();
    if total <= max_chars {
        return text;
    }
    let start = text
        .char_indices()
        .nth(total - max_chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    &text[start..]
}

pub fn prediction_suffix(prior: Option<LoanDecision>) -> &'static str {
    match prior {
        Some(LoanDecision::Approved) => APPROVED_SUFFIX,
        Some(LoanDecision::Denied) => DENIED_SUFFIX,
        None => "",
    }
}

/// Text form of a stored response: strings verbatim, anything else as compact JSON.
pub fn render_response(response: &Value) -> String {
    match response {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Builds a follow-up prompt that carries at most [`MAX_CONTEXT_CHARS`] of
/// the previous exchange, keeping the most recent part.
pub fn build_followup_prompt(
    prior: Option<LoanDecision>,
    question: &str,
    prior_prompt: &str,
    prior_response: &str,
) -> String {
    let combined = format!("{}{}", prior_prompt, prior_response);
    let context = keep_tail(&combined, MAX_CONTEXT_CHARS);

    format!(
        "Question: {} | Previous Context: {}{} | Instruction: {}",
        question,
        context,
        prediction_suffix(prior),
        ANSWER_INSTRUCTION
    )
}
