//! Pulls a JSON value out of a free-text model reply.
//!
//! Models are asked to answer in JSON but routinely wrap the answer in a
//! markdown code fence. Only the fence markers are removed; this is not a
//! markdown parser.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::error::{AdvisorError, Result};

static FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^```json|^```|```$").expect("fence pattern is valid"));

/// Removes leading/trailing code-fence markers (optionally tagged `json`).
pub fn strip_code_fences(raw: &str) -> String {
    FENCE.replace_all(raw.trim(), "").trim().to_string()
}

/// Strips code fences and parses the remainder as JSON.
///
/// Raw control characters inside string literals are tolerated: if the
/// strict parse fails they are escaped and the parse is retried once.
pub fn extract_json(raw: &str) -> Result<Value> {
    let cleaned = strip_code_fences(raw);

    match serde_json::from_str(&cleaned) {
        Ok(value) => Ok(value),
        Err(strict_err) => {
            let repaired = escape_control_chars_in_strings(&cleaned);
            if repaired == cleaned {
                return Err(AdvisorError::Parse {
                    cleaned,
                    source: strict_err,
                });
            }
            debug!("Strict JSON parse failed, retrying with escaped control characters");
            serde_json::from_str(&repaired).map_err(|source| AdvisorError::Parse { cleaned, source })
        }
    }
}

fn escape_control_chars_in_strings(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for ch in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
                out.push(ch);
                continue;
            }
            match ch {
                '\\' => {
                    escaped = true;
                    out.push(ch);
                }
                '"' => {
                    in_string = false;
                    out.push(ch);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
                c => out.push(c),
            }
        } else {
            if ch == '"' {
                in_string = true;
            }
            out.push(ch);
        }
    }

    out
}
