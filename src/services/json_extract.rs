// src/services/json_extract.rs
//! Lenient recovery of a JSON object from free-text model output.
//!
//! Precedence:
//! 1. markdown code-fence markers (```` ``` ```` with an optional language tag) are removed;
//! 2. the text between the first `{` and the last `}` (inclusive) is taken.
//!
//! Returns `None` when no such span exists.

pub fn extract_json(text: &str) -> Option<String> {
    let unfenced = strip_code_fences(text);
    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    if end < start {
        return None;
    }
    Some(unfenced[start..=end].to_string())
}

fn strip_code_fences(text: &str) -> String {
    text.lines()
        .map(|line| {
            let trimmed = line.trim_start();
            match trimmed.strip_prefix("```") {
                // Drop the fence marker together with any language tag after it.
                Some(rest) if rest.chars().all(|c| c.is_ascii_alphanumeric()) => "",
                Some(rest) => rest,
                None => line,
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
