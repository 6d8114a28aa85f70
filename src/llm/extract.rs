//! Extraction of fenced code blocks from LLM replies

const FENCE: &str = "```";

/// Extract every fenced block opened with ```` ```<language> ````.
///
/// Whitespace right after the opening tag is skipped. When the reply holds no
/// block tagged with `language`, the whole reply is returned as the single
/// block, since models sometimes answer with bare code.
pub fn extract_code(text: &str, language: &str) -> Vec<String> {
    let opener = format!("{}{}", FENCE, language.to_lowercase());
    let mut blocks = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find(&opener) {
        let body = rest[start + opener.len()..].trim_start();
        match body.find(FENCE) {
            Some(end) => {
                blocks.push(body[..end].to_string());
                rest = &body[end + FENCE.len()..];
            }
            None => break,
        }
    }

    if blocks.is_empty() {
        vec![text.to_string()]
    } else {
        blocks
    }
}

/// The last fenced block for `language`, the one a repair reply is judged by
pub fn extract_last_code(text: &str, language: &str) -> String {
    extract_code(text, language).pop().unwrap_or_default()
}
