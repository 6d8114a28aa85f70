//! Shaping of raw diagnostics before they go into a repair prompt

use crate::checker::RunResult;

const TIMEOUT_MARKER: &str = "program is timeout";

/// Keep the bottom of a traceback, up to `depth` frames (lines with "File").
///
/// A depth of 0 keeps the whole message.
pub fn simplify_traceback(message: &str, depth: usize) -> String {
    if depth == 0 {
        return message.to_string();
    }
    let lines: Vec<&str> = message.split('\n').collect();
    let mut frames = 0;
    let mut start = 0;
    for (i, line) in lines.iter().enumerate().rev() {
        if line.contains("File") {
            frames += 1;
            if frames == depth {
                start = i;
                break;
            }
        }
    }
    lines[start..].join("\n")
}

pub fn is_timeout(result: &RunResult) -> bool {
    result.is_timeout() || result.diagnostic.contains(TIMEOUT_MARKER)
}

/// Raw diagnostic of a run, falling back to stdout when the tool printed errors there
pub fn raw_diagnostic(result: &RunResult) -> &str {
    if result.diagnostic.trim().is_empty() {
        &result.stdout
    } else {
        &result.diagnostic
    }
}

/// Diagnostic for a behavioral-check repair prompt; timeouts pass through unabridged
pub fn secondary_diagnostic(result: &RunResult, depth: usize) -> String {
    if is_timeout(result) {
        result.diagnostic.clone()
    } else {
        simplify_traceback(raw_diagnostic(result), depth)
    }
}
