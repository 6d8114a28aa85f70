// Line numbering of code sent for repair. Diagnostics cite absolute line
// numbers, so stripping must restore the exact original layout.

/// Prefix every line with `N. ` (1-based)
pub fn add_linemarks(code: &str) -> String {
    code.split('\n')
        .enumerate()
        .map(|(i, line)| format!("{}. {}", i + 1, line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove `N. ` prefixes if the text carries them.
///
/// Detection looks at the second line because the first one is often blank
/// in model replies. Lines without a mark are kept as they are.
pub fn strip_linemarks(code: &str) -> String {
    let lines: Vec<&str> = code.split('\n').collect();
    let probe = lines.get(1).or_else(|| lines.first()).copied().unwrap_or_default();
    if !looks_marked(probe) {
        return code.to_string();
    }

    lines
        .iter()
        .map(|line| match mark_len(line) {
            Some(len) => &line[len..],
            None => line,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn looks_marked(line: &str) -> bool {
    match line.split_once('.') {
        Some((number, _)) => !number.is_empty() && number.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

/// Byte length of a leading `N. ` mark, or `N.` when that is the whole line
fn mark_len(line: &str) -> Option<usize> {
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let rest = &line[digits..];
    if rest.starts_with(". ") {
        Some(digits + 2)
    } else if rest == "." {
        Some(digits + 1)
    } else {
        None
    }
}
