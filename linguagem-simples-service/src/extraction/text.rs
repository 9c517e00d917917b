//! Text cleanup shared by PDF, OCR and pasted input.

/// Normalize whitespace and strip control characters.
///
/// Spaces and tabs collapse to one space, each line is trimmed and runs of
/// blank lines collapse to a single blank line.
pub fn normalize_text(text: &str) -> String {
    let unified = text
        .replace("\r\n", "\n")
        .replace(['\r', '\u{000C}'], "\n");

    let mut out = String::with_capacity(unified.len());
    let mut blank_run = 0usize;

    for line in unified.split('\n') {
        let cleaned = collapse_spaces(line);
        if cleaned.is_empty() {
            blank_run += 1;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank_run > 0 { "\n\n" } else { "\n" });
        }
        out.push_str(&cleaned);
        blank_run = 0;
    }

    out
}

fn collapse_spaces(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut pending_space = false;
    for c in line.chars() {
        if c == ' ' || c == '\t' || c == '\u{00A0}' {
            pending_space = true;
        } else if c.is_control() || c == '\u{FEFF}' {
            continue;
        } else {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        }
    }
    out
}

/// Truncate to at most `max` characters.
///
/// When a paragraph or sentence break falls within the last 10% of the
/// allowed length the cut happens there instead. Returns whether anything
/// was removed.
pub fn truncate_chars(text: &str, max: usize) -> (String, bool) {
    let Some((end, _)) = text.char_indices().nth(max) else {
        return (text.to_string(), false);
    };
    if max == 0 {
        return (String::new(), true);
    }

    let head = &text[..end];
    let window_start = head
        .char_indices()
        .nth(max - max / 10)
        .map(|(i, _)| i)
        .unwrap_or(end);
    let window = &head[window_start..];

    let cut = window
        .rfind("\n\n")
        .map(|i| window_start + i)
        .or_else(|| {
            window
                .rfind(". ")
                .or_else(|| window.rfind(".\n"))
                .map(|i| window_start + i + 1)
        })
        .unwrap_or(end);

    (head[..cut].trim_end().to_string(), true)
}

/// Number of alphanumeric characters, used to judge whether extraction
/// produced real text.
pub fn meaningful_char_count(text: &str) -> usize {
    text.chars().filter(|c| c.is_alphanumeric()).count()
}
