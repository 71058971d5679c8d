const MAX_NAME_BYTES: usize = 120;

/// Windows-safe file name for a downloaded document. Path separators and
/// other forbidden characters become `_`; the extension is preserved.
pub fn sanitize_file_name(name: &str) -> String {
    let (stem, ext) = match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    };
    let ext: String = ext.chars().filter(|c| !is_forbidden(*c)).collect();

    let mut cleaned: String = stem
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    cleaned = cleaned.trim_matches(&['_', ' ', '.'][..]).to_string();
    if cleaned.is_empty() {
        cleaned = "untitled".to_string();
    }

    let mut compacted = String::with_capacity(cleaned.len());
    let mut prev_underscore = false;
    for c in cleaned.chars() {
        if c == '_' {
            if !prev_underscore {
                compacted.push(c);
            }
            prev_underscore = true;
        } else {
            compacted.push(c);
            prev_underscore = false;
        }
    }

    let budget = MAX_NAME_BYTES.saturating_sub(ext.len()).max(1);
    truncate_on_char_boundary(&mut compacted, budget);
    if is_reserved_windows_name(&compacted) {
        compacted.push('_');
    }
    format!("{compacted}{ext}")
}

fn truncate_on_char_boundary(text: &mut String, max_bytes: usize) {
    if text.len() <= max_bytes {
        return;
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::sanitize_file_name;

    #[test]
    fn plain_names_are_kept() {
        assert_eq!(sanitize_file_name("report.md"), "report.md");
    }

    #[test]
    fn separators_and_forbidden_chars_are_replaced() {
        assert_eq!(sanitize_file_name("../a/b:c?.md"), "a_b_c.md");
        assert_eq!(sanitize_file_name("a**b.md"), "a_b.md");
    }

    #[test]
    fn reserved_names_get_suffix() {
        assert_eq!(sanitize_file_name("con.md"), "con_.md");
    }

    #[test]
    fn empty_stem_becomes_untitled() {
        assert_eq!(sanitize_file_name("???.md"), "untitled.md");
    }

    #[test]
    fn long_names_are_truncated_on_char_boundary() {
        let name = format!("{}.md", "é".repeat(100));
        let sanitized = sanitize_file_name(&name);
        assert!(sanitized.len() <= 120);
        assert!(sanitized.ends_with(".md"));
    }
}
