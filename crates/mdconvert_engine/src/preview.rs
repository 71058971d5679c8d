const TRUNCATED_MARKER: &str = "\n.[truncated]";
pub const MAX_PREVIEW_CONTENT: usize = 40_960;

/// Caps preview content for terminal display.
pub fn prepare_preview_content(markdown: &str) -> String {
    if markdown.len() <= MAX_PREVIEW_CONTENT {
        markdown.to_string()
    } else {
        let mut end = MAX_PREVIEW_CONTENT;
        while end > 0 && !markdown.is_char_boundary(end) {
            end -= 1;
        }
        let truncated = &markdown[..end];
        format!("{truncated}{TRUNCATED_MARKER}")
    }
}

#[cfg(test)]
mod tests {
    use super::{prepare_preview_content, MAX_PREVIEW_CONTENT, TRUNCATED_MARKER};

    #[test]
    fn short_content_kept_as_is() {
        let content = "# Title\n\nshort preview";
        assert_eq!(prepare_preview_content(content), content);
    }

    #[test]
    fn long_content_is_truncated_with_marker() {
        let content = "a".repeat(MAX_PREVIEW_CONTENT + 10);
        let prepared = prepare_preview_content(&content);
        assert!(prepared.ends_with(TRUNCATED_MARKER));
        assert_eq!(prepared.len(), MAX_PREVIEW_CONTENT + TRUNCATED_MARKER.len());
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let content = "ü".repeat(MAX_PREVIEW_CONTENT);
        let prepared = prepare_preview_content(&content);
        assert!(prepared.ends_with(TRUNCATED_MARKER));
        assert!(prepared.len() <= MAX_PREVIEW_CONTENT + TRUNCATED_MARKER.len());
    }
}
