//! Text transforms applied on the way in and out of the conversation.

/// Smart question-mark handling applied to user input before it is sent.
///
/// A single trailing `?` (ASCII or fullwidth) is dropped; any other `?`
/// followed by more text becomes a line break. Blank lines collapse, so the
/// result never contains two consecutive line breaks.
pub fn process_question_marks(input: &str) -> String {
    let trimmed = input.trim();
    let stripped = trimmed.strip_suffix(['?', '？']).unwrap_or(trimmed);

    stripped
        .split(['?', '？'])
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Escape text for embedding in an HTML bubble.
///
/// Used exactly once per user message, at projection time. Assistant text is
/// never escaped; the backend already speaks HTML.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_question_mark_is_stripped() {
        assert_eq!(process_question_marks("A?"), "A");
        assert_eq!(process_question_marks("A？"), "A");
    }

    #[test]
    fn internal_question_mark_becomes_line_break() {
        assert_eq!(process_question_marks("A? B?"), "A\nB");
        assert_eq!(process_question_marks("A？B？C"), "A\nB\nC");
    }

    #[test]
    fn blank_lines_collapse() {
        // consecutive marks must not leave empty lines behind
        assert_eq!(process_question_marks("A??B"), "A\nB");
        assert_eq!(process_question_marks("A?? ?B?"), "A\nB");
        assert!(!process_question_marks("x?? y?? z").contains("\n\n"));
    }

    #[test]
    fn text_without_marks_is_untouched() {
        assert_eq!(process_question_marks("hello world"), "hello world");
    }

    #[test]
    fn marks_only_input_collapses_to_empty() {
        assert_eq!(process_question_marks("???"), "");
        assert_eq!(process_question_marks("？"), "");
    }

    #[test]
    fn escape_keeps_script_tags_literal() {
        assert_eq!(
            escape_html("<script>alert(1)</script>"),
            "&lt;script&gt;alert(1)&lt;/script&gt;"
        );
    }

    #[test]
    fn escaping_twice_is_visibly_different() {
        let once = escape_html("<b>");
        let twice = escape_html(&once);
        assert_eq!(once, "&lt;b&gt;");
        assert_eq!(twice, "&amp;lt;b&amp;gt;");
        assert_ne!(once, twice);
    }

    #[test]
    fn ampersand_is_escaped_first() {
        assert_eq!(escape_html("a & b"), "a &amp; b");
    }
}
