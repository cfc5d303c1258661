//! Text sanitizers.
//!
//! Two scrub modes cover every user-supplied string field: [`plain`] strips
//! all markup (identifiers, display names, column titles, row text) and
//! [`markup`] keeps a constrained formatting subset for card text bodies.
//! Both clip the input to [`TEXT_LIMIT`] characters first. Markdown syntax
//! is ordinary text to both modes and passes through untouched.

/// Free-text fields are clipped to this many characters before sanitizing.
pub const TEXT_LIMIT: usize = 5000;

/// Tags [`markup`] re-emits (normalized, attributes dropped).
const ALLOWED_TAGS: &[&str] = &[
    "b", "i", "em", "strong", "u", "s", "p", "br", "hr", "ul", "ol", "li",
    "blockquote", "code", "pre", "h1", "h2", "h3", "h4", "h5", "h6",
];

/// Tags whose entire content is dropped along with the tag itself.
const DROP_CONTENT_TAGS: &[&str] = &["script", "style"];

#[derive(PartialEq, Clone, Copy)]
enum Mode {
    Plain,
    Markup,
}

/// Truncate to [`TEXT_LIMIT`] characters.
pub fn clip(text: &str) -> &str {
    match text.char_indices().nth(TEXT_LIMIT) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Clip, then strip every tag. No markup survives.
pub fn plain(text: &str) -> String {
    scrub(clip(text), Mode::Plain)
}

/// Clip, then strip unsafe tags while keeping a constrained formatting
/// subset. Scripts and styles lose their content as well.
pub fn markup(text: &str) -> String {
    scrub(clip(text), Mode::Markup)
}

fn scrub(text: &str, mode: Mode) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];

        let Some(close) = tail.find('>') else {
            // No closing '>' ahead — keep the '<' as literal text.
            out.push_str("&lt;");
            rest = &tail[1..];
            continue;
        };

        let span = &tail[1..close];
        rest = &tail[close + 1..];

        if mode == Mode::Plain {
            continue;
        }

        let Some(tag) = tag_name(span) else {
            continue;
        };
        let is_closing = span.trim_start().starts_with('/');

        if ALLOWED_TAGS.contains(&tag.as_str()) {
            if is_closing {
                out.push_str("</");
            } else {
                out.push('<');
            }
            out.push_str(&tag);
            out.push('>');
        } else if DROP_CONTENT_TAGS.contains(&tag.as_str()) && !is_closing {
            // Drop everything through the matching close tag.
            let close_pat = format!("</{tag}");
            match rest.to_ascii_lowercase().find(&close_pat) {
                Some(end) => {
                    let after = &rest[end..];
                    match after.find('>') {
                        Some(gt) => rest = &after[gt + 1..],
                        None => return out,
                    }
                }
                None => return out,
            }
        }
    }

    out.push_str(rest);
    out
}

fn tag_name(span: &str) -> Option<String> {
    let name: String = span
        .trim_start()
        .trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    if name.is_empty() {
        None
    } else {
        Some(name.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_strips_tags() {
        assert_eq!(plain("<b>hello</b> world"), "hello world");
        assert_eq!(plain("<img src=x onerror=alert(1)>"), "");
    }

    #[test]
    fn plain_passes_markdown() {
        assert_eq!(plain("**bold** and _italic_"), "**bold** and _italic_");
    }

    #[test]
    fn markup_keeps_allowed_tags() {
        assert_eq!(markup("<b>hi</b>"), "<b>hi</b>");
        assert_eq!(markup("# Heading\n<em>x</em>"), "# Heading\n<em>x</em>");
    }

    #[test]
    fn markup_drops_attributes() {
        assert_eq!(markup(r#"<b onclick="x()">hi</b>"#), "<b>hi</b>");
    }

    #[test]
    fn markup_strips_script_with_content() {
        assert_eq!(markup("a<script>alert(1)</script>b"), "ab");
        assert_eq!(markup("a<SCRIPT>x</SCRIPT>b"), "ab");
    }

    #[test]
    fn markup_drops_unterminated_script() {
        assert_eq!(markup("keep<script>gone forever"), "keep");
    }

    #[test]
    fn markup_drops_unknown_tags_keeps_text() {
        assert_eq!(markup("<iframe src=x></iframe>keep"), "keep");
        assert_eq!(markup("<a href=evil>link text</a>"), "link text");
    }

    #[test]
    fn stray_angle_bracket_becomes_entity() {
        assert_eq!(plain("i <3 boards"), "i &lt;3 boards");
        assert_eq!(markup("2 < 3 is true"), "2 &lt; 3 is true");
    }

    #[test]
    fn angle_pair_swallows_span() {
        assert_eq!(plain("a < b > c"), "a  c");
    }

    #[test]
    fn clip_limits_length() {
        let long = "x".repeat(TEXT_LIMIT + 100);
        assert_eq!(clip(&long).chars().count(), TEXT_LIMIT);
        assert_eq!(plain(&long).chars().count(), TEXT_LIMIT);
    }

    #[test]
    fn clip_counts_characters_not_bytes() {
        let long = "ß".repeat(TEXT_LIMIT + 1);
        let clipped = clip(&long);
        assert_eq!(clipped.chars().count(), TEXT_LIMIT);
    }

    #[test]
    fn clip_runs_before_scrubbing() {
        // The tag opener lands on the clip boundary and is cut off, leaving
        // a stray '<' that gets escaped rather than parsed.
        let text = format!("{}{}", "a".repeat(TEXT_LIMIT - 1), "<script>x</script>");
        let cleaned = markup(&text);
        assert!(cleaned.ends_with("&lt;"));
    }

    #[test]
    fn short_fields_unchanged() {
        assert_eq!(plain("card-42"), "card-42");
        assert_eq!(plain("To Do"), "To Do");
    }
}
