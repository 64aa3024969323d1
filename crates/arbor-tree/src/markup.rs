//! Minimal markup helpers used by annotation renderers.

/// Escape the five HTML-significant characters.
#[must_use]
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Wrap raw node content in the viewer's `HTMLContent` component.
#[must_use]
pub fn html_component(content: &str) -> String {
    format!("<HTMLContent html='{}'/>", escape_html(content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_quotes_and_tags() {
        assert_eq!(
            escape_html(r#"<a href="x">'y' & z</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#x27;y&#x27; &amp; z&lt;/a&gt;"
        );
    }

    #[test]
    fn component_is_single_quoted_and_escaped() {
        assert_eq!(
            html_component("<p>it's</p>"),
            "<HTMLContent html='&lt;p&gt;it&#x27;s&lt;/p&gt;'/>"
        );
    }
}
