//! Output rendering: overlay bitmap, legend and the HTML map document.

pub mod document;
pub mod legend;
pub mod overlay;

pub use document::{render_document, DocumentOptions};
pub use legend::{build_legend, Colorbar, Legend, LegendEntry};
pub use overlay::{
    categorical_overlay, continuous_overlay, encode_png, render_overlay, OverlayMode,
};

/// Escape text for use in HTML element content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<b>"Dry" & 'hot'</b>"#),
            "&lt;b&gt;&quot;Dry&quot; &amp; &#39;hot&#39;&lt;/b&gt;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }
}
