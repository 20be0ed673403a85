pub mod classify;
pub mod markup;
pub mod price;

pub use classify::*;
pub use markup::*;
pub use price::*;

use html_escape::decode_html_entities;

/// Clean and normalize text by removing extra whitespace and decoding HTML entities
pub fn clean_text(text: &str) -> String {
    let decoded = decode_html_entities(text);
    decoded
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_collapses_whitespace_and_entities() {
        assert_eq!(clean_text("  Appartement\n\t F4 &amp; terrasse  "), "Appartement F4 & terrasse");
        assert_eq!(clean_text("   "), "");
    }
}
