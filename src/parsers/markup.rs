use scraper::Html;

use crate::error::ParseError;

/// Parse rendered page markup into a queryable document.
///
/// html5ever recovers from almost anything, so only input with no markup
/// at all is rejected.
pub fn parse_document(html: &str) -> Result<Html, ParseError> {
    let trimmed = html.trim();
    if trimmed.is_empty() {
        return Err(ParseError::EmptyDocument);
    }
    if !trimmed.contains('<') {
        return Err(ParseError::NotMarkup);
    }
    Ok(Html::parse_document(html))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Selector;

    #[test]
    fn rejects_blank_input() {
        assert_eq!(parse_document("  \n ").err(), Some(ParseError::EmptyDocument));
    }

    #[test]
    fn rejects_plain_text() {
        assert_eq!(parse_document("502 Bad Gateway").err(), Some(ParseError::NotMarkup));
    }

    #[test]
    fn tolerates_broken_markup() {
        let doc = parse_document("<article><h2>Villa<p>unclosed").unwrap();
        let h2 = Selector::parse("h2").unwrap();
        assert_eq!(doc.select(&h2).count(), 1);
    }
}
