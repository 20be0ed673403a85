use serde::{Deserialize, Serialize};

use crate::models::fields;

/// Keyword set mapped to the field a matching fragment fills.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub field: String,
    pub keywords: Vec<String>,
}

impl KeywordRule {
    pub fn new(field: &str, keywords: &[&str]) -> Self {
        Self {
            field: field.to_string(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    fn matches(&self, text: &str) -> bool {
        self.keywords.iter().any(|k| text.contains(k.as_str()))
    }
}

/// Rooms before bathrooms before surface before location. A fragment like
/// "3 chambres, quartier x" must land in exactly one field.
pub fn default_rules() -> Vec<KeywordRule> {
    vec![
        KeywordRule::new(fields::BEDROOMS, &["chambre", "bedroom"]),
        KeywordRule::new(fields::BATHROOMS, &["bain", "bathroom", "sdb"]),
        KeywordRule::new(fields::SURFACE, &["m²", "surface"]),
        KeywordRule::new(fields::ADDRESS, &["quartier", "adresse", "zone", "location"]),
    ]
}

/// Field for an already lower-cased fragment; first matching rule wins.
pub fn classify<'r>(rules: &'r [KeywordRule], text: &str) -> Option<&'r str> {
    rules
        .iter()
        .find(|rule| rule.matches(text))
        .map(|rule| rule.field.as_str())
}
