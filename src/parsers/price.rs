use once_cell::sync::Lazy;
use regex::Regex;

static NON_DIGIT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^0-9]")
        .expect("Invalid non-digit regex")
});

/// Reduce a raw price string to its digits and read them as an integer.
///
/// Returns `None` (the "not a number" outcome) when the input has no digits,
/// or when the digits overflow `u64`. Callers drop `None` from aggregates
/// rather than treating it as zero.
pub fn normalize_price(raw: &str) -> Option<u64> {
    let digits = NON_DIGIT_REGEX.replace_all(raw, "");
    if digits.is_empty() {
        return None;
    }
    digits.parse::<u64>().ok()
}

/// Aggregate statistics over the prices that normalized to a number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceSummary {
    pub count: usize,
    pub mean: f64,
    pub min: u64,
    pub max: u64,
}

impl PriceSummary {
    /// Summarize raw price strings. `None` when no entry normalizes.
    pub fn from_raw<'a, I>(raw_prices: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let values: Vec<u64> = raw_prices.into_iter().filter_map(normalize_price).collect();
        let min = *values.iter().min()?;
        let max = *values.iter().max()?;
        let total: u128 = values.iter().map(|v| *v as u128).sum();

        Some(Self {
            count: values.len(),
            mean: total as f64 / values.len() as f64,
            min,
            max,
        })
    }
}
