use regex::Regex;
use scraper::ElementRef;
use std::sync::LazyLock;

static NON_PRICE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9.,]").expect("static pattern"));

const CURRENCY_MARKERS: [&str; 9] = ["$", "€", "£", "¥", "USD", "EUR", "GBP", "CAD", "AUD"];

/// Substrings that mark a container holding promotional copy or several price variants.
const PROMO_MARKERS: [&str; 6] = [
    "Regular price",
    "Sale price",
    "Unit price",
    "from",
    "SAVE",
    "Save",
];

const LIKELY_PRICE_MAX_CHARS: usize = 50;
const SINGLE_PRICE_MAX_CHARS: usize = 80;

/// Parse a price-bearing fragment such as `"$1,234.56"` or `"€19,99"`.
///
/// When both separators appear the comma is a thousands separator; a lone comma
/// is a decimal comma. This means `"1,234"` reads as `1.234`.
pub fn parse_price(text: &str) -> Option<f64> {
    if text.trim().is_empty() {
        return None;
    }

    let stripped = NON_PRICE_CHARS.replace_all(text, "");
    if stripped.is_empty() {
        return None;
    }

    let has_comma = stripped.contains(',');
    let has_dot = stripped.contains('.');

    let normalized = if has_comma && has_dot {
        stripped.replace(',', "")
    } else if has_comma {
        stripped.replace(',', ".")
    } else {
        stripped.into_owned()
    };

    normalized
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value >= 0.0)
}

/// Cheap first pass: a digit plus either a currency marker, or a short
/// fragment with a separator.
pub fn is_likely_price(text: &str) -> bool {
    if !text.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }

    if CURRENCY_MARKERS.iter().any(|marker| text.contains(marker)) {
        return true;
    }

    text.chars().count() < LIKELY_PRICE_MAX_CHARS && (text.contains('.') || text.contains(','))
}

/// Rejects fragments that hold more than one price, such as regular/sale
/// pairs, theme markup that repeats the amount, or promotional blurbs.
pub fn is_single_price(text: &str) -> bool {
    let dollar_count = text.matches('$').count();
    if dollar_count >= 3 {
        return false;
    }

    if dollar_count == 2 && is_duplicated_amount(text) {
        return false;
    }

    if PROMO_MARKERS.iter().any(|marker| text.contains(marker)) {
        return false;
    }

    text.chars().count() <= SINGLE_PRICE_MAX_CHARS
}

/// Both checks, in the order the detector applies them.
pub fn looks_like_single_price(text: &str) -> bool {
    is_likely_price(text) && is_single_price(text)
}

// "$605.00$605.00": themes often render the same amount twice in one node
fn is_duplicated_amount(text: &str) -> bool {
    let amounts: Vec<&str> = text
        .split('$')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();

    match amounts.as_slice() {
        [first, second] => match (parse_price(first), parse_price(second)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        _ => false,
    }
}

/// Text content of an element with every text node trimmed and concatenated.
pub fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .collect::<String>()
}
