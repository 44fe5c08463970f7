//! Numeric interpretation of grade cell text.
//!
//! APSWeb renders grades with a Brazilian decimal comma and frequently mixes
//! numbers with annotations ("7,5 (Prova)", "Nota: 8"). Extraction takes the
//! first number found after normalizing the first comma to a dot; cells with
//! no number at all ("Faltou", "-") stay non-numeric.

use std::sync::LazyLock;

use regex::Regex;

// Compiled once - signed integer or decimal, first occurrence wins.
static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d+(\.\d+)?").unwrap());

/// Extracts the first numeric value from a raw grade cell.
///
/// Only the first comma is rewritten to a decimal dot, so thousand-separator
/// style input ("1,5,2") yields the leading number rather than garbage.
pub fn extract_number(raw: &str) -> Option<f64> {
    if raw.is_empty() {
        return None;
    }

    let normalized = raw.replacen(',', ".", 1);
    let matched = NUMBER_RE.find(&normalized)?;
    matched.as_str().parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_comma_with_annotation() {
        assert_eq!(extract_number("7,5 (Prova)"), Some(7.5));
    }

    #[test]
    fn test_plain_integer() {
        assert_eq!(extract_number("8"), Some(8.0));
    }

    #[test]
    fn test_label_before_number() {
        assert_eq!(extract_number("Nota: 9,25"), Some(9.25));
    }

    #[test]
    fn test_no_number_present() {
        assert_eq!(extract_number("Faltou"), None);
        assert_eq!(extract_number(""), None);
        assert_eq!(extract_number("   "), None);
    }

    #[test]
    fn test_negative_value() {
        assert_eq!(extract_number("-2 pontos"), Some(-2.0));
    }

    #[test]
    fn test_only_first_comma_normalized() {
        assert_eq!(extract_number("1,5,2"), Some(1.5));
    }

    #[test]
    fn test_dot_decimal_untouched() {
        assert_eq!(extract_number("6.75"), Some(6.75));
    }
}
