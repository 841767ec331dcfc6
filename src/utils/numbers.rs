//! Lenient numeric parsing for view counts and durations.
//!
//! View counts arrive as display strings in many locales. A value that cannot
//! be read confidently is `None`, never zero: zero views is a real count.

use std::sync::LazyLock;

use regex::Regex;

/// A view count parsed from display text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedCount {
    pub value: u64,
    /// The text used an abbreviation ("1.2M"), so the value is rounded.
    pub approximate: bool,
}

/// Parse a view count display string into an integer.
///
/// Handles plain digits, locale group separators, abbreviations (`K`, `M`,
/// `B`, `Mio`, `Mrd`, `Tsd`, `lakh`, `crore`, spelled-out English scales),
/// decimal commas and trailing words. Returns `None` when unsure.
pub fn parse_view_count(text: &str) -> Option<u64> {
    parse_view_count_detailed(text).map(|c| c.value)
}

/// Like [`parse_view_count`], also reporting whether the value is approximate.
pub fn parse_view_count_detailed(text: &str) -> Option<ParsedCount> {
    let lower = text.trim().to_lowercase();
    if lower.is_empty() {
        return None;
    }
    if lower.starts_with("no view") || lower == "no views" {
        return Some(ParsedCount {
            value: 0,
            approximate: false,
        });
    }
    if !lower.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }

    let number_end = lower
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || is_separator(*c)))
        .map(|(i, _)| i)
        .unwrap_or(lower.len());
    let number = lower[..number_end].trim_end_matches(is_separator);
    let rest = lower[number_end..].trim_start_matches(|c: char| c.is_whitespace() || c == '.');
    let word: String = rest.chars().take_while(|c| c.is_alphabetic()).collect();

    match scale_for(&word) {
        Some(scale) => {
            let value = parse_decimal(number)?;
            Some(ParsedCount {
                value: (value * scale as f64).round() as u64,
                approximate: true,
            })
        }
        None => Some(ParsedCount {
            value: parse_grouped_integer(number)?,
            approximate: false,
        }),
    }
}

fn is_separator(c: char) -> bool {
    matches!(c, ',' | '.' | ' ' | '\'' | '\u{a0}' | '\u{202f}' | '’')
}

fn scale_for(word: &str) -> Option<u64> {
    match word {
        "k" | "thousand" | "tsd" | "mil" => Some(1_000),
        "lakh" | "lakhs" | "lac" => Some(100_000),
        "m" | "mn" | "million" | "millions" | "mio" => Some(1_000_000),
        "crore" | "crores" | "cr" => Some(10_000_000),
        "b" | "bn" | "billion" | "billions" | "mrd" => Some(1_000_000_000),
        _ => None,
    }
}

/// Parse an abbreviated mantissa such as `1.2` or `1,2`.
fn parse_decimal(number: &str) -> Option<f64> {
    let compact: String = number
        .chars()
        .filter(|c| !matches!(c, ' ' | '\u{a0}' | '\u{202f}'))
        .collect();
    let separators = compact.chars().filter(|c| matches!(c, ',' | '.')).count();
    if separators > 1 {
        return None;
    }
    compact.replace(',', ".").parse::<f64>().ok()
}

/// Parse a full integer with optional group separators.
///
/// Groups after the first must be three digits, except Indian-style grouping
/// where middle groups are two digits and the last is three.
fn parse_grouped_integer(number: &str) -> Option<u64> {
    let groups: Vec<&str> = number.split(is_separator).collect();
    if groups.iter().any(|g| g.is_empty() || !g.bytes().all(|b| b.is_ascii_digit())) {
        return None;
    }
    if groups.len() > 1 {
        let first = groups[0];
        let last = groups[groups.len() - 1];
        let middle = &groups[1..groups.len() - 1];
        let western = middle.iter().all(|g| g.len() == 3);
        let indian = !middle.is_empty() && middle.iter().all(|g| g.len() == 2);
        if first.len() > 3 || last.len() != 3 || !(western || indian) {
            return None;
        }
    }
    groups.concat().parse().ok()
}

static ISO_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+(?:\.\d+)?)S)?)?$").unwrap()
});

/// Parse an ISO-8601 duration (`PT1H2M3S`, `P0D`) into whole seconds.
pub fn parse_iso8601_duration(text: &str) -> Option<u64> {
    let text = text.trim();
    if text == "P" || text.ends_with('T') {
        return None;
    }
    let caps = ISO_DURATION.captures(text)?;
    let part = |i: usize| -> Option<u64> {
        match caps.get(i) {
            // Fractional seconds are truncated.
            Some(m) => m.as_str().split('.').next()?.parse().ok(),
            None => Some(0),
        }
    };
    part(1)?
        .checked_mul(86_400)?
        .checked_add(part(2)?.checked_mul(3_600)?)?
        .checked_add(part(3)?.checked_mul(60)?)?
        .checked_add(part(4)?)
}

/// Parse a clock-style duration (`4:13`, `1:02:03`) into seconds.
pub fn parse_clock_duration(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    text.split(':').try_fold(0u64, |acc, part| {
        let n: u64 = part.trim().parse().ok()?;
        acc.checked_mul(60)?.checked_add(n)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_and_grouped_integers() {
        assert_eq!(parse_view_count("1234"), Some(1234));
        assert_eq!(parse_view_count("1,234,567"), Some(1_234_567));
        assert_eq!(parse_view_count("1.234.567"), Some(1_234_567));
        assert_eq!(parse_view_count("1 234 567"), Some(1_234_567));
        assert_eq!(parse_view_count("1\u{a0}234\u{a0}567"), Some(1_234_567));
        assert_eq!(parse_view_count("1'234'567"), Some(1_234_567));
        assert_eq!(parse_view_count("12,34,567"), Some(1_234_567));
    }

    #[test]
    fn test_trailing_words() {
        assert_eq!(parse_view_count("1,234 views"), Some(1234));
        assert_eq!(parse_view_count("1.234.567 Aufrufe"), Some(1_234_567));
        assert_eq!(parse_view_count("1 view"), Some(1));
    }

    #[test]
    fn test_abbreviations() {
        assert_eq!(parse_view_count("1.2M views"), Some(1_200_000));
        assert_eq!(parse_view_count("850K"), Some(850_000));
        assert_eq!(parse_view_count("3B"), Some(3_000_000_000));
        assert_eq!(parse_view_count("1,2 Mio. Aufrufe"), Some(1_200_000));
        assert_eq!(parse_view_count("4 Mrd."), Some(4_000_000_000));
        assert_eq!(parse_view_count("12 Tsd."), Some(12_000));
        assert_eq!(parse_view_count("2.5 million views"), Some(2_500_000));
        assert_eq!(parse_view_count("3.4 lakh views"), Some(340_000));
        assert_eq!(parse_view_count("1.1 crore views"), Some(11_000_000));
        assert_eq!(parse_view_count("7 thousand"), Some(7_000));
    }

    #[test]
    fn test_approximate_flag() {
        assert!(parse_view_count_detailed("1.2M").unwrap().approximate);
        assert!(!parse_view_count_detailed("1,200,000").unwrap().approximate);
    }

    #[test]
    fn test_zero_is_not_unknown() {
        assert_eq!(parse_view_count("No views"), Some(0));
        assert_eq!(parse_view_count("0 views"), Some(0));
    }

    #[test]
    fn test_unparsable_is_none() {
        assert_eq!(parse_view_count(""), None);
        assert_eq!(parse_view_count("views"), None);
        assert_eq!(parse_view_count("Premieres soon"), None);
        assert_eq!(parse_view_count("1.5"), None);
        assert_eq!(parse_view_count("1,2,3"), None);
        assert_eq!(parse_view_count("-5"), None);
    }

    #[test]
    fn test_iso8601_duration() {
        assert_eq!(parse_iso8601_duration("PT4M13S"), Some(253));
        assert_eq!(parse_iso8601_duration("PT1H"), Some(3600));
        assert_eq!(parse_iso8601_duration("P1DT2S"), Some(86_402));
        assert_eq!(parse_iso8601_duration("P0D"), Some(0));
        assert_eq!(parse_iso8601_duration("PT"), None);
        assert_eq!(parse_iso8601_duration("4:13"), None);
        assert_eq!(parse_iso8601_duration("PT12.9S"), Some(12));
    }

    #[test]
    fn test_oversized_durations_are_none() {
        assert_eq!(parse_iso8601_duration("P999999999999999999DT1S"), None);
        assert_eq!(parse_iso8601_duration("PT99999999999999999999S"), None);
        assert_eq!(parse_iso8601_duration("PT18446744073709551615S"), Some(u64::MAX));
        assert_eq!(parse_iso8601_duration("PT1M18446744073709551615S"), None);
        assert_eq!(parse_clock_duration("999999999999999999:00:00"), None);
        assert_eq!(parse_clock_duration("18446744073709551615"), Some(u64::MAX));
        assert_eq!(parse_clock_duration("1:18446744073709551615"), None);
    }

    #[test]
    fn test_clock_duration() {
        assert_eq!(parse_clock_duration("4:13"), Some(253));
        assert_eq!(parse_clock_duration("1:02:03"), Some(3723));
        assert_eq!(parse_clock_duration("59"), Some(59));
        assert_eq!(parse_clock_duration("LIVE"), None);
    }
}
