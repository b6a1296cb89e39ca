//! Ticker normalization.

use regex::Regex;
use std::sync::OnceLock;

/// Rank prefixes the proposer sometimes glues on: `R1-KVUE`, `r2/TSLA`, `R3: SPY`.
const RANK_PREFIX: &str = r"^R(\d+)\s*[-_:/\\\s]+([A-Z0-9.]+)$";
/// A symbol in parentheses at the end of a longer name: `S&P500 ETF (SPY)`.
const PARENTHESISED: &str = r"\(([A-Z0-9.]+)\)$";

fn compiled(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

fn rank_prefix() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&CELL, RANK_PREFIX)
}

fn parenthesised() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&CELL, PARENTHESISED)
}

/// Reduce a raw proposer ticker to a bare uppercase symbol.
///
/// Returns an empty string when nothing is left. The result is not checked
/// for validity; see [`is_valid_ticker`].
pub fn normalize_ticker(raw: &str) -> String {
    let cleaned: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let cleaned = cleaned.to_uppercase();
    let cleaned = capture(parenthesised(), &cleaned, 1).unwrap_or(cleaned);
    capture(rank_prefix(), &cleaned, 2).unwrap_or(cleaned)
}

fn capture(re: Option<&Regex>, text: &str, group: usize) -> Option<String> {
    re?.captures(text)?
        .get(group)
        .map(|m| m.as_str().to_string())
}

/// A valid ticker is 1 to 5 ASCII letters.
pub fn is_valid_ticker(ticker: &str) -> bool {
    (1..=5).contains(&ticker.len()) && ticker.chars().all(|c| c.is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_rank_prefixes_are_stripped() {
        assert_eq!(normalize_ticker("R1-KVUE"), "KVUE");
        assert_eq!(normalize_ticker("r2/tsla"), "TSLA");
        assert_eq!(normalize_ticker("R3: SPY"), "SPY");
        assert_eq!(normalize_ticker("R4_aapl"), "AAPL");
        assert_eq!(normalize_ticker("R12 \\ msft"), "MSFT");
    }

    #[test]
    fn test_plain_symbols() {
        assert_eq!(normalize_ticker("  aapl "), "AAPL");
        assert_eq!(normalize_ticker("ROKU"), "ROKU");
        assert_eq!(normalize_ticker(""), "");
        assert_eq!(normalize_ticker("   "), "");
    }

    #[test]
    fn test_parenthesised_symbol() {
        assert_eq!(normalize_ticker("S&P500 ETF (SPY)"), "SPY");
        assert_eq!(normalize_ticker("Apple Inc. ( aapl )"), "AAPL");
    }

    #[test]
    fn test_ticker_format() {
        assert!(is_valid_ticker("A"));
        assert!(is_valid_ticker("GOOGL"));
        assert!(!is_valid_ticker(""));
        assert!(!is_valid_ticker("TOOLONG"));
        assert!(!is_valid_ticker("BRK.B"));
        assert!(!is_valid_ticker("R1KV"));
        assert!(!is_valid_ticker("S&P"));
    }

    proptest! {
        #[test]
        fn normalization_is_idempotent(raw in "[ a-zA-Z0-9:/_.-]{0,12}") {
            let once = normalize_ticker(&raw);
            prop_assert_eq!(normalize_ticker(&once), once);
        }
    }
}
