//! Display-name normalization for location names.
//!
//! Source datasets carry names in inconsistent case (`KEIYO NORTH`,
//! `kapsowar/chepkorio`). Display names are title-cased per token with
//! separators spaced out, so that `normalize(normalize(x)) == normalize(x)`.

use std::cmp::Ordering;

/// Normalize a raw location name into its display form.
///
/// - curly apostrophes become `'`
/// - `/` and `\` become ` / `, `-` becomes ` - `
/// - every whitespace-delimited token is lowercased, then its first
///   character is upper-cased
/// - runs of whitespace collapse to a single space
#[must_use]
pub fn normalize_display_name(raw: &str) -> String {
    let mut spaced = String::with_capacity(raw.len() + 8);
    for ch in raw.chars() {
        match ch {
            '\u{2019}' | '\u{2018}' => spaced.push('\''),
            '/' | '\\' => spaced.push_str(" / "),
            '-' => spaced.push_str(" - "),
            other => spaced.push(other),
        }
    }

    spaced
        .split_whitespace()
        .map(title_case_token)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case_token(token: &str) -> String {
    let lower = token.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Ordering used for every dropdown: case-insensitive display name, then the
/// raw name as a tie-breaker so the order is total.
#[must_use]
pub fn display_order(a_display: &str, a_raw: &str, b_display: &str, b_raw: &str) -> Ordering {
    a_display
        .to_lowercase()
        .cmp(&b_display.to_lowercase())
        .then_with(|| a_raw.cmp(b_raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_uppercase() {
        assert_eq!(normalize_display_name("KEIYO NORTH"), "Keiyo North");
        assert_eq!(normalize_display_name("uasin gishu"), "Uasin Gishu");
    }

    #[test]
    fn test_normalize_slash_and_backslash() {
        assert_eq!(
            normalize_display_name("KAPSOWAR/CHEPKORIO"),
            "Kapsowar / Chepkorio"
        );
        assert_eq!(normalize_display_name("EMSOO\\KAMARINY"), "Emsoo / Kamariny");
    }

    #[test]
    fn test_normalize_hyphen() {
        assert_eq!(normalize_display_name("ELGEYO-MARAKWET"), "Elgeyo - Marakwet");
    }

    #[test]
    fn test_normalize_apostrophes() {
        assert_eq!(normalize_display_name("MURANG\u{2019}A"), "Murang'a");
        assert_eq!(normalize_display_name("murang'a"), "Murang'a");
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize_display_name("  TANA   RIVER "), "Tana River");
        assert_eq!(normalize_display_name(""), "");
        assert_eq!(normalize_display_name("   "), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "KAPSOWAR/CHEPKORIO",
            "ELGEYO-MARAKWET",
            "st. mary's - west",
            "A\\B/C-D",
            "NAIROBI",
            "émbu  north",
        ];
        for raw in samples {
            let once = normalize_display_name(raw);
            assert_eq!(normalize_display_name(&once), once, "not idempotent: {raw}");
        }
    }

    #[test]
    fn test_display_order_is_case_insensitive() {
        assert_eq!(display_order("baringo", "b", "Bomet", "B"), Ordering::Less);
        assert_eq!(display_order("Kisii", "KISII", "kisii", "kisii"), Ordering::Less);
        assert_eq!(display_order("Kisii", "x", "Kisii", "x"), Ordering::Equal);
    }
}
