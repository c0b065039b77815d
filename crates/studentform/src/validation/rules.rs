//! Field format rules.

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use crate::fields::FieldId;

/// Fields that must be filled before the form can be submitted, in form
/// order.
pub const REQUIRED_FIELDS: [FieldId; 14] = [
    FieldId::FullName,
    FieldId::AdmissionNumber,
    FieldId::PhoneNumber,
    FieldId::NationalId,
    FieldId::Nationality,
    FieldId::Gender,
    FieldId::DateOfBirth,
    FieldId::PlaceOfBirth,
    FieldId::PermanentResidence,
    FieldId::Location,
    FieldId::County,
    FieldId::Emergency1Name,
    FieldId::Emergency1Relationship,
    FieldId::Emergency1Phone,
];

/// Kenyan mobile numbers: optional `+254` or `0` prefix, then `7` and eight
/// ASCII digits.
pub const KENYAN_MOBILE_PATTERN: &str = r"^(\+254|0)?7[0-9]{8}$";

/// A compiled format rule.
#[derive(Debug)]
pub struct FormatRule {
    /// Name of the rule for identification.
    pub name: &'static str,

    /// Description of what this rule accepts.
    pub description: &'static str,

    regex: Regex,
}

impl FormatRule {
    /// Create a new format rule.
    ///
    /// # Panics
    ///
    /// Panics if the regex pattern is invalid.
    #[must_use]
    pub fn new(name: &'static str, description: &'static str, pattern: &str) -> Self {
        Self {
            name,
            description,
            regex: Regex::new(pattern).expect("Invalid regex pattern"),
        }
    }

    /// Check if the value matches this rule.
    #[must_use]
    pub fn matches(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

/// The Kenyan mobile number rule.
#[must_use]
pub fn kenyan_mobile() -> FormatRule {
    FormatRule::new(
        "kenyan_mobile",
        "Kenyan mobile numbers (07XXXXXXXX, 7XXXXXXXX, +2547XXXXXXXX)",
        KENYAN_MOBILE_PATTERN,
    )
}

/// Remove all whitespace.
#[must_use]
pub fn strip_whitespace(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Normalize a valid mobile number to `+2547XXXXXXXX`. Returns `None` when
/// the number does not match `rule`.
#[must_use]
pub fn format_phone(rule: &FormatRule, number: &str) -> Option<String> {
    let compact = strip_whitespace(number);
    if !rule.matches(&compact) {
        return None;
    }
    let subscriber = compact.get(compact.len() - 9..)?;
    Some(format!("+254{subscriber}"))
}

/// Whether `id` is all ASCII digits with a length in `min..=max`.
#[must_use]
pub fn is_national_id(id: &str, min_digits: usize, max_digits: usize) -> bool {
    (min_digits..=max_digits).contains(&id.len()) && id.bytes().all(|b| b.is_ascii_digit())
}

/// Parse an ISO `YYYY-MM-DD` date.
#[must_use]
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

/// Age in full elapsed years on `today`. Negative for future birth dates.
#[must_use]
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        age -= 1;
    }
    age
}

/// Whether a birth date gives an age in `min..=max` on `today`.
#[must_use]
pub fn is_age_within(dob: &str, today: NaiveDate, min_age: u32, max_age: u32) -> bool {
    let Some(dob) = parse_date(dob) else {
        return false;
    };
    let Ok(age) = u32::try_from(age_on(dob, today)) else {
        return false;
    };
    (min_age..=max_age).contains(&age)
}

/// Whether a KCSE year is in `min_year..=today.year() + 1`.
#[must_use]
pub fn is_kcse_year(year: &str, today: NaiveDate, min_year: i32) -> bool {
    year.trim()
        .parse::<i32>()
        .is_ok_and(|year| (min_year..=today.year() + 1).contains(&year))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_kenyan_mobile() {
        let rule = kenyan_mobile();
        assert!(rule.matches("0712345678"));
        assert!(rule.matches("+254712345678"));
        assert!(rule.matches("712345678"));
        assert!(!rule.matches("0812345678"));
        assert!(!rule.matches("071234567"));
        assert!(!rule.matches("07123456789"));
        assert!(!rule.matches("+254812345678"));
    }

    #[test]
    fn test_kenyan_mobile_rejects_non_ascii_digits() {
        let rule = kenyan_mobile();
        let arabic_indic = "07\u{661}\u{662}\u{663}\u{664}\u{665}\u{666}\u{667}\u{668}";
        assert!(!rule.matches(arabic_indic));
        assert!(!rule.matches("7\u{ff11}2345678"));
        assert_eq!(format_phone(&rule, arabic_indic), None);
    }

    #[test]
    fn test_strip_whitespace() {
        assert_eq!(strip_whitespace(" 0712 345\t678 "), "0712345678");
    }

    #[test]
    fn test_format_phone() {
        let rule = kenyan_mobile();
        assert_eq!(
            format_phone(&rule, "0712 345 678").as_deref(),
            Some("+254712345678")
        );
        assert_eq!(
            format_phone(&rule, "+254712345678").as_deref(),
            Some("+254712345678")
        );
        assert_eq!(
            format_phone(&rule, "712345678").as_deref(),
            Some("+254712345678")
        );
        assert_eq!(format_phone(&rule, "0812345678"), None);
    }

    #[test]
    fn test_is_national_id() {
        assert!(is_national_id("1234567", 7, 8));
        assert!(is_national_id("12345678", 7, 8));
        assert!(!is_national_id("123456", 7, 8));
        assert!(!is_national_id("123456789", 7, 8));
        assert!(!is_national_id("1234567a", 7, 8));
        assert!(!is_national_id("", 7, 8));
        assert!(!is_national_id("1234567", 8, 8));
    }

    #[test]
    fn test_age_on_adjusts_for_birthday() {
        assert_eq!(age_on(date(2006, 3, 15), date(2024, 3, 14)), 17);
        assert_eq!(age_on(date(2006, 3, 15), date(2024, 3, 15)), 18);
        assert_eq!(age_on(date(2006, 3, 15), date(2024, 2, 28)), 17);
        assert_eq!(age_on(date(2000, 2, 29), date(2024, 2, 28)), 23);
        assert_eq!(age_on(date(2030, 1, 1), date(2024, 1, 1)), -6);
    }

    #[test]
    fn test_is_age_within() {
        let today = date(2024, 6, 1);
        assert!(is_age_within("2006-03-15", today, 16, 70));
        assert!(!is_age_within("2010-03-15", today, 16, 70));
        assert!(!is_age_within("1950-01-01", today, 16, 70));
        assert!(is_age_within("1954-06-01", today, 16, 70));
        assert!(!is_age_within("2030-01-01", today, 0, 70));
        assert!(!is_age_within("15/03/2006", today, 16, 70));
        assert!(!is_age_within("", today, 16, 70));
    }

    #[test]
    fn test_is_kcse_year() {
        let today = date(2024, 6, 1);
        assert!(is_kcse_year("1990", today, 1990));
        assert!(is_kcse_year("2025", today, 1990));
        assert!(!is_kcse_year("2026", today, 1990));
        assert!(!is_kcse_year("1989", today, 1990));
        assert!(!is_kcse_year("twenty", today, 1990));
    }

    #[test]
    fn test_required_fields_are_in_form_order() {
        let mut sorted = REQUIRED_FIELDS;
        sorted.sort();
        assert_eq!(sorted, REQUIRED_FIELDS);
    }
}
