//! # Locale Formatting
//!
//! Currency, number and date rendering for Arabic-speaking stores.
//!
//! ```text
//! format_currency(123450)           → "1,234.50 ج.م"
//! format_currency(123450) [arab]    → "١٬٢٣٤٫٥٠ ج.م"
//! format_date(2026-03-05)           → "5 مارس 2026"
//! format_datetime(2026-03-05 14:07) → "5 مارس 2026 - 14:07"
//! ```
//!
//! All functions are pure; the locale is passed explicitly.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

/// Arabic (Egyptian usage) month names, January first.
pub const ARABIC_MONTHS: [&str; 12] = [
    "يناير",
    "فبراير",
    "مارس",
    "أبريل",
    "مايو",
    "يونيو",
    "يوليو",
    "أغسطس",
    "سبتمبر",
    "أكتوبر",
    "نوفمبر",
    "ديسمبر",
];

// =============================================================================
// Locale
// =============================================================================

/// Which digit glyphs to emit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DigitStyle {
    /// 0123456789
    #[default]
    Latin,
    /// ٠١٢٣٤٥٦٧٨٩
    ArabicIndic,
}

/// How dates are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DateStyle {
    /// `5 مارس 2026`
    #[default]
    Arabic,
    /// `2026-03-05`
    Iso,
}

/// Formatting conventions for one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct Locale {
    /// Appended after amounts, separated by a space.
    pub currency_suffix: String,
    pub thousands_separator: char,
    pub decimal_separator: char,
    pub digits: DigitStyle,
    pub date_style: DateStyle,
}

impl Default for Locale {
    /// Egyptian pound with Latin digits.
    fn default() -> Self {
        Locale {
            currency_suffix: "ج.م".to_string(),
            thousands_separator: ',',
            decimal_separator: '.',
            digits: DigitStyle::Latin,
            date_style: DateStyle::Arabic,
        }
    }
}

impl Locale {
    /// Egyptian pound with Arabic-Indic digits and Arabic separators.
    pub fn arabic_indic() -> Self {
        Locale {
            thousands_separator: '٬',
            decimal_separator: '٫',
            digits: DigitStyle::ArabicIndic,
            ..Locale::default()
        }
    }

    /// Maps ASCII digits to the configured glyphs.
    fn localize_digits(&self, text: &str) -> String {
        match self.digits {
            DigitStyle::Latin => text.to_string(),
            DigitStyle::ArabicIndic => text
                .chars()
                .map(|c| match c.to_digit(10) {
                    Some(d) if c.is_ascii_digit() => {
                        char::from_u32(0x0660 + d).unwrap_or(c)
                    }
                    _ => c,
                })
                .collect(),
        }
    }
}

// =============================================================================
// Numbers and Currency
// =============================================================================

/// Groups the digits of a non-negative integer in threes.
fn group_thousands(value: u64, separator: char) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(separator);
        }
        out.push(c);
    }
    out
}

/// Integer with thousands separators.
pub fn format_number(value: i64, locale: &Locale) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let grouped = group_thousands(value.unsigned_abs(), locale.thousands_separator);
    locale.localize_digits(&format!("{sign}{grouped}"))
}

/// Amount with separators, two decimals and the currency suffix.
///
/// ```rust
/// use khalifa_core::format::{format_currency, Locale};
/// use khalifa_core::Money;
///
/// let locale = Locale::default();
/// assert_eq!(format_currency(Money::from_minor(123_450), &locale), "1,234.50 ج.م");
/// ```
pub fn format_currency(amount: Money, locale: &Locale) -> String {
    format!(
        "{} {}",
        format_amount(amount, locale),
        locale.currency_suffix
    )
}

/// Like [`format_currency`] without the suffix. Used in table cells.
pub fn format_amount(amount: Money, locale: &Locale) -> String {
    let sign = if amount.is_negative() { "-" } else { "" };
    let major = group_thousands(amount.major_part().unsigned_abs(), locale.thousands_separator);
    let text = format!(
        "{sign}{major}{}{:02}",
        locale.decimal_separator,
        amount.minor_part()
    );
    locale.localize_digits(&text)
}

// =============================================================================
// Dates
// =============================================================================

/// Arabic month name for a 1-based month number.
pub fn arabic_month_name(month: u32) -> Option<&'static str> {
    ARABIC_MONTHS.get(month.checked_sub(1)? as usize).copied()
}

/// Calendar date in the locale's style.
pub fn format_date(date: NaiveDate, locale: &Locale) -> String {
    let text = match locale.date_style {
        DateStyle::Arabic => format!(
            "{} {} {}",
            date.day(),
            arabic_month_name(date.month()).unwrap_or_default(),
            date.year()
        ),
        DateStyle::Iso => date.format("%Y-%m-%d").to_string(),
    };
    locale.localize_digits(&text)
}

/// Date followed by ` - HH:MM`.
pub fn format_datetime(datetime: NaiveDateTime, locale: &Locale) -> String {
    let time = locale.localize_digits(&datetime.format("%H:%M").to_string());
    format!("{} - {}", format_date(datetime.date(), locale), time)
}

/// `مارس 2026`, used as report period headings.
pub fn format_month(year: i32, month: u32, locale: &Locale) -> String {
    let text = format!("{} {}", arabic_month_name(month).unwrap_or_default(), year);
    locale.localize_digits(&text)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_format_currency() {
        let locale = Locale::default();
        assert_eq!(format_currency(Money::from_minor(123_450), &locale), "1,234.50 ج.م");
        assert_eq!(format_currency(Money::zero(), &locale), "0.00 ج.م");
        assert_eq!(format_currency(Money::from_minor(5997), &locale), "59.97 ج.م");
        assert_eq!(
            format_currency(Money::from_minor(-123_456_789), &locale),
            "-1,234,567.89 ج.م"
        );
    }

    #[test]
    fn test_format_currency_arabic_indic() {
        let locale = Locale::arabic_indic();
        assert_eq!(format_currency(Money::from_minor(123_450), &locale), "١٬٢٣٤٫٥٠ ج.م");
    }

    #[test]
    fn test_format_number() {
        let locale = Locale::default();
        assert_eq!(format_number(0, &locale), "0");
        assert_eq!(format_number(999, &locale), "999");
        assert_eq!(format_number(1000, &locale), "1,000");
        assert_eq!(format_number(-1_234_567, &locale), "-1,234,567");
    }

    #[test]
    fn test_arabic_month_names() {
        assert_eq!(arabic_month_name(1), Some("يناير"));
        assert_eq!(arabic_month_name(12), Some("ديسمبر"));
        assert_eq!(arabic_month_name(0), None);
        assert_eq!(arabic_month_name(13), None);
    }

    #[test]
    fn test_format_date() {
        let locale = Locale::default();
        assert_eq!(format_date(date(2026, 3, 5), &locale), "5 مارس 2026");

        let iso = Locale {
            date_style: DateStyle::Iso,
            ..Locale::default()
        };
        assert_eq!(format_date(date(2026, 3, 5), &iso), "2026-03-05");
    }

    #[test]
    fn test_format_datetime() {
        let dt = date(2026, 8, 17).and_hms_opt(14, 7, 0).unwrap();
        assert_eq!(format_datetime(dt, &Locale::default()), "17 أغسطس 2026 - 14:07");
    }

    #[test]
    fn test_format_month() {
        assert_eq!(format_month(2026, 11, &Locale::default()), "نوفمبر 2026");
    }
}
