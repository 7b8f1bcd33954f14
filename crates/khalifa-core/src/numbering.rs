//! Human-readable document numbers and generated SKUs.
//!
//! Sequence allocation happens in storage (inside the write transaction);
//! this module only renders and parses the formats.

use chrono::NaiveDateTime;

/// Prefix of invoice numbers.
pub const INVOICE_PREFIX: &str = "INV";

/// Prefix of return numbers.
pub const RETURN_PREFIX: &str = "RET";

/// `INV-2026-000042`
pub fn invoice_number(year: i32, sequence: i64) -> String {
    document_number(INVOICE_PREFIX, year, sequence)
}

/// `RET-2026-000007`
pub fn return_number(year: i32, sequence: i64) -> String {
    document_number(RETURN_PREFIX, year, sequence)
}

fn document_number(prefix: &str, year: i32, sequence: i64) -> String {
    format!("{prefix}-{year}-{sequence:06}")
}

/// Extracts the sequence part of a document number.
pub fn parse_sequence(number: &str) -> Option<i64> {
    let mut parts = number.splitn(3, '-');
    let _prefix = parts.next()?;
    let _year: i32 = parts.next()?.parse().ok()?;
    parts.next()?.parse().ok()
}

/// Suggests a SKU from a product name and category.
///
/// First three ASCII letters/digits of the name, first two of the category,
/// then the hour and minute of `at`. Names without Latin characters fall
/// back to `PRD`.
pub fn generate_sku(name: &str, category: Option<&str>, at: NaiveDateTime) -> String {
    let ascii_prefix = |text: &str, n: usize| -> String {
        text.chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(n)
            .collect::<String>()
            .to_ascii_uppercase()
    };

    let mut name_part = ascii_prefix(name, 3);
    if name_part.is_empty() {
        name_part = "PRD".to_string();
    }
    let category_part = category.map(|c| ascii_prefix(c, 2)).unwrap_or_default();

    format!("{}{}{}", name_part, category_part, at.format("%H%M"))
}
