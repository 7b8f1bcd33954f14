//! # Validation Module
//!
//! Input validation for everything that reaches storage.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: UI form checks (external)                                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE, called from `*Input::validated()` and the       │
//! │           invoice/return drafts                                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite NOT NULL / UNIQUE / CHECK / FOREIGN KEY constraints   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use khalifa_core::validation::{normalize_phone, validate_sku};
//!
//! assert!(validate_sku("TEA-100").is_ok());
//! assert_eq!(normalize_phone("010-1234 5678").unwrap(), "01012345678");
//! ```

use crate::error::ValidationError;
use crate::money::{Money, Rate};
use crate::{MAX_INVOICE_LINES, MAX_ITEM_QUANTITY, MAX_MONEY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest customer name accepted.
pub const MAX_NAME_LEN: usize = 100;

/// Longest product name accepted.
pub const MAX_PRODUCT_NAME_LEN: usize = 200;

/// Longest SKU accepted.
pub const MAX_SKU_LEN: usize = 50;

/// Phone numbers carry between this many digits...
pub const MIN_PHONE_DIGITS: usize = 10;
/// ...and this many.
pub const MAX_PHONE_DIGITS: usize = 15;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Only ASCII letters, digits, hyphens and underscores
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::required("sku"));
    }

    if sku.chars().count() > MAX_SKU_LEN {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: MAX_SKU_LEN,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::invalid(
            "sku",
            "must contain only letters, numbers, hyphens, and underscores",
        ));
    }

    Ok(())
}

/// Validates a required free-text name. Length is counted in characters so
/// Arabic names are measured the way users see them.
pub fn validate_name(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a phone number and returns its digits.
///
/// Spaces, hyphens and parentheses are stripped; what remains must be
/// 10-15 ASCII digits.
pub fn normalize_phone(phone: &str) -> ValidationResult<String> {
    let digits: String = phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();

    if digits.is_empty() {
        return Err(ValidationError::required("phone"));
    }

    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::invalid("phone", "must contain only digits"));
    }

    if !(MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits.len()) {
        return Err(ValidationError::invalid(
            "phone",
            format!("must have {MIN_PHONE_DIGITS}-{MAX_PHONE_DIGITS} digits"),
        ));
    }

    Ok(digits)
}

/// Structural email check: `local@domain.tld` with a 2+ letter TLD.
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let invalid = || ValidationError::invalid("email", "must look like name@example.com");

    let (local, domain) = email.trim().split_once('@').ok_or_else(invalid)?;

    let local_ok = !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._%+-".contains(c));
    let domain_ok = domain
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    let tld_ok = domain
        .rsplit_once('.')
        .map(|(host, tld)| {
            !host.is_empty() && tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
        })
        .unwrap_or(false);

    if local_ok && domain_ok && tld_ok {
        Ok(())
    } else {
        Err(invalid())
    }
}

/// Validates a search query and returns it trimmed. Empty means "all".
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.chars().count() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates an invoice line quantity: 1..=MAX_ITEM_QUANTITY.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a stock count or threshold (zero allowed).
pub fn validate_stock_level(field: &str, value: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a price-like amount: zero up to [`MAX_MONEY`].
pub fn validate_non_negative_money(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }
    validate_money_limit(field, amount)
}

/// Validates a payment amount: positive, at most [`MAX_MONEY`].
pub fn validate_payment_amount(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "payment amount".to_string(),
        });
    }
    validate_money_limit("payment amount", amount)
}

fn validate_money_limit(field: &str, amount: Money) -> ValidationResult<()> {
    if amount > MAX_MONEY {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_MONEY.minor(),
        });
    }
    Ok(())
}

/// Validates a discount or tax rate: 0% to 100%.
pub fn validate_rate(field: &str, rate: Rate) -> ValidationResult<()> {
    if rate.bps() > Rate::FULL_BPS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: Rate::FULL_BPS as i64,
        });
    }
    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates that one more line fits on an invoice.
pub fn validate_line_capacity(current_lines: usize) -> ValidationResult<()> {
    if current_lines >= MAX_INVOICE_LINES {
        return Err(ValidationError::OutOfRange {
            field: "invoice lines".to_string(),
            min: 1,
            max: MAX_INVOICE_LINES as i64,
        });
    }
    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string.
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::required(field));
    }

    uuid::Uuid::parse_str(id)
        .map_err(|_| ValidationError::invalid(field, "must be a valid UUID"))?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("TEA-100").is_ok());
        assert!(validate_sku("abc_12").is_ok());

        assert!(validate_sku("").is_err());
        assert!(validate_sku("   ").is_err());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku("شاي").is_err());
        assert!(validate_sku(&"A".repeat(51)).is_err());
    }

    #[test]
    fn test_validate_name_counts_characters() {
        assert!(validate_name("name", "مكينة قهوة", 10).is_ok());
        assert!(validate_name("name", "", 10).is_err());
        assert!(validate_name("name", &"ب".repeat(11), 10).is_err());
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("01012345678").unwrap(), "01012345678");
        assert_eq!(normalize_phone("(02) 2345-6789").unwrap(), "0223456789");

        assert_eq!(normalize_phone("").unwrap_err(), ValidationError::required("phone"));
        assert!(normalize_phone("12345").is_err());
        assert!(normalize_phone("0101234567890123").is_err());
        assert!(normalize_phone("+201012345678").is_err());
        assert!(normalize_phone("0101234abcd").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("ali@example.com").is_ok());
        assert!(validate_email("a.b+c@mail.example.eg").is_ok());

        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("ali@example").is_err());
        assert!(validate_email("ali@example.c").is_err());
        assert!(validate_email("ali@.com").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_ITEM_QUANTITY).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(MAX_ITEM_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_money_and_rate_validators() {
        assert!(validate_non_negative_money("price", Money::zero()).is_ok());
        assert!(validate_non_negative_money("price", Money::from_minor(-1)).is_err());
        assert!(validate_payment_amount(Money::zero()).is_err());
        assert!(validate_non_negative_money("price", MAX_MONEY).is_ok());
        assert!(matches!(
            validate_non_negative_money("price", Money::from_minor(MAX_MONEY.minor() + 1)),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(validate_payment_amount(Money::from_minor(i64::MAX)).is_err());
        assert!(validate_rate("tax", Rate::from_bps(10_000)).is_ok());
        assert!(validate_rate("tax", Rate::from_bps(10_001)).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("id", "").is_err());
        assert!(validate_uuid("id", "not-a-uuid").is_err());
    }
}
