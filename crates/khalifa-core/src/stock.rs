//! # Stock Rules
//!
//! Stock classification and the oversell policy applied when an invoice
//! sells more than is on hand.
//!
//! ```text
//!   quantity ≤ 0               → Out
//!   0 < quantity < min_stock   → Low
//!   quantity ≥ min_stock       → Ok
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};

// =============================================================================
// Stock Status
// =============================================================================

/// Derived stock level of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    Ok,
    Low,
    Out,
}

impl StockStatus {
    /// Arabic label used on reports.
    pub fn label_ar(&self) -> &'static str {
        match self {
            StockStatus::Ok => "متوفر",
            StockStatus::Low => "مخزون منخفض",
            StockStatus::Out => "غير متوفر",
        }
    }
}

/// Classifies a stock level against its minimum threshold.
///
/// ```rust
/// use khalifa_core::stock::{classify_stock, StockStatus};
///
/// assert_eq!(classify_stock(2, 5), StockStatus::Low);
/// assert_eq!(classify_stock(0, 5), StockStatus::Out);
/// assert_eq!(classify_stock(5, 5), StockStatus::Ok);
/// ```
pub fn classify_stock(quantity: i64, min_stock: i64) -> StockStatus {
    if quantity <= 0 {
        StockStatus::Out
    } else if quantity < min_stock {
        StockStatus::Low
    } else {
        StockStatus::Ok
    }
}

// =============================================================================
// Oversell Policy
// =============================================================================

/// What happens when an invoice line asks for more than is in stock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OversellPolicy {
    /// Commit the sale, let stock go negative and report a [`StockWarning`].
    #[default]
    Warn,
    /// Refuse the whole invoice with [`CoreError::InsufficientStock`].
    Reject,
}

impl fmt::Display for OversellPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OversellPolicy::Warn => write!(f, "warn"),
            OversellPolicy::Reject => write!(f, "reject"),
        }
    }
}

impl FromStr for OversellPolicy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "warn" => Ok(OversellPolicy::Warn),
            "reject" => Ok(OversellPolicy::Reject),
            _ => Err(ValidationError::NotAllowed {
                field: "oversell".to_string(),
                allowed: vec!["warn".to_string(), "reject".to_string()],
            }),
        }
    }
}

/// Reported for every line that drove a product's stock below zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockWarning {
    pub product_id: String,
    pub sku: String,
    /// Stock before the sale.
    pub available: i64,
    pub requested: i64,
    /// Stock after the sale (negative).
    pub resulting: i64,
}

/// Applies the oversell policy to one sale of `requested` units.
///
/// Returns `Ok(None)` when stock covers the sale, `Ok(Some(warning))` when
/// it does not and the policy is `Warn`, and an error under `Reject`.
pub fn check_sale(
    policy: OversellPolicy,
    product_id: &str,
    sku: &str,
    available: i64,
    requested: i64,
) -> CoreResult<Option<StockWarning>> {
    let resulting = available - requested;
    if resulting >= 0 {
        return Ok(None);
    }

    match policy {
        OversellPolicy::Warn => Ok(Some(StockWarning {
            product_id: product_id.to_string(),
            sku: sku.to_string(),
            available,
            requested,
            resulting,
        })),
        OversellPolicy::Reject => Err(CoreError::InsufficientStock {
            sku: sku.to_string(),
            available,
            requested,
        }),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_stock() {
        assert_eq!(classify_stock(2, 5), StockStatus::Low);
        assert_eq!(classify_stock(0, 5), StockStatus::Out);
        assert_eq!(classify_stock(-3, 5), StockStatus::Out);
        assert_eq!(classify_stock(5, 5), StockStatus::Ok);
        assert_eq!(classify_stock(50, 5), StockStatus::Ok);
        assert_eq!(classify_stock(1, 0), StockStatus::Ok);
    }

    #[test]
    fn test_check_sale_within_stock() {
        assert_eq!(check_sale(OversellPolicy::Reject, "p", "SKU", 5, 5).unwrap(), None);
    }

    #[test]
    fn test_check_sale_warns() {
        let warning = check_sale(OversellPolicy::Warn, "p", "SKU", 3, 5)
            .unwrap()
            .unwrap();
        assert_eq!(warning.resulting, -2);
        assert_eq!(warning.available, 3);
    }

    #[test]
    fn test_check_sale_rejects() {
        let err = check_sale(OversellPolicy::Reject, "p", "SKU", 3, 5).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientStock { available: 3, .. }));
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("Reject".parse::<OversellPolicy>().unwrap(), OversellPolicy::Reject);
        assert_eq!("warn".parse::<OversellPolicy>().unwrap(), OversellPolicy::Warn);
        assert!("allow".parse::<OversellPolicy>().is_err());
    }
}
