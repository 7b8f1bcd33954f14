//! # Report Records
//!
//! Plain records returned by the storage layer's aggregate queries and
//! consumed by the export generators. Derived figures (averages, margins,
//! net amounts) are computed here so storage only sums columns.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ledger::{AgingBucket, DebtAging, PaymentStatus};
use crate::money::{Money, Rate};
use crate::stock::StockStatus;
use crate::types::ReturnStatus;

// =============================================================================
// Sales
// =============================================================================

/// Sales over a closed date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesSummary {
    #[ts(as = "String")]
    pub from: NaiveDate,
    #[ts(as = "String")]
    pub to: NaiveDate,
    pub invoice_count: i64,
    /// Σ invoice totals.
    pub total_sales: Money,
    /// Σ payments applied to those invoices.
    pub collected: Money,
    /// Σ return credits against those invoices.
    pub returns: Money,
    pub outstanding: Money,
    pub average_invoice: Money,
    /// collected / (sales − returns), in basis points.
    pub collection_rate_bps: i64,
}

impl SalesSummary {
    pub fn new(
        from: NaiveDate,
        to: NaiveDate,
        invoice_count: i64,
        total_sales: Money,
        collected: Money,
        returns: Money,
    ) -> Self {
        let net = total_sales - returns;
        let average_invoice = if invoice_count > 0 {
            Money::from_minor(div_round(total_sales.minor(), invoice_count))
        } else {
            Money::zero()
        };

        SalesSummary {
            from,
            to,
            invoice_count,
            total_sales,
            collected,
            returns,
            outstanding: net - collected,
            average_invoice,
            collection_rate_bps: Rate::ratio(collected, net),
        }
    }
}

/// One calendar month of sales.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MonthlySales {
    pub year: i32,
    pub month: u32,
    pub invoice_count: i64,
    pub total_sales: Money,
    pub collected: Money,
}

/// One day of sales.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DailySales {
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub invoice_count: i64,
    pub total_sales: Money,
}

/// Row of an invoice listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceSummary {
    pub id: String,
    pub number: String,
    #[ts(as = "String")]
    pub invoice_date: NaiveDate,
    pub customer_id: String,
    pub customer_name: String,
    pub total: Money,
    pub returned: Money,
    pub paid: Money,
}

impl InvoiceSummary {
    pub fn remaining(&self) -> Money {
        self.total - self.returned - self.paid
    }

    pub fn payment_status(&self) -> PaymentStatus {
        PaymentStatus::from_amounts(self.total - self.returned, self.paid)
    }
}

/// Row of a returns listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnSummary {
    pub id: String,
    pub number: String,
    #[ts(as = "String")]
    pub return_date: NaiveDate,
    pub invoice_number: String,
    pub customer_name: String,
    pub item_count: i64,
    pub credit: Money,
    pub refund: Money,
    pub status: ReturnStatus,
    pub reason: Option<String>,
}

// =============================================================================
// Products and Inventory
// =============================================================================

/// Stock position of the whole catalogue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventorySummary {
    pub product_count: i64,
    pub total_units: i64,
    /// Σ quantity × cost price over products with positive stock.
    pub cost_value: Money,
    /// Σ quantity × selling price over products with positive stock.
    pub retail_value: Money,
    pub low_stock_count: i64,
    pub out_of_stock_count: i64,
}

/// Row of an inventory listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventoryLine {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    pub quantity: i64,
    pub min_stock: i64,
    pub price: Money,
    pub value: Money,
    pub status: StockStatus,
}

/// Best-selling product over a period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TopProduct {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub quantity_sold: i64,
    pub revenue: Money,
}

/// Sales grouped by product category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CategoryPerformance {
    /// `None` for uncategorised products.
    pub category: Option<String>,
    pub product_count: i64,
    pub quantity_sold: i64,
    pub revenue: Money,
}

/// Sales of one product over a period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductSales {
    pub product_id: String,
    pub quantity_sold: i64,
    pub revenue: Money,
    pub invoice_count: i64,
}

// =============================================================================
// Customers
// =============================================================================

/// Customer with a positive balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Debtor {
    pub customer_id: String,
    pub name: String,
    pub phone: String,
    pub balance: Money,
}

/// Customer ranked by purchases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TopCustomer {
    pub customer_id: String,
    pub name: String,
    pub invoice_count: i64,
    pub total_purchases: Money,
}

/// Unpaid invoice with its age.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AgedInvoice {
    pub invoice_id: String,
    pub number: String,
    pub customer_name: String,
    #[ts(as = "String")]
    pub invoice_date: NaiveDate,
    pub outstanding: Money,
    pub age_days: i64,
    pub bucket: AgingBucket,
}

/// Aging report: individual invoices plus per-bucket totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AgingReport {
    pub invoices: Vec<AgedInvoice>,
    pub totals: DebtAging,
}

impl AgingReport {
    pub fn push(&mut self, invoice: AgedInvoice) {
        self.totals.add(invoice.bucket, invoice.outstanding);
        self.invoices.push(invoice);
    }
}

// =============================================================================
// Financial
// =============================================================================

/// Profit and loss over a period.
///
/// ```text
/// gross_profit = sales − cost_of_goods
/// net_profit   = gross_profit − returns
/// margin       = net_profit / sales
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProfitLoss {
    #[ts(as = "String")]
    pub from: NaiveDate,
    #[ts(as = "String")]
    pub to: NaiveDate,
    pub sales: Money,
    pub collected: Money,
    pub cost_of_goods: Money,
    pub returns: Money,
    pub gross_profit: Money,
    pub net_profit: Money,
    pub margin_bps: i64,
}

impl ProfitLoss {
    pub fn new(
        from: NaiveDate,
        to: NaiveDate,
        sales: Money,
        collected: Money,
        cost_of_goods: Money,
        returns: Money,
    ) -> Self {
        let gross_profit = sales - cost_of_goods;
        let net_profit = gross_profit - returns;
        ProfitLoss {
            from,
            to,
            sales,
            collected,
            cost_of_goods,
            returns,
            gross_profit,
            net_profit,
            margin_bps: Rate::ratio(net_profit, sales),
        }
    }
}

/// Money in and out over a period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Cashflow {
    #[ts(as = "String")]
    pub from: NaiveDate,
    #[ts(as = "String")]
    pub to: NaiveDate,
    /// Payments received.
    pub inflow: Money,
    /// Refunds paid out.
    pub outflow: Money,
    pub net: Money,
}

impl Cashflow {
    pub fn new(from: NaiveDate, to: NaiveDate, inflow: Money, outflow: Money) -> Self {
        Cashflow {
            from,
            to,
            inflow,
            outflow,
            net: inflow - outflow,
        }
    }
}

/// Markup of a selling price over cost, in basis points. Zero cost gives 0.
pub fn markup_bps(price: Money, cost: Money) -> i64 {
    Rate::ratio(price - cost, cost)
}

/// Integer division rounded half away from zero.
fn div_round(numerator: i64, denominator: i64) -> i64 {
    let n = numerator as i128;
    let d = denominator as i128;
    let q = (n.abs() * 2 + d.abs()) / (d.abs() * 2);
    if (n < 0) != (d < 0) {
        -(q as i64)
    } else {
        q as i64
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, day).unwrap()
    }

    #[test]
    fn test_sales_summary_derived_fields() {
        let s = SalesSummary::new(
            d(1, 1),
            d(1, 31),
            3,
            Money::from_major(300),
            Money::from_major(150),
            Money::from_major(100),
        );
        assert_eq!(s.average_invoice, Money::from_major(100));
        assert_eq!(s.outstanding, Money::from_major(50));
        assert_eq!(s.collection_rate_bps, 7500);
    }

    #[test]
    fn test_sales_summary_empty_period() {
        let s = SalesSummary::new(d(1, 1), d(1, 31), 0, Money::zero(), Money::zero(), Money::zero());
        assert_eq!(s.average_invoice, Money::zero());
        assert_eq!(s.collection_rate_bps, 0);
    }

    #[test]
    fn test_profit_loss() {
        let pl = ProfitLoss::new(
            d(1, 1),
            d(1, 31),
            Money::from_major(1000),
            Money::from_major(800),
            Money::from_major(600),
            Money::from_major(100),
        );
        assert_eq!(pl.gross_profit, Money::from_major(400));
        assert_eq!(pl.net_profit, Money::from_major(300));
        assert_eq!(pl.margin_bps, 3000);
    }

    #[test]
    fn test_cashflow_and_markup() {
        let cf = Cashflow::new(d(1, 1), d(1, 31), Money::from_major(500), Money::from_major(120));
        assert_eq!(cf.net, Money::from_major(380));

        assert_eq!(markup_bps(Money::from_major(150), Money::from_major(100)), 5000);
        assert_eq!(markup_bps(Money::from_major(150), Money::zero()), 0);
    }

    #[test]
    fn test_div_round() {
        assert_eq!(div_round(10, 3), 3);
        assert_eq!(div_round(11, 2), 6);
        assert_eq!(div_round(-11, 2), -6);
    }

    #[test]
    fn test_invoice_summary_status() {
        let row = InvoiceSummary {
            id: "i".to_string(),
            number: "INV-2026-000001".to_string(),
            invoice_date: d(2, 1),
            customer_id: "c".to_string(),
            customer_name: "Ali".to_string(),
            total: Money::from_major(100),
            returned: Money::from_major(20),
            paid: Money::from_major(80),
        };
        assert_eq!(row.remaining(), Money::zero());
        assert_eq!(row.payment_status(), PaymentStatus::Paid);
    }

    #[test]
    fn test_aging_report_push() {
        let mut report = AgingReport::default();
        report.push(AgedInvoice {
            invoice_id: "i".to_string(),
            number: "INV-2026-000001".to_string(),
            customer_name: "Ali".to_string(),
            invoice_date: d(1, 1),
            outstanding: Money::from_major(70),
            age_days: 95,
            bucket: AgingBucket::Days90Plus,
        });
        assert_eq!(report.totals.days_90_plus, Money::from_major(70));
        assert_eq!(report.totals.total(), Money::from_major(70));
    }
}
