//! # Customer Ledger
//!
//! Balance, statement, payment status and debt aging. All values here are
//! computed from invoice, payment and return records; none are stored.
//!
//! ## Balance
//! ```text
//! balance = Σ invoice totals
//!         − Σ payments
//!         − Σ return credits
//!         + Σ refunds paid out
//!
//! invoice 100.00               → 100.00
//! payment  40.00               →  60.00
//! invoice  20.00               →  80.00
//! ```
//! A positive balance is money the customer owes the store.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{Money, Rate};

// =============================================================================
// Ledger Entries
// =============================================================================

/// Kind of movement on a customer's account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    Invoice,
    Payment,
    ReturnCredit,
    Refund,
}

impl LedgerKind {
    pub fn label_ar(&self) -> &'static str {
        match self {
            LedgerKind::Invoice => "فاتورة",
            LedgerKind::Payment => "دفعة",
            LedgerKind::ReturnCredit => "مرتجع",
            LedgerKind::Refund => "استرداد",
        }
    }
}

/// One movement on a customer's account. `amount` is always positive; the
/// kind decides the sign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LedgerEntry {
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub kind: LedgerKind,
    /// Invoice / return number, or payment id.
    pub reference: String,
    pub amount: Money,
}

impl LedgerEntry {
    pub fn new(date: NaiveDate, kind: LedgerKind, reference: impl Into<String>, amount: Money) -> Self {
        LedgerEntry {
            date,
            kind,
            reference: reference.into(),
            amount,
        }
    }

    /// Effect of this entry on the balance.
    pub fn signed_amount(&self) -> Money {
        match self.kind {
            LedgerKind::Invoice | LedgerKind::Refund => self.amount,
            LedgerKind::Payment | LedgerKind::ReturnCredit => -self.amount,
        }
    }
}

/// Outstanding balance over a set of entries.
///
/// ```rust
/// use chrono::NaiveDate;
/// use khalifa_core::ledger::{customer_balance, LedgerEntry, LedgerKind};
/// use khalifa_core::Money;
///
/// let d = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
/// let entries = [
///     LedgerEntry::new(d, LedgerKind::Invoice, "INV-2026-000001", Money::from_major(100)),
///     LedgerEntry::new(d, LedgerKind::Payment, "p1", Money::from_major(40)),
/// ];
/// assert_eq!(customer_balance(&entries), Money::from_major(60));
/// ```
pub fn customer_balance(entries: &[LedgerEntry]) -> Money {
    entries.iter().map(LedgerEntry::signed_amount).sum()
}

/// A statement row: the entry and the balance right after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StatementLine {
    pub entry: LedgerEntry,
    pub balance: Money,
}

/// Running balance over entries, in the order given.
pub fn statement(entries: Vec<LedgerEntry>) -> Vec<StatementLine> {
    let mut balance = Money::zero();
    entries
        .into_iter()
        .map(|entry| {
            balance += entry.signed_amount();
            StatementLine { entry, balance }
        })
        .collect()
}

// =============================================================================
// Payment Status
// =============================================================================

/// How much of an invoice has been settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Partial,
    Unpaid,
}

impl PaymentStatus {
    /// Status of an amount due against what was paid toward it.
    pub fn from_amounts(due: Money, paid: Money) -> Self {
        if paid >= due {
            PaymentStatus::Paid
        } else if !paid.is_positive() {
            PaymentStatus::Unpaid
        } else {
            PaymentStatus::Partial
        }
    }

    pub fn label_ar(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "مدفوع بالكامل",
            PaymentStatus::Partial => "مدفوع جزئياً",
            PaymentStatus::Unpaid => "غير مدفوع",
        }
    }
}

/// Share of `due` covered by `paid`, in basis points, capped at 100%.
pub fn paid_share_bps(due: Money, paid: Money) -> i64 {
    Rate::ratio(paid, due).clamp(0, Rate::FULL_BPS as i64)
}

/// Date a payment falls due given credit terms in days.
pub fn due_date(invoice_date: NaiveDate, terms_days: i64) -> NaiveDate {
    invoice_date + Duration::days(terms_days)
}

// =============================================================================
// Debt Aging
// =============================================================================

/// Age bracket of an unpaid invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AgingBucket {
    /// Under 30 days.
    Current,
    /// 30-59 days.
    Days30,
    /// 60-89 days.
    Days60,
    /// 90 days and older.
    Days90Plus,
}

impl AgingBucket {
    pub fn label_ar(&self) -> &'static str {
        match self {
            AgingBucket::Current => "أقل من 30 يوم",
            AgingBucket::Days30 => "30 - 60 يوم",
            AgingBucket::Days60 => "60 - 90 يوم",
            AgingBucket::Days90Plus => "أكثر من 90 يوم",
        }
    }
}

/// Buckets an invoice by its age on `today`. Future dates count as current.
pub fn debt_age_bucket(invoice_date: NaiveDate, today: NaiveDate) -> AgingBucket {
    match (today - invoice_date).num_days() {
        d if d < 30 => AgingBucket::Current,
        d if d < 60 => AgingBucket::Days30,
        d if d < 90 => AgingBucket::Days60,
        _ => AgingBucket::Days90Plus,
    }
}

/// Outstanding amounts summed per aging bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DebtAging {
    pub current: Money,
    pub days_30: Money,
    pub days_60: Money,
    pub days_90_plus: Money,
}

impl DebtAging {
    pub fn add(&mut self, bucket: AgingBucket, amount: Money) {
        match bucket {
            AgingBucket::Current => self.current += amount,
            AgingBucket::Days30 => self.days_30 += amount,
            AgingBucket::Days60 => self.days_60 += amount,
            AgingBucket::Days90Plus => self.days_90_plus += amount,
        }
    }

    pub fn total(&self) -> Money {
        self.current + self.days_30 + self.days_60 + self.days_90_plus
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    #[test]
    fn test_balance_invoice_payment_invoice() {
        let mut entries = vec![
            LedgerEntry::new(day(1), LedgerKind::Invoice, "INV-1", Money::from_major(100)),
            LedgerEntry::new(day(2), LedgerKind::Payment, "p1", Money::from_major(40)),
        ];
        assert_eq!(customer_balance(&entries), Money::from_major(60));

        entries.push(LedgerEntry::new(day(3), LedgerKind::Invoice, "INV-2", Money::from_major(20)));
        assert_eq!(customer_balance(&entries), Money::from_major(80));
    }

    #[test]
    fn test_sale_then_full_return_nets_to_zero() {
        let entries = [
            LedgerEntry::new(day(1), LedgerKind::Invoice, "INV-1", Money::from_major(100)),
            LedgerEntry::new(day(1), LedgerKind::Payment, "p1", Money::from_major(100)),
            LedgerEntry::new(day(5), LedgerKind::ReturnCredit, "RET-1", Money::from_major(100)),
            LedgerEntry::new(day(5), LedgerKind::Refund, "RET-1", Money::from_major(100)),
        ];
        assert_eq!(customer_balance(&entries), Money::zero());
    }

    #[test]
    fn test_statement_running_balance() {
        let lines = statement(vec![
            LedgerEntry::new(day(1), LedgerKind::Invoice, "INV-1", Money::from_major(100)),
            LedgerEntry::new(day(2), LedgerKind::Payment, "p1", Money::from_major(40)),
            LedgerEntry::new(day(3), LedgerKind::Invoice, "INV-2", Money::from_major(20)),
        ]);
        let balances: Vec<i64> = lines.iter().map(|l| l.balance.major_part()).collect();
        assert_eq!(balances, vec![100, 60, 80]);
    }

    #[test]
    fn test_payment_status() {
        let due = Money::from_major(100);
        assert_eq!(PaymentStatus::from_amounts(due, Money::zero()), PaymentStatus::Unpaid);
        assert_eq!(PaymentStatus::from_amounts(due, Money::from_major(40)), PaymentStatus::Partial);
        assert_eq!(PaymentStatus::from_amounts(due, due), PaymentStatus::Paid);
        assert_eq!(PaymentStatus::from_amounts(Money::zero(), Money::zero()), PaymentStatus::Paid);
        assert_eq!(paid_share_bps(due, Money::from_major(40)), 4000);
        assert_eq!(paid_share_bps(due, Money::from_major(150)), 10_000);
    }

    #[test]
    fn test_debt_age_buckets() {
        let today = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        let ago = |d: i64| today - Duration::days(d);

        assert_eq!(debt_age_bucket(ago(0), today), AgingBucket::Current);
        assert_eq!(debt_age_bucket(ago(29), today), AgingBucket::Current);
        assert_eq!(debt_age_bucket(ago(30), today), AgingBucket::Days30);
        assert_eq!(debt_age_bucket(ago(60), today), AgingBucket::Days60);
        assert_eq!(debt_age_bucket(ago(89), today), AgingBucket::Days60);
        assert_eq!(debt_age_bucket(ago(90), today), AgingBucket::Days90Plus);
        assert_eq!(debt_age_bucket(today + Duration::days(3), today), AgingBucket::Current);
    }

    #[test]
    fn test_debt_aging_totals() {
        let mut aging = DebtAging::default();
        aging.add(AgingBucket::Current, Money::from_major(10));
        aging.add(AgingBucket::Days90Plus, Money::from_major(5));
        assert_eq!(aging.total(), Money::from_major(15));
    }

    #[test]
    fn test_due_date() {
        assert_eq!(due_date(day(1), 30), day(31));
    }
}
