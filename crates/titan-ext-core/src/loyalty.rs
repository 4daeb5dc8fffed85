//! # Loyalty
//!
//! Special-customer discount and yearly cashback.
//!
//! ## Cashback Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  paid orders in year ──► purchases × cashback_bps ──► amount           │
//! │                                                                         │
//! │   ┌─────────┐  process   ┌───────────┐  reverse   ┌──────────┐         │
//! │   │ pending │──────────►│ processed │──────────►│ reversed │         │
//! │   └─────────┘            └───────────┘            └──────────┘         │
//! │                          account credit           account debit         │
//! │                                                                         │
//! │  One pending or processed row per customer/year. A reversed row        │
//! │  frees the period for a new calculation.                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{Customer, Rate};
use crate::validation::validate_year;

// =============================================================================
// Cashback Status
// =============================================================================

/// Status of a cashback history row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CashbackStatus {
    Pending,
    Processed,
    Reversed,
}

impl CashbackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CashbackStatus::Pending => "pending",
            CashbackStatus::Processed => "processed",
            CashbackStatus::Reversed => "reversed",
        }
    }

    /// Only `pending → processed → reversed` is allowed.
    pub fn transition(self, cashback_id: &str, to: CashbackStatus) -> CoreResult<CashbackStatus> {
        let allowed = matches!(
            (self, to),
            (CashbackStatus::Pending, CashbackStatus::Processed)
                | (CashbackStatus::Processed, CashbackStatus::Reversed)
        );

        if !allowed {
            return Err(CoreError::InvalidCashbackTransition {
                cashback_id: cashback_id.to_string(),
                from: self.to_string(),
                to: to.to_string(),
            });
        }
        Ok(to)
    }

    /// Whether a row in this status blocks a new one for the same period.
    pub fn blocks_new_entry(&self) -> bool {
        !matches!(self, CashbackStatus::Reversed)
    }
}

impl fmt::Display for CashbackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Records
// =============================================================================

/// One cashback calculation for a customer and year.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashbackEntry {
    pub id: String,
    pub customer_id: String,
    pub year: i32,
    pub purchases_cents: i64,
    pub rate_bps: i64,
    pub amount_cents: i64,
    pub status: CashbackStatus,
    #[ts(as = "Option<String>")]
    pub processed_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub reversed_at: Option<DateTime<Utc>>,
    pub reversal_reason: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl CashbackEntry {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

/// Cashback preview; nothing is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CashbackPreview {
    pub customer_id: String,
    pub year: i32,
    pub purchases_cents: i64,
    pub rate_bps: i64,
    pub amount_cents: i64,
    pub eligible: bool,
    /// Why the customer is not eligible, when they are not.
    pub reason: Option<String>,
}

impl CashbackPreview {
    /// Fails with `NotEligible` unless the preview qualifies.
    pub fn ensure_eligible(&self) -> CoreResult<()> {
        if self.eligible {
            return Ok(());
        }
        Err(CoreError::NotEligible {
            customer_id: self.customer_id.clone(),
            reason: self
                .reason
                .clone()
                .unwrap_or_else(|| "not eligible".to_string()),
        })
    }
}

/// Filter for cashback history.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CashbackFilter {
    pub customer_id: Option<String>,
    pub year: Option<i32>,
    pub status: Option<CashbackStatus>,
    pub limit: Option<u32>,
}

impl CashbackFilter {
    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(100).clamp(1, 1000)
    }
}

/// Count and amount for one status in a year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashbackStatusTotal {
    pub status: CashbackStatus,
    pub count: i64,
    pub amount_cents: i64,
}

/// Yearly cashback report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CashbackSummary {
    pub year: i32,
    pub by_status: Vec<CashbackStatusTotal>,
    pub total_count: i64,
    pub total_amount_cents: i64,
}

impl CashbackSummary {
    /// Builds a summary, listing every status even when it has no rows.
    pub fn from_totals(year: i32, totals: Vec<CashbackStatusTotal>) -> Self {
        let by_status: Vec<CashbackStatusTotal> = [
            CashbackStatus::Pending,
            CashbackStatus::Processed,
            CashbackStatus::Reversed,
        ]
        .into_iter()
        .map(|status| {
            totals
                .iter()
                .find(|t| t.status == status)
                .cloned()
                .unwrap_or(CashbackStatusTotal {
                    status,
                    count: 0,
                    amount_cents: 0,
                })
        })
        .collect();

        CashbackSummary {
            year,
            total_count: by_status.iter().map(|t| t.count).sum(),
            total_amount_cents: by_status.iter().map(|t| t.amount_cents).sum(),
            by_status,
        }
    }
}

// =============================================================================
// Calculations
// =============================================================================

/// `[Jan 1 00:00 UTC, next Jan 1 00:00 UTC)` for a calendar year.
///
/// ```rust
/// use titan_ext_core::loyalty::year_bounds;
///
/// let (start, end) = year_bounds(2026)?;
/// assert_eq!(start.to_rfc3339(), "2026-01-01T00:00:00+00:00");
/// assert_eq!(end.to_rfc3339(), "2027-01-01T00:00:00+00:00");
/// # Ok::<(), titan_ext_core::CoreError>(())
/// ```
pub fn year_bounds(year: i32) -> CoreResult<(DateTime<Utc>, DateTime<Utc>)> {
    validate_year(year)?;

    let start = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single();
    let end = Utc.with_ymd_and_hms(year + 1, 1, 1, 0, 0, 0).single();

    match (start, end) {
        (Some(start), Some(end)) => Ok((start, end)),
        _ => Err(ValidationError::InvalidFormat {
            field: "year".to_string(),
            reason: format!("{year} has no UTC start"),
        }
        .into()),
    }
}

/// Discount a customer gets on `subtotal`: the discount rate for special
/// customers, nothing otherwise.
pub fn special_discount(customer: &Customer, subtotal: Money, discount_rate: Rate) -> Money {
    if !customer.is_special || subtotal.is_negative() {
        return Money::zero();
    }
    subtotal.apply_rate(discount_rate)
}

/// Computes the cashback preview for a customer's yearly purchases.
///
/// Eligible when the customer is special, purchases reach the minimum and
/// the resulting amount is positive.
pub fn preview_cashback(
    customer: &Customer,
    year: i32,
    purchases: Money,
    rate: Rate,
    min_purchases: Money,
) -> CashbackPreview {
    let amount = purchases.apply_rate(rate);

    let reason = if !customer.is_special {
        Some("customer is not a special customer".to_string())
    } else if purchases < min_purchases {
        Some(format!("purchases {purchases} below minimum {min_purchases}"))
    } else if !amount.is_positive() {
        Some("cashback amount is zero".to_string())
    } else {
        None
    };

    CashbackPreview {
        customer_id: customer.id.clone(),
        year,
        purchases_cents: purchases.cents(),
        rate_bps: rate.bps() as i64,
        amount_cents: amount.cents(),
        eligible: reason.is_none(),
        reason,
    }
}

/// Refuses a new row when the period already has a pending or processed one.
pub fn ensure_no_open_entry(
    customer_id: &str,
    year: i32,
    existing: &[CashbackEntry],
) -> CoreResult<()> {
    match existing
        .iter()
        .find(|e| e.customer_id == customer_id && e.year == year && e.status.blocks_new_entry())
    {
        Some(open) => Err(CoreError::CashbackAlreadyExists {
            customer_id: customer_id.to_string(),
            year,
            status: open.status.to_string(),
        }),
        None => Ok(()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(is_special: bool) -> Customer {
        Customer {
            id: "cust-1".to_string(),
            name: "Ada".to_string(),
            email: None,
            is_special,
            account_balance_cents: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn entry(status: CashbackStatus) -> CashbackEntry {
        CashbackEntry {
            id: crate::new_id(),
            customer_id: "cust-1".to_string(),
            year: 2026,
            purchases_cents: 100_000,
            rate_bps: 200,
            amount_cents: 2_000,
            status,
            processed_at: None,
            reversed_at: None,
            reversal_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_cashback_transitions() {
        let s = CashbackStatus::Pending
            .transition("cb", CashbackStatus::Processed)
            .unwrap();
        let s = s.transition("cb", CashbackStatus::Reversed).unwrap();
        assert_eq!(s, CashbackStatus::Reversed);

        for (from, to) in [
            (CashbackStatus::Pending, CashbackStatus::Reversed),
            (CashbackStatus::Processed, CashbackStatus::Processed),
            (CashbackStatus::Processed, CashbackStatus::Pending),
            (CashbackStatus::Reversed, CashbackStatus::Processed),
        ] {
            assert!(matches!(
                from.transition("cb", to),
                Err(CoreError::InvalidCashbackTransition { .. })
            ));
        }
    }

    #[test]
    fn test_preview_eligible() {
        let preview = preview_cashback(
            &customer(true),
            2026,
            Money::from_cents(1_250_000),
            Rate::from_bps(200),
            Money::zero(),
        );
        assert!(preview.eligible);
        assert_eq!(preview.amount_cents, 25_000);
        assert!(preview.ensure_eligible().is_ok());
    }

    #[test]
    fn test_preview_not_special() {
        let preview = preview_cashback(
            &customer(false),
            2026,
            Money::from_cents(1_250_000),
            Rate::from_bps(200),
            Money::zero(),
        );
        assert!(!preview.eligible);
        assert!(matches!(
            preview.ensure_eligible(),
            Err(CoreError::NotEligible { .. })
        ));
    }

    #[test]
    fn test_preview_below_minimum_and_zero_amount() {
        let preview = preview_cashback(
            &customer(true),
            2026,
            Money::from_cents(5_000),
            Rate::from_bps(200),
            Money::from_cents(10_000),
        );
        assert!(!preview.eligible);

        let preview = preview_cashback(
            &customer(true),
            2026,
            Money::zero(),
            Rate::from_bps(200),
            Money::zero(),
        );
        assert!(!preview.eligible);
        assert_eq!(preview.reason.as_deref(), Some("cashback amount is zero"));
    }

    #[test]
    fn test_special_discount() {
        let subtotal = Money::from_cents(10_000);
        let rate = Rate::from_bps(500);
        assert_eq!(special_discount(&customer(true), subtotal, rate).cents(), 500);
        assert_eq!(special_discount(&customer(false), subtotal, rate).cents(), 0);
    }

    #[test]
    fn test_open_entry_blocks_new() {
        assert!(ensure_no_open_entry("cust-1", 2026, &[]).is_ok());
        assert!(ensure_no_open_entry("cust-1", 2026, &[entry(CashbackStatus::Reversed)]).is_ok());
        assert!(matches!(
            ensure_no_open_entry("cust-1", 2026, &[entry(CashbackStatus::Processed)]),
            Err(CoreError::CashbackAlreadyExists { .. })
        ));
        assert!(ensure_no_open_entry("cust-1", 2025, &[entry(CashbackStatus::Pending)]).is_ok());
    }

    #[test]
    fn test_year_bounds_rejects_out_of_range() {
        assert!(year_bounds(1999).is_err());
        let (start, end) = year_bounds(2024).unwrap();
        assert_eq!((end - start).num_days(), 366);
    }

    #[test]
    fn test_summary_lists_every_status() {
        let summary = CashbackSummary::from_totals(
            2026,
            vec![CashbackStatusTotal {
                status: CashbackStatus::Processed,
                count: 2,
                amount_cents: 4_000,
            }],
        );
        assert_eq!(summary.by_status.len(), 3);
        assert_eq!(summary.by_status[0].count, 0);
        assert_eq!(summary.total_count, 2);
        assert_eq!(summary.total_amount_cents, 4_000);
    }
}
