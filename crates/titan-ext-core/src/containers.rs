//! # Container Deposit Ledger
//!
//! Reusable containers (crates, bottles, kegs) leave the store with a
//! customer and come back later, or are charged at their deposit fee.
//!
//! ## Ledger Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Movement Effects                                  │
//! │                                                                         │
//! │  direction    customer balance     store inventory    customer account  │
//! │  ─────────    ────────────────     ───────────────    ────────────────  │
//! │  out          + qty                − qty              -                 │
//! │  in           − qty (≥ 0)          + qty              -                 │
//! │  charge       − qty (≥ 0)          unchanged          − qty × fee       │
//! │  adjustment   -                    + delta (≥ 0)      -                 │
//! │                                                                         │
//! │  Invariant: total_out − total_in − total_charged == balance ≥ 0        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every function here is pure. The database layer loads the current rows,
//! asks this module for the next state and writes it back in one
//! transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::validation::{
    checked_amount, validate_adjustment, validate_cents, validate_name, validate_note,
    validate_quantity, validate_uuid,
};

// =============================================================================
// Container Types & Inventory
// =============================================================================

/// A kind of reusable container with its deposit fee.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ContainerType {
    pub id: String,
    pub name: String,
    pub capacity_ml: Option<i64>,
    pub deposit_fee_cents: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl ContainerType {
    #[inline]
    pub fn deposit_fee(&self) -> Money {
        Money::from_cents(self.deposit_fee_cents)
    }
}

/// Containers currently in the store for one type.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ContainerInventory {
    pub container_type_id: String,
    pub quantity_on_hand: i64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Link between a product and the container it is sold in.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ProductContainer {
    pub product_id: String,
    pub container_type_id: String,
    /// Containers handed out per unit sold (a 24-pack ships in 1 crate).
    pub quantity_per_unit: i64,
}

impl ProductContainer {
    /// Containers given for an order line of `line_quantity` units.
    pub fn containers_for(&self, line_quantity: i64) -> i64 {
        line_quantity.saturating_mul(self.quantity_per_unit)
    }
}

// =============================================================================
// Movements
// =============================================================================

/// Direction of a container movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementDirection {
    /// Given to a customer.
    Out,
    /// Returned by a customer.
    In,
    /// Not returned; customer pays the deposit fee.
    Charge,
    /// Store-side stock correction (signed quantity, no customer).
    Adjustment,
}

impl MovementDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementDirection::Out => "out",
            MovementDirection::In => "in",
            MovementDirection::Charge => "charge",
            MovementDirection::Adjustment => "adjustment",
        }
    }
}

impl fmt::Display for MovementDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the container movement log.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ContainerMovement {
    pub id: String,
    pub container_type_id: String,
    pub customer_id: Option<String>,
    pub direction: MovementDirection,
    /// Positive for customer movements, signed for adjustments.
    pub quantity: i64,
    pub unit_fee_cents: i64,
    /// Non-zero only for charges.
    pub amount_cents: i64,
    pub order_id: Option<String>,
    pub note: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Filter for the movement history.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MovementFilter {
    pub customer_id: Option<String>,
    pub container_type_id: Option<String>,
    pub direction: Option<MovementDirection>,
    pub limit: Option<u32>,
}

impl MovementFilter {
    pub const DEFAULT_LIMIT: u32 = 100;
    pub const MAX_LIMIT: u32 = 1000;

    /// Requested limit, defaulted and capped.
    pub fn effective_limit(&self) -> u32 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }
}

// =============================================================================
// Balances
// =============================================================================

/// Containers a customer holds of one type, with lifetime totals.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ContainerBalance {
    pub customer_id: String,
    pub container_type_id: String,
    pub balance: i64,
    pub total_out: i64,
    pub total_in: i64,
    pub total_charged: i64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl ContainerBalance {
    pub fn totals(&self) -> LedgerTotals {
        LedgerTotals {
            balance: self.balance,
            total_out: self.total_out,
            total_in: self.total_in,
            total_charged: self.total_charged,
        }
    }
}

/// Report row: a customer still holding containers.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OutstandingBalance {
    pub customer_id: String,
    pub customer_name: String,
    pub container_type_id: String,
    pub container_type_name: String,
    pub balance: i64,
    pub deposit_fee_cents: i64,
}

impl OutstandingBalance {
    /// Deposit value still out with the customer.
    pub fn deposit_value(&self) -> Money {
        Money::from_cents(self.deposit_fee_cents).multiply_quantity(self.balance)
    }
}

/// Running totals for one customer/type pair.
///
/// ```rust
/// use titan_ext_core::containers::{LedgerTotals, MovementDirection};
///
/// let totals = LedgerTotals::default()
///     .apply("cust", "crate", MovementDirection::Out, 5)?
///     .apply("cust", "crate", MovementDirection::In, 3)?;
/// assert_eq!(totals.balance, 2);
/// assert!(totals.is_consistent());
/// # Ok::<(), titan_ext_core::CoreError>(())
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTotals {
    pub balance: i64,
    pub total_out: i64,
    pub total_in: i64,
    pub total_charged: i64,
}

impl LedgerTotals {
    /// Applies one customer movement.
    ///
    /// Returns and charges beyond the current balance fail with
    /// `ExcessReturn`. Adjustments never reach a customer balance.
    pub fn apply(
        self,
        customer_id: &str,
        container_type_id: &str,
        direction: MovementDirection,
        quantity: i64,
    ) -> CoreResult<LedgerTotals> {
        validate_quantity("quantity", quantity)?;

        let mut next = self;
        match direction {
            MovementDirection::Out => {
                next.total_out += quantity;
                next.balance += quantity;
            }
            MovementDirection::In | MovementDirection::Charge => {
                if quantity > self.balance {
                    return Err(CoreError::ExcessReturn {
                        customer_id: customer_id.to_string(),
                        container_type_id: container_type_id.to_string(),
                        balance: self.balance,
                        requested: quantity,
                    });
                }
                if direction == MovementDirection::In {
                    next.total_in += quantity;
                } else {
                    next.total_charged += quantity;
                }
                next.balance = (self.balance - quantity).max(0);
            }
            MovementDirection::Adjustment => {
                return Err(ValidationError::NotAllowed {
                    field: "direction".to_string(),
                    allowed: vec!["out".into(), "in".into(), "charge".into()],
                }
                .into());
            }
        }
        Ok(next)
    }

    /// Rebuilds totals from a movement history, oldest first.
    ///
    /// Lenient: a return or charge that exceeds the running balance only
    /// counts up to that balance, so the result is always consistent.
    pub fn replay<'a, I>(movements: I) -> LedgerTotals
    where
        I: IntoIterator<Item = &'a ContainerMovement>,
    {
        movements
            .into_iter()
            .fold(LedgerTotals::default(), |mut acc, m| {
                match m.direction {
                    MovementDirection::Out => {
                        acc.total_out += m.quantity;
                        acc.balance += m.quantity;
                    }
                    MovementDirection::In => {
                        let counted = m.quantity.min(acc.balance).max(0);
                        acc.total_in += counted;
                        acc.balance -= counted;
                    }
                    MovementDirection::Charge => {
                        let counted = m.quantity.min(acc.balance).max(0);
                        acc.total_charged += counted;
                        acc.balance -= counted;
                    }
                    MovementDirection::Adjustment => {}
                }
                acc
            })
    }

    /// `total_out − total_in − total_charged == balance` and `balance ≥ 0`.
    pub fn is_consistent(&self) -> bool {
        self.balance >= 0 && self.total_out - self.total_in - self.total_charged == self.balance
    }
}

// =============================================================================
// Inputs
// =============================================================================

/// Fields for a new container type.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewContainerType {
    pub name: String,
    pub capacity_ml: Option<i64>,
    pub deposit_fee_cents: i64,
}

impl NewContainerType {
    pub fn validate(&self) -> CoreResult<()> {
        validate_name("name", &self.name)?;
        if let Some(ml) = self.capacity_ml {
            validate_quantity("capacity_ml", ml)?;
        }
        validate_cents("deposit_fee_cents", self.deposit_fee_cents)?;
        Ok(())
    }
}

/// Partial update of a container type; `None` keeps the stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ContainerTypePatch {
    pub name: Option<String>,
    pub capacity_ml: Option<i64>,
    pub deposit_fee_cents: Option<i64>,
    pub is_active: Option<bool>,
}

impl ContainerTypePatch {
    pub fn validate(&self) -> CoreResult<()> {
        if let Some(name) = &self.name {
            validate_name("name", name)?;
        }
        if let Some(ml) = self.capacity_ml {
            validate_quantity("capacity_ml", ml)?;
        }
        if let Some(fee) = self.deposit_fee_cents {
            validate_cents("deposit_fee_cents", fee)?;
        }
        Ok(())
    }

    /// Applies the patch onto a loaded row.
    pub fn apply_to(&self, current: &mut ContainerType) {
        if let Some(name) = &self.name {
            current.name = name.trim().to_string();
        }
        if self.capacity_ml.is_some() {
            current.capacity_ml = self.capacity_ml;
        }
        if let Some(fee) = self.deposit_fee_cents {
            current.deposit_fee_cents = fee;
        }
        if let Some(active) = self.is_active {
            current.is_active = active;
        }
    }
}

/// A give, receive or charge request.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerMovementInput {
    pub customer_id: String,
    pub container_type_id: String,
    pub quantity: i64,
    pub order_id: Option<String>,
    pub note: Option<String>,
}

impl CustomerMovementInput {
    pub fn validate(&self) -> CoreResult<()> {
        validate_uuid("customer_id", &self.customer_id)?;
        validate_uuid("container_type_id", &self.container_type_id)?;
        validate_quantity("quantity", self.quantity)?;
        validate_note(self.note.as_deref())?;
        Ok(())
    }
}

// =============================================================================
// Inventory
// =============================================================================

/// Signed inventory change caused by a movement.
pub fn inventory_delta(direction: MovementDirection, quantity: i64) -> i64 {
    match direction {
        MovementDirection::Out => -quantity,
        MovementDirection::In => quantity,
        MovementDirection::Charge => 0,
        MovementDirection::Adjustment => quantity,
    }
}

/// Computes the store inventory after a movement.
///
/// Adjustments may never take inventory below zero. Containers given to a
/// customer may, when `allow_negative` is set: they already left the shelf.
pub fn next_inventory(
    container_type_id: &str,
    on_hand: i64,
    direction: MovementDirection,
    quantity: i64,
    allow_negative: bool,
) -> CoreResult<i64> {
    if direction == MovementDirection::Adjustment {
        validate_adjustment(quantity)?;
    }

    let next = on_hand + inventory_delta(direction, quantity);
    let negative_allowed = allow_negative && direction == MovementDirection::Out;

    if next < 0 && !negative_allowed {
        return Err(CoreError::InsufficientContainers {
            container_type_id: container_type_id.to_string(),
            on_hand,
            requested: quantity.abs(),
        });
    }

    Ok(next)
}

/// Amount charged for `quantity` unreturned containers.
///
/// ```rust
/// use titan_ext_core::containers::charge_amount;
/// use titan_ext_core::Money;
///
/// assert_eq!(charge_amount(Money::from_cents(150), 4).unwrap().cents(), 600);
/// ```
pub fn charge_amount(deposit_fee: Money, quantity: i64) -> CoreResult<Money> {
    Ok(checked_amount(
        "amount_cents",
        deposit_fee.checked_multiply_quantity(quantity),
    )?)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn movement(direction: MovementDirection, quantity: i64) -> ContainerMovement {
        ContainerMovement {
            id: crate::new_id(),
            container_type_id: "crate".to_string(),
            customer_id: Some("cust".to_string()),
            direction,
            quantity,
            unit_fee_cents: 150,
            amount_cents: 0,
            order_id: None,
            note: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_give_receive_charge() {
        let totals = LedgerTotals::default()
            .apply("cust", "crate", MovementDirection::Out, 10)
            .unwrap()
            .apply("cust", "crate", MovementDirection::In, 4)
            .unwrap()
            .apply("cust", "crate", MovementDirection::Charge, 2)
            .unwrap();

        assert_eq!(totals.balance, 4);
        assert_eq!(totals.total_out, 10);
        assert_eq!(totals.total_in, 4);
        assert_eq!(totals.total_charged, 2);
        assert!(totals.is_consistent());
    }

    #[test]
    fn test_excess_return_rejected() {
        let totals = LedgerTotals::default()
            .apply("cust", "crate", MovementDirection::Out, 2)
            .unwrap();

        let err = totals
            .apply("cust", "crate", MovementDirection::In, 3)
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::ExcessReturn {
                balance: 2,
                requested: 3,
                ..
            }
        ));

        let err = totals
            .apply("cust", "crate", MovementDirection::Charge, 5)
            .unwrap_err();
        assert!(matches!(err, CoreError::ExcessReturn { .. }));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let result = LedgerTotals::default().apply("cust", "crate", MovementDirection::Out, 0);
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_adjustment_not_a_customer_movement() {
        let result =
            LedgerTotals::default().apply("cust", "crate", MovementDirection::Adjustment, 1);
        assert!(result.is_err());
    }

    #[test]
    fn test_replay_matches_incremental() {
        let history = vec![
            movement(MovementDirection::Out, 6),
            movement(MovementDirection::In, 2),
            movement(MovementDirection::Out, 3),
            movement(MovementDirection::Charge, 1),
        ];

        let replayed = LedgerTotals::replay(&history);
        assert_eq!(replayed.balance, 6);
        assert_eq!(replayed.total_out, 9);
        assert!(replayed.is_consistent());
    }

    #[test]
    fn test_replay_clamps_at_zero() {
        let history = vec![
            movement(MovementDirection::Out, 1),
            movement(MovementDirection::In, 3),
        ];

        let replayed = LedgerTotals::replay(&history);
        assert_eq!(replayed.balance, 0);
        assert_eq!(replayed.total_in, 1);
        assert!(replayed.is_consistent());

        let history = vec![
            movement(MovementDirection::Out, 2),
            movement(MovementDirection::Charge, 5),
            movement(MovementDirection::Out, 4),
            movement(MovementDirection::In, 1),
        ];
        let replayed = LedgerTotals::replay(&history);
        assert_eq!(replayed.total_charged, 2);
        assert_eq!(replayed.balance, 3);
        assert!(replayed.is_consistent());
    }

    #[test]
    fn test_charge_amount_overflow() {
        assert_eq!(charge_amount(Money::from_cents(150), 4).unwrap().cents(), 600);
        assert!(matches!(
            charge_amount(Money::from_cents(i64::MAX / 2), 3),
            Err(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));
    }

    #[test]
    fn test_next_inventory() {
        assert_eq!(
            next_inventory("crate", 10, MovementDirection::Out, 4, false).unwrap(),
            6
        );
        assert_eq!(
            next_inventory("crate", 10, MovementDirection::In, 4, false).unwrap(),
            14
        );
        assert_eq!(
            next_inventory("crate", 10, MovementDirection::Charge, 4, false).unwrap(),
            10
        );
        assert_eq!(
            next_inventory("crate", 10, MovementDirection::Adjustment, -3, false).unwrap(),
            7
        );
    }

    #[test]
    fn test_next_inventory_negative() {
        // Giving may overdraw when allowed
        assert_eq!(
            next_inventory("crate", 1, MovementDirection::Out, 3, true).unwrap(),
            -2
        );
        assert!(next_inventory("crate", 1, MovementDirection::Out, 3, false).is_err());

        // Adjustments never may
        let err = next_inventory("crate", 1, MovementDirection::Adjustment, -3, true).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientContainers {
                on_hand: 1,
                requested: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_containers_for_line() {
        let link = ProductContainer {
            product_id: "beer-24".to_string(),
            container_type_id: "crate".to_string(),
            quantity_per_unit: 2,
        };
        assert_eq!(link.containers_for(3), 6);
    }

    #[test]
    fn test_movement_filter_limit() {
        assert_eq!(MovementFilter::default().effective_limit(), 100);
        let filter = MovementFilter {
            limit: Some(50_000),
            ..Default::default()
        };
        assert_eq!(filter.effective_limit(), 1000);
    }

    #[test]
    fn test_new_type_validation() {
        let input = NewContainerType {
            name: "Beer crate".to_string(),
            capacity_ml: Some(12_000),
            deposit_fee_cents: 150,
        };
        assert!(input.validate().is_ok());

        let bad = NewContainerType {
            deposit_fee_cents: -1,
            ..input
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_patch_applies_only_given_fields() {
        let mut current = ContainerType {
            id: "crate".to_string(),
            name: "Crate".to_string(),
            capacity_ml: None,
            deposit_fee_cents: 150,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let patch = ContainerTypePatch {
            deposit_fee_cents: Some(200),
            is_active: Some(false),
            ..Default::default()
        };
        patch.apply_to(&mut current);

        assert_eq!(current.name, "Crate");
        assert_eq!(current.deposit_fee_cents, 200);
        assert!(!current.is_active);
    }

    #[test]
    fn test_direction_serde() {
        let json = serde_json::to_string(&MovementDirection::Charge).unwrap();
        assert_eq!(json, "\"charge\"");
    }
}
