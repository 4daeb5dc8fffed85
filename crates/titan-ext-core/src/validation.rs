//! # Validation Module
//!
//! Input validation for the extension modules.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: HTTP handler / host event                                    │
//! │  ├── Type validation (serde deserialization)                           │
//! │  └── THIS MODULE: field rules (names, quantities, rates, years)        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Core rules (ledger, state machines, cycle check)             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite constraints (UNIQUE, FOREIGN KEY, CHECK)              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use titan_ext_core::validation::{validate_name, validate_quantity};
//!
//! assert!(validate_name("name", "Crate 24x0.5L").is_ok());
//! assert!(validate_quantity("quantity", 0).is_err());
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::{MAX_CASHBACK_YEAR, MAX_CENTS, MAX_QUANTITY, MAX_RATE_BPS, MIN_CASHBACK_YEAR};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Maximum length of display names (container types, BOMs, customers).
pub const MAX_NAME_LEN: usize = 200;

/// Maximum length of free-text notes.
pub const MAX_NOTE_LEN: usize = 1000;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a display name: non-empty after trimming, at most 200 chars.
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates an optional note.
pub fn validate_note(note: Option<&str>) -> ValidationResult<()> {
    match note {
        Some(n) if n.chars().count() > MAX_NOTE_LEN => Err(ValidationError::TooLong {
            field: "note".to_string(),
            max: MAX_NOTE_LEN,
        }),
        _ => Ok(()),
    }
}

/// Validates a SKU.
///
/// ## Rules
/// - Must not be empty, at most 50 characters
/// - Letters, digits, hyphens and underscores only
///
/// ```rust
/// use titan_ext_core::validation::validate_sku;
///
/// assert!(validate_sku("FLOUR-1KG").is_ok());
/// assert!(validate_sku("has space").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a movement, BOM or order quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_QUANTITY
pub fn validate_quantity(field: &str, qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    if qty > MAX_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max: MAX_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a signed inventory adjustment: non-zero, bounded both ways.
pub fn validate_adjustment(delta: i64) -> ValidationResult<()> {
    if delta == 0 || delta.abs() > MAX_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "delta".to_string(),
            min: -MAX_QUANTITY,
            max: MAX_QUANTITY,
        });
    }

    Ok(())
}

/// Validates an amount in cents: zero up to `MAX_CENTS`.
///
/// ```rust
/// use titan_ext_core::validation::validate_cents;
///
/// assert!(validate_cents("deposit_fee_cents", 25).is_ok());
/// assert!(validate_cents("deposit_fee_cents", 0).is_ok());
/// assert!(validate_cents("deposit_fee_cents", -1).is_err());
/// assert!(validate_cents("deposit_fee_cents", i64::MAX).is_err());
/// ```
pub fn validate_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_CENTS,
        });
    }

    Ok(())
}

/// Unwraps the result of a checked `Money` operation.
///
/// Stored amounts are bounded, but totals derived from host data are not,
/// so an overflowing product or sum becomes a range error.
///
/// ```rust
/// use titan_ext_core::money::Money;
/// use titan_ext_core::validation::checked_amount;
///
/// let fee = Money::from_cents(150);
/// assert_eq!(checked_amount("amount_cents", fee.checked_multiply_quantity(4)).unwrap().cents(), 600);
/// assert!(checked_amount("amount_cents", fee.checked_multiply_quantity(i64::MAX)).is_err());
/// ```
pub fn checked_amount(field: &str, amount: Option<Money>) -> ValidationResult<Money> {
    amount.ok_or_else(|| ValidationError::OutOfRange {
        field: field.to_string(),
        min: i64::MIN,
        max: i64::MAX,
    })
}

/// Validates a rate in basis points (0% to 100%).
pub fn validate_rate_bps(field: &str, bps: i64) -> ValidationResult<()> {
    if !(0..=MAX_RATE_BPS).contains(&bps) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_RATE_BPS,
        });
    }

    Ok(())
}

/// Validates a cashback year.
pub fn validate_year(year: i32) -> ValidationResult<()> {
    if !(MIN_CASHBACK_YEAR..=MAX_CASHBACK_YEAR).contains(&year) {
        return Err(ValidationError::OutOfRange {
            field: "year".to_string(),
            min: MIN_CASHBACK_YEAR as i64,
            max: MAX_CASHBACK_YEAR as i64,
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string.
///
/// ```rust
/// use titan_ext_core::validation::validate_uuid;
///
/// assert!(validate_uuid("customer_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("customer_id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("name", "Beer crate").is_ok());
        assert!(validate_name("name", "   ").is_err());
        assert!(validate_name("name", &"A".repeat(201)).is_err());
    }

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("COKE-330").is_ok());
        assert!(validate_sku("product_1").is_ok());
        assert!(validate_sku("").is_err());
        assert!(validate_sku(&"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity("quantity", 1).is_ok());
        assert!(validate_quantity("quantity", MAX_QUANTITY).is_ok());
        assert!(validate_quantity("quantity", 0).is_err());
        assert!(validate_quantity("quantity", -3).is_err());
        assert!(validate_quantity("quantity", MAX_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_adjustment() {
        assert!(validate_adjustment(-5).is_ok());
        assert!(validate_adjustment(40).is_ok());
        assert!(validate_adjustment(0).is_err());
    }

    #[test]
    fn test_validate_cents() {
        assert!(validate_cents("cost_cents", 0).is_ok());
        assert!(validate_cents("cost_cents", MAX_CENTS).is_ok());
        assert!(validate_cents("cost_cents", MAX_CENTS + 1).is_err());
        assert!(validate_cents("cost_cents", -1).is_err());
    }

    #[test]
    fn test_validate_rate_bps() {
        assert!(validate_rate_bps("rate", 0).is_ok());
        assert!(validate_rate_bps("rate", 10_000).is_ok());
        assert!(validate_rate_bps("rate", 10_001).is_err());
        assert!(validate_rate_bps("rate", -1).is_err());
    }

    #[test]
    fn test_validate_year() {
        assert!(validate_year(2026).is_ok());
        assert!(validate_year(1999).is_err());
        assert!(validate_year(2101).is_err());
    }

    #[test]
    fn test_validate_note() {
        assert!(validate_note(None).is_ok());
        assert!(validate_note(Some("returned at counter")).is_ok());
        assert!(validate_note(Some(&"x".repeat(1001))).is_err());
    }
}
