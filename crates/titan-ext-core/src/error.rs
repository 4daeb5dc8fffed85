//! # Error Types
//!
//! Domain-specific error types for titan-ext-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  titan-ext-core errors (this file)                                     │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  titan-ext-db errors                                                   │
//! │  └── DbError          - Database failures (wraps CoreError as Domain)  │
//! │                                                                         │
//! │  ext-api errors                                                        │
//! │  └── ApiError         - JSON body + HTTP status                        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → HTTP         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised by the extension modules.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Not enough component stock to start a manufacturing order.
    ///
    /// ## User Workflow
    /// ```text
    /// Start order MO-20260301-0001 (qty 10)
    ///      │
    ///      ▼
    /// BOM needs 2 × FLOUR per unit → 20 required, 12 on hand
    ///      │
    ///      ▼
    /// InsufficientStock { sku: "FLOUR", available: 12, requested: 20 }
    /// ```
    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
    },

    /// A return or charge exceeds what the customer currently holds.
    #[error(
        "Customer {customer_id} holds {balance} of container type {container_type_id}, cannot settle {requested}"
    )]
    ExcessReturn {
        customer_id: String,
        container_type_id: String,
        balance: i64,
        requested: i64,
    },

    /// An inventory change would leave negative containers on hand.
    #[error("Container type {container_type_id} has {on_hand} on hand, cannot remove {requested}")]
    InsufficientContainers {
        container_type_id: String,
        on_hand: i64,
        requested: i64,
    },

    /// Manufacturing order status transition is not allowed.
    #[error("Manufacturing order {order_id} cannot move from {from} to {to}")]
    InvalidOrderTransition {
        order_id: String,
        from: String,
        to: String,
    },

    /// Any operation on an order that already finished production.
    #[error("Manufacturing order {0} is already completed")]
    OrderAlreadyCompleted(String),

    /// Adding the component would make a product depend on itself.
    #[error("Component {component_product_id} would create a circular dependency for product {product_id}")]
    CircularDependency {
        product_id: String,
        component_product_id: String,
    },

    /// Cashback status transition is not allowed.
    #[error("Cashback {cashback_id} cannot move from {from} to {to}")]
    InvalidCashbackTransition {
        cashback_id: String,
        from: String,
        to: String,
    },

    /// A pending or processed cashback already exists for the period.
    #[error("Cashback for customer {customer_id} in {year} is already {status}")]
    CashbackAlreadyExists {
        customer_id: String,
        year: i32,
        status: String,
    },

    /// Customer does not qualify for the requested loyalty operation.
    #[error("Customer {customer_id} is not eligible: {reason}")]
    NotEligible { customer_id: String, reason: String },

    /// Record exists but is switched off.
    #[error("{entity} {id} is inactive")]
    Inactive { entity: String, id: String },

    /// Record cannot be deleted or changed because others depend on it.
    #[error("{entity} {id} is in use: {reason}")]
    InUse {
        entity: String,
        id: String,
        reason: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates an InUse error.
    pub fn in_use(entity: impl Into<String>, id: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::InUse {
            entity: entity.into(),
            id: id.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any business logic or database work runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            sku: "FLOUR-1KG".to_string(),
            available: 12,
            requested: 20,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for FLOUR-1KG: available 12, requested 20"
        );

        let err = CoreError::OrderAlreadyCompleted("mo-1".to_string());
        assert_eq!(err.to_string(), "Manufacturing order mo-1 is already completed");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "name".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.to_string(), "Validation error: name is required");
    }
}
