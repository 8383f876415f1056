//! # Validation Module
//!
//! Small input validators shared by the engines.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Front end                                                    │
//! │  └── Format checks, immediate feedback                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: till-core                                                    │
//! │  ├── THIS MODULE: field validators (reason, actor, amounts)            │
//! │  └── sale::plan_sale: ordered guard chain                              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                       │
//! │  ├── CHECK (debt = 0 OR wallet = 0)                                    │
//! │  └── UNIQUE singleton open session                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub use crate::error::ValidationResult;

use crate::error::ValidationError;
use crate::money::Money;

/// Longest reason stored on a void, withdrawal or adjustment.
pub const MAX_REASON_LEN: usize = 200;

/// Validates a mandatory reason and returns it trimmed.
///
/// ## Example
/// ```rust
/// use till_core::validation::validate_reason;
///
/// assert_eq!(validate_reason("  customer returned goods ").unwrap(), "customer returned goods");
/// assert!(validate_reason("   ").is_err());
/// ```
pub fn validate_reason(reason: &str) -> ValidationResult<String> {
    let reason = reason.trim();

    if reason.is_empty() {
        return Err(ValidationError::MissingReason);
    }

    if reason.chars().count() > MAX_REASON_LEN {
        return Err(ValidationError::TooLong {
            field: "reason".to_string(),
            max: MAX_REASON_LEN,
        });
    }

    Ok(reason.to_string())
}

/// Validates the user recorded on an operation.
pub fn validate_actor(actor: &str) -> ValidationResult<String> {
    let actor = actor.trim();

    if actor.is_empty() {
        return Err(ValidationError::Required {
            field: "actor".to_string(),
        });
    }

    if actor.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "actor".to_string(),
            max: 100,
        });
    }

    Ok(actor.to_string())
}

/// Validates a customer or product display name.
pub fn validate_name(name: &str) -> ValidationResult<String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(name.to_string())
}

/// Converts an amount that must be finite and strictly positive.
///
/// ## Example
/// ```rust
/// use till_core::validation::validate_positive_amount;
///
/// assert_eq!(validate_positive_amount("amount", 12.5).unwrap().cents(), 1250);
/// assert!(validate_positive_amount("amount", 0.0).is_err());
/// assert!(validate_positive_amount("amount", f64::NAN).is_err());
/// ```
pub fn validate_positive_amount(field: &str, value: f64) -> ValidationResult<Money> {
    let amount = Money::from_decimal(field, value)?;
    if !amount.is_positive() {
        return Err(ValidationError::invalid_amount(field));
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_reason() {
        assert_eq!(validate_reason(""), Err(ValidationError::MissingReason));
        assert!(validate_reason(&"x".repeat(201)).is_err());
        assert_eq!(validate_reason("write-off").unwrap(), "write-off");
    }

    #[test]
    fn test_validate_actor() {
        assert!(validate_actor(" ").is_err());
        assert_eq!(validate_actor(" maria ").unwrap(), "maria");
    }

    #[test]
    fn test_validate_positive_amount_rounds() {
        assert_eq!(validate_positive_amount("amount", 0.004), Err(ValidationError::invalid_amount("amount")));
        assert_eq!(validate_positive_amount("amount", 0.005).unwrap().cents(), 1);
    }
}
