use bigdecimal::{BigDecimal, ToPrimitive};
use thiserror::Error;

pub const RECIPIENT_ID_MAX_LEN: usize = 255;
pub const TRANSACTION_ID_MAX_LEN: usize = 64;
/// Currency precision: amounts carry at most this many decimal places.
pub const AMOUNT_MAX_SCALE: i64 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub type ValidationResult = Result<(), ValidationError>;

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_positive_amount(amount: Option<&BigDecimal>) -> Result<BigDecimal, ValidationError> {
    let amount = amount.ok_or_else(|| ValidationError::new("amount", "is required"))?;
    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new("amount", "must be greater than zero"));
    }
    // The wire format is a JSON number, so the amount must survive the f64 conversion.
    match amount.to_f64() {
        Some(value) if value.is_finite() && value > 0.0 => {}
        _ => return Err(ValidationError::new("amount", "is out of range")),
    }
    if amount.with_scale(AMOUNT_MAX_SCALE) != *amount {
        return Err(ValidationError::new(
            "amount",
            format!("must have at most {} decimal places", AMOUNT_MAX_SCALE),
        ));
    }

    Ok(amount.clone())
}

/// Returns the trimmed recipient. Recipients are opaque ids: interior characters are kept
/// as sent, control characters are rejected.
pub fn validate_recipient(recipient_id: Option<&str>) -> Result<String, ValidationError> {
    let recipient = recipient_id.unwrap_or_default().trim();
    validate_required("recipient_id", recipient)?;
    validate_max_len("recipient_id", recipient, RECIPIENT_ID_MAX_LEN)?;
    if recipient.chars().any(char::is_control) {
        return Err(ValidationError::new(
            "recipient_id",
            "must not contain control characters",
        ));
    }

    Ok(recipient.to_string())
}

/// Caller-supplied ids are stored verbatim, so they must already be clean.
pub fn validate_transaction_id(id: &str) -> ValidationResult {
    validate_required("id", id)?;
    validate_max_len("id", id, TRANSACTION_ID_MAX_LEN)?;

    if !id
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Err(ValidationError::new(
            "id",
            "must contain only letters, digits, '-' or '_'",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn validates_required_field() {
        assert!(validate_required("field", "value").is_ok());
        assert!(validate_required("field", "   ").is_err());
    }

    #[test]
    fn validates_max_len() {
        assert!(validate_max_len("field", "abc", 3).is_ok());
        assert!(validate_max_len("field", "abcd", 3).is_err());
    }

    #[test]
    fn validates_positive_amount() {
        let positive = BigDecimal::from_str("1.23").expect("valid decimal");
        let zero = BigDecimal::from(0);
        let negative = BigDecimal::from(-1);

        assert_eq!(validate_positive_amount(Some(&positive)), Ok(positive.clone()));
        assert!(validate_positive_amount(Some(&zero)).is_err());
        assert!(validate_positive_amount(Some(&negative)).is_err());
        assert_eq!(
            validate_positive_amount(None).unwrap_err().message,
            "is required"
        );
    }

    #[test]
    fn rejects_amounts_the_wire_cannot_carry() {
        let tiny = BigDecimal::from_str("1e-5000").unwrap();
        let huge = BigDecimal::from_str("1e400").unwrap();
        let sub_cent = BigDecimal::from_str("10.005").unwrap();
        let cents = BigDecimal::from_str("10.50").unwrap();

        assert!(validate_positive_amount(Some(&tiny)).is_err());
        assert_eq!(
            validate_positive_amount(Some(&huge)).unwrap_err().message,
            "is out of range"
        );
        assert_eq!(
            validate_positive_amount(Some(&sub_cent)).unwrap_err().message,
            "must have at most 2 decimal places"
        );
        assert!(validate_positive_amount(Some(&cents)).is_ok());
    }

    #[test]
    fn validation_error_display() {
        let err = ValidationError::new("amount", "is required");
        assert_eq!(err.to_string(), "amount: is required");
    }

    #[test]
    fn validates_recipient() {
        assert_eq!(
            validate_recipient(Some("  Alice  Johnson ")).unwrap(),
            "Alice  Johnson"
        );
        assert!(validate_recipient(None).is_err());
        assert!(validate_recipient(Some("Alice\u{0007}")).is_err());
        assert!(validate_recipient(Some("\t")).is_err());
        assert!(validate_recipient(Some(&"x".repeat(RECIPIENT_ID_MAX_LEN + 1))).is_err());
    }

    #[test]
    fn validates_transaction_id() {
        assert!(validate_transaction_id("TX123456").is_ok());
        assert!(validate_transaction_id("client-tx_01").is_ok());
        assert!(validate_transaction_id("").is_err());
        assert!(validate_transaction_id("TX 1").is_err());
        assert!(validate_transaction_id(&"A".repeat(TRANSACTION_ID_MAX_LEN + 1)).is_err());
    }
}
