//! Internal helpers for model validation and conversion.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation and mapping logic so the engine enforces consistent invariants.

use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Generates a human-facing 8-character reference number.
pub(crate) fn short_ref() -> String {
    let simple = Uuid::new_v4().simple().to_string();
    simple[..8].to_uppercase()
}

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value).map_err(|_| EngineError::NotFound(label.to_string()))
}

/// Validate a tax percentage against the closed `[0, 100]` range.
pub(crate) fn validate_tax_percentage(tax_percentage: f64) -> ResultEngine<()> {
    if !(0.0..=100.0).contains(&tax_percentage) {
        return Err(EngineError::InvalidAmount(format!(
            "tax percentage out of range: {tax_percentage}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_refs_are_eight_chars() {
        let reference = short_ref();
        assert_eq!(reference.len(), 8);
        assert!(reference.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn tax_percentage_range() {
        assert!(validate_tax_percentage(0.0).is_ok());
        assert!(validate_tax_percentage(100.0).is_ok());
        assert!(validate_tax_percentage(-0.5).is_err());
        assert!(validate_tax_percentage(100.5).is_err());
    }
}
