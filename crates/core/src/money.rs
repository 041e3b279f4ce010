//! Monetary amount parsing and formatting.
//!
//! Amounts arrive as text from extracted documents and API payloads in either plain decimal
//! (`3772.88`) or Brazilian notation (`R$ 3.772,88`).

use crate::{AuditError, AuditResult};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::constants::MONEY_EPSILON_CENTS;

/// The tolerance below which two amounts are considered equal (`0.01`).
pub fn epsilon() -> Decimal {
    Decimal::new(MONEY_EPSILON_CENTS, 2)
}

/// Parse a monetary amount.
///
/// Empty or whitespace-only input is zero, following the rule that missing fields default to
/// zero. A comma marks Brazilian notation, in which case dots are thousands separators.
///
/// # Errors
///
/// Returns `AuditError::InvalidAmount` if the text is not a number after normalisation.
pub fn parse_amount(input: &str) -> AuditResult<Decimal> {
    let trimmed = input.trim();
    let unprefixed = trimmed.strip_prefix("R$").unwrap_or(trimmed);
    let compact: String = unprefixed.chars().filter(|c| !c.is_whitespace()).collect();

    if compact.is_empty() {
        return Ok(Decimal::ZERO);
    }

    let normalised = if compact.contains(',') {
        compact.replace('.', "").replace(',', ".")
    } else {
        compact
    };

    Decimal::from_str(&normalised).map_err(|_| AuditError::InvalidAmount(input.to_string()))
}

/// Render an amount as `R$ 0.00` for generated documents.
pub fn format_brl(amount: Decimal) -> String {
    format!("R$ {:.2}", amount.round_dp(2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_decimal() {
        assert_eq!(parse_amount("3772.88").unwrap(), Decimal::new(377288, 2));
    }

    #[test]
    fn parses_brazilian_notation() {
        assert_eq!(parse_amount("R$ 3.772,88").unwrap(), Decimal::new(377288, 2));
        assert_eq!(parse_amount("950,5").unwrap(), Decimal::new(9505, 1));
    }

    #[test]
    fn empty_amount_is_zero() {
        assert_eq!(parse_amount("").unwrap(), Decimal::ZERO);
        assert_eq!(parse_amount("  R$  ").unwrap(), Decimal::ZERO);
    }

    #[test]
    fn rejects_garbage() {
        let err = parse_amount("doze reais").unwrap_err();
        assert!(matches!(err, AuditError::InvalidAmount(ref s) if s == "doze reais"));
    }

    #[test]
    fn formats_two_decimals() {
        assert_eq!(format_brl(Decimal::new(5723, 1)), "R$ 572.30");
        assert_eq!(format_brl(Decimal::new(1234567, 4)), "R$ 123.46");
    }

    #[test]
    fn epsilon_is_one_cent() {
        assert_eq!(epsilon().to_string(), "0.01");
    }
}
