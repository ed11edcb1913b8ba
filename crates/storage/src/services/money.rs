use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use super::error::ServiceError;

/// Converts whole currency units to the gateway's minor units (paise).
pub fn to_minor_units(amount: Decimal) -> Result<i64, ServiceError> {
    let minor = amount * Decimal::ONE_HUNDRED;
    if minor.is_sign_negative() || !minor.fract().is_zero() {
        return Err(ServiceError::Validation(format!(
            "Amount {amount} cannot be charged"
        )));
    }
    minor
        .to_i64()
        .ok_or_else(|| ServiceError::Validation(format!("Amount {amount} is too large")))
}

/// Converts gateway minor units back to whole currency units.
pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_fee_round_trips_through_paise() {
        let amount = Decimal::from(350) * Decimal::from(4);
        assert_eq!(to_minor_units(amount).unwrap(), 140_000);
        assert_eq!(from_minor_units(140_000), Decimal::from(1400));
    }

    #[test]
    fn test_fractional_paise_are_rejected() {
        assert!(to_minor_units(Decimal::new(1005, 3)).is_err());
        assert!(to_minor_units(Decimal::from(-1)).is_err());
        assert_eq!(to_minor_units(Decimal::new(1050, 2)).unwrap(), 1050);
    }
}
