//! Commission calculator.
//!
//! Pure decimal arithmetic: a cart subtotal plus the marketplace commission
//! percentage produce the customer-facing grand total. The percentage is
//! threaded in explicitly by the caller (sourced once per request from the
//! settings service) so no pricing decision ever depends on hidden state.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::Serialize;
use utoipa::ToSchema;

use crate::errors::ServiceError;

const HUNDRED: Decimal = dec!(100);

/// One priced line of a quote: unit price × quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmount {
    pub unit_price: Decimal,
    pub quantity: i32,
}

/// Result of a commission quote. All amounts rounded to cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct Totals {
    pub subtotal: Decimal,
    pub commission: Decimal,
    pub total: Decimal,
}

/// Compute `{subtotal, commission, total}` for a list of lines.
///
/// `commission = subtotal × percent / 100`, rounded half-away-from-zero to
/// two decimal places; `total = subtotal + commission`.
pub fn quote(lines: &[LineAmount], commission_percent: Decimal) -> Result<Totals, ServiceError> {
    if commission_percent < Decimal::ZERO || commission_percent > HUNDRED {
        return Err(ServiceError::invalid_field(
            "commission",
            "commission percentage must be between 0 and 100",
        ));
    }

    let mut subtotal = Decimal::ZERO;
    for line in lines {
        if line.unit_price < Decimal::ZERO {
            return Err(ServiceError::invalid_field(
                "price",
                "unit price must not be negative",
            ));
        }
        if line.quantity <= 0 {
            return Err(ServiceError::invalid_field(
                "quantity",
                "quantity must be a positive integer",
            ));
        }
        subtotal += line.unit_price * Decimal::from(line.quantity);
    }

    let commission = (subtotal * commission_percent / HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

    Ok(Totals {
        subtotal,
        commission,
        total: subtotal + commission,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn five_percent_commission_on_two_thousand() {
        let lines = [LineAmount {
            unit_price: dec!(1000),
            quantity: 2,
        }];

        let totals = quote(&lines, dec!(5)).unwrap();
        assert_eq!(totals.subtotal, dec!(2000));
        assert_eq!(totals.commission, dec!(100));
        assert_eq!(totals.total, dec!(2100));
    }

    #[test]
    fn zero_commission_keeps_subtotal() {
        let lines = [
            LineAmount {
                unit_price: dec!(19.99),
                quantity: 3,
            },
            LineAmount {
                unit_price: dec!(5.50),
                quantity: 1,
            },
        ];

        let totals = quote(&lines, Decimal::ZERO).unwrap();
        assert_eq!(totals.subtotal, dec!(65.47));
        assert_eq!(totals.commission, Decimal::ZERO);
        assert_eq!(totals.total, dec!(65.47));
    }

    #[test]
    fn commission_rounds_half_away_from_zero() {
        // 10.01 × 2.5% = 0.25025 → 0.25; 10.10 × 2.5% = 0.2525 → 0.25
        // 10.20 × 2.5% = 0.255 → 0.26
        let totals = quote(
            &[LineAmount {
                unit_price: dec!(10.20),
                quantity: 1,
            }],
            dec!(2.5),
        )
        .unwrap();
        assert_eq!(totals.commission, dec!(0.26));
        assert_eq!(totals.total, dec!(10.46));
    }

    #[test]
    fn empty_line_list_quotes_to_zero() {
        let totals = quote(&[], dec!(10)).unwrap();
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.total, Decimal::ZERO);
    }

    #[test]
    fn negative_price_is_rejected() {
        let err = quote(
            &[LineAmount {
                unit_price: dec!(-1),
                quantity: 1,
            }],
            Decimal::ZERO,
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::ValidationFailed(_)));
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let err = quote(
            &[LineAmount {
                unit_price: dec!(10),
                quantity: 0,
            }],
            Decimal::ZERO,
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::ValidationFailed(_)));
    }

    #[test]
    fn out_of_range_commission_is_rejected() {
        let line = [LineAmount {
            unit_price: dec!(10),
            quantity: 1,
        }];
        assert!(quote(&line, dec!(-0.1)).is_err());
        assert!(quote(&line, dec!(100.1)).is_err());
    }

    proptest! {
        #[test]
        fn total_is_subtotal_plus_commission(
            cents in 0i64..1_000_000,
            quantity in 1i32..100,
            pct_tenths in 0i64..1000,
        ) {
            let lines = [LineAmount {
                unit_price: Decimal::new(cents, 2),
                quantity,
            }];
            let pct = Decimal::new(pct_tenths, 1);

            let totals = quote(&lines, pct).unwrap();
            prop_assert_eq!(totals.total, totals.subtotal + totals.commission);
            prop_assert!(totals.commission >= Decimal::ZERO);
            prop_assert!(totals.total >= totals.subtotal);
        }
    }
}
