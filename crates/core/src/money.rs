//! Fixed-point currency arithmetic.
//!
//! All amounts carry two fractional digits. Derived multiplications and the
//! tax amount are rounded half-to-even immediately; sums stay exact so the
//! final total is rounded exactly once.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::errors::DomainError;

pub const MONEY_SCALE: u32 = 2;

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// `quantity * unit_price`, rounded to the money scale.
pub fn extended_price(quantity: Decimal, unit_price: Decimal) -> Decimal {
    round_money(quantity * unit_price)
}

/// `hours * hourly_rate`, rounded to the money scale.
pub fn labor_price(hours: Decimal, hourly_rate: Decimal) -> Decimal {
    round_money(hours * hourly_rate)
}

pub fn tax_amount(taxable_base: Decimal, tax_rate: Decimal) -> Decimal {
    round_money(taxable_base * tax_rate)
}

pub fn ensure_non_negative(field: &str, value: Decimal) -> Result<(), DomainError> {
    if value.is_sign_negative() {
        return Err(DomainError::Validation(format!("{field} must not be negative, got {value}")));
    }
    Ok(())
}
