//! Derives quote totals from the line/labor ledger.
//!
//! The calculation is a pure function of the ledger plus the tax rate: items
//! bucket by kind, bucket sums are exact, tax is rounded once against the
//! taxable base, and the final total is rounded once. Totals are never
//! accepted from a client payload.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::quote::{LaborItem, LineItem, LineItemKind};
use crate::money::{round_money, tax_amount};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteTotals {
    pub materials_subtotal: Decimal,
    pub labor_subtotal: Decimal,
    pub adjustments_total: Decimal,
    pub discount_total: Decimal,
    pub tax_amount: Decimal,
    pub total_price: Decimal,
}

/// Recomputes all derived totals.
///
/// Invariant: `total_price == materials_subtotal + labor_subtotal
/// + adjustments_total - discount_total + tax_amount`.
pub fn recalculate(
    line_items: &[LineItem],
    labor_items: &[LaborItem],
    tax_rate: Decimal,
) -> QuoteTotals {
    let mut materials_subtotal = Decimal::ZERO;
    let mut adjustments_total = Decimal::ZERO;
    let mut discount_total = Decimal::ZERO;

    for item in line_items {
        match item.kind {
            LineItemKind::Material => materials_subtotal += item.total,
            LineItemKind::Adjustment => adjustments_total += item.total,
            // Discounts are stored as positive amounts and subtracted here.
            LineItemKind::Discount => discount_total += item.total,
        }
    }

    let labor_subtotal: Decimal = labor_items.iter().map(|item| item.total).sum();

    let taxable_base =
        materials_subtotal + labor_subtotal + adjustments_total - discount_total;
    let tax = tax_amount(taxable_base, tax_rate);

    QuoteTotals {
        materials_subtotal,
        labor_subtotal,
        adjustments_total,
        discount_total,
        tax_amount: tax,
        total_price: round_money(taxable_base + tax),
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::recalculate;
    use crate::domain::quote::{LaborItem, LineItem, LineItemDraft, LineItemKind};

    fn line(kind: LineItemKind, qty: Decimal, unit_price: Decimal) -> LineItem {
        LineItem::new(kind, "item", qty, "ea", unit_price, LineItemDraft::default())
            .expect("valid line item")
    }

    fn labor(hours: Decimal, rate: Decimal) -> LaborItem {
        LaborItem::new("labor", hours, rate, None, None).expect("valid labor item")
    }

    #[test]
    fn worked_example_with_tax() {
        // qty=10 @ 25.00 materials, 4h @ 60.00 labor, 8% tax.
        let lines = vec![line(LineItemKind::Material, Decimal::from(10), Decimal::new(2_500, 2))];
        let labor_items = vec![labor(Decimal::from(4), Decimal::new(6_000, 2))];

        let totals = recalculate(&lines, &labor_items, Decimal::new(8, 2));

        assert_eq!(totals.materials_subtotal, Decimal::new(25_000, 2));
        assert_eq!(totals.labor_subtotal, Decimal::new(24_000, 2));
        assert_eq!(totals.adjustments_total, Decimal::ZERO);
        assert_eq!(totals.discount_total, Decimal::ZERO);
        assert_eq!(totals.tax_amount, Decimal::new(3_920, 2));
        assert_eq!(totals.total_price, Decimal::new(52_920, 2));
    }

    #[test]
    fn discounts_subtract_and_adjustments_add() {
        let lines = vec![
            line(LineItemKind::Material, Decimal::from(1), Decimal::new(10_000, 2)),
            line(LineItemKind::Adjustment, Decimal::from(1), Decimal::new(1_500, 2)),
            line(LineItemKind::Discount, Decimal::from(1), Decimal::new(2_000, 2)),
        ];

        let totals = recalculate(&lines, &[], Decimal::ZERO);

        assert_eq!(totals.materials_subtotal, Decimal::new(10_000, 2));
        assert_eq!(totals.adjustments_total, Decimal::new(1_500, 2));
        assert_eq!(totals.discount_total, Decimal::new(2_000, 2));
        assert_eq!(totals.total_price, Decimal::new(9_500, 2));
    }

    #[test]
    fn empty_ledger_totals_zero() {
        let totals = recalculate(&[], &[], Decimal::new(725, 4));
        assert_eq!(totals.total_price, Decimal::ZERO);
        assert_eq!(totals.tax_amount, Decimal::ZERO);
    }

    #[test]
    fn repeated_recalculation_is_byte_identical() {
        let lines = vec![
            line(LineItemKind::Material, Decimal::new(33, 1), Decimal::new(1_999, 2)),
            line(LineItemKind::Discount, Decimal::from(1), Decimal::new(500, 2)),
        ];
        let labor_items = vec![labor(Decimal::new(75, 1), Decimal::new(8_250, 2))];

        let first = recalculate(&lines, &labor_items, Decimal::new(725, 4));
        let second = recalculate(&lines, &labor_items, Decimal::new(725, 4));
        assert_eq!(first, second);
    }

    #[test]
    fn invariant_holds_for_mixed_ledger() {
        let lines = vec![
            line(LineItemKind::Material, Decimal::new(125, 1), Decimal::new(1_375, 2)),
            line(LineItemKind::Adjustment, Decimal::from(1), Decimal::new(7_500, 2)),
            line(LineItemKind::Discount, Decimal::from(2), Decimal::new(1_250, 2)),
        ];
        let labor_items = vec![
            labor(Decimal::new(25, 1), Decimal::new(9_500, 2)),
            labor(Decimal::from(8), Decimal::new(4_500, 2)),
        ];

        let totals = recalculate(&lines, &labor_items, Decimal::new(65, 3));

        assert_eq!(
            totals.total_price,
            totals.materials_subtotal + totals.labor_subtotal + totals.adjustments_total
                - totals.discount_total
                + totals.tax_amount
        );
    }
}
