use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::installer::InstallerId;
use crate::domain::{HomeownerId, LeadId, TenantId};
use crate::errors::DomainError;
use crate::money::{ensure_non_negative, extended_price, labor_price};
use crate::pricing::{recalculate, QuoteTotals};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineItemKind {
    Material,
    Adjustment,
    Discount,
}

impl LineItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Material => "material",
            Self::Adjustment => "adjustment",
            Self::Discount => "discount",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "material" => Some(Self::Material),
            "adjustment" => Some(Self::Adjustment),
            "discount" => Some(Self::Discount),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Draft,
    Pending,
    Sent,
    Approved,
    Rejected,
    Expired,
    Cancelled,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "draft" => Some(Self::Draft),
            "pending" => Some(Self::Pending),
            "sent" => Some(Self::Sent),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "expired" => Some(Self::Expired),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Legal next states for the current status. `approved` is a lock: once a
    /// job has been spawned there is no way back, so its set is empty.
    pub fn allowed_transitions(&self) -> &'static [QuoteStatus] {
        use QuoteStatus::{Approved, Cancelled, Draft, Expired, Pending, Rejected, Sent};
        match self {
            Draft => &[Pending, Sent, Cancelled],
            Pending => &[Sent, Rejected, Cancelled],
            Sent => &[Approved, Rejected, Expired, Cancelled],
            Approved | Rejected | Expired | Cancelled => &[],
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// Line and labor items may only change while the quote is still being
    /// worked: draft or pending.
    pub fn ledger_open(&self) -> bool {
        matches!(self, Self::Draft | Self::Pending)
    }
}

/// A priced material, adjustment, or discount entry. Immutable once created;
/// corrections go through remove-and-recreate, addressed by index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub kind: LineItemKind,
    pub description: String,
    pub product_ref: Option<String>,
    pub style: Option<String>,
    pub color: Option<String>,
    pub finish: Option<String>,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_price: Decimal,
    pub total: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemDraft {
    pub product_ref: Option<String>,
    pub style: Option<String>,
    pub color: Option<String>,
    pub finish: Option<String>,
}

impl LineItem {
    pub fn new(
        kind: LineItemKind,
        description: impl Into<String>,
        quantity: Decimal,
        unit: impl Into<String>,
        unit_price: Decimal,
        refs: LineItemDraft,
    ) -> Result<Self, DomainError> {
        let description = description.into();
        if description.trim().is_empty() {
            return Err(DomainError::Validation("line item description must not be empty".into()));
        }
        ensure_non_negative("line item quantity", quantity)?;
        ensure_non_negative("line item unit_price", unit_price)?;

        Ok(Self {
            kind,
            description,
            product_ref: refs.product_ref,
            style: refs.style,
            color: refs.color,
            finish: refs.finish,
            quantity,
            unit: unit.into(),
            unit_price,
            total: extended_price(quantity, unit_price),
        })
    }
}

/// A priced labor entry (`hours * hourly_rate`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaborItem {
    pub description: String,
    pub hours: Decimal,
    pub hourly_rate: Decimal,
    pub installer_id: Option<InstallerId>,
    pub installer_name: Option<String>,
    pub total: Decimal,
}

impl LaborItem {
    pub fn new(
        description: impl Into<String>,
        hours: Decimal,
        hourly_rate: Decimal,
        installer_id: Option<InstallerId>,
        installer_name: Option<String>,
    ) -> Result<Self, DomainError> {
        let description = description.into();
        if description.trim().is_empty() {
            return Err(DomainError::Validation("labor item description must not be empty".into()));
        }
        ensure_non_negative("labor item hours", hours)?;
        ensure_non_negative("labor item hourly_rate", hourly_rate)?;

        Ok(Self {
            description,
            hours,
            hourly_rate,
            installer_id,
            installer_name,
            total: labor_price(hours, hourly_rate),
        })
    }
}

/// A priced proposal with line/labor items and a status workflow. The quote
/// owns its items exclusively; they are addressed only by position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub tenant_id: TenantId,
    pub lead_id: Option<LeadId>,
    pub homeowner_id: Option<HomeownerId>,
    pub status: QuoteStatus,
    pub line_items: Vec<LineItem>,
    pub labor_items: Vec<LaborItem>,
    pub tax_rate: Decimal,
    #[serde(flatten)]
    pub totals: QuoteTotals,
    pub valid_until: Option<NaiveDate>,
    pub internal_notes: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    pub fn new(id: QuoteId, tenant_id: TenantId, tax_rate: Decimal) -> Result<Self, DomainError> {
        ensure_non_negative("tax_rate", tax_rate)?;
        let now = Utc::now();
        Ok(Self {
            id,
            tenant_id,
            lead_id: None,
            homeowner_id: None,
            status: QuoteStatus::Draft,
            line_items: Vec::new(),
            labor_items: Vec::new(),
            tax_rate,
            totals: QuoteTotals::default(),
            valid_until: None,
            internal_notes: None,
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn allowed_statuses(&self) -> &'static [QuoteStatus] {
        self.status.allowed_transitions()
    }

    pub fn can_transition_to(&self, next: QuoteStatus) -> bool {
        self.status.allowed_transitions().contains(&next)
    }

    pub fn transition_to(&mut self, next: QuoteStatus) -> Result<(), DomainError> {
        if !self.can_transition_to(next) {
            return Err(DomainError::InvalidQuoteTransition { from: self.status, to: next });
        }
        self.status = next;
        Ok(())
    }

    fn ensure_ledger_open(&self) -> Result<(), DomainError> {
        if !self.status.ledger_open() {
            return Err(DomainError::QuoteLocked { status: self.status });
        }
        Ok(())
    }

    /// Appends a line item and rederives totals. Returns the item's index.
    pub fn add_line_item(&mut self, item: LineItem) -> Result<usize, DomainError> {
        self.ensure_ledger_open()?;
        self.line_items.push(item);
        self.recalculate();
        Ok(self.line_items.len() - 1)
    }

    pub fn remove_line_item(&mut self, index: usize) -> Result<LineItem, DomainError> {
        self.ensure_ledger_open()?;
        if index >= self.line_items.len() {
            return Err(DomainError::Validation(format!(
                "no line item at index {index} (quote has {})",
                self.line_items.len()
            )));
        }
        let removed = self.line_items.remove(index);
        self.recalculate();
        Ok(removed)
    }

    pub fn add_labor_item(&mut self, item: LaborItem) -> Result<usize, DomainError> {
        self.ensure_ledger_open()?;
        self.labor_items.push(item);
        self.recalculate();
        Ok(self.labor_items.len() - 1)
    }

    pub fn remove_labor_item(&mut self, index: usize) -> Result<LaborItem, DomainError> {
        self.ensure_ledger_open()?;
        if index >= self.labor_items.len() {
            return Err(DomainError::Validation(format!(
                "no labor item at index {index} (quote has {})",
                self.labor_items.len()
            )));
        }
        let removed = self.labor_items.remove(index);
        self.recalculate();
        Ok(removed)
    }

    /// Rederives every total from the ledger. Idempotent: with no ledger
    /// change, repeated calls produce identical totals.
    pub fn recalculate(&mut self) -> &QuoteTotals {
        self.totals = recalculate(&self.line_items, &self.labor_items, self.tax_rate);
        &self.totals
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{LaborItem, LineItem, LineItemDraft, LineItemKind, Quote, QuoteId, QuoteStatus};
    use crate::domain::TenantId;
    use crate::errors::DomainError;

    fn draft_quote() -> Quote {
        Quote::new(
            QuoteId("qt-1".into()),
            TenantId("tn-1".into()),
            Decimal::new(8, 2),
        )
        .expect("valid quote")
    }

    fn material(qty: i64, unit_price_cents: i64) -> LineItem {
        LineItem::new(
            LineItemKind::Material,
            "oak flooring",
            Decimal::from(qty),
            "sq_ft",
            Decimal::new(unit_price_cents, 2),
            LineItemDraft::default(),
        )
        .expect("valid line item")
    }

    #[test]
    fn draft_allows_pending_sent_cancelled() {
        let quote = draft_quote();
        assert_eq!(
            quote.allowed_statuses(),
            &[QuoteStatus::Pending, QuoteStatus::Sent, QuoteStatus::Cancelled]
        );
    }

    #[test]
    fn draft_cannot_jump_to_approved() {
        let mut quote = draft_quote();
        let error = quote.transition_to(QuoteStatus::Approved).expect_err("must reject");
        assert_eq!(
            error,
            DomainError::InvalidQuoteTransition {
                from: QuoteStatus::Draft,
                to: QuoteStatus::Approved
            }
        );
        assert_eq!(quote.status, QuoteStatus::Draft);
    }

    #[test]
    fn approved_is_a_lock() {
        let mut quote = draft_quote();
        quote.transition_to(QuoteStatus::Sent).expect("draft -> sent");
        quote.transition_to(QuoteStatus::Approved).expect("sent -> approved");
        assert!(quote.allowed_statuses().is_empty());
        assert!(quote.transition_to(QuoteStatus::Draft).is_err());
    }

    #[test]
    fn ledger_mutation_outside_draft_or_pending_is_locked() {
        let mut quote = draft_quote();
        quote.add_line_item(material(10, 2_500)).expect("draft ledger is open");
        quote.transition_to(QuoteStatus::Sent).expect("draft -> sent");

        let error = quote.add_line_item(material(1, 100)).expect_err("sent is locked");
        assert_eq!(error, DomainError::QuoteLocked { status: QuoteStatus::Sent });
        assert_eq!(quote.line_items.len(), 1, "ledger unchanged after rejection");

        let error = quote.remove_line_item(0).expect_err("sent is locked");
        assert!(matches!(error, DomainError::QuoteLocked { .. }));
    }

    #[test]
    fn items_are_addressed_by_index() {
        let mut quote = draft_quote();
        quote.add_line_item(material(10, 2_500)).expect("add first");
        let index = quote.add_line_item(material(2, 9_900)).expect("add second");
        assert_eq!(index, 1);

        let removed = quote.remove_line_item(0).expect("remove first");
        assert_eq!(removed.quantity, Decimal::from(10));
        assert_eq!(quote.line_items.len(), 1);
        assert!(quote.remove_line_item(1).is_err(), "stale index rejected");
    }

    #[test]
    fn mutations_keep_totals_consistent() {
        let mut quote = draft_quote();
        quote.add_line_item(material(10, 2_500)).expect("add material");
        quote
            .add_labor_item(
                LaborItem::new("install", Decimal::from(4), Decimal::new(6_000, 2), None, None)
                    .expect("valid labor"),
            )
            .expect("add labor");

        let totals = quote.totals.clone();
        assert_eq!(
            totals.total_price,
            totals.materials_subtotal + totals.labor_subtotal + totals.adjustments_total
                - totals.discount_total
                + totals.tax_amount
        );

        quote.recalculate();
        assert_eq!(quote.totals, totals, "recalculate is idempotent");
    }

    #[test]
    fn rejects_negative_quantities_and_rates() {
        assert!(LineItem::new(
            LineItemKind::Material,
            "bad",
            Decimal::from(-1),
            "ea",
            Decimal::ONE,
            LineItemDraft::default(),
        )
        .is_err());
        assert!(LaborItem::new("bad", Decimal::from(-2), Decimal::ONE, None, None).is_err());
    }

    #[test]
    fn status_round_trips_through_string_codes() {
        for status in [
            QuoteStatus::Draft,
            QuoteStatus::Pending,
            QuoteStatus::Sent,
            QuoteStatus::Approved,
            QuoteStatus::Rejected,
            QuoteStatus::Expired,
            QuoteStatus::Cancelled,
        ] {
            assert_eq!(QuoteStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(QuoteStatus::parse("finalized"), None);
    }
}
