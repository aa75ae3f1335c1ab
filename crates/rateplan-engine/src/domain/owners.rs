use crate::domain::records::{Record, RecordWindow};
use crate::domain::rules_engine::{PricingRule, RuleKind, RulesEngine};
use crate::domain::types::{CostBreakdown, CounterpartId, OwnerId, RecordId};
use crate::error::{LedgerError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rateplan_common::{Amount, DateSpan};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Largest base rate an owner accepts. Keeps every stay total, across the
/// whole calendar and the largest date range surcharge, inside `Decimal`.
pub const MAX_BASE_RATE: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Why [`Owner::attach_rule`] refused a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectionReason {
    OverlappingDateRange { existing: DateSpan },
    DuplicateLongStay,
    DuplicatePurchaseStrategy { existing: RuleKind },
    InvalidParameters,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::OverlappingDateRange { existing } => {
                write!(f, "overlaps date range {}", existing)
            }
            RejectionReason::DuplicateLongStay => write!(f, "a long stay rule is already attached"),
            RejectionReason::DuplicatePurchaseStrategy { existing } => {
                write!(f, "a {} strategy is already attached", existing)
            }
            RejectionReason::InvalidParameters => write!(f, "rule parameters are out of range"),
        }
    }
}

/// Outcome of attaching a rule. A rejected rule is handed back untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum RuleAttachment {
    Attached,
    Rejected {
        rule: PricingRule,
        reason: RejectionReason,
    },
}

impl RuleAttachment {
    pub fn is_attached(&self) -> bool {
        matches!(self, RuleAttachment::Attached)
    }

    pub fn reason(&self) -> Option<&RejectionReason> {
        match self {
            RuleAttachment::Attached => None,
            RuleAttachment::Rejected { reason, .. } => Some(reason),
        }
    }
}

/// Something that is priced per unit and accumulates records: a property,
/// a listed resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Owner {
    pub id: OwnerId,
    pub name: String,
    base_rate: Amount,
    pub holder: Option<CounterpartId>,
    rules: Vec<PricingRule>,
    records: Vec<Record>,
    pub created_at: DateTime<Utc>,
}

impl Owner {
    pub fn new(name: impl Into<String>, base_rate: Amount, holder: Option<CounterpartId>) -> Self {
        Self {
            id: OwnerId::new(),
            name: name.into(),
            base_rate,
            holder,
            rules: Vec::new(),
            records: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn base_rate(&self) -> Amount {
        self.base_rate
    }

    pub fn rules(&self) -> &[PricingRule] {
        &self.rules
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn record(&self, record_id: &RecordId) -> Option<&Record> {
        self.records.iter().find(|r| r.id == *record_id)
    }

    pub fn rules_engine(&self) -> RulesEngine<'_> {
        RulesEngine::new(&self.rules)
    }

    pub fn check_rule(&self, rule: &PricingRule) -> std::result::Result<(), RejectionReason> {
        if !rule.has_valid_parameters() {
            return Err(RejectionReason::InvalidParameters);
        }

        match rule {
            PricingRule::DateRange { span, .. } => {
                let clash = self.rules.iter().find_map(|existing| match existing {
                    PricingRule::DateRange { span: other, .. } if other.overlaps(span) => {
                        Some(*other)
                    }
                    _ => None,
                });
                if let Some(existing) = clash {
                    return Err(RejectionReason::OverlappingDateRange { existing });
                }
            }
            PricingRule::LongStay { .. } => {
                if self.rules.iter().any(|r| r.kind() == RuleKind::LongStay) {
                    return Err(RejectionReason::DuplicateLongStay);
                }
            }
            PricingRule::Offer { .. } | PricingRule::Crowd { .. } => {
                if let Some(existing) = self.rules_engine().purchase_strategy() {
                    return Err(RejectionReason::DuplicatePurchaseStrategy {
                        existing: existing.kind(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Attach `rule` unless it conflicts with the rules already attached.
    /// A conflict leaves the owner unchanged and logs a diagnostic.
    pub fn attach_rule(&mut self, rule: PricingRule) -> RuleAttachment {
        match self.check_rule(&rule) {
            Ok(()) => {
                self.rules.push(rule);
                RuleAttachment::Attached
            }
            Err(reason) => {
                warn!(
                    "Rejected {} rule for {}: {}",
                    rule.kind(),
                    self.name,
                    reason
                );
                RuleAttachment::Rejected { rule, reason }
            }
        }
    }

    /// No stay, closed or still open, overlaps `span`.
    pub fn is_available(&self, span: &DateSpan) -> bool {
        !self.records.iter().any(|record| record.blocks(span))
    }

    /// Open records still count as blocking from their start onwards.
    pub fn is_available_from(&self, start: NaiveDate) -> bool {
        self.records.iter().all(|record| match record.stay_span() {
            Some(stay) => match stay.end {
                Some(end) => end <= start,
                None => false,
            },
            None => true,
        })
    }

    pub fn purchase_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r.window, RecordWindow::Purchase { .. }))
            .count()
    }

    pub fn is_released(&self) -> bool {
        self.rules_engine().is_released(self.purchase_count())
    }

    /// Book `span` for `counterpart_id`. The record is only appended when the
    /// span is free.
    pub(crate) fn book(
        &mut self,
        counterpart_id: CounterpartId,
        span: DateSpan,
    ) -> Result<&Record> {
        if !self.is_available(&span) {
            return Err(LedgerError::Unavailable {
                owner: self.name.clone(),
                start: span.start(),
                end: span.end(),
            });
        }

        let cost = self.rules_engine().price_stay(self.base_rate, &span);
        self.records.push(Record::booking(self.id, counterpart_id, span, cost));
        Ok(self.last_record())
    }

    pub(crate) fn open_stay(
        &mut self,
        counterpart_id: CounterpartId,
        start: NaiveDate,
    ) -> Result<&Record> {
        if !self.is_available_from(start) {
            return Err(LedgerError::Unavailable {
                owner: self.name.clone(),
                start,
                end: NaiveDate::MAX,
            });
        }

        self.records.push(Record::open_stay(self.id, counterpart_id, start));
        Ok(self.last_record())
    }

    pub(crate) fn close_stay(
        &mut self,
        record_id: &RecordId,
        end: NaiveDate,
    ) -> Result<CostBreakdown> {
        let engine = RulesEngine::new(&self.rules);
        let record = self
            .records
            .iter_mut()
            .find(|r| r.id == *record_id)
            .ok_or_else(|| LedgerError::RecordNotFound {
                id: record_id.to_string(),
            })?;

        record.close(end, self.base_rate, engine)
    }

    pub(crate) fn purchase(&mut self, buyer: CounterpartId, on: NaiveDate) -> &Record {
        let engine = self.rules_engine();
        let price = engine.price_purchase(self.base_rate, on);
        let points = engine.score_purchase(self.base_rate, on);
        self.records.push(Record::purchase(self.id, buyer, on, price, points));
        self.last_record()
    }

    fn last_record(&self) -> &Record {
        // Callers push before calling.
        &self.records[self.records.len() - 1]
    }
}
