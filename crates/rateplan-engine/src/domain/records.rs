use crate::domain::rules_engine::RulesEngine;
use crate::domain::types::{CostBreakdown, CounterpartId, OwnerId, RecordId, RecordState};
use crate::error::{LedgerError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rateplan_common::{Amount, DateSpan, OpenSpan};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What a record covers: a (possibly still open) stay, or a single purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordWindow {
    Stay { span: OpenSpan },
    Purchase { on: NaiveDate, points: Decimal },
}

/// A committed, dated transaction between an owner and a counterpart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub owner_id: OwnerId,
    pub counterpart_id: CounterpartId,
    pub window: RecordWindow,
    pub state: RecordState,
    pub cost: CostBreakdown,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Record {
    fn new(
        owner_id: OwnerId,
        counterpart_id: CounterpartId,
        window: RecordWindow,
        state: RecordState,
        cost: CostBreakdown,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: RecordId::new(),
            owner_id,
            counterpart_id,
            window,
            state,
            cost,
            created_at: now,
            closed_at: state.is_terminal().then_some(now),
        }
    }

    pub fn booking(
        owner_id: OwnerId,
        counterpart_id: CounterpartId,
        span: DateSpan,
        cost: CostBreakdown,
    ) -> Self {
        Self::new(
            owner_id,
            counterpart_id,
            RecordWindow::Stay { span: span.into() },
            RecordState::Closed,
            cost,
        )
    }

    pub fn open_stay(owner_id: OwnerId, counterpart_id: CounterpartId, start: NaiveDate) -> Self {
        Self::new(
            owner_id,
            counterpart_id,
            RecordWindow::Stay {
                span: OpenSpan::open(start),
            },
            RecordState::Open,
            CostBreakdown::default(),
        )
    }

    pub fn purchase(
        owner_id: OwnerId,
        counterpart_id: CounterpartId,
        on: NaiveDate,
        price: Amount,
        points: Decimal,
    ) -> Self {
        Self::new(
            owner_id,
            counterpart_id,
            RecordWindow::Purchase { on, points },
            RecordState::Closed,
            CostBreakdown::flat(price),
        )
    }

    /// Final amount; zero while the record is still open.
    pub fn amount(&self) -> Amount {
        self.cost.total_cost
    }

    /// Points earned by a purchase; zero for stays.
    pub fn points(&self) -> Decimal {
        match self.window {
            RecordWindow::Purchase { points, .. } => points,
            RecordWindow::Stay { .. } => Decimal::ZERO,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == RecordState::Open
    }

    pub fn stay_span(&self) -> Option<&OpenSpan> {
        match &self.window {
            RecordWindow::Stay { span } => Some(span),
            RecordWindow::Purchase { .. } => None,
        }
    }

    pub fn blocks(&self, span: &DateSpan) -> bool {
        self.stay_span().is_some_and(|stay| stay.overlaps(span))
    }

    pub fn transition_to(&mut self, new_state: RecordState) -> Result<()> {
        if !self.state.can_transition_to(new_state) {
            return Err(LedgerError::InvalidStateTransition {
                from: self.state.to_string(),
                to: new_state.to_string(),
            });
        }

        self.state = new_state;
        if new_state.is_terminal() && self.closed_at.is_none() {
            self.closed_at = Some(Utc::now());
        }

        Ok(())
    }

    /// Supply the end of an open stay and compute its final cost. Nothing
    /// changes unless the whole transition succeeds.
    pub(crate) fn close(
        &mut self,
        end: NaiveDate,
        base_rate: Amount,
        engine: RulesEngine<'_>,
    ) -> Result<CostBreakdown> {
        if self.state.is_terminal() {
            return Err(LedgerError::RecordAlreadyClosed {
                id: self.id.to_string(),
            });
        }
        let RecordWindow::Stay { span } = &self.window else {
            return Err(LedgerError::NotAStay {
                id: self.id.to_string(),
            });
        };

        let closed = DateSpan::new(span.start, end)?;
        let cost = engine.price_stay(base_rate, &closed);

        self.transition_to(RecordState::Closed)?;
        self.window = RecordWindow::Stay {
            span: closed.into(),
        };
        self.cost = cost;
        Ok(cost)
    }
}
