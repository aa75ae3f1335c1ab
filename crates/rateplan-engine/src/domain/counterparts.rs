use crate::domain::types::{CounterpartId, OwnerId, RecordId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The other party of a record: renter, buyer, rider. Also the holder that
/// lists owners and collects points from their sales.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counterpart {
    pub id: CounterpartId,
    pub name: String,
    pub records: Vec<RecordId>,
    pub holdings: Vec<OwnerId>,
    pub points: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Counterpart {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: CounterpartId::new(),
            name: name.into(),
            records: Vec::new(),
            holdings: Vec::new(),
            points: Decimal::ZERO,
            created_at: Utc::now(),
        }
    }

    pub(crate) fn register_record(&mut self, record_id: RecordId) {
        self.records.push(record_id);
    }

    pub(crate) fn register_holding(&mut self, owner_id: OwnerId) {
        self.holdings.push(owner_id);
    }

    pub(crate) fn add_points(&mut self, points: Decimal) {
        self.points += points;
    }
}
