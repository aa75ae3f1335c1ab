use crate::domain::counterparts::Counterpart;
use crate::domain::owners::{Owner, RuleAttachment, MAX_BASE_RATE};
use crate::domain::records::Record;
use crate::domain::rules_engine::PricingRule;
use crate::domain::types::{CostBreakdown, CounterpartId, OwnerId, RecordId};
use crate::error::{LedgerError, Result};
use chrono::NaiveDate;
use rateplan_common::{Amount, DateSpan};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Result of a successful purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    pub record_id: RecordId,
    pub price: Amount,
    pub points: Decimal,
    pub purchase_count: usize,
    pub released: bool,
}

/// Record management operations
pub trait LedgerOperations {
    fn attach_rule(&mut self, owner_id: &OwnerId, rule: PricingRule) -> Result<RuleAttachment>;

    fn book(
        &mut self,
        owner_id: &OwnerId,
        counterpart_id: &CounterpartId,
        span: DateSpan,
    ) -> Result<RecordId>;

    fn open_stay(
        &mut self,
        owner_id: &OwnerId,
        counterpart_id: &CounterpartId,
        start: NaiveDate,
    ) -> Result<RecordId>;

    fn close_stay(&mut self, record_id: &RecordId, end: NaiveDate) -> Result<CostBreakdown>;

    fn purchase(
        &mut self,
        owner_id: &OwnerId,
        buyer_id: &CounterpartId,
        on: NaiveDate,
    ) -> Result<PurchaseReceipt>;
}

/// In-memory registry of owners, counterparts and the records between them.
///
/// Owners own their rules and records; counterparts and records refer to
/// each other through ids only. Listing order is registration order.
#[derive(Debug, Default)]
pub struct Ledger {
    owners: HashMap<OwnerId, Owner>,
    owner_order: Vec<OwnerId>,
    counterparts: HashMap<CounterpartId, Counterpart>,
    counterpart_order: Vec<CounterpartId>,
    record_index: HashMap<RecordId, OwnerId>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_counterpart(&mut self, name: impl Into<String>) -> CounterpartId {
        let counterpart = Counterpart::new(name);
        let id = counterpart.id;
        debug!("Registered counterpart {} ({})", counterpart.name, id);
        self.counterparts.insert(id, counterpart);
        self.counterpart_order.push(id);
        id
    }

    /// Register an owner. When `holder` is given it must already be a
    /// registered counterpart; it collects the points earned by purchases.
    ///
    /// `base_rate` must lie within `0..=MAX_BASE_RATE`.
    pub fn register_owner(
        &mut self,
        name: impl Into<String>,
        base_rate: Amount,
        holder: Option<CounterpartId>,
    ) -> Result<OwnerId> {
        let rate = base_rate.as_decimal();
        if rate < Decimal::ZERO || rate > MAX_BASE_RATE {
            return Err(LedgerError::BaseRateOutOfRange {
                rate: rate.to_string(),
                max: MAX_BASE_RATE.to_string(),
            });
        }
        if let Some(holder_id) = holder {
            self.counterpart_mut(&holder_id)?;
        }

        let owner = Owner::new(name, base_rate, holder);
        let id = owner.id;
        if let Some(holder_id) = holder {
            self.counterpart_mut(&holder_id)?.register_holding(id);
        }
        debug!("Registered owner {} at {} per unit", owner.name, base_rate);
        self.owners.insert(id, owner);
        self.owner_order.push(id);
        Ok(id)
    }

    pub fn owner(&self, owner_id: &OwnerId) -> Result<&Owner> {
        self.owners
            .get(owner_id)
            .ok_or_else(|| LedgerError::OwnerNotFound {
                id: owner_id.to_string(),
            })
    }

    fn owner_mut(&mut self, owner_id: &OwnerId) -> Result<&mut Owner> {
        self.owners
            .get_mut(owner_id)
            .ok_or_else(|| LedgerError::OwnerNotFound {
                id: owner_id.to_string(),
            })
    }

    pub fn counterpart(&self, counterpart_id: &CounterpartId) -> Result<&Counterpart> {
        self.counterparts
            .get(counterpart_id)
            .ok_or_else(|| LedgerError::CounterpartNotFound {
                id: counterpart_id.to_string(),
            })
    }

    fn counterpart_mut(&mut self, counterpart_id: &CounterpartId) -> Result<&mut Counterpart> {
        self.counterparts
            .get_mut(counterpart_id)
            .ok_or_else(|| LedgerError::CounterpartNotFound {
                id: counterpart_id.to_string(),
            })
    }

    /// Owners in registration order.
    pub fn owners(&self) -> impl Iterator<Item = &Owner> + '_ {
        self.owner_order
            .iter()
            .filter_map(move |id| self.owners.get(id))
    }

    /// Counterparts in registration order.
    pub fn counterparts(&self) -> impl Iterator<Item = &Counterpart> + '_ {
        self.counterpart_order
            .iter()
            .filter_map(move |id| self.counterparts.get(id))
    }

    pub fn record(&self, record_id: &RecordId) -> Result<&Record> {
        let not_found = || LedgerError::RecordNotFound {
            id: record_id.to_string(),
        };
        let owner_id = self.record_index.get(record_id).ok_or_else(not_found)?;
        self.owner(owner_id)?.record(record_id).ok_or_else(not_found)
    }

    pub fn records_for_owner(&self, owner_id: &OwnerId) -> Result<&[Record]> {
        Ok(self.owner(owner_id)?.records())
    }

    /// Records of a counterpart in the order they were created.
    pub fn records_for_counterpart(&self, counterpart_id: &CounterpartId) -> Result<Vec<&Record>> {
        let counterpart = self.counterpart(counterpart_id)?;
        counterpart
            .records
            .iter()
            .map(|record_id| self.record(record_id))
            .collect()
    }

    pub fn is_released(&self, owner_id: &OwnerId) -> Result<bool> {
        Ok(self.owner(owner_id)?.is_released())
    }

    fn commit(
        &mut self,
        owner_id: OwnerId,
        counterpart_id: &CounterpartId,
        record_id: RecordId,
    ) -> Result<()> {
        self.record_index.insert(record_id, owner_id);
        self.counterpart_mut(counterpart_id)?
            .register_record(record_id);
        Ok(())
    }
}

impl LedgerOperations for Ledger {
    fn attach_rule(&mut self, owner_id: &OwnerId, rule: PricingRule) -> Result<RuleAttachment> {
        Ok(self.owner_mut(owner_id)?.attach_rule(rule))
    }

    fn book(
        &mut self,
        owner_id: &OwnerId,
        counterpart_id: &CounterpartId,
        span: DateSpan,
    ) -> Result<RecordId> {
        // Both parties must exist before anything is appended.
        self.counterpart(counterpart_id)?;
        let owner = self.owner_mut(owner_id)?;
        let record = owner.book(*counterpart_id, span)?;
        let (record_id, amount) = (record.id, record.amount());
        info!("Booked {} for {} at {}", owner.name, span, amount);

        self.commit(*owner_id, counterpart_id, record_id)?;
        Ok(record_id)
    }

    fn open_stay(
        &mut self,
        owner_id: &OwnerId,
        counterpart_id: &CounterpartId,
        start: NaiveDate,
    ) -> Result<RecordId> {
        self.counterpart(counterpart_id)?;
        let owner = self.owner_mut(owner_id)?;
        let record_id = owner.open_stay(*counterpart_id, start)?.id;
        info!("Opened stay at {} from {}", owner.name, start);

        self.commit(*owner_id, counterpart_id, record_id)?;
        Ok(record_id)
    }

    fn close_stay(&mut self, record_id: &RecordId, end: NaiveDate) -> Result<CostBreakdown> {
        let owner_id = *self
            .record_index
            .get(record_id)
            .ok_or_else(|| LedgerError::RecordNotFound {
                id: record_id.to_string(),
            })?;
        let owner = self.owner_mut(&owner_id)?;
        let cost = owner.close_stay(record_id, end)?;
        info!(
            "Closed stay {} at {} for {}",
            record_id, owner.name, cost.total_cost
        );
        Ok(cost)
    }

    fn purchase(
        &mut self,
        owner_id: &OwnerId,
        buyer_id: &CounterpartId,
        on: NaiveDate,
    ) -> Result<PurchaseReceipt> {
        self.counterpart(buyer_id)?;
        let owner = self.owner_mut(owner_id)?;
        let record = owner.purchase(*buyer_id, on);
        let (record_id, price, points) = (record.id, record.amount(), record.points());
        let holder = owner.holder;
        let purchase_count = owner.purchase_count();
        let released = owner.is_released();
        info!(
            "Sold {} for {} (purchase #{}, released: {})",
            owner.name, price, purchase_count, released
        );

        self.commit(*owner_id, buyer_id, record_id)?;
        if let Some(holder_id) = holder {
            self.counterpart_mut(&holder_id)?.add_points(points);
        }

        Ok(PurchaseReceipt {
            record_id,
            price,
            points,
            purchase_count,
            released,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::RecordState;
    use rateplan_common::Percentage;
    use rust_decimal_macros::dec;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn span(from: (u32, u32), to: (u32, u32)) -> DateSpan {
        DateSpan::new(date(from.0, from.1), date(to.0, to.1)).unwrap()
    }

    #[test]
    fn test_base_rate_must_be_bounded() {
        let mut ledger = Ledger::new();
        let huge = Amount::from_decimal(dec!(70000000000000000000000000000));
        let err = ledger.register_owner("Palace", huge, None).unwrap_err();
        assert!(matches!(err, LedgerError::BaseRateOutOfRange { .. }));

        let negative = Amount::from_decimal(dec!(-1));
        assert!(ledger.register_owner("Shed", negative, None).is_err());
        assert_eq!(ledger.owners().count(), 0);

        let top = Amount::from_decimal(MAX_BASE_RATE);
        let owner = ledger.register_owner("Castle", top, None).unwrap();
        let guest = ledger.register_counterpart("Guest");
        let decade = DateSpan::new(date(1, 1), date(1, 1) + chrono::Duration::days(3650)).unwrap();
        let record_id = ledger.book(&owner, &guest, decade).unwrap();
        assert_eq!(
            ledger.record(&record_id).unwrap().amount().as_decimal(),
            MAX_BASE_RATE * dec!(3650)
        );
    }

    #[test]
    fn test_booking_is_recorded_on_both_sides() {
        let mut ledger = Ledger::new();
        let juan = ledger.register_counterpart("Juan");
        let flat = ledger
            .register_owner("Madrid flat", Amount::from(100u32), Some(juan))
            .unwrap();
        let maria = ledger.register_counterpart("Maria");

        let record_id = ledger.book(&flat, &maria, span((8, 10), (8, 17))).unwrap();

        assert_eq!(ledger.records_for_owner(&flat).unwrap().len(), 1);
        let maria_records = ledger.records_for_counterpart(&maria).unwrap();
        assert_eq!(maria_records.len(), 1);
        assert_eq!(maria_records[0].id, record_id);
        assert_eq!(ledger.record(&record_id).unwrap().amount().as_decimal(), dec!(700));
        assert_eq!(ledger.counterpart(&juan).unwrap().holdings, vec![flat]);
    }

    #[test]
    fn test_overlapping_booking_fails_without_side_effects() {
        let mut ledger = Ledger::new();
        let flat = ledger
            .register_owner("Madrid flat", Amount::from(100u32), None)
            .unwrap();
        let maria = ledger.register_counterpart("Maria");
        let juan = ledger.register_counterpart("Juan");

        ledger.book(&flat, &maria, span((8, 10), (8, 17))).unwrap();
        let err = ledger
            .book(&flat, &juan, span((8, 16), (8, 20)))
            .unwrap_err();

        assert!(err.is_rejection());
        assert_eq!(ledger.records_for_owner(&flat).unwrap().len(), 1);
        assert!(ledger.records_for_counterpart(&juan).unwrap().is_empty());

        // Back-to-back stays are fine under half-open semantics.
        ledger.book(&flat, &juan, span((8, 17), (8, 20))).unwrap();
    }

    #[test]
    fn test_unknown_counterpart_leaves_owner_untouched() {
        let mut ledger = Ledger::new();
        let flat = ledger
            .register_owner("Madrid flat", Amount::from(100u32), None)
            .unwrap();
        let result = ledger.book(&flat, &CounterpartId::new(), span((8, 1), (8, 2)));

        assert!(matches!(result, Err(LedgerError::CounterpartNotFound { .. })));
        assert!(ledger.records_for_owner(&flat).unwrap().is_empty());
    }

    #[test]
    fn test_close_stay_once() {
        let mut ledger = Ledger::new();
        let bike = ledger
            .register_owner("Cargo bike", Amount::from(12u32), None)
            .unwrap();
        let rider = ledger.register_counterpart("Rider");

        let record_id = ledger.open_stay(&bike, &rider, date(4, 1)).unwrap();
        assert_eq!(ledger.record(&record_id).unwrap().state, RecordState::Open);

        let cost = ledger.close_stay(&record_id, date(4, 4)).unwrap();
        assert_eq!(cost.total_cost.as_decimal(), dec!(36));

        let second = ledger.close_stay(&record_id, date(4, 8));
        assert!(matches!(second, Err(LedgerError::RecordAlreadyClosed { .. })));
        assert_eq!(
            ledger.record(&record_id).unwrap().amount().as_decimal(),
            dec!(36)
        );

        let never_opened = ledger.close_stay(&RecordId::new(), date(4, 8));
        assert!(matches!(never_opened, Err(LedgerError::RecordNotFound { .. })));
    }

    #[test]
    fn test_crowd_purchases_credit_holder() {
        let mut ledger = Ledger::new();
        let ana = ledger.register_counterpart("Ana");
        let resource = ledger
            .register_owner("Crowd-based resource", Amount::from(300u32), Some(ana))
            .unwrap();
        ledger
            .attach_rule(&resource, PricingRule::Crowd { minimum_count: 3 })
            .unwrap();

        let buyers: Vec<_> = ["Juan", "Maria", "Carlos"]
            .into_iter()
            .map(|name| ledger.register_counterpart(name))
            .collect();
        let released: Vec<bool> = buyers
            .iter()
            .map(|buyer| {
                ledger
                    .purchase(&resource, buyer, date(5, 1))
                    .unwrap()
                    .released
            })
            .collect();

        assert_eq!(released, vec![false, false, true]);
        assert_eq!(ledger.counterpart(&ana).unwrap().points, dec!(15000));
    }

    #[test]
    fn test_offer_purchase_price() {
        let mut ledger = Ledger::new();
        let ana = ledger.register_counterpart("Ana");
        let resource = ledger
            .register_owner("Offer resource", Amount::from(200u32), Some(ana))
            .unwrap();
        let attachment = ledger
            .attach_rule(
                &resource,
                PricingRule::Offer {
                    deadline: date(5, 6),
                    percentage: Percentage::new(20),
                },
            )
            .unwrap();
        assert!(attachment.is_attached());

        let juan = ledger.register_counterpart("Juan");
        let receipt = ledger.purchase(&resource, &juan, date(5, 1)).unwrap();
        assert_eq!(receipt.price.as_decimal(), dec!(160));
        assert_eq!(receipt.points, dec!(800));
        assert!(receipt.released);
    }

    #[test]
    fn test_register_owner_with_unknown_holder() {
        let mut ledger = Ledger::new();
        let stranger = Some(CounterpartId::new());
        let result = ledger.register_owner("Orphan", Amount::from(1u32), stranger);
        assert!(matches!(result, Err(LedgerError::CounterpartNotFound { .. })));
        assert_eq!(ledger.owners().count(), 0);
    }
}
