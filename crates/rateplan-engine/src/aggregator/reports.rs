use crate::aggregator::ranking::{average, top_n_by};
use crate::domain::ledger::Ledger;
use crate::domain::owners::Owner;
use crate::domain::types::{CounterpartId, OwnerId};
use crate::error::Result;
use rateplan_common::Amount;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerRevenue {
    pub owner_id: OwnerId,
    pub name: String,
    pub revenue: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerSummary {
    pub name: String,
    pub base_rate: Amount,
    pub revenue: Amount,
    pub records: usize,
    pub open_records: usize,
    pub released: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterpartSummary {
    pub name: String,
    pub spend: Amount,
    pub points: Decimal,
    pub records: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub owners: Vec<OwnerSummary>,
    pub counterparts: Vec<CounterpartSummary>,
    pub total_revenue: Amount,
    pub average_record_amount: Decimal,
    pub top_owners: Vec<OwnerRevenue>,
}

/// Read-only projections over a [`Ledger`]. Open records are not counted
/// until they are closed.
#[derive(Debug, Clone, Copy)]
pub struct LedgerReport<'a> {
    ledger: &'a Ledger,
}

impl<'a> LedgerReport<'a> {
    pub fn new(ledger: &'a Ledger) -> Self {
        Self { ledger }
    }

    pub fn owner_revenue(&self, owner_id: &OwnerId) -> Result<Amount> {
        Ok(revenue_of(self.ledger.owner(owner_id)?))
    }

    pub fn counterpart_spend(&self, counterpart_id: &CounterpartId) -> Result<Amount> {
        Ok(self
            .ledger
            .records_for_counterpart(counterpart_id)?
            .into_iter()
            .filter(|record| !record.is_open())
            .map(|record| record.amount())
            .sum())
    }

    pub fn average_record_amount(&self) -> Decimal {
        let amounts: Vec<Amount> = self
            .ledger
            .owners()
            .flat_map(|owner| owner.records())
            .filter(|record| !record.is_open())
            .map(|record| record.amount())
            .collect();
        let total: Amount = amounts.iter().sum();
        average(total.as_decimal(), amounts.len())
    }

    pub fn top_owners_by_revenue(&self, n: usize) -> Vec<OwnerRevenue> {
        let revenues = self.ledger.owners().map(|owner| OwnerRevenue {
            owner_id: owner.id,
            name: owner.name.clone(),
            revenue: revenue_of(owner),
        });
        top_n_by(revenues, n, |entry| entry.revenue)
    }

    pub fn summary(&self, top_n: usize) -> Result<LedgerSummary> {
        let owners: Vec<OwnerSummary> = self
            .ledger
            .owners()
            .map(|owner| OwnerSummary {
                name: owner.name.clone(),
                base_rate: owner.base_rate(),
                revenue: revenue_of(owner),
                records: owner.records().len(),
                open_records: owner.records().iter().filter(|r| r.is_open()).count(),
                released: owner.is_released(),
            })
            .collect();

        let counterparts = self
            .ledger
            .counterparts()
            .map(|counterpart| {
                Ok(CounterpartSummary {
                    name: counterpart.name.clone(),
                    spend: self.counterpart_spend(&counterpart.id)?,
                    points: counterpart.points,
                    records: counterpart.records.len(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(LedgerSummary {
            total_revenue: owners.iter().map(|owner| owner.revenue).sum(),
            owners,
            counterparts,
            average_record_amount: self.average_record_amount(),
            top_owners: self.top_owners_by_revenue(top_n),
        })
    }
}

fn revenue_of(owner: &Owner) -> Amount {
    owner
        .records()
        .iter()
        .filter(|record| !record.is_open())
        .map(|record| record.amount())
        .sum()
}
