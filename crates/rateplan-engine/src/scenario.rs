//! Ledger scenarios described in TOML and replayed into a [`Ledger`].
//!
//! ```toml
//! [[counterparts]]
//! name = "Maria"
//!
//! [[owners]]
//! name = "Madrid flat"
//! base_rate = 100
//!
//! [[owners.rules]]
//! type = "date_range"
//! percentage = 20
//! span = { start = "2025-08-01", end = "2025-08-31" }
//!
//! [[bookings]]
//! owner = "Madrid flat"
//! counterpart = "Maria"
//! start = "2025-08-10"
//! end = "2025-08-17"
//! ```
//!
//! Dates are quoted strings. Entities are referred to by name.

use crate::domain::ledger::{Ledger, LedgerOperations};
use crate::domain::owners::RuleAttachment;
use crate::domain::rules_engine::PricingRule;
use crate::domain::types::{CounterpartId, OwnerId};
use crate::error::{LedgerError, Result};
use chrono::NaiveDate;
use rateplan_common::{Amount, DateSpan};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterpartSpec {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerSpec {
    pub name: String,
    pub base_rate: Amount,
    #[serde(default)]
    pub holder: Option<String>,
    #[serde(default)]
    pub rules: Vec<PricingRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingSpec {
    pub owner: String,
    pub counterpart: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// A stay opened on `start`, closed on `end` when one is given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaySpec {
    pub owner: String,
    pub counterpart: String,
    pub start: NaiveDate,
    #[serde(default)]
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseSpec {
    pub owner: String,
    pub buyer: String,
    pub on: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub counterparts: Vec<CounterpartSpec>,
    #[serde(default)]
    pub owners: Vec<OwnerSpec>,
    #[serde(default)]
    pub bookings: Vec<BookingSpec>,
    #[serde(default)]
    pub stays: Vec<StaySpec>,
    #[serde(default)]
    pub purchases: Vec<PurchaseSpec>,
}

/// The replayed ledger plus every rejection met on the way.
#[derive(Debug)]
pub struct Replay {
    pub ledger: Ledger,
    pub rejections: Vec<String>,
}

impl Scenario {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| LedgerError::Scenario {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| LedgerError::Scenario {
            message: e.to_string(),
        })
    }

    /// Replay into a fresh ledger: counterparts, owners and their rules,
    /// then bookings, stays and purchases in file order.
    ///
    /// Rejected rules and unavailable spans are collected, not fatal. Any
    /// other error aborts the replay, as does a name used twice for
    /// counterparts or for owners.
    pub fn replay(&self) -> Result<Replay> {
        let mut ledger = Ledger::new();
        let mut rejections = Vec::new();
        let mut counterparts: HashMap<&str, CounterpartId> = HashMap::new();
        let mut owners: HashMap<&str, OwnerId> = HashMap::new();

        for spec in &self.counterparts {
            ensure_unique(&counterparts, &spec.name, "counterpart")?;
            counterparts.insert(&spec.name, ledger.register_counterpart(&spec.name));
        }

        for spec in &self.owners {
            ensure_unique(&owners, &spec.name, "owner")?;
            let holder = spec
                .holder
                .as_deref()
                .map(|name| lookup(&counterparts, name))
                .transpose()?;
            let owner_id = ledger.register_owner(&spec.name, spec.base_rate, holder)?;
            owners.insert(&spec.name, owner_id);

            for rule in &spec.rules {
                if let RuleAttachment::Rejected { rule, reason } =
                    ledger.attach_rule(&owner_id, rule.clone())?
                {
                    rejections.push(format!(
                        "{}: {} rule rejected, {}",
                        spec.name,
                        rule.kind(),
                        reason
                    ));
                }
            }
        }

        for booking in &self.bookings {
            let owner = lookup(&owners, &booking.owner)?;
            let counterpart = lookup(&counterparts, &booking.counterpart)?;
            let span = DateSpan::new(booking.start, booking.end)?;
            collect(&mut rejections, ledger.book(&owner, &counterpart, span))?;
        }

        for stay in &self.stays {
            let owner = lookup(&owners, &stay.owner)?;
            let counterpart = lookup(&counterparts, &stay.counterpart)?;
            let Some(record_id) =
                collect(&mut rejections, ledger.open_stay(&owner, &counterpart, stay.start))?
            else {
                continue;
            };
            if let Some(end) = stay.end {
                ledger.close_stay(&record_id, end)?;
            }
        }

        for purchase in &self.purchases {
            let owner = lookup(&owners, &purchase.owner)?;
            let buyer = lookup(&counterparts, &purchase.buyer)?;
            let receipt = ledger.purchase(&owner, &buyer, purchase.on)?;
            debug!("{} bought {} for {}", purchase.buyer, purchase.owner, receipt.price);
        }

        Ok(Replay { ledger, rejections })
    }
}

fn lookup<T: Copy>(ids: &HashMap<&str, T>, name: &str) -> Result<T> {
    ids.get(name).copied().ok_or_else(|| LedgerError::Scenario {
        message: format!("Unknown name '{name}'"),
    })
}

fn ensure_unique<T>(ids: &HashMap<&str, T>, name: &str, what: &str) -> Result<()> {
    if ids.contains_key(name) {
        return Err(LedgerError::Scenario {
            message: format!("Duplicate {what} name '{name}'"),
        });
    }
    Ok(())
}

fn collect<T>(rejections: &mut Vec<String>, result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_rejection() => {
            warn!("Skipped: {}", e);
            rejections.push(e.to_string());
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
