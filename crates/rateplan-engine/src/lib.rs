//! Pluggable pricing and scoring rules evaluated over dated records.
//!
//! The [`Ledger`](domain::ledger::Ledger) is the core facade: owners carry a
//! base rate and an ordered list of [`PricingRule`](domain::rules_engine::PricingRule)s,
//! counterparts book stays or buy from them, and
//! [`LedgerReport`](aggregator::reports::LedgerReport) projects the result.
//! The [`catalog`] modules apply the same shape to other pricing models.

pub mod aggregator;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod scenario;

pub use aggregator::LedgerReport;
pub use config::EngineConfig;
pub use domain::{Ledger, LedgerOperations, PricingRule, RuleAttachment};
pub use error::{ErrorKind, LedgerError, Result};
pub use scenario::Scenario;
