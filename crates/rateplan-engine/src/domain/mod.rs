pub mod counterparts;
pub mod ledger;
pub mod owners;
pub mod records;
pub mod rules_engine;
pub mod types;

pub use counterparts::Counterpart;
pub use ledger::{Ledger, LedgerOperations, PurchaseReceipt};
pub use owners::{Owner, RejectionReason, RuleAttachment};
pub use records::{Record, RecordWindow};
pub use rules_engine::{PricingRule, RuleKind, RulesEngine};
pub use types::{CostBreakdown, CounterpartId, OwnerId, RecordId, RecordState};
