//! Ranking helpers and read-only reports

pub mod ranking;
pub mod reports;

pub use ranking::{average, top_n_by};
pub use reports::{LedgerReport, LedgerSummary, OwnerRevenue};
