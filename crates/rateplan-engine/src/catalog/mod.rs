//! Scenario catalogs built on the same pattern as the ledger: entities, one
//! closed enum of strategies, a `&mut self` facade and read-only reports.

pub mod bidding;
pub mod courses;
pub mod kanban;
pub mod maintenance;
pub mod passes;

pub use bidding::{BidScore, BidTerms, Marketplace};
pub use courses::{CourseCatalog, CourseFormat};
pub use kanban::{Kanban, TaskKind};
pub use maintenance::{MaintenanceShop, TaskCadence};
pub use passes::{BikeShare, Fare, Pass, UnusableReason};
