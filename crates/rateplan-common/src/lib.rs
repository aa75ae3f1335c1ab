//! Core shared types for rateplan: money, date spans and logging setup

pub mod logging;
pub mod money;
pub mod span;

pub use money::{Amount, Percentage};
pub use span::{DateSpan, OpenSpan, SpanError};
