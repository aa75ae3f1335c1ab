use rateplan_common::Amount;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declares a Uuid-backed identifier. Records and reports hold these
/// instead of references to the entities they point at.
#[macro_export]
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        pub struct $name(uuid::Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            pub fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> uuid::Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Ok(Self(uuid::Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id!(
    /// Identifier of an [`Owner`](crate::domain::owners::Owner)
    OwnerId
);
uuid_id!(
    /// Identifier of a [`Counterpart`](crate::domain::counterparts::Counterpart)
    CounterpartId
);
uuid_id!(
    /// Identifier of a [`Record`](crate::domain::records::Record)
    RecordId
);

/// Record lifecycle. A record is created either already closed (a booking or
/// a purchase) or open (a stay without a known end) and may move to closed
/// exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    Open,
    Closed,
}

impl RecordState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RecordState::Closed)
    }

    pub fn can_transition_to(&self, next: RecordState) -> bool {
        matches!((self, next), (RecordState::Open, RecordState::Closed))
    }
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordState::Open => write!(f, "open"),
            RecordState::Closed => write!(f, "closed"),
        }
    }
}

/// Cost breakdown for transparency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub base_cost: Amount,
    pub surcharges: Amount,
    pub discounts: Amount,
    pub total_cost: Amount,
}

impl CostBreakdown {
    pub fn flat(amount: Amount) -> Self {
        Self {
            base_cost: amount,
            surcharges: Amount::zero(),
            discounts: Amount::zero(),
            total_cost: amount,
        }
    }

    pub fn calculate_total(&self) -> Amount {
        self.base_cost
            .add(self.surcharges)
            .saturating_sub(self.discounts)
    }
}
