use crate::domain::types::CostBreakdown;
use chrono::NaiveDate;
use rateplan_common::{Amount, DateSpan, Percentage};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Score multiplier of a resource sold without an attached strategy, and of
/// an offer once its deadline has passed.
const FULL_PRICE_SCORE: Decimal = Decimal::TEN;
/// Score multiplier of an offer still running.
const OFFER_SCORE: Decimal = Decimal::from_parts(5, 0, 0, false, 0);
const CROWD_SCORE_POOL: Decimal = Decimal::from_parts(50, 0, 0, false, 0);
/// Largest date range surcharge, in points (100 times the base rate).
const MAX_SURCHARGE_POINTS: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

/// Pricing rule attached to an owner. Registration order is evaluation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PricingRule {
    /// Days of a stay falling inside `span` are billed at `base * (1 + pct/100)`.
    DateRange {
        percentage: Percentage,
        span: DateSpan,
    },
    /// Stays of at least `minimum_units` days get the whole total scaled by
    /// `(1 - pct/100)`, after every date range adjustment.
    LongStay {
        percentage: Percentage,
        minimum_units: u32,
    },
    /// Purchases strictly before `deadline` are discounted.
    Offer {
        deadline: NaiveDate,
        percentage: Percentage,
    },
    /// The resource is released once it has been bought `minimum_count` times.
    Crowd { minimum_count: u32 },
}

impl PricingRule {
    pub fn kind(&self) -> RuleKind {
        match self {
            PricingRule::DateRange { .. } => RuleKind::DateRange,
            PricingRule::LongStay { .. } => RuleKind::LongStay,
            PricingRule::Offer { .. } => RuleKind::Offer,
            PricingRule::Crowd { .. } => RuleKind::Crowd,
        }
    }

    /// Offer and crowd rules decide how a purchase is priced and scored; an
    /// owner carries at most one of them.
    pub fn is_purchase_strategy(&self) -> bool {
        matches!(self, PricingRule::Offer { .. } | PricingRule::Crowd { .. })
    }

    /// False for parameters that can never produce a meaningful price.
    pub fn has_valid_parameters(&self) -> bool {
        let hundred = Decimal::ONE_HUNDRED;
        match self {
            PricingRule::DateRange { percentage, .. } => {
                percentage.points() >= -hundred && percentage.points() <= MAX_SURCHARGE_POINTS
            }
            PricingRule::LongStay { percentage, .. } | PricingRule::Offer { percentage, .. } => {
                percentage.points() >= Decimal::ZERO && percentage.points() <= hundred
            }
            PricingRule::Crowd { minimum_count } => *minimum_count > 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    DateRange,
    LongStay,
    Offer,
    Crowd,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::DateRange => write!(f, "date_range"),
            RuleKind::LongStay => write!(f, "long_stay"),
            RuleKind::Offer => write!(f, "offer"),
            RuleKind::Crowd => write!(f, "crowd"),
        }
    }
}

/// Evaluates an owner's rules. Borrowed view, never mutates the rule list.
#[derive(Debug, Clone, Copy)]
pub struct RulesEngine<'a> {
    rules: &'a [PricingRule],
}

impl<'a> RulesEngine<'a> {
    pub fn new(rules: &'a [PricingRule]) -> Self {
        Self { rules }
    }

    /// Price a stay: `base * days`, then every date range rule in
    /// registration order, then long stay discounts.
    pub fn price_stay(&self, base_rate: Amount, span: &DateSpan) -> CostBreakdown {
        let base = base_rate.as_decimal();
        let days = span.days();
        let base_cost = base * Decimal::from(days);

        let mut surcharges = Decimal::ZERO;
        let mut discounts = Decimal::ZERO;
        for rule in self.rules {
            if let PricingRule::DateRange {
                percentage,
                span: range,
            } = rule
            {
                let overlap = span.overlap_days(range);
                if overlap > 0 {
                    let adjustment = Decimal::from(overlap) * base * percentage.ratio();
                    if adjustment.is_sign_positive() {
                        surcharges += adjustment;
                    } else {
                        discounts -= adjustment;
                    }
                    debug!("Date range {} adjusts {} days of {}", range, overlap, span);
                }
            }
        }

        let mut running = base_cost + surcharges - discounts;
        for rule in self.rules {
            if let PricingRule::LongStay {
                percentage,
                minimum_units,
            } = rule
            {
                if days >= i64::from(*minimum_units) {
                    let reduced = running * percentage.discount_factor();
                    discounts += running - reduced;
                    running = reduced;
                    debug!("Long stay discount {} applied to {} days", percentage, days);
                }
            }
        }

        CostBreakdown {
            base_cost: Amount::from_decimal(base_cost),
            surcharges: Amount::from_decimal(surcharges),
            discounts: Amount::from_decimal(discounts),
            total_cost: Amount::from_decimal(running.max(Decimal::ZERO)),
        }
    }

    pub fn purchase_strategy(&self) -> Option<&'a PricingRule> {
        self.rules.iter().find(|rule| rule.is_purchase_strategy())
    }

    pub fn price_purchase(&self, base_rate: Amount, on: NaiveDate) -> Amount {
        match self.purchase_strategy() {
            Some(PricingRule::Offer {
                deadline,
                percentage,
            }) if on < *deadline => base_rate.multiply(percentage.discount_factor()),
            _ => base_rate,
        }
    }

    /// Points credited to the owner's holder for one purchase.
    ///
    /// A running offer scores its discounted price five times, an expired one
    /// ten times; crowd resources split a fixed pool across the required
    /// buyers.
    pub fn score_purchase(&self, base_rate: Amount, on: NaiveDate) -> Decimal {
        let price = self.price_purchase(base_rate, on).as_decimal();
        match self.purchase_strategy() {
            Some(PricingRule::Offer { deadline, .. }) if on < *deadline => price * OFFER_SCORE,
            Some(PricingRule::Crowd { minimum_count }) => {
                base_rate.as_decimal() * CROWD_SCORE_POOL / Decimal::from(*minimum_count)
            }
            _ => price * FULL_PRICE_SCORE,
        }
    }

    /// Whether a resource with `purchase_count` purchases may be released.
    pub fn is_released(&self, purchase_count: usize) -> bool {
        match self.purchase_strategy() {
            Some(PricingRule::Crowd { minimum_count }) => {
                purchase_count >= *minimum_count as usize
            }
            _ => true,
        }
    }
}
