use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use rateplan_common::{Amount, DateSpan, Percentage};
use rateplan_engine::domain::{CounterpartId, OwnerId, RecordId};
use rateplan_engine::{Ledger, LedgerError, LedgerOperations, LedgerReport, PricingRule};
use rust_decimal_macros::dec;

struct TestContext {
    ledger: Ledger,
    host: CounterpartId,
    guest: CounterpartId,
}

impl TestContext {
    fn new() -> Self {
        let mut ledger = Ledger::new();
        let host = ledger.register_counterpart("Juan");
        let guest = ledger.register_counterpart("Maria");
        Self {
            ledger,
            host,
            guest,
        }
    }

    fn owner(&mut self, name: &str, base_rate: u32, rules: Vec<PricingRule>) -> OwnerId {
        let owner = self
            .ledger
            .register_owner(name, Amount::from(base_rate), Some(self.host))
            .expect("Failed to register owner");
        for rule in rules {
            let attachment = self
                .ledger
                .attach_rule(&owner, rule)
                .expect("Owner should exist");
            assert!(attachment.is_attached(), "Rule should attach: {:?}", attachment);
        }
        owner
    }

    fn book(
        &mut self,
        owner: &OwnerId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RecordId, LedgerError> {
        let span = DateSpan::new(start, end).expect("Test spans are non-empty");
        self.ledger.book(owner, &self.guest, span)
    }
}

fn date(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, m, d).unwrap()
}

fn august_peak() -> PricingRule {
    PricingRule::DateRange {
        percentage: Percentage::new(20),
        span: DateSpan::new(date(8, 1), date(8, 31)).unwrap(),
    }
}

fn weekly_discount() -> PricingRule {
    PricingRule::LongStay {
        percentage: Percentage::new(10),
        minimum_units: 7,
    }
}

#[test]
fn test_peak_week_with_long_stay_discount() {
    let mut context = TestContext::new();
    let peak_only = context.owner("Madrid flat", 100, vec![august_peak()]);
    let both = context.owner("Barcelona flat", 100, vec![weekly_discount(), august_peak()]);

    let first = context.book(&peak_only, date(8, 10), date(8, 17)).unwrap();
    let second = context.book(&both, date(8, 10), date(8, 17)).unwrap();

    assert_eq!(
        context.ledger.record(&first).unwrap().amount().as_decimal(),
        dec!(840),
        "Seven peak nights at 120"
    );
    assert_eq!(
        context.ledger.record(&second).unwrap().amount().as_decimal(),
        dec!(756),
        "Long stay discount applies after the peak surcharge"
    );

    let report = LedgerReport::new(&context.ledger);
    assert_eq!(
        report.counterpart_spend(&context.guest).unwrap().as_decimal(),
        dec!(1596)
    );
}

#[test]
fn test_rejected_booking_leaves_no_trace() {
    let mut context = TestContext::new();
    let flat = context.owner("Madrid flat", 100, vec![]);
    context.book(&flat, date(8, 10), date(8, 17)).unwrap();

    let err = context.book(&flat, date(8, 12), date(8, 14)).unwrap_err();
    assert!(err.is_rejection(), "Overlap is a validation rejection");
    assert_eq!(context.ledger.records_for_owner(&flat).unwrap().len(), 1);
    assert_eq!(
        context
            .ledger
            .records_for_counterpart(&context.guest)
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn test_closing_unknown_or_closed_records() {
    let mut context = TestContext::new();
    let flat = context.owner("Madrid flat", 100, vec![]);
    let booked = context.book(&flat, date(3, 1), date(3, 3)).unwrap();

    assert!(matches!(
        context.ledger.close_stay(&RecordId::new(), date(3, 5)),
        Err(LedgerError::RecordNotFound { .. })
    ));
    assert!(matches!(
        context.ledger.close_stay(&booked, date(3, 5)),
        Err(LedgerError::RecordAlreadyClosed { .. })
    ));
    assert_eq!(
        context.ledger.record(&booked).unwrap().amount().as_decimal(),
        dec!(200)
    );
}

#[test]
fn test_purchase_strategies() {
    let mut context = TestContext::new();
    let crowd_rule = PricingRule::Crowd { minimum_count: 3 };
    let crowd = context.owner("Crowd-based resource", 300, vec![crowd_rule]);
    let normal = context.owner("Normal resource", 100, vec![]);

    let released: Vec<bool> = (0..3)
        .map(|_| {
            context
                .ledger
                .purchase(&crowd, &context.guest, date(5, 1))
                .unwrap()
                .released
        })
        .collect();
    assert_eq!(released, vec![false, false, true]);

    let receipt = context
        .ledger
        .purchase(&normal, &context.guest, date(5, 1))
        .unwrap();
    assert_eq!(receipt.price.as_decimal(), dec!(100));
    assert_eq!(receipt.points, dec!(1000));
    assert_eq!(
        context.ledger.counterpart(&context.host).unwrap().points,
        dec!(16000),
        "Holder collects 3 x 5000 crowd points plus 1000"
    );
}

proptest! {
    #[test]
    fn test_overlapping_bookings_never_both_commit(
        a_start in 0i64..60, a_len in 1i64..15,
        b_start in 0i64..60, b_len in 1i64..15,
    ) {
        let origin = date(6, 1);
        let mut context = TestContext::new();
        let flat = context.owner("Flat", 50, vec![]);

        let offset = |days: i64| origin + Duration::days(days);
        let a = DateSpan::new(offset(a_start), offset(a_start + a_len)).unwrap();
        let b = DateSpan::new(offset(b_start), offset(b_start + b_len)).unwrap();

        prop_assert!(context.ledger.book(&flat, &context.guest, a).is_ok());
        let second = context.ledger.book(&flat, &context.guest, b);
        prop_assert_eq!(second.is_ok(), !a.overlaps(&b));
        let expected = if a.overlaps(&b) { 1 } else { 2 };
        prop_assert_eq!(context.ledger.records_for_owner(&flat).unwrap().len(), expected);
    }

    #[test]
    fn test_crowd_release_is_monotonic(minimum in 1u32..8, purchases in 0usize..12) {
        let mut context = TestContext::new();
        let rule = PricingRule::Crowd { minimum_count: minimum };
        let resource = context.owner("Resource", 10, vec![rule]);

        let mut seen_release = false;
        for _ in 0..purchases {
            let receipt = context.ledger.purchase(&resource, &context.guest, date(1, 1)).unwrap();
            let released = receipt.released;
            prop_assert!(released || !seen_release, "Release never flips back");
            seen_release = released;
        }
        let expected = purchases >= minimum as usize;
        prop_assert_eq!(context.ledger.is_released(&resource).unwrap(), expected);
    }

    #[test]
    fn test_long_stay_never_precedes_date_ranges(days in 1i64..20, pct in 0i64..50) {
        let start = date(8, 5);
        let span = DateSpan::new(start, start + Duration::days(days)).unwrap();
        let discount = PricingRule::LongStay { percentage: Percentage::new(pct), minimum_units: 7 };

        let mut context = TestContext::new();
        let before = context.owner("Discount first", 100, vec![discount.clone(), august_peak()]);
        let after = context.owner("Discount last", 100, vec![august_peak(), discount]);

        let first = context.ledger.book(&before, &context.guest, span).unwrap();
        let second = context.ledger.book(&after, &context.guest, span).unwrap();
        prop_assert_eq!(
            context.ledger.record(&first).unwrap().amount(),
            context.ledger.record(&second).unwrap().amount()
        );
    }
}
