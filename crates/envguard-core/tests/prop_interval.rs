//! Property-based tests for the overlap test.

use chrono::{DateTime, Duration, TimeZone, Utc};
use envguard_core::interval::{overlaps, TimeWindow};
use proptest::prelude::*;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

/// Any instant within a few days of the base, at minute resolution.
fn arb_instant() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..10_000).prop_map(|m| base() + Duration::minutes(m))
}

proptest! {
    #[test]
    fn overlap_is_symmetric(
        a in arb_instant(), b in arb_instant(), c in arb_instant(), d in arb_instant()
    ) {
        prop_assert_eq!(overlaps(a, b, c, d), overlaps(c, d, a, b));
    }

    #[test]
    fn touching_windows_never_overlap(start in 0i64..5_000, len1 in 1i64..500, len2 in 1i64..500) {
        let t0 = base() + Duration::minutes(start);
        let t1 = t0 + Duration::minutes(len1);
        let t2 = t1 + Duration::minutes(len2);
        prop_assert!(!overlaps(t0, t1, t1, t2));
    }

    #[test]
    fn zero_length_window_never_overlaps_itself(t in arb_instant()) {
        prop_assert!(!overlaps(t, t, t, t));
    }

    #[test]
    fn intersection_lies_within_both_windows(
        s1 in 0i64..5_000, l1 in 1i64..600, s2 in 0i64..5_000, l2 in 1i64..600
    ) {
        let a = TimeWindow::new(base() + Duration::minutes(s1), base() + Duration::minutes(s1 + l1));
        let b = TimeWindow::new(base() + Duration::minutes(s2), base() + Duration::minutes(s2 + l2));
        match a.intersection(&b) {
            Some(overlap) => {
                prop_assert!(a.overlaps(&b));
                prop_assert!(overlap.start >= a.start && overlap.start >= b.start);
                prop_assert!(overlap.end <= a.end && overlap.end <= b.end);
                prop_assert!(overlap.duration_minutes > 0);
            }
            None => prop_assert!(!a.overlaps(&b)),
        }
    }
}

proptest! {
    #[test]
    fn empty_window_never_overlaps(t in arb_instant(), c in arb_instant(), d in arb_instant()) {
        prop_assert!(!overlaps(t, t, c, d));
        prop_assert!(!overlaps(c, d, t, t));
    }
}
