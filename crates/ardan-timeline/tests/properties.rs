//! Ordering, lookup and fork properties of timelines and branch sets.

use ardan_core::{BranchIndex, State, TimelineError};
use ardan_timeline::{BranchSet, Timeline};
use proptest::prelude::*;

fn at(t: f64) -> State {
    State {
        radio_duty: (t * 7.0).fract(),
        timestamp: t,
        ..State::default()
    }
}

/// Strictly increasing timestamps built from positive gaps.
fn arb_times() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.001f64..10.0, 1..48).prop_map(|gaps| {
        let mut t = -5.0;
        gaps.into_iter()
            .map(|g| {
                t += g;
                t
            })
            .collect()
    })
}

fn build(times: &[f64]) -> Timeline {
    let mut tl = Timeline::new();
    for &t in times {
        tl.append(at(t)).unwrap();
    }
    tl
}

proptest! {
    #[test]
    fn increasing_appends_succeed_and_bad_ones_change_nothing(
        times in arb_times(),
        back in 0.0f64..20.0,
    ) {
        let mut tl = Timeline::new();
        for (i, &t) in times.iter().enumerate() {
            prop_assert_eq!(tl.append(at(t)), Ok(i));
        }
        let before = tl.clone();
        let last = *times.last().unwrap();

        let dup = tl.append(at(last));
        let is_invalid_order = matches!(dup, Err(TimelineError::InvalidOrder { .. }));
        prop_assert!(is_invalid_order);
        prop_assert!(tl.append(at(last - back)).is_err());
        prop_assert_eq!(&tl, &before);

        for pair in tl.entries().windows(2) {
            prop_assert!(pair[0].timestamp < pair[1].timestamp);
        }
    }

    #[test]
    fn lookups_match_linear_scan(times in arb_times(), query in -10.0f64..500.0) {
        let tl = build(&times);

        let before = tl.entries().iter().rev().find(|e| e.timestamp <= query);
        prop_assert_eq!(tl.lookup_at_or_before(query), before);

        let after = tl.entries().iter().find(|e| e.timestamp >= query);
        prop_assert_eq!(tl.lookup_at_or_after(query), after);
    }

    #[test]
    fn exact_hits_are_found_both_ways(times in arb_times(), pick in any::<prop::sample::Index>()) {
        let tl = build(&times);
        let t = times[pick.index(times.len())];
        prop_assert_eq!(tl.lookup_at_or_before(t).map(|s| s.timestamp), Some(t));
        prop_assert_eq!(tl.lookup_at_or_after(t).map(|s| s.timestamp), Some(t));
    }

    #[test]
    fn fork_copies_exact_prefix_and_leaves_source(
        times in arb_times(),
        pick in any::<prop::sample::Index>(),
    ) {
        let mut set = BranchSet::new();
        for &t in &times {
            set.append(at(t)).unwrap();
        }
        let cursor = pick.index(times.len());
        let source = set.branch(BranchIndex(0)).cloned().unwrap();

        let new = set.fork(BranchIndex(0), Some(cursor)).unwrap();

        prop_assert_eq!(new, BranchIndex(1));
        prop_assert_eq!(set.branch(new).unwrap().entries(), &source.entries()[..=cursor]);
        prop_assert_eq!(set.branch(BranchIndex(0)), Some(&source));
        prop_assert_eq!(set.active(), BranchIndex(0));
    }
}
