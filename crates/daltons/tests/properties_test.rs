use daltons::{
    CandidateSet, CandidateUniverse, DemandHistogram, EngineConfig, FnLookup, SearchControl,
    UsageRecord, aggregate, distance, exhaustive_search, optimize,
};
use proptest::prelude::*;

fn histogram_strategy(max_widths: usize) -> impl Strategy<Value = DemandHistogram> {
    prop::collection::btree_map(1u32..3000, 0u64..500, 1..=max_widths)
        .prop_map(|m| m.into_iter().collect())
}

fn records_strategy() -> impl Strategy<Value = Vec<UsageRecord>> {
    prop::collection::vec(
        (200u32..2000, prop::sample::select(vec![1.0, 1.5, 2.0, 2.625, 3.0]), 0u64..1000),
        1..60,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .map(|(v, d, n)| UsageRecord::new(v, d, n))
            .collect()
    })
}

fn config(widths_number: usize) -> EngineConfig {
    EngineConfig {
        widths_number,
        parallel: false,
        ..Default::default()
    }
}

proptest! {
    #[test]
    fn full_width_set_has_zero_distance(h in histogram_strategy(30)) {
        let all = CandidateSet::new(h.widths());
        prop_assert_eq!(distance(&h, &all), Some(0));
    }

    #[test]
    fn recommendation_contains_the_anchor(h in histogram_strategy(9), n in 1usize..6) {
        let rec = optimize(&h, &config(n), &SearchControl::default()).unwrap();
        prop_assert!(rec.widths.contains(&h.anchor().unwrap()));
        prop_assert!(rec.widths.len() <= n);
    }

    #[test]
    fn more_widths_never_cost_more(h in histogram_strategy(9)) {
        let mut previous = u64::MAX;
        for n in 1..=h.len() {
            let rec = optimize(&h, &config(n), &SearchControl::default()).unwrap();
            prop_assert!(rec.distance <= previous);
            previous = rec.distance;
        }
        prop_assert_eq!(previous, 0);
    }

    #[test]
    fn exact_search_beats_every_candidate(h in histogram_strategy(8), n in 1usize..5) {
        let best = exhaustive_search(&h, &config(n), &SearchControl::default()).unwrap();
        let universe = CandidateUniverse::from_histogram(&h).unwrap();
        for (mask, candidate) in universe.candidates(n) {
            let d = distance(&h, &candidate).unwrap();
            prop_assert!(best.distance <= d);
            if d == best.distance {
                prop_assert!(best.mask <= mask);
            }
        }
    }

    #[test]
    fn aggregation_is_deterministic_and_conserves_weight(records in records_strategy()) {
        let lookup = FnLookup(|v: u32| Some(f64::from(v) * 0.9));
        let cfg = EngineConfig {
            min_percentage: 0.0,
            ..Default::default()
        };
        let a = aggregate(&records, &lookup, &cfg);
        let b = aggregate(&records, &lookup, &cfg);
        prop_assert_eq!(&a, &b);
        if let Ok(out) = a {
            prop_assert_eq!(out.histogram.total_weight(), out.total_views);
            prop_assert!(out.histogram.widths().all(|w| w > 0 && w % cfg.widths_divisor == 0));
        }
    }

    #[test]
    fn pruning_never_adds_weight(records in records_strategy(), pct in 0.0f64..0.5) {
        let lookup = FnLookup(|v: u32| Some(f64::from(v)));
        let cfg = EngineConfig {
            min_percentage: pct,
            ..Default::default()
        };
        if let Ok(out) = aggregate(&records, &lookup, &cfg) {
            prop_assert!(out.histogram.total_weight() <= out.total_views);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn parallel_and_sequential_searches_agree(
        h in prop::collection::btree_map(1u32..3000, 0u64..500, 17..=18)
            .prop_map(|m| m.into_iter().collect::<DemandHistogram>()),
        n in 2usize..5,
    ) {
        let sequential = exhaustive_search(&h, &config(n), &SearchControl::default()).unwrap();
        let parallel_cfg = EngineConfig { parallel: true, ..config(n) };
        let parallel = exhaustive_search(&h, &parallel_cfg, &SearchControl::default()).unwrap();
        prop_assert_eq!(sequential, parallel);
    }
}
