use daltons::cluster::approximate;
use daltons::{CandidateSet, DemandHistogram, EngineConfig, Strategy, distance};

fn config(widths_number: usize) -> EngineConfig {
    EngineConfig {
        widths_number,
        ..Default::default()
    }
}

fn two_groups() -> DemandHistogram {
    [
        (320, 40),
        (330, 50),
        (340, 40),
        (960, 20),
        (980, 30),
        (1000, 20),
    ]
    .into_iter()
    .collect()
}

#[test]
fn approximation_only_recommends_observed_widths() {
    let h = two_groups();
    let rec = approximate(&h, &config(3)).unwrap();
    assert_eq!(rec.strategy, Strategy::Clustering);
    for w in &rec.widths {
        assert!(h.get(*w).is_some(), "{w} is not an observed width");
    }
}

#[test]
fn approximation_keeps_the_anchor_and_the_size_limit() {
    let h = two_groups();
    for n in 1..=6 {
        let rec = approximate(&h, &config(n)).unwrap();
        assert!(rec.widths.len() <= n, "n={n}: {:?}", rec.widths);
        assert_eq!(rec.widths.last(), Some(&1000));
        assert!(rec.widths.windows(2).all(|w| w[0] < w[1]));
    }
}

#[test]
fn approximation_picks_one_width_per_group() {
    let rec = approximate(&two_groups(), &config(2)).unwrap();
    assert_eq!(rec.widths, vec![330, 1000]);
}

#[test]
fn approximation_reports_the_distance_of_its_widths() {
    let h = two_groups();
    let rec = approximate(&h, &config(3)).unwrap();
    let expected = distance(&h, &CandidateSet::new(rec.widths.iter().copied())).unwrap();
    assert_eq!(rec.distance, expected);
}

#[test]
fn approximation_is_reproducible_for_a_seed() {
    let h: DemandHistogram = (1..=60u32).map(|i| (i * 30, u64::from(i % 9 + 1))).collect();
    let cfg = EngineConfig {
        random_seed: 42,
        ..config(5)
    };
    assert_eq!(approximate(&h, &cfg), approximate(&h, &cfg));
}
