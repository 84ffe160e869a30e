use daltons::{CandidateSet, DemandHistogram, distance};

fn scenario() -> DemandHistogram {
    [(100, 10), (200, 5), (300, 1)].into_iter().collect()
}

#[test]
fn distance_charges_oversize_delivery_only() {
    let h = scenario();
    assert_eq!(distance(&h, &CandidateSet::new([100, 300])), Some(500));
    assert_eq!(distance(&h, &CandidateSet::new([200, 300])), Some(1000));
    assert_eq!(distance(&h, &CandidateSet::new([300])), Some(200 * 10 + 100 * 5));
}

#[test]
fn distance_is_zero_for_the_full_width_set() {
    let h = scenario();
    let all = CandidateSet::new(h.widths());
    assert_eq!(distance(&h, &all), Some(0));
}

#[test]
fn distance_is_positive_when_a_width_is_missing() {
    let h = scenario();
    assert!(distance(&h, &CandidateSet::new([100, 300])).unwrap() > 0);
}

#[test]
fn distance_uses_the_narrowest_sufficient_candidate() {
    let h: DemandHistogram = [(150, 2)].into_iter().collect();
    assert_eq!(distance(&h, &CandidateSet::new([100, 160, 400])), Some(20));
}

#[test]
fn distance_is_undefined_when_demand_exceeds_every_candidate() {
    let h = scenario();
    assert_eq!(distance(&h, &CandidateSet::new([100, 200])), None);
    assert_eq!(distance(&h, &CandidateSet::new(Vec::<u32>::new())), None);
}

#[test]
fn candidate_set_sorts_and_deduplicates() {
    let c = CandidateSet::new([200, 100, 300, 200]);
    assert_eq!(c.as_descending(), &[300, 200, 100]);
    assert!(c.contains(200));
    assert!(!c.contains(250));
}
