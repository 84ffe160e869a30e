use daltons::{CandidateUniverse, DemandHistogram};

fn histogram(widths: &[u32]) -> DemandHistogram {
    widths.iter().map(|&w| (w, 1)).collect()
}

#[test]
fn universe_splits_anchor_from_the_rest() {
    let u = CandidateUniverse::from_histogram(&histogram(&[100, 300, 200])).unwrap();
    assert_eq!(u.anchor(), 300);
    assert_eq!(u.rest(), &[200, 100]);
    assert_eq!(u.mask_end(), 4);
}

#[test]
fn universe_of_empty_histogram_is_none() {
    assert!(CandidateUniverse::from_histogram(&DemandHistogram::new()).is_none());
}

#[test]
fn candidates_enumerate_the_power_set_in_mask_order() {
    let u = CandidateUniverse::from_histogram(&histogram(&[100, 200, 300])).unwrap();
    let all: Vec<(u64, Vec<u32>)> = u
        .candidates(3)
        .map(|(mask, c)| (mask, c.as_descending().to_vec()))
        .collect();
    assert_eq!(
        all,
        vec![
            (0, vec![300]),
            (1, vec![300, 200]),
            (2, vec![300, 100]),
            (3, vec![300, 200, 100]),
        ]
    );
}

#[test]
fn candidates_respect_the_size_limit_and_keep_the_anchor() {
    let widths: Vec<u32> = (1..=8).map(|i| i * 100).collect();
    let u = CandidateUniverse::from_histogram(&histogram(&widths)).unwrap();
    let mut count = 0;
    for (_, c) in u.candidates(3) {
        assert!(!c.is_empty() && c.len() <= 3);
        assert_eq!(c.widest(), Some(800));
        assert!(c.as_descending().windows(2).all(|w| w[0] > w[1]));
        count += 1;
    }
    // 1 + C(7,1) + C(7,2)
    assert_eq!(count, 1 + 7 + 21);
    assert_eq!(u.admissible_count(3), count);
}

#[test]
fn admissible_count_caps_at_the_full_power_set() {
    let u = CandidateUniverse::from_histogram(&histogram(&[10, 20, 30, 40])).unwrap();
    assert_eq!(u.admissible_count(1), 1);
    assert_eq!(u.admissible_count(10), 8);
}

#[test]
fn candidate_for_mask_selects_bits_from_the_widest() {
    let u = CandidateUniverse::from_histogram(&histogram(&[10, 20, 30, 40])).unwrap();
    assert_eq!(u.candidate(0b101).as_descending(), &[40, 30, 10]);
    assert_eq!(u.candidate(0b101).to_ascending(), vec![10, 30, 40]);
}
