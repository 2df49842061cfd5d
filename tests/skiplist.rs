use fogo::Skiplist;

fn members(range: &[(Vec<u8>, f64)]) -> Vec<&[u8]> {
    range.iter().map(|(m, _)| m.as_slice()).collect()
}

#[test]
fn orders_by_score_then_member() {
    let mut list = Skiplist::new();
    list.insert(b"banana".to_vec(), 2.0);
    list.insert(b"apple".to_vec(), 2.0);
    list.insert(b"cherry".to_vec(), 1.0);
    list.insert(b"date".to_vec(), 3.0);

    let all = list.range_by_rank(0, -1);
    assert_eq!(
        members(&all),
        vec![b"cherry".as_slice(), b"apple", b"banana", b"date"]
    );
}

#[test]
fn range_by_rank_normalizes_and_clamps() {
    let mut list = Skiplist::new();
    for i in 0..10u8 {
        list.insert(vec![b'a' + i], i as f64);
    }

    assert_eq!(list.range_by_rank(0, 2).len(), 3);
    assert_eq!(list.range_by_rank(-3, -1).len(), 3);
    assert_eq!(members(&list.range_by_rank(-3, -1)), vec![b"h".as_slice(), b"i", b"j"]);

    // Clamping on both sides.
    assert_eq!(list.range_by_rank(-100, 100).len(), 10);
    // Inverted and out-of-range windows are empty.
    assert!(list.range_by_rank(5, 2).is_empty());
    assert!(list.range_by_rank(42, 99).is_empty());
    assert!(list.range_by_rank(-1, -5).is_empty());
}

#[test]
fn rank_is_zero_based_ascending() {
    let mut list = Skiplist::new();
    list.insert(b"a".to_vec(), 1.0);
    list.insert(b"b".to_vec(), 2.0);
    list.insert(b"c".to_vec(), 3.0);

    assert_eq!(list.rank(b"a", 1.0), Some(0));
    assert_eq!(list.rank(b"c", 3.0), Some(2));
    assert_eq!(list.rank(b"c", 2.0), None); // score is part of the identity
    assert_eq!(list.rank(b"zz", 1.0), None);
}

#[test]
fn remove_is_exact_and_relinks() {
    let mut list = Skiplist::new();
    list.insert(b"a".to_vec(), 1.0);
    list.insert(b"b".to_vec(), 2.0);
    list.insert(b"c".to_vec(), 3.0);

    assert!(!list.remove(b"b", 9.0)); // wrong score: no-op
    assert!(list.remove(b"b", 2.0));
    assert!(!list.remove(b"b", 2.0));
    assert_eq!(list.len(), 2);
    assert!(!list.contains(b"b", 2.0));
    assert_eq!(members(&list.range_by_rank(0, -1)), vec![b"a".as_slice(), b"c"]);
}

#[test]
fn survives_heavy_churn_in_order() {
    let mut list = Skiplist::new();
    let n = 2000u32;

    for i in 0..n {
        // Scores collide every 10 members, exercising the member tiebreak.
        list.insert(format!("m{:04}", i).into_bytes(), (i % (n / 10)) as f64);
    }
    assert_eq!(list.len(), n as usize);

    // Every inserted pair is findable.
    for i in 0..n {
        assert!(list.contains(format!("m{:04}", i).as_bytes(), (i % (n / 10)) as f64));
    }

    // Remove every other element.
    for i in (0..n).step_by(2) {
        assert!(list.remove(format!("m{:04}", i).as_bytes(), (i % (n / 10)) as f64));
    }
    assert_eq!(list.len(), (n / 2) as usize);

    // What remains is globally sorted by (score, member).
    let all = list.range_by_rank(0, -1);
    assert_eq!(all.len(), (n / 2) as usize);
    for pair in all.windows(2) {
        let (m1, s1) = &pair[0];
        let (m2, s2) = &pair[1];
        assert!(s1 < s2 || (s1 == s2 && m1 < m2));
    }

    // Arena slots get recycled; reinsertion still works.
    for i in (0..n).step_by(2) {
        list.insert(format!("m{:04}", i).into_bytes(), 0.5);
    }
    assert_eq!(list.len(), n as usize);
}

#[test]
fn empty_list_edge_cases() {
    let mut list = Skiplist::new();
    assert!(list.is_empty());
    assert!(list.range_by_rank(0, -1).is_empty());
    assert_eq!(list.rank(b"x", 1.0), None);
    assert!(!list.remove(b"x", 1.0));
}
