//! Black-box acceptance tests against the public `BuildConfig` API, one per
//! concrete scenario plus the random-input partition/ordering properties.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use radix_tree::{BuildConfig, Leaf, Node};

fn leaf_ranges(leaves: &[Leaf]) -> Vec<(u32, u32)> {
    let mut ranges: Vec<(u32, u32)> = leaves.iter().map(|l| (l.begin, l.end)).collect();
    ranges.sort();
    ranges
}

#[test]
fn scenario_1_single_code() {
    let tree = BuildConfig::new()
        .set_bits(8)
        .set_max_leaf_size(1)
        .build(&[0x00])
        .unwrap();

    assert_eq!(tree.total_nodes(), 1);
    assert_eq!(tree.total_leaves(), 1);
    assert_eq!(tree.leaves()[0], Leaf { begin: 0, end: 1 });
    assert!(matches!(tree.nodes()[0], Node::Leaf { leaf_index: 0 }));
}

#[test]
fn scenario_2_bit_skip_to_top_bit() {
    let tree = BuildConfig::new()
        .set_bits(8)
        .set_max_leaf_size(1)
        .set_keep_singletons(false)
        .build(&[0x00, 0xFF])
        .unwrap();

    assert_eq!(tree.total_leaves(), 2);
    assert_eq!(leaf_ranges(tree.leaves()), vec![(0, 1), (1, 2)]);
    match tree.nodes()[0] {
        Node::Internal {
            has_left,
            has_right,
            ..
        } => assert!(has_left && has_right),
        _ => panic!("root must be internal"),
    }
    for node in &tree.nodes()[1..] {
        assert!(node.is_leaf());
    }
}

#[test]
fn scenario_3_balanced_depth_two() {
    let tree = BuildConfig::new()
        .set_bits(2)
        .set_max_leaf_size(1)
        .build(&[0, 1, 2, 3])
        .unwrap();

    assert_eq!(tree.total_leaves(), 4);
    assert_eq!(tree.total_nodes(), 7);
    assert_eq!(
        leaf_ranges(tree.leaves()),
        vec![(0, 1), (1, 2), (2, 3), (3, 4)]
    );
    let internal_count = tree.nodes().iter().filter(|n| !n.is_leaf()).count();
    assert_eq!(internal_count, 3);
}

#[test]
fn scenario_4_forced_leaf_past_bit_budget() {
    // bits=1 leaves only one discriminating bit; both children of the root
    // exhaust their bit budget immediately and are finalised as leaves even
    // though the left one is larger than max_leaf_size (P3's exception).
    let tree = BuildConfig::new()
        .set_bits(1)
        .set_max_leaf_size(1)
        .set_keep_singletons(true)
        .build(&[0, 0, 0, 1])
        .unwrap();

    assert_eq!(tree.total_leaves(), 2);
    assert_eq!(leaf_ranges(tree.leaves()), vec![(0, 3), (3, 4)]);
    match tree.nodes()[0] {
        Node::Internal {
            has_left,
            has_right,
            ..
        } => assert!(has_left && has_right),
        _ => panic!("root must be internal"),
    }
}

#[test]
fn scenario_5_max_leaf_size_two() {
    let codes: Vec<u32> = (0..8).collect();
    let tree = BuildConfig::new()
        .set_bits(3)
        .set_max_leaf_size(2)
        .build(&codes)
        .unwrap();

    assert_eq!(tree.total_leaves(), 4);
    for leaf in tree.leaves() {
        assert_eq!(leaf.end - leaf.begin, 2);
    }
    let internal_count = tree.nodes().iter().filter(|n| !n.is_leaf()).count();
    assert_eq!(internal_count, 3);
}

#[test]
fn scenario_6_random_large_input_holds_partition_properties() {
    let mut rng = SmallRng::seed_from_u64(0xC0FFEE);
    let n = 1000usize;
    let mut codes: Vec<u32> = (0..n).map(|_| rng.gen_range(0..1u32 << 30)).collect();
    codes.sort_unstable();

    let tree = BuildConfig::new()
        .set_bits(30)
        .set_max_leaf_size(4)
        .build(&codes)
        .unwrap();

    // P1/P4: leaves, sorted by begin, cover [0, N) exactly once each.
    let ranges = leaf_ranges(tree.leaves());
    let mut cursor = 0u32;
    for (begin, end) in &ranges {
        assert_eq!(*begin, cursor, "gap or overlap before {}", begin);
        assert!(end > begin, "leaf range must be non-empty");
        cursor = *end;
    }
    assert_eq!(cursor, n as u32);

    // P3: every leaf has size >= 1 (checked above via end > begin).
    assert!(ranges.iter().all(|(b, e)| e - b >= 1));

    // Roughly N / max_leaf_size leaves, with slack for unevenly sized runs.
    assert!(tree.total_leaves() <= 250 + 64);
}

#[test]
fn build_is_rejected_for_malformed_input() {
    assert!(BuildConfig::new().set_bits(4).build(&[]).is_err());
    assert!(BuildConfig::new()
        .set_bits(0)
        .build(&[0, 1])
        .is_err());
    assert!(BuildConfig::new()
        .set_bits(4)
        .set_max_leaf_size(0)
        .build(&[0, 1])
        .is_err());
}
