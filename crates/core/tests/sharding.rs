use std::collections::HashSet;
use std::num::NonZeroU64;

use txprobe_core::shard::{all_predicates, predicate_for};

#[test]
fn predicate_always_declared() {
    for n in 1..=16 {
        let shards = NonZeroU64::new(n).unwrap();
        let declared: HashSet<String> = all_predicates("key", shards).collect();
        assert_eq!(declared.len(), usize::try_from(n).unwrap());
        for key in (-1000..1000).step_by(7) {
            assert!(declared.contains(&predicate_for("key", shards, key)));
        }
    }
}

#[test]
fn predicate_is_deterministic() {
    let shards = NonZeroU64::new(5).unwrap();
    let first: Vec<_> = (0..200).map(|k| predicate_for("value", shards, k)).collect();
    let second: Vec<_> = (0..200).map(|k| predicate_for("value", shards, k)).collect();
    assert_eq!(first, second);
}
