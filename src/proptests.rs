use super::*;

use crate::tree::child_key;
use proptest::prelude::*;
use proptest::sample::Index;
use proptest_derive::Arbitrary;
use std::collections::{BTreeMap, BTreeSet};

fn sum(values: impl Iterator<Item = Value>) -> Value {
    values.fold(Value::zero(), |acc, v| acc + v)
}

fn validate_tree(t: &HexSumTree) {
    let heights: Vec<Level> = t.height_history().iter().map(|c| c.value).collect();
    assert_eq!(heights.first(), Some(&1), "tree starts at height 1");
    assert!(
        heights.windows(2).all(|w| w[1] == w[0] + 1),
        "height must grow one level at a time: {heights:?}"
    );
    if let Some(cap) = t.capacity() {
        assert!(t.next_key() <= cap, "next key beyond capacity");
    }

    let mut times: BTreeSet<Time> = BTreeSet::new();
    times.insert(0);
    for (&(level, key), history) in t.nodes() {
        let stamps: Vec<Time> = history.iter().map(|c| c.time).collect();
        assert!(
            stamps.windows(2).all(|w| w[0] < w[1]),
            "checkpoint times of ({level}, {key}) must strictly increase"
        );
        assert!(history.iter().all(|c| c.value <= MAX_VALUE));
        if let Some(span) = tree::span(level) {
            assert_eq!(key % span, 0, "node ({level}, {key}) is misaligned");
        }
        times.extend(stamps);
    }

    for &time in &times {
        for (&(level, key), history) in t.nodes() {
            if level == 0 || history.iter().next().map_or(true, |c| time < c.time) {
                continue;
            }
            let children = sum(
                (0..CHILDREN)
                    .filter_map(|i| child_key(level, key, i))
                    .map(|c| t.node_at(level - 1, c, time)),
            );
            assert_eq!(
                t.node_at(level, key, time),
                children,
                "node ({level}, {key}) must equal the sum of its children at time {time}"
            );
        }

        let leaves = sum((0..t.next_key()).map(|k| t.item_at(k, time)));
        assert_eq!(t.total_at(time), leaves, "conservation at time {time}");
    }
}

/// Cumulative-weight scan used as the reference for sortition.
fn scan(weights: &[u64], draw: u64) -> (Key, u64) {
    let mut offset = draw;
    let mut key = 0;
    while offset >= weights[key] {
        offset -= weights[key];
        key += 1;
    }
    (key as Key, offset)
}

#[derive(Clone, Debug, Arbitrary)]
enum Op {
    #[proptest(weight = 4)]
    Insert(#[proptest(strategy = "0u64..1_000_000")] u64),
    #[proptest(weight = 3)]
    Set(Index, #[proptest(strategy = "0u64..1_000_000")] u64),
    #[proptest(weight = 3)]
    Update(Index, #[proptest(strategy = "0u64..1_000")] u64, bool),
    #[proptest(weight = 2)]
    Advance(#[proptest(strategy = "1u64..4")] u64),
    Rewind(Index),
    #[proptest(weight = 2)]
    Draw(#[proptest(strategy = "prop::collection::vec(any::<u64>(), 0..8)")] Vec<u64>),
}

struct Model {
    time: Time,
    weights: Vec<u64>,
    /// Weights after the last mutation at each time.
    snapshots: BTreeMap<Time, Vec<u64>>,
}

impl Model {
    fn snapshot(&mut self) {
        self.snapshots.insert(self.time, self.weights.clone());
    }

    fn weights_at(&self, time: Time) -> &[u64] {
        self.snapshots
            .range(..=time)
            .next_back()
            .map_or(&[][..], |(_, w)| w.as_slice())
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        max_shrink_iters: 10_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(ops in prop::collection::vec(any::<Op>(), 0..=400)) {
        let mut t = HexSumTree::new();
        let mut m = Model { time: 0, weights: Vec::new(), snapshots: BTreeMap::new() };

        for op in ops {
            match op {
                Op::Insert(w) => {
                    let key = t.insert(m.time, Value::from(w)).unwrap();
                    prop_assert_eq!(key, m.weights.len() as Key);
                    m.weights.push(w);
                    m.snapshot();
                }
                Op::Set(idx, w) => {
                    if m.weights.is_empty() {
                        let rejected = matches!(
                            t.set(0, m.time, Value::from(w)),
                            Err(TreeError::UnknownKey { .. })
                        );
                        prop_assert!(rejected, "set on an empty tree must fail with UnknownKey");
                        continue;
                    }
                    let key = idx.index(m.weights.len());
                    t.set(key as Key, m.time, Value::from(w)).unwrap();
                    m.weights[key] = w;
                    m.snapshot();
                }
                Op::Update(idx, d, positive) => {
                    if m.weights.is_empty() {
                        continue;
                    }
                    let key = idx.index(m.weights.len());
                    let result = t.update(key as Key, m.time, Value::from(d), positive);
                    if !positive && d > m.weights[key] {
                        prop_assert_eq!(result, Err(TreeError::ValueTooLarge));
                    } else {
                        m.weights[key] = if positive { m.weights[key] + d } else { m.weights[key] - d };
                        prop_assert_eq!(result, Ok(Value::from(m.weights[key])));
                        m.snapshot();
                    }
                }
                Op::Advance(dt) => {
                    m.time += dt;
                }
                Op::Rewind(idx) => {
                    let Some(last) = t.latest_time() else { continue };
                    if last == 0 {
                        continue;
                    }
                    let past = last - 1;
                    let next_key = t.next_key();
                    let total = t.total();
                    prop_assert_eq!(
                        t.insert(past, Value::one()),
                        Err(TreeError::PastValue { time: past, last })
                    );
                    if !m.weights.is_empty() {
                        let key = idx.index(m.weights.len()) as Key;
                        let rejected = matches!(
                            t.set(key, past, Value::one()),
                            Err(TreeError::PastValue { .. })
                        );
                        prop_assert!(rejected, "set before the latest time must fail with PastValue");
                    }
                    prop_assert_eq!(t.next_key(), next_key);
                    prop_assert_eq!(t.total(), total);
                }
                Op::Draw(raw) => {
                    let total: u64 = m.weights.iter().sum();
                    if total == 0 {
                        if !raw.is_empty() {
                            prop_assert!(t.multisortition(m.time, &[Value::zero()]).is_err());
                        }
                        continue;
                    }
                    let draws: Vec<Value> = raw.iter().map(|r| Value::from(r % total)).collect();
                    let got = t.multisortition(m.time, &draws).unwrap();
                    prop_assert_eq!(got.len(), draws.len());
                    for (r, d) in raw.iter().zip(&got) {
                        let (key, residual) = scan(&m.weights, r % total);
                        prop_assert_eq!(d.key, key);
                        prop_assert_eq!(d.residual, Value::from(residual));
                        prop_assert_eq!(d.weight, Value::from(m.weights[key as usize]));
                    }
                }
            }
        }

        prop_assert_eq!(t.next_key(), m.weights.len() as Key);
        validate_tree(&t);

        // Every past snapshot is still answerable.
        let last = m.snapshots.keys().next_back().copied().unwrap_or(0);
        for time in 0..=last + 1 {
            let weights = m.weights_at(time);
            for key in 0..m.weights.len() {
                let expected = weights.get(key).copied().unwrap_or(0);
                prop_assert_eq!(t.item_at(key as Key, time), Value::from(expected));
            }
            let expected_total: u64 = weights.iter().sum();
            prop_assert_eq!(t.total_at(time), Value::from(expected_total));
        }
    }

    #[test]
    fn prop_multisortition_matches_search(
        weights in prop::collection::vec(0u64..10_000, 1..=300),
        raw in prop::collection::vec(any::<u64>(), 1..64),
    ) {
        let mut t = HexSumTree::new();
        for (time, w) in weights.iter().enumerate() {
            t.insert(time as Time, Value::from(*w)).unwrap();
        }
        let total: u64 = weights.iter().sum();
        prop_assume!(total > 0);

        let now = weights.len() as Time - 1;
        let draws: Vec<Value> = raw.iter().map(|r| Value::from(r % total)).collect();
        let batched = t.multisortition(now, &draws).unwrap();
        for (draw, got) in draws.iter().zip(&batched) {
            prop_assert_eq!(*got, t.search(now, *draw).unwrap());
        }
    }
}

#[test]
fn growth_boundaries() {
    let mut t = HexSumTree::new();
    for key in 0..=256u64 {
        t.insert(key, Value::one()).unwrap();
        let expected = match key {
            0..=15 => 1,
            16..=255 => 2,
            _ => 3,
        };
        assert_eq!(t.height(), expected, "height after inserting key {key}");
    }
    assert_eq!(t.height_at(15), 1);
    assert_eq!(t.height_at(16), 2);
    assert_eq!(t.height_at(256), 3);
    assert_eq!(t.node(2, 0), Value::from(256u64));
    assert_eq!(t.node(2, 256), Value::one());
    assert_eq!(t.total(), Value::from(257u64));
    validate_tree(&t);
}

#[test]
fn failed_mutations_leave_no_trace() {
    let mut t = HexSumTree::new();
    t.insert(1, MAX_VALUE - Value::from(10u64)).unwrap();
    t.insert(1, Value::from(5u64)).unwrap();
    let before = t.clone();

    // The leaf fits, but the root would exceed the bound.
    assert_eq!(t.set(1, 2, Value::from(20u64)), Err(TreeError::ValueTooLarge));
    assert_eq!(t.update(1, 2, Value::from(6u64), true), Err(TreeError::ValueTooLarge));
    assert_eq!(t.insert(2, Value::from(11u64)), Err(TreeError::ValueTooLarge));

    assert_eq!(t.next_key(), before.next_key());
    assert_eq!(t.latest_time(), before.latest_time());
    for key in 0..3 {
        assert_eq!(t.history(0, key), before.history(0, key));
    }
    assert_eq!(t.history(1, 0), before.history(1, 0));
    validate_tree(&t);
}
