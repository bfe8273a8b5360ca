//! Property tests for the bounded ring and the priority queue layered on it.

use antiping_core::{BoundedRing, CollectionError, EvictingPriorityQueue};
use proptest::prelude::*;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
enum QueueOp {
    Push(u32),
    Pop,
}

fn queue_op() -> impl Strategy<Value = QueueOp> {
    prop_oneof![
        3 => any::<u32>().prop_map(QueueOp::Push),
        1 => Just(QueueOp::Pop),
    ]
}

proptest! {
    #[test]
    fn ring_within_capacity_preserves_order(
        cap in 1usize..32,
        items in prop::collection::vec(any::<i64>(), 0..32),
    ) {
        let items: Vec<i64> = items.into_iter().take(cap).collect();
        let mut ring = BoundedRing::new(cap).unwrap();
        for item in &items {
            prop_assert_eq!(ring.append(*item), None);
        }
        prop_assert_eq!(ring.len(), items.len());
        let collected: Vec<i64> = ring.iter().copied().collect();
        prop_assert_eq!(collected, items);
    }

    #[test]
    fn ring_overflow_evicts_oldest_survivor(
        cap in 1usize..16,
        items in prop::collection::vec(any::<i64>(), 0..64),
    ) {
        let mut ring = BoundedRing::new(cap).unwrap();
        let mut model: VecDeque<i64> = VecDeque::new();
        for item in items {
            let expected = if model.len() == cap { model.pop_front() } else { None };
            model.push_back(item);
            prop_assert_eq!(ring.append(item), expected);
            prop_assert!(ring.len() <= cap);
        }
        let collected: Vec<i64> = ring.iter().copied().collect();
        let expected: Vec<i64> = model.into_iter().collect();
        prop_assert_eq!(collected, expected);
    }

    #[test]
    fn queue_peek_is_minimum_after_every_mutation(
        cap in 1usize..24,
        ops in prop::collection::vec(queue_op(), 0..128),
    ) {
        let mut queue = EvictingPriorityQueue::new(cap).unwrap();
        let mut model: Vec<u32> = Vec::new();
        for op in ops {
            match op {
                QueueOp::Push(value) => {
                    let result = queue.push(value);
                    if model.len() == cap {
                        prop_assert_eq!(result, Err(CollectionError::capacity_exceeded(cap)));
                    } else {
                        prop_assert!(result.is_ok());
                        model.push(value);
                    }
                }
                QueueOp::Pop => {
                    match model.iter().copied().min() {
                        Some(min) => {
                            prop_assert_eq!(queue.pop_min().unwrap(), min);
                            let at = model.iter().position(|v| *v == min).unwrap();
                            model.swap_remove(at);
                        }
                        None => prop_assert!(queue.pop_min().is_err()),
                    }
                }
            }
            prop_assert!(queue.is_heap());
            prop_assert_eq!(queue.len(), model.len());
            prop_assert_eq!(queue.peek_min().copied(), model.iter().copied().min());
        }
    }
}

#[test]
fn ring_scenario_three_slots() {
    let mut ring = BoundedRing::new(3).unwrap();
    for item in [321, 654, 789] {
        ring.append(item);
    }
    assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![321, 654, 789]);

    assert_eq!(ring.append(987), Some(321));
    assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![654, 789, 987]);
}
