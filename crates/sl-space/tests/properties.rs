//! Property tests for decoding arbitrary spaces with aliased leaves.

use proptest::prelude::*;
use sl_space::{Domain, Node, ParameterSpace};
use sl_types::ParameterValue;

fn domain_strategy() -> impl Strategy<Value = Domain> {
    prop_oneof![
        (-100.0f64..100.0, 0.0f64..50.0).prop_map(|(low, width)| Domain::Continuous {
            low,
            high: low + width,
        }),
        (1e-6f64..1.0, 1.0f64..1000.0).prop_map(|(low, mult)| Domain::LogUniform {
            low,
            high: low * mult,
        }),
        (-50i64..50, 0i64..20).prop_map(|(low, width)| Domain::Integer {
            low,
            high: low + width,
        }),
        (1usize..6).prop_map(|k| Domain::Discrete {
            options: (0..k as i64).map(ParameterValue::Int).collect(),
        }),
        (1usize..4).prop_map(|len| Domain::ContinuousVector {
            low: 0.0,
            high: 1.0,
            len,
        }),
        Just(Domain::Fixed {
            value: ParameterValue::Int(7),
        }),
    ]
}

/// Leaves plus a flat list of references into them (duplicates allowed).
fn space_strategy() -> impl Strategy<Value = (ParameterSpace, Vec<usize>)> {
    prop::collection::vec(domain_strategy(), 1..6).prop_flat_map(|leaves| {
        let n = leaves.len();
        (Just(leaves), prop::collection::vec(0..n, 1..10))
    })
    .prop_map(|(leaves, refs)| {
        let mut b = ParameterSpace::builder();
        let handles: Vec<Node> = leaves.into_iter().map(|d| b.leaf(d)).collect();
        let items = refs.iter().map(|&i| handles[i].clone());
        let space = b.build(Node::list(items)).expect("generated domains are valid");
        (space, refs)
    })
}

fn in_domain(domain: &Domain, value: &ParameterValue) -> bool {
    match domain {
        Domain::Fixed { value: fixed } => fixed == value,
        Domain::Continuous { low, high } | Domain::LogUniform { low, high } => value
            .as_f64()
            .is_some_and(|v| v >= low - 1e-9 * low.abs().max(1.0) && v <= high + 1e-9 * high.abs().max(1.0)),
        Domain::Integer { low, high } => value.as_i64().is_some_and(|v| v >= *low && v <= *high),
        Domain::Discrete { options } => options.contains(value),
        Domain::ContinuousVector { low, high, len } => value.as_list().is_some_and(|items| {
            items.len() == *len
                && items
                    .iter()
                    .all(|v| v.as_f64().is_some_and(|x| x >= *low && x <= *high))
        }),
    }
}

proptest! {
    #[test]
    fn prop_vector_length_matches_unique_dimensions(
        (space, _refs) in space_strategy(),
    ) {
        let index = space.index().unwrap();
        let expected: usize = space
            .unique_leaves()
            .iter()
            .map(|id| space.domain(*id).unwrap().num_parameters())
            .sum();
        prop_assert_eq!(index.num_parameters(), expected);
        prop_assert_eq!(space.num_parameters(), expected);
    }

    #[test]
    fn prop_decode_is_idempotent_and_in_domain(
        (space, refs) in space_strategy(),
        raw in prop::collection::vec(0.0f64..=1.0, 32),
    ) {
        let index = space.index().unwrap();
        let vector = &raw[..index.num_parameters()];

        let first = space.decode(vector, &index).unwrap();
        let second = space.decode(vector, &index).unwrap();
        prop_assert_eq!(&first, &second);

        let items = first.as_list().unwrap();
        let leaf_order = space.collect_leaves();
        prop_assert_eq!(items.len(), refs.len());
        for (item, id) in items.iter().zip(&leaf_order) {
            prop_assert!(in_domain(space.domain(*id).unwrap(), item));
        }
    }

    #[test]
    fn prop_aliased_references_decode_identically(
        (space, refs) in space_strategy(),
        raw in prop::collection::vec(0.0f64..=1.0, 32),
    ) {
        let index = space.index().unwrap();
        let value = space.decode(&raw[..index.num_parameters()], &index).unwrap();
        let items = value.as_list().unwrap();
        for i in 0..refs.len() {
            for j in (i + 1)..refs.len() {
                if refs[i] == refs[j] {
                    prop_assert_eq!(&items[i], &items[j]);
                }
            }
        }
    }
}
