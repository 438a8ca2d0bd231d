//! Producer-before-consumer ordering of pass nodes.
//!
//! Depth-first topological sort with visiting/visited marking. A node is
//! emitted only after every node producing one of its inputs. Inputs nobody
//! produces are treated as already available.

use std::collections::{HashMap, HashSet};

use framegraph_common::EntityId;

use crate::graph::{PassNode, producer_index};

/// The pass graph loops back on itself.
///
/// `cycle` lists the pass entities on the loop in traversal order, starting
/// and ending with the pass that was revisited.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("circular dependency between passes {}", format_cycle(.cycle))]
pub struct CircularDependency {
    pub cycle: Vec<EntityId>,
}

fn format_cycle(cycle: &[EntityId]) -> String {
    cycle
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// DFS bookkeeping, keyed by pass entity.
#[derive(Debug, Default)]
struct Marks {
    visiting: HashSet<EntityId>,
    visited: HashSet<EntityId>,
    /// Passes currently on the DFS stack, outermost first.
    path: Vec<EntityId>,
}

/// Order `nodes` so producers precede consumers.
///
/// Deterministic for a fixed node order and input order. A node whose entity
/// was already emitted is dropped, so each pass entity appears at most once.
pub fn sort(nodes: Vec<PassNode>) -> Result<Vec<PassNode>, CircularDependency> {
    let order = sort_indices(&nodes)?;
    let mut slots: Vec<Option<PassNode>> = nodes.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
}

/// Same as [`sort`], returning positions into `nodes` instead of moving them.
pub fn sort_indices(nodes: &[PassNode]) -> Result<Vec<usize>, CircularDependency> {
    let producers = producer_index(nodes);
    let mut marks = Marks::default();
    let mut out = Vec::with_capacity(nodes.len());

    for (i, node) in nodes.iter().enumerate() {
        if !marks.visited.contains(&node.entity) {
            visit(nodes, &producers, i, &mut marks, &mut out)?;
        }
    }
    Ok(out)
}

fn visit(
    nodes: &[PassNode],
    producers: &HashMap<EntityId, usize>,
    index: usize,
    marks: &mut Marks,
    out: &mut Vec<usize>,
) -> Result<(), CircularDependency> {
    let node = &nodes[index];
    if marks.visiting.contains(&node.entity) {
        let start = marks
            .path
            .iter()
            .position(|e| *e == node.entity)
            .unwrap_or(0);
        let mut cycle = marks.path[start..].to_vec();
        cycle.push(node.entity);
        return Err(CircularDependency { cycle });
    }
    if marks.visited.contains(&node.entity) {
        return Ok(());
    }

    marks.visiting.insert(node.entity);
    marks.path.push(node.entity);

    for input in &node.inputs {
        if let Some(&producer) = producers.get(input)
            && !marks.visited.contains(&nodes[producer].entity)
        {
            visit(nodes, producers, producer, marks, out)?;
        }
    }

    marks.path.pop();
    marks.visiting.remove(&node.entity);
    marks.visited.insert(node.entity);
    out.push(index);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::PassKind;

    fn pass(id: u64, inputs: &[u64], outputs: &[u64]) -> PassNode {
        PassNode {
            entity: EntityId(id),
            kind: PassKind::Compute,
            inputs: inputs.iter().copied().map(EntityId).collect(),
            outputs: outputs.iter().copied().map(EntityId).collect(),
            uniforms: Vec::new(),
        }
    }

    fn entities(nodes: &[PassNode]) -> Vec<u64> {
        nodes.iter().map(|n| n.entity.0).collect()
    }

    #[test]
    fn empty_graph_sorts_to_empty() {
        assert!(sort(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn producer_before_consumer_either_order() {
        let a = pass(1, &[], &[10]);
        let b = pass(2, &[10], &[]);

        let sorted = sort(vec![a.clone(), b.clone()]).unwrap();
        assert_eq!(entities(&sorted), vec![1, 2]);

        let sorted = sort(vec![b, a]).unwrap();
        assert_eq!(entities(&sorted), vec![1, 2]);
    }

    #[test]
    fn chain_is_ordered() {
        let nodes = vec![
            pass(3, &[21], &[]),
            pass(2, &[20], &[21]),
            pass(1, &[], &[20]),
        ];
        assert_eq!(entities(&sort(nodes).unwrap()), vec![1, 2, 3]);
    }

    #[test]
    fn independent_nodes_keep_input_order() {
        let nodes = vec![pass(5, &[], &[]), pass(3, &[], &[]), pass(4, &[], &[])];
        assert_eq!(entities(&sort(nodes).unwrap()), vec![5, 3, 4]);
    }

    #[test]
    fn unproduced_inputs_impose_nothing() {
        let nodes = vec![pass(1, &[99], &[]), pass(2, &[98], &[])];
        assert_eq!(entities(&sort(nodes).unwrap()), vec![1, 2]);
    }

    #[test]
    fn three_node_cycle_is_reported() {
        // A consumes what C produces, B consumes A, C consumes B.
        let nodes = vec![
            pass(1, &[30], &[10]),
            pass(2, &[10], &[20]),
            pass(3, &[20], &[30]),
        ];
        let err = sort(nodes).unwrap_err();
        assert_eq!(
            err.cycle,
            vec![EntityId(1), EntityId(3), EntityId(2), EntityId(1)]
        );
        assert!(err.to_string().contains("#1 -> #3 -> #2 -> #1"));
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let nodes = vec![pass(7, &[70], &[70])];
        let err = sort(nodes).unwrap_err();
        assert_eq!(err.cycle, vec![EntityId(7), EntityId(7)]);
    }

    #[test]
    fn cycle_downstream_of_acyclic_prefix_is_found() {
        let nodes = vec![
            pass(1, &[], &[10]),
            pass(2, &[10, 40], &[20]),
            pass(3, &[20], &[40]),
        ];
        let err = sort(nodes).unwrap_err();
        assert_eq!(err.cycle.first(), err.cycle.last());
        assert!(err.cycle.contains(&EntityId(2)));
        assert!(err.cycle.contains(&EntityId(3)));
        assert!(!err.cycle.contains(&EntityId(1)));
    }

    #[test]
    fn first_producer_wins_for_ordering() {
        // Both 1 and 2 output 10; only 1 is treated as the producer, so 3
        // follows 1 and 2 keeps its position.
        let nodes = vec![
            pass(3, &[10], &[]),
            pass(1, &[], &[10]),
            pass(2, &[], &[10]),
        ];
        assert_eq!(entities(&sort(nodes).unwrap()), vec![1, 3, 2]);
    }

    #[test]
    fn diamond_emits_shared_producer_once() {
        let nodes = vec![
            pass(4, &[20, 30], &[]),
            pass(2, &[10], &[20]),
            pass(3, &[10], &[30]),
            pass(1, &[], &[10]),
        ];
        assert_eq!(entities(&sort(nodes).unwrap()), vec![1, 2, 3, 4]);
    }

    #[test]
    fn sort_indices_matches_sort() {
        let nodes = vec![pass(2, &[10], &[]), pass(1, &[], &[10])];
        assert_eq!(sort_indices(&nodes).unwrap(), vec![1, 0]);
    }

    // Pseudo-random graphs from fixed SplitMix64 seeds, so every run checks
    // the same fixtures.
    mod random {
        use std::collections::HashMap;

        use framegraph_common::SplitMix64;
        use framegraph_ecs::{ComponentStore, ComputePass, Dependency, Resource, TextureFormat};
        use glam::{UVec2, UVec3};

        use super::super::*;
        use crate::cache::ResourceCache;
        use crate::graph::PassKind;
        use crate::recording::RecordingBackend;
        use crate::runner::{GraphError, run_graph};

        const SEEDS: u64 = 64;

        /// Pass `i` outputs resource `1000 + i` and reads a random subset of
        /// the outputs of passes before it. With `chain` set, pass `i` always
        /// reads pass `i - 1`'s output.
        fn random_dag(rng: &mut SplitMix64, n: usize, chain: bool) -> Vec<PassNode> {
            let mut nodes = Vec::with_capacity(n);
            for i in 0..n {
                let mut node = PassNode::new(EntityId(i as u64 + 1), PassKind::Compute);
                node.outputs.push(resource(i));
                for j in 0..i {
                    if (chain && j + 1 == i) || rng.below(4) == 0 {
                        node.inputs.push(resource(j));
                    }
                }
                nodes.push(node);
            }
            nodes
        }

        fn resource(pass_index: usize) -> EntityId {
            EntityId(1000 + pass_index as u64)
        }

        fn shuffle<T>(rng: &mut SplitMix64, items: &mut [T]) {
            for i in (1..items.len()).rev() {
                let j = rng.below(i as u64 + 1) as usize;
                items.swap(i, j);
            }
        }

        fn assert_producers_first(sorted: &[PassNode]) {
            let position: HashMap<EntityId, usize> = sorted
                .iter()
                .enumerate()
                .flat_map(|(i, node)| node.outputs.iter().map(move |r| (*r, i)))
                .collect();
            for (i, node) in sorted.iter().enumerate() {
                for input in &node.inputs {
                    if let Some(&producer) = position.get(input) {
                        assert!(
                            producer < i,
                            "pass {} at {i} reads {input} produced at {producer}",
                            node.entity
                        );
                    }
                }
            }
        }

        /// Store entities for `template`: one texture per pass output, then
        /// the passes in a shuffled authoring order. With `close_loop` set the
        /// first pass also reads the last pass's output.
        fn scene_from(
            rng: &mut SplitMix64,
            template: &[PassNode],
            close_loop: bool,
        ) -> (ComponentStore, Vec<EntityId>) {
            let n = template.len();
            let mut store = ComponentStore::new();
            let resources: Vec<EntityId> = (0..n)
                .map(|_| {
                    let e = store.create_entity();
                    store
                        .add_component(e, Resource::texture(TextureFormat::R32Float, UVec2::new(4, 4)))
                        .unwrap();
                    e
                })
                .collect();
            let remap = |r: &EntityId| resources[(r.0 - 1000) as usize];

            let mut order: Vec<usize> = (0..n).collect();
            shuffle(rng, &mut order);
            let mut passes = vec![EntityId(0); n];
            for i in order {
                let node = &template[i];
                let mut inputs: Vec<EntityId> = node.inputs.iter().map(remap).collect();
                if close_loop && i == 0 {
                    inputs.push(resources[n - 1]);
                }
                let e = store.create_entity();
                store
                    .add_component(e, ComputePass::new("erosion.wgsl", UVec3::ONE))
                    .unwrap();
                store
                    .add_component(e, Dependency::new(inputs, node.outputs.iter().map(remap).collect()))
                    .unwrap();
                passes[i] = e;
            }
            (store, passes)
        }

        #[test]
        fn random_dags_sort_producers_first() {
            for seed in 0..SEEDS {
                let mut rng = SplitMix64::new(seed);
                let n = 1 + rng.below(50) as usize;
                let mut nodes = random_dag(&mut rng, n, false);
                shuffle(&mut rng, &mut nodes);

                let sorted = sort(nodes).unwrap_or_else(|e| panic!("seed {seed}: {e}"));
                assert_eq!(sorted.len(), n, "seed {seed}");
                let mut ids: Vec<EntityId> = sorted.iter().map(|n| n.entity).collect();
                ids.sort();
                ids.dedup();
                assert_eq!(ids.len(), n, "seed {seed}: duplicate passes");
                assert_producers_first(&sorted);
            }
        }

        #[test]
        fn sort_is_deterministic_for_a_fixed_input_order() {
            for seed in 0..SEEDS {
                let mut rng = SplitMix64::new(seed);
                let n = 1 + rng.below(50) as usize;
                let mut nodes = random_dag(&mut rng, n, false);
                shuffle(&mut rng, &mut nodes);

                assert_eq!(sort(nodes.clone()).unwrap(), sort(nodes).unwrap());
            }
        }

        #[test]
        fn closing_a_chain_into_a_loop_is_detected() {
            for seed in 0..SEEDS {
                let mut rng = SplitMix64::new(seed);
                let n = 2 + rng.below(49) as usize;
                let mut nodes = random_dag(&mut rng, n, true);
                nodes[0].inputs.push(resource(n - 1));
                shuffle(&mut rng, &mut nodes);

                let err = sort(nodes.clone()).unwrap_err();
                assert!(err.cycle.len() >= 2, "seed {seed}");
                assert_eq!(err.cycle.first(), err.cycle.last(), "seed {seed}");

                // Each step walks from a consumer to the producer of one of its inputs.
                let by_entity: HashMap<EntityId, &PassNode> =
                    nodes.iter().map(|n| (n.entity, n)).collect();
                for pair in err.cycle.windows(2) {
                    let consumer = by_entity[&pair[0]];
                    let producer = by_entity[&pair[1]];
                    assert!(
                        consumer.inputs.iter().any(|r| producer.produces(*r)),
                        "seed {seed}: {} does not read from {}",
                        pair[0],
                        pair[1]
                    );
                }
            }
        }

        #[test]
        fn run_graph_on_random_scenes_dispatches_in_dependency_order() {
            for seed in 0..16 {
                let mut rng = SplitMix64::new(seed);
                let n = 1 + rng.below(50) as usize;
                let template = random_dag(&mut rng, n, false);
                let (store, passes) = scene_from(&mut rng, &template, false);

                let mut backend = RecordingBackend::new();
                let report = run_graph(&store, &mut backend, &mut ResourceCache::new())
                    .unwrap_or_else(|e| panic!("seed {seed}: {e}"));
                assert_eq!(report.dispatched.len(), n, "seed {seed}");
                assert_eq!(backend.submissions().count(), n, "seed {seed}");

                let position: HashMap<EntityId, usize> =
                    report.dispatched.iter().enumerate().map(|(i, e)| (*e, i)).collect();
                for (i, node) in template.iter().enumerate() {
                    for input in &node.inputs {
                        let producer = (input.0 - 1000) as usize;
                        assert!(position[&passes[producer]] < position[&passes[i]], "seed {seed}");
                    }
                }
            }
        }

        #[test]
        fn cyclic_scene_makes_no_backend_calls() {
            let mut rng = SplitMix64::new(7);
            let template = random_dag(&mut rng, 12, true);
            let (store, _) = scene_from(&mut rng, &template, true);

            let mut backend = RecordingBackend::new();
            let err = run_graph(&store, &mut backend, &mut ResourceCache::new()).unwrap_err();
            assert!(matches!(err, GraphError::CircularDependency(_)));
            assert!(backend.calls().is_empty());
        }
    }
}
