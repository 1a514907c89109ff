//! Property tests for seeding and diffusion over random multigraphs.

use edgeprop_core::{GraphBuilder, GraphStore, PropagationConfig};
use edgeprop_diffuse::{DiffusionEngine, DiffusionOptions, EdgeLabels, SeedInitializer};
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Random multigraphs with parallel edges and self-loops allowed.
fn arb_graph() -> impl Strategy<Value = GraphStore> {
    (1usize..12).prop_flat_map(|nodes| {
        prop::collection::vec((0..nodes, 0..nodes), 1..40).prop_map(move |pairs| {
            let mut builder = GraphBuilder::new();
            for n in 0..nodes {
                builder.add_node(&format!("n{n}"));
            }
            for (u, v) in pairs {
                builder.add_edge(&format!("n{u}"), &format!("n{v}"));
            }
            builder.build().expect("generated edges are well formed")
        })
    })
}

fn arb_config() -> impl Strategy<Value = PropagationConfig> {
    (2usize..6, 0.0f64..=1.0, 0.0f64..=1.0, 0.0f64..=1.0, 0i64..8, any::<u64>(), any::<bool>())
        .prop_map(|(states, pz, pnz, alpha, iterations, seed, self_twice)| PropagationConfig {
            states,
            percent_zero: pz,
            percent_nonzero: pnz,
            alpha,
            iterations,
            random_seed: seed,
            include_self_twice: self_twice,
            ..PropagationConfig::default()
        })
}

fn run(graph: &GraphStore, config: &PropagationConfig, parallel: bool) -> (Vec<f64>, Vec<u32>) {
    let (initial, _) = SeedInitializer::from_config(config)
        .expect("valid")
        .initialize(graph.edge_count(), &mut StdRng::seed_from_u64(config.random_seed))
        .expect("seeds");
    let mut options = DiffusionOptions::from(config);
    options.parallel = parallel;
    let mut engine = DiffusionEngine::new(graph, initial, options).expect("sizes match");
    engine.run();
    let states = engine.into_states();
    let flat = states.iter().flat_map(|(_, v)| v.iter().copied()).collect();
    (flat, EdgeLabels::extract(&states).as_slice().to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn seeds_carry_exactly_one_nonzero_entry(graph in arb_graph(), config in arb_config()) {
        let (table, report) = SeedInitializer::from_config(&config)
            .expect("valid")
            .initialize(graph.edge_count(), &mut StdRng::seed_from_u64(config.random_seed))
            .expect("seeds");

        prop_assert_eq!(report.seeded() + report.unlabelled, graph.edge_count());
        prop_assert_eq!(report.seeded(), table.seeded_count());
        for (edge, v) in table.iter() {
            if table.is_seeded(edge) {
                let sum: f64 = v.iter().sum();
                let background = (sum - (1.0 - config.alpha)).abs() < 1e-12 && v[1..].iter().all(|&x| x == 0.0);
                let labeled = v[0] == 0.0 && v.iter().filter(|&&x| x == 1.0).count() == 1 && (sum - 1.0).abs() < 1e-12;
                prop_assert!(background || labeled, "edge {} has {:?}", edge, v);
            } else {
                prop_assert!(v.iter().all(|&x| x == 0.0));
            }
        }
    }

    #[test]
    fn seeded_vectors_never_change(graph in arb_graph(), config in arb_config()) {
        let (initial, _) = SeedInitializer::from_config(&config)
            .expect("valid")
            .initialize(graph.edge_count(), &mut StdRng::seed_from_u64(config.random_seed))
            .expect("seeds");
        let mut engine = DiffusionEngine::new(&graph, initial.clone(), DiffusionOptions::from(&config))
            .expect("sizes match");
        engine.run();
        let fin = engine.into_states();
        for edge in graph.edges().filter(|&e| initial.is_seeded(e)) {
            prop_assert_eq!(fin.vector(edge), initial.vector(edge));
        }
    }

    #[test]
    fn updated_vectors_are_distributions(graph in arb_graph(), config in arb_config()) {
        prop_assume!(config.iterations > 0);
        let (initial, _) = SeedInitializer::from_config(&config)
            .expect("valid")
            .initialize(graph.edge_count(), &mut StdRng::seed_from_u64(config.random_seed))
            .expect("seeds");
        let mut engine = DiffusionEngine::new(&graph, initial.clone(), DiffusionOptions::from(&config))
            .expect("sizes match");
        engine.run();
        for edge in graph.edges().filter(|&e| !initial.is_seeded(e)) {
            let v = engine.vector(edge);
            prop_assert!((v.iter().sum::<f64>() - 1.0).abs() < 1e-9, "edge {} sums to {:?}", edge, v);
            prop_assert!(v.iter().all(|&x| x > 0.0 && x < 1.0 + 1e-12));
        }
    }

    #[test]
    fn same_seed_same_result(graph in arb_graph(), config in arb_config()) {
        prop_assert_eq!(run(&graph, &config, false), run(&graph, &config, false));
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_matches_sequential(graph in arb_graph(), config in arb_config()) {
        prop_assert_eq!(run(&graph, &config, true), run(&graph, &config, false));
    }
}

#[test]
fn zero_iterations_return_the_seeds() {
    let graph = GraphStore::from_edges(&[("a", "b"), ("b", "c"), ("c", "a")]).expect("cycle");
    let config = PropagationConfig {
        states: 4,
        percent_zero: 0.0,
        percent_nonzero: 0.0,
        iterations: 0,
        ..PropagationConfig::default()
    };
    let (flat, labels) = run(&graph, &config, false);
    assert!(flat.iter().all(|&x| x == 0.0));
    assert_eq!(labels, vec![0, 0, 0]);
}

#[test]
fn fully_seeded_graph_is_a_fixed_point() {
    let graph = GraphStore::from_edges(&[("a", "b"), ("b", "c"), ("c", "d"), ("d", "a")]).expect("square");
    let config = PropagationConfig {
        states: 3,
        percent_zero: 0.0,
        percent_nonzero: 1.0,
        iterations: 25,
        ..PropagationConfig::default()
    };
    let (initial, report) = SeedInitializer::from_config(&config)
        .expect("valid")
        .initialize(4, &mut StdRng::seed_from_u64(config.random_seed))
        .expect("seeds");
    assert_eq!(report.labeled, 4);

    let mut engine = DiffusionEngine::new(&graph, initial.clone(), DiffusionOptions::from(&config)).expect("sizes match");
    engine.run();
    assert_eq!(engine.completed_rounds(), 25);
    assert_eq!(engine.into_states(), initial);
}

#[test]
fn all_background_labels_state_zero() {
    let graph = GraphStore::from_edges(&[("a", "b"), ("b", "c"), ("c", "c")]).expect("valid");
    let config = PropagationConfig {
        states: 5,
        percent_zero: 1.0,
        alpha: 0.8,
        iterations: 10,
        ..PropagationConfig::default()
    };
    let (flat, labels) = run(&graph, &config, false);
    assert_eq!(labels, vec![0, 0, 0]);
    for row in flat.chunks(5) {
        assert!((row[0] - 0.2).abs() < 1e-12);
    }
}

#[test]
fn labels_spread_along_a_path() {
    // a-b-c-d-e with the first segment fixed to state 2: after enough rounds
    // every other segment leans towards state 2.
    let graph = GraphStore::from_edges(&[("a", "b"), ("b", "c"), ("c", "d"), ("d", "e")]).expect("path");
    let config = PropagationConfig {
        states: 3,
        percent_zero: 0.0,
        percent_nonzero: 0.0,
        iterations: 50,
        ..PropagationConfig::default()
    };
    let (initial, _) = SeedInitializer::from_config(&config)
        .expect("valid")
        .with_known([(0, 2)].into())
        .expect("state in range")
        .initialize(4, &mut StdRng::seed_from_u64(1))
        .expect("seeds");
    let mut engine = DiffusionEngine::new(&graph, initial, DiffusionOptions::from(&config)).expect("sizes match");
    engine.run();
    let labels = EdgeLabels::extract(&engine.into_states());
    assert_eq!(labels.as_slice(), &[2, 2, 2, 2]);
}
