//! Property tests for the incidence index of [`GraphStore`].

use edgeprop_core::GraphStore;
use proptest::prelude::*;

fn arb_edges() -> impl Strategy<Value = Vec<(u8, u8)>> {
    prop::collection::vec((0u8..12, 0u8..12), 0..40)
}

fn build(edges: &[(u8, u8)]) -> GraphStore {
    let keyed: Vec<(String, String)> = edges
        .iter()
        .map(|(u, v)| (u.to_string(), v.to_string()))
        .collect();
    let refs: Vec<(&str, &str)> = keyed.iter().map(|(u, v)| (u.as_str(), v.as_str())).collect();
    GraphStore::from_edges(&refs).expect("generated edges only use declared nodes")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn degrees_sum_to_twice_the_edge_count(edges in arb_edges()) {
        let g = build(&edges);
        let total: usize = g.nodes().map(|n| g.degree(n)).sum();
        prop_assert_eq!(total, 2 * g.edge_count());
    }

    #[test]
    fn each_edge_is_listed_at_both_endpoints(edges in arb_edges()) {
        let g = build(&edges);
        for e in g.edges() {
            let (u, v) = g.endpoints(e).expect("edge in range");
            let at_u = g.neighbors(u).iter().filter(|i| i.edge == e).count();
            let at_v = g.neighbors(v).iter().filter(|i| i.edge == e).count();
            if u == v {
                prop_assert_eq!(at_u, 2);
            } else {
                prop_assert_eq!(at_u, 1);
                prop_assert_eq!(at_v, 1);
            }
        }
    }

    #[test]
    fn incidence_lists_are_sorted_by_edge_id(edges in arb_edges()) {
        let g = build(&edges);
        for n in g.nodes() {
            let ids: Vec<usize> = g.neighbors(n).iter().map(|i| i.edge).collect();
            prop_assert!(ids.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
