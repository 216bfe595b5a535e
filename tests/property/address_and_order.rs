// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Address Arithmetic and Graph Ordering
//!
//! These tests verify properties that must hold for all generated blocks
//! and all generated dependency graphs.

use cim_network_topology::domain::{contains, overlaps, CidrBlock, Gateway, Network, Subnet};
use cim_network_topology::{ResourceGraph, TopologyModel, ValidationErrorKind, Validator};
use proptest::prelude::*;
use std::net::Ipv4Addr;

// ============================================================================
// Strategies
// ============================================================================

/// Any block, aligned or not
fn any_block() -> impl Strategy<Value = CidrBlock> {
    (any::<u32>(), 0u8..=32).prop_map(|(base, prefix)| {
        CidrBlock::from_parts(Ipv4Addr::from(base), prefix).expect("prefix within range")
    })
}

/// Aligned block somewhere under 10.0.0.0/8
fn subnet_block() -> impl Strategy<Value = CidrBlock> {
    (0u32..(1 << 24), 20u8..=28).prop_map(|(offset, prefix)| {
        let block = CidrBlock::from_parts(Ipv4Addr::from((10u32 << 24) | offset), prefix)
            .expect("prefix within range");
        block.network()
    })
}

/// Acyclic dependency lists: node `i` may only depend on nodes `< i`
fn dag_edges() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (2usize..12).prop_flat_map(|n| {
        (0..n)
            .map(|i| proptest::collection::vec(0..i.max(1), 0..=i.min(3)))
            .collect::<Vec<_>>()
            .prop_map(|lists| {
                lists
                    .into_iter()
                    .enumerate()
                    .map(|(i, deps)| deps.into_iter().filter(|&d| d < i).collect())
                    .collect()
            })
    })
}

fn dag_model(edges: &[Vec<usize>]) -> TopologyModel {
    let mut model = TopologyModel::new();
    // Declare in reverse so declaration order disagrees with dependency order
    for i in (0..edges.len()).rev() {
        model
            .declare(format!("g{}", i), Gateway::new())
            .expect("unique gateway name");
    }
    for (i, deps) in edges.iter().enumerate() {
        for d in deps {
            model
                .reference(&format!("g{}", i), &format!("g{}", d))
                .expect("declared source");
        }
    }
    model
}

proptest! {
    // ========================================================================
    // Address arithmetic
    // ========================================================================

    /// Property: overlap is symmetric
    #[test]
    fn prop_overlap_is_symmetric(a in any_block(), b in any_block()) {
        prop_assert_eq!(overlaps(&a, &b), overlaps(&b, &a));
    }

    /// Property: a block contains and overlaps itself
    #[test]
    fn prop_block_contains_itself(a in any_block()) {
        prop_assert!(contains(&a, &a));
        prop_assert!(overlaps(&a, &a));
    }

    /// Property: containment implies overlap
    #[test]
    fn prop_containment_implies_overlap(a in any_block(), b in any_block()) {
        if contains(&a, &b) {
            prop_assert!(overlaps(&a, &b));
        }
    }

    /// Property: two CIDR blocks are either nested or disjoint
    #[test]
    fn prop_blocks_nest_or_are_disjoint(a in any_block(), b in any_block()) {
        if overlaps(&a, &b) {
            prop_assert!(contains(&a, &b) || contains(&b, &a));
        }
    }

    /// Property: parsing the canonical form gives back the block
    #[test]
    fn prop_canonical_form_parses(a in any_block()) {
        prop_assert_eq!(CidrBlock::parse(a.as_cidr()).unwrap(), a);
    }

    // ========================================================================
    // Validator acceptance
    // ========================================================================

    /// Property: an accepted topology has contained, pairwise disjoint subnets
    #[test]
    fn prop_accepted_subnets_are_contained_and_disjoint(
        blocks in proptest::collection::vec(subnet_block(), 1..8)
    ) {
        let network = CidrBlock::parse("10.0.0.0/16").unwrap();
        let mut model = TopologyModel::new();
        model.declare("A", Network::new(&network.as_cidr()).unwrap()).unwrap();
        for (i, block) in blocks.iter().enumerate() {
            model
                .declare(format!("s{}", i), Subnet::new("A", &block.as_cidr(), "eu-west-1a").unwrap())
                .unwrap();
        }

        let graph = ResourceGraph::build(&model).unwrap();
        let report = Validator::check(&model, &graph);

        let all_contained = blocks.iter().all(|b| contains(&network, b));
        let disjoint = blocks.iter().enumerate().all(|(i, a)| {
            blocks[..i].iter().all(|b| !overlaps(a, b))
        });

        prop_assert_eq!(report.is_empty(), all_contained && disjoint);
        if !all_contained {
            prop_assert!(!report.of_kind(ValidationErrorKind::SubnetOutsideNetwork).is_empty());
        }
        if !disjoint {
            prop_assert!(!report.of_kind(ValidationErrorKind::SubnetOverlap).is_empty());
        }
    }

    // ========================================================================
    // Graph ordering
    // ========================================================================

    /// Property: no node is placed before any node it depends on
    #[test]
    fn prop_dependencies_come_first(edges in dag_edges()) {
        let model = dag_model(&edges);
        let graph = ResourceGraph::build(&model).unwrap();
        let order: Vec<String> = graph
            .topological_order()
            .unwrap()
            .into_iter()
            .map(|n| n.name.clone())
            .collect();

        prop_assert_eq!(order.len(), edges.len());
        let position = |name: &str| order.iter().position(|n| n == name).unwrap();
        for (i, deps) in edges.iter().enumerate() {
            for d in deps {
                let (before, after) = (position(&format!("g{}", d)), position(&format!("g{}", i)));
                prop_assert!(before < after);
            }
        }
    }

    /// Property: ordering the same graph twice gives the same sequence
    #[test]
    fn prop_topological_order_is_deterministic(edges in dag_edges()) {
        let model = dag_model(&edges);
        let first = ResourceGraph::build(&model).unwrap();
        let second = ResourceGraph::build(&model).unwrap();

        let names = |g: &ResourceGraph| -> Vec<String> {
            g.topological_order().unwrap().into_iter().map(|n| n.name.clone()).collect()
        };
        prop_assert_eq!(names(&first), names(&second));
        prop_assert_eq!(names(&first), names(&first));
    }

    /// Property: waves flatten into a valid order
    #[test]
    fn prop_levels_respect_dependencies(edges in dag_edges()) {
        let graph = ResourceGraph::build(&dag_model(&edges)).unwrap();
        let levels = graph.levels().unwrap();

        let level_of = |name: &str| {
            levels.iter().position(|wave| wave.iter().any(|n| n.name == name)).unwrap()
        };
        for (i, deps) in edges.iter().enumerate() {
            for d in deps {
                let (earlier, later) = (level_of(&format!("g{}", d)), level_of(&format!("g{}", i)));
                prop_assert!(earlier < later);
            }
        }
    }

    /// Property: acyclic graphs have no cycle; a back edge always creates one
    #[test]
    fn prop_back_edge_creates_cycle(edges in dag_edges()) {
        let mut model = dag_model(&edges);
        prop_assert_eq!(ResourceGraph::build(&model).unwrap().detect_cycle(), None);

        if let Some((i, deps)) = edges.iter().enumerate().find(|(_, deps)| !deps.is_empty()) {
            model.reference(&format!("g{}", deps[0]), &format!("g{}", i)).unwrap();
            let graph = ResourceGraph::build(&model).unwrap();
            let cycle = graph.detect_cycle();
            prop_assert!(cycle.as_ref().map_or(false, |path| path.len() >= 3));
            prop_assert!(graph.topological_order().is_err());
        }
    }
}
