use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use test_utils::{addr, clustered_corpus, fixture_addresses};
use v6scout::{
    AddressContainer, AddressSpaceError, AddressTree, BinaryAddressContainer, ClusterSet, GenCluster,
    GenRange, Ipv6Cidr,
};


fn binary_corpus(addrs: &[u128]) -> BinaryAddressContainer {
    let mut container = BinaryAddressContainer::new();
    container.add_addresses(addrs);
    container
}

/// Fixture clustered down to its eight /124-style patterns
fn fixture_model(corpus: &dyn AddressContainer) -> ClusterSet {
    let seeds = ClusterSet::from_seeds(&fixture_addresses(), corpus).unwrap();
    seeds.upgrade(corpus, 0.05).unwrap().unwrap()
}

#[test]
fn test_distance_counts_fixed_positions_only() {
    let cluster = GenCluster::new(GenRange::from_address(addr("2600::1")).copy_with_wildened(&[31]), 1);
    assert_eq!(cluster.distance_from_address(addr("2600::f")).unwrap(), 0);
    assert_eq!(cluster.distance_from_address(addr("2601::2")).unwrap(), 1);
    assert_eq!(cluster.distance_from_address(addr("2701::12")).unwrap(), 3);
}

#[test]
fn test_best_upgrade_options_on_fixture() {
    let corpus = binary_corpus(&fixture_addresses());
    let seed = GenCluster::measure(GenRange::from_address(addr("2600:0:1::")), &corpus).unwrap();
    assert_eq!(seed.captured, 1);
    assert_eq!(seed.density, 1.0);

    let options = seed.best_upgrade_options(&corpus).unwrap();
    assert_eq!(options.positions, vec![31]);
    assert_eq!(options.best_count, 8);
    assert_eq!(options.best_density, 0.5);
}

#[test]
fn test_best_upgrade_options_returns_ties() {
    let corpus = binary_corpus(&[addr("2600::"), addr("2600::1"), addr("2600::10")]);
    let seed = GenCluster::measure(GenRange::from_address(addr("2600::")), &corpus).unwrap();
    let options = seed.best_upgrade_options(&corpus).unwrap();
    assert_eq!(options.positions, vec![30, 31]);
    assert_eq!(options.best_count, 2);
    assert_eq!(options.best_density, 2.0 / 16.0);
}

#[test]
fn test_seed_set_aggregates() {
    let corpus = binary_corpus(&fixture_addresses());
    let mut seeds = fixture_addresses();
    seeds.push(seeds[0]);
    let set = ClusterSet::from_seeds(&seeds, &corpus).unwrap();
    assert_eq!(set.len(), 64);
    assert_eq!(set.captured(), 64);
    assert_eq!(set.coverage(), 64);
    assert_eq!(set.range_size(), 64.0);
    assert_eq!(set.density(), 1.0);
}

#[test]
fn test_upgrade_converges_on_fixture() {
    let corpus = binary_corpus(&fixture_addresses());
    let model = fixture_model(&corpus);

    assert_eq!(model.len(), 8);
    assert_eq!(model.captured(), 64);
    assert_eq!(model.coverage(), 64);
    assert_eq!(model.density(), 0.5);
    assert!(model.clusters().iter().all(|c| c.range.wild_indices() == vec![31]));

    // Every further generalization dilutes the clusters
    assert!(model.upgrade(&corpus, 0.05).unwrap().is_none());
}

#[test]
fn test_upgrade_agrees_across_containers() {
    let mut tree = AddressTree::new();
    tree.add_addresses(&fixture_addresses());
    let binary = binary_corpus(&fixture_addresses());
    assert_eq!(fixture_model(&tree).signatures(), fixture_model(&binary).signatures());
}

#[test]
fn test_upgrade_on_clustered_corpus() {
    let addrs = clustered_corpus();
    let corpus = binary_corpus(&addrs);
    let seeds = ClusterSet::from_seeds(&addrs, &corpus).unwrap();

    let model = seeds.upgrade(&corpus, 0.05).unwrap().unwrap();
    assert_eq!(model.len(), 3);
    assert_eq!(model.captured(), 34);
    assert_eq!(model.coverage(), 34);
    assert_eq!(model.range_size(), 48.0);
    assert!(model.upgrade(&corpus, 0.05).unwrap().is_none());
}

#[test]
fn test_coverage_building_from_single_seed() {
    let corpus = binary_corpus(&fixture_addresses());
    let seeds = ClusterSet::from_seeds(&[addr("2600:0:1::")], &corpus).unwrap();
    assert_eq!(seeds.coverage(), 1);

    let grown = seeds.upgrade(&corpus, 0.05).unwrap().unwrap();
    assert_eq!(grown.len(), 1);
    assert_eq!(grown.coverage(), 8);
    assert!(grown.upgrade(&corpus, 0.05).unwrap().is_none());
}

#[test]
fn test_upgrade_loop_terminates_and_respects_acceptance() {
    let mut addrs = clustered_corpus();
    addrs.extend(fixture_addresses());
    let corpus = binary_corpus(&addrs);

    for threshold in [0.001, 0.05, 0.5, 1.0] {
        let mut current = ClusterSet::from_seeds(&addrs, &corpus).unwrap();
        let mut steps = 0;
        while let Some(next) = current.upgrade(&corpus, threshold).unwrap() {
            if current.density() != 1.0 {
                let improved = next.density() > current.density()
                    || (next.density() == current.density() && next.captured() > current.captured());
                let building = next.coverage() < corpus.size() && next.density() >= threshold;
                assert!(improved || building, "threshold {} step {}", threshold, steps);
            }
            assert!((0.0..=1.0).contains(&next.density()));
            current = next;
            steps += 1;
            assert!(steps < 100, "no fixed point for threshold {}", threshold);
        }
    }
}

#[test]
fn test_coverage_counts_overlapping_clusters_once() {
    let corpus = binary_corpus(&fixture_addresses());
    let low = GenRange::from_address(addr("2600:0:1::")).copy_with_wildened(&[31]);
    let wider = low.copy_with_wildened(&[27]);
    let apart = GenRange::from_address(addr("2600:0:1:0:1::")).copy_with_wildened(&[31]);
    assert!(low.overlaps(&wider));
    assert!(!low.overlaps(&apart));

    let clusters = [&low, &wider, &apart, &low]
        .iter()
        .map(|&r| GenCluster::new(r.clone(), 0))
        .collect();
    let set = ClusterSet::from_clusters(clusters, &corpus).unwrap();
    assert_eq!(set.captured(), 8 + 16 + 8 + 8);
    assert_eq!(set.coverage(), 24);

    let mut tree = AddressTree::new();
    tree.add_addresses(&fixture_addresses());
    let set = ClusterSet::from_clusters(set.clusters().to_vec(), &tree).unwrap();
    assert_eq!(set.coverage(), 24);
}

#[test]
fn test_empty_set_has_no_upgrade() {
    let corpus = binary_corpus(&fixture_addresses());
    let empty = ClusterSet::from_clusters(Vec::new(), &corpus).unwrap();
    assert!(empty.is_empty());
    assert_eq!(empty.density(), 0.0);
    assert!(empty.upgrade(&corpus, 0.5).unwrap().is_none());
}

#[test]
fn test_generation_fidelity() {
    let corpus = binary_corpus(&fixture_addresses());
    let model = fixture_model(&corpus);
    let mut rng = StdRng::seed_from_u64(42);

    let generated = model.generate_addresses(100, 0.0, &mut rng).unwrap();
    assert_eq!(generated.len(), 100);
    assert_eq!(generated.iter().collect::<HashSet<_>>().len(), 100);
    for a in &generated {
        assert!(model.clusters().iter().any(|c| c.range.contains(*a)));
    }
}

#[test]
fn test_generation_with_jitter_leaves_patterns() {
    let corpus = binary_corpus(&fixture_addresses());
    let model = fixture_model(&corpus);
    let mut rng = StdRng::seed_from_u64(5);

    let generated = model.generate_addresses(200, 0.5, &mut rng).unwrap();
    let outside = generated
        .iter()
        .filter(|&&a| !model.clusters().iter().any(|c| c.range.contains(a)))
        .count();
    assert!(outside > 0);
}

#[test]
fn test_generation_exhausts_small_models() {
    let corpus = binary_corpus(&fixture_addresses());
    let model = fixture_model(&corpus);
    let mut rng = StdRng::seed_from_u64(9);

    // 8 clusters of 16 addresses each
    assert_eq!(model.generate_addresses(128, 0.0, &mut rng).unwrap().len(), 128);
    assert!(matches!(
        model.generate_addresses(129, 0.0, &mut rng),
        Err(AddressSpaceError::GenerationExhausted { produced: 128, requested: 129 })
    ));
}

#[test]
fn test_network_scoped_generation() {
    let corpus = binary_corpus(&fixture_addresses());
    let model = fixture_model(&corpus);
    let mut rng = StdRng::seed_from_u64(17);

    let net: Ipv6Cidr = "2600:0:1:0:0:1::/96".parse().unwrap();
    let generated = model.generate_addresses_in_network(32, 0.0, &net, &mut rng).unwrap();
    assert_eq!(generated.len(), 32);
    for a in &generated {
        assert!(net.contains(*a));
        assert!(model.clusters().iter().any(|c| c.range.contains(*a)));
    }

    let jittered = model.generate_addresses_in_network(32, 0.3, &net, &mut rng).unwrap();
    assert!(jittered.iter().all(|&a| net.contains(a)));

    let foreign: Ipv6Cidr = "2601::/16".parse().unwrap();
    assert!(matches!(
        model.generate_addresses_in_network(1, 0.0, &foreign, &mut rng),
        Err(AddressSpaceError::IncompatibleNetwork(_))
    ));
}

#[test]
fn test_nearest_cluster() {
    let corpus = binary_corpus(&fixture_addresses());
    let model = fixture_model(&corpus);

    let nearest = model.nearest_cluster(addr("2600:0:1:0:1:0:1:f")).unwrap().unwrap();
    assert_eq!(nearest.range.to_string(), "2600:0000:0001:0000:0001:0000:0001:000?");
}
