use std::time::Duration;
use test_utils::clustered_corpus;
use v6scout::table::{cluster_table, summary_table};
use v6scout::{AddressContainer, BinaryAddressContainer, ClusterSet, ClusteringOutcome};


fn outcome() -> ClusteringOutcome {
    let mut corpus = BinaryAddressContainer::new();
    corpus.add_addresses(&clustered_corpus());
    let seeds = ClusterSet::from_seeds(&clustered_corpus(), &corpus).unwrap();
    ClusteringOutcome {
        cluster_set: seeds.upgrade(&corpus, 0.05).unwrap().unwrap(),
        iterations: 1,
        converged: true,
        elapsed: Duration::from_millis(20),
    }
}

#[test]
fn test_cluster_table_has_one_row_per_cluster() {
    let outcome = outcome();
    let table = cluster_table(&outcome.cluster_set);
    assert_eq!(table.row_iter().count(), 3);

    let rendered = table.to_string();
    assert!(rendered.contains("2001:0db8:0000:0001:0000:0000:0000:000?"));
    assert!(rendered.contains("Density"));
}

#[test]
fn test_summary_table_reports_status() {
    let mut outcome = outcome();
    assert!(summary_table(&outcome).to_string().contains("converged"));

    outcome.converged = false;
    let rendered = summary_table(&outcome).to_string();
    assert!(rendered.contains("iteration ceiling reached"));
    assert!(rendered.contains("34"));
}
