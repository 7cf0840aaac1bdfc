use crate::cluster::ClusterSet;
use crate::model::ClusteringOutcome;
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, ContentArrangement, Table};

fn styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
    table
}

/// One row per cluster: pattern, wildcards, captured, size, density
pub fn cluster_table(set: &ClusterSet) -> Table {
    let mut table = styled_table();
    table.set_header(vec!["#", "Pattern", "Wild", "Captured", "Size", "Density"]);

    for (i, cluster) in set.clusters().iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(cluster.range.to_string()),
            Cell::new(cluster.range.wildcard_count()),
            Cell::new(cluster.captured),
            Cell::new(format!("{:.0}", cluster.size())),
            Cell::new(format!("{:.4}", cluster.density)),
        ]);
    }
    table
}

/// Aggregate figures of a clustering run
pub fn summary_table(outcome: &ClusteringOutcome) -> Table {
    let set = &outcome.cluster_set;
    let mut table = styled_table();
    table.set_header(vec![Cell::new("Clustering Summary").add_attribute(Attribute::Bold), Cell::new("")]);

    let status = if outcome.converged { "converged" } else { "iteration ceiling reached" };
    table.add_row(vec![Cell::new("Clusters"), Cell::new(set.len())]);
    table.add_row(vec![Cell::new("Captured"), Cell::new(set.captured())]);
    table.add_row(vec![Cell::new("Covered"), Cell::new(set.coverage())]);
    table.add_row(vec![Cell::new("Range size"), Cell::new(format!("{:.0}", set.range_size()))]);
    table.add_row(vec![Cell::new("Density"), Cell::new(format!("{:.4}", set.density()))]);
    table.add_row(vec![Cell::new("Iterations"), Cell::new(outcome.iterations)]);
    table.add_row(vec![Cell::new("Status"), Cell::new(status)]);
    table.add_row(vec![
        Cell::new("Elapsed"),
        Cell::new(format!("{:.2}s", outcome.elapsed.as_secs_f64())),
    ]);
    table
}
