use crate::constants::{GENERATION_STALL_LIMIT, NYBBLE_COUNT};
use crate::container::{AddressContainer, BinaryAddressContainer};
use crate::errors::{AddressSpaceError, Result};
use crate::model::UpgradeOptions;
use crate::net::nybble::{hamming_distance, nybble_at};
use crate::net::Ipv6Cidr;
use crate::pattern::GenRange;
use rand::seq::SliceRandom;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// A pattern together with how much of the corpus it captures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenCluster {
    pub range: GenRange,
    pub captured: u64,
    /// `captured / range.size()`, always within [0, 1]
    pub density: f64,
}

impl GenCluster {
    pub fn new(range: GenRange, captured: u64) -> Self {
        let density = (captured as f64 / range.size()).clamp(0.0, 1.0);
        Self {
            range,
            captured,
            density,
        }
    }

    /// Measure `range` against the corpus
    pub fn measure(range: GenRange, corpus: &dyn AddressContainer) -> Result<Self> {
        let captured = corpus.count_in_pattern(&range)?;
        Ok(Self::new(range, captured))
    }

    pub fn size(&self) -> f64 {
        self.range.size()
    }

    /// Number of fixed nybbles where `addr` disagrees with the pattern
    pub fn distance_from_address(&self, addr: u128) -> Result<usize> {
        let fixed = self.range.fixed_indices();
        let ours: Vec<u8> = fixed.iter().filter_map(|&i| self.range.nybble(i)).collect();
        let theirs: Vec<u8> = fixed.iter().map(|&i| nybble_at(addr, i)).collect();
        hamming_distance(&ours, &theirs)
    }

    /// Try wildcarding each fixed position alone and report the densest results.
    ///
    /// Positions tied at the best density are all returned; each is a
    /// separate generalization direction.
    pub fn best_upgrade_options(&self, corpus: &dyn AddressContainer) -> Result<UpgradeOptions> {
        let mut best = UpgradeOptions {
            best_density: 0.0,
            best_count: 0,
            positions: Vec::new(),
        };

        for i in self.range.fixed_indices() {
            let candidate = self.range.copy_with_wildened(&[i]);
            let count = corpus.count_in_pattern(&candidate)?;
            let density = count as f64 / candidate.size();

            if best.positions.is_empty() || density > best.best_density {
                best = UpgradeOptions {
                    best_density: density,
                    best_count: count,
                    positions: vec![i],
                };
            } else if density == best.best_density {
                best.positions.push(i);
            }
        }
        Ok(best)
    }

    /// Whether no single-nybble generalization is worth taking
    fn is_local_optimum(&self, options: &UpgradeOptions) -> bool {
        if options.positions.is_empty() {
            return true;
        }
        if options.best_density < self.density && self.density < 1.0 {
            return true;
        }
        self.range.wildcard_count() + 1 >= NYBBLE_COUNT
    }
}

/// An ordered collection of clusters forming a generative model of a corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSet {
    clusters: Vec<GenCluster>,
    /// Sum of per-cluster captured counts; overlapping clusters count twice
    captured: u64,
    range_size: f64,
    density: f64,
    /// Distinct corpus addresses inside at least one cluster
    coverage: u64,
}

impl ClusterSet {
    /// One zero-wildcard cluster per distinct seed address
    pub fn from_seeds(seeds: &[u128], corpus: &dyn AddressContainer) -> Result<Self> {
        let mut seen = HashSet::new();
        let clusters = seeds
            .iter()
            .filter(|&&addr| seen.insert(addr))
            .map(|&addr| GenCluster::new(GenRange::from_address(addr), 0))
            .collect();
        Self::from_clusters(clusters, corpus)
    }

    /// Build a set from clusters, re-measuring every cluster against the corpus
    pub fn from_clusters(clusters: Vec<GenCluster>, corpus: &dyn AddressContainer) -> Result<Self> {
        let clusters = clusters
            .into_par_iter()
            .map(|c| GenCluster::measure(c.range, corpus))
            .collect::<Result<Vec<_>>>()?;

        let coverage = distinct_coverage(&clusters, corpus)?;

        let captured = clusters.iter().map(|c| c.captured).sum::<u64>();
        let range_size = clusters.iter().map(GenCluster::size).sum::<f64>();
        let density = if range_size > 0.0 {
            captured as f64 / range_size
        } else {
            0.0
        };

        Ok(Self {
            clusters,
            captured,
            range_size,
            density,
            coverage,
        })
    }

    pub fn clusters(&self) -> &[GenCluster] {
        &self.clusters
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn captured(&self) -> u64 {
        self.captured
    }

    pub fn range_size(&self) -> f64 {
        self.range_size
    }

    pub fn density(&self) -> f64 {
        self.density
    }

    pub fn coverage(&self) -> u64 {
        self.coverage
    }

    /// Sorted pattern signatures, used to detect structural change
    pub fn signatures(&self) -> Vec<String> {
        let mut sigs: Vec<String> = self.clusters.iter().map(|c| c.range.signature()).collect();
        sigs.sort_unstable();
        sigs
    }

    /// Cluster whose fixed nybbles are closest to `addr`
    pub fn nearest_cluster(&self, addr: u128) -> Result<Option<&GenCluster>> {
        let mut best: Option<(usize, &GenCluster)> = None;
        for cluster in &self.clusters {
            let distance = cluster.distance_from_address(addr)?;
            if best.map_or(true, |(d, _)| distance < d) {
                best = Some((distance, cluster));
            }
        }
        Ok(best.map(|(_, c)| c))
    }

    /// One generalization step.
    ///
    /// Returns the next cluster set, or `None` when no candidate improves on
    /// this one and clustering has reached its fixed point.
    pub fn upgrade(
        &self,
        corpus: &dyn AddressContainer,
        density_threshold: f64,
    ) -> Result<Option<ClusterSet>> {
        if self.clusters.is_empty() {
            return Ok(None);
        }

        let options = self
            .clusters
            .par_iter()
            .map(|c| c.best_upgrade_options(corpus))
            .collect::<Result<Vec<_>>>()?;

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for (cluster, opts) in self.clusters.iter().zip(&options) {
            if cluster.is_local_optimum(opts) {
                if seen.insert(cluster.range.signature()) {
                    candidates.push(cluster.clone());
                }
                continue;
            }
            for &position in &opts.positions {
                let range = cluster.range.copy_with_wildened(&[position]);
                if seen.insert(range.signature()) {
                    candidates.push(GenCluster::new(range, opts.best_count));
                }
            }
        }
        candidates.sort_by(|a, b| b.density.total_cmp(&a.density));

        let everything = ClusterSet::from_clusters(candidates.clone(), corpus)?;
        let trial = if everything.coverage < corpus.size() {
            everything
        } else {
            match self.select_greedily(candidates, density_threshold) {
                Some(selected) => ClusterSet::from_clusters(selected, corpus)?,
                None => {
                    debug!(clusters = self.len(), "no candidate subset reaches prior capture");
                    return Ok(None);
                }
            }
        };

        Ok(self.accepts(&trial, corpus.size(), density_threshold).then_some(trial))
    }

    /// Take candidates by descending density until the prior capture is
    /// matched, then keep adding while the running density stays above the
    /// threshold. `None` if the prior capture is never matched.
    fn select_greedily(
        &self,
        candidates: Vec<GenCluster>,
        density_threshold: f64,
    ) -> Option<Vec<GenCluster>> {
        let mut selected = Vec::new();
        let mut captured = 0u64;
        let mut size = 0.0f64;
        let mut reached = false;

        for candidate in candidates {
            if reached {
                let density = (captured + candidate.captured) as f64 / (size + candidate.size());
                if density < density_threshold {
                    break;
                }
            }
            captured += candidate.captured;
            size += candidate.size();
            selected.push(candidate);
            if captured >= self.captured {
                reached = true;
            }
        }

        reached.then_some(selected)
    }

    fn accepts(&self, trial: &ClusterSet, corpus_size: u64, density_threshold: f64) -> bool {
        if trial.signatures() == self.signatures() {
            return false;
        }
        if self.density == 1.0 {
            return true;
        }
        if trial.coverage < corpus_size && trial.density >= density_threshold {
            return true;
        }
        if trial.density > self.density {
            return true;
        }
        trial.density == self.density && trial.captured > self.captured
    }

    /// Draw `count` distinct addresses from randomly chosen clusters
    pub fn generate_addresses<R: Rng + ?Sized>(
        &self,
        count: usize,
        jitter: f64,
        rng: &mut R,
    ) -> Result<Vec<u128>> {
        let ranges: Vec<&GenRange> = self.clusters.iter().map(|c| &c.range).collect();
        draw_distinct(&ranges, count, rng, |range, rng| range.random_address(rng, jitter))
    }

    /// Like `generate_addresses`, restricted to addresses inside `network`.
    ///
    /// Fails with `IncompatibleNetwork` when no cluster has any address in
    /// the network.
    pub fn generate_addresses_in_network<R: Rng + ?Sized>(
        &self,
        count: usize,
        jitter: f64,
        network: &Ipv6Cidr,
        rng: &mut R,
    ) -> Result<Vec<u128>> {
        let restricted: Vec<GenRange> = self
            .clusters
            .iter()
            .filter_map(|c| c.range.restrict_to(network).ok())
            .collect();
        if restricted.is_empty() {
            return Err(AddressSpaceError::IncompatibleNetwork(format!(
                "no cluster overlaps {}",
                network
            )));
        }

        let ranges: Vec<&GenRange> = restricted.iter().collect();
        draw_distinct(&ranges, count, rng, |range, rng| {
            GenRange::clamp_to_network(range.random_address(rng, jitter), network)
        })
    }
}

/// Corpus addresses inside at least one cluster.
///
/// A cluster overlapping no earlier one adds its whole capture; otherwise
/// only its matches outside those earlier overlapping clusters count.
fn distinct_coverage(clusters: &[GenCluster], corpus: &dyn AddressContainer) -> Result<u64> {
    let fresh = (0..clusters.len())
        .into_par_iter()
        .map(|i| {
            let range = &clusters[i].range;
            let earlier: Vec<&GenRange> = clusters[..i]
                .iter()
                .map(|c| &c.range)
                .filter(|r| r.overlaps(range))
                .collect();
            if earlier.is_empty() {
                return Ok(clusters[i].captured);
            }
            let matches = corpus.addresses_in_pattern(range)?;
            Ok(matches
                .into_iter()
                .filter(|&a| !earlier.iter().any(|r| r.contains(a)))
                .count() as u64)
        })
        .collect::<Result<Vec<u64>>>()?;
    Ok(fresh.into_iter().sum())
}

fn draw_distinct<R, F>(ranges: &[&GenRange], count: usize, rng: &mut R, mut draw: F) -> Result<Vec<u128>>
where
    R: Rng + ?Sized,
    F: FnMut(&GenRange, &mut R) -> u128,
{
    let mut seen = BinaryAddressContainer::new();
    let mut out = Vec::with_capacity(count);
    let mut stalled = 0;

    while out.len() < count {
        let Some(range) = ranges.choose(&mut *rng) else {
            break;
        };
        let addr = draw(range, &mut *rng);
        if seen.add_address(addr) {
            out.push(addr);
            stalled = 0;
        } else {
            stalled += 1;
            if stalled >= GENERATION_STALL_LIMIT {
                break;
            }
        }
    }

    if out.len() < count {
        return Err(AddressSpaceError::GenerationExhausted {
            produced: out.len(),
            requested: count,
        });
    }
    Ok(out)
}
