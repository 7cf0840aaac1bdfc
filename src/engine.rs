use crate::cluster::{ClusterSet, GenCluster};
use crate::config::ClusterConfig;
use crate::container::binary::insert;
use crate::container::{AddressContainer, AddressTree, BinaryAddressContainer};
use crate::errors::{AddressSpaceError, Result};
use crate::ingest::{self, CorpusReader};
use crate::model::{ClusteringOutcome, ContainerKind, LoadStats};
use crate::pattern::GenRange;
use crate::table;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Clustering driver: loads a corpus, picks seeds and runs the upgrade loop
pub struct ClusteringEngine {
    config: ClusterConfig,
}

impl ClusteringEngine {
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ClusterConfig {
        &mut self.config
    }

    /// Empty container of the configured kind
    pub fn new_container(&self) -> Box<dyn AddressContainer> {
        match self.config.container {
            ContainerKind::Binary => Box::new(BinaryAddressContainer::new()),
            ContainerKind::Tree => Box::new(AddressTree::new()),
        }
    }

    /// Parse `paths` with `reader` into a fresh container
    pub async fn load_corpus(
        &self,
        paths: &[PathBuf],
        reader: &dyn CorpusReader,
    ) -> Result<(Box<dyn AddressContainer>, LoadStats)> {
        let mut container = self.new_container();
        let stats = ingest::load_corpus(
            paths,
            reader,
            container.as_mut(),
            self.config.max_concurrent_reads,
        )
        .await?;
        Ok((container, stats))
    }

    /// Sample `from` not-yet-picked corpus addresses at a time and keep the
    /// `pick` whose best single-nybble generalization is densest, until
    /// `find` seeds are collected or every address has been picked.
    pub fn find_good_seeds<R: Rng + ?Sized>(
        &self,
        find: usize,
        pick: usize,
        from: usize,
        corpus: &dyn AddressContainer,
        rng: &mut R,
    ) -> Result<Vec<u128>> {
        let total = corpus.size() as usize;
        let pick = pick.max(1);

        // Corpus positions already taken as seeds, ascending
        let mut picked: Vec<u64> = Vec::new();
        let mut seeds = Vec::with_capacity(find.min(total));
        while seeds.len() < find && picked.len() < total {
            let available = total - picked.len();
            let mut positions: Vec<u64> = index::sample(rng, available, from.clamp(1, available))
                .into_iter()
                .map(|rank| unpicked_position(&picked, rank as u64))
                .collect();
            positions.sort_unstable();
            let batch = corpus.addresses_at(&positions)?;

            let mut scored = positions
                .par_iter()
                .zip(batch.par_iter())
                .map(|(&pos, &addr)| {
                    GenCluster::new(GenRange::from_address(addr), 1)
                        .best_upgrade_options(corpus)
                        .map(|opts| (opts.best_density, pos, addr))
                })
                .collect::<Result<Vec<_>>>()?;
            scored.sort_by(|a, b| b.0.total_cmp(&a.0));

            let room = find - seeds.len();
            for (_, pos, addr) in scored.into_iter().take(pick.min(room)) {
                insert(&mut picked, pos);
                seeds.push(addr);
            }
            debug!(batch = batch.len(), seeds = seeds.len(), "seed batch evaluated");
        }
        Ok(seeds)
    }

    /// Cluster the corpus until `upgrade` reaches a fixed point or the
    /// iteration ceiling is hit, returning the last accepted set.
    pub fn best_cluster_set_from_ips<R: Rng + ?Sized>(
        &self,
        corpus: &dyn AddressContainer,
        rng: &mut R,
    ) -> Result<ClusteringOutcome> {
        let start = Instant::now();
        let config = &self.config;

        let seeds = if corpus.size() <= config.seed_find as u64 {
            corpus.all_addresses()?
        } else {
            self.find_good_seeds(config.seed_find, config.seed_pick, config.seed_from, corpus, rng)?
        };
        info!(seeds = seeds.len(), corpus = corpus.size(), "clustering started");

        let mut current = ClusterSet::from_seeds(&seeds, corpus)?;
        let mut iterations = 0;
        let mut converged = false;
        while iterations < config.max_iterations {
            match current.upgrade(corpus, config.density_threshold)? {
                Some(next) => {
                    iterations += 1;
                    debug!(
                        iteration = iterations,
                        clusters = next.len(),
                        density = next.density(),
                        coverage = next.coverage(),
                        "upgrade accepted"
                    );
                    current = next;
                }
                None => {
                    converged = true;
                    break;
                }
            }
        }

        if converged {
            info!(iterations, clusters = current.len(), density = current.density(), "clustering converged");
        } else {
            warn!(
                max_iterations = config.max_iterations,
                clusters = current.len(),
                "iteration ceiling reached, keeping best set so far"
            );
        }

        Ok(ClusteringOutcome {
            cluster_set: current,
            iterations,
            converged,
            elapsed: start.elapsed(),
        })
    }

    /// Run clustering on the blocking pool so async callers are not stalled
    pub async fn build_model(
        &self,
        corpus: Arc<dyn AddressContainer>,
        seed: u64,
    ) -> Result<ClusteringOutcome> {
        let engine = Self::new(self.config.clone());
        tokio::task::spawn_blocking(move || {
            let mut rng = StdRng::seed_from_u64(seed);
            engine.best_cluster_set_from_ips(corpus.as_ref(), &mut rng)
        })
        .await
        .map_err(|e| AddressSpaceError::Other(format!("clustering task failed: {}", e)))?
    }

    /// Display the clustering outcome as formatted tables
    pub fn display_results(&self, outcome: &ClusteringOutcome) {
        println!("{}", table::cluster_table(&outcome.cluster_set));
        println!("{}", table::summary_table(outcome));
    }
}

/// Position of the `rank`-th corpus address not yet in `picked` (ascending)
fn unpicked_position(picked: &[u64], rank: u64) -> u64 {
    let mut pos = rank;
    for &p in picked {
        if p > pos {
            break;
        }
        pos += 1;
    }
    pos
}
