use crate::model::ContainerKind;

/// Configuration settings for clustering and generation
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Minimum aggregate density an upgrade may fall to while densifying
    pub density_threshold: f64,

    /// Number of seeds to accumulate before clustering
    pub seed_find: usize,

    /// Seeds kept from each sampled batch
    pub seed_pick: usize,

    /// Corpus addresses sampled per batch
    pub seed_from: usize,

    /// Ceiling on accepted upgrade steps
    pub max_iterations: usize,

    /// Probability of randomizing a fixed nybble during generation
    pub jitter: f64,

    /// Maximum number of corpus files parsed concurrently
    pub max_concurrent_reads: usize,

    /// Corpus representation used for loading
    pub container: ContainerKind,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            density_threshold: 0.05,
            seed_find: 128,
            seed_pick: 8,
            seed_from: 64,
            max_iterations: 256,
            jitter: 0.0,
            max_concurrent_reads: 8,
            container: ContainerKind::Binary,
        }
    }
}

impl ClusterConfig {
    /// Set the density floor, clamped into (0, 1]
    pub fn set_density_threshold(&mut self, threshold: f64) {
        self.density_threshold = if threshold.is_nan() {
            Self::default().density_threshold
        } else {
            threshold.clamp(f64::MIN_POSITIVE, 1.0)
        };
    }

    pub fn set_jitter(&mut self, jitter: f64) {
        self.jitter = if jitter.is_nan() { 0.0 } else { jitter.clamp(0.0, 1.0) };
    }

    /// Set the maximum number of concurrent file reads
    pub fn set_concurrency(&mut self, jobs: usize) {
        self.max_concurrent_reads = jobs.max(1);
    }

    pub fn set_max_iterations(&mut self, iterations: usize) {
        self.max_iterations = iterations.max(1);
    }

    /// Set seed sampling sizes; each is at least 1 and `pick` never exceeds `from`
    pub fn set_seeds(&mut self, find: usize, pick: usize, from: usize) {
        self.seed_find = find.max(1);
        self.seed_from = from.max(1);
        self.seed_pick = pick.clamp(1, self.seed_from);
    }
}
