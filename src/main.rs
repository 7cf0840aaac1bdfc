// ==========================================================
//  v6scout  - IPv6 corpus clustering and candidate generation
// ==========================================================

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::net::Ipv6Addr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use v6scout::db::models;
use v6scout::ingest::{self, reader_for};
use v6scout::{
    AddressContainer, AddressSpaceError, AddressTree, ClusterConfig, ClusteringEngine,
    ContainerKind, GenRange, InputFormat, Ipv6Cidr,
};

#[derive(Parser, Debug)]
#[command(name = "v6scout", version, about = "Learn IPv6 address patterns and generate scan candidates")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Cluster a corpus into a pattern model
    Cluster {
        #[command(flatten)]
        corpus: CorpusArgs,

        /// Minimum aggregate density while densifying
        #[arg(long, default_value_t = 0.05)]
        threshold: f64,

        /// Seeds to accumulate
        #[arg(long, default_value_t = 128)]
        seed_find: usize,

        /// Seeds kept per sampled batch
        #[arg(long, default_value_t = 8)]
        seed_pick: usize,

        /// Addresses sampled per batch
        #[arg(long, default_value_t = 64)]
        seed_from: usize,

        /// Ceiling on upgrade steps
        #[arg(long, default_value_t = 256)]
        max_iterations: usize,

        /// RNG seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,

        /// Write the model to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Generate candidate addresses from a saved model
    Generate {
        /// Model file written by `cluster`
        #[arg(short, long)]
        model: PathBuf,

        /// Number of distinct addresses to produce
        #[arg(short = 'n', long)]
        count: usize,

        /// Probability of randomizing each fixed nybble
        #[arg(long, default_value_t = 0.0)]
        jitter: f64,

        /// Only produce addresses inside this network
        #[arg(long)]
        network: Option<Ipv6Cidr>,

        #[arg(long)]
        seed: Option<u64>,

        /// Write addresses to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Count or list corpus addresses in a network or pattern
    Query {
        #[command(flatten)]
        corpus: CorpusArgs,

        #[arg(long, conflicts_with = "pattern", required_unless_present = "pattern")]
        cidr: Option<Ipv6Cidr>,

        /// Pattern such as 2600:0000:0001:0000:0000:0000:0000:00??
        #[arg(long)]
        pattern: Option<GenRange>,

        /// Print matching addresses, not just the count
        #[arg(long)]
        list: bool,
    },
    /// Load a corpus into an address tree and persist it
    Pack {
        #[command(flatten)]
        corpus: CorpusArgs,

        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Args, Debug)]
struct CorpusArgs {
    /// Corpus files
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = FormatArg::Hex)]
    format: FormatArg,

    #[arg(long, value_enum, default_value_t = ContainerArg::Binary)]
    container: ContainerArg,

    /// Files parsed concurrently
    #[arg(short, long, default_value_t = 8)]
    jobs: usize,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Hex,
    Binary,
    Tree,
}

impl From<FormatArg> for InputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Hex => InputFormat::HexText,
            FormatArg::Binary => InputFormat::FixedBinary,
            FormatArg::Tree => InputFormat::AddressTree,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ContainerArg {
    Binary,
    Tree,
}

impl From<ContainerArg> for ContainerKind {
    fn from(arg: ContainerArg) -> Self {
        match arg {
            ContainerArg::Binary => ContainerKind::Binary,
            ContainerArg::Tree => ContainerKind::Tree,
        }
    }
}

fn engine_for(corpus: &CorpusArgs) -> ClusteringEngine {
    let mut config = ClusterConfig::default();
    config.container = corpus.container.into();
    config.set_concurrency(corpus.jobs);
    ClusteringEngine::new(config)
}

#[tokio::main]
async fn main() -> Result<(), AddressSpaceError> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match cli.command {
        Command::Cluster {
            corpus,
            threshold,
            seed_find,
            seed_pick,
            seed_from,
            max_iterations,
            seed,
            output,
        } => {
            let mut engine = engine_for(&corpus);
            let config = engine.config_mut();
            config.set_density_threshold(threshold);
            config.set_seeds(seed_find, seed_pick, seed_from);
            config.set_max_iterations(max_iterations);

            let reader = reader_for(corpus.format.into());
            let (container, stats) = engine.load_corpus(&corpus.inputs, reader.as_ref()).await?;
            println!(
                "Loaded {} addresses ({} duplicates, {} malformed)",
                stats.added, stats.skipped, stats.malformed
            );
            if container.size() == 0 {
                return Err(AddressSpaceError::Other("corpus is empty".to_string()));
            }

            let corpus: Arc<dyn AddressContainer> = Arc::from(container);
            let outcome = engine
                .build_model(corpus, seed.unwrap_or_else(rand::random))
                .await?;
            engine.display_results(&outcome);

            if let Some(path) = output {
                models::save_cluster_set(&path, &outcome.cluster_set)?;
                println!("Model written to {}", path.display());
            }
        }
        Command::Generate {
            model,
            count,
            jitter,
            network,
            seed,
            output,
        } => {
            let set = models::load_cluster_set(&model)?;
            let mut rng: rand::rngs::StdRng =
                rand::SeedableRng::seed_from_u64(seed.unwrap_or_else(rand::random));
            let jitter = jitter.clamp(0.0, 1.0);
            let addresses = match network {
                Some(network) => set.generate_addresses_in_network(count, jitter, &network, &mut rng)?,
                None => set.generate_addresses(count, jitter, &mut rng)?,
            };

            let text = addresses
                .iter()
                .map(|&a| Ipv6Addr::from(a).to_string())
                .collect::<Vec<_>>()
                .join("\n");
            match output {
                Some(path) => {
                    tokio::fs::write(&path, text + "\n").await?;
                    println!("Wrote {} addresses to {}", addresses.len(), path.display());
                }
                None => println!("{}", text),
            }
        }
        Command::Query {
            corpus,
            cidr,
            pattern,
            list,
        } => {
            let engine = engine_for(&corpus);
            let reader = reader_for(corpus.format.into());
            let (container, _) = engine.load_corpus(&corpus.inputs, reader.as_ref()).await?;

            let (label, count, addresses) = match (cidr, pattern) {
                (Some(net), _) => (
                    net.to_string(),
                    container.count_in_cidr(&net)?,
                    if list { container.addresses_in_cidr(&net)? } else { Vec::new() },
                ),
                (None, Some(range)) => (
                    range.to_string(),
                    container.count_in_pattern(&range)?,
                    if list { container.addresses_in_pattern(&range)? } else { Vec::new() },
                ),
                (None, None) => {
                    return Err(AddressSpaceError::Other(
                        "either --cidr or --pattern is required".to_string(),
                    ))
                }
            };

            for addr in addresses {
                println!("{}", Ipv6Addr::from(addr));
            }
            println!("{} addresses in {}", count, label);
        }
        Command::Pack { corpus, output } => {
            let reader = reader_for(corpus.format.into());
            let mut tree = AddressTree::new();
            let stats = ingest::load_corpus(&corpus.inputs, reader.as_ref(), &mut tree, corpus.jobs).await?;
            models::save_address_tree(&output, &tree)?;
            println!(
                "Packed {} addresses ({} trie nodes) into {}",
                stats.added,
                tree.node_count(),
                output.display()
            );
        }
    }

    Ok(())
}
