//! Command-line interface for the signal clustering pipeline.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{FallbackPolicy, FeatureSet};
use crate::core::writers;
use crate::processors::geo::GeoTable;
use crate::processors::pipeline::{process_signal_file, PipelineOutput};
use crate::processors::summary::{self, ClusterProfile};
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "signal-clustering")]
#[command(about = "K-Means clustering of regional cellular signal statistics", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum FeatureArg {
    /// Signal strength buckets and 4G/LTE
    Signal,
    /// Signal columns plus BTS count
    SignalWithBts,
}

impl From<FeatureArg> for FeatureSet {
    fn from(arg: FeatureArg) -> Self {
        match arg {
            FeatureArg::Signal => FeatureSet::Signal,
            FeatureArg::SignalWithBts => FeatureSet::SignalWithBts,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum GeoPolicyArg {
    /// Place unknown regions at the fallback coordinate
    UseCentroid,
    /// Leave unknown regions out of the geo output
    DropUnresolved,
}

impl From<GeoPolicyArg> for FallbackPolicy {
    fn from(arg: GeoPolicyArg) -> Self {
        match arg {
            GeoPolicyArg::UseCentroid => FallbackPolicy::UseCentroid,
            GeoPolicyArg::DropUnresolved => FallbackPolicy::DropUnresolved,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Cluster the regions of a signal CSV and export assignments
    Cluster {
        /// Input signal CSV file
        input: PathBuf,
        /// Output CSV (defaults to <input>_clusters.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Also write a CSV with region coordinates
        #[arg(long)]
        geo_output: Option<PathBuf>,
        /// Number of clusters
        #[arg(short, long)]
        k: Option<usize>,
        /// Random seed for centroid initialization
        #[arg(long)]
        seed: Option<u64>,
        /// Feature columns to cluster on
        #[arg(long, value_enum)]
        features: Option<FeatureArg>,
        /// Handling of regions missing from the geo table
        #[arg(long, value_enum)]
        geo_policy: Option<GeoPolicyArg>,
        /// YAML geo table replacing the bundled West Java one
        #[arg(long)]
        geo_table: Option<PathBuf>,
        /// Skip the 2D principal component projection
        #[arg(long)]
        no_projection: bool,
    },

    /// Print per-cluster totals, means and profile
    Summary {
        /// Input signal CSV file
        input: PathBuf,
        /// Only report this cluster label, listing its regions
        #[arg(long)]
        cluster: Option<usize>,
        /// Write the summaries to a CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write the default configuration as YAML
    InitConfig {
        /// Destination path
        #[arg(default_value = "pipeline.yaml")]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            format!("{}...", value.chars().take(36).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

fn optional(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}", v))
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    let result = load_config(cli.config.as_deref()).and_then(|config| dispatch(cli.command, config));
    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => {
            let config = PipelineConfig::from_yaml(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?;
            info!("Loaded config from: {}", path.display());
            Ok(config)
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn dispatch(command: Commands, mut config: PipelineConfig) -> Result<()> {
    match command {
        Commands::Cluster {
            input,
            output,
            geo_output,
            k,
            seed,
            features,
            geo_policy,
            geo_table,
            no_projection,
        } => {
            // CLI flags override the config file
            if let Some(k) = k {
                config.clustering.k = k;
            }
            if let Some(seed) = seed {
                config.clustering.seed = seed;
            }
            if let Some(features) = features {
                config.clustering.features = features.into();
            }
            if let Some(policy) = geo_policy {
                config.geo.fallback_policy = policy.into();
            }
            if geo_table.is_some() {
                config.geo.table_path = geo_table;
            }
            if no_projection {
                config.clustering.projection = false;
            }
            config.validate().context("invalid configuration")?;
            cmd_cluster(&input, output, geo_output.as_deref(), &config)
        }
        Commands::Summary {
            input,
            cluster,
            output,
        } => cmd_summary(&input, cluster, output.as_deref(), &config),
        Commands::InitConfig { path, force } => cmd_init_config(&path, force),
    }
}

/// Load the geo table and run the pipeline behind a spinner.
fn run_pipeline(input: &Path, config: &PipelineConfig) -> Result<PipelineOutput> {
    let table = GeoTable::from_config(&config.geo).context("failed to load geo table")?;

    let spinner = create_spinner("Clustering regions...");
    let result = process_signal_file(input, config, &table);
    spinner.finish_and_clear();

    result.with_context(|| format!("failed to process {}", input.display()))
}

fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "signal".to_string());
    input.with_file_name(format!("{}_clusters.csv", stem))
}

fn cmd_cluster(
    input: &Path,
    output: Option<PathBuf>,
    geo_output: Option<&Path>,
    config: &PipelineConfig,
) -> Result<()> {
    let start = Instant::now();
    let output_path = output.unwrap_or_else(|| default_output_path(input));

    println!("Running K-Means clustering...");
    println!("Input: {}", input.display());
    println!("Output: {}", output_path.display());
    println!("Parameters:");
    println!("  k: {}", config.clustering.k);
    println!("  seed: {}", config.clustering.seed);
    println!("  features: {:?}", config.clustering.features);
    println!("  n_init: {}", config.clustering.n_init);

    let output = run_pipeline(input, config)?;
    let dataset = &output.dataset;

    writers::write_assignments_csv(&output_path, &dataset.regions)?;
    if let Some(path) = geo_output {
        writers::write_geo_csv(path, &output.geo)?;
        info!("Wrote geo output to {}", path.display());
    }

    let resolved = output.geo.iter().filter(|g| g.resolved).count();
    let explained = dataset
        .explained_variance
        .map(|[a, b]| format!("{:.1}% / {:.1}%", a * 100.0, b * 100.0))
        .unwrap_or_else(|| "skipped".to_string());

    print_summary(
        "Clustering Complete",
        &[
            ("Input file", input.display().to_string()),
            ("Output CSV", output_path.display().to_string()),
            ("Regions", dataset.len().to_string()),
            ("Clusters", dataset.k.to_string()),
            ("Features", dataset.feature_columns.join(", ")),
            ("Inertia", format!("{:.4}", dataset.inertia)),
            ("PC1 / PC2 variance", explained),
            ("Geo resolved", format!("{} of {}", resolved, dataset.len())),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

fn cmd_summary(
    input: &Path,
    cluster: Option<usize>,
    output: Option<&Path>,
    config: &PipelineConfig,
) -> Result<()> {
    let output_data = run_pipeline(input, config)?;
    let dataset = &output_data.dataset;

    let summaries = match cluster {
        Some(label) => {
            let summary = summary::summarize(&dataset.regions, label)
                .ok_or_else(|| anyhow!("cluster {} has no regions", label))?;
            vec![summary]
        }
        None => summary::summarize_all(dataset),
    };

    for s in &summaries {
        let profile = ClusterProfile::classify(s, &config.report);
        print_summary(
            &format!("Cluster {}", s.cluster),
            &[
                ("Regions", s.regions.to_string()),
                ("Total BTS", s.total_bts.to_string()),
                ("Mean strong signal", optional(s.mean_strong_signal)),
                ("Mean weak signal", optional(s.mean_weak_signal)),
                ("Mean no signal", optional(s.mean_no_signal)),
                ("Mean 4G/LTE", optional(s.mean_lte_coverage)),
                ("Profile", profile.to_string()),
            ],
        );
        println!("{}", profile.description());
    }

    if let Some(label) = cluster {
        println!("Regions in cluster {}:", label);
        for region in summary::filter_by_cluster(&dataset.regions, label) {
            println!("  {}", region.record.region_name);
        }
    }

    if let Some(path) = output {
        writers::write_summary_csv(path, &summaries, &config.report)?;
        println!("Summary written to {}", path.display());
    }
    Ok(())
}

fn cmd_init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    PipelineConfig::default()
        .to_yaml(path)
        .with_context(|| format!("failed to write config to {}", path.display()))?;
    println!("Default configuration written to {}", path.display());
    Ok(())
}
