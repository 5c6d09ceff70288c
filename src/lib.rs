//! K-Means clustering of regional cellular signal statistics.
//!
//! This crate provides tools for:
//! - Loading per-region signal CSV files (BTS count, signal strength buckets, 4G/LTE)
//! - Standardizing features and clustering regions with seeded k-means++ (parallel restarts)
//! - Projecting the standardized features onto two principal components
//! - Attaching map coordinates with a configurable fallback
//! - Per-cluster summaries and a memoized file-driven pipeline
//!
//! # Example
//!
//! ```no_run
//! use signal_clustering::{process_signal_file, GeoTable, PipelineConfig};
//!
//! let config = PipelineConfig::default();
//! let table = GeoTable::west_java().unwrap();
//! let output = process_signal_file("signal.csv", &config, &table).unwrap();
//! println!("{} regions clustered", output.dataset.len());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;

pub use config::{
    ClusteringConfig, DegeneratePolicy, FallbackPolicy, FeatureSet, GeoConfig, GeoCoordinate,
    PipelineConfig, ReportConfig,
};
pub use core::loaders::RegionRecord;
pub use processors::{
    cluster, process_signal_file, CachedPipeline, ClusteredDataset, ClusteredRegion, GeoTable,
    PipelineError,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
