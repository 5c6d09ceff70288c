//! The clustering pipeline: select features, standardize, cluster, project.
//!
//! `cluster` is a pure function of its inputs. `process_signal_file` drives
//! it from a CSV file and attaches coordinates, and `CachedPipeline` memoizes
//! that per file content and configuration.
//!
//! # Example
//!
//! ```
//! use signal_clustering::config::ClusteringConfig;
//! use signal_clustering::core::loaders::RegionRecord;
//! use signal_clustering::processors::pipeline::cluster;
//! use signal_clustering::FeatureSet;
//!
//! let records = vec![
//!     RegionRecord::new("A", 10, 800.0, 50.0, 5.0, 600.0),
//!     RegionRecord::new("B", 12, 790.0, 60.0, 6.0, 590.0),
//!     RegionRecord::new("C", 1, 10.0, 5.0, 400.0, 20.0),
//! ];
//! let config = ClusteringConfig { k: 2, ..ClusteringConfig::default() };
//! let dataset = cluster(&records, &config, &FeatureSet::Signal).unwrap();
//! assert_eq!(dataset.regions[0].cluster, dataset.regions[1].cluster);
//! assert_ne!(dataset.regions[0].cluster, dataset.regions[2].cluster);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use thiserror::Error;

use crate::config::{ClusteringConfig, ConfigError, FeatureSet, GeoConfig, PipelineConfig};
use crate::core::loaders::{
    parse_signal_csv, read_signal_bytes, LoaderError, RegionRecord, COL_BTS, COL_LTE,
    COL_NO_SIGNAL, COL_STRONG, COL_WEAK,
};
use crate::processors::cache::{CacheKey, SingleFlightCache};
use crate::processors::geo::{resolve_coordinates, GeoRegion, GeoTable};
use crate::processors::kmeans::{self, KMeansParams};
use crate::processors::projection::project_2d;
use crate::processors::scaling::{standardize, StandardScaler, Standardized};

/// Errors surfaced by the pipeline to its caller.
#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    #[error("insufficient data: {records} record(s) cannot form {k} clusters")]
    InsufficientData { records: usize, k: usize },

    #[error("feature '{column}' has zero variance across the dataset")]
    DegenerateFeature { column: String },

    #[error("region '{region}' is missing feature '{column}'")]
    MissingFeature { region: String, column: String },

    #[error("region '{region}' has a non-finite value for '{column}': {value}")]
    NonFiniteFeature {
        region: String,
        column: String,
        value: f64,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to load input: {0}")]
    Load(#[source] Arc<LoaderError>),
}

impl From<LoaderError> for PipelineError {
    fn from(e: LoaderError) -> Self {
        PipelineError::Load(Arc::new(e))
    }
}

impl From<ConfigError> for PipelineError {
    fn from(e: ConfigError) -> Self {
        PipelineError::InvalidConfig(e.to_string())
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Maps a record to the feature vector used for clustering.
pub trait FeatureSelector {
    /// Column names, in feature-vector order.
    fn columns(&self) -> Vec<&'static str>;

    /// Extract the feature vector of one record.
    fn select(&self, record: &RegionRecord) -> Result<Vec<f64>>;

    /// Stable name used in cache keys.
    fn identity(&self) -> String {
        self.columns().join("|")
    }
}

/// Raw value of a named numeric column.
fn column_value(record: &RegionRecord, column: &str) -> Option<f64> {
    match column {
        COL_BTS => record.bts_count.map(|v| v as f64),
        COL_STRONG => record.strong_signal,
        COL_WEAK => record.weak_signal,
        COL_NO_SIGNAL => record.no_signal,
        COL_LTE => record.lte_coverage,
        _ => None,
    }
}

fn require(record: &RegionRecord, column: &str) -> Result<f64> {
    let value = column_value(record, column).ok_or_else(|| PipelineError::MissingFeature {
        region: record.region_name.clone(),
        column: column.to_string(),
    })?;
    if !value.is_finite() {
        return Err(PipelineError::NonFiniteFeature {
            region: record.region_name.clone(),
            column: column.to_string(),
            value,
        });
    }
    Ok(value)
}

impl FeatureSelector for FeatureSet {
    fn columns(&self) -> Vec<&'static str> {
        match self {
            FeatureSet::Signal => vec![COL_STRONG, COL_WEAK, COL_NO_SIGNAL, COL_LTE],
            FeatureSet::SignalWithBts => vec![COL_BTS, COL_STRONG, COL_WEAK, COL_NO_SIGNAL, COL_LTE],
        }
    }

    fn select(&self, record: &RegionRecord) -> Result<Vec<f64>> {
        self.columns()
            .into_iter()
            .map(|column| require(record, column))
            .collect()
    }
}

/// One input record with its cluster label and optional 2D projection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusteredRegion {
    pub record: RegionRecord,
    /// Label in `[0, k)`; the numbering carries no ranking
    pub cluster: usize,
    pub projection: Option<[f64; 2]>,
}

/// Result of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusteredDataset {
    /// One entry per input record, in input order
    pub regions: Vec<ClusteredRegion>,
    pub k: usize,
    pub feature_columns: Vec<String>,
    pub scaler: StandardScaler,
    /// Centroids in standardized feature space
    pub centroids: Vec<Vec<f64>>,
    pub inertia: f64,
    /// Explained variance ratio of (PC1, PC2) when projected
    pub explained_variance: Option<[f64; 2]>,
}

impl ClusteredDataset {
    pub fn labels(&self) -> Vec<usize> {
        self.regions.iter().map(|r| r.cluster).collect()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// Cluster `records` into `config.k` groups over the features chosen by `selector`.
///
/// # Errors
///
/// - `InvalidConfig` for a zero `k`, `n_init` or `max_iter`, or a selector with no columns
/// - `InsufficientData` when there are fewer records than `k`
/// - `MissingFeature` / `NonFiniteFeature` for an unusable selected value
/// - `DegenerateFeature` for a zero-variance column under the `fail` policy
pub fn cluster<S>(
    records: &[RegionRecord],
    config: &ClusteringConfig,
    selector: &S,
) -> Result<ClusteredDataset>
where
    S: FeatureSelector + ?Sized,
{
    config.validate()?;

    let columns = selector.columns();
    if columns.is_empty() {
        return Err(PipelineError::InvalidConfig(
            "feature selector produced no columns".to_string(),
        ));
    }
    if records.len() < config.k {
        return Err(PipelineError::InsufficientData {
            records: records.len(),
            k: config.k,
        });
    }

    let rows = records
        .iter()
        .map(|r| selector.select(r))
        .collect::<Result<Vec<_>>>()?;

    let (scaler, scaled) = match standardize(&rows, config.degenerate_policy) {
        Some(Standardized::Scaled { scaler, rows }) => (scaler, rows),
        Some(Standardized::Degenerate { column }) => {
            return Err(PipelineError::DegenerateFeature {
                column: columns[column].to_string(),
            })
        }
        None => {
            return Err(PipelineError::InsufficientData {
                records: 0,
                k: config.k,
            })
        }
    };
    for column in scaler.degenerate_columns() {
        log::warn!(
            "feature '{}' is constant across the dataset; scaled to 0",
            columns[column]
        );
    }

    log::info!(
        "clustering {} regions on [{}] into k={} (seed={}, n_init={})",
        records.len(),
        columns.join(", "),
        config.k,
        config.seed,
        config.n_init
    );

    let params = KMeansParams {
        k: config.k,
        seed: config.seed,
        n_init: config.n_init,
        max_iter: config.max_iter,
    };
    let fit = kmeans::fit(&scaled, &params).ok_or_else(|| {
        PipelineError::InvalidConfig(format!("cannot fit k-means with {:?}", params))
    })?;
    log::info!(
        "k-means: inertia={:.4} after {} iteration(s) (restart {})",
        fit.inertia,
        fit.iterations,
        fit.run
    );

    let projection = if config.projection {
        project_2d(&scaled)
    } else {
        None
    };

    let regions = records
        .iter()
        .zip(&fit.labels)
        .enumerate()
        .map(|(i, (record, &cluster))| ClusteredRegion {
            record: record.clone(),
            cluster,
            projection: projection.as_ref().map(|p| p.points[i]),
        })
        .collect();

    Ok(ClusteredDataset {
        regions,
        k: config.k,
        feature_columns: columns.iter().map(|c| c.to_string()).collect(),
        scaler,
        centroids: fit.centroids,
        inertia: fit.inertia,
        explained_variance: projection.map(|p| p.explained_variance_ratio),
    })
}

/// `cluster` with the feature set named in the configuration.
pub fn cluster_records(
    records: &[RegionRecord],
    config: &ClusteringConfig,
) -> Result<ClusteredDataset> {
    cluster(records, config, &config.features)
}

/// Clustered dataset plus its geo-augmented view.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub dataset: ClusteredDataset,
    /// Regions with coordinates; unresolved ones are absent under `drop-unresolved`
    pub geo: Vec<GeoRegion>,
}

/// Run the full pipeline on CSV content already in memory.
pub fn process_signal_bytes(
    bytes: &[u8],
    source: &str,
    config: &PipelineConfig,
    table: &GeoTable,
) -> Result<PipelineOutput> {
    let records = parse_signal_csv(bytes, source)?;
    log::info!("{}: {} regions loaded", source, records.len());

    let dataset = cluster_records(&records, &config.clustering)?;
    let geo = resolve_coordinates(&dataset.regions, table, &config.geo);

    Ok(PipelineOutput { dataset, geo })
}

/// Load, cluster and geo-resolve a signal CSV file.
///
/// # Errors
///
/// Returns `PipelineError::Load` when the file cannot be read or parsed, and
/// any error of [`cluster`] otherwise.
pub fn process_signal_file<P: AsRef<Path>>(
    path: P,
    config: &PipelineConfig,
    table: &GeoTable,
) -> Result<PipelineOutput> {
    let path = path.as_ref();
    let bytes = read_signal_bytes(path)?;
    process_signal_bytes(&bytes, &path.display().to_string(), config, table)
}

fn cache_key(bytes: &[u8], clustering: &ClusteringConfig, geo: &GeoConfig, table: &GeoTable) -> CacheKey {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    clustering.hash(&mut hasher);
    clustering.features.identity().hash(&mut hasher);
    geo.hash(&mut hasher);
    table.hash(&mut hasher);
    CacheKey::from(hasher.finish())
}

/// File-driven pipeline memoized on file content and configuration.
///
/// Editing the file changes its key, so the next call recomputes; unchanged
/// content is served from the cache, and concurrent callers for the same
/// content share one computation. Only the latest content of each source is
/// kept.
pub struct CachedPipeline {
    config: PipelineConfig,
    table: GeoTable,
    cache: SingleFlightCache<PipelineOutput, PipelineError>,
    /// Most recent key per source name
    latest: Mutex<HashMap<String, CacheKey>>,
}

impl CachedPipeline {
    pub fn new(config: PipelineConfig, table: GeoTable) -> Self {
        Self {
            config,
            table,
            cache: SingleFlightCache::new(),
            latest: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Key under which the content of `bytes` is cached.
    pub fn key_for(&self, bytes: &[u8]) -> CacheKey {
        cache_key(bytes, &self.config.clustering, &self.config.geo, &self.table)
    }

    /// Run (or reuse) the pipeline for in-memory CSV content.
    ///
    /// A new content for `source` evicts the result of its previous content.
    pub fn run_bytes(&self, bytes: &[u8], source: &str) -> Result<Arc<PipelineOutput>> {
        let key = self.key_for(bytes);
        let previous = self
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(source.to_string(), key);
        if let Some(old) = previous.filter(|old| *old != key) {
            log::debug!("{} changed, evicting {}", source, old);
            self.cache.invalidate(old);
        }
        self.cache.get_or_compute(key, || {
            process_signal_bytes(bytes, source, &self.config, &self.table)
        })
    }

    /// Run (or reuse) the pipeline for the current content of `path`.
    pub fn run<P: AsRef<Path>>(&self, path: P) -> Result<Arc<PipelineOutput>> {
        let path = path.as_ref();
        let bytes = read_signal_bytes(path)?;
        self.run_bytes(&bytes, &path.display().to_string())
    }

    pub fn cache(&self) -> &SingleFlightCache<PipelineOutput, PipelineError> {
        &self.cache
    }
}
