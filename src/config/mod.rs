//! Configuration types for the clustering pipeline.

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised while loading, saving or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Which numeric columns feed the clustering distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeatureSet {
    /// SINYAL KUAT, SINYAL LEMAH, TIDAK ADA SINYAL, 4G/LTE
    #[default]
    Signal,
    /// The signal columns plus the BTS count
    SignalWithBts,
}

/// What to do with a feature whose standard deviation is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DegeneratePolicy {
    /// Scale the feature to a constant 0.
    #[default]
    Zero,
    /// Abort with a degenerate-feature error.
    Fail,
}

/// What to do with a region name missing from the geo table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackPolicy {
    /// Substitute `GeoConfig::fallback_coordinate`.
    #[default]
    UseCentroid,
    /// Leave the region out of geo-augmented output.
    DropUnresolved,
}

/// Configuration for K-Means clustering.
#[derive(Debug, Clone, Hash, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Columns used as the feature vector
    #[serde(default)]
    pub features: FeatureSet,

    /// Number of clusters
    #[serde(default = "default_k")]
    pub k: usize,

    /// Seed for centroid initialization
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Number of independent k-means++ restarts
    #[serde(default = "default_n_init")]
    pub n_init: usize,

    /// Maximum Lloyd iterations per restart
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,

    /// Compute the 2D principal component projection
    #[serde(default = "default_projection")]
    pub projection: bool,

    /// Handling of zero-variance features during standardization
    #[serde(default)]
    pub degenerate_policy: DegeneratePolicy,
}

fn default_k() -> usize {
    4
}

fn default_seed() -> u64 {
    42
}

fn default_n_init() -> usize {
    10
}

fn default_max_iter() -> usize {
    300
}

fn default_projection() -> bool {
    true
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            features: FeatureSet::default(),
            k: default_k(),
            seed: default_seed(),
            n_init: default_n_init(),
            max_iter: default_max_iter(),
            projection: default_projection(),
            degenerate_policy: DegeneratePolicy::default(),
        }
    }
}

impl ClusteringConfig {
    /// Check the parameters that the clustering stage cannot recover from.
    pub fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(ConfigError::Invalid("k must be at least 1".to_string()));
        }
        if self.n_init == 0 {
            return Err(ConfigError::Invalid("n_init must be at least 1".to_string()));
        }
        if self.max_iter == 0 {
            return Err(ConfigError::Invalid("max_iter must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoCoordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl Hash for GeoCoordinate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.latitude.to_bits().hash(state);
        self.longitude.to_bits().hash(state);
    }
}

/// Approximate centre of West Java, used for unresolved region names.
pub const WEST_JAVA_CENTROID: GeoCoordinate = GeoCoordinate::new(-6.9147, 107.6098);

/// Configuration for geographic resolution.
#[derive(Debug, Clone, Hash, Serialize, Deserialize)]
pub struct GeoConfig {
    #[serde(default)]
    pub fallback_policy: FallbackPolicy,

    /// Coordinate substituted under `use-centroid`
    #[serde(default = "default_fallback_coordinate")]
    pub fallback_coordinate: GeoCoordinate,

    /// Optional YAML lookup table; the embedded West Java table is used otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_path: Option<PathBuf>,
}

fn default_fallback_coordinate() -> GeoCoordinate {
    WEST_JAVA_CENTROID
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            fallback_policy: FallbackPolicy::default(),
            fallback_coordinate: default_fallback_coordinate(),
            table_path: None,
        }
    }
}

/// Thresholds for the per-cluster interpretation shown to readers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Mean 4G/LTE above this marks a leading cluster
    #[serde(default = "default_leading_lte_threshold")]
    pub leading_lte_threshold: f64,

    /// Mean no-signal above this marks a priority cluster
    #[serde(default = "default_priority_no_signal_threshold")]
    pub priority_no_signal_threshold: f64,
}

fn default_leading_lte_threshold() -> f64 {
    500.0
}

fn default_priority_no_signal_threshold() -> f64 {
    50.0
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            leading_lte_threshold: default_leading_lte_threshold(),
            priority_no_signal_threshold: default_priority_no_signal_threshold(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub clustering: ClusteringConfig,

    #[serde(default)]
    pub geo: GeoConfig,

    #[serde(default)]
    pub report: ReportConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.clustering.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_clustering_config() {
        let config = ClusteringConfig::default();
        assert_eq!(config.k, 4);
        assert_eq!(config.seed, 42);
        assert_eq!(config.features, FeatureSet::Signal);
        assert!(config.projection);
    }

    #[test]
    fn test_default_pipeline_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.geo.fallback_policy, FallbackPolicy::UseCentroid);
        assert_eq!(config.geo.fallback_coordinate, WEST_JAVA_CENTROID);
        assert_eq!(config.report.leading_lte_threshold, 500.0);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "clustering:\n  k: 5\n  features: signal-with-bts\ngeo:\n  fallback_policy: drop-unresolved\n";
        let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.clustering.k, 5);
        assert_eq!(config.clustering.features, FeatureSet::SignalWithBts);
        assert_eq!(config.clustering.n_init, 10);
        assert_eq!(config.geo.fallback_policy, FallbackPolicy::DropUnresolved);
    }

    #[test]
    fn test_yaml_round_trip() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("pipeline.yaml");

        let mut config = PipelineConfig::default();
        config.clustering.k = 5;
        config.clustering.degenerate_policy = DegeneratePolicy::Fail;
        config.to_yaml(&path)?;

        let loaded = PipelineConfig::from_yaml(&path)?;
        assert_eq!(loaded.clustering.k, 5);
        assert_eq!(loaded.clustering.degenerate_policy, DegeneratePolicy::Fail);
        Ok(())
    }

    #[test]
    fn test_zero_k_is_rejected() {
        let yaml = "clustering:\n  k: 0\n";
        let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
