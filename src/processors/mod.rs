//! Data processing modules.

pub mod cache;
pub mod geo;
pub mod kmeans;
pub mod pipeline;
pub mod projection;
pub mod scaling;
pub mod summary;

// Re-export key types for convenience
pub use cache::{CacheKey, SingleFlightCache};
pub use geo::{resolve_coordinates, GeoRegion, GeoTable};
pub use kmeans::{KMeansFit, KMeansParams};
pub use pipeline::{
    cluster, cluster_records, process_signal_file, CachedPipeline, ClusteredDataset,
    ClusteredRegion, FeatureSelector, PipelineError, PipelineOutput,
};
pub use projection::{project_2d, Projection};
pub use scaling::StandardScaler;
pub use summary::{summarize, summarize_all, ClusterProfile, ClusterSummary};
