//! Core data types and I/O operations.

pub mod loaders;
pub mod writers;

pub use loaders::{load_signal_csv, parse_signal_csv, LoaderError, RegionRecord};
pub use writers::{write_assignments_csv, write_geo_csv, write_summary_csv, WriteError};
