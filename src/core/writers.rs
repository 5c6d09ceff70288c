//! CSV writers for clustering results.
//!
//! - cluster assignments, one row per region with its label and projection
//! - geo-augmented assignments with coordinates
//! - per-cluster summaries with their interpretation

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use thiserror::Error;

use super::loaders::{COL_BTS, COL_LTE, COL_NO_SIGNAL, COL_REGION, COL_STRONG, COL_WEAK};
use crate::config::ReportConfig;
use crate::processors::geo::GeoRegion;
use crate::processors::pipeline::ClusteredRegion;
use crate::processors::summary::{ClusterProfile, ClusterSummary};

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Opens a CSV writer at `path`, creating parent directories.
fn create_csv_writer(path: &Path) -> Result<csv::Writer<BufWriter<File>>> {
    ensure_parent_dirs(path)?;
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(csv::Writer::from_writer(BufWriter::new(file)))
}

fn write_row<I, S>(writer: &mut csv::Writer<BufWriter<File>>, path: &Path, row: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<[u8]>,
{
    writer.write_record(row).map_err(|e| WriteError::CsvError {
        path: path.display().to_string(),
        source: e,
    })
}

fn finish(mut writer: csv::Writer<BufWriter<File>>, path: &Path) -> Result<()> {
    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })
}

/// Empty cell for a missing value.
fn cell<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn fixed(value: Option<f64>) -> String {
    value.map(|v| format!("{:.6}", v)).unwrap_or_default()
}

fn record_cells(region: &ClusteredRegion) -> Vec<String> {
    let r = &region.record;
    vec![
        r.region_name.clone(),
        cell(r.bts_count),
        cell(r.strong_signal),
        cell(r.weak_signal),
        cell(r.no_signal),
        cell(r.lte_coverage),
        region.cluster.to_string(),
    ]
}

const RECORD_HEADER: [&str; 7] = [
    COL_REGION,
    COL_BTS,
    COL_STRONG,
    COL_WEAK,
    COL_NO_SIGNAL,
    COL_LTE,
    "CLUSTER",
];

/// Write every region with its cluster label and principal component coordinates.
///
/// `PC1`/`PC2` are empty when the projection was not computed, as are the
/// signal columns whose input cell was empty.
///
/// # Example
///
/// ```no_run
/// use signal_clustering::core::writers::write_assignments_csv;
/// use std::path::Path;
///
/// write_assignments_csv(Path::new("clusters.csv"), &[]).unwrap();
/// ```
pub fn write_assignments_csv(path: &Path, regions: &[ClusteredRegion]) -> Result<()> {
    let mut writer = create_csv_writer(path)?;

    write_row(
        &mut writer,
        path,
        RECORD_HEADER.iter().copied().chain(["PC1", "PC2"]),
    )?;
    for region in regions {
        let mut row = record_cells(region);
        row.push(fixed(region.projection.map(|p| p[0])));
        row.push(fixed(region.projection.map(|p| p[1])));
        write_row(&mut writer, path, &row)?;
    }

    finish(writer, path)
}

/// Write the geo-augmented view: each region with its latitude, longitude and
/// whether the coordinate came from the lookup table.
pub fn write_geo_csv(path: &Path, regions: &[GeoRegion]) -> Result<()> {
    let mut writer = create_csv_writer(path)?;

    write_row(
        &mut writer,
        path,
        RECORD_HEADER
            .iter()
            .copied()
            .chain(["LATITUDE", "LONGITUDE", "RESOLVED"]),
    )?;
    for geo in regions {
        let mut row = record_cells(&geo.region);
        row.push(format!("{:.6}", geo.coordinate.latitude));
        row.push(format!("{:.6}", geo.coordinate.longitude));
        row.push(geo.resolved.to_string());
        write_row(&mut writer, path, &row)?;
    }

    finish(writer, path)
}

/// Write one row per cluster with its aggregates and profile.
pub fn write_summary_csv(
    path: &Path,
    summaries: &[ClusterSummary],
    thresholds: &ReportConfig,
) -> Result<()> {
    let mut writer = create_csv_writer(path)?;

    write_row(
        &mut writer,
        path,
        [
            "CLUSTER",
            "REGIONS",
            "TOTAL BTS",
            "MEAN SINYAL KUAT",
            "MEAN SINYAL LEMAH",
            "MEAN TIDAK ADA SINYAL",
            "MEAN 4G/LTE",
            "PROFILE",
        ],
    )?;
    for summary in summaries {
        let profile = ClusterProfile::classify(summary, thresholds);
        write_row(
            &mut writer,
            path,
            [
                summary.cluster.to_string(),
                summary.regions.to_string(),
                summary.total_bts.to_string(),
                fixed(summary.mean_strong_signal),
                fixed(summary.mean_weak_signal),
                fixed(summary.mean_no_signal),
                fixed(summary.mean_lte_coverage),
                profile.to_string(),
            ],
        )?;
    }

    finish(writer, path)
}
