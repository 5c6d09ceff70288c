//! Per-cluster display aggregates for reports.
//!
//! Interpretations are derived from a cluster's aggregates, never from its
//! label number, since label numbering is an artifact of the fit.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::config::ReportConfig;
use crate::processors::pipeline::{ClusteredDataset, ClusteredRegion};

/// Aggregates over the regions of one cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSummary {
    pub cluster: usize,
    pub regions: usize,
    /// Sum of the BTS counts present
    pub total_bts: u64,
    pub mean_strong_signal: Option<f64>,
    pub mean_weak_signal: Option<f64>,
    pub mean_no_signal: Option<f64>,
    pub mean_lte_coverage: Option<f64>,
}

/// Reader-facing interpretation of a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClusterProfile {
    /// Wide 4G/LTE reach and strong signal
    Leading,
    /// Many areas without signal; needs infrastructure attention
    Priority,
    /// Average signal quality, still developing
    Developing,
}

impl ClusterProfile {
    /// Leading if mean LTE exceeds its threshold, else priority if mean
    /// no-signal exceeds its threshold, else developing. Absent means never
    /// exceed a threshold.
    pub fn classify(summary: &ClusterSummary, thresholds: &ReportConfig) -> Self {
        let above = |value: Option<f64>, threshold: f64| value.is_some_and(|v| v > threshold);
        if above(summary.mean_lte_coverage, thresholds.leading_lte_threshold) {
            ClusterProfile::Leading
        } else if above(summary.mean_no_signal, thresholds.priority_no_signal_threshold) {
            ClusterProfile::Priority
        } else {
            ClusterProfile::Developing
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ClusterProfile::Leading => "wide 4G/LTE reach and strong signal coverage",
            ClusterProfile::Priority => "high no-signal counts; infrastructure needs attention",
            ClusterProfile::Developing => "average signal quality, still developing",
        }
    }
}

impl fmt::Display for ClusterProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClusterProfile::Leading => "leading",
            ClusterProfile::Priority => "priority",
            ClusterProfile::Developing => "developing",
        };
        f.write_str(name)
    }
}

/// Labels present in the dataset, ascending.
pub fn distinct_labels(dataset: &ClusteredDataset) -> Vec<usize> {
    dataset
        .regions
        .iter()
        .map(|r| r.cluster)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Regions assigned to `label`, in input order.
pub fn filter_by_cluster(regions: &[ClusteredRegion], label: usize) -> Vec<&ClusteredRegion> {
    regions.iter().filter(|r| r.cluster == label).collect()
}

fn mean(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, count) = values
        .flatten()
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Aggregate the regions of `label`. `None` if the cluster has no regions.
pub fn summarize(regions: &[ClusteredRegion], label: usize) -> Option<ClusterSummary> {
    let members = filter_by_cluster(regions, label);
    if members.is_empty() {
        return None;
    }
    let records = || members.iter().map(|m| &m.record);

    Some(ClusterSummary {
        cluster: label,
        regions: members.len(),
        total_bts: records().filter_map(|r| r.bts_count).sum(),
        mean_strong_signal: mean(records().map(|r| r.strong_signal)),
        mean_weak_signal: mean(records().map(|r| r.weak_signal)),
        mean_no_signal: mean(records().map(|r| r.no_signal)),
        mean_lte_coverage: mean(records().map(|r| r.lte_coverage)),
    })
}

/// Summaries of every non-empty cluster, ordered by label.
pub fn summarize_all(dataset: &ClusteredDataset) -> Vec<ClusterSummary> {
    distinct_labels(dataset)
        .into_iter()
        .filter_map(|label| summarize(&dataset.regions, label))
        .collect()
}
