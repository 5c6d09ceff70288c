//! Static region-name to coordinate lookup and fallback handling.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, FallbackPolicy, GeoConfig, GeoCoordinate};
use crate::core::loaders::normalize_region_name;
use crate::processors::pipeline::ClusteredRegion;

/// Embedded default table for West Java regencies and cities.
const WEST_JAVA_TABLE: &str = include_str!("../../data/west_java_regions.yaml");

/// Lookup table keyed by normalized region name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoTable {
    regions: BTreeMap<String, GeoCoordinate>,
}

impl GeoTable {
    /// Build a table, normalizing every key. Later duplicates win.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, GeoCoordinate)>,
        S: AsRef<str>,
    {
        let regions = entries
            .into_iter()
            .map(|(name, coord)| (normalize_region_name(name.as_ref()), coord))
            .collect();
        Self { regions }
    }

    /// Parse a YAML table of the form `regions: { NAME: { latitude, longitude } }`.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: GeoTable = serde_yaml::from_str(content)?;
        let table = Self::from_entries(raw.regions.iter().map(|(k, v)| (k.as_str(), *v)));
        if table.len() != raw.len() {
            return Err(ConfigError::Invalid(
                "geo table has names that collide after normalization".to_string(),
            ));
        }
        for (name, coord) in &table.regions {
            if !coord.latitude.is_finite() || !coord.longitude.is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "geo table entry '{}' has a non-finite coordinate",
                    name
                )));
            }
        }
        Ok(table)
    }

    /// Load a YAML table from disk.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// The bundled West Java table.
    pub fn west_java() -> Result<Self, ConfigError> {
        Self::from_yaml_str(WEST_JAVA_TABLE)
    }

    /// The table named by `config.table_path`, or the bundled one.
    pub fn from_config(config: &GeoConfig) -> Result<Self, ConfigError> {
        match &config.table_path {
            Some(path) => Self::from_yaml(path),
            None => Self::west_java(),
        }
    }

    pub fn lookup(&self, region_name: &str) -> Option<GeoCoordinate> {
        self.regions.get(&normalize_region_name(region_name)).copied()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

impl Hash for GeoTable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.regions.len().hash(state);
        for (name, coord) in &self.regions {
            name.hash(state);
            coord.hash(state);
        }
    }
}

/// A clustered region with its map coordinate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoRegion {
    pub region: ClusteredRegion,
    pub coordinate: GeoCoordinate,
    /// False when `coordinate` is the fallback constant
    pub resolved: bool,
}

/// Attach coordinates to clustered regions.
///
/// Names missing from `table` get `config.fallback_coordinate` under
/// `use-centroid` and are left out under `drop-unresolved`. The input is
/// never modified, so non-geo views keep every region.
pub fn resolve_coordinates(
    regions: &[ClusteredRegion],
    table: &GeoTable,
    config: &GeoConfig,
) -> Vec<GeoRegion> {
    let mut out = Vec::with_capacity(regions.len());
    let mut misses = 0usize;

    for region in regions {
        match table.lookup(&region.record.region_name) {
            Some(coordinate) => out.push(GeoRegion {
                region: region.clone(),
                coordinate,
                resolved: true,
            }),
            None => {
                misses += 1;
                log::warn!(
                    "no coordinates for region '{}' ({:?})",
                    region.record.region_name,
                    config.fallback_policy
                );
                if config.fallback_policy == FallbackPolicy::UseCentroid {
                    out.push(GeoRegion {
                        region: region.clone(),
                        coordinate: config.fallback_coordinate,
                        resolved: false,
                    });
                }
            }
        }
    }

    log::info!(
        "geo: {} of {} regions resolved, {} fallback(s)",
        regions.len() - misses,
        regions.len(),
        misses
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WEST_JAVA_CENTROID;
    use crate::core::loaders::RegionRecord;

    fn clustered(name: &str, cluster: usize) -> ClusteredRegion {
        ClusteredRegion {
            record: RegionRecord::new(name, 10, 800.0, 50.0, 5.0, 600.0),
            cluster,
            projection: None,
        }
    }

    fn table() -> GeoTable {
        GeoTable::from_entries([
            ("Kota Bandung", GeoCoordinate::new(-6.9175, 107.6191)),
            ("KABUPATEN GARUT", GeoCoordinate::new(-7.2279, 107.9087)),
        ])
    }

    #[test]
    fn test_lookup_normalizes_names() {
        let table = table();
        assert_eq!(
            table.lookup("  kota   bandung"),
            Some(GeoCoordinate::new(-6.9175, 107.6191))
        );
        assert!(table.lookup("KOTA DEPOK").is_none());
    }

    #[test]
    fn test_use_centroid_fallback_is_exact() {
        let regions = vec![clustered("KOTA BANDUNG", 0), clustered("ATLANTIS", 1)];
        let config = GeoConfig::default();
        let resolved = resolve_coordinates(&regions, &table(), &config);

        assert_eq!(resolved.len(), 2);
        assert!(resolved[0].resolved);
        assert!(!resolved[1].resolved);
        assert_eq!(resolved[1].coordinate, WEST_JAVA_CENTROID);
        assert_eq!(resolved[1].region.cluster, 1);
    }

    #[test]
    fn test_custom_fallback_coordinate() {
        let regions = vec![clustered("ATLANTIS", 0)];
        let config = GeoConfig {
            fallback_coordinate: GeoCoordinate::new(1.5, 2.5),
            ..GeoConfig::default()
        };
        let resolved = resolve_coordinates(&regions, &table(), &config);
        assert_eq!(resolved[0].coordinate, GeoCoordinate::new(1.5, 2.5));
    }

    #[test]
    fn test_drop_unresolved() {
        let regions = vec![
            clustered("ATLANTIS", 0),
            clustered("kabupaten garut", 1),
        ];
        let config = GeoConfig {
            fallback_policy: FallbackPolicy::DropUnresolved,
            ..GeoConfig::default()
        };
        let resolved = resolve_coordinates(&regions, &table(), &config);

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].region.record.region_name, "kabupaten garut");
        // input is untouched for non-geo views
        assert_eq!(regions.len(), 2);
    }

    #[test]
    fn test_bundled_table() {
        let table = GeoTable::west_java().unwrap();
        assert_eq!(table.len(), 27);
        assert!(table.lookup("Kabupaten Bandung Barat").is_some());
        assert!(table.lookup("KOTA BANJAR").is_some());
    }

    #[test]
    fn test_yaml_collision_rejected() {
        let yaml = "regions:\n  KOTA BOGOR: { latitude: 1.0, longitude: 2.0 }\n  kota bogor: { latitude: 1.0, longitude: 2.0 }\n";
        assert!(matches!(
            GeoTable::from_yaml_str(yaml),
            Err(ConfigError::Invalid(_))
        ));
    }
}
