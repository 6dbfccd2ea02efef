//! Catalog loading
//!
//! Reads prepared PCdb/VCdb JSON artifacts from two directory roots into
//! raw record structs. Upstream extraction produces the artifacts; the
//! engine only consumes them. Missing required files are fatal; missing
//! optional bundles warn and degrade gracefully.

pub mod pcdb;
pub mod vcdb;

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::{Error, Result};

pub use pcdb::{PartCatalog, PcdbRecords};
pub use vcdb::{VcdbRecords, VehicleCatalog};

/// Opaque PIES bundle files read from the PCdb root when present.
const PCDB_BUNDLE_FILES: &[(&str, &str)] = &[
    ("category", "category.json"),
    ("attributes", "attributes.json"),
    ("assets", "assets.json"),
    ("packaging", "packaging.json"),
    ("pricing", "pricing.json"),
    ("availability", "availability.json"),
    ("hazmat", "hazmat.json"),
    ("digital_assets", "digital_assets.json"),
];

/// Configuration tables read from the VCdb root when present.
const VCDB_CONFIG_FILES: &[(&str, &str)] = &[
    ("engine", "engine_configs.json"),
    ("transmission", "transmission_configs.json"),
    ("body", "body_configs.json"),
    ("brake", "brake_configs.json"),
    ("drive", "drive_types.json"),
    ("bed", "bed_configs.json"),
    ("steering", "steering_configs.json"),
    ("spring", "spring_configs.json"),
];

/// Reads PCdb and VCdb artifact directories into raw records.
pub struct CatalogLoader {
    pcdb_dir: PathBuf,
    vcdb_dir: PathBuf,
}

impl CatalogLoader {
    pub fn new(pcdb_dir: impl Into<PathBuf>, vcdb_dir: impl Into<PathBuf>) -> Self {
        Self {
            pcdb_dir: pcdb_dir.into(),
            vcdb_dir: vcdb_dir.into(),
        }
    }

    /// Load both catalogs. Fatal on missing required files (`parts.json`;
    /// `makes.json`, `models.json`, `years.json`, `base_vehicles.json`).
    pub async fn load(&self) -> Result<(PcdbRecords, VcdbRecords)> {
        let pcdb = self.load_pcdb().await?;
        let vcdb = self.load_vcdb().await?;
        Ok((pcdb, vcdb))
    }

    async fn load_pcdb(&self) -> Result<PcdbRecords> {
        let root = &self.pcdb_dir;

        let parts = read_required(&root.join("parts.json")).await?;
        let descriptions = read_optional(&root.join("descriptions.json")).await?;
        let aliases = read_optional(&root.join("aliases.json")).await?;
        let relationships = read_optional(&root.join("relationships.json")).await?;
        let supersessions = read_optional(&root.join("supersessions.json")).await?;
        let interchange = read_optional(&root.join("interchange.json")).await?;

        let mut bundles = std::collections::HashMap::new();
        for (name, file) in PCDB_BUNDLE_FILES {
            let rows: Vec<pcdb::BundleRecord> = read_optional(&root.join(file)).await?;
            if !rows.is_empty() {
                bundles.insert((*name).to_string(), rows);
            }
        }

        let records = PcdbRecords {
            parts,
            descriptions,
            aliases,
            relationships,
            supersessions,
            interchange,
            bundles,
        };

        tracing::info!(
            parts = records.parts.len(),
            aliases = records.aliases.len(),
            supersessions = records.supersessions.len(),
            interchange = records.interchange.len(),
            bundles = records.bundles.len(),
            "loaded PCdb records from {}",
            root.display()
        );
        Ok(records)
    }

    async fn load_vcdb(&self) -> Result<VcdbRecords> {
        let root = &self.vcdb_dir;

        let makes = read_required(&root.join("makes.json")).await?;
        let models = read_required(&root.join("models.json")).await?;
        let years = read_required(&root.join("years.json")).await?;
        let base_vehicles = read_required(&root.join("base_vehicles.json")).await?;
        let vehicles = read_optional(&root.join("vehicles.json")).await?;
        let submodels = read_optional(&root.join("submodels.json")).await?;

        let mut configs = std::collections::HashMap::new();
        for (name, file) in VCDB_CONFIG_FILES {
            let rows: Vec<vcdb::ConfigRecord> = read_optional(&root.join(file)).await?;
            if !rows.is_empty() {
                configs.insert((*name).to_string(), rows);
            }
        }

        let records = VcdbRecords {
            makes,
            models,
            years,
            base_vehicles,
            vehicles,
            submodels,
            configs,
        };

        tracing::info!(
            makes = records.makes.len(),
            models = records.models.len(),
            base_vehicles = records.base_vehicles.len(),
            vehicles = records.vehicles.len(),
            submodels = records.submodels.len(),
            configs = records.configs.len(),
            "loaded VCdb records from {}",
            root.display()
        );
        Ok(records)
    }
}

async fn read_required<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let data = tokio::fs::read(path).await.map_err(|e| {
        Error::catalog_load(format!("required file {} unreadable: {}", path.display(), e))
    })?;
    serde_json::from_slice(&data)
        .map_err(|e| Error::catalog_load(format!("{}: {}", path.display(), e)))
}

async fn read_optional<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    match tokio::fs::read(path).await {
        Ok(data) => serde_json::from_slice(&data)
            .map_err(|e| Error::catalog_load(format!("{}: {}", path.display(), e))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("optional catalog file {} missing, skipping", path.display());
            Ok(Vec::new())
        }
        Err(e) => Err(e.into()),
    }
}
