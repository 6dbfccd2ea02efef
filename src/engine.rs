//! The matching engine
//!
//! Owns the immutable indexes, both matchers, and the shared mutable
//! state (caches, statistics, knowledge base), and exposes the public
//! API: single match, batch match, knowledge-base query, statistics
//! export.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::batch::{BatchOptions, BatchOutcome, BatchRunner};
use crate::catalog::{CatalogLoader, PartCatalog, PcdbRecords, VcdbRecords, VehicleCatalog};
use crate::config::MatcherConfig;
use crate::index::{PartsIndex, VehicleIndex};
use crate::knowledge::KnowledgeBaseAggregator;
use crate::matcher::{PartsMatcher, TableVinDecoder, VehicleMatcher, VinDecoder};
use crate::normalize::TextNormalizer;
use crate::stats::{MatchingReport, StatisticsCollector};
use crate::types::{
    KnowledgeBase, PartMatchResult, PartQuery, VehicleMatchResult, VehicleQuery,
};
use crate::{Error, Result};

/// One record of a parts batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartBatchInput {
    pub id: String,
    #[serde(flatten)]
    pub query: PartQuery,
}

/// One record of a vehicle batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleBatchInput {
    pub id: String,
    #[serde(flatten)]
    pub query: VehicleQuery,
}

pub struct MatchingEngine {
    parts_matcher: PartsMatcher,
    vehicle_matcher: VehicleMatcher,
    stats: StatisticsCollector,
    knowledge: KnowledgeBaseAggregator,
}

impl std::fmt::Debug for MatchingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchingEngine").finish_non_exhaustive()
    }
}

impl MatchingEngine {
    /// Load catalogs from artifact directories and build the engine.
    pub async fn from_dirs(
        pcdb_dir: impl AsRef<Path>,
        vcdb_dir: impl AsRef<Path>,
        config: MatcherConfig,
    ) -> Result<Self> {
        let loader = CatalogLoader::new(pcdb_dir.as_ref(), vcdb_dir.as_ref());
        let (pcdb, vcdb) = loader.load().await?;
        Self::from_records(pcdb, vcdb, config)
    }

    /// Build the engine from in-memory records with the built-in VIN
    /// decoder.
    pub fn from_records(
        pcdb: PcdbRecords,
        vcdb: VcdbRecords,
        config: MatcherConfig,
    ) -> Result<Self> {
        Self::from_records_with_decoder(pcdb, vcdb, config, Arc::new(TableVinDecoder))
    }

    /// Build the engine with a caller-supplied VIN decoder (e.g. an HTTP
    /// client wrapper owning its own timeout).
    pub fn from_records_with_decoder(
        pcdb: PcdbRecords,
        vcdb: VcdbRecords,
        config: MatcherConfig,
        vin_decoder: Arc<dyn VinDecoder>,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;

        let normalizer = TextNormalizer::new();

        let part_catalog = PartCatalog::from_records(pcdb);
        if part_catalog.is_empty() {
            return Err(Error::CatalogNotLoaded("PCdb catalog has no parts".to_string()));
        }
        let vehicle_catalog = VehicleCatalog::from_records(vcdb);
        if vehicle_catalog.base_vehicles().is_empty() {
            return Err(Error::CatalogNotLoaded(
                "VCdb catalog has no base vehicles".to_string(),
            ));
        }

        let parts_index = Arc::new(PartsIndex::build(part_catalog, &normalizer));
        let vehicle_index = Arc::new(VehicleIndex::build(vehicle_catalog, &normalizer));

        tracing::info!(
            parts = parts_index.len(),
            vehicles = vehicle_index.len(),
            "matching engine ready"
        );

        Ok(Self {
            parts_matcher: PartsMatcher::new(
                Arc::clone(&parts_index),
                normalizer.clone(),
                config.clone(),
            ),
            vehicle_matcher: VehicleMatcher::new(
                vehicle_index,
                normalizer,
                config,
                vin_decoder,
            ),
            stats: StatisticsCollector::new(),
            knowledge: KnowledgeBaseAggregator::new(),
        })
    }

    /// Match a single parts input; records statistics and, on success,
    /// the entity's knowledge base.
    pub fn match_part(&self, query: &PartQuery) -> PartMatchResult {
        let result = self.parts_matcher.match_part(query);
        self.stats.record_part(&result);

        if let (Some(entity_id), Some(primary)) = (&query.entity_id, &result.primary) {
            let original = query
                .title
                .as_deref()
                .or(query.description.as_deref())
                .unwrap_or(&primary.part.name);
            self.knowledge.record(entity_id, &primary.part, original);
        }

        result
    }

    /// Match a single vehicle input; records statistics.
    pub fn match_vehicle(&self, query: &VehicleQuery) -> VehicleMatchResult {
        let result = self.vehicle_matcher.match_vehicle(query);
        self.stats.record_vehicle(&result);
        result
    }

    /// Batch parts matching with stable input-order results.
    pub fn batch_match_parts(
        &self,
        inputs: Vec<PartBatchInput>,
        options: &BatchOptions,
    ) -> BatchOutcome<PartMatchResult> {
        let inputs: Vec<(String, PartQuery)> = inputs
            .into_iter()
            .map(|input| (input.id, input.query))
            .collect();
        BatchRunner::run(inputs, |query| self.match_part(query), options)
    }

    /// Batch vehicle matching with stable input-order results.
    pub fn batch_match_vehicles(
        &self,
        inputs: Vec<VehicleBatchInput>,
        options: &BatchOptions,
    ) -> BatchOutcome<VehicleMatchResult> {
        let inputs: Vec<(String, VehicleQuery)> = inputs
            .into_iter()
            .map(|input| (input.id, input.query))
            .collect();
        BatchRunner::run(inputs, |query| self.match_vehicle(query), options)
    }

    /// Frequency-ranked knowledge base for one shop entity.
    pub fn knowledge_base(&self, entity_id: &str) -> KnowledgeBase {
        self.knowledge.knowledge_base(entity_id)
    }

    /// Statistics snapshot including cache counters.
    pub fn statistics(&self) -> MatchingReport {
        self.stats.report(
            self.parts_matcher.cache().stats(),
            self.vehicle_matcher.cache().stats(),
        )
    }

    pub fn clear_statistics(&self) {
        self.stats.clear();
    }

    pub fn clear_cache(&self) {
        self.parts_matcher.clear_cache();
        self.vehicle_matcher.clear_cache();
    }
}
