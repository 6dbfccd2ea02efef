//! Core types for autocat
//!
//! The canonical data model (PCdb parts, VCdb vehicles), the match result
//! shapes shared by both matchers, and the closed failure/method
//! enumerations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// PCdb part terminology ID
pub type PartTerminologyId = u32;

/// VCdb base vehicle ID (make + model + year)
pub type BaseVehicleId = u32;

/// VCdb concrete vehicle configuration ID
pub type VehicleId = u32;

/// Shop entity identifier used for knowledge-base aggregation
pub type EntityId = String;

/// Relation between two canonical parts (PCdb relationships table)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PartRelation {
    pub related_part_id: PartTerminologyId,
    pub relation_type: String,
}

/// Optional PIES bundles carried through the engine without interpretation.
///
/// Missing bundles deserialize to `None`; the matcher never reasons over
/// their contents beyond token extraction from string-valued attributes.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PartBundles {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interchange: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packaging: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hazmat: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digital_assets: Option<serde_json::Value>,
}

impl PartBundles {
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.attributes.is_none()
            && self.interchange.is_none()
            && self.assets.is_none()
            && self.packaging.is_none()
            && self.pricing.is_none()
            && self.availability.is_none()
            && self.hazmat.is_none()
            && self.digital_assets.is_none()
    }
}

/// Canonical PCdb part
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Part {
    pub part_terminology_id: PartTerminologyId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub descriptions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supersedes: Vec<PartTerminologyId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub superseded_by: Vec<PartTerminologyId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<PartRelation>,
    #[serde(default, skip_serializing_if = "PartBundles::is_empty")]
    pub bundles: PartBundles,
}

impl Part {
    /// Minimal part with just identity and name (test fixtures and
    /// mapping-table synthesis).
    pub fn named(part_terminology_id: PartTerminologyId, name: impl Into<String>) -> Self {
        Self {
            part_terminology_id,
            name: name.into(),
            descriptions: Vec::new(),
            aliases: Vec::new(),
            supersedes: Vec::new(),
            superseded_by: Vec::new(),
            relations: Vec::new(),
            bundles: PartBundles::default(),
        }
    }
}

/// Canonical VCdb vehicle, materialized at base-vehicle granularity with an
/// optional concrete configuration attached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vehicle {
    pub base_vehicle_id: BaseVehicleId,
    pub vehicle_id: VehicleId,
    pub make_id: u32,
    pub make_name: String,
    pub model_id: u32,
    pub model_name: String,
    pub year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_model_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_model_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_type_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transmission: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brakes: Option<serde_json::Value>,
}

/// A part in a match result, flagged when returned as an alternative.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PartCandidate {
    #[serde(flatten)]
    pub part: Part,
    #[serde(default)]
    pub is_alternative: bool,
    /// Strategy-assigned score for ranked strategies (fuzzy, keyword)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// A vehicle in a match result, flagged when returned as an alternative.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VehicleCandidate {
    #[serde(flatten)]
    pub vehicle: Vehicle,
    #[serde(default)]
    pub is_alternative: bool,
}

/// Free-form parts input as received from a shop repair order line
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PartQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shop_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<EntityId>,
}

impl PartQuery {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// All fields empty or whitespace
    pub fn is_empty(&self) -> bool {
        fn blank(field: &Option<String>) -> bool {
            field.as_deref().map_or(true, |s| s.trim().is_empty())
        }
        blank(&self.title)
            && blank(&self.description)
            && blank(&self.shop_number)
            && blank(&self.vendor_number)
    }
}

/// Free-form vehicle identification as received from a shop
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VehicleQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transmission: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<EntityId>,
}

impl VehicleQuery {
    pub fn mmy(make: impl Into<String>, model: impl Into<String>, year: i32) -> Self {
        Self {
            make: Some(make.into()),
            model: Some(model.into()),
            year: Some(year),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        fn blank(field: &Option<String>) -> bool {
            field.as_deref().map_or(true, |s| s.trim().is_empty())
        }
        blank(&self.make)
            && blank(&self.model)
            && self.year.is_none()
            && blank(&self.sub_model)
            && blank(&self.vin)
    }
}

/// Result of matching one parts input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartMatchResult {
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary: Option<PartCandidate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<PartCandidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<PartMatchMethod>,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempted_methods: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<PartFailureReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_details: Option<String>,
    pub original_input: PartQuery,
}

impl PartMatchResult {
    pub fn failure(
        input: PartQuery,
        reason: PartFailureReason,
        details: impl Into<String>,
        attempted: Vec<String>,
    ) -> Self {
        Self {
            matched: false,
            primary: None,
            alternatives: Vec::new(),
            method: None,
            confidence: 0.0,
            attempted_methods: attempted,
            failure_reason: Some(reason),
            failure_details: Some(details.into()),
            original_input: input,
        }
    }
}

/// Result of matching one vehicle input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleMatchResult {
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary: Option<VehicleCandidate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<VehicleCandidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<VehicleMatchMethod>,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempted_methods: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<VehicleFailureReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_details: Option<String>,
    pub original_input: VehicleQuery,
}

impl VehicleMatchResult {
    pub fn failure(
        input: VehicleQuery,
        reason: VehicleFailureReason,
        details: impl Into<String>,
        attempted: Vec<String>,
    ) -> Self {
        Self {
            matched: false,
            primary: None,
            alternatives: Vec::new(),
            method: None,
            confidence: 0.0,
            attempted_methods: attempted,
            failure_reason: Some(reason),
            failure_details: Some(details.into()),
            original_input: input,
        }
    }
}

/// Closed failure taxonomy for parts matching
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartFailureReason {
    MissingPartName,
    MissingDescription,
    VaguePartName,
    ServiceItem,
    PartNotInAutocare,
    CategoryNotSupported,
    LimitedAutocareData,
    LowConfidence,
    AmbiguousMatch,
    ConflictingAttributes,
    ExactMatchFailed,
    FuzzyMatchFailed,
    KeywordSearchFailed,
    AttributeMatchFailed,
    ExceptionError,
    NoInputData,
}

impl PartFailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingPartName => "MISSING_PART_NAME",
            Self::MissingDescription => "MISSING_DESCRIPTION",
            Self::VaguePartName => "VAGUE_PART_NAME",
            Self::ServiceItem => "SERVICE_ITEM",
            Self::PartNotInAutocare => "PART_NOT_IN_AUTOCARE",
            Self::CategoryNotSupported => "CATEGORY_NOT_SUPPORTED",
            Self::LimitedAutocareData => "LIMITED_AUTOCARE_DATA",
            Self::LowConfidence => "LOW_CONFIDENCE",
            Self::AmbiguousMatch => "AMBIGUOUS_MATCH",
            Self::ConflictingAttributes => "CONFLICTING_ATTRIBUTES",
            Self::ExactMatchFailed => "EXACT_MATCH_FAILED",
            Self::FuzzyMatchFailed => "FUZZY_MATCH_FAILED",
            Self::KeywordSearchFailed => "KEYWORD_SEARCH_FAILED",
            Self::AttributeMatchFailed => "ATTRIBUTE_MATCH_FAILED",
            Self::ExceptionError => "EXCEPTION_ERROR",
            Self::NoInputData => "NO_INPUT_DATA",
        }
    }
}

impl fmt::Display for PartFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed failure taxonomy for vehicle matching
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleFailureReason {
    MissingMake,
    MissingModel,
    MissingYear,
    InvalidYear,
    MakeNotInAutocare,
    ModelNotInAutocare,
    VehicleNotInAutocare,
    YearNotSupported,
    LowConfidence,
    AmbiguousMatch,
    ExceptionError,
    NoInputData,
    NoMatchResult,
    NoVehicleData,
    VinDecodeFailed,
}

impl VehicleFailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingMake => "MISSING_MAKE",
            Self::MissingModel => "MISSING_MODEL",
            Self::MissingYear => "MISSING_YEAR",
            Self::InvalidYear => "INVALID_YEAR",
            Self::MakeNotInAutocare => "MAKE_NOT_IN_AUTOCARE",
            Self::ModelNotInAutocare => "MODEL_NOT_IN_AUTOCARE",
            Self::VehicleNotInAutocare => "VEHICLE_NOT_IN_AUTOCARE",
            Self::YearNotSupported => "YEAR_NOT_SUPPORTED",
            Self::LowConfidence => "LOW_CONFIDENCE",
            Self::AmbiguousMatch => "AMBIGUOUS_MATCH",
            Self::ExceptionError => "EXCEPTION_ERROR",
            Self::NoInputData => "NO_INPUT_DATA",
            Self::NoMatchResult => "NO_MATCH_RESULT",
            Self::NoVehicleData => "NO_VEHICLE_DATA",
            Self::VinDecodeFailed => "VIN_DECODE_FAILED",
        }
    }
}

impl fmt::Display for VehicleFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed parts matching methods
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PartMatchMethod {
    Exact,
    ExactMapped,
    Fuzzy,
    Keyword,
    Interchange,
    Attribute,
}

impl PartMatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::ExactMapped => "exact_mapped",
            Self::Fuzzy => "fuzzy",
            Self::Keyword => "keyword",
            Self::Interchange => "interchange",
            Self::Attribute => "attribute",
        }
    }
}

impl fmt::Display for PartMatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed vehicle matching methods
///
/// `YearOffset` renders as `year_+1` / `year_-2` so the serialized form
/// carries the applied tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VehicleMatchMethod {
    Exact,
    FormatVariant,
    ModelNoDash,
    ModelInsertDash,
    YearOffset(i32),
    SubmodelFallback,
    VinDecodeStandard,
    VinDecodeSubmodel,
    FuzzyNoYear,
    FuzzySimilarity,
}

impl fmt::Display for VehicleMatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => f.write_str("exact"),
            Self::FormatVariant => f.write_str("format_variant"),
            Self::ModelNoDash => f.write_str("model_no_dash"),
            Self::ModelInsertDash => f.write_str("model_insert_dash"),
            Self::YearOffset(offset) => write!(f, "year_{:+}", offset),
            Self::SubmodelFallback => f.write_str("submodel_fallback"),
            Self::VinDecodeStandard => f.write_str("vin_decode_standard"),
            Self::VinDecodeSubmodel => f.write_str("vin_decode_submodel"),
            Self::FuzzyNoYear => f.write_str("fuzzy_no_year"),
            Self::FuzzySimilarity => f.write_str("fuzzy_similarity"),
        }
    }
}

impl std::str::FromStr for VehicleMatchMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "exact" => Ok(Self::Exact),
            "format_variant" => Ok(Self::FormatVariant),
            "model_no_dash" => Ok(Self::ModelNoDash),
            "model_insert_dash" => Ok(Self::ModelInsertDash),
            "submodel_fallback" => Ok(Self::SubmodelFallback),
            "vin_decode_standard" => Ok(Self::VinDecodeStandard),
            "vin_decode_submodel" => Ok(Self::VinDecodeSubmodel),
            "fuzzy_no_year" => Ok(Self::FuzzyNoYear),
            "fuzzy_similarity" => Ok(Self::FuzzySimilarity),
            other => other
                .strip_prefix("year_")
                .and_then(|n| n.parse::<i32>().ok())
                .map(Self::YearOffset)
                .ok_or_else(|| format!("unknown vehicle match method: {}", other)),
        }
    }
}

impl Serialize for VehicleMatchMethod {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VehicleMatchMethod {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Per-(entity, part) frequency record kept by the knowledge base
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrequencyRecord {
    pub part_terminology_id: PartTerminologyId,
    pub count: u64,
    /// Bounded set of original spellings seen for this part
    pub variants: Vec<String>,
}

/// Knowledge-base view for one shop entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub entity_id: EntityId,
    pub total_unique_parts: usize,
    pub most_frequent_parts: Vec<KnowledgeBaseEntry>,
}

/// One row of the knowledge base, frequency-ranked
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBaseEntry {
    pub part_id: PartTerminologyId,
    pub part_name: String,
    pub frequency: u64,
    pub canonical_part: Part,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<String>,
}
