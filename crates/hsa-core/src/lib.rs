use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

pub mod criteria;
pub mod display;
pub mod gate;
pub mod store;
pub mod stream;

pub use criteria::{CriteriaEditor, CriteriaField};
pub use gate::results_ready;
pub use store::{ChannelState, ResultsState, ViewStateStore};
pub use stream::{decode_message, encode_message, MessageKind, StreamError, StreamMessage};

/// The four backend stages. Order is the order they run in and the order the
/// dashboard shows them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum AgentId {
    Parser,
    Mapbox,
    Apify,
    Evaluator,
}

impl AgentId {
    pub const ALL: [AgentId; 4] = [
        AgentId::Parser,
        AgentId::Mapbox,
        AgentId::Apify,
        AgentId::Evaluator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentId::Parser => "parser",
            AgentId::Mapbox => "mapbox",
            AgentId::Apify => "apify",
            AgentId::Evaluator => "evaluator",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AgentId::Parser => "Request Parser",
            AgentId::Mapbox => "Location Processor",
            AgentId::Apify => "Listing Scraper",
            AgentId::Evaluator => "Home Evaluator",
        }
    }

    pub fn initial_task(&self) -> &'static str {
        match self {
            AgentId::Parser => "Waiting to start...",
            AgentId::Mapbox => "Waiting for location data...",
            AgentId::Apify => "Ready to search listings...",
            AgentId::Evaluator => "Ready to evaluate matches...",
        }
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AgentId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "parser" => Ok(AgentId::Parser),
            "mapbox" => Ok(AgentId::Mapbox),
            "apify" => Ok(AgentId::Apify),
            "evaluator" => Ok(AgentId::Evaluator),
            other => Err(format!("unknown agent id: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Idle,
    Working,
    Completed,
    Error,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Working => "working",
            AgentStatus::Completed => "completed",
            AgentStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    pub id: AgentId,
    pub name: String,
    pub status: AgentStatus,
    pub current_task: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_time: Option<i64>,
    #[serde(
        default,
        deserialize_with = "deserialize_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_time: Option<i64>,
}

impl AgentRecord {
    pub fn initial(id: AgentId) -> Self {
        Self {
            id,
            name: id.display_name().to_string(),
            status: AgentStatus::Idle,
            current_task: id.initial_task().to_string(),
            output: None,
            start_time: None,
            end_time: None,
        }
    }

    pub fn initial_set() -> [AgentRecord; 4] {
        AgentId::ALL.map(AgentRecord::initial)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct NumericRange {
    pub min: f64,
    pub max: f64,
}

impl NumericRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SearchCriteria {
    pub bedrooms: NumericRange,
    pub bathrooms: NumericRange,
    pub price_range: NumericRange,
    pub square_feet: NumericRange,
    #[serde(default)]
    pub property_types: Vec<String>,
    #[serde(default)]
    pub must_have: Vec<String>,
    #[serde(default)]
    pub nice_to_have: Vec<String>,
    #[serde(default)]
    pub deal_breakers: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LocationData {
    pub center: Coordinate,
    pub bounding_box: BoundingBox,
    pub radius: f64,
    #[serde(default)]
    pub neighborhoods: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    #[default]
    Ready,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Ready => "READY",
            JobState::Running => "RUNNING",
            JobState::Succeeded => "SUCCEEDED",
            JobState::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ApifyJobStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub status: JobState,
    #[serde(default)]
    pub progress: f64,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub items_scraped: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Home {
    pub id: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub price: f64,
    pub bedrooms: f64,
    pub bathrooms: f64,
    pub square_feet: f64,
    pub property_type: String,
    pub year_built: Option<u32>,
    pub images: Vec<String>,
    pub listing_url: String,
    pub score: f64,
    pub match_percentage: f64,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub llm_analysis: String,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchResults {
    pub homes: Vec<Home>,
    #[serde(deserialize_with = "deserialize_count")]
    pub duplicates_found: u32,
    pub saved_to_supabase: bool,
    #[serde(deserialize_with = "deserialize_count")]
    pub total_found: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HistoryStatus {
    Completed,
    InProgress,
    Failed,
}

impl HistoryStatus {
    pub fn label(&self) -> &'static str {
        match self {
            HistoryStatus::Completed => "completed",
            HistoryStatus::InProgress => "in progress",
            HistoryStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub request: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub budget: String,
    #[serde(default)]
    pub created_at: String,
    pub status: HistoryStatus,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub homes_found: u32,
}

impl HistoryEntry {
    /// Case-insensitive match on request text or location; an empty query matches everything.
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        self.request.to_lowercase().contains(&query)
            || self.location.to_lowercase().contains(&query)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct HousingRequest {
    pub request: String,
    pub location: String,
    pub budget: String,
}

impl HousingRequest {
    pub fn new(
        request: impl Into<String>,
        location: impl Into<String>,
        budget: impl Into<String>,
    ) -> Self {
        Self {
            request: request.into(),
            location: location.into(),
            budget: budget.into(),
        }
    }

    /// Returns the first blank field, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.request.trim().is_empty() {
            Some("request")
        } else if self.location.trim().is_empty() {
            Some("location")
        } else if self.budget.trim().is_empty() {
            Some("budget")
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StartSearchResponse {
    pub search_id: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Epoch milliseconds arrive as plain JSON numbers, fractional ones included.
/// Fractions are rounded; `null` reads as absent.
pub(crate) fn deserialize_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Number(n) => match n.as_i64() {
            Some(ms) => Ok(Some(ms)),
            None => n
                .as_f64()
                .map(|ms| Some(ms.round() as i64))
                .ok_or_else(|| serde::de::Error::custom("invalid timestamp")),
        },
        _ => Err(serde::de::Error::custom("expected number for timestamp")),
    }
}

fn count_from_number(n: &serde_json::Number) -> u32 {
    if let Some(u) = n.as_u64() {
        return u32::try_from(u).unwrap_or(u32::MAX);
    }
    // Negative or fractional; `as` saturates into the u32 range.
    n.as_f64().map(|f| f.round() as u32).unwrap_or(0)
}

/// Counts tolerate floats, negatives and `null`; they clamp into `u32`.
pub(crate) fn deserialize_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(deserialize_count_opt(deserializer)?.unwrap_or(0))
}

/// Like [`deserialize_count`], keeping `null` distinct from zero.
pub(crate) fn deserialize_count_opt<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(Some(count_from_number(&n))),
        _ => Err(serde::de::Error::custom("expected number for count")),
    }
}
