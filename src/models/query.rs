//! Query generation inputs and outputs.
//!
//! Entity tags and intents are produced by an external NL pipeline; this crate
//! only consumes their shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Table,
    Column,
    Condition,
    Operator,
    Value,
    Number,
    String,
    Date,
    Boolean,
}

impl EntityType {
    /// Whether this tag carries a literal that must be bound as a parameter.
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Self::Value | Self::Number | Self::String | Self::Date | Self::Boolean
        )
    }
}

/// A typed span of the user's question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityTag {
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub text: String,
    /// In `[0, 1]`
    pub confidence: f64,
}

impl EntityTag {
    /// Create a new entity tag.
    pub fn new(entity_type: EntityType, text: impl Into<String>, confidence: f64) -> Self {
        Self {
            entity_type,
            text: text.into(),
            confidence,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryType {
    Select,
    Count,
    Sum,
    Avg,
    Max,
    Min,
    Group,
}

impl QueryType {
    /// SQL aggregate function for this intent, if any.
    pub fn aggregate_function(&self) -> Option<&'static str> {
        match self {
            Self::Count => Some("COUNT"),
            Self::Sum => Some("SUM"),
            Self::Avg => Some("AVG"),
            Self::Max => Some("MAX"),
            Self::Min => Some("MIN"),
            Self::Select | Self::Group => None,
        }
    }

    /// Check if this intent wraps the projection in an aggregate.
    pub fn is_aggregate(&self) -> bool {
        self.aggregate_function().is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// SQL keyword.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortRequirement {
    /// Column text as the user wrote it; resolved against the schema.
    pub column: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortRequirement {
    /// Create a new sort requirement.
    pub fn new(column: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LimitType {
    TopN,
    All,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitRequirement {
    pub limit_type: LimitType,
    #[serde(default)]
    pub count: Option<u64>,
}

impl LimitRequirement {
    /// Create a top-N limit.
    pub fn top(count: u64) -> Self {
        Self {
            limit_type: LimitType::TopN,
            count: Some(count),
        }
    }

    /// Create an explicit "no limit" requirement.
    pub fn all() -> Self {
        Self {
            limit_type: LimitType::All,
            count: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryIntent {
    pub query_type: QueryType,
    #[serde(default)]
    pub sort_requirements: Vec<SortRequirement>,
    #[serde(default)]
    pub limit: Option<LimitRequirement>,
    /// In `[0, 1]`
    pub confidence: f64,
}

impl QueryIntent {
    /// Create an intent without sorting or limit.
    pub fn new(query_type: QueryType, confidence: f64) -> Self {
        Self {
            query_type,
            sort_requirements: Vec::new(),
            limit: None,
            confidence,
        }
    }

    /// Add a sort requirement.
    pub fn with_sort(mut self, sort: SortRequirement) -> Self {
        self.sort_requirements.push(sort);
        self
    }

    /// Set the limit requirement.
    pub fn with_limit(mut self, limit: LimitRequirement) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A bound parameter value for generated SQL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParam {
    Bool(bool),
    Float(f64),
    String(String),
}

impl QueryParam {
    /// Parse literal text: numbers as float, `true`/`false` as bool, else string.
    pub fn from_literal(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.eq_ignore_ascii_case("true") {
            return Self::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Self::Bool(false);
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => Self::Float(n),
            _ => Self::String(text.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SqlGenerationResult {
    /// Empty when nothing could be resolved
    pub sql: String,
    /// 1-based placeholder position to bound value
    pub parameters: BTreeMap<usize, QueryParam>,
    /// In `[0, 1]`; `0.0` means the SQL must not be executed
    pub confidence: f64,
    pub explanations: Vec<String>,
    /// Advisory variants, never executed automatically
    pub alternatives: Vec<String>,
}

impl SqlGenerationResult {
    /// Create a zero-confidence result carrying only an explanation.
    pub fn unresolved(explanation: impl Into<String>) -> Self {
        Self {
            explanations: vec![explanation.into()],
            ..Self::default()
        }
    }

    /// Check if the result is worth handing to an executor.
    pub fn is_executable(&self) -> bool {
        !self.sql.is_empty() && self.confidence > 0.0
    }
}

/// Input document for offline generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub entities: Vec<EntityTag>,
    pub intent: QueryIntent,
}

/// One executed statement from the query-history feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryHistoryEntry {
    pub data_source_id: String,
    pub sql: String,
    #[serde(default = "Utc::now")]
    pub executed_at: DateTime<Utc>,
}

impl QueryHistoryEntry {
    /// Create a history entry stamped now.
    pub fn new(data_source_id: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            data_source_id: data_source_id.into(),
            sql: sql.into(),
            executed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_parsing() {
        assert_eq!(QueryParam::from_literal("42"), QueryParam::Float(42.0));
        assert_eq!(QueryParam::from_literal("3.5"), QueryParam::Float(3.5));
        assert_eq!(QueryParam::from_literal("TRUE"), QueryParam::Bool(true));
        assert_eq!(
            QueryParam::from_literal("Beijing"),
            QueryParam::String("Beijing".to_string())
        );
        assert_eq!(
            QueryParam::from_literal("2024-01-01"),
            QueryParam::String("2024-01-01".to_string())
        );
        assert_eq!(
            QueryParam::from_literal("NaN"),
            QueryParam::String("NaN".to_string())
        );
    }

    #[test]
    fn test_aggregate_mapping() {
        assert_eq!(QueryType::Count.aggregate_function(), Some("COUNT"));
        assert!(QueryType::Avg.is_aggregate());
        assert!(!QueryType::Group.is_aggregate());
        assert!(!QueryType::Select.is_aggregate());
    }

    #[test]
    fn test_entity_tag_deserialization() {
        let tag: EntityTag =
            serde_json::from_str(r#"{"type":"COLUMN","text":"email","confidence":0.9}"#).unwrap();
        assert_eq!(tag.entity_type, EntityType::Column);
        assert!(!tag.entity_type.is_literal());
        assert!(EntityType::Date.is_literal());
    }

    #[test]
    fn test_request_deserialization() {
        let request: GenerationRequest = serde_json::from_str(
            r#"{
                "entities": [{"type": "TABLE", "text": "orders", "confidence": 1.0}],
                "intent": {
                    "query_type": "SELECT",
                    "sort_requirements": [{"column": "created_at", "direction": "DESC"}],
                    "limit": {"limit_type": "TOP_N", "count": 5},
                    "confidence": 0.8
                }
            }"#,
        )
        .unwrap();
        assert_eq!(request.entities.len(), 1);
        assert_eq!(request.intent.sort_requirements[0].direction, SortDirection::Desc);
        assert_eq!(request.intent.limit.unwrap().count, Some(5));
    }

    #[test]
    fn test_unresolved_result() {
        let result = SqlGenerationResult::unresolved("no tables");
        assert!(!result.is_executable());
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.explanations, vec!["no tables".to_string()]);
    }
}
