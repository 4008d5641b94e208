//! Scored relationship edges between tables.

use crate::error::{MetaError, MetaResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cardinality of a relationship, read from source to target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OneToOne => write!(f, "ONE_TO_ONE"),
            Self::OneToMany => write!(f, "ONE_TO_MANY"),
            Self::ManyToOne => write!(f, "MANY_TO_ONE"),
            Self::ManyToMany => write!(f, "MANY_TO_MANY"),
        }
    }
}

/// Kind of evidence an edge was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationSource {
    Metadata,
    Inference,
    Learning,
    UserFeedback,
}

impl std::fmt::Display for RelationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Metadata => write!(f, "METADATA"),
            Self::Inference => write!(f, "INFERENCE"),
            Self::Learning => write!(f, "LEARNING"),
            Self::UserFeedback => write!(f, "USER_FEEDBACK"),
        }
    }
}

/// Identity of an edge. Order-sensitive: `a -> b` and `b -> a` are distinct keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationshipKey {
    pub source_table: String,
    pub source_columns: Vec<String>,
    pub target_table: String,
    pub target_columns: Vec<String>,
}

impl RelationshipKey {
    /// Create a key. Table and column names are lowercased so lookups are
    /// case-insensitive.
    pub fn new(
        source_table: impl Into<String>,
        source_columns: Vec<String>,
        target_table: impl Into<String>,
        target_columns: Vec<String>,
    ) -> Self {
        Self {
            source_table: source_table.into().to_lowercase(),
            source_columns: source_columns.into_iter().map(|c| c.to_lowercase()).collect(),
            target_table: target_table.into().to_lowercase(),
            target_columns: target_columns.into_iter().map(|c| c.to_lowercase()).collect(),
        }
    }

    /// Create a single-column key.
    pub fn single(
        source_table: impl Into<String>,
        source_column: impl Into<String>,
        target_table: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        Self::new(
            source_table,
            vec![source_column.into()],
            target_table,
            vec![target_column.into()],
        )
    }

    /// Whether either endpoint is the given table (case-insensitive).
    pub fn touches(&self, table: &str) -> bool {
        self.source_table.eq_ignore_ascii_case(table)
            || self.target_table.eq_ignore_ascii_case(table)
    }
}

impl std::fmt::Display for RelationshipKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}({}) -> {}({})",
            self.source_table,
            self.source_columns.join(","),
            self.target_table,
            self.target_columns.join(",")
        )
    }
}

/// Junction table through which a many-to-many edge is realized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Junction {
    pub table: String,
    /// Column referencing the edge's source table
    pub source_column: String,
    /// Column referencing the edge's target table
    pub target_column: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableRelationship {
    pub key: RelationshipKey,
    pub relation_type: RelationType,
    pub source: RelationSource,
    /// In `[0, 1]`
    pub confidence: f64,
    pub frequency: u64,
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub junction: Option<Junction>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TableRelationship {
    /// Create an unverified edge with zero frequency.
    pub fn new(
        key: RelationshipKey,
        relation_type: RelationType,
        source: RelationSource,
        confidence: f64,
    ) -> Self {
        let now = Utc::now();
        Self {
            key,
            relation_type,
            source,
            confidence,
            frequency: 0,
            verified: false,
            junction: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the observation count.
    pub fn with_frequency(mut self, frequency: u64) -> Self {
        self.frequency = frequency;
        self
    }

    /// Mark as verified.
    pub fn with_verified(mut self, verified: bool) -> Self {
        self.verified = verified;
        self
    }

    /// Attach the junction table for a many-to-many edge.
    pub fn with_junction(mut self, junction: Junction) -> Self {
        self.junction = Some(junction);
        self
    }

    /// Ranking score used by recommendations.
    pub fn recommendation_score(&self) -> f64 {
        0.7 * self.confidence + 0.3 * (self.frequency as f64 / 10.0).min(1.0)
    }

    /// Check structural well-formedness of the edge.
    pub fn validate(&self) -> MetaResult<()> {
        let key = &self.key;
        if key.source_table.is_empty() || key.target_table.is_empty() {
            return Err(MetaError::validation(format!(
                "Relationship {} has an empty table name",
                key
            )));
        }
        if key.source_columns.is_empty() || key.target_columns.is_empty() {
            return Err(MetaError::validation(format!(
                "Relationship {} has no columns",
                key
            )));
        }
        if key.source_columns.len() != key.target_columns.len() {
            return Err(MetaError::validation(format!(
                "Relationship {} has {} source columns but {} target columns",
                key,
                key.source_columns.len(),
                key.target_columns.len()
            )));
        }
        if key.source_table == key.target_table && key.source_columns == key.target_columns {
            return Err(MetaError::validation(format!(
                "Relationship {} links a column set to itself",
                key
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence) || self.confidence.is_nan() {
            return Err(MetaError::validation(format!(
                "Relationship {} has confidence {} outside [0, 1]",
                key, self.confidence
            )));
        }
        Ok(())
    }
}
