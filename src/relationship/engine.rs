//! Relationship graph per data source.
//!
//! Edges are keyed by `RelationshipKey`; at most one edge exists per key.
//! Merging a candidate into an existing edge keeps the higher confidence,
//! adds up observation counts and never clears `verified`.

use crate::error::{MetaError, MetaResult};
use crate::models::{
    QueryHistoryEntry, RelationSource, RelationType, RelationshipKey, SchemaInfo,
    TableRelationship,
};
use crate::relationship::history;
use crate::relationship::rules::{self, infer_relation_type};
use chrono::Utc;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

type Graph = BTreeMap<RelationshipKey, TableRelationship>;

#[derive(Debug, Default)]
pub struct RelationshipEngine {
    graphs: RwLock<HashMap<String, Graph>>,
}

impl RelationshipEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Infer edges from one snapshot and merge them. Returns the candidate count.
    ///
    /// Re-running over an unchanged snapshot leaves the graph unchanged.
    pub async fn learn_from_schema(
        &self,
        data_source_id: &str,
        schema: &SchemaInfo,
    ) -> MetaResult<usize> {
        require_data_source(data_source_id)?;
        let candidates = rules::infer_all(schema);

        let mut graphs = self.graphs.write().await;
        let graph = graphs.entry(data_source_id.to_string()).or_default();
        let mut merged = 0;
        for candidate in candidates {
            if let Err(e) = candidate.validate() {
                warn!(data_source_id = %data_source_id, error = %e, "Skipping malformed candidate");
                continue;
            }
            merge(graph, candidate);
            merged += 1;
        }

        info!(
            data_source_id = %data_source_id,
            schema = %schema.name,
            candidates = merged,
            edges = graph.len(),
            "Relationship inference finished"
        );
        Ok(merged)
    }

    /// Mine executed SQL for joins. Each observed equality adds one to its edge's
    /// frequency. With a snapshot, observations naming unknown tables or columns
    /// are dropped.
    pub async fn learn_from_history(
        &self,
        data_source_id: &str,
        entries: &[QueryHistoryEntry],
        schema: Option<&SchemaInfo>,
    ) -> MetaResult<usize> {
        require_data_source(data_source_id)?;

        let mut observed = Vec::new();
        for entry in entries.iter().filter(|e| e.data_source_id == data_source_id) {
            for observation in history::mine(&entry.sql) {
                let relation_type = match schema {
                    Some(schema) => match relation_type_in(schema, &observation.key) {
                        Some(t) => t,
                        None => {
                            debug!(key = %observation.key, "Observed join outside the snapshot");
                            continue;
                        }
                    },
                    None => RelationType::ManyToMany,
                };
                observed.push(
                    TableRelationship::new(
                        observation.key,
                        relation_type,
                        RelationSource::Learning,
                        observation.confidence,
                    )
                    .with_frequency(1),
                );
            }
        }

        let mut graphs = self.graphs.write().await;
        let graph = graphs.entry(data_source_id.to_string()).or_default();
        let count = observed.len();
        for edge in observed {
            merge(graph, edge);
        }

        info!(
            data_source_id = %data_source_id,
            statements = entries.len(),
            observations = count,
            "Query history mined"
        );
        Ok(count)
    }

    /// Confirm an edge. Overwrites whatever the key held before.
    pub async fn record_feedback(
        &self,
        data_source_id: &str,
        key: RelationshipKey,
        relation_type: RelationType,
    ) -> MetaResult<TableRelationship> {
        require_data_source(data_source_id)?;
        let mut edge = TableRelationship::new(key, relation_type, RelationSource::UserFeedback, 1.0)
            .with_verified(true)
            .with_frequency(1);
        edge.validate()?;

        let mut graphs = self.graphs.write().await;
        let graph = graphs.entry(data_source_id.to_string()).or_default();
        if let Some(previous) = graph.get(&edge.key) {
            edge.frequency = previous.frequency + 1;
            edge.created_at = previous.created_at;
        }
        graph.insert(edge.key.clone(), edge.clone());

        info!(data_source_id = %data_source_id, key = %edge.key, "Relationship confirmed");
        Ok(edge)
    }

    /// Merge an externally supplied edge after validating it.
    pub async fn upsert(
        &self,
        data_source_id: &str,
        relationship: TableRelationship,
    ) -> MetaResult<()> {
        require_data_source(data_source_id)?;
        relationship.validate()?;
        let mut graphs = self.graphs.write().await;
        merge(
            graphs.entry(data_source_id.to_string()).or_default(),
            relationship,
        );
        Ok(())
    }

    /// Remove an edge. Nothing else ever removes one.
    pub async fn delete(
        &self,
        data_source_id: &str,
        key: &RelationshipKey,
    ) -> MetaResult<TableRelationship> {
        let mut graphs = self.graphs.write().await;
        let removed = graphs
            .get_mut(data_source_id)
            .and_then(|graph| graph.remove(key))
            .ok_or_else(|| MetaError::not_found("Relationship", key.to_string()))?;
        info!(data_source_id = %data_source_id, key = %key, "Relationship deleted");
        Ok(removed)
    }

    /// All edges of a data source in key order.
    pub async fn relationships(&self, data_source_id: &str) -> Vec<TableRelationship> {
        let graphs = self.graphs.read().await;
        graphs
            .get(data_source_id)
            .map(|graph| graph.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Edges with the table at either end.
    pub async fn relationships_for_table(
        &self,
        data_source_id: &str,
        table: &str,
    ) -> Vec<TableRelationship> {
        let graphs = self.graphs.read().await;
        graphs
            .get(data_source_id)
            .map(|graph| {
                graph
                    .values()
                    .filter(|edge| edge.key.touches(table))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Edges touching `table`, best `recommendation_score` first.
    pub async fn recommend(
        &self,
        data_source_id: &str,
        table: &str,
        limit: usize,
    ) -> Vec<TableRelationship> {
        let mut edges = self.relationships_for_table(data_source_id, table).await;
        edges.sort_by(|a, b| {
            b.recommendation_score()
                .partial_cmp(&a.recommendation_score())
                .unwrap_or(Ordering::Equal)
        });
        edges.truncate(limit);
        edges
    }
}

fn require_data_source(data_source_id: &str) -> MetaResult<()> {
    if data_source_id.is_empty() {
        return Err(MetaError::validation("Data source ID cannot be empty"));
    }
    Ok(())
}

/// Type of an observed edge, if both endpoints exist in the snapshot.
fn relation_type_in(schema: &SchemaInfo, key: &RelationshipKey) -> Option<RelationType> {
    let source = schema.table(&key.source_table)?;
    let target = schema.table(&key.target_table)?;
    let source_column = source.column(key.source_columns.first()?)?;
    let target_column = target.column(key.target_columns.first()?)?;
    Some(infer_relation_type(source_column, target_column))
}

fn merge(graph: &mut Graph, candidate: TableRelationship) {
    let Some(existing) = graph.get_mut(&candidate.key) else {
        graph.insert(candidate.key.clone(), candidate);
        return;
    };

    if candidate.frequency > 0 {
        existing.frequency += candidate.frequency;
        existing.updated_at = Utc::now();
    }
    existing.verified |= candidate.verified;
    if candidate.confidence > existing.confidence {
        existing.confidence = candidate.confidence;
        existing.relation_type = candidate.relation_type;
        existing.source = candidate.source;
        existing.junction = candidate.junction;
        existing.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(confidence: f64, source: RelationSource) -> TableRelationship {
        TableRelationship::new(
            RelationshipKey::single("orders", "customer_id", "customers", "id"),
            RelationType::ManyToOne,
            source,
            confidence,
        )
    }

    #[test]
    fn test_merge_keeps_higher_confidence() {
        let mut graph = Graph::new();
        merge(&mut graph, edge(0.7, RelationSource::Learning).with_frequency(1));
        merge(&mut graph, edge(1.0, RelationSource::Metadata));
        merge(&mut graph, edge(0.85, RelationSource::Inference));

        assert_eq!(graph.len(), 1);
        let merged = graph.values().next().unwrap();
        assert_eq!(merged.confidence, 1.0);
        assert_eq!(merged.source, RelationSource::Metadata);
        assert_eq!(merged.frequency, 1);
    }

    #[test]
    fn test_merge_accumulates_frequency() {
        let mut graph = Graph::new();
        for _ in 0..3 {
            merge(&mut graph, edge(0.8, RelationSource::Learning).with_frequency(1));
        }
        assert_eq!(graph.values().next().unwrap().frequency, 3);
    }

    #[tokio::test]
    async fn test_feedback_overwrites_and_counts() {
        let engine = RelationshipEngine::new();
        engine
            .upsert("ds", edge(0.75, RelationSource::Inference).with_frequency(4))
            .await
            .unwrap();

        let key = RelationshipKey::single("orders", "customer_id", "customers", "id");
        let confirmed = engine
            .record_feedback("ds", key.clone(), RelationType::OneToMany)
            .await
            .unwrap();
        assert_eq!(confirmed.confidence, 1.0);
        assert!(confirmed.verified);
        assert_eq!(confirmed.source, RelationSource::UserFeedback);
        assert_eq!(confirmed.relation_type, RelationType::OneToMany);
        assert_eq!(confirmed.frequency, 5);

        let all = engine.relationships("ds").await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].source, RelationSource::UserFeedback);
    }

    #[tokio::test]
    async fn test_upsert_rejects_malformed_edge() {
        let engine = RelationshipEngine::new();
        let bad = TableRelationship::new(
            RelationshipKey::new("a", vec!["x".into(), "y".into()], "b", vec!["z".into()]),
            RelationType::ManyToOne,
            RelationSource::Inference,
            0.9,
        );
        assert!(matches!(
            engine.upsert("ds", bad).await,
            Err(MetaError::Validation { .. })
        ));
        assert!(engine.relationships("ds").await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_explicit() {
        let engine = RelationshipEngine::new();
        engine
            .upsert("ds", edge(0.9, RelationSource::Inference))
            .await
            .unwrap();
        let key = RelationshipKey::single("orders", "customer_id", "customers", "id");
        engine.delete("ds", &key).await.unwrap();
        assert!(engine.relationships("ds").await.is_empty());
        assert!(matches!(
            engine.delete("ds", &key).await,
            Err(MetaError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_data_sources_are_isolated() {
        let engine = RelationshipEngine::new();
        engine
            .upsert("a", edge(0.9, RelationSource::Inference))
            .await
            .unwrap();
        assert!(engine.relationships("b").await.is_empty());
        assert_eq!(engine.relationships_for_table("a", "CUSTOMERS").await.len(), 1);
    }
}
