//! Entities and intent to parameterized SQL.

use crate::generate::condition::{WhereClause, build_where};
use crate::generate::join::{JoinPlan, synthesize};
use crate::generate::resolve::{resolve_column, resolve_table};
use crate::models::{
    EntityTag, EntityType, LimitType, QueryIntent, QueryType, SchemaInfo, SqlGenerationResult,
    TableInfo, TableRelationship,
};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Confidence added once when at least one table was joined through an edge.
pub const JOIN_BONUS: f64 = 0.1;

// Sort text that matches no resolved column is emitted raw, but only when it
// is a plain or `table.column` identifier; other text is skipped with an explanation
static RAW_SORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
        .expect("valid sort identifier regex")
});

/// Stateless SQL generator. Safe to share across threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlGenerator;

impl SqlGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Generate SQL. Never fails: problems are reported through
    /// `explanations` and a confidence of `0.0`.
    pub fn generate(
        &self,
        entities: &[EntityTag],
        intent: &QueryIntent,
        schema: &SchemaInfo,
        relationships: &[TableRelationship],
    ) -> SqlGenerationResult {
        let mut explanations = Vec::new();

        let tables = resolve_tables(schema, entities, &mut explanations);
        if tables.is_empty() {
            explanations.push(format!(
                "No table could be resolved in schema {}",
                schema.name
            ));
            return SqlGenerationResult {
                explanations,
                ..SqlGenerationResult::default()
            };
        }

        let condition = build_where(entities, &tables);
        let columns = projection(entities, &tables, &condition, &mut explanations);
        let from = synthesize(&tables, relationships, schema);

        let select = select_list(intent.query_type, &columns, &mut explanations);
        let filter = where_sql(&condition);
        let mut sql = format!("SELECT {} FROM {}{}", select, from.sql, filter);

        if intent.query_type == QueryType::Group && columns.len() >= 2 {
            sql.push_str(&format!(" GROUP BY {}", columns[0]));
        }
        if let Some(order_by) = order_by(intent, &tables, &mut explanations) {
            sql.push_str(&format!(" ORDER BY {}", order_by));
        }
        if let Some(limit) = &intent.limit {
            match (limit.limit_type, limit.count) {
                (LimitType::TopN, Some(n)) => sql.push_str(&format!(" LIMIT {}", n)),
                (LimitType::TopN, None) => {
                    explanations.push("Top-N limit without a count was ignored".to_string())
                }
                (LimitType::All, _) => {}
            }
        }

        let mut alternatives = Vec::new();
        if intent.query_type.is_aggregate() {
            let listing = if columns.is_empty() {
                "*".to_string()
            } else {
                columns.join(", ")
            };
            alternatives.push(format!("SELECT {} FROM {}{}", listing, from.sql, filter));
        }

        let confidence = confidence(entities, intent, &from);
        explanations.extend(condition.explanations.iter().cloned());
        explanations.extend(from.explanations.iter().cloned());

        debug!(sql = %sql, confidence = confidence, "Generated SQL");
        SqlGenerationResult {
            sql,
            parameters: condition
                .parameters
                .into_iter()
                .enumerate()
                .map(|(i, p)| (i + 1, p))
                .collect(),
            confidence,
            explanations,
            alternatives,
        }
    }
}

fn resolve_tables<'a>(
    schema: &'a SchemaInfo,
    entities: &[EntityTag],
    explanations: &mut Vec<String>,
) -> Vec<&'a TableInfo> {
    let mut tables: Vec<&TableInfo> = Vec::new();
    for entity in entities.iter().filter(|e| e.entity_type == EntityType::Table) {
        match resolve_table(schema, &entity.text) {
            Some(table) if tables.iter().any(|t| t.name == table.name) => {}
            Some(table) => {
                explanations.push(format!("Resolved table '{}' to {}", entity.text, table.name));
                tables.push(table);
            }
            None => explanations.push(format!("Table '{}' not found", entity.text)),
        }
    }
    tables
}

/// Qualified names of COLUMN entities that are not part of a condition.
fn projection(
    entities: &[EntityTag],
    tables: &[&TableInfo],
    condition: &WhereClause,
    explanations: &mut Vec<String>,
) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for (i, entity) in entities.iter().enumerate() {
        if entity.entity_type != EntityType::Column || condition.condition_columns.contains(&i) {
            continue;
        }
        match resolve_column(tables, &entity.text) {
            Some(col) => {
                let qualified = col.qualified();
                if !columns.contains(&qualified) {
                    columns.push(qualified);
                }
            }
            None => explanations.push(format!("Column '{}' not found", entity.text)),
        }
    }
    columns
}

fn select_list(query_type: QueryType, columns: &[String], explanations: &mut Vec<String>) -> String {
    match query_type.aggregate_function() {
        Some(func) => match columns.first() {
            Some(first) => format!("{}({})", func, first),
            None if query_type == QueryType::Count => "COUNT(*)".to_string(),
            None => {
                explanations.push(format!("{} needs a column; listing rows instead", func));
                "*".to_string()
            }
        },
        None if columns.is_empty() => "*".to_string(),
        None => columns.join(", "),
    }
}

fn where_sql(condition: &WhereClause) -> String {
    if condition.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", condition.sql)
    }
}

fn order_by(
    intent: &QueryIntent,
    tables: &[&TableInfo],
    explanations: &mut Vec<String>,
) -> Option<String> {
    let items: Vec<String> = intent
        .sort_requirements
        .iter()
        .filter_map(|sort| {
            let column = match resolve_column(tables, &sort.column) {
                Some(col) => col.qualified(),
                None if RAW_SORT_RE.is_match(sort.column.trim()) => sort.column.trim().to_string(),
                None => {
                    explanations.push(format!("Sort column '{}' was ignored", sort.column));
                    return None;
                }
            };
            Some(format!("{} {}", column, sort.direction.as_sql()))
        })
        .collect();
    (!items.is_empty()).then(|| items.join(", "))
}

/// Mean of entity and intent confidences, plus `JOIN_BONUS` if anything was joined.
fn confidence(entities: &[EntityTag], intent: &QueryIntent, from: &JoinPlan) -> f64 {
    let clamp = |c: f64| if c.is_nan() { 0.0 } else { c.clamp(0.0, 1.0) };
    let scores: Vec<f64> = entities
        .iter()
        .map(|e| clamp(e.confidence))
        .chain(std::iter::once(clamp(intent.confidence)))
        .collect();
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    let bonus = if from.joined > 0 { JOIN_BONUS } else { 0.0 };
    clamp(mean + bonus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColumnInfo, LimitRequirement, SortDirection, SortRequirement, TableType};

    fn schema() -> SchemaInfo {
        SchemaInfo::new("public", "ds").with_table(
            TableInfo::new("orders", TableType::Table)
                .with_column(ColumnInfo::new("id", "integer", false))
                .with_column(ColumnInfo::new("status", "text", false))
                .with_column(ColumnInfo::new("total", "numeric", false)),
        )
    }

    fn tag(t: EntityType, text: &str) -> EntityTag {
        EntityTag::new(t, text, 0.8)
    }

    #[test]
    fn test_group_by_needs_two_columns() {
        let generator = SqlGenerator::new();
        let intent = QueryIntent::new(QueryType::Group, 0.8);
        let two = generator.generate(
            &[
                tag(EntityType::Table, "orders"),
                tag(EntityType::Column, "status"),
                tag(EntityType::Column, "total"),
            ],
            &intent,
            &schema(),
            &[],
        );
        assert_eq!(
            two.sql,
            "SELECT orders.status, orders.total FROM orders GROUP BY orders.status"
        );

        let one = generator.generate(
            &[tag(EntityType::Table, "orders"), tag(EntityType::Column, "status")],
            &intent,
            &schema(),
            &[],
        );
        assert!(!one.sql.contains("GROUP BY"));
    }

    #[test]
    fn test_order_by_and_limit() {
        let intent = QueryIntent::new(QueryType::Select, 0.8)
            .with_sort(SortRequirement::new("total", SortDirection::Desc))
            .with_sort(SortRequirement::new("created", SortDirection::Asc))
            .with_sort(SortRequirement::new("x; DROP", SortDirection::Asc))
            .with_limit(LimitRequirement::top(5));
        let result = SqlGenerator::new().generate(
            &[tag(EntityType::Table, "orders")],
            &intent,
            &schema(),
            &[],
        );
        assert_eq!(
            result.sql,
            "SELECT * FROM orders ORDER BY orders.total DESC, created ASC LIMIT 5"
        );
        assert!(result.explanations.iter().any(|e| e.contains("x; DROP")));
    }

    #[test]
    fn test_limit_all_is_not_emitted() {
        let intent = QueryIntent::new(QueryType::Select, 0.8).with_limit(LimitRequirement::all());
        let result = SqlGenerator::new().generate(
            &[tag(EntityType::Table, "orders")],
            &intent,
            &schema(),
            &[],
        );
        assert_eq!(result.sql, "SELECT * FROM orders");
    }

    #[test]
    fn test_no_table_gives_zero_confidence() {
        let result = SqlGenerator::new().generate(
            &[tag(EntityType::Table, "invoices"), tag(EntityType::Column, "id")],
            &QueryIntent::new(QueryType::Select, 0.9),
            &schema(),
            &[],
        );
        assert!(result.sql.is_empty());
        assert_eq!(result.confidence, 0.0);
        assert!(!result.is_executable());
        assert!(result.explanations.len() >= 2);
    }

    #[test]
    fn test_aggregate_offers_row_listing() {
        let result = SqlGenerator::new().generate(
            &[
                tag(EntityType::Table, "orders"),
                tag(EntityType::Column, "total"),
                tag(EntityType::Column, "status"),
                tag(EntityType::String, "paid"),
            ],
            &QueryIntent::new(QueryType::Sum, 0.8),
            &schema(),
            &[],
        );
        assert_eq!(
            result.sql,
            "SELECT SUM(orders.total) FROM orders WHERE orders.status = ?"
        );
        assert_eq!(
            result.alternatives,
            vec!["SELECT orders.total FROM orders WHERE orders.status = ?"]
        );
        assert_eq!(result.parameters.len(), 1);
        assert!((result.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_count_without_column() {
        let result = SqlGenerator::new().generate(
            &[tag(EntityType::Table, "orders")],
            &QueryIntent::new(QueryType::Count, 0.8),
            &schema(),
            &[],
        );
        assert_eq!(result.sql, "SELECT COUNT(*) FROM orders");
        assert_eq!(result.alternatives, vec!["SELECT * FROM orders"]);
    }
}
