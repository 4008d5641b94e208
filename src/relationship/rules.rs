//! Schema-level relationship rules.
//!
//! Each rule is a pure function over one snapshot. Candidates may share keys;
//! the engine merges them.

use crate::models::{
    ColumnInfo, Junction, RelationSource, RelationType, RelationshipKey, SchemaInfo, TableInfo,
    TableRelationship,
};
use crate::relationship::similarity::{
    combined_score, content_similarity, name_similarity, normalize_column_name, passes_threshold,
};
use inflector::Inflector;
use tracing::debug;

pub const FOREIGN_KEY_CONFIDENCE: f64 = 1.0;
pub const ID_SUFFIX_CONFIDENCE: f64 = 0.85;
pub const JUNCTION_CONFIDENCE: f64 = 0.8;
pub const PREFIX_CONFIDENCE: f64 = 0.75;

/// Columns shared by most tables that say nothing about how they relate.
const BOOKKEEPING_COLUMNS: &[&str] = &[
    "id",
    "created_at",
    "updated_at",
    "deleted_at",
    "created_by",
    "updated_by",
    "version",
];

/// Every candidate the schema supports, from all rules.
pub fn infer_all(schema: &SchemaInfo) -> Vec<TableRelationship> {
    let mut edges = from_foreign_keys(schema);
    edges.extend(from_name_similarity(schema));
    edges.extend(from_structure(schema));
    debug!(schema = %schema.name, candidates = edges.len(), "Inferred relationship candidates");
    edges
}

/// Declared foreign keys, child to parent.
pub fn from_foreign_keys(schema: &SchemaInfo) -> Vec<TableRelationship> {
    schema
        .tables
        .iter()
        .flat_map(|table| table.foreign_keys.iter())
        .filter(|fk| fk.validate().is_ok())
        .map(|fk| {
            let key = RelationshipKey::new(
                &fk.source_table,
                fk.source_columns(),
                &fk.target_table,
                fk.target_columns(),
            );
            TableRelationship::new(
                key,
                RelationType::ManyToOne,
                RelationSource::Metadata,
                FOREIGN_KEY_CONFIDENCE,
            )
        })
        .collect()
}

/// Column pairs across distinct tables whose combined name/type score clears the threshold.
pub fn from_name_similarity(schema: &SchemaInfo) -> Vec<TableRelationship> {
    let mut edges = Vec::new();
    for (i, a) in schema.tables.iter().enumerate() {
        for b in &schema.tables[i + 1..] {
            if a.name.eq_ignore_ascii_case(&b.name) {
                continue;
            }
            for ca in &a.columns {
                let normalized = normalize_column_name(&ca.name);
                if normalized.is_empty() || BOOKKEEPING_COLUMNS.contains(&normalized.as_str()) {
                    continue;
                }
                for cb in &b.columns {
                    let score = combined_score(
                        name_similarity(&ca.name, &cb.name),
                        content_similarity(&ca.data_type, &cb.data_type),
                    );
                    if !passes_threshold(score) {
                        continue;
                    }

                    // A key column is the target of the pair
                    let ((st, sc), (tt, tc)) = if ca.is_primary_key && !cb.is_primary_key {
                        ((b, cb), (a, ca))
                    } else {
                        ((a, ca), (b, cb))
                    };
                    edges.push(TableRelationship::new(
                        RelationshipKey::single(&st.name, &sc.name, &tt.name, &tc.name),
                        infer_relation_type(sc, tc),
                        RelationSource::Inference,
                        score.min(1.0),
                    ));
                }
            }
        }
    }
    edges
}

/// Naming-convention patterns: `<table>_id` columns, junction tables and
/// `<parent>_<child>` table names.
pub fn from_structure(schema: &SchemaInfo) -> Vec<TableRelationship> {
    let mut edges = Vec::new();
    let tables = &schema.tables;

    for table in tables {
        let references = id_references(table, tables);
        for (column, target) in &references {
            if let Some(target_id) = target.column("id") {
                edges.push(TableRelationship::new(
                    RelationshipKey::single(&table.name, &column.name, &target.name, &target_id.name),
                    RelationType::ManyToOne,
                    RelationSource::Inference,
                    ID_SUFFIX_CONFIDENCE,
                ));
            }
        }

        let id_columns = table
            .columns
            .iter()
            .filter(|c| is_id_suffixed(&c.name))
            .count();
        if id_columns >= 2 {
            edges.extend(junction_edges(table, &references));
        }
    }

    for parent in tables {
        for child in tables {
            if let Some(edge) = prefix_edge(parent, child) {
                edges.push(edge);
            }
        }
    }
    edges
}

/// Relation type from key flags of the two endpoint columns.
pub fn infer_relation_type(source: &ColumnInfo, target: &ColumnInfo) -> RelationType {
    match (source.is_primary_key, target.is_primary_key) {
        (true, true) => RelationType::OneToOne,
        (true, false) if looks_like_foreign_key(&target.name) => RelationType::OneToMany,
        (false, true) if looks_like_foreign_key(&source.name) => RelationType::ManyToOne,
        _ => RelationType::ManyToMany,
    }
}

fn looks_like_foreign_key(column: &str) -> bool {
    let lower = column.to_lowercase();
    lower.starts_with("fk_") || is_id_suffixed(&lower)
}

fn is_id_suffixed(column: &str) -> bool {
    let lower = column.to_lowercase();
    lower.len() > 3 && lower.ends_with("_id")
}

/// Whether `stem` names `table` in singular or plural form.
fn names_table(stem: &str, table: &str) -> bool {
    let table = table.to_lowercase();
    let stem = stem.to_lowercase();
    !stem.is_empty() && (table == stem || table.to_singular() == stem || stem.to_plural() == table)
}

/// `_id` columns of `table` paired with the other table they name.
fn id_references<'a>(
    table: &'a TableInfo,
    tables: &'a [TableInfo],
) -> Vec<(&'a ColumnInfo, &'a TableInfo)> {
    table
        .columns
        .iter()
        .filter(|c| is_id_suffixed(&c.name))
        .filter_map(|column| {
            let stem = normalize_column_name(&column.name);
            tables
                .iter()
                .find(|t| !t.name.eq_ignore_ascii_case(&table.name) && names_table(&stem, &t.name))
                .map(|target| (column, target))
        })
        .collect()
}

/// Many-to-many edges between every pair of tables a junction references.
fn junction_edges(
    junction: &TableInfo,
    references: &[(&ColumnInfo, &TableInfo)],
) -> Vec<TableRelationship> {
    let mut edges = Vec::new();
    for (i, (a_col, a_table)) in references.iter().enumerate() {
        for (b_col, b_table) in &references[i + 1..] {
            if a_table.name.eq_ignore_ascii_case(&b_table.name) {
                continue;
            }
            let (Some(a_id), Some(b_id)) = (a_table.column("id"), b_table.column("id")) else {
                continue;
            };
            edges.push(
                TableRelationship::new(
                    RelationshipKey::single(&a_table.name, &a_id.name, &b_table.name, &b_id.name),
                    RelationType::ManyToMany,
                    RelationSource::Inference,
                    JUNCTION_CONFIDENCE,
                )
                .with_junction(Junction {
                    table: junction.name.clone(),
                    source_column: a_col.name.clone(),
                    target_column: b_col.name.clone(),
                }),
            );
        }
    }
    edges
}

/// `orders` -> `order_items` style parent/child pair, if a join column exists.
fn prefix_edge(parent: &TableInfo, child: &TableInfo) -> Option<TableRelationship> {
    if parent.name.eq_ignore_ascii_case(&child.name) {
        return None;
    }
    let parent_lower = parent.name.to_lowercase();
    let singular = parent_lower.to_singular();
    let child_lower = child.name.to_lowercase();
    let prefixed = [&parent_lower, &singular]
        .iter()
        .any(|p| child_lower.starts_with(&format!("{}_", p)));
    if !prefixed {
        return None;
    }

    let (parent_col, child_col) = join_columns(parent, child, &parent_lower, &singular)?;
    Some(TableRelationship::new(
        RelationshipKey::single(&parent.name, &parent_col.name, &child.name, &child_col.name),
        RelationType::OneToMany,
        RelationSource::Inference,
        PREFIX_CONFIDENCE,
    ))
}

fn join_columns<'a>(
    parent: &'a TableInfo,
    child: &'a TableInfo,
    parent_lower: &str,
    singular: &str,
) -> Option<(&'a ColumnInfo, &'a ColumnInfo)> {
    if let Some(parent_id) = parent.column("id") {
        for candidate in [format!("{}_id", singular), format!("{}_id", parent_lower)] {
            if let Some(child_col) = child.column(&candidate) {
                return Some((parent_id, child_col));
            }
        }
    }

    // Fall back to the parent's key column repeated in the child
    parent
        .columns
        .iter()
        .filter(|c| c.is_primary_key && !c.name.eq_ignore_ascii_case("id"))
        .find_map(|pk| child.column(&pk.name).map(|child_col| (pk, child_col)))
}
