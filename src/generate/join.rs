//! FROM clause synthesis over the relationship graph.

use crate::models::{SchemaInfo, TableInfo, TableRelationship};
use std::cmp::Ordering;

/// Rendered FROM clause, without the `FROM` keyword.
#[derive(Debug, Clone, Default)]
pub struct JoinPlan {
    pub sql: String,
    /// Number of tables connected through an edge
    pub joined: usize,
    pub explanations: Vec<String>,
}

/// A usable edge between an anchored table and the next one.
struct Link<'a> {
    edge: &'a TableRelationship,
    /// Whether the new table is the edge's source
    new_is_source: bool,
}

fn same(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Real column name in `table`, if the edge's column still exists.
fn column_name<'a>(table: &'a TableInfo, column: &str) -> Option<&'a str> {
    table.column(column).map(|c| c.name.as_str())
}

fn equalities(
    left: &TableInfo,
    left_columns: &[String],
    right: &TableInfo,
    right_columns: &[String],
) -> Option<String> {
    if left_columns.is_empty() || left_columns.len() != right_columns.len() {
        return None;
    }
    let parts = left_columns
        .iter()
        .zip(right_columns)
        .map(|(l, r)| {
            Some(format!(
                "{}.{} = {}.{}",
                left.name,
                column_name(left, l)?,
                right.name,
                column_name(right, r)?
            ))
        })
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join(" AND "))
}

/// Join `tables[1..]` onto `tables[0]`.
///
/// Each table joins on the highest-confidence edge linking it to any table
/// already in the clause. A table with no usable edge is cross joined.
pub fn synthesize(
    tables: &[&TableInfo],
    relationships: &[TableRelationship],
    schema: &SchemaInfo,
) -> JoinPlan {
    let mut plan = JoinPlan::default();
    let Some(first) = tables.first() else {
        return plan;
    };
    plan.sql = first.name.clone();
    let mut anchored: Vec<&TableInfo> = vec![*first];

    for &table in &tables[1..] {
        match join_one(table, &anchored, relationships, schema) {
            Some((sql, explanation)) => {
                plan.sql.push_str(&sql);
                plan.joined += 1;
                plan.explanations.push(explanation);
            }
            None => {
                plan.sql.push_str(&format!(" CROSS JOIN {}", table.name));
                plan.explanations.push(format!(
                    "No relationship links {} to the other tables; using CROSS JOIN",
                    table.name
                ));
            }
        }
        anchored.push(table);
    }
    plan
}

fn join_one(
    table: &TableInfo,
    anchored: &[&TableInfo],
    relationships: &[TableRelationship],
    schema: &SchemaInfo,
) -> Option<(String, String)> {
    let mut links: Vec<Link<'_>> = relationships
        .iter()
        .filter_map(|edge| {
            let key = &edge.key;
            let anchored_has = |name: &str| anchored.iter().any(|a| same(&a.name, name));
            if same(&key.source_table, &table.name) && anchored_has(&key.target_table) {
                Some(Link { edge, new_is_source: true })
            } else if same(&key.target_table, &table.name) && anchored_has(&key.source_table) {
                Some(Link { edge, new_is_source: false })
            } else {
                None
            }
        })
        .collect();
    // Stable: earlier edges win ties
    links.sort_by(|a, b| {
        b.edge
            .confidence
            .partial_cmp(&a.edge.confidence)
            .unwrap_or(Ordering::Equal)
    });

    links
        .iter()
        .find_map(|link| render_link(table, anchored, link, schema))
}

fn render_link(
    table: &TableInfo,
    anchored: &[&TableInfo],
    link: &Link<'_>,
    schema: &SchemaInfo,
) -> Option<(String, String)> {
    let key = &link.edge.key;
    let other_name = if link.new_is_source {
        &key.target_table
    } else {
        &key.source_table
    };
    let other = anchored.iter().find(|a| same(&a.name, other_name))?;
    let (source, target) = if link.new_is_source {
        (table, *other)
    } else {
        (*other, table)
    };

    if let Some(junction) = &link.edge.junction {
        return render_junction(table, source, target, link, junction, anchored, schema);
    }

    let on = equalities(source, &key.source_columns, target, &key.target_columns)?;
    Some((
        format!(" JOIN {} ON {}", table.name, on),
        format!(
            "Joined {} using {} relationship {} (confidence {:.2})",
            table.name, link.edge.source, key, link.edge.confidence
        ),
    ))
}

/// `source -> junction -> target`; the junction table is joined first unless
/// it is already part of the clause.
fn render_junction(
    table: &TableInfo,
    source: &TableInfo,
    target: &TableInfo,
    link: &Link<'_>,
    junction: &crate::models::Junction,
    anchored: &[&TableInfo],
    schema: &SchemaInfo,
) -> Option<(String, String)> {
    let key = &link.edge.key;
    let via = schema.table(&junction.table)?;
    let source_side = equalities(
        source,
        &key.source_columns,
        via,
        std::slice::from_ref(&junction.source_column),
    )?;
    let target_side = equalities(
        via,
        std::slice::from_ref(&junction.target_column),
        target,
        &key.target_columns,
    )?;

    // The anchored side attaches to the junction first
    let (first_on, second_on) = if link.new_is_source {
        (target_side, source_side)
    } else {
        (source_side, target_side)
    };
    let via_anchored = anchored.iter().any(|a| same(&a.name, &via.name));
    let sql = if via_anchored {
        format!(" JOIN {} ON {}", table.name, second_on)
    } else {
        format!(
            " JOIN {} ON {} JOIN {} ON {}",
            via.name, first_on, table.name, second_on
        )
    };
    Some((
        sql,
        format!(
            "Joined {} through junction table {} (confidence {:.2})",
            table.name, via.name, link.edge.confidence
        ),
    ))
}
