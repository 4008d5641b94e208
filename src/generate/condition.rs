//! WHERE clause assembly.
//!
//! Entities are walked in order. A COLUMN directly followed by an OPERATOR or
//! a literal opens a predicate; literals are bound as `?` placeholders and never
//! written into the SQL text.

use crate::generate::operators::{Arity, arity, is_pattern, map_connector, map_operator};
use crate::generate::resolve::resolve_column;
use crate::models::{EntityTag, EntityType, QueryParam, TableInfo};
use std::collections::HashSet;

/// Predicates joined by connectors, without the `WHERE` keyword.
#[derive(Debug, Clone, Default)]
pub struct WhereClause {
    pub sql: String,
    /// In placeholder order
    pub parameters: Vec<QueryParam>,
    /// Indices of COLUMN entities consumed by predicates
    pub condition_columns: HashSet<usize>,
    pub explanations: Vec<String>,
}

impl WhereClause {
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

struct Pending {
    column_text: String,
    column: Option<String>,
    operator: Option<String>,
    values: Vec<QueryParam>,
}

impl Pending {
    fn accepts_value(&self) -> bool {
        match self.operator.as_deref().map(arity) {
            None => true,
            Some(Arity::One) => self.values.is_empty(),
            Some(Arity::List) => true,
            Some(Arity::None) => false,
        }
    }

    /// Predicate text with placeholders, if complete.
    fn render(&self) -> Result<String, String> {
        let Some(column) = &self.column else {
            return Err(format!(
                "Dropped condition: column '{}' not found",
                self.column_text
            ));
        };
        let Some(operator) = &self.operator else {
            return Err(format!("Dropped condition on {}: no operator", column));
        };
        match (arity(operator), self.values.len()) {
            (Arity::None, 0) => Ok(format!("{} {}", column, operator)),
            (Arity::One, 1) => Ok(format!("{} {} ?", column, operator)),
            (Arity::List, n) if n > 0 => Ok(format!(
                "{} {} ({})",
                column,
                operator,
                vec!["?"; n].join(", ")
            )),
            _ => Err(format!(
                "Dropped incomplete condition: {} {}",
                column, operator
            )),
        }
    }
}

#[derive(Default)]
struct Builder {
    clause: WhereClause,
    pending: Option<Pending>,
    connector: Option<&'static str>,
}

impl Builder {
    fn flush(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        match pending.render() {
            Ok(predicate) => {
                if !self.clause.sql.is_empty() {
                    let connector = self.connector.take().unwrap_or("AND");
                    self.clause.sql.push(' ');
                    self.clause.sql.push_str(connector);
                    self.clause.sql.push(' ');
                }
                self.connector = None;
                self.clause.sql.push_str(&predicate);
                self.clause.parameters.extend(pending.values);
            }
            Err(explanation) => self.clause.explanations.push(explanation),
        }
    }

    fn explain(&mut self, explanation: String) {
        self.clause.explanations.push(explanation);
    }
}

fn opens_predicate(next: Option<&EntityTag>) -> bool {
    next.is_some_and(|e| e.entity_type == EntityType::Operator || e.entity_type.is_literal())
}

fn literal_param(tag: &EntityTag, pattern: bool) -> QueryParam {
    if pattern {
        return QueryParam::String(format!("%{}%", tag.text));
    }
    match tag.entity_type {
        EntityType::Number => match tag.text.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => QueryParam::Float(n),
            _ => QueryParam::String(tag.text.clone()),
        },
        EntityType::Boolean => match QueryParam::from_literal(&tag.text) {
            b @ QueryParam::Bool(_) => b,
            _ => QueryParam::String(tag.text.clone()),
        },
        EntityType::String | EntityType::Date => QueryParam::String(tag.text.clone()),
        _ => QueryParam::from_literal(&tag.text),
    }
}

/// Build the WHERE predicates from `entities` against the resolved tables.
pub fn build_where(entities: &[EntityTag], tables: &[&TableInfo]) -> WhereClause {
    let mut b = Builder::default();

    for (i, entity) in entities.iter().enumerate() {
        match entity.entity_type {
            EntityType::Column => {
                b.flush();
                if opens_predicate(entities.get(i + 1)) {
                    b.clause.condition_columns.insert(i);
                    b.pending = Some(Pending {
                        column_text: entity.text.clone(),
                        column: resolve_column(tables, &entity.text).map(|c| c.qualified()),
                        operator: None,
                        values: Vec::new(),
                    });
                }
            }
            EntityType::Operator => {
                let Some(pending) = b.pending.as_mut().filter(|p| p.operator.is_none() && p.values.is_empty()) else {
                    b.flush();
                    b.explain(format!("Ignored operator '{}' without a column", entity.text));
                    continue;
                };
                match map_operator(&entity.text) {
                    Some(op) => {
                        let unary = arity(&op) == Arity::None;
                        pending.operator = Some(op);
                        if unary {
                            b.flush();
                        }
                    }
                    None => {
                        b.pending = None;
                        b.explain(format!("Dropped condition: unknown operator '{}'", entity.text));
                    }
                }
            }
            EntityType::Condition => {
                b.flush();
                match map_connector(&entity.text) {
                    Some(connector) if !b.clause.sql.is_empty() => b.connector = Some(connector),
                    Some(_) => {}
                    None => b.explain(format!("Ignored condition '{}'", entity.text)),
                }
            }
            t if t.is_literal() => {
                let Some(pending) = b.pending.as_mut().filter(|p| p.accepts_value()) else {
                    b.flush();
                    b.explain("Ignored a value without a column".to_string());
                    continue;
                };
                let operator = pending.operator.get_or_insert_with(|| "=".to_string());
                let param = literal_param(entity, is_pattern(operator));
                let single = arity(operator) == Arity::One;
                pending.values.push(param);
                if single {
                    b.flush();
                }
            }
            _ => b.flush(),
        }
    }
    b.flush();
    b.clause
}
