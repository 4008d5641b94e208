//! Resolve entity text against a schema snapshot.
//!
//! Exact case-insensitive matches win; otherwise the first name that contains
//! the text, or is contained by it, is taken.

use crate::models::{ColumnInfo, SchemaInfo, TableInfo};

/// A column and the table it was found in.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedColumn<'a> {
    pub table: &'a TableInfo,
    pub column: &'a ColumnInfo,
}

impl ResolvedColumn<'_> {
    /// `table.column`
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.table.name, self.column.name)
    }
}

fn contains_either(name: &str, text: &str) -> bool {
    let name = name.to_lowercase();
    let text = text.to_lowercase();
    name.contains(&text) || text.contains(&name)
}

/// Find the table named by `text`.
pub fn resolve_table<'a>(schema: &'a SchemaInfo, text: &str) -> Option<&'a TableInfo> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    schema.table(text).or_else(|| {
        schema
            .tables
            .iter()
            .find(|t| contains_either(&t.name, text))
    })
}

/// Find a column among the already resolved tables.
///
/// `table.column` must name one of `tables`; a bare name is searched across all of them.
pub fn resolve_column<'a>(tables: &[&'a TableInfo], text: &str) -> Option<ResolvedColumn<'a>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some((table_text, column_text)) = text.rsplit_once('.') {
        let table = tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(table_text.trim()))?;
        return find_column(std::slice::from_ref(table), column_text.trim());
    }
    find_column(tables, text)
}

fn find_column<'a>(tables: &[&'a TableInfo], text: &str) -> Option<ResolvedColumn<'a>> {
    if text.is_empty() {
        return None;
    }
    let exact = tables.iter().copied().find_map(|table| {
        table
            .column(text)
            .map(|column| ResolvedColumn { table, column })
    });
    exact.or_else(|| {
        tables.iter().copied().find_map(|table| {
            table
                .columns
                .iter()
                .find(|c| contains_either(&c.name, text))
                .map(|column| ResolvedColumn { table, column })
        })
    })
}
