//! Natural-language operator and connector vocabulary.

/// How many values an operator takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// `IS NULL`, `IS NOT NULL`
    None,
    One,
    /// `IN`, `NOT IN`
    List,
}

const OPERATORS: &[(&str, &str)] = &[
    ("等于", "="),
    ("是", "="),
    ("=", "="),
    ("==", "="),
    ("equals", "="),
    ("不等于", "!="),
    ("不是", "!="),
    ("!=", "!="),
    ("<>", "!="),
    ("大于", ">"),
    (">", ">"),
    ("greater than", ">"),
    ("小于", "<"),
    ("<", "<"),
    ("less than", "<"),
    ("大于等于", ">="),
    (">=", ">="),
    ("小于等于", "<="),
    ("<=", "<="),
    ("包含", "LIKE"),
    ("like", "LIKE"),
    ("不包含", "NOT LIKE"),
    ("not like", "NOT LIKE"),
    ("在", "IN"),
    ("in", "IN"),
    ("不在", "NOT IN"),
    ("not in", "NOT IN"),
    ("为空", "IS NULL"),
    ("is null", "IS NULL"),
    ("不为空", "IS NOT NULL"),
    ("is not null", "IS NOT NULL"),
];

const CONNECTORS: &[(&str, &str)] = &[
    ("and", "AND"),
    ("并且", "AND"),
    ("且", "AND"),
    ("和", "AND"),
    ("or", "OR"),
    ("或者", "OR"),
    ("或", "OR"),
];

/// SQL operator for operator text.
///
/// Unknown text passes through trimmed only when it is made of ASCII letters,
/// spaces and `<>=!~`; anything else yields `None` and the predicate is dropped.
pub fn map_operator(text: &str) -> Option<String> {
    let trimmed = text.trim();
    let lower = trimmed.to_lowercase();
    if let Some((_, sql)) = OPERATORS.iter().find(|(nl, _)| *nl == lower) {
        return Some((*sql).to_string());
    }
    is_operator_like(trimmed).then(|| trimmed.to_string())
}

/// Operator text allowed to reach SQL unchanged: letters, spaces and comparison symbols.
fn is_operator_like(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_alphabetic() || c == ' ' || "<>=!~".contains(c))
}

/// `AND` or `OR` for connector text.
pub fn map_connector(text: &str) -> Option<&'static str> {
    let lower = text.trim().to_lowercase();
    CONNECTORS
        .iter()
        .find(|(nl, _)| *nl == lower)
        .map(|(_, sql)| *sql)
}

pub fn arity(operator: &str) -> Arity {
    match operator.to_uppercase().as_str() {
        "IS NULL" | "IS NOT NULL" => Arity::None,
        "IN" | "NOT IN" => Arity::List,
        _ => Arity::One,
    }
}

/// Whether values of this operator are wrapped in `%` wildcards.
pub fn is_pattern(operator: &str) -> bool {
    matches!(operator.to_uppercase().as_str(), "LIKE" | "NOT LIKE")
}
