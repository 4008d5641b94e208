//! Column name and type similarity.

/// Weight of the name signal in the combined score.
pub const NAME_WEIGHT: f64 = 0.4;
/// Weight of the content signal in the combined score.
pub const CONTENT_WEIGHT: f64 = 0.6;
/// Minimum combined score for a similarity edge.
pub const SIMILARITY_THRESHOLD: f64 = 0.7;

/// Content signal for columns of compatible types when no data is sampled.
const COMPATIBLE_CONTENT_SCORE: f64 = 0.5;

// Scores are sums of weighted products; compare with a little slack
const SCORE_EPSILON: f64 = 1e-9;

/// Lowercase and strip `fk_`/`pk_` prefixes and a trailing `_id`.
pub fn normalize_column_name(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    let stripped = lower
        .strip_prefix("fk_")
        .or_else(|| lower.strip_prefix("pk_"))
        .unwrap_or(&lower);
    let stripped = stripped.strip_suffix("_id").unwrap_or(stripped);
    stripped.to_string()
}

/// Edit distance over chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    if b.is_empty() {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != *cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Similarity of two column names after normalization, in `[0, 1]`.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let a = normalize_column_name(a);
    let b = normalize_column_name(b);
    if a == b {
        return 1.0;
    }
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 0.0;
    }
    1.0 - levenshtein(&a, &b) as f64 / max_len as f64
}

/// Coarse grouping of engine data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFamily {
    Integer,
    Decimal,
    Text,
    Temporal,
    Boolean,
    Binary,
    Uuid,
    Other,
}

const INTEGER_TYPES: &[&str] = &[
    "int",
    "integer",
    "int2",
    "int4",
    "int8",
    "tinyint",
    "smallint",
    "mediumint",
    "bigint",
    "serial",
    "smallserial",
    "bigserial",
    "serial4",
    "serial8",
];

/// Classify a raw column type such as `varchar(255)` or `BIGINT UNSIGNED`.
pub fn type_family(data_type: &str) -> TypeFamily {
    let t = data_type.to_lowercase();
    let base = t.split(['(', ' ']).next().unwrap_or("");

    if base == "uuid" || base == "uniqueidentifier" {
        TypeFamily::Uuid
    } else if base.starts_with("bool") || base == "bit" {
        TypeFamily::Boolean
    } else if INTEGER_TYPES.contains(&base) {
        TypeFamily::Integer
    } else if ["numeric", "decimal", "real", "double", "float", "money"]
        .iter()
        .any(|p| base.starts_with(p))
    {
        TypeFamily::Decimal
    } else if ["char", "varchar", "text", "string", "clob", "nchar", "nvarchar", "citext", "enum"]
        .iter()
        .any(|p| base.contains(p))
    {
        TypeFamily::Text
    } else if base.starts_with("date") || base.starts_with("time") || base == "year" {
        TypeFamily::Temporal
    } else if ["blob", "bytea", "binary", "varbinary"]
        .iter()
        .any(|p| base.contains(p))
    {
        TypeFamily::Binary
    } else {
        TypeFamily::Other
    }
}

/// Content signal without data sampling: compatible type families only.
pub fn content_similarity(a_type: &str, b_type: &str) -> f64 {
    let a = type_family(a_type);
    if a != TypeFamily::Other && a == type_family(b_type) {
        COMPATIBLE_CONTENT_SCORE
    } else {
        0.0
    }
}

/// `NAME_WEIGHT * name + CONTENT_WEIGHT * content`.
pub fn combined_score(name: f64, content: f64) -> f64 {
    NAME_WEIGHT * name + CONTENT_WEIGHT * content
}

/// Whether a combined score clears `SIMILARITY_THRESHOLD`.
pub fn passes_threshold(score: f64) -> bool {
    score + SCORE_EPSILON >= SIMILARITY_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_affixes() {
        assert_eq!(normalize_column_name("fk_customer_id"), "customer");
        assert_eq!(normalize_column_name("PK_Order"), "order");
        assert_eq!(normalize_column_name("customer_id"), "customer");
        assert_eq!(normalize_column_name("email"), "email");
        assert_eq!(normalize_column_name("id"), "id");
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }

    #[test]
    fn test_name_similarity() {
        assert_eq!(name_similarity("email", "EMAIL"), 1.0);
        assert_eq!(name_similarity("fk_user_id", "user"), 1.0);
        let partial = name_similarity("customer", "customers");
        assert!(partial > 0.8 && partial < 1.0);
        assert_eq!(name_similarity("abc", "xyz"), 0.0);
    }

    #[test]
    fn test_type_families() {
        assert_eq!(type_family("BIGINT UNSIGNED"), TypeFamily::Integer);
        assert_eq!(type_family("int4"), TypeFamily::Integer);
        assert_eq!(type_family("varchar(255)"), TypeFamily::Text);
        assert_eq!(type_family("character varying"), TypeFamily::Text);
        assert_eq!(type_family("numeric(10,2)"), TypeFamily::Decimal);
        assert_eq!(type_family("timestamp with time zone"), TypeFamily::Temporal);
        assert_eq!(type_family("boolean"), TypeFamily::Boolean);
        assert_eq!(type_family("bytea"), TypeFamily::Binary);
        assert_eq!(type_family("geometry"), TypeFamily::Other);
    }

    #[test]
    fn test_exact_name_with_compatible_type_reaches_threshold() {
        let score = combined_score(
            name_similarity("email", "email"),
            content_similarity("varchar(100)", "text"),
        );
        assert!(passes_threshold(score));

        let incompatible = combined_score(1.0, content_similarity("integer", "text"));
        assert!(!passes_threshold(incompatible));

        let near = combined_score(name_similarity("email", "emails"), 0.5);
        assert!(!passes_threshold(near));
    }
}
