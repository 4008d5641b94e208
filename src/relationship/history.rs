//! Join mining over executed SQL text.
//!
//! This is a token-level heuristic, not a SQL parser. It recognizes
//! `FROM`/`JOIN` table references with optional aliases and qualified
//! equalities `a.x = b.y` in `ON` and `WHERE` clauses. Anything it cannot
//! follow (subqueries, CTE names, functions) is skipped rather than guessed.

use crate::models::RelationshipKey;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Confidence of an equality observed in a join condition.
pub const JOIN_ON_CONFIDENCE: f64 = 0.8;
/// Confidence of an equality observed in a WHERE clause.
pub const WHERE_CONFIDENCE: f64 = 0.7;

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?x)
        '(?:[^']|'')*'            # string literal
        | "(?:[^"]|"")+"          # quoted identifier
        | `[^`]+`                 # mysql identifier
        | \[[^\]]+\]              # bracketed identifier
        | [A-Za-z_][A-Za-z0-9_$]* # word
        | [0-9]+(?:\.[0-9]+)?     # number
        | <> | != | <= | >= | =
        | \S                      # any other symbol
        "#,
    )
    .expect("valid SQL token regex")
});

/// Words that end a table reference or an alias position.
const RESERVED: &[&str] = &[
    "select", "from", "where", "join", "inner", "left", "right", "full", "outer", "cross",
    "natural", "on", "using", "group", "order", "having", "limit", "offset", "union", "as",
    "and", "or", "not", "set", "values", "lateral", "straight_join",
];

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Word(String),
    Literal,
    Symbol(String),
}

impl Token {
    fn is_word(&self, word: &str) -> bool {
        matches!(self, Token::Word(w) if w == word)
    }

    /// Identifier text, for bare words that are not reserved and quoted names.
    fn name(&self) -> Option<&str> {
        match self {
            Token::Ident(s) => Some(s),
            Token::Word(w) if !RESERVED.contains(&w.as_str()) => Some(w),
            _ => None,
        }
    }
}

fn tokenize(sql: &str) -> Vec<Token> {
    TOKEN_RE
        .find_iter(sql)
        .map(|m| {
            let text = m.as_str();
            let first = text.chars().next().unwrap_or(' ');
            match first {
                '\'' => Token::Literal,
                '"' | '`' | '[' => match quoted_inner(text, first) {
                    Some(inner) => Token::Ident(inner.replace("\"\"", "\"").to_lowercase()),
                    None => Token::Symbol(text.to_string()),
                },
                c if c.is_ascii_alphabetic() || c == '_' => Token::Word(text.to_lowercase()),
                c if c.is_ascii_digit() => Token::Literal,
                _ => Token::Symbol(text.to_string()),
            }
        })
        .collect()
}

/// Text between a quoting pair; `None` for a lone or unterminated delimiter.
fn quoted_inner(text: &str, open: char) -> Option<&str> {
    let close = if open == '[' { ']' } else { open };
    if text.len() < 2 || !text.ends_with(close) {
        return None;
    }
    Some(&text[1..text.len() - 1])
}

/// One equality between two qualified columns.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinObservation {
    pub key: RelationshipKey,
    pub confidence: f64,
}

#[derive(Clone, Copy, PartialEq)]
enum Clause {
    Other,
    On,
    Where,
}

/// Mine equalities from one statement, in order of appearance.
pub fn mine(sql: &str) -> Vec<JoinObservation> {
    let tokens = tokenize(sql);
    let aliases = alias_map(&tokens);
    if aliases.is_empty() {
        return Vec::new();
    }

    let mut observations = Vec::new();
    let mut clause = Clause::Other;
    let mut i = 0;
    while i < tokens.len() {
        if let Token::Word(w) = &tokens[i] {
            clause = match w.as_str() {
                "on" => Clause::On,
                "where" => Clause::Where,
                "select" | "from" | "join" | "group" | "order" | "having" | "limit" | "union" => {
                    Clause::Other
                }
                _ => clause,
            };
        }

        let confidence = match clause {
            Clause::On => JOIN_ON_CONFIDENCE,
            Clause::Where => WHERE_CONFIDENCE,
            Clause::Other => {
                i += 1;
                continue;
            }
        };

        if let Some((left, right)) = qualified_equality(&tokens[i..]) {
            let resolved = (
                aliases.get(left.0.as_str()),
                aliases.get(right.0.as_str()),
            );
            if let (Some(lt), Some(rt)) = resolved {
                if !(lt == rt && left.1 == right.1) {
                    observations.push(JoinObservation {
                        key: RelationshipKey::single(lt, &left.1, rt, &right.1),
                        confidence,
                    });
                }
            }
            i += 7;
            continue;
        }
        i += 1;
    }
    observations
}

/// Match `q . c = q . c` at the start of `tokens`.
fn qualified_equality(tokens: &[Token]) -> Option<((String, String), (String, String))> {
    let [lq, d1, lc, eq, rq, d2, rc, ..] = tokens else {
        return None;
    };
    let dot = |t: &Token| matches!(t, Token::Symbol(s) if s == ".");
    if !dot(d1) || !dot(d2) || !matches!(eq, Token::Symbol(s) if s == "=") {
        return None;
    }
    Some((
        (lq.name()?.to_string(), lc.name()?.to_string()),
        (rq.name()?.to_string(), rc.name()?.to_string()),
    ))
}

/// Alias (and bare table name) to table name, from `FROM` and `JOIN` references.
fn alias_map(tokens: &[Token]) -> HashMap<String, String> {
    let mut aliases = HashMap::new();
    let mut i = 0;
    while i < tokens.len() {
        let is_from = tokens[i].is_word("from");
        if !(is_from || tokens[i].is_word("join")) {
            i += 1;
            continue;
        }
        i += 1;
        loop {
            let Some((table, alias, next)) = table_reference(tokens, i) else {
                break;
            };
            aliases.insert(table.clone(), table.clone());
            if let Some(alias) = alias {
                aliases.insert(alias, table);
            }
            i = next;
            // `FROM a x, b y` lists several references
            if is_from && matches!(tokens.get(i), Some(Token::Symbol(s)) if s == ",") {
                i += 1;
                continue;
            }
            break;
        }
    }
    aliases
}

/// Parse `[schema .] table [AS] [alias]` starting at `start`.
fn table_reference(tokens: &[Token], start: usize) -> Option<(String, Option<String>, usize)> {
    let mut i = start;
    let mut table = tokens.get(i)?.name()?.to_string();
    i += 1;
    while matches!(tokens.get(i), Some(Token::Symbol(s)) if s == ".") {
        table = tokens.get(i + 1)?.name()?.to_string();
        i += 2;
    }

    let mut alias = None;
    if tokens.get(i).is_some_and(|t| t.is_word("as")) {
        i += 1;
    }
    if let Some(name) = tokens.get(i).and_then(Token::name) {
        alias = Some(name.to_string());
        i += 1;
    }
    Some((table, alias, i))
}
