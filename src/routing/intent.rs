//! Keyword intent classification.
//!
//! Rules are evaluated in [`INTENT_RULES`] order and the first match wins.
//! Several rules overlap ("list tables" also names no entity, "list users"
//! could be a table name), so the order is part of the behavior.

use crate::cache::SchemaSnapshot;
use crate::routing::EntityCategory;
use serde::Serialize;

/// Words skipped when reading the name that follows a marker.
const FILLER_WORDS: &[&str] = &["the", "a", "an", "named", "called", "my", "our", "this"];

/// Words that follow a marker but never name a table.
const GENERIC_NOUNS: &[&str] = &["database", "db", "schema", "table", "tables"];

/// A request split into lowercase words.
#[derive(Debug, Clone)]
pub struct ParsedRequest {
    text: String,
    words: Vec<String>,
}

impl ParsedRequest {
    /// Lowercase `text` and split it on whitespace, trimming punctuation
    /// (underscores are kept, they are common in table names).
    pub fn parse(text: &str) -> Self {
        let words = text
            .split_whitespace()
            .map(|w| {
                w.trim_matches(|c: char| !c.is_alphanumeric() && c != '_')
                    .to_lowercase()
            })
            .filter(|w| !w.is_empty())
            .collect();

        Self {
            text: text.trim().to_string(),
            words,
        }
    }

    /// The original request text, trimmed.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn has_word(&self, word: &str) -> bool {
        self.words.iter().any(|w| w == word)
    }

    pub fn has_any_word(&self, words: &[&str]) -> bool {
        words.iter().any(|w| self.has_word(w))
    }

    /// Whether the words of `phrase` appear consecutively.
    pub fn has_phrase(&self, phrase: &str) -> bool {
        let wanted: Vec<&str> = phrase.split_whitespace().collect();
        if wanted.is_empty() || wanted.len() > self.words.len() {
            return false;
        }
        self.words
            .windows(wanted.len())
            .any(|window| window.iter().zip(&wanted).all(|(w, p)| w == p))
    }

    /// The name following the first marker (tried in order) that is
    /// followed by one.
    pub fn word_after(&self, markers: &[&str]) -> Option<&str> {
        markers.iter().find_map(|marker| {
            let pos = self.words.iter().position(|w| w == marker)?;
            let next = self.words[pos + 1..]
                .iter()
                .find(|w| !FILLER_WORDS.contains(&w.as_str()))?;
            (!GENERIC_NOUNS.contains(&next.as_str())).then_some(next.as_str())
        })
    }

    /// First word that is the name of a real table, in the table's spelling.
    pub fn table_mention<'a>(&self, snapshot: &'a SchemaSnapshot) -> Option<&'a str> {
        self.words.iter().find_map(|w| snapshot.find_table(w))
    }
}

/// What a request asks for. Table names are as written in the request
/// unless noted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Row count of a table, or the number of tables when `table` is `None`.
    Count { table: Option<String> },
    /// Relationship or join request, answered by the agent delegate.
    Complex,
    /// Preview rows of a table.
    ShowData { table: Option<String> },
    /// Names of all tables.
    ListTables,
    /// Column descriptions of a table, or of the whole schema.
    DescribeSchema { table: Option<String> },
    /// Names and ids of a category's entities.
    EntityLookup { category: EntityCategory },
    /// Preview rows of a table named outright (catalog spelling).
    TableDump { table: String },
    /// Nothing matched; list tables.
    Fallback,
}

/// Serializable intent name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    Count,
    Complex,
    ShowData,
    ListTables,
    DescribeSchema,
    EntityLookup,
    TableDump,
    Fallback,
}

impl Intent {
    pub fn kind(&self) -> IntentKind {
        match self {
            Intent::Count { .. } => IntentKind::Count,
            Intent::Complex => IntentKind::Complex,
            Intent::ShowData { .. } => IntentKind::ShowData,
            Intent::ListTables => IntentKind::ListTables,
            Intent::DescribeSchema { .. } => IntentKind::DescribeSchema,
            Intent::EntityLookup { .. } => IntentKind::EntityLookup,
            Intent::TableDump { .. } => IntentKind::TableDump,
            Intent::Fallback => IntentKind::Fallback,
        }
    }
}

/// One entry of the ordered rule table.
pub struct IntentRule {
    pub name: &'static str,
    pub classify: fn(&ParsedRequest, &SchemaSnapshot) -> Option<Intent>,
}

/// Classification rules, highest priority first.
pub static INTENT_RULES: &[IntentRule] = &[
    IntentRule {
        name: "count",
        classify: count_rule,
    },
    IntentRule {
        name: "complex",
        classify: complex_rule,
    },
    IntentRule {
        name: "show_data",
        classify: show_data_rule,
    },
    IntentRule {
        name: "list_tables",
        classify: list_tables_rule,
    },
    IntentRule {
        name: "describe_schema",
        classify: describe_schema_rule,
    },
    IntentRule {
        name: "entity_lookup",
        classify: entity_lookup_rule,
    },
    IntentRule {
        name: "table_dump",
        classify: table_dump_rule,
    },
    IntentRule {
        name: "fallback",
        classify: fallback_rule,
    },
];

/// Classify a request against the current table set.
pub fn classify(request: &ParsedRequest, snapshot: &SchemaSnapshot) -> Intent {
    INTENT_RULES
        .iter()
        .find_map(|rule| (rule.classify)(request, snapshot))
        .unwrap_or(Intent::Fallback)
}

/// Counts rows only when a table is named after the word "table"; any
/// other count request counts tables.
fn count_rule(request: &ParsedRequest, _: &SchemaSnapshot) -> Option<Intent> {
    if !(request.has_any_word(&["count", "counts"]) || request.has_phrase("how many")) {
        return None;
    }

    let table = request.word_after(&["table"]).map(str::to_string);
    Some(Intent::Count { table })
}

fn complex_rule(request: &ParsedRequest, _: &SchemaSnapshot) -> Option<Intent> {
    let relational = request.has_any_word(&[
        "join",
        "joins",
        "joined",
        "relationship",
        "relationships",
        "related",
    ]);
    let paired = request.has_word("with") && EntityCategory::mentioned(request.words()).len() >= 2;

    (relational || paired).then_some(Intent::Complex)
}

fn show_data_rule(request: &ParsedRequest, _: &SchemaSnapshot) -> Option<Intent> {
    if !(request.has_word("show") && request.has_word("data")) {
        return None;
    }
    let table = request.word_after(&["table", "from"]).map(str::to_string);
    Some(Intent::ShowData { table })
}

fn list_tables_rule(request: &ParsedRequest, _: &SchemaSnapshot) -> Option<Intent> {
    (request.has_word("list") && request.has_any_word(&["table", "tables"]))
        .then_some(Intent::ListTables)
}

fn describe_schema_rule(request: &ParsedRequest, _: &SchemaSnapshot) -> Option<Intent> {
    if !request.has_any_word(&["schema", "schemas"]) {
        return None;
    }
    let table = request.word_after(&["table", "of"]).map(str::to_string);
    Some(Intent::DescribeSchema { table })
}

fn entity_lookup_rule(request: &ParsedRequest, _: &SchemaSnapshot) -> Option<Intent> {
    if !request.has_word("list") {
        return None;
    }
    EntityCategory::detect(request.words()).map(|category| Intent::EntityLookup { category })
}

fn table_dump_rule(request: &ParsedRequest, snapshot: &SchemaSnapshot) -> Option<Intent> {
    request.table_mention(snapshot).map(|table| Intent::TableDump {
        table: table.to_string(),
    })
}

fn fallback_rule(_: &ParsedRequest, _: &SchemaSnapshot) -> Option<Intent> {
    Some(Intent::Fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TableColumns;
    use std::collections::HashMap;

    fn snapshot(tables: &[&str]) -> SchemaSnapshot {
        let tables: Vec<String> = tables.iter().map(|s| s.to_string()).collect();
        let info = tables
            .iter()
            .map(|t| (t.clone(), TableColumns::Columns(Vec::new())))
            .collect::<HashMap<_, _>>();
        SchemaSnapshot::new(tables, info)
    }

    fn classify_text(text: &str) -> Intent {
        classify(
            &ParsedRequest::parse(text),
            &snapshot(&["app_users", "orders", "Sensor_Readings"]),
        )
    }

    #[test]
    fn test_parse_trims_punctuation() {
        let req = ParsedRequest::parse("  How many rows in table \"orders\"? ");
        assert_eq!(req.words(), &["how", "many", "rows", "in", "table", "orders"]);
        assert_eq!(req.text(), "How many rows in table \"orders\"?");
    }

    #[test]
    fn test_word_after_skips_fillers() {
        let req = ParsedRequest::parse("show me data from the orders table");
        assert_eq!(req.word_after(&["table", "from"]), Some("orders"));
        let req = ParsedRequest::parse("what is the schema of the database");
        assert_eq!(req.word_after(&["table", "of"]), None);
    }

    #[test]
    fn test_count_intent() {
        assert_eq!(classify_text("how many tables"), Intent::Count { table: None });
        assert_eq!(
            classify_text("count rows in table orders"),
            Intent::Count {
                table: Some("orders".to_string())
            }
        );
        assert_eq!(
            classify_text("how many orders are there"),
            Intent::Count { table: None }
        );
        // "accounts" is not the word "count"
        assert_eq!(
            classify_text("list accounts"),
            Intent::EntityLookup {
                category: EntityCategory::Users
            }
        );
    }

    #[test]
    fn test_count_ignores_table_named_like_request_word() {
        let snap = snapshot(&["app_users", "many"]);

        assert_eq!(
            classify(&ParsedRequest::parse("how many tables"), &snap),
            Intent::Count { table: None }
        );
        assert_eq!(
            classify(&ParsedRequest::parse("how many rows in table many"), &snap),
            Intent::Count {
                table: Some("many".to_string())
            }
        );
    }

    #[test]
    fn test_complex_intent() {
        assert_eq!(classify_text("join orders and users"), Intent::Complex);
        assert_eq!(classify_text("show users with their roles"), Intent::Complex);
        assert_eq!(classify_text("which devices are related to machines"), Intent::Complex);
        // "with" alone is not enough
        assert_eq!(
            classify_text("list users with email"),
            Intent::EntityLookup {
                category: EntityCategory::Users
            }
        );
    }

    #[test]
    fn test_show_data_intent() {
        assert_eq!(
            classify_text("show data from orders"),
            Intent::ShowData {
                table: Some("orders".to_string())
            }
        );
        assert_eq!(classify_text("show data"), Intent::ShowData { table: None });
    }

    #[test]
    fn test_list_tables_precedes_entity_lookup() {
        assert_eq!(classify_text("list user tables"), Intent::ListTables);
        assert_eq!(
            classify_text("list sensors"),
            Intent::EntityLookup {
                category: EntityCategory::Sensors
            }
        );
    }

    #[test]
    fn test_describe_schema_intent() {
        assert_eq!(
            classify_text("schema of orders"),
            Intent::DescribeSchema {
                table: Some("orders".to_string())
            }
        );
        assert_eq!(
            classify_text("describe the schema"),
            Intent::DescribeSchema { table: None }
        );
    }

    #[test]
    fn test_table_dump_uses_catalog_spelling() {
        assert_eq!(
            classify_text("orders"),
            Intent::TableDump {
                table: "orders".to_string()
            }
        );
        assert_eq!(
            classify_text("SENSOR_READINGS please"),
            Intent::TableDump {
                table: "Sensor_Readings".to_string()
            }
        );
    }

    #[test]
    fn test_fallback() {
        assert_eq!(classify_text("hello there"), Intent::Fallback);
        assert_eq!(classify_text("hello there").kind(), IntentKind::Fallback);
    }

    #[test]
    fn test_rule_order() {
        let names: Vec<&str> = INTENT_RULES.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec![
                "count",
                "complex",
                "show_data",
                "list_tables",
                "describe_schema",
                "entity_lookup",
                "table_dump",
                "fallback"
            ]
        );
    }
}
