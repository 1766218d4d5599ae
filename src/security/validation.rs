//! Statement policy for caller-supplied SQL.

use crate::error::ServerError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Query validation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ValidationMode {
    /// Only SELECT and WITH (CTE) statements.
    #[default]
    ReadOnly,

    /// DML allowed (INSERT, UPDATE, DELETE, MERGE). DDL and privilege
    /// changes stay blocked.
    AllowDml,
}

impl ValidationMode {
    /// Mode selected by the DML-allow flag.
    pub fn from_allow_dml(allow_dml: bool) -> Self {
        if allow_dml {
            Self::AllowDml
        } else {
            Self::ReadOnly
        }
    }
}

/// Result of query validation.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Detected statement type
    pub query_type: QueryType,
}

/// Type of SQL statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Delete,
    Merge,
    Create,
    Alter,
    Drop,
    Truncate,
    Copy,
    Grant,
    Revoke,
    Call,
    Other,
}

impl QueryType {
    /// Check if this is a read operation.
    pub fn is_read(&self) -> bool {
        matches!(self, QueryType::Select)
    }

    /// Check if this is a data modification.
    pub fn is_dml(&self) -> bool {
        matches!(
            self,
            QueryType::Insert | QueryType::Update | QueryType::Delete | QueryType::Merge
        )
    }
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern)
        .unwrap_or_else(|e| panic!("Internal error: invalid regex pattern '{}': {}", pattern, e))
}

static QUERY_TYPE_PATTERNS: Lazy<Vec<(Regex, QueryType)>> = Lazy::new(|| {
    vec![
        (compile(r"(?i)^\s*SELECT\b"), QueryType::Select),
        (compile(r"(?i)^\s*WITH\b"), QueryType::Select),
        (compile(r"(?i)^\s*TABLE\b"), QueryType::Select),
        (compile(r"(?i)^\s*INSERT\b"), QueryType::Insert),
        (compile(r"(?i)^\s*UPDATE\b"), QueryType::Update),
        (compile(r"(?i)^\s*DELETE\b"), QueryType::Delete),
        (compile(r"(?i)^\s*MERGE\b"), QueryType::Merge),
        (compile(r"(?i)^\s*CREATE\b"), QueryType::Create),
        (compile(r"(?i)^\s*ALTER\b"), QueryType::Alter),
        (compile(r"(?i)^\s*DROP\b"), QueryType::Drop),
        (compile(r"(?i)^\s*TRUNCATE\b"), QueryType::Truncate),
        (compile(r"(?i)^\s*COPY\b"), QueryType::Copy),
        (compile(r"(?i)^\s*GRANT\b"), QueryType::Grant),
        (compile(r"(?i)^\s*REVOKE\b"), QueryType::Revoke),
        (compile(r"(?i)^\s*(CALL|DO)\b"), QueryType::Call),
    ]
});

/// A CTE body that modifies data (`WITH x AS (DELETE ...)`).
static MODIFYING_CTE: Lazy<Regex> =
    Lazy::new(|| compile(r"(?i)\bAS\s*(NOT\s+)?(MATERIALIZED\s*)?\(\s*(INSERT|UPDATE|DELETE|MERGE)\b"));

/// `SELECT ... INTO new_table` creates a table.
static SELECT_INTO: Lazy<Regex> = Lazy::new(|| compile(r"(?i)^\s*SELECT\b.*\bINTO\b"));

/// Server-side functions that reach outside the database or other sessions.
static DANGEROUS_FUNCTIONS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (compile(r"(?i)\bpg_read_(binary_)?file\s*\("), "pg_read_file"),
        (compile(r"(?i)\bpg_ls_dir\s*\("), "pg_ls_dir"),
        (compile(r"(?i)\blo_(import|export)\s*\("), "large object import/export"),
        (compile(r"(?i)\bpg_(terminate|cancel)_backend\s*\("), "backend signalling"),
        (compile(r"(?i)\bdblink\w*\s*\("), "dblink"),
        (compile(r"(?i)\bset_config\s*\("), "set_config"),
    ]
});

/// Query validator.
#[derive(Debug, Clone)]
pub struct QueryValidator {
    mode: ValidationMode,
    max_length: usize,
}

impl QueryValidator {
    /// Create a new query validator.
    pub fn new(mode: ValidationMode, max_length: usize) -> Self {
        Self { mode, max_length }
    }

    /// Validate a statement against the current mode.
    ///
    /// Returns [`ServerError::InvalidInput`] for malformed input and
    /// [`ServerError::PolicyRejected`] for statements the mode refuses.
    pub fn validate(&self, query: &str) -> Result<ValidationResult, ServerError> {
        if query.trim().is_empty() {
            return Err(ServerError::invalid_input("SQL statement cannot be empty"));
        }

        if query.len() > self.max_length {
            return Err(ServerError::invalid_input(format!(
                "Query exceeds maximum length of {} bytes",
                self.max_length
            )));
        }

        let stripped = strip_comments_and_literals(query);
        if stripped.trim().is_empty() {
            return Err(ServerError::invalid_input("SQL statement contains only comments"));
        }

        if statement_count(&stripped) > 1 {
            return Err(ServerError::policy(
                "Multiple statements are not allowed; submit one statement per call",
            ));
        }

        for (pattern, name) in DANGEROUS_FUNCTIONS.iter() {
            if pattern.is_match(&stripped) {
                return Err(ServerError::policy(format!(
                    "Function '{}' is not allowed",
                    name
                )));
            }
        }

        let query_type = detect_query_type(&stripped);

        match self.mode {
            ValidationMode::ReadOnly => {
                if !query_type.is_read() {
                    return Err(ServerError::policy(format!(
                        "{:?} statements are not allowed in read-only mode. \
                         Only SELECT and WITH queries are permitted.",
                        query_type
                    )));
                }
                if MODIFYING_CTE.is_match(&stripped) {
                    return Err(ServerError::policy(
                        "Data-modifying CTEs are not allowed in read-only mode",
                    ));
                }
                if SELECT_INTO.is_match(&stripped) {
                    return Err(ServerError::policy(
                        "SELECT ... INTO is not allowed in read-only mode",
                    ));
                }
            }
            ValidationMode::AllowDml => {
                if !query_type.is_read() && !query_type.is_dml() {
                    return Err(ServerError::policy(format!(
                        "{:?} statements are not allowed. DDL and privilege changes are blocked.",
                        query_type
                    )));
                }
            }
        }

        Ok(ValidationResult { query_type })
    }

    /// Get the current validation mode.
    pub fn mode(&self) -> ValidationMode {
        self.mode
    }
}

/// Detect the type of a statement whose comments have been removed.
fn detect_query_type(query: &str) -> QueryType {
    // Parenthesized selects: (SELECT ...) UNION (SELECT ...)
    let query = query.trim_start().trim_start_matches('(');

    QUERY_TYPE_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(query))
        .map(|(_, query_type)| *query_type)
        .unwrap_or(QueryType::Other)
}

/// Replace comments with a space and blank out the contents of string
/// literals and quoted identifiers, so keyword and separator checks only see
/// statement text.
fn strip_comments_and_literals(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    let mut chars = query.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '-' if chars.peek() == Some(&'-') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
                out.push(' ');
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut depth = 1;
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if prev == '/' && c == '*' {
                        depth += 1;
                        prev = '\0';
                        continue;
                    }
                    if prev == '*' && c == '/' {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                        prev = '\0';
                        continue;
                    }
                    prev = c;
                }
                out.push(' ');
            }
            '\'' | '"' => {
                let quote = c;
                out.push(quote);
                while let Some(c) = chars.next() {
                    if c == quote {
                        // Doubled quote is an escaped quote inside the token
                        if chars.peek() == Some(&quote) {
                            chars.next();
                            continue;
                        }
                        break;
                    }
                }
                out.push(quote);
            }
            _ => out.push(c),
        }
    }

    out
}

/// Number of non-empty statements separated by `;`.
fn statement_count(stripped: &str) -> usize {
    stripped
        .split(';')
        .filter(|part| !part.trim().is_empty())
        .count()
}
