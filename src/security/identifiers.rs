//! PostgreSQL identifier and literal quoting.
//!
//! Identifiers are wrapped in double quotes, so mixed-case and reserved-word
//! names survive. Literals use standard-conforming single quotes.

use crate::error::ServerError;

/// Maximum identifier length accepted from callers (PostgreSQL's NAMEDATALEN - 1).
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Quote an identifier, doubling any embedded double quote.
///
/// ```
/// use pg_mcp_server::security::quote_identifier;
///
/// assert_eq!(quote_identifier("app_users"), "\"app_users\"");
/// assert_eq!(quote_identifier("Order"), "\"Order\"");
/// assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
/// ```
pub fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Quote a string literal, doubling any embedded single quote.
///
/// NUL bytes cannot appear in PostgreSQL text and are dropped.
pub fn quote_literal(value: &str) -> String {
    let escaped: String = value
        .chars()
        .filter(|c| *c != '\0')
        .collect::<String>()
        .replace('\'', "''");
    format!("'{}'", escaped)
}

/// Validate a caller-supplied table or column name before it reaches a
/// generated statement.
pub fn validate_identifier(identifier: &str) -> Result<(), ServerError> {
    if identifier.trim().is_empty() {
        return Err(ServerError::invalid_input("Identifier cannot be empty"));
    }

    if identifier.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ServerError::invalid_input(format!(
            "Identifier exceeds maximum length of {} characters",
            MAX_IDENTIFIER_LENGTH
        )));
    }

    let dangerous_patterns = ["--", "/*", "*/", ";", "\0"];
    if let Some(pattern) = dangerous_patterns.iter().find(|p| identifier.contains(*p)) {
        return Err(ServerError::invalid_input(format!(
            "Identifier contains forbidden character sequence: {:?}",
            pattern
        )));
    }

    Ok(())
}

/// Split an optionally schema-qualified name into `(schema, name)`.
pub fn parse_qualified_name(identifier: &str) -> (Option<&str>, &str) {
    match identifier.split_once('.') {
        Some((schema, name)) if !schema.is_empty() && !name.is_empty() => (Some(schema), name),
        _ => (None, identifier),
    }
}
