//! Statement policy and identifier quoting.

mod identifiers;
mod validation;

pub use identifiers::{
    parse_qualified_name, quote_identifier, quote_literal, validate_identifier,
    MAX_IDENTIFIER_LENGTH,
};
pub use validation::{QueryType, QueryValidator, ValidationMode, ValidationResult};
