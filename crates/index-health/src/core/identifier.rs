//! Identifier validation and quoting for the dynamic queries sent to both stores.
//!
//! Table and column names come from configuration and cannot be bound as
//! parameters, so they are validated and backtick-quoted before being spliced
//! into MySQL statements. Index field paths are spliced into JSON query bodies
//! and only need the structural checks.

use crate::error::{HealthError, Result};

/// MySQL caps identifiers at 64 characters.
const MAX_IDENTIFIER_LENGTH: usize = 64;

/// Elasticsearch field paths are dotted names (`post_type.raw`).
const MAX_FIELD_PATH_LENGTH: usize = 255;

/// Validate an identifier for security issues.
///
/// Rejects empty identifiers, identifiers containing null bytes and
/// identifiers exceeding the MySQL length limit.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(HealthError::config("Identifier cannot be empty"));
    }

    if name.contains('\0') {
        return Err(HealthError::Config(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    if name.chars().count() > MAX_IDENTIFIER_LENGTH {
        return Err(HealthError::Config(format!(
            "Identifier exceeds maximum length of {} characters: {:?}",
            MAX_IDENTIFIER_LENGTH, name
        )));
    }

    Ok(())
}

/// Quote a MySQL identifier using backticks.
///
/// ```ignore
/// assert_eq!(quote_mysql("wp_posts")?, "`wp_posts`");
/// assert_eq!(quote_mysql("table`name")?, "`table``name`");
/// ```
pub fn quote_mysql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("`{}`", name.replace('`', "``")))
}

/// Validate a dotted index field path such as `post_type.raw`.
pub fn validate_field_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(HealthError::config("Index field cannot be empty"));
    }
    if path.len() > MAX_FIELD_PATH_LENGTH {
        return Err(HealthError::Config(format!(
            "Index field exceeds maximum length of {} bytes: {:?}",
            MAX_FIELD_PATH_LENGTH, path
        )));
    }
    if path.split('.').any(|segment| segment.is_empty()) {
        return Err(HealthError::Config(format!(
            "Index field has an empty path segment: {:?}",
            path
        )));
    }
    if path.chars().any(|c| c.is_whitespace() || c.is_control() || c == '"') {
        return Err(HealthError::Config(format!(
            "Index field contains whitespace, control or quote characters: {:?}",
            path
        )));
    }
    Ok(())
}
