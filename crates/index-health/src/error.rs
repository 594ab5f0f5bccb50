//! Error types for the validation library.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::core::EntityType;
use crate::verify::Window;

/// Exit code: validation completed and both stores agree.
pub const EXIT_SUCCESS: u8 = 0;
/// Exit code: invalid configuration or arguments.
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code: a store could not be reached.
pub const EXIT_STORE_ERROR: u8 = 2;
/// Exit code: validation completed and found inconsistencies.
pub const EXIT_INCONSISTENT: u8 = 3;
/// Exit code: validation completed but some subtypes or windows could not be checked.
pub const EXIT_INCOMPLETE: u8 = 4;
/// Exit code: validation was cancelled before finishing.
pub const EXIT_CANCELLED: u8 = 5;
/// Exit code: file could not be read.
pub const EXIT_IO_ERROR: u8 = 7;

/// Main error type for validation operations.
#[derive(Error, Debug)]
pub enum HealthError {
    /// Configuration error (invalid YAML, unknown entity, bad id range, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Primary database connection or query error
    #[error("Primary database error: {0}")]
    Primary(#[from] sqlx::Error),

    /// Search index transport error
    #[error("Search index error: {0}")]
    Index(#[from] reqwest::Error),

    /// Search index answered with a non-success status
    #[error("Search index returned HTTP {status}: {body}")]
    IndexResponse { status: u16, body: String },

    /// Search index answered with a body we could not interpret
    #[error("Unexpected search index response: {0}")]
    IndexPayload(String),

    /// A page or count could not be fetched from one of the stores
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HealthError {
    /// Create a Config error.
    pub fn config(message: impl Into<String>) -> Self {
        HealthError::Config(message.into())
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            HealthError::Config(_) | HealthError::Yaml(_) => EXIT_CONFIG_ERROR,
            HealthError::Io(_) => EXIT_IO_ERROR,
            HealthError::Primary(_)
            | HealthError::Index(_)
            | HealthError::IndexResponse { .. }
            | HealthError::IndexPayload(_)
            | HealthError::Fetch(_)
            | HealthError::Json(_) => EXIT_STORE_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Which of the two stores an operation talked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreSide {
    /// The authoritative database.
    Primary,
    /// The derived search index.
    Index,
}

impl fmt::Display for StoreSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreSide::Primary => write!(f, "DB"),
            StoreSide::Index => write!(f, "ES"),
        }
    }
}

/// What a failed fetch was trying to read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FetchScope {
    /// The whole entity (subtype enumeration, max id lookup).
    Entity,
    /// A single subtype count.
    Subtype { subtype: String },
    /// A window of ids during content validation.
    Window { start_id: i64, end_id: i64 },
}

impl From<Window> for FetchScope {
    fn from(window: Window) -> Self {
        FetchScope::Window {
            start_id: window.start_id,
            end_id: window.end_id,
        }
    }
}

impl fmt::Display for FetchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchScope::Entity => write!(f, "all"),
            FetchScope::Subtype { subtype } => write!(f, "type {}", subtype),
            FetchScope::Window { start_id, end_id } => write!(f, "ids {}..={}", start_id, end_id),
        }
    }
}

/// A read against one store failed or timed out.
///
/// Recovered by the comparators into an error record; it never aborts a run.
#[derive(Error, Debug, Clone)]
#[error("{side} fetch failed for {entity} ({scope}): {message}")]
pub struct FetchError {
    pub side: StoreSide,
    pub entity: EntityType,
    pub scope: FetchScope,
    pub message: String,
}

impl FetchError {
    pub fn new(
        side: StoreSide,
        entity: EntityType,
        scope: impl Into<FetchScope>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            side,
            entity,
            scope: scope.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for validation operations.
pub type Result<T> = std::result::Result<T, HealthError>;
