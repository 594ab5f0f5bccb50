//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::core::{EntityType, FieldKind, FieldSpec};

/// Largest page Elasticsearch returns from a single search by default
/// (`index.max_result_window`).
pub const MAX_PAGE_SIZE: i64 = 10_000;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Primary database configuration (MySQL).
    pub primary: PrimaryConfig,

    /// Search index configuration (Elasticsearch).
    pub index: IndexConfig,

    /// Validation behavior configuration.
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Per-entity table, index and field layout. Entities left out fall back
    /// to the WordPress defaults.
    #[serde(default)]
    pub entities: BTreeMap<EntityType, EntityConfig>,
}

impl Config {
    /// Insert the default layout for every entity type not configured explicitly.
    pub fn with_entity_defaults(mut self) -> Self {
        for entity in EntityType::ALL {
            self.entities
                .entry(entity)
                .or_insert_with(|| EntityConfig::default_for(entity));
        }
        self
    }
}

/// Primary database (MySQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct PrimaryConfig {
    /// Database type (always "mysql" for now).
    #[serde(default = "default_mysql")]
    pub r#type: String,

    /// Database host.
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Connection pool size (default: 4).
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Require TLS for the connection (default: false, TLS is still preferred).
    #[serde(default)]
    pub require_tls: bool,
}

impl fmt::Debug for PrimaryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimaryConfig")
            .field("type", &self.r#type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .field("require_tls", &self.require_tls)
            .finish()
    }
}

/// Search index (Elasticsearch) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Index type (always "elasticsearch" for now).
    #[serde(default = "default_elasticsearch")]
    pub r#type: String,

    /// Cluster base URL, e.g. `http://localhost:9200`.
    pub url: String,

    /// Basic auth username.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Basic auth password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl fmt::Debug for IndexConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexConfig")
            .field("type", &self.r#type)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Validation behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Ids per content window (default: 500).
    #[serde(default = "default_page_size")]
    pub page_size: i64,

    /// Windows / subtypes fetched concurrently (default: 4).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Timeout for every single store call in seconds (default: 30).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ValidationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            concurrency: default_concurrency(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Where an entity lives in both stores and which fields are compared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityConfig {
    /// Database table, e.g. `wp_posts`.
    pub table: String,

    /// Numeric id column (default: "ID").
    #[serde(default = "default_id")]
    pub id_column: String,

    /// Column holding the subtype (e.g. `post_type`). Without it the entity is
    /// counted as a single `"all"` subtype.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype_column: Option<String>,

    /// Subtypes to validate. Empty means every distinct value of `subtype_column`.
    #[serde(default)]
    pub subtypes: Vec<String>,

    /// Column holding the record status (e.g. `post_status`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_column: Option<String>,

    /// Statuses that are indexed. Empty means no status filter.
    #[serde(default)]
    pub statuses: Vec<String>,

    /// Index (or alias) name holding the documents.
    pub index: String,

    /// Numeric id field in index documents (default: "ID").
    #[serde(default = "default_id")]
    pub index_id_field: String,

    /// Keyword field matching `subtype_column` (e.g. `post_type.raw`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_subtype_field: Option<String>,

    /// Keyword field matching `status_column`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_status_field: Option<String>,

    /// Fields compared during content validation.
    pub fields: Vec<FieldSpec>,
}

impl EntityConfig {
    /// WordPress layout for an entity type.
    pub fn default_for(entity: EntityType) -> Self {
        match entity {
            EntityType::Post => Self::wordpress_posts(),
            EntityType::User => Self::wordpress_users(),
        }
    }

    /// `wp_posts` indexed into a `post` index, published content only.
    pub fn wordpress_posts() -> Self {
        Self {
            table: "wp_posts".to_string(),
            id_column: default_id(),
            subtype_column: Some("post_type".to_string()),
            subtypes: Vec::new(),
            status_column: Some("post_status".to_string()),
            statuses: vec!["publish".to_string()],
            index: "post".to_string(),
            index_id_field: default_id(),
            index_subtype_field: Some("post_type.raw".to_string()),
            index_status_field: Some("post_status".to_string()),
            fields: vec![
                FieldSpec::new("post_title", FieldKind::Text),
                FieldSpec::new("post_name", FieldKind::Keyword),
                FieldSpec::new("post_status", FieldKind::Keyword),
                FieldSpec::new("post_type", FieldKind::Keyword),
                FieldSpec::new("post_modified_gmt", FieldKind::DateTime),
                FieldSpec {
                    name: "post_author".to_string(),
                    primary_column: None,
                    index_field: Some("post_author.id".to_string()),
                    kind: FieldKind::Integer,
                },
            ],
        }
    }

    /// `wp_users` indexed into a `user` index, one subtype.
    pub fn wordpress_users() -> Self {
        Self {
            table: "wp_users".to_string(),
            id_column: default_id(),
            subtype_column: None,
            subtypes: Vec::new(),
            status_column: None,
            statuses: Vec::new(),
            index: "user".to_string(),
            index_id_field: default_id(),
            index_subtype_field: None,
            index_status_field: None,
            fields: vec![
                FieldSpec::new("user_login", FieldKind::Keyword),
                FieldSpec::new("user_email", FieldKind::Keyword),
                FieldSpec::new("user_nicename", FieldKind::Keyword),
                FieldSpec::new("display_name", FieldKind::Text),
                FieldSpec::new("user_registered", FieldKind::DateTime),
            ],
        }
    }
}

// Default value functions for serde
fn default_mysql() -> String {
    "mysql".to_string()
}

fn default_elasticsearch() -> String {
    "elasticsearch".to_string()
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_max_connections() -> u32 {
    4
}

fn default_page_size() -> i64 {
    500
}

fn default_concurrency() -> usize {
    4
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_id() -> String {
    "ID".to_string()
}
