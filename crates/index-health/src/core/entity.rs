//! Entity kinds that exist in both the database and the search index.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::HealthError;

/// Subtype name used for entities that are not split into categories.
pub const ALL_SUBTYPES: &str = "all";

/// Which table / index document kind is being compared.
///
/// Everything that differs between entity kinds (tables, columns, index
/// names, compared fields) is carried by `EntityConfig`, so new variants only
/// need a name here and a default configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Post,
    User,
}

impl EntityType {
    /// All known entity types, in the order counts are validated.
    pub const ALL: [EntityType; 2] = [EntityType::Post, EntityType::User];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Post => "post",
            EntityType::User => "user",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = HealthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "post" | "posts" => Ok(EntityType::Post),
            "user" | "users" => Ok(EntityType::User),
            other => Err(HealthError::Config(format!(
                "unknown entity type '{}' (expected one of: post, user)",
                other
            ))),
        }
    }
}
