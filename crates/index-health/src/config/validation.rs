//! Configuration validation.

use std::collections::HashSet;

use super::{Config, EntityConfig, ValidationConfig, MAX_PAGE_SIZE};
use crate::core::identifier::{validate_field_path, validate_identifier};
use crate::core::EntityType;
use crate::error::{HealthError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Primary validation
    if config.primary.r#type != "mysql" {
        return Err(HealthError::Config(format!(
            "primary.type must be 'mysql', got '{}'",
            config.primary.r#type
        )));
    }
    if config.primary.host.is_empty() {
        return Err(HealthError::config("primary.host is required"));
    }
    if config.primary.database.is_empty() {
        return Err(HealthError::config("primary.database is required"));
    }
    if config.primary.user.is_empty() {
        return Err(HealthError::config("primary.user is required"));
    }
    if config.primary.max_connections == 0 {
        return Err(HealthError::config(
            "primary.max_connections must be at least 1",
        ));
    }

    // Index validation
    if config.index.r#type != "elasticsearch" {
        return Err(HealthError::Config(format!(
            "index.type must be 'elasticsearch', got '{}'",
            config.index.r#type
        )));
    }
    let url = config.index.url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(HealthError::Config(format!(
            "index.url must start with http:// or https://, got '{}'",
            config.index.url
        )));
    }
    if config.index.password.is_some() && config.index.username.is_none() {
        return Err(HealthError::config(
            "index.password requires index.username",
        ));
    }

    validate_settings(&config.validation)?;

    for (entity, entity_config) in &config.entities {
        validate_entity(*entity, entity_config)?;
    }

    Ok(())
}

/// Validate validation settings. Also run on CLI overrides before any I/O.
pub fn validate_settings(settings: &ValidationConfig) -> Result<()> {
    if settings.page_size < 1 {
        return Err(HealthError::config(
            "validation.page_size must be at least 1",
        ));
    }
    if settings.page_size > MAX_PAGE_SIZE {
        return Err(HealthError::Config(format!(
            "validation.page_size must be at most {} (index result window)",
            MAX_PAGE_SIZE
        )));
    }
    if settings.concurrency == 0 {
        return Err(HealthError::config(
            "validation.concurrency must be at least 1",
        ));
    }
    if settings.timeout_secs == 0 {
        return Err(HealthError::config(
            "validation.timeout_secs must be at least 1",
        ));
    }
    Ok(())
}

fn validate_entity(entity: EntityType, config: &EntityConfig) -> Result<()> {
    let context = |message: String| HealthError::Config(format!("entities.{}: {}", entity, message));

    for column in [Some(&config.table), Some(&config.id_column)]
        .into_iter()
        .chain([config.subtype_column.as_ref(), config.status_column.as_ref()])
        .flatten()
    {
        validate_identifier(column).map_err(|e| context(e.to_string()))?;
    }

    if config.index.is_empty() {
        return Err(context("index is required".into()));
    }
    for field in [Some(&config.index_id_field)]
        .into_iter()
        .chain([
            config.index_subtype_field.as_ref(),
            config.index_status_field.as_ref(),
        ])
        .flatten()
    {
        validate_field_path(field).map_err(|e| context(e.to_string()))?;
    }

    if !config.subtypes.is_empty() && config.subtype_column.is_none() {
        return Err(context("subtypes require subtype_column".into()));
    }
    if config.subtype_column.is_some() != config.index_subtype_field.is_some() {
        return Err(context(
            "subtype_column and index_subtype_field must be set together".into(),
        ));
    }
    if !config.statuses.is_empty()
        && (config.status_column.is_none() || config.index_status_field.is_none())
    {
        return Err(context(
            "statuses require status_column and index_status_field".into(),
        ));
    }

    if config.fields.is_empty() {
        return Err(context("at least one compared field is required".into()));
    }
    let mut seen = HashSet::new();
    for field in &config.fields {
        if !seen.insert(field.name.as_str()) {
            return Err(context(format!("duplicate field '{}'", field.name)));
        }
        validate_identifier(field.primary_column()).map_err(|e| context(e.to_string()))?;
        validate_field_path(field.index_field()).map_err(|e| context(e.to_string()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IndexConfig, PrimaryConfig};
    use crate::core::{FieldKind, FieldSpec};
    use std::collections::BTreeMap;

    fn valid_config() -> Config {
        Config {
            primary: PrimaryConfig {
                r#type: "mysql".to_string(),
                host: "localhost".to_string(),
                port: 3306,
                database: "wordpress".to_string(),
                user: "wp".to_string(),
                password: "password".to_string(),
                max_connections: 4,
                require_tls: false,
            },
            index: IndexConfig {
                r#type: "elasticsearch".to_string(),
                url: "http://localhost:9200".to_string(),
                username: Some("elastic".to_string()),
                password: Some("changeme".to_string()),
            },
            validation: ValidationConfig::default(),
            entities: BTreeMap::new(),
        }
        .with_entity_defaults()
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_primary_host() {
        let mut config = valid_config();
        config.primary.host = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_wrong_primary_type() {
        let mut config = valid_config();
        config.primary.r#type = "postgres".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_index_url_requires_scheme() {
        let mut config = valid_config();
        config.index.url = "localhost:9200".to_string();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("index.url"));
    }

    #[test]
    fn test_page_size_bounds() {
        let mut settings = ValidationConfig::default();
        settings.page_size = 0;
        assert!(validate_settings(&settings).is_err());
        settings.page_size = MAX_PAGE_SIZE + 1;
        assert!(validate_settings(&settings).is_err());
        settings.page_size = MAX_PAGE_SIZE;
        assert!(validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = valid_config();
        config.validation.concurrency = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_entity_requires_fields() {
        let mut config = valid_config();
        config.entities.get_mut(&EntityType::User).unwrap().fields.clear();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("entities.user"));
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let mut config = valid_config();
        config
            .entities
            .get_mut(&EntityType::Post)
            .unwrap()
            .fields
            .push(FieldSpec::new("post_title", FieldKind::Keyword));
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate field 'post_title'"));
    }

    #[test]
    fn test_statuses_require_columns() {
        let mut config = valid_config();
        let users = config.entities.get_mut(&EntityType::User).unwrap();
        users.statuses = vec!["active".to_string()];
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_primary_config_debug_redacts_password() {
        let mut config = valid_config();
        config.primary.password = "super_secret_password_123".to_string();
        let debug_output = format!("{:?}", config.primary);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_password_123"));
    }

    #[test]
    fn test_index_config_debug_redacts_password() {
        let mut config = valid_config();
        config.index.password = Some("super_secret_password_456".to_string());
        let debug_output = format!("{:?}", config.index);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_password_456"));
    }
}
