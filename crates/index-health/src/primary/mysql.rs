//! MySQL/MariaDB primary store.
//!
//! Implements [`PrimaryStore`] over an SQLx connection pool. Table layout per
//! entity comes from [`EntityConfig`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow, MySqlSslMode};
use sqlx::Row;
use tracing::{debug, info};

use crate::config::{Config, EntityConfig};
use crate::core::{Document, EntityType, FieldValue, PrimaryStore, ALL_SUBTYPES};
use crate::error::{HealthError, Result};
use crate::verify::Window;

use super::query::{
    count_query, fetch_range_query, field_alias, max_id_query, subtypes_query, Statement, ID_ALIAS,
};

/// MySQL/MariaDB primary store.
pub struct MysqlStore {
    pool: MySqlPool,
    entities: BTreeMap<EntityType, EntityConfig>,
}

impl MysqlStore {
    /// Create the pool for the database described by `config.primary`.
    ///
    /// Connections are opened on first use, so an unreachable server surfaces
    /// as a fetch error of the first query (or a failed [`PrimaryStore::ping`]).
    pub async fn connect(config: &Config) -> Result<Self> {
        let ssl_mode = if config.primary.require_tls {
            MySqlSslMode::Required
        } else {
            MySqlSslMode::Preferred
        };

        let options = MySqlConnectOptions::new()
            .host(&config.primary.host)
            .port(config.primary.port)
            .database(&config.primary.database)
            .username(&config.primary.user)
            .password(&config.primary.password)
            .ssl_mode(ssl_mode);

        let pool = MySqlPoolOptions::new()
            .max_connections(config.primary.max_connections)
            .acquire_timeout(config.validation.timeout())
            .connect_lazy_with(options);

        info!("Using MySQL primary: {}", config.primary.display_url());

        Ok(Self {
            pool,
            entities: config.entities.clone(),
        })
    }

    fn entity(&self, entity: EntityType) -> Result<&EntityConfig> {
        self.entities.get(&entity).ok_or_else(|| {
            HealthError::Config(format!("entity '{}' is not configured", entity))
        })
    }

    async fn scalar<T>(&self, statement: &Statement) -> Result<T>
    where
        T: Send + Unpin,
        (T,): for<'r> sqlx::FromRow<'r, MySqlRow>,
    {
        let mut query = sqlx::query_scalar::<_, T>(&statement.sql);
        for param in &statement.params {
            query = query.bind(param.as_str());
        }
        Ok(query.fetch_one(&self.pool).await?)
    }
}

#[async_trait]
impl PrimaryStore for MysqlStore {
    async fn subtypes(&self, entity: EntityType) -> Result<Vec<String>> {
        let config = self.entity(entity)?;
        if !config.subtypes.is_empty() {
            return Ok(config.subtypes.clone());
        }
        let Some(statement) = subtypes_query(config)? else {
            return Ok(vec![ALL_SUBTYPES.to_string()]);
        };

        let mut query = sqlx::query_scalar::<_, Option<String>>(&statement.sql);
        for param in &statement.params {
            query = query.bind(param.as_str());
        }
        let subtypes: Vec<String> = query
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .flatten()
            .collect();

        debug!("{} subtypes: {:?}", entity, subtypes);
        Ok(subtypes)
    }

    async fn count(&self, entity: EntityType, subtype: &str) -> Result<u64> {
        let statement = count_query(self.entity(entity)?, subtype)?;
        let count: i64 = self.scalar(&statement).await?;
        Ok(count.max(0) as u64)
    }

    async fn fetch_range(&self, entity: EntityType, window: Window) -> Result<Vec<Document>> {
        let config = self.entity(entity)?;
        let statement = fetch_range_query(config)?;

        let mut query = sqlx::query(&statement.sql);
        for param in &statement.params {
            query = query.bind(param.as_str());
        }
        let rows: Vec<MySqlRow> = query
            .bind(window.start_id)
            .bind(window.end_id)
            .fetch_all(&self.pool)
            .await?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            let mut document = Document::new(row.try_get::<i64, _>(ID_ALIAS)?);
            for (position, field) in config.fields.iter().enumerate() {
                let value: Option<String> = row.try_get(field_alias(position).as_str())?;
                document
                    .fields
                    .insert(field.name.clone(), FieldValue::from(value));
            }
            documents.push(document);
        }
        Ok(documents)
    }

    async fn max_id(&self, entity: EntityType) -> Result<Option<i64>> {
        let statement = max_id_query(self.entity(entity)?)?;
        self.scalar::<Option<i64>>(&statement).await
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn store_type(&self) -> &str {
        "mysql"
    }
}
