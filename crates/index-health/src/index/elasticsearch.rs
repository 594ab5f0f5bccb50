//! Elasticsearch search index over its REST API.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::{Config, EntityConfig};
use crate::core::{Document, EntityType, SearchIndex};
use crate::error::{HealthError, Result};
use crate::verify::Window;

use super::query::{count_body, max_id_body, parse_count, parse_hits, parse_max_id, range_body};

/// Elasticsearch client implementing [`SearchIndex`].
pub struct ElasticsearchIndex {
    client: reqwest::Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
    entities: BTreeMap<EntityType, EntityConfig>,
}

impl ElasticsearchIndex {
    /// Create a client for the cluster described by `config.index`.
    pub fn new(config: &Config) -> Result<Self> {
        for (entity, entity_config) in &config.entities {
            validate_index_name(&entity_config.index).map_err(|e| {
                HealthError::Config(format!("entities.{}: {}", entity, e))
            })?;
        }

        let client = reqwest::Client::builder()
            .timeout(config.validation.timeout())
            .build()?;

        info!("Using Elasticsearch index: {}", config.index.base_url());

        Ok(Self {
            client,
            base_url: config.index.base_url().to_string(),
            username: config.index.username.clone(),
            password: config.index.password.clone(),
            entities: config.entities.clone(),
        })
    }

    fn entity(&self, entity: EntityType) -> Result<&EntityConfig> {
        self.entities.get(&entity).ok_or_else(|| {
            HealthError::Config(format!("entity '{}' is not configured", entity))
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.username {
            Some(username) => request.basic_auth(username, self.password.as_ref()),
            None => request,
        }
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("POST {} {}", url, body);
        let response = self
            .authorize(self.client.post(&url))
            .json(body)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn parse_response(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HealthError::IndexResponse {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<Value>().await?)
    }
}

/// Index names are spliced into request paths.
fn validate_index_name(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() {
        return Err("index name cannot be empty".into());
    }
    if name
        .chars()
        .any(|c| matches!(c, '/' | '?' | '#' | '"' | '\\') || c.is_whitespace() || c.is_control())
    {
        return Err(format!("invalid index name {:?}", name));
    }
    Ok(())
}

#[async_trait]
impl SearchIndex for ElasticsearchIndex {
    async fn count(&self, entity: EntityType, subtype: &str) -> Result<u64> {
        let config = self.entity(entity)?;
        let response = self
            .post_json(&format!("{}/_count", config.index), &count_body(config, subtype))
            .await?;
        parse_count(&response)
    }

    async fn fetch_range(&self, entity: EntityType, window: Window) -> Result<Vec<Document>> {
        let config = self.entity(entity)?;
        let response = self
            .post_json(&format!("{}/_search", config.index), &range_body(config, window))
            .await?;
        parse_hits(config, &response)
    }

    async fn max_id(&self, entity: EntityType) -> Result<Option<i64>> {
        let config = self.entity(entity)?;
        let response = self
            .post_json(&format!("{}/_search", config.index), &max_id_body(config))
            .await?;
        parse_max_id(&response)
    }

    async fn ping(&self) -> Result<()> {
        let response = self
            .authorize(self.client.get(format!("{}/", self.base_url)))
            .send()
            .await?;
        Self::parse_response(response).await.map(|_| ())
    }

    fn store_type(&self) -> &str {
        "elasticsearch"
    }
}
