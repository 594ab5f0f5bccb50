//! Elasticsearch request bodies and response parsing.

use serde_json::{json, Value};

use crate::config::EntityConfig;
use crate::core::{Document, FieldValue, ALL_SUBTYPES};
use crate::error::{HealthError, Result};
use crate::verify::Window;

const MAX_ID_AGG: &str = "max_id";

/// Filters selecting the documents that mirror indexable database rows,
/// optionally narrowed to one subtype.
fn filters(config: &EntityConfig, subtype: Option<&str>) -> Vec<Value> {
    let mut filters = Vec::new();
    if let Some(field) = &config.index_status_field {
        if !config.statuses.is_empty() {
            filters.push(json!({ "terms": { field.as_str(): config.statuses } }));
        }
    }
    if let Some(field) = &config.index_subtype_field {
        if !config.subtypes.is_empty() {
            filters.push(json!({ "terms": { field.as_str(): config.subtypes } }));
        }
        if let Some(subtype) = subtype.filter(|s| *s != ALL_SUBTYPES) {
            filters.push(json!({ "term": { field.as_str(): subtype } }));
        }
    }
    filters
}

fn bool_query(filters: Vec<Value>) -> Value {
    if filters.is_empty() {
        json!({ "match_all": {} })
    } else {
        json!({ "bool": { "filter": filters } })
    }
}

/// Body for `_count`.
pub fn count_body(config: &EntityConfig, subtype: &str) -> Value {
    json!({ "query": bool_query(filters(config, Some(subtype))) })
}

/// Body for `_search` returning every document of `window`, sorted by id.
pub fn range_body(config: &EntityConfig, window: Window) -> Value {
    let mut query_filters = filters(config, None);
    query_filters.push(json!({
        "range": { config.index_id_field.as_str(): { "gte": window.start_id, "lte": window.end_id } }
    }));

    let mut source: Vec<&str> = vec![config.index_id_field.as_str()];
    source.extend(config.fields.iter().map(|field| field.index_field()));

    json!({
        "size": window.size(),
        "query": bool_query(query_filters),
        "sort": [{ config.index_id_field.as_str(): "asc" }],
        "_source": source,
    })
}

/// Body for `_search` returning only the highest id.
pub fn max_id_body(config: &EntityConfig) -> Value {
    json!({
        "size": 0,
        "query": bool_query(filters(config, None)),
        "aggs": { MAX_ID_AGG: { "max": { "field": config.index_id_field.as_str() } } },
    })
}

/// Value at a dotted path, preferring a literal dotted key when present.
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if let Some(found) = value.get(path) {
        return Some(found);
    }
    path.split('.').try_fold(value, |current, segment| current.get(segment))
}

/// Total from a `_count` response.
pub fn parse_count(response: &Value) -> Result<u64> {
    response
        .get("count")
        .and_then(Value::as_u64)
        .ok_or_else(|| HealthError::IndexPayload("_count response has no 'count'".into()))
}

/// Documents from a `_search` response.
pub fn parse_hits(config: &EntityConfig, response: &Value) -> Result<Vec<Document>> {
    let hits = lookup_path(response, "hits.hits")
        .and_then(Value::as_array)
        .ok_or_else(|| HealthError::IndexPayload("_search response has no 'hits.hits'".into()))?;

    let mut documents = Vec::with_capacity(hits.len());
    for hit in hits {
        let source = hit.get("_source").unwrap_or(&Value::Null);
        let id = lookup_path(source, &config.index_id_field)
            .and_then(as_id)
            .or_else(|| hit.get("_id").and_then(as_id))
            .ok_or_else(|| {
                HealthError::IndexPayload(format!(
                    "hit without a numeric '{}': {}",
                    config.index_id_field, hit
                ))
            })?;

        let mut document = Document::new(id);
        for field in &config.fields {
            let value = lookup_path(source, field.index_field())
                .cloned()
                .map(FieldValue::from)
                .unwrap_or(FieldValue::Null);
            document.fields.insert(field.name.clone(), value);
        }
        documents.push(document);
    }
    Ok(documents)
}

/// Highest id from a `max_id_body` response, `None` for an empty index.
pub fn parse_max_id(response: &Value) -> Result<Option<i64>> {
    let value = response
        .get("aggregations")
        .and_then(|aggs| aggs.get(MAX_ID_AGG))
        .and_then(|agg| agg.get("value"))
        .ok_or_else(|| HealthError::IndexPayload("search response has no max id aggregation".into()))?;
    Ok(value.as_f64().map(|max| max as i64))
}

fn as_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Array(items) if items.len() == 1 => as_id(&items[0]),
        _ => None,
    }
}
