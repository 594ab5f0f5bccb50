//! Search index (Elasticsearch) access.

mod elasticsearch;
pub mod query;

pub use elasticsearch::ElasticsearchIndex;
