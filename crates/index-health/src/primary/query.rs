//! SQL builders for the MySQL primary store.
//!
//! Identifiers come from configuration and are validated and backtick-quoted;
//! every value (subtypes, statuses, ids) is bound as a parameter.

use crate::config::EntityConfig;
use crate::core::identifier::quote_mysql;
use crate::core::ALL_SUBTYPES;
use crate::error::Result;

/// Column alias of the id in range queries.
pub const ID_ALIAS: &str = "doc_id";

/// A statement and its string parameters, in placeholder order.
///
/// Range queries append two integer parameters (start id, end id) after these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<String>,
}

/// Column alias of the compared field at `position`.
pub fn field_alias(position: usize) -> String {
    format!("f{}", position)
}

struct Conditions {
    clauses: Vec<String>,
    params: Vec<String>,
}

impl Conditions {
    fn new() -> Self {
        Self {
            clauses: Vec::new(),
            params: Vec::new(),
        }
    }

    fn push_in(&mut self, column: &str, values: &[String]) -> Result<()> {
        let placeholders = vec!["?"; values.len()].join(", ");
        self.clauses
            .push(format!("{} IN ({})", quote_mysql(column)?, placeholders));
        self.params.extend(values.iter().cloned());
        Ok(())
    }

    fn push_raw(&mut self, clause: String) {
        self.clauses.push(clause);
    }

    fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

/// Status filter plus the configured subtype list, the set of rows that should be indexed.
fn indexable(config: &EntityConfig) -> Result<Conditions> {
    let mut conditions = Conditions::new();
    if let Some(column) = &config.status_column {
        if !config.statuses.is_empty() {
            conditions.push_in(column, &config.statuses)?;
        }
    }
    if let Some(column) = &config.subtype_column {
        if !config.subtypes.is_empty() {
            conditions.push_in(column, &config.subtypes)?;
        }
    }
    Ok(conditions)
}

/// Distinct subtypes of indexable rows, sorted.
///
/// Returns `None` when the entity has no subtype column.
pub fn subtypes_query(config: &EntityConfig) -> Result<Option<Statement>> {
    let Some(column) = &config.subtype_column else {
        return Ok(None);
    };
    let column = quote_mysql(column)?;
    let conditions = indexable(config)?;
    Ok(Some(Statement {
        sql: format!(
            "SELECT DISTINCT CAST({col} AS CHAR) AS subtype FROM {table}{filter} ORDER BY subtype",
            col = column,
            table = quote_mysql(&config.table)?,
            filter = conditions.where_sql(),
        ),
        params: conditions.params,
    }))
}

/// Count of indexable rows of `subtype`.
pub fn count_query(config: &EntityConfig, subtype: &str) -> Result<Statement> {
    let mut conditions = indexable(config)?;
    if subtype != ALL_SUBTYPES {
        if let Some(column) = &config.subtype_column {
            conditions.push_raw(format!("{} = ?", quote_mysql(column)?));
            conditions.params.push(subtype.to_string());
        }
    }
    Ok(Statement {
        sql: format!(
            "SELECT CAST(COUNT(*) AS SIGNED) FROM {}{}",
            quote_mysql(&config.table)?,
            conditions.where_sql()
        ),
        params: conditions.params,
    })
}

/// Indexable rows with `start_id <= id <= end_id`, ordered by id.
///
/// Compared columns are read as text under the aliases from [`field_alias`].
pub fn fetch_range_query(config: &EntityConfig) -> Result<Statement> {
    let id = quote_mysql(&config.id_column)?;
    let mut select = vec![format!("CAST({} AS SIGNED) AS {}", id, ID_ALIAS)];
    for (position, field) in config.fields.iter().enumerate() {
        select.push(format!(
            "CAST({} AS CHAR) AS {}",
            quote_mysql(field.primary_column())?,
            field_alias(position)
        ));
    }

    let mut conditions = indexable(config)?;
    conditions.push_raw(format!("{} BETWEEN ? AND ?", id));

    Ok(Statement {
        sql: format!(
            "SELECT {} FROM {}{} ORDER BY {}",
            select.join(", "),
            quote_mysql(&config.table)?,
            conditions.where_sql(),
            id
        ),
        params: conditions.params,
    })
}

/// Highest indexable id, NULL when there is none.
pub fn max_id_query(config: &EntityConfig) -> Result<Statement> {
    let conditions = indexable(config)?;
    Ok(Statement {
        sql: format!(
            "SELECT CAST(MAX({}) AS SIGNED) FROM {}{}",
            quote_mysql(&config.id_column)?,
            quote_mysql(&config.table)?,
            conditions.where_sql()
        ),
        params: conditions.params,
    })
}
