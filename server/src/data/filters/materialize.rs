//! Result materialization
//!
//! Runs a compiled predicate as a COUNT and a page SELECT and returns
//! `{total, offset, count, items}`.
//!
//! The two queries are separate round trips without a shared snapshot, so
//! under concurrent writes `total` and `items` may disagree. Database errors
//! are returned immediately; nothing is retried.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{FromRow, Sqlite, SqlitePool};

use super::compiler::{BoundParam, CompiledPredicate, SqlValue};
use super::error::FilterError;

/// `limit` value meaning "no limit"
pub const UNBOUNDED_LIMIT: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLimit {
    Bounded(u32),
    /// Every matching row; offset is ignored
    Unbounded,
}

impl PageLimit {
    /// Accepts `1..=max` or the `-1` sentinel
    pub fn from_raw(raw: i64, max: u32) -> Result<Self, FilterError> {
        if raw == UNBOUNDED_LIMIT {
            return Ok(Self::Unbounded);
        }
        match u32::try_from(raw) {
            Ok(limit) if (1..=max).contains(&limit) => Ok(Self::Bounded(limit)),
            _ => Err(FilterError::InvalidPagination(format!(
                "Limit must be between 1 and {}, or {} for no limit",
                max, UNBOUNDED_LIMIT
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for SortDirection {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(FilterError::InvalidPagination(format!(
                "Invalid sort order: {}. Use 'asc' or 'desc'",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

/// Offset, limit and optional sort for one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: u32,
    pub limit: PageLimit,
    pub sort: Option<SortSpec>,
}

impl PageRequest {
    pub fn new(offset: i64, limit: i64, max_limit: u32) -> Result<Self, FilterError> {
        let offset = u32::try_from(offset).map_err(|_| {
            FilterError::InvalidPagination("Offset must be a non-negative integer".to_string())
        })?;
        Ok(Self {
            offset,
            limit: PageLimit::from_raw(limit, max_limit)?,
            sort: None,
        })
    }

    /// Every row, default order
    pub fn unbounded() -> Self {
        Self {
            offset: 0,
            limit: PageLimit::Unbounded,
            sort: None,
        }
    }

    pub fn sorted_by(mut self, sort: Option<SortSpec>) -> Self {
        self.sort = sort;
        self
    }

    /// Offset that is actually applied
    pub fn effective_offset(&self) -> u32 {
        match self.limit {
            PageLimit::Bounded(_) => self.offset,
            PageLimit::Unbounded => 0,
        }
    }
}

/// Table and ordering metadata for one entity
#[derive(Debug, Clone, Copy)]
pub struct QuerySource {
    pub table: &'static str,
    pub alias: &'static str,
    /// Sortable API field to SQL column expression; independent of the filter schema
    pub sortable: &'static [(&'static str, &'static str)],
    pub default_sort: (&'static str, SortDirection),
}

impl QuerySource {
    /// `alias.` as used for column prefixes
    pub fn field_prefix(&self) -> String {
        format!("{}.", self.alias)
    }

    fn order_by(&self, sort: Option<&SortSpec>) -> Result<String, FilterError> {
        let (field, direction) = match sort {
            Some(spec) => (spec.field.as_str(), spec.direction),
            None => self.default_sort,
        };
        let column = self
            .sortable
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, column)| *column)
            .ok_or_else(|| FilterError::InvalidSortField {
                field: field.to_string(),
            })?;
        Ok(format!(
            "{} {}, {}.\"id\" ASC",
            column,
            direction.as_sql(),
            self.alias
        ))
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paginated<T> {
    pub total: u64,
    pub offset: u32,
    pub count: usize,
    pub items: Vec<T>,
}

impl<T> Paginated<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            total: self.total,
            offset: self.offset,
            count: self.count,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}

type SqliteQueryAs<'q, O> = sqlx::query::QueryAs<'q, Sqlite, O, SqliteArguments<'q>>;

fn bind_params<'q, O>(mut query: SqliteQueryAs<'q, O>, params: &[BoundParam]) -> SqliteQueryAs<'q, O> {
    for param in params {
        query = match &param.value {
            SqlValue::Text(s) => query.bind(s.clone()),
            SqlValue::Integer(i) => query.bind(*i),
            SqlValue::Real(f) => query.bind(*f),
        };
    }
    query
}

/// Number of rows matching `predicate`
pub async fn count(
    pool: &SqlitePool,
    source: &QuerySource,
    predicate: &CompiledPredicate,
) -> Result<u64, FilterError> {
    let sql = format!(
        "SELECT COUNT(*) FROM {} {} WHERE {}",
        source.table,
        source.alias,
        predicate.sql()
    );
    tracing::trace!(sql = %sql, "Count query");

    let (total,): (i64,) = bind_params(sqlx::query_as(&sql), predicate.params())
        .fetch_one(pool)
        .await?;
    Ok(u64::try_from(total).unwrap_or(0))
}

/// Count and fetch one page of rows matching `predicate`
pub async fn fetch_paginated<R>(
    pool: &SqlitePool,
    source: &QuerySource,
    predicate: &CompiledPredicate,
    page: &PageRequest,
) -> Result<Paginated<R>, FilterError>
where
    R: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    let order_by = source.order_by(page.sort.as_ref())?;

    let mut sql = format!(
        "SELECT {alias}.* FROM {table} {alias} WHERE {predicate} ORDER BY {order_by}",
        alias = source.alias,
        table = source.table,
        predicate = predicate.sql(),
    );
    let mut query_params = predicate.params().to_vec();
    if let PageLimit::Bounded(limit) = page.limit {
        let next = predicate.next_placeholder();
        sql.push_str(&format!(" LIMIT ?{} OFFSET ?{}", next, next + 1));
        query_params.push(BoundParam {
            name: "limit".to_string(),
            value: SqlValue::Integer(i64::from(limit)),
        });
        query_params.push(BoundParam {
            name: "offset".to_string(),
            value: SqlValue::Integer(i64::from(page.offset)),
        });
    }

    let total = count(pool, source, predicate).await?;

    tracing::trace!(sql = %sql, "Page query");
    let items: Vec<R> = bind_params(sqlx::query_as(&sql), &query_params)
        .fetch_all(pool)
        .await?;

    tracing::debug!(
        table = source.table,
        total,
        count = items.len(),
        "Search materialized"
    );

    Ok(Paginated {
        total,
        offset: page.effective_offset(),
        count: items.len(),
        items,
    })
}
