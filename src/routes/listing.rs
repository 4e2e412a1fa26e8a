//! Filtered, paginated listings built with `sqlx::QueryBuilder`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use utoipa::IntoParams;

use crate::catalog::CategoryOptions;
use crate::context::ViewContext;
use crate::pagination::{Page, PageRequest};

/// Query string accepted by list endpoints. Filters a category does not
/// support, and blank values, are ignored.
#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListParams {
    /// Case-insensitive substring match over the category's text columns.
    pub search: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// `1`/`0`
    pub featured: Option<String>,
    /// `1`/`0`
    pub active: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl ListParams {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.per_page)
    }
}

/// A list response: one page of items, the applied filters, the option
/// tables for filter controls and the viewer's context.
#[derive(Debug, Serialize)]
pub struct Listing<T: Serialize> {
    #[serde(flatten)]
    pub page: Page<T>,
    pub filters: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<CategoryOptions>,
    pub context: ViewContext,
}

#[derive(Debug, Serialize)]
pub struct Detail<T: Serialize> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<CategoryOptions>,
    pub context: ViewContext,
}

/// Confirmation returned by mutations.
#[derive(Debug, Serialize)]
pub struct Flash<T: Serialize> {
    pub message: String,
    pub data: T,
}

impl<T: Serialize> Flash<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data,
        }
    }
}

enum Clause<'a> {
    Equals(&'a str, String),
    Flag(&'a str, bool),
}

/// Describes one listing query. Filters are echoed in the order they are added.
pub struct ListSpec<'a> {
    from: &'a str,
    columns: &'a str,
    order_by: &'a str,
    conditions: Vec<&'a str>,
    search_columns: &'a [&'a str],
    search: Option<String>,
    clauses: Vec<Clause<'a>>,
    applied: Vec<(String, String)>,
}

impl<'a> ListSpec<'a> {
    pub fn new(from: &'a str, columns: &'a str, order_by: &'a str) -> Self {
        Self {
            from,
            columns,
            order_by,
            conditions: Vec::new(),
            search_columns: &[],
            search: None,
            clauses: Vec::new(),
            applied: Vec::new(),
        }
    }

    /// Fixed SQL condition, not echoed.
    pub fn condition(mut self, sql: &'a str) -> Self {
        self.conditions.push(sql);
        self
    }

    pub fn search(mut self, columns: &'a [&'a str], term: Option<&str>) -> Self {
        if let Some(term) = non_blank(term) {
            if !columns.is_empty() {
                self.search_columns = columns;
                self.search = Some(term.to_string());
                self.applied.push(("search".to_string(), term.to_string()));
            }
        }
        self
    }

    pub fn equals(mut self, param: &str, column: &'a str, value: Option<&str>) -> Self {
        if let Some(value) = non_blank(value) {
            self.clauses.push(Clause::Equals(column, value.to_string()));
            self.applied.push((param.to_string(), value.to_string()));
        }
        self
    }

    /// Boolean filter; values other than `1/0/true/false` are ignored.
    pub fn flag(mut self, param: &str, column: &'a str, value: Option<&str>) -> Self {
        if let Some(parsed) = non_blank(value).and_then(parse_flag) {
            self.clauses.push(Clause::Flag(column, parsed));
            self.applied.push((param.to_string(), if parsed { "1" } else { "0" }.to_string()));
        }
        self
    }

    pub fn applied(&self) -> &[(String, String)] {
        &self.applied
    }

    pub fn applied_map(&self) -> BTreeMap<String, String> {
        self.applied.iter().cloned().collect()
    }

    fn push_where(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        qb.push(" WHERE 1 = 1");
        for condition in &self.conditions {
            qb.push(" AND ").push(*condition);
        }
        if let Some(term) = &self.search {
            let pattern = format!("%{}%", term);
            qb.push(" AND (");
            for (i, column) in self.search_columns.iter().enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                qb.push(*column).push(" LIKE ").push_bind(pattern.clone());
            }
            qb.push(")");
        }
        for clause in &self.clauses {
            match clause {
                Clause::Equals(column, value) => {
                    qb.push(" AND ").push(*column).push(" = ").push_bind(value.clone());
                }
                Clause::Flag(column, value) => {
                    qb.push(" AND ").push(*column).push(" = ").push_bind(*value);
                }
            }
        }
    }

    pub async fn count(&self, pool: &SqlitePool) -> Result<u64, sqlx::Error> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT COUNT(*) FROM {}", self.from));
        self.push_where(&mut qb);
        let total: i64 = qb.build_query_scalar().fetch_one(pool).await?;
        Ok(total.max(0) as u64)
    }

    pub async fn fetch<R>(&self, pool: &SqlitePool, page: PageRequest) -> Result<(Vec<R>, u64), sqlx::Error>
    where
        R: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        let total = self.count(pool).await?;

        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM {}", self.columns, self.from));
        self.push_where(&mut qb);
        qb.push(" ORDER BY ").push(self.order_by);
        qb.push(" LIMIT ").push_bind(page.limit());
        qb.push(" OFFSET ").push_bind(page.offset());

        let rows = qb.build_query_as::<R>().fetch_all(pool).await?;
        Ok((rows, total))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_unparseable_filters_are_not_applied() {
        let spec = ListSpec::new("news", "*", "id")
            .search(&["title"], Some("  "))
            .equals("category", "category", Some(""))
            .flag("featured", "is_featured", Some("maybe"))
            .flag("active", "is_active", Some("true"));
        assert_eq!(spec.applied(), &[("active".to_string(), "1".to_string())]);
    }

    #[test]
    fn where_clause_binds_every_value() {
        let spec = ListSpec::new("news", "*", "id")
            .condition("deleted_at IS NULL")
            .search(&["title", "content"], Some("flood"))
            .equals("category", "category", Some("advisory"));

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM news");
        spec.push_where(&mut qb);
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM news WHERE 1 = 1 AND deleted_at IS NULL AND (title LIKE ? OR content LIKE ?) AND category = ?"
        );
    }
}
