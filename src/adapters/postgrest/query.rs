//! Query-string builder for PostgREST table endpoints.
//!
//! Filters use PostgREST's operator syntax (`column=eq.value`). Values are
//! URL-encoded by reqwest when the parameters are attached.

/// A table request: path plus query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    table: &'static str,
    params: Vec<(String, String)>,
}

impl Query {
    pub fn table(table: &'static str) -> Self {
        Self {
            table,
            params: Vec::new(),
        }
    }

    pub fn select(self, columns: &str) -> Self {
        self.param("select", columns)
    }

    pub fn eq(self, column: &str, value: impl std::fmt::Display) -> Self {
        let filter = format!("eq.{}", value);
        self.param(column, filter)
    }

    pub fn lte(self, column: &str, value: impl std::fmt::Display) -> Self {
        let filter = format!("lte.{}", value);
        self.param(column, filter)
    }

    pub fn order_desc(self, column: &str) -> Self {
        let order = format!("{}.desc", column);
        self.param("order", order)
    }

    pub fn limit(self, limit: u32) -> Self {
        self.param("limit", limit.to_string())
    }

    /// Conflict target for upserts.
    pub fn on_conflict(self, columns: &str) -> Self {
        self.param("on_conflict", columns)
    }

    fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.push((key.to_string(), value.into()));
        self
    }

    pub fn path(&self) -> String {
        format!("/rest/v1/{}", self.table)
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }
}
