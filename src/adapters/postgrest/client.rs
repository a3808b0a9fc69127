//! Thin reqwest client for a PostgREST gateway.
//!
//! Authenticates with the service-role key (`apikey` header plus bearer
//! token) and always asks for JSON representations back.

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::foundation::{DomainError, ErrorCode};

use super::query::Query;

/// PostgREST client.
#[derive(Clone)]
pub struct PostgrestClient {
    base_url: String,
    service_key: SecretString,
    http: reqwest::Client,
}

/// Error body returned by PostgREST.
#[derive(Debug, serde::Deserialize)]
struct PostgrestErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

impl PostgrestClient {
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: SecretString::new(service_key.into()),
            http: reqwest::Client::new(),
        }
    }

    fn request(&self, method: reqwest::Method, query: &Query) -> reqwest::RequestBuilder {
        let key = self.service_key.expose_secret();
        self.http
            .request(method, format!("{}{}", self.base_url, query.path()))
            .query(query.params())
            .header("apikey", key.as_str())
            .bearer_auth(key)
    }

    /// `GET` rows matching the query.
    pub async fn select<T: DeserializeOwned>(&self, query: &Query) -> Result<Vec<T>, DomainError> {
        self.execute("select", self.request(reqwest::Method::GET, query))
            .await
    }

    /// `POST` rows. `resolution` is the upsert strategy for the `Prefer`
    /// header (`merge-duplicates` or `ignore-duplicates`).
    pub async fn insert<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        query: &Query,
        body: &B,
        resolution: &str,
    ) -> Result<Vec<T>, DomainError> {
        let prefer = format!("resolution={},return=representation", resolution);
        self.execute(
            "insert",
            self.request(reqwest::Method::POST, query)
                .header("Prefer", prefer)
                .json(body),
        )
        .await
    }

    /// `PATCH` rows matching the query; returns the rows updated.
    pub async fn update<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        query: &Query,
        body: &B,
    ) -> Result<Vec<T>, DomainError> {
        self.execute(
            "update",
            self.request(reqwest::Method::PATCH, query)
                .header("Prefer", "return=representation")
                .json(body),
        )
        .await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<Vec<T>, DomainError> {
        let response = request.send().await.map_err(|e| {
            DomainError::new(
                ErrorCode::StoreUnavailable,
                format!("Record store unreachable: {}", e),
            )
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            DomainError::new(
                ErrorCode::StoreUnavailable,
                format!("Failed to read record store response: {}", e),
            )
        })?;

        if !status.is_success() {
            let error = error_from_response(status.as_u16(), &body);
            tracing::error!(
                operation,
                status = status.as_u16(),
                error = %error,
                "Record store request failed"
            );
            return Err(error);
        }

        parse_rows(&body)
    }
}

fn parse_rows<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, DomainError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(body)
        .map_err(|e| DomainError::database(format!("Invalid record store response: {}", e)))
}

/// Map a PostgREST failure onto the store error codes.
fn error_from_response(status: u16, body: &str) -> DomainError {
    let parsed = serde_json::from_str::<PostgrestErrorBody>(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|p| p.message.clone())
        .unwrap_or_else(|| format!("HTTP {}: {}", status, body));

    let code = match status {
        409 => ErrorCode::Conflict,
        502..=504 => ErrorCode::StoreUnavailable,
        _ => ErrorCode::DatabaseError,
    };

    let error = DomainError::new(code, message);
    match parsed.and_then(|p| p.code) {
        Some(pg_code) => error.with_detail("pg_code", pg_code),
        None => error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::rows::ProfileRow;

    #[test]
    fn unique_violation_maps_to_conflict() {
        let body = r#"{"code":"23505","message":"duplicate key value violates unique constraint \"customers_stripe_customer_id_key\""}"#;
        let err = error_from_response(409, body);

        assert_eq!(err.code, ErrorCode::Conflict);
        assert!(err.message.contains("customers_stripe_customer_id_key"));
        assert_eq!(err.details.get("pg_code").map(String::as_str), Some("23505"));
    }

    #[test]
    fn gateway_errors_are_unavailable() {
        let err = error_from_response(503, "upstream connect error");
        assert_eq!(err.code, ErrorCode::StoreUnavailable);
        assert!(err.message.contains("503"));
    }

    #[test]
    fn other_failures_are_database_errors() {
        let err = error_from_response(400, r#"{"message":"column \"nope\" does not exist"}"#);
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[test]
    fn empty_body_is_no_rows() {
        let rows: Vec<ProfileRow> = parse_rows("").unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn parses_row_array() {
        let rows: Vec<ProfileRow> =
            parse_rows(r#"[{"id":"u1","stripe_customer_id":"cus_1","role":"member"}]"#).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].stripe_customer_id.as_deref(), Some("cus_1"));
    }

    #[test]
    fn base_url_is_normalized() {
        let client = PostgrestClient::new("https://db.example.co/", "key");
        assert_eq!(client.base_url, "https://db.example.co");
    }
}
