// src/store/rest.rs

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, ClientBuilder, Response, StatusCode,
};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

use super::{Filter, Row, Store, StoreError};

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 250;

/// Postgres `undefined_table`, and PostgREST's "table not in schema cache".
const UNDEFINED_RELATION_CODES: &[&str] = &["42P01", "PGRST205"];

static RELATION_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:relation|table) ['"]([^'"]+)['"]"#).expect("relation-name regex is valid")
});

/// Error body returned by the REST layer.
#[derive(Debug, Default, Deserialize)]
struct ApiError {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

/// Store backed by a PostgREST-compatible HTTP API (`<base>/rest/v1/<table>`).
#[derive(Clone)]
pub struct RestStore {
    client: Client,
    rest_url: Url,
}

impl RestStore {
    /// `base_url` may be the project root or the `/rest/v1` root itself.
    pub fn new(base_url: &Url, api_key: &str) -> Result<Self> {
        let client = client_builder(api_key)?
            .build()
            .context("building HTTP client for the store")?;
        Ok(Self::with_client(client, base_url))
    }

    /// Use a preconfigured client. It must already send the auth headers.
    pub fn with_client(client: Client, base_url: &Url) -> Self {
        Self {
            client,
            rest_url: rest_root(base_url),
        }
    }

    fn table_url(&self, table: &str) -> Result<Url, StoreError> {
        self.rest_url
            .join(table)
            .map_err(|e| StoreError::InvalidResponse(format!("bad table name `{}`: {}", table, e)))
    }

    /// GET with retries on transport failures. Store-level errors are not retried.
    async fn get_with_retry(&self, table: &str, url: Url) -> Result<Response, StoreError> {
        let mut attempts = 0;
        loop {
            match self.client.get(url.clone()).send().await {
                Ok(resp) => return check(table, resp).await,
                Err(e) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempts - 1);
                    warn!(%url, attempt = attempts, delay_ms = backoff, error = %e, "retrying store read");
                    sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[async_trait]
impl Store for RestStore {
    async fn upsert(
        &self,
        table: &str,
        rows: &[Row],
        conflict_key: &str,
    ) -> Result<(), StoreError> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut().append_pair("on_conflict", conflict_key);
        debug!(%url, rows = rows.len(), "upsert");

        let resp = self
            .client
            .post(url)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(rows)
            .send()
            .await?;
        check(table, resp).await.map(|_| ())
    }

    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Row>, StoreError> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair(&filter.column, &format!("eq.{}", filter.value));
        debug!(%url, "select");

        let resp = self.get_with_retry(table, url).await?;
        resp.json::<Vec<Row>>()
            .await
            .map_err(|e| StoreError::InvalidResponse(format!("decoding rows of `{}`: {}", table, e)))
    }

    async fn probe(&self, table: &str) -> Result<(), StoreError> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("limit", "0");
        self.get_with_retry(table, url).await.map(|_| ())
    }
}

/// Client builder carrying the store's auth and content headers.
pub fn client_builder(api_key: &str) -> Result<ClientBuilder> {
    let mut headers = HeaderMap::new();
    let key = HeaderValue::from_str(api_key).context("store key is not a valid header value")?;
    let bearer = HeaderValue::from_str(&format!("Bearer {}", api_key))
        .context("store key is not a valid header value")?;
    headers.insert("apikey", key);
    headers.insert(AUTHORIZATION, bearer);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(Client::builder().default_headers(headers))
}

/// Normalise the configured endpoint to the `/rest/v1/` root, with a trailing
/// slash so `join` appends table names.
fn rest_root(base: &Url) -> Url {
    let mut url = base.clone();
    let path = url.path().trim_end_matches('/').to_string();
    let path = if path.ends_with("/rest/v1") {
        format!("{}/", path)
    } else {
        format!("{}/rest/v1/", path)
    };
    url.set_path(&path);
    url.set_query(None);
    url
}

async fn check(table: &str, resp: Response) -> Result<Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(classify(table, status, &body))
}

/// Map an error response to a `StoreError`, singling out missing relations.
fn classify(table: &str, status: StatusCode, body: &str) -> StoreError {
    let api: ApiError = serde_json::from_str(body).unwrap_or_default();
    let mut message = api
        .message
        .clone()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.to_string()
            } else {
                body.trim().to_string()
            }
        });
    if let Some(details) = api.details.as_deref().filter(|d| !d.is_empty()) {
        message = format!("{} ({})", message, details);
    }
    if let Some(hint) = api.hint.as_deref().filter(|h| !h.is_empty()) {
        message = format!("{}; hint: {}", message, hint);
    }

    let undefined = api
        .code
        .as_deref()
        .map_or(false, |c| UNDEFINED_RELATION_CODES.contains(&c));
    if undefined {
        let relation = RELATION_NAME
            .captures(&message)
            .map(|c| c[1].to_string())
            .unwrap_or_else(|| table.to_string());
        return StoreError::UndefinedRelation { relation, message };
    }

    StoreError::Rejected {
        status: status.as_u16(),
        code: api.code,
        message,
    }
}
