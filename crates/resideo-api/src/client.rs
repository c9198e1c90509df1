// Resideo API HTTP client
//
// Wraps `reqwest::Client` with vendor URL construction, the `apikey` /
// `locationId` query parameters and bearer auth. Endpoint methods live in
// separate files as inherent impls so this module stays about transport.

use std::sync::Arc;

use reqwest::header::RETRY_AFTER;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::auth::TokenSource;
use crate::error::Error;
use crate::models::ErrorResponse;
use crate::transport::TransportConfig;

/// Raw HTTP client for the Resideo cloud API.
///
/// Stateless apart from the shared token source: no retries, no caching.
/// Retry policy belongs to the caller.
#[derive(Clone)]
pub struct ResideoClient {
    http: reqwest::Client,
    base_url: Url,
    consumer_key: SecretString,
    tokens: Arc<dyn TokenSource>,
}

impl ResideoClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the API root (`https://api.honeywell.com/v2/`); a missing
    /// trailing slash is added so relative joins keep the version segment.
    pub fn new(
        base_url: Url,
        consumer_key: SecretString,
        tokens: Arc<dyn TokenSource>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, consumer_key, tokens))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        consumer_key: SecretString,
        tokens: Arc<dyn TokenSource>,
    ) -> Self {
        Self {
            http,
            base_url: normalize_base(base_url),
            consumer_key,
            tokens,
        }
    }

    /// The API root this client talks to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The shared token source.
    pub fn tokens(&self) -> &Arc<dyn TokenSource> {
        &self.tokens
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}{path}` and attach the common query parameters.
    pub(crate) fn url(&self, path: &str, location_id: Option<u64>) -> Result<Url, Error> {
        let mut url = self.base_url.join(path)?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(id) = location_id {
                query.append_pair("locationId", &id.to_string());
            }
            query.append_pair("apikey", self.consumer_key.expose_secret());
        }
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request and deserialize the JSON body.
    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", redact(&url));

        let resp = self
            .http
            .get(url)
            .bearer_auth(self.tokens.access_token().expose_secret())
            .send()
            .await
            .map_err(Error::Transport)?;

        handle_response(resp).await
    }

    /// Send a POST request with a JSON body. The vendor answers writes with
    /// an empty 200, so the body is ignored.
    pub(crate) async fn post(&self, url: Url, body: &impl Serialize) -> Result<(), Error> {
        debug!("POST {}", redact(&url));

        let resp = self
            .http
            .post(url)
            .bearer_auth(self.tokens.access_token().expose_secret())
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;

        handle_empty(resp).await
    }

    /// Send a PUT request with a JSON body.
    pub(crate) async fn put(&self, url: Url, body: &impl Serialize) -> Result<(), Error> {
        debug!("PUT {}", redact(&url));

        let resp = self
            .http
            .put(url)
            .bearer_auth(self.tokens.access_token().expose_secret())
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;

        handle_empty(resp).await
    }
}

// ── Response handling ────────────────────────────────────────────────

async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();
    if !status.is_success() {
        return Err(parse_error(resp).await);
    }

    let body = resp.text().await.map_err(Error::Transport)?;
    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body,
    })
}

async fn handle_empty(resp: reqwest::Response) -> Result<(), Error> {
    if resp.status().is_success() {
        Ok(())
    } else {
        Err(parse_error(resp).await)
    }
}

/// Turn a non-2xx response into the matching status variant.
async fn parse_error(resp: reqwest::Response) -> Error {
    let status = resp.status();
    let retry_after_secs = resp
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .ok()
        .and_then(|e| e.message)
        .unwrap_or_else(|| {
            if body.is_empty() {
                status.canonical_reason().unwrap_or("unknown").to_owned()
            } else {
                body
            }
        });

    Error::from_status(status, message, retry_after_secs)
}

// ── Helpers ──────────────────────────────────────────────────────────

fn normalize_base(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Render a URL for logs without the consumer key.
fn redact(url: &Url) -> String {
    let mut shown = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "apikey" { "***".into() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();
    shown.query_pairs_mut().clear().extend_pairs(pairs);
    shown.to_string()
}
