use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::UniChemSettings;
use crate::error::KinanError;
use crate::inchikey::InchiKey;

/// One compound id assigned to an InChIKey by a UniChem source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCompound {
    pub src_id: String,
    pub src_compound_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found(Vec<SourceCompound>),
    /// UniChem answered with an error payload, e.g. the key is not present.
    NotFound(String),
}

pub trait UniChemClient: Send + Sync {
    fn lookup(&self, inchikey: &InchiKey) -> Result<LookupOutcome, KinanError>;
}

#[derive(Clone)]
pub struct UniChemHttpClient {
    client: Client,
    base_url: String,
    max_retries: usize,
    backoff: Duration,
}

impl UniChemHttpClient {
    pub fn new(settings: &UniChemSettings) -> Result<Self, KinanError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kinan/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| KinanError::UniChemHttp(err.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|err| KinanError::UniChemHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            max_retries: settings.max_retries,
            backoff: Duration::from_millis(settings.backoff_ms),
        })
    }

    pub fn lookup_url(&self, inchikey: &InchiKey) -> String {
        format!("{}/inchikey/{}", self.base_url, inchikey.as_str())
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, KinanError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < self.max_retries && is_retryable_status(status) {
                        debug!(status, attempt, "retrying UniChem request");
                        std::thread::sleep(self.delay(attempt));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < self.max_retries && is_retryable_error(&err) {
                        debug!(attempt, "retrying UniChem request: {err}");
                        std::thread::sleep(self.delay(attempt));
                        attempt += 1;
                        continue;
                    }
                    return Err(KinanError::UniChemHttp(err.to_string()));
                }
            }
        }
    }

    /// Doubles with every attempt.
    fn delay(&self, attempt: usize) -> Duration {
        self.backoff
            .saturating_mul(2u32.saturating_pow(attempt as u32))
    }
}

impl UniChemClient for UniChemHttpClient {
    fn lookup(&self, inchikey: &InchiKey) -> Result<LookupOutcome, KinanError> {
        let url = self.lookup_url(inchikey);
        let response = self.send_with_retries(|| self.client.get(&url))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|err| KinanError::UniChemHttp(err.to_string()))?;

        if status.is_success() || status == StatusCode::NOT_FOUND {
            if let Ok(payload) = serde_json::from_str::<Value>(&body) {
                return parse_lookup_response(&payload);
            }
        }
        Err(KinanError::UniChemStatus {
            status: status.as_u16(),
            message: body,
        })
    }
}

/// Interprets a UniChem `inchikey` response body.
///
/// A list of `{src_id, src_compound_id}` objects is a hit; an object with an
/// `error` field is an explicit "not found".
pub fn parse_lookup_response(payload: &Value) -> Result<LookupOutcome, KinanError> {
    if let Some(message) = payload.get("error") {
        let message = message
            .as_str()
            .map(|text| text.trim().to_string())
            .unwrap_or_else(|| message.to_string());
        return Ok(LookupOutcome::NotFound(message));
    }

    let items = payload
        .as_array()
        .ok_or_else(|| KinanError::UniChemPayload(payload.to_string()))?;
    let compounds = items
        .iter()
        .filter_map(|item| {
            let src_id = scalar(item.get("src_id")?)?;
            let src_compound_id = scalar(item.get("src_compound_id")?)?;
            Some(SourceCompound {
                src_id,
                src_compound_id,
            })
        })
        .collect();
    Ok(LookupOutcome::Found(compounds))
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
