use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;

use crate::config::LeadStoreConfig;
use crate::error::{AppError, AppResult};
use crate::models::{LeadDraft, LeadRecord};

pub const GENERIC_STORE_ERROR: &str = "Something went wrong. Please try again.";

/// Backend that persists leads.
#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn create(&self, draft: &LeadDraft) -> AppResult<()>;

    async fn list_all(&self) -> AppResult<Vec<LeadRecord>>;
}

/// The store answers either with a bare array or with an envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListPayload {
    Records(Vec<LeadRecord>),
    Envelope(StoreEnvelope<Vec<LeadRecord>>),
}

#[derive(Debug, Deserialize)]
struct StoreEnvelope<T> {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default, alias = "leads")]
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

fn default_success() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

/// Pulls a human readable message out of an error body, if the store sent one.
fn store_error_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed
        .message
        .or_else(|| match parsed.error {
            Some(serde_json::Value::String(s)) => Some(s),
            Some(serde_json::Value::Object(map)) => map
                .get("message")
                .and_then(|m| m.as_str())
                .map(|s| s.to_string()),
            _ => None,
        })
        .filter(|m| !m.trim().is_empty())
}

/// Rejected credentials are not worth retrying; anything else may be transient.
fn list_failure(status: StatusCode, body: &str) -> AppError {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        log::error!("Lead store refused credentials: HTTP {}", status.as_u16());
        return AppError::AuthError(
            store_error_message(body)
                .unwrap_or_else(|| "Lead store refused the configured API key".to_string()),
        );
    }
    AppError::LoadError(
        store_error_message(body)
            .unwrap_or_else(|| format!("Failed to load leads (HTTP {})", status.as_u16())),
    )
}

fn parse_list(body: &str) -> AppResult<Vec<LeadRecord>> {
    match serde_json::from_str::<ListPayload>(body)? {
        ListPayload::Records(records) => Ok(records),
        ListPayload::Envelope(envelope) => {
            if !envelope.success {
                return Err(AppError::LoadError(
                    envelope
                        .message
                        .unwrap_or_else(|| "Failed to load leads".to_string()),
                ));
            }
            // An object without a list is an error body, never an empty page
            envelope.data.ok_or_else(|| {
                AppError::LoadError(
                    store_error_message(body).unwrap_or_else(|| "Failed to load leads".to_string()),
                )
            })
        }
    }
}

pub struct HttpLeadStore {
    client: Client,
    config: LeadStoreConfig,
}

impl HttpLeadStore {
    pub fn new(config: LeadStoreConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn leads_url(&self) -> String {
        format!("{}/leads", self.config.base_url.trim_end_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl LeadStore for HttpLeadStore {
    async fn create(&self, draft: &LeadDraft) -> AppResult<()> {
        let response = self
            .authorize(self.client.post(self.leads_url()))
            .json(draft)
            .send()
            .await
            .map_err(|e| {
                log::error!("Lead store unreachable: {}", e);
                AppError::StoreError(GENERIC_STORE_ERROR.to_string())
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            // Some deployments answer 200 with {"success": false, ...}
            if let Ok(envelope) = serde_json::from_str::<StoreEnvelope<serde_json::Value>>(&body)
                && !envelope.success
            {
                return Err(AppError::StoreError(
                    envelope
                        .message
                        .unwrap_or_else(|| GENERIC_STORE_ERROR.to_string()),
                ));
            }
            log::info!("Lead stored: {}", draft.phone_number);
            Ok(())
        } else {
            log::error!("Lead store rejected lead: HTTP {}: {}", status.as_u16(), body);
            Err(AppError::StoreError(
                store_error_message(&body).unwrap_or_else(|| GENERIC_STORE_ERROR.to_string()),
            ))
        }
    }

    async fn list_all(&self) -> AppResult<Vec<LeadRecord>> {
        let response = self
            .authorize(self.client.get(self.leads_url()))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(list_failure(status, &body));
        }

        parse_list(&body)
    }
}
