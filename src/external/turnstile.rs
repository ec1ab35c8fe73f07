use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::TurnstileConfig;
use crate::error::{AppError, AppResult};
use crate::external::verification::HumanCheck;

const VERIFY_ENDPOINT: &str = "https://challenges.cloudflare.com/turnstile/v0/siteverify";

#[derive(Clone)]
pub struct TurnstileService {
    http: Client,
    cfg: TurnstileConfig,
}

impl TurnstileService {
    pub fn new(cfg: TurnstileConfig) -> AppResult<Self> {
        let http = Client::builder()
            .user_agent("lead-intake/turnstile")
            .build()?;
        Ok(Self { http, cfg })
    }

    pub fn is_enabled(&self) -> bool {
        !self.cfg.secret_key.is_empty()
    }

    /// Verifies the token the Turnstile widget produced on the registration page.
    pub async fn verify_token(&self, token: &str, remote_ip: Option<&str>) -> AppResult<()> {
        check_token_shape(token)?;

        let mut req_body = serde_json::json!({
            "secret": self.cfg.secret_key,
            "response": token,
        });

        if let Some(ip) = remote_ip {
            req_body["remoteip"] = serde_json::json!(ip);
        }

        let resp = self
            .http
            .post(VERIFY_ENDPOINT)
            .json(&req_body)
            .send()
            .await?;

        let status = resp.status();
        let body: VerifyResponse = resp.json().await?;

        if !status.is_success() || !body.success {
            let errs = body.error_codes.unwrap_or_default().join(",");
            return Err(AppError::VerificationError(format!(
                "Turnstile verification failed: HTTP {}: {}",
                status.as_u16(),
                errs
            )));
        }

        check_expectations(&self.cfg, &body)
    }
}

fn check_token_shape(token: &str) -> AppResult<()> {
    if token.is_empty() {
        return Err(AppError::ValidationError("Missing Turnstile token".into()));
    }
    if token.len() > 2048 {
        return Err(AppError::ValidationError("Invalid Turnstile token".into()));
    }
    Ok(())
}

fn check_expectations(cfg: &TurnstileConfig, body: &VerifyResponse) -> AppResult<()> {
    if let Some(expected) = &cfg.expected_hostname
        && let Some(host) = body.hostname.as_ref()
        && host != expected
    {
        return Err(AppError::VerificationError("Turnstile hostname mismatch".into()));
    }
    if let Some(expected) = &cfg.expected_action
        && let Some(action) = body.action.as_ref()
        && action != expected
    {
        return Err(AppError::VerificationError("Turnstile action mismatch".into()));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Serialize)]
struct VerifyResponse {
    success: bool,
    #[serde(default)]
    hostname: Option<String>,
    #[serde(rename = "error-codes")]
    #[serde(default)]
    error_codes: Option<Vec<String>>,
    #[serde(default)]
    action: Option<String>,
}

/// Process-wide handle to the Turnstile client.
///
/// The client is built on first use and dropped by [`TurnstileGuard::teardown`] at shutdown.
/// With no secret configured every check passes.
pub struct TurnstileGuard {
    cfg: TurnstileConfig,
    service: RwLock<Option<TurnstileService>>,
}

impl TurnstileGuard {
    pub fn new(cfg: TurnstileConfig) -> Self {
        Self {
            cfg,
            service: RwLock::new(None),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.cfg.secret_key.is_empty()
    }

    pub async fn is_initialized(&self) -> bool {
        self.service.read().await.is_some()
    }

    async fn acquire(&self) -> AppResult<TurnstileService> {
        if let Some(service) = self.service.read().await.as_ref() {
            return Ok(service.clone());
        }

        let mut slot = self.service.write().await;
        if let Some(service) = slot.as_ref() {
            return Ok(service.clone());
        }
        let service = TurnstileService::new(self.cfg.clone())?;
        log::info!("Turnstile client initialized");
        *slot = Some(service.clone());
        Ok(service)
    }

    pub async fn teardown(&self) {
        if self.service.write().await.take().is_some() {
            log::info!("Turnstile client released");
        }
    }
}

#[async_trait]
impl HumanCheck for TurnstileGuard {
    async fn check(&self, token: Option<&str>) -> AppResult<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        let token = token.unwrap_or_default();
        check_token_shape(token)?;

        let service = self.acquire().await?;
        service.verify_token(token, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(secret: &str) -> TurnstileConfig {
        TurnstileConfig {
            secret_key: secret.to_string(),
            expected_hostname: Some("institute.example".into()),
            expected_action: None,
        }
    }

    #[tokio::test]
    async fn test_disabled_guard_passes_without_building_client() {
        let guard = TurnstileGuard::new(cfg(""));
        assert!(guard.check(None).await.is_ok());
        assert!(!guard.is_initialized().await);
    }

    #[tokio::test]
    async fn test_enabled_guard_requires_token() {
        let guard = TurnstileGuard::new(cfg("secret"));
        let err = guard.check(None).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert!(!guard.is_initialized().await);
    }

    #[tokio::test]
    async fn test_acquire_is_lazy_and_teardown_releases() {
        let guard = TurnstileGuard::new(cfg("secret"));
        assert!(!guard.is_initialized().await);
        guard.acquire().await.unwrap();
        assert!(guard.is_initialized().await);
        guard.teardown().await;
        assert!(!guard.is_initialized().await);
    }

    #[test]
    fn test_hostname_mismatch_is_rejected() {
        let body = VerifyResponse {
            success: true,
            hostname: Some("evil.example".into()),
            error_codes: None,
            action: None,
        };
        assert!(check_expectations(&cfg("secret"), &body).is_err());

        let ok = VerifyResponse {
            hostname: Some("institute.example".into()),
            ..body
        };
        assert!(check_expectations(&cfg("secret"), &ok).is_ok());
    }
}
