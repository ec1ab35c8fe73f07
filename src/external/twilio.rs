use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::TwilioConfig;
use crate::error::{AppError, AppResult};
use crate::external::verification::VerificationService;
use crate::models::ChallengeHandle;
use crate::utils::generate_six_digit_code;

const VERIFY_BASE_URL: &str = "https://verify.twilio.com/v2";
const MESSAGES_BASE_URL: &str = "https://api.twilio.com/2010-04-01";
const CODE_TTL_MINUTES: i64 = 5;
const RESEND_INTERVAL_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct VerificationResponse {
    sid: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct TwilioErrorBody {
    message: Option<String>,
}

fn twilio_error_message(body: &str) -> String {
    serde_json::from_str::<TwilioErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| body.to_string())
}

/// Twilio Verify: Twilio generates, delivers and checks the passcode.
#[derive(Clone)]
pub struct TwilioVerifyService {
    client: Client,
    config: TwilioConfig,
}

impl TwilioVerifyService {
    pub fn new(config: TwilioConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn service_url(&self, resource: &str) -> String {
        format!(
            "{}/Services/{}/{}",
            VERIFY_BASE_URL, self.config.verify_service_sid, resource
        )
    }

    async fn post_form(&self, url: &str, params: &[(&str, &str)]) -> AppResult<VerificationResponse> {
        let response = self
            .client
            .post(url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(params)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(response.json::<VerificationResponse>().await?)
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(AppError::VerificationError(format!(
                "Twilio Verify HTTP {}: {}",
                status.as_u16(),
                twilio_error_message(&error_text)
            )))
        }
    }
}

#[async_trait]
impl VerificationService for TwilioVerifyService {
    async fn issue_challenge(&self, phone_number: &str) -> AppResult<ChallengeHandle> {
        let url = self.service_url("Verifications");
        let result = self
            .post_form(&url, &[("To", phone_number), ("Channel", "sms")])
            .await;

        match result {
            Ok(verification) => {
                log::info!(
                    "Verification challenge issued: {}, status: {}",
                    phone_number,
                    verification.status
                );
                Ok(ChallengeHandle::new(verification.sid))
            }
            Err(e) => {
                log::error!("Verification challenge failed: {}, Error: {}", phone_number, e);
                Err(e)
            }
        }
    }

    async fn confirm_challenge(&self, challenge: &ChallengeHandle, code: &str) -> AppResult<()> {
        let url = self.service_url("VerificationCheck");
        let check = self
            .post_form(&url, &[("VerificationSid", challenge.as_str()), ("Code", code)])
            .await?;

        if check.status == "approved" {
            Ok(())
        } else {
            log::warn!("Verification check rejected, status: {}", check.status);
            Err(AppError::VerificationError("Invalid verification code".to_string()))
        }
    }
}

/// Plain SMS delivery through the Messages API.
#[derive(Clone)]
pub struct TwilioService {
    client: Client,
    config: TwilioConfig,
}

impl TwilioService {
    pub fn new(config: TwilioConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub async fn send_verification_code(&self, phone: &str, code: &str) -> AppResult<()> {
        let url = format!(
            "{}/Accounts/{}/Messages.json",
            MESSAGES_BASE_URL, self.config.account_sid
        );

        let body = format!(
            "Your verification code is: {}, valid for {} minutes.",
            code, CODE_TTL_MINUTES
        );

        let params = [
            ("To", phone),
            ("From", &self.config.from_phone),
            ("Body", &body),
        ];

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&params)
            .send()
            .await?;

        if response.status().is_success() {
            log::info!("Verification code SMS sent successfully: {}", phone);
            Ok(())
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            log::error!("Verification code SMS failed to send: {}, Error: {}", phone, error_text);
            Err(AppError::VerificationError(format!(
                "SMS sending failed: {}",
                twilio_error_message(&error_text)
            )))
        }
    }
}

#[derive(Debug, Clone)]
struct PendingCode {
    phone: String,
    code: String,
    expires_at: DateTime<Utc>,
}

/// Generates the passcode locally and keeps it in memory; Twilio only delivers the SMS.
#[derive(Clone)]
pub struct SmsCodeVerifier {
    sender: TwilioService,
    pending: Arc<RwLock<HashMap<String, PendingCode>>>,
    last_sent: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
}

impl SmsCodeVerifier {
    pub fn new(sender: TwilioService) -> Self {
        Self {
            sender,
            pending: Arc::new(RwLock::new(HashMap::new())),
            last_sent: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn check_send_rate(&self, phone: &str, now: DateTime<Utc>) -> AppResult<()> {
        let last_sent = self.last_sent.read().await;
        if let Some(timestamp) = last_sent.get(phone)
            && now.signed_duration_since(*timestamp) < Duration::seconds(RESEND_INTERVAL_SECS)
        {
            return Err(AppError::VerificationError(format!(
                "Verification code requested too often, try again in {} seconds",
                RESEND_INTERVAL_SECS
            )));
        }
        Ok(())
    }

    async fn register_code(&self, phone: &str, code: String, now: DateTime<Utc>) -> ChallengeHandle {
        let handle = Uuid::new_v4().to_string();
        {
            let mut pending = self.pending.write().await;
            // One live code per phone
            pending.retain(|_, p| p.phone != phone && p.expires_at > now);
            pending.insert(
                handle.clone(),
                PendingCode {
                    phone: phone.to_string(),
                    code,
                    expires_at: now + Duration::minutes(CODE_TTL_MINUTES),
                },
            );
        }
        {
            let mut last_sent = self.last_sent.write().await;
            last_sent.retain(|_, sent_at| {
                now.signed_duration_since(*sent_at) < Duration::seconds(RESEND_INTERVAL_SECS)
            });
            last_sent.insert(phone.to_string(), now);
        }
        ChallengeHandle::new(handle)
    }

    async fn check_code(&self, challenge: &ChallengeHandle, code: &str, now: DateTime<Utc>) -> AppResult<()> {
        let mut pending = self.pending.write().await;

        let Some(entry) = pending.get(challenge.as_str()) else {
            return Err(AppError::VerificationError(
                "Verification code does not exist or has expired".to_string(),
            ));
        };

        if now > entry.expires_at {
            pending.remove(challenge.as_str());
            return Err(AppError::VerificationError("Verification code has expired".to_string()));
        }

        if entry.code != code {
            return Err(AppError::VerificationError("Invalid verification code".to_string()));
        }

        pending.remove(challenge.as_str());
        Ok(())
    }
}

#[async_trait]
impl VerificationService for SmsCodeVerifier {
    async fn issue_challenge(&self, phone_number: &str) -> AppResult<ChallengeHandle> {
        let now = Utc::now();
        self.check_send_rate(phone_number, now).await?;

        let code = generate_six_digit_code();
        self.sender.send_verification_code(phone_number, &code).await?;

        Ok(self.register_code(phone_number, code, now).await)
    }

    async fn confirm_challenge(&self, challenge: &ChallengeHandle, code: &str) -> AppResult<()> {
        self.check_code(challenge, code, Utc::now()).await
    }
}
