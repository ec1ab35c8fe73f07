use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::IntakeConfig;
use crate::error::{AppError, AppResult};
use crate::external::{GENERIC_STORE_ERROR, HumanCheck, LeadStore, VerificationService};
use crate::models::*;
use crate::utils::*;

pub const OTP_LENGTH: usize = 6;

const MSG_OTP_SENT: &str = "OTP sent successfully!";
const MSG_OTP_SEND_FAILED: &str = "Failed to send OTP. Please try again.";
const MSG_OTP_INVALID: &str = "Invalid OTP. Please try again.";
const MSG_OTP_LOCKED: &str = "Too many invalid attempts. Please request a new OTP.";
const MSG_OTP_TIMEOUT: &str = "Verification is taking too long. Please try again.";
const MSG_VERIFIED: &str = "Phone number verified successfully!";
const MSG_SUBMITTED: &str = "Form submitted successfully!";
const MSG_INCOMPLETE: &str = "Please fill out the form correctly and verify your phone number.";
const MSG_BAD_COURSE: &str = "Please select a valid course.";
const MSG_BAD_PLACE: &str = "Please select a valid place.";

/// Shared collaborators for every intake form. Cheap to clone.
#[derive(Clone)]
pub struct IntakeService {
    settings: Arc<IntakeConfig>,
    verifier: Arc<dyn VerificationService>,
    human_check: Arc<dyn HumanCheck>,
    store: Arc<dyn LeadStore>,
    policy: CallPolicy,
}

impl IntakeService {
    pub fn new(
        settings: IntakeConfig,
        verifier: Arc<dyn VerificationService>,
        human_check: Arc<dyn HumanCheck>,
        store: Arc<dyn LeadStore>,
    ) -> Self {
        let policy = CallPolicy::from_config(&settings);
        Self {
            settings: Arc::new(settings),
            verifier,
            human_check,
            store,
            policy,
        }
    }

    pub fn with_policy(mut self, policy: CallPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// A fresh, empty form.
    pub fn new_workflow(&self) -> IntakeWorkflow {
        IntakeWorkflow {
            service: self.clone(),
            draft: LeadDraft::default(),
            field_errors: BTreeMap::new(),
            session: VerificationSession::default(),
            code: String::new(),
            human_token: None,
            notices: Vec::new(),
        }
    }
}

/// State of one registration form: the draft, its phone verification and queued notices.
pub struct IntakeWorkflow {
    service: IntakeService,
    draft: LeadDraft,
    field_errors: BTreeMap<LeadField, String>,
    session: VerificationSession,
    code: String,
    human_token: Option<String>,
    notices: Vec<Notice>,
}

impl IntakeWorkflow {
    pub fn draft(&self) -> &LeadDraft {
        &self.draft
    }

    pub fn session(&self) -> &VerificationSession {
        &self.session
    }

    pub fn field_error(&self, field: LeadField) -> Option<&str> {
        self.field_errors.get(&field).map(|s| s.as_str())
    }

    pub fn state(&self) -> VerificationState {
        self.session.state
    }

    /// Token from the anti-automation widget, used by the next challenge request.
    pub fn provide_human_token(&mut self, token: impl Into<String>) {
        self.human_token = Some(token.into());
    }

    pub fn has_pending_notices(&self) -> bool {
        !self.notices.is_empty()
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn notify(&mut self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success => log::info!("Intake notice: {}", notice.message),
            NoticeLevel::Error => log::warn!("Intake notice: {}", notice.message),
        }
        self.notices.push(notice);
    }

    fn set_field_error(&mut self, field: LeadField, result: AppResult<()>) {
        match result {
            Ok(()) => {
                self.field_errors.remove(&field);
            }
            Err(e) => {
                self.field_errors.insert(field, e.user_message());
            }
        }
    }

    /// Applies one form input. Returns true when the phone number changed to a valid value.
    fn apply_field(&mut self, field: LeadField, value: &str) -> bool {
        match field {
            LeadField::Name => {
                self.draft.name = value.to_string();
                false
            }
            LeadField::Email => {
                self.draft.email = value.to_string();
                self.set_field_error(field, validate_email(value));
                false
            }
            LeadField::PhoneNumber => {
                let changed = self.draft.phone_number != value;
                self.draft.phone_number = value.to_string();

                if self.session.phone_number != value && self.session.state != VerificationState::Idle {
                    log::debug!("Phone number changed, dropping verification session");
                    self.session.reset();
                    self.code.clear();
                }

                let result = validate_phone_number(value);
                let is_valid = result.is_ok();
                self.set_field_error(field, result);
                is_valid && changed
            }
            LeadField::Course => {
                self.draft.course = value.parse().ok();
                let result = if value.is_empty() || self.draft.course.is_some() {
                    Ok(())
                } else {
                    Err(AppError::ValidationError(MSG_BAD_COURSE.to_string()))
                };
                self.set_field_error(field, result);
                false
            }
            LeadField::Place => {
                self.draft.place = value.parse().ok();
                let result = if value.is_empty() || self.draft.place.is_some() {
                    Ok(())
                } else {
                    Err(AppError::ValidationError(MSG_BAD_PLACE.to_string()))
                };
                self.set_field_error(field, result);
                false
            }
        }
    }

    /// Updates a field and runs the auto-send rule when a new valid phone number is entered.
    pub async fn update_field(&mut self, field: LeadField, value: &str) {
        let phone_became_valid = self.apply_field(field, value);

        if phone_became_valid
            && self.service.settings.auto_send_challenge
            && self.session.state == VerificationState::Idle
            && !self.session.verified
        {
            // Failure is already surfaced as a notice
            let _ = self.request_challenge().await;
        }
    }

    /// Sends a passcode to the current phone number.
    pub async fn request_challenge(&mut self) -> AppResult<()> {
        let phone = self.draft.phone_number.clone();
        if let Err(e) = validate_phone_number(&phone) {
            self.field_errors.insert(LeadField::PhoneNumber, e.user_message());
            return Err(e);
        }
        if self.session.is_verified_for(&phone) {
            return Ok(());
        }
        if self.session.has_outstanding_challenge() {
            return Err(AppError::ValidationError(
                "A verification code has already been sent".to_string(),
            ));
        }

        let full_number = with_country_code(&self.service.settings.country_code, &phone);
        let token = self.human_token.take();
        let service = self.service.clone();

        let result = async {
            service
                .policy
                .run("anti-automation check", service.human_check.check(token.as_deref()))
                .await?;
            service
                .policy
                .run("issue challenge", service.verifier.issue_challenge(&full_number))
                .await
        }
        .await;

        match result {
            Ok(challenge) => {
                self.session.phone_number = phone;
                self.session.challenge = Some(challenge);
                self.session.verified = false;
                self.session.failed_attempts = 0;
                self.session.state = VerificationState::ChallengeSent;
                self.code.clear();
                self.notify(Notice::success(MSG_OTP_SENT));
                Ok(())
            }
            Err(e) => {
                log::error!("Error sending OTP to {}: {}", full_number, e);
                self.session.reset();
                self.notify(Notice::error(MSG_OTP_SEND_FAILED));
                Err(e)
            }
        }
    }

    /// Records the passcode input and auto-confirms once it reaches full length.
    pub async fn enter_code(&mut self, code: &str) {
        self.code = code.trim().to_string();

        if self.service.settings.auto_confirm_code
            && self.code.chars().count() == OTP_LENGTH
            && self.session.has_outstanding_challenge()
        {
            let code = self.code.clone();
            let _ = self.submit_challenge_response(&code).await;
        }
    }

    pub async fn submit_challenge_response(&mut self, code: &str) -> AppResult<()> {
        let code = code.trim();
        if self.session.verified {
            return Ok(());
        }
        let Some(challenge) = self.session.challenge.clone() else {
            return Err(AppError::ValidationError(
                "Request a verification code first".to_string(),
            ));
        };
        if code.is_empty() {
            return Err(AppError::ValidationError(
                "Verification code is required".to_string(),
            ));
        }

        let previous = self.session.state;
        self.session.state = VerificationState::Verifying;

        let service = self.service.clone();
        let result = service
            .policy
            .run("confirm challenge", service.verifier.confirm_challenge(&challenge, code))
            .await;

        match result {
            Ok(()) => {
                self.session.verified = true;
                self.session.state = VerificationState::Verified;
                self.code.clear();
                let message = match &self.service.settings.support_phone {
                    Some(support) => format!("{} For help, call {}.", MSG_VERIFIED, support),
                    None => MSG_VERIFIED.to_string(),
                };
                self.notify(Notice::success(message));
                Ok(())
            }
            Err(e @ AppError::Timeout(_)) => {
                self.session.state = previous;
                self.notify(Notice::error(MSG_OTP_TIMEOUT));
                Err(e)
            }
            Err(e) => {
                log::warn!("Error verifying OTP: {}", e);
                self.session.failed_attempts += 1;
                let cap = self.service.settings.max_code_attempts;
                if cap > 0 && self.session.failed_attempts >= cap {
                    self.session.reset();
                    self.code.clear();
                    self.notify(Notice::error(MSG_OTP_LOCKED));
                } else {
                    self.session.state = VerificationState::ChallengeFailed;
                    self.notify(Notice::error(MSG_OTP_INVALID));
                }
                Err(e)
            }
        }
    }

    /// Mirrors the submit button's enabled state.
    pub fn can_submit(&self) -> bool {
        self.draft.is_complete()
            && self.field_errors.is_empty()
            && validate_phone_number(&self.draft.phone_number).is_ok()
            && validate_email(&self.draft.email).is_ok()
            && self.session.is_verified_for(&self.draft.phone_number)
    }

    pub async fn submit(&mut self) -> AppResult<()> {
        if !self.can_submit() {
            self.notify(Notice::error(MSG_INCOMPLETE));
            return Err(AppError::ValidationError(MSG_INCOMPLETE.to_string()));
        }

        let service = self.service.clone();
        let result = service
            .policy
            .run("store lead", service.store.create(&self.draft))
            .await;

        match result {
            Ok(()) => {
                log::info!("Lead submitted: {}", self.draft.phone_number);
                self.draft = LeadDraft::default();
                self.field_errors.clear();
                self.session.reset();
                self.code.clear();
                self.notify(Notice::success(MSG_SUBMITTED));
                Ok(())
            }
            Err(e) => {
                let message = match &e {
                    AppError::StoreError(msg) if !msg.trim().is_empty() => msg.clone(),
                    _ => GENERIC_STORE_ERROR.to_string(),
                };
                self.notify(Notice::error(message));
                Err(e)
            }
        }
    }

    pub fn snapshot(&self) -> IntakeSnapshot {
        IntakeSnapshot {
            draft: self.draft.clone(),
            field_errors: self.field_errors.clone(),
            verification: self.session.state,
            phone_verified: self.session.is_verified_for(&self.draft.phone_number),
            can_submit: self.can_submit(),
            support_phone: self.service.settings.support_phone.clone(),
        }
    }
}
