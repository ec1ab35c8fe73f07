use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Opaque reference to an outstanding passcode challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeHandle(String);

impl ChallengeHandle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VerificationState {
    Idle,
    ChallengeSent,
    Verifying,
    Verified,
    /// Last code was rejected; the challenge is still usable.
    ChallengeFailed,
}

#[derive(Debug, Clone)]
pub struct VerificationSession {
    pub phone_number: String,
    pub challenge: Option<ChallengeHandle>,
    pub verified: bool,
    pub failed_attempts: u32,
    pub state: VerificationState,
}

impl Default for VerificationSession {
    fn default() -> Self {
        Self {
            phone_number: String::new(),
            challenge: None,
            verified: false,
            failed_attempts: 0,
            state: VerificationState::Idle,
        }
    }
}

impl VerificationSession {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn has_outstanding_challenge(&self) -> bool {
        self.challenge.is_some() && !self.verified
    }

    pub fn is_verified_for(&self, phone_number: &str) -> bool {
        self.verified && self.phone_number == phone_number
    }
}
