use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::ChallengeHandle;

/// Issues and checks one-time passcodes sent to a phone number.
#[async_trait]
pub trait VerificationService: Send + Sync {
    /// `phone_number` already carries the country calling code.
    async fn issue_challenge(&self, phone_number: &str) -> AppResult<ChallengeHandle>;

    async fn confirm_challenge(&self, challenge: &ChallengeHandle, code: &str) -> AppResult<()>;
}

/// Anti-automation check performed before a passcode is sent.
#[async_trait]
pub trait HumanCheck: Send + Sync {
    async fn check(&self, token: Option<&str>) -> AppResult<()>;
}
