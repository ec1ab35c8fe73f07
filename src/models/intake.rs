use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;
use uuid::Uuid;

use super::bucket::LeadSection;
use super::common::Notice;
use super::lead::{LeadDraft, LeadField};
use super::verification::VerificationState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateFieldRequest {
    pub field: LeadField,
    #[schema(example = "9876543210")]
    pub value: String,
    /// Needed when a valid phone number triggers the passcode automatically.
    #[serde(default)]
    pub turnstile_token: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct RequestChallengeRequest {
    /// Token produced by the Turnstile widget on the page.
    #[serde(default)]
    pub turnstile_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CodeRequest {
    #[schema(example = "123456")]
    pub code: String,
}

/// Everything the form needs to re-render after an operation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IntakeSnapshot {
    pub draft: LeadDraft,
    pub field_errors: BTreeMap<LeadField, String>,
    pub verification: VerificationState,
    pub phone_verified: bool,
    pub can_submit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub support_phone: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IntakeResponse {
    pub session_id: Uuid,
    pub form: IntakeSnapshot,
    pub notices: Vec<Notice>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IntakeOptions {
    pub courses: Vec<String>,
    pub places: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LeadsPage {
    pub total: usize,
    pub sections: Vec<LeadSection>,
}
