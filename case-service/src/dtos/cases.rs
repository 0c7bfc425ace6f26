use serde::Deserialize;
use validator::Validate;

use crate::models::{CaseStatus, RetentionMode};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCaseRequest {
    pub category: Option<String>,

    #[validate(length(min = 1, message = "Case description is required"))]
    pub detail: String,

    pub full_name: Option<String>,

    #[validate(email(message = "Invalid contact email"))]
    pub contact_email: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CaseUpdateRequest {
    #[validate(length(min = 1, message = "Message is required"))]
    pub message: String,

    pub status: Option<CaseStatus>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RetentionPolicyRequest {
    pub mode: RetentionMode,
    pub days: Option<u32>,
}
