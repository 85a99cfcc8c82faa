use crate::error::ApiError;
use serde::{Deserialize, Serialize};

pub const MSG_INVALID_AUTHENTICATION: &str = "Invalid API key or incorrect organization";
pub const MSG_INCORRECT_API_KEY: &str = "Incorrect API key. Check it or generate a new one";
pub const MSG_ORGANIZATION_REQUIRED: &str =
    "You must be a member of an organization to use the API";
pub const MSG_UNAUTHORIZED: &str = "Unauthorized. Check your API credentials";
pub const MSG_REGION_NOT_SUPPORTED: &str = "Country, region, or territory not supported";
pub const MSG_QUOTA_EXCEEDED: &str = "Quota exceeded. Check your plan and billing details";
pub const MSG_RATE_LIMITED: &str = "Rate limit reached. Wait before sending more requests";
pub const MSG_SERVER_ERROR: &str = "Server error. Try again shortly";
pub const MSG_SERVER_OVERLOADED: &str = "Server overloaded. Try again later";

/// One row of the error table. A rule without a pattern matches any message
/// for its status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRule {
    pub status: u16,
    #[serde(default)]
    pub pattern: Option<String>,
    pub message: String,
}

impl StatusRule {
    pub fn new(status: u16, pattern: Option<&str>, message: &str) -> Self {
        Self {
            status,
            pattern: pattern.map(str::to_string),
            message: message.to_string(),
        }
    }

    fn matches(&self, status: u16, detail: &str) -> bool {
        self.status == status
            && self
                .pattern
                .as_deref()
                .map_or(true, |pattern| detail.contains(pattern))
    }
}

/// Ordered mapping from HTTP status (and, optionally, a substring of the
/// provider's error message) to a classified [`ApiError`]. First match wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorTable {
    rules: Vec<StatusRule>,
}

impl ErrorTable {
    pub fn new(rules: Vec<StatusRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[StatusRule] {
        &self.rules
    }

    /// Returns `None` when no rule covers `status`; callers report that as an
    /// unexpected status.
    pub fn classify(&self, status: u16, detail: Option<&str>) -> Option<ApiError> {
        let detail = detail.unwrap_or_default();
        self.rules
            .iter()
            .find(|rule| rule.matches(status, detail))
            .map(|rule| ApiError::new(rule.status, rule.message.clone()))
    }
}

impl Default for ErrorTable {
    fn default() -> Self {
        Self::new(vec![
            StatusRule::new(401, Some("Invalid Authentication"), MSG_INVALID_AUTHENTICATION),
            StatusRule::new(401, Some("Incorrect API key provided"), MSG_INCORRECT_API_KEY),
            StatusRule::new(401, Some("member of an organization"), MSG_ORGANIZATION_REQUIRED),
            StatusRule::new(401, None, MSG_UNAUTHORIZED),
            StatusRule::new(403, None, MSG_REGION_NOT_SUPPORTED),
            StatusRule::new(429, Some("quota"), MSG_QUOTA_EXCEEDED),
            StatusRule::new(429, None, MSG_RATE_LIMITED),
            StatusRule::new(500, None, MSG_SERVER_ERROR),
            StatusRule::new(503, None, MSG_SERVER_OVERLOADED),
        ])
    }
}

/// `{"error": {"message": "..."}}`, sent by the provider on most failures.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

pub fn extract_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error.message)
}
