use http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request error ({kind}): {source}")]
    Transport {
        kind: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("authentication error: {0}")]
    Unauthorized(String),

    #[error("account pending approval")]
    PendingApproval,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("http error ({status}): {body}")]
    Status { status: StatusCode, body: String },

    #[error("rejected by server: {0}")]
    Rejected(String),

    #[error("json parsing error: {0}")]
    Decode(String),
}

impl ApiError {
    pub(crate) fn transport(source: reqwest::Error) -> Self {
        let kind = if source.is_timeout() {
            "timeout"
        } else if source.is_connect() {
            "connection"
        } else {
            "other"
        };
        ApiError::Transport { kind, source }
    }

    /// Expired or invalid session token.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }

    /// The backend no longer accepts this session for task endpoints:
    /// either the token is invalid or the account lost its approval.
    pub fn is_session_rejection(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_) | ApiError::PendingApproval)
    }
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("invalid form: {0}")]
    InvalidForm(String),

    #[error("session is not signed in and approved")]
    NotApproved,

    #[error("a submission is already in progress")]
    AlreadyGenerating,

    #[error(transparent)]
    Api(#[from] ApiError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_auth_failures() {
        assert!(ApiError::Unauthorized("expired".into()).is_auth_failure());
        assert!(!ApiError::PendingApproval.is_auth_failure());
        assert!(!ApiError::Status {
            status: StatusCode::BAD_GATEWAY,
            body: String::new()
        }
        .is_auth_failure());
    }

    #[test]
    fn lost_approval_rejects_session() {
        assert!(ApiError::PendingApproval.is_session_rejection());
        assert!(ApiError::Unauthorized("expired".into()).is_session_rejection());
        assert!(!ApiError::Forbidden("Admin access required".into()).is_session_rejection());
    }

    #[test]
    fn submit_error_wraps_api_error() {
        let err: SubmitError = ApiError::Rejected("No Kie.ai API key configured".into()).into();
        assert_eq!(
            err.to_string(),
            "rejected by server: No Kie.ai API key configured"
        );
    }
}
