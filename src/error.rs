use thiserror::Error;

/// Errors surfaced by the remote board gateway.
///
/// `RemoteUnavailable` covers network/transport failures and is retryable by
/// the caller. `RemoteRejected` means the remote system answered with a
/// non-success status (invalid id, permission denied, rate limiting) and is
/// not retried automatically.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("remote unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("remote rejected request ({status}): {message}")]
    RemoteRejected { status: u16, message: String },
}

impl GatewayError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        GatewayError::RemoteUnavailable(err.to_string())
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, GatewayError::RemoteUnavailable(_))
    }
}

/// Raised once at startup when the sync/view configuration is incomplete.
#[derive(Error, Debug)]
#[error("invalid configuration: {0}")]
pub struct ConfigurationInvalid(pub String);
