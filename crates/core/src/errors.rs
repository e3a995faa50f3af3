use thiserror::Error;

/// Unified error type for the entire cryptofolio-core library.
/// Every fallible public function returns `Result<T, CoreError>`.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Backend / Network ───────────────────────────────────────────
    #[error("Backend returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    // ── Encoding ────────────────────────────────────────────────────
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ── Configuration ───────────────────────────────────────────────
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Business Logic ──────────────────────────────────────────────
    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Wallet not found: {0}")]
    WalletNotFound(u64),

    #[error("Statement file not found: {0}")]
    StatementNotFound(u64),
}

impl CoreError {
    /// Build an `Http` error with the user-facing message for a backend status code.
    ///
    /// `subject` names what was being acted on (e.g. "wallet", "statement file").
    pub fn from_status(status: u16, subject: &str) -> Self {
        let message = match status {
            0 => "Connection error. Check your network and try again.".to_string(),
            403 => format!("You do not have permission to modify this {subject}."),
            404 => format!("The {subject} was not found. It may already have been deleted."),
            409 => format!("The {subject} cannot be removed because it has associated operations."),
            500..=599 => "Internal server error. Try again later.".to_string(),
            _ => format!("Request for {subject} failed. Try again."),
        };
        CoreError::Http { status, message }
    }

    /// The HTTP status attached to this error, if it came from the backend.
    pub fn status(&self) -> Option<u16> {
        match self {
            CoreError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Deserialization(e.to_string())
    }
}

impl From<csv::Error> for CoreError {
    fn from(e: csv::Error) -> Self {
        CoreError::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return CoreError::Http {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            };
        }
        // Strip query parameters from URLs so tokens never end up in messages.
        let msg = e.to_string();
        let sanitized = if let Some(idx) = msg.find('?') {
            format!("{}?<query redacted>", &msg[..idx])
        } else {
            msg
        };
        CoreError::Network(sanitized)
    }
}
