use serde::{Deserialize, Serialize};

use super::statement::DEFAULT_MAX_UPLOAD_BYTES;
use crate::errors::CoreError;

/// Client configuration: where the backend lives and client-side limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientSettings {
    /// Backend root, without the `/v1` prefix (e.g., "http://localhost:8080")
    pub base_url: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Largest statement file accepted for upload
    pub max_upload_bytes: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_secs: 30,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ClientSettings {
    /// Parse settings from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let settings: Self = serde_json::from_str(json)
            .map_err(|e| CoreError::InvalidConfig(format!("Failed to parse settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        let url = self.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(CoreError::InvalidConfig(format!(
                "Base URL '{}' must start with http:// or https://",
                self.base_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(CoreError::InvalidConfig("Timeout must be at least 1 second".into()));
        }
        if self.max_upload_bytes == 0 {
            return Err(CoreError::InvalidConfig("Upload limit must be greater than zero".into()));
        }
        Ok(())
    }

    /// Base URL without a trailing slash.
    pub fn api_root(&self) -> &str {
        self.base_url.trim().trim_end_matches('/')
    }
}
