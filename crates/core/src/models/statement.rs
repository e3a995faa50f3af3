use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// Default upload limit for statement files (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Lifecycle of an uploaded brokerage statement on the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileStatus {
    #[serde(alias = "PENDENTE")]
    Pending,
    #[serde(alias = "PROCESSANDO")]
    Processing,
    #[serde(alias = "PROCESSADO")]
    Processed,
    #[serde(alias = "ERRO")]
    Error,
}

impl FileStatus {
    /// Files in these states exist only locally until the backend reports them.
    pub fn is_in_flight(self) -> bool {
        matches!(self, FileStatus::Pending | FileStatus::Processing)
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileStatus::Pending => write!(f, "Pending"),
            FileStatus::Processing => write!(f, "Processing"),
            FileStatus::Processed => write!(f, "Processed"),
            FileStatus::Error => write!(f, "Error"),
        }
    }
}

impl std::str::FromStr for FileStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PENDING" | "PENDENTE" => Ok(FileStatus::Pending),
            "PROCESSING" | "PROCESSANDO" => Ok(FileStatus::Processing),
            "PROCESSED" | "PROCESSADO" => Ok(FileStatus::Processed),
            "ERROR" | "ERRO" => Ok(FileStatus::Error),
            other => Err(CoreError::Deserialization(format!(
                "Unknown statement file status '{other}'"
            ))),
        }
    }
}

/// Metadata of a CSV statement uploaded to a wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementFile {
    pub id: u64,
    pub name: String,
    pub wallet_id: u64,
    #[serde(default)]
    pub uploaded_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub size_bytes: u64,
    pub status: FileStatus,
    #[serde(default)]
    pub total_operations: u64,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A statement to upload: raw CSV bytes plus the file name shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadStatementRequest {
    pub wallet_id: u64,
    pub file_name: String,
    pub content: Vec<u8>,
    pub notes: Option<String>,
}

/// Backend answer to a processing request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessStatementResponse {
    pub success: bool,
    #[serde(default)]
    pub total_operations: u64,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Check a file before upload. Returns every violated rule, empty when valid.
pub fn validate_csv_upload(file_name: &str, size_bytes: u64, max_bytes: u64) -> Vec<String> {
    let mut errors = Vec::new();
    if !file_name.to_lowercase().ends_with(".csv") {
        errors.push("File must have a .csv extension".to_string());
    }
    if size_bytes > max_bytes {
        errors.push(format!(
            "File too large. Maximum size: {}",
            format_file_size(max_bytes)
        ));
    }
    if size_bytes == 0 {
        errors.push("File is empty".to_string());
    }
    errors
}

/// Human-readable size with a 1024 base, e.g. "1.5 KB", "10 MB".
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{rounded} {}", UNITS[unit])
}
