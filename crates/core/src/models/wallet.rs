use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

const MIN_NAME_LEN: usize = 3;
const MAX_NAME_LEN: usize = 50;

/// A brokerage/exchange a wallet is tied to (e.g. "Binance", "Mercado Bitcoin").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Brokerage {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

/// A named grouping of operations tied to one brokerage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub brokerage: Option<Brokerage>,
    #[serde(default)]
    pub brokerage_id: Option<u64>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl Wallet {
    /// First word of the brokerage name, resolved from the embedded brokerage
    /// or from `known` by id. Returns "N/A" when neither is available.
    pub fn brokerage_short_name(&self, known: &[Brokerage]) -> String {
        let name = self.brokerage.as_ref().map(|b| b.name.as_str()).or_else(|| {
            self.brokerage_id
                .and_then(|id| known.iter().find(|b| b.id == id))
                .map(|b| b.name.as_str())
        });
        name.and_then(|n| n.split_whitespace().next())
            .map(str::to_string)
            .unwrap_or_else(|| "N/A".to_string())
    }

    /// Case-insensitive match against the wallet name and brokerage name.
    pub fn matches_search(&self, term: &str, known: &[Brokerage]) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&term)
            || self.brokerage_short_name(known).to_lowercase().contains(&term)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWalletRequest {
    pub name: String,
    pub user_id: u64,
    pub brokerage_id: u64,
}

impl CreateWalletRequest {
    pub fn new(name: impl Into<String>, user_id: u64, brokerage_id: u64) -> Self {
        Self {
            name: name.into().trim().to_string(),
            user_id,
            brokerage_id,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        validate_wallet_name(&self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWalletRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl UpdateWalletRequest {
    pub fn validate(&self) -> Result<(), CoreError> {
        match &self.name {
            Some(name) => validate_wallet_name(name),
            None => Ok(()),
        }
    }
}

/// Wallet names are trimmed and must be 3 to 50 characters long.
pub fn validate_wallet_name(name: &str) -> Result<(), CoreError> {
    let len = name.trim().chars().count();
    if len < MIN_NAME_LEN || len > MAX_NAME_LEN {
        return Err(CoreError::ValidationError(format!(
            "Wallet name must be between {MIN_NAME_LEN} and {MAX_NAME_LEN} characters, got {len}"
        )));
    }
    Ok(())
}

fn default_true() -> bool {
    true
}
