use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::asset::Asset;
use crate::errors::CoreError;

/// Kind of financial event recorded on an operation.
///
/// The set is open: kinds the client does not know are kept verbatim in
/// `Other` so a newer backend never breaks deserialization. Only `Buy` and
/// `Sell` take part in position math.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperationKind {
    Buy,
    Sell,
    TransferIn,
    TransferOut,
    Staking,
    Reward,
    Airdrop,
    Other(String),
}

impl OperationKind {
    pub fn code(&self) -> &str {
        match self {
            OperationKind::Buy => "BUY",
            OperationKind::Sell => "SELL",
            OperationKind::TransferIn => "TRANSFER_IN",
            OperationKind::TransferOut => "TRANSFER_OUT",
            OperationKind::Staking => "STAKING",
            OperationKind::Reward => "REWARD",
            OperationKind::Airdrop => "AIRDROP",
            OperationKind::Other(code) => code,
        }
    }

    /// Whether this kind changes quantity and invested value of a position.
    pub fn affects_position(&self) -> bool {
        matches!(self, OperationKind::Buy | OperationKind::Sell)
    }
}

impl From<String> for OperationKind {
    /// Accepts both the client codes and the backend's Portuguese codes
    /// (`COMPRA`, `VENDA`, `TRANSFERENCIA_ENTRADA`, ...).
    fn from(raw: String) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "BUY" | "COMPRA" | "ENTRADA" => OperationKind::Buy,
            "SELL" | "VENDA" | "SAIDA" => OperationKind::Sell,
            "TRANSFER_IN" | "TRANSFERENCIA_ENTRADA" => OperationKind::TransferIn,
            "TRANSFER_OUT" | "TRANSFERENCIA_SAIDA" => OperationKind::TransferOut,
            "STAKING" => OperationKind::Staking,
            "REWARD" => OperationKind::Reward,
            "AIRDROP" => OperationKind::Airdrop,
            _ => OperationKind::Other(raw),
        }
    }
}

impl From<OperationKind> for String {
    fn from(kind: OperationKind) -> Self {
        kind.code().to_string()
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Processing status of an operation in the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    #[serde(alias = "PENDENTE")]
    Pending,
    #[serde(alias = "CONFIRMADA")]
    Confirmed,
    #[serde(alias = "CANCELADA")]
    Cancelled,
    #[serde(alias = "ERRO")]
    Error,
}

impl OperationStatus {
    /// Predicate helper for status-filtered aggregation.
    pub fn is_confirmed(operation: &Operation) -> bool {
        operation.status == OperationStatus::Confirmed
    }
}

impl std::str::FromStr for OperationStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PENDING" | "PENDENTE" => Ok(OperationStatus::Pending),
            "CONFIRMED" | "CONFIRMADA" => Ok(OperationStatus::Confirmed),
            "CANCELLED" | "CANCELADA" => Ok(OperationStatus::Cancelled),
            "ERROR" | "ERRO" => Ok(OperationStatus::Error),
            other => Err(CoreError::Deserialization(format!(
                "Unknown operation status '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationStatus::Pending => write!(f, "PENDING"),
            OperationStatus::Confirmed => write!(f, "CONFIRMED"),
            OperationStatus::Cancelled => write!(f, "CANCELLED"),
            OperationStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// A single recorded financial event (buy, sell, transfer, staking, ...).
///
/// Operations are owned by the backend. The client creates, edits and
/// deletes them through it and derives aggregates from a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Identifier assigned by the backend (absent for client-built operations)
    #[serde(default)]
    pub id: Option<u64>,

    /// Owning wallet
    pub wallet_id: u64,

    /// The asset involved
    pub asset: Asset,

    pub kind: OperationKind,

    /// Amount of the asset (never negative)
    pub quantity: f64,

    /// Price per unit in the wallet currency (never negative)
    pub unit_price: f64,

    /// `quantity × unit_price + fee` when derived, or the backend's figure verbatim
    pub total_value: f64,

    #[serde(default)]
    pub fee: Option<f64>,

    /// Wall-clock timestamp of the operation
    pub date: NaiveDateTime,

    pub status: OperationStatus,

    #[serde(default)]
    pub notes: Option<String>,

    #[serde(default)]
    pub brokerage_id: Option<u64>,

    /// On-chain transaction hash, when the statement carries one
    #[serde(default)]
    pub tx_hash: Option<String>,
}

impl Operation {
    /// Create a confirmed operation with a derived total value and no fee.
    pub fn new(
        wallet_id: u64,
        asset: Asset,
        kind: OperationKind,
        quantity: f64,
        unit_price: f64,
        date: NaiveDateTime,
    ) -> Self {
        Self {
            id: None,
            wallet_id,
            asset,
            kind,
            quantity,
            unit_price,
            total_value: quantity * unit_price,
            fee: None,
            date,
            status: OperationStatus::Confirmed,
            notes: None,
            brokerage_id: None,
            tx_hash: None,
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    /// Attach a fee and re-derive the total value.
    pub fn with_fee(mut self, fee: f64) -> Self {
        self.fee = Some(fee);
        self.total_value = self.derived_total();
        self
    }

    /// Override the total value with a figure supplied by the backend.
    pub fn with_total_value(mut self, total_value: f64) -> Self {
        self.total_value = total_value;
        self
    }

    pub fn with_status(mut self, status: OperationStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn fee_or_zero(&self) -> f64 {
        self.fee.unwrap_or(0.0)
    }

    /// `quantity × unit_price + fee`
    pub fn derived_total(&self) -> f64 {
        self.quantity * self.unit_price + self.fee_or_zero()
    }

    /// Calendar `(year, month)` bucket of the operation date.
    pub fn year_month(&self) -> (i32, u32) {
        (self.date.year(), self.date.month())
    }

    /// Check the non-negativity invariants of a client-built operation.
    pub fn validate(&self) -> Result<(), CoreError> {
        check_amounts(self.quantity, self.unit_price, self.fee)?;
        check_symbol(&self.asset.symbol)
    }
}

fn check_non_negative(label: &str, value: f64) -> Result<(), CoreError> {
    if !value.is_finite() || value < 0.0 {
        return Err(CoreError::ValidationError(format!(
            "{label} must be a non-negative number, got {value}"
        )));
    }
    Ok(())
}

fn check_amounts(quantity: f64, unit_price: f64, fee: Option<f64>) -> Result<(), CoreError> {
    check_non_negative("Quantity", quantity)?;
    check_non_negative("Unit price", unit_price)?;
    if let Some(fee) = fee {
        check_non_negative("Fee", fee)?;
    }
    Ok(())
}

fn check_symbol(symbol: &str) -> Result<(), CoreError> {
    if symbol.trim().is_empty() {
        return Err(CoreError::ValidationError("Asset symbol must not be empty".into()));
    }
    Ok(())
}

/// An operation entered by hand. The backend assigns id, status and total value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOperationRequest {
    pub wallet_id: u64,
    pub asset: Asset,
    pub kind: OperationKind,
    pub quantity: f64,
    pub unit_price: f64,
    #[serde(default)]
    pub fee: Option<f64>,
    pub date: NaiveDateTime,
    #[serde(default)]
    pub notes: Option<String>,
    pub brokerage_id: u64,
    #[serde(default)]
    pub tx_hash: Option<String>,
}

impl CreateOperationRequest {
    pub fn new(
        wallet_id: u64,
        brokerage_id: u64,
        asset: Asset,
        kind: OperationKind,
        quantity: f64,
        unit_price: f64,
        date: NaiveDateTime,
    ) -> Self {
        Self {
            wallet_id,
            asset,
            kind,
            quantity,
            unit_price,
            fee: None,
            date,
            notes: None,
            brokerage_id,
            tx_hash: None,
        }
    }

    pub fn with_fee(mut self, fee: f64) -> Self {
        self.fee = Some(fee);
        self
    }

    /// Blank notes are dropped.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        let notes = notes.into();
        self.notes = Some(notes.trim().to_string()).filter(|n| !n.is_empty());
        self
    }

    pub fn with_tx_hash(mut self, tx_hash: impl Into<String>) -> Self {
        self.tx_hash = Some(tx_hash.into());
        self
    }

    /// Same amount and symbol rules as [`Operation::validate`].
    pub fn validate(&self) -> Result<(), CoreError> {
        check_amounts(self.quantity, self.unit_price, self.fee)?;
        check_symbol(&self.asset.symbol)
    }
}

/// Partial change to a recorded operation. Unset fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOperationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<OperationKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OperationStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
}

impl UpdateOperationRequest {
    /// Applies the [`Operation::validate`] rules to the fields being changed.
    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(quantity) = self.quantity {
            check_non_negative("Quantity", quantity)?;
        }
        if let Some(unit_price) = self.unit_price {
            check_non_negative("Unit price", unit_price)?;
        }
        if let Some(fee) = self.fee {
            check_non_negative("Fee", fee)?;
        }
        match &self.symbol {
            Some(symbol) => check_symbol(symbol),
            None => Ok(()),
        }
    }
}

/// Sort order for operation listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationSortOrder {
    /// Newest date first (default for display)
    DateDesc,
    DateAsc,
    /// Largest total value first
    ValueDesc,
    ValueAsc,
    /// Alphabetical by asset symbol
    AssetAsc,
    AssetDesc,
}

/// Criteria for narrowing an operation listing. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationFilter {
    pub wallet_id: Option<u64>,
    /// Case-insensitive substring matched against asset symbol and name
    pub asset: Option<String>,
    pub kind: Option<OperationKind>,
    pub status: Option<OperationStatus>,
    /// Inclusive lower bound on the operation day
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on the operation day
    pub to: Option<NaiveDate>,
    pub brokerage_id: Option<u64>,
}

impl OperationFilter {
    pub fn confirmed() -> Self {
        Self {
            status: Some(OperationStatus::Confirmed),
            ..Self::default()
        }
    }

    pub fn matches(&self, operation: &Operation) -> bool {
        if self.wallet_id.is_some_and(|id| id != operation.wallet_id) {
            return false;
        }
        if let Some(text) = &self.asset {
            let needle = text.trim().to_lowercase();
            if !needle.is_empty()
                && !operation.asset.symbol.to_lowercase().contains(&needle)
                && !operation.asset.name.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        if self.kind.as_ref().is_some_and(|k| k != &operation.kind) {
            return false;
        }
        if self.status.is_some_and(|s| s != operation.status) {
            return false;
        }
        let day = operation.date.date();
        if self.from.is_some_and(|from| day < from) || self.to.is_some_and(|to| day > to) {
            return false;
        }
        if self.brokerage_id.is_some() && self.brokerage_id != operation.brokerage_id {
            return false;
        }
        true
    }
}

/// Headline figures over a set of operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationSummary {
    pub total_operations: usize,
    pub buy_count: usize,
    pub sell_count: usize,
    /// Sum of buy total values
    pub total_invested: f64,
    /// Sum of sell total values
    pub total_sold: f64,
    /// `total_sold - total_invested`
    pub profit_loss: f64,
    pub unique_assets: usize,
}
