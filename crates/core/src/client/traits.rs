use async_trait::async_trait;

use crate::errors::CoreError;
use crate::models::operation::{CreateOperationRequest, Operation, UpdateOperationRequest};
use crate::models::statement::{
    FileStatus, ProcessStatementResponse, StatementFile, UploadStatementRequest,
};
use crate::models::wallet::{Brokerage, CreateWalletRequest, UpdateWalletRequest, Wallet};

/// The external backend that owns wallets, statement files and operations.
///
/// `HttpBackend` talks to the REST API; tests and offline tools supply their
/// own implementation. Everything behind this trait is the system of record.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait PortfolioBackend: Send + Sync {
    // ── Wallets ─────────────────────────────────────────────────────

    async fn list_wallets(&self) -> Result<Vec<Wallet>, CoreError>;

    async fn create_wallet(&self, request: &CreateWalletRequest) -> Result<Wallet, CoreError>;

    async fn update_wallet(
        &self,
        wallet_id: u64,
        request: &UpdateWalletRequest,
    ) -> Result<Wallet, CoreError>;

    async fn delete_wallet(&self, wallet_id: u64) -> Result<(), CoreError>;

    async fn list_brokerages(&self) -> Result<Vec<Brokerage>, CoreError>;

    // ── Operations ──────────────────────────────────────────────────

    /// Full operation list of a wallet, in whatever order the backend returns it.
    async fn list_operations(&self, wallet_id: u64) -> Result<Vec<Operation>, CoreError>;

    /// Record a hand-entered operation in `request.wallet_id`.
    async fn create_operation(
        &self,
        request: &CreateOperationRequest,
    ) -> Result<Operation, CoreError>;

    async fn update_operation(
        &self,
        wallet_id: u64,
        operation_id: u64,
        request: &UpdateOperationRequest,
    ) -> Result<Operation, CoreError>;

    async fn delete_operation(&self, wallet_id: u64, operation_id: u64) -> Result<(), CoreError>;

    // ── Statement files ─────────────────────────────────────────────

    async fn list_statement_files(&self, wallet_id: u64) -> Result<Vec<StatementFile>, CoreError>;

    async fn upload_statement(
        &self,
        request: &UploadStatementRequest,
    ) -> Result<StatementFile, CoreError>;

    /// Ask the backend to turn an uploaded statement into operations.
    async fn process_statement(
        &self,
        wallet_id: u64,
        file_id: u64,
    ) -> Result<ProcessStatementResponse, CoreError>;

    async fn statement_status(&self, wallet_id: u64, file_id: u64) -> Result<FileStatus, CoreError>;

    async fn delete_statement(&self, wallet_id: u64, file_id: u64) -> Result<(), CoreError>;

    /// Raw CSV bytes of an uploaded statement, as uploaded.
    async fn download_statement(&self, wallet_id: u64, file_id: u64) -> Result<Vec<u8>, CoreError>;
}
