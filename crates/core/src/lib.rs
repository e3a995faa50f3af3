pub mod client;
pub mod errors;
pub mod models;
pub mod services;
pub mod store;

use std::collections::HashMap;
use std::sync::Arc;

use client::http::HttpBackend;
use client::traits::PortfolioBackend;
use models::{
    chart::ChartDataPoint,
    monthly::PeriodSummary,
    operation::{
        CreateOperationRequest, Operation, OperationFilter, OperationSortOrder, OperationSummary,
        UpdateOperationRequest,
    },
    position::{PositionSummary, RollupOptions},
    settings::ClientSettings,
    statement::{
        validate_csv_upload, FileStatus, ProcessStatementResponse, StatementFile,
        UploadStatementRequest,
    },
    valuation::{AllocationSlice, AssetHolding, PortfolioSummary},
    wallet::{Brokerage, CreateWalletRequest, UpdateWalletRequest, Wallet},
};
use services::{
    chart_service::ChartService, monthly_service::MonthlyService,
    operation_service::OperationService, position_service::PositionService,
    valuation_service::ValuationService,
};
use store::{OperationSnapshot, SnapshotStore};
use tokio::sync::watch;

use errors::CoreError;

/// Main entry point for the Cryptofolio core library.
///
/// Holds the client-side state (wallets, statement files, the selected
/// wallet's operation snapshot) and the services that derive every view from
/// it. The backend stays the system of record: every mutation goes through
/// it first and local state only mirrors the answer.
#[must_use]
pub struct PortfolioTracker<B: PortfolioBackend> {
    backend: B,
    settings: ClientSettings,
    wallets: Vec<Wallet>,
    brokerages: Vec<Brokerage>,
    selected_wallet: Option<u64>,
    files: Vec<StatementFile>,
    snapshots: SnapshotStore,
    rollup_options: RollupOptions,
    monthly_service: MonthlyService,
    position_service: PositionService,
    operation_service: OperationService,
    valuation_service: ValuationService,
    chart_service: ChartService,
}

impl<B: PortfolioBackend> std::fmt::Debug for PortfolioTracker<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshots.latest();
        f.debug_struct("PortfolioTracker")
            .field("base_url", &self.settings.base_url)
            .field("wallets", &self.wallets.len())
            .field("selected_wallet", &self.selected_wallet)
            .field("files", &self.files.len())
            .field("operations", &snapshot.operations.len())
            .field("revision", &snapshot.revision)
            .finish()
    }
}

impl PortfolioTracker<HttpBackend> {
    /// Build a tracker talking to the REST backend described by `settings`.
    pub fn connect(settings: ClientSettings) -> Result<Self, CoreError> {
        let backend = HttpBackend::new(&settings)?;
        Self::new(backend, settings)
    }
}

impl<B: PortfolioBackend> PortfolioTracker<B> {
    pub fn new(backend: B, settings: ClientSettings) -> Result<Self, CoreError> {
        settings.validate()?;
        Ok(Self {
            backend,
            settings,
            wallets: Vec::new(),
            brokerages: Vec::new(),
            selected_wallet: None,
            files: Vec::new(),
            snapshots: SnapshotStore::new(),
            rollup_options: RollupOptions::default(),
            monthly_service: MonthlyService::new(),
            position_service: PositionService::new(),
            operation_service: OperationService::new(),
            valuation_service: ValuationService::new(),
            chart_service: ChartService::new(),
        })
    }

    #[must_use]
    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    // ── Wallets ─────────────────────────────────────────────────────

    /// Fetch all wallets. Selects the first one if nothing is selected yet.
    pub async fn load_wallets(&mut self) -> Result<&[Wallet], CoreError> {
        self.wallets = self.backend.list_wallets().await?;
        let still_known = self
            .selected_wallet
            .is_some_and(|id| self.wallets.iter().any(|w| w.id == id));
        if !still_known {
            self.selected_wallet = self.wallets.first().map(|w| w.id);
        }
        Ok(&self.wallets)
    }

    #[must_use]
    pub fn wallets(&self) -> &[Wallet] {
        &self.wallets
    }

    /// Wallets whose name or brokerage name contains `term` (case-insensitive).
    #[must_use]
    pub fn search_wallets(&self, term: &str) -> Vec<&Wallet> {
        self.wallets
            .iter()
            .filter(|w| w.matches_search(term, &self.brokerages))
            .collect()
    }

    pub async fn load_brokerages(&mut self) -> Result<&[Brokerage], CoreError> {
        self.brokerages = self.backend.list_brokerages().await?;
        Ok(&self.brokerages)
    }

    #[must_use]
    pub fn brokerages(&self) -> &[Brokerage] {
        &self.brokerages
    }

    /// Create a wallet and select it.
    pub async fn create_wallet(
        &mut self,
        name: &str,
        user_id: u64,
        brokerage_id: u64,
    ) -> Result<Wallet, CoreError> {
        let request = CreateWalletRequest::new(name, user_id, brokerage_id);
        request.validate()?;
        let wallet = self.backend.create_wallet(&request).await?;
        self.wallets.push(wallet.clone());
        self.select_wallet(wallet.id)?;
        Ok(wallet)
    }

    pub async fn update_wallet(
        &mut self,
        wallet_id: u64,
        request: UpdateWalletRequest,
    ) -> Result<Wallet, CoreError> {
        request.validate()?;
        let idx = self.wallet_index(wallet_id)?;
        let wallet = self.backend.update_wallet(wallet_id, &request).await?;
        self.wallets[idx] = wallet.clone();
        Ok(wallet)
    }

    /// Delete a wallet. Clears the selection and its data if it was selected.
    pub async fn delete_wallet(&mut self, wallet_id: u64) -> Result<(), CoreError> {
        self.backend.delete_wallet(wallet_id).await?;
        self.wallets.retain(|w| w.id != wallet_id);
        if self.selected_wallet == Some(wallet_id) {
            self.selected_wallet = None;
            self.files.clear();
            self.snapshots.clear();
        }
        Ok(())
    }

    /// Make `wallet_id` the wallet all operation and file calls refer to.
    /// Drops the previous wallet's files and snapshot.
    pub fn select_wallet(&mut self, wallet_id: u64) -> Result<(), CoreError> {
        self.wallet_index(wallet_id)?;
        if self.selected_wallet != Some(wallet_id) {
            self.selected_wallet = Some(wallet_id);
            self.files.clear();
            self.snapshots.clear();
        }
        Ok(())
    }

    #[must_use]
    pub fn selected_wallet(&self) -> Option<&Wallet> {
        self.selected_wallet
            .and_then(|id| self.wallets.iter().find(|w| w.id == id))
    }

    // ── Operations ──────────────────────────────────────────────────

    /// Fetch the selected wallet's operations and publish them as a new snapshot.
    /// Returns the number of operations received.
    pub async fn refresh_operations(&mut self) -> Result<usize, CoreError> {
        let wallet_id = self.require_wallet()?;
        let operations = self.backend.list_operations(wallet_id).await?;
        let count = operations.len();
        self.snapshots.publish(wallet_id, operations);
        Ok(count)
    }

    /// Record a hand-entered operation in the selected wallet.
    pub async fn create_operation(
        &mut self,
        request: CreateOperationRequest,
    ) -> Result<Operation, CoreError> {
        let wallet_id = self.require_wallet()?;
        if request.wallet_id != wallet_id {
            return Err(CoreError::ValidationError(format!(
                "Operation targets wallet {}, but wallet {wallet_id} is selected",
                request.wallet_id
            )));
        }
        request.validate()?;
        let created = self.backend.create_operation(&request).await?;
        let added = created.clone();
        self.republish_operations(wallet_id, move |ops| ops.push(added)).await;
        Ok(created)
    }

    pub async fn update_operation(
        &mut self,
        operation_id: u64,
        request: UpdateOperationRequest,
    ) -> Result<Operation, CoreError> {
        let wallet_id = self.require_wallet()?;
        request.validate()?;
        let updated = self
            .backend
            .update_operation(wallet_id, operation_id, &request)
            .await?;
        let replacement = updated.clone();
        self.republish_operations(wallet_id, move |ops| {
            match ops.iter_mut().find(|op| op.id == Some(operation_id)) {
                Some(slot) => *slot = replacement,
                None => ops.push(replacement),
            }
        })
        .await;
        Ok(updated)
    }

    pub async fn delete_operation(&mut self, operation_id: u64) -> Result<(), CoreError> {
        let wallet_id = self.require_wallet()?;
        self.backend.delete_operation(wallet_id, operation_id).await?;
        self.republish_operations(wallet_id, |ops| {
            ops.retain(|op| op.id != Some(operation_id))
        })
        .await;
        Ok(())
    }

    /// Publish the backend's answer to an operation change.
    ///
    /// A loaded snapshot of `wallet_id` is patched with `change`; otherwise
    /// the full list is fetched. The change is already stored, so a failed
    /// fetch is only logged.
    async fn republish_operations<F>(&mut self, wallet_id: u64, change: F)
    where
        F: FnOnce(&mut Vec<Operation>),
    {
        let current = self.snapshots.latest();
        if current.wallet_id == Some(wallet_id) {
            let mut operations = current.operations.clone();
            change(&mut operations);
            self.snapshots.publish(wallet_id, operations);
        } else if let Err(e) = self.refresh_operations().await {
            log::warn!("operations of wallet {wallet_id} not refreshed: {e}");
        }
    }

    /// The operation snapshot currently published.
    #[must_use]
    pub fn snapshot(&self) -> Arc<OperationSnapshot> {
        self.snapshots.latest()
    }

    /// Observe future snapshots (e.g. to re-render after a refresh).
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<OperationSnapshot>> {
        self.snapshots.subscribe()
    }

    pub fn set_rollup_options(&mut self, options: RollupOptions) {
        self.rollup_options = options;
    }

    #[must_use]
    pub fn rollup_options(&self) -> RollupOptions {
        self.rollup_options
    }

    #[must_use]
    pub fn filter_operations(&self, filter: &OperationFilter) -> Vec<Operation> {
        let snapshot = self.snapshots.latest();
        self.operation_service
            .filter(&snapshot.operations, filter)
            .into_iter()
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn operations_sorted(&self, order: &OperationSortOrder) -> Vec<Operation> {
        let snapshot = self.snapshots.latest();
        self.operation_service
            .sorted(&snapshot.operations, order)
            .into_iter()
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn search_operations(&self, query: &str) -> Vec<Operation> {
        let snapshot = self.snapshots.latest();
        self.operation_service
            .search(&snapshot.operations, query)
            .into_iter()
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn operation_summary(&self, filter: &OperationFilter) -> OperationSummary {
        self.operation_service.summarize(&self.filter_operations(filter))
    }

    // ── Aggregates ──────────────────────────────────────────────────

    /// Monthly consolidation of the snapshot, `None` when no operation matches.
    #[must_use]
    pub fn monthly_history(&self, filter: &OperationFilter) -> Option<PeriodSummary> {
        let snapshot = self.snapshots.latest();
        self.monthly_service
            .aggregate_by_month_where(&snapshot.operations, |op| filter.matches(op))
    }

    /// Open positions of the snapshot under the current roll-up options.
    #[must_use]
    pub fn positions(&self, filter: &OperationFilter) -> Vec<PositionSummary> {
        let snapshot = self.snapshots.latest();
        self.position_service.rollup_positions_where(
            &snapshot.operations,
            self.rollup_options,
            |op| filter.matches(op),
        )
    }

    /// Open positions valued at `prices` (symbol → price in the wallet currency).
    #[must_use]
    pub fn holdings(
        &self,
        filter: &OperationFilter,
        prices: &HashMap<String, f64>,
    ) -> Vec<AssetHolding> {
        self.valuation_service
            .value_positions(&self.positions(filter), prices)
    }

    #[must_use]
    pub fn portfolio_summary(
        &self,
        filter: &OperationFilter,
        prices: &HashMap<String, f64>,
    ) -> PortfolioSummary {
        self.valuation_service
            .summarize(&self.holdings(filter, prices))
    }

    #[must_use]
    pub fn allocation(
        &self,
        filter: &OperationFilter,
        prices: &HashMap<String, f64>,
    ) -> Vec<AllocationSlice> {
        self.valuation_service
            .allocation(&self.holdings(filter, prices))
    }

    /// Monthly invested-capital series for charting.
    #[must_use]
    pub fn invested_chart(&self, filter: &OperationFilter) -> Vec<ChartDataPoint> {
        self.chart_service
            .invested_by_month(&self.filter_operations(filter), self.rollup_options)
    }

    // ── Statement Files ─────────────────────────────────────────────

    /// Fetch the selected wallet's statement files.
    ///
    /// Files still pending or processing locally are kept in front of the
    /// backend list unless the backend already reports them. If the request
    /// fails only those local files remain and the error is returned.
    pub async fn load_statement_files(&mut self) -> Result<&[StatementFile], CoreError> {
        let wallet_id = self.require_wallet()?;
        let mut local: Vec<StatementFile> = self
            .files
            .drain(..)
            .filter(|f| f.wallet_id == wallet_id && f.status.is_in_flight())
            .collect();

        match self.backend.list_statement_files(wallet_id).await {
            Ok(remote) => {
                local.retain(|f| !remote.iter().any(|r| r.id == f.id));
                log::debug!(
                    "wallet {wallet_id}: {} remote files, {} local in-flight",
                    remote.len(),
                    local.len()
                );
                local.extend(remote);
                self.files = local;
                Ok(&self.files)
            }
            Err(e) => {
                log::warn!("failed to load statement files for wallet {wallet_id}: {e}");
                self.files = local;
                Err(e)
            }
        }
    }

    #[must_use]
    pub fn statement_files(&self) -> &[StatementFile] {
        &self.files
    }

    /// Validate and upload a CSV statement to the selected wallet.
    pub async fn upload_statement(
        &mut self,
        file_name: &str,
        content: Vec<u8>,
        notes: Option<String>,
    ) -> Result<StatementFile, CoreError> {
        let wallet_id = self.require_wallet()?;
        let problems = validate_csv_upload(
            file_name,
            content.len() as u64,
            self.settings.max_upload_bytes,
        );
        if !problems.is_empty() {
            return Err(CoreError::ValidationError(problems.join("; ")));
        }

        let request = UploadStatementRequest {
            wallet_id,
            file_name: file_name.to_string(),
            content,
            notes: notes.filter(|n| !n.trim().is_empty()),
        };
        let file = self.backend.upload_statement(&request).await?;
        self.files.insert(0, file.clone());
        Ok(file)
    }

    /// Ask the backend to process a pending statement into operations.
    ///
    /// Only `Pending` files can be processed. On success the operation
    /// snapshot is refreshed so every aggregate reflects the new operations.
    /// A failed refresh is logged and leaves the previous snapshot in place;
    /// the processing response is still returned.
    pub async fn process_statement(
        &mut self,
        file_id: u64,
    ) -> Result<ProcessStatementResponse, CoreError> {
        let wallet_id = self.require_wallet()?;
        let idx = self.file_index(file_id)?;
        let status = self.files[idx].status;
        if status != FileStatus::Pending {
            return Err(CoreError::ValidationError(format!(
                "Statement file {file_id} is {status}, only pending files can be processed"
            )));
        }

        self.files[idx].status = FileStatus::Processing;
        let result = self.backend.process_statement(wallet_id, file_id).await;

        // The list may have been reloaded meanwhile; look the file up again.
        let idx = self.file_index(file_id).ok();
        match result {
            Ok(response) => {
                if let Some(idx) = idx {
                    let file = &mut self.files[idx];
                    if response.success {
                        file.status = FileStatus::Processed;
                        file.total_operations = response.total_operations;
                    } else {
                        file.status = FileStatus::Error;
                    }
                }
                if response.success {
                    log::info!(
                        "statement {file_id} produced {} operations",
                        response.total_operations
                    );
                    // The file is already processed; keep the response even if the refresh fails.
                    if let Err(e) = self.refresh_operations().await {
                        log::warn!("operations not refreshed after statement {file_id}: {e}");
                    }
                } else {
                    log::warn!("statement {file_id} failed: {:?}", response.errors);
                }
                Ok(response)
            }
            Err(e) => {
                if let Some(idx) = idx {
                    self.files[idx].status = FileStatus::Error;
                }
                Err(e)
            }
        }
    }

    /// Poll the backend for a file's status and mirror it locally.
    pub async fn poll_statement_status(&mut self, file_id: u64) -> Result<FileStatus, CoreError> {
        let wallet_id = self.require_wallet()?;
        let status = self.backend.statement_status(wallet_id, file_id).await?;
        if let Ok(idx) = self.file_index(file_id) {
            self.files[idx].status = status;
        }
        Ok(status)
    }

    pub async fn delete_statement(&mut self, file_id: u64) -> Result<(), CoreError> {
        let wallet_id = self.require_wallet()?;
        self.backend.delete_statement(wallet_id, file_id).await?;
        self.files.retain(|f| f.id != file_id);
        Ok(())
    }

    pub async fn download_statement(&self, file_id: u64) -> Result<Vec<u8>, CoreError> {
        let wallet_id = self.require_wallet()?;
        self.backend.download_statement(wallet_id, file_id).await
    }

    // ── Export ──────────────────────────────────────────────────────

    /// Export matching operations as pretty-printed JSON.
    pub fn export_operations_to_json(&self, filter: &OperationFilter) -> Result<String, CoreError> {
        serde_json::to_string_pretty(&self.filter_operations(filter)).map_err(|e| {
            CoreError::Serialization(format!("Failed to serialize operations to JSON: {e}"))
        })
    }

    /// Export matching operations as CSV, newest first.
    /// Columns: id, wallet_id, date, kind, symbol, name, quantity, unit_price,
    /// fee, total_value, status, notes
    pub fn export_operations_to_csv(&self, filter: &OperationFilter) -> Result<String, CoreError> {
        let mut operations = self.filter_operations(filter);
        operations.sort_by(|a, b| b.date.cmp(&a.date));

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record([
            "id",
            "wallet_id",
            "date",
            "kind",
            "symbol",
            "name",
            "quantity",
            "unit_price",
            "fee",
            "total_value",
            "status",
            "notes",
        ])?;
        for op in &operations {
            writer.write_record([
                op.id.map(|id| id.to_string()).unwrap_or_default(),
                op.wallet_id.to_string(),
                op.date.format("%Y-%m-%d %H:%M:%S").to_string(),
                op.kind.to_string(),
                op.asset.symbol.clone(),
                op.asset.name.clone(),
                op.quantity.to_string(),
                op.unit_price.to_string(),
                op.fee_or_zero().to_string(),
                op.total_value.to_string(),
                op.status.to_string(),
                op.notes.clone().unwrap_or_default(),
            ])?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| CoreError::Serialization(format!("Failed to flush CSV: {e}")))?;
        String::from_utf8(bytes)
            .map_err(|e| CoreError::Serialization(format!("CSV is not valid UTF-8: {e}")))
    }

    // ── Internal ────────────────────────────────────────────────────

    fn require_wallet(&self) -> Result<u64, CoreError> {
        self.selected_wallet
            .ok_or_else(|| CoreError::ValidationError("Select a wallet first".into()))
    }

    fn wallet_index(&self, wallet_id: u64) -> Result<usize, CoreError> {
        self.wallets
            .iter()
            .position(|w| w.id == wallet_id)
            .ok_or(CoreError::WalletNotFound(wallet_id))
    }

    fn file_index(&self, file_id: u64) -> Result<usize, CoreError> {
        self.files
            .iter()
            .position(|f| f.id == file_id)
            .ok_or(CoreError::StatementNotFound(file_id))
    }
}
