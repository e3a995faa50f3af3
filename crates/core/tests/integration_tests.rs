use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::sync::Mutex;

use cryptofolio_core::client::traits::PortfolioBackend;
use cryptofolio_core::errors::CoreError;
use cryptofolio_core::models::asset::Asset;
use cryptofolio_core::models::operation::{
    CreateOperationRequest, Operation, OperationFilter, OperationKind, OperationSortOrder,
    OperationStatus, UpdateOperationRequest,
};
use cryptofolio_core::models::position::RollupOptions;
use cryptofolio_core::models::settings::ClientSettings;
use cryptofolio_core::models::statement::{
    FileStatus, ProcessStatementResponse, StatementFile, UploadStatementRequest,
};
use cryptofolio_core::models::wallet::{
    Brokerage, CreateWalletRequest, UpdateWalletRequest, Wallet,
};
use cryptofolio_core::PortfolioTracker;

// ═══════════════════════════════════════════════════════════════════
// Mock Backend (in-memory stand-in for the REST API)
// ═══════════════════════════════════════════════════════════════════

#[derive(Default)]
struct MockState {
    wallets: Vec<Wallet>,
    brokerages: Vec<Brokerage>,
    operations: HashMap<u64, Vec<Operation>>,
    files: HashMap<u64, Vec<StatementFile>>,
    next_id: u64,
    /// Uploaded files show up in listings right away
    list_uploads: bool,
    fail_file_listing: bool,
    fail_operation_listing: bool,
    process_result: Option<ProcessStatementResponse>,
    /// Operations a successful processing run adds to the wallet
    imported: Vec<Operation>,
    create_calls: usize,
    operation_writes: usize,
}

struct MockBackend {
    state: Mutex<MockState>,
}

impl MockBackend {
    fn new() -> Self {
        let mut state = MockState {
            next_id: 100,
            ..Default::default()
        };
        state.brokerages = vec![
            Brokerage {
                id: 4,
                name: "Binance".into(),
                code: Some("BNB".into()),
                active: true,
            },
            Brokerage {
                id: 5,
                name: "Mercado Bitcoin".into(),
                code: None,
                active: true,
            },
        ];
        state.wallets = vec![wallet(1, "Long term", 4), wallet(2, "Trading", 5)];
        state.operations.insert(1, wallet_one_operations());
        Self {
            state: Mutex::new(state),
        }
    }

    fn with<F: FnOnce(&mut MockState)>(self, f: F) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            f(&mut *state);
        }
        self
    }
}

fn not_found(subject: &str) -> CoreError {
    CoreError::from_status(404, subject)
}

#[async_trait]
impl PortfolioBackend for MockBackend {
    async fn list_wallets(&self) -> Result<Vec<Wallet>, CoreError> {
        Ok(self.state.lock().unwrap().wallets.clone())
    }

    async fn create_wallet(&self, request: &CreateWalletRequest) -> Result<Wallet, CoreError> {
        let mut state = self.state.lock().unwrap();
        state.create_calls += 1;
        state.next_id += 1;
        let created = wallet(state.next_id, &request.name, request.brokerage_id);
        state.wallets.push(created.clone());
        Ok(created)
    }

    async fn update_wallet(
        &self,
        wallet_id: u64,
        request: &UpdateWalletRequest,
    ) -> Result<Wallet, CoreError> {
        let mut state = self.state.lock().unwrap();
        let wallet = state
            .wallets
            .iter_mut()
            .find(|w| w.id == wallet_id)
            .ok_or_else(|| not_found("wallet"))?;
        if let Some(name) = &request.name {
            wallet.name = name.trim().to_string();
        }
        if let Some(active) = request.active {
            wallet.active = active;
        }
        Ok(wallet.clone())
    }

    async fn delete_wallet(&self, wallet_id: u64) -> Result<(), CoreError> {
        let mut state = self.state.lock().unwrap();
        if state.operations.get(&wallet_id).is_some_and(|ops| !ops.is_empty()) {
            return Err(CoreError::from_status(409, "wallet"));
        }
        state.wallets.retain(|w| w.id != wallet_id);
        Ok(())
    }

    async fn list_brokerages(&self) -> Result<Vec<Brokerage>, CoreError> {
        Ok(self.state.lock().unwrap().brokerages.clone())
    }

    async fn list_operations(&self, wallet_id: u64) -> Result<Vec<Operation>, CoreError> {
        let state = self.state.lock().unwrap();
        if state.fail_operation_listing {
            return Err(CoreError::from_status(500, "operation"));
        }
        Ok(state.operations.get(&wallet_id).cloned().unwrap_or_default())
    }

    async fn create_operation(
        &self,
        request: &CreateOperationRequest,
    ) -> Result<Operation, CoreError> {
        let mut state = self.state.lock().unwrap();
        state.operation_writes += 1;
        state.next_id += 1;
        let mut created = Operation::new(
            request.wallet_id,
            request.asset.clone(),
            request.kind.clone(),
            request.quantity,
            request.unit_price,
            request.date,
        )
        .with_id(state.next_id);
        if let Some(fee) = request.fee {
            created = created.with_fee(fee);
        }
        created.notes = request.notes.clone();
        created.brokerage_id = Some(request.brokerage_id);
        created.tx_hash = request.tx_hash.clone();
        state
            .operations
            .entry(request.wallet_id)
            .or_default()
            .push(created.clone());
        Ok(created)
    }

    async fn update_operation(
        &self,
        wallet_id: u64,
        operation_id: u64,
        request: &UpdateOperationRequest,
    ) -> Result<Operation, CoreError> {
        let mut state = self.state.lock().unwrap();
        state.operation_writes += 1;
        let op = state
            .operations
            .get_mut(&wallet_id)
            .and_then(|ops| ops.iter_mut().find(|op| op.id == Some(operation_id)))
            .ok_or_else(|| not_found("operation"))?;
        if let Some(quantity) = request.quantity {
            op.quantity = quantity;
        }
        if let Some(unit_price) = request.unit_price {
            op.unit_price = unit_price;
        }
        if let Some(status) = request.status {
            op.status = status;
        }
        if let Some(notes) = &request.notes {
            op.notes = Some(notes.clone());
        }
        op.total_value = op.derived_total();
        Ok(op.clone())
    }

    async fn delete_operation(&self, wallet_id: u64, operation_id: u64) -> Result<(), CoreError> {
        let mut state = self.state.lock().unwrap();
        state.operation_writes += 1;
        let ops = state.operations.entry(wallet_id).or_default();
        let before = ops.len();
        ops.retain(|op| op.id != Some(operation_id));
        if ops.len() == before {
            return Err(not_found("operation"));
        }
        Ok(())
    }

    async fn list_statement_files(&self, wallet_id: u64) -> Result<Vec<StatementFile>, CoreError> {
        let state = self.state.lock().unwrap();
        if state.fail_file_listing {
            return Err(CoreError::from_status(500, "statement file"));
        }
        Ok(state.files.get(&wallet_id).cloned().unwrap_or_default())
    }

    async fn upload_statement(
        &self,
        request: &UploadStatementRequest,
    ) -> Result<StatementFile, CoreError> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let file = StatementFile {
            id: state.next_id,
            name: request.file_name.clone(),
            wallet_id: request.wallet_id,
            uploaded_at: None,
            size_bytes: request.content.len() as u64,
            status: FileStatus::Pending,
            total_operations: 0,
            notes: request.notes.clone(),
        };
        if state.list_uploads {
            state
                .files
                .entry(request.wallet_id)
                .or_default()
                .push(file.clone());
        }
        Ok(file)
    }

    async fn process_statement(
        &self,
        wallet_id: u64,
        _file_id: u64,
    ) -> Result<ProcessStatementResponse, CoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some(result) = state.process_result.clone() {
            return Ok(result);
        }
        let imported = std::mem::take(&mut state.imported);
        let count = imported.len() as u64;
        state.operations.entry(wallet_id).or_default().extend(imported);
        Ok(ProcessStatementResponse {
            success: true,
            total_operations: count,
            errors: Vec::new(),
            warnings: Vec::new(),
        })
    }

    async fn statement_status(&self, wallet_id: u64, file_id: u64) -> Result<FileStatus, CoreError> {
        let state = self.state.lock().unwrap();
        state
            .files
            .get(&wallet_id)
            .and_then(|files| files.iter().find(|f| f.id == file_id))
            .map(|f| f.status)
            .ok_or_else(|| not_found("statement file"))
    }

    async fn delete_statement(&self, wallet_id: u64, file_id: u64) -> Result<(), CoreError> {
        let mut state = self.state.lock().unwrap();
        let files = state
            .files
            .get_mut(&wallet_id)
            .ok_or_else(|| not_found("statement file"))?;
        let before = files.len();
        files.retain(|f| f.id != file_id);
        if files.len() == before {
            return Err(not_found("statement file"));
        }
        Ok(())
    }

    async fn download_statement(&self, _wallet_id: u64, file_id: u64) -> Result<Vec<u8>, CoreError> {
        Ok(format!("file,{file_id}\n").into_bytes())
    }
}

// ═══════════════════════════════════════════════════════════════════
// Fixtures
// ═══════════════════════════════════════════════════════════════════

fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

fn wallet(id: u64, name: &str, brokerage_id: u64) -> Wallet {
    Wallet {
        id,
        name: name.into(),
        brokerage: None,
        brokerage_id: Some(brokerage_id),
        created_at: None,
        active: true,
    }
}

fn operation(
    id: u64,
    symbol: &str,
    name: &str,
    kind: OperationKind,
    qty: f64,
    price: f64,
    date: NaiveDateTime,
) -> Operation {
    Operation::new(1, Asset::new(symbol, name), kind, qty, price, date).with_id(id)
}

/// Jan: buy BTC 100, buy ETH 100. Feb: sell BTC 150, pending ETH buy 80.
fn wallet_one_operations() -> Vec<Operation> {
    vec![
        operation(1, "BTC", "Bitcoin", OperationKind::Buy, 1.0, 100.0, at(2024, 1, 10)),
        operation(2, "ETH", "Ethereum", OperationKind::Buy, 2.0, 50.0, at(2024, 1, 20)),
        operation(3, "BTC", "Bitcoin", OperationKind::Sell, 0.5, 300.0, at(2024, 2, 5)),
        operation(4, "ETH", "Ethereum", OperationKind::Buy, 1.0, 80.0, at(2024, 2, 10))
            .with_status(OperationStatus::Pending),
    ]
}

fn prices() -> HashMap<String, f64> {
    HashMap::from([("BTC".to_string(), 400.0), ("ETH".to_string(), 40.0)])
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

async fn tracker_with(backend: MockBackend) -> PortfolioTracker<MockBackend> {
    let mut tracker = PortfolioTracker::new(backend, ClientSettings::default()).unwrap();
    tracker.load_brokerages().await.unwrap();
    tracker.load_wallets().await.unwrap();
    tracker
}

async fn loaded_tracker() -> PortfolioTracker<MockBackend> {
    let mut tracker = tracker_with(MockBackend::new()).await;
    tracker.refresh_operations().await.unwrap();
    tracker
}

// ═══════════════════════════════════════════════════════════════════
// Construction & wallets
// ═══════════════════════════════════════════════════════════════════

mod wallets {
    use super::*;

    #[test]
    fn new_rejects_invalid_settings() {
        let settings = ClientSettings {
            timeout_secs: 0,
            ..Default::default()
        };
        let result = PortfolioTracker::new(MockBackend::new(), settings);
        assert!(matches!(result, Err(CoreError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn load_selects_first_wallet() {
        let tracker = tracker_with(MockBackend::new()).await;
        assert_eq!(tracker.wallets().len(), 2);
        assert_eq!(tracker.selected_wallet().unwrap().id, 1);
        assert_eq!(tracker.brokerages().len(), 2);
    }

    #[tokio::test]
    async fn reload_keeps_selection() {
        let mut tracker = tracker_with(MockBackend::new()).await;
        tracker.select_wallet(2).unwrap();
        tracker.load_wallets().await.unwrap();
        assert_eq!(tracker.selected_wallet().unwrap().id, 2);
    }

    #[tokio::test]
    async fn select_unknown_wallet() {
        let mut tracker = tracker_with(MockBackend::new()).await;
        assert!(matches!(
            tracker.select_wallet(77),
            Err(CoreError::WalletNotFound(77))
        ));
        assert_eq!(tracker.selected_wallet().unwrap().id, 1);
    }

    #[tokio::test]
    async fn search_uses_brokerage_names() {
        let tracker = tracker_with(MockBackend::new()).await;
        let hits = tracker.search_wallets("mercado");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Trading");
        assert_eq!(tracker.search_wallets("").len(), 2);
    }

    #[tokio::test]
    async fn create_validates_before_calling_backend() {
        let mut tracker = tracker_with(MockBackend::new()).await;
        let err = tracker.create_wallet("ab", 1, 4).await.unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
        assert_eq!(tracker.backend().state.lock().unwrap().create_calls, 0);
    }

    #[tokio::test]
    async fn create_selects_new_wallet() {
        let mut tracker = loaded_tracker().await;
        let created = tracker.create_wallet("  Cold storage ", 1, 4).await.unwrap();
        assert_eq!(created.name, "Cold storage");
        assert_eq!(tracker.wallets().len(), 3);
        assert_eq!(tracker.selected_wallet().unwrap().id, created.id);
        assert!(tracker.snapshot().is_empty());
    }

    #[tokio::test]
    async fn update_replaces_local_copy() {
        let mut tracker = tracker_with(MockBackend::new()).await;
        let request = UpdateWalletRequest {
            name: Some("Renamed".into()),
            active: Some(false),
        };
        tracker.update_wallet(2, request).await.unwrap();
        let w = tracker.wallets().iter().find(|w| w.id == 2).unwrap();
        assert_eq!(w.name, "Renamed");
        assert!(!w.active);
    }

    #[tokio::test]
    async fn update_unknown_wallet() {
        let mut tracker = tracker_with(MockBackend::new()).await;
        let err = tracker
            .update_wallet(9, UpdateWalletRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::WalletNotFound(9)));
    }

    #[tokio::test]
    async fn delete_wallet_with_operations_is_rejected() {
        let mut tracker = loaded_tracker().await;
        let err = tracker.delete_wallet(1).await.unwrap_err();
        assert_eq!(err.status(), Some(409));
        assert_eq!(tracker.wallets().len(), 2);
        assert_eq!(tracker.snapshot().operations.len(), 4);
    }

    #[tokio::test]
    async fn delete_selected_wallet_clears_state() {
        let mut tracker = tracker_with(MockBackend::new()).await;
        tracker.select_wallet(2).unwrap();
        tracker.refresh_operations().await.unwrap();
        assert_eq!(tracker.snapshot().wallet_id, Some(2));

        tracker.delete_wallet(2).await.unwrap();
        assert!(tracker.selected_wallet().is_none());
        assert!(tracker.snapshot().wallet_id.is_none());
        assert_eq!(tracker.wallets().len(), 1);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Operations & aggregates
// ═══════════════════════════════════════════════════════════════════

mod aggregates {
    use super::*;

    #[tokio::test]
    async fn refresh_requires_a_wallet() {
        let backend = MockBackend::new().with(|s| s.wallets.clear());
        let mut tracker = tracker_with(backend).await;
        assert!(matches!(
            tracker.refresh_operations().await,
            Err(CoreError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn refresh_publishes_snapshot() {
        let mut tracker = tracker_with(MockBackend::new()).await;
        let mut rx = tracker.subscribe();

        assert_eq!(tracker.refresh_operations().await.unwrap(), 4);
        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.wallet_id, Some(1));
        assert_eq!(snapshot.revision, tracker.snapshot().revision);
    }

    #[tokio::test]
    async fn monthly_history_all_and_confirmed() {
        let tracker = loaded_tracker().await;

        let all = tracker.monthly_history(&OperationFilter::default()).unwrap();
        assert_eq!(all.months.len(), 2);
        assert_eq!(all.grand_total, 430.0);
        assert_eq!(all.grand_net, -130.0);

        let confirmed = tracker.monthly_history(&OperationFilter::confirmed()).unwrap();
        assert_eq!(confirmed.grand_total, 350.0);
        assert_eq!(confirmed.grand_net, -50.0);
        assert_eq!(confirmed.month(2024, 2).unwrap().operation_count, 1);
    }

    #[tokio::test]
    async fn monthly_history_none_without_operations() {
        let tracker = tracker_with(MockBackend::new()).await;
        assert!(tracker.monthly_history(&OperationFilter::default()).is_none());
    }

    #[tokio::test]
    async fn positions_respect_filter() {
        let tracker = loaded_tracker().await;

        let confirmed = tracker.positions(&OperationFilter::confirmed());
        assert_eq!(confirmed.len(), 2);
        assert_eq!(confirmed[0].symbol, "BTC");
        assert_eq!(confirmed[0].quantity, 0.5);
        assert_eq!(confirmed[0].invested, 50.0);
        assert_eq!(confirmed[1].symbol, "ETH");
        assert_eq!(confirmed[1].invested, 100.0);

        let all = tracker.positions(&OperationFilter::default());
        let eth = all.iter().find(|p| p.symbol == "ETH").unwrap();
        assert_eq!(eth.quantity, 3.0);
        assert_eq!(eth.invested, 180.0);
        assert_eq!(eth.average_cost, 60.0);
    }

    #[tokio::test]
    async fn rollup_options_are_applied() {
        let mut tracker = loaded_tracker().await;
        tracker.set_rollup_options(RollupOptions::legacy());
        assert_eq!(tracker.rollup_options(), RollupOptions::legacy());
        // No fees on the fixture, so both formulas agree.
        let btc = tracker
            .positions(&OperationFilter::confirmed())
            .into_iter()
            .find(|p| p.symbol == "BTC")
            .unwrap();
        assert_eq!(btc.invested, 50.0);
    }

    #[tokio::test]
    async fn valuation_views() {
        let tracker = loaded_tracker().await;
        let filter = OperationFilter::confirmed();

        let holdings = tracker.holdings(&filter, &prices());
        let btc = holdings.iter().find(|h| h.symbol == "BTC").unwrap();
        assert_eq!(btc.current_value, 200.0);
        assert_eq!(btc.profit_loss, 150.0);

        let summary = tracker.portfolio_summary(&filter, &prices());
        assert_eq!(summary.total_invested, 150.0);
        assert_eq!(summary.total_value, 280.0);
        assert_eq!(summary.profit_loss, 130.0);
        assert_eq!(summary.best.unwrap().symbol, "BTC");
        assert_eq!(summary.worst.unwrap().symbol, "ETH");

        let allocation = tracker.allocation(&filter, &prices());
        assert_eq!(allocation[0].symbol, "BTC");
        assert!(approx(allocation[0].share_pct, 200.0 / 280.0 * 100.0));
    }

    #[tokio::test]
    async fn chart_series() {
        let tracker = loaded_tracker().await;
        let points = tracker.invested_chart(&OperationFilter::confirmed());
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].label, "01/24");
        assert_eq!(points[0].net_flow, 200.0);
        assert_eq!(points[0].invested, 200.0);
        assert_eq!(points[1].net_flow, -150.0);
        assert_eq!(points[1].invested, 150.0);
    }

    #[tokio::test]
    async fn listing_helpers() {
        let tracker = loaded_tracker().await;

        let summary = tracker.operation_summary(&OperationFilter::default());
        assert_eq!(summary.total_operations, 4);
        assert_eq!(summary.buy_count, 3);
        assert_eq!(summary.sell_count, 1);
        assert_eq!(summary.total_invested, 280.0);
        assert_eq!(summary.total_sold, 150.0);
        assert_eq!(summary.unique_assets, 2);

        let newest = tracker.operations_sorted(&OperationSortOrder::DateDesc);
        assert_eq!(newest[0].id, Some(4));

        let pending = tracker.filter_operations(&OperationFilter {
            status: Some(OperationStatus::Pending),
            ..Default::default()
        });
        assert_eq!(pending.len(), 1);

        assert_eq!(tracker.search_operations("ethereum").len(), 2);
    }

    #[tokio::test]
    async fn export_csv() {
        let tracker = loaded_tracker().await;
        let csv = tracker
            .export_operations_to_csv(&OperationFilter::confirmed())
            .unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(
            lines[0],
            "id,wallet_id,date,kind,symbol,name,quantity,unit_price,fee,total_value,status,notes"
        );
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("3,1,2024-02-05 12:00:00,SELL,BTC,Bitcoin,0.5,300,0,150,CONFIRMED"));
        assert!(lines[3].starts_with("1,1,2024-01-10 12:00:00,BUY,BTC"));
    }

    #[tokio::test]
    async fn export_json() {
        let tracker = loaded_tracker().await;
        let json = tracker
            .export_operations_to_json(&OperationFilter::default())
            .unwrap();
        let back: Vec<Operation> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tracker.snapshot().operations);
    }

    #[tokio::test]
    async fn debug_output() {
        let tracker = loaded_tracker().await;
        let out = format!("{:?}", tracker);
        assert!(out.contains("PortfolioTracker"));
        assert!(out.contains("operations: 4"));
    }
}

// ═══════════════════════════════════════════════════════════════════
// Operation changes
// ═══════════════════════════════════════════════════════════════════

mod operations {
    use super::*;

    fn sol_buy(wallet_id: u64) -> CreateOperationRequest {
        CreateOperationRequest::new(
            wallet_id,
            4,
            Asset::new("sol", "Solana"),
            OperationKind::Buy,
            10.0,
            20.0,
            at(2024, 3, 5),
        )
        .with_fee(2.0)
    }

    #[tokio::test]
    async fn create_requires_a_wallet() {
        let backend = MockBackend::new().with(|s| s.wallets.clear());
        let mut tracker = tracker_with(backend).await;
        let err = tracker.create_operation(sol_buy(1)).await.unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
    }

    #[tokio::test]
    async fn create_rejects_other_wallet_and_bad_amounts() {
        let mut tracker = loaded_tracker().await;

        let err = tracker.create_operation(sol_buy(2)).await.unwrap_err();
        assert!(err.to_string().contains("wallet 1 is selected"));

        let mut negative = sol_buy(1);
        negative.quantity = -1.0;
        let err = tracker.create_operation(negative).await.unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(ref m) if m.contains("Quantity")));

        assert_eq!(tracker.backend().state.lock().unwrap().operation_writes, 0);
        assert_eq!(tracker.snapshot().operations.len(), 4);
    }

    #[tokio::test]
    async fn create_republishes_snapshot() {
        let mut tracker = loaded_tracker().await;
        let mut rx = tracker.subscribe();
        let revision = tracker.snapshot().revision;

        let created = tracker.create_operation(sol_buy(1)).await.unwrap();
        assert_eq!(created.id, Some(101));
        assert_eq!(created.asset.symbol, "SOL");
        assert_eq!(created.total_value, 202.0);

        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.revision, revision + 1);
        assert_eq!(snapshot.operations.len(), 5);

        let positions = tracker.positions(&OperationFilter::default());
        let sol = positions.iter().find(|p| p.symbol == "SOL").unwrap();
        assert_eq!(sol.quantity, 10.0);
        assert_eq!(sol.invested, 202.0);
    }

    #[tokio::test]
    async fn create_before_first_refresh_fetches_list() {
        let mut tracker = tracker_with(MockBackend::new()).await;
        assert!(tracker.snapshot().wallet_id.is_none());

        tracker.create_operation(sol_buy(1)).await.unwrap();
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.wallet_id, Some(1));
        assert_eq!(snapshot.operations.len(), 5);
    }

    #[tokio::test]
    async fn update_replaces_operation_in_snapshot() {
        let mut tracker = loaded_tracker().await;
        let request = UpdateOperationRequest {
            status: Some(OperationStatus::Confirmed),
            quantity: Some(2.0),
            ..Default::default()
        };

        let updated = tracker.update_operation(4, request).await.unwrap();
        assert_eq!(updated.status, OperationStatus::Confirmed);
        assert_eq!(updated.total_value, 160.0);

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.operations.len(), 4);
        let op = snapshot.operations.iter().find(|op| op.id == Some(4)).unwrap();
        assert_eq!(op.quantity, 2.0);

        let confirmed = tracker.monthly_history(&OperationFilter::confirmed()).unwrap();
        assert_eq!(confirmed.month(2024, 2).unwrap().operation_count, 2);
    }

    #[tokio::test]
    async fn update_validates_changed_fields() {
        let mut tracker = loaded_tracker().await;
        let request = UpdateOperationRequest {
            unit_price: Some(f64::NAN),
            ..Default::default()
        };
        let err = tracker.update_operation(4, request).await.unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(ref m) if m.contains("Unit price")));
        assert_eq!(tracker.backend().state.lock().unwrap().operation_writes, 0);
    }

    #[tokio::test]
    async fn update_unknown_operation_keeps_snapshot() {
        let mut tracker = loaded_tracker().await;
        let revision = tracker.snapshot().revision;
        let err = tracker
            .update_operation(999, UpdateOperationRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(tracker.snapshot().revision, revision);
    }

    #[tokio::test]
    async fn delete_removes_from_snapshot() {
        let mut tracker = loaded_tracker().await;
        tracker.delete_operation(3).await.unwrap();

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.operations.len(), 3);
        assert!(snapshot.operations.iter().all(|op| op.id != Some(3)));

        let btc = tracker
            .positions(&OperationFilter::default())
            .into_iter()
            .find(|p| p.symbol == "BTC")
            .unwrap();
        assert_eq!(btc.quantity, 1.0);
        assert_eq!(btc.invested, 100.0);

        let err = tracker.delete_operation(3).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
    }
}

// ═══════════════════════════════════════════════════════════════════
// Statement files
// ═══════════════════════════════════════════════════════════════════

mod statements {
    use super::*;

    fn listed_file(id: u64, status: FileStatus) -> StatementFile {
        StatementFile {
            id,
            name: format!("extrato-{id}.csv"),
            wallet_id: 1,
            uploaded_at: None,
            size_bytes: 128,
            status,
            total_operations: 0,
            notes: None,
        }
    }

    #[tokio::test]
    async fn upload_rejects_invalid_file() {
        let mut tracker = tracker_with(MockBackend::new()).await;
        let err = tracker
            .upload_statement("extrato.xlsx", Vec::new(), None)
            .await
            .unwrap_err();
        match err {
            CoreError::ValidationError(msg) => {
                assert!(msg.contains(".csv extension"));
                assert!(msg.contains("File is empty"));
            }
            other => panic!("Expected ValidationError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn upload_respects_configured_limit() {
        let settings = ClientSettings {
            max_upload_bytes: 8,
            ..Default::default()
        };
        let mut tracker = PortfolioTracker::new(MockBackend::new(), settings).unwrap();
        tracker.load_wallets().await.unwrap();
        let err = tracker
            .upload_statement("big.csv", vec![b'x'; 9], None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("File too large. Maximum size: 8 Bytes"));
    }

    #[tokio::test]
    async fn upload_prepends_pending_file() {
        let backend = MockBackend::new()
            .with(|s| s.files = HashMap::from([(1, vec![listed_file(7, FileStatus::Processed)])]));
        let mut tracker = tracker_with(backend).await;
        tracker.load_statement_files().await.unwrap();

        let file = tracker
            .upload_statement("extrato.csv", b"a,b\n".to_vec(), Some("  ".into()))
            .await
            .unwrap();
        assert_eq!(file.status, FileStatus::Pending);
        assert!(file.notes.is_none());
        assert_eq!(tracker.statement_files()[0].id, file.id);
        assert_eq!(tracker.statement_files().len(), 2);
    }

    #[tokio::test]
    async fn reload_keeps_local_in_flight_files() {
        let backend = MockBackend::new()
            .with(|s| s.files = HashMap::from([(1, vec![listed_file(7, FileStatus::Processed)])]));
        let mut tracker = tracker_with(backend).await;
        let uploaded = tracker
            .upload_statement("extrato.csv", b"a,b\n".to_vec(), None)
            .await
            .unwrap();

        let files = tracker.load_statement_files().await.unwrap();
        let ids: Vec<u64> = files.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![uploaded.id, 7]);
    }

    #[tokio::test]
    async fn reload_does_not_duplicate_listed_uploads() {
        let backend = MockBackend::new().with(|s| s.list_uploads = true);
        let mut tracker = tracker_with(backend).await;
        tracker
            .upload_statement("extrato.csv", b"a,b\n".to_vec(), None)
            .await
            .unwrap();

        assert_eq!(tracker.load_statement_files().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_reload_keeps_only_local_files() {
        let backend = MockBackend::new()
            .with(|s| s.files = HashMap::from([(1, vec![listed_file(7, FileStatus::Processed)])]));
        let mut tracker = tracker_with(backend).await;
        tracker.load_statement_files().await.unwrap();
        let uploaded = tracker
            .upload_statement("extrato.csv", b"a,b\n".to_vec(), None)
            .await
            .unwrap();

        tracker.backend().state.lock().unwrap().fail_file_listing = true;
        let err = tracker.load_statement_files().await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(tracker.statement_files().len(), 1);
        assert_eq!(tracker.statement_files()[0].id, uploaded.id);
    }

    #[tokio::test]
    async fn process_imports_and_refreshes() {
        let imported = operation(9, "ADA", "Cardano", OperationKind::Buy, 10.0, 1.0, at(2024, 3, 1));
        let backend = MockBackend::new().with(|s| s.imported = vec![imported]);
        let mut tracker = tracker_with(backend).await;
        tracker.refresh_operations().await.unwrap();
        let file = tracker
            .upload_statement("extrato.csv", b"a,b\n".to_vec(), None)
            .await
            .unwrap();

        let response = tracker.process_statement(file.id).await.unwrap();
        assert!(response.success);
        assert_eq!(response.total_operations, 1);

        let local = &tracker.statement_files()[0];
        assert_eq!(local.status, FileStatus::Processed);
        assert_eq!(local.total_operations, 1);

        assert_eq!(tracker.snapshot().operations.len(), 5);
        let history = tracker.monthly_history(&OperationFilter::default()).unwrap();
        assert!(history.month(2024, 3).is_some());
    }

    #[tokio::test]
    async fn processed_statement_survives_failed_refresh() {
        let imported = operation(9, "ADA", "Cardano", OperationKind::Buy, 10.0, 1.0, at(2024, 3, 1));
        let backend = MockBackend::new().with(|s| s.imported = vec![imported]);
        let mut tracker = tracker_with(backend).await;
        tracker.refresh_operations().await.unwrap();
        let revision = tracker.snapshot().revision;
        let file = tracker
            .upload_statement("extrato.csv", b"a,b\n".to_vec(), None)
            .await
            .unwrap();

        tracker.backend().state.lock().unwrap().fail_operation_listing = true;
        let response = tracker.process_statement(file.id).await.unwrap();
        assert!(response.success);
        assert_eq!(response.total_operations, 1);
        assert_eq!(tracker.statement_files()[0].status, FileStatus::Processed);

        // Old snapshot stays published until the next refresh succeeds.
        assert_eq!(tracker.snapshot().revision, revision);
        assert_eq!(tracker.snapshot().operations.len(), 4);

        tracker.backend().state.lock().unwrap().fail_operation_listing = false;
        assert_eq!(tracker.refresh_operations().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn failed_processing_marks_error() {
        let backend = MockBackend::new().with(|s| {
            s.process_result = Some(ProcessStatementResponse {
                success: false,
                total_operations: 0,
                errors: vec!["Unrecognized header".into()],
                warnings: Vec::new(),
            })
        });
        let mut tracker = tracker_with(backend).await;
        let file = tracker
            .upload_statement("extrato.csv", b"a,b\n".to_vec(), None)
            .await
            .unwrap();

        let response = tracker.process_statement(file.id).await.unwrap();
        assert!(!response.success);
        assert_eq!(tracker.statement_files()[0].status, FileStatus::Error);

        let again = tracker.process_statement(file.id).await.unwrap_err();
        assert!(matches!(again, CoreError::ValidationError(_)));
    }

    #[tokio::test]
    async fn process_unknown_file() {
        let mut tracker = tracker_with(MockBackend::new()).await;
        assert!(matches!(
            tracker.process_statement(404).await,
            Err(CoreError::StatementNotFound(404))
        ));
    }

    #[tokio::test]
    async fn poll_updates_local_status() {
        let backend = MockBackend::new()
            .with(|s| s.files = HashMap::from([(1, vec![listed_file(7, FileStatus::Processing)])]));
        let mut tracker = tracker_with(backend).await;
        tracker.load_statement_files().await.unwrap();

        tracker.backend().state.lock().unwrap().files.get_mut(&1).unwrap()[0].status =
            FileStatus::Processed;
        let status = tracker.poll_statement_status(7).await.unwrap();
        assert_eq!(status, FileStatus::Processed);
        assert_eq!(tracker.statement_files()[0].status, FileStatus::Processed);
    }

    #[tokio::test]
    async fn delete_and_download() {
        let backend = MockBackend::new()
            .with(|s| s.files = HashMap::from([(1, vec![listed_file(7, FileStatus::Processed)])]));
        let mut tracker = tracker_with(backend).await;
        tracker.load_statement_files().await.unwrap();

        let bytes = tracker.download_statement(7).await.unwrap();
        assert_eq!(bytes, b"file,7\n".to_vec());

        tracker.delete_statement(7).await.unwrap();
        assert!(tracker.statement_files().is_empty());

        let err = tracker.delete_statement(7).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
    }
}
