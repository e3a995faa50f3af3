use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
#[cfg(not(target_arch = "wasm32"))]
use std::time::Duration;

use super::traits::PortfolioBackend;
use super::wire::{
    BrokerageDto, CreateOperationBody, CreateWalletBody, OperationDto, ProcessResponseDto,
    StatementFileDto, StatusDto, UpdateOperationBody, UpdateWalletBody, WalletDto,
};
use crate::errors::CoreError;
use crate::models::operation::{CreateOperationRequest, Operation, UpdateOperationRequest};
use crate::models::settings::ClientSettings;
use crate::models::statement::{
    FileStatus, ProcessStatementResponse, StatementFile, UploadStatementRequest,
};
use crate::models::wallet::{Brokerage, CreateWalletRequest, UpdateWalletRequest, Wallet};

/// REST client for the portfolio backend.
///
/// - **Wallets**: `/v1/carteiras`, `/v1/carteiras/{id}`
/// - **Brokerages**: `/v1/corretoras`
/// - **Operations**: `/v1/carteiras/{id}/operacoes[/{op}]`
/// - **Statements**: `/v1/carteiras/{id}/arquivos[/{file}[/status|/processar|/download]]`
pub struct HttpBackend {
    client: Client,
    root: String,
}

impl HttpBackend {
    pub fn new(settings: &ClientSettings) -> Result<Self, CoreError> {
        settings.validate()?;
        let builder = Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(Duration::from_secs(settings.timeout_secs));
        let client = builder
            .build()
            .map_err(|e| CoreError::InvalidConfig(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            root: settings.api_root().to_string(),
        })
    }

    fn wallets_url(&self) -> String {
        format!("{}/v1/carteiras", self.root)
    }

    fn wallet_url(&self, wallet_id: u64) -> String {
        format!("{}/{wallet_id}", self.wallets_url())
    }

    fn operations_url(&self, wallet_id: u64) -> String {
        format!("{}/operacoes", self.wallet_url(wallet_id))
    }

    fn operation_url(&self, wallet_id: u64, operation_id: u64) -> String {
        format!("{}/{operation_id}", self.operations_url(wallet_id))
    }

    fn files_url(&self, wallet_id: u64) -> String {
        format!("{}/arquivos", self.wallet_url(wallet_id))
    }

    fn file_url(&self, wallet_id: u64, file_id: u64) -> String {
        format!("{}/{file_id}", self.files_url(wallet_id))
    }

    /// Turn a non-2xx response into `CoreError::Http` with a user-facing message.
    fn ensure_success(response: Response, subject: &str) -> Result<Response, CoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        log::warn!("backend rejected {subject} request: HTTP {status}");
        Err(CoreError::from_status(status.as_u16(), subject))
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: Response,
        subject: &str,
    ) -> Result<T, CoreError> {
        let response = Self::ensure_success(response, subject)?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            CoreError::Deserialization(format!("Unexpected {subject} payload from backend: {e}"))
        })
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl PortfolioBackend for HttpBackend {
    async fn list_wallets(&self) -> Result<Vec<Wallet>, CoreError> {
        let response = self.client.get(self.wallets_url()).send().await?;
        let wallets: Vec<WalletDto> = Self::read_json(response, "wallet").await?;
        log::debug!("loaded {} wallets", wallets.len());
        Ok(wallets.into_iter().map(Wallet::from).collect())
    }

    async fn create_wallet(&self, request: &CreateWalletRequest) -> Result<Wallet, CoreError> {
        let response = self
            .client
            .post(self.wallets_url())
            .json(&CreateWalletBody::from(request))
            .send()
            .await?;
        let wallet: WalletDto = Self::read_json(response, "wallet").await?;
        log::info!("created wallet {} ({})", wallet.id_carteira, wallet.nome);
        Ok(wallet.into())
    }

    async fn update_wallet(
        &self,
        wallet_id: u64,
        request: &UpdateWalletRequest,
    ) -> Result<Wallet, CoreError> {
        let response = self
            .client
            .put(self.wallet_url(wallet_id))
            .json(&UpdateWalletBody::from(request))
            .send()
            .await?;
        let wallet: WalletDto = Self::read_json(response, "wallet").await?;
        Ok(wallet.into())
    }

    async fn delete_wallet(&self, wallet_id: u64) -> Result<(), CoreError> {
        let response = self.client.delete(self.wallet_url(wallet_id)).send().await?;
        Self::ensure_success(response, "wallet")?;
        log::info!("deleted wallet {wallet_id}");
        Ok(())
    }

    async fn list_brokerages(&self) -> Result<Vec<Brokerage>, CoreError> {
        let url = format!("{}/v1/corretoras", self.root);
        let response = self.client.get(url).send().await?;
        let brokerages: Vec<BrokerageDto> = Self::read_json(response, "brokerage").await?;
        Ok(brokerages.into_iter().map(Brokerage::from).collect())
    }

    async fn list_operations(&self, wallet_id: u64) -> Result<Vec<Operation>, CoreError> {
        let response = self.client.get(self.operations_url(wallet_id)).send().await?;
        let dtos: Vec<OperationDto> = Self::read_json(response, "operation").await?;

        let total = dtos.len();
        let operations: Vec<Operation> = dtos
            .into_iter()
            .filter_map(|dto| match dto.into_domain(wallet_id) {
                Ok(op) => Some(op),
                Err(e) => {
                    log::warn!("skipping operation in wallet {wallet_id}: {e}");
                    None
                }
            })
            .collect();
        log::debug!(
            "loaded {} of {total} operations for wallet {wallet_id}",
            operations.len()
        );
        Ok(operations)
    }

    async fn create_operation(
        &self,
        request: &CreateOperationRequest,
    ) -> Result<Operation, CoreError> {
        let wallet_id = request.wallet_id;
        let response = self
            .client
            .post(self.operations_url(wallet_id))
            .json(&CreateOperationBody::from(request))
            .send()
            .await?;
        let dto: OperationDto = Self::read_json(response, "operation").await?;
        let operation = dto.into_domain(wallet_id)?;
        log::info!(
            "created {} operation {:?} in wallet {wallet_id}",
            operation.kind,
            operation.id
        );
        Ok(operation)
    }

    async fn update_operation(
        &self,
        wallet_id: u64,
        operation_id: u64,
        request: &UpdateOperationRequest,
    ) -> Result<Operation, CoreError> {
        let response = self
            .client
            .put(self.operation_url(wallet_id, operation_id))
            .json(&UpdateOperationBody::from(request))
            .send()
            .await?;
        let dto: OperationDto = Self::read_json(response, "operation").await?;
        dto.into_domain(wallet_id)
    }

    async fn delete_operation(&self, wallet_id: u64, operation_id: u64) -> Result<(), CoreError> {
        let response = self
            .client
            .delete(self.operation_url(wallet_id, operation_id))
            .send()
            .await?;
        Self::ensure_success(response, "operation")?;
        log::info!("deleted operation {operation_id} from wallet {wallet_id}");
        Ok(())
    }

    async fn list_statement_files(&self, wallet_id: u64) -> Result<Vec<StatementFile>, CoreError> {
        let response = self.client.get(self.files_url(wallet_id)).send().await?;
        let dtos: Vec<StatementFileDto> = Self::read_json(response, "statement file").await?;
        dtos.into_iter().map(|dto| dto.into_domain(wallet_id)).collect()
    }

    async fn upload_statement(
        &self,
        request: &UploadStatementRequest,
    ) -> Result<StatementFile, CoreError> {
        let part = Part::bytes(request.content.clone())
            .file_name(request.file_name.clone())
            .mime_str("text/csv")?;
        let mut form = Form::new().part("file", part);
        if let Some(notes) = &request.notes {
            form = form.text("observacoes", notes.clone());
        }

        let response = self
            .client
            .post(self.files_url(request.wallet_id))
            .multipart(form)
            .send()
            .await?;
        let dto: StatementFileDto = Self::read_json(response, "statement file").await?;
        let file = dto.into_domain(request.wallet_id)?;
        log::info!(
            "uploaded statement '{}' to wallet {} as file {}",
            file.name,
            file.wallet_id,
            file.id
        );
        Ok(file)
    }

    async fn process_statement(
        &self,
        wallet_id: u64,
        file_id: u64,
    ) -> Result<ProcessStatementResponse, CoreError> {
        let url = format!("{}/processar", self.file_url(wallet_id, file_id));
        let response = self.client.post(url).send().await?;
        let dto: ProcessResponseDto = Self::read_json(response, "statement file").await?;
        Ok(dto.into())
    }

    async fn statement_status(&self, wallet_id: u64, file_id: u64) -> Result<FileStatus, CoreError> {
        let url = format!("{}/status", self.file_url(wallet_id, file_id));
        let response = self.client.get(url).send().await?;
        let dto: StatusDto = Self::read_json(response, "statement file").await?;
        dto.status.parse()
    }

    async fn delete_statement(&self, wallet_id: u64, file_id: u64) -> Result<(), CoreError> {
        let response = self
            .client
            .delete(self.file_url(wallet_id, file_id))
            .send()
            .await?;
        Self::ensure_success(response, "statement file")?;
        Ok(())
    }

    async fn download_statement(&self, wallet_id: u64, file_id: u64) -> Result<Vec<u8>, CoreError> {
        let url = format!("{}/download", self.file_url(wallet_id, file_id));
        let response = self.client.get(url).send().await?;
        let response = Self::ensure_success(response, "statement file")?;
        Ok(response.bytes().await?.to_vec())
    }
}
