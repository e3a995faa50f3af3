//! Backend response/request shapes.
//!
//! The REST API speaks Portuguese field names (`idCarteira`, `nome`,
//! `corretora`, ...). These types mirror it exactly and convert into the
//! domain models; nothing outside `client` should see them.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::models::asset::Asset;
use crate::models::operation::{
    CreateOperationRequest, Operation, OperationKind, OperationStatus, UpdateOperationRequest,
};
use crate::models::statement::{FileStatus, ProcessStatementResponse, StatementFile};
use crate::models::wallet::{Brokerage, CreateWalletRequest, UpdateWalletRequest, Wallet};

/// Parse the timestamp formats the backend emits.
///
/// Naive timestamps are taken as wall-clock time. Timestamps with an offset
/// are converted to the local zone so month buckets follow the user's calendar.
pub fn parse_backend_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Wall-clock timestamp in the form the backend accepts.
pub fn format_backend_datetime(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S").to_string()
}

// ── Wallets ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerageDto {
    pub id_corretora: u64,
    pub nome: String,
    #[serde(default)]
    pub codigo: Option<String>,
    #[serde(default)]
    pub ativa: Option<bool>,
}

impl From<BrokerageDto> for Brokerage {
    fn from(dto: BrokerageDto) -> Self {
        Brokerage {
            id: dto.id_corretora,
            name: dto.nome,
            code: dto.codigo,
            active: dto.ativa.unwrap_or(true),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletDto {
    pub id_carteira: u64,
    pub nome: String,
    #[serde(default)]
    pub excluido: Option<bool>,
    #[serde(default)]
    pub ativa: Option<bool>,
    #[serde(default)]
    pub corretora: Option<BrokerageDto>,
    #[serde(default)]
    pub corretora_id: Option<u64>,
    #[serde(default)]
    pub data_criacao: Option<String>,
}

impl From<WalletDto> for Wallet {
    fn from(dto: WalletDto) -> Self {
        let brokerage: Option<Brokerage> = dto.corretora.map(Brokerage::from);
        let brokerage_id = brokerage.as_ref().map(|b| b.id).or(dto.corretora_id);
        // The list endpoint reports soft deletion; the detail endpoint reports activity.
        let active = match (dto.ativa, dto.excluido) {
            (Some(active), _) => active,
            (None, Some(deleted)) => !deleted,
            (None, None) => true,
        };
        Wallet {
            id: dto.id_carteira,
            name: dto.nome,
            brokerage,
            brokerage_id,
            created_at: dto.data_criacao.as_deref().and_then(parse_backend_datetime),
            active,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWalletBody<'a> {
    pub nome: &'a str,
    pub usuario_id: u64,
    pub corretora_id: u64,
}

impl<'a> From<&'a CreateWalletRequest> for CreateWalletBody<'a> {
    fn from(request: &'a CreateWalletRequest) -> Self {
        CreateWalletBody {
            nome: &request.name,
            usuario_id: request.user_id,
            corretora_id: request.brokerage_id,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWalletBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nome: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ativa: Option<bool>,
}

impl<'a> From<&'a UpdateWalletRequest> for UpdateWalletBody<'a> {
    fn from(request: &'a UpdateWalletRequest) -> Self {
        UpdateWalletBody {
            nome: request.name.as_deref().map(str::trim),
            ativa: request.active,
        }
    }
}

// ── Statement files ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRefDto {
    pub id_carteira: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementFileDto {
    pub id_arquivo: u64,
    pub nome: String,
    #[serde(default)]
    pub carteira: Option<WalletRefDto>,
    #[serde(default)]
    pub data_criacao: Option<String>,
    #[serde(default)]
    pub tamanho_bytes: Option<u64>,
    pub status: String,
    #[serde(default)]
    pub total_operacoes: Option<u64>,
    #[serde(default)]
    pub observacoes: Option<String>,
}

impl StatementFileDto {
    /// `fallback_wallet` is the wallet the request was made for; the backend
    /// omits the nested wallet on some endpoints.
    pub fn into_domain(self, fallback_wallet: u64) -> Result<StatementFile, CoreError> {
        Ok(StatementFile {
            id: self.id_arquivo,
            name: self.nome,
            wallet_id: self.carteira.map(|c| c.id_carteira).unwrap_or(fallback_wallet),
            uploaded_at: self.data_criacao.as_deref().and_then(parse_backend_datetime),
            size_bytes: self.tamanho_bytes.unwrap_or(0),
            status: self.status.parse::<FileStatus>()?,
            total_operations: self.total_operacoes.unwrap_or(0),
            notes: self.observacoes,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusDto {
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponseDto {
    pub sucesso: bool,
    #[serde(default)]
    pub total_operacoes: u64,
    #[serde(default)]
    pub erros: Option<Vec<String>>,
    #[serde(default)]
    pub avisos: Option<Vec<String>>,
}

impl From<ProcessResponseDto> for ProcessStatementResponse {
    fn from(dto: ProcessResponseDto) -> Self {
        ProcessStatementResponse {
            success: dto.sucesso,
            total_operations: dto.total_operacoes,
            errors: dto.erros.unwrap_or_default(),
            warnings: dto.avisos.unwrap_or_default(),
        }
    }
}

// ── Operations ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDto {
    #[serde(default, alias = "id")]
    pub id_operacao: Option<u64>,
    #[serde(default)]
    pub carteira_id: Option<u64>,
    #[serde(default)]
    pub criptomoeda: Option<String>,
    pub simbolo: String,
    pub tipo_operacao: String,
    pub quantidade: f64,
    #[serde(default)]
    pub preco_unitario: f64,
    #[serde(default)]
    pub valor_total: Option<f64>,
    #[serde(default)]
    pub taxa: Option<f64>,
    #[serde(default)]
    pub data_operacao: Option<String>,
    #[serde(default)]
    pub data_operacao_entrada: Option<String>,
    #[serde(default)]
    pub data_operacao_saida: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub observacoes: Option<String>,
    #[serde(default)]
    pub corretora_id: Option<u64>,
    #[serde(default)]
    pub hash_transacao: Option<String>,
}

impl OperationDto {
    /// Convert to a domain operation. The total value is taken verbatim when
    /// the backend supplies it and derived otherwise; a missing status means
    /// the backend already confirmed the operation.
    pub fn into_domain(self, fallback_wallet: u64) -> Result<Operation, CoreError> {
        let raw_date = self
            .data_operacao
            .as_deref()
            .or(self.data_operacao_entrada.as_deref())
            .or(self.data_operacao_saida.as_deref())
            .ok_or_else(|| {
                CoreError::Deserialization(format!(
                    "Operation {:?} ({}) has no date",
                    self.id_operacao, self.simbolo
                ))
            })?;
        let date = parse_backend_datetime(raw_date).ok_or_else(|| {
            CoreError::Deserialization(format!("Unrecognized operation date '{raw_date}'"))
        })?;

        let status = match self.status.as_deref() {
            Some(raw) => raw.parse::<OperationStatus>()?,
            None => OperationStatus::Confirmed,
        };

        let asset = Asset::new(
            self.simbolo.clone(),
            self.criptomoeda.unwrap_or_else(|| self.simbolo.clone()),
        );
        let mut operation = Operation::new(
            self.carteira_id.unwrap_or(fallback_wallet),
            asset,
            OperationKind::from(self.tipo_operacao),
            self.quantidade,
            self.preco_unitario,
            date,
        )
        .with_status(status);

        if let Some(fee) = self.taxa {
            operation = operation.with_fee(fee);
        }
        if let Some(total) = self.valor_total {
            operation = operation.with_total_value(total);
        }
        operation.id = self.id_operacao;
        operation.notes = self.observacoes;
        operation.brokerage_id = self.corretora_id;
        operation.tx_hash = self.hash_transacao;
        Ok(operation)
    }
}

/// Backend code of an operation kind (`COMPRA`, `VENDA`, ...).
pub fn backend_kind_code(kind: &OperationKind) -> &str {
    match kind {
        OperationKind::Buy => "COMPRA",
        OperationKind::Sell => "VENDA",
        OperationKind::TransferIn => "TRANSFERENCIA_ENTRADA",
        OperationKind::TransferOut => "TRANSFERENCIA_SAIDA",
        other => other.code(),
    }
}

pub fn backend_status_code(status: OperationStatus) -> &'static str {
    match status {
        OperationStatus::Pending => "PENDENTE",
        OperationStatus::Confirmed => "CONFIRMADA",
        OperationStatus::Cancelled => "CANCELADA",
        OperationStatus::Error => "ERRO",
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOperationBody<'a> {
    pub carteira_id: u64,
    pub criptomoeda: &'a str,
    pub simbolo: &'a str,
    pub tipo_operacao: &'a str,
    pub quantidade: f64,
    pub preco_unitario: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taxa: Option<f64>,
    pub data_operacao: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observacoes: Option<&'a str>,
    pub corretora_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_transacao: Option<&'a str>,
}

impl<'a> From<&'a CreateOperationRequest> for CreateOperationBody<'a> {
    fn from(request: &'a CreateOperationRequest) -> Self {
        CreateOperationBody {
            carteira_id: request.wallet_id,
            criptomoeda: &request.asset.name,
            simbolo: &request.asset.symbol,
            tipo_operacao: backend_kind_code(&request.kind),
            quantidade: request.quantity,
            preco_unitario: request.unit_price,
            taxa: request.fee,
            data_operacao: format_backend_datetime(&request.date),
            observacoes: request.notes.as_deref(),
            corretora_id: request.brokerage_id,
            hash_transacao: request.tx_hash.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOperationBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub criptomoeda: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simbolo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tipo_operacao: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantidade: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preco_unitario: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taxa: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_operacao: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observacoes: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_transacao: Option<&'a str>,
}

impl<'a> From<&'a UpdateOperationRequest> for UpdateOperationBody<'a> {
    fn from(request: &'a UpdateOperationRequest) -> Self {
        UpdateOperationBody {
            criptomoeda: request.name.as_deref(),
            simbolo: request.symbol.as_deref().map(|s| s.trim().to_uppercase()),
            tipo_operacao: request.kind.as_ref().map(backend_kind_code),
            quantidade: request.quantity,
            preco_unitario: request.unit_price,
            taxa: request.fee,
            data_operacao: request.date.as_ref().map(format_backend_datetime),
            observacoes: request.notes.as_deref(),
            status: request.status.map(backend_status_code),
            hash_transacao: request.tx_hash.as_deref(),
        }
    }
}
