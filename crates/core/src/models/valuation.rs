use serde::{Deserialize, Serialize};

/// A position valued at a current market price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetHolding {
    pub name: String,
    pub symbol: String,
    pub quantity: f64,
    pub average_cost: f64,
    pub invested: f64,

    /// `None` when no price was available for the symbol
    pub current_price: Option<f64>,

    /// `quantity × current_price`, or `invested` when unpriced
    pub current_value: f64,

    /// `current_value - invested`
    pub profit_loss: f64,

    /// `profit_loss / invested × 100`, 0 when nothing was invested
    pub profit_loss_pct: f64,
}

impl AssetHolding {
    pub fn is_priced(&self) -> bool {
        self.current_price.is_some()
    }
}

/// Headline figures over a set of valued holdings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    pub total_invested: f64,
    pub total_value: f64,
    pub profit_loss: f64,
    pub profit_loss_pct: f64,
    pub asset_count: usize,
    pub best: Option<AssetPerformance>,
    pub worst: Option<AssetPerformance>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetPerformance {
    pub symbol: String,
    pub profit_loss_pct: f64,
}

/// Share of one asset in the portfolio's current value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationSlice {
    pub symbol: String,
    pub name: String,
    pub share_pct: f64,
    pub invested: f64,
    pub current_value: f64,
}

/// Criteria for narrowing a holdings listing. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HoldingFilter {
    /// Case-insensitive substring of the symbol
    pub symbol: Option<String>,
    /// Case-insensitive substring of the name
    pub name: Option<String>,
    pub min_invested: Option<f64>,
    pub max_invested: Option<f64>,
    pub only_gains: bool,
    pub only_losses: bool,
}

impl HoldingFilter {
    pub fn matches(&self, holding: &AssetHolding) -> bool {
        let contains = |haystack: &str, needle: &Option<String>| {
            needle
                .as_deref()
                .map(|n| haystack.to_lowercase().contains(&n.trim().to_lowercase()))
                .unwrap_or(true)
        };
        contains(&holding.symbol, &self.symbol)
            && contains(&holding.name, &self.name)
            && self.min_invested.map_or(true, |min| holding.invested >= min)
            && self.max_invested.map_or(true, |max| holding.invested <= max)
            && (!self.only_gains || holding.profit_loss_pct > 0.0)
            && (!self.only_losses || holding.profit_loss_pct < 0.0)
    }
}
