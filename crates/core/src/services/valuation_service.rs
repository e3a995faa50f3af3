use std::cmp::Ordering;
use std::collections::HashMap;

use crate::models::position::PositionSummary;
use crate::models::valuation::{
    AllocationSlice, AssetHolding, AssetPerformance, HoldingFilter, PortfolioSummary,
};

/// Values open positions at current prices: gain/loss, returns, allocation.
///
/// Prices come from the caller as a `symbol → price` map in the wallet
/// currency; this service never fetches anything.
pub struct ValuationService;

impl ValuationService {
    pub fn new() -> Self {
        Self
    }

    /// Value each position. Holdings without a price keep their invested
    /// value as current value and report no gain or loss.
    pub fn value_positions(
        &self,
        positions: &[PositionSummary],
        prices: &HashMap<String, f64>,
    ) -> Vec<AssetHolding> {
        positions
            .iter()
            .map(|position| {
                let current_price = prices
                    .get(&position.symbol.to_uppercase())
                    .copied()
                    .filter(|p| p.is_finite() && *p >= 0.0);
                let current_value = match current_price {
                    Some(price) => position.quantity * price,
                    None => position.invested,
                };
                let profit_loss = current_value - position.invested;
                let profit_loss_pct = if position.invested > 0.0 {
                    (profit_loss / position.invested) * 100.0
                } else {
                    0.0
                };

                AssetHolding {
                    name: position.name.clone(),
                    symbol: position.symbol.clone(),
                    quantity: position.quantity,
                    average_cost: position.average_cost,
                    invested: position.invested,
                    current_price,
                    current_value,
                    profit_loss,
                    profit_loss_pct,
                }
            })
            .collect()
    }

    /// Totals over the holdings plus the best and worst performer by P/L %.
    pub fn summarize(&self, holdings: &[AssetHolding]) -> PortfolioSummary {
        let total_invested: f64 = holdings.iter().map(|h| h.invested).sum();
        let total_value: f64 = holdings.iter().map(|h| h.current_value).sum();
        let profit_loss = total_value - total_invested;
        let profit_loss_pct = if total_invested > 0.0 {
            (profit_loss / total_invested) * 100.0
        } else {
            0.0
        };

        let mut ranked: Vec<&AssetHolding> = holdings.iter().collect();
        ranked.sort_by(|a, b| {
            b.profit_loss_pct
                .partial_cmp(&a.profit_loss_pct)
                .unwrap_or(Ordering::Equal)
        });
        let performance = |h: &&AssetHolding| AssetPerformance {
            symbol: h.symbol.clone(),
            profit_loss_pct: h.profit_loss_pct,
        };

        PortfolioSummary {
            total_invested,
            total_value,
            profit_loss,
            profit_loss_pct,
            asset_count: holdings.len(),
            best: ranked.first().map(performance),
            worst: ranked.last().map(performance),
        }
    }

    /// Each holding's share of the total current value, largest first.
    pub fn allocation(&self, holdings: &[AssetHolding]) -> Vec<AllocationSlice> {
        let total_value: f64 = holdings.iter().map(|h| h.current_value).sum();
        let mut slices: Vec<AllocationSlice> = holdings
            .iter()
            .map(|h| AllocationSlice {
                symbol: h.symbol.clone(),
                name: h.name.clone(),
                share_pct: if total_value > 0.0 {
                    (h.current_value / total_value) * 100.0
                } else {
                    0.0
                },
                invested: h.invested,
                current_value: h.current_value,
            })
            .collect();
        slices.sort_by(|a, b| b.share_pct.partial_cmp(&a.share_pct).unwrap_or(Ordering::Equal));
        slices
    }

    pub fn filter<'a>(
        &self,
        holdings: &'a [AssetHolding],
        filter: &HoldingFilter,
    ) -> Vec<&'a AssetHolding> {
        holdings.iter().filter(|h| filter.matches(h)).collect()
    }
}

impl Default for ValuationService {
    fn default() -> Self {
        Self::new()
    }
}
