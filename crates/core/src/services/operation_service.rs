use std::cmp::Ordering;
use std::collections::HashSet;

use crate::models::asset::Asset;
use crate::models::operation::{
    Operation, OperationFilter, OperationKind, OperationSortOrder, OperationSummary,
};

/// Read-side queries over an operation snapshot: filtering, sorting, search
/// and headline totals.
pub struct OperationService;

impl OperationService {
    pub fn new() -> Self {
        Self
    }

    /// Operations accepted by `filter`, in input order.
    pub fn filter<'a>(
        &self,
        operations: &'a [Operation],
        filter: &OperationFilter,
    ) -> Vec<&'a Operation> {
        operations.iter().filter(|op| filter.matches(op)).collect()
    }

    /// All operations sorted by `order`. Ties keep input order.
    pub fn sorted<'a>(
        &self,
        operations: &'a [Operation],
        order: &OperationSortOrder,
    ) -> Vec<&'a Operation> {
        let mut ops: Vec<&Operation> = operations.iter().collect();
        let by_value = |a: &&Operation, b: &&Operation| {
            a.total_value
                .partial_cmp(&b.total_value)
                .unwrap_or(Ordering::Equal)
        };
        match order {
            OperationSortOrder::DateDesc => ops.sort_by(|a, b| b.date.cmp(&a.date)),
            OperationSortOrder::DateAsc => ops.sort_by(|a, b| a.date.cmp(&b.date)),
            OperationSortOrder::ValueDesc => ops.sort_by(|a, b| by_value(b, a)),
            OperationSortOrder::ValueAsc => ops.sort_by(by_value),
            OperationSortOrder::AssetAsc => {
                ops.sort_by(|a, b| a.asset.symbol.cmp(&b.asset.symbol))
            }
            OperationSortOrder::AssetDesc => {
                ops.sort_by(|a, b| b.asset.symbol.cmp(&a.asset.symbol))
            }
        }
        ops
    }

    /// Match `query` against symbol, asset name, notes and transaction hash
    /// (case-insensitive). An empty query matches everything.
    pub fn search<'a>(&self, operations: &'a [Operation], query: &str) -> Vec<&'a Operation> {
        let q = query.trim().to_lowercase();
        operations
            .iter()
            .filter(|op| {
                q.is_empty()
                    || op.asset.symbol.to_lowercase().contains(&q)
                    || op.asset.name.to_lowercase().contains(&q)
                    || op.notes.as_deref().unwrap_or("").to_lowercase().contains(&q)
                    || op.tx_hash.as_deref().unwrap_or("").to_lowercase().contains(&q)
            })
            .collect()
    }

    /// Counts and buy/sell totals over the given operations.
    pub fn summarize(&self, operations: &[Operation]) -> OperationSummary {
        let mut summary = OperationSummary {
            total_operations: operations.len(),
            ..OperationSummary::default()
        };
        let mut symbols = HashSet::new();

        for op in operations {
            match op.kind {
                OperationKind::Buy => {
                    summary.buy_count += 1;
                    summary.total_invested += op.total_value;
                }
                OperationKind::Sell => {
                    summary.sell_count += 1;
                    summary.total_sold += op.total_value;
                }
                _ => {}
            }
            symbols.insert(op.asset.symbol.as_str());
        }

        summary.profit_loss = summary.total_sold - summary.total_invested;
        summary.unique_assets = symbols.len();
        summary
    }

    /// Distinct assets in the snapshot, sorted by symbol.
    pub fn unique_assets<'a>(&self, operations: &'a [Operation]) -> Vec<&'a Asset> {
        let mut seen = HashSet::new();
        let mut assets: Vec<&Asset> = operations
            .iter()
            .filter_map(|op| seen.insert(&op.asset.symbol).then_some(&op.asset))
            .collect();
        assets.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        assets
    }
}

impl Default for OperationService {
    fn default() -> Self {
        Self::new()
    }
}
