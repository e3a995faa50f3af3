use std::collections::HashMap;

use crate::models::operation::{Operation, OperationKind};
use crate::models::position::{CostBasisMethod, PositionSummary, RollupOptions, RollupOrdering};

/// Relative tolerance for treating a remaining quantity as a full sale.
/// Scaled by the quantity bought since the position was last closed.
const QUANTITY_TOLERANCE: f64 = 1e-9;

/// Running state of one symbol while operations are accumulated.
#[derive(Debug, Clone, Default)]
struct Accumulator {
    name: String,
    quantity: f64,
    invested: f64,
    average_cost: f64,
    /// Units bought since the position was last closed
    bought: f64,
}

impl Accumulator {
    fn residue_limit(&self) -> f64 {
        QUANTITY_TOLERANCE * self.bought.max(1.0)
    }

    fn apply(&mut self, op: &Operation, method: CostBasisMethod) {
        match op.kind {
            OperationKind::Buy => {
                self.quantity += op.quantity;
                self.invested += op.total_value;
                self.bought += op.quantity;
            }
            OperationKind::Sell => {
                let reduction = match method {
                    CostBasisMethod::AverageCost => op.quantity * self.average_cost,
                    CostBasisMethod::TotalValueRatio => {
                        ratio_or_zero(op.total_value * self.average_cost, op.unit_price)
                    }
                };
                self.quantity -= op.quantity;
                self.invested -= reduction;
            }
            _ => return,
        }

        if self.quantity.abs() <= self.residue_limit() {
            self.quantity = 0.0;
        }
        if self.quantity <= 0.0 {
            // Closed (or oversold) position carries no cost into later buys.
            self.invested = 0.0;
            self.bought = 0.0;
        }
        self.average_cost = ratio_or_zero(self.invested, self.quantity);
    }
}

/// `numerator / denominator`, or 0 when the quotient would not be a finite number.
fn ratio_or_zero(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        let q = numerator / denominator;
        if q.is_finite() {
            return q;
        }
    }
    0.0
}

/// Rolls a flat operation list up into per-symbol positions.
///
/// Pure business logic over a snapshot; no I/O.
pub struct PositionService;

impl PositionService {
    pub fn new() -> Self {
        Self
    }

    /// Positions with a positive quantity, in order of each symbol's first buy or sell.
    ///
    /// Uses the default options: chronological accumulation and
    /// weighted-average cost reduction on sells.
    pub fn rollup_positions(&self, operations: &[Operation]) -> Vec<PositionSummary> {
        self.rollup_positions_with(operations, RollupOptions::default())
    }

    /// Roll up with explicit cost-basis method and accumulation order.
    pub fn rollup_positions_with(
        &self,
        operations: &[Operation],
        options: RollupOptions,
    ) -> Vec<PositionSummary> {
        self.rollup_positions_where(operations, options, |_| true)
    }

    /// Roll up only the operations accepted by `predicate`
    /// (e.g. one wallet, or `OperationStatus::is_confirmed`).
    pub fn rollup_positions_where<F>(
        &self,
        operations: &[Operation],
        options: RollupOptions,
        predicate: F,
    ) -> Vec<PositionSummary>
    where
        F: Fn(&Operation) -> bool,
    {
        // Transfers, staking, rewards and airdrops are recorded but not netted.
        let mut ordered: Vec<&Operation> = operations
            .iter()
            .filter(|&op| op.kind.affects_position() && predicate(op))
            .collect();
        if options.ordering == RollupOrdering::Chronological {
            ordered.sort_by(|a, b| a.date.cmp(&b.date));
        }

        // Symbol → slot in `accumulators`, preserving first-seen order.
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut accumulators: Vec<(String, Accumulator)> = Vec::new();

        for op in ordered {
            let slot = *index.entry(op.asset.symbol.as_str()).or_insert_with(|| {
                accumulators.push((
                    op.asset.symbol.clone(),
                    Accumulator {
                        name: op.asset.name.clone(),
                        ..Accumulator::default()
                    },
                ));
                accumulators.len() - 1
            });
            accumulators[slot].1.apply(op, options.cost_basis);
        }

        accumulators
            .into_iter()
            .filter(|(_, acc)| acc.quantity > 0.0)
            .map(|(symbol, acc)| PositionSummary {
                name: acc.name,
                symbol,
                quantity: acc.quantity,
                invested: acc.invested,
                average_cost: acc.average_cost,
            })
            .collect()
    }

    /// Position of a single symbol, if one is open.
    pub fn position_for(
        &self,
        operations: &[Operation],
        symbol: &str,
        options: RollupOptions,
    ) -> Option<PositionSummary> {
        let upper = symbol.trim().to_uppercase();
        self.rollup_positions_where(operations, options, |op| op.asset.symbol == upper)
            .into_iter()
            .next()
    }
}

impl Default for PositionService {
    fn default() -> Self {
        Self::new()
    }
}

/// Free-function form of [`PositionService::rollup_positions`].
pub fn rollup_positions(operations: &[Operation]) -> Vec<PositionSummary> {
    PositionService::new().rollup_positions(operations)
}
