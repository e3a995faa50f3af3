use serde::{Deserialize, Serialize};

/// Net holding in one asset symbol, derived from its buys and sells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSummary {
    pub name: String,
    pub symbol: String,

    /// Units currently held (always > 0 in roll-up results)
    pub quantity: f64,

    /// Cost still attributed to the units held
    pub invested: f64,

    /// `invested / quantity`, 0 when nothing is held
    pub average_cost: f64,
}

/// How a sell reduces the invested value of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CostBasisMethod {
    /// Weighted-average cost: `invested -= quantity × average_cost`.
    #[default]
    AverageCost,
    /// Earlier web client formula: `invested -= total_value × average_cost / unit_price`.
    /// Matches `AverageCost` only when the sell carries no fee.
    TotalValueRatio,
}

/// Order in which operations are accumulated into positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RollupOrdering {
    /// Oldest operation first, ties kept in input order.
    #[default]
    Chronological,
    /// Exactly as supplied.
    Input,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollupOptions {
    pub cost_basis: CostBasisMethod,
    pub ordering: RollupOrdering,
}

impl RollupOptions {
    /// Earlier web client behaviour: `TotalValueRatio` sells, input order.
    pub fn legacy() -> Self {
        Self {
            cost_basis: CostBasisMethod::TotalValueRatio,
            ordering: RollupOrdering::Input,
        }
    }
}
