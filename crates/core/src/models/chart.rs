use serde::{Deserialize, Serialize};

/// One bar of the monthly "invested capital" chart.
///
/// The core computes the numbers; the frontend only renders them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDataPoint {
    pub year: i32,
    pub month: u32,

    /// Axis label, e.g. "08/24"
    pub label: String,

    /// Buy totals minus sell totals booked in this month
    pub net_flow: f64,

    /// Invested value of all open positions at the end of the month
    pub invested: f64,
}
