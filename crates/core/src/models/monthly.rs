use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::operation::Operation;

/// Aggregated figures for one calendar month of operations.
///
/// Recomputed from a snapshot on every call, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyConsolidation {
    /// Display label, e.g. "January 2024"
    pub label: String,

    pub year: i32,

    /// 1-based month of the year
    pub month: u32,

    pub operation_count: usize,
    pub buy_count: usize,
    pub sell_count: usize,

    /// Sum of `total_value` over the month's buys (0 when there are none)
    pub buy_total: f64,

    /// Sum of `total_value` over the month's sells (0 when there are none)
    pub sell_total: f64,

    /// `sell_total - buy_total`
    pub net_balance: f64,

    /// Sum of `total_value` over every operation of the month, all kinds
    pub total_value: f64,

    /// Distinct asset symbols touched this month, sorted
    pub symbols: Vec<String>,

    /// The month's operations, newest first
    pub operations: Vec<Operation>,
}

/// Summary over every month present in a set of operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSummary {
    pub earliest: NaiveDateTime,
    pub latest: NaiveDateTime,

    /// Sum of every month's `buy_total + sell_total`
    pub grand_total: f64,

    /// Sum of every month's `net_balance`
    pub grand_net: f64,

    /// One entry per month present, newest first
    pub months: Vec<MonthlyConsolidation>,
}

impl PeriodSummary {
    /// Look up a single month.
    pub fn month(&self, year: i32, month: u32) -> Option<&MonthlyConsolidation> {
        self.months.iter().find(|m| m.year == year && m.month == month)
    }

    pub fn operation_count(&self) -> usize {
        self.months.iter().map(|m| m.operation_count).sum()
    }
}
