use std::collections::{BTreeSet, HashMap};

use crate::models::monthly::{MonthlyConsolidation, PeriodSummary};
use crate::models::operation::{Operation, OperationKind};

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Display label for a calendar month, e.g. "January 2024".
pub fn month_label(year: i32, month: u32) -> String {
    let name = month
        .checked_sub(1)
        .and_then(|idx| MONTH_NAMES.get(idx as usize))
        .copied()
        .unwrap_or("Unknown");
    format!("{name} {year}")
}

/// Groups operations by calendar month and summarizes each month.
///
/// Pure business logic over a snapshot: no I/O, no state kept between calls.
pub struct MonthlyService;

impl MonthlyService {
    pub fn new() -> Self {
        Self
    }

    /// Build the period summary for a set of operations.
    ///
    /// Returns `None` for an empty input: callers branch on "no data" rather
    /// than on an empty summary. All sums are plain float additions of each
    /// operation's own `total_value`; nothing is rounded here.
    pub fn aggregate_by_month(&self, operations: &[Operation]) -> Option<PeriodSummary> {
        if operations.is_empty() {
            return None;
        }

        // Newest first; stable so same-timestamp operations keep input order.
        let mut sorted: Vec<&Operation> = operations.iter().collect();
        sorted.sort_by(|a, b| b.date.cmp(&a.date));

        let mut groups: HashMap<(i32, u32), Vec<&Operation>> = HashMap::new();
        for &op in &sorted {
            groups.entry(op.year_month()).or_default().push(op);
        }

        let mut months: Vec<MonthlyConsolidation> = groups
            .into_iter()
            .map(|((year, month), ops)| Self::consolidate(year, month, &ops))
            .collect();
        months.sort_by(|a, b| (b.year, b.month).cmp(&(a.year, a.month)));

        // `sorted` is newest-first and non-empty.
        let latest = sorted.first()?.date;
        let earliest = sorted.last()?.date;

        let grand_total = months.iter().map(|m| m.buy_total + m.sell_total).sum();
        let grand_net = months.iter().map(|m| m.net_balance).sum();

        Some(PeriodSummary {
            earliest,
            latest,
            grand_total,
            grand_net,
            months,
        })
    }

    /// Same as `aggregate_by_month`, restricted to operations accepted by `predicate`
    /// (e.g. `OperationStatus::is_confirmed`).
    pub fn aggregate_by_month_where<F>(
        &self,
        operations: &[Operation],
        predicate: F,
    ) -> Option<PeriodSummary>
    where
        F: Fn(&Operation) -> bool,
    {
        let selected: Vec<Operation> = operations
            .iter()
            .filter(|&op| predicate(op))
            .cloned()
            .collect();
        self.aggregate_by_month(&selected)
    }

    /// Summarize one month. `ops` must already be newest-first.
    fn consolidate(year: i32, month: u32, ops: &[&Operation]) -> MonthlyConsolidation {
        let mut buy_count = 0;
        let mut sell_count = 0;
        let mut buy_total = 0.0;
        let mut sell_total = 0.0;
        let mut total_value = 0.0;
        let mut symbols = BTreeSet::new();

        for op in ops {
            match op.kind {
                OperationKind::Buy => {
                    buy_count += 1;
                    buy_total += op.total_value;
                }
                OperationKind::Sell => {
                    sell_count += 1;
                    sell_total += op.total_value;
                }
                _ => {}
            }
            total_value += op.total_value;
            symbols.insert(op.asset.symbol.clone());
        }

        MonthlyConsolidation {
            label: month_label(year, month),
            year,
            month,
            operation_count: ops.len(),
            buy_count,
            sell_count,
            buy_total,
            sell_total,
            net_balance: sell_total - buy_total,
            total_value,
            symbols: symbols.into_iter().collect(),
            operations: ops.iter().map(|op| (*op).clone()).collect(),
        }
    }
}

impl Default for MonthlyService {
    fn default() -> Self {
        Self::new()
    }
}

/// Free-function form of [`MonthlyService::aggregate_by_month`].
pub fn aggregate_by_month(operations: &[Operation]) -> Option<PeriodSummary> {
    MonthlyService::new().aggregate_by_month(operations)
}

