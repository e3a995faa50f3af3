use crate::models::chart::ChartDataPoint;
use crate::models::operation::{Operation, OperationKind};
use crate::models::position::RollupOptions;
use crate::services::position_service::PositionService;

/// Generates chart-ready series from an operation snapshot.
/// The frontend only renders these; no math happens on its side.
pub struct ChartService {
    position_service: PositionService,
}

impl ChartService {
    pub fn new() -> Self {
        Self {
            position_service: PositionService::new(),
        }
    }

    /// One point per calendar month from the earliest to the latest
    /// operation, oldest first. Months without operations are filled in with
    /// zero flow and the invested value carried over.
    ///
    /// Operations are consumed month by month, so the roll-up at each month
    /// end only sees operations dated up to that month.
    pub fn invested_by_month(
        &self,
        operations: &[Operation],
        options: RollupOptions,
    ) -> Vec<ChartDataPoint> {
        let mut sorted: Vec<&Operation> = operations.iter().collect();
        sorted.sort_by(|a, b| a.date.cmp(&b.date));

        let (first, last) = match (sorted.first(), sorted.last()) {
            (Some(first), Some(last)) => (first.year_month(), last.year_month()),
            _ => return Vec::new(),
        };

        let mut points = Vec::new();
        let mut seen: Vec<Operation> = Vec::with_capacity(sorted.len());
        let mut cursor = 0;
        let (mut year, mut month) = first;

        loop {
            let mut net_flow = 0.0;
            while let Some(op) = sorted.get(cursor) {
                if op.year_month() != (year, month) {
                    break;
                }
                match op.kind {
                    OperationKind::Buy => net_flow += op.total_value,
                    OperationKind::Sell => net_flow -= op.total_value,
                    _ => {}
                }
                seen.push((*op).clone());
                cursor += 1;
            }

            let invested = self
                .position_service
                .rollup_positions_with(&seen, options)
                .iter()
                .map(|p| p.invested)
                .sum();

            points.push(ChartDataPoint {
                year,
                month,
                label: axis_label(year, month),
                net_flow,
                invested,
            });

            if (year, month) >= last {
                break;
            }
            (year, month) = next_month(year, month);
        }

        points
    }
}

impl Default for ChartService {
    fn default() -> Self {
        Self::new()
    }
}

/// Short axis label, e.g. "08/24".
fn axis_label(year: i32, month: u32) -> String {
    format!("{month:02}/{:02}", year.rem_euclid(100))
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month >= 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

