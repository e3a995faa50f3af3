pub mod chart_service;
pub mod monthly_service;
pub mod operation_service;
pub mod position_service;
pub mod valuation_service;
