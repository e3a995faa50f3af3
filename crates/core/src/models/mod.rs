pub mod asset;
pub mod chart;
pub mod monthly;
pub mod operation;
pub mod position;
pub mod settings;
pub mod statement;
pub mod valuation;
pub mod wallet;
