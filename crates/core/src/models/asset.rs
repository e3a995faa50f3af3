use serde::{Deserialize, Serialize};

/// A traded crypto asset as recorded on an operation.
///
/// **Equality and hashing** are based solely on `symbol`, NOT on `name`.
/// Brokerage statements spell names inconsistently ("Bitcoin", "BITCOIN",
/// "Bitcoin (BTC)"); the symbol is the grouping key for positions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    /// Ticker symbol, uppercased (e.g., "BTC", "ETH", "ADA")
    pub symbol: String,

    /// Human-readable name (e.g., "Bitcoin", "Ethereum")
    pub name: String,
}

impl PartialEq for Asset {
    fn eq(&self, other: &Self) -> bool {
        self.symbol == other.symbol
    }
}

impl Eq for Asset {}

impl std::hash::Hash for Asset {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.symbol.hash(state);
    }
}

impl Asset {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into().trim().to_uppercase(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.symbol)
    }
}
