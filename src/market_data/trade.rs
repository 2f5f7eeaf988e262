use serde::{Deserialize, Serialize};

/// Taker side of an executed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    /// Binance reports the maker flag; a buyer-maker print means the taker sold.
    pub fn from_buyer_maker(is_buyer_maker: bool) -> Self {
        if is_buyer_maker {
            Self::Sell
        } else {
            Self::Buy
        }
    }
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// One print from a recent-trades tape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub price: f64,
    pub size: f64,
    pub side: TradeSide,
    pub timestamp: i64,
}

impl Trade {
    pub fn new(price: f64, size: f64, side: TradeSide, timestamp: i64) -> Self {
        Self {
            price,
            size,
            side,
            timestamp,
        }
    }

    /// Quote notional of the print (`price * |size|`).
    pub fn notional(&self) -> f64 {
        self.price * self.size.abs()
    }
}
