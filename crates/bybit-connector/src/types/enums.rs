/*
[INPUT]:  Exchange-side mode and method identifiers
[OUTPUT]: Typed Rust enums with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new modes are added
*/

use serde::{Deserialize, Serialize};

/// How positions are segmented on the account.
///
/// In hedge mode a symbol can hold a long and a short position at the same
/// time, so the side takes part in the position key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionMode {
    #[default]
    OneWay,
    Hedge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "Buy",
            Side::Sell => "Sell",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Buy" | "buy" | "BUY" => Some(Side::Buy),
            "Sell" | "sell" | "SELL" => Some(Side::Sell),
            _ => None,
        }
    }
}
