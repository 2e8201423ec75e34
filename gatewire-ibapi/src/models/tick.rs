//! Tick-by-tick records and their attribute flags.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::TickByTickType;

// ============================================================================
// Attributes
// ============================================================================

/// Flags on a trade tick, unpacked from the wire bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickAttribLast {
    pub past_limit: bool,
    pub unreported: bool,
}

impl TickAttribLast {
    pub fn from_mask(mask: i32) -> Self {
        Self {
            past_limit: mask & 1 != 0,
            unreported: mask & 2 != 0,
        }
    }
}

/// Flags on a bid/ask tick, unpacked from the wire bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickAttribBidAsk {
    pub bid_past_low: bool,
    pub ask_past_high: bool,
}

impl TickAttribBidAsk {
    pub fn from_mask(mask: i32) -> Self {
        Self {
            bid_past_low: mask & 1 != 0,
            ask_past_high: mask & 2 != 0,
        }
    }
}

// ============================================================================
// Request parameters
// ============================================================================

/// Which trade feed to subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeFeed {
    /// Trades reported to the tape.
    Last,
    /// Every trade, including those not on the tape.
    AllLast,
}

impl From<TradeFeed> for TickByTickType {
    fn from(feed: TradeFeed) -> Self {
        match feed {
            TradeFeed::Last => TickByTickType::Last,
            TradeFeed::AllLast => TickByTickType::AllLast,
        }
    }
}

/// Historical backfill for tick-by-tick requests. Non-default values need
/// a newer server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickByTickOptions {
    pub number_of_ticks: i32,
    pub ignore_size: bool,
}

// ============================================================================
// Records
// ============================================================================

/// A trade print from a `Last` or `AllLast` feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickByTickTrade {
    pub tick_type: TickByTickType,
    pub time: DateTime<Utc>,
    pub price: f64,
    pub size: Decimal,
    pub attrib: TickAttribLast,
    pub exchange: String,
    pub special_conditions: String,
}

/// A top-of-book quote from a `BidAsk` feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickByTickBidAsk {
    pub time: DateTime<Utc>,
    pub bid_price: f64,
    pub ask_price: f64,
    pub bid_size: Decimal,
    pub ask_size: Decimal,
    pub attrib: TickAttribBidAsk,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickByTickMidPoint {
    pub time: DateTime<Utc>,
    pub mid_point: f64,
}
