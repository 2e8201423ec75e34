//! Wire enums used by contracts and streaming requests.
//!
//! Display output is the exact wire string; extensible types fall back to
//! an `Other(String)` variant when the server sends something new.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Contract Enums
// ============================================================================

/// Security type of a contract.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecType {
    #[serde(rename = "STK")]
    Stock,
    #[serde(rename = "OPT")]
    Option,
    #[serde(rename = "FUT")]
    Future,
    #[serde(rename = "CONTFUT")]
    ContinuousFuture,
    #[serde(rename = "CASH")]
    Forex,
    #[serde(rename = "IND")]
    Index,
    #[serde(rename = "FOP")]
    FutureOption,
    #[serde(rename = "BOND")]
    Bond,
    #[serde(rename = "FUND")]
    Fund,
    #[serde(rename = "WAR")]
    Warrant,
    #[serde(rename = "CMDTY")]
    Commodity,
    #[serde(rename = "BAG")]
    Combo,
    #[serde(rename = "CRYPTO")]
    Crypto,
    #[serde(untagged)]
    Other(String),
}

impl fmt::Display for SecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stock => "STK",
            Self::Option => "OPT",
            Self::Future => "FUT",
            Self::ContinuousFuture => "CONTFUT",
            Self::Forex => "CASH",
            Self::Index => "IND",
            Self::FutureOption => "FOP",
            Self::Bond => "BOND",
            Self::Fund => "FUND",
            Self::Warrant => "WAR",
            Self::Commodity => "CMDTY",
            Self::Combo => "BAG",
            Self::Crypto => "CRYPTO",
            Self::Other(s) => s,
        };
        f.write_str(s)
    }
}

impl FromStr for SecType {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "STK" => Self::Stock,
            "OPT" => Self::Option,
            "FUT" => Self::Future,
            "CONTFUT" => Self::ContinuousFuture,
            "CASH" => Self::Forex,
            "IND" => Self::Index,
            "FOP" => Self::FutureOption,
            "BOND" => Self::Bond,
            "FUND" => Self::Fund,
            "WAR" => Self::Warrant,
            "CMDTY" => Self::Commodity,
            "BAG" => Self::Combo,
            "CRYPTO" => Self::Crypto,
            other => Self::Other(other.to_string()),
        })
    }
}

/// Option right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Right {
    #[serde(rename = "C")]
    Call,
    #[serde(rename = "P")]
    Put,
}

impl fmt::Display for Right {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Call => f.write_str("C"),
            Self::Put => f.write_str("P"),
        }
    }
}

/// Parses the server's right column; blank or `?` means no right.
pub fn parse_right(s: &str) -> Option<Right> {
    match s {
        "C" | "CALL" => Some(Right::Call),
        "P" | "PUT" => Some(Right::Put),
        _ => None,
    }
}

/// Security identifier scheme for `sec_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecIdType {
    #[serde(rename = "CUSIP")]
    Cusip,
    #[serde(rename = "SEDOL")]
    Sedol,
    #[serde(rename = "ISIN")]
    Isin,
    #[serde(rename = "RIC")]
    Ric,
    #[serde(untagged)]
    Other(String),
}

impl fmt::Display for SecIdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cusip => f.write_str("CUSIP"),
            Self::Sedol => f.write_str("SEDOL"),
            Self::Isin => f.write_str("ISIN"),
            Self::Ric => f.write_str("RIC"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

impl FromStr for SecIdType {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "CUSIP" => Self::Cusip,
            "SEDOL" => Self::Sedol,
            "ISIN" => Self::Isin,
            "RIC" => Self::Ric,
            other => Self::Other(other.to_string()),
        })
    }
}

// ============================================================================
// Streaming Request Enums
// ============================================================================

/// Price source for real-time bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WhatToShow {
    Trades,
    Midpoint,
    Bid,
    Ask,
}

impl fmt::Display for WhatToShow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Trades => "TRADES",
            Self::Midpoint => "MIDPOINT",
            Self::Bid => "BID",
            Self::Ask => "ASK",
        })
    }
}

impl FromStr for WhatToShow {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TRADES" => Ok(Self::Trades),
            "MIDPOINT" => Ok(Self::Midpoint),
            "BID" => Ok(Self::Bid),
            "ASK" => Ok(Self::Ask),
            other => Err(format!("unknown whatToShow '{other}'")),
        }
    }
}

/// Tick-by-tick feed. The wire request carries the name, the server
/// replies with the numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TickByTickType {
    Last,
    AllLast,
    BidAsk,
    MidPoint,
}

impl TickByTickType {
    /// Numeric code used in TICK_BY_TICK frames.
    pub fn code(self) -> i32 {
        match self {
            Self::Last => 1,
            Self::AllLast => 2,
            Self::BidAsk => 3,
            Self::MidPoint => 4,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Last),
            2 => Some(Self::AllLast),
            3 => Some(Self::BidAsk),
            4 => Some(Self::MidPoint),
            _ => None,
        }
    }
}

impl fmt::Display for TickByTickType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Last => "Last",
            Self::AllLast => "AllLast",
            Self::BidAsk => "BidAsk",
            Self::MidPoint => "MidPoint",
        })
    }
}
