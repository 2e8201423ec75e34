//! Server-version gating.
//!
//! A request's wire shape is a static table of fields, each optionally
//! tagged with the minimum server version that expects it. [`gated_fields`]
//! resolves that table against a negotiated version; the result is the exact
//! field order to write. Gated fields may sit anywhere in the table, so a
//! feature can insert a field mid-sequence as well as append one.

use crate::errors::{ClientError, Result};
use crate::protocol::server_version;

// ============================================================================
// Field gates
// ============================================================================

/// One entry of a request layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldGate<F> {
    pub field: F,
    pub min_version: Option<i32>,
}

impl<F> FieldGate<F> {
    pub const fn always(field: F) -> Self {
        Self {
            field,
            min_version: None,
        }
    }

    pub const fn since(min_version: i32, field: F) -> Self {
        Self {
            field,
            min_version: Some(min_version),
        }
    }

    pub fn is_present(&self, server_version: i32) -> bool {
        self.min_version.map_or(true, |min| server_version >= min)
    }
}

/// Resolve a layout table to the ordered fields present at `server_version`.
pub fn gated_fields<F: Copy>(server_version: i32, table: &[FieldGate<F>]) -> Vec<F> {
    table
        .iter()
        .filter(|gate| gate.is_present(server_version))
        .map(|gate| gate.field)
        .collect()
}

// ============================================================================
// Features
// ============================================================================

/// Request capabilities that need a minimum server version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    RealTimeBars,
    TradingClass,
    TickByTick,
    TickByTickIgnoreSize,
    SecIdType,
    PrimaryExchange,
    IssuerId,
}

impl Feature {
    pub fn min_version(self) -> i32 {
        match self {
            Self::RealTimeBars => server_version::REAL_TIME_BARS,
            Self::TradingClass => server_version::TRADING_CLASS,
            Self::TickByTick => server_version::TICK_BY_TICK,
            Self::TickByTickIgnoreSize => server_version::TICK_BY_TICK_IGNORE_SIZE,
            Self::SecIdType => server_version::SEC_ID_TYPE,
            Self::PrimaryExchange => server_version::PRIMARYEXCH,
            Self::IssuerId => server_version::BOND_ISSUERID,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::RealTimeBars => "real-time bars",
            Self::TradingClass => "conId and tradingClass parameters",
            Self::TickByTick => "tick-by-tick data",
            Self::TickByTickIgnoreSize => "numberOfTicks and ignoreSize parameters",
            Self::SecIdType => "secIdType and secId parameters",
            Self::PrimaryExchange => "primaryExchange parameter",
            Self::IssuerId => "issuerId parameter",
        }
    }

    pub fn is_supported(self, server_version: i32) -> bool {
        server_version >= self.min_version()
    }

    /// Fail with `UnsupportedFeature` when `server_version` is too old.
    pub fn ensure(self, server_version: i32) -> Result<()> {
        if self.is_supported(server_version) {
            Ok(())
        } else {
            Err(ClientError::UnsupportedFeature {
                feature: self.name(),
                required: self.min_version(),
                actual: server_version,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &[FieldGate<&str>] = &[
        FieldGate::always("code"),
        FieldGate::since(50, "middle"),
        FieldGate::always("symbol"),
        FieldGate::since(60, "tail"),
    ];

    #[test]
    fn gates_below_at_and_above_threshold() {
        assert_eq!(gated_fields(49, TABLE), vec!["code", "symbol"]);
        assert_eq!(gated_fields(50, TABLE), vec!["code", "middle", "symbol"]);
        assert_eq!(gated_fields(59, TABLE), vec!["code", "middle", "symbol"]);
        assert_eq!(
            gated_fields(60, TABLE),
            vec!["code", "middle", "symbol", "tail"]
        );
    }

    #[test]
    fn feature_ensure() {
        assert!(Feature::TickByTick.ensure(137).is_ok());
        match Feature::TickByTick.ensure(136) {
            Err(ClientError::UnsupportedFeature {
                required, actual, ..
            }) => {
                assert_eq!(required, 137);
                assert_eq!(actual, 136);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(Feature::IssuerId.is_supported(176));
        assert!(!Feature::IssuerId.is_supported(175));
    }
}
