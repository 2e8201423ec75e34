//! Protocol constants for the TWS / IB Gateway socket API.
//!
//! Message codes, server-version gates and framing limits shared by the
//! codec, the encoders/decoders and the dispatch table.

use std::ops::RangeInclusive;

// ============================================================================
// Client / Protocol Constants
// ============================================================================

/// Protocol version carried in the START_API message.
pub const START_API_VERSION: i32 = 2;

/// Lowest server version announced in the handshake.
pub const MIN_CLIENT_VER: i32 = 100;

/// Highest server version announced in the handshake (= `BOND_ISSUERID`).
///
/// Capped below the protobuf transition so every message stays text-framed.
pub const MAX_CLIENT_VER: i32 = 176;

/// Message header length (4-byte big-endian message length prefix).
pub const HEADER_LEN: usize = 4;

/// Maximum message length: 16 MB - 1 byte.
pub const MAX_MSG_LEN: usize = 0xFFFFFF;

/// API protocol signature sent at connection start.
pub const API_SIGN: &[u8; 4] = b"API\0";

/// First request identifier handed out by a client.
///
/// Low values are used by the server for system messages.
pub const REQUEST_ID_BASE: i32 = 9000;

/// Server error codes in this band are informational warnings.
pub const WARNING_CODES: RangeInclusive<i32> = 2100..=2199;

// ============================================================================
// Incoming Message IDs (server -> client)
// ============================================================================

/// Incoming message type identifiers (first field of every server frame).
pub mod incoming {
    pub const END_CONN: i32 = 0;
    pub const ERR_MSG: i32 = 4;
    pub const NEXT_VALID_ID: i32 = 9;
    pub const CONTRACT_DATA: i32 = 10;
    pub const MANAGED_ACCTS: i32 = 15;
    pub const BOND_CONTRACT_DATA: i32 = 18;
    pub const REAL_TIME_BARS: i32 = 50;
    pub const CONTRACT_DATA_END: i32 = 52;
    pub const TICK_BY_TICK: i32 = 99;
}

// ============================================================================
// Outgoing Message IDs (client -> server)
// ============================================================================

/// Outgoing message type identifiers.
pub mod outgoing {
    pub const REQ_CONTRACT_DATA: i32 = 9;
    pub const REQ_REAL_TIME_BARS: i32 = 50;
    pub const CANCEL_REAL_TIME_BARS: i32 = 51;
    pub const START_API: i32 = 71;
    pub const REQ_TICK_BY_TICK_DATA: i32 = 97;
    pub const CANCEL_TICK_BY_TICK_DATA: i32 = 98;
}

// ============================================================================
// Minimum Server Version Constants
// ============================================================================

/// Server version gates that control which features/fields are sent.
pub mod server_version {
    pub const REAL_TIME_BARS: i32 = 34;
    pub const CONTRACT_DATA_CHAIN: i32 = 40;
    pub const SEC_ID_TYPE: i32 = 45;
    pub const TRADING_CLASS: i32 = 68;
    pub const LINKING: i32 = 70;
    pub const OPTIONAL_CAPABILITIES: i32 = 72;
    pub const PRIMARYEXCH: i32 = 75;
    pub const MD_SIZE_MULTIPLIER: i32 = 110;
    pub const AGG_GROUP: i32 = 121;
    pub const UNDERLYING_INFO: i32 = 122;
    pub const MARKET_RULES: i32 = 126;
    pub const REAL_EXPIRATION_DATE: i32 = 134;
    pub const TICK_BY_TICK: i32 = 137;
    pub const TICK_BY_TICK_IGNORE_SIZE: i32 = 140;
    pub const STOCK_TYPE: i32 = 152;
    pub const FRACTIONAL_SIZE_SUPPORT: i32 = 163;
    pub const SIZE_RULES: i32 = 164;
    pub const ADVANCED_ORDER_REJECT: i32 = 166;
    pub const BOND_ISSUERID: i32 = 176;
}
