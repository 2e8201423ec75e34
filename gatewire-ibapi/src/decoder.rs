//! Incoming message decoders.
//!
//! Every decoder reads its field sequence strictly left to right with a
//! [`FieldDecoder`]; the message code, message version and request id are
//! consumed (and discarded) before the record body. Running out of fields
//! is a `Decode` error that ends only the request the frame belongs to.

// Decoders assign fields sequentially from the wire, which does not fit
// struct-literal initialization.
#![allow(clippy::field_reassign_with_default)]

use chrono::{DateTime, Utc};

use crate::codec::{message_id, FieldDecoder};
use crate::errors::{ClientError, Result};
use crate::models::bar::Bar;
use crate::models::common::{ServerNotice, TagValue};
use crate::models::contract::ContractDetails;
use crate::models::enums::{parse_right, TickByTickType};
use crate::models::tick::{
    TickAttribBidAsk, TickAttribLast, TickByTickBidAsk, TickByTickMidPoint, TickByTickTrade,
};
use crate::protocol::{incoming, server_version, MAX_CLIENT_VER, MIN_CLIENT_VER};
use crate::session::ServerTime;

/// A record that can be built from one correlated server frame.
pub trait ResponseDecode: Sized {
    /// Message codes this decoder accepts.
    const MESSAGE_IDS: &'static [i32];

    fn decode(fields: &[String], server_version: i32) -> Result<Self>;
}

// ============================================================================
// Helpers
// ============================================================================

/// Start a decoder after checking the message code.
fn open<'a>(
    fields: &'a [String],
    server_version: i32,
    accepted: &[i32],
) -> Result<(FieldDecoder<'a>, i32)> {
    let msg_id = message_id(fields)?;
    if !accepted.contains(&msg_id) {
        return Err(ClientError::Decode(format!(
            "unexpected message {msg_id}, expected one of {accepted:?}"
        )));
    }
    let mut dec = FieldDecoder::new(fields, server_version);
    dec.skip_field()?;
    Ok((dec, msg_id))
}

fn decode_unix_time(dec: &mut FieldDecoder) -> Result<DateTime<Utc>> {
    let secs = dec.decode_i64()?;
    DateTime::from_timestamp(secs, 0).ok_or_else(|| ClientError::MalformedField {
        kind: "unix time",
        value: secs.to_string(),
    })
}

fn decode_tag_list(dec: &mut FieldDecoder) -> Result<Vec<TagValue>> {
    let count = dec.decode_i32()?;
    let mut tags = Vec::with_capacity(count.clamp(0, 64) as usize);
    for _ in 0..count.max(0) {
        tags.push(TagValue {
            tag: dec.decode_string()?,
            value: dec.decode_string()?,
        });
    }
    Ok(tags)
}

// ============================================================================
// Real-time bars
// ============================================================================

impl ResponseDecode for Bar {
    const MESSAGE_IDS: &'static [i32] = &[incoming::REAL_TIME_BARS];

    fn decode(fields: &[String], server_version: i32) -> Result<Self> {
        let (mut dec, _) = open(fields, server_version, Self::MESSAGE_IDS)?;
        dec.skip_fields(2)?; // version, reqId
        Ok(Bar {
            time: decode_unix_time(&mut dec)?,
            open: dec.decode_f64()?,
            high: dec.decode_f64()?,
            low: dec.decode_f64()?,
            close: dec.decode_f64()?,
            volume: dec.decode_decimal()?,
            wap: dec.decode_decimal()?,
            count: dec.decode_i32()?,
        })
    }
}

// ============================================================================
// Tick-by-tick
// ============================================================================

/// Reads `reqId, tickType, time` and returns the tick type and time.
fn tick_header(dec: &mut FieldDecoder) -> Result<(i32, DateTime<Utc>)> {
    dec.skip_field()?; // reqId
    let tick_type = dec.decode_i32()?;
    let time = decode_unix_time(dec)?;
    Ok((tick_type, time))
}

fn wrong_tick_type(tick_type: i32, expected: &str) -> ClientError {
    ClientError::Decode(format!(
        "tick-by-tick type {tick_type} on a {expected} subscription"
    ))
}

impl ResponseDecode for TickByTickTrade {
    const MESSAGE_IDS: &'static [i32] = &[incoming::TICK_BY_TICK];

    fn decode(fields: &[String], server_version: i32) -> Result<Self> {
        let (mut dec, _) = open(fields, server_version, Self::MESSAGE_IDS)?;
        let (code, time) = tick_header(&mut dec)?;
        let tick_type = match TickByTickType::from_code(code) {
            Some(t @ (TickByTickType::Last | TickByTickType::AllLast)) => t,
            _ => return Err(wrong_tick_type(code, "trade")),
        };
        let price = dec.decode_f64()?;
        let size = dec.decode_decimal()?;
        let attrib = TickAttribLast::from_mask(dec.decode_i32()?);
        Ok(TickByTickTrade {
            tick_type,
            time,
            price,
            size,
            attrib,
            exchange: dec.decode_string()?,
            special_conditions: dec.decode_string()?,
        })
    }
}

impl ResponseDecode for TickByTickBidAsk {
    const MESSAGE_IDS: &'static [i32] = &[incoming::TICK_BY_TICK];

    fn decode(fields: &[String], server_version: i32) -> Result<Self> {
        let (mut dec, _) = open(fields, server_version, Self::MESSAGE_IDS)?;
        let (code, time) = tick_header(&mut dec)?;
        if code != TickByTickType::BidAsk.code() {
            return Err(wrong_tick_type(code, "bid/ask"));
        }
        Ok(TickByTickBidAsk {
            time,
            bid_price: dec.decode_f64()?,
            ask_price: dec.decode_f64()?,
            bid_size: dec.decode_decimal()?,
            ask_size: dec.decode_decimal()?,
            attrib: TickAttribBidAsk::from_mask(dec.decode_i32()?),
        })
    }
}

impl ResponseDecode for TickByTickMidPoint {
    const MESSAGE_IDS: &'static [i32] = &[incoming::TICK_BY_TICK];

    fn decode(fields: &[String], server_version: i32) -> Result<Self> {
        let (mut dec, _) = open(fields, server_version, Self::MESSAGE_IDS)?;
        let (code, time) = tick_header(&mut dec)?;
        if code != TickByTickType::MidPoint.code() {
            return Err(wrong_tick_type(code, "midpoint"));
        }
        Ok(TickByTickMidPoint {
            time,
            mid_point: dec.decode_f64()?,
        })
    }
}

// ============================================================================
// Contract details
// ============================================================================

impl ResponseDecode for ContractDetails {
    const MESSAGE_IDS: &'static [i32] = &[incoming::CONTRACT_DATA, incoming::BOND_CONTRACT_DATA];

    fn decode(fields: &[String], server_version: i32) -> Result<Self> {
        let (mut dec, msg_id) = open(fields, server_version, Self::MESSAGE_IDS)?;
        let version = if server_version < server_version::SIZE_RULES {
            dec.decode_i32()?
        } else {
            server_version
        };
        if version >= 3 {
            dec.skip_field()?; // reqId
        }
        if msg_id == incoming::BOND_CONTRACT_DATA {
            decode_bond_body(&mut dec, version)
        } else {
            decode_contract_body(&mut dec, version)
        }
    }
}

/// CONTRACT_DATA (10) body, after version and request id.
fn decode_contract_body(dec: &mut FieldDecoder, version: i32) -> Result<ContractDetails> {
    let sv = dec.server_version();
    let mut d = ContractDetails::default();
    d.contract.symbol = dec.decode_string()?;
    d.contract.sec_type = dec.decode_enum_opt()?;
    d.contract.last_trade_date_or_contract_month = dec.decode_string()?;
    d.contract.strike = dec.decode_f64()?;
    d.contract.right = parse_right(&dec.decode_string()?);
    d.contract.exchange = dec.decode_string()?;
    d.contract.currency = dec.decode_string()?;
    d.contract.local_symbol = dec.decode_string()?;
    d.market_name = dec.decode_string()?;
    d.contract.trading_class = dec.decode_string()?;
    d.contract.con_id = i64::from(dec.decode_i32()?);
    d.min_tick = dec.decode_f64()?;
    if (server_version::MD_SIZE_MULTIPLIER..server_version::SIZE_RULES).contains(&sv) {
        dec.skip_field()?; // mdSizeMultiplier
    }
    d.contract.multiplier = dec.decode_string()?;
    d.order_types = dec.decode_string()?;
    d.valid_exchanges = dec.decode_string()?;
    d.price_magnifier = dec.decode_i64()?;
    if version >= 4 {
        d.under_con_id = dec.decode_i32()?;
    }
    if version >= 5 {
        d.long_name = dec.decode_string()?;
        d.contract.primary_exchange = dec.decode_string()?;
    }
    if version >= 6 {
        d.contract_month = dec.decode_string()?;
        d.industry = dec.decode_string()?;
        d.category = dec.decode_string()?;
        d.subcategory = dec.decode_string()?;
        d.time_zone_id = dec.decode_string()?;
        d.trading_hours = dec.decode_string()?;
        d.liquid_hours = dec.decode_string()?;
    }
    if version >= 8 {
        d.ev_rule = dec.decode_string()?;
        d.ev_multiplier = dec.decode_f64()?;
    }
    if version >= 7 {
        d.sec_id_list = decode_tag_list(dec)?;
    }
    if sv >= server_version::AGG_GROUP {
        d.agg_group = dec.decode_i32_max()?;
    }
    if sv >= server_version::UNDERLYING_INFO {
        d.under_symbol = dec.decode_string()?;
        d.under_sec_type = dec.decode_string()?;
    }
    if sv >= server_version::MARKET_RULES {
        d.market_rule_ids = dec.decode_string()?;
    }
    if sv >= server_version::REAL_EXPIRATION_DATE {
        d.real_expiration_date = dec.decode_string()?;
    }
    if sv >= server_version::STOCK_TYPE {
        d.stock_type = dec.decode_string()?;
    }
    if (server_version::FRACTIONAL_SIZE_SUPPORT..server_version::SIZE_RULES).contains(&sv) {
        dec.skip_field()?; // sizeMinTick
    }
    if sv >= server_version::SIZE_RULES {
        d.min_size = dec.decode_decimal_max()?;
        d.size_increment = dec.decode_decimal_max()?;
        d.suggested_size_increment = dec.decode_decimal_max()?;
    }
    Ok(d)
}

/// BOND_CONTRACT_DATA (18) body, after version and request id.
fn decode_bond_body(dec: &mut FieldDecoder, version: i32) -> Result<ContractDetails> {
    let sv = dec.server_version();
    let mut d = ContractDetails::default();
    d.contract.symbol = dec.decode_string()?;
    d.contract.sec_type = dec.decode_enum_opt()?;
    d.cusip = dec.decode_string()?;
    d.coupon = dec.decode_f64()?;
    d.maturity = dec.decode_string()?;
    d.issue_date = dec.decode_string()?;
    d.ratings = dec.decode_string()?;
    d.bond_type = dec.decode_string()?;
    d.coupon_type = dec.decode_string()?;
    d.convertible = dec.decode_bool()?;
    d.callable = dec.decode_bool()?;
    d.putable = dec.decode_bool()?;
    d.desc_append = dec.decode_string()?;
    d.contract.exchange = dec.decode_string()?;
    d.contract.currency = dec.decode_string()?;
    d.market_name = dec.decode_string()?;
    d.contract.trading_class = dec.decode_string()?;
    d.contract.con_id = i64::from(dec.decode_i32()?);
    d.min_tick = dec.decode_f64()?;
    if (server_version::MD_SIZE_MULTIPLIER..server_version::SIZE_RULES).contains(&sv) {
        dec.skip_field()?; // mdSizeMultiplier
    }
    d.order_types = dec.decode_string()?;
    d.valid_exchanges = dec.decode_string()?;
    if version >= 2 {
        d.next_option_date = dec.decode_string()?;
        d.next_option_type = dec.decode_string()?;
        d.next_option_partial = dec.decode_bool()?;
        d.notes = dec.decode_string()?;
    }
    if version >= 4 {
        d.long_name = dec.decode_string()?;
    }
    if version >= 6 {
        d.ev_rule = dec.decode_string()?;
        d.ev_multiplier = dec.decode_f64()?;
    }
    if version >= 5 {
        d.sec_id_list = decode_tag_list(dec)?;
    }
    if sv >= server_version::AGG_GROUP {
        d.agg_group = dec.decode_i32_max()?;
    }
    if sv >= server_version::MARKET_RULES {
        d.market_rule_ids = dec.decode_string()?;
    }
    if sv >= server_version::SIZE_RULES {
        d.min_size = dec.decode_decimal_max()?;
        d.size_increment = dec.decode_decimal_max()?;
        d.suggested_size_increment = dec.decode_decimal_max()?;
    }
    Ok(d)
}

// ============================================================================
// System messages
// ============================================================================

/// Parse the handshake reply: `[serverVersion, serverTime]`.
pub fn decode_handshake_ack(fields: &[String]) -> Result<(i32, ServerTime)> {
    let [version, time] = fields else {
        return Err(ClientError::Handshake(format!(
            "expected 2 fields in handshake reply, got {}",
            fields.len()
        )));
    };
    let server_version: i32 = version
        .parse()
        .map_err(|_| ClientError::Handshake(format!("bad server version '{version}'")))?;
    if server_version < 0 {
        return Err(ClientError::Handshake(format!(
            "server requested redirect to '{time}'"
        )));
    }
    if !(MIN_CLIENT_VER..=MAX_CLIENT_VER).contains(&server_version) {
        return Err(ClientError::Handshake(format!(
            "server version {server_version} outside supported range {MIN_CLIENT_VER}..={MAX_CLIENT_VER}"
        )));
    }
    let server_time = time
        .parse::<ServerTime>()
        .map_err(|e| ClientError::Handshake(format!("bad server time: {e}")))?;
    Ok((server_version, server_time))
}

/// ERR_MSG (4).
pub fn decode_server_notice(fields: &[String], server_version: i32) -> Result<ServerNotice> {
    let (mut dec, _) = open(fields, server_version, &[incoming::ERR_MSG])?;
    let version = dec.decode_i32()?;
    if version < 2 {
        return Ok(ServerNotice {
            request_id: -1,
            code: 0,
            message: dec.decode_string()?,
            advanced_order_reject_json: String::new(),
        });
    }
    let request_id = dec.decode_i32()?;
    let code = dec.decode_i32()?;
    let message = dec.decode_string()?;
    let advanced_order_reject_json = if server_version >= server_version::ADVANCED_ORDER_REJECT {
        dec.decode_string()?
    } else {
        String::new()
    };
    Ok(ServerNotice {
        request_id,
        code,
        message,
        advanced_order_reject_json,
    })
}

/// NEXT_VALID_ID (9): returns the order id.
pub fn decode_next_valid_id(fields: &[String], server_version: i32) -> Result<i32> {
    let (mut dec, _) = open(fields, server_version, &[incoming::NEXT_VALID_ID])?;
    dec.skip_field()?; // version
    dec.decode_i32()
}

/// MANAGED_ACCTS (15): comma-joined account list.
pub fn decode_managed_accounts(fields: &[String], server_version: i32) -> Result<String> {
    let (mut dec, _) = open(fields, server_version, &[incoming::MANAGED_ACCTS])?;
    dec.skip_field()?; // version
    dec.decode_string()
}

// ============================================================================
// Tests
// ============================================================================
