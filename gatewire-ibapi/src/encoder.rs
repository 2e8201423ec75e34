//! Outgoing message encoders.
//!
//! Each request type owns a static layout table (see [`crate::version`]);
//! `encode()` checks feature minimums, resolves the table against the
//! negotiated server version and writes the surviving fields in order.

use bytes::Bytes;

use crate::codec::FieldEncoder;
use crate::errors::Result;
use crate::models::common::TagValue;
use crate::models::contract::Contract;
use crate::models::enums::{TickByTickType, WhatToShow};
use crate::protocol::{outgoing, server_version, MAX_CLIENT_VER, MIN_CLIENT_VER, START_API_VERSION};
use crate::version::{gated_fields, Feature, FieldGate};

/// A message the client can put on the wire.
pub trait OutgoingMessage {
    /// Build the frame payload (without length header).
    fn encode(&self) -> Result<Bytes>;
}

// ============================================================================
// Contract fields
// ============================================================================

/// Contract columns shared by every request layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractField {
    ConId,
    Symbol,
    SecType,
    LastTradeDateOrContractMonth,
    Strike,
    Right,
    Multiplier,
    Exchange,
    PrimaryExchange,
    Currency,
    LocalSymbol,
    TradingClass,
    IncludeExpired,
    SecIdType,
    SecId,
    IssuerId,
}

fn write_contract_field<'e>(
    enc: &'e mut FieldEncoder,
    contract: &Contract,
    field: ContractField,
) -> &'e mut FieldEncoder {
    match field {
        ContractField::ConId => enc.encode_i64(contract.con_id),
        ContractField::Symbol => enc.encode_str(&contract.symbol),
        ContractField::SecType => enc.encode_opt_display(contract.sec_type.as_ref()),
        ContractField::LastTradeDateOrContractMonth => {
            enc.encode_str(&contract.last_trade_date_or_contract_month)
        }
        ContractField::Strike => enc.encode_f64(contract.strike),
        ContractField::Right => enc.encode_opt_display(contract.right.as_ref()),
        ContractField::Multiplier => enc.encode_str(&contract.multiplier),
        ContractField::Exchange => enc.encode_str(&contract.exchange),
        ContractField::PrimaryExchange => enc.encode_str(&contract.primary_exchange),
        ContractField::Currency => enc.encode_str(&contract.currency),
        ContractField::LocalSymbol => enc.encode_str(&contract.local_symbol),
        ContractField::TradingClass => enc.encode_str(&contract.trading_class),
        ContractField::IncludeExpired => enc.encode_bool(contract.include_expired),
        ContractField::SecIdType => enc.encode_opt_display(contract.sec_id_type.as_ref()),
        ContractField::SecId => enc.encode_str(&contract.sec_id),
        ContractField::IssuerId => enc.encode_str(&contract.issuer_id),
    }
}

fn uses_trading_class(contract: &Contract) -> bool {
    contract.con_id > 0 || !contract.trading_class.is_empty()
}

// ============================================================================
// Handshake messages
// ============================================================================

/// Body of the version-range frame that follows the `API\0` prefix.
///
/// Unlike every other payload it is plain text with no NUL terminator.
#[derive(Debug, Clone, Default)]
pub struct VersionAnnouncement<'a> {
    pub connect_options: Option<&'a str>,
}

impl OutgoingMessage for VersionAnnouncement<'_> {
    fn encode(&self) -> Result<Bytes> {
        let mut body = if MIN_CLIENT_VER < MAX_CLIENT_VER {
            format!("v{MIN_CLIENT_VER}..{MAX_CLIENT_VER}")
        } else {
            format!("v{MIN_CLIENT_VER}")
        };
        if let Some(opts) = self.connect_options.filter(|o| !o.is_empty()) {
            body.push(' ');
            body.push_str(opts);
        }
        Ok(Bytes::from(body))
    }
}

/// START_API: sent once the server version is known.
#[derive(Debug, Clone)]
pub struct StartApi<'a> {
    pub server_version: i32,
    pub client_id: i32,
    pub optional_capabilities: &'a str,
}

impl OutgoingMessage for StartApi<'_> {
    fn encode(&self) -> Result<Bytes> {
        let mut enc = FieldEncoder::new();
        enc.encode_i32(outgoing::START_API)
            .encode_i32(START_API_VERSION)
            .encode_i32(self.client_id);
        if self.server_version > server_version::OPTIONAL_CAPABILITIES {
            enc.encode_str(self.optional_capabilities);
        }
        Ok(enc.finish())
    }
}

// ============================================================================
// Real-time bars
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarsField {
    MessageId,
    Version,
    RequestId,
    Contract(ContractField),
    BarSize,
    WhatToShow,
    UseRth,
    Options,
}

/// REQ_REAL_TIME_BARS (50), message version 3.
#[derive(Debug, Clone)]
pub struct RealTimeBarsRequest<'a> {
    pub server_version: i32,
    pub request_id: i32,
    pub contract: &'a Contract,
    pub what_to_show: WhatToShow,
    pub use_rth: bool,
    pub options: &'a [TagValue],
}

impl RealTimeBarsRequest<'_> {
    pub const VERSION: i32 = 3;
    /// The only bar size the server accepts.
    pub const BAR_SIZE: i32 = 5;

    pub const LAYOUT: &'static [FieldGate<BarsField>] = &[
        FieldGate::always(BarsField::MessageId),
        FieldGate::always(BarsField::Version),
        FieldGate::always(BarsField::RequestId),
        FieldGate::since(server_version::TRADING_CLASS, BarsField::Contract(ContractField::ConId)),
        FieldGate::always(BarsField::Contract(ContractField::Symbol)),
        FieldGate::always(BarsField::Contract(ContractField::SecType)),
        FieldGate::always(BarsField::Contract(ContractField::LastTradeDateOrContractMonth)),
        FieldGate::always(BarsField::Contract(ContractField::Strike)),
        FieldGate::always(BarsField::Contract(ContractField::Right)),
        FieldGate::always(BarsField::Contract(ContractField::Multiplier)),
        FieldGate::always(BarsField::Contract(ContractField::Exchange)),
        FieldGate::always(BarsField::Contract(ContractField::PrimaryExchange)),
        FieldGate::always(BarsField::Contract(ContractField::Currency)),
        FieldGate::always(BarsField::Contract(ContractField::LocalSymbol)),
        FieldGate::since(server_version::TRADING_CLASS, BarsField::Contract(ContractField::TradingClass)),
        FieldGate::always(BarsField::BarSize),
        FieldGate::always(BarsField::WhatToShow),
        FieldGate::always(BarsField::UseRth),
        FieldGate::since(server_version::LINKING, BarsField::Options),
    ];

    pub fn layout(server_version: i32) -> Vec<BarsField> {
        gated_fields(server_version, Self::LAYOUT)
    }

    pub fn check(&self) -> Result<()> {
        Feature::RealTimeBars.ensure(self.server_version)?;
        if uses_trading_class(self.contract) {
            Feature::TradingClass.ensure(self.server_version)?;
        }
        Ok(())
    }
}

impl OutgoingMessage for RealTimeBarsRequest<'_> {
    fn encode(&self) -> Result<Bytes> {
        self.check()?;
        let mut enc = FieldEncoder::new();
        for field in Self::layout(self.server_version) {
            match field {
                BarsField::MessageId => enc.encode_i32(outgoing::REQ_REAL_TIME_BARS),
                BarsField::Version => enc.encode_i32(Self::VERSION),
                BarsField::RequestId => enc.encode_i32(self.request_id),
                BarsField::Contract(c) => write_contract_field(&mut enc, self.contract, c),
                BarsField::BarSize => enc.encode_i32(Self::BAR_SIZE),
                BarsField::WhatToShow => enc.encode_display(&self.what_to_show),
                BarsField::UseRth => enc.encode_bool(self.use_rth),
                BarsField::Options => enc.encode_tag_values(self.options),
            };
        }
        Ok(enc.finish())
    }
}

/// CANCEL_REAL_TIME_BARS (51).
#[derive(Debug, Clone, Copy)]
pub struct CancelRealTimeBars {
    pub request_id: i32,
}

impl OutgoingMessage for CancelRealTimeBars {
    fn encode(&self) -> Result<Bytes> {
        let mut enc = FieldEncoder::new();
        enc.encode_i32(outgoing::CANCEL_REAL_TIME_BARS)
            .encode_i32(1)
            .encode_i32(self.request_id);
        Ok(enc.finish())
    }
}

// ============================================================================
// Tick-by-tick
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickField {
    MessageId,
    RequestId,
    Contract(ContractField),
    TickType,
    NumberOfTicks,
    IgnoreSize,
}

/// REQ_TICK_BY_TICK_DATA (97). Unversioned.
#[derive(Debug, Clone)]
pub struct TickByTickRequest<'a> {
    pub server_version: i32,
    pub request_id: i32,
    pub contract: &'a Contract,
    pub tick_type: TickByTickType,
    pub number_of_ticks: i32,
    pub ignore_size: bool,
}

impl TickByTickRequest<'_> {
    pub const LAYOUT: &'static [FieldGate<TickField>] = &[
        FieldGate::always(TickField::MessageId),
        FieldGate::always(TickField::RequestId),
        FieldGate::always(TickField::Contract(ContractField::ConId)),
        FieldGate::always(TickField::Contract(ContractField::Symbol)),
        FieldGate::always(TickField::Contract(ContractField::SecType)),
        FieldGate::always(TickField::Contract(ContractField::LastTradeDateOrContractMonth)),
        FieldGate::always(TickField::Contract(ContractField::Strike)),
        FieldGate::always(TickField::Contract(ContractField::Right)),
        FieldGate::always(TickField::Contract(ContractField::Multiplier)),
        FieldGate::always(TickField::Contract(ContractField::Exchange)),
        FieldGate::always(TickField::Contract(ContractField::PrimaryExchange)),
        FieldGate::always(TickField::Contract(ContractField::Currency)),
        FieldGate::always(TickField::Contract(ContractField::LocalSymbol)),
        FieldGate::always(TickField::Contract(ContractField::TradingClass)),
        FieldGate::always(TickField::TickType),
        FieldGate::since(server_version::TICK_BY_TICK_IGNORE_SIZE, TickField::NumberOfTicks),
        FieldGate::since(server_version::TICK_BY_TICK_IGNORE_SIZE, TickField::IgnoreSize),
    ];

    pub fn layout(server_version: i32) -> Vec<TickField> {
        gated_fields(server_version, Self::LAYOUT)
    }

    pub fn check(&self) -> Result<()> {
        Feature::TickByTick.ensure(self.server_version)?;
        if self.number_of_ticks != 0 || self.ignore_size {
            Feature::TickByTickIgnoreSize.ensure(self.server_version)?;
        }
        Ok(())
    }
}

impl OutgoingMessage for TickByTickRequest<'_> {
    fn encode(&self) -> Result<Bytes> {
        self.check()?;
        let mut enc = FieldEncoder::new();
        for field in Self::layout(self.server_version) {
            match field {
                TickField::MessageId => enc.encode_i32(outgoing::REQ_TICK_BY_TICK_DATA),
                TickField::RequestId => enc.encode_i32(self.request_id),
                TickField::Contract(c) => write_contract_field(&mut enc, self.contract, c),
                TickField::TickType => enc.encode_display(&self.tick_type),
                TickField::NumberOfTicks => enc.encode_i32(self.number_of_ticks),
                TickField::IgnoreSize => enc.encode_bool(self.ignore_size),
            };
        }
        Ok(enc.finish())
    }
}

/// CANCEL_TICK_BY_TICK_DATA (98).
#[derive(Debug, Clone, Copy)]
pub struct CancelTickByTick {
    pub request_id: i32,
}

impl OutgoingMessage for CancelTickByTick {
    fn encode(&self) -> Result<Bytes> {
        let mut enc = FieldEncoder::new();
        enc.encode_i32(outgoing::CANCEL_TICK_BY_TICK_DATA)
            .encode_i32(self.request_id);
        Ok(enc.finish())
    }
}

// ============================================================================
// Contract details
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailsField {
    MessageId,
    Version,
    RequestId,
    Contract(ContractField),
}

/// REQ_CONTRACT_DATA (9), message version 8.
#[derive(Debug, Clone)]
pub struct ContractDetailsRequest<'a> {
    pub server_version: i32,
    pub request_id: i32,
    pub contract: &'a Contract,
}

impl ContractDetailsRequest<'_> {
    pub const VERSION: i32 = 8;

    pub const LAYOUT: &'static [FieldGate<DetailsField>] = &[
        FieldGate::always(DetailsField::MessageId),
        FieldGate::always(DetailsField::Version),
        FieldGate::since(server_version::CONTRACT_DATA_CHAIN, DetailsField::RequestId),
        FieldGate::always(DetailsField::Contract(ContractField::ConId)),
        FieldGate::always(DetailsField::Contract(ContractField::Symbol)),
        FieldGate::always(DetailsField::Contract(ContractField::SecType)),
        FieldGate::always(DetailsField::Contract(ContractField::LastTradeDateOrContractMonth)),
        FieldGate::always(DetailsField::Contract(ContractField::Strike)),
        FieldGate::always(DetailsField::Contract(ContractField::Right)),
        FieldGate::always(DetailsField::Contract(ContractField::Multiplier)),
        FieldGate::always(DetailsField::Contract(ContractField::Exchange)),
        FieldGate::since(server_version::PRIMARYEXCH, DetailsField::Contract(ContractField::PrimaryExchange)),
        FieldGate::always(DetailsField::Contract(ContractField::Currency)),
        FieldGate::always(DetailsField::Contract(ContractField::LocalSymbol)),
        FieldGate::since(server_version::TRADING_CLASS, DetailsField::Contract(ContractField::TradingClass)),
        FieldGate::always(DetailsField::Contract(ContractField::IncludeExpired)),
        FieldGate::since(server_version::SEC_ID_TYPE, DetailsField::Contract(ContractField::SecIdType)),
        FieldGate::since(server_version::SEC_ID_TYPE, DetailsField::Contract(ContractField::SecId)),
        FieldGate::since(server_version::BOND_ISSUERID, DetailsField::Contract(ContractField::IssuerId)),
    ];

    pub fn layout(server_version: i32) -> Vec<DetailsField> {
        gated_fields(server_version, Self::LAYOUT)
    }

    pub fn check(&self) -> Result<()> {
        let sv = self.server_version;
        let c = self.contract;
        if c.sec_id_type.is_some() || !c.sec_id.is_empty() {
            Feature::SecIdType.ensure(sv)?;
        }
        if !c.trading_class.is_empty() {
            Feature::TradingClass.ensure(sv)?;
        }
        if !c.primary_exchange.is_empty() {
            Feature::PrimaryExchange.ensure(sv)?;
        }
        if !c.issuer_id.is_empty() {
            Feature::IssuerId.ensure(sv)?;
        }
        Ok(())
    }
}

impl OutgoingMessage for ContractDetailsRequest<'_> {
    fn encode(&self) -> Result<Bytes> {
        self.check()?;
        let mut enc = FieldEncoder::new();
        for field in Self::layout(self.server_version) {
            match field {
                DetailsField::MessageId => enc.encode_i32(outgoing::REQ_CONTRACT_DATA),
                DetailsField::Version => enc.encode_i32(Self::VERSION),
                DetailsField::RequestId => enc.encode_i32(self.request_id),
                DetailsField::Contract(c) => write_contract_field(&mut enc, self.contract, c),
            };
        }
        Ok(enc.finish())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{split_fields, FieldDecoder};
    use crate::errors::ClientError;
    use crate::models::enums::{SecIdType, SecType};

    fn wire(msg: &impl OutgoingMessage) -> Vec<String> {
        split_fields(&msg.encode().unwrap())
    }

    fn es_future() -> Contract {
        Contract {
            symbol: "ES".into(),
            sec_type: Some(SecType::Future),
            exchange: "GLOBEX".into(),
            currency: "USD".into(),
            ..Default::default()
        }
    }

    #[test]
    fn real_time_bars_exact_sequence() {
        let contract = es_future();
        let req = RealTimeBarsRequest {
            server_version: 176,
            request_id: 9000,
            contract: &contract,
            what_to_show: WhatToShow::Trades,
            use_rth: true,
            options: &[],
        };
        assert_eq!(
            wire(&req),
            vec![
                "50", "3", "9000", "0", "ES", "FUT", "", "0.000000", "", "", "GLOBEX", "", "USD",
                "", "", "5", "TRADES", "1", ""
            ]
        );
    }

    #[test]
    fn real_time_bars_below_trading_class_gate() {
        let contract = es_future();
        let req = RealTimeBarsRequest {
            server_version: server_version::TRADING_CLASS - 1,
            request_id: 9000,
            contract: &contract,
            what_to_show: WhatToShow::Midpoint,
            use_rth: false,
            options: &[],
        };
        // No conId, no tradingClass, no options field.
        assert_eq!(
            wire(&req),
            vec![
                "50", "3", "9000", "ES", "FUT", "", "0.000000", "", "", "GLOBEX", "", "USD", "",
                "5", "MIDPOINT", "0"
            ]
        );
    }

    #[test]
    fn real_time_bars_con_id_needs_trading_class_gate() {
        let contract = Contract {
            con_id: 495512563,
            ..es_future()
        };
        let req = RealTimeBarsRequest {
            server_version: 60,
            request_id: 9000,
            contract: &contract,
            what_to_show: WhatToShow::Trades,
            use_rth: true,
            options: &[],
        };
        assert!(matches!(
            req.encode(),
            Err(ClientError::UnsupportedFeature { required: 68, actual: 60, .. })
        ));
    }

    #[test]
    fn real_time_bars_options_rendered() {
        let contract = es_future();
        let options = [TagValue::new("XYZ", "1")];
        let req = RealTimeBarsRequest {
            server_version: server_version::LINKING,
            request_id: 9001,
            contract: &contract,
            what_to_show: WhatToShow::Bid,
            use_rth: false,
            options: &options,
        };
        let fields = wire(&req);
        assert_eq!(fields.last().map(String::as_str), Some("XYZ=1;"));
    }

    #[test]
    fn tick_by_tick_ignore_size_gate() {
        let contract = Contract::stock("AAPL");
        let at = |sv| TickByTickRequest {
            server_version: sv,
            request_id: 9002,
            contract: &contract,
            tick_type: TickByTickType::Last,
            number_of_ticks: 0,
            ignore_size: false,
        };

        let below = wire(&at(server_version::TICK_BY_TICK_IGNORE_SIZE - 1));
        assert_eq!(below.len(), 15);
        assert_eq!(below[0], "97");
        assert_eq!(below[1], "9002");
        assert_eq!(below[14], "Last");

        let exact = wire(&at(server_version::TICK_BY_TICK_IGNORE_SIZE));
        assert_eq!(exact.len(), 17);
        assert_eq!(&exact[15..], &["0".to_string(), "0".to_string()]);

        let above = wire(&at(176));
        assert_eq!(above, exact);
    }

    #[test]
    fn tick_by_tick_requires_minimum() {
        let contract = Contract::stock("AAPL");
        let req = TickByTickRequest {
            server_version: server_version::TICK_BY_TICK - 1,
            request_id: 9003,
            contract: &contract,
            tick_type: TickByTickType::BidAsk,
            number_of_ticks: 0,
            ignore_size: false,
        };
        assert!(matches!(
            req.encode(),
            Err(ClientError::UnsupportedFeature { required: 137, .. })
        ));

        let sized = TickByTickRequest {
            server_version: 138,
            number_of_ticks: 10,
            ..req
        };
        assert!(matches!(
            sized.encode(),
            Err(ClientError::UnsupportedFeature { required: 140, .. })
        ));
    }

    #[test]
    fn contract_details_primary_exchange_inserted_mid_sequence() {
        let contract = Contract::stock("IBM");
        let below = wire(&ContractDetailsRequest {
            server_version: server_version::PRIMARYEXCH - 1,
            request_id: 9004,
            contract: &contract,
        });
        let at = wire(&ContractDetailsRequest {
            server_version: server_version::PRIMARYEXCH,
            request_id: 9004,
            contract: &contract,
        });
        assert_eq!(at.len(), below.len() + 1);
        // exchange is at index 10 in both; primaryExchange follows it.
        assert_eq!(below[10], "SMART");
        assert_eq!(below[11], "USD");
        assert_eq!(at[10], "SMART");
        assert_eq!(at[11], "");
        assert_eq!(at[12], "USD");
    }

    #[test]
    fn contract_details_full_layout_at_issuer_id() {
        let contract = Contract {
            sec_id_type: Some(SecIdType::Isin),
            sec_id: "US4592001014".into(),
            ..Contract::stock("IBM")
        };
        let fields = wire(&ContractDetailsRequest {
            server_version: 176,
            request_id: 9005,
            contract: &contract,
        });
        assert_eq!(
            fields,
            vec![
                "9", "8", "9005", "0", "IBM", "STK", "", "0.000000", "", "", "SMART", "", "USD",
                "", "", "0", "ISIN", "US4592001014", ""
            ]
        );

        let older = wire(&ContractDetailsRequest {
            server_version: 175,
            request_id: 9005,
            contract: &contract,
        });
        assert_eq!(older.len(), fields.len() - 1);
    }

    #[test]
    fn contract_details_issuer_id_requires_gate() {
        let contract = Contract {
            issuer_id: "e1234567".into(),
            ..Contract::default()
        };
        let req = ContractDetailsRequest {
            server_version: 175,
            request_id: 9006,
            contract: &contract,
        };
        assert!(matches!(
            req.encode(),
            Err(ClientError::UnsupportedFeature { required: 176, .. })
        ));
    }

    #[test]
    fn cancel_messages() {
        assert_eq!(wire(&CancelRealTimeBars { request_id: 9000 }), vec!["51", "1", "9000"]);
        assert_eq!(wire(&CancelTickByTick { request_id: 9001 }), vec!["98", "9001"]);
    }

    #[test]
    fn start_api_capabilities_gate() {
        let at = |sv| StartApi {
            server_version: sv,
            client_id: 7,
            optional_capabilities: "+PACEAPI",
        };
        assert_eq!(wire(&at(server_version::OPTIONAL_CAPABILITIES)), vec!["71", "2", "7"]);
        assert_eq!(wire(&at(176)), vec!["71", "2", "7", "+PACEAPI"]);
    }

    #[test]
    fn version_announcement() {
        let plain = VersionAnnouncement::default().encode().unwrap();
        assert_eq!(&plain[..], b"v100..176");

        let with_opts = VersionAnnouncement {
            connect_options: Some("+PACEAPI"),
        }
        .encode()
        .unwrap();
        assert_eq!(&with_opts[..], b"v100..176 +PACEAPI");

        let blank = VersionAnnouncement {
            connect_options: Some(""),
        }
        .encode()
        .unwrap();
        assert_eq!(&blank[..], b"v100..176");
    }

    #[test]
    fn layouts_are_pure_functions_of_version() {
        assert_eq!(RealTimeBarsRequest::layout(67).len(), 16);
        assert_eq!(RealTimeBarsRequest::layout(68).len(), 18);
        assert_eq!(RealTimeBarsRequest::layout(70).len(), 19);
        assert_eq!(
            ContractDetailsRequest::layout(176).last(),
            Some(&DetailsField::Contract(ContractField::IssuerId))
        );
        assert_eq!(TickByTickRequest::layout(139).last(), Some(&TickField::TickType));
    }

    // ------------------------------------------------------------------------
    // Read-back across gate boundaries
    // ------------------------------------------------------------------------

    #[test]
    fn real_time_bars_read_back_across_gates() {
        let options = [TagValue::new("XYZ", "1")];
        for sv in [67, 68, 69, 70, 71] {
            let contract = if sv >= server_version::TRADING_CLASS {
                Contract {
                    con_id: 495512563,
                    trading_class: "ES".into(),
                    ..es_future()
                }
            } else {
                es_future()
            };
            let fields = wire(&RealTimeBarsRequest {
                server_version: sv,
                request_id: 9010,
                contract: &contract,
                what_to_show: WhatToShow::Ask,
                use_rth: true,
                options: &options,
            });

            let mut dec = FieldDecoder::new(&fields, sv);
            assert_eq!(dec.decode_i32().unwrap(), 50);
            assert_eq!(dec.decode_i32().unwrap(), 3);
            assert_eq!(dec.decode_i32().unwrap(), 9010);
            if sv >= 68 {
                assert_eq!(dec.position(), 3, "conId position at {sv}");
                assert_eq!(dec.decode_i64().unwrap(), 495512563);
            }
            assert_eq!(dec.decode_string().unwrap(), "ES");
            assert_eq!(dec.decode_string().unwrap(), "FUT");
            dec.skip_fields(4).unwrap();
            assert_eq!(dec.decode_string().unwrap(), "GLOBEX");
            assert_eq!(dec.decode_string().unwrap(), "");
            assert_eq!(dec.decode_string().unwrap(), "USD");
            assert_eq!(dec.decode_string().unwrap(), "");
            if sv >= 68 {
                assert_eq!(dec.position(), 14, "tradingClass position at {sv}");
                assert_eq!(dec.decode_string().unwrap(), "ES");
            }
            assert_eq!(dec.decode_i32().unwrap(), 5);
            assert_eq!(dec.decode_string().unwrap(), "ASK");
            assert!(dec.decode_bool().unwrap());
            if sv >= 70 {
                assert_eq!(dec.position(), 18, "options position at {sv}");
                assert_eq!(dec.decode_string().unwrap(), "XYZ=1;");
            }
            assert!(!dec.has_remaining(), "trailing fields at {sv}: {:?}", dec.remaining());
        }
    }

    #[test]
    fn tick_by_tick_read_back_across_gates() {
        let contract = Contract {
            con_id: 265598,
            ..Contract::stock("AAPL")
        };
        for sv in [139, 140, 141] {
            let backfill = sv >= server_version::TICK_BY_TICK_IGNORE_SIZE;
            let fields = wire(&TickByTickRequest {
                server_version: sv,
                request_id: 9011,
                contract: &contract,
                tick_type: TickByTickType::BidAsk,
                number_of_ticks: if backfill { 25 } else { 0 },
                ignore_size: backfill,
            });

            let mut dec = FieldDecoder::new(&fields, sv);
            assert_eq!(dec.decode_i32().unwrap(), 97);
            assert_eq!(dec.decode_i32().unwrap(), 9011);
            assert_eq!(dec.decode_i64().unwrap(), 265598);
            assert_eq!(dec.decode_string().unwrap(), "AAPL");
            assert_eq!(dec.decode_string().unwrap(), "STK");
            dec.skip_fields(4).unwrap();
            assert_eq!(dec.decode_string().unwrap(), "SMART");
            dec.skip_fields(4).unwrap();
            assert_eq!(dec.position(), 14);
            assert_eq!(dec.decode_string().unwrap(), "BidAsk");
            if backfill {
                assert_eq!(dec.position(), 15, "numberOfTicks position at {sv}");
                assert_eq!(dec.decode_i32().unwrap(), 25);
                assert!(dec.decode_bool().unwrap());
            }
            assert!(!dec.has_remaining(), "trailing fields at {sv}: {:?}", dec.remaining());
        }
    }

    #[test]
    fn contract_details_read_back_across_gates() {
        for sv in [44, 45, 46, 74, 75, 76, 175, 176, 177] {
            let has_sec_id = sv >= server_version::SEC_ID_TYPE;
            let has_class = sv >= server_version::TRADING_CLASS;
            let has_primary = sv >= server_version::PRIMARYEXCH;
            let has_issuer = sv >= server_version::BOND_ISSUERID;
            let pick = |on: bool, value: &str| if on { value.to_string() } else { String::new() };
            let contract = Contract {
                con_id: 8314,
                primary_exchange: pick(has_primary, "NYSE"),
                trading_class: pick(has_class, "IBM"),
                include_expired: true,
                sec_id_type: has_sec_id.then_some(SecIdType::Isin),
                sec_id: pick(has_sec_id, "US4592001014"),
                issuer_id: pick(has_issuer, "e1234567"),
                ..Contract::stock("IBM")
            };
            let fields = wire(&ContractDetailsRequest {
                server_version: sv,
                request_id: 9012,
                contract: &contract,
            });

            let mut dec = FieldDecoder::new(&fields, sv);
            assert_eq!(dec.decode_i32().unwrap(), 9);
            assert_eq!(dec.decode_i32().unwrap(), 8);
            assert_eq!(dec.decode_i32().unwrap(), 9012);
            assert_eq!(dec.decode_i64().unwrap(), 8314);
            assert_eq!(dec.decode_string().unwrap(), "IBM");
            assert_eq!(dec.decode_string().unwrap(), "STK");
            dec.skip_fields(4).unwrap();
            assert_eq!(dec.decode_string().unwrap(), "SMART");
            if has_primary {
                assert_eq!(dec.position(), 11, "primaryExchange position at {sv}");
                assert_eq!(dec.decode_string().unwrap(), "NYSE");
            }
            assert_eq!(dec.decode_string().unwrap(), "USD");
            assert_eq!(dec.decode_string().unwrap(), "");
            if has_class {
                assert_eq!(dec.decode_string().unwrap(), "IBM");
            }
            assert!(dec.decode_bool().unwrap());
            if has_sec_id {
                let expected = 14 + usize::from(has_class) + usize::from(has_primary);
                assert_eq!(dec.position(), expected, "secIdType position at {sv}");
                assert_eq!(dec.decode_string().unwrap(), "ISIN");
                assert_eq!(dec.decode_string().unwrap(), "US4592001014");
            }
            if has_issuer {
                assert_eq!(dec.position(), 18, "issuerId position at {sv}");
                assert_eq!(dec.decode_string().unwrap(), "e1234567");
            }
            assert!(!dec.has_remaining(), "trailing fields at {sv}: {:?}", dec.remaining());
        }
    }
}
