//! Contract descriptors and the details returned by a contract lookup.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::common::TagValue;
use super::enums::{Right, SecIdType, SecType};

// ============================================================================
// Contract
// ============================================================================

/// Describes an instrument in requests and in contract-details replies.
///
/// Blank strings and a zero `con_id` are sent as-is; the gateway treats them
/// as "not specified".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub con_id: i64,
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sec_type: Option<SecType>,
    pub last_trade_date_or_contract_month: String,
    pub strike: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<Right>,
    pub multiplier: String,
    pub exchange: String,
    pub primary_exchange: String,
    pub currency: String,
    pub local_symbol: String,
    pub trading_class: String,
    pub include_expired: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sec_id_type: Option<SecIdType>,
    pub sec_id: String,
    pub issuer_id: String,
}

impl Contract {
    pub fn new(
        symbol: impl Into<String>,
        sec_type: SecType,
        exchange: impl Into<String>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            sec_type: Some(sec_type),
            exchange: exchange.into(),
            currency: currency.into(),
            ..Default::default()
        }
    }

    /// SMART-routed US stock.
    pub fn stock(symbol: impl Into<String>) -> Self {
        Self::new(symbol, SecType::Stock, "SMART", "USD")
    }

    pub fn future(
        symbol: impl Into<String>,
        contract_month: impl Into<String>,
        exchange: impl Into<String>,
    ) -> Self {
        Self {
            last_trade_date_or_contract_month: contract_month.into(),
            ..Self::new(symbol, SecType::Future, exchange, "USD")
        }
    }
}

// ============================================================================
// ContractDetails
// ============================================================================

/// Full description of one contract from a contract-details lookup.
///
/// Bond replies fill the bond block and leave the equity-only fields blank.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDetails {
    pub contract: Contract,
    pub market_name: String,
    pub min_tick: f64,
    pub order_types: String,
    pub valid_exchanges: String,
    pub price_magnifier: i64,
    pub under_con_id: i32,
    pub long_name: String,
    pub contract_month: String,
    pub industry: String,
    pub category: String,
    pub subcategory: String,
    pub time_zone_id: String,
    pub trading_hours: String,
    pub liquid_hours: String,
    pub ev_rule: String,
    pub ev_multiplier: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sec_id_list: Vec<TagValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agg_group: Option<i32>,
    pub under_symbol: String,
    pub under_sec_type: String,
    pub market_rule_ids: String,
    pub real_expiration_date: String,
    pub stock_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_size: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_increment: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_size_increment: Option<Decimal>,

    // ----- Bond fields -----
    pub cusip: String,
    pub coupon: f64,
    pub maturity: String,
    pub issue_date: String,
    pub ratings: String,
    pub bond_type: String,
    pub coupon_type: String,
    pub convertible: bool,
    pub callable: bool,
    pub putable: bool,
    pub desc_append: String,
    pub next_option_date: String,
    pub next_option_type: String,
    pub next_option_partial: bool,
    pub notes: String,
}

impl ContractDetails {
    /// True when this record came from a BOND_CONTRACT_DATA frame.
    pub fn is_bond(&self) -> bool {
        self.contract.sec_type == Some(SecType::Bond) || !self.cusip.is_empty()
    }
}
