//! Command-line arguments.

use clap::{Args, Parser, Subcommand};
use gatewire_ibapi::{ClientConfig, Contract, SecType, TickByTickOptions, WhatToShow};

/// Query TWS / IB Gateway over the socket API and print records as JSON lines.
#[derive(Parser, Debug)]
#[command(name = "gatewire", version)]
pub struct Cli {
    /// TWS/Gateway host
    #[arg(long, env = "IB_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// TWS/Gateway port
    #[arg(long, env = "IB_PORT", default_value_t = 4002)]
    pub port: u16,

    /// API client ID
    #[arg(long, env = "IB_CLIENT_ID", default_value_t = 0)]
    pub client_id: i32,

    /// Extra connect options appended to the version announcement
    #[arg(long)]
    pub connect_options: Option<String>,

    /// How long a cancelled stream keeps draining, in milliseconds
    #[arg(long, default_value_t = 200)]
    pub grace_ms: u64,

    /// Handshake timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub timeout_secs: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Look up contract details
    Details {
        #[command(flatten)]
        contract: ContractArgs,
    },
    /// Stream 5-second real-time bars until Ctrl+C
    Bars {
        #[command(flatten)]
        contract: ContractArgs,
        /// TRADES, MIDPOINT, BID or ASK
        #[arg(long, default_value = "TRADES")]
        what_to_show: WhatToShow,
        /// Regular trading hours only
        #[arg(long)]
        rth: bool,
    },
    /// Stream tick-by-tick trades until Ctrl+C
    Trades {
        #[command(flatten)]
        contract: ContractArgs,
        /// Include trades not reported to the tape
        #[arg(long)]
        all: bool,
        #[command(flatten)]
        backfill: BackfillArgs,
    },
    /// Stream tick-by-tick bid/ask quotes until Ctrl+C
    Quotes {
        #[command(flatten)]
        contract: ContractArgs,
        #[command(flatten)]
        backfill: BackfillArgs,
    },
    /// Stream tick-by-tick midpoints until Ctrl+C
    Midpoints {
        #[command(flatten)]
        contract: ContractArgs,
        #[command(flatten)]
        backfill: BackfillArgs,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ContractArgs {
    #[arg(long)]
    pub symbol: Option<String>,
    /// STK, FUT, OPT, CASH, ...
    #[arg(long, default_value = "STK")]
    pub sec_type: SecType,
    #[arg(long, default_value = "SMART")]
    pub exchange: String,
    #[arg(long, default_value = "USD")]
    pub currency: String,
    /// Expiry or contract month (YYYYMM or YYYYMMDD)
    #[arg(long)]
    pub expiry: Option<String>,
    #[arg(long)]
    pub primary_exchange: Option<String>,
    #[arg(long)]
    pub con_id: Option<i64>,
}

impl ContractArgs {
    pub fn to_contract(&self) -> Contract {
        Contract {
            con_id: self.con_id.unwrap_or_default(),
            symbol: self.symbol.clone().unwrap_or_default(),
            last_trade_date_or_contract_month: self.expiry.clone().unwrap_or_default(),
            primary_exchange: self.primary_exchange.clone().unwrap_or_default(),
            ..Contract::new(
                "",
                self.sec_type.clone(),
                self.exchange.clone(),
                self.currency.clone(),
            )
        }
    }
}

#[derive(Args, Debug, Clone, Copy)]
pub struct BackfillArgs {
    /// Historical ticks to send before live data
    #[arg(long, default_value_t = 0)]
    pub ticks: i32,
    /// Ignore size-only updates
    #[arg(long)]
    pub ignore_size: bool,
}

impl From<BackfillArgs> for TickByTickOptions {
    fn from(args: BackfillArgs) -> Self {
        Self {
            number_of_ticks: args.ticks,
            ignore_size: args.ignore_size,
        }
    }
}

impl Cli {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            connect_options: self.connect_options.clone(),
            handshake_timeout_ms: self.timeout_secs.saturating_mul(1_000),
            cancel_grace_ms: self.grace_ms,
            ..ClientConfig::new(self.host.clone(), self.port, self.client_id)
        }
    }
}
