//! gatewire-ibapi -- async protocol engine for the TWS / IB Gateway socket API.
//!
//! Speaks the length-prefixed, NUL-delimited wire format: negotiates a
//! server version, correlates responses to requests by id and exposes
//! contract-details lookups plus real-time bar and tick-by-tick streams.
//!
//! ## Modules
//!
//! - [`client`] -- `Client`, the main entry point
//! - [`config`] -- connection settings
//! - [`codec`] -- frame headers and field encoding/decoding
//! - [`protocol`] -- message codes, version gates and limits
//! - [`version`] -- per-field and per-feature server-version gating
//! - [`encoder`] / [`decoder`] -- request payloads and response records
//! - [`dispatch`] -- which inbound messages carry a request id, and where
//! - [`router`] -- request-id allocation and the correlation map
//! - [`reader`] / [`writer`] -- the two connection tasks
//! - [`subscription`] -- stream-until-cancelled requests
//! - [`transport`] -- TCP, in-memory and recording transports
//! - [`session`] -- negotiated session state

pub mod client;
pub mod codec;
pub mod config;
pub mod decoder;
pub mod dispatch;
pub mod encoder;
pub mod errors;
pub mod models;
pub mod protocol;
pub mod reader;
pub mod router;
pub mod session;
pub mod subscription;
pub mod transport;
pub mod version;
pub mod writer;

// ============================================================================
// Re-exports for convenience
// ============================================================================

pub use errors::{ClientError, Result};

pub use models::bar::Bar;
pub use models::common::{ServerNotice, TagValue};
pub use models::contract::{Contract, ContractDetails};
pub use models::enums::*;
pub use models::tick::{
    TickAttribBidAsk, TickAttribLast, TickByTickBidAsk, TickByTickMidPoint, TickByTickOptions,
    TickByTickTrade, TradeFeed,
};

pub use client::Client;
pub use config::ClientConfig;
pub use session::{ConnectionState, ServerTime, Session};
pub use subscription::Subscription;
pub use transport::{MemoryPeer, MemoryTransport, RecordingTransport, TcpTransport, Transport};

pub use tokio_util::sync::CancellationToken;
