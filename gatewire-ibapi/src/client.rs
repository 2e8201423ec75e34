//! The client engine.
//!
//! A [`Client`] owns one connection: a writer task serializing outbound
//! frames, a reader task dispatching inbound frames, the negotiated
//! [`Session`] and the correlation map. Requests may be issued concurrently
//! from any number of tasks through `&Client`.
//!
//! ```rust,ignore
//! let client = Client::connect(&ClientConfig::default()).await?;
//! let token = CancellationToken::new();
//! let details = client.contract_details(&Contract::stock("AAPL"), &token).await?;
//! let mut bars = client
//!     .real_time_bars(&Contract::future("ES", "202412", "CME"), WhatToShow::Trades, true, &token)
//!     .await?;
//! while let Some(bar) = bars.next().await {
//!     println!("{:?}", bar?);
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::codec::{message_id, split_fields};
use crate::config::ClientConfig;
use crate::decoder::{decode_handshake_ack, decode_server_notice, ResponseDecode};
use crate::encoder::{
    CancelRealTimeBars, CancelTickByTick, ContractDetailsRequest, OutgoingMessage,
    RealTimeBarsRequest, StartApi, TickByTickRequest, VersionAnnouncement,
};
use crate::errors::{ClientError, Result};
use crate::models::bar::Bar;
use crate::models::common::ServerNotice;
use crate::models::contract::{Contract, ContractDetails};
use crate::models::enums::{TickByTickType, WhatToShow};
use crate::models::tick::{
    TickByTickBidAsk, TickByTickMidPoint, TickByTickOptions, TickByTickTrade, TradeFeed,
};
use crate::protocol::{incoming, API_SIGN};
use crate::reader::MessageReader;
use crate::router::{FieldsReceiver, Registration, RequestRouter};
use crate::session::{ConnectionState, Session};
use crate::subscription::{StreamContext, Subscription};
use crate::transport::{FrameReader, TcpTransport, Transport};
use crate::writer::{spawn_writer, WriteHandle};

/// Buffered server notices per subscriber before the oldest are dropped.
const NOTICE_CAPACITY: usize = 256;

pub struct Client {
    session: Arc<Session>,
    router: Arc<RequestRouter>,
    state: Arc<watch::Sender<ConnectionState>>,
    notices: broadcast::Sender<ServerNotice>,
    writer: WriteHandle,
    cancel_grace: Duration,
    reader_task: JoinHandle<()>,
    closed: AtomicBool,
}

impl Client {
    // ========================================================================
    // Connection lifecycle
    // ========================================================================

    /// Dial TWS / IB Gateway over TCP and complete the handshake.
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let deadline = Instant::now() + config.handshake_timeout();
        let transport = tokio::time::timeout_at(
            deadline,
            TcpTransport::connect(&config.host, config.port),
        )
        .await
        .map_err(|_| {
            ClientError::Timeout(format!(
                "connecting to {}:{} took longer than {:?}",
                config.host,
                config.port,
                config.handshake_timeout()
            ))
        })??;
        Self::establish(transport, config, deadline).await
    }

    /// Complete the handshake over an already-open transport.
    pub async fn connect_with<T: Transport>(transport: T, config: &ClientConfig) -> Result<Self> {
        let deadline = Instant::now() + config.handshake_timeout();
        Self::establish(transport, config, deadline).await
    }

    async fn establish<T: Transport>(
        transport: T,
        config: &ClientConfig,
        deadline: Instant,
    ) -> Result<Self> {
        let (mut reader, writer) = transport.split();
        let (writer, _writer_task) = spawn_writer(writer);
        let state = Arc::new(watch::Sender::new(ConnectionState::Handshaking));

        let negotiated =
            tokio::time::timeout_at(deadline, Self::negotiate(&mut reader, &writer, config))
                .await
                .unwrap_or_else(|_| {
                    Err(ClientError::Timeout("no handshake reply from server".into()))
                });
        let session = match negotiated {
            Ok(session) => Arc::new(session),
            Err(e) => {
                tracing::error!(error = %e, "handshake failed");
                let _ = writer.close().await;
                return Err(e);
            }
        };
        state.send_replace(ConnectionState::AwaitingNextValidId);

        let router = Arc::new(RequestRouter::new());
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        let reader_task = MessageReader::new(
            reader,
            session.clone(),
            router.clone(),
            state.clone(),
            notices.clone(),
        )
        .spawn();

        let client = Self {
            session,
            router,
            state,
            notices,
            writer,
            cancel_grace: config.cancel_grace(),
            reader_task,
            closed: AtomicBool::new(false),
        };

        let start = StartApi {
            server_version: client.server_version(),
            client_id: config.client_id,
            optional_capabilities: &config.optional_capabilities,
        }
        .encode()?;
        if let Err(e) = client.writer.write_frame(start).await {
            client.close().await;
            return Err(e);
        }

        let mut state_rx = client.state.subscribe();
        let settled = tokio::time::timeout_at(deadline, async {
            state_rx
                .wait_for(|s| matches!(s, ConnectionState::Ready | ConnectionState::Closed))
                .await
                .map(|state| *state)
        })
        .await;
        let ready = match settled {
            Ok(Ok(state)) => state == ConnectionState::Ready,
            Ok(Err(_)) => false,
            Err(_) => {
                client.close().await;
                return Err(ClientError::Timeout(
                    "server never sent NEXT_VALID_ID".into(),
                ));
            }
        };
        if !ready {
            client.close().await;
            return Err(ClientError::ConnectionClosed(
                "connection closed during handshake".into(),
            ));
        }

        tracing::info!(
            server_version = client.server_version(),
            client_id = config.client_id,
            "client connected"
        );
        Ok(client)
    }

    /// Send the prefix and announcement, read the ack.
    async fn negotiate<R: FrameReader>(
        reader: &mut R,
        writer: &WriteHandle,
        config: &ClientConfig,
    ) -> Result<Session> {
        writer.write_raw(Bytes::from_static(API_SIGN)).await?;
        let announcement = VersionAnnouncement {
            connect_options: config.connect_options.as_deref(),
        }
        .encode()?;
        writer.write_frame(announcement).await?;

        let ack = reader.read_frame().await?;
        let (server_version, server_time) = decode_handshake_ack(&split_fields(&ack))?;
        tracing::info!(server_version, %server_time, "handshake complete");
        Ok(Session::new(
            server_version,
            server_time,
            config.optional_capabilities.clone(),
        ))
    }

    /// Close the connection. Idempotent.
    ///
    /// Pending requests see their delivery channels close; streams end.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("closing client");
        self.router.close_all();
        if let Err(e) = self.writer.close().await {
            tracing::debug!(error = %e, "writer close failed");
        }
        self.reader_task.abort();
        self.state.send_replace(ConnectionState::Closed);
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn server_version(&self) -> i32 {
        self.session.server_version()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    /// Resolves once the connection has closed, from either side.
    pub async fn wait_closed(&self) {
        let mut state = self.state.subscribe();
        let _ = state.wait_for(|s| *s == ConnectionState::Closed).await;
    }

    /// Server notices not tied to a pending request.
    pub fn notices(&self) -> broadcast::Receiver<ServerNotice> {
        self.notices.subscribe()
    }

    /// Number of requests still registered.
    pub fn pending_requests(&self) -> usize {
        self.router.len()
    }

    // ========================================================================
    // Request plumbing
    // ========================================================================

    /// Register `request_id`, then write its frame.
    async fn submit(&self, request_id: i32, payload: Bytes) -> Result<FieldsReceiver> {
        let frames = self.router.register(request_id)?;
        if let Err(e) = self.writer.write_frame(payload).await {
            self.router.remove(request_id);
            return Err(e);
        }
        Ok(frames)
    }

    fn stream_context(&self) -> StreamContext {
        StreamContext {
            router: self.router.clone(),
            writer: self.writer.clone(),
            server_version: self.server_version(),
            grace: self.cancel_grace,
        }
    }

    async fn subscribe<T: ResponseDecode + Send + 'static>(
        &self,
        request_id: i32,
        payload: Bytes,
        cancel_payload: Bytes,
        cancel: &CancellationToken,
    ) -> Result<Subscription<T>> {
        let frames = self.submit(request_id, payload).await?;
        tracing::debug!(request_id, "subscription started");
        Ok(Subscription::spawn(
            self.stream_context(),
            request_id,
            frames,
            cancel_payload,
            cancel,
        ))
    }

    // ========================================================================
    // Contract details
    // ========================================================================

    /// Every contract matching `contract`, collected until the end marker.
    ///
    /// Cancelling returns `Cancelled` and discards what arrived so far.
    pub async fn contract_details(
        &self,
        contract: &Contract,
        cancel: &CancellationToken,
    ) -> Result<Vec<ContractDetails>> {
        let server_version = self.server_version();
        let request_id = self.router.next_request_id();
        let payload = ContractDetailsRequest {
            server_version,
            request_id,
            contract,
        }
        .encode()?;
        let mut frames = self.submit(request_id, payload).await?;
        let _registration = Registration::new(&self.router, request_id);

        let mut details = Vec::new();
        loop {
            let fields = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(request_id, received = details.len(), "contract details cancelled");
                    return Err(ClientError::Cancelled { request_id });
                }
                next = frames.recv() => match next {
                    Some(fields) => fields,
                    None => {
                        return Err(ClientError::ConnectionClosed(format!(
                            "connection lost while request {request_id} was pending"
                        )))
                    }
                },
            };

            match message_id(&fields)? {
                incoming::CONTRACT_DATA_END => {
                    tracing::debug!(request_id, count = details.len(), "contract details complete");
                    return Ok(details);
                }
                incoming::ERR_MSG => {
                    let notice = decode_server_notice(&fields, server_version)?;
                    if notice.is_warning() {
                        tracing::info!(request_id, code = notice.code, message = %notice.message, "server warning");
                        continue;
                    }
                    return Err(notice.into_error());
                }
                _ => details.push(ContractDetails::decode(&fields, server_version)?),
            }
        }
    }

    // ========================================================================
    // Real-time bars
    // ========================================================================

    /// Five-second bars until cancelled.
    pub async fn real_time_bars(
        &self,
        contract: &Contract,
        what_to_show: WhatToShow,
        use_rth: bool,
        cancel: &CancellationToken,
    ) -> Result<Subscription<Bar>> {
        let request_id = self.router.next_request_id();
        let payload = RealTimeBarsRequest {
            server_version: self.server_version(),
            request_id,
            contract,
            what_to_show,
            use_rth,
            options: &[],
        }
        .encode()?;
        let cancel_payload = CancelRealTimeBars { request_id }.encode()?;
        self.subscribe(request_id, payload, cancel_payload, cancel)
            .await
    }

    // ========================================================================
    // Tick-by-tick
    // ========================================================================

    async fn tick_by_tick<T: ResponseDecode + Send + 'static>(
        &self,
        contract: &Contract,
        tick_type: TickByTickType,
        options: TickByTickOptions,
        cancel: &CancellationToken,
    ) -> Result<Subscription<T>> {
        let request_id = self.router.next_request_id();
        let payload = TickByTickRequest {
            server_version: self.server_version(),
            request_id,
            contract,
            tick_type,
            number_of_ticks: options.number_of_ticks,
            ignore_size: options.ignore_size,
        }
        .encode()?;
        let cancel_payload = CancelTickByTick { request_id }.encode()?;
        self.subscribe(request_id, payload, cancel_payload, cancel)
            .await
    }

    pub async fn tick_by_tick_trades(
        &self,
        contract: &Contract,
        feed: TradeFeed,
        options: TickByTickOptions,
        cancel: &CancellationToken,
    ) -> Result<Subscription<TickByTickTrade>> {
        self.tick_by_tick(contract, feed.into(), options, cancel)
            .await
    }

    pub async fn tick_by_tick_bid_ask(
        &self,
        contract: &Contract,
        options: TickByTickOptions,
        cancel: &CancellationToken,
    ) -> Result<Subscription<TickByTickBidAsk>> {
        self.tick_by_tick(contract, TickByTickType::BidAsk, options, cancel)
            .await
    }

    pub async fn tick_by_tick_midpoint(
        &self,
        contract: &Contract,
        options: TickByTickOptions,
        cancel: &CancellationToken,
    ) -> Result<Subscription<TickByTickMidPoint>> {
        self.tick_by_tick(contract, TickByTickType::MidPoint, options, cancel)
            .await
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.router.close_all();
        self.reader_task.abort();
    }
}
