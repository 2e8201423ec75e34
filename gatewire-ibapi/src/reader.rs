//! Reader task.
//!
//! Owns the read half of the transport. Every frame is split into fields and
//! classified: system messages update the session here, correlated messages
//! are handed to the pending request's channel. When the loop ends, for any
//! reason, every pending channel is closed and the state becomes `Closed`.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::codec::split_fields;
use crate::decoder::{decode_managed_accounts, decode_next_valid_id, decode_server_notice};
use crate::dispatch::{classify, Disposition, SystemMessage};
use crate::errors::ClientError;
use crate::models::common::ServerNotice;
use crate::router::RequestRouter;
use crate::session::{ConnectionState, Session};
use crate::transport::FrameReader;

/// Async message reader that runs in a spawned tokio task.
pub struct MessageReader<R> {
    reader: R,
    session: Arc<Session>,
    router: Arc<RequestRouter>,
    state: Arc<watch::Sender<ConnectionState>>,
    notices: broadcast::Sender<ServerNotice>,
}

impl<R: FrameReader> MessageReader<R> {
    pub fn new(
        reader: R,
        session: Arc<Session>,
        router: Arc<RequestRouter>,
        state: Arc<watch::Sender<ConnectionState>>,
        notices: broadcast::Sender<ServerNotice>,
    ) -> Self {
        Self {
            reader,
            session,
            router,
            state,
            notices,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Main read loop. Runs until the connection ends or a frame cannot be read.
    pub async fn run(mut self) {
        let reason = loop {
            let payload = match self.reader.read_frame().await {
                Ok(payload) => payload,
                Err(e) => break e,
            };
            if let Some(reason) = self.dispatch(split_fields(&payload)) {
                break reason;
            }
        };

        self.router.close_all();
        self.state.send_replace(ConnectionState::Closed);
        match reason {
            ClientError::ConnectionClosed(reason) => {
                tracing::info!(%reason, "connection closed");
            }
            e => tracing::error!(error = %e, "reader stopped"),
        }
    }

    /// Route one frame. Returns the reason to stop, if any.
    fn dispatch(&self, fields: Vec<String>) -> Option<ClientError> {
        let server_version = self.session.server_version();
        match classify(&fields, server_version) {
            Disposition::System(msg) => self.handle_system(msg, fields),
            Disposition::Correlated {
                message_id,
                request_id,
            } => {
                if !self.router.deliver(request_id, fields) {
                    tracing::debug!(request_id, message_id, "dropping frame for retired request");
                }
                None
            }
            Disposition::Unroutable { reason } => {
                tracing::warn!(%reason, "dropping unexpected frame");
                None
            }
        }
    }

    fn handle_system(&self, msg: SystemMessage, fields: Vec<String>) -> Option<ClientError> {
        let server_version = self.session.server_version();
        match msg {
            SystemMessage::EndConnection => {
                return Some(ClientError::ConnectionClosed(
                    "server ended the connection".into(),
                ));
            }
            SystemMessage::NextValidId => match decode_next_valid_id(&fields, server_version) {
                Ok(order_id) => {
                    self.session.set_next_order_id(order_id);
                    let became_ready = self.state.send_if_modified(|state| {
                        if *state == ConnectionState::AwaitingNextValidId {
                            *state = ConnectionState::Ready;
                            true
                        } else {
                            false
                        }
                    });
                    if became_ready {
                        tracing::info!(order_id, server_version, "session ready");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "bad NEXT_VALID_ID frame"),
            },
            SystemMessage::ManagedAccounts => {
                match decode_managed_accounts(&fields, server_version) {
                    Ok(accounts) => {
                        tracing::debug!(%accounts, "managed accounts");
                        self.session.set_managed_accounts(accounts);
                    }
                    Err(e) => tracing::warn!(error = %e, "bad MANAGED_ACCTS frame"),
                }
            }
            SystemMessage::Error => match decode_server_notice(&fields, server_version) {
                Ok(notice) => self.handle_notice(notice, fields),
                Err(e) => tracing::warn!(error = %e, "bad ERR_MSG frame"),
            },
        }
        None
    }

    fn handle_notice(&self, notice: ServerNotice, fields: Vec<String>) {
        let request_id = notice.request_id;
        if request_id > 0 && self.router.deliver(request_id, fields) {
            tracing::debug!(request_id, code = notice.code, "server error routed to request");
            return;
        }
        if notice.is_warning() {
            tracing::info!(request_id, code = notice.code, message = %notice.message, "server notice");
        } else {
            tracing::warn!(request_id, code = notice.code, message = %notice.message, "server error");
        }
        // No subscribers is fine.
        let _ = self.notices.send(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::{self, MemoryPeer};
    use crate::transport::Transport;

    struct Harness {
        peer: MemoryPeer,
        session: Arc<Session>,
        router: Arc<RequestRouter>,
        state: watch::Receiver<ConnectionState>,
        notices: broadcast::Receiver<ServerNotice>,
        handle: JoinHandle<()>,
    }

    fn start(server_version: i32) -> Harness {
        let (transport, peer) = memory::pair();
        let (reader, _writer) = transport.split();
        let session = Arc::new(Session::new(
            server_version,
            "20240102 09:30:00 EST".parse().unwrap(),
            String::new(),
        ));
        let router = Arc::new(RequestRouter::new());
        let (state_tx, state) = watch::channel(ConnectionState::AwaitingNextValidId);
        let (notice_tx, notices) = broadcast::channel(16);
        let handle = MessageReader::new(
            reader,
            session.clone(),
            router.clone(),
            Arc::new(state_tx),
            notice_tx,
        )
        .spawn();
        Harness {
            peer,
            session,
            router,
            state,
            notices,
            handle,
        }
    }

    #[tokio::test]
    async fn system_messages_update_session() {
        let mut h = start(176);
        h.peer.send_fields(&["15", "1", "DU123"]).unwrap();
        h.peer.send_fields(&["9", "1", "100"]).unwrap();

        h.state
            .wait_for(|s| *s == ConnectionState::Ready)
            .await
            .unwrap();
        assert_eq!(h.session.next_order_id(), 100);
        assert_eq!(h.session.managed_accounts(), "DU123");

        h.peer.disconnect();
        h.handle.await.unwrap();
        assert_eq!(*h.state.borrow(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn correlated_frames_reach_their_request() {
        let h = start(176);
        let mut rx = h.router.register(9000).unwrap();
        h.peer.send_fields(&["52", "1", "9999"]).unwrap(); // unknown, dropped
        h.peer.send_fields(&["52", "1", "9000"]).unwrap();
        assert_eq!(rx.recv().await.unwrap(), vec!["52", "1", "9000"]);
    }

    #[tokio::test]
    async fn errors_route_or_broadcast() {
        let mut h = start(176);
        let mut rx = h.router.register(9000).unwrap();

        h.peer
            .send_fields(&["4", "2", "9000", "200", "No security definition", ""])
            .unwrap();
        h.peer
            .send_fields(&["4", "2", "-1", "2104", "Market data farm connection is OK", ""])
            .unwrap();
        h.peer
            .send_fields(&["4", "2", "9005", "300", "Can't find EId", ""])
            .unwrap();

        assert_eq!(rx.recv().await.unwrap()[3], "200");
        let farm = h.notices.recv().await.unwrap();
        assert_eq!(farm.code, 2104);
        assert!(farm.is_warning());
        let stray = h.notices.recv().await.unwrap();
        assert_eq!(stray.request_id, 9005);
    }

    #[tokio::test]
    async fn end_connection_closes_pending_requests() {
        let h = start(176);
        let mut rx = h.router.register(9000).unwrap();
        h.peer.send_fields(&["0"]).unwrap();
        h.handle.await.unwrap();
        assert!(rx.recv().await.is_none());
        assert!(h.router.is_closed());
    }

    #[tokio::test]
    async fn garbage_frames_are_dropped() {
        let h = start(176);
        // Garbage frames are dropped, not fatal.
        h.peer.send_fields(&["abc"]).unwrap();
        h.peer.send_frame(bytes::Bytes::new()).unwrap();
        let mut rx = h.router.register(9001).unwrap();
        h.peer.send_fields(&["99", "9001", "4", "1708876800", "1.5"]).unwrap();
        assert!(rx.recv().await.is_some());
    }
}
