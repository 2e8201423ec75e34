//! Request-id allocation and the correlation map.
//!
//! Each in-flight request owns one unbounded FIFO channel of raw field
//! sequences. The reader delivers into it; the request's consumer drains it.
//! Removing an entry drops the sender, which closes the consumer's stream.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::mpsc;

use crate::errors::{ClientError, Result};
use crate::protocol::REQUEST_ID_BASE;

pub type FieldsSender = mpsc::UnboundedSender<Vec<String>>;
pub type FieldsReceiver = mpsc::UnboundedReceiver<Vec<String>>;

struct RouterState {
    next_id: i32,
    channels: HashMap<i32, FieldsSender>,
    closed: bool,
}

/// Owned correlation map plus id counter, behind one lock.
///
/// The lock is only held for map operations and never across an await.
pub struct RequestRouter {
    state: Mutex<RouterState>,
}

impl Default for RequestRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestRouter {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RouterState {
                next_id: REQUEST_ID_BASE,
                channels: HashMap::new(),
                closed: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RouterState> {
        // A panic while holding the lock leaves the map consistent.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Hand out the next request id.
    pub fn next_request_id(&self) -> i32 {
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id = state.next_id.wrapping_add(1);
        id
    }

    /// Create the delivery channel for `request_id`.
    pub fn register(&self, request_id: i32) -> Result<FieldsReceiver> {
        let mut state = self.lock();
        if state.closed {
            return Err(ClientError::ConnectionClosed(
                "reader has stopped".into(),
            ));
        }
        if state.channels.contains_key(&request_id) {
            return Err(ClientError::Protocol(format!(
                "request id {request_id} is already registered"
            )));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        state.channels.insert(request_id, tx);
        Ok(rx)
    }

    /// Deliver a frame. Returns false if no request is waiting for it.
    pub fn deliver(&self, request_id: i32, fields: Vec<String>) -> bool {
        let mut state = self.lock();
        let Some(tx) = state.channels.get(&request_id) else {
            return false;
        };
        if tx.send(fields).is_ok() {
            return true;
        }
        // Consumer went away without retiring the id.
        state.channels.remove(&request_id);
        false
    }

    /// Retire `request_id`. Idempotent; returns whether an entry was removed.
    pub fn remove(&self, request_id: i32) -> bool {
        self.lock().channels.remove(&request_id).is_some()
    }

    pub fn contains(&self, request_id: i32) -> bool {
        self.lock().channels.contains_key(&request_id)
    }

    pub fn len(&self) -> usize {
        self.lock().channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close every channel and refuse further registrations.
    pub fn close_all(&self) {
        let mut state = self.lock();
        state.closed = true;
        let pending = state.channels.len();
        state.channels.clear();
        if pending > 0 {
            tracing::debug!(pending, "closed pending request channels");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

/// Retires a request id when dropped.
pub(crate) struct Registration<'a> {
    router: &'a RequestRouter,
    request_id: i32,
}

impl<'a> Registration<'a> {
    pub(crate) fn new(router: &'a RequestRouter, request_id: i32) -> Self {
        Self { router, request_id }
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.router.remove(self.request_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic_from_base() {
        let router = RequestRouter::new();
        assert_eq!(router.next_request_id(), 9000);
        assert_eq!(router.next_request_id(), 9001);
        assert_eq!(router.next_request_id(), 9002);
    }

    #[tokio::test]
    async fn deliver_in_order() {
        let router = RequestRouter::new();
        let mut rx = router.register(9000).unwrap();
        assert!(router.deliver(9000, vec!["a".into()]));
        assert!(router.deliver(9000, vec!["b".into()]));
        assert!(!router.deliver(9001, vec!["c".into()]));
        assert_eq!(rx.recv().await.unwrap(), vec!["a".to_string()]);
        assert_eq!(rx.recv().await.unwrap(), vec!["b".to_string()]);
    }

    #[test]
    fn duplicate_registration_is_protocol_error() {
        let router = RequestRouter::new();
        let _rx = router.register(9000).unwrap();
        assert!(matches!(router.register(9000), Err(ClientError::Protocol(_))));
    }

    #[tokio::test]
    async fn remove_is_idempotent_and_closes_channel() {
        let router = RequestRouter::new();
        let mut rx = router.register(9000).unwrap();
        assert!(router.remove(9000));
        assert!(!router.remove(9000));
        assert!(rx.recv().await.is_none());
        assert!(!router.deliver(9000, vec![]));
    }

    #[tokio::test]
    async fn close_all_rejects_new_registrations() {
        let router = RequestRouter::new();
        let mut rx = router.register(9000).unwrap();
        router.close_all();
        assert!(rx.recv().await.is_none());
        assert!(router.is_empty());
        assert!(matches!(
            router.register(9001),
            Err(ClientError::ConnectionClosed(_))
        ));
    }

    #[test]
    fn dropped_receiver_retires_on_delivery() {
        let router = RequestRouter::new();
        drop(router.register(9000).unwrap());
        assert!(!router.deliver(9000, vec![]));
        assert!(!router.contains(9000));
    }

    #[test]
    fn registration_guard_removes_entry() {
        let router = RequestRouter::new();
        let _rx = router.register(9000).unwrap();
        {
            let _guard = Registration::new(&router, 9000);
            assert!(router.contains(9000));
        }
        assert!(!router.contains(9000));
    }
}
