//! Stream-until-cancelled requests.
//!
//! A [`Subscription`] is fed by a forwarding task that decodes the request's
//! frames and republishes them as records. Cancelling (through the caller's
//! token, [`Subscription::cancel`] or by dropping the subscription) sends one
//! cancel frame, keeps forwarding for the grace period, retires the request
//! id and closes the output.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::codec::message_id;
use crate::decoder::{decode_server_notice, ResponseDecode};
use crate::errors::{ClientError, Result};
use crate::protocol::incoming;
use crate::router::{FieldsReceiver, RequestRouter};
use crate::writer::WriteHandle;

/// What a forwarding task needs from the client.
#[derive(Clone)]
pub(crate) struct StreamContext {
    pub router: Arc<RequestRouter>,
    pub writer: WriteHandle,
    pub server_version: i32,
    pub grace: Duration,
}

/// Records of one streaming request.
///
/// Items are `Result<T>`: a decode failure or a server error for this
/// request arrives as an `Err` item, after which the stream ends.
pub struct Subscription<T> {
    request_id: i32,
    records: mpsc::UnboundedReceiver<Result<T>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl<T: ResponseDecode + Send + 'static> Subscription<T> {
    /// Start forwarding `frames` for `request_id`.
    ///
    /// `cancel_payload` is the encoded cancel message sent on cancellation.
    pub(crate) fn spawn(
        ctx: StreamContext,
        request_id: i32,
        frames: FieldsReceiver,
        cancel_payload: Bytes,
        parent: &CancellationToken,
    ) -> Self {
        let (tx, records) = mpsc::unbounded_channel();
        let cancel = parent.child_token();
        let forwarder = Forwarder::<T> {
            ctx,
            request_id,
            frames,
            out: tx,
            cancel_payload,
            _record: PhantomData,
        };
        let task = tokio::spawn(forwarder.run(cancel.clone()));
        Self {
            request_id,
            records,
            cancel,
            task: Some(task),
        }
    }
}

impl<T> Subscription<T> {
    pub fn request_id(&self) -> i32 {
        self.request_id
    }

    /// Next record; `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<Result<T>> {
        self.records.recv().await
    }

    /// Cancel and wait for the forwarding task to finish.
    ///
    /// Records forwarded during the grace period stay readable through
    /// [`next`](Self::next) until it returns `None`.
    pub async fn cancel(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(request_id = self.request_id, error = %e, "forwarder task failed");
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        // The forwarder still sends the cancel frame on its own.
        self.cancel.cancel();
    }
}

// ============================================================================
// Forwarder
// ============================================================================

enum Step<T> {
    Record(T),
    Skip,
    ServerError(ClientError),
    DecodeError(ClientError),
}

fn step<T: ResponseDecode>(fields: &[String], server_version: i32, request_id: i32) -> Step<T> {
    if matches!(message_id(fields), Ok(incoming::ERR_MSG)) {
        return match decode_server_notice(fields, server_version) {
            Ok(notice) if notice.is_warning() => {
                tracing::info!(request_id, code = notice.code, message = %notice.message, "server warning");
                Step::Skip
            }
            Ok(notice) => Step::ServerError(notice.into_error()),
            Err(e) => Step::DecodeError(e),
        };
    }
    match T::decode(fields, server_version) {
        Ok(record) => Step::Record(record),
        Err(e) => Step::DecodeError(e),
    }
}

enum Ending {
    /// Cancelled, consumer gone or undecodable frame: send the cancel frame.
    Cancelled,
    /// The server refused the request; nothing to cancel.
    Rejected,
    /// Delivery channel closed under us (connection gone).
    ChannelClosed,
}

struct Forwarder<T> {
    ctx: StreamContext,
    request_id: i32,
    frames: FieldsReceiver,
    out: mpsc::UnboundedSender<Result<T>>,
    cancel_payload: Bytes,
    _record: PhantomData<fn() -> T>,
}

impl<T: ResponseDecode + Send + 'static> Forwarder<T> {
    async fn run(mut self, cancel: CancellationToken) {
        let request_id = self.request_id;
        let ending = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Ending::Cancelled,
                next = self.frames.recv() => {
                    let Some(fields) = next else {
                        break Ending::ChannelClosed;
                    };
                    match step::<T>(&fields, self.ctx.server_version, request_id) {
                        Step::Record(record) => {
                            if self.out.send(Ok(record)).is_err() {
                                break Ending::Cancelled;
                            }
                        }
                        Step::Skip => {}
                        Step::ServerError(e) => {
                            let _ = self.out.send(Err(e));
                            break Ending::Rejected;
                        }
                        Step::DecodeError(e) => {
                            tracing::warn!(request_id, error = %e, "undecodable frame, cancelling");
                            let _ = self.out.send(Err(e));
                            break Ending::Cancelled;
                        }
                    }
                }
            }
        };

        match ending {
            Ending::ChannelClosed => {
                tracing::debug!(request_id, "delivery channel closed");
            }
            Ending::Rejected => {
                self.ctx.router.remove(request_id);
            }
            Ending::Cancelled => {
                tracing::debug!(request_id, "cancelling subscription");
                if let Err(e) = self.ctx.writer.write_frame(self.cancel_payload.clone()).await {
                    tracing::debug!(request_id, error = %e, "cancel frame not sent");
                }
                self.drain_grace().await;
                self.ctx.router.remove(request_id);
            }
        }
    }

    /// Keep forwarding whatever arrives before the grace deadline.
    async fn drain_grace(&mut self) {
        let deadline = Instant::now() + self.ctx.grace;
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => return,
                next = self.frames.recv() => {
                    let Some(fields) = next else { return };
                    let request_id = self.request_id;
                    match step::<T>(&fields, self.ctx.server_version, request_id) {
                        Step::Record(record) => {
                            let _ = self.out.send(Ok(record));
                        }
                        Step::Skip => {
                            tracing::debug!(request_id, "frame skipped during grace period");
                        }
                        Step::ServerError(e) => {
                            tracing::debug!(request_id, error = %e, "server error during grace period");
                        }
                        Step::DecodeError(e) => {
                            tracing::debug!(request_id, error = %e, "undecodable frame during grace period");
                        }
                    }
                }
            }
        }
    }
}
