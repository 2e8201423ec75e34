//! Writer task.
//!
//! The write half of the transport is owned by one task that drains a
//! command queue, so frames from concurrent requests never interleave and
//! the client does not need to be generic over the transport.

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::errors::{ClientError, Result};
use crate::transport::FrameWriter;

enum WriteCommand {
    Raw(Bytes, oneshot::Sender<Result<()>>),
    Frame(Bytes, oneshot::Sender<Result<()>>),
    Close(oneshot::Sender<Result<()>>),
}

/// Cloneable handle to the writer task.
#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::UnboundedSender<WriteCommand>,
}

impl WriteHandle {
    async fn submit(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<()>>) -> WriteCommand,
    ) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(make(done_tx))
            .map_err(|_| ClientError::ConnectionClosed("writer has stopped".into()))?;
        done_rx
            .await
            .map_err(|_| ClientError::ConnectionClosed("writer has stopped".into()))?
    }

    pub async fn write_raw(&self, bytes: Bytes) -> Result<()> {
        self.submit(|done| WriteCommand::Raw(bytes, done)).await
    }

    pub async fn write_frame(&self, payload: Bytes) -> Result<()> {
        self.submit(|done| WriteCommand::Frame(payload, done)).await
    }

    /// Shut the write half. Later writes fail with `ConnectionClosed`.
    pub async fn close(&self) -> Result<()> {
        match self.submit(WriteCommand::Close).await {
            // Already gone counts as closed.
            Err(ClientError::ConnectionClosed(_)) => Ok(()),
            other => other,
        }
    }
}

/// Start the writer task over `writer`.
pub fn spawn_writer<W: FrameWriter>(writer: W) -> (WriteHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(run(writer, rx));
    (WriteHandle { tx }, handle)
}

async fn run<W: FrameWriter>(mut writer: W, mut rx: mpsc::UnboundedReceiver<WriteCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WriteCommand::Raw(bytes, done) => {
                let _ = done.send(writer.write_raw(&bytes).await);
            }
            WriteCommand::Frame(payload, done) => {
                let _ = done.send(writer.write_frame(&payload).await);
            }
            WriteCommand::Close(done) => {
                let _ = done.send(writer.close().await);
                break;
            }
        }
    }
    // Every handle dropped or close requested.
    if let Err(e) = writer.close().await {
        tracing::debug!(error = %e, "writer close failed");
    }
    tracing::debug!("writer task stopped");
}
