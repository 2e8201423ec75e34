//! In-memory transport for tests and simulations.
//!
//! [`pair`] returns the client side ([`MemoryTransport`]) and a
//! [`MemoryPeer`] that plays the server: it injects inbound frames and
//! observes everything the client writes.

use bytes::Bytes;
use tokio::sync::mpsc;

use super::{FrameReader, FrameWriter, Transport};
use crate::codec::{encode_fields, frame, split_fields};
use crate::errors::{ClientError, Result};
use crate::protocol::{API_SIGN, HEADER_LEN};

/// One write observed by the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Written {
    /// Unframed bytes (the `API\0` prefix).
    Raw(Bytes),
    /// A frame payload, length header removed.
    Frame(Bytes),
}

/// Create a connected client/peer pair.
pub fn pair() -> (MemoryTransport, MemoryPeer) {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    (
        MemoryTransport {
            inbound: inbound_rx,
            outbound: outbound_tx,
        },
        MemoryPeer {
            inbound: Some(inbound_tx),
            outbound: outbound_rx,
        },
    )
}

/// Client side of an in-memory connection.
pub struct MemoryTransport {
    inbound: mpsc::UnboundedReceiver<Bytes>,
    outbound: mpsc::UnboundedSender<Written>,
}

impl Transport for MemoryTransport {
    type Reader = MemoryReader;
    type Writer = MemoryWriter;

    fn split(self) -> (MemoryReader, MemoryWriter) {
        (
            MemoryReader {
                inbound: self.inbound,
            },
            MemoryWriter {
                outbound: Some(self.outbound),
            },
        )
    }
}

pub struct MemoryReader {
    inbound: mpsc::UnboundedReceiver<Bytes>,
}

impl FrameReader for MemoryReader {
    async fn read_frame(&mut self) -> Result<Bytes> {
        self.inbound
            .recv()
            .await
            .ok_or_else(|| ClientError::ConnectionClosed("peer disconnected".into()))
    }
}

pub struct MemoryWriter {
    outbound: Option<mpsc::UnboundedSender<Written>>,
}

impl MemoryWriter {
    fn push(&self, written: Written) -> Result<()> {
        let tx = self
            .outbound
            .as_ref()
            .ok_or_else(|| ClientError::ConnectionClosed("write half is shut".into()))?;
        tx.send(written)
            .map_err(|_| ClientError::ConnectionClosed("peer disconnected".into()))
    }
}

impl FrameWriter for MemoryWriter {
    async fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.push(Written::Raw(Bytes::copy_from_slice(bytes)))
    }

    async fn write_frame(&mut self, payload: &[u8]) -> Result<()> {
        let framed = frame(payload)?.freeze();
        self.push(Written::Frame(framed.slice(HEADER_LEN..)))
    }

    async fn close(&mut self) -> Result<()> {
        self.outbound = None;
        Ok(())
    }
}

/// Server side of an in-memory connection.
pub struct MemoryPeer {
    inbound: Option<mpsc::UnboundedSender<Bytes>>,
    outbound: mpsc::UnboundedReceiver<Written>,
}

impl MemoryPeer {
    /// Deliver one frame payload to the client.
    pub fn send_frame(&self, payload: impl Into<Bytes>) -> Result<()> {
        let tx = self
            .inbound
            .as_ref()
            .ok_or_else(|| ClientError::ConnectionClosed("peer disconnected".into()))?;
        tx.send(payload.into())
            .map_err(|_| ClientError::ConnectionClosed("client reader is gone".into()))
    }

    /// Deliver a frame built from text fields.
    pub fn send_fields(&self, fields: &[&str]) -> Result<()> {
        self.send_frame(encode_fields(fields))
    }

    /// Next write from the client; `None` once the client closed its write side.
    pub async fn next_write(&mut self) -> Option<Written> {
        self.outbound.recv().await
    }

    /// Non-blocking variant of [`next_write`](Self::next_write).
    pub fn try_next_write(&mut self) -> Option<Written> {
        self.outbound.try_recv().ok()
    }

    /// Next framed write as fields, skipping raw writes.
    pub async fn next_fields(&mut self) -> Option<Vec<String>> {
        loop {
            match self.outbound.recv().await? {
                Written::Frame(payload) => return Some(split_fields(&payload)),
                Written::Raw(_) => continue,
            }
        }
    }

    /// Play the server side of the handshake.
    ///
    /// Expects the `API\0` prefix and the version announcement, answers with
    /// `[server_version, server_time]` and returns the START_API fields.
    pub async fn accept_handshake(
        &mut self,
        server_version: i32,
        server_time: &str,
    ) -> Result<Vec<String>> {
        match self.next_write().await {
            Some(Written::Raw(prefix)) if &prefix[..] == API_SIGN => {}
            other => {
                return Err(ClientError::Handshake(format!(
                    "expected API prefix, got {other:?}"
                )))
            }
        }
        match self.next_write().await {
            Some(Written::Frame(announce)) if announce.starts_with(b"v") => {}
            other => {
                return Err(ClientError::Handshake(format!(
                    "expected version announcement, got {other:?}"
                )))
            }
        }
        self.send_fields(&[&server_version.to_string(), server_time])?;
        self.next_fields()
            .await
            .ok_or_else(|| ClientError::Handshake("client closed before START_API".into()))
    }

    /// Drop the connection; the client's next read fails.
    pub fn disconnect(&mut self) {
        self.inbound = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_flow_both_ways() {
        let (transport, mut peer) = pair();
        let (mut reader, mut writer) = transport.split();

        peer.send_fields(&["9", "1", "1"]).unwrap();
        assert_eq!(split_fields(&reader.read_frame().await.unwrap()), vec!["9", "1", "1"]);

        writer.write_raw(b"API\0").await.unwrap();
        writer.write_frame(b"51\x001\x009000\0").await.unwrap();
        assert_eq!(peer.next_write().await, Some(Written::Raw(Bytes::from_static(b"API\0"))));
        assert_eq!(peer.next_fields().await.unwrap(), vec!["51", "1", "9000"]);
        assert!(peer.try_next_write().is_none());
    }

    #[tokio::test]
    async fn oversized_frame_rejected_before_delivery() {
        use crate::protocol::MAX_MSG_LEN;

        let (transport, mut peer) = pair();
        let (_reader, mut writer) = transport.split();

        let oversized = vec![b'a'; MAX_MSG_LEN + 1];
        assert!(matches!(
            writer.write_frame(&oversized).await,
            Err(ClientError::Encoding(_))
        ));
        assert!(peer.try_next_write().is_none());

        let largest = vec![b'a'; MAX_MSG_LEN];
        writer.write_frame(&largest).await.unwrap();
        match peer.next_write().await {
            Some(Written::Frame(payload)) => assert_eq!(payload.len(), MAX_MSG_LEN),
            other => panic!("unexpected write {:?}", other.map(|w| matches!(w, Written::Raw(_)))),
        }
    }

    #[tokio::test]
    async fn close_and_disconnect() {
        let (transport, mut peer) = pair();
        let (mut reader, mut writer) = transport.split();

        writer.close().await.unwrap();
        writer.close().await.unwrap();
        assert!(writer.write_frame(b"x\0").await.is_err());
        assert!(peer.next_write().await.is_none());

        peer.disconnect();
        assert!(matches!(
            reader.read_frame().await,
            Err(ClientError::ConnectionClosed(_))
        ));
        assert!(peer.send_fields(&["1"]).is_err());
    }
}
