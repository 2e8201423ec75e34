//! TCP transport.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use super::{FrameReader, FrameWriter, Transport};
use crate::codec;
use crate::errors::{ClientError, Result};

/// A connected TCP socket, not yet split.
pub struct TcpTransport {
    stream: TcpStream,
    peer: String,
}

impl TcpTransport {
    /// Dial `host:port`.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let addr = format!("{host}:{port}");
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| ClientError::Connection(format!("failed to connect to {addr}: {e}")))?;
        // Frames are small; do not let Nagle hold back a cancel.
        stream.set_nodelay(true)?;
        tracing::debug!(%addr, "tcp connected");
        Ok(Self { stream, peer: addr })
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }
}

impl Transport for TcpTransport {
    type Reader = TcpFrameReader;
    type Writer = TcpFrameWriter;

    fn split(self) -> (TcpFrameReader, TcpFrameWriter) {
        let (reader, writer) = self.stream.into_split();
        (
            TcpFrameReader {
                reader,
                read_buf: BytesMut::with_capacity(8192),
            },
            TcpFrameWriter {
                writer,
                closed: false,
            },
        )
    }
}

/// Read half. Accumulates socket reads until a whole frame is buffered.
pub struct TcpFrameReader {
    reader: OwnedReadHalf,
    read_buf: BytesMut,
}

impl FrameReader for TcpFrameReader {
    async fn read_frame(&mut self) -> Result<Bytes> {
        loop {
            if let Some(payload) = codec::try_unframe(&mut self.read_buf)? {
                return Ok(payload);
            }
            let n = self.reader.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return Err(ClientError::ConnectionClosed(if self.read_buf.is_empty() {
                    "server closed the connection".into()
                } else {
                    format!(
                        "server closed the connection mid-frame ({} bytes buffered)",
                        self.read_buf.len()
                    )
                }));
            }
        }
    }
}

/// Write half.
pub struct TcpFrameWriter {
    writer: OwnedWriteHalf,
    closed: bool,
}

impl FrameWriter for TcpFrameWriter {
    async fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        if self.closed {
            return Err(ClientError::ConnectionClosed("write half is shut".into()));
        }
        self.writer
            .write_all(bytes)
            .await
            .map_err(|e| ClientError::Connection(format!("failed to send: {e}")))
    }

    async fn write_frame(&mut self, payload: &[u8]) -> Result<()> {
        let framed = codec::frame(payload)?;
        self.write_raw(&framed).await
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        // The peer may already be gone; a failed FIN changes nothing.
        if let Err(e) = self.writer.shutdown().await {
            tracing::debug!(error = %e, "tcp shutdown failed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode_fields, split_fields};
    use tokio::net::TcpListener;

    /// Build a framed server response from NUL-terminated fields.
    fn build_framed_response(fields: &[&str]) -> Vec<u8> {
        codec::frame(&encode_fields(fields)).unwrap().to_vec()
    }

    #[tokio::test]
    async fn reads_frames_split_across_writes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut data = build_framed_response(&["9", "1", "100"]);
            data.extend(build_framed_response(&["15", "1", "DU123"]));
            // Dribble the bytes out to force partial reads.
            for chunk in data.chunks(3) {
                stream.write_all(chunk).await.unwrap();
                stream.flush().await.unwrap();
                tokio::task::yield_now().await;
            }
        });

        let transport = TcpTransport::connect("127.0.0.1", port).await.unwrap();
        let (mut reader, _writer) = transport.split();
        assert_eq!(split_fields(&reader.read_frame().await.unwrap()), vec!["9", "1", "100"]);
        assert_eq!(split_fields(&reader.read_frame().await.unwrap()), vec!["15", "1", "DU123"]);
        assert!(matches!(
            reader.read_frame().await,
            Err(ClientError::ConnectionClosed(_))
        ));
    }

    #[tokio::test]
    async fn writes_raw_then_framed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            stream.read_to_end(&mut received).await.unwrap();
            received
        });

        let transport = TcpTransport::connect("127.0.0.1", port).await.unwrap();
        assert_eq!(transport.peer(), format!("127.0.0.1:{port}"));
        let (_reader, mut writer) = transport.split();
        writer.write_raw(b"API\0").await.unwrap();
        writer.write_frame(b"v100..176").await.unwrap();
        writer.close().await.unwrap();
        writer.close().await.unwrap();
        assert!(matches!(
            writer.write_frame(b"x").await,
            Err(ClientError::ConnectionClosed(_))
        ));

        let received = handle.await.unwrap();
        assert_eq!(&received[..4], b"API\0");
        assert_eq!(&received[4..8], &9u32.to_be_bytes());
        assert_eq!(&received[8..], b"v100..176");
    }

    #[tokio::test]
    async fn connect_refused() {
        // Port 1 is almost certainly not listening
        let result = TcpTransport::connect("127.0.0.1", 1).await;
        assert!(matches!(result, Err(ClientError::Connection(_))));
    }
}
