//! Frame transports.
//!
//! A transport is split once, at connect time, into a read half owned by the
//! reader task and a write half owned by the writer task. Neither half is
//! ever used from two tasks at once.
//!
//! - [`tcp`] -- TCP socket to TWS / IB Gateway
//! - [`memory`] -- channel-backed fake with a scriptable server side
//! - [`recording`] -- wrapper that logs every byte crossing another transport

use std::future::Future;

use bytes::Bytes;

use crate::errors::Result;

pub mod memory;
pub mod recording;
pub mod tcp;

pub use memory::{MemoryPeer, MemoryTransport, Written};
pub use recording::{Direction, RecordKind, Recorded, RecordingTransport, TrafficLog};
pub use tcp::TcpTransport;

/// Read half: yields whole frame payloads.
pub trait FrameReader: Send + 'static {
    /// Wait for the next complete frame and return its payload.
    ///
    /// Never returns partial data. End of stream is `ConnectionClosed`.
    fn read_frame(&mut self) -> impl Future<Output = Result<Bytes>> + Send;
}

/// Write half.
pub trait FrameWriter: Send + 'static {
    /// Write bytes as-is, without a length header.
    fn write_raw(&mut self, bytes: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Write one payload with its length header.
    fn write_frame(&mut self, payload: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Shut the write side. Calling it again is a no-op.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// A bidirectional frame channel to the server.
pub trait Transport: Send + 'static {
    type Reader: FrameReader;
    type Writer: FrameWriter;

    fn split(self) -> (Self::Reader, Self::Writer);
}
