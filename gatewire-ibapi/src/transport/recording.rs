//! Traffic recording.
//!
//! Wraps another transport and keeps a copy of every raw write, outbound
//! frame and inbound frame in a shared [`TrafficLog`].

use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;

use super::{FrameReader, FrameWriter, Transport};
use crate::codec::split_fields;
use crate::errors::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Raw,
    Frame,
}

/// One recorded transfer. Frames are stored without the length header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub direction: Direction,
    pub kind: RecordKind,
    pub bytes: Bytes,
}

impl Recorded {
    pub fn fields(&self) -> Vec<String> {
        split_fields(&self.bytes)
    }
}

/// Shared, append-only log of recorded traffic.
#[derive(Debug, Clone, Default)]
pub struct TrafficLog {
    entries: Arc<Mutex<Vec<Recorded>>>,
}

impl TrafficLog {
    fn lock(&self) -> MutexGuard<'_, Vec<Recorded>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, direction: Direction, kind: RecordKind, bytes: Bytes) {
        tracing::trace!(?direction, ?kind, len = bytes.len(), "traffic");
        self.lock().push(Recorded {
            direction,
            kind,
            bytes,
        });
    }

    pub fn snapshot(&self) -> Vec<Recorded> {
        self.lock().clone()
    }

    /// Field views of every frame travelling in `direction`.
    pub fn frames(&self, direction: Direction) -> Vec<Vec<String>> {
        self.lock()
            .iter()
            .filter(|r| r.direction == direction && r.kind == RecordKind::Frame)
            .map(Recorded::fields)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

/// A transport that records what passes through `T`.
pub struct RecordingTransport<T> {
    inner: T,
    log: TrafficLog,
}

impl<T: Transport> RecordingTransport<T> {
    pub fn new(inner: T) -> (Self, TrafficLog) {
        let log = TrafficLog::default();
        (
            Self {
                inner,
                log: log.clone(),
            },
            log,
        )
    }
}

impl<T: Transport> Transport for RecordingTransport<T> {
    type Reader = RecordingReader<T::Reader>;
    type Writer = RecordingWriter<T::Writer>;

    fn split(self) -> (Self::Reader, Self::Writer) {
        let (reader, writer) = self.inner.split();
        (
            RecordingReader {
                inner: reader,
                log: self.log.clone(),
            },
            RecordingWriter {
                inner: writer,
                log: self.log,
            },
        )
    }
}

pub struct RecordingReader<R> {
    inner: R,
    log: TrafficLog,
}

impl<R: FrameReader> FrameReader for RecordingReader<R> {
    async fn read_frame(&mut self) -> Result<Bytes> {
        let payload = self.inner.read_frame().await?;
        self.log
            .push(Direction::Inbound, RecordKind::Frame, payload.clone());
        Ok(payload)
    }
}

pub struct RecordingWriter<W> {
    inner: W,
    log: TrafficLog,
}

impl<W: FrameWriter> FrameWriter for RecordingWriter<W> {
    async fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_raw(bytes).await?;
        self.log.push(
            Direction::Outbound,
            RecordKind::Raw,
            Bytes::copy_from_slice(bytes),
        );
        Ok(())
    }

    async fn write_frame(&mut self, payload: &[u8]) -> Result<()> {
        self.inner.write_frame(payload).await?;
        self.log.push(
            Direction::Outbound,
            RecordKind::Frame,
            Bytes::copy_from_slice(payload),
        );
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.close().await
    }
}
