//! Long-lived chunked slide stream.
//!
//! The producer writes one JSON document per chunk, each terminated by a
//! blank line (`\r\n\r\n`). Network reads do not line up with chunk
//! boundaries, so bytes are buffered until a full delimiter is seen.

use super::{ConnectionStrategy, StrategyKind};
use crate::producer::ProducerClient;
use crate::types::{BridgeError, SlideStatus};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use std::collections::VecDeque;
use tracing::{debug, trace, warn};

const CHUNK_DELIMITER: &[u8] = b"\r\n\r\n";

/// Upper bound on buffered bytes without a delimiter
pub const MAX_BUFFERED_BYTES: usize = 10 * 1024 * 1024;

/// Incremental splitter for the blank-line-delimited stream
#[derive(Debug)]
pub struct ChunkDecoder {
    buf: Vec<u8>,
    max: usize,
    /// Bytes of `buf` already known not to start a delimiter
    scanned: usize,
}

impl Default for ChunkDecoder {
    fn default() -> Self {
        Self::new(MAX_BUFFERED_BYTES)
    }
}

impl ChunkDecoder {
    pub fn new(max: usize) -> Self {
        Self { buf: Vec::new(), max, scanned: 0 }
    }

    /// Feed raw bytes; returns one result per complete chunk.
    ///
    /// A chunk that is not valid JSON yields `Parse` and decoding carries on.
    /// If the remainder grows past the cap it is discarded and
    /// `BufferOverflow` is appended.
    pub fn push(&mut self, data: &[u8]) -> Vec<Result<SlideStatus, BridgeError>> {
        self.buf.extend_from_slice(data);

        let mut out = Vec::new();
        while let Some(pos) = find_delimiter(&self.buf, self.scanned) {
            self.scanned = 0;
            let chunk: Vec<u8> = self.buf.drain(..pos + CHUNK_DELIMITER.len()).collect();
            let body = &chunk[..pos];
            if body.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            out.push(serde_json::from_slice::<SlideStatus>(body).map_err(BridgeError::from));
        }

        // A delimiter may straddle this read and the next
        self.scanned = self.buf.len().saturating_sub(CHUNK_DELIMITER.len() - 1);

        if self.buf.len() > self.max {
            warn!(buffered = self.buf.len(), "Stream buffer overflow, discarding");
            self.clear();
            out.push(Err(BridgeError::BufferOverflow { limit: self.max }));
        }

        out
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.scanned = 0;
    }
}

/// Position of the first delimiter at or after `from`
fn find_delimiter(buf: &[u8], from: usize) -> Option<usize> {
    buf.get(from..)?
        .windows(CHUNK_DELIMITER.len())
        .position(|w| w == CHUNK_DELIMITER)
        .map(|pos| from + pos)
}

/// Reads slide updates from `/v1/status/slide?chunked=true`
pub struct ChunkedStreamStrategy {
    client: ProducerClient,
    stream: Option<BoxStream<'static, reqwest::Result<Bytes>>>,
    decoder: ChunkDecoder,
    ready: VecDeque<Result<SlideStatus, BridgeError>>,
}

impl ChunkedStreamStrategy {
    pub fn new(client: ProducerClient) -> Self {
        Self {
            client,
            stream: None,
            decoder: ChunkDecoder::default(),
            ready: VecDeque::new(),
        }
    }
}

#[async_trait]
impl ConnectionStrategy for ChunkedStreamStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Chunked
    }

    async fn connect(&mut self) -> Result<(), BridgeError> {
        self.close().await;
        let res = self.client.open_slide_stream().await?;
        debug!("Chunked stream open");
        self.stream = Some(res.bytes_stream().boxed());
        Ok(())
    }

    async fn next_slide(&mut self) -> Result<SlideStatus, BridgeError> {
        loop {
            if let Some(item) = self.ready.pop_front() {
                return item;
            }

            let Some(stream) = self.stream.as_mut() else {
                return Err(BridgeError::Transport("Not connected".to_string()));
            };

            match stream.next().await {
                Some(Ok(bytes)) => {
                    trace!(len = bytes.len(), "Stream bytes");
                    self.ready.extend(self.decoder.push(&bytes));
                }
                Some(Err(e)) => {
                    self.stream = None;
                    return Err(BridgeError::Transport(format!("Stream error: {}", e)));
                }
                None => {
                    self.stream = None;
                    return Err(BridgeError::Transport("Stream ended unexpectedly".to_string()));
                }
            }
        }
    }

    async fn close(&mut self) {
        self.stream = None;
        self.decoder.clear();
        self.ready.clear();
    }

    fn describe(&self) -> String {
        format!("Streaming from {}", self.client.base_url().trim_start_matches("http://"))
    }
}
