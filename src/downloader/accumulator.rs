//! Incremental consumption of a response body

use crate::utils::error::MediagrabError;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// How a drain ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The source reported end of stream
    Exhausted,
    /// The token fired before the source was exhausted
    Cancelled,
}

/// Buffers the chunks of one transfer in receipt order
#[derive(Debug, Default)]
pub struct ByteAccumulator {
    chunks: Vec<Bytes>,
    received: u64,
}

impl ByteAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes_received(&self) -> u64 {
        self.received
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Pull chunks from `source` until it ends or `cancel` fires.
    ///
    /// `on_progress` is called with the cumulative byte count after every
    /// appended chunk. The token is checked before each read, raced against
    /// the pending read, and checked again once the read resumes; the task
    /// yields to the runtime between chunks. With `idle_timeout` set, a read
    /// that produces nothing for that long fails the drain.
    pub async fn drain<S, F>(
        &mut self,
        mut source: S,
        cancel: &CancellationToken,
        idle_timeout: Option<Duration>,
        mut on_progress: F,
    ) -> Result<DrainOutcome, MediagrabError>
    where
        S: Stream<Item = std::io::Result<Bytes>> + Unpin,
        F: FnMut(u64),
    {
        loop {
            if cancel.is_cancelled() {
                return Ok(DrainOutcome::Cancelled);
            }

            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(DrainOutcome::Cancelled),
                next = next_chunk(&mut source, idle_timeout) => next?,
            };

            if cancel.is_cancelled() {
                return Ok(DrainOutcome::Cancelled);
            }

            let Some(chunk) = next else {
                debug!(
                    "Stream exhausted after {} chunks ({} bytes)",
                    self.chunks.len(),
                    self.received
                );
                return Ok(DrainOutcome::Exhausted);
            };

            if !chunk.is_empty() {
                self.received += chunk.len() as u64;
                self.chunks.push(chunk);
                on_progress(self.received);
            }

            tokio::task::yield_now().await;
        }
    }

    /// Concatenate every chunk in receipt order, consuming the buffer.
    pub fn into_payload(self) -> Bytes {
        match self.chunks.len() {
            0 => Bytes::new(),
            1 => self.chunks.into_iter().next().unwrap_or_default(),
            _ => {
                let mut payload = BytesMut::with_capacity(self.received as usize);
                for chunk in &self.chunks {
                    payload.extend_from_slice(chunk);
                }
                payload.freeze()
            }
        }
    }
}

async fn next_chunk<S>(
    source: &mut S,
    idle_timeout: Option<Duration>,
) -> Result<Option<Bytes>, MediagrabError>
where
    S: Stream<Item = std::io::Result<Bytes>> + Unpin,
{
    let next = match idle_timeout {
        Some(limit) => timeout(limit, source.next()).await.map_err(|_| {
            MediagrabError::Transfer(format!("No data received for {}s", limit.as_secs()))
        })?,
        None => source.next().await,
    };
    next.transpose()
        .map_err(|e| MediagrabError::Transfer(format!("Stream read failed: {}", e)))
}
