//! Fan-in multiplexer owning the outbound event stream.
//!
//! A [`StreamMux`] is the per-request session object: it holds the single
//! outbound sink, the outstanding-worker counter, and the "terminal record
//! sent" flag behind one mutex, so concurrent workers can never interleave
//! partial writes or race the terminal record. Whole records are the unit of
//! atomicity; each one is flushed as soon as it is written.

use crate::codec::encode_record;
use crate::error::StreamError;
use crate::models::EventRecord;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::debug;

/// Shared handle to one aggregation session.
pub struct StreamMux<W> {
    inner: Arc<Mutex<MuxInner<W>>>,
}

impl<W> Clone for StreamMux<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct MuxInner<W> {
    sink: W,
    outstanding: usize,
    finished: bool,
}

impl<W: AsyncWrite + Unpin + Send> StreamMux<W> {
    /// Opens a session over `sink` expecting `workers` completion
    /// notifications before the terminal record.
    pub fn open(sink: W, workers: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MuxInner {
                sink,
                outstanding: workers,
                finished: false,
            })),
        }
    }

    /// Forwards one record to the outbound sink and flushes it.
    ///
    /// Returns [`StreamError::Closed`] once the terminal record has been
    /// sent; nothing may follow it.
    pub async fn publish(&self, record: &EventRecord) -> Result<(), StreamError> {
        let mut inner = self.inner.lock().await;
        if inner.finished {
            return Err(StreamError::Closed);
        }

        let frame = encode_record(record)?;
        inner.sink.write_all(frame.as_bytes()).await?;
        inner.sink.flush().await?;
        Ok(())
    }

    /// Records one worker termination.
    ///
    /// The counter decrement and the terminal-record check are a single
    /// atomic transition: the last worker out emits `done` exactly once and
    /// closes the sink, however the completions race.
    pub async fn worker_done(&self) -> Result<(), StreamError> {
        let mut inner = self.inner.lock().await;
        inner.outstanding = inner.outstanding.saturating_sub(1);
        maybe_finish(&mut inner).await
    }

    /// Closes an already-drained session (zero outstanding workers).
    ///
    /// No-op while workers are still running, so the dispatcher can call it
    /// unconditionally after fan-out to cover the empty-target-list case.
    pub async fn finish_if_drained(&self) -> Result<(), StreamError> {
        let mut inner = self.inner.lock().await;
        maybe_finish(&mut inner).await
    }

    /// Returns true once the terminal record has been sent.
    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.finished
    }
}

async fn maybe_finish<W: AsyncWrite + Unpin + Send>(
    inner: &mut MuxInner<W>,
) -> Result<(), StreamError> {
    if inner.outstanding > 0 || inner.finished {
        return Ok(());
    }

    // Flip the flag before touching the sink: even if the final write fails
    // (client gone), the session is over and no retry may emit a second
    // terminal record.
    inner.finished = true;

    let frame = encode_record(&EventRecord::done())?;
    inner.sink.write_all(frame.as_bytes()).await?;
    inner.sink.flush().await?;
    inner.sink.shutdown().await?;
    debug!("all workers finished, stream closed");
    Ok(())
}
