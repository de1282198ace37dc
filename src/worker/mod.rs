//! Per-target analysis worker.
//!
//! A worker wraps one external producer for one target: it pulls raw
//! chunks, decodes them into records, tags each record with its target, and
//! forwards them to the multiplexer. Every terminal path (clean end of
//! sequence, producer failure, interruption) reports completion to the
//! multiplexer exactly once, and a failure degrades to a single tagged
//! `error` record rather than propagating upward.

use crate::codec::SseDecoder;
use crate::error::ProducerError;
use crate::models::{EventRecord, WorkerState};
use crate::mux::StreamMux;
use crate::producer::ProducerFactory;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Drives one target's producer to a terminal state.
pub struct Worker<W> {
    target: String,
    mux: StreamMux<W>,
    cancel: CancellationToken,
}

impl<W: AsyncWrite + Unpin + Send> Worker<W> {
    /// Creates a worker for `target` publishing into `mux`.
    pub fn new(target: String, mux: StreamMux<W>, cancel: CancellationToken) -> Self {
        Self {
            target,
            mux,
            cancel,
        }
    }

    /// Runs the decode loop and reports completion exactly once.
    ///
    /// The completion notification fires on every terminal path, and no
    /// record is ever emitted after it.
    pub async fn run(self, factory: &dyn ProducerFactory) -> WorkerState {
        let state = self.drive(factory).await;

        if let Err(err) = self.mux.worker_done().await {
            warn!(
                "completion notification for {} not delivered: {}",
                self.target, err
            );
        }

        state
    }

    async fn drive(&self, factory: &dyn ProducerFactory) -> WorkerState {
        // Biased toward cancellation so an interrupt always wins over
        // further upstream input.
        let mut producer = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!("worker for {} interrupted before start", self.target);
                return WorkerState::Failed;
            }
            opened = factory.open(&self.target) => match opened {
                Ok(producer) => producer,
                Err(err) => return self.fail(err).await,
            },
        };

        let mut decoder = SseDecoder::new();
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("worker for {} interrupted", self.target);
                    return WorkerState::Failed;
                }
                chunk = producer.next_chunk() => match chunk {
                    Ok(Some(bytes)) => {
                        for mut record in decoder.feed(&bytes) {
                            record.target = Some(self.target.clone());
                            if let Err(err) = self.mux.publish(&record).await {
                                // Sink gone: nobody is listening, stop pulling.
                                debug!(
                                    "publish for {} failed, stopping: {}",
                                    self.target, err
                                );
                                return WorkerState::Failed;
                            }
                        }
                    }
                    Ok(None) => return WorkerState::Completed,
                    Err(err) => return self.fail(err).await,
                },
            }
        }
    }

    /// Converts a producer failure into one tagged error record.
    async fn fail(&self, err: ProducerError) -> WorkerState {
        let record = EventRecord::error(
            &self.target,
            format!("Failed to analyze {}: {}", self.target, err),
        );

        if let Err(publish_err) = self.mux.publish(&record).await {
            warn!(
                "error record for {} not delivered: {}",
                self.target, publish_err
            );
        }

        WorkerState::Failed
    }
}
