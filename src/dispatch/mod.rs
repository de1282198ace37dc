//! Request lifecycle: validation, fan-out, and cancellation.
//!
//! The dispatcher validates the target list, announces the request with an
//! initial `info` record, spawns one worker task per target against a shared
//! multiplexer session, and owns the cancellation signal. Duplicates in the
//! target list are deliberate: each occurrence gets its own independent
//! worker.

use crate::error::StreamError;
use crate::models::{EventRecord, RunSummary, WorkerState};
use crate::mux::StreamMux;
use crate::producer::ProducerFactory;
use crate::worker::Worker;
use futures::future;
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{info, warn};

/// In-flight buffer between the aggregation task and a stream handle.
const STREAM_BUFFER: usize = 64 * 1024;

/// Parses a request body of the form `{"targets": [...]}`.
///
/// Missing, non-array, or non-string input is a client error reported
/// before anything starts. An empty array is valid and yields a stream that
/// completes immediately.
pub fn parse_targets(body: &str) -> Result<Vec<String>, StreamError> {
    let value: Value = serde_json::from_str(body).map_err(|_| StreamError::InvalidTargets)?;

    let list = value
        .get("targets")
        .and_then(Value::as_array)
        .ok_or(StreamError::InvalidTargets)?;

    list.iter()
        .map(|entry| {
            entry
                .as_str()
                .map(str::to_string)
                .ok_or(StreamError::InvalidTargets)
        })
        .collect()
}

/// Fans one analysis request out into per-target workers.
pub struct Dispatcher {
    factory: Arc<dyn ProducerFactory>,
}

impl Dispatcher {
    /// Creates a dispatcher over the given producer factory.
    pub fn new(factory: Arc<dyn ProducerFactory>) -> Self {
        Self { factory }
    }

    /// Runs one aggregation to completion, writing the framed stream to
    /// `sink`.
    ///
    /// Per-target failures degrade to tagged `error` records and never fail
    /// the run; the returned summary carries one terminal outcome per
    /// target occurrence.
    pub async fn run<W>(
        &self,
        targets: Vec<String>,
        sink: W,
        cancel: CancellationToken,
    ) -> Result<RunSummary, StreamError>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        info!("starting analysis for {} targets", targets.len());
        let mux = StreamMux::open(sink, targets.len());

        // The acceptance notice goes out before any worker can produce.
        mux.publish(&EventRecord::info(format!(
            "Initiating parallel analysis for {} targets...",
            targets.len()
        )))
        .await?;

        let handles: Vec<JoinHandle<WorkerState>> = targets
            .iter()
            .map(|target| {
                let worker = Worker::new(target.clone(), mux.clone(), cancel.child_token());
                let factory = Arc::clone(&self.factory);
                tokio::spawn(async move { worker.run(factory.as_ref()).await })
            })
            .collect();

        // Empty target list: nothing will call worker_done, close now.
        mux.finish_if_drained().await?;

        let mut summary = RunSummary::new(targets.len());
        for joined in future::join_all(handles).await {
            match joined {
                Ok(state) => summary.record(state),
                Err(err) => {
                    warn!("worker task aborted: {}", err);
                    summary.record(WorkerState::Failed);
                }
            }
        }

        info!(
            "analysis finished: {} completed, {} failed",
            summary.completed, summary.failed
        );
        Ok(summary)
    }

    /// Starts an aggregation in the background and returns a live handle to
    /// the outbound stream.
    pub fn start(&self, targets: Vec<String>) -> AnalysisStream {
        let (reader, writer) = tokio::io::duplex(STREAM_BUFFER);
        let cancel = CancellationToken::new();

        let dispatcher = Self {
            factory: Arc::clone(&self.factory),
        };
        let task = tokio::spawn({
            let cancel = cancel.clone();
            async move { dispatcher.run(targets, writer, cancel).await }
        });

        AnalysisStream {
            reader,
            guard: cancel.clone().drop_guard(),
            cancel,
            task,
        }
    }
}

/// Live handle to one outbound event stream.
///
/// Reading yields the framed records as the workers produce them; end of
/// stream follows the terminal record. Dropping the handle is a client
/// disconnect: every still-running worker is told to stop pulling from its
/// producer.
pub struct AnalysisStream {
    reader: DuplexStream,
    cancel: CancellationToken,
    guard: DropGuard,
    task: JoinHandle<Result<RunSummary, StreamError>>,
}

impl AnalysisStream {
    /// Signals every worker to stop without dropping the handle.
    pub fn abort(&self) {
        self.cancel.cancel();
    }

    /// Waits for the aggregation to finish and returns its summary.
    ///
    /// Call after reading the stream to end of input; the writer side
    /// blocks once the in-flight buffer fills up.
    pub async fn summary(self) -> Result<RunSummary, StreamError> {
        let AnalysisStream { task, guard, .. } = self;
        let result = match task.await {
            Ok(result) => result,
            Err(err) => {
                warn!("aggregation task aborted: {}", err);
                Err(StreamError::Closed)
            }
        };
        drop(guard);
        result
    }
}

impl AsyncRead for AnalysisStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.reader).poll_read(cx, buf)
    }
}
