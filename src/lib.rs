//! # pricewatch
//!
//! Concurrent competitor-analysis event-stream aggregator.
//!
//! Given a list of target URLs, the aggregator launches one independent
//! analysis task per target against an external analysis engine, decodes
//! each task's live SSE output, tags every record with its originating
//! target, and merges all per-task sequences into a single outbound
//! `data: <json>\n\n` stream. Per-target failures degrade to tagged `error`
//! records; exactly one terminal `done` record closes the stream once every
//! task has finished.
//!
//! ```text
//! targets ──► Dispatcher ──► Worker ──┐
//!                       ──► Worker ──┼──► StreamMux ──► outbound sink
//!                       ──► Worker ──┘
//! ```

pub mod cli;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod models;
pub mod mux;
pub mod producer;
pub mod worker;

pub use dispatch::{parse_targets, AnalysisStream, Dispatcher};
pub use error::{ProducerError, StreamError};
pub use models::{EventKind, EventRecord, RunSummary, WorkerState};
pub use producer::{ChunkProducer, HttpProducerFactory, ProducerFactory};
