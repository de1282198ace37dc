//! Upstream producer boundary.
//!
//! The analysis engine is an external collaborator: given one target URL it
//! produces a live byte stream of newline-delimited event records. This
//! module defines the trait pair the aggregator consumes (a factory that
//! opens one producer per target, and the producer itself) plus the
//! production HTTP implementation backed by reqwest.

use crate::error::ProducerError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// A live source of raw event-stream chunks for one target.
///
/// The producer handle is exclusively owned by its worker; dropping it
/// releases the underlying connection.
#[async_trait]
pub trait ChunkProducer: Send {
    /// Pulls the next raw chunk. `Ok(None)` signals a clean end of sequence.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, ProducerError>;
}

/// Opens one [`ChunkProducer`] per target.
///
/// Either the factory call or the returned producer may fail; the worker
/// converts both into the same per-target isolation behavior.
#[async_trait]
pub trait ProducerFactory: Send + Sync {
    /// Opens a producer for `target`. May fail before any chunk is read.
    async fn open(&self, target: &str) -> Result<Box<dyn ChunkProducer>, ProducerError>;
}

/// Production factory that streams analysis events over HTTP.
///
/// Each target becomes one `POST {engine_url}` with body `{"url": target}`;
/// the response body is consumed chunk-by-chunk as it arrives. Only the
/// connect phase is bounded by a timeout; an analysis stream itself may run
/// for as long as the engine needs.
pub struct HttpProducerFactory {
    client: reqwest::Client,
    engine_url: String,
}

impl HttpProducerFactory {
    /// Creates a factory for the given engine endpoint.
    pub fn new(engine_url: String, connect_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { client, engine_url }
    }
}

#[async_trait]
impl ProducerFactory for HttpProducerFactory {
    async fn open(&self, target: &str) -> Result<Box<dyn ChunkProducer>, ProducerError> {
        debug!("opening analysis stream for {}", target);

        let response = self
            .client
            .post(&self.engine_url)
            .json(&json!({ "url": target }))
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    ProducerError::Connect {
                        url: self.engine_url.clone(),
                        reason: e.to_string(),
                    }
                } else {
                    ProducerError::Read(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(ProducerError::Status {
                status: response.status().as_u16(),
            });
        }

        Ok(Box::new(HttpProducer {
            body: response.bytes_stream().boxed(),
        }))
    }
}

/// Producer over one live HTTP response body.
struct HttpProducer {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
}

#[async_trait]
impl ChunkProducer for HttpProducer {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, ProducerError> {
        match self.body.next().await {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(err)) => Err(ProducerError::Read(err.to_string())),
            None => Ok(None),
        }
    }
}
