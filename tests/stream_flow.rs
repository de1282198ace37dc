//! Integration tests for the end-to-end aggregation flow.

use async_trait::async_trait;
use bytes::Bytes;
use pricewatch::codec::SseDecoder;
use pricewatch::producer::{ChunkProducer, ProducerFactory};
use pricewatch::{
    parse_targets, Dispatcher, EventKind, EventRecord, ProducerError, RunSummary, StreamError,
};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex as StdMutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWrite};
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Test doubles: scripted producers and an inspectable sink
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum Step {
    Chunk(String),
    Sleep(Duration),
    Fail(String),
}

fn progress(message: &str) -> Step {
    Step::Chunk(format!(
        "data: {{\"type\":\"progress\",\"message\":\"{}\"}}\n\n",
        message
    ))
}

fn final_result(payload: &str) -> Step {
    Step::Chunk(format!(
        "data: {{\"type\":\"progress\",\"final_result\":{}}}\n\n",
        payload
    ))
}

struct ScriptedProducer {
    steps: VecDeque<Step>,
}

#[async_trait]
impl ChunkProducer for ScriptedProducer {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, ProducerError> {
        loop {
            match self.steps.pop_front() {
                Some(Step::Chunk(data)) => {
                    tokio::task::yield_now().await;
                    return Ok(Some(Bytes::from(data.into_bytes())));
                }
                Some(Step::Sleep(duration)) => tokio::time::sleep(duration).await,
                Some(Step::Fail(reason)) => return Err(ProducerError::Read(reason)),
                None => return Ok(None),
            }
        }
    }
}

struct ScriptedFactory {
    scripts: HashMap<String, Vec<Step>>,
}

impl ScriptedFactory {
    fn new(scripts: HashMap<String, Vec<Step>>) -> Arc<Self> {
        Arc::new(Self { scripts })
    }
}

#[async_trait]
impl ProducerFactory for ScriptedFactory {
    async fn open(&self, target: &str) -> Result<Box<dyn ChunkProducer>, ProducerError> {
        let steps = self.scripts.get(target).cloned().unwrap_or_default();
        Ok(Box::new(ScriptedProducer {
            steps: steps.into(),
        }))
    }
}

/// Sink that stays inspectable after the dispatcher is done with it.
#[derive(Clone, Default)]
struct SharedBuf(Arc<StdMutex<Vec<u8>>>);

impl SharedBuf {
    fn records(&self) -> Vec<EventRecord> {
        SseDecoder::new().feed(&self.0.lock().unwrap().clone())
    }
}

impl AsyncWrite for SharedBuf {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn url(name: &str) -> String {
    format!("https://{}.example", name)
}

// ---------------------------------------------------------------------------
// Stream handle: read the framed feed and collect the summary
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stream_handle_delivers_tagged_records_and_summary() {
    let mut scripts = HashMap::new();
    scripts.insert(
        url("shop-a"),
        vec![progress("scanning"), final_result("{\"price\": 12.5}")],
    );
    scripts.insert(url("shop-b"), vec![progress("crawling")]);

    let dispatcher = Dispatcher::new(ScriptedFactory::new(scripts));
    let mut stream = dispatcher.start(vec![url("shop-a"), url("shop-b")]);

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let records = SseDecoder::new().feed(&raw);

    assert_eq!(records.first().unwrap().kind, EventKind::Info);
    assert!(records.last().unwrap().is_terminal());
    assert_eq!(records.iter().filter(|r| r.is_terminal()).count(), 1);

    // Every worker record is tagged with one of the submitted targets.
    for record in &records[1..records.len() - 1] {
        let tag = record.target.as_deref().unwrap();
        assert!(tag == url("shop-a") || tag == url("shop-b"));
    }

    let summary: RunSummary = stream.summary().await.unwrap();
    assert_eq!(summary.targets, 2);
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn empty_request_body_yields_info_then_done() {
    let targets = parse_targets(r#"{"targets": []}"#).unwrap();
    let dispatcher = Dispatcher::new(ScriptedFactory::new(HashMap::new()));

    let mut stream = dispatcher.start(targets);
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();

    let records = SseDecoder::new().feed(&raw);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].kind, EventKind::Info);
    assert_eq!(
        records[0].message.as_deref(),
        Some("Initiating parallel analysis for 0 targets...")
    );
    assert!(records[1].is_terminal());

    let summary = stream.summary().await.unwrap();
    assert_eq!(summary.targets, 0);
}

#[tokio::test]
async fn malformed_request_body_fails_before_streaming() {
    let err = parse_targets(r#"{"targets": 7}"#).unwrap_err();
    assert!(matches!(err, StreamError::InvalidTargets));
    assert_eq!(err.to_string(), "targets must be an array of strings");
}

// ---------------------------------------------------------------------------
// Partial failure and ordering properties
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fault_in_one_target_does_not_suppress_others() {
    let mut scripts = HashMap::new();
    scripts.insert(
        url("healthy-1"),
        vec![progress("step 1"), progress("step 2")],
    );
    scripts.insert(url("broken"), vec![Step::Fail("socket closed".into())]);
    scripts.insert(url("healthy-2"), vec![progress("step 1")]);

    let targets = vec![url("healthy-1"), url("broken"), url("healthy-2")];
    let sink = SharedBuf::default();
    let dispatcher = Dispatcher::new(ScriptedFactory::new(scripts));
    let summary = dispatcher
        .run(targets, sink.clone(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.completed, 2);
    assert_eq!(summary.failed, 1);

    let records = sink.records();
    let errors: Vec<_> = records
        .iter()
        .filter(|r| r.kind == EventKind::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].target.as_deref(), Some(url("broken").as_str()));

    // Healthy targets still deliver all their records, in order.
    for (healthy, expected) in [
        (url("healthy-1"), vec!["step 1", "step 2"]),
        (url("healthy-2"), vec!["step 1"]),
    ] {
        let messages: Vec<_> = records
            .iter()
            .filter(|r| r.target.as_deref() == Some(healthy.as_str()))
            .map(|r| r.message.clone().unwrap())
            .collect();
        assert_eq!(messages, expected);
    }

    assert!(records.last().unwrap().is_terminal());
}

#[tokio::test]
async fn done_record_is_always_last_for_many_targets() {
    let names = ["a", "b", "c", "d", "e"];
    let mut scripts = HashMap::new();
    for name in names {
        scripts.insert(
            url(name),
            vec![progress("one"), progress("two"), progress("three")],
        );
    }

    let targets: Vec<_> = names.iter().map(|n| url(n)).collect();
    let sink = SharedBuf::default();
    let dispatcher = Dispatcher::new(ScriptedFactory::new(scripts));
    let summary = dispatcher
        .run(targets.clone(), sink.clone(), CancellationToken::new())
        .await
        .unwrap();

    // One terminal outcome per target, independent of record counts.
    assert_eq!(summary.completed + summary.failed, targets.len());

    let records = sink.records();
    assert_eq!(records.len(), 1 + 3 * targets.len() + 1);
    assert_eq!(records.iter().filter(|r| r.is_terminal()).count(), 1);
    assert!(records.last().unwrap().is_terminal());

    // FIFO per source.
    for target in &targets {
        let messages: Vec<_> = records
            .iter()
            .filter(|r| r.target.as_deref() == Some(target.as_str()))
            .map(|r| r.message.clone().unwrap())
            .collect();
        assert_eq!(messages, vec!["one", "two", "three"]);
    }
}

#[tokio::test]
async fn duplicate_targets_each_get_an_outcome() {
    let mut scripts = HashMap::new();
    scripts.insert(url("twice"), vec![progress("only step")]);

    let sink = SharedBuf::default();
    let dispatcher = Dispatcher::new(ScriptedFactory::new(scripts));
    let summary = dispatcher
        .run(
            vec![url("twice"), url("twice")],
            sink.clone(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(summary.targets, 2);
    assert_eq!(summary.completed, 2);

    let records = sink.records();
    let tagged = records
        .iter()
        .filter(|r| r.target.as_deref() == Some(url("twice").as_str()))
        .count();
    assert_eq!(tagged, 2);
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn abort_stops_long_running_producers_promptly() {
    let mut scripts = HashMap::new();
    scripts.insert(
        url("slow"),
        vec![progress("started"), Step::Sleep(Duration::from_secs(3600))],
    );

    let dispatcher = Dispatcher::new(ScriptedFactory::new(scripts));
    let mut stream = dispatcher.start(vec![url("slow")]);

    // Give the worker a moment to publish, then disconnect.
    tokio::time::sleep(Duration::from_millis(100)).await;
    stream.abort();

    let outcome = tokio::time::timeout(Duration::from_secs(5), async {
        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        let records = SseDecoder::new().feed(&raw);
        let summary = stream.summary().await.unwrap();
        (records, summary)
    })
    .await;

    let (records, summary) = tokio_test::assert_ok!(outcome, "cancellation did not propagate");

    // Interrupted workers still produce exactly one terminal record and one
    // outcome, with no synthetic error for the interruption.
    assert!(records.last().unwrap().is_terminal());
    assert_eq!(records.iter().filter(|r| r.is_terminal()).count(), 1);
    assert!(records.iter().all(|r| r.kind != EventKind::Error));
    assert_eq!(summary.failed, 1);
}
