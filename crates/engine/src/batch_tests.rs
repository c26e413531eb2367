// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

struct CountingSink {
    calls: Mutex<Vec<Vec<String>>>,
}

impl CountingSink {
    fn new() -> Arc<Self> {
        Arc::new(Self { calls: Mutex::new(Vec::new()) })
    }

    fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl BatchSink<String> for CountingSink {
    async fn flush(&self, items: Vec<String>) -> Result<(), ApiError> {
        self.calls.lock().push(items);
        Ok(())
    }
}

struct FailingSink;

#[async_trait]
impl BatchSink<String> for FailingSink {
    async fn flush(&self, _items: Vec<String>) -> Result<(), ApiError> {
        Err(ApiError::Server("boom".to_string()))
    }
}

fn errors() -> (
    mpsc::UnboundedSender<BatchError>,
    mpsc::UnboundedReceiver<BatchError>,
) {
    mpsc::unbounded_channel()
}

#[tokio::test(start_paused = true)]
async fn sink_runs_every_cycle_even_when_empty() {
    let sink = CountingSink::new();
    let (err_tx, _err_rx) = errors();
    let batch = AppendBatch::new(Duration::from_millis(100), sink.clone(), err_tx);
    batch.start_processing();

    tokio::time::sleep(Duration::from_millis(250)).await;
    let empties = sink.calls();
    assert!(empties.len() >= 2, "expected at least 2 cycles, saw {}", empties.len());
    assert!(empties.iter().all(|c| c.is_empty()));

    batch.push("a".to_string());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(sink.calls().iter().any(|c| c == &vec!["a".to_string()]));
}

#[tokio::test(start_paused = true)]
async fn finish_adding_triggers_exactly_one_final_flush() {
    let sink = CountingSink::new();
    let (err_tx, _err_rx) = errors();
    let batch = AppendBatch::new(Duration::from_secs(60), sink.clone(), err_tx);
    batch.start_processing();
    tokio::task::yield_now().await;

    batch.push("last".to_string());
    let before = sink.calls().len();
    batch.finish_adding();
    batch.wait_for_empty().await;

    let calls = sink.calls();
    assert_eq!(calls.len(), before + 1);
    assert_eq!(calls[calls.len() - 1], vec!["last".to_string()]);

    // no further cycles after the final flush
    tokio::time::sleep(Duration::from_secs(180)).await;
    assert_eq!(sink.calls().len(), before + 1);
}

#[tokio::test(start_paused = true)]
async fn push_after_finish_is_dropped() {
    let sink = CountingSink::new();
    let (err_tx, _err_rx) = errors();
    let batch = AppendBatch::new(Duration::from_millis(50), sink.clone(), err_tx);
    batch.start_processing();

    batch.finish_adding();
    batch.push("late".to_string());
    batch.wait_for_empty().await;

    assert!(sink.calls().iter().all(|c| c.is_empty()));
}

#[tokio::test(start_paused = true)]
async fn sink_failures_report_and_cycle_continues() {
    let (err_tx, mut err_rx) = errors();
    let batch = AppendBatch::new(Duration::from_millis(50), Arc::new(FailingSink), err_tx);
    batch.start_processing();

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(matches!(err_rx.try_recv(), Ok(BatchError::Api(_))));
    assert!(matches!(err_rx.try_recv(), Ok(BatchError::Api(_))));

    // still flushing after failures, including the final one
    batch.finish_adding();
    batch.wait_for_empty().await;
    assert!(err_rx.try_recv().is_ok());
}

struct KeyedCounting {
    calls: Mutex<Vec<Vec<u32>>>,
}

#[async_trait]
impl BatchSink<u32> for KeyedCounting {
    async fn flush(&self, items: Vec<u32>) -> Result<(), ApiError> {
        self.calls.lock().push(items);
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn same_key_in_one_cycle_shares_the_instance() {
    let sink = Arc::new(KeyedCounting { calls: Mutex::new(Vec::new()) });
    let (err_tx, _err_rx) = errors();
    let batch: KeyedBatch<&str, u32> =
        KeyedBatch::new(Duration::from_secs(60), sink.clone(), err_tx);
    batch.start_processing();

    let first = batch.get_or_add("k", || 1).unwrap();
    let second = batch.get_or_add("k", || 99).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    // late mutation is visible in the flushed snapshot
    *second.lock() = 7;
    batch.finish_adding();
    batch.wait_for_empty().await;

    let calls = sink.calls.lock().clone();
    assert_eq!(calls[calls.len() - 1], vec![7]);
}

#[tokio::test(start_paused = true)]
async fn keyed_flush_preserves_first_touch_order() {
    let sink = Arc::new(KeyedCounting { calls: Mutex::new(Vec::new()) });
    let (err_tx, _err_rx) = errors();
    let batch: KeyedBatch<&str, u32> =
        KeyedBatch::new(Duration::from_secs(60), sink.clone(), err_tx);
    batch.start_processing();

    batch.get_or_add("b", || 2).unwrap();
    batch.get_or_add("a", || 1).unwrap();
    batch.get_or_add("b", || 0).unwrap();
    batch.finish_adding();
    batch.wait_for_empty().await;

    let calls = sink.calls.lock().clone();
    assert_eq!(calls[calls.len() - 1], vec![2, 1]);
}

#[tokio::test(start_paused = true)]
async fn get_or_add_after_finish_errors() {
    let sink = Arc::new(KeyedCounting { calls: Mutex::new(Vec::new()) });
    let (err_tx, _err_rx) = errors();
    let batch: KeyedBatch<&str, u32> =
        KeyedBatch::new(Duration::from_millis(50), sink, err_tx);
    batch.start_processing();
    batch.finish_adding();

    assert!(matches!(
        batch.get_or_add("k", || 0),
        Err(BatchError::Closed)
    ));
}

#[tokio::test(start_paused = true)]
async fn new_instance_after_a_cycle_flushes_the_key() {
    let sink = Arc::new(KeyedCounting { calls: Mutex::new(Vec::new()) });
    let (err_tx, _err_rx) = errors();
    let batch: KeyedBatch<&str, u32> =
        KeyedBatch::new(Duration::from_millis(50), sink.clone(), err_tx);
    batch.start_processing();

    let first = batch.get_or_add("k", || 1).unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    let second = batch.get_or_add("k", || 2).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
}
