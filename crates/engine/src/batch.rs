// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Time-windowed batching primitives.
//!
//! Producers add items at any rate; a background cycle flushes whatever
//! accumulated every `delay`, through an async [`BatchSink`]. The sink is
//! invoked once per cycle even when nothing accumulated, so a sink can
//! piggyback periodic work on the timer. Sink failures are reported to the
//! error channel and never stop the cycle.
//!
//! Shutdown contract: after `finish_adding`, the cycle performs exactly one
//! final flush and then resolves `wait_for_empty`.

use async_trait::async_trait;
use drover_adapters::ApiError;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

#[derive(Debug, Error)]
pub enum BatchError {
    /// The batch no longer accepts items.
    #[error("batch already closed")]
    Closed,

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Destination for one cycle's worth of items.
#[async_trait]
pub trait BatchSink<T>: Send + Sync + 'static {
    async fn flush(&self, items: Vec<T>) -> Result<(), ApiError>;
}

/// Order-preserving batch of standalone items.
///
/// `push` after `finish_adding` is silently dropped; late stragglers from a
/// finished job are noise, not errors.
pub struct AppendBatch<T> {
    inner: Arc<AppendInner<T>>,
}

impl<T> Clone for AppendBatch<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

struct AppendInner<T> {
    delay: Duration,
    sink: Arc<dyn BatchSink<T>>,
    error_tx: mpsc::UnboundedSender<BatchError>,
    pending: Mutex<Vec<T>>,
    started: Mutex<bool>,
    finish_tx: watch::Sender<bool>,
    empty_tx: watch::Sender<bool>,
}

impl<T: Send + 'static> AppendBatch<T> {
    pub fn new(
        delay: Duration,
        sink: Arc<dyn BatchSink<T>>,
        error_tx: mpsc::UnboundedSender<BatchError>,
    ) -> Self {
        let (finish_tx, _) = watch::channel(false);
        let (empty_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(AppendInner {
                delay,
                sink,
                error_tx,
                pending: Mutex::new(Vec::new()),
                started: Mutex::new(false),
                finish_tx,
                empty_tx,
            }),
        }
    }

    /// Spawn the flush cycle. Second and later calls are no-ops.
    pub fn start_processing(&self) {
        let mut started = self.inner.started.lock();
        if *started {
            return;
        }
        *started = true;
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut finish_rx = inner.finish_tx.subscribe();
            loop {
                if *finish_rx.borrow() {
                    break;
                }
                tokio::select! {
                    _ = tokio::time::sleep(inner.delay) => {}
                    _ = finish_rx.changed() => {}
                }
                if *finish_rx.borrow() {
                    break;
                }
                flush_append(&inner).await;
            }
            flush_append(&inner).await;
            let _ = inner.empty_tx.send(true);
        });
    }

    pub fn push(&self, item: T) {
        if *self.inner.finish_tx.borrow() {
            return;
        }
        self.inner.pending.lock().push(item);
    }

    /// Close the batch for input and trigger the final flush.
    pub fn finish_adding(&self) {
        let _ = self.inner.finish_tx.send(true);
    }

    /// Resolves once the final flush's sink call has returned.
    pub async fn wait_for_empty(&self) {
        wait_empty(&self.inner.empty_tx).await;
    }
}

async fn flush_append<T: 'static>(inner: &AppendInner<T>) {
    let items = std::mem::take(&mut *inner.pending.lock());
    if let Err(e) = inner.sink.flush(items).await {
        let _ = inner.error_tx.send(BatchError::Api(e));
    }
}

/// Batch of shared items addressed by key.
///
/// `get_or_add` hands back the same `Arc<Mutex<T>>` for the same key within
/// a cycle, so many small mutations coalesce into one flushed snapshot.
/// Snapshots are taken at flush time; a mutation made after `get_or_add`
/// but before the cycle fires is included. Flush order is first-touch order.
pub struct KeyedBatch<K, T> {
    inner: Arc<KeyedInner<K, T>>,
}

impl<K, T> Clone for KeyedBatch<K, T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

struct KeyedInner<K, T> {
    delay: Duration,
    sink: Arc<dyn BatchSink<T>>,
    error_tx: mpsc::UnboundedSender<BatchError>,
    pending: Mutex<IndexMap<K, Arc<Mutex<T>>>>,
    started: Mutex<bool>,
    finish_tx: watch::Sender<bool>,
    empty_tx: watch::Sender<bool>,
}

impl<K, T> KeyedBatch<K, T>
where
    K: Eq + Hash + Send + 'static,
    T: Clone + Send + 'static,
{
    pub fn new(
        delay: Duration,
        sink: Arc<dyn BatchSink<T>>,
        error_tx: mpsc::UnboundedSender<BatchError>,
    ) -> Self {
        let (finish_tx, _) = watch::channel(false);
        let (empty_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(KeyedInner {
                delay,
                sink,
                error_tx,
                pending: Mutex::new(IndexMap::new()),
                started: Mutex::new(false),
                finish_tx,
                empty_tx,
            }),
        }
    }

    /// Spawn the flush cycle. Second and later calls are no-ops.
    pub fn start_processing(&self) {
        let mut started = self.inner.started.lock();
        if *started {
            return;
        }
        *started = true;
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut finish_rx = inner.finish_tx.subscribe();
            loop {
                if *finish_rx.borrow() {
                    break;
                }
                tokio::select! {
                    _ = tokio::time::sleep(inner.delay) => {}
                    _ = finish_rx.changed() => {}
                }
                if *finish_rx.borrow() {
                    break;
                }
                flush_keyed(&inner).await;
            }
            flush_keyed(&inner).await;
            let _ = inner.empty_tx.send(true);
        });
    }

    /// Fetch the item for `key`, creating it with `make` on first touch
    /// within the current cycle.
    pub fn get_or_add(
        &self,
        key: K,
        make: impl FnOnce() -> T,
    ) -> Result<Arc<Mutex<T>>, BatchError> {
        if *self.inner.finish_tx.borrow() {
            return Err(BatchError::Closed);
        }
        let mut pending = self.inner.pending.lock();
        let slot = pending
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(make())));
        Ok(Arc::clone(slot))
    }

    /// Close the batch for input and trigger the final flush.
    pub fn finish_adding(&self) {
        let _ = self.inner.finish_tx.send(true);
    }

    /// Resolves once the final flush's sink call has returned.
    pub async fn wait_for_empty(&self) {
        wait_empty(&self.inner.empty_tx).await;
    }
}

async fn flush_keyed<K, T: Clone + 'static>(inner: &KeyedInner<K, T>) {
    let taken = std::mem::take(&mut *inner.pending.lock());
    let items: Vec<T> = taken.into_values().map(|slot| slot.lock().clone()).collect();
    if let Err(e) = inner.sink.flush(items).await {
        let _ = inner.error_tx.send(BatchError::Api(e));
    }
}

async fn wait_empty(empty_tx: &watch::Sender<bool>) {
    let mut rx = empty_tx.subscribe();
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
#[path = "batch_tests.rs"]
mod tests;
