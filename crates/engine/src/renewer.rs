// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic lease renewal for the running job's request row.
//!
//! The lease outlives any single renewal failure: errors are reported and
//! the timer keeps firing. Losing a few renewals is survivable; stopping
//! the timer is what forfeits the job.

use crate::batch::BatchError;
use drover_adapters::{JobRequestPatch, QueueApi};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct LockRenewer {
    cancel: CancellationToken,
}

impl LockRenewer {
    /// Spawn the renewal timer. The first renewal fires one interval in,
    /// not immediately; the job was just assigned, the lease is fresh.
    pub fn start(
        queue: Arc<dyn QueueApi>,
        request_id: u64,
        lock_token: String,
        interval: Duration,
        error_tx: mpsc::UnboundedSender<BatchError>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // immediate first tick
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                debug!(request_id, "renewing job request lock");
                let patch = JobRequestPatch::renewal(request_id, lock_token.clone());
                if let Err(e) = queue.update_job_request(patch).await {
                    let _ = error_tx.send(BatchError::Api(e));
                }
            }
        });
        Self { cancel }
    }

    /// Stop renewing. Safe to call more than once.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for LockRenewer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
#[path = "renewer_tests.rs"]
mod tests;
