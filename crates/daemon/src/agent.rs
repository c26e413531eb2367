// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The agent: a listener wired to a worker host.
//!
//! Delivery is synchronous end to end. The listener does not poll while a
//! job runs, so the agent holds exactly one job at a time without any
//! bookkeeping here.

use crate::host::WorkerHost;
use crate::listener::{ListenerError, ListenerState, MessageHandler, MessageListener};
use async_trait::async_trait;
use drover_adapters::{QueueApi, QueueMessage};
use drover_core::{JobMessage, PoolId};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct Agent {
    listener: MessageListener,
    host: Arc<dyn WorkerHost>,
}

impl Agent {
    pub fn new(
        queue: Arc<dyn QueueApi>,
        pool_id: PoolId,
        agent_name: impl Into<String>,
        host: Arc<dyn WorkerHost>,
    ) -> Self {
        Self {
            listener: MessageListener::new(queue, pool_id, agent_name),
            host,
        }
    }

    pub fn with_retry_delay(mut self, delay: std::time::Duration) -> Self {
        self.listener = self.listener.with_retry_delay(delay);
        self
    }

    pub fn state(&self) -> ListenerState {
        self.listener.state()
    }

    pub fn stop(&self) {
        self.listener.stop();
    }

    /// Listen and run jobs until stopped or the pool rejects us.
    pub async fn run(&self) -> Result<(), ListenerError> {
        let dispatcher = Arc::new(JobDispatcher {
            host: Arc::clone(&self.host),
        });
        self.listener.run(dispatcher).await
    }
}

/// Decodes job request messages and drives the host. Anything that is not
/// a decodable job request is logged and skipped; the listener will still
/// acknowledge it so it does not come back.
struct JobDispatcher {
    host: Arc<dyn WorkerHost>,
}

#[async_trait]
impl MessageHandler for JobDispatcher {
    async fn handle(&self, message: &QueueMessage) {
        if message.message_type != QueueMessage::JOB_REQUEST {
            debug!(message_id = message.message_id, message_type = %message.message_type, "ignoring non-job message");
            return;
        }
        let job: JobMessage = match serde_json::from_str(&message.body) {
            Ok(job) => job,
            Err(e) => {
                warn!(message_id = message.message_id, error = %e, "undecodable job message dropped");
                return;
            }
        };
        let job_id = job.job_id.clone();
        info!(job_id = %job_id, name = %job.job_name, "job starting");
        let result = self.host.run_job(job).await;
        info!(job_id = %job_id, ?result, "job finished");
    }

    async fn on_error(&self, message: String) {
        warn!(%message, "listener error");
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
