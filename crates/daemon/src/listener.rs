// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pool message listener.
//!
//! One listener owns one poll session and delivers messages one at a time:
//! the next poll is not issued until the handler returns, which is what
//! keeps the agent at a single in-flight job.
//!
//! Retry policy is deliberately dumb: a quiet poll window or a torn
//! connection re-polls immediately, every other transient error waits one
//! fixed delay. No backoff; the controller long-poll is the pacing.

use async_trait::async_trait;
use drover_adapters::{ApiError, NewSession, Poll, QueueApi, QueueMessage, Session};
use drover_core::PoolId;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Fixed wait before retrying after a transient failure.
pub const RETRY_DELAY: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Unstarted,
    SessionPending,
    Polling,
    Delivering,
    Retrying,
    Stopped,
}

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Receives claimed messages and surfaced errors.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    /// Process one message. The listener does not poll again until this
    /// returns; acknowledgement happens after, regardless of outcome.
    async fn handle(&self, message: &QueueMessage);

    /// Human-readable error surface. Transient poll failures arrive as two
    /// calls: a context line, then the raw error.
    async fn on_error(&self, message: String);
}

pub struct MessageListener {
    queue: Arc<dyn QueueApi>,
    pool_id: PoolId,
    agent_name: String,
    retry_delay: Duration,
    state: Mutex<ListenerState>,
    session: Mutex<Option<Session>>,
    cancel: CancellationToken,
}

impl MessageListener {
    pub fn new(queue: Arc<dyn QueueApi>, pool_id: PoolId, agent_name: impl Into<String>) -> Self {
        Self {
            queue,
            pool_id,
            agent_name: agent_name.into(),
            retry_delay: RETRY_DELAY,
            state: Mutex::new(ListenerState::Unstarted),
            session: Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn state(&self) -> ListenerState {
        *self.state.lock()
    }

    fn set_state(&self, state: ListenerState) {
        *self.state.lock() = state;
    }

    /// Request shutdown. Safe to call any number of times, including
    /// before `run` ever started.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Poll until stopped or a fatal error. Returns `Ok` on a clean stop.
    pub async fn run(&self, handler: Arc<dyn MessageHandler>) -> Result<(), ListenerError> {
        let session = match self.open_session(handler.as_ref()).await? {
            Some(session) => session,
            None => {
                self.set_state(ListenerState::Stopped);
                return Ok(());
            }
        };
        info!(session_id = %session.session_id, pool_id = %session.pool_id, "poll session open");
        *self.session.lock() = Some(session.clone());

        let exit = self.poll_loop(&session, handler.as_ref()).await;

        if let Err(e) = self.queue.delete_session(&session).await {
            warn!(session_id = %session.session_id, error = %e, "session delete failed");
        }
        *self.session.lock() = None;
        self.set_state(ListenerState::Stopped);
        exit
    }

    /// Create the poll session, retrying transient failures forever.
    /// `None` means shutdown was requested while waiting.
    async fn open_session(
        &self,
        handler: &dyn MessageHandler,
    ) -> Result<Option<Session>, ListenerError> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(None);
            }
            self.set_state(ListenerState::SessionPending);
            let new = NewSession {
                pool_id: self.pool_id,
                agent_name: self.agent_name.clone(),
                // fresh tag per process so a stale session under the same
                // agent name is distinguishable server-side
                owner_tag: Uuid::new_v4().to_string(),
            };
            match self.queue.create_session(new).await {
                Ok(session) => return Ok(Some(session)),
                Err(e) if e.is_fatal() => {
                    self.set_state(ListenerState::Stopped);
                    return Err(e.into());
                }
                Err(e) => {
                    handler
                        .on_error(format!(
                            "could not create a poll session, retrying in {}s",
                            self.retry_delay.as_secs()
                        ))
                        .await;
                    handler.on_error(e.to_string()).await;
                    self.set_state(ListenerState::Retrying);
                    if !self.pause_for_retry().await {
                        return Ok(None);
                    }
                }
            }
        }
    }

    async fn poll_loop(
        &self,
        session: &Session,
        handler: &dyn MessageHandler,
    ) -> Result<(), ListenerError> {
        loop {
            self.set_state(ListenerState::Polling);
            let poll = tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                poll = self.queue.get_message(session) => poll,
            };
            match poll {
                // quiet window, ask again right away
                Ok(Poll::NoMessage) => continue,
                Ok(Poll::Message(message)) => {
                    self.set_state(ListenerState::Delivering);
                    debug!(message_id = message.message_id, message_type = %message.message_type, "message claimed");
                    handler.handle(&message).await;
                    if let Err(e) = self
                        .queue
                        .delete_message(session, message.message_id)
                        .await
                    {
                        handler
                            .on_error(format!(
                                "could not acknowledge message {}: {e}",
                                message.message_id
                            ))
                            .await;
                    }
                }
                Err(e) if e.is_poll_reset() => continue,
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    self.set_state(ListenerState::Retrying);
                    handler
                        .on_error(format!(
                            "poll failed, retrying in {}s",
                            self.retry_delay.as_secs()
                        ))
                        .await;
                    handler.on_error(e.to_string()).await;
                    if !self.pause_for_retry().await {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Fixed retry wait; false when shutdown arrived instead.
    async fn pause_for_retry(&self) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(self.retry_delay) => true,
        }
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
