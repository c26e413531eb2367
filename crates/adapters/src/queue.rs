// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pool message queue: session lifecycle, long-poll, acknowledgement, and
//! job request lease updates.

use crate::error::ApiError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use drover_core::{PoolId, SessionId, TaskResult};

/// Outcome of one long-poll attempt.
#[derive(Debug, Clone)]
pub enum Poll {
    Message(QueueMessage),
    /// The poll window elapsed with nothing queued. Poll again immediately.
    NoMessage,
}

/// Raw message pulled off the pool queue. The body is opaque here; the
/// agent loop decodes it by `message_type`.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub message_id: u64,
    pub message_type: String,
    pub body: String,
}

impl QueueMessage {
    /// Message type carrying a job request body.
    pub const JOB_REQUEST: &'static str = "JobRequest";
}

/// Request to open a poll session against a pool.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub pool_id: PoolId,
    pub agent_name: String,
    /// Random tag distinguishing this process from a stale session under
    /// the same agent name.
    pub owner_tag: String,
}

/// An established poll session.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: SessionId,
    pub pool_id: PoolId,
}

/// Partial update to the server-side job request row: lease renewal while
/// running, finish time and result when done.
#[derive(Debug, Clone)]
pub struct JobRequestPatch {
    pub request_id: u64,
    pub lock_token: String,
    pub finish_time: Option<DateTime<Utc>>,
    pub result: Option<TaskResult>,
}

impl JobRequestPatch {
    /// Lease-renewal patch: token only, job still running.
    pub fn renewal(request_id: u64, lock_token: impl Into<String>) -> Self {
        Self {
            request_id,
            lock_token: lock_token.into(),
            finish_time: None,
            result: None,
        }
    }

    /// Completion patch closing out the request row.
    pub fn finished(
        request_id: u64,
        lock_token: impl Into<String>,
        finish_time: DateTime<Utc>,
        result: TaskResult,
    ) -> Self {
        Self {
            request_id,
            lock_token: lock_token.into(),
            finish_time: Some(finish_time),
            result: Some(result),
        }
    }
}

/// Pool queue operations used by the listener and the lock renewer.
#[async_trait]
pub trait QueueApi: Send + Sync + 'static {
    async fn create_session(&self, new: NewSession) -> Result<Session, ApiError>;

    /// Long-poll for the next message. Blocks up to the server's poll
    /// window; a quiet window returns [`Poll::NoMessage`].
    async fn get_message(&self, session: &Session) -> Result<Poll, ApiError>;

    /// Acknowledge a delivered message so it is not re-delivered.
    async fn delete_message(&self, session: &Session, message_id: u64) -> Result<(), ApiError>;

    async fn delete_session(&self, session: &Session) -> Result<(), ApiError>;

    async fn update_job_request(&self, patch: JobRequestPatch) -> Result<(), ApiError>;
}
