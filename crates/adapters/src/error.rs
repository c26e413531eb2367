// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for the controller-facing APIs.

use thiserror::Error;

/// Failure returned by a controller API call.
///
/// The listener's retry policy keys off the classification helpers below
/// rather than matching variants directly.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The long-poll connection was torn down mid-wait. Normal churn on
    /// idle polls; re-poll immediately.
    #[error("connection reset during poll")]
    ConnectionReset,

    /// The controller rejected the request (5xx class). Transient.
    #[error("server error: {0}")]
    Server(String),

    /// The agent's credentials were rejected. Not recoverable by retrying.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The pool this session belongs to no longer exists.
    #[error("pool no longer exists: {0}")]
    PoolGone(String),

    /// Anything else on the wire (DNS, timeout, bad payload).
    #[error("transport error: {0}")]
    Transport(String),
}

impl ApiError {
    /// Errors that mean "the idle poll was cut, just poll again" with no
    /// delay and no error surfaced.
    pub fn is_poll_reset(&self) -> bool {
        matches!(self, ApiError::ConnectionReset)
    }

    /// Errors that no amount of retrying will fix; the listener stops.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ApiError::InvalidCredentials(_) | ApiError::PoolGone(_))
    }
}
