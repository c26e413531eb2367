// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! drover-daemon: the long-running agent process.
//!
//! The daemon owns the pool poll session and hands each claimed job to a
//! worker host; it never runs task code in its own task set.

pub mod agent;
pub mod host;
pub mod listener;

pub use agent::Agent;
pub use host::{InProcessHost, ProcessHost, WorkerHost};
pub use listener::{ListenerError, ListenerState, MessageHandler, MessageListener};
