// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! drover-engine: everything between "a job message arrived" and "the job
//! request row is closed out".
//!
//! The engine never talks HTTP; all controller traffic goes through the
//! adapter traits. Feedback (timeline, console, logs) is best-effort and
//! batched; job execution correctness never depends on it.

pub mod batch;
pub mod channel;
pub mod command;
pub mod error;
pub mod paging;
pub mod plugins;
pub mod prepare;
pub mod renewer;
pub mod runner;
pub mod vars;
pub mod worker;

pub use batch::{AppendBatch, BatchError, BatchSink, KeyedBatch};
pub use channel::{FeedbackChannel, FeedbackConfig};
pub use command::{CommandDispatcher, TaskCommand};
pub use error::RunnerError;
pub use paging::PagingLogger;
pub use plugins::{PluginRegistry, PluginStep, PluginSteps};
pub use prepare::{prepare_tasks, PreparedTask};
pub use renewer::LockRenewer;
pub use runner::{JobPhase, JobRunner, RunnerDeps};
pub use worker::{run_job, WorkerDeps};
