// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task execution handlers.
//!
//! A handler knows how to run one flavor of task target (a native binary, a
//! shell script, an interpreted script) and streams the process output back
//! line by line. Handler implementations are supplied by the embedder; the
//! engine only picks one and feeds it an invocation.

use async_trait::async_trait;
use drover_core::JobInfo;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::mpsc;

/// Execution flavors, in fixed preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    Native,
    Shell,
    Interpreted,
}

impl HandlerKind {
    /// Selection order when a task manifest offers several targets.
    pub const PREFERENCE: [HandlerKind; 3] =
        [HandlerKind::Native, HandlerKind::Shell, HandlerKind::Interpreted];
}

drover_core::simple_display! {
    HandlerKind {
        Native => "native",
        Shell => "shell",
        Interpreted => "interpreted",
    }
}

/// Everything a handler needs to run one task.
///
/// `env` is a per-invocation copy; handlers never touch the agent's own
/// process environment.
#[derive(Debug, Clone)]
pub struct TaskInvocation {
    /// Target file from the task manifest, resolved under the task dir.
    pub target: PathBuf,
    pub working_dir: PathBuf,
    pub env: HashMap<String, String>,
    pub inputs: HashMap<String, String>,
    pub job: JobInfo,
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("task exited with code {0}")]
    ExitCode(i32),

    #[error("task terminated by signal")]
    Killed,

    #[error("failed to launch task: {0}")]
    Launch(#[from] std::io::Error),
}

/// Runs one task to completion.
///
/// Output lines (stdout and stderr interleaved) go to `output` as they are
/// produced; the engine masks, logs, and scans them for embedded commands.
/// `Ok(())` means the process exited zero.
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    fn kind(&self) -> HandlerKind;

    async fn run_task(
        &self,
        invocation: TaskInvocation,
        output: mpsc::UnboundedSender<String>,
    ) -> Result<(), HandlerError>;
}
