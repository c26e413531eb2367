// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker hosts: where a claimed job actually executes.
//!
//! The daemon process never runs task code itself. [`ProcessHost`] spawns
//! a worker executable per job so a crashing task cannot take the
//! listener down; [`InProcessHost`] runs the engine on a spawned task for
//! embedders and tests that accept shared-process execution.

use async_trait::async_trait;
use drover_core::{Clock, JobMessage, TaskResult};
use drover_engine::WorkerDeps;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{info, warn};

/// Runs one job message to completion in isolation.
#[async_trait]
pub trait WorkerHost: Send + Sync + 'static {
    async fn run_job(&self, message: JobMessage) -> TaskResult;
}

/// One worker process per job. The message travels as JSON on stdin; the
/// worker reports its detailed result through the queue itself, so the
/// exit status is only a coarse success signal.
pub struct ProcessHost {
    worker_path: PathBuf,
    work_dir: PathBuf,
    env: HashMap<String, String>,
}

impl ProcessHost {
    pub fn new(worker_path: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            worker_path: worker_path.into(),
            work_dir: work_dir.into(),
            env: HashMap::new(),
        }
    }

    /// Exact environment for worker processes. The parent environment is
    /// never inherited; each job starts from this map alone.
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }
}

#[async_trait]
impl WorkerHost for ProcessHost {
    async fn run_job(&self, message: JobMessage) -> TaskResult {
        let job_id = message.job_id.clone();
        let body = match serde_json::to_vec(&message) {
            Ok(body) => body,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "job message not serializable");
                return TaskResult::Failed;
            }
        };

        let mut child = match Command::new(&self.worker_path)
            .current_dir(&self.work_dir)
            .env_clear()
            .envs(&self.env)
            .stdin(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!(job_id = %job_id, worker = %self.worker_path.display(), error = %e, "worker spawn failed");
                return TaskResult::Failed;
            }
        };

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(&body).await {
                warn!(job_id = %job_id, error = %e, "handing the job to the worker failed");
            }
        }

        match child.wait().await {
            Ok(status) if status.success() => TaskResult::Succeeded,
            Ok(status) => {
                info!(job_id = %job_id, ?status, "worker exited unsuccessfully");
                TaskResult::Failed
            }
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "lost track of the worker process");
                TaskResult::Failed
            }
        }
    }
}

/// Engine-in-process host. The job still runs on its own tokio task, so a
/// panicking handler surfaces as a failed job rather than a dead agent.
pub struct InProcessHost<C: Clock> {
    deps: Arc<WorkerDeps>,
    clock: C,
}

impl<C: Clock> InProcessHost<C> {
    pub fn new(deps: Arc<WorkerDeps>, clock: C) -> Self {
        Self { deps, clock }
    }
}

#[async_trait]
impl<C: Clock> WorkerHost for InProcessHost<C> {
    async fn run_job(&self, message: JobMessage) -> TaskResult {
        let deps = Arc::clone(&self.deps);
        let clock = self.clock.clone();
        let job_id = message.job_id.clone();
        let handle =
            tokio::spawn(async move { drover_engine::run_job(&message, &deps, clock).await });
        match handle.await {
            Ok(result) => result,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "in-process worker panicked");
                TaskResult::Failed
            }
        }
    }
}
