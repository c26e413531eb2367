// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task bundle acquisition.

use async_trait::async_trait;
use drover_core::TaskInstance;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskManagerError {
    #[error("task {id}@{version} not available: {reason}")]
    Unavailable {
        id: String,
        version: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Downloads and caches task bundles ahead of execution.
///
/// Implementations deduplicate by `(id, version)`: a job using the same
/// task twice fetches it once.
#[async_trait]
pub trait TaskManager: Send + Sync + 'static {
    /// Make every distinct task in the list available locally.
    async fn ensure_tasks_exist(&self, tasks: &[TaskInstance]) -> Result<(), TaskManagerError>;

    /// Root directory of a cached task bundle (contains `task.json`).
    fn task_dir(&self, task: &TaskInstance) -> PathBuf;
}
