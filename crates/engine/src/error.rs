// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use drover_adapters::TaskManagerError;
use thiserror::Error;

/// Failures that abort job setup before any task runs.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    TaskManager(#[from] TaskManagerError),

    #[error("failed to read manifest for {task}")]
    ManifestIo {
        task: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest for {task}")]
    ManifestParse {
        task: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no usable execution target for {task}")]
    NoHandler { task: String },

    #[error("task preparation worker panicked")]
    PrepJoin(#[from] tokio::task::JoinError),
}
