// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job plugins: fixed steps that bracket the task list.
//!
//! Plugins come from a compiled-in registry keyed by job system, not from
//! filesystem discovery. Each selected plugin gets its own timeline record
//! and runs before the first task, after the last, or both.

use async_trait::async_trait;
use drover_core::JobInfo;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Which sides of the task list a plugin participates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PluginHooks {
    pub before: bool,
    pub after: bool,
}

impl PluginHooks {
    pub const BEFORE: PluginHooks = PluginHooks { before: true, after: false };
    pub const AFTER: PluginHooks = PluginHooks { before: false, after: true };
    pub const BOTH: PluginHooks = PluginHooks { before: true, after: true };
}

/// Execution context handed to plugin hooks.
///
/// `variables` is the runner's live variable map; before-job plugins may
/// write to it and later task inputs see the new values. Output lines flow
/// through the same channel as task output.
#[derive(Clone)]
pub struct PluginContext {
    pub job: JobInfo,
    pub variables: Arc<Mutex<HashMap<String, String>>>,
    pub output: mpsc::UnboundedSender<String>,
}

impl PluginContext {
    /// Case-insensitive variable read.
    pub fn variable(&self, name: &str) -> Option<String> {
        let variables = self.variables.lock();
        variables
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    }

    pub fn set_variable(&self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.lock().insert(name.into(), value.into());
    }

    /// Best-effort output line; dropped if the job already finished.
    pub fn write_line(&self, line: impl Into<String>) {
        let _ = self.output.send(line.into());
    }
}

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait JobPlugin: Send + Sync + 'static {
    /// Stable identifier, e.g. "prepareWorkspace".
    fn name(&self) -> &str;

    /// Timeline display name, e.g. "Preparing Workspace".
    fn title(&self) -> &str;

    fn hooks(&self) -> PluginHooks;

    /// Gate for the after hook; consulted once the task phase is done.
    async fn should_run(&self, job_succeeded: bool, ctx: &PluginContext) -> bool {
        let _ = (job_succeeded, ctx);
        true
    }

    async fn before_job(&self, ctx: &PluginContext) -> Result<(), PluginError> {
        let _ = ctx;
        Ok(())
    }

    async fn after_job(&self, ctx: &PluginContext, job_succeeded: bool)
        -> Result<(), PluginError> {
        let _ = (ctx, job_succeeded);
        Ok(())
    }
}
