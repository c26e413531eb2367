// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task preparation: acquire bundles, read manifests, pick handlers.

use crate::error::RunnerError;
use drover_adapters::{HandlerKind, TaskHandler, TaskManager};
use drover_core::TaskInstance;
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;

pub const MANIFEST_FILE: &str = "task.json";

/// Concurrent manifest reads; tasks lists are short, disks are not.
const MANIFEST_FAN_OUT: usize = 5;

/// Parsed `task.json`. Only the fields preparation needs.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskManifest {
    #[serde(default)]
    pub friendly_name: Option<String>,
    /// Execution targets keyed by handler kind name. Unknown kinds are
    /// tolerated and ignored.
    #[serde(default)]
    pub execution: HashMap<String, ExecutionTarget>,
}

impl TaskManifest {
    fn target_for(&self, kind: HandlerKind) -> Option<&ExecutionTarget> {
        self.execution.get(&kind.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionTarget {
    pub target: String,
}

/// A task bound to the handler that will run it.
pub struct PreparedTask {
    pub task: TaskInstance,
    pub kind: HandlerKind,
    pub handler: Arc<dyn TaskHandler>,
    pub target: PathBuf,
    pub task_dir: PathBuf,
}

impl std::fmt::Debug for PreparedTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedTask")
            .field("task", &self.task)
            .field("kind", &self.kind)
            .field("target", &self.target)
            .field("task_dir", &self.task_dir)
            .finish_non_exhaustive()
    }
}

/// Make every task runnable: ensure bundles exist, read manifests with a
/// bounded fan-out, and bind each task to a handler in preference order.
/// Result order matches the declared task order.
pub async fn prepare_tasks(
    manager: &dyn TaskManager,
    handlers: &HashMap<HandlerKind, Arc<dyn TaskHandler>>,
    tasks: &[TaskInstance],
) -> Result<Vec<PreparedTask>, RunnerError> {
    manager.ensure_tasks_exist(tasks).await?;

    let mut queue: VecDeque<(usize, String, PathBuf)> = tasks
        .iter()
        .enumerate()
        .map(|(idx, task)| (idx, task.label().to_string(), manager.task_dir(task)))
        .collect();

    let mut join = JoinSet::new();
    for _ in 0..MANIFEST_FAN_OUT {
        if let Some((idx, label, dir)) = queue.pop_front() {
            join.spawn(async move { (idx, read_manifest(dir, label).await) });
        }
    }

    let mut manifests: Vec<(usize, TaskManifest)> = Vec::with_capacity(tasks.len());
    while let Some(joined) = join.join_next().await {
        let (idx, manifest) = joined?;
        manifests.push((idx, manifest?));
        if let Some((idx, label, dir)) = queue.pop_front() {
            join.spawn(async move { (idx, read_manifest(dir, label).await) });
        }
    }
    manifests.sort_by_key(|(idx, _)| *idx);

    let mut prepared = Vec::with_capacity(tasks.len());
    for (idx, manifest) in manifests {
        let task = tasks[idx].clone();
        let task_dir = manager.task_dir(&task);
        let Some((kind, handler, target)) = select_handler(&manifest, handlers) else {
            return Err(RunnerError::NoHandler {
                task: task.label().to_string(),
            });
        };
        prepared.push(PreparedTask {
            target: task_dir.join(target),
            task_dir,
            task,
            kind,
            handler,
        });
    }
    Ok(prepared)
}

async fn read_manifest(dir: PathBuf, task: String) -> Result<TaskManifest, RunnerError> {
    let path = dir.join(MANIFEST_FILE);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|source| RunnerError::ManifestIo {
            task: task.clone(),
            source,
        })?;
    serde_json::from_slice(&bytes).map_err(|source| RunnerError::ManifestParse { task, source })
}

fn select_handler(
    manifest: &TaskManifest,
    handlers: &HashMap<HandlerKind, Arc<dyn TaskHandler>>,
) -> Option<(HandlerKind, Arc<dyn TaskHandler>, String)> {
    for kind in HandlerKind::PREFERENCE {
        if let Some(exec) = manifest.target_for(kind) {
            if let Some(handler) = handlers.get(&kind) {
                return Some((kind, Arc::clone(handler), exec.target.clone()));
            }
        }
    }
    None
}

#[cfg(test)]
#[path = "prepare_tests.rs"]
mod tests;
