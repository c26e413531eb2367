// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker entry point: one job message in, one closed-out request row out.

use crate::channel::{FeedbackChannel, FeedbackConfig};
use crate::plugins::PluginRegistry;
use crate::runner::{JobRunner, RunnerDeps};
use drover_adapters::{
    ContainerApi, HandlerKind, JobRequestPatch, QueueApi, TaskHandler, TaskManager, TimelineApi,
};
use drover_core::{Clock, JobMessage, SecretMasker, TaskResult};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// Variable selecting the plugin set for a job. Absent means "build".
pub const JOB_SYSTEM_VARIABLE: &str = "system.jobsystem";

/// Everything a worker needs across jobs.
pub struct WorkerDeps {
    pub queue: Arc<dyn QueueApi>,
    pub timeline: Arc<dyn TimelineApi>,
    pub container: Arc<dyn ContainerApi>,
    pub task_manager: Arc<dyn TaskManager>,
    pub handlers: HashMap<HandlerKind, Arc<dyn TaskHandler>>,
    pub plugins: PluginRegistry,
    pub config: FeedbackConfig,
    pub worker_name: String,
    pub work_dir: PathBuf,
}

/// Run one job to completion: build the feedback channel, drive the
/// runner, close out the request row, drain reporting.
///
/// The finish patch is best-effort like all reporting; a failure is logged
/// and the computed result still returned.
pub async fn run_job<C: Clock>(message: &JobMessage, deps: &WorkerDeps, clock: C) -> TaskResult {
    let masker = SecretMasker::from_hints(&message.mask_hints, &message.variables);
    let channel = FeedbackChannel::new(
        message,
        Arc::clone(&deps.timeline),
        Arc::clone(&deps.container),
        Arc::clone(&deps.queue),
        masker,
        deps.config.clone(),
    );

    let system = message
        .variables
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(JOB_SYSTEM_VARIABLE))
        .map(|(_, v)| v.as_str())
        .unwrap_or("build");
    let plugins = deps.plugins.steps_for(system);

    let mut runner = JobRunner::new(RunnerDeps {
        channel: Arc::clone(&channel),
        handlers: deps.handlers.clone(),
        task_manager: Arc::clone(&deps.task_manager),
        plugins,
        clock: clock.clone(),
        worker_name: deps.worker_name.clone(),
        work_dir: deps.work_dir.join(message.job_id.as_str()),
    });
    let result = runner.run(message).await;

    let patch = JobRequestPatch::finished(
        message.request_id,
        message.lock_token.clone(),
        clock.now_utc(),
        result,
    );
    if let Err(e) = channel.update_job_request(patch).await {
        warn!(job_id = %message.job_id, error = %e, "closing the job request failed");
    }
    channel.drain().await;
    result
}
