// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job runner: drives one job message through preparation, plugins, and
//! tasks, reporting progress through the feedback channel.
//!
//! Execution order is fixed: before-job plugins, then the declared task
//! list, then after-job plugins. A hard task failure skips the remaining
//! tasks but after-job plugins still run; the job result is the worst
//! result across the three phases.

use crate::channel::FeedbackChannel;
use crate::command::CommandDispatcher;
use crate::paging::PagingLogger;
use crate::plugins::{PluginStep, PluginSteps};
use crate::prepare::{prepare_tasks, PreparedTask};
use crate::vars;
use drover_adapters::{HandlerKind, PluginContext, TaskHandler, TaskInvocation, TaskManager};
use drover_core::{Clock, Issue, IssueKind, JobInfo, JobMessage, RecordId, TaskResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, warn};

/// Where the runner is in the job lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    TaskPrep,
    PluginsLoaded,
    BeforeJobPlugins,
    RunTasks,
    AfterJobPlugins,
    Done,
}

pub struct RunnerDeps<C: Clock> {
    pub channel: Arc<FeedbackChannel>,
    pub handlers: HashMap<HandlerKind, Arc<dyn TaskHandler>>,
    pub task_manager: Arc<dyn TaskManager>,
    pub plugins: PluginSteps,
    pub clock: C,
    pub worker_name: String,
    pub work_dir: PathBuf,
}

pub struct JobRunner<C: Clock> {
    deps: RunnerDeps<C>,
    phase: JobPhase,
}

impl<C: Clock> JobRunner<C> {
    pub fn new(deps: RunnerDeps<C>) -> Self {
        Self {
            deps,
            phase: JobPhase::TaskPrep,
        }
    }

    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    /// Run the job to completion. Infallible by design: every failure mode
    /// collapses into a result and timeline issues.
    pub async fn run(&mut self, message: &JobMessage) -> TaskResult {
        let channel = Arc::clone(&self.deps.channel);
        let job_record = message.job_record_id();
        let job_info = message.job_info();
        let variables = Arc::new(Mutex::new(message.variables.clone()));

        channel.register_pending(
            &job_record,
            &message.job_name,
            "Job",
            0,
            None,
            &self.deps.worker_name,
        );
        channel.record_started(&job_record, self.deps.clock.now_utc());
        channel.console_section(&format!("Starting: {}", message.job_name));

        self.phase = JobPhase::TaskPrep;
        let prepared = match prepare_tasks(
            self.deps.task_manager.as_ref(),
            &self.deps.handlers,
            &message.tasks,
        )
        .await
        {
            Ok(prepared) => prepared,
            Err(e) => {
                error!(job_id = %message.job_id, error = %e, "job preparation failed");
                channel.add_issue(
                    &job_record,
                    Issue {
                        kind: IssueKind::Error,
                        category: "Agent".to_string(),
                        message: e.to_string(),
                    },
                );
                channel.record_finished(&job_record, TaskResult::Failed, self.deps.clock.now_utc());
                self.phase = JobPhase::Done;
                return TaskResult::Failed;
            }
        };
        self.phase = JobPhase::PluginsLoaded;

        self.register_plan(&job_record, &prepared);

        self.phase = JobPhase::BeforeJobPlugins;
        let before_steps = self.deps.plugins.before.clone();
        let mut before_result = TaskResult::Succeeded;
        let mut failed = false;
        for step in &before_steps {
            if failed {
                channel.record_skipped(&step.record_id, self.deps.clock.now_utc());
                continue;
            }
            let result = self.run_before_step(step, &job_info, &variables).await;
            before_result = before_result.worse(result);
            failed = failed || result == TaskResult::Failed;
        }

        self.phase = JobPhase::RunTasks;
        let mut tasks_result = TaskResult::Succeeded;
        for p in &prepared {
            if failed {
                channel.record_skipped(&p.task.instance_id, self.deps.clock.now_utc());
                tasks_result = tasks_result.worse(TaskResult::Skipped);
                continue;
            }
            let result = self.run_task(p, &job_info, &variables).await;
            tasks_result = tasks_result.worse(result);
            failed = failed || result == TaskResult::Failed;
        }

        self.phase = JobPhase::AfterJobPlugins;
        let job_succeeded = !failed;
        let after_steps = self.deps.plugins.after.clone();
        let mut after_result = TaskResult::Succeeded;
        for step in &after_steps {
            let result = self
                .run_after_step(step, &job_info, &variables, job_succeeded)
                .await;
            after_result = after_result.worse(result);
        }

        self.phase = JobPhase::Done;
        let job_result = TaskResult::worst_of([before_result, tasks_result, after_result]);
        channel.console_section(&format!("Finishing: {}", message.job_name));
        channel.record_finished(&job_record, job_result, self.deps.clock.now_utc());
        job_result
    }

    /// Announce every step of the plan as Pending before anything runs, in
    /// execution order, so the timeline shows the whole job shape upfront.
    fn register_plan(&self, job_record: &RecordId, prepared: &[PreparedTask]) {
        let channel = &self.deps.channel;
        let worker = &self.deps.worker_name;
        let mut order = 1u32;
        for step in &self.deps.plugins.before {
            channel.register_pending(
                &step.record_id,
                step.plugin.title(),
                "Plugin",
                order,
                Some(job_record),
                worker,
            );
            order += 1;
        }
        for p in prepared {
            channel.register_pending(
                &p.task.instance_id,
                p.task.label(),
                "Task",
                order,
                Some(job_record),
                worker,
            );
            order += 1;
        }
        for step in &self.deps.plugins.after {
            channel.register_pending(
                &step.record_id,
                step.plugin.title(),
                "Plugin",
                order,
                Some(job_record),
                worker,
            );
            order += 1;
        }
    }

    fn plugin_ctx(
        &self,
        job: &JobInfo,
        variables: &Arc<Mutex<HashMap<String, String>>>,
    ) -> (PluginContext, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            PluginContext {
                job: job.clone(),
                variables: Arc::clone(variables),
                output: tx,
            },
            rx,
        )
    }

    fn drain_plugin_output(&self, rx: &mut mpsc::UnboundedReceiver<String>) {
        while let Ok(line) = rx.try_recv() {
            self.deps.channel.console_line(&line);
        }
    }

    async fn run_before_step(
        &self,
        step: &PluginStep,
        job: &JobInfo,
        variables: &Arc<Mutex<HashMap<String, String>>>,
    ) -> TaskResult {
        let channel = &self.deps.channel;
        channel.record_started(&step.record_id, self.deps.clock.now_utc());
        channel.console_section(&format!("Starting: {}", step.plugin.title()));

        let (ctx, mut rx) = self.plugin_ctx(job, variables);
        let outcome = step.plugin.before_job(&ctx).await;
        drop(ctx);
        self.drain_plugin_output(&mut rx);

        let result = match outcome {
            Ok(()) => TaskResult::Succeeded,
            Err(e) => {
                channel.add_issue(
                    &step.record_id,
                    Issue {
                        kind: IssueKind::Error,
                        category: "Plugin".to_string(),
                        message: e.to_string(),
                    },
                );
                TaskResult::Failed
            }
        };
        channel.record_finished(&step.record_id, result, self.deps.clock.now_utc());
        result
    }

    async fn run_after_step(
        &self,
        step: &PluginStep,
        job: &JobInfo,
        variables: &Arc<Mutex<HashMap<String, String>>>,
        job_succeeded: bool,
    ) -> TaskResult {
        let channel = &self.deps.channel;
        let (ctx, mut rx) = self.plugin_ctx(job, variables);
        if !step.plugin.should_run(job_succeeded, &ctx).await {
            channel.record_skipped(&step.record_id, self.deps.clock.now_utc());
            return TaskResult::Succeeded;
        }

        channel.record_started(&step.record_id, self.deps.clock.now_utc());
        channel.console_section(&format!("Starting: {}", step.plugin.title()));
        let outcome = step.plugin.after_job(&ctx, job_succeeded).await;
        drop(ctx);
        self.drain_plugin_output(&mut rx);

        let result = match outcome {
            Ok(()) => TaskResult::Succeeded,
            Err(e) => {
                channel.add_issue(
                    &step.record_id,
                    Issue {
                        kind: IssueKind::Error,
                        category: "Plugin".to_string(),
                        message: e.to_string(),
                    },
                );
                TaskResult::Failed
            }
        };
        channel.record_finished(&step.record_id, result, self.deps.clock.now_utc());
        result
    }

    async fn run_task(
        &self,
        prepared: &PreparedTask,
        job: &JobInfo,
        variables: &Arc<Mutex<HashMap<String, String>>>,
    ) -> TaskResult {
        let channel = &self.deps.channel;
        let record_id = prepared.task.instance_id.clone();
        channel.record_started(&record_id, self.deps.clock.now_utc());
        channel.console_section(&format!("Starting: {}", prepared.task.label()));

        let (page_tx, mut page_rx) = mpsc::unbounded_channel();
        let mut pager = match PagingLogger::new(
            &self.deps.work_dir,
            record_id.clone(),
            channel.masker().clone(),
            page_tx,
        ) {
            Ok(pager) => Some(pager),
            Err(e) => {
                warn!(record_id = %record_id, error = %e, "paging logger unavailable");
                None
            }
        };

        // inputs substituted at invocation time so before-job plugin
        // variable writes are visible
        let invocation = {
            let variables = variables.lock();
            TaskInvocation {
                target: prepared.target.clone(),
                working_dir: self.deps.work_dir.clone(),
                env: variables.clone(),
                inputs: vars::substitute_inputs(&prepared.task.inputs, &variables),
                job: job.clone(),
            }
        };

        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let handler = Arc::clone(&prepared.handler);
        let handler_task =
            tokio::spawn(async move { handler.run_task(invocation, out_tx).await });

        let mut dispatcher = CommandDispatcher::new(
            Arc::clone(channel),
            record_id.clone(),
            Arc::clone(variables),
            channel.masker().clone(),
        );
        while let Some(line) = out_rx.recv().await {
            if dispatcher.dispatch(&line) {
                continue;
            }
            channel.console_line(&line);
            let mut page_write_failed = false;
            if let Some(open) = pager.as_mut() {
                if let Err(e) = open.write_line(&line) {
                    warn!(record_id = %record_id, error = %e, "log page write failed");
                    page_write_failed = true;
                }
            }
            if page_write_failed {
                // stop paging, keep the console feed going
                pager = None;
            }
            self.drain_pages(&mut page_rx);
        }

        let base = match handler_task.await {
            Ok(Ok(())) => TaskResult::Succeeded,
            Ok(Err(e)) => {
                channel.add_issue(
                    &record_id,
                    Issue {
                        kind: IssueKind::Error,
                        category: "Task".to_string(),
                        message: channel.masker().mask(&e.to_string()),
                    },
                );
                TaskResult::Failed
            }
            Err(e) => {
                channel.add_issue(
                    &record_id,
                    Issue {
                        kind: IssueKind::Error,
                        category: "Task".to_string(),
                        message: format!("task handler panicked: {e}"),
                    },
                );
                TaskResult::Failed
            }
        };

        dispatcher.drain_uploads().await;
        if let Some(mut pager) = pager.take() {
            if let Err(e) = pager.end() {
                warn!(record_id = %record_id, error = %e, "closing log pages failed");
            }
        }
        self.drain_pages(&mut page_rx);

        let mut result = dispatcher.forced_result().unwrap_or(base);
        if result == TaskResult::Failed && prepared.task.continue_on_error {
            result = TaskResult::SucceededWithIssues;
        }
        channel.record_finished(&record_id, result, self.deps.clock.now_utc());
        result
    }

    fn drain_pages(&self, page_rx: &mut mpsc::UnboundedReceiver<drover_core::LogPageInfo>) {
        while let Ok(page) = page_rx.try_recv() {
            self.deps.channel.queue_page(page);
        }
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
