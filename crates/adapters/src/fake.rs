// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory fakes for every adapter trait.
//!
//! Fakes record what was asked of them and follow simple scripts for
//! failure injection. They are deterministic: nothing here sleeps or
//! depends on wall-clock time.

use crate::container::{ArtifactRef, ContainerApi, FileUpload};
use crate::error::ApiError;
use crate::handler::{HandlerError, HandlerKind, TaskHandler, TaskInvocation};
use crate::plugin::{JobPlugin, PluginContext, PluginError, PluginHooks};
use crate::queue::{JobRequestPatch, NewSession, Poll, QueueApi, QueueMessage, Session};
use crate::task_manager::{TaskManager, TaskManagerError};
use crate::timeline::TimelineApi;
use async_trait::async_trait;
use drover_core::{
    PlanId, RecordId, SessionId, TaskInstance, TaskLogReference, TimelineId, TimelineRecord,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Scripted pool queue. Poll outcomes are consumed in order; an exhausted
/// script returns a fatal error so listener tests terminate.
#[derive(Default)]
pub struct FakeQueueApi {
    script: Mutex<VecDeque<Result<Poll, ApiError>>>,
    session_failures: Mutex<VecDeque<ApiError>>,
    delete_failures: Mutex<VecDeque<ApiError>>,
    pub sessions_created: Mutex<Vec<NewSession>>,
    pub sessions_deleted: Mutex<Vec<SessionId>>,
    pub messages_deleted: Mutex<Vec<u64>>,
    pub patches: Mutex<Vec<JobRequestPatch>>,
    pub patch_failures: Mutex<VecDeque<ApiError>>,
}

impl FakeQueueApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_message(&self, message: QueueMessage) {
        self.script.lock().push_back(Ok(Poll::Message(message)));
    }

    /// Queue a serialized job request message.
    pub fn push_job(&self, message_id: u64, job: &drover_core::JobMessage) {
        self.push_message(QueueMessage {
            message_id,
            message_type: QueueMessage::JOB_REQUEST.to_string(),
            body: serde_json::to_string(job).unwrap_or_default(),
        });
    }

    pub fn push_no_message(&self) {
        self.script.lock().push_back(Ok(Poll::NoMessage));
    }

    pub fn push_poll_error(&self, err: ApiError) {
        self.script.lock().push_back(Err(err));
    }

    /// Fail the next session creation attempt with `err`.
    pub fn fail_next_session_create(&self, err: ApiError) {
        self.session_failures.lock().push_back(err);
    }

    /// Fail the next message acknowledgement with `err`.
    pub fn fail_next_message_delete(&self, err: ApiError) {
        self.delete_failures.lock().push_back(err);
    }

    /// Fail the next job request patch with `err`.
    pub fn fail_next_patch(&self, err: ApiError) {
        self.patch_failures.lock().push_back(err);
    }
}

#[async_trait]
impl QueueApi for FakeQueueApi {
    async fn create_session(&self, new: NewSession) -> Result<Session, ApiError> {
        if let Some(err) = self.session_failures.lock().pop_front() {
            return Err(err);
        }
        let pool_id = new.pool_id;
        self.sessions_created.lock().push(new);
        Ok(Session {
            session_id: SessionId::new(),
            pool_id,
        })
    }

    async fn get_message(&self, _session: &Session) -> Result<Poll, ApiError> {
        match self.script.lock().pop_front() {
            Some(outcome) => outcome,
            None => Err(ApiError::PoolGone("poll script exhausted".to_string())),
        }
    }

    async fn delete_message(&self, _session: &Session, message_id: u64) -> Result<(), ApiError> {
        if let Some(err) = self.delete_failures.lock().pop_front() {
            return Err(err);
        }
        self.messages_deleted.lock().push(message_id);
        Ok(())
    }

    async fn delete_session(&self, session: &Session) -> Result<(), ApiError> {
        self.sessions_deleted.lock().push(session.session_id.clone());
        Ok(())
    }

    async fn update_job_request(&self, patch: JobRequestPatch) -> Result<(), ApiError> {
        if let Some(err) = self.patch_failures.lock().pop_front() {
            return Err(err);
        }
        self.patches.lock().push(patch);
        Ok(())
    }
}

/// Recording timeline API. Log ids are handed out sequentially from 1.
#[derive(Default)]
pub struct FakeTimelineApi {
    next_log_id: Mutex<u64>,
    page_failures: Mutex<VecDeque<ApiError>>,
    update_failures: Mutex<VecDeque<ApiError>>,
    pub created_logs: Mutex<Vec<String>>,
    pub uploaded_pages: Mutex<Vec<(u64, PathBuf)>>,
    pub update_calls: Mutex<Vec<Vec<TimelineRecord>>>,
    pub feed_lines: Mutex<Vec<String>>,
}

impl FakeTimelineApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_page_upload(&self, err: ApiError) {
        self.page_failures.lock().push_back(err);
    }

    pub fn fail_next_update(&self, err: ApiError) {
        self.update_failures.lock().push_back(err);
    }

    /// Number of flush calls seen, including empty ones.
    pub fn update_call_count(&self) -> usize {
        self.update_calls.lock().len()
    }

    /// Replay every update batch in order and return the merged final state
    /// of each record, keyed by id.
    pub fn merged_records(&self) -> HashMap<RecordId, TimelineRecord> {
        let mut merged: HashMap<RecordId, TimelineRecord> = HashMap::new();
        for batch in self.update_calls.lock().iter() {
            for record in batch {
                let entry = merged
                    .entry(record.id.clone())
                    .or_insert_with(|| TimelineRecord::stub(record.id.clone()));
                merge_record(entry, record);
            }
        }
        merged
    }
}

fn merge_record(into: &mut TimelineRecord, from: &TimelineRecord) {
    fn take<T: Clone>(into: &mut Option<T>, from: &Option<T>) {
        if from.is_some() {
            *into = from.clone();
        }
    }
    take(&mut into.parent_id, &from.parent_id);
    take(&mut into.name, &from.name);
    take(&mut into.record_type, &from.record_type);
    take(&mut into.order, &from.order);
    take(&mut into.worker_name, &from.worker_name);
    take(&mut into.current_operation, &from.current_operation);
    take(&mut into.percent_complete, &from.percent_complete);
    take(&mut into.state, &from.state);
    take(&mut into.result, &from.result);
    take(&mut into.start_time, &from.start_time);
    take(&mut into.finish_time, &from.finish_time);
    take(&mut into.log, &from.log);
    into.issues = from.issues.clone();
    into.error_count = from.error_count;
    into.warning_count = from.warning_count;
}

#[async_trait]
impl TimelineApi for FakeTimelineApi {
    async fn create_log(
        &self,
        _plan_id: &PlanId,
        path: &str,
    ) -> Result<TaskLogReference, ApiError> {
        let mut next = self.next_log_id.lock();
        *next += 1;
        self.created_logs.lock().push(path.to_string());
        Ok(TaskLogReference { id: *next })
    }

    async fn upload_log_page(
        &self,
        _plan_id: &PlanId,
        log: TaskLogReference,
        page: &Path,
    ) -> Result<(), ApiError> {
        if let Some(err) = self.page_failures.lock().pop_front() {
            return Err(err);
        }
        self.uploaded_pages.lock().push((log.id, page.to_path_buf()));
        Ok(())
    }

    async fn update_records(
        &self,
        _plan_id: &PlanId,
        _timeline_id: &TimelineId,
        records: Vec<TimelineRecord>,
    ) -> Result<(), ApiError> {
        if let Some(err) = self.update_failures.lock().pop_front() {
            return Err(err);
        }
        self.update_calls.lock().push(records);
        Ok(())
    }

    async fn append_feed(
        &self,
        _plan_id: &PlanId,
        _timeline_id: &TimelineId,
        _record_id: &RecordId,
        lines: Vec<String>,
    ) -> Result<(), ApiError> {
        self.feed_lines.lock().extend(lines);
        Ok(())
    }
}

/// Recording container API.
#[derive(Default)]
pub struct FakeContainerApi {
    upload_failures: Mutex<VecDeque<ApiError>>,
    pub uploads: Mutex<Vec<FileUpload>>,
    pub artifacts: Mutex<Vec<ArtifactRef>>,
}

impl FakeContainerApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_upload(&self, err: ApiError) {
        self.upload_failures.lock().push_back(err);
    }
}

#[async_trait]
impl ContainerApi for FakeContainerApi {
    async fn upload_file(&self, upload: FileUpload) -> Result<(), ApiError> {
        if let Some(err) = self.upload_failures.lock().pop_front() {
            return Err(err);
        }
        self.uploads.lock().push(upload);
        Ok(())
    }

    async fn post_artifact(
        &self,
        _plan_id: &PlanId,
        artifact: ArtifactRef,
    ) -> Result<(), ApiError> {
        self.artifacts.lock().push(artifact);
        Ok(())
    }
}

/// Task manager over a fixed root directory. Tests lay out
/// `<root>/<id>_<version>/task.json` themselves.
pub struct FakeTaskManager {
    root: PathBuf,
    fail: Mutex<Option<TaskManagerError>>,
    pub ensured: Mutex<Vec<String>>,
}

impl FakeTaskManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            fail: Mutex::new(None),
            ensured: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_with(&self, err: TaskManagerError) {
        *self.fail.lock() = Some(err);
    }
}

#[async_trait]
impl TaskManager for FakeTaskManager {
    async fn ensure_tasks_exist(&self, tasks: &[TaskInstance]) -> Result<(), TaskManagerError> {
        if let Some(err) = self.fail.lock().take() {
            return Err(err);
        }
        let mut ensured = self.ensured.lock();
        for task in tasks {
            let key = task.key();
            if !ensured.contains(&key) {
                ensured.push(key);
            }
        }
        Ok(())
    }

    fn task_dir(&self, task: &TaskInstance) -> PathBuf {
        self.root.join(format!("{}_{}", task.id, task.version))
    }
}

/// One scripted handler run: output lines followed by an exit code.
#[derive(Debug, Clone)]
pub struct ScriptedRun {
    pub lines: Vec<String>,
    pub exit_code: i32,
}

impl ScriptedRun {
    pub fn ok(lines: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            exit_code: 0,
        }
    }

    pub fn failing(lines: impl IntoIterator<Item = impl Into<String>>, exit_code: i32) -> Self {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            exit_code,
        }
    }
}

/// Handler that plays back scripted runs in order. An exhausted script
/// behaves as a silent, successful task.
pub struct ScriptedHandler {
    kind: HandlerKind,
    runs: Mutex<VecDeque<ScriptedRun>>,
    pub invocations: Mutex<Vec<TaskInvocation>>,
}

impl ScriptedHandler {
    pub fn new(kind: HandlerKind) -> Self {
        Self {
            kind,
            runs: Mutex::new(VecDeque::new()),
            invocations: Mutex::new(Vec::new()),
        }
    }

    pub fn push_run(&self, run: ScriptedRun) {
        self.runs.lock().push_back(run);
    }
}

#[async_trait]
impl TaskHandler for ScriptedHandler {
    fn kind(&self) -> HandlerKind {
        self.kind
    }

    async fn run_task(
        &self,
        invocation: TaskInvocation,
        output: mpsc::UnboundedSender<String>,
    ) -> Result<(), HandlerError> {
        self.invocations.lock().push(invocation);
        let run = self.runs.lock().pop_front();
        let Some(run) = run else {
            return Ok(());
        };
        for line in run.lines {
            let _ = output.send(line);
        }
        match run.exit_code {
            0 => Ok(()),
            code => Err(HandlerError::ExitCode(code)),
        }
    }
}

/// Configurable plugin that records which hooks fired.
pub struct TestPlugin {
    name: String,
    title: String,
    hooks: PluginHooks,
    should_run: Mutex<bool>,
    fail_before: Mutex<bool>,
    fail_after: Mutex<bool>,
    pub calls: Mutex<Vec<String>>,
}

impl TestPlugin {
    pub fn new(name: impl Into<String>, hooks: PluginHooks) -> Self {
        let name = name.into();
        Self {
            title: format!("Test plugin {name}"),
            name,
            hooks,
            should_run: Mutex::new(true),
            fail_before: Mutex::new(false),
            fail_after: Mutex::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_should_run(&self, should_run: bool) {
        *self.should_run.lock() = should_run;
    }

    pub fn fail_before_job(&self) {
        *self.fail_before.lock() = true;
    }

    pub fn fail_after_job(&self) {
        *self.fail_after.lock() = true;
    }
}

#[async_trait]
impl JobPlugin for TestPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn hooks(&self) -> PluginHooks {
        self.hooks
    }

    async fn should_run(&self, job_succeeded: bool, _ctx: &PluginContext) -> bool {
        self.calls
            .lock()
            .push(format!("should_run({job_succeeded})"));
        *self.should_run.lock()
    }

    async fn before_job(&self, ctx: &PluginContext) -> Result<(), PluginError> {
        self.calls.lock().push("before_job".to_string());
        ctx.write_line(format!("plugin {} before", self.name));
        if *self.fail_before.lock() {
            return Err(PluginError::Failed(format!("{} before hook failed", self.name)));
        }
        Ok(())
    }

    async fn after_job(
        &self,
        ctx: &PluginContext,
        job_succeeded: bool,
    ) -> Result<(), PluginError> {
        self.calls
            .lock()
            .push(format!("after_job({job_succeeded})"));
        ctx.write_line(format!("plugin {} after", self.name));
        if *self.fail_after.lock() {
            return Err(PluginError::Failed(format!("{} after hook failed", self.name)));
        }
        Ok(())
    }
}
