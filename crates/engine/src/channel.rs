// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Feedback channel: all reporting for one running job.
//!
//! Three queues trail execution — console lines, timeline record updates,
//! and finished log pages — each on its own flush cadence, plus the lease
//! renewer. Reporting is best-effort throughout: a flush failure is logged
//! and the job keeps running.

use crate::batch::{AppendBatch, BatchError, BatchSink, KeyedBatch};
use crate::renewer::LockRenewer;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use drover_adapters::{
    ApiError, ArtifactRef, ContainerApi, FileUpload, JobRequestPatch, QueueApi, TimelineApi,
};
use drover_core::{
    Issue, JobMessage, LogPageInfo, PlanId, RecordId, RecordState, SecretMasker,
    TaskLogReference, TaskResult, TimelineId, TimelineRecord,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

/// Flush cadences and reporting limits.
#[derive(Debug, Clone)]
pub struct FeedbackConfig {
    pub console_delay: Duration,
    pub timeline_delay: Duration,
    pub log_delay: Duration,
    pub lock_interval: Duration,
    /// Issues kept per record and kind; the rest are counted only.
    pub issue_cap: usize,
    /// Upper bound on `drain`; whatever has not flushed by then is lost.
    pub drain_timeout: Duration,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        // cadences deliberately co-prime so the queues don't flush in
        // lockstep against the same endpoint
        Self {
            console_delay: Duration::from_millis(373),
            timeline_delay: Duration::from_millis(487),
            log_delay: Duration::from_millis(1137),
            lock_interval: Duration::from_millis(29_323),
            issue_cap: 10,
            drain_timeout: Duration::from_secs(600),
        }
    }
}

/// Reporting facade for one job execution.
pub struct FeedbackChannel {
    plan_id: PlanId,
    job_record: RecordId,
    container: Arc<dyn ContainerApi>,
    queue: Arc<dyn QueueApi>,
    masker: SecretMasker,
    issue_cap: usize,
    drain_timeout: Duration,
    records: KeyedBatch<RecordId, TimelineRecord>,
    console: AppendBatch<String>,
    pages: AppendBatch<LogPageInfo>,
    renewer: LockRenewer,
    error_rx: Mutex<mpsc::UnboundedReceiver<BatchError>>,
}

impl FeedbackChannel {
    /// Build the three queues and the renewer and start them all.
    pub fn new(
        job: &JobMessage,
        timeline: Arc<dyn TimelineApi>,
        container: Arc<dyn ContainerApi>,
        queue: Arc<dyn QueueApi>,
        masker: SecretMasker,
        config: FeedbackConfig,
    ) -> Arc<Self> {
        let (error_tx, error_rx) = mpsc::unbounded_channel();
        let job_record = job.job_record_id();

        let records: KeyedBatch<RecordId, TimelineRecord> = KeyedBatch::new(
            config.timeline_delay,
            Arc::new(TimelineSink {
                timeline: Arc::clone(&timeline),
                plan_id: job.plan_id.clone(),
                timeline_id: job.timeline_id.clone(),
            }),
            error_tx.clone(),
        );
        let console = AppendBatch::new(
            config.console_delay,
            Arc::new(ConsoleSink {
                timeline: Arc::clone(&timeline),
                plan_id: job.plan_id.clone(),
                timeline_id: job.timeline_id.clone(),
                record_id: job_record.clone(),
            }),
            error_tx.clone(),
        );
        let pages = AppendBatch::new(
            config.log_delay,
            Arc::new(PageSink {
                timeline,
                plan_id: job.plan_id.clone(),
                records: records.clone(),
                logs: Mutex::new(HashMap::new()),
                error_tx: error_tx.clone(),
            }),
            error_tx.clone(),
        );
        records.start_processing();
        console.start_processing();
        pages.start_processing();

        let renewer = LockRenewer::start(
            Arc::clone(&queue),
            job.request_id,
            job.lock_token.clone(),
            config.lock_interval,
            error_tx,
        );

        Arc::new(Self {
            plan_id: job.plan_id.clone(),
            job_record,
            container,
            queue,
            masker,
            issue_cap: config.issue_cap,
            drain_timeout: config.drain_timeout,
            records,
            console,
            pages,
            renewer,
            error_rx: Mutex::new(error_rx),
        })
    }

    pub fn masker(&self) -> &SecretMasker {
        &self.masker
    }

    pub fn job_record(&self) -> &RecordId {
        &self.job_record
    }

    fn with_record(&self, id: &RecordId, mutate: impl FnOnce(&mut TimelineRecord)) {
        match self
            .records
            .get_or_add(id.clone(), || TimelineRecord::stub(id.clone()))
        {
            Ok(slot) => mutate(&mut slot.lock()),
            Err(_) => warn!(record_id = %id, "timeline update after drain dropped"),
        }
    }

    /// Announce a step in the plan before it runs.
    #[allow(clippy::too_many_arguments)]
    pub fn register_pending(
        &self,
        id: &RecordId,
        name: &str,
        record_type: &str,
        order: u32,
        parent: Option<&RecordId>,
        worker_name: &str,
    ) {
        self.with_record(id, |rec| {
            rec.name = Some(name.to_string());
            rec.record_type = Some(record_type.to_string());
            rec.order = Some(order);
            rec.parent_id = parent.cloned();
            rec.worker_name = Some(worker_name.to_string());
            if !rec.advance_state(RecordState::Pending) {
                warn!(record_id = %id, "pending registration after start");
            }
        });
    }

    pub fn record_started(&self, id: &RecordId, at: DateTime<Utc>) {
        self.with_record(id, |rec| {
            if rec.start_time.is_none() {
                rec.start_time = Some(at);
            }
            if !rec.advance_state(RecordState::InProgress) {
                warn!(record_id = %id, "start reported for a completed record");
            }
        });
    }

    pub fn record_finished(&self, id: &RecordId, result: TaskResult, at: DateTime<Utc>) {
        self.with_record(id, |rec| {
            rec.result = Some(result);
            rec.finish_time = Some(at);
            rec.advance_state(RecordState::Completed);
        });
    }

    /// Completed-without-running: start and finish collapse to one instant.
    pub fn record_skipped(&self, id: &RecordId, at: DateTime<Utc>) {
        self.with_record(id, |rec| {
            if rec.start_time.is_none() {
                rec.start_time = Some(at);
            }
            rec.finish_time = Some(at);
            rec.result = Some(TaskResult::Skipped);
            rec.advance_state(RecordState::Completed);
        });
    }

    pub fn set_progress(&self, id: &RecordId, percent: u8, operation: Option<String>) {
        self.with_record(id, |rec| {
            rec.percent_complete = Some(percent.min(100));
            if operation.is_some() {
                rec.current_operation = operation;
            }
        });
    }

    pub fn add_issue(&self, id: &RecordId, issue: Issue) {
        let cap = self.issue_cap;
        self.with_record(id, |rec| rec.add_issue(issue, cap));
    }

    /// Queue one console line for the job's live feed, masked.
    pub fn console_line(&self, line: &str) {
        self.console.push(self.masker.mask(line));
    }

    /// Queue a section marker in the console feed.
    pub fn console_section(&self, name: &str) {
        self.console.push(format!("##[section] {name}"));
    }

    /// Queue one finished log page for upload.
    pub fn queue_page(&self, page: LogPageInfo) {
        self.pages.push(page);
    }

    pub async fn upload_file(&self, upload: FileUpload) -> Result<(), ApiError> {
        self.container.upload_file(upload).await
    }

    pub async fn post_artifact(&self, artifact: ArtifactRef) -> Result<(), ApiError> {
        self.container.post_artifact(&self.plan_id, artifact).await
    }

    pub async fn update_job_request(&self, patch: JobRequestPatch) -> Result<(), ApiError> {
        self.queue.update_job_request(patch).await
    }

    /// Stop the renewer and flush everything, bounded by the drain timeout.
    ///
    /// Console and pages close first; the page queue's final flush must
    /// land before the timeline queue closes so log references written
    /// back by page uploads make the last record batch.
    pub async fn drain(&self) {
        self.renewer.stop();
        let flush_all = async {
            self.console.finish_adding();
            self.pages.finish_adding();
            self.pages.wait_for_empty().await;
            self.records.finish_adding();
            tokio::join!(self.console.wait_for_empty(), self.records.wait_for_empty());
        };
        if tokio::time::timeout(self.drain_timeout, flush_all)
            .await
            .is_err()
        {
            warn!("feedback drain timed out, some reporting was lost");
        }

        let mut errors = 0usize;
        {
            let mut rx = self.error_rx.lock();
            while rx.try_recv().is_ok() {
                errors += 1;
            }
        }
        if errors > 0 {
            warn!(count = errors, "feedback errors during job reporting");
        }
    }
}

struct TimelineSink {
    timeline: Arc<dyn TimelineApi>,
    plan_id: PlanId,
    timeline_id: TimelineId,
}

#[async_trait]
impl BatchSink<TimelineRecord> for TimelineSink {
    async fn flush(&self, items: Vec<TimelineRecord>) -> Result<(), ApiError> {
        if items.is_empty() {
            return Ok(());
        }
        self.timeline
            .update_records(&self.plan_id, &self.timeline_id, items)
            .await
    }
}

struct ConsoleSink {
    timeline: Arc<dyn TimelineApi>,
    plan_id: PlanId,
    timeline_id: TimelineId,
    record_id: RecordId,
}

#[async_trait]
impl BatchSink<String> for ConsoleSink {
    async fn flush(&self, items: Vec<String>) -> Result<(), ApiError> {
        if items.is_empty() {
            return Ok(());
        }
        self.timeline
            .append_feed(&self.plan_id, &self.timeline_id, &self.record_id, items)
            .await
    }
}

/// Uploads finished pages, creating each record's server log on first page
/// and writing the log reference back through the timeline queue.
///
/// A failed page is skipped, not requeued: later pages of the same record
/// still upload, and a failed log creation is retried on the record's next
/// page.
struct PageSink {
    timeline: Arc<dyn TimelineApi>,
    plan_id: PlanId,
    records: KeyedBatch<RecordId, TimelineRecord>,
    logs: Mutex<HashMap<RecordId, TaskLogReference>>,
    error_tx: mpsc::UnboundedSender<BatchError>,
}

impl PageSink {
    async fn log_for(&self, record_id: &RecordId) -> Option<TaskLogReference> {
        if let Some(log) = self.logs.lock().get(record_id) {
            return Some(*log);
        }
        let path = format!("logs/{record_id}");
        match self.timeline.create_log(&self.plan_id, &path).await {
            Ok(log) => {
                self.logs.lock().insert(record_id.clone(), log);
                match self
                    .records
                    .get_or_add(record_id.clone(), || TimelineRecord::stub(record_id.clone()))
                {
                    Ok(slot) => slot.lock().log = Some(log),
                    Err(_) => warn!(record_id = %record_id, "log reference lost, timeline closed"),
                }
                Some(log)
            }
            Err(e) => {
                warn!(record_id = %record_id, error = %e, "log creation failed");
                let _ = self.error_tx.send(BatchError::Api(e));
                None
            }
        }
    }
}

#[async_trait]
impl BatchSink<LogPageInfo> for PageSink {
    async fn flush(&self, pages: Vec<LogPageInfo>) -> Result<(), ApiError> {
        for page in pages {
            let Some(log) = self.log_for(&page.record_id).await else {
                continue;
            };
            if let Err(e) = self
                .timeline
                .upload_log_page(&self.plan_id, log, &page.path)
                .await
            {
                warn!(
                    record_id = %page.record_id,
                    page = page.page_number,
                    error = %e,
                    "skipping failed log page"
                );
                let _ = self.error_tx.send(BatchError::Api(e));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
