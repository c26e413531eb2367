// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timeline reporting: record batches, console feed, and task logs.

use crate::error::ApiError;
use async_trait::async_trait;
use drover_core::{PlanId, RecordId, TaskLogReference, TimelineId, TimelineRecord};
use std::path::Path;

/// Timeline-side operations used by the feedback channel's flush sinks.
#[async_trait]
pub trait TimelineApi: Send + Sync + 'static {
    /// Create a server-side log container for one record's output.
    async fn create_log(&self, plan_id: &PlanId, path: &str)
        -> Result<TaskLogReference, ApiError>;

    /// Append one finished page file to an existing log.
    async fn upload_log_page(
        &self,
        plan_id: &PlanId,
        log: TaskLogReference,
        page: &Path,
    ) -> Result<(), ApiError>;

    /// Apply a batch of partial record updates, in order.
    async fn update_records(
        &self,
        plan_id: &PlanId,
        timeline_id: &TimelineId,
        records: Vec<TimelineRecord>,
    ) -> Result<(), ApiError>;

    /// Append live console lines to a record's feed.
    async fn append_feed(
        &self,
        plan_id: &PlanId,
        timeline_id: &TimelineId,
        record_id: &RecordId,
        lines: Vec<String>,
    ) -> Result<(), ApiError>;
}
