// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timeline records: per-step progress rows reported to the controller.

use crate::log::TaskLogReference;
use crate::RecordId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a timeline record.
///
/// Transitions are monotonic: Pending → InProgress → Completed, never
/// backward. Use [`TimelineRecord::advance_state`] to enforce this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    Pending,
    InProgress,
    Completed,
}

impl RecordState {
    fn rank(self) -> u8 {
        match self {
            RecordState::Pending => 0,
            RecordState::InProgress => 1,
            RecordState::Completed => 2,
        }
    }
}

crate::simple_display! {
    RecordState {
        Pending => "pending",
        InProgress => "in_progress",
        Completed => "completed",
    }
}

/// Outcome of a task, plugin step, or the whole job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskResult {
    Succeeded,
    Skipped,
    SucceededWithIssues,
    Failed,
}

impl TaskResult {
    /// Severity for aggregation: Failed > SucceededWithIssues > Skipped > Succeeded.
    fn severity(self) -> u8 {
        match self {
            TaskResult::Succeeded => 0,
            TaskResult::Skipped => 1,
            TaskResult::SucceededWithIssues => 2,
            TaskResult::Failed => 3,
        }
    }

    /// The worse of two results.
    pub fn worse(self, other: TaskResult) -> TaskResult {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }

    /// Worst result across phases; `Succeeded` when empty.
    pub fn worst_of(results: impl IntoIterator<Item = TaskResult>) -> TaskResult {
        results
            .into_iter()
            .fold(TaskResult::Succeeded, TaskResult::worse)
    }

    /// True for outcomes that do not fail the job.
    pub fn is_success(self) -> bool {
        !matches!(self, TaskResult::Failed)
    }
}

crate::simple_display! {
    TaskResult {
        Succeeded => "succeeded",
        Skipped => "skipped",
        SucceededWithIssues => "succeeded_with_issues",
        Failed => "failed",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Error,
    Warning,
}

crate::simple_display! {
    IssueKind {
        Error => "error",
        Warning => "warning",
    }
}

/// One error or warning attached to a timeline record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub kind: IssueKind,
    /// Where the issue came from, e.g. "Console" or "Task".
    pub category: String,
    pub message: String,
}

/// One row in the job's progress timeline.
///
/// Mutated incrementally by many setter calls on the feedback channel and
/// flushed as a batch keyed by record id; all fields except `id` are
/// optional so a batch carries only what changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineRecord {
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Record kind, e.g. "Job" or "Task".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_operation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent_complete: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<RecordState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<TaskLogReference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub error_count: u32,
    #[serde(default)]
    pub warning_count: u32,
}

impl TimelineRecord {
    /// Bare record stub; the keyed-batch factory creates these on first touch.
    pub fn stub(id: RecordId) -> Self {
        Self {
            id,
            parent_id: None,
            name: None,
            record_type: None,
            order: None,
            worker_name: None,
            current_operation: None,
            percent_complete: None,
            state: None,
            result: None,
            start_time: None,
            finish_time: None,
            log: None,
            issues: Vec::new(),
            error_count: 0,
            warning_count: 0,
        }
    }

    /// Advance state, never moving backward. Returns false when the
    /// transition would regress (the caller logs and drops it).
    pub fn advance_state(&mut self, next: RecordState) -> bool {
        match self.state {
            Some(current) if next.rank() < current.rank() => false,
            _ => {
                self.state = Some(next);
                true
            }
        }
    }

    /// Record an issue, keeping at most `cap` of its kind in the payload.
    /// Issues past the cap are dropped but still counted.
    pub fn add_issue(&mut self, issue: Issue, cap: usize) {
        let count = match issue.kind {
            IssueKind::Error => {
                self.error_count += 1;
                self.error_count
            }
            IssueKind::Warning => {
                self.warning_count += 1;
                self.warning_count
            }
        };
        if count as usize <= cap {
            self.issues.push(issue);
        }
    }
}

#[cfg(test)]
#[path = "timeline_tests.rs"]
mod tests;
