// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job request message and its low-privilege projection.

use crate::{JobId, PlanId, RecordId, TimelineId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Immutable description of one unit of work, received once from the pool
/// queue. The agent never mutates the received message; the runner works on
/// a clone so input substitution stays local to one execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMessage {
    pub job_id: JobId,
    pub job_name: String,
    pub plan_id: PlanId,
    pub timeline_id: TimelineId,
    /// Server-side request row this job was assigned under.
    pub request_id: u64,
    /// Proof of ownership; renewed periodically while the job runs.
    pub lock_token: String,
    #[serde(default)]
    pub tasks: Vec<TaskInstance>,
    #[serde(default)]
    pub variables: HashMap<String, String>,
    #[serde(default)]
    pub endpoints: Vec<ServiceEndpoint>,
    #[serde(default)]
    pub mask_hints: Vec<MaskHint>,
}

impl JobMessage {
    /// The job's own timeline record shares the job id.
    pub fn job_record_id(&self) -> RecordId {
        RecordId::from_string(self.job_id.as_str())
    }

    /// Low-privilege projection handed to task and plugin code.
    pub fn job_info(&self) -> JobInfo {
        JobInfo {
            job_id: self.job_id.clone(),
            job_name: self.job_name.clone(),
            plan_id: self.plan_id.clone(),
            timeline_id: self.timeline_id.clone(),
            request_id: self.request_id,
            lock_token: self.lock_token.clone(),
            variables: self.variables.clone(),
        }
    }
}

/// Reduced view of a [`JobMessage`] passed to untrusted task code.
///
/// Carries ids, the lease token, and variables; deliberately excludes
/// service endpoint credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    pub job_id: JobId,
    pub job_name: String,
    pub plan_id: PlanId,
    pub timeline_id: TimelineId,
    pub request_id: u64,
    pub lock_token: String,
    pub variables: HashMap<String, String>,
}

/// One task in the job's declared execution order.
///
/// Read-only once the job starts, except `inputs`, which are rewritten by
/// variable substitution before execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInstance {
    /// Task definition id, shared by every job using this task.
    pub id: String,
    /// Timeline record id for this task within this job.
    pub instance_id: RecordId,
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub version: String,
    #[serde(default)]
    pub inputs: HashMap<String, String>,
    /// Demotes a failure to SucceededWithIssues instead of failing the job.
    #[serde(default)]
    pub continue_on_error: bool,
}

impl TaskInstance {
    /// Name shown on the timeline (display name when the definition has one).
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    /// Cache key for downloaded task bundles.
    pub fn key(&self) -> String {
        format!("{}:{}", self.id, self.version)
    }
}

/// Connection details for a service the job talks to (never exposed to
/// task code through [`JobInfo`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEndpoint {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub authorization: HashMap<String, String>,
}

/// Secret-redaction rule carried with the job message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskHint {
    pub kind: MaskKind,
    /// Variable name for `Variable` hints, raw secret for `Literal` hints.
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskKind {
    Variable,
    Literal,
}

crate::builder! {
    pub struct JobMessageBuilder => JobMessage {
        into {
            job_id: JobId = "job-1",
            job_name: String = "test job",
            plan_id: PlanId = "plan-1",
            timeline_id: TimelineId = "tl-1",
            lock_token: String = "lock-token-1",
        }
        set {
            request_id: u64 = 42,
            tasks: Vec<TaskInstance> = Vec::new(),
            variables: HashMap<String, String> = HashMap::new(),
            endpoints: Vec<ServiceEndpoint> = Vec::new(),
            mask_hints: Vec<MaskHint> = Vec::new(),
        }
    }
}

crate::builder! {
    pub struct TaskInstanceBuilder => TaskInstance {
        into {
            id: String = "task-def-1",
            instance_id: RecordId = "rec-1",
            name: String = "build",
            version: String = "1.0.0",
        }
        set {
            inputs: HashMap<String, String> = HashMap::new(),
            continue_on_error: bool = false,
        }
        option {
            display_name: String = None,
        }
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
