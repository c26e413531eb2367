// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! drover-core: data model for the drover fleet agent

pub mod macros;

pub mod clock;
pub mod id;
pub mod log;
pub mod mask;
pub mod message;
pub mod timeline;

pub use clock::{Clock, FakeClock, SystemClock};
pub use log::{LogPageInfo, TaskLogReference};
pub use mask::SecretMasker;
#[cfg(any(test, feature = "test-support"))]
pub use message::{JobMessageBuilder, TaskInstanceBuilder};
pub use message::{JobInfo, JobMessage, MaskHint, MaskKind, ServiceEndpoint, TaskInstance};
pub use timeline::{Issue, IssueKind, RecordState, TaskResult, TimelineRecord};

crate::define_id! {
    /// Identifier of one job execution request.
    pub struct JobId("job-");
}

crate::define_id! {
    /// Identifier of the orchestration plan a job belongs to.
    pub struct PlanId("plan-");
}

crate::define_id! {
    /// Identifier of the progress timeline attached to a plan.
    pub struct TimelineId("tl-");
}

crate::define_id! {
    /// Identifier of one timeline record (task or plugin step).
    ///
    /// Task records arrive with the job message (`instance_id`); plugin
    /// step records are generated locally when the plan is registered.
    pub struct RecordId("rec-");
}

crate::define_id! {
    /// Server-side handle owning the right to long-poll a pool queue.
    pub struct SessionId("ses-");
}

/// Identifier of the agent pool a session polls in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, Default,
)]
#[serde(transparent)]
pub struct PoolId(pub u32);

impl std::fmt::Display for PoolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
