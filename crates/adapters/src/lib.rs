// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! drover-adapters: traits for everything the agent talks to.
//!
//! The engine and daemon are written against these traits; concrete REST
//! implementations live with the embedder. The `test-support` feature
//! exports in-memory fakes.

pub mod container;
pub mod error;
pub mod handler;
pub mod plugin;
pub mod queue;
pub mod task_manager;
pub mod timeline;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use container::{ArtifactRef, ContainerApi, FileUpload};
pub use error::ApiError;
pub use handler::{HandlerError, HandlerKind, TaskHandler, TaskInvocation};
pub use plugin::{JobPlugin, PluginContext, PluginError, PluginHooks};
pub use queue::{JobRequestPatch, NewSession, Poll, QueueApi, QueueMessage, Session};
pub use task_manager::{TaskManager, TaskManagerError};
pub use timeline::TimelineApi;

#[cfg(any(test, feature = "test-support"))]
pub use fake::{
    FakeContainerApi, FakeQueueApi, FakeTaskManager, FakeTimelineApi, ScriptedHandler,
    ScriptedRun, TestPlugin,
};
