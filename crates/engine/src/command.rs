// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Embedded task commands.
//!
//! Tasks talk back to the agent through magic stdout lines of the form
//! `##drover[name key=value;key2=value2]message`. Lines that do not parse
//! as a command pass through as ordinary output.

use crate::channel::FeedbackChannel;
use drover_adapters::{ArtifactRef, FileUpload};
use drover_core::{Issue, IssueKind, RecordId, SecretMasker, TaskResult};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::warn;

pub const COMMAND_PREFIX: &str = "##drover[";

/// One parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCommand {
    pub name: String,
    pub properties: HashMap<String, String>,
    pub message: String,
}

/// Parse one output line. `None` means the line is not a command and
/// belongs in the log.
pub fn parse(line: &str) -> Option<TaskCommand> {
    let rest = line.strip_prefix(COMMAND_PREFIX)?;
    let end = rest.find(']')?;
    let header = &rest[..end];
    let message = rest[end + 1..].to_string();

    let (name, props) = match header.split_once(' ') {
        Some((name, props)) => (name, Some(props)),
        None => (header, None),
    };
    if name.is_empty() {
        return None;
    }

    let mut properties = HashMap::new();
    if let Some(props) = props {
        for pair in props.split(';') {
            if let Some((key, value)) = pair.split_once('=') {
                let key = key.trim();
                if !key.is_empty() {
                    properties.insert(key.to_string(), value.to_string());
                }
            }
        }
    }

    Some(TaskCommand {
        name: name.to_string(),
        properties,
        message,
    })
}

/// Applies commands found in one task's output stream.
///
/// Synchronous commands take effect immediately, in stream order. Uploads
/// are queued and the task is not complete until `drain_uploads` returns.
pub struct CommandDispatcher {
    channel: Arc<FeedbackChannel>,
    record_id: RecordId,
    variables: Arc<Mutex<HashMap<String, String>>>,
    masker: SecretMasker,
    uploads: JoinSet<()>,
    forced_result: Option<TaskResult>,
}

impl CommandDispatcher {
    pub fn new(
        channel: Arc<FeedbackChannel>,
        record_id: RecordId,
        variables: Arc<Mutex<HashMap<String, String>>>,
        masker: SecretMasker,
    ) -> Self {
        Self {
            channel,
            record_id,
            variables,
            masker,
            uploads: JoinSet::new(),
            forced_result: None,
        }
    }

    /// Result forced by a `task.complete` command, if any.
    pub fn forced_result(&self) -> Option<TaskResult> {
        self.forced_result
    }

    /// Returns true when the line was consumed as a command.
    pub fn dispatch(&mut self, line: &str) -> bool {
        let Some(cmd) = parse(line) else {
            return false;
        };
        match cmd.name.as_str() {
            "task.setvariable" => self.set_variable(&cmd),
            "task.logissue" => self.log_issue(&cmd),
            "task.complete" => self.complete(&cmd),
            "task.setprogress" => self.set_progress(&cmd),
            "artifact.upload" => self.queue_upload(&cmd),
            other => {
                warn!(command = other, "unrecognized task command");
            }
        }
        true
    }

    /// Wait for queued uploads; the task is not done until they are.
    pub async fn drain_uploads(&mut self) {
        while self.uploads.join_next().await.is_some() {}
    }

    fn set_variable(&self, cmd: &TaskCommand) {
        let Some(name) = cmd.properties.get("variable") else {
            warn!("task.setvariable without a variable name");
            return;
        };
        if cmd.properties.get("issecret").map(String::as_str) == Some("true") {
            self.masker.add_value(&cmd.message);
        }
        self.variables
            .lock()
            .insert(name.clone(), cmd.message.clone());
    }

    fn log_issue(&self, cmd: &TaskCommand) {
        let kind = match cmd.properties.get("type").map(String::as_str) {
            Some("warning") => IssueKind::Warning,
            _ => IssueKind::Error,
        };
        let category = cmd
            .properties
            .get("source")
            .cloned()
            .unwrap_or_else(|| "Task".to_string());
        self.channel.add_issue(
            &self.record_id,
            Issue {
                kind,
                category,
                message: self.masker.mask(&cmd.message),
            },
        );
    }

    fn complete(&mut self, cmd: &TaskCommand) {
        let result = cmd.properties.get("result").map(String::as_str);
        self.forced_result = match result {
            Some(r) if r.eq_ignore_ascii_case("succeeded") => Some(TaskResult::Succeeded),
            Some(r) if r.eq_ignore_ascii_case("succeededwithissues") => {
                Some(TaskResult::SucceededWithIssues)
            }
            Some(r) if r.eq_ignore_ascii_case("failed") => Some(TaskResult::Failed),
            other => {
                warn!(result = ?other, "task.complete with unknown result");
                self.forced_result
            }
        };
    }

    fn set_progress(&self, cmd: &TaskCommand) {
        let percent = cmd
            .properties
            .get("value")
            .and_then(|v| v.trim().parse::<u32>().ok())
            .map(|v| v.min(100) as u8);
        let Some(percent) = percent else {
            warn!("task.setprogress without a numeric value");
            return;
        };
        let operation = (!cmd.message.is_empty()).then(|| cmd.message.clone());
        self.channel.set_progress(&self.record_id, percent, operation);
    }

    fn queue_upload(&mut self, cmd: &TaskCommand) {
        let Some(container_id) = cmd
            .properties
            .get("containerid")
            .and_then(|v| v.parse::<u64>().ok())
        else {
            warn!("artifact.upload without a container id");
            return;
        };
        let Some(artifact_name) = cmd.properties.get("artifactname").cloned() else {
            warn!("artifact.upload without an artifact name");
            return;
        };
        let folder = cmd
            .properties
            .get("containerfolder")
            .cloned()
            .unwrap_or_else(|| artifact_name.clone());
        let path = PathBuf::from(&cmd.message);
        let channel = Arc::clone(&self.channel);

        self.uploads.spawn(async move {
            let contents = match tokio::fs::read(&path).await {
                Ok(contents) => contents,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "artifact file unreadable");
                    return;
                }
            };
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "artifact".to_string());
            let upload = FileUpload {
                container_id,
                item_path: format!("{folder}/{file_name}"),
                content_id: Sha256::digest(&contents).to_vec(),
                uncompressed_len: contents.len() as u64,
                contents,
                is_gzipped: false,
            };
            if let Err(e) = channel.upload_file(upload).await {
                warn!(error = %e, "artifact upload failed");
                return;
            }
            let artifact = ArtifactRef {
                name: artifact_name,
                artifact_type: "Container".to_string(),
                data: format!("#/{container_id}/{folder}"),
            };
            if let Err(e) = channel.post_artifact(artifact).await {
                warn!(error = %e, "artifact registration failed");
            }
        });
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
