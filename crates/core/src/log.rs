// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! References to server-side task logs and locally written log pages.

use crate::RecordId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Handle to a server-side log container, attached to a timeline record
/// once the first page of its output has been uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskLogReference {
    pub id: u64,
}

/// One completed page of task output, ready for upload.
///
/// Emitted by the paging logger when a page fills up or the stream ends;
/// consumed by the log page upload queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogPageInfo {
    /// Timeline record whose output this page belongs to.
    pub record_id: RecordId,
    /// Path of the page file on local disk.
    pub path: PathBuf,
    /// Zero-based page index within the record's output.
    pub page_number: u32,
    /// Number of lines written to this page.
    pub line_count: u32,
}
