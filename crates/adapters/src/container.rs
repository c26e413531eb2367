// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File container uploads and artifact registration.

use crate::error::ApiError;
use async_trait::async_trait;
use drover_core::PlanId;

/// One file destined for a server-side file container.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub container_id: u64,
    /// Path of the item inside the container, e.g. "drop/bin/app".
    pub item_path: String,
    pub contents: Vec<u8>,
    /// SHA-256 of the uncompressed contents.
    pub content_id: Vec<u8>,
    pub uncompressed_len: u64,
    pub is_gzipped: bool,
}

/// Artifact metadata linking an uploaded container path to the plan.
#[derive(Debug, Clone)]
pub struct ArtifactRef {
    pub name: String,
    pub artifact_type: String,
    /// Locator understood by the artifact type, e.g. a container path.
    pub data: String,
}

#[async_trait]
pub trait ContainerApi: Send + Sync + 'static {
    async fn upload_file(&self, upload: FileUpload) -> Result<(), ApiError>;

    async fn post_artifact(&self, plan_id: &PlanId, artifact: ArtifactRef)
        -> Result<(), ApiError>;
}
