// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Paging log writer: splits one record's output stream into fixed-size
//! page files so upload can trail execution.
//!
//! Pages live under `<root>/pages/` as `<series>_<n>.page`. A page is
//! finalized (flushed, closed, announced) exactly once, either when it
//! fills or at `end()`.

use drover_core::{LogPageInfo, RecordId, SecretMasker};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Lines per page before rollover.
pub const DEFAULT_PAGE_SIZE: u32 = 256;

pub struct PagingLogger {
    pages_dir: PathBuf,
    series: String,
    record_id: RecordId,
    masker: SecretMasker,
    page_size: u32,
    page_tx: mpsc::UnboundedSender<LogPageInfo>,
    current: Option<OpenPage>,
    next_page: u32,
}

struct OpenPage {
    writer: BufWriter<File>,
    path: PathBuf,
    page_number: u32,
    line_count: u32,
}

impl PagingLogger {
    /// Create the `pages/` directory under `root` and an empty logger for
    /// one record's output.
    pub fn new(
        root: &std::path::Path,
        record_id: RecordId,
        masker: SecretMasker,
        page_tx: mpsc::UnboundedSender<LogPageInfo>,
    ) -> io::Result<Self> {
        let pages_dir = root.join("pages");
        std::fs::create_dir_all(&pages_dir)?;
        Ok(Self {
            pages_dir,
            series: Uuid::new_v4().to_string(),
            record_id,
            masker,
            page_size: DEFAULT_PAGE_SIZE,
            page_tx,
            current: None,
            next_page: 0,
        })
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Mask and append one line, rolling the page over when it fills.
    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        let masked = self.masker.mask(line);
        if self.current.is_none() {
            let page_number = self.next_page;
            self.next_page += 1;
            let path = self
                .pages_dir
                .join(format!("{}_{}.page", self.series, page_number));
            let writer = BufWriter::new(File::create(&path)?);
            self.current = Some(OpenPage {
                writer,
                path,
                page_number,
                line_count: 0,
            });
        }
        let mut full = false;
        if let Some(page) = self.current.as_mut() {
            writeln!(page.writer, "{masked}")?;
            page.line_count += 1;
            full = page.line_count >= self.page_size;
        }
        if full {
            self.finalize_current()?;
        }
        Ok(())
    }

    /// Close the stream, finalizing any partially filled page.
    pub fn end(&mut self) -> io::Result<()> {
        self.finalize_current()
    }

    fn finalize_current(&mut self) -> io::Result<()> {
        let Some(mut page) = self.current.take() else {
            return Ok(());
        };
        page.writer.flush()?;
        let _ = self.page_tx.send(LogPageInfo {
            record_id: self.record_id.clone(),
            path: page.path,
            page_number: page.page_number,
            line_count: page.line_count,
        });
        Ok(())
    }
}

#[cfg(test)]
#[path = "paging_tests.rs"]
mod tests;
