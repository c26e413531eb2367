// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Secret redaction applied to every log line before it reaches disk.

use crate::{MaskHint, MaskKind};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

const REPLACEMENT: &str = "********";

/// Secrets shorter than this are ignored; masking 1-2 character values
/// would shred ordinary output.
const MIN_SECRET_LEN: usize = 3;

/// Replaces known secret values in text with `********`.
///
/// Cheap to clone; all clones share one secret list, so a secret added
/// mid-job (via a set-variable command) is masked by every writer from
/// that point on.
#[derive(Clone, Default)]
pub struct SecretMasker {
    values: Arc<Mutex<Vec<String>>>,
}

impl SecretMasker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the masker from the job message's hints. `Variable` hints are
    /// resolved against the job variables; `Literal` hints carry the raw
    /// secret directly.
    pub fn from_hints(hints: &[MaskHint], variables: &HashMap<String, String>) -> Self {
        let masker = Self::new();
        for hint in hints {
            match hint.kind {
                MaskKind::Variable => {
                    if let Some(value) = lookup_ci(variables, &hint.value) {
                        masker.add_value(value);
                    }
                }
                MaskKind::Literal => masker.add_value(&hint.value),
            }
        }
        masker
    }

    /// Register a secret value. Short values are ignored.
    pub fn add_value(&self, value: &str) {
        if value.len() < MIN_SECRET_LEN {
            return;
        }
        let mut values = self.values.lock();
        if !values.iter().any(|v| v == value) {
            values.push(value.to_string());
            // longest-first so nested secrets redact fully
            values.sort_by(|a, b| b.len().cmp(&a.len()));
        }
    }

    /// Redact every registered secret in `text`.
    pub fn mask(&self, text: &str) -> String {
        let values = self.values.lock();
        let mut out = text.to_string();
        for value in values.iter() {
            if out.contains(value.as_str()) {
                out = out.replace(value.as_str(), REPLACEMENT);
            }
        }
        out
    }
}

fn lookup_ci<'a>(variables: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    variables
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
#[path = "mask_tests.rs"]
mod tests;
