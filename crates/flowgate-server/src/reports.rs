// crates/flowgate-server/src/reports.rs
// ============================================================================
// Module: Compliance Reports
// Description: On-disk report generation for an organization.
// Purpose: Persist per-org report files with the canonical naming scheme.
// Dependencies: flowgate-core, serde_json
// ============================================================================

//! ## Overview
//! Generated compliance reports land in one directory as
//! `<sanitized-org-id>_<epoch-ms>.json`. The sanitizer keeps only
//! `[A-Za-z0-9-]` from the org id so the file name never carries path
//! metacharacters. PDF rendering is an external collaborator; this module
//! produces the JSON artifact it feeds on.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use flowgate_core::ApiError;
use flowgate_core::OrgId;
use flowgate_core::Timestamp;
use serde_json::Value;

// ============================================================================
// SECTION: Report Writer
// ============================================================================

/// Writes per-org report files under one directory.
///
/// # Invariants
/// - File names are `<sanitized-org-id>_<epoch-ms>.json`.
pub struct ReportWriter {
    /// Output directory, created on first write.
    dir: PathBuf,
}

impl ReportWriter {
    /// Creates a writer rooted at `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
        }
    }

    /// Writes one report and returns its path.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Internal`] when the directory or file cannot be
    /// written.
    pub fn write_report(&self, org_id: OrgId, report: &Value) -> Result<PathBuf, ApiError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|err| ApiError::Internal(format!("report dir: {err}")))?;
        let name = format!(
            "{}_{}.json",
            sanitize_org_id(org_id),
            Timestamp::now().as_unix_millis()
        );
        let path = self.dir.join(name);
        let rendered = serde_json::to_vec_pretty(report)
            .map_err(|err| ApiError::Internal(format!("report encode: {err}")))?;
        std::fs::write(&path, rendered)
            .map_err(|err| ApiError::Internal(format!("report write: {err}")))?;
        Ok(path)
    }

    /// Returns the output directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Keeps only `[A-Za-z0-9-]` from the org id's textual form.
fn sanitize_org_id(org_id: OrgId) -> String {
    org_id
        .to_string()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect()
}
