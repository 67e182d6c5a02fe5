//! Error types for the mdstory library.
//!
//! A single fatal error type, [`StoryError`], covers every way a render can
//! fail. There is no partial-success mode: a story is only useful when every
//! page is present and in order, so any stage failure aborts the request.
//!
//! Every failure that originates inside the pipeline carries the [`Stage`]
//! it came from (see [`StoryError::stage`]) and, for external-tool failures,
//! the tool's diagnostic output verbatim (see [`StoryError::diagnostics`]).

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The pipeline step a failure originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Creating or removing the per-request working directory.
    Workspace,
    /// Markdown + stylesheet → paginated PDF.
    Layout,
    /// Paginated PDF → one raster file per page.
    Raster,
    /// Reading the raster files back into memory.
    Collect,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Workspace => "workspace",
            Stage::Layout => "layout",
            Stage::Raster => "raster",
            Stage::Collect => "collect",
        })
    }
}

/// All fatal errors returned by the mdstory library.
#[derive(Debug, Error)]
pub enum StoryError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Markdown was empty or whitespace-only.
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// The ephemeral working directory could not be created or removed.
    #[error("Workspace error at '{path}': {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stage 1 failed: the layout tool exited non-zero or wrote no document.
    #[error("Layout stage failed: {reason}")]
    LayoutFailure { reason: String, diagnostics: String },

    /// Stage 2 failed: the rasterizer exited non-zero or produced no valid pages.
    #[error("Rasterisation stage failed: {reason}")]
    RasterFailure { reason: String, diagnostics: String },

    /// A page artifact was unreadable, empty, or not a decodable image.
    #[error("Failed to collect page {}: {detail} ('{path}')", page_label(.page))]
    CollectionFailure {
        page: Option<usize>,
        path: PathBuf,
        detail: String,
    },

    /// A stage exceeded the configured timeout; its process was killed.
    #[error("{stage} stage timed out after {secs}s")]
    StageTimeout { stage: Stage, secs: u64 },

    // ── Setup errors ──────────────────────────────────────────────────────
    /// A required external executable could not be located.
    #[error(transparent)]
    ToolNotFound(#[from] story_toolchain::ToolchainError),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A stylesheet file could not be read.
    #[error("Failed to read stylesheet '{path}': {source}")]
    StyleSheetRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write an output image file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// ZIP packaging failed.
    #[error("Failed to build archive: {0}")]
    Archive(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoryError {
    /// The pipeline stage this error originated in, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            StoryError::Workspace { .. } => Some(Stage::Workspace),
            StoryError::LayoutFailure { .. } => Some(Stage::Layout),
            StoryError::RasterFailure { .. } => Some(Stage::Raster),
            StoryError::CollectionFailure { .. } => Some(Stage::Collect),
            StoryError::StageTimeout { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Diagnostic output captured from the failing external tool.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            StoryError::LayoutFailure { diagnostics, .. }
            | StoryError::RasterFailure { diagnostics, .. }
                if !diagnostics.trim().is_empty() =>
            {
                Some(diagnostics.as_str())
            }
            _ => None,
        }
    }

    /// Whether the failure was caused by the caller's input rather than the host.
    pub fn is_client_error(&self) -> bool {
        matches!(self, StoryError::InvalidInput { .. })
    }

    /// Build the structured payload returned to HTTP-style callers.
    pub fn to_payload(&self) -> ErrorPayload {
        if self.is_client_error() {
            return ErrorPayload {
                error: "No markdown content provided".to_string(),
                details: None,
                stage: None,
            };
        }

        let details = match self.diagnostics() {
            Some(diag) => format!("{self}\n{}", diag.trim_end()),
            None => self.to_string(),
        };

        ErrorPayload {
            error: "Failed to convert markdown".to_string(),
            details: Some(details),
            stage: self.stage(),
        }
    }
}

fn page_label(page: &Option<usize>) -> String {
    page.map_or_else(|| "?".to_string(), |p| p.to_string())
}

/// JSON error body for HTTP-style callers: a short message plus tool diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
}
