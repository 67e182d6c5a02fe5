//! # story-toolchain
//!
//! Locate the external executables the `mdstory` pipeline shells out to:
//! `pandoc` (markdown → HTML → PDF driver), `weasyprint` (the HTML/CSS
//! paginator pandoc hands the document to) and `pdftoppm` (poppler's
//! PDF → raster converter).
//!
//! ## How it works
//!
//! [`resolve`] walks three sources, first match wins:
//!
//! 1. An explicit path supplied by the caller (must exist).
//! 2. The tool's environment override, e.g. `MDSTORY_PANDOC=/opt/pandoc/bin/pandoc`.
//! 3. A `PATH` lookup via the [`which`] crate.
//!
//! `PATH` hits are cached for the lifetime of the process, so concurrent
//! renders never repeat the directory scan.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use story_toolchain::{check_toolchain, resolve, Tool};
//!
//! let pandoc = resolve(Tool::Pandoc, None).expect("pandoc missing");
//! println!("pandoc at {}", pandoc.display());
//!
//! for (tool, result) in check_toolchain() {
//!     println!("{tool}: {}", if result.is_ok() { "ok" } else { "missing" });
//! }
//! ```
//!
//! ## Environment variable overrides
//!
//! | Tool | Variable |
//! |------|----------|
//! | pandoc | `MDSTORY_PANDOC` |
//! | pdftoppm | `MDSTORY_PDFTOPPM` |
//! | weasyprint | `MDSTORY_WEASYPRINT` |

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use thiserror::Error;

// ── Tools ────────────────────────────────────────────────────────────────────

/// An external executable the rendering pipeline depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    /// Markdown → HTML5 → PDF driver (stage 1).
    Pandoc,
    /// HTML/CSS paginator invoked by pandoc as its `--pdf-engine`.
    Weasyprint,
    /// PDF → one raster file per page (stage 2).
    Pdftoppm,
}

impl Tool {
    /// Every tool, in pipeline order.
    pub const ALL: [Tool; 3] = [Tool::Pandoc, Tool::Weasyprint, Tool::Pdftoppm];

    /// Executable name looked up on `PATH`.
    pub fn program(self) -> &'static str {
        match self {
            Tool::Pandoc => "pandoc",
            Tool::Weasyprint => "weasyprint",
            Tool::Pdftoppm => "pdftoppm",
        }
    }

    /// Environment variable that overrides the `PATH` lookup.
    pub fn env_var(self) -> &'static str {
        match self {
            Tool::Pandoc => "MDSTORY_PANDOC",
            Tool::Weasyprint => "MDSTORY_WEASYPRINT",
            Tool::Pdftoppm => "MDSTORY_PDFTOPPM",
        }
    }

    /// Install instructions shown when the tool cannot be found.
    pub fn install_hint(self) -> &'static str {
        match self {
            Tool::Pandoc => "Install pandoc (https://pandoc.org/installing.html), e.g. `apt install pandoc` or `brew install pandoc`.",
            Tool::Weasyprint => "Install WeasyPrint (https://doc.courtbouillon.org/weasyprint), e.g. `pip install weasyprint` or `brew install weasyprint`.",
            Tool::Pdftoppm => "Install poppler-utils, e.g. `apt install poppler-utils` or `brew install poppler`.",
        }
    }

    fn slot(self) -> usize {
        match self {
            Tool::Pandoc => 0,
            Tool::Weasyprint => 1,
            Tool::Pdftoppm => 2,
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.program())
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned while resolving a tool.
#[derive(Error, Debug)]
pub enum ToolchainError {
    /// An explicit path (argument or environment override) does not exist.
    #[error("{tool} not found at '{path}' (from {origin})")]
    MissingPath {
        tool: Tool,
        path: PathBuf,
        origin: String,
    },

    /// The tool is not on `PATH` and no override was given.
    #[error("{tool} not found on PATH. {hint}\nSet {env_var}=/path/to/{tool} to use a specific copy.")]
    NotFound {
        tool: Tool,
        env_var: &'static str,
        hint: &'static str,
    },
}

impl ToolchainError {
    /// The tool that failed to resolve.
    pub fn tool(&self) -> Tool {
        match self {
            ToolchainError::MissingPath { tool, .. } | ToolchainError::NotFound { tool, .. } => {
                *tool
            }
        }
    }
}

// ── Process-wide PATH cache ──────────────────────────────────────────────────

static PATH_HITS: [OnceLock<PathBuf>; 3] = [OnceLock::new(), OnceLock::new(), OnceLock::new()];

// ── Public API ───────────────────────────────────────────────────────────────

/// Resolve the executable for `tool`.
///
/// `explicit` takes precedence over the environment override, which takes
/// precedence over `PATH`. An explicit path or override that does not exist
/// is an error rather than a silent fallback, so a typo never picks up a
/// different binary.
pub fn resolve(tool: Tool, explicit: Option<&Path>) -> Result<PathBuf, ToolchainError> {
    if let Some(path) = explicit {
        return existing(tool, path, "explicit path");
    }

    if let Some(value) = std::env::var_os(tool.env_var()).filter(|v| !v.is_empty()) {
        return existing(tool, Path::new(&value), tool.env_var());
    }

    let slot = &PATH_HITS[tool.slot()];
    if let Some(hit) = slot.get() {
        return Ok(hit.clone());
    }

    let found = which::which(tool.program()).map_err(|_| ToolchainError::NotFound {
        tool,
        env_var: tool.env_var(),
        hint: tool.install_hint(),
    })?;

    // Ignore the race; both callers found the same file.
    let _ = slot.set(found.clone());
    Ok(found)
}

/// Returns `true` if `tool` resolves without an explicit path.
pub fn is_available(tool: Tool) -> bool {
    resolve(tool, None).is_ok()
}

/// Resolve every tool and report the outcome, in pipeline order.
pub fn check_toolchain() -> Vec<(Tool, Result<PathBuf, ToolchainError>)> {
    Tool::ALL
        .iter()
        .map(|&tool| (tool, resolve(tool, None)))
        .collect()
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn existing(tool: Tool, path: &Path, origin: &str) -> Result<PathBuf, ToolchainError> {
    if path.exists() {
        Ok(path.to_path_buf())
    } else {
        Err(ToolchainError::MissingPath {
            tool,
            path: path.to_path_buf(),
            origin: origin.to_string(),
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_wins() {
        let dir = tempfile::TempDir::new().unwrap();
        let fake = dir.path().join("pandoc");
        std::fs::write(&fake, "#!/bin/sh\n").unwrap();

        let resolved = resolve(Tool::Pandoc, Some(&fake)).expect("explicit path exists");
        assert_eq!(resolved, fake);
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let err = resolve(Tool::Pdftoppm, Some(Path::new("/definitely/not/pdftoppm")))
            .expect_err("path does not exist");
        assert_eq!(err.tool(), Tool::Pdftoppm);
        assert!(err.to_string().contains("/definitely/not/pdftoppm"));
        assert!(err.to_string().contains("explicit path"));
    }

    #[test]
    fn not_found_message_names_override() {
        let err = ToolchainError::NotFound {
            tool: Tool::Weasyprint,
            env_var: Tool::Weasyprint.env_var(),
            hint: Tool::Weasyprint.install_hint(),
        };
        let msg = err.to_string();
        assert!(msg.contains("weasyprint not found"), "got: {msg}");
        assert!(msg.contains("MDSTORY_WEASYPRINT"), "got: {msg}");
    }

    #[test]
    fn tool_metadata_nonempty() {
        for tool in Tool::ALL {
            assert!(!tool.program().is_empty());
            assert!(tool.env_var().starts_with("MDSTORY_"));
            assert!(!tool.install_hint().is_empty());
        }
    }

    #[test]
    fn check_toolchain_reports_every_tool() {
        let report = check_toolchain();
        let tools: Vec<Tool> = report.iter().map(|(t, _)| *t).collect();
        assert_eq!(tools, Tool::ALL.to_vec());
    }
}
