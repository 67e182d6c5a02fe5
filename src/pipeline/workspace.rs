//! Workspace Manager: one disposable directory per render.
//!
//! A [`Workspace`] wraps a [`tempfile::TempDir`] whose name carries a random
//! suffix, so concurrent renders never collide. Every artifact of a render
//! (source markdown, stylesheets, the paginated PDF, the page rasters) lives
//! in fixed slots inside it.
//!
//! Release is guaranteed on every exit path. [`Workspace::release`] removes
//! the directory and reports failures; if a workspace is dropped without
//! being released (panic, cancelled future, early `?`), the `TempDir`
//! destructor removes it instead.

use crate::config::RenderConfig;
use crate::error::StoryError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

const SOURCE_FILE: &str = "input.md";
const STYLE_FILE: &str = "styles.css";
const GEOMETRY_FILE: &str = "page.css";
const DOCUMENT_FILE: &str = "output.pdf";
/// File-name prefix the rasterizer writes pages under.
pub(crate) const RASTER_PREFIX: &str = "page";

/// An isolated, uniquely named working directory for one render.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a new workspace under `parent` named `<prefix><random>`.
    ///
    /// Fails with [`StoryError::Workspace`] if the directory cannot be created.
    pub fn acquire(parent: &Path, prefix: &str) -> Result<Self, StoryError> {
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir_in(parent)
            .map_err(|e| StoryError::Workspace {
                path: parent.to_path_buf(),
                source: e,
            })?;
        debug!("Acquired workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    /// Create a workspace as configured by `config`.
    pub fn acquire_for(config: &RenderConfig) -> Result<Self, StoryError> {
        Self::acquire(&config.workspace_parent(), &config.workspace_prefix)
    }

    /// Remove the workspace and everything in it.
    pub fn release(self) -> Result<(), StoryError> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().map_err(|e| StoryError::Workspace {
            path: path.clone(),
            source: e,
        })?;
        debug!("Released workspace {}", path.display());
        Ok(())
    }

    /// Remove the workspace, logging instead of returning any failure.
    ///
    /// Used on paths where an earlier, more specific error is already being
    /// returned to the caller.
    pub fn release_logged(self) {
        if let Err(e) = self.release() {
            warn!("Failed to remove workspace: {}", e);
        }
    }

    /// Root directory of the workspace.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Slot for the markdown source.
    pub fn source_path(&self) -> PathBuf {
        self.dir.path().join(SOURCE_FILE)
    }

    /// Slot for the typography stylesheet.
    pub fn style_path(&self) -> PathBuf {
        self.dir.path().join(STYLE_FILE)
    }

    /// Slot for the page-geometry stylesheet.
    pub fn geometry_path(&self) -> PathBuf {
        self.dir.path().join(GEOMETRY_FILE)
    }

    /// Slot for the paginated document produced by the layout stage.
    pub fn document_path(&self) -> PathBuf {
        self.dir.path().join(DOCUMENT_FILE)
    }

    /// Full path prefix handed to the rasterizer (`<workspace>/page`).
    pub fn raster_prefix_path(&self) -> PathBuf {
        self.dir.path().join(RASTER_PREFIX)
    }
}
