//! Stage 2: paginated PDF → one raster file per page.
//!
//! [`Rasterizer`] is the seam; [`PdftoppmRasterizer`] is the production
//! implementation. pdftoppm writes `<prefix>-<N>.<ext>` for every page, with
//! `N` zero-padded to the digit count of the page total. The padding width
//! therefore changes with document length (`page-1.png` vs `page-01.png`),
//! which is why the collector orders pages by parsed index rather than by
//! file name.

use crate::config::RasterFormat;
use crate::error::StoryError;
use crate::pipeline::layout::PaginatedDocument;
use crate::pipeline::tool::{run_tool, ToolError, ToolRun};
use crate::pipeline::workspace::Workspace;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::info;

/// Inputs for one rasterisation.
#[derive(Debug, Clone)]
pub struct RasterJob<'a> {
    /// Paginated document to rasterise.
    pub document: &'a Path,
    /// Output resolution.
    pub dpi: u32,
    /// Output encoding.
    pub format: RasterFormat,
    /// Path prefix; pages are written as `<prefix>-<N>.<ext>`.
    pub prefix: &'a Path,
    /// Working directory for the process.
    pub workdir: &'a Path,
}

/// Converts a paginated document into one image file per page.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Write every page of `job.document` under `job.prefix`.
    async fn rasterize(&self, job: &RasterJob<'_>) -> Result<ToolRun, ToolError>;
}

/// poppler's `pdftoppm`.
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    program: PathBuf,
}

impl PdftoppmRasterizer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Command-line arguments for `job`.
    pub fn args(&self, job: &RasterJob<'_>) -> Vec<OsString> {
        let format_flag = match job.format {
            RasterFormat::Png => "-png",
            RasterFormat::Jpeg => "-jpeg",
        };
        vec![
            format_flag.into(),
            "-r".into(),
            job.dpi.to_string().into(),
            job.document.as_os_str().to_owned(),
            job.prefix.as_os_str().to_owned(),
        ]
    }
}

#[async_trait]
impl Rasterizer for PdftoppmRasterizer {
    fn name(&self) -> &str {
        "pdftoppm"
    }

    async fn rasterize(&self, job: &RasterJob<'_>) -> Result<ToolRun, ToolError> {
        run_tool(&self.program, self.args(job), job.workdir).await
    }
}

/// Run stage 2 inside `workspace` against `document`.
///
/// Returns the rasterizer's run record; its diagnostics are attached to any
/// later "no pages" failure. A non-zero exit is a [`StoryError::RasterFailure`].
pub async fn run_raster(
    rasterizer: &dyn Rasterizer,
    workspace: &Workspace,
    document: &PaginatedDocument,
    dpi: u32,
    format: RasterFormat,
) -> Result<ToolRun, StoryError> {
    let prefix = workspace.raster_prefix_path();
    let job = RasterJob {
        document: &document.path,
        dpi,
        format,
        prefix: &prefix,
        workdir: workspace.path(),
    };

    let run = rasterizer.rasterize(&job).await.map_err(|e| {
        let (reason, diagnostics) = e.into_parts();
        StoryError::RasterFailure {
            reason,
            diagnostics,
        }
    })?;

    info!(
        "{} rasterised {} at {} DPI in {}ms",
        rasterizer.name(),
        document.path.display(),
        dpi,
        run.elapsed_ms
    );
    Ok(run)
}
