//! Render entry points: markdown in, ordered story pages out.
//!
//! [`StoryRenderer`] owns the resolved tools, the stylesheet and the config,
//! and runs the per-request state machine:
//!
//! ```text
//! Idle → WorkspaceAcquired → Stage1Complete → Stage2Complete → Collected → Released
//!                 └───────────────┴────────────────┴──────────────┴──→ Failed → Released
//! ```
//!
//! The workspace is released on every path before [`StoryRenderer::render`]
//! returns. A release failure is logged and never replaces the error that
//! ended the render. Dropping the render future instead (caller cancellation)
//! kills the running tool and lets the workspace destructor clean up.

use crate::config::RenderConfig;
use crate::error::{Stage, StoryError};
use crate::output::{RenderOutput, RenderStats, RenderedImage};
use crate::pipeline::collect::collect;
use crate::pipeline::layout::{run_layout, LayoutEngine, PandocLayout};
use crate::pipeline::raster::{run_raster, PdftoppmRasterizer, Rasterizer};
use crate::pipeline::workspace::Workspace;
use crate::style::StyleSheet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use story_toolchain::Tool;
use tracing::{debug, info, warn};

/// Renders markdown into story-format page images.
///
/// Cheap to clone; holds no per-request state, so one renderer can serve any
/// number of concurrent renders.
#[derive(Clone)]
pub struct StoryRenderer {
    config: RenderConfig,
    layout: Arc<dyn LayoutEngine>,
    rasterizer: Arc<dyn Rasterizer>,
    style: Arc<StyleSheet>,
}

impl std::fmt::Debug for StoryRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoryRenderer")
            .field("config", &self.config)
            .field("layout", &self.layout.name())
            .field("rasterizer", &self.rasterizer.name())
            .field("style", &self.style.name())
            .finish()
    }
}

impl StoryRenderer {
    /// Build a renderer backed by pandoc and pdftoppm.
    ///
    /// Resolves every executable up front, so a missing tool is reported here
    /// as [`StoryError::ToolNotFound`] rather than halfway through a render.
    pub fn new(config: RenderConfig) -> Result<Self, StoryError> {
        let pandoc = story_toolchain::resolve(Tool::Pandoc, config.pandoc_path.as_deref())?;
        let pdftoppm = story_toolchain::resolve(Tool::Pdftoppm, config.pdftoppm_path.as_deref())?;

        // pandoc accepts either an engine name or a path to it.
        let pdf_engine = if config.pdf_engine == Tool::Weasyprint.program() {
            story_toolchain::resolve(Tool::Weasyprint, None)?
                .to_string_lossy()
                .into_owned()
        } else {
            config.pdf_engine.clone()
        };

        debug!(
            "Toolchain: pandoc={}, pdftoppm={}, engine={}",
            pandoc.display(),
            pdftoppm.display(),
            pdf_engine
        );

        Ok(Self::with_engines(
            config,
            Arc::new(PandocLayout::new(pandoc, pdf_engine)),
            Arc::new(PdftoppmRasterizer::new(pdftoppm)),
        ))
    }

    /// Build a renderer around caller-supplied stage implementations.
    pub fn with_engines(
        config: RenderConfig,
        layout: Arc<dyn LayoutEngine>,
        rasterizer: Arc<dyn Rasterizer>,
    ) -> Self {
        Self {
            config,
            layout,
            rasterizer,
            style: StyleSheet::builtin(),
        }
    }

    /// Replace the built-in stylesheet.
    pub fn with_stylesheet(mut self, style: impl Into<Arc<StyleSheet>>) -> Self {
        self.style = style.into();
        self
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn stylesheet(&self) -> &StyleSheet {
        &self.style
    }

    /// Render `markdown` into ordered page images plus run statistics.
    ///
    /// # Errors
    /// - [`StoryError::InvalidInput`] if `markdown` is empty or whitespace-only
    /// - [`StoryError::Workspace`] if the working directory cannot be created
    /// - [`StoryError::LayoutFailure`], [`StoryError::RasterFailure`],
    ///   [`StoryError::CollectionFailure`] for stage failures, with the
    ///   tool's diagnostics attached
    /// - [`StoryError::StageTimeout`] if a stage exceeds `stage_timeout_secs`
    pub async fn render(&self, markdown: &str) -> Result<RenderOutput, StoryError> {
        if markdown.trim().is_empty() {
            return Err(StoryError::InvalidInput {
                reason: "markdown is empty or whitespace-only".to_string(),
            });
        }

        let total_start = Instant::now();
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_render_start();
        }

        let workspace = Workspace::acquire_for(&self.config).inspect_err(|e| {
            if let Some(ref cb) = self.config.progress_callback {
                cb.on_stage_error(Stage::Workspace, &e.to_string());
            }
        })?;
        info!(
            "Rendering {} bytes of markdown in {}",
            markdown.len(),
            workspace.path().display()
        );

        let result = self.run_stages(&workspace, markdown).await;
        workspace.release_logged();

        let (images, mut stats) = result?;
        stats.total_ms = total_start.elapsed().as_millis() as u64;

        info!(
            "Render complete: {} pages, {} bytes, {}ms total",
            stats.page_count, stats.total_bytes, stats.total_ms
        );
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_render_complete(stats.page_count);
        }

        Ok(RenderOutput { images, stats })
    }

    /// Render `markdown` and return only the ordered images.
    pub async fn render_markdown(&self, markdown: &str) -> Result<Vec<RenderedImage>, StoryError> {
        Ok(self.render(markdown).await?.into_images())
    }

    /// Render `markdown` and write `<prefix>-NN.<ext>` files into `dir`.
    ///
    /// Each file is written to a temporary name and renamed into place, so a
    /// reader never sees a partial image. Returns the paths in page order.
    pub async fn render_to_dir(
        &self,
        markdown: &str,
        dir: impl AsRef<Path>,
        prefix: &str,
    ) -> Result<Vec<PathBuf>, StoryError> {
        let images = self.render_markdown(markdown).await?;
        write_images(&images, dir.as_ref(), prefix).await
    }

    async fn run_stages(
        &self,
        workspace: &Workspace,
        markdown: &str,
    ) -> Result<(Vec<RenderedImage>, RenderStats), StoryError> {
        let (document, layout_ms) = self
            .stage(
                Stage::Layout,
                run_layout(
                    self.layout.as_ref(),
                    workspace,
                    markdown,
                    &self.style,
                    self.config.geometry,
                ),
            )
            .await?;

        let (raster_run, raster_ms) = self
            .stage(
                Stage::Raster,
                run_raster(
                    self.rasterizer.as_ref(),
                    workspace,
                    &document,
                    self.config.dpi,
                    self.config.raster_format,
                ),
            )
            .await?;

        let (images, collect_ms) = self
            .stage(
                Stage::Collect,
                collect(workspace, self.config.raster_format, &raster_run.diagnostics),
            )
            .await?;

        let stats = RenderStats {
            page_count: images.len(),
            total_bytes: images.iter().map(|img| img.bytes.len() as u64).sum(),
            layout_ms,
            raster_ms,
            collect_ms,
            total_ms: 0,
        };
        Ok((images, stats))
    }

    /// Run one stage with progress events and the optional timeout.
    async fn stage<T, F>(&self, stage: Stage, fut: F) -> Result<(T, u64), StoryError>
    where
        F: Future<Output = Result<T, StoryError>>,
    {
        let cb = self.config.progress_callback.as_ref();
        if let Some(cb) = cb {
            cb.on_stage_start(stage);
        }

        let started = Instant::now();
        let result = match self.config.stage_timeout_secs {
            // Dropping the timed-out future kills the stage's child process.
            Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), fut).await {
                Ok(result) => result,
                Err(_) => Err(StoryError::StageTimeout { stage, secs }),
            },
            None => fut.await,
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(value) => {
                debug!("{} stage finished in {}ms", stage, elapsed_ms);
                if let Some(cb) = cb {
                    cb.on_stage_complete(stage, elapsed_ms);
                }
                Ok((value, elapsed_ms))
            }
            Err(e) => {
                let origin = e.stage().unwrap_or(stage);
                warn!("{} stage failed after {}ms: {}", origin, elapsed_ms, e);
                if let Some(cb) = cb {
                    cb.on_stage_error(origin, &e.to_string());
                }
                Err(e)
            }
        }
    }
}

/// Render `markdown` with a renderer built from `config`.
///
/// Convenience for one-off renders; build a [`StoryRenderer`] once and reuse
/// it when rendering repeatedly.
///
/// # Example
/// ```rust,no_run
/// use mdstory::{render_markdown, RenderConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let pages = render_markdown("# Hello\n\nFirst slide.", &RenderConfig::default()).await?;
/// for page in &pages {
///     println!("page {}: {} bytes", page.page, page.bytes.len());
/// }
/// # Ok(())
/// # }
/// ```
pub async fn render_markdown(
    markdown: &str,
    config: &RenderConfig,
) -> Result<Vec<RenderedImage>, StoryError> {
    StoryRenderer::new(config.clone())?
        .render_markdown(markdown)
        .await
}

/// Synchronous wrapper around [`StoryRenderer::render`].
///
/// Creates a temporary tokio runtime internally; do not call from within an
/// async context.
pub fn render_sync(markdown: &str, config: &RenderConfig) -> Result<RenderOutput, StoryError> {
    let renderer = StoryRenderer::new(config.clone())?;
    render_sync_with(&renderer, markdown)
}

/// Synchronous render through an existing renderer.
pub fn render_sync_with(
    renderer: &StoryRenderer,
    markdown: &str,
) -> Result<RenderOutput, StoryError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| StoryError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(renderer.render(markdown))
}

/// Write `images` into `dir` as `<prefix>-NN.<ext>`, creating `dir` if needed.
///
/// Atomic per file: temp name, then rename.
pub async fn write_images(
    images: &[RenderedImage],
    dir: &Path,
    prefix: &str,
) -> Result<Vec<PathBuf>, StoryError> {
    if prefix.is_empty() || prefix.contains(['/', '\\']) {
        return Err(StoryError::InvalidConfig(format!(
            "output prefix '{prefix}' must be non-empty and contain no path separators"
        )));
    }

    let write_error = |path: &Path, e: std::io::Error| StoryError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| write_error(dir, e))?;

    let total = images.len();
    let mut written = Vec::with_capacity(total);
    for image in images {
        let name = image.file_name(prefix, total);
        let path = dir.join(&name);
        let tmp_path = dir.join(format!(".{name}.tmp"));

        tokio::fs::write(&tmp_path, &image.bytes)
            .await
            .map_err(|e| write_error(&path, e))?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(write_error(&path, e));
        }

        debug!("Wrote {} ({} bytes)", path.display(), image.bytes.len());
        written.push(path);
    }
    Ok(written)
}
