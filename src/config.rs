//! Configuration types for markdown-to-story rendering.
//!
//! All render behaviour is controlled through [`RenderConfig`], built via its
//! [`RenderConfigBuilder`]. One struct for every knob makes it trivial to
//! share a config across concurrent renders and to log exactly what a run
//! used.

use crate::error::StoryError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default raster resolution. CSS pixels are defined at 96 per inch, so at
/// this DPI one CSS pixel of the page becomes one pixel of the image.
pub const DEFAULT_DPI: u32 = 96;

/// Default workspace directory-name prefix.
pub const DEFAULT_WORKSPACE_PREFIX: &str = "markdown-ig-";

/// Configuration for a markdown-to-story render.
///
/// Built via [`RenderConfig::builder()`] or using [`RenderConfig::default()`].
///
/// # Example
/// ```rust
/// use mdstory::{RasterFormat, RenderConfig};
///
/// let config = RenderConfig::builder()
///     .dpi(96)
///     .raster_format(RasterFormat::Png)
///     .stage_timeout_secs(60)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct RenderConfig {
    /// Rasterisation DPI. Range: 36–600. Default: 96.
    ///
    /// The page is laid out in CSS pixels; at 96 DPI a 1080×1920 px page
    /// rasterises to exactly 1080×1920 image pixels. Raising it produces
    /// proportionally larger images of the same layout.
    pub dpi: u32,

    /// Target page size in CSS pixels. Default: 1080×1920 (story format).
    pub geometry: PageGeometry,

    /// Output image format. Default: PNG.
    pub raster_format: RasterFormat,

    /// HTML-to-PDF engine pandoc delegates pagination to. Default: `weasyprint`.
    ///
    /// Must be a CSS-paged-media engine; the page geometry and the stylesheet
    /// are only honoured by engines that read `@page` rules.
    pub pdf_engine: String,

    /// Explicit `pandoc` executable. If None, resolved from `MDSTORY_PANDOC` or `PATH`.
    pub pandoc_path: Option<PathBuf>,

    /// Explicit `pdftoppm` executable. If None, resolved from `MDSTORY_PDFTOPPM` or `PATH`.
    pub pdftoppm_path: Option<PathBuf>,

    /// Parent directory for per-request workspaces. If None, the system temp dir.
    pub workspace_root: Option<PathBuf>,

    /// Workspace directory-name prefix. Default: `markdown-ig-`.
    pub workspace_prefix: String,

    /// Upper bound on each external stage, in seconds. Default: None (unbounded).
    ///
    /// When a stage overruns, its process is killed and the render fails with
    /// [`StoryError::StageTimeout`]; the workspace is still removed.
    pub stage_timeout_secs: Option<u64>,

    /// Receives stage events as the render progresses.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            geometry: PageGeometry::default(),
            raster_format: RasterFormat::default(),
            pdf_engine: "weasyprint".to_string(),
            pandoc_path: None,
            pdftoppm_path: None,
            workspace_root: None,
            workspace_prefix: DEFAULT_WORKSPACE_PREFIX.to_string(),
            stage_timeout_secs: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for RenderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderConfig")
            .field("dpi", &self.dpi)
            .field("geometry", &self.geometry)
            .field("raster_format", &self.raster_format)
            .field("pdf_engine", &self.pdf_engine)
            .field("pandoc_path", &self.pandoc_path)
            .field("pdftoppm_path", &self.pdftoppm_path)
            .field("workspace_root", &self.workspace_root)
            .field("workspace_prefix", &self.workspace_prefix)
            .field("stage_timeout_secs", &self.stage_timeout_secs)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn RenderProgressCallback>"),
            )
            .finish()
    }
}

impl RenderConfig {
    /// Create a new builder for `RenderConfig`.
    pub fn builder() -> RenderConfigBuilder {
        RenderConfigBuilder {
            config: Self::default(),
        }
    }

    /// Directory workspaces are created in.
    pub fn workspace_parent(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

/// Builder for [`RenderConfig`].
pub struct RenderConfigBuilder {
    config: RenderConfig,
}

impl RenderConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn geometry(mut self, geometry: PageGeometry) -> Self {
        self.config.geometry = geometry;
        self
    }

    pub fn raster_format(mut self, format: RasterFormat) -> Self {
        self.config.raster_format = format;
        self
    }

    pub fn pdf_engine(mut self, engine: impl Into<String>) -> Self {
        self.config.pdf_engine = engine.into();
        self
    }

    pub fn pandoc_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pandoc_path = Some(path.into());
        self
    }

    pub fn pdftoppm_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdftoppm_path = Some(path.into());
        self
    }

    pub fn workspace_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.workspace_root = Some(dir.into());
        self
    }

    pub fn workspace_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.workspace_prefix = prefix.into();
        self
    }

    pub fn stage_timeout_secs(mut self, secs: u64) -> Self {
        self.config.stage_timeout_secs = Some(secs);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RenderConfig, StoryError> {
        let c = &self.config;
        if !(36..=600).contains(&c.dpi) {
            return Err(StoryError::InvalidConfig(format!(
                "DPI must be 36–600, got {}",
                c.dpi
            )));
        }
        if c.geometry.width_px == 0 || c.geometry.height_px == 0 {
            return Err(StoryError::InvalidConfig(format!(
                "Page geometry must be non-zero, got {}",
                c.geometry
            )));
        }
        if c.pdf_engine.trim().is_empty() {
            return Err(StoryError::InvalidConfig("PDF engine must not be empty".into()));
        }
        if c.workspace_prefix.is_empty()
            || c.workspace_prefix.contains(['/', '\\'])
            || c.workspace_prefix.starts_with('.')
        {
            return Err(StoryError::InvalidConfig(format!(
                "Workspace prefix must be a plain directory-name fragment, got {:?}",
                c.workspace_prefix
            )));
        }
        if c.stage_timeout_secs == Some(0) {
            return Err(StoryError::InvalidConfig(
                "Stage timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Value types ──────────────────────────────────────────────────────────

/// Page size in CSS pixels (1/96 inch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width_px: u32,
    pub height_px: u32,
}

impl PageGeometry {
    /// Instagram / TikTok / Shorts story format.
    pub const STORY: PageGeometry = PageGeometry {
        width_px: 1080,
        height_px: 1920,
    };

    /// Expected raster size in image pixels at the given DPI.
    pub fn pixels_at(&self, dpi: u32) -> (u32, u32) {
        let scale = |css_px: u32| ((css_px as u64 * dpi as u64 + 48) / 96) as u32;
        (scale(self.width_px), scale(self.height_px))
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::STORY
    }
}

impl fmt::Display for PageGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}px", self.width_px, self.height_px)
    }
}

/// Raster encoding for the rendered pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RasterFormat {
    /// Lossless; crisp text edges. (default)
    #[default]
    Png,
    /// Smaller files; text edges pick up compression artefacts.
    Jpeg,
}

impl RasterFormat {
    /// File extension the rasterizer writes.
    pub fn extension(self) -> &'static str {
        match self {
            RasterFormat::Png => "png",
            RasterFormat::Jpeg => "jpg",
        }
    }

    /// MIME type used for data URLs and HTTP responses.
    pub fn mime_type(self) -> &'static str {
        match self {
            RasterFormat::Png => "image/png",
            RasterFormat::Jpeg => "image/jpeg",
        }
    }
}
