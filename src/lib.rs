//! # mdstory
//!
//! Render Markdown into a sequence of story-format (1080×1920) page images.
//!
//! The crate does no layout of its own. It drives an external toolchain:
//! pandoc turns the markdown into HTML and hands it to WeasyPrint, which
//! paginates it at story size; pdftoppm then rasterises every page. What the
//! crate owns is the sequencing around those tools: a disposable workspace
//! per render, validation between stages, page ordering, and cleanup on every
//! exit path.
//!
//! ## Pipeline Overview
//!
//! ```text
//! markdown
//!  │
//!  ├─ 1. Workspace  unique temp dir, removed whatever happens
//!  ├─ 2. Layout     pandoc + weasyprint → output.pdf at 1080×1920 px
//!  ├─ 3. Raster     pdftoppm → page-<N>.png, one per page
//!  ├─ 4. Collect    order by page number, load + validate each image
//!  └─ 5. Release    workspace removed; images now owned by the caller
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mdstory::{RenderConfig, StoryRenderer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let renderer = StoryRenderer::new(RenderConfig::default())?;
//!     let output = renderer.render("# Five things\n\nAbout Rust.").await?;
//!     for image in &output.images {
//!         std::fs::write(image.file_name("story", output.images.len()), &image.bytes)?;
//!     }
//!     eprintln!("{} pages in {}ms", output.stats.page_count, output.stats.total_ms);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `mdstory` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! mdstory = { version = "0.1", default-features = false }
//! ```
//!
//! ## External Tools
//!
//! `pandoc`, `weasyprint` and `pdftoppm` (poppler-utils) must be installed.
//! Each is found via an explicit config path, then `MDSTORY_PANDOC` /
//! `MDSTORY_WEASYPRINT` / `MDSTORY_PDFTOPPM`, then `PATH`.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod archive;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod render;
pub mod style;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use archive::{archive_bytes, write_archive};
pub use config::{PageGeometry, RasterFormat, RenderConfig, RenderConfigBuilder};
pub use error::{ErrorPayload, Stage, StoryError};
pub use output::{PreviewPayload, RenderOutput, RenderStats, RenderedImage};
pub use progress::{NoopProgressCallback, ProgressCallback, RenderProgressCallback};
pub use render::{render_markdown, render_sync, write_images, StoryRenderer};
pub use story_toolchain::{check_toolchain, Tool, ToolchainError};
pub use style::StyleSheet;
