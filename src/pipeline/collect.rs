//! Result Collector: read the page rasters back into memory, in page order.
//!
//! Files are matched against `page-<digits>.<ext>` and ordered by the
//! parsed number, never by file name: pdftoppm pads to the page total's
//! digit count, and a lexical sort would put `page-10` before `page-9` the
//! moment padding and page count disagree.
//!
//! The page sequence must be exactly `1..=N`. No pages, a gap, or a
//! duplicate index means the rasterizer misbehaved and the whole render
//! fails. An individual page that is empty, unreadable, or not a decodable
//! image fails the render too; pages are never skipped.

use crate::config::RasterFormat;
use crate::error::StoryError;
use crate::output::RenderedImage;
use crate::pipeline::workspace::Workspace;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A raster file discovered in the workspace, not yet loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFile {
    pub page: usize,
    pub path: PathBuf,
}

// The literal `page` must match `workspace::RASTER_PREFIX`.
static PNG_PAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^page-(\d+)\.png$").unwrap());
static JPEG_PAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^page-(\d+)\.jpg$").unwrap());

/// Pattern matching `page-<digits>.<ext>` for `format`, capturing the digits.
pub fn page_pattern(format: RasterFormat) -> &'static Regex {
    match format {
        RasterFormat::Png => &PNG_PAGE,
        RasterFormat::Jpeg => &JPEG_PAGE,
    }
}

/// Parse the page index out of `file_name`, if it is a page raster.
pub fn parse_page_index(pattern: &Regex, file_name: &str) -> Option<usize> {
    pattern
        .captures(file_name)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// List the page rasters in `dir`, sorted by page index.
pub async fn discover_pages(dir: &Path, format: RasterFormat) -> Result<Vec<PageFile>, StoryError> {
    let pattern = page_pattern(format);
    let listing_error = |e: std::io::Error| StoryError::CollectionFailure {
        page: None,
        path: dir.to_path_buf(),
        detail: format!("cannot list workspace: {e}"),
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(listing_error)?;
    let mut pages = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(listing_error)? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(page) = parse_page_index(pattern, name) {
            pages.push(PageFile {
                page,
                path: entry.path(),
            });
        }
    }

    pages.sort_by_key(|p| p.page);
    Ok(pages)
}

/// Check that `pages` is exactly `1..=N`.
///
/// `diagnostics` is the rasterizer's output, attached to the failure.
pub fn validate_sequence(pages: &[PageFile], diagnostics: &str) -> Result<(), StoryError> {
    if pages.is_empty() {
        return Err(StoryError::RasterFailure {
            reason: "rasterizer produced no pages".to_string(),
            diagnostics: diagnostics.to_string(),
        });
    }

    for (position, file) in pages.iter().enumerate() {
        let expected = position + 1;
        if file.page != expected {
            let reason = if file.page < expected {
                format!(
                    "page {} was written twice ('{}')",
                    file.page,
                    file.path.display()
                )
            } else {
                format!(
                    "page {} is missing (next file is '{}')",
                    expected,
                    file.path.display()
                )
            };
            return Err(StoryError::RasterFailure {
                reason,
                diagnostics: diagnostics.to_string(),
            });
        }
    }
    Ok(())
}

/// Load one page, validating it is a non-empty, decodable image.
pub async fn load_page(file: &PageFile, format: RasterFormat) -> Result<RenderedImage, StoryError> {
    let failure = |detail: String| StoryError::CollectionFailure {
        page: Some(file.page),
        path: file.path.clone(),
        detail,
    };

    let bytes = tokio::fs::read(&file.path)
        .await
        .map_err(|e| failure(format!("unreadable: {e}")))?;
    if bytes.is_empty() {
        return Err(failure("file is empty".to_string()));
    }

    let (width, height) =
        probe_dimensions(&bytes).map_err(|e| failure(format!("not a decodable image: {e}")))?;

    debug!(
        "Collected page {} ({} bytes, {}x{})",
        file.page,
        bytes.len(),
        width,
        height
    );

    Ok(RenderedImage {
        page: file.page,
        bytes,
        width,
        height,
        format,
    })
}

/// Collect every page of `workspace` in order.
pub async fn collect(
    workspace: &Workspace,
    format: RasterFormat,
    raster_diagnostics: &str,
) -> Result<Vec<RenderedImage>, StoryError> {
    let pages = discover_pages(workspace.path(), format).await?;
    validate_sequence(&pages, raster_diagnostics)?;

    let mut images = Vec::with_capacity(pages.len());
    for file in &pages {
        images.push(load_page(file, format).await?);
    }
    Ok(images)
}

fn probe_dimensions(bytes: &[u8]) -> Result<(u32, u32), String> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| e.to_string())?
        .into_dimensions()
        .map_err(|e| e.to_string())
}
