//! Stylesheets: the built-in story typography plus the page-geometry rule.
//!
//! The built-in sheet is compiled into the binary and materialised once per
//! process behind a [`Lazy`]; every renderer shares it through an `Arc`.
//! Nothing mutates a [`StyleSheet`] after construction, so concurrent renders
//! read it without any locking.
//!
//! Page size is deliberately not part of the typography sheet. It is emitted
//! by [`geometry_css`] from [`PageGeometry`] and passed to the layout stage
//! as a second stylesheet, so a custom sheet can never change the output
//! dimensions by accident.

use crate::config::PageGeometry;
use crate::error::StoryError;
use once_cell::sync::Lazy;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

const BUILTIN_CSS: &str = include_str!("../assets/styles.css");

static BUILTIN: Lazy<Arc<StyleSheet>> = Lazy::new(|| {
    Arc::new(StyleSheet {
        name: "builtin".to_string(),
        css: BUILTIN_CSS.to_string(),
    })
});

/// Read-only CSS applied during layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleSheet {
    name: String,
    css: String,
}

impl StyleSheet {
    /// The process-wide built-in story stylesheet.
    pub fn builtin() -> Arc<StyleSheet> {
        Arc::clone(&BUILTIN)
    }

    /// Wrap CSS text supplied by the caller.
    pub fn from_css(name: impl Into<String>, css: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            css: css.into(),
        }
    }

    /// Load a stylesheet from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, StoryError> {
        let path = path.as_ref();
        let css = std::fs::read_to_string(path).map_err(|e| StoryError::StyleSheetRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        debug!("Loaded stylesheet {} ({} bytes)", path.display(), css.len());
        Ok(Self {
            name: path.display().to_string(),
            css,
        })
    }

    /// Human-readable origin, for logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The CSS text.
    pub fn css(&self) -> &str {
        &self.css
    }
}

/// The `@page` rule that pins every page to `geometry`.
///
/// Only the size is set here; margins and backgrounds belong to the
/// typography sheet.
pub fn geometry_css(geometry: &PageGeometry) -> String {
    format!(
        "@page {{\n  size: {}px {}px;\n}}\n",
        geometry.width_px, geometry.height_px
    )
}
