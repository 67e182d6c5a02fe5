//! Pipeline stages for markdown-to-story conversion.
//!
//! Each submodule owns one step. Stages only talk to each other through files
//! in the render's [`workspace`], so each is testable on its own and the
//! external tools can be swapped behind the [`layout::LayoutEngine`] and
//! [`raster::Rasterizer`] traits.
//!
//! ## Data Flow
//!
//! ```text
//! markdown ──▶ layout ──────▶ raster ────▶ collect
//!  (&str)     (pandoc +      (pdftoppm)   (read + order)
//!              weasyprint)
//! ```
//!
//! 1. [`workspace`] — acquire a uniquely named directory; removed on every exit path
//! 2. [`layout`]    — write the markdown and stylesheets, paginate to a PDF at story size
//! 3. [`raster`]    — one image per page at the configured DPI
//! 4. [`collect`]   — read the pages back, ordered by parsed page index
//!
//! [`tool`] holds the process runner the two tool adapters share.

pub mod collect;
pub mod layout;
pub mod raster;
pub mod tool;
pub mod workspace;
