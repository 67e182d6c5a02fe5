//! Render output types: the ordered page images and run statistics.

use crate::config::RasterFormat;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;

/// One rendered page.
///
/// Owned by the caller once returned; the on-disk copy the rasterizer wrote
/// is gone by then.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedImage {
    /// 1-indexed page number; equals the image's position in the output + 1.
    pub page: usize,
    /// Encoded image bytes (PNG or JPEG).
    #[serde(skip)]
    pub bytes: Vec<u8>,
    /// Pixel width as read from the image header.
    pub width: u32,
    /// Pixel height as read from the image header.
    pub height: u32,
    /// Encoding of `bytes`.
    pub format: RasterFormat,
}

impl RenderedImage {
    /// Output file name: `<prefix>-<NN>.<ext>`.
    ///
    /// The index is zero-padded to at least two digits, and wider when
    /// `total` needs it, so names sort lexically in page order.
    pub fn file_name(&self, prefix: &str, total: usize) -> String {
        page_file_name(prefix, self.page, total, self.format)
    }

    /// `data:` URL for inline previews.
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format.mime_type(),
            STANDARD.encode(&self.bytes)
        )
    }
}

/// Name for page `page` of `total`: `story-01.png`, …, `story-123.png`.
pub fn page_file_name(prefix: &str, page: usize, total: usize, format: RasterFormat) -> String {
    let width = total.max(page).to_string().len().max(2);
    format!("{prefix}-{page:0width$}.{}", format.extension())
}

/// Timing and size statistics for one render.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderStats {
    pub page_count: usize,
    pub total_bytes: u64,
    pub layout_ms: u64,
    pub raster_ms: u64,
    pub collect_ms: u64,
    pub total_ms: u64,
}

/// Everything a render produced.
#[derive(Debug, Clone, Serialize)]
pub struct RenderOutput {
    pub images: Vec<RenderedImage>,
    pub stats: RenderStats,
}

impl RenderOutput {
    /// The ordered images, dropping the statistics.
    pub fn into_images(self) -> Vec<RenderedImage> {
        self.images
    }

    /// Preview payload: `{ "images": [{ "index": 1, "dataUrl": "data:…" }] }`.
    pub fn preview(&self) -> PreviewPayload {
        PreviewPayload {
            images: self
                .images
                .iter()
                .map(|img| PreviewImage {
                    index: img.page,
                    data_url: img.to_data_url(),
                })
                .collect(),
        }
    }
}

/// JSON body for in-browser previews.
#[derive(Debug, Clone, Serialize)]
pub struct PreviewPayload {
    pub images: Vec<PreviewImage>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewImage {
    pub index: usize,
    pub data_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(page: usize, bytes: &[u8]) -> RenderedImage {
        RenderedImage {
            page,
            bytes: bytes.to_vec(),
            width: 1080,
            height: 1920,
            format: RasterFormat::Png,
        }
    }

    #[test]
    fn file_names_are_padded_to_two_digits() {
        assert_eq!(page_file_name("story", 1, 1, RasterFormat::Png), "story-01.png");
        assert_eq!(page_file_name("story", 9, 12, RasterFormat::Png), "story-09.png");
        assert_eq!(page_file_name("story", 12, 12, RasterFormat::Jpeg), "story-12.jpg");
    }

    #[test]
    fn file_names_widen_past_99_pages() {
        assert_eq!(page_file_name("s", 7, 120, RasterFormat::Png), "s-007.png");
        assert_eq!(page_file_name("s", 120, 120, RasterFormat::Png), "s-120.png");

        let mut names: Vec<String> = (1..=120)
            .map(|p| page_file_name("s", p, 120, RasterFormat::Png))
            .collect();
        let expected = names.clone();
        names.sort();
        assert_eq!(names, expected, "lexical order must equal page order");
    }

    #[test]
    fn data_url_has_mime_prefix() {
        let url = image(1, b"\x89PNG").to_data_url();
        assert_eq!(url, "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn preview_payload_shape() {
        let output = RenderOutput {
            images: vec![image(1, b"a"), image(2, b"b")],
            stats: RenderStats::default(),
        };
        let json = serde_json::to_value(output.preview()).unwrap();
        assert_eq!(json["images"][0]["index"], 1);
        assert_eq!(json["images"][1]["index"], 2);
        assert!(json["images"][1]["dataUrl"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,"));
    }

    #[test]
    fn bytes_are_not_serialised() {
        let json = serde_json::to_value(image(3, b"payload")).unwrap();
        assert!(json.get("bytes").is_none());
        assert_eq!(json["page"], 3);
        assert_eq!(json["format"], "png");
    }
}
