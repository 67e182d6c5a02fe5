//! ZIP packaging of a rendered story.
//!
//! Entries are named `<prefix>-NN.<ext>` in page order, so an unpacked
//! archive lists the slides in the order they were rendered.

use crate::error::StoryError;
use crate::output::RenderedImage;
use std::io::{Cursor, Seek, Write};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Entry prefix used by [`archive_bytes`].
pub const DEFAULT_ENTRY_PREFIX: &str = "story";

/// Write `images` as a ZIP archive into `writer`.
///
/// Fails with [`StoryError::Archive`] if there are no images or any image is
/// empty; a story with a missing slide is not worth shipping.
pub fn write_archive<W: Write + Seek>(
    images: &[RenderedImage],
    prefix: &str,
    writer: W,
) -> Result<W, StoryError> {
    if images.is_empty() {
        return Err(StoryError::Archive("no images to package".to_string()));
    }
    if let Some(empty) = images.iter().find(|img| img.bytes.is_empty()) {
        return Err(StoryError::Archive(format!(
            "page {} has no image data",
            empty.page
        )));
    }

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(writer);
    let total = images.len();

    for image in images {
        let name = image.file_name(prefix, total);
        zip.start_file(name.as_str(), options)
            .map_err(|e| StoryError::Archive(format!("{name}: {e}")))?;
        zip.write_all(&image.bytes)
            .map_err(|e| StoryError::Archive(format!("{name}: {e}")))?;
    }

    let writer = zip
        .finish()
        .map_err(|e| StoryError::Archive(e.to_string()))?;
    debug!("Packaged {} images", total);
    Ok(writer)
}

/// Package `images` into an in-memory ZIP with `story-NN.<ext>` entries.
pub fn archive_bytes(images: &[RenderedImage]) -> Result<Vec<u8>, StoryError> {
    write_archive(images, DEFAULT_ENTRY_PREFIX, Cursor::new(Vec::new())).map(Cursor::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RasterFormat;
    use std::io::Read;
    use zip::ZipArchive;

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
    fn entries_are_named_and_ordered() {
        let images: Vec<_> = (1..=3)
            .map(|p| image(p, format!("page {p}").as_bytes()))
            .collect();
        let bytes = archive_bytes(&images).unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 3);
        for i in 0..3 {
            let mut entry = archive.by_index(i).unwrap();
            assert_eq!(entry.name(), format!("story-0{}.png", i + 1));
            let mut content = String::new();
            entry.read_to_string(&mut content).unwrap();
            assert_eq!(content, format!("page {}", i + 1));
        }
    }

    #[test]
    fn custom_prefix_and_wide_index() {
        let images: Vec<_> = (1..=100).map(|p| image(p, b"x")).collect();
        let cursor = write_archive(&images, "deck", Cursor::new(Vec::new())).unwrap();

        let mut archive = ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap();
        assert_eq!(archive.by_index(0).unwrap().name(), "deck-001.png");
        assert_eq!(archive.by_index(99).unwrap().name(), "deck-100.png");
    }

    #[test]
    fn empty_buffer_is_rejected() {
        let images = vec![image(1, b"ok"), image(2, b"")];
        let err = archive_bytes(&images).unwrap_err();
        assert!(err.to_string().contains("page 2"), "got: {err}");
    }

    #[test]
    fn empty_story_is_rejected() {
        assert!(matches!(archive_bytes(&[]), Err(StoryError::Archive(_))));
    }
}
