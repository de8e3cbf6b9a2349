//! Copying region text and screenshots to the system clipboard.

use arboard::{Clipboard, ImageData};
use pdf_engine::RgbaImage;
use std::borrow::Cow;

#[derive(Debug, thiserror::Error)]
pub enum ClipboardError {
    #[error("failed to open the clipboard: {0}")]
    Unavailable(arboard::Error),
    #[error("failed to copy to the clipboard: {0}")]
    CopyFailed(arboard::Error),
}

pub fn copy_text(text: &str) -> Result<(), ClipboardError> {
    let mut clipboard = Clipboard::new().map_err(ClipboardError::Unavailable)?;
    clipboard.set_text(text).map_err(ClipboardError::CopyFailed)
}

/// Put an RGBA bitmap on the clipboard.
pub fn copy_image(image: &RgbaImage) -> Result<(), ClipboardError> {
    let (width, height) = image.dimensions();
    let data = ImageData {
        width: width as usize,
        height: height as usize,
        bytes: Cow::Borrowed(image.as_raw()),
    };

    let mut clipboard = Clipboard::new().map_err(ClipboardError::Unavailable)?;
    clipboard.set_image(data).map_err(ClipboardError::CopyFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Touching the real clipboard crashes some headless CI runners.
    #[test]
    #[ignore = "Requires system clipboard access"]
    fn copied_text_reads_back() {
        let text = "Vellum clipboard test: 日本語 émojis";

        match copy_text(text) {
            Ok(()) => {
                if let Ok(mut clipboard) = Clipboard::new() {
                    if let Ok(contents) = clipboard.get_text() {
                        assert_eq!(contents, text);
                    }
                }
            }
            Err(ClipboardError::Unavailable(_)) => {}
            Err(err) => panic!("unexpected clipboard error: {err}"),
        }
    }

    #[test]
    #[ignore = "Requires system clipboard access"]
    fn copying_an_image_succeeds_when_clipboard_exists() {
        let image = RgbaImage::new(4, 3);
        match copy_image(&image) {
            Ok(()) | Err(ClipboardError::Unavailable(_)) => {}
            Err(err) => panic!("unexpected clipboard error: {err}"),
        }
    }

    #[test]
    fn errors_describe_the_failed_step() {
        let unavailable = ClipboardError::Unavailable(arboard::Error::ContentNotAvailable);
        assert!(unavailable.to_string().contains("open the clipboard"));

        let failed = ClipboardError::CopyFailed(arboard::Error::ContentNotAvailable);
        assert!(failed.to_string().contains("copy"));
    }
}
