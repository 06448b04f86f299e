//! Copy, download and share helpers over the last successful result

use crate::intake::UploadState;
use poet_types::{ImageDatum, Result};
use std::path::{Path, PathBuf};

pub const SHARE_TITLE: &str = "My PhotoPoem Creation";

const DEFAULT_STEM: &str = "photo-poet-image";
const DEFAULT_EXTENSION: &str = "png";

/// Text placed on the clipboard
pub fn clipboard_text(file_name: &str, poem: &str) -> String {
    format!("{}\nPhoto: {}\n\nPoem:\n{}", SHARE_TITLE, file_name, poem)
}

/// Body for a native share sheet
pub fn share_text(file_name: &str, poem: &str) -> String {
    format!(
        "Check out this poem I generated with Photo Poet!\n\nPoem:\n{}\n\n(Inspired by photo: {})",
        poem, file_name
    )
}

/// Name the photo is saved under
pub fn download_file_name(file_name: Option<&str>) -> String {
    let path = Path::new(file_name.unwrap_or_default());
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_STEM.to_string());
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
    format!("{}.{}", stem, extension)
}

/// Write the decoded photo into `dir`, returning the path written
pub fn save_photo(photo: &ImageDatum, file_name: Option<&str>, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(download_file_name(file_name));
    std::fs::write(&path, photo.decode())?;
    Ok(path)
}

/// Everything the share affordances need, taken from a finished cycle
#[derive(Debug, Clone, PartialEq)]
pub struct ShareBundle {
    pub title: &'static str,
    pub file_name: String,
    pub poem: String,
    pub photo: ImageDatum,
}

impl ShareBundle {
    /// `None` unless the state holds both a photo and a poem
    pub fn from_state(state: &UploadState) -> Option<Self> {
        let photo = state.photo.clone()?;
        let poem = state.poem.clone()?;
        Some(Self {
            title: SHARE_TITLE,
            file_name: download_file_name(state.file_name.as_deref()),
            poem,
            photo,
        })
    }

    pub fn clipboard_text(&self) -> String {
        clipboard_text(&self.file_name, &self.poem)
    }

    pub fn share_text(&self) -> String {
        share_text(&self.file_name, &self.poem)
    }

    pub fn save_photo(&self, dir: &Path) -> Result<PathBuf> {
        save_photo(&self.photo, Some(&self.file_name), dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_clipboard_text() {
        assert_eq!(
            clipboard_text("beach.jpg", "waves\nsand"),
            "My PhotoPoem Creation\nPhoto: beach.jpg\n\nPoem:\nwaves\nsand"
        );
    }

    #[test]
    fn test_share_text_mentions_photo() {
        let text = share_text("beach.jpg", "waves");
        assert!(text.starts_with("Check out this poem I generated with Photo Poet!"));
        assert!(text.ends_with("(Inspired by photo: beach.jpg)"));
    }

    #[test]
    fn test_download_file_name() {
        assert_eq!(download_file_name(Some("beach.jpg")), "beach.jpg");
        assert_eq!(download_file_name(Some("scan")), "scan.png");
        assert_eq!(download_file_name(Some("")), "photo-poet-image.png");
        assert_eq!(download_file_name(None), "photo-poet-image.png");
    }

    #[test]
    fn test_bundle_requires_poem() {
        let mut state = UploadState {
            photo: Some(ImageDatum::from_bytes("image/png", b"\x89PNG").unwrap()),
            file_name: Some("cat.png".to_string()),
            ..UploadState::default()
        };
        assert!(ShareBundle::from_state(&state).is_none());

        state.poem = Some("whiskers".to_string());
        let bundle = ShareBundle::from_state(&state).unwrap();
        assert_eq!(bundle.title, SHARE_TITLE);
        assert!(bundle.clipboard_text().contains("Photo: cat.png"));
    }

    #[test]
    fn test_save_photo_writes_decoded_bytes() {
        let dir = tempdir().unwrap();
        let photo = ImageDatum::from_bytes("image/png", b"\x89PNG\r\n").unwrap();

        let path = save_photo(&photo, Some("cat.png"), &dir.path().join("out")).unwrap();
        assert_eq!(path.file_name().unwrap(), "cat.png");
        assert_eq!(std::fs::read(&path).unwrap(), b"\x89PNG\r\n");
    }
}
