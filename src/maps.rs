//! Map name lookup.
//!
//! Recognized text is reduced to a key (lowercase, alphanumeric only) that
//! names either `<base>/<key>.jpg` or a `<base>/<key>/` folder of variants.

use std::fs;
use std::path::{Path, PathBuf};

/// Image extensions accepted inside a variant folder (compared case-insensitively).
const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Lowercases and keeps only alphanumeric characters.
pub fn sanitize(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// A non-empty sanitized lookup key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapKey(String);

impl MapKey {
    /// Returns `None` when nothing alphanumeric is left after sanitizing.
    pub fn from_text(text: &str) -> Option<Self> {
        let key = sanitize(text);
        if key.is_empty() { None } else { Some(Self(key)) }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Ordered image paths resolved for one key. Empty means "not found".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantSet {
    paths: Vec<PathBuf>,
}

impl VariantSet {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn get(&self, index: usize) -> Option<&Path> {
        self.paths.get(index).map(PathBuf::as_path)
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

/// The `Maps` directory.
#[derive(Debug, Clone)]
pub struct MapLibrary {
    base_dir: PathBuf,
}

impl MapLibrary {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Resolves the images for a key.
    ///
    /// A single `<key>.jpg` wins over a `<key>/` folder. Folder contents are
    /// filtered by extension and sorted by path.
    pub fn resolve(&self, key: &MapKey) -> VariantSet {
        let single = self.base_dir.join(format!("{}.jpg", key.as_str()));
        if single.is_file() {
            return VariantSet::new(vec![single]);
        }

        let dir = self.base_dir.join(key.as_str());
        if !dir.is_dir() {
            return VariantSet::default();
        }

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                crate::log(&format!("Failed to read {}: {}", dir.display(), e));
                return VariantSet::default();
            }
        };

        let mut images: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && has_image_extension(path))
            .collect();
        images.sort();

        VariantSet::new(images)
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}
