//! A single input file and the product identifier derived from its name.

use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf};

/// One file found in the source directory.
///
/// Only the name, extension and location are ever inspected; the core never
/// reads file contents.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FileEntry {
    /// Absolute path of the file on disk.
    pub path: PathBuf,

    /// Lowercased extension without the leading dot (empty when absent).
    pub extension: String,

    /// Raw filename including its extension.
    pub filename: String,
}

impl FileEntry {
    /// Build an entry from a path, deriving the filename and lowercased extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = extension_of(&filename);
        Self {
            path,
            extension,
            filename,
        }
    }
}

/// Product identifier shared by every file of one asset.
///
/// Case is preserved: `OBC-005` and `obc-005` are different products.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ProductId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Strip the final extension from a filename.
///
/// A leading dot is part of the name (`.png` has no extension), so the stem
/// of a non-empty filename is never empty.
pub fn file_stem(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(pos) if pos > 0 => &filename[..pos],
        _ => filename,
    }
}

/// Lowercased extension of a filename without the dot.
pub fn extension_of(filename: &str) -> String {
    match filename.rfind('.') {
        Some(pos) if pos > 0 => filename[pos + 1..].to_ascii_lowercase(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_lowercases_extension_and_keeps_filename() {
        let entry = FileEntry::from_path("/assets/OBC-005_Model.GLTF");
        assert_eq!(entry.filename, "OBC-005_Model.GLTF");
        assert_eq!(entry.extension, "gltf");
        assert_eq!(file_stem(&entry.filename), "OBC-005_Model");
    }

    #[test]
    fn dotfiles_have_no_extension() {
        assert_eq!(extension_of(".png"), "");
        assert_eq!(file_stem(".png"), ".png");
        assert_eq!(file_stem("archive.tar.gz"), "archive.tar");
        assert_eq!(extension_of("README"), "");
    }
}
