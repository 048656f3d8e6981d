use std::path::{Path, PathBuf};

/// A local file record as tracked by the surrounding file manager.
pub trait FileRecord: Send + Sync {
    fn full_path(&self) -> &Path;

    /// Filename relative to the site root, e.g. `assets/images/logo.png`.
    fn filename(&self) -> &str;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalFile {
    pub full_path: PathBuf,
    pub filename: String,
}

impl LocalFile {
    pub fn new(full_path: impl Into<PathBuf>, filename: impl Into<String>) -> Self {
        Self {
            full_path: full_path.into(),
            filename: filename.into(),
        }
    }
}

impl FileRecord for LocalFile {
    fn full_path(&self) -> &Path {
        &self.full_path
    }

    fn filename(&self) -> &str {
        &self.filename
    }
}

/// Either a file record or a bare filename, e.g. a cached resampled variant
/// that has no record of its own.
#[derive(Clone, Copy)]
pub enum FileRef<'a> {
    Record(&'a dyn FileRecord),
    Name(&'a str),
}

impl<'a> FileRef<'a> {
    pub fn filename(&self) -> &'a str {
        match *self {
            FileRef::Record(record) => record.filename(),
            FileRef::Name(name) => name,
        }
    }
}

impl<'a> From<&'a str> for FileRef<'a> {
    fn from(name: &'a str) -> Self {
        FileRef::Name(name)
    }
}

impl<'a> From<&'a String> for FileRef<'a> {
    fn from(name: &'a String) -> Self {
        FileRef::Name(name)
    }
}

impl<'a> From<&'a LocalFile> for FileRef<'a> {
    fn from(file: &'a LocalFile) -> Self {
        FileRef::Record(file)
    }
}
