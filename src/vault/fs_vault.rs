//! Directory-backed vault of Markdown notes.
//!
//! `Vault` is both the metadata index (which documents exist, which tags they
//! carry) and the document store (atomic read-modify-write of one note).

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_yaml::Mapping;
use tracing::{debug, warn};

use super::document::{Document, DocumentError};

/// Read-only view of the documents in a collection and the tags they carry.
pub trait MetadataIndex: Send + Sync {
    /// Returns every indexed document, in enumeration order.
    fn documents(&self) -> Result<Vec<PathBuf>, DocumentError>;

    /// Returns the tags one document carries, each in raw `#tag` form.
    fn tags_for(&self, document: &Path) -> Result<Vec<String>, DocumentError>;
}

/// Atomic access to individual documents.
pub trait DocumentStore: Send + Sync {
    fn read_document(&self, document: &Path) -> Result<Document, DocumentError>;

    /// Reads `document`, applies `update`, and writes the result back.
    ///
    /// If `update` fails nothing is written.
    fn process_document(
        &self,
        document: &Path,
        update: &mut dyn FnMut(&mut Document) -> Result<(), DocumentError>,
    ) -> Result<(), DocumentError>;

    /// Read-modify-write restricted to the frontmatter mapping.
    fn process_frontmatter(
        &self,
        document: &Path,
        update: &mut dyn FnMut(&mut Mapping) -> Result<(), DocumentError>,
    ) -> Result<(), DocumentError> {
        self.process_document(document, &mut |doc| update(doc.frontmatter_mut()))
    }
}

/// A directory of Markdown files.
#[derive(Debug, Clone)]
pub struct Vault {
    root: PathBuf,
}

impl Vault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a document path: absolute paths are kept, relative paths are
    /// taken relative to the vault root.
    pub fn resolve(&self, document: &Path) -> PathBuf {
        if document.is_absolute() {
            document.to_path_buf()
        } else {
            self.root.join(document)
        }
    }

    fn read_to_string(&self, path: &Path) -> Result<String, DocumentError> {
        if !path.is_file() {
            return Err(DocumentError::NotFound(path.display().to_string()));
        }
        fs::read_to_string(path).map_err(|e| DocumentError::io(path, e))
    }

    /// Writes `content` to a temporary file beside `path`, then renames it
    /// over `path`.
    fn write_atomic(&self, path: &Path, content: &str) -> Result<(), DocumentError> {
        let dir = path.parent().unwrap_or(&self.root);
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| DocumentError::io(path, e))?;
        tmp.write_all(content.as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| DocumentError::io(path, e))?;
        tmp.persist(path)
            .map_err(|e| DocumentError::io(path, e.error))?;
        Ok(())
    }
}

/// Appends the Markdown files under `dir` in sorted order, skipping hidden
/// entries.
///
/// Symlinked directories are not followed. A subdirectory that cannot be
/// listed is skipped with a warning; only an unreadable `dir` is an error.
fn collect_markdown(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), DocumentError> {
    let entries = fs::read_dir(dir).map_err(|e| DocumentError::io(dir, e))?;
    let mut paths = entries
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| DocumentError::io(dir, e))?;
    paths.sort();

    for path in paths {
        let hidden = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with('.'));
        if hidden {
            continue;
        }

        let file_type = match fs::symlink_metadata(&path) {
            Ok(metadata) => metadata.file_type(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable vault entry");
                continue;
            }
        };
        if file_type.is_dir() {
            if let Err(e) = collect_markdown(&path, out) {
                warn!(path = %path.display(), error = %e, "Skipping unreadable directory");
            }
        } else if file_type.is_symlink() && path.is_dir() {
            debug!(path = %path.display(), "Not following symlinked directory");
        } else if path.extension().is_some_and(|ext| ext == "md") {
            out.push(path);
        }
    }
    Ok(())
}

impl MetadataIndex for Vault {
    fn documents(&self) -> Result<Vec<PathBuf>, DocumentError> {
        let mut documents = Vec::new();
        collect_markdown(&self.root, &mut documents)?;
        debug!(root = %self.root.display(), count = documents.len(), "Scanned vault");
        Ok(documents)
    }

    fn tags_for(&self, document: &Path) -> Result<Vec<String>, DocumentError> {
        Ok(self.read_document(document)?.tags())
    }
}

impl DocumentStore for Vault {
    fn read_document(&self, document: &Path) -> Result<Document, DocumentError> {
        let path = self.resolve(document);
        let content = self.read_to_string(&path)?;
        Document::parse(path, &content)
    }

    fn process_document(
        &self,
        document: &Path,
        update: &mut dyn FnMut(&mut Document) -> Result<(), DocumentError>,
    ) -> Result<(), DocumentError> {
        let mut doc = self.read_document(document)?;
        update(&mut doc)?;
        let rendered = doc.render()?;
        self.write_atomic(doc.path(), &rendered)?;
        debug!(path = %doc.path().display(), "Document written");
        Ok(())
    }
}
