//! Loading documents from a folder of source files.
//!
//! [`DirectoryLoader`] walks a directory tree and yields one [`Document`]
//! per matching file. PDFs are converted with poppler's `pdftotext` and
//! yield one document per page. Any text containing form-feed characters
//! (the page separator `pdftotext` emits) is split the same way; pages are
//! numbered from 1.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::document::Document;
use crate::error::{RagError, Result};

const PAGE_BREAK: char = '\u{000C}';

/// Program used to extract text from PDFs unless overridden.
pub const DEFAULT_PDFTOTEXT: &str = "pdftotext";

/// A source of documents for the index builder.
pub trait DocumentLoader: Send + Sync {
    /// Load every document from the source.
    fn load(&self) -> Result<Vec<Document>>;
}

/// Loads text files from a directory tree, in path order.
#[derive(Debug, Clone)]
pub struct DirectoryLoader {
    root: PathBuf,
    extensions: Vec<String>,
    pdftotext: PathBuf,
}

impl DirectoryLoader {
    /// Load `.pdf`, `.txt` and `.md` files below `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extensions: ["pdf", "txt", "md"].map(String::from).to_vec(),
            pdftotext: PathBuf::from(DEFAULT_PDFTOTEXT),
        }
    }

    /// Use another `pdftotext` executable, e.g. an absolute path.
    pub fn with_pdftotext(mut self, program: impl Into<PathBuf>) -> Self {
        self.pdftotext = program.into();
        self
    }

    /// Replace the accepted file extensions (without the leading dot).
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    fn discover(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Err(RagError::LoaderError {
                path: self.root.clone(),
                message: "document folder does not exist or is not a directory".to_string(),
            });
        }

        let mut files = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry.path().extension().and_then(|ext| ext.to_str()).is_some_and(|ext| {
                    self.extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext))
                })
            })
            .map(|entry| entry.into_path())
            .collect::<Vec<_>>();

        files.sort();
        Ok(files)
    }

    /// Run `pdftotext` on `path` and return its UTF-8 output, pages
    /// separated by form feeds.
    fn extract_pdf(&self, path: &Path) -> Result<String> {
        let output = Command::new(&self.pdftotext)
            .arg("-enc")
            .arg("UTF-8")
            .arg(path)
            .arg("-")
            .output()
            .map_err(|e| RagError::LoaderError {
                path: path.to_path_buf(),
                message: format!(
                    "failed to run {}: {e} (is poppler-utils installed?)",
                    self.pdftotext.display()
                ),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(path = %path.display(), status = %output.status, "pdftotext failed");
            return Err(RagError::LoaderError {
                path: path.to_path_buf(),
                message: format!("pdftotext exited with {}: {}", output.status, stderr.trim()),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(path = %path.display(), chars = text.chars().count(), "extracted pdf text");
        Ok(text)
    }

    fn read_text(&self, path: &Path) -> Result<(String, bool)> {
        let is_pdf =
            path.extension().and_then(|ext| ext.to_str()).is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if is_pdf {
            return Ok((self.extract_pdf(path)?, true));
        }
        let text = fs::read_to_string(path).map_err(|e| RagError::LoaderError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok((text, false))
    }

    fn relative_id(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl DocumentLoader for DirectoryLoader {
    fn load(&self) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        let files = self.discover()?;

        for path in &files {
            let (text, paged) = self.read_text(path)?;
            let id = self.relative_id(path);
            let source = path.display().to_string();
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();

            if paged || text.contains(PAGE_BREAK) {
                let pages = text.split(PAGE_BREAK).enumerate();
                for (i, page_text) in pages.filter(|(_, t)| !t.trim().is_empty()) {
                    let page = i as u32 + 1;
                    documents.push(
                        Document::new(format!("{id}#p{page}"), source.clone(), page_text)
                            .with_page(page)
                            .with_metadata("file_name", file_name.clone()),
                    );
                }
            } else {
                documents.push(
                    Document::new(id, source, text).with_metadata("file_name", file_name),
                );
            }
            debug!(path = %path.display(), "loaded file");
        }

        info!(
            root = %self.root.display(),
            file_count = files.len(),
            document_count = documents.len(),
            "loaded documents"
        );
        Ok(documents)
    }
}
