//! On-disk persistence for [`VectorIndex`].
//!
//! A storage location is a directory holding a single [`INDEX_FILE_NAME`]
//! file: the JSON-encoded header followed by all entries. Saves write a
//! temporary file in the same directory and rename it over the final file,
//! so a concurrent reader observes either the old index or the new one.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::VectorIndex;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// Name of the index file inside a storage location.
pub const INDEX_FILE_NAME: &str = "index.json";

/// Path of the index file for a storage location.
pub fn index_file(location: &Path) -> PathBuf {
    location.join(INDEX_FILE_NAME)
}

/// Whether a loadable-looking index exists at `location`.
pub fn exists(location: &Path) -> bool {
    index_file(location).is_file()
}

/// Persist `index` at `location`, replacing any previous index there.
///
/// # Errors
///
/// Returns [`RagError::Io`] or [`RagError::Serde`] if the directory cannot be
/// created or the file cannot be written. On error the previous index file,
/// if any, is left as it was.
pub fn save(index: &VectorIndex, location: &Path) -> Result<()> {
    fs::create_dir_all(location)?;
    let target = index_file(location);

    let mut tmp = NamedTempFile::new_in(location)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer(&mut writer, index)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(&target).map_err(|e| RagError::Io(e.error))?;

    info!(
        path = %target.display(),
        entry_count = index.len(),
        dimensions = index.header().dimensions,
        "persisted index"
    );
    Ok(())
}

/// Load the index at `location` without checking it against an embedder.
///
/// # Errors
///
/// - [`RagError::IndexNotFound`] if the directory or index file is missing
/// - [`RagError::IndexCorrupt`] if the file does not parse or is inconsistent
pub fn load_unchecked(location: &Path) -> Result<VectorIndex> {
    let path = index_file(location);
    if !path.is_file() {
        return Err(RagError::IndexNotFound { path: location.to_path_buf() });
    }

    let bytes = fs::read(&path)?;
    let index: VectorIndex = serde_json::from_slice(&bytes)
        .map_err(|e| RagError::IndexCorrupt { path: path.clone(), message: e.to_string() })?;
    index.validate().map_err(|message| RagError::IndexCorrupt { path: path.clone(), message })?;

    debug!(path = %path.display(), entry_count = index.len(), "read index");
    Ok(index)
}

/// Load the index at `location` for use with `embedder`.
///
/// # Errors
///
/// In addition to the errors of [`load_unchecked`]:
/// - [`RagError::EmbeddingDimensionMismatch`] if the embedder's dimension
///   differs from the index header
/// - [`RagError::EmbedderMismatch`] if the index was built by another embedder
pub fn load(location: &Path, embedder: &dyn EmbeddingProvider) -> Result<VectorIndex> {
    let index = load_unchecked(location)?;
    let header = index.header();

    if header.dimensions != embedder.dimensions() {
        return Err(RagError::EmbeddingDimensionMismatch {
            expected: header.dimensions,
            actual: embedder.dimensions(),
        });
    }
    let identity = embedder.identity();
    if header.embedder != identity {
        return Err(RagError::EmbedderMismatch {
            expected: header.embedder.clone(),
            actual: identity,
        });
    }

    info!(
        location = %location.display(),
        embedder = %header.embedder,
        metric = %header.metric,
        entry_count = index.len(),
        built_at = %header.built_at,
        "loaded index"
    );
    Ok(index)
}
