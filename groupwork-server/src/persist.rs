//! Snapshot file persistence.

use std::path::{Path, PathBuf};

use groupwork_proto::snapshot::{self, CodecError, StoreSnapshot};

/// Errors that can occur reading or writing the snapshot file.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// File could not be read or written.
    #[error("snapshot file {path}: {source}")]
    Io {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// File contents could not be encoded or decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Reads a snapshot. A missing file yields `Ok(None)`.
///
/// # Errors
///
/// Returns [`PersistError`] if the file exists but cannot be read or
/// decoded.
pub fn load(path: &Path) -> Result<Option<StoreSnapshot>, PersistError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(PersistError::Io {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };
    Ok(Some(snapshot::decode(&bytes)?))
}

/// Writes a snapshot, replacing the file atomically via a sibling temp file.
///
/// # Errors
///
/// Returns [`PersistError`] if encoding or any file operation fails.
pub fn save(path: &Path, snapshot: &StoreSnapshot) -> Result<(), PersistError> {
    let bytes = snapshot::encode(snapshot)?;
    let tmp = path.with_extension("tmp");
    let io_err = |source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(&tmp, bytes).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}
