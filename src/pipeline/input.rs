//! Input validation: make sure the configured PDF can be opened at all.
//!
//! ## Why check before binding pdfium?
//!
//! A missing file, a permission problem or a file that is not a PDF are
//! configuration errors. Reporting them before any pdfium resource is
//! acquired gives callers a meaningful error rather than an opaque pdfium
//! failure. The PDF magic bytes (`%PDF`) are checked here for the same
//! reason.

use crate::error::HighlightsError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Validate that `path` names a readable PDF and return it.
pub fn resolve_input(path: &Path) -> Result<PathBuf, HighlightsError> {
    let path = path.to_path_buf();

    if !path.exists() {
        return Err(HighlightsError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(HighlightsError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(HighlightsError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(HighlightsError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}
