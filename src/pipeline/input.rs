//! Input resolution: normalise a user-supplied path or URL to a local file.
//!
//! ## Why download to a temp file?
//!
//! The document reader opens PDFs by file-system path. Remote documents and
//! uploaded bytes are written into a `TempDir` that is removed when the
//! `ResolvedInput` is dropped. The PDF magic bytes (`%PDF`) are checked
//! before returning, so a non-PDF input fails here and nothing is written to
//! the images directory or the snapshot.

use crate::error::AnalysisError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// The resolved input: a local path, or a temp file holding downloaded or
/// uploaded bytes.
#[derive(Debug)]
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL or an in-memory upload, stored in a temp directory.
    /// The `TempDir` is kept alive to prevent cleanup until processing completes.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    /// Get the path to the PDF file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local PDF file path.
///
/// If the input is a URL, download it to a temporary directory.
/// If the input is a local file, validate it exists and is readable.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, AnalysisError> {
    if input.trim().is_empty() {
        return Err(AnalysisError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

/// Resolve a local file path, validating existence and PDF magic bytes.
fn resolve_local(path_str: &str) -> Result<ResolvedInput, AnalysisError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(AnalysisError::FileNotFound { path });
    }

    // Check read permission by attempting to open
    match std::fs::File::open(&path) {
        Ok(f) => {
            use std::io::Read;
            let mut head = Vec::with_capacity(4);
            f.take(4)
                .read_to_end(&mut head)
                .map_err(|e| AnalysisError::Internal(format!("Failed to read '{}': {}", path.display(), e)))?;
            check_magic(&path, &head)?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(AnalysisError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(AnalysisError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

/// Download a URL to a temporary directory and return the path.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, AnalysisError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AnalysisError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            AnalysisError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            AnalysisError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(AnalysisError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    // Extract filename from URL or Content-Disposition
    let filename = extract_filename(url, &response);

    let temp_dir = TempDir::new().map_err(|e| AnalysisError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| AnalysisError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    check_magic(&file_path, &bytes)?;

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| AnalysisError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded to: {}", file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Store in-memory PDF bytes in a temp directory.
///
/// `file_name` only labels the temp file; any directory components are
/// dropped.
pub async fn resolve_bytes(bytes: &[u8], file_name: &str) -> Result<ResolvedInput, AnalysisError> {
    let name = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("upload.pdf")
        .to_string();

    let temp_dir = TempDir::new().map_err(|e| AnalysisError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&name);

    check_magic(&file_path, bytes)?;

    tokio::fs::write(&file_path, bytes)
        .await
        .map_err(|e| AnalysisError::Internal(format!("Failed to write temp file: {}", e)))?;

    debug!("Stored {} uploaded bytes at {}", bytes.len(), file_path.display());
    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Reject content that does not start with `%PDF`.
fn check_magic(path: &Path, bytes: &[u8]) -> Result<(), AnalysisError> {
    if bytes.starts_with(b"%PDF") {
        return Ok(());
    }
    let mut magic = [0u8; 4];
    let n = bytes.len().min(4);
    magic[..n].copy_from_slice(&bytes[..n]);
    Err(AnalysisError::NotAPdf {
        path: path.to_path_buf(),
        magic,
    })
}

/// Extract a reasonable filename from the URL or response headers.
fn extract_filename(url: &str, _response: &reqwest::Response) -> String {
    // Try URL path
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}
