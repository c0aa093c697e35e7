//! JSON snapshot persistence and extracted-image lookup.
//!
//! The snapshot is a top-level JSON array of page records, indented with
//! four spaces. Non-ASCII text is written as-is (serde_json never escapes
//! it). Each write replaces the previous snapshot through a temp file and a
//! rename, so a reader never observes a half-written file.

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::output::AnalysisResult;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// Where the snapshot and the extracted images live.
#[derive(Debug, Clone)]
pub struct ResultSink {
    output_path: PathBuf,
    images_dir: PathBuf,
}

impl ResultSink {
    pub fn new(output_path: impl Into<PathBuf>, images_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            images_dir: images_dir.into(),
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(&config.output_path, &config.images_dir)
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// `true` once a snapshot has been written.
    pub fn has_snapshot(&self) -> bool {
        self.output_path.is_file()
    }

    /// Serialise `result` and replace the snapshot file.
    pub async fn write(&self, result: &AnalysisResult) -> Result<(), AnalysisError> {
        let path = self.output_path.as_path();
        let json = to_json(result)
            .map_err(|e| AnalysisError::Internal(format!("Snapshot serialisation failed: {}", e)))?;

        let write_err = |source: std::io::Error| AnalysisError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        // Atomic write: write to temp, then rename
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &json).await.map_err(write_err)?;
        if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(write_err(e));
        }

        info!(
            "Wrote {} page records to {}",
            result.len(),
            path.display()
        );
        Ok(())
    }

    /// Parse the snapshot back.
    pub async fn read(&self) -> Result<AnalysisResult, AnalysisError> {
        let bytes = tokio::fs::read(&self.output_path).await.map_err(|e| {
            AnalysisError::SnapshotUnreadable {
                path: self.output_path.clone(),
                detail: e.to_string(),
            }
        })?;
        serde_json::from_slice(&bytes).map_err(|e| AnalysisError::SnapshotUnreadable {
            path: self.output_path.clone(),
            detail: e.to_string(),
        })
    }

    /// Resolve an extracted image by bare file name.
    ///
    /// Returns `None` for names with directory components (including `..`)
    /// and for files that do not exist.
    pub fn image_file(&self, name: &str) -> Option<PathBuf> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => {
                debug!("Rejected image name: {:?}", name);
                return None;
            }
        }
        if name.contains('\\') {
            return None;
        }

        let path = self.images_dir.join(name);
        path.is_file().then_some(path)
    }
}

/// Serialise a result exactly as it is written to the snapshot.
pub fn to_json(result: &AnalysisResult) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    result.serialize(&mut ser)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{PageRecord, QuestionRecord};
    use crate::pipeline::question::synthesize;

    fn sample() -> AnalysisResult {
        AnalysisResult {
            pages: vec![
                PageRecord {
                    page: 1,
                    text: "Énoncé : combien de côtés ?".into(),
                    images: vec![],
                    ai_generated_questions: vec![],
                    error: None,
                },
                PageRecord {
                    page: 2,
                    text: String::new(),
                    images: vec!["images/page2_image1.png".into()],
                    ai_generated_questions: vec![QuestionRecord::new(
                        "images/page2_image1.png",
                        synthesize("a hexagon"),
                    )],
                    error: None,
                },
            ],
        }
    }

    #[test]
    fn json_uses_four_space_indent_and_literal_unicode() {
        let json = String::from_utf8(to_json(&sample()).unwrap()).unwrap();
        assert!(json.starts_with("[\n    {\n        \"page\": 1,"));
        assert!(json.contains("Énoncé : combien de côtés ?"));
        assert!(!json.contains("\\u"));
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ResultSink::new(dir.path().join("out/extracted.json"), dir.path().join("images"));

        sink.write(&sample()).await.unwrap();
        assert!(sink.has_snapshot());
        assert!(!dir.path().join("out/extracted.json.tmp").exists());

        let back = sink.read().await.unwrap();
        assert_eq!(back, sample());
    }

    #[tokio::test]
    async fn write_overwrites_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ResultSink::new(dir.path().join("extracted.json"), dir.path());

        sink.write(&sample()).await.unwrap();
        sink.write(&AnalysisResult::default()).await.unwrap();

        let text = std::fs::read_to_string(sink.output_path()).unwrap();
        assert_eq!(text, "[]");
    }

    #[tokio::test]
    async fn write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let sink = ResultSink::new(blocker.join("extracted.json"), dir.path());

        let err = sink.write(&sample()).await.unwrap_err();
        assert!(matches!(err, AnalysisError::OutputWriteFailed { .. }));
    }

    #[tokio::test]
    async fn read_missing_snapshot_fails() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ResultSink::new(dir.path().join("missing.json"), dir.path());
        assert!(!sink.has_snapshot());
        assert!(matches!(
            sink.read().await.unwrap_err(),
            AnalysisError::SnapshotUnreadable { .. }
        ));
    }

    #[test]
    fn image_file_rejects_traversal_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("page1_image1.png"), b"png").unwrap();
        let sink = ResultSink::new(dir.path().join("x.json"), dir.path());

        assert_eq!(
            sink.image_file("page1_image1.png"),
            Some(dir.path().join("page1_image1.png"))
        );
        assert_eq!(sink.image_file("page9_image9.png"), None);
        assert_eq!(sink.image_file("../x.json"), None);
        assert_eq!(sink.image_file("/etc/passwd"), None);
        assert_eq!(sink.image_file(".."), None);
        assert_eq!(sink.image_file(""), None);
        assert_eq!(sink.image_file("..\\x.json"), None);
    }
}
