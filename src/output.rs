//! Output types: the per-page records that make up an analysis.
//!
//! [`AnalysisResult`] serialises to the JSON snapshot layout as a top-level
//! array of page records:
//!
//! ```json
//! [
//!     {
//!         "page": 1,
//!         "text": "...",
//!         "images": ["images/page1_image1.png"],
//!         "ai_generated_questions": [
//!             {
//!                 "image": "images/page1_image1.png",
//!                 "question": "What does this image show?",
//!                 "caption": "...",
//!                 "options": ["...", "A clock", "A grid of shapes", "A number sequence"],
//!                 "answer": "..."
//!             }
//!         ]
//!     }
//! ]
//! ```

use crate::error::PageError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One page after extraction, before captioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 1-indexed page number.
    pub index: usize,
    /// Literal page text, leading/trailing whitespace trimmed. May be empty.
    pub text: String,
    /// Embedded images in discovery order.
    pub images: Vec<ExtractedImage>,
}

/// An embedded image that has been persisted to the images directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedImage {
    /// 1-indexed position within the page.
    pub ordinal: usize,
    /// Encoded image bytes exactly as written to `path`.
    pub data: Vec<u8>,
    /// Format identifier, also the file extension ("png", "jpeg", …).
    pub format: String,
    /// Where the bytes were written.
    pub path: PathBuf,
}

impl ExtractedImage {
    /// The storage path as it appears in the JSON snapshot.
    pub fn path_string(&self) -> String {
        path_to_string(&self.path)
    }
}

pub(crate) fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// A multiple-choice question derived from one caption.
///
/// `options[0]`, `caption` and `answer` are always the same string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McqItem {
    pub question: String,
    pub caption: String,
    pub options: [String; 4],
    pub answer: String,
}

/// An [`McqItem`] attached to the image it was generated from.
///
/// Field order matches the snapshot layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub image: String,
    pub question: String,
    pub caption: String,
    pub options: [String; 4],
    pub answer: String,
}

impl QuestionRecord {
    pub fn new(image: impl Into<String>, item: McqItem) -> Self {
        Self {
            image: image.into(),
            question: item.question,
            caption: item.caption,
            options: item.options,
            answer: item.answer,
        }
    }

    /// The question without its image reference.
    pub fn mcq(&self) -> McqItem {
        McqItem {
            question: self.question.clone(),
            caption: self.caption.clone(),
            options: self.options.clone(),
            answer: self.answer.clone(),
        }
    }
}

/// The aggregated output for one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    /// 1-indexed page number.
    pub page: usize,
    pub text: String,
    /// Storage paths of the page's images, in ordinal order.
    pub images: Vec<String>,
    /// One question per image, same order as `images`.
    pub ai_generated_questions: Vec<QuestionRecord>,
    /// Set when the page could not be read. Never serialised.
    #[serde(skip)]
    pub error: Option<PageError>,
}

impl PageRecord {
    /// An empty record for a page that could not be read.
    pub fn unreadable(page: usize, error: PageError) -> Self {
        Self {
            page,
            text: String::new(),
            images: Vec::new(),
            ai_generated_questions: Vec::new(),
            error: Some(error),
        }
    }
}

/// Ordered page records for a whole document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisResult {
    pub pages: Vec<PageRecord>,
}

impl AnalysisResult {
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Total number of generated questions across all pages.
    pub fn question_count(&self) -> usize {
        self.pages
            .iter()
            .map(|p| p.ai_generated_questions.len())
            .sum()
    }
}

/// Aggregate statistics for one analysis run. Not part of the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisStats {
    /// Pages in the document (= records produced).
    pub total_pages: usize,
    /// Pages that could not be read and yielded empty records.
    pub failed_pages: usize,
    /// Images extracted and captioned.
    pub total_images: usize,
    /// Captions that fell back to the sentinel string.
    pub fallback_captions: usize,
    /// Wall-clock time for the whole run.
    pub total_duration_ms: u64,
    /// Time spent waiting on the captioner.
    pub caption_duration_ms: u64,
}

/// Result of [`crate::analyze`]: the snapshot content plus run statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub result: AnalysisResult,
    pub stats: AnalysisStats,
}
