//! Pipeline stages for PDF-to-quiz analysis.
//!
//! Each submodule implements one step. The analyzer in [`crate::analyze`]
//! wires them together; nothing here knows about the JSON snapshot.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ document ──▶ extract ──▶ caption ──▶ question
//! (URL/path)  (pdfium)    (persist)   (VLM)       (MCQ)
//!                                        │
//!                              encode ◀──┴──▶ postprocess
//! ```
//!
//! 1. [`input`]    canonicalise the user-supplied path or URL to a local file
//! 2. [`document`] open the PDF and stream page text and images from a
//!    `spawn_blocking` reader, one page at a time
//! 3. [`extract`]  trim text and write each image to the images directory
//! 4. [`caption`]  describe each image with a VLM; never fails, falls back
//!    to a fixed sentence
//! 5. [`question`] derive the multiple-choice item from a caption
//!
//! [`encode`] and [`postprocess`] are helpers for the image bytes going in
//! and the caption text coming out.

pub mod caption;
pub mod document;
pub mod encode;
pub mod extract;
pub mod input;
pub mod postprocess;
pub mod question;
