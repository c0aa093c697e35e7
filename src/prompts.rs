//! Prompts for VLM-based image captioning.
//!
//! Every prompt lives here so a wording change touches exactly one place and
//! unit tests can inspect prompts without a real provider.
//!
//! Callers can override the system prompt via
//! [`crate::config::AnalysisConfig::caption_prompt`].

/// Default system prompt for describing one embedded image.
///
/// The caption becomes both the correct answer and the first option of a
/// multiple-choice question, so it must read as a standalone answer.
pub const DEFAULT_CAPTION_PROMPT: &str = r#"You are an image captioning model. Describe the image you are given.

Rules:
- Answer with ONE short sentence of at most 20 words
- Describe what is visibly shown (objects, shapes, numbers, scenes)
- Do NOT start with "This image shows" or "The image depicts"
- Do NOT add commentary, markdown, quotes or a trailing explanation
- If the image is blank or unreadable, describe it as such"#;

/// User turn sent alongside the image.
pub const CAPTION_REQUEST: &str = "Caption this image.";
