//! Question synthesis: caption → multiple-choice question.
//!
//! Pure and total. The three distractors are fixed placeholders that do not
//! depend on the document; a caption equal to one of them yields a duplicate
//! option, which is kept as-is.

use crate::output::McqItem;

/// Prompt shared by every generated question.
pub const QUESTION_PROMPT: &str = "What does this image show?";

/// Static wrong answers appended after the caption.
pub const DISTRACTORS: [&str; 3] = ["A clock", "A grid of shapes", "A number sequence"];

/// Build the question for one caption.
///
/// `options` is `[caption, DISTRACTORS...]` and `answer` is the caption.
pub fn synthesize(caption: &str) -> McqItem {
    McqItem {
        question: QUESTION_PROMPT.to_string(),
        caption: caption.to_string(),
        options: [
            caption.to_string(),
            DISTRACTORS[0].to_string(),
            DISTRACTORS[1].to_string(),
            DISTRACTORS[2].to_string(),
        ],
        answer: caption.to_string(),
    }
}
