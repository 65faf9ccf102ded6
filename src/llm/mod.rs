pub mod gemini;
pub mod media;
pub mod models;
pub mod outcome;

pub use gemini::{generate_content, hint_for_error, GenerateRequest, GenerationError};
pub use outcome::{extract_outcome, RenderOutcome};
