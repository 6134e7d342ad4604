//! Natural-language advice for an analysed date
//!
//! The prompt is a fixed template over the expected conditions. The
//! language model's answer is passed through untouched.

pub mod gemini;
pub mod prompt;

pub use gemini::*;
pub use prompt::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("language model answered {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("response has no candidate text")]
    MissingText,

    #[error("no API key configured")]
    MissingApiKey,
}
