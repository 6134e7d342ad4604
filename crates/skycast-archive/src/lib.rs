//! Satellite archive retrieval
//!
//! Granules are located through the CMR granule search and subset through
//! their OPeNDAP endpoints as DAP2 ASCII. Every response body is written to
//! a per-slot cache directory and reused on later requests for the same
//! granule and index range.

pub mod cache;
pub mod cmr;
pub mod dap;
pub mod earthdata;

pub use cache::*;
pub use cmr::*;
pub use dap::*;
pub use earthdata::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} answered {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Malformed search response: {0}")]
    Search(#[from] serde_json::Error),

    #[error("Malformed DAP response: {0}")]
    Dap(String),

    #[error("granule does not cover the search box")]
    NoCoverage,

    #[error(transparent)]
    Grid(#[from] skycast_core::GridError),
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;
