//! Core data types, extraction, series assembly and forecasting for skycast
//!
//! This crate holds everything between a downloaded grid and the JSON
//! package: point extraction, the trailing-window series, event
//! classification, the one-step forecaster and the package assembler.
//! Network and language-model collaborators plug in through the traits in
//! [`pipeline`].

pub mod assemble;
pub mod events;
pub mod forecast;
pub mod grid;
pub mod package;
pub mod pipeline;
pub mod rollups;
pub mod series;
pub mod types;
pub mod units;

pub use assemble::*;
pub use events::*;
pub use forecast::*;
pub use grid::*;
pub use package::*;
pub use pipeline::*;
pub use rollups::*;
pub use series::*;
pub use types::*;
pub use units::*;
