//!
//! src/lib.rs
//!
//! Spotify track report pipelines: fetch an artist's top tracks or a
//! playlist page, flatten it to one row per track and replace a sqlite
//! table with the result.
//!

pub mod config;
pub mod errors;
pub mod logging;

pub mod fetch;
pub mod normalize;
pub mod persistent;
pub mod pipeline;
pub mod report;
pub mod types;

pub use crate::errors::ReportError;
