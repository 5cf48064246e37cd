//! Review star-schema builder.
//!
//! Scraped per-title review documents are turned into a deduplicated star schema (dimensions,
//! bridges and a review fact table). Films and series are resolved against the IMDb-style
//! reference dumps to pick up cast and crew, and titles are grouped into franchises.

pub mod builder;
pub mod canonical;
pub mod cluster;
pub mod config;
pub mod corpus;
pub mod documents;
pub mod error;
pub mod logging;
pub mod model;
pub mod normalization;
pub mod pipeline;
pub mod resolver;
pub mod roles;
pub mod sink;

pub mod util {
    pub mod env;
}

pub use config::EngineConfig;
pub use error::EngineError;
pub use pipeline::{RunReport, StarSchema, StarSchemaEngine};
