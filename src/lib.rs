#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod config;
pub mod engine;
pub mod error;
pub mod fileset;
pub mod gzip;
pub mod inventory;
pub mod metadata;
pub mod minifier;
pub mod models;
pub mod naming;
pub mod pipeline;
pub mod resolver;
pub mod rewriter;

pub use config::PipelineConfig;
pub use error::{ErrorPolicy, PipelineError, PipelineResult};
pub use minifier::{CommandMinifier, Minifier, MinifierError};
pub use models::{AssetRecord, HashedAsset, PipelineReport, SourceFileRecord};
pub use pipeline::Pipeline;
pub use rewriter::ReplacementTable;
