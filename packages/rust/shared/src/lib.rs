//! Shared types, error model, and configuration for chordsync.
//!
//! This crate is the foundation depended on by all other chordsync crates.
//! It provides:
//! - [`ChordsyncError`] — the unified error type
//! - Domain types ([`Identifier`], [`DetailedRecord`], [`NormalizedRecord`], [`AssetReference`])
//! - Configuration ([`AppConfig`], [`PipelineConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, PipelineConfig, RunDefaultsConfig, SinkConfig, StoreConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, store_credentials,
};
pub use error::{ChordsyncError, Result};
pub use types::{
    AlbumRecord, AssetReference, Author, DetailedRecord, Identifier, NormalizedAlbum,
    NormalizedRecord, Translation,
};
