//! Vue Lynx Bundle Assembly
//!
//! Turns bundler output into Lynx artifacts: reads the configured chunks,
//! prefixes the metadata preamble and entry bootstrap, encodes the result
//! with the container codec and writes it atomically. Also hosts the
//! variant server used to load artifacts on devices.

#![warn(rust_2018_idioms)]

pub mod assemble;
pub mod config;
pub mod metadata;
pub mod pack;
pub mod server;
pub mod watch;

pub use assemble::{assemble, AssembleError, AssembleOptions, AssembleReport, ArtifactManifest};
pub use config::{ArtifactConfig, BuildConfig, ConfigError, CONFIG_FILE};
pub use metadata::BundleMetadata;
pub use pack::{pack_all, plan_jobs, ArtifactJob, PackError, PackOptions};
pub use server::{route, serve, serve_variants, Response, DEFAULT_PORT};
pub use watch::{watch, WatchError, WatchSet};
