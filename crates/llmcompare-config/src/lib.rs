//! Configuration for llmcompare
//!
//! Values are merged with precedence CLI > environment > config file >
//! defaults. The config file is `.llmcompare/config.toml`, found by walking up
//! from the working directory, or given explicitly with `--config`.

mod builder;
mod discovery;
pub mod features;
mod model;

pub use builder::ConfigBuilder;
pub use discovery::{CONFIG_DIR, CONFIG_FILE};
pub use features::{FeatureOverride, FeatureRegistry, FeatureSpec};
pub use model::*;
