//! # smallspider-core
//!
//! Core types shared by every SmallSpider crate. Nothing here knows about
//! HTTP or the admin; the other crates build on these foundations.
//!
//! ## Modules
//!
//! - [`error`] - Error types and result aliases
//! - [`settings`] - Application settings with defaults
//! - [`settings_loader`] - Loading settings from TOML and the environment
//! - [`logging`] - Tracing-based logging integration
//! - [`checks`] - Diagnostic messages produced by configuration checks

pub mod checks;
pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;

pub use error::{SpiderError, SpiderResult, ValidationError};
pub use settings::{AdminSettings, Settings, UserSeed};
