//! `pipesock-core` — configuration and error types shared by every pipesock crate.

pub mod config;
pub mod error;

pub use config::PipesockConfig;
pub use error::{PipesockError, Result};
