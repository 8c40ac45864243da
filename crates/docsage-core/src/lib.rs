//! DocSage Core: shared data model, configuration, errors, model capabilities.

pub mod capabilities;
pub mod config;
pub mod error;
pub mod types;

pub use capabilities::{AnswerGenerator, ImageDescriber};
pub use config::{DataPaths, DocSageConfig, IdStrategy};
pub use error::{Error, Result};
pub use types::*;
