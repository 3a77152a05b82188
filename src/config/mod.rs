//! Configuration module
//!
//! Contains the studio configuration and the template catalog.

mod studio_config;
mod template;

pub use studio_config::*;
pub use template::*;
