//! Export module
//!
//! Background PNG export of finished cards.

pub mod pipeline;

pub use pipeline::{ExportError, ExportPipeline, ExportState, ExportedCard};
