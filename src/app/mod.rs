//! Application module
//!
//! Contains the main egui application and the editor state it drives.

pub mod state;
mod studio_app;

pub use studio_app::StudioApp;
