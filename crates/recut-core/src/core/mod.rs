//! Recut Core Engine
//!
//! Prompt-driven re-editing of generated videos: edit plans are validated
//! against a generation's clips, applied, reflowed, and the resulting
//! composition diff is handed to the rendering backend for recomposition.

pub mod edit;
pub mod recomposition;
pub mod settings;
pub mod timeline;

// Re-export common types
mod types;
pub use types::*;

mod error;
pub use error::*;

#[cfg(test)]
mod tests_scenarios;
