//! Timeline Module
//!
//! Clip model and the reflow pass that keeps a clip timeline contiguous.

mod models;
mod reflow;

pub use models::*;
pub use reflow::*;
