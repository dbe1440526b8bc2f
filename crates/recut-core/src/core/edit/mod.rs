//! Edit Module
//!
//! EditPlan schema, plan validation and conflict detection, best-effort
//! application to a clip timeline, and the editor that runs the pipeline.

mod applier;
mod conflicts;
mod editor;
mod plan;
mod validator;

pub use applier::*;
pub use conflicts::*;
pub use editor::*;
pub use plan::*;
pub use validator::*;
