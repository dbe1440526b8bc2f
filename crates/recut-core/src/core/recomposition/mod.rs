//! Recomposition Module
//!
//! Turns an EditPlan into a composition diff, submits it to the rendering
//! backend and tracks the resulting record until an external status update
//! completes it.

mod backend;
mod builder;
mod config;
mod events;
mod record;
mod service;
mod store;

pub use backend::*;
pub use builder::*;
pub use config::*;
pub use events::*;
pub use record::*;
pub use service::*;
pub use store::*;
