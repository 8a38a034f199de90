//! Agent backends.
//!
//! - **scripted**: canned replies, for tests, demos and dry runs
//! - **process**: runs an external command per turn (e.g. a model CLI)

pub mod process;
pub mod scripted;

pub use process::{ProcessAgent, ProcessCommand};
pub use scripted::ScriptedAgent;
