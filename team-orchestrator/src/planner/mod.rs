//! Planning: subtask records, decomposition parsing and the dependency graph.

pub mod decompose;
pub mod graph;
pub mod parser;
pub mod types;

pub use decompose::{decompose, decomposition_prompt, plan_from_text};
pub use graph::{critical_path, execution_waves, ready_set, transitive_dependents, validate};
pub use parser::{parse_decomposition, ParseMode, SubtaskParser};
pub use types::{FailureReason, Subtask};
