//! Macro run execution
//!
//! `MacroRunner` owns the single active run and hands out `RunHandle`s. Each
//! run walks an `ActionTree` built over the program with an
//! `ExecutionContext`, reporting through a `RunReporter`.

pub mod models;
pub mod reporter;
pub mod runner;
pub mod sequencer;
pub mod tree;

pub use models::{RunEvent, RunOutcome, RunSummary, RunUpdate};
pub use reporter::{RunReporter, StatusCallback};
pub use runner::{MacroRunner, RunHandle};
pub use sequencer::ExecutionContext;
pub use tree::{ActionTree, NodeId};
