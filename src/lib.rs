//! Record-and-replay desktop macro engine.
//!
//! A [`MacroProgram`](models::MacroProgram) is a tree of actions (clicks,
//! drags, delays, clipboard shortcuts, OCR reads and image-gated branches)
//! plus a loop count and an auto-delay policy. [`MacroRunner`](runs::MacroRunner)
//! validates it and replays it in the background through the collaborator
//! traits in [`desktop`].

pub mod config;
pub mod desktop;
pub mod error;
pub mod models;
pub mod persist;
pub mod runs;
pub mod vision;

pub use config::RunnerConfig;
pub use error::{Result, RunnerError};
pub use models::{Action, MacroProgram};
pub use runs::{MacroRunner, RunEvent, RunHandle, RunOutcome, RunSummary};
