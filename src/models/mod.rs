pub mod action;
pub mod keys;
pub mod program;
pub mod quick;
pub mod validation;

pub use action::{
    Action, ActionPath, Bounds, ImageCheck, OcrMode, OcrRead, Processing, Region,
    LEGACY_ID_PATTERN,
};
pub use keys::KeyCode;
pub use program::{AutoDelay, MacroProgram};
pub use quick::QuickSequence;
pub use validation::{validate, MAX_NESTING};
