use std::path::PathBuf;
use thiserror::Error;

use crate::models::ActionPath;

/// Structural problems found before a run starts. Any of these blocks `start`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Loop count must be at least 1, got {0}")]
    InvalidLoopCount(u32),

    #[error("Action {at}: region {width}x{height} is too small to capture")]
    InvalidRegion {
        at: ActionPath,
        width: u32,
        height: u32,
    },

    #[error("Action {at}: invalid pattern: {reason}")]
    InvalidPattern { at: ActionPath, reason: String },

    #[error("Action {at}: threshold {threshold} is outside [0, 1]")]
    InvalidThreshold { at: ActionPath, threshold: f64 },

    #[error("{at}: delay of {seconds}s is not a valid duration")]
    InvalidDelay { at: String, seconds: f64 },

    #[error("Action {at}: hotkey has no keys")]
    EmptyHotkey { at: ActionPath },

    #[error("Action {at}: unknown key '{key}'")]
    UnknownKey { at: ActionPath, key: String },

    #[error("Action {at}: key must be pressed at least once")]
    InvalidKeyRepeat { at: ActionPath },

    #[error("Action {at}: click-found is only valid inside an image check")]
    MisplacedClickFound { at: ActionPath },

    #[error("Action {at}: image checks nested deeper than {max} levels")]
    NestingTooDeep { at: ActionPath, max: usize },
}

/// Failures of the sensing side (capture, OCR, reference images).
///
/// The runner reports these as warnings and carries on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    #[error("Screen capture failed: {0}")]
    Capture(String),

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("Reference image not found: {0}")]
    ImageNotFound(PathBuf),

    #[error("Could not decode reference image {path}: {reason}")]
    ImageDecode { path: PathBuf, reason: String },

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Sensor worker stopped: {0}")]
    Worker(String),
}

/// Failures of input injection or the clipboard. These end the run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InjectionError {
    #[error("Input injection failed: {0}")]
    Input(String),

    #[error("Clipboard access failed: {0}")]
    Clipboard(String),

    #[error("Input worker stopped: {0}")]
    Worker(String),
}

/// Why the runner refused to start.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("A macro is already running")]
    AlreadyRunning,

    #[error("Macro failed validation ({} problem(s))", .0.len())]
    Invalid(Vec<ValidationError>),
}

/// Macro file problems.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed macro data: {0}")]
    Malformed(String),
}

pub type Result<T, E = RunnerError> = std::result::Result<T, E>;
