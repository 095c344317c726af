//! Pre-flight checks for macro programs.
//!
//! Validation never touches the screen or the clipboard, so it is safe to
//! call from the authoring side at any time.

use regex::Regex;
use std::time::Duration;

use crate::error::ValidationError;

use super::action::{Action, ActionPath, OcrMode, Region};
use super::keys::KeyCode;
use super::program::MacroProgram;

/// Deepest allowed chain of nested image checks.
pub const MAX_NESTING: usize = 8;

/// Collect every problem in `program`, in document order.
pub fn validate(program: &MacroProgram) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if program.loop_count < 1 {
        errors.push(ValidationError::InvalidLoopCount(program.loop_count));
    }

    let auto = program.auto_delay;
    if auto.enabled && !is_duration(auto.seconds) {
        errors.push(ValidationError::InvalidDelay {
            at: "Auto-delay".to_string(),
            seconds: auto.seconds,
        });
    }

    for (i, action) in program.actions.iter().enumerate() {
        walk(action, &ActionPath::root(i), 0, &mut errors);
    }

    errors
}

impl Action {
    /// Check this action (and anything nested in it) as a top-level action.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = Vec::new();
        walk(self, &ActionPath::root(0), 0, &mut errors);
        errors.into_iter().next().map_or(Ok(()), Err)
    }
}

/// `branch_depth` counts enclosing image checks.
fn walk(action: &Action, at: &ActionPath, branch_depth: usize, errors: &mut Vec<ValidationError>) {
    if let Err(e) = check(action, at, branch_depth) {
        errors.push(e);
    }

    if let Action::ImgCheck(check) = action {
        if branch_depth + 1 > MAX_NESTING {
            errors.push(ValidationError::NestingTooDeep {
                at: at.clone(),
                max: MAX_NESTING,
            });
            return;
        }
        for (i, child) in check.match_actions.iter().enumerate() {
            walk(child, &at.child(i), branch_depth + 1, errors);
        }
    }
}

fn check(action: &Action, at: &ActionPath, branch_depth: usize) -> Result<(), ValidationError> {
    match action {
        Action::Click { .. } | Action::Drag { .. } | Action::Copy | Action::Paste => Ok(()),
        Action::Delay { seconds } => {
            if is_duration(*seconds) {
                Ok(())
            } else {
                Err(ValidationError::InvalidDelay {
                    at: format!("Action {}", at),
                    seconds: *seconds,
                })
            }
        }
        Action::Hotkey { keys } => {
            if keys.is_empty() {
                return Err(ValidationError::EmptyHotkey { at: at.clone() });
            }
            KeyCode::parse_all(keys.as_slice())
                .map(|_| ())
                .map_err(|key| ValidationError::UnknownKey { at: at.clone(), key })
        }
        Action::Key {
            key,
            count,
            interval,
        } => {
            if key.parse::<KeyCode>().is_err() {
                return Err(ValidationError::UnknownKey {
                    at: at.clone(),
                    key: key.clone(),
                });
            }
            if *count < 1 {
                return Err(ValidationError::InvalidKeyRepeat { at: at.clone() });
            }
            if !is_duration(*interval) {
                return Err(ValidationError::InvalidDelay {
                    at: format!("Action {}", at),
                    seconds: *interval,
                });
            }
            Ok(())
        }
        Action::Ocr(read) => {
            check_region(&read.region, at)?;
            match (&read.mode, read.pattern.as_deref()) {
                (OcrMode::Custom, None) | (OcrMode::Custom, Some("")) => {
                    Err(ValidationError::InvalidPattern {
                        at: at.clone(),
                        reason: "custom mode requires a pattern".to_string(),
                    })
                }
                (_, Some(pattern)) if !pattern.is_empty() => Regex::new(pattern)
                    .map(|_| ())
                    .map_err(|e| ValidationError::InvalidPattern {
                        at: at.clone(),
                        reason: e.to_string(),
                    }),
                _ => Ok(()),
            }
        }
        Action::ImgCheck(check) => {
            check_region(&check.region, at)?;
            if !(0.0..=1.0).contains(&check.threshold) {
                return Err(ValidationError::InvalidThreshold {
                    at: at.clone(),
                    threshold: check.threshold,
                });
            }
            for secs in [check.poll_interval.unwrap_or(0.0), check.timeout] {
                if !is_duration(secs) {
                    return Err(ValidationError::InvalidDelay {
                        at: format!("Action {}", at),
                        seconds: secs,
                    });
                }
            }
            Ok(())
        }
        Action::ClickFound => {
            if branch_depth == 0 {
                Err(ValidationError::MisplacedClickFound { at: at.clone() })
            } else {
                Ok(())
            }
        }
    }
}

fn check_region(region: &Region, at: &ActionPath) -> Result<(), ValidationError> {
    let bounds = region.bounds();
    if bounds.is_capturable() {
        Ok(())
    } else {
        Err(ValidationError::InvalidRegion {
            at: at.clone(),
            width: bounds.width,
            height: bounds.height,
        })
    }
}

/// Non-negative and representable as a `Duration`.
fn is_duration(seconds: f64) -> bool {
    seconds >= 0.0 && Duration::try_from_secs_f64(seconds).is_ok()
}
