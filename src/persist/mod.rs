//! Macro files
//!
//! Files are JSON objects:
//!
//! ```json
//! { "actions": [{ "type": "click", "x": 10, "y": 20 }],
//!   "loop_count": 2,
//!   "auto_delay": { "enabled": true, "seconds": 0.5 } }
//! ```
//!
//! Older files store each action as a tuple (`["click", 10, 20]`) and the
//! auto-delay as `"auto_delay": true, "auto_delay_time": 0.5`. Both shapes
//! load; saving always writes the tagged form.

use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PersistError;
use crate::models::{
    Action, AutoDelay, ImageCheck, MacroProgram, OcrMode, OcrRead, Processing, Region,
};

type Result<T> = std::result::Result<T, PersistError>;

/// Old files default to this when only the flag was stored.
const LEGACY_AUTO_DELAY_SECS: f64 = 0.5;
const LEGACY_THRESHOLD: f64 = 0.8;
const LEGACY_POLL_SECS: f64 = 0.5;

pub fn load_program(path: &Path) -> Result<MacroProgram> {
    let text = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&text)?;
    let program = from_value(value)?;
    tracing::debug!(
        "Loaded {} action(s) from {}",
        program.action_count(),
        path.display()
    );
    Ok(program)
}

pub fn save_program(path: &Path, program: &MacroProgram) -> Result<()> {
    fs::write(path, to_json(program)?)?;
    tracing::debug!("Saved macro to {}", path.display());
    Ok(())
}

/// Pretty JSON in the current format.
pub fn to_json(program: &MacroProgram) -> Result<String> {
    Ok(serde_json::to_string_pretty(program)?)
}

/// Build a program from either file shape.
pub fn from_value(value: Value) -> Result<MacroProgram> {
    let obj = match value {
        Value::Object(obj) => obj,
        Value::Array(_) => {
            let mut obj = Map::new();
            obj.insert("actions".into(), value);
            obj
        }
        other => {
            return Err(PersistError::Malformed(format!(
                "expected an object, found {}",
                kind(&other)
            )))
        }
    };

    let actions = match obj.get("actions") {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                parse_action(item).map_err(|e| match e {
                    PersistError::Malformed(msg) => {
                        PersistError::Malformed(format!("action {}: {}", i + 1, msg))
                    }
                    other => other,
                })
            })
            .collect::<Result<Vec<_>>>()?,
        Some(other) => {
            return Err(PersistError::Malformed(format!(
                "'actions' must be a list, found {}",
                kind(other)
            )))
        }
        None => Vec::new(),
    };

    let loop_count = match obj.get("loop_count") {
        None | Some(Value::Null) => 1,
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| PersistError::Malformed(format!("bad loop_count: {}", v)))?,
    };

    let auto_delay = match obj.get("auto_delay") {
        None | Some(Value::Null) => AutoDelay::off(),
        Some(Value::Bool(enabled)) => AutoDelay {
            enabled: *enabled,
            seconds: obj
                .get("auto_delay_time")
                .and_then(Value::as_f64)
                .unwrap_or(LEGACY_AUTO_DELAY_SECS),
        },
        Some(v @ Value::Object(_)) => serde_json::from_value(v.clone())?,
        Some(other) => {
            return Err(PersistError::Malformed(format!(
                "bad auto_delay: {}",
                other
            )))
        }
    };

    Ok(MacroProgram {
        actions,
        loop_count,
        auto_delay,
    })
}

/// Parse one action in tagged or tuple form.
pub fn parse_action(value: &Value) -> Result<Action> {
    match value {
        Value::Object(_) => Ok(serde_json::from_value(value.clone())?),
        Value::Array(items) => parse_tuple(items),
        other => Err(PersistError::Malformed(format!(
            "expected an action, found {}",
            kind(other)
        ))),
    }
}

fn parse_tuple(items: &[Value]) -> Result<Action> {
    let (tag, args) = items
        .split_first()
        .ok_or_else(|| PersistError::Malformed("empty action".into()))?;
    let tag = tag
        .as_str()
        .ok_or_else(|| PersistError::Malformed(format!("bad action tag: {}", tag)))?;

    let action = match (tag, args) {
        ("click", [x, y]) => Action::Click {
            x: int(x)?,
            y: int(y)?,
        },
        ("drag", [from, to]) => Action::Drag {
            from: point(from)?,
            to: point(to)?,
        },
        ("delay", [secs]) => Action::Delay {
            seconds: float(secs)?,
        },
        ("copy", []) => Action::Copy,
        ("paste", []) => Action::Paste,
        ("hotkey", keys) => Action::Hotkey {
            keys: keys.iter().map(string).collect::<Result<_>>()?,
        },
        ("key", [key, count, interval]) => Action::Key {
            key: string(key)?.to_lowercase(),
            count: u32::try_from(int(count)?.max(0)).unwrap_or(0),
            interval: float(interval)?,
        },
        // Anything shorter than the full five-element form is a legacy read
        ("ocr", [coords, rest @ ..]) if rest.len() < 3 => {
            Action::Ocr(OcrRead::legacy(region(coords)?))
        }
        ("ocr", [coords, mode, pattern, processing]) => {
            let region = region(coords)?;
            let mode = string(mode)?;
            if mode == "legacy" {
                Action::Ocr(OcrRead::legacy(region))
            } else {
                let pattern = match pattern {
                    Value::Null => None,
                    other => Some(string(other)?).filter(|p| !p.is_empty()),
                };
                Action::Ocr(OcrRead {
                    region,
                    mode: ocr_mode(&mode)?,
                    pattern,
                    processing: processing_policy(&string(processing)?)?,
                })
            }
        }
        ("img_check", [path, coords, subs, cfg]) => {
            let match_actions = match subs {
                Value::Array(items) => items.iter().map(parse_action).collect::<Result<_>>()?,
                Value::Null => Vec::new(),
                other => {
                    return Err(PersistError::Malformed(format!(
                        "img_check sub-actions must be a list, found {}",
                        kind(other)
                    )))
                }
            };
            img_check(PathBuf::from(string(path)?), region(coords)?, match_actions, cfg)?
        }
        ("click_found", []) => Action::ClickFound,
        (tag, args) => {
            return Err(PersistError::Malformed(format!(
                "unknown action '{}' with {} argument(s)",
                tag,
                args.len()
            )))
        }
    };

    Ok(action)
}

fn img_check(
    reference_image: PathBuf,
    region: Region,
    match_actions: Vec<Action>,
    cfg: &Value,
) -> Result<Action> {
    let mut check = ImageCheck {
        reference_image,
        region,
        threshold: LEGACY_THRESHOLD,
        match_actions,
        wait_until_found: false,
        poll_interval: None,
        timeout: 0.0,
    };

    match cfg {
        Value::Number(_) => check.threshold = float(cfg)?,
        Value::Object(cfg) => {
            if let Some(v) = cfg.get("threshold") {
                check.threshold = float(v)?;
            }
            check.wait_until_found = cfg.get("wait").and_then(Value::as_bool).unwrap_or(false);
            check.poll_interval = Some(match cfg.get("interval") {
                Some(v) => float(v)?,
                None => LEGACY_POLL_SECS,
            });
            if let Some(v) = cfg.get("timeout") {
                check.timeout = float(v)?;
            }
        }
        other => {
            return Err(PersistError::Malformed(format!(
                "bad img_check settings: {}",
                other
            )))
        }
    }

    Ok(Action::ImgCheck(check))
}

fn ocr_mode(name: &str) -> Result<OcrMode> {
    match name {
        "all_text" => Ok(OcrMode::AllText),
        "numbers" => Ok(OcrMode::Numbers),
        "email" => Ok(OcrMode::Email),
        "custom" => Ok(OcrMode::Custom),
        other => Err(PersistError::Malformed(format!("unknown OCR mode '{}'", other))),
    }
}

fn processing_policy(name: &str) -> Result<Processing> {
    match name {
        "copy" => Ok(Processing::Copy),
        "first" | "first_match" => Ok(Processing::FirstMatch),
        "all" | "copy_all_joined" => Ok(Processing::CopyAllJoined),
        "show" => Ok(Processing::Show),
        other => Err(PersistError::Malformed(format!(
            "unknown OCR processing '{}'",
            other
        ))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

fn float(value: &Value) -> Result<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| PersistError::Malformed(format!("expected a number, found {}", value)))
}

fn int(value: &Value) -> Result<i32> {
    let n = float(value)?.round();
    if n < f64::from(i32::MIN) || n > f64::from(i32::MAX) {
        return Err(PersistError::Malformed(format!("{} is out of range", value)));
    }
    Ok(n as i32)
}

fn string(value: &Value) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| PersistError::Malformed(format!("expected a string, found {}", value)))
}

fn point(value: &Value) -> Result<(i32, i32)> {
    match value.as_array().map(Vec::as_slice) {
        Some([x, y]) => Ok((int(x)?, int(y)?)),
        _ => Err(PersistError::Malformed(format!("expected [x, y], found {}", value))),
    }
}

fn region(value: &Value) -> Result<Region> {
    match value.as_array().map(Vec::as_slice) {
        Some([x1, y1, x2, y2]) => Ok(Region::new(int(x1)?, int(y1)?, int(x2)?, int(y2)?)),
        _ => Err(PersistError::Malformed(format!(
            "expected [x1, y1, x2, y2], found {}",
            value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LEGACY_ID_PATTERN;
    use serde_json::json;

    #[test]
    fn test_legacy_ocr_tuple_maps_to_numbers_read() {
        let action = parse_action(&json!(["ocr", [30, 40, 10, 20]])).unwrap();
        assert_eq!(
            action,
            Action::Ocr(OcrRead {
                region: Region::new(30, 40, 10, 20),
                mode: OcrMode::Numbers,
                pattern: Some(LEGACY_ID_PATTERN.to_string()),
                processing: Processing::Copy,
            })
        );

        let explicit = parse_action(&json!(["ocr", [0, 0, 5, 5], "legacy", "", "copy"])).unwrap();
        assert_eq!(explicit, Action::Ocr(OcrRead::legacy(Region::new(0, 0, 5, 5))));
    }

    #[test]
    fn test_short_ocr_tuples_load_as_legacy() {
        let expected = Action::Ocr(OcrRead::legacy(Region::new(1, 2, 30, 40)));
        let three = parse_action(&json!(["ocr", [1, 2, 30, 40], "numbers"])).unwrap();
        let four = parse_action(&json!(["ocr", [1, 2, 30, 40], "email", null])).unwrap();
        assert_eq!(three, expected);
        assert_eq!(four, expected);
    }

    #[test]
    fn test_old_file_loads() {
        let program = from_value(json!({
            "actions": [
                ["click", 100, 200],
                ["drag", [1, 2], [3, 4]],
                ["delay", 0.25],
                ["hotkey", "ctrl", "a"],
                ["key", "Tab", 3, 0.1],
                ["ocr", [0, 0, 50, 20], "email", "", "all"],
                ["img_check", "ok.png", [0, 0, 30, 30], [["click_found"], ["copy"]],
                    { "threshold": 0.85, "wait": true, "timeout": 5 }],
                ["img_check", "old.png", [0, 0, 30, 30], [], 0.7]
            ],
            "loop_count": 4,
            "auto_delay": true,
            "auto_delay_time": 0.2
        }))
        .unwrap();

        assert_eq!(program.loop_count, 4);
        assert_eq!(program.auto_delay, AutoDelay::new(0.2));
        assert_eq!(program.actions.len(), 8);
        assert_eq!(program.actions[0], Action::click(100, 200));
        assert_eq!(program.actions[1], Action::drag((1, 2), (3, 4)));
        assert_eq!(program.actions[3], Action::hotkey(["ctrl", "a"]));
        assert_eq!(
            program.actions[4],
            Action::Key {
                key: "tab".into(),
                count: 3,
                interval: 0.1
            }
        );

        let Action::Ocr(read) = &program.actions[5] else {
            panic!("expected OCR");
        };
        assert_eq!(read.mode, OcrMode::Email);
        assert_eq!(read.pattern, None);
        assert_eq!(read.processing, Processing::CopyAllJoined);

        let Action::ImgCheck(check) = &program.actions[6] else {
            panic!("expected image check");
        };
        assert_eq!(check.threshold, 0.85);
        assert!(check.wait_until_found);
        assert_eq!(check.poll_interval, Some(0.5));
        assert_eq!(check.timeout, 5.0);
        assert_eq!(check.match_actions, vec![Action::ClickFound, Action::Copy]);

        let Action::ImgCheck(old) = &program.actions[7] else {
            panic!("expected image check");
        };
        assert_eq!(old.threshold, 0.7);
        assert!(!old.wait_until_found);
    }

    #[test]
    fn test_save_writes_tagged_form_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("macro.json");

        let legacy = from_value(json!({
            "actions": [["ocr", [0, 0, 9, 9]], ["paste"]],
            "loop_count": 2,
            "auto_delay": false
        }))
        .unwrap();
        save_program(&path, &legacy).unwrap();

        let written: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["actions"][0]["type"], "ocr");
        assert_eq!(written["actions"][1], json!({ "type": "paste" }));
        assert_eq!(written["auto_delay"]["enabled"], false);

        assert_eq!(load_program(&path).unwrap(), legacy);
    }

    #[test]
    fn test_malformed_actions_are_reported() {
        let err = from_value(json!({ "actions": [["click", 1]] })).unwrap_err();
        assert!(err.to_string().contains("action 1"));

        assert!(matches!(
            parse_action(&json!(["teleport", 1, 2])),
            Err(PersistError::Malformed(_))
        ));
        assert!(matches!(from_value(json!(42)), Err(PersistError::Malformed(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_program(Path::new("/no/such/macro.json")).unwrap_err();
        assert!(matches!(err, PersistError::Io(_)));
    }
}
