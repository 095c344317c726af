use serde::{Deserialize, Serialize};

use super::action::Action;
use super::keys::KeyCode;

/// Gap inserted between the steps of a quick sequence.
pub const QUICK_GAP_SECS: f64 = 0.05;

/// Recording shortcuts that expand into a fixed run of primitive actions.
///
/// Expansion happens when the sequence is recorded; the runner never sees
/// these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuickSequence {
    ClickCopy { x: i32, y: i32 },
    ClickPaste { x: i32, y: i32 },
    DragCopy { from: (i32, i32), to: (i32, i32) },
    TripleClick { x: i32, y: i32 },
    SelectAllCopy,
}

impl QuickSequence {
    pub fn expand(&self) -> Vec<Action> {
        let gap = || Action::delay(QUICK_GAP_SECS);

        match *self {
            QuickSequence::ClickCopy { x, y } => vec![Action::click(x, y), gap(), Action::Copy],
            QuickSequence::ClickPaste { x, y } => vec![Action::click(x, y), gap(), Action::Paste],
            QuickSequence::DragCopy { from, to } => {
                vec![Action::drag(from, to), gap(), Action::Copy]
            }
            QuickSequence::TripleClick { x, y } => vec![
                Action::click(x, y),
                gap(),
                Action::click(x, y),
                gap(),
                Action::click(x, y),
            ],
            QuickSequence::SelectAllCopy => {
                vec![
                    Action::hotkey([KeyCode::shortcut_modifier_name(), "a"]),
                    gap(),
                    Action::Copy,
                ]
            }
        }
    }
}
