use serde::{Deserialize, Serialize};

use super::action::Action;
use super::quick::QuickSequence;

/// Pause the runner inserts around every leaf action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AutoDelay {
    pub enabled: bool,
    pub seconds: f64,
}

impl AutoDelay {
    pub fn new(seconds: f64) -> Self {
        Self {
            enabled: true,
            seconds,
        }
    }

    pub fn off() -> Self {
        Self::default()
    }
}

/// A complete macro: the action tree, how often to repeat it and the
/// auto-delay policy.
///
/// The authoring side owns and edits this; each run gets its own snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroProgram {
    pub actions: Vec<Action>,
    pub loop_count: u32,
    #[serde(default)]
    pub auto_delay: AutoDelay,
}

impl MacroProgram {
    pub fn new(actions: Vec<Action>) -> Self {
        Self {
            actions,
            loop_count: 1,
            auto_delay: AutoDelay::off(),
        }
    }

    pub fn with_loops(mut self, loop_count: u32) -> Self {
        self.loop_count = loop_count;
        self
    }

    pub fn with_auto_delay(mut self, auto_delay: AutoDelay) -> Self {
        self.auto_delay = auto_delay;
        self
    }

    pub fn push(&mut self, action: Action) {
        self.actions.push(action);
    }

    /// Record a quick sequence as its primitive actions.
    pub fn push_quick(&mut self, sequence: QuickSequence) {
        self.actions.extend(sequence.expand());
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Number of actions in the whole tree, branches included.
    pub fn action_count(&self) -> usize {
        fn count(actions: &[Action]) -> usize {
            actions.iter().map(|a| 1 + count(a.children())).sum()
        }
        count(&self.actions)
    }
}

impl Default for MacroProgram {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ImageCheck, Region};

    #[test]
    fn test_push_quick_expands_in_place() {
        let mut program = MacroProgram::new(vec![Action::Paste]);
        program.push_quick(QuickSequence::ClickCopy { x: 3, y: 4 });

        assert_eq!(program.actions.len(), 4);
        assert_eq!(program.actions[1], Action::click(3, 4));
    }

    #[test]
    fn test_action_count_includes_nested() {
        let check = Action::ImgCheck(ImageCheck {
            reference_image: "ok.png".into(),
            region: Region::new(0, 0, 10, 10),
            threshold: 0.8,
            match_actions: vec![Action::ClickFound, Action::Copy],
            wait_until_found: false,
            poll_interval: None,
            timeout: 0.0,
        });
        let program = MacroProgram::new(vec![Action::click(1, 1), check]);
        assert_eq!(program.action_count(), 4);
    }
}
