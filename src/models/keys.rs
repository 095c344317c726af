use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Key names understood by hotkey and key-press actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    // Letters
    A, B, C, D, E, F, G, H, I, J, K, L, M,
    N, O, P, Q, R, S, T, U, V, W, X, Y, Z,

    // Numbers
    Num0, Num1, Num2, Num3, Num4, Num5, Num6, Num7, Num8, Num9,

    // Function keys
    F1, F2, F3, F4, F5, F6, F7, F8, F9, F10, F11, F12,

    // Modifiers
    Control, Alt, Shift, Meta,

    // Navigation
    Up, Down, Left, Right,
    Home, End, PageUp, PageDown,

    // Editing
    Backspace, Delete, Enter, Tab, Escape, Space,

    // Special
    Insert, PrintScreen, ScrollLock, Pause,
    CapsLock, NumLock,
}

impl KeyCode {
    pub fn is_modifier(self) -> bool {
        matches!(
            self,
            KeyCode::Control | KeyCode::Alt | KeyCode::Shift | KeyCode::Meta
        )
    }

    /// Modifier for select-all, copy and paste: Cmd on macOS, Ctrl elsewhere.
    pub fn shortcut_modifier() -> KeyCode {
        if cfg!(target_os = "macos") {
            KeyCode::Meta
        } else {
            KeyCode::Control
        }
    }

    /// Name of [`KeyCode::shortcut_modifier`] as it appears in hotkey actions.
    pub fn shortcut_modifier_name() -> &'static str {
        match KeyCode::shortcut_modifier() {
            KeyCode::Meta => "cmd",
            _ => "ctrl",
        }
    }

    /// Character for letter and digit keys.
    pub fn as_char(self) -> Option<char> {
        let c = match self {
            KeyCode::A => 'a',
            KeyCode::B => 'b',
            KeyCode::C => 'c',
            KeyCode::D => 'd',
            KeyCode::E => 'e',
            KeyCode::F => 'f',
            KeyCode::G => 'g',
            KeyCode::H => 'h',
            KeyCode::I => 'i',
            KeyCode::J => 'j',
            KeyCode::K => 'k',
            KeyCode::L => 'l',
            KeyCode::M => 'm',
            KeyCode::N => 'n',
            KeyCode::O => 'o',
            KeyCode::P => 'p',
            KeyCode::Q => 'q',
            KeyCode::R => 'r',
            KeyCode::S => 's',
            KeyCode::T => 't',
            KeyCode::U => 'u',
            KeyCode::V => 'v',
            KeyCode::W => 'w',
            KeyCode::X => 'x',
            KeyCode::Y => 'y',
            KeyCode::Z => 'z',
            KeyCode::Num0 => '0',
            KeyCode::Num1 => '1',
            KeyCode::Num2 => '2',
            KeyCode::Num3 => '3',
            KeyCode::Num4 => '4',
            KeyCode::Num5 => '5',
            KeyCode::Num6 => '6',
            KeyCode::Num7 => '7',
            KeyCode::Num8 => '8',
            KeyCode::Num9 => '9',
            _ => return None,
        };
        Some(c)
    }

    /// Parse every name in `names`, returning the first unknown one on failure.
    pub fn parse_all<S: AsRef<str>>(names: &[S]) -> Result<Vec<KeyCode>, String> {
        names
            .iter()
            .map(|n| n.as_ref().parse::<KeyCode>().map_err(|_| n.as_ref().to_string()))
            .collect()
    }
}

impl FromStr for KeyCode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = match s.trim().to_lowercase().as_str() {
            "a" => KeyCode::A,
            "b" => KeyCode::B,
            "c" => KeyCode::C,
            "d" => KeyCode::D,
            "e" => KeyCode::E,
            "f" => KeyCode::F,
            "g" => KeyCode::G,
            "h" => KeyCode::H,
            "i" => KeyCode::I,
            "j" => KeyCode::J,
            "k" => KeyCode::K,
            "l" => KeyCode::L,
            "m" => KeyCode::M,
            "n" => KeyCode::N,
            "o" => KeyCode::O,
            "p" => KeyCode::P,
            "q" => KeyCode::Q,
            "r" => KeyCode::R,
            "s" => KeyCode::S,
            "t" => KeyCode::T,
            "u" => KeyCode::U,
            "v" => KeyCode::V,
            "w" => KeyCode::W,
            "x" => KeyCode::X,
            "y" => KeyCode::Y,
            "z" => KeyCode::Z,
            "0" => KeyCode::Num0,
            "1" => KeyCode::Num1,
            "2" => KeyCode::Num2,
            "3" => KeyCode::Num3,
            "4" => KeyCode::Num4,
            "5" => KeyCode::Num5,
            "6" => KeyCode::Num6,
            "7" => KeyCode::Num7,
            "8" => KeyCode::Num8,
            "9" => KeyCode::Num9,
            "f1" => KeyCode::F1,
            "f2" => KeyCode::F2,
            "f3" => KeyCode::F3,
            "f4" => KeyCode::F4,
            "f5" => KeyCode::F5,
            "f6" => KeyCode::F6,
            "f7" => KeyCode::F7,
            "f8" => KeyCode::F8,
            "f9" => KeyCode::F9,
            "f10" => KeyCode::F10,
            "f11" => KeyCode::F11,
            "f12" => KeyCode::F12,
            "ctrl" | "control" => KeyCode::Control,
            "alt" | "option" => KeyCode::Alt,
            "shift" => KeyCode::Shift,
            "meta" | "win" | "cmd" | "command" => KeyCode::Meta,
            "up" => KeyCode::Up,
            "down" => KeyCode::Down,
            "left" => KeyCode::Left,
            "right" => KeyCode::Right,
            "home" => KeyCode::Home,
            "end" => KeyCode::End,
            "pageup" | "pgup" => KeyCode::PageUp,
            "pagedown" | "pgdn" => KeyCode::PageDown,
            "backspace" | "bs" => KeyCode::Backspace,
            "delete" | "del" => KeyCode::Delete,
            "enter" | "return" => KeyCode::Enter,
            "tab" => KeyCode::Tab,
            "escape" | "esc" => KeyCode::Escape,
            "space" => KeyCode::Space,
            "insert" | "ins" => KeyCode::Insert,
            "printscreen" | "prtsc" => KeyCode::PrintScreen,
            "scrolllock" => KeyCode::ScrollLock,
            "pause" => KeyCode::Pause,
            "capslock" => KeyCode::CapsLock,
            "numlock" => KeyCode::NumLock,
            _ => return Err(()),
        };
        Ok(key)
    }
}
