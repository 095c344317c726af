//! Cross-platform mouse and keyboard input using enigo

use enigo::{Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use super::InputInjector;
use crate::error::InjectionError;
use crate::models::KeyCode;

/// Settle time between moving the pointer and pressing a button.
const SETTLE: Duration = Duration::from_millis(50);
/// Pause between the press and release phases of a hotkey.
const HOTKEY_GAP: Duration = Duration::from_millis(20);
const DRAG_STEP: Duration = Duration::from_millis(10);

/// Input injector backed by enigo
pub struct EnigoInput {
    enigo: Mutex<Enigo>,
}

impl EnigoInput {
    pub fn new() -> anyhow::Result<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| anyhow::anyhow!("Failed to create input controller: {:?}", e))?;
        Ok(Self {
            enigo: Mutex::new(enigo),
        })
    }

    fn with_enigo<T>(
        &self,
        f: impl FnOnce(&mut Enigo) -> Result<T, InjectionError>,
    ) -> Result<T, InjectionError> {
        let mut enigo = self
            .enigo
            .lock()
            .map_err(|_| InjectionError::Input("input controller lock poisoned".into()))?;
        f(&mut enigo)
    }
}

fn move_to(enigo: &mut Enigo, x: i32, y: i32) -> Result<(), InjectionError> {
    enigo
        .move_mouse(x, y, Coordinate::Abs)
        .map_err(|e| InjectionError::Input(format!("Failed to move mouse: {:?}", e)))
}

fn button(enigo: &mut Enigo, direction: Direction) -> Result<(), InjectionError> {
    enigo
        .button(Button::Left, direction)
        .map_err(|e| InjectionError::Input(format!("Failed to use mouse button: {:?}", e)))
}

fn key(enigo: &mut Enigo, code: KeyCode, direction: Direction) -> Result<(), InjectionError> {
    enigo
        .key(to_enigo(code), direction)
        .map_err(|e| InjectionError::Input(format!("Failed to press {:?}: {:?}", code, e)))
}

impl InputInjector for EnigoInput {
    fn click(&self, x: i32, y: i32) -> Result<(), InjectionError> {
        self.with_enigo(|enigo| {
            move_to(enigo, x, y)?;
            thread::sleep(SETTLE);
            button(enigo, Direction::Click)
        })
    }

    fn drag(
        &self,
        from: (i32, i32),
        to: (i32, i32),
        duration: Duration,
    ) -> Result<(), InjectionError> {
        self.with_enigo(|enigo| {
            move_to(enigo, from.0, from.1)?;
            thread::sleep(SETTLE);
            button(enigo, Direction::Press)?;

            let steps = (duration.as_millis() / DRAG_STEP.as_millis()).max(1) as i32;
            for step in 1..=steps {
                let x = from.0 + (to.0 - from.0) * step / steps;
                let y = from.1 + (to.1 - from.1) * step / steps;
                move_to(enigo, x, y)?;
                thread::sleep(DRAG_STEP);
            }

            button(enigo, Direction::Release)
        })
    }

    fn send_hotkey(&self, keys: &[KeyCode]) -> Result<(), InjectionError> {
        self.with_enigo(|enigo| {
            for &code in keys {
                key(enigo, code, Direction::Press)?;
            }
            thread::sleep(HOTKEY_GAP);
            for &code in keys.iter().rev() {
                key(enigo, code, Direction::Release)?;
            }
            Ok(())
        })
    }

    fn press_key(&self, code: KeyCode) -> Result<(), InjectionError> {
        self.with_enigo(|enigo| key(enigo, code, Direction::Click))
    }
}

fn to_enigo(code: KeyCode) -> Key {
    if let Some(c) = code.as_char() {
        return Key::Unicode(c);
    }

    match code {
        // Function keys
        KeyCode::F1 => Key::F1,
        KeyCode::F2 => Key::F2,
        KeyCode::F3 => Key::F3,
        KeyCode::F4 => Key::F4,
        KeyCode::F5 => Key::F5,
        KeyCode::F6 => Key::F6,
        KeyCode::F7 => Key::F7,
        KeyCode::F8 => Key::F8,
        KeyCode::F9 => Key::F9,
        KeyCode::F10 => Key::F10,
        KeyCode::F11 => Key::F11,
        KeyCode::F12 => Key::F12,

        // Modifiers
        KeyCode::Control => Key::Control,
        KeyCode::Alt => Key::Alt,
        KeyCode::Shift => Key::Shift,
        KeyCode::Meta => Key::Meta,

        // Navigation
        KeyCode::Up => Key::UpArrow,
        KeyCode::Down => Key::DownArrow,
        KeyCode::Left => Key::LeftArrow,
        KeyCode::Right => Key::RightArrow,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        KeyCode::PageUp => Key::PageUp,
        KeyCode::PageDown => Key::PageDown,

        // Editing
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Delete => Key::Delete,
        KeyCode::Enter => Key::Return,
        KeyCode::Tab => Key::Tab,
        KeyCode::Escape => Key::Escape,
        KeyCode::Space => Key::Space,

        // Special
        KeyCode::Insert => Key::Insert,
        KeyCode::PrintScreen => Key::Print,
        KeyCode::ScrollLock => Key::Other(0x91), // VK_SCROLL on Windows
        KeyCode::Pause => Key::Pause,
        KeyCode::CapsLock => Key::CapsLock,
        KeyCode::NumLock => Key::Numlock,

        // Letters and digits are handled above
        other => Key::Unicode(other.as_char().unwrap_or(' ')),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letters_map_to_unicode() {
        assert_eq!(to_enigo(KeyCode::C), Key::Unicode('c'));
        assert_eq!(to_enigo(KeyCode::Num5), Key::Unicode('5'));
        assert_eq!(to_enigo(KeyCode::Enter), Key::Return);
    }
}
