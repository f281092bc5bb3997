//! On-screen keyboard used to type search terms with a joystick.

use crate::input::{Button, InputSnapshot};

pub const LAYOUT: [&[&str]; 5] = [
    &["1", "2", "3", "4", "5", "6", "7", "8", "9", "0"],
    &["Q", "W", "E", "R", "T", "Y", "U", "I", "O", "P"],
    &["A", "S", "D", "F", "G", "H", "J", "K", "L"],
    &["Z", "X", "C", "V", "B", "N", "M", ".", "-"],
    &["SPACE", "BACK", "DONE"],
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyboardOutcome {
    Editing,
    Done(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyboard {
    pub title: String,
    pub text: String,
    pub row: usize,
    pub col: usize,
}

impl Keyboard {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: String::new(),
            row: 1,
            col: 0,
        }
    }

    pub fn selected_key(&self) -> &'static str {
        LAYOUT[self.row][self.col]
    }

    /// Handles the highest-priority pressed button, if any.
    ///
    /// Returns `None` when nothing relevant was pressed.
    pub fn handle(&mut self, input: &InputSnapshot) -> Option<KeyboardOutcome> {
        if input.is_pressed(Button::Up) {
            self.row = self.row.saturating_sub(1);
            self.clamp_col();
        } else if input.is_pressed(Button::Down) {
            self.row = (self.row + 1).min(LAYOUT.len() - 1);
            self.clamp_col();
        } else if input.is_pressed(Button::Left) {
            self.col = self.col.saturating_sub(1);
        } else if input.is_pressed(Button::Right) {
            self.col = (self.col + 1).min(LAYOUT[self.row].len() - 1);
        } else if input.is_pressed(Button::A) {
            match self.selected_key() {
                "SPACE" => self.text.push(' '),
                "BACK" => {
                    self.text.pop();
                }
                "DONE" => return Some(KeyboardOutcome::Done(self.text.clone())),
                key => self.text.push_str(key),
            }
        } else if input.is_pressed(Button::B) {
            self.text.pop();
        } else if input.is_pressed(Button::Start) {
            return Some(KeyboardOutcome::Done(self.text.clone()));
        } else {
            return None;
        }
        Some(KeyboardOutcome::Editing)
    }

    fn clamp_col(&mut self) {
        self.col = self.col.min(LAYOUT[self.row].len() - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(kb: &mut Keyboard, button: Button) -> Option<KeyboardOutcome> {
        kb.handle(&InputSnapshot::with(&[button]))
    }

    #[test]
    fn starts_on_letter_row() {
        let kb = Keyboard::new("SEARCH");
        assert_eq!(kb.selected_key(), "Q");
    }

    #[test]
    fn column_clamps_to_shorter_rows() {
        let mut kb = Keyboard::new("SEARCH");
        for _ in 0..12 {
            press(&mut kb, Button::Right);
        }
        assert_eq!(kb.selected_key(), "P");
        press(&mut kb, Button::Down);
        assert_eq!(kb.selected_key(), "L");
        press(&mut kb, Button::Down);
        press(&mut kb, Button::Down);
        assert_eq!(kb.selected_key(), "DONE");
        press(&mut kb, Button::Down);
        assert_eq!(kb.row, 4);
    }

    #[test]
    fn types_deletes_and_finishes() {
        let mut kb = Keyboard::new("SEARCH");
        press(&mut kb, Button::A);
        press(&mut kb, Button::Up);
        press(&mut kb, Button::A);
        assert_eq!(kb.text, "Q1");
        press(&mut kb, Button::B);
        assert_eq!(kb.text, "Q");

        for _ in 0..4 {
            press(&mut kb, Button::Down);
        }
        assert_eq!(kb.selected_key(), "SPACE");
        press(&mut kb, Button::A);
        assert_eq!(press(&mut kb, Button::Start), Some(KeyboardOutcome::Done("Q ".into())));
    }

    #[test]
    fn idle_input_is_ignored() {
        let mut kb = Keyboard::new("SEARCH");
        assert_eq!(kb.handle(&InputSnapshot::default()), None);
    }
}
