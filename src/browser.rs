//! Navigation state of the collection browser.
//!
//! The browser only decides what should happen next; fetching, downloading
//! and drawing are carried out by the runtime from the returned [`Effect`].

use std::time::Duration;

use crate::input::{Button, InputSnapshot};
use crate::models::{CollectionSpec, FileEntry};
use crate::sanitize::{display_name, percent_decode};

pub const MOVE_DELAY: Duration = Duration::from_millis(100);
pub const JUMP_DELAY: Duration = Duration::from_millis(300);
pub const COMMAND_DELAY: Duration = Duration::from_millis(400);
pub const DOWNLOAD_DELAY: Duration = Duration::from_millis(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Collections,
    Files,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Up,
    Down,
    JumpNext,
    JumpPrev,
    Search,
    Back,
    Select,
    Refresh,
    Exit,
}

impl Action {
    /// Maps pressed buttons to an action, first match wins.
    pub fn from_input(input: &InputSnapshot) -> Option<Self> {
        const PRIORITY: [(Button, Action); 9] = [
            (Button::Up, Action::Up),
            (Button::Down, Action::Down),
            (Button::Right, Action::JumpNext),
            (Button::Left, Action::JumpPrev),
            (Button::X, Action::Search),
            (Button::B, Action::Back),
            (Button::A, Action::Select),
            (Button::Y, Action::Refresh),
            (Button::Start, Action::Exit),
        ];
        PRIORITY
            .iter()
            .find(|(button, _)| input.is_pressed(*button))
            .map(|(_, action)| *action)
    }

    /// Quiet period before the next action is accepted.
    pub fn cooldown(self, effect: &Effect) -> Duration {
        match (self, effect) {
            (_, Effect::Download { .. }) => DOWNLOAD_DELAY,
            (Action::Up | Action::Down, _) => MOVE_DELAY,
            (Action::JumpNext | Action::JumpPrev, _) => JUMP_DELAY,
            _ => COMMAND_DELAY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    None,
    Fetch { collection: usize, force_refresh: bool },
    Download { collection: usize, entry: FileEntry },
    OpenSearch,
    Exit,
}

#[derive(Debug, Clone)]
pub struct Browser {
    collections: Vec<CollectionSpec>,
    view: View,
    selected_collection: usize,
    selected_file: usize,
    all_files: Vec<FileEntry>,
    files: Vec<FileEntry>,
}

impl Browser {
    pub fn new(collections: Vec<CollectionSpec>) -> Self {
        Self {
            collections,
            view: View::Collections,
            selected_collection: 0,
            selected_file: 0,
            all_files: Vec::new(),
            files: Vec::new(),
        }
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn collections(&self) -> &[CollectionSpec] {
        &self.collections
    }

    pub fn collection(&self, index: usize) -> Option<&CollectionSpec> {
        self.collections.get(index)
    }

    pub fn current_collection(&self) -> Option<&CollectionSpec> {
        self.collections.get(self.selected_collection)
    }

    /// Entries currently shown, after any search filter.
    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    pub fn selected(&self) -> usize {
        match self.view {
            View::Collections => self.selected_collection,
            View::Files => self.selected_file,
        }
    }

    fn visible_len(&self) -> usize {
        match self.view {
            View::Collections => self.collections.len(),
            View::Files => self.files.len(),
        }
    }

    fn selected_mut(&mut self) -> &mut usize {
        match self.view {
            View::Collections => &mut self.selected_collection,
            View::Files => &mut self.selected_file,
        }
    }

    pub fn apply(&mut self, action: Action) -> Effect {
        let len = self.visible_len();
        match (self.view, action) {
            (_, Action::Up) => {
                let sel = self.selected_mut();
                *sel = sel.saturating_sub(1);
                Effect::None
            }
            (_, Action::Down) => {
                let sel = self.selected_mut();
                *sel = (*sel + 1).min(len.saturating_sub(1));
                Effect::None
            }
            (View::Files, Action::JumpNext) => {
                self.selected_file = letter_jump(&self.initials(), self.selected_file, true);
                Effect::None
            }
            (View::Files, Action::JumpPrev) => {
                self.selected_file = letter_jump(&self.initials(), self.selected_file, false);
                Effect::None
            }
            (View::Files, Action::Search) => Effect::OpenSearch,
            (View::Files, Action::Back) => {
                self.view = View::Collections;
                self.all_files.clear();
                self.files.clear();
                Effect::None
            }
            (View::Collections, Action::Back | Action::Exit) => Effect::Exit,
            (View::Collections, Action::Select) => Effect::Fetch {
                collection: self.selected_collection,
                force_refresh: false,
            },
            (View::Collections, Action::Refresh) => Effect::Fetch {
                collection: self.selected_collection,
                force_refresh: true,
            },
            (View::Files, Action::Select) => match self.files.get(self.selected_file) {
                Some(entry) => Effect::Download {
                    collection: self.selected_collection,
                    entry: entry.clone(),
                },
                None => Effect::None,
            },
            _ => Effect::None,
        }
    }

    /// Switches to the file view showing `entries`.
    pub fn open_listing(&mut self, entries: Vec<FileEntry>) {
        self.all_files = entries.clone();
        self.files = entries;
        self.selected_file = 0;
        self.view = View::Files;
    }

    /// Filters the listing by a case-insensitive substring of the decoded name.
    ///
    /// An empty term restores the full listing.
    pub fn apply_search(&mut self, term: &str) {
        let term = term.to_lowercase();
        self.files = if term.is_empty() {
            self.all_files.clone()
        } else {
            self.all_files
                .iter()
                .filter(|e| percent_decode(&e.name).to_lowercase().contains(&term))
                .cloned()
                .collect()
        };
        self.selected_file = 0;
    }

    fn initials(&self) -> Vec<char> {
        self.files
            .iter()
            .map(|e| {
                display_name(&e.name)
                    .chars()
                    .next()
                    .map(|c| c.to_ascii_uppercase())
                    .unwrap_or('\0')
            })
            .collect()
    }
}

/// Index of the next (or previous) group of entries starting with a different letter.
///
/// Forward wraps to the first entry past the last group. Backward lands on the
/// start of the previous group, or the last entry when there is none.
pub fn letter_jump(initials: &[char], current: usize, forward: bool) -> usize {
    let Some(&current_char) = initials.get(current) else {
        return 0;
    };

    if forward {
        return (current + 1..initials.len())
            .find(|&i| initials[i] != current_char)
            .unwrap_or(0);
    }

    match (0..=current).rev().find(|&i| initials[i] != current_char) {
        Some(i) => {
            let prev_char = initials[i];
            (0..=i)
                .rev()
                .find(|&j| initials[j] != prev_char)
                .map_or(0, |j| j + 1)
        }
        None => initials.len() - 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collections() -> Vec<CollectionSpec> {
        serde_json::from_str(r#"[{"name": "GBA"}, {"name": "PSX", "method": "API"}]"#).unwrap()
    }

    fn entries(names: &[&str]) -> Vec<FileEntry> {
        names.iter().map(|n| FileEntry::new(*n, None)).collect()
    }

    #[test]
    fn input_priority_prefers_directions() {
        let input = InputSnapshot::with(&[Button::A, Button::Down]);
        assert_eq!(Action::from_input(&input), Some(Action::Down));
        assert_eq!(Action::from_input(&InputSnapshot::default()), None);
    }

    #[test]
    fn selection_is_clamped() {
        let mut b = Browser::new(collections());
        b.apply(Action::Up);
        assert_eq!(b.selected(), 0);
        b.apply(Action::Down);
        b.apply(Action::Down);
        assert_eq!(b.selected(), 1);
    }

    #[test]
    fn select_and_refresh_request_fetches() {
        let mut b = Browser::new(collections());
        b.apply(Action::Down);
        assert_eq!(
            b.apply(Action::Select),
            Effect::Fetch { collection: 1, force_refresh: false }
        );
        assert_eq!(
            b.apply(Action::Refresh),
            Effect::Fetch { collection: 1, force_refresh: true }
        );
    }

    #[test]
    fn back_leaves_files_then_exits() {
        let mut b = Browser::new(collections());
        b.open_listing(entries(&["a.zip"]));
        assert_eq!(b.view(), View::Files);
        assert_eq!(b.apply(Action::Back), Effect::None);
        assert_eq!(b.view(), View::Collections);
        assert!(b.files().is_empty());
        assert_eq!(b.apply(Action::Back), Effect::Exit);
    }

    #[test]
    fn select_in_files_downloads_current_entry() {
        let mut b = Browser::new(collections());
        b.open_listing(entries(&["a.zip", "b.zip"]));
        b.apply(Action::Down);
        assert_eq!(
            b.apply(Action::Select),
            Effect::Download { collection: 0, entry: FileEntry::new("b.zip", None) }
        );
    }

    #[test]
    fn search_filters_on_decoded_name() {
        let mut b = Browser::new(collections());
        b.open_listing(entries(&["Super%20Mario.zip", "Zelda.zip", "mario%20kart.7z"]));
        b.apply(Action::Down);
        b.apply_search("SUPER");
        assert_eq!(b.files().len(), 1);
        assert_eq!(b.selected(), 0);
        b.apply_search("mario");
        assert_eq!(b.files().len(), 2);
        b.apply_search("");
        assert_eq!(b.files().len(), 3);
    }

    #[test]
    fn letter_jump_forward_moves_to_next_group_and_wraps() {
        let initials = ['A', 'A', 'B', 'C', 'C'];
        assert_eq!(letter_jump(&initials, 0, true), 2);
        assert_eq!(letter_jump(&initials, 2, true), 3);
        assert_eq!(letter_jump(&initials, 3, true), 0);
    }

    #[test]
    fn letter_jump_backward_moves_to_previous_group_start() {
        let initials = ['A', 'A', 'B', 'B', 'C'];
        assert_eq!(letter_jump(&initials, 4, false), 2);
        assert_eq!(letter_jump(&initials, 3, false), 0);
        assert_eq!(letter_jump(&initials, 1, false), 4);
        assert_eq!(letter_jump(&[], 0, false), 0);
    }

    #[test]
    fn jumps_use_display_names() {
        let mut b = Browser::new(collections());
        b.open_listing(entries(&[
            "https://cdn.example/a/Alpha.zip",
            "https://cdn.example/a/Beta.zip",
        ]));
        b.apply(Action::JumpNext);
        assert_eq!(b.selected(), 1);
    }
}
