//! Joystick input: shared button state, event decoding and the reader thread.
//!
//! The reader thread is the only writer of [`InputState`]; the runtime polls
//! it on every tick. Flags are independent atomics, so readers see each flag
//! converge but not a consistent snapshot across flags.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::downloader::CancelSignal;

pub const EVENT_SIZE: usize = 8;
pub const AXIS_THRESHOLD: i16 = 20_000;

const EVENT_BUTTON: u8 = 0x01;
const EVENT_AXIS: u8 = 0x02;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Button {
    A,
    B,
    X,
    Y,
    Start,
    Up,
    Down,
    Left,
    Right,
}

impl Button {
    pub const ALL: [Button; 9] = [
        Button::A,
        Button::B,
        Button::X,
        Button::Y,
        Button::Start,
        Button::Up,
        Button::Down,
        Button::Left,
        Button::Right,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Latest pressed/released state of every button and direction.
#[derive(Debug, Default)]
pub struct InputState {
    flags: [AtomicBool; 9],
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        self.flags[button.index()].load(Ordering::Relaxed)
    }

    pub fn set(&self, button: Button, pressed: bool) {
        self.flags[button.index()].store(pressed, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> InputSnapshot {
        let mut pressed = [false; 9];
        for button in Button::ALL {
            pressed[button.index()] = self.is_pressed(button);
        }
        InputSnapshot { pressed }
    }

    /// Applies one decoded joystick event.
    pub fn apply(&self, event: &JsEvent, map: &ButtonMap) {
        match event.kind {
            EVENT_BUTTON => {
                if let Some(button) = map.get(event.number) {
                    self.set(button, event.value == 1);
                }
            }
            EVENT_AXIS => {
                let (neg, pos) = match event.number {
                    1 => (Button::Up, Button::Down),
                    0 => (Button::Left, Button::Right),
                    _ => return,
                };
                self.set(neg, event.value < -AXIS_THRESHOLD);
                self.set(pos, event.value > AXIS_THRESHOLD);
            }
            _ => {}
        }
    }
}

/// Holding B cancels a running download.
impl CancelSignal for InputState {
    fn is_cancelled(&self) -> bool {
        self.is_pressed(Button::B)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputSnapshot {
    pressed: [bool; 9],
}

impl InputSnapshot {
    pub fn with(buttons: &[Button]) -> Self {
        let mut pressed = [false; 9];
        for b in buttons {
            pressed[b.index()] = true;
        }
        Self { pressed }
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        self.pressed[button.index()]
    }

    pub fn any(&self) -> bool {
        self.pressed.iter().any(|p| *p)
    }
}

/// Linux joystick API event (`struct js_event`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsEvent {
    pub time: u32,
    pub value: i16,
    pub kind: u8,
    pub number: u8,
}

impl JsEvent {
    pub fn decode(raw: [u8; EVENT_SIZE]) -> Self {
        Self {
            time: u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
            value: i16::from_le_bytes([raw[4], raw[5]]),
            kind: raw[6],
            number: raw[7],
        }
    }

    pub fn read_from(reader: &mut impl Read) -> io::Result<Self> {
        let mut raw = [0u8; EVENT_SIZE];
        reader.read_exact(&mut raw)?;
        Ok(Self::decode(raw))
    }

    fn is_press(&self) -> bool {
        self.kind == EVENT_BUTTON && self.value == 1
    }
}

/// Joystick button number to logical button, persisted as `controls.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ButtonMap {
    buttons: HashMap<u8, Button>,
}

impl ButtonMap {
    pub fn get(&self, number: u8) -> Option<Button> {
        self.buttons.get(&number).copied()
    }

    pub fn insert(&mut self, number: u8, button: Button) {
        self.buttons.insert(number, button);
    }

    pub fn is_empty(&self) -> bool {
        self.buttons.is_empty()
    }

    /// Stand-in used before calibration: every button number reads as A,
    /// which is enough to answer a press-any-key prompt.
    pub fn uncalibrated() -> Self {
        Self {
            buttons: (0..=u8::MAX).map(|number| (number, Button::A)).collect(),
        }
    }

    pub fn load(path: &Path) -> Option<Self> {
        let content = fs::read_to_string(path).ok()?;
        let raw: HashMap<String, Button> = match serde_json::from_str(&content) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable controls file");
                return None;
            }
        };

        let mut map = Self::default();
        for (number, button) in raw {
            let Ok(number) = number.parse() else {
                warn!(path = %path.display(), number, "Ignoring non-numeric button");
                continue;
            };
            map.insert(number, button);
        }
        (!map.is_empty()).then_some(map)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let raw: HashMap<String, Button> = self
            .buttons
            .iter()
            .map(|(number, button)| (number.to_string(), *button))
            .collect();
        let content = serde_json::to_string(&raw).context("Failed to serialize controls")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write controls file {}", path.display()))?;
        Ok(())
    }
}

/// Buttons assigned during calibration, in prompt order.
pub const CALIBRATION_STEPS: [(Button, &str); 5] = [
    (Button::A, "Hold 'A'"),
    (Button::B, "Hold 'B'"),
    (Button::X, "Hold 'X' (Search)"),
    (Button::Y, "Hold 'Y' (Refresh)"),
    (Button::Start, "Hold 'START'"),
];

/// Builds a button map from the first press of each not-yet-assigned button.
///
/// `prompt` is called before each step.
pub fn calibrate(
    events: &mut impl Read,
    mut prompt: impl FnMut(&str),
    settle: Duration,
) -> io::Result<ButtonMap> {
    let mut map = ButtonMap::default();
    for (button, label) in CALIBRATION_STEPS {
        prompt(label);
        let number = loop {
            let event = JsEvent::read_from(events)?;
            if event.is_press() && map.get(event.number).is_none() {
                break event.number;
            }
        };
        debug!(?button, number, "Calibrated button");
        map.insert(number, button);
        if !settle.is_zero() {
            thread::sleep(settle);
        }
    }
    Ok(map)
}

/// Starts the background reader feeding `state` from `device`.
///
/// A missing device is logged and leaves the state untouched.
pub fn spawn_reader(device: PathBuf, map: ButtonMap, state: Arc<InputState>) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("joystick".into())
        .spawn(move || {
            let mut file = match File::open(&device) {
                Ok(file) => file,
                Err(e) => {
                    warn!(device = %device.display(), error = %e, "Joystick unavailable");
                    return;
                }
            };
            info!(device = %device.display(), "Reading joystick events");
            loop {
                match JsEvent::read_from(&mut file) {
                    Ok(event) => state.apply(&event, &map),
                    Err(e) => {
                        warn!(error = %e, "Joystick read failed");
                        return;
                    }
                }
            }
        })
        .context("Failed to spawn joystick reader")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn raw(value: i16, kind: u8, number: u8) -> [u8; EVENT_SIZE] {
        let mut raw = [0u8; EVENT_SIZE];
        raw[0..4].copy_from_slice(&1234u32.to_le_bytes());
        raw[4..6].copy_from_slice(&value.to_le_bytes());
        raw[6] = kind;
        raw[7] = number;
        raw
    }

    #[test]
    fn decodes_little_endian_event() {
        let event = JsEvent::decode(raw(-32767, EVENT_AXIS, 1));
        assert_eq!(event.time, 1234);
        assert_eq!(event.value, -32767);
        assert_eq!(event.kind, EVENT_AXIS);
        assert_eq!(event.number, 1);
    }

    #[test]
    fn mapped_buttons_follow_press_and_release() {
        let state = InputState::new();
        let mut map = ButtonMap::default();
        map.insert(3, Button::B);

        state.apply(&JsEvent::decode(raw(1, EVENT_BUTTON, 3)), &map);
        assert!(state.is_pressed(Button::B));
        assert!(state.is_cancelled());

        state.apply(&JsEvent::decode(raw(0, EVENT_BUTTON, 3)), &map);
        assert!(!state.is_pressed(Button::B));

        state.apply(&JsEvent::decode(raw(1, EVENT_BUTTON, 9)), &map);
        assert!(!state.snapshot().any());
    }

    #[test]
    fn axes_use_threshold() {
        let state = InputState::new();
        let map = ButtonMap::default();

        state.apply(&JsEvent::decode(raw(-25_000, EVENT_AXIS, 1)), &map);
        assert!(state.is_pressed(Button::Up));
        assert!(!state.is_pressed(Button::Down));

        state.apply(&JsEvent::decode(raw(15_000, EVENT_AXIS, 1)), &map);
        assert!(!state.is_pressed(Button::Up));
        assert!(!state.is_pressed(Button::Down));

        state.apply(&JsEvent::decode(raw(30_000, EVENT_AXIS, 0)), &map);
        assert!(state.is_pressed(Button::Right));
    }

    #[test]
    fn init_events_are_ignored() {
        let state = InputState::new();
        let mut map = ButtonMap::default();
        map.insert(0, Button::A);
        state.apply(&JsEvent::decode(raw(1, 0x80 | EVENT_BUTTON, 0)), &map);
        assert!(!state.is_pressed(Button::A));
    }

    #[test]
    fn calibration_skips_already_assigned_buttons() {
        let mut stream = Vec::new();
        for (value, kind, number) in [
            (1, EVENT_BUTTON, 0),
            (1, EVENT_BUTTON, 0),
            (0, EVENT_BUTTON, 0),
            (1, EVENT_BUTTON, 1),
            (-30_000, EVENT_AXIS, 1),
            (1, EVENT_BUTTON, 2),
            (1, EVENT_BUTTON, 3),
            (1, EVENT_BUTTON, 7),
        ] {
            stream.extend_from_slice(&raw(value, kind, number));
        }

        let mut prompts = Vec::new();
        let map = calibrate(&mut stream.as_slice(), |p| prompts.push(p.to_string()), Duration::ZERO).unwrap();

        assert_eq!(prompts.len(), 5);
        assert_eq!(map.get(0), Some(Button::A));
        assert_eq!(map.get(1), Some(Button::B));
        assert_eq!(map.get(2), Some(Button::X));
        assert_eq!(map.get(3), Some(Button::Y));
        assert_eq!(map.get(7), Some(Button::Start));
    }

    #[test]
    fn uncalibrated_map_reports_any_button() {
        let map = ButtonMap::uncalibrated();
        let state = InputState::new();
        state.apply(&JsEvent::decode(raw(1, EVENT_BUTTON, 11)), &map);
        assert!(state.snapshot().any());
        assert_eq!(map.get(0), Some(Button::A));
    }

    #[test]
    fn button_map_round_trips_through_controls_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("controls.json");
        let mut map = ButtonMap::default();
        map.insert(4, Button::Start);
        map.insert(1, Button::A);
        map.save(&path).unwrap();

        assert_eq!(ButtonMap::load(&path), Some(map));
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains(r#""4":"START""#));
    }

    #[test]
    fn corrupt_controls_file_loads_as_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("controls.json");
        fs::write(&path, "{oops").unwrap();
        assert_eq!(ButtonMap::load(&path), None);
    }
}
