//! Plain-text frames for the terminal and the writer that presents them.

use std::io::{self, Write};

use crate::browser::{Browser, View};
use crate::downloader::{Progress, ProgressReading};
use crate::keyboard::{Keyboard, LAYOUT};
use crate::sanitize::{display_name, format_size, sanitize};

const CLEAR: &str = "\x1b[H\x1b[2J";
const REVERSE: &str = "\x1b[7m";
const RESET: &str = "\x1b[0m";
const BOX_WIDTH: usize = 50;
const BAR_WIDTH: usize = 46;

/// Terminal size in cells, from `COLUMNS`/`LINES` when set.
pub fn terminal_size() -> (usize, usize) {
    let read = |name: &str, default: usize| {
        std::env::var(name)
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|v: &usize| *v > 0)
            .unwrap_or(default)
    };
    (read("COLUMNS", 80), read("LINES", 24))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub text: String,
    pub highlighted: bool,
}

impl Line {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            highlighted: false,
        }
    }

    fn highlighted(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            highlighted: true,
        }
    }
}

pub type Frame = Vec<Line>;

fn center(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.chars().take(width).collect();
    }
    let left = (width - len) / 2;
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(width - len - left))
}

fn truncate(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}

/// Header, windowed list around the selection, footer.
pub fn browser_frame(browser: &Browser, width: usize, height: usize) -> Frame {
    let (title, hint, footer) = match (browser.view(), browser.current_collection()) {
        (View::Files, Some(collection)) => (
            collection.name.as_str(),
            format!("[{}] X:Search B:Back", browser.files().len()),
            format!(" [{}] A:DL  X:SEARCH  L/R:JUMP  B:BACK ", browser.files().len()),
        ),
        _ => (
            "COLLECTIONS",
            "A:Select Y:Refresh".to_string(),
            " A:SELECT  Y:FORCE REFRESH  START:EXIT ".to_string(),
        ),
    };

    let rows: Vec<(String, String)> = match browser.view() {
        View::Collections => browser
            .collections()
            .iter()
            .map(|c| (sanitize(&c.name), format_size(None)))
            .collect(),
        View::Files => browser
            .files()
            .iter()
            .map(|e| (display_name(&e.name), format_size(e.size)))
            .collect(),
    };

    let mut frame = vec![
        Line::plain(truncate(&format!(" ARCHIVE BROWSER | {} | {hint} ", sanitize(title)), width)),
        Line::plain("-".repeat(width)),
    ];

    let selected = browser.selected().min(rows.len().saturating_sub(1));
    let max_rows = height.saturating_sub(4).max(1);
    let start = selected.saturating_sub(max_rows / 2);
    let end = rows.len().min(start + max_rows);
    for (i, (name, size)) in rows.iter().enumerate().take(end).skip(start) {
        let name_width = width.saturating_sub(size.len() + 2);
        let text = format!(" {:<name_width$}{size} ", truncate(name, name_width));
        if i == selected {
            frame.push(Line::highlighted(text));
        } else {
            frame.push(Line::plain(text));
        }
    }

    while frame.len() < height.saturating_sub(1) {
        frame.push(Line::plain(""));
    }
    frame.push(Line::highlighted(center(&footer, width)));
    frame
}

fn boxed(lines: &[String], width: usize) -> Frame {
    let inner = width.saturating_sub(4);
    let mut frame = vec![Line::plain(format!("+{}+", "-".repeat(width.saturating_sub(2))))];
    for line in lines {
        frame.push(Line::plain(format!("| {} |", center(line, inner))));
    }
    frame.push(Line::plain(format!("+{}+", "-".repeat(width.saturating_sub(2)))));
    frame
}

pub fn popup_frame(title: &str, message: &str, width: usize) -> Frame {
    let box_width = BOX_WIDTH.min(width.saturating_sub(4)).max(10);
    boxed(
        &[
            sanitize(title),
            String::new(),
            sanitize(message),
            String::new(),
            String::new(),
            "PRESS B TO CLOSE".to_string(),
        ],
        box_width,
    )
}

pub fn notice_frame(lines: &[&str]) -> Frame {
    let lines: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
    boxed(&lines, BOX_WIDTH)
}

/// Progress box: bar and percentage when the total is known, raw bytes otherwise.
pub fn progress_frame(name: &str, progress: Option<&Progress>) -> Frame {
    let (bar, stats) = match progress {
        Some(p) => {
            let speed = format_size(Some(p.speed as u64));
            match p.reading {
                ProgressReading::Percent(fraction) => {
                    let filled = (BAR_WIDTH as f64 * fraction) as usize;
                    (
                        format!("{:<width$}", "#".repeat(filled), width = BAR_WIDTH),
                        format!("{}% | {speed}/s", (fraction * 100.0) as u32),
                    )
                }
                ProgressReading::Bytes(bytes) => (
                    String::new(),
                    format!("{} | {speed}/s", format_size(Some(bytes))),
                ),
            }
        }
        None => (String::new(), String::new()),
    };
    boxed(
        &[
            "DOWNLOADING...".to_string(),
            truncate(&display_name(name), BAR_WIDTH),
            String::new(),
            bar,
            stats,
            "B: CANCEL".to_string(),
        ],
        BOX_WIDTH,
    )
}

pub fn keyboard_frame(keyboard: &Keyboard) -> Frame {
    let mut lines = vec![
        keyboard.title.clone(),
        String::new(),
        format!("[{}]", keyboard.text),
        String::new(),
    ];
    for (r, row) in LAYOUT.iter().enumerate() {
        let keys: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(c, key)| {
                if r == keyboard.row && c == keyboard.col {
                    format!("<{key}>")
                } else {
                    format!(" {key} ")
                }
            })
            .collect();
        lines.push(keys.join(""));
    }
    lines.push(String::new());
    lines.push("A:TYPE  B:DEL  START:CONFIRM".to_string());
    boxed(&lines, BOX_WIDTH)
}

/// Writes whole frames to a terminal-like sink.
pub struct Screen<W: Write> {
    out: W,
    width: usize,
    height: usize,
}

impl Screen<io::Stdout> {
    pub fn stdout() -> Self {
        let (width, height) = terminal_size();
        Self::new(io::stdout(), width, height)
    }
}

impl<W: Write> Screen<W> {
    pub fn new(out: W, width: usize, height: usize) -> Self {
        Self { out, width, height }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn present(&mut self, frame: &Frame) -> io::Result<()> {
        let mut buf = String::from(CLEAR);
        for line in frame {
            if line.highlighted {
                buf.push_str(REVERSE);
                buf.push_str(&line.text);
                buf.push_str(RESET);
            } else {
                buf.push_str(&line.text);
            }
            buf.push_str("\r\n");
        }
        self.out.write_all(buf.as_bytes())?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
