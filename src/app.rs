//! Interactive runtime: one tick loop driving input, browser and screen.
//!
//! Fetches and downloads are awaited inline, so at most one of them is ever
//! in flight. Input arrives through the shared [`InputState`] and is only
//! ever polled.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::browser::{Action, Browser, Effect};
use crate::config::AppConfig;
use crate::downloader::{DownloadRequest, Downloader, Progress};
use crate::fetch::ListingFetcher;
use crate::input::{Button, InputState};
use crate::keyboard::{Keyboard, KeyboardOutcome};
use crate::models::FileEntry;
use crate::screen::{self, Screen};

pub const TICK: Duration = Duration::from_millis(30);
const POPUP_TICK: Duration = Duration::from_millis(50);
const KEY_DELAY: Duration = Duration::from_millis(150);
const KEY_EDIT_DELAY: Duration = Duration::from_millis(250);
const PROGRESS_REDRAW: Duration = Duration::from_millis(100);

fn ticker(period: Duration) -> Interval {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

pub struct App<W: Write> {
    config: AppConfig,
    browser: Browser,
    fetcher: ListingFetcher,
    downloader: Downloader,
    input: Arc<InputState>,
    screen: Screen<W>,
}

impl<W: Write> App<W> {
    pub fn new(
        config: AppConfig,
        browser: Browser,
        fetcher: ListingFetcher,
        downloader: Downloader,
        input: Arc<InputState>,
        screen: Screen<W>,
    ) -> Self {
        Self {
            config,
            browser,
            fetcher,
            downloader,
            input,
            screen,
        }
    }

    /// Runs until the user exits from the collection view.
    pub async fn run(&mut self) -> Result<()> {
        let mut ticker = ticker(TICK);
        let mut ready_at = Instant::now();

        loop {
            ticker.tick().await;
            self.draw_browser()?;

            if Instant::now() < ready_at {
                continue;
            }
            let Some(action) = Action::from_input(&self.input.snapshot()) else {
                continue;
            };

            let effect = self.browser.apply(action);
            let cooldown = action.cooldown(&effect);
            debug!(?action, ?effect, "Browser action");

            match effect {
                Effect::None => {}
                Effect::Exit => {
                    info!("Exit requested");
                    return Ok(());
                }
                Effect::OpenSearch => {
                    let term = self.read_keyboard("SEARCH").await?;
                    self.browser.apply_search(&term);
                }
                Effect::Fetch {
                    collection,
                    force_refresh,
                } => self.fetch(collection, force_refresh).await?,
                Effect::Download { collection, entry } => self.download(collection, &entry).await?,
            }
            ready_at = Instant::now() + cooldown;
        }
    }

    fn draw_browser(&mut self) -> Result<()> {
        let frame = screen::browser_frame(&self.browser, self.screen.width(), self.screen.height());
        self.screen.present(&frame).context("Failed to draw browser")
    }

    async fn fetch(&mut self, index: usize, force_refresh: bool) -> Result<()> {
        let Some(collection) = self.browser.collection(index).cloned() else {
            return Ok(());
        };
        let label = if force_refresh { "REFRESHING..." } else { "LOADING..." };
        self.screen
            .present(&screen::notice_frame(&[label, &collection.name]))
            .context("Failed to draw loading notice")?;

        match self.fetcher.fetch(&collection, force_refresh).await {
            Ok(entries) if !entries.is_empty() => self.browser.open_listing(entries),
            Ok(_) => {
                info!(collection = %collection.name, "Listing is empty");
                self.popup("ERROR", "No files found").await?;
            }
            Err(e) => {
                warn!(collection = %collection.name, error = %e, "Fetch failed");
                self.popup("ERROR", e.kind().label()).await?;
            }
        }
        Ok(())
    }

    async fn download(&mut self, index: usize, entry: &FileEntry) -> Result<()> {
        let Some(collection) = self.browser.collection(index).cloned() else {
            return Ok(());
        };
        let request = DownloadRequest::for_entry(
            &collection,
            entry,
            self.config.destination_dir(&collection),
        );

        let name = entry.name.clone();
        self.screen
            .present(&screen::progress_frame(&name, None))
            .context("Failed to draw progress")?;

        let out = &mut self.screen;
        let mut last_draw: Option<Instant> = None;
        let mut on_progress = |progress: &Progress| {
            if last_draw.is_some_and(|t| t.elapsed() < PROGRESS_REDRAW) {
                return;
            }
            last_draw = Some(Instant::now());
            if let Err(e) = out.present(&screen::progress_frame(&name, Some(progress))) {
                debug!(error = %e, "Failed to draw progress");
            }
        };

        let result = self
            .downloader
            .download(&request, self.input.as_ref(), &mut on_progress)
            .await;

        match result {
            Ok(path) => {
                info!(path = %path.display(), "Saved");
                self.popup("SUCCESS", "Saved!").await
            }
            Err(e) => self.popup("ERROR", e.kind().label()).await,
        }
    }

    /// Shows a message until B is pressed.
    ///
    /// A B still held from before the popup (such as the one that cancelled a
    /// download) has to be released first.
    async fn popup(&mut self, title: &str, message: &str) -> Result<()> {
        let frame = screen::popup_frame(title, message, self.screen.width());
        self.screen.present(&frame).context("Failed to draw popup")?;

        let mut ticker = ticker(POPUP_TICK);
        while self.input.is_pressed(Button::B) {
            ticker.tick().await;
        }
        while !self.input.is_pressed(Button::B) {
            ticker.tick().await;
        }
        Ok(())
    }

    async fn read_keyboard(&mut self, title: &str) -> Result<String> {
        let mut keyboard = Keyboard::new(title);
        let mut ticker = ticker(TICK);
        let mut ready_at = Instant::now();

        loop {
            ticker.tick().await;
            self.screen
                .present(&screen::keyboard_frame(&keyboard))
                .context("Failed to draw keyboard")?;

            if Instant::now() < ready_at {
                continue;
            }
            let input = self.input.snapshot();
            match keyboard.handle(&input) {
                None => {}
                Some(KeyboardOutcome::Done(text)) => return Ok(text),
                Some(KeyboardOutcome::Editing) => {
                    let typed = input.is_pressed(Button::A) || input.is_pressed(Button::B);
                    ready_at = Instant::now() + if typed { KEY_EDIT_DELAY } else { KEY_DELAY };
                }
            }
        }
    }
}

/// Blocking notice shown when the collection list cannot be loaded.
///
/// Returns once any button is pressed, or right away when no joystick is readable.
pub async fn show_config_notice<W: Write>(
    screen: &mut Screen<W>,
    input: &InputState,
    reader_alive: impl Fn() -> bool,
) -> Result<()> {
    screen
        .present(&screen::notice_frame(&[
            "ERROR: CONFIG NOT FOUND",
            "",
            "collections.json is missing.",
            "Please check your tools folder.",
            "",
            "PRESS ANY KEY TO EXIT",
        ]))
        .context("Failed to draw config notice")?;

    let mut ticker = ticker(POPUP_TICK);
    while reader_alive() && !input.snapshot().any() {
        ticker.tick().await;
    }
    Ok(())
}
