use chrono::{DateTime, Local};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::audio::{AudioError, Tracks};
use crate::config::Config;
use crate::phase::{PhaseController, Transition};
use crate::session::{Phase, Session};

/// Whether the two tracks are usable yet.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioState {
    Loading,
    Ready,
    Failed(String),
}

/// What a key press asks the controller to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    ToggleWork,
    Confirm,
    ShorterWork,
    LongerWork,
    ShorterCycle,
    LongerCycle,
    Quit,
}

impl Intent {
    pub fn from_key(key: KeyEvent) -> Option<Self> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(Intent::Quit);
        }
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => Some(Intent::Quit),
            KeyCode::Char('s') | KeyCode::Char(' ') => Some(Intent::ToggleWork),
            KeyCode::Char('y') | KeyCode::Enter => Some(Intent::Confirm),
            KeyCode::Left | KeyCode::Char('h') => Some(Intent::ShorterWork),
            KeyCode::Right | KeyCode::Char('l') => Some(Intent::LongerWork),
            KeyCode::Char('[') => Some(Intent::ShorterCycle),
            KeyCode::Char(']') => Some(Intent::LongerCycle),
            _ => None,
        }
    }
}

/// Everything the screen is drawn from.
#[derive(Debug)]
pub struct App {
    pub controller: PhaseController,
    pub audio: AudioState,
    pub now: DateTime<Local>,
    pub should_quit: bool,
}

impl App {
    /// Starts with silent tracks until `finish_loading` hands over the real ones.
    pub fn new(config: &Config, now: DateTime<Local>) -> Self {
        let session = Session::new(config.work_minutes, config.cycle_minutes);
        Self {
            controller: PhaseController::new(session, config.boundary, Tracks::silent()),
            audio: AudioState::Loading,
            now,
            should_quit: false,
        }
    }

    pub fn finish_loading(&mut self, loaded: Result<Tracks, AudioError>) {
        match loaded {
            Ok(tracks) => {
                self.controller.replace_tracks(tracks);
                self.audio = AudioState::Ready;
            }
            Err(err) => {
                tracing::error!(error = %err, "could not load audio");
                self.audio = AudioState::Failed(err.to_string());
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.audio == AudioState::Ready
    }

    pub fn phase(&self) -> Phase {
        self.controller.phase()
    }

    pub fn on_tick(&mut self, now: DateTime<Local>) -> Option<Transition> {
        self.now = now;
        if !self.is_ready() {
            return None;
        }
        self.controller.tick(now)
    }

    pub fn on_key(&mut self, key: KeyEvent, now: DateTime<Local>) {
        self.now = now;
        if let Some(intent) = Intent::from_key(key) {
            self.apply(intent, now);
        }
    }

    pub fn apply(&mut self, intent: Intent, now: DateTime<Local>) {
        if intent == Intent::Quit {
            self.should_quit = true;
            return;
        }
        if !self.is_ready() {
            return;
        }

        let session = self.controller.session();
        let (work, cycle) = (session.work_minutes(), session.cycle_minutes());
        let outcome = match intent {
            Intent::ToggleWork => {
                if self.controller.phase().is_active() {
                    self.controller.stop_work();
                    Ok(())
                } else {
                    self.controller.start_work(now)
                }
            }
            Intent::Confirm => {
                // nothing to acknowledge before a session exists
                if self.controller.phase().is_active() {
                    self.controller.confirm();
                }
                Ok(())
            }
            Intent::ShorterWork => self
                .controller
                .set_work_duration(work.saturating_sub(1))
                .map(drop),
            Intent::LongerWork => self.controller.set_work_duration(work + 1).map(drop),
            Intent::ShorterCycle => self
                .controller
                .set_cycle_duration(cycle.saturating_sub(1))
                .map(drop),
            Intent::LongerCycle => self.controller.set_cycle_duration(cycle + 1).map(drop),
            Intent::Quit => Ok(()),
        };

        if let Err(err) = outcome {
            // the slider is shown disabled; ignoring the key is the intended feedback
            tracing::debug!(?intent, error = %err, "intent ignored");
        }
    }
}
