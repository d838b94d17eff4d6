use chrono::{DateTime, Local};

pub const SECS_PER_MINUTE: u64 = 60;
pub const MAX_CYCLE_MINUTES: u32 = 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Phase {
    Idle,
    Working,
    Resting,
}

impl Phase {
    pub fn is_active(&self) -> bool {
        !matches!(self, Phase::Idle)
    }
}

/// The single work/rest session held for the lifetime of the process.
///
/// `started_at` is set exactly when `phase` is not `Idle`, and
/// `work_minutes` never exceeds `cycle_minutes`. Only the controller
/// mutates it, so both invariants are kept there.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub(crate) phase: Phase,
    pub(crate) started_at: Option<DateTime<Local>>,
    pub(crate) work_minutes: u32,
    pub(crate) cycle_minutes: u32,
}

impl Session {
    pub fn new(work_minutes: u32, cycle_minutes: u32) -> Self {
        let cycle_minutes = cycle_minutes.clamp(1, MAX_CYCLE_MINUTES);
        Self {
            phase: Phase::Idle,
            started_at: None,
            work_minutes: work_minutes.min(cycle_minutes),
            cycle_minutes,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn started_at(&self) -> Option<DateTime<Local>> {
        self.started_at
    }

    pub fn work_minutes(&self) -> u32 {
        self.work_minutes
    }

    pub fn cycle_minutes(&self) -> u32 {
        self.cycle_minutes
    }

    pub fn rest_minutes(&self) -> u32 {
        self.cycle_minutes - self.work_minutes
    }

    pub fn work_secs(&self) -> u64 {
        self.work_minutes as u64 * SECS_PER_MINUTE
    }

    pub fn cycle_secs(&self) -> u64 {
        self.cycle_minutes as u64 * SECS_PER_MINUTE
    }

    /// Whole seconds since the session started, 0 when idle.
    ///
    /// Uses the absolute difference so a clock that moved backwards still
    /// yields a usable position.
    pub fn elapsed_secs(&self, now: DateTime<Local>) -> u64 {
        match self.started_at {
            Some(started) => (now - started).num_seconds().unsigned_abs(),
            None => 0,
        }
    }

    pub fn position_in_cycle(&self, now: DateTime<Local>) -> u64 {
        self.elapsed_secs(now) % self.cycle_secs()
    }

    pub fn cycles_completed(&self, now: DateTime<Local>) -> u64 {
        self.elapsed_secs(now) / self.cycle_secs()
    }

    /// Seconds until the current phase is due to end.
    pub fn remaining_in_phase(&self, now: DateTime<Local>) -> u64 {
        let pos = self.position_in_cycle(now);
        match self.phase {
            Phase::Idle => 0,
            Phase::Working => self.work_secs().saturating_sub(pos),
            Phase::Resting => self.cycle_secs() - pos,
        }
    }

    /// Fill fraction for the progress bar.
    ///
    /// While working the bar spans the work portion; otherwise it spans the
    /// whole cycle, so resting picks up where working left off.
    pub fn progress(&self, now: DateTime<Local>) -> f64 {
        let span = match self.phase {
            Phase::Working => self.work_secs(),
            Phase::Resting | Phase::Idle => self.cycle_secs(),
        };
        if span == 0 {
            return 0.0;
        }
        (self.position_in_cycle(now) as f64 / span as f64).clamp(0.0, 1.0)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(20, 60)
    }
}

/// Render seconds as `mm:ss`, growing to `h:mm:ss` past an hour.
pub fn format_clock(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}
